//! Errors - ネイティブ層のエラーコードと同期エラー
//!
//! # 二種類のエラー
//! - **ErrorCode / QdbError**: ネイティブ呼び出しの結果。必ず callback の第一引数に届く
//! - **BindError**: 引数束縛の失敗。同期的に呼び出し元へ返り、callback は一切呼ばれない
//!
//! # ErrorCode のビット構成
//! - 上位 4 bit: origin（どこで起きたか）
//! - 次の 4 bit: severity（どれだけ深刻か）
//! - 下位 16 bit: code

use std::fmt;

use serde::{Deserialize, Serialize};

const ORIGIN_MASK: u32 = 0xF000_0000;
const SEVERITY_MASK: u32 = 0x0F00_0000;
const CODE_MASK: u32 = 0x0000_FFFF;

/// Where an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    SystemRemote,
    SystemLocal,
    Connection,
    Input,
    Operation,
    Protocol,
}

impl Origin {
    const fn bits(self) -> u32 {
        match self {
            Origin::SystemRemote => 0xF000_0000,
            Origin::SystemLocal => 0xE000_0000,
            Origin::Connection => 0xD000_0000,
            Origin::Input => 0xC000_0000,
            Origin::Operation => 0xB000_0000,
            Origin::Protocol => 0xA000_0000,
        }
    }

    fn from_bits(bits: u32) -> Option<Self> {
        match bits & ORIGIN_MASK {
            0xF000_0000 => Some(Origin::SystemRemote),
            0xE000_0000 => Some(Origin::SystemLocal),
            0xD000_0000 => Some(Origin::Connection),
            0xC000_0000 => Some(Origin::Input),
            0xB000_0000 => Some(Origin::Operation),
            0xA000_0000 => Some(Origin::Protocol),
            _ => None,
        }
    }
}

/// How bad an error is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Unrecoverable,
}

impl Severity {
    const fn bits(self) -> u32 {
        match self {
            Severity::Unrecoverable => 0x0300_0000,
            Severity::Error => 0x0200_0000,
            Severity::Warning => 0x0100_0000,
            Severity::Info => 0x0000_0000,
        }
    }

    fn from_bits(bits: u32) -> Self {
        match bits & SEVERITY_MASK {
            0x0300_0000 => Severity::Unrecoverable,
            0x0200_0000 => Severity::Error,
            0x0100_0000 => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

/// ErrorCode はネイティブ呼び出しの status
///
/// `OK` と `OK_CREATED` だけが成功扱い。それ以外は informational であっても
/// callback にはエラー値として渡されます。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(u32);

const fn make(origin: Origin, severity: Severity, code: u32) -> ErrorCode {
    ErrorCode(origin.bits() | severity.bits() | (code & CODE_MASK))
}

impl ErrorCode {
    pub const OK: ErrorCode = ErrorCode(0);
    pub const OK_CREATED: ErrorCode = make(Origin::Operation, Severity::Info, 0x0024);
    pub const UNINITIALIZED: ErrorCode = make(Origin::Input, Severity::Unrecoverable, 0xFFFF);

    pub const ALIAS_NOT_FOUND: ErrorCode = make(Origin::Operation, Severity::Warning, 0x0008);
    pub const ALIAS_ALREADY_EXISTS: ErrorCode = make(Origin::Operation, Severity::Warning, 0x0009);
    pub const OUT_OF_BOUNDS: ErrorCode = make(Origin::Input, Severity::Warning, 0x0019);
    pub const INCOMPATIBLE_TYPE: ErrorCode = make(Origin::Operation, Severity::Error, 0x0022);
    pub const CONTAINER_EMPTY: ErrorCode = make(Origin::Operation, Severity::Error, 0x0023);
    pub const ELEMENT_NOT_FOUND: ErrorCode = make(Origin::Operation, Severity::Info, 0x0025);
    pub const ELEMENT_ALREADY_EXISTS: ErrorCode = make(Origin::Operation, Severity::Info, 0x0026);
    pub const OVERFLOW: ErrorCode = make(Origin::Operation, Severity::Error, 0x0027);
    pub const UNDERFLOW: ErrorCode = make(Origin::Operation, Severity::Error, 0x0028);
    pub const TAG_ALREADY_SET: ErrorCode = make(Origin::Operation, Severity::Info, 0x0029);
    pub const TAG_NOT_SET: ErrorCode = make(Origin::Operation, Severity::Info, 0x002A);
    pub const COLUMN_NOT_FOUND: ErrorCode = make(Origin::Operation, Severity::Error, 0x002B);
    pub const QUOTA_EXCEEDED: ErrorCode = make(Origin::Operation, Severity::Error, 0x002C);
    pub const NOT_IMPLEMENTED: ErrorCode = make(Origin::Operation, Severity::Error, 0x002D);

    pub const TIMEOUT: ErrorCode = make(Origin::Connection, Severity::Error, 0x000A);
    pub const CONNECTION_REFUSED: ErrorCode = make(Origin::Connection, Severity::Unrecoverable, 0x000E);
    pub const CONNECTION_RESET: ErrorCode = make(Origin::Connection, Severity::Error, 0x000F);
    pub const NOT_CONNECTED: ErrorCode = make(Origin::Connection, Severity::Error, 0x0030);

    pub const INVALID_ARGUMENT: ErrorCode = make(Origin::Input, Severity::Error, 0x0018);
    pub const INVALID_QUERY: ErrorCode = make(Origin::Input, Severity::Error, 0x0031);
    pub const INVALID_CREDENTIALS: ErrorCode = make(Origin::Protocol, Severity::Error, 0x0032);

    pub const INTERNAL_LOCAL: ErrorCode = make(Origin::SystemLocal, Severity::Unrecoverable, 0x0002);
    pub const NO_MEMORY_LOCAL: ErrorCode = make(Origin::SystemLocal, Severity::Unrecoverable, 0x0003);
    pub const INTERNAL_REMOTE: ErrorCode = make(Origin::SystemRemote, Severity::Unrecoverable, 0x0002);
    pub const DATA_CORRUPTION: ErrorCode = make(Origin::SystemRemote, Severity::Unrecoverable, 0x001F);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// `OK` / `OK_CREATED` のみ true
    pub fn is_success(self) -> bool {
        self == Self::OK || self == Self::OK_CREATED
    }

    /// Has the native layer produced a terminal value yet?
    pub fn is_terminal(self) -> bool {
        self != Self::UNINITIALIZED
    }

    /// `None` for `OK`, which carries no origin bits.
    pub fn origin(self) -> Option<Origin> {
        Origin::from_bits(self.0)
    }

    pub fn severity(self) -> Severity {
        Severity::from_bits(self.0)
    }

    /// Low 16 bits.
    pub fn code(self) -> u16 {
        (self.0 & CODE_MASK) as u16
    }

    pub fn informational(self) -> bool {
        self.is_success() || self.severity() == Severity::Info
    }

    pub fn name(self) -> &'static str {
        KNOWN_CODES
            .iter()
            .find(|(code, _, _)| *code == self)
            .map(|(_, name, _)| *name)
            .unwrap_or("UNKNOWN")
    }

    pub fn message(self) -> &'static str {
        KNOWN_CODES
            .iter()
            .find(|(code, _, _)| *code == self)
            .map(|(_, _, message)| *message)
            .unwrap_or("Unknown error.")
    }

    /// Every named code, in declaration order.
    pub fn known() -> impl Iterator<Item = (ErrorCode, &'static str)> {
        KNOWN_CODES.iter().map(|(code, name, _)| (*code, *name))
    }
}

const KNOWN_CODES: &[(ErrorCode, &str, &str)] = &[
    (ErrorCode::OK, "OK", "Success."),
    (ErrorCode::OK_CREATED, "OK_CREATED", "Success. A new entry has been created."),
    (ErrorCode::UNINITIALIZED, "UNINITIALIZED", "Uninitialized error."),
    (ErrorCode::ALIAS_NOT_FOUND, "ALIAS_NOT_FOUND", "Entry alias/key was not found."),
    (ErrorCode::ALIAS_ALREADY_EXISTS, "ALIAS_ALREADY_EXISTS", "Entry alias/key already exists."),
    (ErrorCode::OUT_OF_BOUNDS, "OUT_OF_BOUNDS", "Index out of bounds."),
    (ErrorCode::INCOMPATIBLE_TYPE, "INCOMPATIBLE_TYPE", "Entry or column is incompatible with the operation."),
    (ErrorCode::CONTAINER_EMPTY, "CONTAINER_EMPTY", "Container is empty."),
    (ErrorCode::ELEMENT_NOT_FOUND, "ELEMENT_NOT_FOUND", "Element was not found."),
    (ErrorCode::ELEMENT_ALREADY_EXISTS, "ELEMENT_ALREADY_EXISTS", "Element already exists."),
    (ErrorCode::OVERFLOW, "OVERFLOW", "Arithmetic operation overflows."),
    (ErrorCode::UNDERFLOW, "UNDERFLOW", "Arithmetic operation underflows."),
    (ErrorCode::TAG_ALREADY_SET, "TAG_ALREADY_SET", "Tag is already set."),
    (ErrorCode::TAG_NOT_SET, "TAG_NOT_SET", "Tag is not set."),
    (ErrorCode::COLUMN_NOT_FOUND, "COLUMN_NOT_FOUND", "Column was not found."),
    (ErrorCode::QUOTA_EXCEEDED, "QUOTA_EXCEEDED", "Cluster quota has been exceeded."),
    (ErrorCode::NOT_IMPLEMENTED, "NOT_IMPLEMENTED", "Operation is not implemented."),
    (ErrorCode::TIMEOUT, "TIMEOUT", "Operation timed out."),
    (ErrorCode::CONNECTION_REFUSED, "CONNECTION_REFUSED", "Connection refused."),
    (ErrorCode::CONNECTION_RESET, "CONNECTION_RESET", "Connection was reset."),
    (ErrorCode::NOT_CONNECTED, "NOT_CONNECTED", "Cannot connect to the cluster."),
    (ErrorCode::INVALID_ARGUMENT, "INVALID_ARGUMENT", "Invalid argument."),
    (ErrorCode::INVALID_QUERY, "INVALID_QUERY", "Query is invalid."),
    (ErrorCode::INVALID_CREDENTIALS, "INVALID_CREDENTIALS", "Credentials are invalid or unreadable."),
    (ErrorCode::INTERNAL_LOCAL, "INTERNAL_LOCAL", "An unknown local error occurred."),
    (ErrorCode::NO_MEMORY_LOCAL, "NO_MEMORY_LOCAL", "Cannot allocate enough memory locally."),
    (ErrorCode::INTERNAL_REMOTE, "INTERNAL_REMOTE", "An unknown remote error occurred."),
    (ErrorCode::DATA_CORRUPTION, "DATA_CORRUPTION", "Data corruption has been detected."),
];

impl fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#010x})", self.name(), self.0)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// QdbError は callback に渡されるエラー値
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{} (code {:#06x})", .0.message(), .0.code())]
pub struct QdbError(ErrorCode);

impl QdbError {
    pub fn new(code: ErrorCode) -> Self {
        Self(code)
    }

    pub fn error_code(&self) -> ErrorCode {
        self.0
    }

    pub fn origin(&self) -> Option<Origin> {
        self.0.origin()
    }

    pub fn severity(&self) -> Severity {
        self.0.severity()
    }

    pub fn informational(&self) -> bool {
        self.0.informational()
    }

    pub fn code(&self) -> u16 {
        self.0.code()
    }

    pub fn message(&self) -> &'static str {
        self.0.message()
    }
}

impl From<ErrorCode> for QdbError {
    fn from(code: ErrorCode) -> Self {
        Self(code)
    }
}

/// BindError は引数束縛の失敗（同期エラー）
///
/// これが返った呼び出しはキューに積まれておらず、callback も呼ばれません。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("callback expected")]
    MissingCallback,

    #[error("argument {position}: {expected} expected")]
    InvalidArgument {
        position: usize,
        expected: &'static str,
    },

    #[error("argument {position}: element {index} is not a valid {expected}")]
    MalformedElement {
        position: usize,
        index: usize,
        expected: &'static str,
    },

    #[error("argument {position}: at least one {expected} expected")]
    EmptyList {
        position: usize,
        expected: &'static str,
    },

    #[error("argument {position}: unexpected extra argument")]
    UnexpectedArgument { position: usize },

    #[error("{kind} has no method '{method}'")]
    UnknownMethod { kind: String, method: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorCode::ALIAS_NOT_FOUND, Some(Origin::Operation), Severity::Warning)]
    #[case(ErrorCode::TIMEOUT, Some(Origin::Connection), Severity::Error)]
    #[case(ErrorCode::NO_MEMORY_LOCAL, Some(Origin::SystemLocal), Severity::Unrecoverable)]
    #[case(ErrorCode::INVALID_CREDENTIALS, Some(Origin::Protocol), Severity::Error)]
    #[case(ErrorCode::TAG_ALREADY_SET, Some(Origin::Operation), Severity::Info)]
    #[case(ErrorCode::OK, None, Severity::Info)]
    fn error_code_bits_decode(
        #[case] code: ErrorCode,
        #[case] origin: Option<Origin>,
        #[case] severity: Severity,
    ) {
        assert_eq!(code.origin(), origin);
        assert_eq!(code.severity(), severity);
    }

    #[test]
    fn only_ok_and_ok_created_are_success() {
        assert!(ErrorCode::OK.is_success());
        assert!(ErrorCode::OK_CREATED.is_success());
        assert!(!ErrorCode::TAG_ALREADY_SET.is_success());
        assert!(ErrorCode::TAG_ALREADY_SET.informational());
        assert!(!ErrorCode::UNINITIALIZED.is_terminal());
    }

    #[test]
    fn known_codes_are_unique() {
        let codes: Vec<u32> = ErrorCode::known().map(|(c, _)| c.raw()).collect();
        let mut dedup = codes.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(codes.len(), dedup.len());
    }

    #[test]
    fn qdb_error_exposes_code_parts() {
        let err = QdbError::new(ErrorCode::ALIAS_ALREADY_EXISTS);
        assert_eq!(err.code(), 0x0009);
        assert_eq!(err.message(), "Entry alias/key already exists.");
        assert!(err.to_string().contains("already exists"));
    }
}

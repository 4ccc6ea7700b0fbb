//! Time - ミリ秒 / timespec / 有効期限の変換

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Special expiry number meaning "never expires".
pub const NEVER_EXPIRES: i64 = 0;
/// Special expiry number meaning "keep the current expiry".
pub const PRESERVE_EXPIRATION: i64 = -1;

const NANOS_PER_MILLI: i64 = 1_000_000;
const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Timespec はネイティブ層の時刻表現（秒 + ナノ秒）
///
/// `nsec` は常に `0..1_000_000_000` に正規化されます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timespec {
    pub sec: i64,
    pub nsec: i64,
}

impl Timespec {
    pub const ZERO: Timespec = Timespec { sec: 0, nsec: 0 };

    pub fn new(sec: i64, nsec: i64) -> Self {
        let sec = sec + nsec.div_euclid(NANOS_PER_SEC);
        let nsec = nsec.rem_euclid(NANOS_PER_SEC);
        Self { sec, nsec }
    }

    pub fn from_millis(ms: i64) -> Self {
        Self::new(ms.div_euclid(1000), ms.rem_euclid(1000) * NANOS_PER_MILLI)
    }

    /// 小数ミリ秒（caller 側の number）から変換。端数はナノ秒に落とす
    pub fn from_millis_f64(ms: f64) -> Self {
        let whole = ms.floor();
        let frac_nanos = ((ms - whole) * NANOS_PER_MILLI as f64).round() as i64;
        let base = Self::from_millis(whole as i64);
        Self::new(base.sec, base.nsec + frac_nanos)
    }

    pub fn to_millis(self) -> i64 {
        self.sec * 1000 + self.nsec / NANOS_PER_MILLI
    }

    pub fn to_millis_f64(self) -> f64 {
        self.sec as f64 * 1000.0 + self.nsec as f64 / NANOS_PER_MILLI as f64
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.sec, self.nsec as u32)
    }
}

impl From<DateTime<Utc>> for Timespec {
    fn from(at: DateTime<Utc>) -> Self {
        Self::new(at.timestamp(), i64::from(at.timestamp_subsec_nanos()))
    }
}

/// TsRange は半開区間 `[begin, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TsRange {
    pub begin: Timespec,
    pub end: Timespec,
}

impl TsRange {
    pub fn new(begin: Timespec, end: Timespec) -> Self {
        Self { begin, end }
    }

    pub fn contains(&self, ts: Timespec) -> bool {
        self.begin <= ts && ts < self.end
    }
}

/// Expiry は put/update/expiresAt の有効期限指定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expiry {
    Never,
    Preserve,
    At(DateTime<Utc>),
}

impl Expiry {
    /// caller 側の特殊数値 (`NEVER_EXPIRES` / `PRESERVE_EXPIRATION`) を解釈
    pub fn from_special(value: i64) -> Option<Self> {
        match value {
            NEVER_EXPIRES => Some(Expiry::Never),
            PRESERVE_EXPIRATION => Some(Expiry::Preserve),
            _ => None,
        }
    }

    /// 絶対時刻。`Never` / `Preserve` は `None`
    pub fn deadline(self) -> Option<DateTime<Utc>> {
        match self {
            Expiry::At(at) => Some(at),
            Expiry::Never | Expiry::Preserve => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(0, Timespec { sec: 0, nsec: 0 })]
    #[case(1_500, Timespec { sec: 1, nsec: 500_000_000 })]
    #[case(-1, Timespec { sec: -1, nsec: 999_000_000 })]
    fn millis_convert_to_normalized_timespec(#[case] ms: i64, #[case] expected: Timespec) {
        let ts = Timespec::from_millis(ms);
        assert_eq!(ts, expected);
        assert_eq!(ts.to_millis(), ms);
    }

    #[test]
    fn fractional_millis_keep_nanoseconds() {
        let ts = Timespec::from_millis_f64(1000.25);
        assert_eq!(ts, Timespec { sec: 1, nsec: 250_000 });
    }

    #[test]
    fn datetime_round_trips_through_timespec() {
        let at = Utc.with_ymd_and_hms(2030, 5, 1, 8, 30, 0).unwrap();
        assert_eq!(Timespec::from(at).to_datetime(), Some(at));
    }

    #[test]
    fn range_is_half_open() {
        let range = TsRange::new(Timespec::from_millis(10), Timespec::from_millis(20));
        assert!(range.contains(Timespec::from_millis(10)));
        assert!(!range.contains(Timespec::from_millis(20)));
    }

    #[test]
    fn special_expiry_numbers() {
        assert_eq!(Expiry::from_special(NEVER_EXPIRES), Some(Expiry::Never));
        assert_eq!(Expiry::from_special(PRESERVE_EXPIRATION), Some(Expiry::Preserve));
        assert_eq!(Expiry::from_special(42), None);
    }
}

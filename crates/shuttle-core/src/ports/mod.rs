//! Ports - 抽象化レイヤー
//!
//! 外部の協力者（ネイティブのクライアントライブラリ、時計、ID 生成）への
//! インターフェースを trait で定義し、実装の詳細を隠蔽します。

pub mod clock;
pub mod id_generator;
pub mod native;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::native::{Credentials, NativeConnector, NativeSession};

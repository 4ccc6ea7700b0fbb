//! Domain model (error codes, values, task descriptors, series types, ...).

pub mod buffer;
pub mod errors;
pub mod ids;
pub mod metadata;
pub mod query;
pub mod series;
pub mod state;
pub mod task;
pub mod time;
pub mod value;

pub use buffer::{NativeArray, NativeBuffer, ReleaseHook};
pub use errors::{BindError, ErrorCode, Origin, QdbError, Severity};
pub use ids::{ConnectionId, TaskId};
pub use metadata::{EntryMetadata, EntryReference, EntryType};
pub use query::{QueryCell, QueryResult, QueryTable};
pub use series::{
    Aggregation, AggregationResult, AggregationType, ColumnInfo, ColumnType, Point, PointValue,
};
pub use state::{TaskState, WorkerStatus};
pub use task::{Input, Output};
pub use time::{Expiry, NEVER_EXPIRES, PRESERVE_EXPIRATION, Timespec, TsRange};
pub use value::{Callback, Value};

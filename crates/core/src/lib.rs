pub mod cache;
pub mod config;
pub mod error;
pub mod host;
pub mod http;
pub mod lookup;
pub mod metadata;
pub mod rank;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::host::{AbortSignal, LogSink, ResultQueue, ResultSink, SourceResult, TracingLog};
    pub use crate::lookup::bokelai::Bokelai;
    pub use crate::lookup::{IdentifyQuery, LookupContext, MetadataSource};
    pub use crate::metadata::*;
}

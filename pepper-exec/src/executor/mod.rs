pub mod events;
pub mod globals;
pub mod http;
mod leaf_runner;
mod request;
mod result;
mod scheduler;
mod types;

pub use events::{
    CompositeEventSink, Event, EventSink, JsonEventSink, NoOpEventSink, TracingEventSink,
};
pub use globals::{Globals, GlobalsGuard};
pub use http::{HttpClient, HttpError, HttpRequestParts, HttpResponseParts, ReqwestHttpClient};
pub use result::{ExecutionError, LeafError};
pub use scheduler::Runner;
pub use types::{FailureInfo, LeafRecord, LeafStage, LeafStatus, RunReport, RunnerConfig};

pub mod backend_source;
pub mod backoff;
pub mod command_dispatcher;
pub mod config_source;
pub mod filter;
pub mod http;
pub mod reconciler;
pub mod runtime_source;
pub mod stats;

pub use backend_source::BackendClusterSource;
pub use backoff::Backoff;
pub use command_dispatcher::{CommandDispatcher, HttpCommandDispatcher};
pub use config_source::{ConfigSource, ParameterStoreSource};
pub use runtime_source::{ControlPlaneSource, RuntimeSource};

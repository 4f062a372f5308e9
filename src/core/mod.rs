pub mod config;
pub mod date_key;
pub mod detector;
pub mod host;
pub mod lifecycle;
pub mod oplog;
pub mod persistence;
pub mod proxy;
pub mod session;
pub mod store;

pub use host::WidgetHost;
pub use lifecycle::{Analytics, Tracker};
pub use oplog::{OperatorLog, OperatorRecord};
pub use proxy::{Interaction, Interceptor, InterceptorTable, Observation};
pub use session::{SessionContext, TrackingState};
pub use store::SharedAggregate;

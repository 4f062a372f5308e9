pub mod aggregate;
pub mod day_bucket;
pub mod settings;
pub mod value;
pub mod widget;

pub use aggregate::{Aggregate, Document};
pub use day_bucket::DayBucket;
pub use settings::{
    RemoteBackend, RemoteSettings, Settings, StorageSettings, DEFAULT_COLLECTION,
    DEFAULT_DOCUMENT_ID,
};
pub use value::WidgetValue;
pub use widget::{replace_empty, OperationKind, WidgetKey, WidgetShape, WidgetStat, EMPTY_SENTINEL};

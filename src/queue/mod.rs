//! Persistent queue: store collaborator (spec §4.3) and the Queue Manager
//! drain loop (spec §4.4).

pub mod file_store;
pub mod manager;
pub mod memory_store;
pub mod store;

pub use file_store::JsonFileQueueStore;
pub use manager::{QueueEventSink, QueueManager, TracingEventSink, DEFAULT_RETRY_TIMEOUT, DRAIN_INTERVAL};
pub use memory_store::InMemoryQueueStore;
pub use store::QueueStore;

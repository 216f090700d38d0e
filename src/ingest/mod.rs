pub mod pipeline;
pub mod store;

pub use pipeline::{device_from_topic, IngestReport, IngestStatus, Ingestor, UplinkSource};
pub use store::{InsertOutcome, MemoryStore, ParseErrorRecord, UplinkStore};

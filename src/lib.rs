//! Decoder and ingestion pipeline for Milesight EM400 ultrasonic level
//! sensor uplinks.
//!
//! Uplinks arrive as raw bytes from the message bus or as hex/base64 text
//! over HTTP. [`uplink`] normalizes them, walks the TLV fields and hashes
//! the canonical form; [`ingest`] ties those steps to a store.

pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod replay;
pub mod uplink;
pub mod utils;

pub use config::IngestConfig;
pub use error::{ConfigError, IngestError, NormalizeError, StoreError};
pub use ingest::{IngestReport, IngestStatus, Ingestor, MemoryStore, UplinkSource, UplinkStore};
pub use models::{
    CanonicalHex, DecodeOutcome, DecodedReading, PayloadDigest, Position, RawPayload,
    UnknownField, UplinkRecord,
};
pub use uplink::{decode, hash_payload, normalize, TlvDecoder};

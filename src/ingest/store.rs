/// Storage interface for decoded uplinks
use std::collections::HashSet;

use crate::error::StoreError;
use crate::models::{PayloadDigest, UplinkRecord};

/// A payload that could not be normalized, kept for protocol debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseErrorRecord {
    pub device_sn: Option<String>,
    pub raw_payload: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record with the same digest was already stored.
    Duplicate,
}

/// Persistence seam for the ingestion pipeline.
///
/// Production stores live outside this crate. Implementations decide
/// duplicates by the record digest so redelivered uplinks are stored once.
pub trait UplinkStore {
    fn device_exists(&self, sn: &str) -> Result<bool, StoreError>;

    fn insert_reading(&mut self, record: UplinkRecord) -> Result<InsertOutcome, StoreError>;

    /// Keep a rejected payload. `sn` comes from the topic when known.
    fn record_parse_error(
        &mut self,
        sn: Option<&str>,
        raw: &str,
        message: &str,
    ) -> Result<(), StoreError>;
}

/// In-process store used by the replay tool and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    devices: HashSet<String>,
    digests: HashSet<PayloadDigest>,
    records: Vec<UplinkRecord>,
    parse_errors: Vec<ParseErrorRecord>,
}

impl MemoryStore {
    /// A store that accepts uplinks from any device.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that only accepts the given serial numbers. An empty set
    /// accepts every device.
    pub fn with_devices<I, T>(devices: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        MemoryStore {
            devices: devices.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Stored records in arrival order.
    pub fn records(&self) -> &[UplinkRecord] {
        &self.records
    }

    pub fn parse_errors(&self) -> &[ParseErrorRecord] {
        &self.parse_errors
    }
}

impl UplinkStore for MemoryStore {
    fn device_exists(&self, sn: &str) -> Result<bool, StoreError> {
        Ok(self.devices.is_empty() || self.devices.contains(sn))
    }

    fn insert_reading(&mut self, record: UplinkRecord) -> Result<InsertOutcome, StoreError> {
        if !self.digests.insert(record.digest.clone()) {
            return Ok(InsertOutcome::Duplicate);
        }
        self.records.push(record);
        Ok(InsertOutcome::Inserted)
    }

    fn record_parse_error(
        &mut self,
        sn: Option<&str>,
        raw: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        self.parse_errors.push(ParseErrorRecord {
            device_sn: sn.map(str::to_string),
            raw_payload: raw.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

/// Ingestion of single uplinks from the message bus or HTTP
use log::{debug, warn};
use serde::Serialize;
use time::OffsetDateTime;

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::ingest::store::{InsertOutcome, UplinkStore};
use crate::models::{DecodeOutcome, PayloadDigest, RawPayload, UplinkRecord};
use crate::uplink::{hash_canonical, normalize, TlvDecoder};

/// Where an uplink came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UplinkSource {
    Mqtt { topic: String },
    Http,
}

impl UplinkSource {
    pub fn label(&self) -> &'static str {
        match self {
            UplinkSource::Mqtt { .. } => "mqtt",
            UplinkSource::Http => "http",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Stored,
    Duplicate,
    /// The device is not registered with the store.
    UnknownDevice,
    /// Neither the payload nor the source named a device.
    Anonymous,
}

/// What happened to one uplink.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub device_sn: Option<String>,
    pub digest: PayloadDigest,
    pub outcome: DecodeOutcome,
    pub status: IngestStatus,
    pub received_at: OffsetDateTime,
}

/// Extract the serial number from a `<prefix>/<sn>/uplink` topic.
pub fn device_from_topic<'a>(topic: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = topic.strip_prefix(prefix)?.strip_prefix('/')?;
    let sn = rest.strip_suffix("/uplink")?;
    if sn.is_empty() || sn.contains('/') {
        return None;
    }
    Some(sn)
}

/// Runs normalize, hash and decode for each uplink and hands the result to
/// a store.
pub struct Ingestor<S> {
    decoder: TlvDecoder,
    topic_prefix: String,
    store: S,
}

impl<S: UplinkStore> Ingestor<S> {
    pub fn new(config: &IngestConfig, store: S) -> Self {
        Ingestor {
            decoder: TlvDecoder::new(config.tag_table.clone()),
            topic_prefix: config.topic_prefix.clone(),
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn topic_device<'a>(&self, source: &'a UplinkSource) -> Option<&'a str> {
        match source {
            UplinkSource::Mqtt { topic } => device_from_topic(topic, &self.topic_prefix),
            UplinkSource::Http => None,
        }
    }

    /// Ingest one uplink.
    ///
    /// The device is named by the decoded serial number, falling back to the
    /// topic for message-bus deliveries. Truncated outcomes are still stored
    /// since the fields decoded before the stop are valid.
    ///
    /// # Returns
    /// The ingestion report, or an error when the payload is not a supported
    /// encoding or the store fails
    pub fn ingest(
        &mut self,
        source: &UplinkSource,
        payload: RawPayload<'_>,
    ) -> Result<IngestReport, IngestError> {
        let received_at = OffsetDateTime::now_utc();
        let hex = match normalize(payload) {
            Ok(hex) => hex,
            Err(e) => {
                let sn = self.topic_device(source);
                warn!("Payload from {} rejected: {}", sn.unwrap_or("unknown device"), e);
                let raw = match payload {
                    RawPayload::Text(text) => text.to_string(),
                    RawPayload::Bytes(bytes) => hex::encode(bytes),
                };
                self.store.record_parse_error(sn, &raw, &e.to_string())?;
                return Err(e.into());
            }
        };
        let digest = hash_canonical(&hex);
        let outcome = self.decoder.decode(&hex);

        if outcome.truncated {
            warn!(
                "Uplink {} decoded partially ({} of {} bytes), possible protocol table gap: {:?}",
                digest,
                outcome.consumed,
                hex.bytes().len(),
                outcome.unknown.last()
            );
        }

        let device_sn = outcome
            .reading
            .serial_number
            .clone()
            .or_else(|| self.topic_device(source).map(str::to_string));

        let Some(sn) = device_sn else {
            warn!("Uplink {} carries no device identity, ignored", digest);
            return Ok(IngestReport {
                device_sn: None,
                digest,
                outcome,
                status: IngestStatus::Anonymous,
                received_at,
            });
        };

        if !self.store.device_exists(&sn)? {
            warn!("Unregistered device payload ignored: {}", sn);
            return Ok(IngestReport {
                device_sn: Some(sn),
                digest,
                outcome,
                status: IngestStatus::UnknownDevice,
                received_at,
            });
        }

        let record = UplinkRecord {
            device_sn: sn.clone(),
            digest: digest.clone(),
            outcome: outcome.clone(),
            source: source.label(),
            received_at,
        };

        let status = match self.store.insert_reading(record)? {
            InsertOutcome::Inserted => {
                debug!("Stored uplink {} for device {}", digest, sn);
                IngestStatus::Stored
            }
            InsertOutcome::Duplicate => {
                debug!("Duplicate uplink {} for device {}", digest, sn);
                IngestStatus::Duplicate
            }
        };

        Ok(IngestReport {
            device_sn: Some(sn),
            digest,
            outcome,
            status,
            received_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NormalizeError, StoreError};
    use crate::ingest::store::MemoryStore;

    const FULL: &str = "ff1601020304050607080175640367fd000482d204050000";

    fn mqtt(topic: &str) -> UplinkSource {
        UplinkSource::Mqtt {
            topic: topic.to_string(),
        }
    }

    fn ingestor(devices: &[&str]) -> Ingestor<MemoryStore> {
        Ingestor::new(
            &IngestConfig::default(),
            MemoryStore::with_devices(devices.iter().copied()),
        )
    }

    #[test]
    fn test_device_from_topic() {
        assert_eq!(
            device_from_topic("sensors/bin/abc123/uplink", "sensors/bin"),
            Some("abc123")
        );
        assert_eq!(device_from_topic("sensors/bin/abc123/status", "sensors/bin"), None);
        assert_eq!(device_from_topic("sensors/bin//uplink", "sensors/bin"), None);
        assert_eq!(device_from_topic("sensors/bin/a/b/uplink", "sensors/bin"), None);
        assert_eq!(device_from_topic("other/abc123/uplink", "sensors/bin"), None);
        assert_eq!(device_from_topic("sensors/binx/abc/uplink", "sensors/bin"), None);
    }

    #[test]
    fn test_stores_then_rejects_redelivery() {
        let mut ingestor = ingestor(&[]);
        let first = ingestor.ingest(&UplinkSource::Http, FULL.into()).unwrap();
        assert_eq!(first.status, IngestStatus::Stored);
        assert_eq!(first.device_sn.as_deref(), Some("0102030405060708"));

        // same uplink as raw bytes over the bus
        let bytes = hex::decode(FULL).unwrap();
        let second = ingestor
            .ingest(&mqtt("sensors/bin/0102030405060708/uplink"), RawPayload::Bytes(&bytes))
            .unwrap();
        assert_eq!(second.status, IngestStatus::Duplicate);
        assert_eq!(second.digest, first.digest);

        let records = ingestor.store().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, "http");
        assert_eq!(records[0].outcome.reading.battery_percent, Some(100));
    }

    #[test]
    fn test_topic_names_device_without_serial() {
        let mut ingestor = ingestor(&[]);
        let report = ingestor
            .ingest(&mqtt("sensors/bin/bin-42/uplink"), "017564".into())
            .unwrap();
        assert_eq!(report.device_sn.as_deref(), Some("bin-42"));
        assert_eq!(report.status, IngestStatus::Stored);
        assert_eq!(ingestor.store().records()[0].source, "mqtt");
    }

    #[test]
    fn test_serial_number_wins_over_topic() {
        let mut ingestor = ingestor(&[]);
        let report = ingestor
            .ingest(&mqtt("sensors/bin/bin-42/uplink"), "ff160102030405060708".into())
            .unwrap();
        assert_eq!(report.device_sn.as_deref(), Some("0102030405060708"));
    }

    #[test]
    fn test_anonymous_uplink_is_not_stored() {
        let mut ingestor = ingestor(&[]);
        let report = ingestor.ingest(&UplinkSource::Http, "017564".into()).unwrap();
        assert_eq!(report.status, IngestStatus::Anonymous);
        assert_eq!(report.outcome.reading.battery_percent, Some(100));
        assert!(ingestor.store().records().is_empty());
    }

    #[test]
    fn test_unregistered_device() {
        let mut ingestor = ingestor(&["a1b2c3d4e5f60718"]);
        let report = ingestor.ingest(&UplinkSource::Http, FULL.into()).unwrap();
        assert_eq!(report.status, IngestStatus::UnknownDevice);
        assert_eq!(report.device_sn.as_deref(), Some("0102030405060708"));
        assert!(ingestor.into_store().records().is_empty());
    }

    #[test]
    fn test_truncated_uplink_is_still_stored() {
        let mut ingestor = ingestor(&[]);
        let report = ingestor
            .ingest(&UplinkSource::Http, "ff1601020304050607080175649999".into())
            .unwrap();
        assert!(report.outcome.truncated);
        assert_eq!(report.status, IngestStatus::Stored);
    }

    #[test]
    fn test_unsupported_payload_is_rejected() {
        let mut ingestor = ingestor(&[]);
        let err = ingestor
            .ingest(&UplinkSource::Http, "not hex!".into())
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Normalize(NormalizeError::UnsupportedFormat)
        ));
        assert!(ingestor.store().records().is_empty());
    }

    #[test]
    fn test_rejected_payload_is_recorded() {
        let mut ingestor = ingestor(&[]);
        let err = ingestor
            .ingest(&mqtt("sensors/bin/bin-42/uplink"), "0x017".into())
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Normalize(NormalizeError::OddLengthHex { length: 3 })
        ));

        ingestor
            .ingest(&UplinkSource::Http, "not hex!".into())
            .unwrap_err();

        let errors = ingestor.store().parse_errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].device_sn.as_deref(), Some("bin-42"));
        assert_eq!(errors[0].raw_payload, "0x017");
        assert_eq!(errors[0].message, err.to_string());
        assert_eq!(errors[1].device_sn, None);
        assert_eq!(errors[1].raw_payload, "not hex!");
        assert_eq!(errors[1].message, "Unsupported payload format");
        assert!(ingestor.store().records().is_empty());
    }

    struct FailingStore;

    impl UplinkStore for FailingStore {
        fn device_exists(&self, _sn: &str) -> Result<bool, StoreError> {
            Ok(true)
        }

        fn insert_reading(&mut self, _record: UplinkRecord) -> Result<InsertOutcome, StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }

        fn record_parse_error(
            &mut self,
            _sn: Option<&str>,
            _raw: &str,
            _message: &str,
        ) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }
    }

    #[test]
    fn test_store_errors_propagate() {
        let mut ingestor = Ingestor::new(&IngestConfig::default(), FailingStore);
        let err = ingestor.ingest(&UplinkSource::Http, FULL.into()).unwrap_err();
        assert!(matches!(err, IngestError::Store(StoreError::Backend(_))));
    }
}

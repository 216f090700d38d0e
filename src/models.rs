use serde::Serialize;
use std::fmt;
use time::OffsetDateTime;

/// An uplink body as delivered by a transport, before normalization.
///
/// Message-bus deliveries and JSON integer arrays arrive as `Bytes`; the HTTP
/// endpoint hands over a hex (optionally `0x` prefixed) or base64 `Text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawPayload<'a> {
    Bytes(&'a [u8]),
    Text(&'a str),
}

impl<'a> From<&'a [u8]> for RawPayload<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        RawPayload::Bytes(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for RawPayload<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        RawPayload::Bytes(bytes.as_slice())
    }
}

impl<'a> From<&'a str> for RawPayload<'a> {
    fn from(text: &'a str) -> Self {
        RawPayload::Text(text)
    }
}

/// Lowercase, even-length hex rendering of an uplink.
///
/// Only the normalizer constructs values of this type, so every instance
/// holds `[0-9a-f]` digits and an even length. The decoded bytes are kept
/// next to the text so the decoder never re-parses digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalHex {
    hex: String,
    bytes: Vec<u8>,
}

impl CanonicalHex {
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Self {
        CanonicalHex {
            hex: hex::encode(&bytes),
            bytes,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// Decoded uplink bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length in hex digits.
    pub fn len(&self) -> usize {
        self.hex.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hex.is_empty()
    }
}

impl fmt::Display for CanonicalHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

/// Tilt switch state reported on channel 05.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Normal,
    Tilt,
}

impl Position {
    pub fn from_raw(raw: u8) -> Self {
        if raw == 0 {
            Position::Normal
        } else {
            Position::Tilt
        }
    }
}

/// Sensor fields recognized in one uplink.
///
/// Values are copied from the wire without range checks. The two distance
/// fields are private so they can only be set together.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecodedReading {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_percent: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_alarm: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance_mm: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_alarm: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl DecodedReading {
    /// Record a distance in millimetres and derive centimetres from it.
    pub fn set_distance_mm(&mut self, mm: u16) {
        self.distance_mm = Some(mm);
        self.distance_cm = Some(f64::from(mm) / 10.0);
    }

    pub fn distance_mm(&self) -> Option<u16> {
        self.distance_mm
    }

    pub fn distance_cm(&self) -> Option<f64> {
        self.distance_cm
    }

    /// True when no sensor field was decoded.
    pub fn is_empty(&self) -> bool {
        *self == DecodedReading::default()
    }
}

/// A field whose tag is not decoded into [`DecodedReading`].
///
/// `length` is zero and `raw_hex` empty when the tag's length is unknown,
/// which is also the point where decoding stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownField {
    #[serde(serialize_with = "serialize_hex_byte")]
    pub channel: u8,
    #[serde(rename = "type", serialize_with = "serialize_hex_byte")]
    pub field_type: u8,
    pub length: usize,
    pub raw_hex: String,
}

fn serialize_hex_byte<S>(value: &u8, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format!("{:02x}", value))
}

/// Result of walking one canonical payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecodeOutcome {
    pub reading: DecodedReading,
    pub unknown: Vec<UnknownField>,
    /// Decoding stopped before the end of the buffer.
    pub truncated: bool,
    /// Bytes consumed by the walk.
    pub consumed: usize,
}

/// SHA-256 of a payload's canonical hex, rendered as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PayloadDigest(pub(crate) String);

impl PayloadDigest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PayloadDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decoded uplink ready to be handed to a store.
#[derive(Debug, Clone, PartialEq)]
pub struct UplinkRecord {
    pub device_sn: String,
    pub digest: PayloadDigest,
    pub outcome: DecodeOutcome,
    pub source: &'static str,
    pub received_at: OffsetDateTime,
}

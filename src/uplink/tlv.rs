/// TLV walk over canonical EM400 uplinks
///
/// Wire layout, repeated until the buffer ends:
/// - Byte 0: channel
/// - Byte 1: type
/// - Bytes 2..: value, length decided by the (channel, type) pair
///
/// Sensor fields land in a [`DecodedReading`]. Tags with a known length but
/// no modelled meaning are captured as [`UnknownField`]s and skipped, so
/// newer firmware fields do not break older decoders. A tag with no known
/// length, or a value running past the end of the buffer, stops the walk
/// and marks the outcome truncated. Nothing here panics or reads out of
/// bounds on any input.
use log::debug;

use crate::models::{CanonicalHex, DecodeOutcome, DecodedReading, Position, UnknownField};
use crate::uplink::tables::{FieldRule, KnownField, Tag, TagTable};

/// Unsigned 16-bit value from two wire bytes, least significant first.
pub fn u16_le(lo: u8, hi: u8) -> u16 {
    u16::from_le_bytes([lo, hi])
}

/// Signed 16-bit value from two wire bytes, least significant first.
pub fn i16_le(lo: u8, hi: u8) -> i16 {
    i16::from_le_bytes([lo, hi])
}

/// Stateless decoder over a tag table.
#[derive(Debug, Clone, Default)]
pub struct TlvDecoder {
    table: TagTable,
}

impl TlvDecoder {
    pub fn new(table: TagTable) -> Self {
        TlvDecoder { table }
    }

    pub fn table(&self) -> &TagTable {
        &self.table
    }

    /// Walk a canonical payload and collect every field that can be read.
    ///
    /// Never fails: malformed or unknown input degrades to a truncated
    /// outcome holding whatever was decoded before the stop.
    pub fn decode(&self, hex: &CanonicalHex) -> DecodeOutcome {
        let data = hex.bytes();
        let mut outcome = DecodeOutcome::default();
        let mut cursor = 0;

        while cursor + 2 <= data.len() {
            let tag = Tag::new(data[cursor], data[cursor + 1]);
            let value_start = cursor + 2;

            let rule = match self.table.rule(tag) {
                Some(rule) => rule,
                None => {
                    debug!("Unmeasurable tag {} at byte {}, stopping", tag, cursor);
                    outcome.unknown.push(UnknownField {
                        channel: tag.channel,
                        field_type: tag.field_type,
                        length: 0,
                        raw_hex: String::new(),
                    });
                    outcome.truncated = true;
                    break;
                }
            };

            let length = match rule {
                FieldRule::Known(field) => field.value_len(),
                FieldRule::Opaque(length) => length,
            };

            let value = match value_start
                .checked_add(length)
                .and_then(|end| data.get(value_start..end))
            {
                Some(value) => value,
                None => {
                    debug!(
                        "Tag {} at byte {} needs {} bytes, only {} left",
                        tag,
                        cursor,
                        length,
                        data.len() - value_start
                    );
                    outcome.truncated = true;
                    break;
                }
            };

            match rule {
                FieldRule::Known(field) => apply_field(field, value, &mut outcome.reading),
                FieldRule::Opaque(_) => {
                    debug!("Skipping opaque tag {} ({} bytes)", tag, length);
                    outcome.unknown.push(UnknownField {
                        channel: tag.channel,
                        field_type: tag.field_type,
                        length,
                        raw_hex: hex::encode(value),
                    });
                }
            }

            cursor = value_start + length;
        }

        // A lone trailing byte cannot hold a tag
        if !outcome.truncated && cursor < data.len() {
            debug!("Dangling byte at {} after last field", cursor);
            outcome.truncated = true;
        }

        outcome.consumed = cursor;
        outcome
    }
}

/// Decode with the default tag table.
pub fn decode(hex: &CanonicalHex) -> DecodeOutcome {
    TlvDecoder::default().decode(hex)
}

// `value` always holds exactly `field.value_len()` bytes.
fn apply_field(field: KnownField, value: &[u8], reading: &mut DecodedReading) {
    match field {
        KnownField::SerialNumber => {
            reading.serial_number = Some(hex::encode(value));
        }
        KnownField::Battery => {
            reading.battery_percent = Some(value[0]);
        }
        KnownField::Temperature => {
            reading.temperature_c = Some(decicelsius(value[0], value[1]));
        }
        KnownField::TemperatureWithAlarm => {
            reading.temperature_c = Some(decicelsius(value[0], value[1]));
            reading.temperature_alarm = Some(value[2]);
        }
        KnownField::Distance => {
            reading.set_distance_mm(u16_le(value[0], value[1]));
        }
        KnownField::DistanceWithAlarm => {
            reading.set_distance_mm(u16_le(value[0], value[1]));
            reading.distance_alarm = Some(value[2]);
        }
        KnownField::Position => {
            reading.position = Some(Position::from_raw(value[0]));
        }
    }
}

fn decicelsius(lo: u8, hi: u8) -> f64 {
    f64::from(i16_le(lo, hi)) / 10.0
}

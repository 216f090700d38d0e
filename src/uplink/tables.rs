/// Tag tables for the EM400 TLV format
///
/// Each field on the wire starts with a channel byte and a type byte. The
/// pair decides how many value bytes follow. Two independent tables live
/// here: the sensor fields we decode, and tags whose length is known but
/// whose meaning is not modelled.
use std::collections::HashMap;
use std::fmt;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    pub channel: u8,
    pub field_type: u8,
}

impl Tag {
    pub const fn new(channel: u8, field_type: u8) -> Self {
        Tag {
            channel,
            field_type,
        }
    }

    /// Parse a tag written as `fe02` or `FE/02`.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let digits: String = text.trim().chars().filter(|c| *c != '/').collect();
        if digits.len() != 4 {
            return Err(ConfigError::InvalidTag(text.to_string()));
        }
        match hex::decode(&digits) {
            Ok(bytes) => Ok(Tag::new(bytes[0], bytes[1])),
            Err(_) => Err(ConfigError::InvalidTag(text.to_string())),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}", self.channel, self.field_type)
    }
}

/// Sensor fields decoded into a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownField {
    /// FF/16: 8 raw identifier bytes
    SerialNumber,
    /// 01/75: u8 percent
    Battery,
    /// 03/67: i16 LE, tenths of a degree
    Temperature,
    /// 83/67: temperature followed by an alarm byte
    TemperatureWithAlarm,
    /// 04/82: u16 LE millimetres
    Distance,
    /// 84/82: distance followed by an alarm byte
    DistanceWithAlarm,
    /// 05/00: u8, zero is normal
    Position,
}

impl KnownField {
    /// Number of value bytes after the tag.
    pub const fn value_len(self) -> usize {
        match self {
            KnownField::SerialNumber => 8,
            KnownField::Battery | KnownField::Position => 1,
            KnownField::Temperature | KnownField::Distance => 2,
            KnownField::TemperatureWithAlarm | KnownField::DistanceWithAlarm => 3,
        }
    }
}

pub const KNOWN_FIELDS: &[(Tag, KnownField)] = &[
    (Tag::new(0xff, 0x16), KnownField::SerialNumber),
    (Tag::new(0x01, 0x75), KnownField::Battery),
    (Tag::new(0x03, 0x67), KnownField::Temperature),
    (Tag::new(0x83, 0x67), KnownField::TemperatureWithAlarm),
    (Tag::new(0x04, 0x82), KnownField::Distance),
    (Tag::new(0x84, 0x82), KnownField::DistanceWithAlarm),
    (Tag::new(0x05, 0x00), KnownField::Position),
];

/// Device status and downlink acknowledgement tags that are skipped but
/// reported. The FE/xx lengths come from observed captures and may be
/// corrected through configuration.
pub const OPAQUE_TAG_LENGTHS: &[(Tag, usize)] = &[
    (Tag::new(0xff, 0x01), 1),
    (Tag::new(0xff, 0x09), 2),
    (Tag::new(0xff, 0x0a), 2),
    (Tag::new(0xff, 0xff), 2),
    (Tag::new(0xff, 0x0f), 1),
    (Tag::new(0xff, 0x0b), 1),
    (Tag::new(0xff, 0xfe), 1),
    (Tag::new(0xfe, 0x02), 2),
    (Tag::new(0xfe, 0x03), 2),
    (Tag::new(0xfe, 0x10), 1),
    (Tag::new(0xfe, 0x13), 1),
    (Tag::new(0xfe, 0x1c), 2),
    (Tag::new(0xfe, 0x28), 1),
    (Tag::new(0xfe, 0x3e), 1),
    (Tag::new(0xfe, 0x4a), 1),
    (Tag::new(0xfe, 0x56), 1),
    (Tag::new(0xfe, 0x70), 2),
    (Tag::new(0xfe, 0x71), 1),
    (Tag::new(0xfe, 0x77), 2),
];

/// How the decoder treats one tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    Known(KnownField),
    /// Length known, value reported as an unknown field.
    Opaque(usize),
}

pub fn known_field(tag: Tag) -> Option<KnownField> {
    KNOWN_FIELDS
        .iter()
        .find(|(known, _)| *known == tag)
        .map(|(_, field)| *field)
}

/// Lookup used by the decoder: the fixed sensor fields plus an extendable
/// table of opaque lengths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagTable {
    opaque: HashMap<Tag, usize>,
}

impl Default for TagTable {
    fn default() -> Self {
        TagTable {
            opaque: OPAQUE_TAG_LENGTHS.iter().copied().collect(),
        }
    }
}

impl TagTable {
    /// Add or replace an opaque tag length. Returns the previous length.
    ///
    /// Sensor field tags cannot be shadowed.
    pub fn insert_opaque(&mut self, tag: Tag, length: usize) -> Result<Option<usize>, ConfigError> {
        if known_field(tag).is_some() {
            return Err(ConfigError::ReservedTag(tag.to_string()));
        }
        Ok(self.opaque.insert(tag, length))
    }

    pub fn with_opaque(mut self, tag: Tag, length: usize) -> Result<Self, ConfigError> {
        self.insert_opaque(tag, length)?;
        Ok(self)
    }

    pub fn opaque_len(&self, tag: Tag) -> Option<usize> {
        self.opaque.get(&tag).copied()
    }

    pub fn rule(&self, tag: Tag) -> Option<FieldRule> {
        known_field(tag)
            .map(FieldRule::Known)
            .or_else(|| self.opaque_len(tag).map(FieldRule::Opaque))
    }
}

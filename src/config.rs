use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::env;

use crate::error::ConfigError;
use crate::uplink::tables::{Tag, TagTable};

pub const DEFAULT_TOPIC_PREFIX: &str = "sensors/bin";

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Uplink topics look like `<prefix>/<sn>/uplink`.
    pub topic_prefix: String,
    /// Registered serial numbers. Empty accepts every device.
    pub devices: HashSet<String>,
    pub tag_table: TagTable,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            devices: HashSet::new(),
            tag_table: TagTable::default(),
        }
    }
}

impl IngestConfig {
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();
        Self::from_vars(env::vars())
    }

    /// Build the configuration from `(name, value)` pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let mut config = IngestConfig::default();

        if let Some(prefix) = vars.get("EM400_TOPIC_PREFIX") {
            let prefix = prefix.trim().trim_end_matches('/');
            if !prefix.is_empty() {
                config.topic_prefix = prefix.to_string();
            }
        }

        // Try EM400_DEVICES format first
        if let Some(devices) = vars.get("EM400_DEVICES") {
            debug!("Found EM400_DEVICES: '{}'", devices);
            config.devices = devices
                .split(',')
                .map(str::trim)
                .filter(|sn| !sn.is_empty())
                .map(str::to_string)
                .collect();
        } else {
            // Fallback to individual environment variables
            for (key, value) in &vars {
                let is_device_key = key
                    .strip_prefix("EM400_DEVICE_")
                    .and_then(|s| s.strip_suffix("_SN"))
                    .is_some();
                let sn = value.trim();
                if is_device_key && !sn.is_empty() {
                    config.devices.insert(sn.to_string());
                }
            }
        }

        if let Some(entries) = vars.get("EM400_OPAQUE_TAGS") {
            for entry in entries.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                let (tag, length) = parse_opaque_entry(entry)?;
                if let Some(previous) = config.tag_table.insert_opaque(tag, length)? {
                    info!("Tag {} length changed from {} to {}", tag, previous, length);
                }
            }
        }

        if config.devices.is_empty() {
            info!("No registered devices configured, accepting every device");
        } else {
            info!("Total devices registered: {}", config.devices.len());
        }

        Ok(config)
    }
}

/// Parse one `cctt=len` entry.
///
/// Zero is rejected: a zero-length unknown field marks the point where
/// decoding stopped on a tag of unknown length.
fn parse_opaque_entry(entry: &str) -> Result<(Tag, usize), ConfigError> {
    let (tag, length) = entry
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidTag(entry.to_string()))?;
    let tag = Tag::parse(tag)?;
    let invalid_length = || ConfigError::InvalidLength {
        tag: tag.to_string(),
        value: length.trim().to_string(),
    };
    let length = length
        .trim()
        .parse::<usize>()
        .map_err(|_| invalid_length())?;
    if length == 0 {
        return Err(invalid_length());
    }
    Ok((tag, length))
}

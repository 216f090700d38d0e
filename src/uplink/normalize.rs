/// Payload normalization
///
/// Every transport hands over the uplink in its own representation. All of
/// them are reduced to one lowercase hex form before decoding or hashing.
use base64::{
    alphabet,
    engine::{GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};

use crate::error::NormalizeError;
use crate::models::{CanonicalHex, RawPayload};

// Firmware encoders do not always zero the bits after the last byte
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Convert a raw payload into canonical hex.
///
/// Detection order matters: hex is tried before base64, so short inputs that
/// are valid in both alphabets (e.g. `"abcd"`) are read as hex.
///
/// # Arguments
/// * `payload` - Bytes, or a hex (optionally `0x` prefixed) or base64 string
///
/// # Returns
/// The canonical hex form, or the reason the payload was rejected
pub fn normalize(payload: RawPayload<'_>) -> Result<CanonicalHex, NormalizeError> {
    match payload {
        RawPayload::Bytes(bytes) => Ok(CanonicalHex::from_bytes(bytes.to_vec())),
        RawPayload::Text(text) => normalize_text(text),
    }
}

fn normalize_text(text: &str) -> Result<CanonicalHex, NormalizeError> {
    let candidate = text.trim();
    let candidate = candidate
        .strip_prefix("0x")
        .or_else(|| candidate.strip_prefix("0X"))
        .unwrap_or(candidate);

    if is_hex(candidate) {
        if candidate.len() % 2 != 0 {
            return Err(NormalizeError::OddLengthHex {
                length: candidate.len(),
            });
        }
        let bytes = hex::decode(candidate).map_err(|_| NormalizeError::UnsupportedFormat)?;
        return Ok(CanonicalHex::from_bytes(bytes));
    }

    if is_base64(candidate) {
        let bytes = BASE64
            .decode(candidate)
            .map_err(|_| NormalizeError::UnsupportedFormat)?;
        return Ok(CanonicalHex::from_bytes(bytes));
    }

    Err(NormalizeError::UnsupportedFormat)
}

fn is_hex(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_base64(text: &str) -> bool {
    !text.is_empty()
        && text.len() % 4 == 0
        && text
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
}

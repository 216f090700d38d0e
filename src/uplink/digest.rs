use sha2::{Digest, Sha256};

use crate::error::NormalizeError;
use crate::models::{CanonicalHex, PayloadDigest, RawPayload};
use crate::uplink::normalize::normalize;

/// Content digest of a raw payload.
///
/// The hash is taken over the canonical hex text, so the same uplink
/// delivered as bytes, hex or base64 yields the same digest. Stores use it
/// to reject redelivered uplinks.
pub fn hash_payload(payload: RawPayload<'_>) -> Result<PayloadDigest, NormalizeError> {
    Ok(hash_canonical(&normalize(payload)?))
}

pub fn hash_canonical(hex: &CanonicalHex) -> PayloadDigest {
    let mut hasher = Sha256::new();
    hasher.update(hex.as_str().as_bytes());
    PayloadDigest(hex::encode(hasher.finalize()))
}

pub mod digest;
pub mod normalize;
pub mod tables;
pub mod tlv;

pub use digest::{hash_canonical, hash_payload};
pub use normalize::normalize;
pub use tables::{FieldRule, KnownField, Tag, TagTable};
pub use tlv::{decode, TlvDecoder};

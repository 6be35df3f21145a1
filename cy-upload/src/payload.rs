//! Synthetic payloads and the names they are declared under.

use bytes::Bytes;
use rand::{Rng, RngCore};

use crate::{Fingerprint, PayloadStream, PinnedIdentity, UploadConfig, UploadResult};

/// A payload that exists only as a recipe: `zero_prefix` zero bytes followed
/// by a trailer. Its fingerprint is derived from the trailer, so the same
/// trailer always reproduces the same bytes and the same fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticPayload {
    pub fingerprint: Fingerprint,
    pub declared_size: u64,
    pub trailer: Bytes,
}

impl SyntheticPayload {
    /// Fresh payload with a random trailer
    pub fn generate(config: &UploadConfig) -> Self {
        let mut trailer = vec![0u8; config.trailer_len];
        rand::thread_rng().fill_bytes(&mut trailer);
        Self::from_trailer(config.zero_prefix_bytes, Bytes::from(trailer))
    }

    pub fn from_trailer(zero_prefix_bytes: u64, trailer: Bytes) -> Self {
        let fingerprint = Fingerprint::md5_of(hex::encode(&trailer).as_bytes());
        Self {
            fingerprint,
            declared_size: zero_prefix_bytes + trailer.len() as u64,
            trailer,
        }
    }

    /// Rebuild the payload of an earlier successful session
    pub fn from_identity(identity: &PinnedIdentity) -> Self {
        Self {
            fingerprint: identity.fingerprint.clone(),
            declared_size: identity.declared_size,
            trailer: identity.trailer.clone(),
        }
    }

    /// A new single-use body for this payload
    pub fn stream(&self, chunk_size: usize) -> UploadResult<PayloadStream> {
        PayloadStream::new(self.declared_size, self.trailer.clone(), chunk_size)
    }

    pub fn identity(&self) -> PinnedIdentity {
        PinnedIdentity {
            fingerprint: self.fingerprint.clone(),
            declared_size: self.declared_size,
            trailer: self.trailer.clone(),
        }
    }
}

/// `len` random lower-case hex characters
pub fn random_hex(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
        .collect()
}

/// Name a synthetic upload is declared under
pub fn display_name(prefix: &str, extension: &str) -> String {
    format!("{}{}{}", prefix, random_hex(4), extension)
}

/// Local time in the `YYYYMMDDHHMMSS` form the storage service uses
pub fn creation_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d%H%M%S").to_string()
}

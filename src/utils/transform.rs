//! Payload transform pipeline: family cipher reversal followed by inflate.
//!
//! Inflate failures are recoverable. When the decrypted bytes do not inflate
//! the caller gets them back as-is and decides whether that is usable.

use tracing::{debug, warn};

use crate::utils::cipher::{self, CipherFamily};
use crate::utils::compression::{self, PROFILE_MAX_INFLATED, SPAWN_MAX_INFLATED};
use crate::utils::metrics::global_metrics;

/// Result of reversing a transformed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub bytes: Vec<u8>,
    /// False when inflate failed and `bytes` are the decrypted input.
    pub inflated: bool,
}

/// Largest inflated size accepted for a family.
pub fn max_inflated(family: CipherFamily) -> usize {
    match family {
        CipherFamily::Profile => PROFILE_MAX_INFLATED,
        CipherFamily::Spawn => SPAWN_MAX_INFLATED,
    }
}

/// Decrypt then inflate, falling back to the decrypted bytes.
pub fn reverse(family: CipherFamily, payload: &[u8]) -> Transformed {
    let decrypted = cipher::decrypt(family, payload);
    match compression::inflate(&decrypted, max_inflated(family)) {
        Ok(bytes) => {
            debug!(?family, wire = payload.len(), inflated = bytes.len(), "Payload transform reversed");
            Transformed {
                bytes,
                inflated: true,
            }
        }
        Err(e) => {
            warn!(?family, len = payload.len(), error = %e, "Inflate failed, using decrypted payload");
            global_metrics().transform_fallback();
            Transformed {
                bytes: decrypted,
                inflated: false,
            }
        }
    }
}

/// Deflate then encrypt (server direction).
///
/// # Errors
/// Propagates encoder failures from [`compression::deflate`].
pub fn apply(family: CipherFamily, payload: &[u8]) -> crate::error::Result<Vec<u8>> {
    let mut out = compression::deflate(payload)?;
    cipher::encrypt_in_place(family, &mut out);
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn apply_then_reverse() {
        let profile: Vec<u8> = (0..600u32).map(|i| (i * 7 % 256) as u8).collect();
        let wire = apply(CipherFamily::Profile, &profile).unwrap();
        let out = reverse(CipherFamily::Profile, &wire);
        assert!(out.inflated);
        assert_eq!(out.bytes, profile);
    }

    #[test]
    fn wrong_family_falls_back() {
        let data = vec![3u8; 200];
        let wire = apply(CipherFamily::Spawn, &data).unwrap();
        let out = reverse(CipherFamily::Profile, &wire);
        assert!(!out.inflated);
        assert_eq!(out.bytes.len(), wire.len());
    }

    #[test]
    fn encrypted_only_payload_falls_back_to_plaintext() {
        let plain = b"spawn record without compression!".to_vec();
        let wire = cipher::encrypt(CipherFamily::Spawn, &plain);
        let out = reverse(CipherFamily::Spawn, &wire);
        assert!(!out.inflated);
        assert_eq!(out.bytes, plain);
    }
}

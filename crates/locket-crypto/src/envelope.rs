//! Spliced envelope format
//!
//! An envelope is one ASCII string built from three standard-base64 segments:
//! ```text
//! core = base64(ciphertext || 16-byte tag)
//! s1   = core with base64(salt) inserted at min(p0, len(core))
//! env  = s1   with base64(iv)   inserted at min(p1, len(s1))
//! ```
//! Salt goes in first, then the IV, each offset measured against the string
//! produced by the previous step. Decoding removes the IV first, then the salt.
//!
//! The segment lengths are fixed by `salt_length` and the 12-byte IV, so the
//! reader only needs the same `salt_length` and positions as the writer.

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use locket_core::types::{MAX_SALT_LENGTH, MIN_SALT_LENGTH};
use locket_core::{InsertPositions, LocketError, LocketResult};

use crate::{IV_B64_LEN, IV_SIZE, TAG_SIZE};

/// The decoded contents of an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeParts {
    pub salt: Vec<u8>,
    pub iv: [u8; IV_SIZE],
    /// Ciphertext followed by the GCM tag
    pub ciphertext_and_tag: Vec<u8>,
}

impl EnvelopeParts {
    pub fn ciphertext(&self) -> &[u8] {
        let split = self.ciphertext_and_tag.len().saturating_sub(TAG_SIZE);
        &self.ciphertext_and_tag[..split]
    }

    pub fn tag(&self) -> &[u8] {
        let split = self.ciphertext_and_tag.len().saturating_sub(TAG_SIZE);
        &self.ciphertext_and_tag[split..]
    }
}

/// Encoder/decoder for spliced envelopes with fixed salt length and positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeCodec {
    salt_length: usize,
    positions: InsertPositions,
}

impl EnvelopeCodec {
    /// `salt_length` must lie in the same bounds the KDF accepts.
    pub fn new(salt_length: usize, positions: InsertPositions) -> LocketResult<Self> {
        if !(MIN_SALT_LENGTH..=MAX_SALT_LENGTH).contains(&salt_length) {
            return Err(LocketError::InvalidParameters(format!(
                "salt_length must be between {MIN_SALT_LENGTH} and {MAX_SALT_LENGTH} bytes, got {salt_length}"
            )));
        }
        Ok(Self {
            salt_length,
            positions,
        })
    }

    pub fn salt_length(&self) -> usize {
        self.salt_length
    }

    pub fn positions(&self) -> InsertPositions {
        self.positions
    }

    /// Length of the base64 salt segment: `ceil(salt_length / 3) * 4`
    pub fn salt_b64_len(&self) -> usize {
        self.salt_length.div_ceil(3) * 4
    }

    /// Shortest string that can possibly be an envelope
    pub fn min_envelope_len(&self) -> usize {
        IV_B64_LEN + self.salt_b64_len()
    }

    pub fn encode(&self, parts: &EnvelopeParts) -> LocketResult<String> {
        if parts.salt.len() != self.salt_length {
            return Err(LocketError::InvalidParameters(format!(
                "salt must be {} bytes, got {}",
                self.salt_length,
                parts.salt.len()
            )));
        }

        let salt_b64 = B64.encode(&parts.salt);
        let iv_b64 = B64.encode(parts.iv);
        let mut envelope = B64.encode(&parts.ciphertext_and_tag);

        let salt_at = self.positions.salt.min(envelope.len());
        envelope.insert_str(salt_at, &salt_b64);
        let iv_at = self.positions.iv.min(envelope.len());
        envelope.insert_str(iv_at, &iv_b64);

        Ok(envelope)
    }

    pub fn decode(&self, envelope: &str) -> LocketResult<EnvelopeParts> {
        let salt_b64_len = self.salt_b64_len();
        if envelope.len() < self.min_envelope_len() {
            return Err(LocketError::MalformedEnvelope(format!(
                "envelope is {} characters, minimum is {}",
                envelope.len(),
                self.min_envelope_len()
            )));
        }
        // Base64 output is ASCII, so byte offsets below are character offsets.
        if !envelope.is_ascii() {
            return Err(LocketError::MalformedEnvelope(
                "envelope contains non-ASCII characters".into(),
            ));
        }

        let mut s1 = envelope.to_string();
        let iv_at = self.positions.iv.min(s1.len() - IV_B64_LEN);
        let iv_b64: String = s1.drain(iv_at..iv_at + IV_B64_LEN).collect();

        let salt_at = self.positions.salt.min(s1.len() - salt_b64_len);
        let salt_b64: String = s1.drain(salt_at..salt_at + salt_b64_len).collect();
        let core_b64 = s1;

        let salt = decode_segment("salt", &salt_b64)?;
        let iv_bytes = decode_segment("iv", &iv_b64)?;
        let ciphertext_and_tag = decode_segment("ciphertext", &core_b64)?;

        if salt.len() != self.salt_length {
            return Err(LocketError::MalformedEnvelope(format!(
                "salt decodes to {} bytes, expected {}",
                salt.len(),
                self.salt_length
            )));
        }
        let iv: [u8; IV_SIZE] = iv_bytes.as_slice().try_into().map_err(|_| {
            LocketError::MalformedEnvelope(format!(
                "iv decodes to {} bytes, expected {IV_SIZE}",
                iv_bytes.len()
            ))
        })?;
        if ciphertext_and_tag.len() < TAG_SIZE {
            return Err(LocketError::MalformedEnvelope(format!(
                "ciphertext is {} bytes, shorter than the {TAG_SIZE}-byte tag",
                ciphertext_and_tag.len()
            )));
        }

        Ok(EnvelopeParts {
            salt,
            iv,
            ciphertext_and_tag,
        })
    }
}

fn decode_segment(name: &str, segment: &str) -> LocketResult<Vec<u8>> {
    B64.decode(segment)
        .map_err(|e| LocketError::MalformedEnvelope(format!("{name} segment: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn codec() -> EnvelopeCodec {
        EnvelopeCodec::new(16, InsertPositions::default()).unwrap()
    }

    fn sample_parts() -> EnvelopeParts {
        EnvelopeParts {
            salt: (0u8..16).collect(),
            iv: [0xA5; IV_SIZE],
            ciphertext_and_tag: (0u8..40).collect(),
        }
    }

    #[test]
    fn test_segment_lengths() {
        assert_eq!(codec().salt_b64_len(), 24);
        assert_eq!(EnvelopeCodec::new(8, InsertPositions::default()).unwrap().salt_b64_len(), 12);
        assert_eq!(EnvelopeCodec::new(32, InsertPositions::default()).unwrap().salt_b64_len(), 44);
        assert_eq!(codec().min_envelope_len(), 40);
    }

    #[test]
    fn test_splice_layout() {
        let parts = sample_parts();
        let envelope = codec().encode(&parts).unwrap();

        let core = B64.encode(&parts.ciphertext_and_tag);
        let salt = B64.encode(&parts.salt);
        let iv = B64.encode(parts.iv);

        // Salt at 5 in core, then IV at 10 in the salted string.
        let mut expected = core.clone();
        expected.insert_str(5, &salt);
        expected.insert_str(10, &iv);

        assert_eq!(envelope, expected);
        assert_eq!(&envelope[..5], &core[..5]);
        assert_eq!(&envelope[10..26], iv);
        assert_eq!(envelope.len(), core.len() + 24 + 16);
    }

    #[test]
    fn test_positions_clamped_to_length() {
        // Core of exactly one tag (24 chars); positions far past the end append.
        let codec = EnvelopeCodec::new(16, InsertPositions::new(1000, 2000)).unwrap();
        let parts = EnvelopeParts {
            salt: vec![7u8; 16],
            iv: [3u8; IV_SIZE],
            ciphertext_and_tag: vec![1u8; TAG_SIZE],
        };
        let envelope = codec.encode(&parts).unwrap();
        let core = B64.encode(&parts.ciphertext_and_tag);
        assert!(envelope.starts_with(&core));
        assert!(envelope.ends_with(&B64.encode(parts.iv)));
        assert_eq!(codec.decode(&envelope).unwrap(), parts);
    }

    #[test]
    fn test_decode_roundtrip() {
        let parts = sample_parts();
        let decoded = codec().decode(&codec().encode(&parts).unwrap()).unwrap();
        assert_eq!(decoded, parts);
        assert_eq!(decoded.tag(), &parts.ciphertext_and_tag[24..]);
        assert_eq!(decoded.ciphertext(), &parts.ciphertext_and_tag[..24]);
    }

    #[test]
    fn test_encode_rejects_wrong_salt_length() {
        let mut parts = sample_parts();
        parts.salt.truncate(15);
        assert!(matches!(
            codec().encode(&parts),
            Err(LocketError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_decode_too_short() {
        let result = codec().decode(&"A".repeat(39));
        assert!(matches!(result, Err(LocketError::MalformedEnvelope(_))));
    }

    #[test]
    fn test_decode_invalid_base64() {
        let mut envelope = codec().encode(&sample_parts()).unwrap();
        envelope.replace_range(0..1, "!");
        assert!(matches!(
            codec().decode(&envelope),
            Err(LocketError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_decode_non_ascii() {
        let mut envelope = codec().encode(&sample_parts()).unwrap();
        envelope.push('é');
        assert!(matches!(
            codec().decode(&envelope),
            Err(LocketError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_decode_core_shorter_than_tag() {
        let parts = EnvelopeParts {
            salt: vec![0u8; 16],
            iv: [0u8; IV_SIZE],
            ciphertext_and_tag: vec![0u8; 3],
        };
        let envelope = codec().encode(&parts).unwrap();
        assert!(matches!(
            codec().decode(&envelope),
            Err(LocketError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_new_rejects_out_of_range_salt_length() {
        for salt_length in [0, 7, 65, usize::MAX] {
            assert!(
                matches!(
                    EnvelopeCodec::new(salt_length, InsertPositions::default()),
                    Err(LocketError::InvalidParameters(_))
                ),
                "salt_length {salt_length} must be rejected"
            );
        }
        assert!(EnvelopeCodec::new(8, InsertPositions::default()).is_ok());
        assert!(EnvelopeCodec::new(64, InsertPositions::default()).is_ok());
    }

    #[test]
    fn test_decode_short_iv_segment() {
        // A padded 16-char IV segment decodes to 10 bytes, not 12.
        let parts = sample_parts();
        let envelope = codec().encode(&parts).unwrap();
        let short_iv = B64.encode([0x11u8; 10]);
        assert_eq!(short_iv.len(), IV_B64_LEN);
        assert!(short_iv.ends_with("=="));

        let mut tampered = envelope.clone();
        tampered.replace_range(10..10 + IV_B64_LEN, &short_iv);
        match codec().decode(&tampered) {
            Err(LocketError::MalformedEnvelope(msg)) => assert!(msg.contains("iv"), "{msg}"),
            other => panic!("expected malformed iv, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_with_mismatched_salt_length() {
        let envelope = codec().encode(&sample_parts()).unwrap();
        let other = EnvelopeCodec::new(32, InsertPositions::default()).unwrap();
        assert!(other.decode(&envelope).is_err());
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            salt in proptest::collection::vec(any::<u8>(), 16),
            iv in proptest::array::uniform12(any::<u8>()),
            core in proptest::collection::vec(any::<u8>(), TAG_SIZE..=512),
            p0 in 0usize..=700,
            p1 in 0usize..=720,
        ) {
            let codec = EnvelopeCodec::new(16, InsertPositions::new(p0, p1)).unwrap();
            let parts = EnvelopeParts { salt, iv, ciphertext_and_tag: core };
            let envelope = codec.encode(&parts).unwrap();
            prop_assert_eq!(envelope.len(), codec.min_envelope_len() + B64.encode(&parts.ciphertext_and_tag).len());
            let decoded = codec.decode(&envelope).unwrap();
            prop_assert_eq!(decoded, parts);
        }

        #[test]
        fn decode_inverts_encode_any_salt_length(
            salt_length in 8usize..=64,
            seed in any::<u8>(),
            core in proptest::collection::vec(any::<u8>(), TAG_SIZE..=128),
            p0 in 0usize..=200,
            p1 in 0usize..=300,
        ) {
            let codec = EnvelopeCodec::new(salt_length, InsertPositions::new(p0, p1)).unwrap();
            let parts = EnvelopeParts {
                salt: (0..salt_length).map(|i| seed.wrapping_add(i as u8)).collect(),
                iv: [seed; IV_SIZE],
                ciphertext_and_tag: core,
            };
            let decoded = codec.decode(&codec.encode(&parts).unwrap()).unwrap();
            prop_assert_eq!(decoded, parts);
        }
    }
}

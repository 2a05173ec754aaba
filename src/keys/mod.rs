pub mod cose;

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey};

pub use cose::COSE_EC2_KEY_LEN;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("PKCS#8: {0}")]
    Pkcs8(String),
    #[error("COSE: {0}")]
    Cose(String),
    #[error("public key: {0}")]
    PublicKey(String),
    #[error("signature: {0}")]
    Signature(String),
}

/// ECDSA P-256 key pair. Only ever used to produce ES256 signatures.
pub struct KeyPair {
    signing: SigningKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.signing.verifying_key())
            .finish_non_exhaustive()
    }
}

pub fn generate_key_pair() -> KeyPair {
    KeyPair {
        signing: SigningKey::random(&mut rand::rngs::OsRng),
    }
}

impl KeyPair {
    /// Import a private key previously produced by [`KeyPair::to_pkcs8_der`].
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, KeyError> {
        let signing = SigningKey::from_pkcs8_der(der).map_err(|e| KeyError::Pkcs8(e.to_string()))?;
        Ok(Self { signing })
    }

    /// Export the private key as PKCS#8 DER for storage inside an encrypted vault entry.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>, KeyError> {
        let doc = self
            .signing
            .to_pkcs8_der()
            .map_err(|e| KeyError::Pkcs8(e.to_string()))?;
        Ok(doc.as_bytes().to_vec())
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing.verifying_key()
    }

    /// Affine (x, y) coordinates of the public key, each 32 bytes big-endian.
    pub fn public_coords(&self) -> Result<([u8; 32], [u8; 32]), KeyError> {
        let point = self.signing.verifying_key().to_encoded_point(false);
        match (point.x(), point.y()) {
            (Some(px), Some(py)) => {
                let mut x = [0u8; 32];
                let mut y = [0u8; 32];
                x.copy_from_slice(px);
                y.copy_from_slice(py);
                Ok((x, y))
            }
            _ => Err(KeyError::PublicKey("public key has no affine coordinates".into())),
        }
    }

    pub fn public_key_cose(&self) -> Result<[u8; COSE_EC2_KEY_LEN], KeyError> {
        let (x, y) = self.public_coords()?;
        Ok(cose::encode_ec2(&x, &y))
    }

    /// Sign `message` (hashed with SHA-256 internally).
    /// Returns raw (r, s) concatenated, 64 bytes.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let signature: Signature = self.signing.sign(message);
        let mut raw = [0u8; 64];
        raw.copy_from_slice(&signature.to_bytes());
        raw
    }
}

/// DER-encode a raw 64-byte P-256 ECDSA signature (r || s).
pub fn raw_to_der(raw: &[u8; 64]) -> Result<Vec<u8>, KeyError> {
    let signature =
        Signature::from_slice(raw).map_err(|e| KeyError::Signature(e.to_string()))?;
    Ok(signature.to_der().as_bytes().to_vec())
}

/// Verify a raw (r || s) signature over `message` against `key`.
pub fn verify(key: &VerifyingKey, message: &[u8], raw: &[u8; 64]) -> bool {
    match Signature::from_slice(raw) {
        Ok(signature) => key.verify(message, &signature).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cose_roundtrip_verifies_signature() {
        let pair = generate_key_pair();
        let cose_key = pair.public_key_cose().unwrap();
        let message = b"authenticator data || client data hash";
        let sig = pair.sign(message);

        let parsed = cose::parse_ec2(&cose_key).unwrap();
        assert_eq!(&parsed, pair.verifying_key());
        assert!(verify(&parsed, message, &sig));
        assert!(!verify(&parsed, b"some other message", &sig));
    }

    #[test]
    fn test_pkcs8_roundtrip_keeps_public_key() {
        let pair = generate_key_pair();
        let der = pair.to_pkcs8_der().unwrap();
        let restored = KeyPair::from_pkcs8_der(&der).unwrap();
        assert_eq!(restored.verifying_key(), pair.verifying_key());

        let sig = restored.sign(b"hello");
        assert!(verify(pair.verifying_key(), b"hello", &sig));
    }

    #[test]
    fn test_pkcs8_rejects_garbage() {
        let err = KeyPair::from_pkcs8_der(b"not a key").unwrap_err();
        assert!(matches!(err, KeyError::Pkcs8(_)));
    }

    #[test]
    fn test_fresh_keys_differ() {
        let a = generate_key_pair();
        let b = generate_key_pair();
        assert_ne!(a.verifying_key(), b.verifying_key());
    }

    #[test]
    fn test_der_structure() {
        let pair = generate_key_pair();
        let raw = pair.sign(b"der me");
        let der = raw_to_der(&raw).unwrap();
        assert_eq!(der[0], 0x30, "must start with SEQUENCE tag 0x30");
        assert_eq!(der.len(), 2 + der[1] as usize, "DER length field must be accurate");
        assert_eq!(der[2], 0x02, "r must start with INTEGER tag 0x02");

        let parsed = p256::ecdsa::DerSignature::from_bytes(&der).unwrap();
        let back: Signature = parsed.try_into().unwrap();
        assert_eq!(back.to_bytes().as_slice(), &raw[..]);
    }

    #[test]
    fn test_der_rejects_zero_scalars() {
        assert!(matches!(raw_to_der(&[0u8; 64]), Err(KeyError::Signature(_))));
    }
}

//! COSE_Key encoding of P-256 public keys.
//!
//! The encoding is the CTAP2 canonical form of
//! `{1: 2, 3: -7, -1: 1, -2: x, -3: y}`, which is always exactly
//! [`COSE_EC2_KEY_LEN`] bytes for a 32-byte coordinate pair.

use p256::ecdsa::VerifyingKey;
use p256::{EncodedPoint, FieldBytes};

use super::KeyError;
use crate::cbor;

pub const COSE_EC2_KEY_LEN: usize = 77;

pub const COSE_KTY: i64 = 1;
pub const COSE_ALG: i64 = 3;
pub const COSE_CRV: i64 = -1;
pub const COSE_X: i64 = -2;
pub const COSE_Y: i64 = -3;

pub const KTY_EC2: i64 = 2;
pub const CRV_P256: i64 = 1;

// map(5), kty: EC2, alg: ES256, crv: P-256, -2: bstr(32)
const X_PREFIX: [u8; 10] = [0xa5, 0x01, 0x02, 0x03, 0x26, 0x20, 0x01, 0x21, 0x58, 0x20];
// -3: bstr(32)
const Y_PREFIX: [u8; 3] = [0x22, 0x58, 0x20];

/// Encode a P-256 public key as a 77-byte COSE_Key (kty=EC2, alg=ES256, crv=P-256).
pub fn encode_ec2(x: &[u8; 32], y: &[u8; 32]) -> [u8; COSE_EC2_KEY_LEN] {
    let mut out = [0u8; COSE_EC2_KEY_LEN];
    out[..10].copy_from_slice(&X_PREFIX);
    out[10..42].copy_from_slice(x);
    out[42..45].copy_from_slice(&Y_PREFIX);
    out[45..].copy_from_slice(y);
    out
}

/// Parse a COSE_Key back into a verifying key.
///
/// Accepts any CBOR map ordering, but requires kty=EC2, alg=ES256, crv=P-256
/// and two 32-byte coordinates that lie on the curve.
pub fn parse_ec2(bytes: &[u8]) -> Result<VerifyingKey, KeyError> {
    let map = cbor::parse_map(bytes).map_err(KeyError::Cose)?;

    let field = |label: i64| {
        cbor::get(&map, label).ok_or_else(|| KeyError::Cose(format!("missing label {label}")))
    };
    let int_field = |label: i64| {
        field(label).and_then(|v| {
            cbor::as_int(v).ok_or_else(|| KeyError::Cose(format!("label {label} is not an integer")))
        })
    };

    if int_field(COSE_KTY)? != i128::from(KTY_EC2) {
        return Err(KeyError::Cose("kty is not EC2".into()));
    }
    if int_field(COSE_ALG)? != i128::from(crate::config::ES256) {
        return Err(KeyError::Cose("alg is not ES256".into()));
    }
    if int_field(COSE_CRV)? != i128::from(CRV_P256) {
        return Err(KeyError::Cose("crv is not P-256".into()));
    }

    let coord = |label: i64| -> Result<&[u8], KeyError> {
        let b = field(label).and_then(|v| {
            cbor::as_bytes(v).ok_or_else(|| KeyError::Cose(format!("label {label} is not bytes")))
        })?;
        if b.len() != 32 {
            return Err(KeyError::Cose(format!("coordinate {label} is {} bytes", b.len())));
        }
        Ok(b)
    };
    let x = coord(COSE_X)?;
    let y = coord(COSE_Y)?;

    let point = EncodedPoint::from_affine_coordinates(
        FieldBytes::from_slice(x),
        FieldBytes::from_slice(y),
        false,
    );
    VerifyingKey::from_encoded_point(&point).map_err(|e| KeyError::PublicKey(e.to_string()))
}

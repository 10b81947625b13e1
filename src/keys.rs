//! ECDSA keys in the `did:key` encoding used by PLC operations.
//!
//! Keys are exchanged as `did:key:z...` strings: a base58btc multibase of a
//! multicodec varint followed by a compressed SEC1 point. Signing and
//! verification follow the atproto "hash-then-sign" contract: the message
//! is hashed with SHA-256 and the digest is ECDSA-signed. Signatures are
//! 64-byte fixed-width `r || s` values and must be low-S; a high-S
//! signature is rejected as invalid to match directory behavior.

use k256::ecdsa as k256_ecdsa;
use p256::ecdsa as p256_ecdsa;
use p256::ecdsa::signature::{Signer, Verifier};
use rand_core::OsRng;

use crate::error::Error;

const DID_KEY_PREFIX: &str = "did:key:";

// Multicodec varints preceding the key bytes.
const P256_PUB: [u8; 2] = [0x80, 0x24]; // 0x1200
const SECP256K1_PUB: [u8; 2] = [0xe7, 0x01]; // 0xe7
const P256_PRIV: [u8; 2] = [0x86, 0x26]; // 0x1306
const SECP256K1_PRIV: [u8; 2] = [0x81, 0x26]; // 0x1301

/// The curves PLC rotation and verification keys may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    P256,
    Secp256k1,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum VerifyingKey {
    P256(p256_ecdsa::VerifyingKey),
    Secp256k1(k256_ecdsa::VerifyingKey),
}

/// A parsed public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    key: VerifyingKey,
}

impl PublicKey {
    pub fn algorithm(&self) -> Algorithm {
        match &self.key {
            VerifyingKey::P256(_) => Algorithm::P256,
            VerifyingKey::Secp256k1(_) => Algorithm::Secp256k1,
        }
    }

    /// Verifies `sig` over the SHA-256 digest of `msg`.
    ///
    /// Returns [`Error::InvalidSignature`] for any cryptographic mismatch,
    /// including well-formed but high-S signatures.
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> Result<(), Error> {
        match &self.key {
            VerifyingKey::P256(vk) => {
                let sig = p256_ecdsa::Signature::from_slice(sig)
                    .map_err(|_| Error::InvalidSignature)?;
                if sig.normalize_s().is_some() {
                    return Err(Error::InvalidSignature);
                }
                vk.verify(msg, &sig).map_err(|_| Error::InvalidSignature)
            }
            VerifyingKey::Secp256k1(vk) => {
                let sig = k256_ecdsa::Signature::from_slice(sig)
                    .map_err(|_| Error::InvalidSignature)?;
                if sig.normalize_s().is_some() {
                    return Err(Error::InvalidSignature);
                }
                vk.verify(msg, &sig).map_err(|_| Error::InvalidSignature)
            }
        }
    }

    /// The compressed-point multibase form used inside DID documents,
    /// without the `did:key:` prefix.
    pub fn multibase(&self) -> String {
        let (codec, point) = match &self.key {
            VerifyingKey::P256(vk) => (P256_PUB, vk.to_encoded_point(true)),
            VerifyingKey::Secp256k1(vk) => (SECP256K1_PUB, vk.to_encoded_point(true)),
        };
        encode_multibase(codec, point.as_bytes())
    }

    /// The full `did:key:...` form.
    pub fn did_key(&self) -> String {
        format!("{}{}", DID_KEY_PREFIX, self.multibase())
    }
}

/// Parses a `did:key:...` string, inferring the curve from the multicodec
/// prefix. Supports P-256 and secp256k1.
pub fn parse_public_did_key(did_key: &str) -> Result<PublicKey, Error> {
    let multibase = did_key
        .strip_prefix(DID_KEY_PREFIX)
        .ok_or_else(|| Error::KeyParse(format!("missing did:key prefix: {did_key}")))?;
    let decoded = decode_multibase(multibase)?;

    let (algorithm, point) = split_multicodec(&decoded, P256_PUB, SECP256K1_PUB)?;
    // Directory keys are always compressed SEC1 points.
    if point.len() != 33 {
        return Err(Error::KeyParse(format!(
            "expected a 33-byte compressed point, got {} bytes",
            point.len()
        )));
    }

    let key = match algorithm {
        Algorithm::P256 => p256_ecdsa::VerifyingKey::from_sec1_bytes(point)
            .map(VerifyingKey::P256)
            .map_err(|_| Error::KeyParse("point is not on the P-256 curve".into()))?,
        Algorithm::Secp256k1 => k256_ecdsa::VerifyingKey::from_sec1_bytes(point)
            .map(VerifyingKey::Secp256k1)
            .map_err(|_| Error::KeyParse("point is not on the secp256k1 curve".into()))?,
    };

    Ok(PublicKey { key })
}

#[derive(Clone)]
enum SigningKey {
    P256(p256_ecdsa::SigningKey),
    Secp256k1(k256_ecdsa::SigningKey),
}

/// A private key capable of signing PLC operations.
#[derive(Clone)]
pub struct PrivateKey {
    key: SigningKey,
}

impl PrivateKey {
    /// Generates a fresh random key on the given curve.
    pub fn generate(algorithm: Algorithm) -> Self {
        let key = match algorithm {
            Algorithm::P256 => SigningKey::P256(p256_ecdsa::SigningKey::random(&mut OsRng)),
            Algorithm::Secp256k1 => {
                SigningKey::Secp256k1(k256_ecdsa::SigningKey::random(&mut OsRng))
            }
        };
        Self { key }
    }

    /// Parses the multibase private key syntax used by PLC tooling
    /// (multicodec `p256-priv` or `secp256k1-priv` followed by the scalar).
    pub fn from_multibase(multibase: &str) -> Result<Self, Error> {
        let decoded = decode_multibase(multibase)?;
        let (algorithm, scalar) = split_multicodec(&decoded, P256_PRIV, SECP256K1_PRIV)?;

        let key = match algorithm {
            Algorithm::P256 => p256_ecdsa::SigningKey::from_slice(scalar)
                .map(SigningKey::P256)
                .map_err(|_| Error::KeyParse("invalid P-256 private scalar".into()))?,
            Algorithm::Secp256k1 => k256_ecdsa::SigningKey::from_slice(scalar)
                .map(SigningKey::Secp256k1)
                .map_err(|_| Error::KeyParse("invalid secp256k1 private scalar".into()))?,
        };

        Ok(Self { key })
    }

    /// The multibase export form accepted by [`PrivateKey::from_multibase`].
    pub fn to_multibase(&self) -> String {
        match &self.key {
            SigningKey::P256(sk) => encode_multibase(P256_PRIV, &sk.to_bytes()),
            SigningKey::Secp256k1(sk) => encode_multibase(SECP256K1_PRIV, &sk.to_bytes()),
        }
    }

    /// Signs the SHA-256 digest of `msg`, returning a low-S normalized
    /// 64-byte `r || s` signature.
    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        match &self.key {
            SigningKey::P256(sk) => {
                let sig: p256_ecdsa::Signature = sk.sign(msg);
                let sig = sig.normalize_s().unwrap_or(sig);
                sig.to_bytes().to_vec()
            }
            SigningKey::Secp256k1(sk) => {
                let sig: k256_ecdsa::Signature = sk.sign(msg);
                let sig = sig.normalize_s().unwrap_or(sig);
                sig.to_bytes().to_vec()
            }
        }
    }

    pub fn public(&self) -> PublicKey {
        let key = match &self.key {
            SigningKey::P256(sk) => VerifyingKey::P256(*sk.verifying_key()),
            SigningKey::Secp256k1(sk) => VerifyingKey::Secp256k1(*sk.verifying_key()),
        };
        PublicKey { key }
    }

    pub fn did_key(&self) -> String {
        self.public().did_key()
    }
}

fn encode_multibase(codec: [u8; 2], bytes: &[u8]) -> String {
    let mut buf = Vec::with_capacity(2 + bytes.len());
    buf.extend_from_slice(&codec);
    buf.extend_from_slice(bytes);
    format!("z{}", bs58::encode(buf).into_string())
}

fn decode_multibase(multibase: &str) -> Result<Vec<u8>, Error> {
    // did:key material only ever uses base58btc ('z').
    let encoded = multibase
        .strip_prefix('z')
        .ok_or_else(|| Error::KeyParse(format!("expected base58btc multibase: {multibase}")))?;
    bs58::decode(encoded)
        .into_vec()
        .map_err(|e| Error::KeyParse(format!("invalid base58btc: {e}")))
}

fn split_multicodec(
    decoded: &[u8],
    p256_codec: [u8; 2],
    k256_codec: [u8; 2],
) -> Result<(Algorithm, &[u8]), Error> {
    match decoded {
        [a, b, rest @ ..] if [*a, *b] == p256_codec => Ok((Algorithm::P256, rest)),
        [a, b, rest @ ..] if [*a, *b] == k256_codec => Ok((Algorithm::Secp256k1, rest)),
        [a, b, ..] => Err(Error::KeyParse(format!(
            "unsupported multicodec prefix: [{a:#04x}, {b:#04x}]"
        ))),
        _ => Err(Error::KeyParse("multibase value too short".into())),
    }
}

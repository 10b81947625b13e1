//! The three PLC operation variants and their shared capability set.
//!
//! Operations are value objects: decoders and constructors build them,
//! [`Operation::sign`] writes the `sig` field, and nothing else mutates
//! them. The JSON wire form is discriminated by the `type` field; the
//! canonical CBOR forms live in [`crate::encoding`].

use std::collections::HashMap;

use base64ct::{Base64UrlUnpadded, Encoding};
use cid::Cid;
use serde::{Deserialize, Serialize};

use crate::doc::{Doc, DocService, DocVerificationMethod};
use crate::encoding;
use crate::error::Error;
use crate::keys::{self, PrivateKey, PublicKey};
use crate::util::derive_did;

pub const ATPROTO_VERIFICATION_METHOD: &str = "atproto";
pub const ATPROTO_PDS_KIND: &str = "atproto_pds";
pub const ATPROTO_PDS_TYPE: &str = "AtprotoPersonalDataServer";

/// A service endpoint declared by a regular operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub r#type: String,
    pub endpoint: String,
}

/// A full PLC operation (`type: "plc_operation"`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegularOp {
    /// did:key strings authorized to sign the next operation, ordered by
    /// descending authority.
    pub rotation_keys: Vec<String>,
    /// Method name to did:key.
    pub verification_methods: HashMap<String, String>,
    /// Alias URIs, e.g. `at://handle`.
    pub also_known_as: Vec<String>,
    pub services: HashMap<String, Service>,
    /// CID of the predecessor operation; absent for genesis.
    #[serde(default)]
    pub prev: Option<String>,
    /// Unpadded base64url signature over the unsigned canonical bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
}

/// A legacy `create` operation. Always a genesis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyOp {
    pub signing_key: String,
    pub recovery_key: String,
    /// Bare handle, without the `at://` prefix.
    pub handle: String,
    /// PDS endpoint URL.
    pub service: String,
    #[serde(default)]
    pub prev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
}

/// A terminal `plc_tombstone` operation. Never a genesis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TombstoneOp {
    pub prev: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
}

/// Any of the three operation variants, discriminated on the wire by the
/// JSON `type` field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    #[serde(rename = "plc_operation")]
    Regular(RegularOp),
    #[serde(rename = "create")]
    Legacy(LegacyOp),
    #[serde(rename = "plc_tombstone")]
    Tombstone(TombstoneOp),
}

impl Operation {
    /// Serializes the operation without its `sig` field. This is the
    /// signature input.
    pub fn unsigned_bytes(&self) -> Result<Vec<u8>, Error> {
        match self {
            Operation::Regular(op) => encoding::regular_bytes(op, None),
            Operation::Legacy(op) => encoding::legacy_bytes(op, None),
            Operation::Tombstone(op) => encoding::tombstone_bytes(op, None),
        }
    }

    /// Serializes the operation including `sig` when present. This is the
    /// hash input for CIDs and DID derivation.
    pub fn signed_bytes(&self) -> Result<Vec<u8>, Error> {
        match self {
            Operation::Regular(op) => encoding::regular_bytes(op, op.sig.as_deref()),
            Operation::Legacy(op) => encoding::legacy_bytes(op, op.sig.as_deref()),
            Operation::Tombstone(op) => encoding::tombstone_bytes(op, op.sig.as_deref()),
        }
    }

    /// CID of the full (signed) operation, as referenced by `prev` fields
    /// and log entries.
    pub fn cid(&self) -> Result<Cid, Error> {
        Ok(encoding::compute_cid(&self.signed_bytes()?))
    }

    /// Whether this operation starts a log.
    pub fn is_genesis(&self) -> bool {
        match self {
            Operation::Regular(op) => op.prev.is_none(),
            Operation::Legacy(op) => op.prev.is_none(),
            Operation::Tombstone(_) => false,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self.sig(), Some(sig) if !sig.is_empty())
    }

    pub fn sig(&self) -> Option<&str> {
        match self {
            Operation::Regular(op) => op.sig.as_deref(),
            Operation::Legacy(op) => op.sig.as_deref(),
            Operation::Tombstone(op) => op.sig.as_deref(),
        }
    }

    /// Returns the DID this operation creates. Fails with
    /// [`Error::NotGenesisOp`] for non-genesis operations. The operation
    /// must already be signed, since the DID is a hash of the signed
    /// bytes.
    pub fn did(&self) -> Result<String, Error> {
        if !self.is_genesis() {
            return Err(Error::NotGenesisOp);
        }
        Ok(derive_did(&self.signed_bytes()?))
    }

    /// Signs the operation in place, replacing any existing signature.
    pub fn sign(&mut self, private: &PrivateKey) -> Result<(), Error> {
        let sig = Base64UrlUnpadded::encode_string(&private.sign(&self.unsigned_bytes()?));
        match self {
            Operation::Regular(op) => op.sig = Some(sig),
            Operation::Legacy(op) => op.sig = Some(sig),
            Operation::Tombstone(op) => op.sig = Some(sig),
        }
        Ok(())
    }

    /// Verifies the operation's signature against a single public key.
    ///
    /// Returns [`Error::MissingSignature`] when the operation is unsigned
    /// and [`Error::MalformedSignature`] when `sig` is not unpadded
    /// base64url.
    pub fn verify_signature(&self, public: &PublicKey) -> Result<(), Error> {
        let sig = match self.sig() {
            Some(sig) if !sig.is_empty() => sig,
            _ => return Err(Error::MissingSignature),
        };
        let sig_bytes = Base64UrlUnpadded::decode_vec(sig)
            .map_err(|e| Error::MalformedSignature(e.to_string()))?;
        public.verify(&self.unsigned_bytes()?, &sig_bytes)
    }

    /// Projects the operation into a DID document for `did`.
    pub fn doc(&self, did: &str) -> Result<Doc, Error> {
        match self {
            Operation::Regular(op) => op.doc(did),
            Operation::Legacy(op) => Ok(op.doc(did)),
            Operation::Tombstone(_) => Err(Error::NoDocumentForTombstone),
        }
    }
}

/// Tries the operation's signature against each candidate did:key in
/// order.
///
/// A key that fails to parse aborts immediately; [`Error::InvalidSignature`]
/// moves on to the next candidate and is returned only once every key has
/// been exhausted. An empty candidate list is [`Error::NoKeys`].
pub fn verify_signature_any(op: &Operation, did_keys: &[String]) -> Result<(), Error> {
    if did_keys.is_empty() {
        return Err(Error::NoKeys);
    }
    for did_key in did_keys {
        let public = keys::parse_public_did_key(did_key)?;
        match op.verify_signature(&public) {
            Ok(()) => return Ok(()),
            Err(Error::InvalidSignature) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(Error::InvalidSignature)
}

impl RegularOp {
    /// Builds and signs a genesis operation with the standard atproto
    /// shape: one signing key under the `atproto` verification method and
    /// an `atproto_pds` service.
    pub fn new_atproto(
        private: &PrivateKey,
        handle: &str,
        pds_endpoint: &str,
        rotation_keys: Vec<String>,
    ) -> Result<Operation, Error> {
        if rotation_keys.is_empty() {
            return Err(Error::NoKeys);
        }
        let mut op = Operation::Regular(RegularOp {
            rotation_keys,
            verification_methods: HashMap::from([(
                ATPROTO_VERIFICATION_METHOD.into(),
                private.did_key(),
            )]),
            also_known_as: vec![format!("at://{handle}")],
            services: HashMap::from([(
                ATPROTO_PDS_KIND.into(),
                Service {
                    r#type: ATPROTO_PDS_TYPE.into(),
                    endpoint: pds_endpoint.into(),
                },
            )]),
            prev: None,
            sig: None,
        });
        op.sign(private)?;
        Ok(op)
    }

    fn doc(&self, did: &str) -> Result<Doc, Error> {
        let mut verification_method = Vec::with_capacity(self.verification_methods.len());
        for (name, did_key) in &self.verification_methods {
            let public = keys::parse_public_did_key(did_key)?;
            verification_method.push(DocVerificationMethod {
                id: format!("{did}#{name}"),
                r#type: "Multikey".into(),
                controller: did.into(),
                public_key_multibase: public.multibase(),
            });
        }

        let service = self
            .services
            .iter()
            .map(|(name, s)| DocService {
                id: format!("{did}#{name}"),
                r#type: s.r#type.clone(),
                service_endpoint: s.endpoint.clone(),
            })
            .collect();

        Ok(Doc {
            id: did.into(),
            also_known_as: self.also_known_as.clone(),
            verification_method,
            service,
        })
    }
}

impl LegacyOp {
    /// Converts to the equivalent regular form: the recovery key becomes
    /// the sole rotation key and the signing key the `atproto`
    /// verification method.
    ///
    /// The result is unsigned. The legacy signature is bound to the legacy
    /// canonical bytes and must not be carried over or recreated.
    pub fn to_regular(&self) -> RegularOp {
        RegularOp {
            rotation_keys: vec![self.recovery_key.clone()],
            verification_methods: HashMap::from([(
                ATPROTO_VERIFICATION_METHOD.into(),
                self.signing_key.clone(),
            )]),
            also_known_as: vec![format!("at://{}", self.handle)],
            services: HashMap::from([(
                ATPROTO_PDS_KIND.into(),
                Service {
                    r#type: ATPROTO_PDS_TYPE.into(),
                    endpoint: self.service.clone(),
                },
            )]),
            prev: None,
            sig: None,
        }
    }

    fn doc(&self, did: &str) -> Doc {
        Doc {
            id: did.into(),
            also_known_as: vec![format!("at://{}", self.handle)],
            verification_method: vec![DocVerificationMethod {
                id: format!("{did}#atproto"),
                r#type: "Multikey".into(),
                controller: did.into(),
                public_key_multibase: self
                    .signing_key
                    .strip_prefix("did:key:")
                    .unwrap_or(&self.signing_key)
                    .into(),
            }],
            service: vec![DocService {
                id: format!("{did}#atproto_pds"),
                r#type: ATPROTO_PDS_TYPE.into(),
                service_endpoint: self.service.clone(),
            }],
        }
    }
}

//! Canonical DAG-CBOR encoding of PLC operations, and content addressing
//! over those bytes.
//!
//! Operation hashes (and therefore DIDs and `prev` references) are only
//! meaningful if every implementation produces the exact byte sequence the
//! directory signs: definite-length items, shortest integer forms, and map
//! keys sorted length-first with ties broken bytewise. The structs below
//! declare their fields in that canonical order, and variable-keyed maps
//! are re-sorted with the same comparator at encode time. Any drift here
//! invalidates every signature in the ecosystem.
//!
//! Two further wire quirks, both load-bearing:
//! - `prev` is always present for regular and legacy operations, encoded
//!   as an explicit CBOR null for genesis ops (it is a string-encoded CID,
//!   not an IPLD link);
//! - `sig` is omitted entirely from the unsigned form, never encoded as
//!   null.

use std::cmp::Ordering;
use std::collections::HashMap;

use cid::multihash::Multihash;
use cid::Cid;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::operation::{LegacyOp, RegularOp, Service, TombstoneOp};

/// Computes the CIDv1 (dag-cbor, sha-256) for a blob of canonical bytes.
pub(crate) fn compute_cid(bytes: &[u8]) -> Cid {
    Cid::new_v1(
        0x71,
        Multihash::wrap(0x12, &Sha256::digest(bytes)).expect("correct length"),
    )
}

pub(crate) fn regular_bytes(op: &RegularOp, sig: Option<&str>) -> Result<Vec<u8>, Error> {
    to_vec(&CanonicalRegular {
        sig,
        prev: op.prev.as_deref(),
        r#type: "plc_operation",
        services: Canonical(&op.services),
        also_known_as: &op.also_known_as,
        rotation_keys: &op.rotation_keys,
        verification_methods: Canonical(&op.verification_methods),
    })
}

pub(crate) fn legacy_bytes(op: &LegacyOp, sig: Option<&str>) -> Result<Vec<u8>, Error> {
    to_vec(&CanonicalLegacy {
        sig,
        prev: op.prev.as_deref(),
        r#type: "create",
        handle: &op.handle,
        service: &op.service,
        signing_key: &op.signing_key,
        recovery_key: &op.recovery_key,
    })
}

pub(crate) fn tombstone_bytes(op: &TombstoneOp, sig: Option<&str>) -> Result<Vec<u8>, Error> {
    to_vec(&CanonicalTombstone {
        sig,
        prev: &op.prev,
        r#type: "plc_tombstone",
    })
}

fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    serde_ipld_dagcbor::to_vec(value).map_err(|e| Error::Encoding(e.to_string()))
}

// Field declaration order below is the canonical key order:
// length-first, then bytewise.

#[derive(Serialize)]
struct CanonicalRegular<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sig: Option<&'a str>,
    prev: Option<&'a str>,
    r#type: &'static str,
    services: Canonical<'a, Service>,
    #[serde(rename = "alsoKnownAs")]
    also_known_as: &'a [String],
    #[serde(rename = "rotationKeys")]
    rotation_keys: &'a [String],
    #[serde(rename = "verificationMethods")]
    verification_methods: Canonical<'a, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalLegacy<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sig: Option<&'a str>,
    prev: Option<&'a str>,
    r#type: &'static str,
    handle: &'a str,
    service: &'a str,
    signing_key: &'a str,
    recovery_key: &'a str,
}

#[derive(Serialize)]
struct CanonicalTombstone<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sig: Option<&'a str>,
    prev: &'a str,
    r#type: &'static str,
}

/// Serializes a map with its entries in canonical key order.
struct Canonical<'a, V>(&'a HashMap<String, V>);

impl<V: Serialize> Serialize for Canonical<'_, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entries: Vec<_> = self.0.iter().collect();
        entries.sort_by(|(a, _), (b, _)| canonical_key_order(a, b));

        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

fn canonical_key_order(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.as_bytes().cmp(b.as_bytes()))
}

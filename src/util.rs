use sha2::{Digest, Sha256};

/// Derives the `did:plc` identifier for a signed genesis operation.
pub(crate) fn derive_did(signed_genesis_op: &[u8]) -> String {
    format!(
        "did:plc:{}",
        &base32::encode(
            base32::Alphabet::Rfc4648Lower { padding: false },
            &Sha256::digest(signed_genesis_op),
        )[..24]
    )
}

/// Checks that `did` is shaped like a `did:plc` identifier.
pub(crate) fn is_did_plc(did: &str) -> bool {
    did.starts_with("did:plc:")
}

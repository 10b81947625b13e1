use thiserror::Error;

/// Errors raised while working with individual operations and keys.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Canonical serialization failed. Operations are plain trees of
    /// strings and maps, so hitting this indicates a bug rather than a
    /// recoverable runtime condition.
    #[error("canonical encoding failed: {0}")]
    Encoding(String),

    /// A did:key string could not be parsed. Distinct from
    /// [`Error::InvalidSignature`]: callers iterating a candidate key list
    /// must abort on this rather than try the next key.
    #[error("could not parse did:key: {0}")]
    KeyParse(String),

    /// The signature did not verify against the given key.
    #[error("invalid signature")]
    InvalidSignature,

    /// A signature was required but the operation carries none.
    #[error("can't verify empty signature")]
    MissingSignature,

    /// The `sig` field is present but is not unpadded base64url.
    #[error("malformed signature encoding: {0}")]
    MalformedSignature(String),

    /// `verify_signature_any` was called with no candidate keys.
    #[error("no keys to verify against")]
    NoKeys,

    /// Genesis-only logic (DID derivation) invoked on a non-genesis op.
    #[error("not a genesis PLC operation")]
    NotGenesisOp,

    /// Tombstones have no DID document representation.
    #[error("tombstones do not have a DID document representation")]
    NoDocumentForTombstone,
}

/// Failures of a log entry's stateless self-check.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    /// The entry's `cid` field does not match the CID computed from the
    /// operation's signed canonical bytes.
    #[error("log entry CID {claimed} didn't match computed operation CID {computed}")]
    CidMismatch { claimed: String, computed: String },

    /// A genesis entry's `did` field does not match the DID derived from
    /// the operation.
    #[error("log entry DID {claimed} didn't match computed genesis operation DID {computed}")]
    DidMismatch { claimed: String, computed: String },

    /// An operation-level failure (signature, key parse, ...).
    #[error(transparent)]
    Op(#[from] Error),
}

/// Failures of whole-log replay verification.
///
/// Replay stops at the first fatal error; variants carry the zero-based
/// index of the offending entry where one exists.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("can't verify empty operation log")]
    EmptyLog,

    /// An entry failed its self-check or an authority signature check.
    #[error("log entry {index}: {error}")]
    Entry { index: usize, error: EntryError },

    #[error("first log entry must be a genesis plc_operation or create (legacy)")]
    FirstEntryWrongType,

    #[error("first log entry can't be nullified")]
    FirstEntryNullified,

    /// Legacy `create` operations are only ever the genesis entry.
    #[error("log entry {index}: legacy create operation after the first entry")]
    LegacyOpNotFirst { index: usize },

    #[error("log entry {index}: operation log was not ordered by timestamp")]
    NotOrdered { index: usize },

    #[error("log entry {index}: account was tombstoned, expected end of op log")]
    PostTombstone { index: usize },

    /// `createdAt` could not be parsed as RFC 3339 during a recovery
    /// window check.
    #[error("log entry {index}: unparseable createdAt timestamp")]
    BadTimestamp { index: usize },

    #[error("log entry {index}: gap between nullified entry and overriding entry exceeds the recovery window")]
    RecoveryWindowExceeded { index: usize },

    #[error("outstanding nullified entry at end of log")]
    UnresolvedNullification,
}

/// Errors from the directory client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("expected a did:plc identifier, got: {0}")]
    BadDidFormat(String),

    #[error("DID not found in PLC directory")]
    DidNotFound,

    #[error("PLC directory request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("PLC directory returned HTTP status {0}")]
    UnexpectedStatus(reqwest::StatusCode),

    #[error("failed to decode PLC directory response: {0}")]
    Decode(#[source] reqwest::Error),
}

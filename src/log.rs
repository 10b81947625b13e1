//! Operation log entries and whole-log replay verification.

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EntryError, LogError};
use crate::keys;
use crate::operation::{verify_signature_any, Operation, RegularOp};

/// Nullified operations may be overridden by a higher-priority rotation
/// key for this long after the earliest nullified entry.
fn recovery_window() -> Duration {
    Duration::hours(72)
}

/// A single record from the directory's operation log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub did: String,
    pub operation: Operation,
    pub cid: String,
    pub nullified: bool,
    /// Wire-form timestamp, kept as received: entry ordering compares
    /// these strings bytewise, which is sound for the directory's
    /// UTC/`Z` RFC 3339 profile.
    pub created_at: String,
}

impl LogEntry {
    /// Checks self-consistency of this log entry in isolation: the claimed
    /// CID matches the operation, and for genesis operations the claimed
    /// DID matches the derived one and the signature verifies against the
    /// operation's own keys. Cross-entry invariants belong to
    /// [`LogVerifier`].
    pub fn validate(&self) -> Result<(), EntryError> {
        let computed = self.operation.cid()?.to_string();
        if self.cid != computed {
            return Err(EntryError::CidMismatch {
                claimed: self.cid.clone(),
                computed,
            });
        }

        // For non-genesis ops the authorizing key lives in a previous
        // entry; only genesis ops can be checked in isolation.
        match &self.operation {
            Operation::Regular(op) if self.operation.is_genesis() => {
                self.check_did()?;
                verify_signature_any(&self.operation, &op.rotation_keys)?;
            }
            Operation::Legacy(op) if self.operation.is_genesis() => {
                self.check_did()?;
                let public = keys::parse_public_did_key(&op.signing_key)?;
                self.operation.verify_signature(&public)?;
            }
            _ => (),
        }

        Ok(())
    }

    fn check_did(&self) -> Result<(), EntryError> {
        let computed = self.operation.did()?;
        if self.did != computed {
            return Err(EntryError::DidMismatch {
                claimed: self.did.clone(),
                computed,
            });
        }
        Ok(())
    }
}

/// Replay state for verifying an ordered operation log.
///
/// Feed entries to [`LogVerifier::apply`] in directory order and close
/// with [`LogVerifier::finish`]; only `finish` reports overall success.
/// Verification can be abandoned between entries by dropping the
/// verifier, so callers that need cooperative cancellation simply stop
/// driving the loop.
///
/// Handles both simple logs (active entries only) and audit logs (with
/// nullified entries interleaved).
#[derive(Debug, Default)]
pub struct LogVerifier {
    /// Authority source for the next signature: the last non-nullified
    /// regular (or converted legacy) operation.
    last_active: Option<RegularOp>,
    /// Wire-form timestamp of the last accepted non-nullified entry.
    last_ts: String,
    tombstoned: bool,
    /// Timestamp opening the current run of nullified entries.
    earliest_nullified: Option<String>,
    index: usize,
}

impl LogVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the next log entry, failing on the first violated
    /// invariant.
    pub fn apply(&mut self, entry: &LogEntry) -> Result<(), LogError> {
        let index = self.index;
        self.index += 1;

        entry
            .validate()
            .map_err(|error| LogError::Entry { index, error })?;

        let rotation_keys = match &self.last_active {
            Some(op) => op.rotation_keys.clone(),
            None => return self.apply_first(entry),
        };

        if entry.created_at.as_str() < self.last_ts.as_str() {
            return Err(LogError::NotOrdered { index });
        }
        if self.tombstoned {
            return Err(LogError::PostTombstone { index });
        }

        if !entry.nullified {
            if let Some(earliest) = &self.earliest_nullified {
                // The window is measured on parsed timestamps even though
                // ordering compares wire strings.
                let earliest = parse_ts(earliest).map_err(|_| LogError::BadTimestamp { index })?;
                let current =
                    parse_ts(&entry.created_at).map_err(|_| LogError::BadTimestamp { index })?;
                if current - earliest > recovery_window() {
                    return Err(LogError::RecoveryWindowExceeded { index });
                }
                self.earliest_nullified = None;
            }
        } else if self.earliest_nullified.is_none() {
            self.earliest_nullified = Some(entry.created_at.clone());
        }

        match &entry.operation {
            Operation::Regular(_) | Operation::Tombstone(_) => {
                verify_signature_any(&entry.operation, &rotation_keys).map_err(|error| {
                    LogError::Entry {
                        index,
                        error: error.into(),
                    }
                })?;
            }
            Operation::Legacy(_) => return Err(LogError::LegacyOpNotFirst { index }),
        }

        if entry.nullified {
            return Ok(());
        }

        match &entry.operation {
            Operation::Regular(op) => {
                self.last_active = Some(op.clone());
                self.last_ts = entry.created_at.clone();
            }
            Operation::Tombstone(_) => {
                // Tombstones carry no keys; the last authority stands.
                self.tombstoned = true;
                self.last_ts = entry.created_at.clone();
            }
            Operation::Legacy(_) => unreachable!("rejected above"),
        }

        Ok(())
    }

    fn apply_first(&mut self, entry: &LogEntry) -> Result<(), LogError> {
        let op = match &entry.operation {
            Operation::Regular(op) if entry.operation.is_genesis() => op.clone(),
            Operation::Legacy(op) if entry.operation.is_genesis() => op.to_regular(),
            _ => return Err(LogError::FirstEntryWrongType),
        };

        if entry.nullified {
            return Err(LogError::FirstEntryNullified);
        }

        // The genesis signature was already verified against the
        // operation's own keys by the self-check.
        self.last_active = Some(op);
        self.last_ts = entry.created_at.clone();
        Ok(())
    }

    /// Closes the log, rejecting a trailing run of nullified entries that
    /// no later entry overrode.
    pub fn finish(self) -> Result<(), LogError> {
        if self.earliest_nullified.is_some() {
            return Err(LogError::UnresolvedNullification);
        }
        Ok(())
    }
}

/// Verifies an ordered list of log entries for a single DID.
pub fn verify_op_log(entries: &[LogEntry]) -> Result<(), LogError> {
    if entries.is_empty() {
        return Err(LogError::EmptyLog);
    }

    let mut verifier = LogVerifier::new();
    for entry in entries {
        verifier.apply(entry)?;
    }
    verifier.finish()?;

    debug!(entries = entries.len(), "operation log verified");
    Ok(())
}

fn parse_ts(ts: &str) -> chrono::ParseResult<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(ts)
}

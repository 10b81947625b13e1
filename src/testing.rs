//! A kit for generating operation logs with controlled defects.

use std::collections::HashMap;

use base64ct::{Base64Url, Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};

use crate::keys::{Algorithm, PrivateKey};
use crate::log::LogEntry;
use crate::operation::{
    LegacyOp, Operation, RegularOp, Service, ATPROTO_PDS_KIND, ATPROTO_PDS_TYPE,
    ATPROTO_VERIFICATION_METHOD,
};

/// The keys backing an identity as of a particular operation.
#[derive(Clone)]
struct Identity {
    rotation: Vec<PrivateKey>,
    signing: HashMap<String, PrivateKey>,
}

impl Identity {
    fn generate() -> Self {
        Self {
            rotation: vec![
                PrivateKey::generate(Algorithm::P256),
                PrivateKey::generate(Algorithm::P256),
            ],
            signing: HashMap::from([(
                ATPROTO_VERIFICATION_METHOD.to_string(),
                PrivateKey::generate(Algorithm::P256),
            )]),
        }
    }
}

pub(crate) struct TestLog {
    /// Keys of the last non-nullified operation.
    current: Identity,
    /// Key state as of each log entry, for signing with stale keys.
    states: Vec<Identity>,
    /// PLC data of the last non-nullified operation.
    active_data: RegularOp,
    did: String,
    entries: Vec<LogEntry>,
}

impl TestLog {
    /// Creates a valid log with a single genesis operation carrying two
    /// rotation keys.
    pub(crate) fn with_genesis() -> Self {
        let identity = Identity::generate();

        let data = RegularOp {
            rotation_keys: identity.rotation.iter().map(|k| k.did_key()).collect(),
            verification_methods: identity
                .signing
                .iter()
                .map(|(name, key)| (name.clone(), key.did_key()))
                .collect(),
            also_known_as: vec!["at://example.com".into()],
            services: HashMap::from([(
                ATPROTO_PDS_KIND.to_string(),
                Service {
                    r#type: ATPROTO_PDS_TYPE.into(),
                    endpoint: "https://bsky.social".into(),
                },
            )]),
            prev: None,
            sig: None,
        };

        let operation = add_signature(
            Operation::Regular(data.clone()),
            identity.rotation.last().unwrap(),
            SigKind::Normal,
        );
        let did = operation.did().unwrap();
        let entry = build_entry(did.clone(), operation, timestamp_for(0));

        Self {
            current: identity.clone(),
            states: vec![identity],
            active_data: data,
            did,
            entries: vec![entry],
        }
    }

    /// Creates a valid log with a legacy `create` genesis.
    pub(crate) fn with_legacy_genesis() -> Self {
        let signing = PrivateKey::generate(Algorithm::Secp256k1);
        let recovery = PrivateKey::generate(Algorithm::Secp256k1);

        let legacy = LegacyOp {
            signing_key: signing.did_key(),
            recovery_key: recovery.did_key(),
            handle: "example.com".into(),
            service: "https://bsky.social".into(),
            prev: None,
            sig: None,
        };
        let active_data = legacy.to_regular();

        let operation = add_signature(Operation::Legacy(legacy), &signing, SigKind::Normal);
        let did = operation.did().unwrap();
        let entry = build_entry(did.clone(), operation, timestamp_for(0));

        // Post-conversion authority is the recovery key alone.
        let identity = Identity {
            rotation: vec![recovery],
            signing: HashMap::from([(ATPROTO_VERIFICATION_METHOD.to_string(), signing)]),
        };

        Self {
            current: identity.clone(),
            states: vec![identity],
            active_data,
            did,
            entries: vec![entry],
        }
    }

    pub(crate) fn apply_update<F: FnOnce(Update) -> Update>(self, f: F) -> Self {
        f(Update::new(self)).build()
    }

    pub(crate) fn apply_tombstone<F: FnOnce(Tombstone) -> Tombstone>(self, f: F) -> Self {
        f(Tombstone::new(self)).build()
    }

    /// The log as the directory would return it.
    pub(crate) fn log(&self) -> Vec<LogEntry> {
        self.entries.clone()
    }

    pub(crate) fn did(&self) -> &str {
        &self.did
    }

    pub(crate) fn cid_for(&self, entry: usize) -> String {
        self.entries[entry].cid.clone()
    }

    fn next_timestamp(&self) -> String {
        timestamp_for(self.entries.len())
    }

    fn timestamp_after(&self, entry: usize, delta: Duration) -> String {
        let base = DateTime::parse_from_rfc3339(&self.entries[entry].created_at).unwrap();
        format_timestamp(base.with_timezone(&Utc) + delta)
    }
}

enum Signer {
    /// The least-authority rotation key of the current state.
    Default,
    /// A rotation key of the current state, by authority position.
    Rotation(usize),
    /// A rotation key as of an earlier entry.
    RotationFrom { entry: usize, authority: usize },
    /// The atproto signing key, which holds no rotation authority.
    Signing,
    /// A key that appears nowhere in the log.
    Unrelated,
}

enum SigKind {
    Normal,
    Padded,
    Invalid,
}

pub(crate) struct Update {
    log: TestLog,
    new_handle: Option<String>,
    new_pds: Option<String>,
    rotated_keys: Vec<usize>,
    broken_keys: Vec<usize>,
    signer: Signer,
    sig_kind: SigKind,
    nullified: bool,
    created_at: Option<String>,
}

impl Update {
    fn new(log: TestLog) -> Self {
        Self {
            log,
            new_handle: None,
            new_pds: None,
            rotated_keys: Vec::new(),
            broken_keys: Vec::new(),
            signer: Signer::Default,
            sig_kind: SigKind::Normal,
            nullified: false,
            created_at: None,
        }
    }

    pub(crate) fn change_handle(mut self, handle: &str) -> Self {
        assert!(self.new_handle.is_none());
        self.new_handle = Some(handle.into());
        self
    }

    pub(crate) fn change_pds(mut self, pds: &str) -> Self {
        assert!(self.new_pds.is_none());
        self.new_pds = Some(pds.into());
        self
    }

    /// Replaces the rotation key at the given authority with a fresh one.
    pub(crate) fn rotate_rotation_key(mut self, authority: usize) -> Self {
        self.rotated_keys.push(authority);
        self
    }

    /// Replaces the rotation key at the given authority with an
    /// unparseable did:key string.
    pub(crate) fn break_rotation_key(mut self, authority: usize) -> Self {
        self.broken_keys.push(authority);
        self
    }

    pub(crate) fn signed_with_key(mut self, authority: usize) -> Self {
        self.signer = Signer::Rotation(authority);
        self
    }

    pub(crate) fn signed_with_key_from(mut self, entry: usize, authority: usize) -> Self {
        self.signer = Signer::RotationFrom { entry, authority };
        self
    }

    pub(crate) fn signed_with_signing_key(mut self) -> Self {
        self.signer = Signer::Signing;
        self
    }

    pub(crate) fn signed_with_unrelated_key(mut self) -> Self {
        self.signer = Signer::Unrelated;
        self
    }

    pub(crate) fn padded_sig(mut self) -> Self {
        self.sig_kind = SigKind::Padded;
        self
    }

    pub(crate) fn invalid_sig(mut self) -> Self {
        self.sig_kind = SigKind::Invalid;
        self
    }

    pub(crate) fn nullified(mut self) -> Self {
        self.nullified = true;
        self
    }

    pub(crate) fn created_after(mut self, entry: usize, delta: Duration) -> Self {
        assert!(self.created_at.is_none());
        self.created_at = Some(self.log.timestamp_after(entry, delta));
        self
    }

    fn build(self) -> TestLog {
        let mut log = self.log;

        let mut new_data = log.active_data.clone();
        let mut new_state = log.current.clone();

        for authority in self.rotated_keys {
            let key = PrivateKey::generate(Algorithm::P256);
            new_data.rotation_keys[authority] = key.did_key();
            new_state.rotation[authority] = key;
        }
        for authority in self.broken_keys {
            new_data.rotation_keys[authority] = "did:key:unparseable".into();
        }
        if let Some(handle) = self.new_handle {
            new_data.also_known_as = vec![format!("at://{handle}")];
        }
        if let Some(endpoint) = self.new_pds {
            new_data
                .services
                .get_mut(ATPROTO_PDS_KIND)
                .expect("present")
                .endpoint = endpoint;
        }
        new_data.prev = Some(log.entries.last().expect("non-empty").cid.clone());

        let operation = add_signature(
            Operation::Regular(new_data.clone()),
            &select_signer(&log, &self.signer),
            self.sig_kind,
        );

        let created_at = self.created_at.unwrap_or_else(|| log.next_timestamp());
        let mut entry = build_entry(log.did.clone(), operation, created_at);
        entry.nullified = self.nullified;

        log.entries.push(entry);
        if self.nullified {
            log.states.push(log.current.clone());
        } else {
            log.states.push(new_state.clone());
            log.current = new_state;
            log.active_data = new_data;
        }

        log
    }
}

pub(crate) struct Tombstone {
    log: TestLog,
    signer: Signer,
    sig_kind: SigKind,
    nullified: bool,
    created_at: Option<String>,
}

impl Tombstone {
    fn new(log: TestLog) -> Self {
        Self {
            log,
            signer: Signer::Default,
            sig_kind: SigKind::Normal,
            nullified: false,
            created_at: None,
        }
    }

    pub(crate) fn signed_with_key(mut self, authority: usize) -> Self {
        self.signer = Signer::Rotation(authority);
        self
    }

    pub(crate) fn signed_with_key_from(mut self, entry: usize, authority: usize) -> Self {
        self.signer = Signer::RotationFrom { entry, authority };
        self
    }

    pub(crate) fn signed_with_signing_key(mut self) -> Self {
        self.signer = Signer::Signing;
        self
    }

    pub(crate) fn invalid_sig(mut self) -> Self {
        self.sig_kind = SigKind::Invalid;
        self
    }

    pub(crate) fn nullified(mut self) -> Self {
        self.nullified = true;
        self
    }

    pub(crate) fn created_after(mut self, entry: usize, delta: Duration) -> Self {
        assert!(self.created_at.is_none());
        self.created_at = Some(self.log.timestamp_after(entry, delta));
        self
    }

    fn build(self) -> TestLog {
        let mut log = self.log;

        let operation = add_signature(
            Operation::Tombstone(crate::operation::TombstoneOp {
                prev: log.entries.last().expect("non-empty").cid.clone(),
                sig: None,
            }),
            &select_signer(&log, &self.signer),
            self.sig_kind,
        );

        let created_at = self.created_at.unwrap_or_else(|| log.next_timestamp());
        let mut entry = build_entry(log.did.clone(), operation, created_at);
        entry.nullified = self.nullified;

        log.entries.push(entry);
        log.states.push(log.current.clone());

        log
    }
}

fn select_signer(log: &TestLog, signer: &Signer) -> PrivateKey {
    match signer {
        Signer::Default => log.current.rotation.last().expect("non-empty").clone(),
        Signer::Rotation(authority) => log.current.rotation[*authority].clone(),
        Signer::RotationFrom { entry, authority } => {
            log.states[*entry].rotation[*authority].clone()
        }
        Signer::Signing => log
            .current
            .signing
            .get(ATPROTO_VERIFICATION_METHOD)
            .expect("exists")
            .clone(),
        Signer::Unrelated => PrivateKey::generate(Algorithm::P256),
    }
}

fn add_signature(operation: Operation, key: &PrivateKey, sig_kind: SigKind) -> Operation {
    let unsigned = operation.unsigned_bytes().unwrap();

    let sig_bytes = key.sign(match sig_kind {
        SigKind::Invalid => &[],
        _ => &unsigned[..],
    });

    let sig = match sig_kind {
        SigKind::Padded => Base64Url::encode_string(&sig_bytes),
        _ => Base64UrlUnpadded::encode_string(&sig_bytes),
    };

    let mut operation = operation;
    match &mut operation {
        Operation::Regular(op) => op.sig = Some(sig),
        Operation::Legacy(op) => op.sig = Some(sig),
        Operation::Tombstone(op) => op.sig = Some(sig),
    }
    operation
}

fn build_entry(did: String, operation: Operation, created_at: String) -> LogEntry {
    let cid = operation.cid().unwrap().to_string();

    LogEntry {
        did,
        operation,
        cid,
        nullified: false,
        created_at,
    }
}

fn timestamp_for(entry: usize) -> String {
    let base = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    format_timestamp(base + Duration::minutes(entry as i64))
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

//! A thin JSON-over-HTTP client for the PLC directory.
//!
//! Requests are plain async calls; dropping a returned future aborts the
//! request, and per-request deadlines come from the configured
//! [`reqwest::Client`]. No retry policy is applied here.

use reqwest::StatusCode;
use tracing::debug;

use crate::doc::Doc;
use crate::error::ClientError;
use crate::log::LogEntry;
use crate::operation::Operation;
use crate::util::is_did_plc;

pub const DEFAULT_DIRECTORY_URL: &str = "https://plc.directory";
const DEFAULT_USER_AGENT: &str = concat!("didplc/", env!("CARGO_PKG_VERSION"));

/// Client for a PLC directory. [`Client::new`] talks to the default
/// public directory.
#[derive(Clone, Debug)]
pub struct Client {
    directory_url: String,
    http: reqwest::Client,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(DEFAULT_DIRECTORY_URL)
    }
}

impl Client {
    pub fn new(directory_url: impl Into<String>) -> Self {
        Self::with_user_agent(directory_url, DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(directory_url: impl Into<String>, user_agent: &str) -> Self {
        Self {
            directory_url: directory_url.into(),
            http: reqwest::Client::builder()
                .user_agent(user_agent)
                .build()
                .expect("client config is static"),
        }
    }

    /// Fetches the current DID document for `did`.
    pub async fn resolve(&self, did: &str) -> Result<Doc, ClientError> {
        let url = format!("{}/{}", self.directory_url, check_did(did)?);
        debug!(%url, "resolving DID document");

        let resp = check_status(self.http.get(url).send().await?)?;
        resp.json().await.map_err(ClientError::Decode)
    }

    /// Submits a signed operation for `did`, returning the log entry the
    /// directory recorded.
    pub async fn submit(&self, did: &str, op: &Operation) -> Result<LogEntry, ClientError> {
        let url = format!("{}/{}", self.directory_url, check_did(did)?);
        debug!(%url, "submitting operation");

        let resp = check_status(self.http.post(url).json(op).send().await?)?;
        resp.json().await.map_err(ClientError::Decode)
    }

    /// Fetches the ordered operation log for `did`. With `audit` set the
    /// directory includes nullified entries.
    pub async fn op_log(&self, did: &str, audit: bool) -> Result<Vec<LogEntry>, ClientError> {
        let mut url = format!("{}/{}/log", self.directory_url, check_did(did)?);
        if audit {
            url.push_str("/audit");
        }
        debug!(%url, "fetching operation log");

        let resp = check_status(self.http.get(url).send().await?)?;
        resp.json().await.map_err(ClientError::Decode)
    }
}

fn check_did(did: &str) -> Result<&str, ClientError> {
    if is_did_plc(did) {
        Ok(did)
    } else {
        Err(ClientError::BadDidFormat(did.into()))
    }
}

fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    match resp.status() {
        StatusCode::NOT_FOUND => Err(ClientError::DidNotFound),
        status if status.is_success() => Ok(resp),
        status => Err(ClientError::UnexpectedStatus(status)),
    }
}

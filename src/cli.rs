use clap::{Args, Parser, Subcommand};

use didplc::client::DEFAULT_DIRECTORY_URL;

#[derive(Debug, Parser)]
pub(crate) struct Options {
    /// Method, hostname, and port of the PLC registry.
    #[arg(long, env = "PLC_HOST", default_value = DEFAULT_DIRECTORY_URL, global = true)]
    pub(crate) plc_host: String,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    Resolve(Resolve),
    Submit(Submit),
    Oplog(Oplog),
    Verify(Verify),
}

/// Resolves a DID to its document from the remote PLC directory
#[derive(Debug, Args)]
pub(crate) struct Resolve {
    pub(crate) did: String,
}

/// Submits a PLC operation (reads JSON from stdin)
#[derive(Debug, Args)]
pub(crate) struct Submit {
    pub(crate) did: String,

    /// Private key used as a rotation key, if the operation is not signed
    /// (multibase syntax).
    #[arg(long, env = "PLC_PRIVATE_ROTATION_KEY")]
    pub(crate) rotation_key: Option<String>,
}

/// Fetches the log of operations for a single DID
#[derive(Debug, Args)]
pub(crate) struct Oplog {
    pub(crate) did: String,

    /// Audit mode, with nullified entries included.
    #[arg(long)]
    pub(crate) audit: bool,
}

/// Fetches the operation log for a DID and verifies all operations
#[derive(Debug, Args)]
pub(crate) struct Verify {
    pub(crate) did: String,

    /// Audit mode, with nullified entries included.
    #[arg(long)]
    pub(crate) audit: bool,
}

//! Client library for the `did:plc` DID method.
//!
//! A `did:plc` identity is defined by a signed, append-only log of
//! operations hosted by a directory service. This crate implements the
//! pieces that have to be byte-exact across implementations — canonical
//! DAG-CBOR operation encoding, content addressing, genesis DID
//! derivation, and did:key signature checks — plus a replay verifier for
//! whole operation logs and a thin HTTP client for the directory.
//!
//! Typical use:
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = didplc::client::Client::default();
//! let entries = client.op_log("did:plc:ewvi7nxzyoun6zhxrhs64oiz", true).await?;
//! didplc::log::verify_op_log(&entries)?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod doc;
mod encoding;
pub mod error;
pub mod keys;
pub mod log;
pub mod operation;
mod util;

#[cfg(test)]
mod testing;

pub use error::{ClientError, EntryError, Error, LogError};

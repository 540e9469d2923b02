//! Runtime-agnostic client for the Commander daemon
//!
//! Commander exposes a small JSON API over HTTP/1.1 on a Unix domain socket.
//! This crate speaks that API: it lists the commands the daemon has
//! registered, dispatches a command with parameters, and reads the daemon's
//! status and per-command configuration.
//!
//! # Architecture
//!
//! The client is built on runtime-agnostic primitives:
//!
//! - `async-net` for the Unix socket
//! - `async-io` for request deadlines
//! - `futures-lite` for buffered I/O
//!
//! Callers choose how to drive it, e.g. `smol::block_on` for a blocking CLI.
//!
//! # Example
//!
//! ```no_run
//! use commander_client::{CommanderClient, Parameters};
//! use serde_json::json;
//!
//! # async fn example() -> commander_client::Result<()> {
//! let mut client = CommanderClient::new("/tmp/commander.sock")?;
//!
//! let listing = client.list_commands().await?;
//! println!("{} commands available", listing.count);
//!
//! let mut parameters = Parameters::new();
//! parameters.insert("message".into(), json!("hello"));
//! let response = client.dispatch("echo", parameters).await?;
//! println!("{:?}", response.success());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod models;

pub use client::CommanderClient;
pub use config::{ClientConfig, DEFAULT_SOCKET_PATH};
pub use error::{Error, Result};
pub use models::*;

//! QapR — A pure-Rust client for the QAP1 wire protocol.
//!
//! QAP1 is the message-oriented protocol spoken by Rserve-compatible
//! servers: a statistical runtime evaluates expressions remotely and
//! exchanges typed value trees over TCP. This crate implements the client
//! side — the wire codec, the X-value model, packet framing, and a small
//! command surface (`eval`, `assign`, `login`, `shutdown`).
//!
//! # Architecture
//!
//! - **`wire`** — little-endian primitive (de)serialization
//! - **`types`** — the recursive X-value tree and NA sentinel handling
//! - **`sexp`** — X-value encoding/decoding
//! - **`packet`** — 16-byte packet headers and tagged entries
//! - **`ident`** — the 32-byte server identification blob
//! - **`client`** — transport and the high-level [`RserveClient`]
//!
//! # Example
//!
//! ```no_run
//! use qapr::{client::RserveClient, types::Rexp};
//!
//! # async fn run() -> Result<(), qapr::error::QapError> {
//! let mut client = RserveClient::new("127.0.0.1", qapr::client::DEFAULT_PORT, false);
//! client.assign("xs", Rexp::doubles_with_na(vec![1.0, -1e20], -1e20)).await?;
//! let doubled = client.eval("xs * 2").await?;
//! println!("{doubled}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod ident;
pub mod packet;
pub mod sexp;
pub mod types;
pub mod wire;

pub use client::{AuthScheme, RserveClient};
pub use error::QapError;
pub use types::Rexp;

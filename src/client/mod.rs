//! QAP1 client — connects to an Rserve-compatible server and runs
//! commands against it.

mod connection;
mod session;

pub use connection::QapConnection;
pub use session::{AuthScheme, RserveClient, DEFAULT_PORT};

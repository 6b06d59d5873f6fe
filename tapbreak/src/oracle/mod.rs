//! Client side of the bit-guessing oracle.
//!
//! - [`session`]: one connection, its epoch token and the guess primitive
//! - [`pool`]: sessions on a single epoch, populated in parallel
//! - [`extractor`]: the adaptive guessing loop that reveals the hidden bits
//! - [`transport`]: the `Connector` seam and its TCP implementation

pub mod extractor;
pub mod pool;
pub mod session;
pub mod transport;

pub use extractor::BitExtractor;
pub use pool::SessionPool;
pub use session::{OracleSession, SessionState};
pub use transport::{Connector, TcpConnector};

//! Handshake, RPC transport, and shutdown control.

pub mod handshake;
pub mod shutdown;
pub mod transport;

pub use handshake::*;
pub use shutdown::*;
pub use transport::{termination_signal, Transport};

//! Built-in connections.

pub mod dummy;

pub use dummy::DummyConnection;

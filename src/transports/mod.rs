//! Transport implementations

pub mod memory;
pub mod replay;
#[cfg(feature = "serial")]
pub mod serial;

pub use memory::{MemoryHandle, MemoryTransport};
pub use replay::ReplayTransport;
#[cfg(feature = "serial")]
pub use serial::SerialTransport;

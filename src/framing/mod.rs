//! Stream framing: wire layout and the frame scanner.

mod scanner;
pub mod wire;

pub use scanner::{FrameScanner, ScanOutcome};
pub use wire::{FRAME_SIZE, SENTINEL, WIRE_FRAME_SIZE, encode_frame, encode_payload};

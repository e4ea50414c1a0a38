//! Serial wire framing, the transport contract, and the USB worker (SPEC_FULL.md §4.7).

pub mod frame;
pub mod port;
pub mod worker;

pub use frame::{decode_rx, encode_tx, FrameError};
pub use port::{LoopbackPort, RealSerialPort, SerialPort};
pub use worker::spawn;

//! Upload of a generated session to the task microcontroller.
//!
//! Every packet is echoed back by the device and compared with what was sent
//! before the next one goes out. See `PROTOCOL.md` at the repository root for
//! the byte layout.

pub mod channel;
pub mod error;
pub mod metadata;
pub mod packet;
pub mod protocol;
pub mod retry;

pub use channel::{list_ports, Fault, LoopbackChannel, SerialChannel, SerialPortChannel};
pub use error::{DecodeError, EncodeError, LinkError, TransferError};
pub use metadata::Metadata;
pub use packet::{decode_array, encode_array, FramedPacket, STATUS_COMPLETE};
pub use protocol::{
    CancelToken, PacketIdPolicy, TransferOptions, TransferProtocol, TransferReport, TransferState,
};
pub use retry::RetryPolicy;

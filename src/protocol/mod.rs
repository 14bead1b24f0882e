pub mod checksum;
pub mod frame;
pub mod header;

pub use checksum::{crc16, Crc16};
pub use frame::{FrameError, Trailer};
pub use header::{Header, PacketType, TransferFlags};

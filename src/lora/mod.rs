pub mod link;
pub mod traits;

pub use link::ReliableLink;
pub use traits::{LoraError, LoraRadio, RxPacket};

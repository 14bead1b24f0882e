pub mod counters;
pub mod descriptor;
pub mod error;
#[cfg(test)]
pub mod mock;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod traits;

pub use counters::SessionCounters;
pub use descriptor::{TransferDescriptor, TransferName};
pub use error::{ErrorFlags, TransferError};
pub use receiver::{ReceiveEvent, ReceivedTransfer, Receiver};
pub use sender::{Sender, SenderState};
pub use session::{TransferReport, TransferSession};
pub use traits::{LinkError, Received, Transport};

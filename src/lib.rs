//! Reliable segmented transfer of files and arrays over LoRa
//!
//! Content is split into segments sent one at a time, each acknowledged
//! before the next. A transfer is opened, its segments are sent with
//! ACK/NACK resync, and it is closed with a length and CRC check of what
//! the receiver stored.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod clock;
pub mod config;
pub mod lora;
pub mod protocol;
pub mod storage;
pub mod transfer;

pub use clock::Clock;
pub use config::{LinkConfig, TransferConfig};
pub use transfer::{Receiver, TransferError, TransferSession};

pub mod array;
#[cfg(any(test, feature = "std"))]
pub mod file;
pub mod simulated;
pub mod traits;

pub use array::{ArraySink, ArraySource};
#[cfg(any(test, feature = "std"))]
pub use file::{FileSink, FileSource};
pub use simulated::{NullSink, SimulatedSource};
pub use traits::{SegmentSink, SegmentSource, StorageError};

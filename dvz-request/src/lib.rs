// Request Protocol (§4.D) and Requester (§4.E)
//
// The versioned, serializable command protocol at the heart of the engine:
// typed request records, batches, construction helpers, YAML pretty
// printing, binary dump/load, and the multi-producer requester FIFO that
// feeds committed batches to a consumer.
//
// Austin Shafer - 2020

pub mod batch;
pub mod constructors;
pub mod id;
pub mod print;
pub mod requester;
pub mod types;

pub use batch::{Batch, BatchError};
pub use constructors::Builder;
pub use id::{IdAllocator, ID_NONE};
pub use requester::Requester;
pub use types::*;

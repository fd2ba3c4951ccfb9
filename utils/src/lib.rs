// A set of helper structs for common operations
//
// Austin Shafer - 2020
pub mod timing;
#[macro_use]
pub mod logging;
pub mod log;

extern crate anyhow;
pub use anyhow::{anyhow, Context, Error, Result};

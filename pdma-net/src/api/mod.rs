pub mod error;
pub mod pdma;

pub use error::{Errno, Error, Result};

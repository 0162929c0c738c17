pub mod cmd;
pub mod error;
pub mod protocol;
pub mod session;
pub mod tracer;

pub use error::{Error, Result};

pub mod command_stream;
pub mod error;
pub mod output_macros;

pub use error::{KdevError, Result};

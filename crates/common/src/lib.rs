//! Common types shared by the River chain crates

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{stream_id_hex, BlockNum, StreamId};

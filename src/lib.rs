pub mod bot;
pub mod config;
pub mod error;
pub mod quiz;
pub mod store;

pub use error::{Error, Result};

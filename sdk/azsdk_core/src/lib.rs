#![doc = include_str!("../README.md")]

pub mod auth;
pub mod challenge;
pub mod client;
pub mod error;
pub mod models;

#[cfg(feature = "test-support")]
pub mod test_support;

pub use error::{AzureError, AzureResult};

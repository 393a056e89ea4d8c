pub mod analysis;
pub mod config;
pub mod decoding;
pub mod errors;
pub mod processor;
pub mod types;

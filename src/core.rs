//! # Core Utilities

pub mod generate;
pub mod pkce;
pub mod urlencode;

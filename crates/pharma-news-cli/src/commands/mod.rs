//! CLI command implementations.

pub mod comments;
pub mod posts;
pub mod proxy;
pub mod session;

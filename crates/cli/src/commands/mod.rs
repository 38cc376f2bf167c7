//! CLI command implementations

pub mod deploy;
pub mod hardware;
pub mod status;
pub mod templates;

pub mod cli;
pub mod config;
pub mod directory;
pub mod dns;
pub mod error;
pub mod k8s;

pub use error::{PodnsError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, ProviderSettings};
pub use error::UnknownPlatform;
pub use types::*;

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, ExtractConfig, FetchConfig, RefreshConfig};
pub use error::DiscoverError;
pub use types::*;

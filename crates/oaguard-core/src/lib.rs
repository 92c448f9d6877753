pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use config::{AppConfig, CacheConfig, DomainsConfig, RegistryConfig, SubmitConfig};
pub use error::{CoreError, Result};
pub use models::*;
pub use storage::kv::KvStore;

//! Infrastructure layer: storage, configuration, and the application
//! services that run each core operation as one unit of work.

pub mod config;
pub mod error;
pub mod registry;
pub mod services;
pub mod store;


pub use config::{AppConfig, ConfigError};
pub use error::{ServiceError, ServiceResult};
pub use registry::MembershipRegistry;
pub use services::Clubhouse;
pub use store::{InMemoryStore, Store, StoreError, StoreResult, Transaction};

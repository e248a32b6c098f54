// Formgate - Authenticated request gateway for the form-builder admin API

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;

pub use auth::{CredentialPair, CredentialStore, MemoryStore, SqliteStore};
pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use gateway::{AuthGateway, RequestDescriptor};

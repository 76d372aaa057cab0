pub mod auth;
pub mod client;
pub mod error;
pub mod manifest;

pub use auth::Credentials;
pub use client::{RegistryClient, RegistryConfig};
pub use error::RegistryError;
pub use manifest::PlatformSelector;

//! # Store Providers
//!
//! The orchestrator boundary consumed by the rotation pipeline.
//!
//! - `SecretStore` - list, create and delete secret objects
//! - `ServiceStore` - list services and update their secret references
//!
//! Implementations:
//! - `docker` - Docker Engine API (Swarm mode) over TCP/TLS or the unix socket
//! - `memory` - in-memory swarm used by tests

pub mod docker;
pub mod memory;

pub use docker::DockerSwarm;
pub use memory::InMemorySwarm;

use crate::model::{NewSecret, SecretObject, SecretReference, Service};
use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;

/// Failure talking to the orchestrator
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request never produced a response (connection refused, timeout, TLS)
    #[error("{operation}: failed to reach the Docker daemon at {endpoint}: {message}")]
    Transport {
        operation: String,
        endpoint: String,
        message: String,
    },
    /// The API answered with a non-success status
    #[error("{operation} failed with HTTP {status}: {message}")]
    Api {
        operation: String,
        status: u16,
        message: String,
    },
    /// The API answered with a body we could not understand
    #[error("{operation}: unexpected response: {message}")]
    Malformed { operation: String, message: String },
    /// The object changed between read and write
    #[error("{operation}: {message}")]
    Conflict { operation: String, message: String },
    /// Client configuration is unusable (bad host URL, unreadable TLS material)
    #[error("invalid Docker client configuration: {0}")]
    Config(String),
}

/// Secret storage of the orchestrator
#[async_trait]
pub trait SecretStore: Debug + Send + Sync {
    /// List every secret (identity and labels, never payloads)
    async fn list_secrets(&self) -> Result<Vec<SecretObject>, ProviderError>;

    /// Create a secret; fails if the name is already taken
    async fn create_secret(&self, secret: &NewSecret) -> Result<SecretObject, ProviderError>;

    /// Delete a secret by identity
    async fn delete_secret(&self, secret: &SecretObject) -> Result<(), ProviderError>;
}

/// Service scheduling of the orchestrator
#[async_trait]
pub trait ServiceStore: Debug + Send + Sync {
    async fn list_services(&self) -> Result<Vec<Service>, ProviderError>;

    /// Replace the service's entire secret reference list
    ///
    /// Implementations must refuse the update if the service's references
    /// changed since `service` was read.
    async fn update_service_secrets(
        &self,
        service: &Service,
        secrets: &[SecretReference],
    ) -> Result<(), ProviderError>;
}

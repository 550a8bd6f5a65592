//! # Docker Swarm Provider
//!
//! Secret and service stores backed by the Docker Engine API.
//!
//! Native REST implementation: requests are plain JSON over HTTP, either to a
//! TCP endpoint (a socket proxy or a TLS-protected manager) or to the local
//! unix socket. Every call is a single request; nothing is retried.

mod requests;
mod responses;
mod transport;

use self::requests::CreateSecretRequest;
use self::responses::{
    CreatedResponse, ErrorResponse, SecretResponse, ServiceResponse, ServiceUpdateResponse,
    CONTAINER_SPEC_POINTER,
};
use self::transport::{ApiResponse, Transport, Verb};
use crate::config::DockerConfig;
use crate::model::{NewSecret, SecretObject, SecretReference, Service};
use crate::provider::{ProviderError, SecretStore, ServiceStore};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Docker Engine API client for a swarm manager
#[derive(Debug, Clone)]
pub struct DockerSwarm {
    transport: Transport,
    api_version: String,
}

impl DockerSwarm {
    /// Create a client from configuration
    ///
    /// No request is made; an unreachable daemon surfaces on the first call.
    pub fn new(config: &DockerConfig) -> Result<Self, ProviderError> {
        let endpoint = config
            .endpoint()
            .map_err(|e| ProviderError::Config(e.to_string()))?;
        let transport = Transport::new(endpoint, config.timeout())?;
        debug!(
            "Docker client targets {} (API v{})",
            transport.describe(),
            config.api_version
        );
        Ok(Self {
            transport,
            api_version: config.api_version.clone(),
        })
    }

    /// Daemon address, for logs
    pub fn endpoint(&self) -> String {
        self.transport.describe()
    }

    async fn call(
        &self,
        operation: &str,
        verb: Verb,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<ApiResponse, ProviderError> {
        let path = format!("/v{}{}", self.api_version, path);
        debug!("Docker API {:?} {}", verb, path);

        let response = self
            .transport
            .send(verb, &path, body)
            .await
            .map_err(|message| ProviderError::Transport {
                operation: operation.to_string(),
                endpoint: self.transport.describe(),
                message,
            })?;

        if response.is_success() {
            Ok(response)
        } else {
            Err(api_error(operation, &response))
        }
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        verb: Verb,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<T, ProviderError> {
        let response = self.call(operation, verb, path, body).await?;
        decode(operation, &response)
    }

    async fn fetch_service(&self, id: &str) -> Result<ServiceResponse, ProviderError> {
        self.call_json(
            &format!("inspect service {id}"),
            Verb::Get,
            &format!("/services/{id}"),
            None,
        )
        .await
    }
}

fn decode<T: DeserializeOwned>(operation: &str, response: &ApiResponse) -> Result<T, ProviderError> {
    serde_json::from_slice(&response.body).map_err(|e| ProviderError::Malformed {
        operation: operation.to_string(),
        message: e.to_string(),
    })
}

fn encode<T: serde::Serialize>(operation: &str, body: &T) -> Result<Vec<u8>, ProviderError> {
    serde_json::to_vec(body).map_err(|e| ProviderError::Malformed {
        operation: operation.to_string(),
        message: format!("failed to encode request: {e}"),
    })
}

/// Turn a non-2xx response into an error, preferring the engine's own message
fn api_error(operation: &str, response: &ApiResponse) -> ProviderError {
    let message = serde_json::from_slice::<ErrorResponse>(&response.body).map_or_else(
        |_not_json| String::from_utf8_lossy(&response.body).trim().to_string(),
        |e| e.message,
    );
    ProviderError::Api {
        operation: operation.to_string(),
        status: response.status,
        message,
    }
}

#[async_trait]
impl SecretStore for DockerSwarm {
    async fn list_secrets(&self) -> Result<Vec<SecretObject>, ProviderError> {
        let secrets: Vec<SecretResponse> = self
            .call_json("list secrets", Verb::Get, "/secrets", None)
            .await?;
        Ok(secrets.into_iter().map(SecretObject::from).collect())
    }

    async fn create_secret(&self, secret: &NewSecret) -> Result<SecretObject, ProviderError> {
        let operation = format!("create secret {}", secret.name);
        let body = encode(&operation, &CreateSecretRequest::new(secret))?;
        let created: CreatedResponse = self
            .call_json(&operation, Verb::Post, "/secrets/create", Some(body))
            .await?;
        Ok(SecretObject {
            id: created.id,
            name: secret.name.to_string(),
            labels: secret.labels.clone(),
        })
    }

    async fn delete_secret(&self, secret: &SecretObject) -> Result<(), ProviderError> {
        self.call(
            &format!("delete secret {}", secret.name),
            Verb::Delete,
            &format!("/secrets/{}", secret.id),
            None,
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ServiceStore for DockerSwarm {
    async fn list_services(&self) -> Result<Vec<Service>, ProviderError> {
        let services: Vec<ServiceResponse> = self
            .call_json("list services", Verb::Get, "/services", None)
            .await?;
        Ok(services.iter().map(ServiceResponse::to_service).collect())
    }

    async fn update_service_secrets(
        &self,
        service: &Service,
        secrets: &[SecretReference],
    ) -> Result<(), ProviderError> {
        let operation = format!("update service {}", service.name);

        // Re-read the full spec: the update endpoint replaces the whole thing
        let current = self.fetch_service(&service.id).await?;
        if current.secrets() != service.secrets {
            return Err(ProviderError::Conflict {
                operation,
                message: format!(
                    "secrets of service {} changed since it was listed (version {} -> {})",
                    service.name, service.version, current.version.index
                ),
            });
        }

        let mut spec = current.spec;
        let replacement = serde_json::to_value(secrets).map_err(|e| ProviderError::Malformed {
            operation: operation.clone(),
            message: format!("failed to encode secret references: {e}"),
        })?;
        let container_spec = spec
            .pointer_mut(CONTAINER_SPEC_POINTER)
            .and_then(serde_json::Value::as_object_mut)
            .ok_or_else(|| ProviderError::Malformed {
                operation: operation.clone(),
                message: format!("service {} has no container spec", service.name),
            })?;
        container_spec.insert("Secrets".to_string(), replacement);

        let body = encode(&operation, &spec)?;
        let response = self
            .call(
                &operation,
                Verb::Post,
                &format!(
                    "/services/{}/update?version={}",
                    service.id, current.version.index
                ),
                Some(body),
            )
            .await?;

        // Older engines answer with an empty body
        let update: ServiceUpdateResponse = if response.body.is_empty() {
            ServiceUpdateResponse::default()
        } else {
            decode(&operation, &response)?
        };
        for warning in update.warnings.unwrap_or_default() {
            warn!("Docker warning while updating {}: {}", service.name, warning);
        }
        Ok(())
    }
}

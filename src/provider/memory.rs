//! # In-Memory Swarm
//!
//! A secret and service store held entirely in memory.
//!
//! Mirrors the Docker Engine behaviour the rotation depends on (unique secret
//! names, opaque ids, whole-list service updates) and records every call so
//! tests can assert on exactly which writes happened. Failures can be
//! injected per secret or service name.

use crate::model::{Labels, NewSecret, SecretObject, SecretPayload, SecretReference, Service};
use crate::provider::{ProviderError, SecretStore, ServiceStore};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A store call, as recorded by [`InMemorySwarm`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    ListSecrets,
    CreateSecret(String),
    DeleteSecret(String),
    ListServices,
    UpdateService(String),
}

#[derive(Debug, Clone)]
struct StoredSecret {
    object: SecretObject,
    payload: SecretPayload,
}

#[derive(Debug, Default)]
struct State {
    secrets: Vec<StoredSecret>,
    services: Vec<Service>,
    next_id: u64,
    calls: Vec<StoreCall>,
    failing_creates: BTreeSet<String>,
    failing_deletes: BTreeSet<String>,
    failing_updates: BTreeSet<String>,
}

impl State {
    fn mint_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:04}", self.next_id)
    }
}

#[derive(Debug, Default)]
pub struct InMemorySwarm {
    state: Mutex<State>,
}

impl InMemorySwarm {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a secret, returning its id
    pub fn insert_secret(&self, name: &str, payload: impl Into<SecretPayload>, labels: Labels) -> String {
        let mut state = self.state();
        let id = state.mint_id("secret-");
        state.secrets.push(StoredSecret {
            object: SecretObject {
                id: id.clone(),
                name: name.to_string(),
                labels,
            },
            payload: payload.into(),
        });
        id
    }

    /// Seed a service, returning its id
    pub fn insert_service(&self, name: &str, secrets: Option<Vec<SecretReference>>) -> String {
        let mut state = self.state();
        let id = state.mint_id("service-");
        state.services.push(Service {
            id: id.clone(),
            name: name.to_string(),
            version: 1,
            secrets,
        });
        id
    }

    /// Make `create_secret` fail for this name
    pub fn fail_create(&self, name: &str) {
        self.state().failing_creates.insert(name.to_string());
    }

    /// Make `delete_secret` fail for this name
    pub fn fail_delete(&self, name: &str) {
        self.state().failing_deletes.insert(name.to_string());
    }

    /// Make `update_service_secrets` fail for this service name
    pub fn fail_update(&self, service_name: &str) {
        self.state().failing_updates.insert(service_name.to_string());
    }

    pub fn secret(&self, name: &str) -> Option<SecretObject> {
        self.state()
            .secrets
            .iter()
            .find(|s| s.object.name == name)
            .map(|s| s.object.clone())
    }

    pub fn payload(&self, name: &str) -> Option<SecretPayload> {
        self.state()
            .secrets
            .iter()
            .find(|s| s.object.name == name)
            .map(|s| s.payload.clone())
    }

    /// Names of all stored secrets, sorted
    pub fn secret_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state()
            .secrets
            .iter()
            .map(|s| s.object.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn service(&self, name: &str) -> Option<Service> {
        self.state().services.iter().find(|s| s.name == name).cloned()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    /// Number of recorded updates of the named service
    pub fn update_count(&self, service_name: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, StoreCall::UpdateService(n) if n == service_name))
            .count()
    }
}

fn rejected(operation: String, status: u16, message: &str) -> ProviderError {
    ProviderError::Api {
        operation,
        status,
        message: message.to_string(),
    }
}

#[async_trait]
impl SecretStore for InMemorySwarm {
    async fn list_secrets(&self) -> Result<Vec<SecretObject>, ProviderError> {
        let mut state = self.state();
        state.calls.push(StoreCall::ListSecrets);
        Ok(state.secrets.iter().map(|s| s.object.clone()).collect())
    }

    async fn create_secret(&self, secret: &NewSecret) -> Result<SecretObject, ProviderError> {
        let mut state = self.state();
        let name = secret.name.to_string();
        state.calls.push(StoreCall::CreateSecret(name.clone()));

        let operation = format!("create secret {name}");
        if state.failing_creates.contains(&name) {
            return Err(rejected(operation, 500, "injected failure"));
        }
        if state.secrets.iter().any(|s| s.object.name == name) {
            return Err(rejected(
                operation,
                409,
                &format!("rpc error: code = AlreadyExists desc = secret {name} already exists"),
            ));
        }

        let object = SecretObject {
            id: state.mint_id("secret-"),
            name,
            labels: secret.labels.clone(),
        };
        state.secrets.push(StoredSecret {
            object: object.clone(),
            payload: secret.payload.clone(),
        });
        Ok(object)
    }

    async fn delete_secret(&self, secret: &SecretObject) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.calls.push(StoreCall::DeleteSecret(secret.name.clone()));

        let operation = format!("delete secret {}", secret.name);
        if state.failing_deletes.contains(&secret.name) {
            return Err(rejected(operation, 500, "injected failure"));
        }
        let in_use = state.services.iter().any(|svc| {
            svc.secrets
                .iter()
                .flatten()
                .any(|r| r.secret_id == secret.id)
        });
        if in_use {
            return Err(rejected(
                operation,
                400,
                &format!("secret '{}' is in use by a service", secret.name),
            ));
        }

        let before = state.secrets.len();
        state.secrets.retain(|s| s.object.id != secret.id);
        if state.secrets.len() == before {
            return Err(rejected(operation, 404, "secret not found"));
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceStore for InMemorySwarm {
    async fn list_services(&self) -> Result<Vec<Service>, ProviderError> {
        let mut state = self.state();
        state.calls.push(StoreCall::ListServices);
        Ok(state.services.clone())
    }

    async fn update_service_secrets(
        &self,
        service: &Service,
        secrets: &[SecretReference],
    ) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.calls.push(StoreCall::UpdateService(service.name.clone()));

        let operation = format!("update service {}", service.name);
        if state.failing_updates.contains(&service.name) {
            return Err(rejected(operation, 500, "injected failure"));
        }
        let unknown_secret = secrets
            .iter()
            .find(|r| !state.secrets.iter().any(|s| s.object.id == r.secret_id));
        if let Some(reference) = unknown_secret {
            return Err(rejected(
                operation,
                404,
                &format!("secret {} not found", reference.secret_name),
            ));
        }

        let stored = state
            .services
            .iter_mut()
            .find(|s| s.id == service.id)
            .ok_or_else(|| rejected(operation.clone(), 404, "service not found"))?;
        if stored.secrets != service.secrets {
            return Err(ProviderError::Conflict {
                operation,
                message: format!("secrets of service {} changed since it was listed", service.name),
            });
        }
        stored.secrets = Some(secrets.to_vec());
        stored.version += 1;
        Ok(())
    }
}

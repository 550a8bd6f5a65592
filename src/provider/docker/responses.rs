//! # Response Types
//!
//! Docker Engine API response bodies, reduced to the fields the rotation needs.

use crate::model::{Labels, SecretObject, SecretReference, Service};
use serde::Deserialize;
use tracing::warn;

/// Item of `GET /secrets`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SecretResponse {
    #[serde(rename = "ID")]
    pub id: String,
    pub spec: SecretSpecResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SecretSpecResponse {
    pub name: String,
    // The engine sends `null` for secrets created without labels
    #[serde(default)]
    pub labels: Option<Labels>,
}

impl From<SecretResponse> for SecretObject {
    fn from(value: SecretResponse) -> Self {
        Self {
            id: value.id,
            name: value.spec.name,
            labels: value.spec.labels.unwrap_or_default(),
        }
    }
}

/// `201 Created` body of `POST /secrets/create`
#[derive(Debug, Deserialize)]
pub(crate) struct CreatedResponse {
    #[serde(rename = "ID")]
    pub id: String,
}

/// Item of `GET /services` and body of `GET /services/{id}`
///
/// The spec is kept as raw JSON: updates must resubmit it in full.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ServiceResponse {
    #[serde(rename = "ID")]
    pub id: String,
    pub version: VersionResponse,
    pub spec: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct VersionResponse {
    pub index: u64,
}

/// JSON pointer to a service's secret references
pub(crate) const SECRETS_POINTER: &str = "/TaskTemplate/ContainerSpec/Secrets";

/// JSON pointer to the container spec that owns the references
pub(crate) const CONTAINER_SPEC_POINTER: &str = "/TaskTemplate/ContainerSpec";

impl ServiceResponse {
    pub fn name(&self) -> String {
        self.spec
            .get("Name")
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| self.id.clone(), str::to_string)
    }

    /// Secret references, `None` when absent or not in the expected shape
    pub fn secrets(&self) -> Option<Vec<SecretReference>> {
        let raw = self.spec.pointer(SECRETS_POINTER)?;
        if raw.is_null() {
            return None;
        }
        match serde_json::from_value(raw.clone()) {
            Ok(secrets) => Some(secrets),
            Err(e) => {
                warn!(
                    "Service {} has a malformed secrets list, ignoring it: {}",
                    self.name(),
                    e
                );
                None
            }
        }
    }

    pub fn to_service(&self) -> Service {
        Service {
            id: self.id.clone(),
            name: self.name(),
            version: self.version.index,
            secrets: self.secrets(),
        }
    }
}

/// Body of `POST /services/{id}/update`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ServiceUpdateResponse {
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

/// Error body returned by the engine for non-2xx responses
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service(spec: serde_json::Value) -> ServiceResponse {
        serde_json::from_value(json!({
            "ID": "svc1",
            "Version": {"Index": 42},
            "Spec": spec
        }))
        .unwrap()
    }

    #[test]
    fn test_secret_with_null_labels() {
        let response: SecretResponse = serde_json::from_value(json!({
            "ID": "abc",
            "Version": {"Index": 11},
            "Spec": {"Name": "cert_example.com", "Labels": null}
        }))
        .unwrap();
        let secret = SecretObject::from(response);
        assert_eq!(secret.name, "cert_example.com");
        assert!(secret.labels.is_empty());
    }

    #[test]
    fn test_service_with_secrets() {
        let svc = service(json!({
            "Name": "web",
            "TaskTemplate": {"ContainerSpec": {"Image": "nginx", "Secrets": [{
                "File": {"Name": "key.pem", "UID": "0", "GID": "0", "Mode": 256},
                "SecretID": "k1",
                "SecretName": "key_example.com"
            }]}}
        }));
        let converted = svc.to_service();
        assert_eq!(converted.name, "web");
        assert_eq!(converted.version, 42);
        let secrets = converted.secrets.unwrap();
        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets[0].secret_name, "key_example.com");
    }

    #[test]
    fn test_service_without_secrets() {
        let svc = service(json!({
            "Name": "worker",
            "TaskTemplate": {"ContainerSpec": {"Image": "busybox"}}
        }));
        assert_eq!(svc.secrets(), None);
    }

    #[test]
    fn test_service_with_malformed_secrets() {
        let svc = service(json!({
            "Name": "odd",
            "TaskTemplate": {"ContainerSpec": {"Secrets": "not-a-list"}}
        }));
        assert_eq!(svc.secrets(), None);
    }

    #[test]
    fn test_service_name_falls_back_to_id() {
        let svc = service(json!({}));
        assert_eq!(svc.name(), "svc1");
    }
}

//! # Request Types
//!
//! Docker Engine API request bodies.

use crate::model::{Labels, NewSecret};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use std::fmt;

/// Body of `POST /secrets/create`
///
/// The payload travels base64 encoded in `Data`.
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CreateSecretRequest<'a> {
    pub name: &'a str,
    pub labels: &'a Labels,
    pub data: String,
}

impl<'a> CreateSecretRequest<'a> {
    pub fn new(secret: &'a NewSecret) -> Self {
        Self {
            name: secret.name.as_str(),
            labels: &secret.labels,
            data: STANDARD.encode(secret.payload.as_bytes()),
        }
    }
}

impl fmt::Debug for CreateSecretRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateSecretRequest")
            .field("name", &self.name)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

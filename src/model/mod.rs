//! # Domain Model
//!
//! Types shared by the rotation pipeline and the store clients:
//!
//! - `kind` - the four kinds of certificate material
//! - `name` - validated secret names and version stamps
//! - `secret` - secret objects, labels and payloads
//! - `service` - services and their secret references

pub mod kind;
pub mod name;
pub mod secret;
pub mod service;

pub use kind::SecretKind;
pub use name::{sanitize_name_component, NameError, SecretName, VersionStamp};
pub use secret::{Labels, NewSecret, SecretObject, SecretPayload};
pub use service::{SecretFile, SecretReference, Service};

//! # Secret Kinds
//!
//! The kinds of certificate material produced by the ACME client.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of certificate material being rotated
///
/// Variants are declared in rotation order (key, cert, fullchain, chain).
/// When a secret name could belong to more than one configured kind, the
/// first kind in this order wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretKind {
    /// Private key (`privkey.pem`)
    #[serde(rename = "key")]
    PrivateKey,
    /// Leaf certificate (`cert.pem`)
    #[serde(rename = "cert")]
    Certificate,
    /// Certificate followed by the intermediate chain (`fullchain.pem`)
    FullChain,
    /// Intermediate chain only (`chain.pem`)
    Chain,
}

impl SecretKind {
    /// All kinds, in rotation order
    pub const ALL: [SecretKind; 4] = [
        SecretKind::PrivateKey,
        SecretKind::Certificate,
        SecretKind::FullChain,
        SecretKind::Chain,
    ];

    /// Environment variable holding the secret name prefix for this kind
    pub fn prefix_env_var(self) -> &'static str {
        match self {
            SecretKind::PrivateKey => "KEY_SECRET",
            SecretKind::Certificate => "CERT_SECRET",
            SecretKind::FullChain => "FULLCHAIN_SECRET",
            SecretKind::Chain => "CHAIN_SECRET",
        }
    }

    /// Short identifier used in logs and metric labels
    pub fn as_str(self) -> &'static str {
        match self {
            SecretKind::PrivateKey => "key",
            SecretKind::Certificate => "cert",
            SecretKind::FullChain => "fullchain",
            SecretKind::Chain => "chain",
        }
    }

    /// Human readable description
    pub fn description(self) -> &'static str {
        match self {
            SecretKind::PrivateKey => "SSL Private Key",
            SecretKind::Certificate => "SSL Certificate",
            SecretKind::FullChain => "SSL Full Chain",
            SecretKind::Chain => "SSL Chain",
        }
    }
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! # Label Inheritance
//!
//! A new snapshot carries the access labels of the secret currently trusted
//! for its kind: the unversioned alias.

use crate::model::{Labels, SecretName, SecretObject};

/// Labels of the live secret named exactly `alias`
///
/// `None` when no such secret exists (first run for this kind). Pure read
/// over a listing; never touches the store.
pub fn current_labels(secrets: &[SecretObject], alias: &SecretName) -> Option<Labels> {
    secrets
        .iter()
        .find(|secret| secret.name == alias.as_str())
        .map(|secret| secret.labels.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(name: &str, labels: &[(&str, &str)]) -> SecretObject {
        SecretObject {
            id: format!("id-{name}"),
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_labels_come_from_exact_alias_match() {
        let secrets = vec![
            secret("key_example.com_2023-12-01T00.00.00", &[("env", "stale")]),
            secret("key_example.com", &[("env", "prod")]),
        ];
        let alias = SecretName::new("key_example.com").unwrap();

        let labels = current_labels(&secrets, &alias).unwrap();
        assert_eq!(labels.get("env").map(String::as_str), Some("prod"));
    }

    #[test]
    fn test_missing_alias_yields_none() {
        let secrets = vec![secret("key_example.com_2023-12-01T00.00.00", &[("env", "prod")])];
        let alias = SecretName::new("key_example.com").unwrap();
        assert_eq!(current_labels(&secrets, &alias), None);
    }

    #[test]
    fn test_alias_without_labels_yields_empty_map() {
        let secrets = vec![secret("cert_example.com", &[])];
        let alias = SecretName::new("cert_example.com").unwrap();
        assert_eq!(current_labels(&secrets, &alias), Some(Labels::new()));
    }
}

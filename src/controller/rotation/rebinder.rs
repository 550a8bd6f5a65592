//! # Service Rebinder
//!
//! Moves every service that mounts a rotating kind onto the minted secrets.
//!
//! A service's secret list is replaced as a whole, so unaffected references
//! are resubmitted exactly as they were read. Each affected service gets one
//! update, however many of its references changed.

use super::minter::MintedSecrets;
use super::report::{RebindReport, ServiceOutcome, SkipReason};
use super::{RotationError, Stage};
use crate::config::FailurePolicy;
use crate::model::{SecretReference, Service};
use crate::observability::metrics;
use crate::provider::{ProviderError, ServiceStore};
use tracing::{debug, error, info, info_span, Instrument};

/// Rebuild a reference list against the minted secrets
///
/// Order and mount metadata are preserved; only the id and name of
/// references belonging to a minted kind change. Returns `None` when nothing
/// would change.
pub fn rebuild_references(
    current: &[SecretReference],
    minted: &MintedSecrets,
) -> Option<Vec<SecretReference>> {
    let mut changed = false;
    let rebuilt = current
        .iter()
        .map(|reference| match minted.classify(&reference.secret_name) {
            Some(secret) => {
                let rebound = reference.rebound_to(&secret.object);
                if rebound == *reference {
                    debug!("{}: already on the newest secret", reference.secret_name);
                } else {
                    debug!(
                        "{}: replacing {} with new secret {}",
                        reference.secret_name,
                        secret.kind().description(),
                        secret.object.name
                    );
                    changed = true;
                }
                rebound
            }
            None => {
                debug!(
                    "{}: not a changing secret, leaving as is",
                    reference.secret_name
                );
                reference.clone()
            }
        })
        .collect();
    changed.then_some(rebuilt)
}

fn reference_names(service: &Service) -> Vec<String> {
    service
        .secrets
        .iter()
        .flatten()
        .map(|r| r.secret_name.clone())
        .collect()
}

#[derive(Debug)]
pub struct ServiceRebinder<'a> {
    store: &'a dyn ServiceStore,
    policy: FailurePolicy,
}

impl<'a> ServiceRebinder<'a> {
    pub fn new(store: &'a dyn ServiceStore, policy: FailurePolicy) -> Self {
        Self { store, policy }
    }

    pub async fn rebind(&self, minted: &MintedSecrets) -> Result<RebindReport, RotationError> {
        let span = info_span!("rotation.rebind", changing = ?minted.changing_names());

        async move {
            debug!(
                "All the secrets that have changed are: {:?}",
                minted.changing_names()
            );
            let services = self
                .store
                .list_services()
                .await
                .map_err(|e| RotationError::store(Stage::Rebind, e))?;

            let mut report = RebindReport::default();
            for service in services {
                let outcome = self.rebind_service(service, minted).await?;
                report.outcomes.push(outcome);
            }

            info!(
                "Finished inspecting services, {} updated",
                report.updated_count()
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn rebind_service(
        &self,
        listed: Service,
        minted: &MintedSecrets,
    ) -> Result<ServiceOutcome, RotationError> {
        info!(
            "Inspecting service {} to see if it uses any changing secrets...",
            listed.name
        );

        let in_use = match listed.secrets.as_deref() {
            None | Some([]) => {
                info!("No secrets exist on {}", listed.name);
                metrics::record_service_skipped();
                return Ok(ServiceOutcome::Skipped {
                    service: listed.name,
                    reason: SkipReason::NoSecrets,
                });
            }
            Some(references) => references
                .iter()
                .filter(|r| minted.classify(&r.secret_name).is_some())
                .map(|r| r.secret_name.clone())
                .collect::<Vec<_>>(),
        };
        if in_use.is_empty() {
            info!("{} does not use any changing secrets.", listed.name);
            return Ok(ServiceOutcome::Unchanged {
                service: listed.name,
            });
        }

        info!(
            "{} uses {:?}. Recreating list of secrets to update the service with.",
            listed.name, in_use
        );

        // The store refuses the write if the list changed since it was listed
        match self.update(&listed, minted).await {
            Ok(Some(replaced)) => {
                metrics::record_service_rebound();
                Ok(ServiceOutcome::Updated {
                    service: listed.name,
                    replaced,
                })
            }
            // Every matching reference is already on the newest secret
            Ok(None) => Ok(ServiceOutcome::Unchanged {
                service: listed.name,
            }),
            Err(e) if self.policy == FailurePolicy::Continue => {
                error!(
                    "Failed to update {}, it keeps its current secrets: {}",
                    listed.name, e
                );
                metrics::increment_rotation_errors(Stage::Rebind.as_str());
                Ok(ServiceOutcome::Failed {
                    references: reference_names(&listed),
                    service: listed.name,
                    error: e.to_string(),
                })
            }
            Err(e) => Err(RotationError::store(Stage::Rebind, e)),
        }
    }

    /// Submit the rebuilt list, returning the names it replaced
    async fn update(
        &self,
        service: &Service,
        minted: &MintedSecrets,
    ) -> Result<Option<Vec<String>>, ProviderError> {
        let current = service.secrets.as_deref().unwrap_or_default();
        let Some(rebuilt) = rebuild_references(current, minted) else {
            info!("{} already uses the new secrets.", service.name);
            return Ok(None);
        };

        let replaced = current
            .iter()
            .zip(&rebuilt)
            .filter(|(before, after)| before != after)
            .map(|(before, _)| before.secret_name.clone())
            .collect();

        info!(
            "Updating {} with new secrets: {:?}",
            service.name,
            rebuilt.iter().map(|r| r.secret_name.as_str()).collect::<Vec<_>>()
        );
        self.store.update_service_secrets(service, &rebuilt).await?;
        Ok(Some(replaced))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::rotation::{MintedSecret, RotationTarget};
    use crate::model::{Labels, SecretFile, SecretKind, SecretName, SecretObject, SecretPayload};
    use crate::provider::memory::StoreCall;
    use crate::provider::InMemorySwarm;
    use std::path::PathBuf;

    fn minted(kinds: &[(SecretKind, &str, &str)]) -> MintedSecrets {
        kinds
            .iter()
            .map(|(kind, prefix, id)| {
                let alias = SecretName::unversioned(prefix, "example.com").unwrap();
                let versioned =
                    SecretName::new(format!("{alias}_2024-01-01T00.00.00")).unwrap();
                MintedSecret {
                    object: SecretObject {
                        id: (*id).to_string(),
                        name: versioned.to_string(),
                        labels: Labels::new(),
                    },
                    target: RotationTarget {
                        kind: *kind,
                        alias,
                        versioned,
                        source: PathBuf::from("/dev/null"),
                    },
                    payload: SecretPayload::from("new"),
                }
            })
            .collect()
    }

    fn reference(name: &str, id: &str, file: &str) -> SecretReference {
        SecretReference {
            file: SecretFile {
                name: file.to_string(),
                uid: "101".to_string(),
                gid: "102".to_string(),
                mode: 0o400,
            },
            secret_id: id.to_string(),
            secret_name: name.to_string(),
        }
    }

    #[test]
    fn test_rebuild_replaces_only_affected_references() {
        let minted = minted(&[(SecretKind::PrivateKey, "key", "new-key")]);
        let current = vec![
            reference("unrelated_secret", "u1", "a.txt"),
            reference("key_example.com", "old-key", "privkey.pem"),
            reference("other_secret", "u2", "b.txt"),
        ];

        let rebuilt = rebuild_references(&current, &minted).unwrap();

        assert_eq!(rebuilt.len(), 3);
        assert_eq!(rebuilt[0], current[0]);
        assert_eq!(rebuilt[2], current[2]);
        assert_eq!(rebuilt[1].secret_id, "new-key");
        assert_eq!(rebuilt[1].secret_name, "key_example.com_2024-01-01T00.00.00");
        assert_eq!(rebuilt[1].file, current[1].file);
    }

    #[test]
    fn test_rebuild_catches_versioned_references() {
        let minted = minted(&[(SecretKind::Certificate, "cert", "new-cert")]);
        let current = vec![reference(
            "cert_example.com_2023-06-01T10.00.00",
            "old",
            "cert.pem",
        )];
        let rebuilt = rebuild_references(&current, &minted).unwrap();
        assert_eq!(rebuilt[0].secret_id, "new-cert");
    }

    #[test]
    fn test_rebuild_without_affected_references_is_none() {
        let minted = minted(&[(SecretKind::PrivateKey, "key", "new-key")]);
        let current = vec![
            reference("unrelated_secret", "u1", "a.txt"),
            reference("key_example.com.au", "au", "privkey.pem"),
        ];
        assert_eq!(rebuild_references(&current, &minted), None);
    }

    #[test]
    fn test_rebuild_first_kind_wins() {
        // cert alias "x_example.com" covers "x_example.com_y..." of the key kind
        let minted = minted(&[
            (SecretKind::PrivateKey, "x", "from-key"),
            (SecretKind::Certificate, "x_example.com_y", "from-cert"),
        ]);
        let current = vec![reference("x_example.com_y_example.com", "old", "f")];
        let rebuilt = rebuild_references(&current, &minted).unwrap();
        assert_eq!(rebuilt[0].secret_id, "from-key");
    }

    #[tokio::test]
    async fn test_one_update_per_service() {
        let swarm = InMemorySwarm::new();
        let key_id = swarm.insert_secret("key_example.com_2024-01-01T00.00.00", "k", Labels::new());
        let cert_id =
            swarm.insert_secret("cert_example.com_2024-01-01T00.00.00", "c", Labels::new());
        swarm.insert_service(
            "web",
            Some(vec![
                reference("key_example.com", "old-key", "privkey.pem"),
                reference("cert_example.com", "old-cert", "cert.pem"),
            ]),
        );
        swarm.insert_service("db", Some(vec![reference("db_password", "pw", "pw")]));
        swarm.insert_service("bare", None);

        let minted = minted(&[
            (SecretKind::PrivateKey, "key", key_id.as_str()),
            (SecretKind::Certificate, "cert", cert_id.as_str()),
        ]);
        let report = ServiceRebinder::new(&swarm, FailurePolicy::FailFast)
            .rebind(&minted)
            .await
            .unwrap();

        assert_eq!(swarm.update_count("web"), 1);
        assert_eq!(swarm.update_count("db"), 0);
        assert_eq!(swarm.update_count("bare"), 0);
        assert_eq!(
            report.outcomes,
            vec![
                ServiceOutcome::Updated {
                    service: "web".to_string(),
                    replaced: vec!["key_example.com".to_string(), "cert_example.com".to_string()],
                },
                ServiceOutcome::Unchanged {
                    service: "db".to_string()
                },
                ServiceOutcome::Skipped {
                    service: "bare".to_string(),
                    reason: SkipReason::NoSecrets
                },
            ]
        );

        let web = swarm.service("web").unwrap();
        let names: Vec<_> = web
            .secrets
            .unwrap()
            .into_iter()
            .map(|r| r.secret_name)
            .collect();
        assert_eq!(
            names,
            vec![
                "key_example.com_2024-01-01T00.00.00",
                "cert_example.com_2024-01-01T00.00.00"
            ]
        );
    }

    #[tokio::test]
    async fn test_unaffected_services_are_never_written() {
        let swarm = InMemorySwarm::new();
        let db = swarm.insert_service("db", Some(vec![reference("db_password", "pw", "pw")]));
        let minted = minted(&[(SecretKind::PrivateKey, "key", "new-key")]);

        ServiceRebinder::new(&swarm, FailurePolicy::FailFast)
            .rebind(&minted)
            .await
            .unwrap();

        assert_eq!(swarm.calls(), vec![StoreCall::ListServices]);
        assert_eq!(swarm.service("db").unwrap().id, db);
    }

    #[tokio::test]
    async fn test_affected_service_is_updated_straight_from_the_listing() {
        let swarm = InMemorySwarm::new();
        let key_id = swarm.insert_secret("key_example.com_2024-01-01T00.00.00", "k", Labels::new());
        swarm.insert_service("web", Some(vec![reference("key_example.com", "old", "k.pem")]));

        let minted = minted(&[(SecretKind::PrivateKey, "key", key_id.as_str())]);
        ServiceRebinder::new(&swarm, FailurePolicy::FailFast)
            .rebind(&minted)
            .await
            .unwrap();

        assert_eq!(
            swarm.calls(),
            vec![
                StoreCall::ListServices,
                StoreCall::UpdateService("web".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_update_failure_aborts_under_fail_fast() {
        let swarm = InMemorySwarm::new();
        let key_id = swarm.insert_secret("key_example.com_2024-01-01T00.00.00", "k", Labels::new());
        swarm.insert_service("api", Some(vec![reference("key_example.com", "old", "k.pem")]));
        swarm.insert_service("web", Some(vec![reference("key_example.com", "old", "k.pem")]));
        swarm.fail_update("api");

        let minted = minted(&[(SecretKind::PrivateKey, "key", key_id.as_str())]);
        let result = ServiceRebinder::new(&swarm, FailurePolicy::FailFast)
            .rebind(&minted)
            .await;

        assert!(matches!(
            result,
            Err(RotationError::Store { stage: Stage::Rebind, .. })
        ));
        assert_eq!(swarm.update_count("web"), 0);
    }

    #[tokio::test]
    async fn test_update_failure_is_recorded_under_continue() {
        let swarm = InMemorySwarm::new();
        let key_id = swarm.insert_secret("key_example.com_2024-01-01T00.00.00", "k", Labels::new());
        swarm.insert_service("api", Some(vec![reference("key_example.com", "old", "k.pem")]));
        swarm.insert_service("web", Some(vec![reference("key_example.com", "old", "k.pem")]));
        swarm.fail_update("api");

        let minted = minted(&[(SecretKind::PrivateKey, "key", key_id.as_str())]);
        let report = ServiceRebinder::new(&swarm, FailurePolicy::Continue)
            .rebind(&minted)
            .await
            .unwrap();

        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.updated_count(), 1);
        assert!(report.protected_names().contains("key_example.com"));
    }
}

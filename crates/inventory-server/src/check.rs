use inventory_authz::{
    Authorizer, CheckBulkItem, CheckBulkRequest, CheckBulkResponse, CheckRequest, CheckResponse,
    LookupResourcesRequest, LookupResourcesResponse,
};
use inventory_core::consistency::{Consistency, ConsistencyToken};
use inventory_core::model::ReporterResourceKey;
use inventory_core::tuple::{ObjectType, RelationsResource, RelationsSubject};
use inventory_storage::{ResourceRepository, Store, Transaction};

use crate::error::CheckError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsistencySettings {
    /// When off, every read minimizes latency regardless of what was asked.
    pub read_after_write_enabled: bool,
    /// Whether `Unspecified` reads wait for the resource's last replicated write.
    pub default_to_at_least_as_acknowledged: bool,
}

impl Default for ConsistencySettings {
    fn default() -> Self {
        Self {
            read_after_write_enabled: true,
            default_to_at_least_as_acknowledged: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceCheck {
    pub key: ReporterResourceKey,
    pub relation: String,
    pub subject: RelationsSubject,
}

/// Read-side permission checks that turn a requested [`Consistency`] into the
/// token presented to the backend.
#[derive(Debug, Clone)]
pub struct CheckService<S, A> {
    store: S,
    authorizer: A,
    settings: ConsistencySettings,
}

impl<S: Store, A: Authorizer> CheckService<S, A> {
    pub fn new(store: S, authorizer: A, settings: ConsistencySettings) -> Self {
        Self {
            store,
            authorizer,
            settings,
        }
    }

    pub fn settings(&self) -> ConsistencySettings {
        self.settings
    }

    pub fn effective_consistency(&self, requested: &Consistency) -> Consistency {
        if !self.settings.read_after_write_enabled {
            return Consistency::MinimizeLatency;
        }
        match requested {
            Consistency::Unspecified if self.settings.default_to_at_least_as_acknowledged => {
                Consistency::AtLeastAsAcknowledged
            }
            Consistency::Unspecified => Consistency::MinimizeLatency,
            other => other.clone(),
        }
    }

    /// The token to present for reads about `keys`. An empty token asks for
    /// the oldest state the backend still serves.
    pub async fn resolve_token(
        &self,
        keys: &[&ReporterResourceKey],
        requested: &Consistency,
    ) -> Result<ConsistencyToken, CheckError> {
        match self.effective_consistency(requested) {
            Consistency::AtLeastAsFresh(token) => Ok(token),
            Consistency::AtLeastAsAcknowledged => self.acknowledged_token(keys).await,
            Consistency::MinimizeLatency | Consistency::Unspecified => {
                Ok(ConsistencyToken::default())
            }
        }
    }

    /// Freshest token persisted on any of the resources.
    async fn acknowledged_token(
        &self,
        keys: &[&ReporterResourceKey],
    ) -> Result<ConsistencyToken, CheckError> {
        let tx = self.store.begin().await?;
        let mut freshest = ConsistencyToken::default();
        for key in keys {
            if let Some(resource) = tx.find_resource_by_keys(key).await?
                && (freshest.is_zero()
                    || resource.consistency_token().as_version() > freshest.as_version())
            {
                freshest = resource.consistency_token().clone();
            }
        }
        tx.rollback().await?;
        Ok(freshest)
    }

    pub async fn check(
        &self,
        key: &ReporterResourceKey,
        relation: &str,
        subject: &RelationsSubject,
        consistency: &Consistency,
    ) -> Result<CheckResponse, CheckError> {
        let consistency_token = self.resolve_token(&[key], consistency).await?;
        let request = CheckRequest {
            resource: RelationsResource::from_key(key),
            relation: relation.to_string(),
            subject: subject.clone(),
            consistency_token,
        };
        Ok(self.authorizer.check(&request).await?)
    }

    /// Always reads current state; use before read-modify-write.
    pub async fn check_for_update(
        &self,
        key: &ReporterResourceKey,
        relation: &str,
        subject: &RelationsSubject,
    ) -> Result<CheckResponse, CheckError> {
        let request = CheckRequest {
            resource: RelationsResource::from_key(key),
            relation: relation.to_string(),
            subject: subject.clone(),
            consistency_token: ConsistencyToken::default(),
        };
        Ok(self.authorizer.check_for_update(&request).await?)
    }

    pub async fn check_bulk(
        &self,
        checks: &[ResourceCheck],
        consistency: &Consistency,
    ) -> Result<CheckBulkResponse, CheckError> {
        let keys: Vec<&ReporterResourceKey> = checks.iter().map(|c| &c.key).collect();
        let consistency_token = self.resolve_token(&keys, consistency).await?;
        let request = CheckBulkRequest {
            items: checks
                .iter()
                .map(|c| CheckBulkItem {
                    resource: RelationsResource::from_key(&c.key),
                    relation: c.relation.clone(),
                    subject: c.subject.clone(),
                })
                .collect(),
            consistency_token,
        };
        Ok(self.authorizer.check_bulk(&request).await?)
    }

    /// Lookups are not tied to one resource, so acknowledged consistency
    /// degrades to the oldest served state.
    pub async fn lookup_resources(
        &self,
        resource_type: ObjectType,
        relation: &str,
        subject: &RelationsSubject,
        consistency: &Consistency,
    ) -> Result<LookupResourcesResponse, CheckError> {
        let consistency_token = self.resolve_token(&[], consistency).await?;
        let request = LookupResourcesRequest {
            resource_type,
            relation: relation.to_string(),
            subject: subject.clone(),
            consistency_token,
        };
        Ok(self.authorizer.lookup_resources(&request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory_authz::ReferenceAuthorizer;
    use inventory_core::model::{
        ApiHref, JsonObject, OperationType, ReporterMetadata, ReporterResourceId, Resource,
        ResourceId, ResourceReport, TransactionId,
    };
    use inventory_storage::InMemoryStore;
    use serde_json::json;

    fn key(local_id: &str) -> ReporterResourceKey {
        ReporterResourceKey::parse(local_id, "hbi", "host", "instance-a").unwrap()
    }

    fn alice() -> RelationsSubject {
        RelationsSubject::direct(RelationsResource::new(
            ObjectType::new("rbac", "principal"),
            "alice",
        ))
    }

    async fn store_with_token(local_id: &str, token: u64) -> InMemoryStore {
        let store = InMemoryStore::new();
        add_resource(&store, local_id, token).await;
        store
    }

    async fn add_resource(store: &InMemoryStore, local_id: &str, token: u64) {
        let data = |value: serde_json::Value| -> JsonObject { value.as_object().unwrap().clone() };
        let report = ResourceReport {
            key: key(local_id),
            metadata: ReporterMetadata::new(ApiHref::new("https://api.example.com/h").unwrap()),
            reporter_data: data(json!({"satellite_id": "sat-1"})),
            common_data: data(json!({"workspace_id": "ws-1"})),
        };
        let mut resource =
            Resource::create(ResourceId::generate(), ReporterResourceId::generate(), report)
                .unwrap();
        resource.set_consistency_token(ConsistencyToken::from_version(token));
        let mut tx = store.begin().await.unwrap();
        tx.save(
            resource,
            OperationType::Created,
            &TransactionId::new(format!("tx-{local_id}")).unwrap(),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    /// Version 1 is retained empty; version 2 grants alice view on host-1.
    fn authorizer() -> ReferenceAuthorizer {
        let authz = ReferenceAuthorizer::new();
        authz.retain_current_snapshot();
        authz.grant("alice", "view", "hbi", "host", "host-1");
        authz
    }

    fn fresh(version: u64) -> Consistency {
        Consistency::AtLeastAsFresh(ConsistencyToken::from_version(version))
    }

    // --- Consistency resolution ---

    #[tokio::test]
    async fn minimize_latency_reads_oldest_snapshot() {
        let service = CheckService::new(
            store_with_token("host-1", 2).await,
            authorizer(),
            ConsistencySettings::default(),
        );

        let response = service
            .check(&key("host-1"), "view", &alice(), &Consistency::MinimizeLatency)
            .await
            .unwrap();
        assert!(!response.allowed);
        assert_eq!(response.consistency_token.as_str(), "2");
    }

    #[tokio::test]
    async fn at_least_as_fresh_uses_the_given_token() {
        let service = CheckService::new(
            InMemoryStore::new(),
            authorizer(),
            ConsistencySettings::default(),
        );

        let response = service
            .check(&key("host-1"), "view", &alice(), &fresh(2))
            .await
            .unwrap();
        assert!(response.allowed);
    }

    #[tokio::test]
    async fn acknowledged_uses_the_persisted_token() {
        let service = CheckService::new(
            store_with_token("host-1", 2).await,
            authorizer(),
            ConsistencySettings::default(),
        );

        let response = service
            .check(
                &key("host-1"),
                "view",
                &alice(),
                &Consistency::AtLeastAsAcknowledged,
            )
            .await
            .unwrap();
        assert!(response.allowed);
    }

    #[tokio::test]
    async fn acknowledged_for_unknown_resource_uses_no_token() {
        let service = CheckService::new(
            InMemoryStore::new(),
            authorizer(),
            ConsistencySettings::default(),
        );

        let token = service
            .resolve_token(&[&key("host-1")], &Consistency::AtLeastAsAcknowledged)
            .await
            .unwrap();
        assert!(token.is_zero());
    }

    #[tokio::test]
    async fn unspecified_follows_the_default_setting() {
        let store = store_with_token("host-1", 2).await;
        let acknowledged = CheckService::new(
            store.clone(),
            authorizer(),
            ConsistencySettings::default(),
        );
        let latency = CheckService::new(
            store,
            authorizer(),
            ConsistencySettings {
                read_after_write_enabled: true,
                default_to_at_least_as_acknowledged: false,
            },
        );

        let allowed = acknowledged
            .check(&key("host-1"), "view", &alice(), &Consistency::Unspecified)
            .await
            .unwrap();
        let denied = latency
            .check(&key("host-1"), "view", &alice(), &Consistency::Unspecified)
            .await
            .unwrap();

        assert!(allowed.allowed);
        assert!(!denied.allowed);
    }

    #[tokio::test]
    async fn read_after_write_disabled_ignores_tokens() {
        let service = CheckService::new(
            InMemoryStore::new(),
            authorizer(),
            ConsistencySettings {
                read_after_write_enabled: false,
                default_to_at_least_as_acknowledged: true,
            },
        );

        assert_eq!(
            service.effective_consistency(&fresh(2)),
            Consistency::MinimizeLatency
        );
        let response = service
            .check(&key("host-1"), "view", &alice(), &fresh(2))
            .await
            .unwrap();
        assert!(!response.allowed);
    }

    // --- Other reads ---

    #[tokio::test]
    async fn check_for_update_reads_current_state() {
        let service = CheckService::new(
            InMemoryStore::new(),
            authorizer(),
            ConsistencySettings::default(),
        );

        let response = service
            .check_for_update(&key("host-1"), "view", &alice())
            .await
            .unwrap();
        assert!(response.allowed);
    }

    #[tokio::test]
    async fn bulk_acknowledged_uses_the_freshest_token() {
        let store = store_with_token("host-1", 2).await;
        add_resource(&store, "host-2", 1).await;
        let service = CheckService::new(store, authorizer(), ConsistencySettings::default());

        let checks = vec![
            ResourceCheck {
                key: key("host-2"),
                relation: "view".to_string(),
                subject: alice(),
            },
            ResourceCheck {
                key: key("host-1"),
                relation: "view".to_string(),
                subject: alice(),
            },
        ];
        let response = service
            .check_bulk(&checks, &Consistency::AtLeastAsAcknowledged)
            .await
            .unwrap();

        let allowed: Vec<bool> = response.pairs.iter().map(|(_, allowed)| *allowed).collect();
        assert_eq!(allowed, vec![false, true]);
    }

    #[tokio::test]
    async fn lookup_applies_the_same_freshness() {
        let service = CheckService::new(
            InMemoryStore::new(),
            authorizer(),
            ConsistencySettings::default(),
        );
        let hosts = ObjectType::new("hbi", "host");

        let stale = service
            .lookup_resources(hosts.clone(), "view", &alice(), &Consistency::MinimizeLatency)
            .await
            .unwrap();
        let current = service
            .lookup_resources(hosts, "view", &alice(), &fresh(2))
            .await
            .unwrap();

        assert!(stale.resources.is_empty());
        assert_eq!(current.resources, vec![RelationsResource::from_key(&key("host-1"))]);
    }
}

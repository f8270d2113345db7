//! In-memory run store for embedding hosts and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{OptimizationRun, RunSummary};
use crate::domain::ports::{validate_prefix, RunStore};

/// Keeps each run as a serialized document, so saves behave like a durable
/// overwrite and loads return an independent copy.
#[derive(Clone, Default)]
pub struct InMemoryRunStore {
    runs: Arc<RwLock<HashMap<Uuid, String>>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn save(&self, run: &OptimizationRun) -> DomainResult<()> {
        let document = serde_json::to_string(run)?;
        self.runs.write().await.insert(run.id, document);
        Ok(())
    }

    async fn load(&self, id: &str) -> DomainResult<OptimizationRun> {
        let uuid = Uuid::parse_str(id).map_err(|_| DomainError::RunNotFound(id.to_string()))?;
        let runs = self.runs.read().await;
        let document = runs
            .get(&uuid)
            .ok_or_else(|| DomainError::RunNotFound(id.to_string()))?;
        Ok(serde_json::from_str(document)?)
    }

    async fn load_by_prefix(&self, prefix: &str) -> DomainResult<OptimizationRun> {
        validate_prefix(prefix)?;
        let prefix_lower = prefix.to_lowercase();

        let mut matches: Vec<String> = {
            let runs = self.runs.read().await;
            runs.keys()
                .map(Uuid::to_string)
                .filter(|id| id.starts_with(&prefix_lower))
                .collect()
        };
        matches.sort();

        match matches.len() {
            0 => Err(DomainError::RunNotFound(prefix.to_string())),
            1 => self.load(&matches[0]).await,
            _ => Err(DomainError::AmbiguousRunId {
                prefix: prefix.to_string(),
                matches,
            }),
        }
    }

    async fn list(&self) -> DomainResult<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut summaries = runs
            .values()
            .map(|document| serde_json::from_str::<OptimizationRun>(document).map(|r| r.summary()))
            .collect::<Result<Vec<_>, _>>()?;
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::OptimizationConfig;

    #[tokio::test]
    async fn test_load_returns_independent_copy() {
        let store = InMemoryRunStore::new();
        let mut run = OptimizationRun::new(OptimizationConfig::default());
        store.save(&run).await.unwrap();

        run.open_generation();
        let loaded = store.load(&run.id.to_string()).await.unwrap();
        assert!(loaded.generations.is_empty());
    }

    #[tokio::test]
    async fn test_prefix_and_full_id() {
        let store = InMemoryRunStore::new();
        let run = OptimizationRun::new(OptimizationConfig::default());
        store.save(&run).await.unwrap();

        let id = run.id.to_string();
        assert_eq!(store.load_by_prefix(&id).await.unwrap().id, run.id);
        assert_eq!(store.load_by_prefix(&id[..6]).await.unwrap().id, run.id);
        assert_eq!(
            store.load_by_prefix(&id[..6].to_uppercase()).await.unwrap().id,
            run.id
        );
    }

    #[tokio::test]
    async fn test_ambiguous_prefix_lists_matches() {
        let store = InMemoryRunStore::new();
        let mut a = OptimizationRun::new(OptimizationConfig::default());
        let mut b = OptimizationRun::new(OptimizationConfig::default());
        a.id = Uuid::parse_str("abcd0000-0000-4000-8000-000000000001").unwrap();
        b.id = Uuid::parse_str("abcd0000-0000-4000-8000-000000000002").unwrap();
        store.save(&a).await.unwrap();
        store.save(&b).await.unwrap();

        match store.load_by_prefix("abcd").await {
            Err(DomainError::AmbiguousRunId { matches, .. }) => assert_eq!(matches.len(), 2),
            other => panic!("expected ambiguity, got {:?}", other.map(|r| r.id)),
        }
        assert!(store.load_by_prefix("abcd0000-0000-4000-8000-000000000002").await.is_ok());
    }
}

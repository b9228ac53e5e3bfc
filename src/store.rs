//! In-memory storage of completed analyses.

use crate::models::ContractAnalysis;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Completed analyses by id, bounded in size.
#[derive(Debug)]
pub struct AnalysisStore {
    analyses: RwLock<HashMap<String, ContractAnalysis>>,
    capacity: usize,
}

impl AnalysisStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            analyses: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Store an analysis, evicting the oldest ones when full.
    pub async fn insert(&self, analysis: ContractAnalysis) {
        let mut analyses = self.analyses.write().await;

        while analyses.len() >= self.capacity && !analyses.contains_key(&analysis.id) {
            let oldest = analyses
                .values()
                .min_by_key(|a| a.created_at)
                .map(|a| a.id.clone());
            match oldest {
                Some(id) => {
                    debug!("Evicting analysis {} from store", id);
                    analyses.remove(&id);
                }
                None => break,
            }
        }

        analyses.insert(analysis.id.clone(), analysis);
    }

    pub async fn get(&self, id: &str) -> Option<ContractAnalysis> {
        self.analyses.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.analyses.read().await.len()
    }
}

//! In-process usage counters.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{QuotaError, QuotaKind, QuotaStore, UsageGrant, UsageReport};
use crate::identity::Identity;

#[derive(Clone, Default)]
pub struct MemoryQuotaStore {
    counters: Arc<DashMap<(String, QuotaKind), u64>>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a counter (seeding and monthly resets).
    pub fn set_usage(&self, user_id: &str, kind: QuotaKind, value: u64) {
        self.counters.insert((user_id.to_string(), kind), value);
    }

    pub fn reset_all(&self) {
        self.counters.clear();
        tracing::info!("Usage counters reset");
    }

    fn used(&self, user_id: &str, kind: QuotaKind) -> u64 {
        self.counters
            .get(&(user_id.to_string(), kind))
            .map(|v| *v)
            .unwrap_or(0)
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn check_and_increment(
        &self,
        identity: &Identity,
        kind: QuotaKind,
        amount: u64,
    ) -> Result<UsageGrant, QuotaError> {
        let tier = identity.tier;
        let limit = tier.limit(kind);

        // The entry guard holds the shard lock across check and increment.
        let mut counter = self.counters.entry((identity.user_id.clone(), kind)).or_insert(0);
        let current = *counter;
        if current.saturating_add(amount) > limit {
            return Err(QuotaError::LimitExceeded { kind, current, limit, tier });
        }
        *counter += amount;

        Ok(UsageGrant {
            kind,
            tier,
            current,
            limit,
            remaining: limit.saturating_sub(current),
        })
    }

    async fn report(&self, identity: &Identity) -> Result<UsageReport, QuotaError> {
        Ok(UsageReport::new(identity.tier, |kind| self.used(&identity.user_id, kind)))
    }

    async fn reset_period(&self) -> Result<(), QuotaError> {
        self.reset_all();
        Ok(())
    }
}

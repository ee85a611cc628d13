//! Tier-based usage quotas.
//!
//! # Data Flow
//! ```text
//! protected handler with a quota kind
//!     → QuotaStore::check_and_increment(identity, kind, 1)
//!         - current + amount > limit → QuotaError::LimitExceeded (429)
//!         - otherwise                → UsageGrant (usage headers)
//! ```

pub mod memory;
pub mod tiers;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::identity::Identity;

pub use memory::MemoryQuotaStore;
pub use tiers::{format_storage_size, QuotaKind, Tier};

/// Result of a successful check-and-increment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageGrant {
    pub kind: QuotaKind,
    pub tier: Tier,
    /// Usage before this increment.
    pub current: u64,
    pub limit: u64,
    pub remaining: u64,
}

impl UsageGrant {
    pub fn approaching_limit(&self) -> bool {
        self.current >= self.tier.warning_threshold(self.kind)
    }
}

/// Usage of one kind, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct KindUsage {
    pub kind: QuotaKind,
    pub used: u64,
    pub limit: u64,
    pub percent: f64,
}

/// Snapshot of a user's usage across all kinds.
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub tier: Tier,
    pub usage: Vec<KindUsage>,
}

impl UsageReport {
    pub fn new(tier: Tier, used: impl Fn(QuotaKind) -> u64) -> Self {
        let usage = QuotaKind::ALL
            .iter()
            .map(|&kind| {
                let used = used(kind);
                let limit = tier.limit(kind);
                let percent = if limit == 0 { 100.0 } else { used as f64 / limit as f64 * 100.0 };
                KindUsage { kind, used, limit, percent }
            })
            .collect();
        Self { tier, usage }
    }

    pub fn get(&self, kind: QuotaKind) -> Option<&KindUsage> {
        self.usage.iter().find(|u| u.kind == kind)
    }
}

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("You have exceeded your {kind} limit for the {tier} tier")]
    LimitExceeded {
        kind: QuotaKind,
        current: u64,
        limit: u64,
        tier: Tier,
    },

    #[error("usage store error: {0}")]
    Store(String),
}

/// Usage counters, owned by an external store.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Atomically check `current + amount <= limit` and increment.
    async fn check_and_increment(
        &self,
        identity: &Identity,
        kind: QuotaKind,
        amount: u64,
    ) -> Result<UsageGrant, QuotaError>;

    async fn report(&self, identity: &Identity) -> Result<UsageReport, QuotaError>;

    /// Zero every counter at the start of a billing period.
    async fn reset_period(&self) -> Result<(), QuotaError>;
}

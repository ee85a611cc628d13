//! Subscription tiers and their usage limits.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Subscription tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Free,
    Pro,
    ProByok,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::ProByok => "pro_byok",
        }
    }

    /// Limit for one kind of usage on this tier.
    pub fn limit(&self, kind: QuotaKind) -> u64 {
        match (self, kind) {
            (Tier::Free, QuotaKind::Documents) => 10,
            (Tier::Free, QuotaKind::ChatMessages) => 100,
            (Tier::Free, QuotaKind::ApiCalls) => 1_000,
            (Tier::Free, QuotaKind::StorageBytes) => 104_857_600, // 100MB
            (Tier::Pro, QuotaKind::Documents) => 1_000,
            (Tier::Pro, QuotaKind::ChatMessages) => 1_000,
            (Tier::Pro, QuotaKind::ApiCalls) => 10_000,
            (Tier::Pro, QuotaKind::StorageBytes) => 10_737_418_240, // 10GB
            (Tier::ProByok, QuotaKind::Documents) => 10_000,
            (Tier::ProByok, QuotaKind::ChatMessages) => 5_000,
            (Tier::ProByok, QuotaKind::ApiCalls) => 50_000,
            (Tier::ProByok, QuotaKind::StorageBytes) => 107_374_182_400, // 100GB
        }
    }

    /// Usage at which clients are warned (80% of the limit).
    pub fn warning_threshold(&self, kind: QuotaKind) -> u64 {
        self.limit(kind) * 8 / 10
    }

    pub fn upgrade_message(&self) -> &'static str {
        match self {
            Tier::Free => "Upgrade to Pro for higher limits and better performance.",
            Tier::Pro => "Consider Pro BYOK for even higher limits with your own API keys.",
            Tier::ProByok => "You're on our highest tier. Contact support for enterprise options.",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Tier::Free),
            "pro" => Ok(Tier::Pro),
            "pro_byok" => Ok(Tier::ProByok),
            other => Err(format!("unknown tier '{}'", other)),
        }
    }
}

/// A metered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaKind {
    Documents,
    ChatMessages,
    ApiCalls,
    StorageBytes,
}

impl QuotaKind {
    pub const ALL: [QuotaKind; 4] = [
        QuotaKind::Documents,
        QuotaKind::ChatMessages,
        QuotaKind::ApiCalls,
        QuotaKind::StorageBytes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaKind::Documents => "documents",
            QuotaKind::ChatMessages => "chat_messages",
            QuotaKind::ApiCalls => "api_calls",
            QuotaKind::StorageBytes => "storage_bytes",
        }
    }
}

impl fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable size, base 1024, one decimal.
pub fn format_storage_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} PB", size)
}

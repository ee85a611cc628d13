//! Usage reporting.

use axum::body::Body;
use axum::http::Request;
use serde::Serialize;

use crate::http::envelope::ApiError;
use crate::http::protected::RequestContext;
use crate::http::server::AppState;
use crate::quota::{format_storage_size, KindUsage, QuotaKind, Tier, UsageReport};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindView {
    pub kind: QuotaKind,
    pub used: u64,
    pub limit: u64,
    pub percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_formatted: Option<String>,
}

impl From<&KindUsage> for KindView {
    fn from(usage: &KindUsage) -> Self {
        let storage = usage.kind == QuotaKind::StorageBytes;
        Self {
            kind: usage.kind,
            used: usage.used,
            limit: usage.limit,
            percent: (usage.percent * 10.0).round() / 10.0,
            used_formatted: storage.then(|| format_storage_size(usage.used)),
            limit_formatted: storage.then(|| format_storage_size(usage.limit)),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageView {
    pub tier: Tier,
    pub usage: Vec<KindView>,
    pub warnings: Vec<String>,
    pub upgrade_message: &'static str,
}

impl From<UsageReport> for UsageView {
    fn from(report: UsageReport) -> Self {
        Self {
            tier: report.tier,
            usage: report.usage.iter().map(KindView::from).collect(),
            warnings: report.usage.iter().filter_map(warning_for).collect(),
            upgrade_message: report.tier.upgrade_message(),
        }
    }
}

fn noun(kind: QuotaKind) -> (&'static str, &'static str) {
    match kind {
        QuotaKind::Documents => ("Document limit", "Document usage"),
        QuotaKind::ChatMessages => ("Chat message limit", "Chat usage"),
        QuotaKind::ApiCalls => ("API call limit", "API usage"),
        QuotaKind::StorageBytes => ("Storage limit", "Storage usage"),
    }
}

fn warning_for(usage: &KindUsage) -> Option<String> {
    let (limit, activity) = noun(usage.kind);
    if usage.percent >= 90.0 {
        Some(format!("{} almost reached", limit))
    } else if usage.percent >= 80.0 {
        Some(format!("{} high", activity))
    } else {
        None
    }
}

/// `GET /api/usage`
pub async fn snapshot(state: AppState, ctx: RequestContext, _req: Request<Body>) -> Result<UsageView, ApiError> {
    let user = ctx.user()?;
    let report = state.quotas.report(user).await?;
    Ok(report.into())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierLimits {
    pub tier: Tier,
    pub limits: Vec<KindView>,
}

/// `GET /api/usage/tiers`: the published limits of every tier.
pub async fn tier_limits(_state: AppState, _ctx: RequestContext, _req: Request<Body>) -> Result<Vec<TierLimits>, ApiError> {
    Ok([Tier::Free, Tier::Pro, Tier::ProByok]
        .into_iter()
        .map(|tier| TierLimits {
            tier,
            limits: UsageReport::new(tier, |_| 0).usage.iter().map(KindView::from).collect(),
        })
        .collect())
}

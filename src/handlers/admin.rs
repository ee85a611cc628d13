//! Operator endpoints. Admin role only.

use axum::body::Body;
use axum::http::Request;
use serde::Serialize;

use crate::http::envelope::ApiError;
use crate::http::protected::RequestContext;
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitoring {
    pub uptime_secs: u64,
    pub version: &'static str,
    pub deployment: &'static str,
    pub rate_limit_keys: usize,
    pub tickets: usize,
}

/// `GET /api/admin/monitoring`
pub async fn monitoring(state: AppState, _ctx: RequestContext, _req: Request<Body>) -> Result<Monitoring, ApiError> {
    Ok(Monitoring {
        uptime_secs: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
        deployment: if state.config.deployment.production {
            "production"
        } else {
            "development"
        },
        rate_limit_keys: state.rate_limits.tracked_keys(),
        tickets: state.tickets.count(),
    })
}

#[derive(Debug, Serialize)]
pub struct ResetResult {
    pub reset: bool,
}

/// `POST /api/admin/usage/reset`: start a new billing period for everyone.
pub async fn reset_usage(state: AppState, ctx: RequestContext, _req: Request<Body>) -> Result<ResetResult, ApiError> {
    let admin = ctx.user()?;
    state.quotas.reset_period().await?;
    tracing::warn!(admin_id = %admin.user_id, "Usage counters reset by operator");
    Ok(ResetResult { reset: true })
}

//! Support tickets for the signed-in user.

use axum::body::Body;
use axum::extract::{FromRequestParts, Path};
use axum::http::Request;
use serde::Serialize;
use uuid::Uuid;

use super::read_json;
use crate::http::envelope::{ApiError, FieldError};
use crate::http::protected::RequestContext;
use crate::http::server::AppState;
use crate::support::{NewTicket, Ticket};

#[derive(Debug, Serialize)]
pub struct TicketList {
    pub tickets: Vec<Ticket>,
}

/// `POST /api/support/tickets`
pub async fn create(state: AppState, ctx: RequestContext, req: Request<Body>) -> Result<Ticket, ApiError> {
    let user = ctx.user()?;
    let new: NewTicket = read_json(req, state.max_body_size()).await?;
    new.validate().map_err(ApiError::Validation)?;

    let ticket = state.tickets.create(&user.user_id, new).await?;
    tracing::info!(user_id = %user.user_id, ticket_id = %ticket.id, priority = ?ticket.priority, "Ticket created");
    Ok(ticket)
}

/// `GET /api/support/tickets`
pub async fn list(state: AppState, ctx: RequestContext, _req: Request<Body>) -> Result<TicketList, ApiError> {
    let user = ctx.user()?;
    Ok(TicketList {
        tickets: state.tickets.list_for(&user.user_id).await?,
    })
}

/// `POST /api/support/tickets/{id}/close`. Other users' tickets look missing.
pub async fn close(state: AppState, ctx: RequestContext, req: Request<Body>) -> Result<Ticket, ApiError> {
    let user = ctx.user()?;
    let (mut parts, _) = req.into_parts();
    let Path(id) = Path::<Uuid>::from_request_parts(&mut parts, &state)
        .await
        .map_err(|e| ApiError::Validation(vec![FieldError::new("id", e.body_text())]))?;

    state
        .tickets
        .close(&user.user_id, id)
        .await?
        .ok_or(ApiError::NotFound)
}

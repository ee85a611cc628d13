//! Support tickets.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::http::envelope::FieldError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub user_id: String,
    pub subject: String,
    pub message: String,
    pub priority: Priority,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
}

/// Ticket creation request as sent by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTicket {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub priority: Priority,
}

impl NewTicket {
    /// Field-level checks; every problem is reported.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        let subject = self.subject.trim().chars().count();
        if !(3..=200).contains(&subject) {
            errors.push(FieldError::new("subject", "must be between 3 and 200 characters"));
        }
        let message = self.message.trim().chars().count();
        if !(10..=5000).contains(&message) {
            errors.push(FieldError::new("message", "must be between 10 and 5000 characters"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ticket store unavailable: {0}")]
    Unavailable(String),
}

/// Ticket persistence, owned by the hosted store.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn create(&self, user_id: &str, ticket: NewTicket) -> Result<Ticket, StoreError>;
    async fn list_for(&self, user_id: &str) -> Result<Vec<Ticket>, StoreError>;
    /// Close one of the user's tickets; `None` if it is not theirs or does not exist.
    async fn close(&self, user_id: &str, id: Uuid) -> Result<Option<Ticket>, StoreError>;
    fn count(&self) -> usize;
}

#[derive(Clone, Default)]
pub struct MemoryTicketStore {
    tickets: Arc<DashMap<Uuid, Ticket>>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn create(&self, user_id: &str, ticket: NewTicket) -> Result<Ticket, StoreError> {
        let ticket = Ticket {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            subject: ticket.subject.trim().to_string(),
            message: ticket.message.trim().to_string(),
            priority: ticket.priority,
            status: TicketStatus::Open,
            created_at: Utc::now(),
        };
        self.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn list_for(&self, user_id: &str) -> Result<Vec<Ticket>, StoreError> {
        let mut tickets: Vec<Ticket> = self
            .tickets
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.value().clone())
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }

    async fn close(&self, user_id: &str, id: Uuid) -> Result<Option<Ticket>, StoreError> {
        let Some(mut ticket) = self.tickets.get_mut(&id) else {
            return Ok(None);
        };
        if ticket.user_id != user_id {
            return Ok(None);
        }
        ticket.status = TicketStatus::Closed;
        Ok(Some(ticket.clone()))
    }

    fn count(&self) -> usize {
        self.tickets.len()
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{DomainError, DomainResult, Entity, TenantId, UserId};
use mercato_parties::PartyId;

mercato_core::document_id!(
    /// Helpdesk ticket identifier.
    TicketId
);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    OnHold,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, next),
            (Open, InProgress | OnHold | Resolved | Closed)
                | (InProgress, OnHold | Resolved | Closed)
                | (OnHold, InProgress | Closed)
                | (Resolved, Closed | InProgress)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: UserId,
    pub body: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub tenant_id: TenantId,
    pub number: String,
    #[serde(default)]
    pub customer_id: Option<PartyId>,
    pub subject: String,
    pub description: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    #[serde(default)]
    pub assignee: Option<UserId>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub opened_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    #[serde(default)]
    pub customer_id: Option<PartyId>,
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: TicketPriority,
    #[serde(default)]
    pub assignee: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: TicketStatus,
    /// Optional note, stored as a comment.
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub assignee: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub body: String,
}

impl Ticket {
    pub fn open(
        tenant_id: TenantId,
        id: TicketId,
        number: String,
        input: NewTicket,
        opened_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let subject = input.subject.trim().to_string();
        if subject.is_empty() {
            return Err(DomainError::validation("ticket subject cannot be empty"));
        }
        Ok(Self {
            id,
            tenant_id,
            number,
            customer_id: input.customer_id,
            subject,
            description: input.description.trim().to_string(),
            priority: input.priority,
            status: TicketStatus::Open,
            assignee: input.assignee,
            comments: Vec::new(),
            opened_by,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            closed_at: None,
        })
    }

    pub fn transition(
        &mut self,
        change: StatusChange,
        by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if !self.status.can_transition_to(change.status) {
            return Err(DomainError::invariant(format!(
                "ticket {} cannot move from {:?} to {:?}",
                self.number, self.status, change.status
            )));
        }

        let note = change.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if let Some(body) = note {
            self.comments.push(Comment { author: by, body, at: now });
        }
        if let Some(assignee) = change.assignee {
            self.assignee = Some(assignee);
        }

        match change.status {
            TicketStatus::Resolved => self.resolved_at = Some(now),
            TicketStatus::Closed => self.closed_at = Some(now),
            // Reopened.
            TicketStatus::InProgress if self.status == TicketStatus::Resolved => {
                self.resolved_at = None
            }
            _ => {}
        }
        self.status = change.status;
        self.updated_at = now;
        Ok(())
    }

    pub fn add_comment(&mut self, author: UserId, body: &str, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status == TicketStatus::Closed {
            return Err(DomainError::invariant(format!(
                "ticket {} is closed",
                self.number
            )));
        }
        let body = body.trim();
        if body.is_empty() {
            return Err(DomainError::validation("comment cannot be empty"));
        }
        self.comments.push(Comment {
            author,
            body: body.to_string(),
            at: now,
        });
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Ticket {
    type Id = TicketId;
    const COLLECTION: &'static str = "helpdesk_tickets";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn key(&self) -> String {
        self.id.to_string()
    }
}

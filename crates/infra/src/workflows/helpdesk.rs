//! Helpdesk tickets.

use chrono::Utc;

use mercato_core::{DocumentKind, DomainError};
use mercato_helpdesk::{NewComment, NewTicket, StatusChange, Ticket, TicketId};
use mercato_parties::PartyKind;

use crate::store::{Filter, StoreTx, typed};

use super::masters::load_party;
use super::{Actor, WorkflowResult, Workflows, committed, finish, newest_first, read};

async fn load_ticket(tx: &mut dyn StoreTx, id: TicketId) -> WorkflowResult<(u64, Ticket)> {
    let v = typed::load::<Ticket>(tx, &id.to_string())
        .await?
        .ok_or_else(|| DomainError::not_found(format!("ticket {id}")))?;
    Ok((v.version, v.value))
}

impl Workflows {
    pub async fn open_ticket(&self, actor: &Actor, input: NewTicket) -> WorkflowResult<Ticket> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            if let Some(customer_id) = input.customer_id {
                load_party(&mut *tx, customer_id, PartyKind::Customer).await?;
            }
            let number = self.next_number(&mut *tx, DocumentKind::HelpdeskTicket).await?;
            let ticket = Ticket::open(actor.tenant_id, TicketId::new(), number, input, actor.user_id, Utc::now())?;
            typed::insert(&mut *tx, &ticket).await?;
            Ok(ticket)
        }
        .await;
        let ticket = finish(tx, result, "ticket.open").await?;
        committed("ticket.open", actor, &ticket.number);
        Ok(ticket)
    }

    pub async fn change_ticket_status(
        &self,
        actor: &Actor,
        id: TicketId,
        change: StatusChange,
    ) -> WorkflowResult<Ticket> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let (version, mut ticket) = load_ticket(&mut *tx, id).await?;
            ticket.transition(change, actor.user_id, Utc::now())?;
            typed::save(&mut *tx, &ticket, version).await?;
            Ok(ticket)
        }
        .await;
        finish(tx, result, "ticket.status").await
    }

    pub async fn comment_on_ticket(
        &self,
        actor: &Actor,
        id: TicketId,
        comment: NewComment,
    ) -> WorkflowResult<Ticket> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let (version, mut ticket) = load_ticket(&mut *tx, id).await?;
            ticket.add_comment(actor.user_id, &comment.body, Utc::now())?;
            typed::save(&mut *tx, &ticket, version).await?;
            Ok(ticket)
        }
        .await;
        finish(tx, result, "ticket.comment").await
    }

    pub async fn get_ticket(&self, actor: &Actor, id: TicketId) -> WorkflowResult<Ticket> {
        let mut tx = self.begin(actor).await?;
        let result = load_ticket(&mut *tx, id).await.map(|(_, t)| t);
        read(tx, result).await
    }

    pub async fn list_tickets(&self, actor: &Actor) -> WorkflowResult<Vec<Ticket>> {
        let mut tx = self.begin(actor).await?;
        let result = typed::find::<Ticket>(&mut *tx, &Filter::all())
            .await
            .map(|v| {
                let mut tickets: Vec<_> = v.into_iter().map(|t| t.value).collect();
                newest_first(&mut tickets, |d| d.number.as_str());
                tickets
            })
            .map_err(Into::into);
        read(tx, result).await
    }
}

//! Helpdesk tickets: a small status machine with a comment thread.

pub mod ticket;

pub use ticket::{
    Comment, NewComment, NewTicket, StatusChange, Ticket, TicketId, TicketPriority, TicketStatus,
};

//! Support tickets: data model, lifecycle rules, persistence and the
//! service layer that ties them together.

mod interval;
mod lifecycle;
mod pagination;
mod service;
mod sqlite_store;
mod store;
mod types;

pub use interval::{format_interval, parse_interval, IntervalError};
pub use lifecycle::LifecycleError;
pub use pagination::{Page, PageRequest};
pub use service::{
    CreateTicketRequest, ListTicketsQuery, StatusChange, TicketService, UpdateTicketRequest,
};
pub use sqlite_store::SqliteTicketStore;
pub use store::{TicketError, TicketFilter, TicketMutation, TicketStore};
pub use types::{
    fields, AdditionalInfo, Category, LevelOutOfRange, Modification, NewTicket, NonEmptyText,
    Observation, ParseEnumError, PriorityLevel, Subcategory, Ticket, TicketStatus,
};

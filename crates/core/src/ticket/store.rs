//! Ticket storage trait and types.

use chrono::{DateTime, Utc};

use super::lifecycle::LifecycleError;
use super::types::{Category, Ticket, TicketStatus};

/// Error type for ticket operations.
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    /// Ticket not found.
    #[error("Ticket not found: {0}")]
    NotFound(String),
    /// The stored ticket changed since this copy was loaded.
    #[error("Ticket {0} was modified concurrently")]
    Conflict(String),
    /// A lifecycle rule rejected the operation.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
    /// A stored row could not be turned back into a ticket.
    #[error("Corrupt ticket data: {0}")]
    Decode(String),
}

impl From<rusqlite::Error> for TicketError {
    fn from(e: rusqlite::Error) -> Self {
        TicketError::Database(e.to_string())
    }
}

/// Filter for querying tickets.
///
/// Empty sets and `None` values match everything. Set filters match any of
/// their members.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketFilter {
    pub statuses: Vec<TicketStatus>,
    pub categories: Vec<Category>,
    pub assignee: Option<String>,
    pub opened_by: Option<String>,
    /// Inclusive lower bound on `opened_at`.
    pub opened_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `opened_at`.
    pub opened_to: Option<DateTime<Utc>>,
    /// Maximum rows returned by `list`. `None` is unbounded.
    pub limit: Option<u64>,
    /// Rows skipped by `list`.
    pub offset: u64,
}

impl TicketFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        if !self.statuses.contains(&status) {
            self.statuses.push(status);
        }
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        if !self.categories.contains(&category) {
            self.categories.push(category);
        }
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    pub fn with_opened_by(mut self, opened_by: impl Into<String>) -> Self {
        self.opened_by = Some(opened_by.into());
        self
    }

    pub fn opened_between(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.opened_from = from;
        self.opened_to = to;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}

/// Change applied to a freshly loaded ticket by [`TicketStore::modify`].
/// Returning an error discards the change.
pub type TicketMutation<'a> = &'a mut dyn FnMut(&mut Ticket) -> Result<(), TicketError>;

/// Trait for ticket storage backends.
///
/// A stored ticket always includes its observations and modifications.
pub trait TicketStore: Send + Sync {
    /// Persist a newly created ticket with its history.
    fn create(&self, ticket: &Ticket) -> Result<(), TicketError>;

    /// Get a ticket by ID.
    fn get(&self, id: &str) -> Result<Ticket, TicketError>;

    /// List tickets matching the filter, newest opened first, honouring
    /// `limit` and `offset`.
    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError>;

    /// Count tickets matching the filter. `limit` and `offset` are ignored.
    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError>;

    /// Save a ticket's current fields and any history entries not yet stored.
    ///
    /// Fails with [`TicketError::Conflict`] when the stored ticket has been
    /// saved since `ticket` was loaded. Bumps `ticket`'s revision on success.
    fn update(&self, ticket: &mut Ticket) -> Result<(), TicketError>;

    /// Load, change and save one ticket as a single atomic step.
    ///
    /// No other write to the ticket can interleave. Returns the saved ticket.
    fn modify(&self, id: &str, mutate: TicketMutation<'_>) -> Result<Ticket, TicketError>;

    /// Permanently delete a ticket together with its history.
    fn delete(&self, id: &str) -> Result<(), TicketError>;
}

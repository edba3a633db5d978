//! Application operations over stored tickets.
//!
//! Each write loads the aggregate, applies lifecycle methods and saves the
//! result in one store transaction. Lifecycle failures leave the store
//! untouched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::lifecycle::LifecycleError;
use super::pagination::{page_offset, Page, PageRequest};
use super::store::{TicketError, TicketFilter, TicketStore};
use super::types::{
    fields, AdditionalInfo, Category, NewTicket, Observation, Subcategory, Ticket, TicketStatus,
};
use crate::config::PaginationConfig;
use crate::metrics;

/// Input for [`TicketService::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: String,
    pub category: Option<Category>,
    pub subcategory: Option<Subcategory>,
    pub opened_by: String,
    pub urgency: Option<i64>,
    pub severity: Option<i64>,
    /// When given, the ticket is started immediately under this assignee.
    pub assignee: Option<String>,
    pub info: AdditionalInfo,
}

/// Partial update for [`TicketService::update`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct UpdateTicketRequest {
    pub acting_user: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub urgency: Option<i64>,
    pub severity: Option<i64>,
    pub info: AdditionalInfo,
}

/// Input for [`TicketService::change_status`].
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub target: TicketStatus,
    pub acting_user: String,
    /// Required when `target` is in-progress.
    pub assignee: Option<String>,
}

/// Filter and page for [`TicketService::list`].
#[derive(Debug, Clone, Default)]
pub struct ListTicketsQuery {
    pub filter: TicketFilter,
    pub page: PageRequest,
}

/// Ticket operations against an explicit store handle.
#[derive(Clone)]
pub struct TicketService {
    store: Arc<dyn TicketStore>,
    pagination: PaginationConfig,
}

impl TicketService {
    pub fn new(store: Arc<dyn TicketStore>, pagination: PaginationConfig) -> Self {
        Self { store, pagination }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    pub fn create(&self, request: CreateTicketRequest) -> Result<Ticket, TicketError> {
        self.create_at(request, Utc::now())
    }

    pub fn create_at(
        &self,
        request: CreateTicketRequest,
        now: DateTime<Utc>,
    ) -> Result<Ticket, TicketError> {
        let mut ticket = Ticket::create_at(
            NewTicket {
                title: request.title,
                description: request.description,
                category: request.category,
                subcategory: request.subcategory,
                opened_by: request.opened_by,
                urgency: request.urgency,
                severity: request.severity,
            },
            now,
        )?;
        ticket.set_additional_info(request.info)?;
        if let Some(assignee) = request.assignee.as_deref() {
            ticket.start_work_at(assignee, now)?;
        }

        self.store.create(&ticket)?;

        metrics::TICKETS_CREATED.inc();
        record_new_history(&ticket, 0);
        info!(
            ticket_id = %ticket.id(),
            category = %ticket.category(),
            status = %ticket.status(),
            opened_by = %ticket.opened_by(),
            "Ticket created"
        );
        Ok(ticket)
    }

    pub fn get(&self, id: &str) -> Result<Ticket, TicketError> {
        self.store.get(id)
    }

    /// Lists matching tickets, newest first. Only the requested page is
    /// loaded from the store.
    pub fn list(&self, query: &ListTicketsQuery) -> Result<Page<Ticket>, TicketError> {
        let (page, page_size) = query.page.normalize(&self.pagination);
        let total = u64::try_from(self.store.count(&query.filter)?).unwrap_or(0);

        let filter = query
            .filter
            .clone()
            .with_limit(page_size)
            .with_offset(page_offset(page, page_size));
        let tickets = self.store.list(&filter)?;

        let page = Page::new(tickets, total, page, page_size);
        debug!(
            total = page.total,
            page = page.current_page,
            page_size = page.page_size,
            "Listed tickets"
        );
        Ok(page)
    }

    /// Applies every supplied field, all or nothing.
    pub fn update(&self, id: &str, request: UpdateTicketRequest) -> Result<Ticket, TicketError> {
        self.update_at(id, request, Utc::now())
    }

    pub fn update_at(
        &self,
        id: &str,
        request: UpdateTicketRequest,
        now: DateTime<Utc>,
    ) -> Result<Ticket, TicketError> {
        let user = request.acting_user.as_str();
        let mut history_len = 0;

        let ticket = self.store.modify(id, &mut |ticket: &mut Ticket| {
            history_len = ticket.modifications().len();
            if let Some(title) = request.title.as_deref() {
                ticket.set_title_at(title, user, now)?;
            }
            if let Some(description) = request.description.as_deref() {
                ticket.set_description_at(description, user, now)?;
            }
            if let Some(category) = request.category {
                ticket.set_category_at(category, user, now)?;
            }
            if let Some(urgency) = request.urgency {
                ticket.set_urgency_at(urgency, user, now)?;
            }
            if let Some(severity) = request.severity {
                ticket.set_severity_at(severity, user, now)?;
            }
            // Always applied so updates to terminal tickets are rejected even
            // when no audited field is present.
            ticket.set_additional_info(request.info.clone())?;
            Ok(())
        })?;

        record_new_history(&ticket, history_len);
        info!(
            ticket_id = %ticket.id(),
            user = %user,
            changes = ticket.modifications().len() - history_len,
            "Ticket updated"
        );
        Ok(ticket)
    }

    /// Moves a ticket to `change.target`.
    ///
    /// `aberto` is not a valid target; tickets never re-open.
    pub fn change_status(&self, id: &str, change: StatusChange) -> Result<Ticket, TicketError> {
        self.change_status_at(id, change, Utc::now())
    }

    pub fn change_status_at(
        &self,
        id: &str,
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Ticket, TicketError> {
        let mut history_len = 0;
        let mut from = TicketStatus::Open;

        let ticket = self.store.modify(id, &mut |ticket: &mut Ticket| {
            history_len = ticket.modifications().len();
            from = ticket.status();
            match change.target {
                TicketStatus::InProgress => {
                    let assignee =
                        change.assignee.as_deref().ok_or(LifecycleError::Validation {
                            field: fields::ASSIGNEE,
                            reason: "is required to start work".to_string(),
                        })?;
                    ticket.start_work_at(assignee, now)?;
                }
                TicketStatus::Finished => ticket.finish_at(&change.acting_user, now)?,
                TicketStatus::Cancelled => ticket.cancel_at(&change.acting_user, now)?,
                TicketStatus::Open => {
                    return Err(LifecycleError::Validation {
                        field: fields::STATUS,
                        reason: format!("cannot change status to {}", TicketStatus::Open),
                    }
                    .into());
                }
            }
            Ok(())
        })?;

        record_new_history(&ticket, history_len);
        if let Some(total) = ticket.total_duration() {
            metrics::RESOLUTION_DURATION
                .with_label_values(&[ticket.category().as_str()])
                .observe(total.num_milliseconds() as f64 / 1000.0);
        }
        info!(
            ticket_id = %ticket.id(),
            from = %from,
            to = %ticket.status(),
            "Ticket status changed"
        );
        Ok(ticket)
    }

    /// Adds a note. The text is checked before the ticket is loaded.
    pub fn add_observation(
        &self,
        id: &str,
        text: &str,
        author: &str,
    ) -> Result<Observation, TicketError> {
        self.add_observation_at(id, text, author, Utc::now())
    }

    pub fn add_observation_at(
        &self,
        id: &str,
        text: &str,
        author: &str,
        now: DateTime<Utc>,
    ) -> Result<Observation, TicketError> {
        if text.trim().is_empty() {
            return Err(LifecycleError::Validation {
                field: fields::OBSERVATION,
                reason: "must not be blank".to_string(),
            }
            .into());
        }

        let mut added = None;
        self.store.modify(id, &mut |ticket: &mut Ticket| {
            added = Some(ticket.add_observation_at(text, author, now)?);
            Ok(())
        })?;
        let Some(observation) = added else {
            return Err(TicketError::Database(format!(
                "observation for ticket {id} was not recorded"
            )));
        };

        metrics::OBSERVATIONS_ADDED.inc();
        debug!(ticket_id = %id, author = %author, "Observation added");
        Ok(observation)
    }

    /// Deletes a ticket with its observations and modifications.
    pub fn delete(&self, id: &str) -> Result<(), TicketError> {
        self.store.delete(id)?;
        metrics::TICKETS_DELETED.inc();
        info!(ticket_id = %id, "Ticket deleted");
        Ok(())
    }
}

/// Bumps counters for modifications appended after index `from`.
fn record_new_history(ticket: &Ticket, from: usize) {
    for m in &ticket.modifications()[from..] {
        metrics::MODIFICATIONS_RECORDED
            .with_label_values(&[m.field()])
            .inc();
        if m.field() == fields::STATUS {
            metrics::STATUS_TRANSITIONS
                .with_label_values(&[m.old_value(), m.new_value()])
                .inc();
        }
    }
}

//! Ticket lifecycle engine.
//!
//! Guarded, in-memory mutations on [`Ticket`]. Every method checks all of its
//! preconditions before touching the ticket, so a failed call leaves it
//! exactly as it was. Each `op` has an `op_at` twin that takes the instant
//! explicitly; one instant is used for everything a single call produces.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{
    fields, AdditionalInfo, Category, Modification, NewTicket, Observation, PriorityLevel, Ticket,
    TicketStatus,
};

/// Errors produced by lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// An input value was blank, missing or out of range.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The operation is not allowed from the ticket's current status.
    #[error("cannot {operation} ticket {ticket_id} while {status}")]
    InvalidState {
        ticket_id: String,
        status: TicketStatus,
        operation: &'static str,
    },

    /// The ticket is finished or cancelled and can no longer change.
    #[error("ticket {ticket_id} is {status} and can no longer be modified")]
    TerminalState {
        ticket_id: String,
        status: TicketStatus,
    },
}

impl LifecycleError {
    fn blank(field: &'static str) -> Self {
        LifecycleError::Validation {
            field,
            reason: "must not be blank".to_string(),
        }
    }
}

fn require_text(field: &'static str, value: &str) -> Result<(), LifecycleError> {
    if value.trim().is_empty() {
        Err(LifecycleError::blank(field))
    } else {
        Ok(())
    }
}

fn level(field: &'static str, value: i64) -> Result<PriorityLevel, LifecycleError> {
    PriorityLevel::try_from(value).map_err(|e| LifecycleError::Validation {
        field,
        reason: e.to_string(),
    })
}

impl Ticket {
    /// Creates a new open ticket.
    pub fn create(new: NewTicket) -> Result<Ticket, LifecycleError> {
        Self::create_at(new, Utc::now())
    }

    pub fn create_at(new: NewTicket, now: DateTime<Utc>) -> Result<Ticket, LifecycleError> {
        require_text(fields::TITLE, &new.title)?;
        require_text(fields::DESCRIPTION, &new.description)?;
        require_text(fields::OPENED_BY, &new.opened_by)?;
        let category = new.category.ok_or(LifecycleError::Validation {
            field: fields::CATEGORY,
            reason: "is required".to_string(),
        })?;
        let urgency = match new.urgency {
            Some(value) => level(fields::URGENCY, value)?,
            None => PriorityLevel::LOWEST,
        };
        let severity = match new.severity {
            Some(value) => level(fields::SEVERITY, value)?,
            None => PriorityLevel::LOWEST,
        };

        Ok(Ticket {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            description: new.description,
            category,
            subcategory: new.subcategory,
            urgency,
            severity,
            status: TicketStatus::Open,
            opened_by: new.opened_by,
            assignee: None,
            contact: None,
            merchant: None,
            external_id: None,
            tax_id: None,
            platform: None,
            opened_at: now,
            started_at: None,
            finished_at: None,
            total_duration: None,
            execution_duration: None,
            observations: Vec::new(),
            modifications: Vec::new(),
            revision: 0,
        })
    }

    pub fn set_title(&mut self, value: &str, acting_user: &str) -> Result<(), LifecycleError> {
        self.set_title_at(value, acting_user, Utc::now())
    }

    pub fn set_title_at(
        &mut self,
        value: &str,
        acting_user: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        self.ensure_mutable()?;
        require_text(fields::TITLE, value)?;
        let old = std::mem::replace(&mut self.title, value.to_string());
        self.record(fields::TITLE, old, value.to_string(), acting_user, now);
        Ok(())
    }

    pub fn set_description(&mut self, value: &str, acting_user: &str) -> Result<(), LifecycleError> {
        self.set_description_at(value, acting_user, Utc::now())
    }

    pub fn set_description_at(
        &mut self,
        value: &str,
        acting_user: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        self.ensure_mutable()?;
        require_text(fields::DESCRIPTION, value)?;
        let old = std::mem::replace(&mut self.description, value.to_string());
        self.record(fields::DESCRIPTION, old, value.to_string(), acting_user, now);
        Ok(())
    }

    pub fn set_category(
        &mut self,
        category: Category,
        acting_user: &str,
    ) -> Result<(), LifecycleError> {
        self.set_category_at(category, acting_user, Utc::now())
    }

    pub fn set_category_at(
        &mut self,
        category: Category,
        acting_user: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        self.ensure_mutable()?;
        let old = std::mem::replace(&mut self.category, category);
        self.record(
            fields::CATEGORY,
            old.as_str().to_string(),
            category.as_str().to_string(),
            acting_user,
            now,
        );
        Ok(())
    }

    pub fn set_urgency(&mut self, value: i64, acting_user: &str) -> Result<(), LifecycleError> {
        self.set_urgency_at(value, acting_user, Utc::now())
    }

    pub fn set_urgency_at(
        &mut self,
        value: i64,
        acting_user: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        self.ensure_mutable()?;
        let new = level(fields::URGENCY, value)?;
        let old = std::mem::replace(&mut self.urgency, new);
        self.record(fields::URGENCY, old.to_string(), new.to_string(), acting_user, now);
        Ok(())
    }

    pub fn set_severity(&mut self, value: i64, acting_user: &str) -> Result<(), LifecycleError> {
        self.set_severity_at(value, acting_user, Utc::now())
    }

    pub fn set_severity_at(
        &mut self,
        value: i64,
        acting_user: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        self.ensure_mutable()?;
        let new = level(fields::SEVERITY, value)?;
        let old = std::mem::replace(&mut self.severity, new);
        self.record(fields::SEVERITY, old.to_string(), new.to_string(), acting_user, now);
        Ok(())
    }

    /// Overwrites the optional details that are present in `info`.
    ///
    /// Not audited.
    pub fn set_additional_info(&mut self, info: AdditionalInfo) -> Result<(), LifecycleError> {
        self.ensure_mutable()?;
        let AdditionalInfo {
            merchant,
            external_id,
            tax_id,
            platform,
            contact,
        } = info;
        if let Some(v) = merchant {
            self.merchant = Some(v.into_inner());
        }
        if let Some(v) = external_id {
            self.external_id = Some(v.into_inner());
        }
        if let Some(v) = tax_id {
            self.tax_id = Some(v.into_inner());
        }
        if let Some(v) = platform {
            self.platform = Some(v.into_inner());
        }
        if let Some(v) = contact {
            self.contact = Some(v.into_inner());
        }
        Ok(())
    }

    /// Moves an open ticket to in-progress under `assignee`.
    pub fn start_work(&mut self, assignee: &str) -> Result<(), LifecycleError> {
        self.start_work_at(assignee, Utc::now())
    }

    pub fn start_work_at(&mut self, assignee: &str, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.ensure_status(TicketStatus::Open, "start work on")?;
        require_text(fields::ASSIGNEE, assignee)?;
        self.assignee = Some(assignee.to_string());
        self.started_at = Some(now);
        self.transition(TicketStatus::InProgress, assignee, now);
        Ok(())
    }

    /// Finishes an in-progress ticket and computes its durations.
    pub fn finish(&mut self, acting_user: &str) -> Result<(), LifecycleError> {
        self.finish_at(acting_user, Utc::now())
    }

    pub fn finish_at(&mut self, acting_user: &str, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.ensure_status(TicketStatus::InProgress, "finish")?;
        self.finished_at = Some(now);
        self.total_duration = Some(now - self.opened_at);
        self.execution_duration = self.started_at.map(|started| now - started);
        self.transition(TicketStatus::Finished, acting_user, now);
        Ok(())
    }

    /// Cancels a ticket that is not yet terminal. Durations stay unset.
    pub fn cancel(&mut self, acting_user: &str) -> Result<(), LifecycleError> {
        self.cancel_at(acting_user, Utc::now())
    }

    pub fn cancel_at(&mut self, acting_user: &str, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        if !self.status.can_cancel() {
            return Err(self.invalid_state("cancel"));
        }
        self.transition(TicketStatus::Cancelled, acting_user, now);
        Ok(())
    }

    /// Appends a note. Allowed in every status.
    pub fn add_observation(&mut self, text: &str, author: &str) -> Result<Observation, LifecycleError> {
        self.add_observation_at(text, author, Utc::now())
    }

    pub fn add_observation_at(
        &mut self,
        text: &str,
        author: &str,
        now: DateTime<Utc>,
    ) -> Result<Observation, LifecycleError> {
        require_text(fields::OBSERVATION, text)?;
        let observation = Observation {
            id: Uuid::new_v4().to_string(),
            ticket_id: self.id.clone(),
            author: author.to_string(),
            text: text.to_string(),
            created_at: now,
        };
        self.observations.push(observation.clone());
        Ok(observation)
    }

    fn ensure_mutable(&self) -> Result<(), LifecycleError> {
        if self.status.is_terminal() {
            return Err(LifecycleError::TerminalState {
                ticket_id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    fn ensure_status(
        &self,
        expected: TicketStatus,
        operation: &'static str,
    ) -> Result<(), LifecycleError> {
        if self.status != expected {
            return Err(self.invalid_state(operation));
        }
        Ok(())
    }

    fn invalid_state(&self, operation: &'static str) -> LifecycleError {
        LifecycleError::InvalidState {
            ticket_id: self.id.clone(),
            status: self.status,
            operation,
        }
    }

    fn transition(&mut self, to: TicketStatus, acting_user: &str, now: DateTime<Utc>) {
        let from = std::mem::replace(&mut self.status, to);
        self.record(
            fields::STATUS,
            from.as_str().to_string(),
            to.as_str().to_string(),
            acting_user,
            now,
        );
    }

    fn record(
        &mut self,
        field: &str,
        old_value: String,
        new_value: String,
        user_id: &str,
        now: DateTime<Utc>,
    ) {
        self.modifications.push(Modification {
            id: Uuid::new_v4().to_string(),
            ticket_id: self.id.clone(),
            user_id: user_id.to_string(),
            field: field.to_string(),
            old_value,
            new_value,
            modified_at: now,
        });
    }
}

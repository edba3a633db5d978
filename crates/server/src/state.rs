use std::sync::Arc;
use nox_tickets_core::{Config, TicketService, TicketStore};

/// Shared application state
pub struct AppState {
    config: Config,
    tickets: TicketService,
}

impl AppState {
    pub fn new(config: Config, ticket_store: Arc<dyn TicketStore>) -> Self {
        let tickets = TicketService::new(ticket_store, config.pagination);
        Self { config, tickets }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tickets(&self) -> &TicketService {
        &self.tickets
    }

    pub fn ticket_store(&self) -> &Arc<dyn TicketStore> {
        self.tickets.store()
    }
}

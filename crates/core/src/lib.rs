pub mod config;
pub mod metrics;
pub mod ticket;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    PaginationConfig, ServerConfig,
};
pub use ticket::{
    format_interval, parse_interval, AdditionalInfo, Category, CreateTicketRequest,
    LevelOutOfRange, LifecycleError, ListTicketsQuery, Modification, NewTicket, NonEmptyText,
    Observation, Page, PageRequest, PriorityLevel, SqliteTicketStore, StatusChange, Subcategory,
    Ticket, TicketError, TicketFilter, TicketMutation, TicketService, TicketStatus, TicketStore,
    UpdateTicketRequest,
};

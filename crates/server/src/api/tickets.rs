//! Ticket API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error};

use nox_tickets_core::{
    format_interval, AdditionalInfo, Category, CreateTicketRequest, LifecycleError,
    ListTicketsQuery, Modification, Observation, Page, PageRequest, StatusChange, Subcategory,
    Ticket, TicketError, TicketFilter, TicketStatus, UpdateTicketRequest,
};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a ticket
#[derive(Debug, Deserialize)]
pub struct CreateTicketBody {
    #[serde(rename = "titulo", default)]
    pub title: String,
    #[serde(rename = "descricao", default)]
    pub description: String,
    #[serde(rename = "categoria")]
    pub category: Option<Category>,
    #[serde(rename = "subcategoria")]
    pub subcategory: Option<Subcategory>,
    #[serde(rename = "aberto_por", default)]
    pub opened_by: String,
    #[serde(rename = "urgencia")]
    pub urgency: Option<i64>,
    #[serde(rename = "gravidade")]
    pub severity: Option<i64>,
    pub merchant: Option<String>,
    #[serde(rename = "nox_id")]
    pub external_id: Option<String>,
    #[serde(rename = "cpf")]
    pub tax_id: Option<String>,
    #[serde(rename = "plataforma")]
    pub platform: Option<String>,
    #[serde(rename = "contato")]
    pub contact: Option<String>,
    /// Starts the ticket immediately when present.
    #[serde(rename = "responsavel")]
    pub assignee: Option<String>,
}

/// Request body for updating ticket fields. Absent fields are left alone.
#[derive(Debug, Deserialize)]
pub struct UpdateTicketBody {
    #[serde(rename = "titulo")]
    pub title: Option<String>,
    #[serde(rename = "descricao")]
    pub description: Option<String>,
    #[serde(rename = "categoria")]
    pub category: Option<Category>,
    #[serde(rename = "urgencia")]
    pub urgency: Option<i64>,
    #[serde(rename = "gravidade")]
    pub severity: Option<i64>,
    pub merchant: Option<String>,
    #[serde(rename = "nox_id")]
    pub external_id: Option<String>,
    #[serde(rename = "cpf")]
    pub tax_id: Option<String>,
    #[serde(rename = "plataforma")]
    pub platform: Option<String>,
    #[serde(rename = "contato")]
    pub contact: Option<String>,
    #[serde(rename = "usuario_id", default)]
    pub user_id: String,
}

/// Request body for a status change
#[derive(Debug, Deserialize)]
pub struct ChangeStatusBody {
    pub status: TicketStatus,
    #[serde(rename = "usuario_id", default)]
    pub user_id: String,
    #[serde(rename = "responsavel")]
    pub assignee: Option<String>,
}

/// Request body for adding an observation
#[derive(Debug, Deserialize)]
pub struct AddObservationBody {
    #[serde(rename = "descricao", default)]
    pub text: String,
    #[serde(rename = "usuario_id", default)]
    pub user_id: String,
}

/// Query parameters for listing tickets
#[derive(Debug, Default, Deserialize)]
pub struct ListTicketsParams {
    /// Comma-separated statuses
    pub status: Option<String>,
    /// Comma-separated categories
    pub categoria: Option<String>,
    pub responsavel: Option<String>,
    pub aberto_por: Option<String>,
    /// RFC 3339 lower bound on opening time
    pub aberto_de: Option<String>,
    /// RFC 3339 upper bound on opening time
    pub aberto_ate: Option<String>,
    pub pagina: Option<i64>,
    pub por_pagina: Option<i64>,
}

/// Response for ticket operations
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub id: String,
    pub status: TicketStatus,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "categoria")]
    pub category: Category,
    #[serde(rename = "subcategoria", skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<Subcategory>,
    #[serde(rename = "urgencia")]
    pub urgency: u8,
    #[serde(rename = "gravidade")]
    pub severity: u8,
    #[serde(rename = "aberto_por")]
    pub opened_by: String,
    #[serde(rename = "responsavel", skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    #[serde(rename = "nox_id", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(rename = "cpf", skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(rename = "plataforma", skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(rename = "contato", skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(rename = "data_abertura")]
    pub opened_at: String,
    #[serde(rename = "data_inicio", skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(rename = "data_conclusao", skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(rename = "tempo_total", skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<String>,
    #[serde(rename = "tempo_execucao", skip_serializing_if = "Option::is_none")]
    pub execution_duration: Option<String>,
    #[serde(rename = "observacoes")]
    pub observations: Vec<ObservationResponse>,
    #[serde(rename = "modificacoes")]
    pub modifications: Vec<ModificationResponse>,
}

impl From<Ticket> for TicketResponse {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id().to_string(),
            status: ticket.status(),
            title: ticket.title().to_string(),
            description: ticket.description().to_string(),
            category: ticket.category(),
            subcategory: ticket.subcategory(),
            urgency: ticket.urgency().get(),
            severity: ticket.severity().get(),
            opened_by: ticket.opened_by().to_string(),
            assignee: ticket.assignee().map(str::to_string),
            merchant: ticket.merchant().map(str::to_string),
            external_id: ticket.external_id().map(str::to_string),
            tax_id: ticket.tax_id().map(str::to_string),
            platform: ticket.platform().map(str::to_string),
            contact: ticket.contact().map(str::to_string),
            opened_at: ticket.opened_at().to_rfc3339(),
            started_at: ticket.started_at().map(|t| t.to_rfc3339()),
            finished_at: ticket.finished_at().map(|t| t.to_rfc3339()),
            total_duration: ticket.total_duration().map(format_interval),
            execution_duration: ticket.execution_duration().map(format_interval),
            observations: ticket
                .observations()
                .iter()
                .map(ObservationResponse::from)
                .collect(),
            modifications: ticket
                .modifications()
                .iter()
                .map(ModificationResponse::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ObservationResponse {
    pub id: String,
    pub ticket_id: String,
    #[serde(rename = "usuario_id")]
    pub author: String,
    #[serde(rename = "descricao")]
    pub text: String,
    #[serde(rename = "data_criacao")]
    pub created_at: String,
}

impl From<&Observation> for ObservationResponse {
    fn from(obs: &Observation) -> Self {
        Self {
            id: obs.id().to_string(),
            ticket_id: obs.ticket_id().to_string(),
            author: obs.author().to_string(),
            text: obs.text().to_string(),
            created_at: obs.created_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModificationResponse {
    pub id: String,
    #[serde(rename = "usuario_id")]
    pub user_id: String,
    #[serde(rename = "campo_modificado")]
    pub field: String,
    #[serde(rename = "valor_anterior")]
    pub old_value: String,
    #[serde(rename = "valor_novo")]
    pub new_value: String,
    #[serde(rename = "data_modificacao")]
    pub modified_at: String,
}

impl From<&Modification> for ModificationResponse {
    fn from(m: &Modification) -> Self {
        Self {
            id: m.id().to_string(),
            user_id: m.user_id().to_string(),
            field: m.field().to_string(),
            old_value: m.old_value().to_string(),
            new_value: m.new_value().to_string(),
            modified_at: m.modified_at().to_rfc3339(),
        }
    }
}

/// Response for listing tickets
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<TicketResponse>,
    pub total: u64,
    pub total_paginas: u64,
    pub pagina: u64,
    pub por_pagina: u64,
}

impl From<Page<Ticket>> for ListTicketsResponse {
    fn from(page: Page<Ticket>) -> Self {
        let page = page.map(TicketResponse::from);
        Self {
            tickets: page.items,
            total: page.total,
            total_paginas: page.total_pages,
            pagina: page.current_page,
            por_pagina: page.page_size,
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct TicketErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<TicketErrorResponse>);

fn bad_request(message: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(TicketErrorResponse { error: message }),
    )
}

/// Map a service error to its HTTP status and JSON body.
pub fn error_response(err: TicketError) -> ApiError {
    let status = match &err {
        TicketError::NotFound(_) => StatusCode::NOT_FOUND,
        TicketError::Lifecycle(LifecycleError::Validation { .. }) => StatusCode::BAD_REQUEST,
        TicketError::Lifecycle(_) | TicketError::Conflict(_) => StatusCode::CONFLICT,
        TicketError::Database(_) | TicketError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %err, "Ticket operation failed");
    } else {
        debug!(error = %err, status = status.as_u16(), "Ticket request rejected");
    }
    (
        status,
        Json(TicketErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn parse_list<T: FromStr>(raw: Option<&str>) -> Result<Vec<T>, String>
where
    T::Err: std::fmt::Display,
{
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>().map_err(|e| e.to_string()))
        .collect()
}

fn parse_time(name: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, String> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| format!("invalid {name} '{s}': {e}"))
    })
    .transpose()
}

impl ListTicketsParams {
    fn into_query(self) -> Result<ListTicketsQuery, String> {
        let mut filter = TicketFilter::new().opened_between(
            parse_time("aberto_de", self.aberto_de.as_deref())?,
            parse_time("aberto_ate", self.aberto_ate.as_deref())?,
        );
        for status in parse_list::<TicketStatus>(self.status.as_deref())? {
            filter = filter.with_status(status);
        }
        for category in parse_list::<Category>(self.categoria.as_deref())? {
            filter = filter.with_category(category);
        }
        if let Some(assignee) = self.responsavel.filter(|s| !s.is_empty()) {
            filter = filter.with_assignee(assignee);
        }
        if let Some(opened_by) = self.aberto_por.filter(|s| !s.is_empty()) {
            filter = filter.with_opened_by(opened_by);
        }

        Ok(ListTicketsQuery {
            filter,
            page: PageRequest::new(self.pagina.unwrap_or(1), self.por_pagina.unwrap_or(0)),
        })
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new ticket
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTicketBody>,
) -> Result<(StatusCode, Json<TicketResponse>), ApiError> {
    let request = CreateTicketRequest {
        title: body.title,
        description: body.description,
        category: body.category,
        subcategory: body.subcategory,
        opened_by: body.opened_by,
        urgency: body.urgency,
        severity: body.severity,
        assignee: body.assignee.filter(|a| !a.is_empty()),
        info: AdditionalInfo::from_options(
            body.merchant,
            body.external_id,
            body.tax_id,
            body.platform,
            body.contact,
        ),
    };

    let ticket = state.tickets().create(request).map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(TicketResponse::from(ticket))))
}

/// Get a ticket by ID, with its observations and modifications
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TicketResponse>, ApiError> {
    let ticket = state.tickets().get(&id).map_err(error_response)?;
    Ok(Json(TicketResponse::from(ticket)))
}

/// List tickets with optional filters
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTicketsParams>,
) -> Result<Json<ListTicketsResponse>, ApiError> {
    let query = params.into_query().map_err(bad_request)?;
    let page = state.tickets().list(&query).map_err(error_response)?;
    Ok(Json(ListTicketsResponse::from(page)))
}

/// Update ticket fields
pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateTicketBody>,
) -> Result<Json<TicketResponse>, ApiError> {
    let request = UpdateTicketRequest {
        acting_user: body.user_id,
        title: body.title,
        description: body.description,
        category: body.category,
        urgency: body.urgency,
        severity: body.severity,
        info: AdditionalInfo::from_options(
            body.merchant,
            body.external_id,
            body.tax_id,
            body.platform,
            body.contact,
        ),
    };

    let ticket = state.tickets().update(&id, request).map_err(error_response)?;
    Ok(Json(TicketResponse::from(ticket)))
}

/// Change a ticket's status
pub async fn change_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ChangeStatusBody>,
) -> Result<Json<TicketResponse>, ApiError> {
    let change = StatusChange {
        target: body.status,
        acting_user: body.user_id,
        assignee: body.assignee,
    };

    let ticket = state
        .tickets()
        .change_status(&id, change)
        .map_err(error_response)?;
    Ok(Json(TicketResponse::from(ticket)))
}

/// Add an observation to a ticket
pub async fn add_observation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<AddObservationBody>,
) -> Result<(StatusCode, Json<ObservationResponse>), ApiError> {
    let observation = state
        .tickets()
        .add_observation(&id, &body.text, &body.user_id)
        .map_err(error_response)?;
    Ok((
        StatusCode::CREATED,
        Json(ObservationResponse::from(&observation)),
    ))
}

/// Permanently delete a ticket and its history
pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.tickets().delete(&id).map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

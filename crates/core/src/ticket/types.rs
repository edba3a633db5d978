//! Core ticket data types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Enumerations
// ============================================================================

/// Error returned when parsing an enum value from its wire text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {expected}: '{got}'")]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

/// Implements `as_str`, `Display`, `FromStr` and `ALL` for a closed wire enum.
macro_rules! wire_enum {
    ($ty:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Wire/persisted text for this value.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(ParseEnumError {
                        expected: $label,
                        got: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Ticket lifecycle stage.
///
/// ```text
/// Open --start_work--> InProgress --finish--> Finished
///   |                      |
///   +------cancel----------+-----cancel-----> Cancelled
/// ```
///
/// `Finished` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    #[serde(rename = "aberto")]
    Open,
    #[serde(rename = "em_curso")]
    InProgress,
    #[serde(rename = "finalizado")]
    Finished,
    #[serde(rename = "cancelado")]
    Cancelled,
}

wire_enum!(TicketStatus, "status", {
    Open => "aberto",
    InProgress => "em_curso",
    Finished => "finalizado",
    Cancelled => "cancelado",
});

impl TicketStatus {
    /// Returns true if no further transition or field mutation is allowed.
    pub fn is_terminal(self) -> bool {
        matches!(self, TicketStatus::Finished | TicketStatus::Cancelled)
    }

    /// Returns true if the ticket can be cancelled from this status.
    pub fn can_cancel(self) -> bool {
        !self.is_terminal()
    }
}

/// Business area a ticket belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "financeiro")]
    Financial,
    #[serde(rename = "comercial")]
    Commercial,
    #[serde(rename = "compliance")]
    Compliance,
    #[serde(rename = "contratos")]
    Contracts,
    #[serde(rename = "gestores")]
    Managers,
    #[serde(rename = "meds")]
    Meds,
    #[serde(rename = "onboarding")]
    Onboarding,
    #[serde(rename = "operacional")]
    Operational,
    #[serde(rename = "reclamacoes")]
    Complaints,
    #[serde(rename = "ti")]
    It,
    #[serde(rename = "trading")]
    Trading,
}

wire_enum!(Category, "category", {
    Financial => "financeiro",
    Commercial => "comercial",
    Compliance => "compliance",
    Contracts => "contratos",
    Managers => "gestores",
    Meds => "meds",
    Onboarding => "onboarding",
    Operational => "operacional",
    Complaints => "reclamacoes",
    It => "ti",
    Trading => "trading",
});

/// Finer classification within a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subcategory {
    #[serde(rename = "bug")]
    Bug,
    #[serde(rename = "feature")]
    Feature,
    #[serde(rename = "melhoria")]
    Improvement,
    #[serde(rename = "outros")]
    Other,
    #[serde(rename = "solicitacao_enviada")]
    RequestSent,
    #[serde(rename = "duvidas")]
    Questions,
    #[serde(rename = "solicitacoes")]
    Requests,
    #[serde(rename = "fraude")]
    Fraud,
    #[serde(rename = "kyc")]
    Kyc,
    #[serde(rename = "uncompliant")]
    Uncompliant,
    #[serde(rename = "cadastro_documentacao")]
    RegistrationDocuments,
    #[serde(rename = "verificacao_de_transacao")]
    TransactionVerification,
    #[serde(rename = "solicitacao_de_saque")]
    WithdrawalRequest,
}

wire_enum!(Subcategory, "subcategory", {
    Bug => "bug",
    Feature => "feature",
    Improvement => "melhoria",
    Other => "outros",
    RequestSent => "solicitacao_enviada",
    Questions => "duvidas",
    Requests => "solicitacoes",
    Fraud => "fraude",
    Kyc => "kyc",
    Uncompliant => "uncompliant",
    RegistrationDocuments => "cadastro_documentacao",
    TransactionVerification => "verificacao_de_transacao",
    WithdrawalRequest => "solicitacao_de_saque",
});

// ============================================================================
// Bounded and non-empty values
// ============================================================================

/// Urgency/severity level, always within `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct PriorityLevel(u8);

impl PriorityLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// The level every new ticket starts with.
    pub const LOWEST: PriorityLevel = PriorityLevel(Self::MIN);

    /// Returns the level as a plain integer.
    pub fn get(self) -> u8 {
        self.0
    }
}

/// Error returned when a level falls outside `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("level must be between 1 and 5, got {0}")]
pub struct LevelOutOfRange(pub i64);

impl TryFrom<i64> for PriorityLevel {
    type Error = LevelOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(PriorityLevel(value as u8))
        } else {
            Err(LevelOutOfRange(value))
        }
    }
}

impl From<PriorityLevel> for u8 {
    fn from(level: PriorityLevel) -> Self {
        level.0
    }
}

impl Default for PriorityLevel {
    fn default() -> Self {
        Self::LOWEST
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A string that is guaranteed to be non-empty.
///
/// Used for the optional ticket fields: an absent value means "leave as is",
/// and since an empty value cannot be built, there is no way to express
/// "clear this field" through [`AdditionalInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Returns `None` for an empty string.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Optional ticket details applied by `Ticket::set_additional_info`.
///
/// Every field is "present → overwrite, absent → keep".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdditionalInfo {
    pub merchant: Option<NonEmptyText>,
    pub external_id: Option<NonEmptyText>,
    pub tax_id: Option<NonEmptyText>,
    pub platform: Option<NonEmptyText>,
    pub contact: Option<NonEmptyText>,
}

impl AdditionalInfo {
    /// Build from raw strings, treating empty strings as absent.
    pub fn from_raw(
        merchant: &str,
        external_id: &str,
        tax_id: &str,
        platform: &str,
        contact: &str,
    ) -> Self {
        Self {
            merchant: NonEmptyText::new(merchant),
            external_id: NonEmptyText::new(external_id),
            tax_id: NonEmptyText::new(tax_id),
            platform: NonEmptyText::new(platform),
            contact: NonEmptyText::new(contact),
        }
    }

    /// Build from optional raw strings (e.g. a partial update body).
    pub fn from_options(
        merchant: Option<String>,
        external_id: Option<String>,
        tax_id: Option<String>,
        platform: Option<String>,
        contact: Option<String>,
    ) -> Self {
        Self {
            merchant: merchant.and_then(NonEmptyText::new),
            external_id: external_id.and_then(NonEmptyText::new),
            tax_id: tax_id.and_then(NonEmptyText::new),
            platform: platform.and_then(NonEmptyText::new),
            contact: contact.and_then(NonEmptyText::new),
        }
    }

    /// Returns true if no field is present.
    pub fn is_empty(&self) -> bool {
        self.merchant.is_none()
            && self.external_id.is_none()
            && self.tax_id.is_none()
            && self.platform.is_none()
            && self.contact.is_none()
    }
}

// ============================================================================
// History records
// ============================================================================

/// Wire names of ticket fields.
///
/// The audited ones appear in `Modification::field`; all of them name the
/// offending field in validation errors.
pub mod fields {
    pub const TITLE: &str = "titulo";
    pub const DESCRIPTION: &str = "descricao";
    pub const CATEGORY: &str = "categoria";
    pub const URGENCY: &str = "urgencia";
    pub const SEVERITY: &str = "gravidade";
    pub const STATUS: &str = "status";
    pub const OPENED_BY: &str = "aberto_por";
    pub const ASSIGNEE: &str = "responsavel";
    /// Text of an observation.
    pub const OBSERVATION: &str = "observacao";
}

/// Free-text note attached to a ticket. Append-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub(crate) id: String,
    pub(crate) ticket_id: String,
    pub(crate) author: String,
    pub(crate) text: String,
    pub(crate) created_at: DateTime<Utc>,
}

impl Observation {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ticket_id(&self) -> &str {
        &self.ticket_id
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Audit record of one field change.
///
/// Only the lifecycle methods on [`Ticket`] create these.
#[derive(Debug, Clone, PartialEq)]
pub struct Modification {
    pub(crate) id: String,
    pub(crate) ticket_id: String,
    pub(crate) user_id: String,
    pub(crate) field: String,
    pub(crate) old_value: String,
    pub(crate) new_value: String,
    pub(crate) modified_at: DateTime<Utc>,
}

impl Modification {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ticket_id(&self) -> &str {
        &self.ticket_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn old_value(&self) -> &str {
        &self.old_value
    }

    pub fn new_value(&self) -> &str {
        &self.new_value
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }
}

// ============================================================================
// Ticket aggregate
// ============================================================================

/// Input for `Ticket::create`.
#[derive(Debug, Clone, Default)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    /// Required; `None` is rejected.
    pub category: Option<Category>,
    pub subcategory: Option<Subcategory>,
    pub opened_by: String,
    /// Initial urgency (defaults to 1). Not recorded as a modification.
    pub urgency: Option<i64>,
    /// Initial severity (defaults to 1). Not recorded as a modification.
    pub severity: Option<i64>,
}

/// A support/incident ticket.
///
/// Fields are read through accessors; every mutation goes through the
/// lifecycle methods so the status guards and the audit trail cannot be
/// bypassed.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) category: Category,
    pub(crate) subcategory: Option<Subcategory>,
    pub(crate) urgency: PriorityLevel,
    pub(crate) severity: PriorityLevel,
    pub(crate) status: TicketStatus,
    pub(crate) opened_by: String,
    pub(crate) assignee: Option<String>,
    pub(crate) contact: Option<String>,
    pub(crate) merchant: Option<String>,
    pub(crate) external_id: Option<String>,
    pub(crate) tax_id: Option<String>,
    pub(crate) platform: Option<String>,
    pub(crate) opened_at: DateTime<Utc>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) finished_at: Option<DateTime<Utc>>,
    pub(crate) total_duration: Option<TimeDelta>,
    pub(crate) execution_duration: Option<TimeDelta>,
    pub(crate) observations: Vec<Observation>,
    pub(crate) modifications: Vec<Modification>,
    /// Stored revision, bumped by every successful save.
    pub(crate) revision: i64,
}

impl Ticket {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn subcategory(&self) -> Option<Subcategory> {
        self.subcategory
    }

    pub fn urgency(&self) -> PriorityLevel {
        self.urgency
    }

    pub fn severity(&self) -> PriorityLevel {
        self.severity
    }

    pub fn status(&self) -> TicketStatus {
        self.status
    }

    pub fn opened_by(&self) -> &str {
        &self.opened_by
    }

    pub fn assignee(&self) -> Option<&str> {
        self.assignee.as_deref()
    }

    pub fn contact(&self) -> Option<&str> {
        self.contact.as_deref()
    }

    pub fn merchant(&self) -> Option<&str> {
        self.merchant.as_deref()
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn tax_id(&self) -> Option<&str> {
        self.tax_id.as_deref()
    }

    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// `finished_at - opened_at`, set when the ticket is finished.
    pub fn total_duration(&self) -> Option<TimeDelta> {
        self.total_duration
    }

    /// `finished_at - started_at`, set when the ticket is finished.
    pub fn execution_duration(&self) -> Option<TimeDelta> {
        self.execution_duration
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn modifications(&self) -> &[Modification] {
        &self.modifications
    }

    pub fn revision(&self) -> i64 {
        self.revision
    }
}

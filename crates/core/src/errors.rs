use serde::Serialize;
use thiserror::Error;

/// Coarse classification of an [`OrderError`], used by the tool layer to
/// decide how a failure is reported back to the voice platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    State,
    LimitExceeded,
    System,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("`{0}` is not a menu category")]
    InvalidCategory(String),
    #[error("{category} does not come in size `{size}`")]
    InvalidSize { category: String, size: String },
    #[error("{category} is not available with `{protein}`")]
    InvalidProtein { category: String, protein: String },
    #[error("unknown category `{0}`")]
    UnknownCategory(String),
    #[error("`{addon}` is not an add-on for {category}")]
    UnknownAddon { category: String, addon: String },
    #[error("invalid value for {field}: {reason}")]
    InvalidPropertyValue { field: String, reason: String },
    #[error("{category} is missing required fields: {}", missing.join(", "))]
    IncompleteConfiguration { category: String, missing: Vec<String> },
    #[error("no item is currently being configured")]
    NoActiveConfiguration,
    #[error("item index {index} is out of range for a cart of {len} items")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("the cart is empty")]
    EmptyCart,
    #[error("none of the selected items can be made into a meal")]
    NoEligibleItems,
    #[error("{what} limit of {limit} exceeded")]
    LimitExceeded { what: String, limit: usize },
    #[error("rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("{message}")]
    ParseFailure { message: String },
    #[error("internal error: {0}")]
    Internal(String),
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSize { .. }
            | Self::InvalidProtein { .. }
            | Self::InvalidPropertyValue { .. }
            | Self::IncompleteConfiguration { .. }
            | Self::NoEligibleItems
            | Self::ParseFailure { .. } => ErrorKind::Validation,
            Self::InvalidCategory(_)
            | Self::UnknownCategory(_)
            | Self::UnknownAddon { .. }
            | Self::IndexOutOfRange { .. } => ErrorKind::NotFound,
            Self::NoActiveConfiguration | Self::EmptyCart => ErrorKind::State,
            Self::LimitExceeded { .. } | Self::RateLimited { .. } => ErrorKind::LimitExceeded,
            Self::Internal(_) => ErrorKind::System,
        }
    }

    /// Text that is safe to read back to the caller. Internal faults never
    /// expose their detail.
    pub fn user_message(&self) -> String {
        match self {
            Self::Internal(_) => "Something went wrong on our side. Please try that again.".to_string(),
            other => other.to_string(),
        }
    }

    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPropertyValue { field: field.into(), reason: reason.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> String {
        match self {
            Self::BadRequest { message, .. } => message.clone(),
            Self::ServiceUnavailable { .. } => {
                "We couldn't save that right now. Please try again in a moment.".to_string()
            }
            Self::Internal { .. } => "Something went wrong on our side. Please try that again.".to_string(),
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Order(error) if error.kind() == ErrorKind::System => {
                Self::Internal { message: error.to_string(), correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Order(error) => Self::BadRequest {
                message: error.user_message(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

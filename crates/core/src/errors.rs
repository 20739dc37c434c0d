use thiserror::Error;

use crate::{domain::session::SessionId, flows::FlowTransitionError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session `{0}` was not found")]
    NotFound(SessionId),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("{collaborator} timed out after {timeout_ms}ms")]
    Timeout { collaborator: &'static str, timeout_ms: u64 },
    #[error("{collaborator} unavailable: {message}")]
    Unavailable { collaborator: &'static str, message: String },
    #[error("{collaborator} returned an invalid response: {message}")]
    InvalidResponse { collaborator: &'static str, message: String },
}

impl CollaboratorError {
    pub fn unavailable(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable { collaborator, message: message.into() }
    }

    pub fn invalid_response(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse { collaborator, message: message.into() }
    }

    pub fn collaborator(&self) -> &'static str {
        match self {
            Self::Timeout { collaborator, .. }
            | Self::Unavailable { collaborator, .. }
            | Self::InvalidResponse { collaborator, .. } => collaborator,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "Session not found",
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::NotFound { correlation_id, .. } | Self::BadRequest { correlation_id, .. } => {
                correlation_id
            }
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::BadRequest { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Session(SessionError::NotFound(id)) => {
                Self::NotFound { message: format!("session {id}"), correlation_id }
            }
        }
    }
}

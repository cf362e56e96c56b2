use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    models::OrderStatus,
    response::{ApiResponse, Meta},
};

/// Which precondition of a cart or checkout call was not met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Guard {
    #[error("Please sign in before adding items to your cart")]
    SessionMissing,
    #[error("Only customer accounts can shop")]
    WrongRole,
    #[error("This product is not available for purchase")]
    NotApproved,
}

/// Why a sign-in was refused. Both share the `invalid_credentials` kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CredentialFailure {
    #[error("No account found with this email")]
    UnknownEmail,
    #[error("Incorrect password")]
    WrongPassword,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Email is already registered")]
    DuplicateEmail,

    #[error("{0}")]
    InvalidCredentials(CredentialFailure),

    #[error("{0}")]
    GuardViolation(Guard),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Please sign in to continue")]
    Unauthenticated,

    #[error("Not Found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order was changed by someone else (expected version {expected}, found {actual})")]
    Conflict { expected: i64, actual: i64 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable identifier for programmatic handling; the message is for display.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::DuplicateEmail => "duplicate_email",
            AppError::InvalidCredentials(_) => "invalid_credentials",
            AppError::GuardViolation(_) => "guard_violation",
            AppError::EmptyCart => "empty_cart",
            AppError::Unauthenticated => "unauthenticated",
            AppError::NotFound => "not_found",
            AppError::Forbidden => "forbidden",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::Conflict { .. } => "conflict",
            AppError::Storage(_)
            | AppError::OrmError(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::EmptyCart => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials(_) | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::GuardViolation(_) | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::DuplicateEmail
            | AppError::InvalidTransition { .. }
            | AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Storage(_)
            | AppError::OrmError(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<&'static str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "request failed");
        }

        let redirect = match self {
            AppError::Unauthenticated => Some("/login"),
            _ => None,
        };

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData {
                error: self.to_string(),
                kind: self.kind(),
                redirect,
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

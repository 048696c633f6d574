pub mod auth;
pub mod docker;
pub mod info;
pub mod vm;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::context::Context;
use crate::dispatch::job::Job;
use crate::model;
use crate::{database, dispatch};

pub async fn health() -> &'static str {
    "ok"
}

/// Looks up the outcome of a previously enqueued request by its
/// `solicitud_id`.
pub async fn job(
    Extension(ctx): Extension<Arc<Context>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, Error> {
    ctx.jobs
        .get(id)
        .map(Json)
        .ok_or_else(|| Error::new("Solicitud no encontrada", StatusCode::NOT_FOUND))
}

pub struct Error {
    message: String,
    status: StatusCode,
}

impl Error {
    fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Error {
            message: message.into(),
            status,
        }
    }

    fn bad_request(message: &str) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "mensaje": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// Unwraps a JSON body, turning axum's rejection into the endpoint's Spanish
/// validation message.
fn decode<T: DeserializeOwned>(
    payload: Result<Json<T>, JsonRejection>,
    message: &str,
) -> Result<T, Error> {
    payload
        .map(|Json(value)| value)
        .map_err(|_| Error::bad_request(message))
}

impl From<database::Error> for Error {
    fn from(err: database::Error) -> Self {
        tracing::error!("{err}");
        Self::internal("Error interno del servidor")
    }
}

impl From<dispatch::Error> for Error {
    fn from(err: dispatch::Error) -> Self {
        tracing::error!("{err}");
        Self::internal("Error interno del servidor")
    }
}

impl From<model::user::Error> for Error {
    fn from(err: model::user::Error) -> Self {
        tracing::error!("{err}");
        if err.is_not_found() {
            Self::new(
                "No se encontrò un usuario con el email especificado",
                StatusCode::NOT_FOUND,
            )
        } else {
            Self::internal("Error interno del servidor")
        }
    }
}

impl From<model::vm::Error> for Error {
    fn from(err: model::vm::Error) -> Self {
        tracing::error!("{err}");
        Self::internal("Error interno del servidor")
    }
}

impl From<model::host::Error> for Error {
    fn from(err: model::host::Error) -> Self {
        tracing::error!("{err}");
        Self::internal("Error interno del servidor")
    }
}

impl From<model::disk::Error> for Error {
    fn from(err: model::disk::Error) -> Self {
        tracing::error!("{err}");
        Self::internal("Error interno del servidor")
    }
}

impl From<model::catalog::Error> for Error {
    fn from(err: model::catalog::Error) -> Self {
        tracing::error!("{err}");
        Self::internal("Error interno del servidor")
    }
}

impl From<model::metrics::Error> for Error {
    fn from(err: model::metrics::Error) -> Self {
        tracing::error!("{err}");
        Self::internal("Error interno del servidor")
    }
}

impl From<crate::docker::Error> for Error {
    fn from(err: crate::docker::Error) -> Self {
        tracing::error!("{err}");
        Self::internal(err.to_string())
    }
}

//! Enveloppe d'erreur JSON commune à toutes les routes

use axum::{
    Json,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Corps d'une réponse d'erreur : `{"erro": "...", "detalhes": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub erro: String,
    pub detalhes: Option<String>,
}

impl ErrorBody {
    pub fn new(erro: impl Into<String>, detalhes: Option<String>) -> Self {
        Self {
            erro: erro.into(),
            detalhes,
        }
    }
}

/// Construit une réponse d'erreur JSON avec le statut donné
pub fn error_response(
    status: StatusCode,
    erro: impl Into<String>,
    detalhes: Option<String>,
) -> Response {
    (status, Json(ErrorBody::new(erro, detalhes))).into_response()
}

/// Fallback 404 : `{"erro": "Route not found", "detalhes": "GET /nope"}`
pub async fn not_found(method: Method, uri: Uri) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "Route not found",
        Some(format!("{} {}", method, uri)),
    )
}

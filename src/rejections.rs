use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use rust_i18n::t;
use serde_json::json;

use crate::{
    extractors::Locale,
    services::generator::{GeneratorDisabled, GeneratorTimeout},
    AppState,
};

const MAX_ERROR_BODY: usize = 64 * 1024;

/// Handler failure. The `&'static str` payloads are translation keys.
#[derive(Debug)]
pub enum AppError {
    Input(&'static str),
    Unauthorized,
    Forbidden(&'static str),
    NotFound(&'static str),
    /// The action does not fit the current state of the entity.
    Conflict(&'static str),
    Timeout,
    Unavailable,
    /// Unexpected failure, with the technical detail for `details`.
    Internal(String),
}

/// Attached to every `AppError` response so `render_errors` can localize it.
#[derive(Debug, Clone)]
pub struct ErrorBody {
    pub key: &'static str,
    pub details: Option<String>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Input(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            AppError::Input(key)
            | AppError::Forbidden(key)
            | AppError::NotFound(key)
            | AppError::Conflict(key) => key,
            AppError::Unauthorized => "errors.unauthorized",
            AppError::Timeout => "errors.generator_timeout",
            AppError::Unavailable => "errors.generator_disabled",
            AppError::Internal(_) => "errors.internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let key = self.key();
        let details = match self {
            AppError::Internal(details) => Some(details),
            _ => None,
        };

        let mut response = (status, Json(json!({ "error": key }))).into_response();
        response
            .extensions_mut()
            .insert(ErrorBody { key, details });
        response
    }
}

pub trait ResultExt<T> {
    /// Map any failure to a 500, logging `context` with the full error chain.
    /// Generator timeouts and a missing generator keep their own status.
    fn reject(self, context: &'static str) -> Result<T, AppError>;

    /// Map any failure to a 400 with the translation key `key`.
    fn reject_input(self, key: &'static str) -> Result<T, AppError>;
}

impl<T> ResultExt<T> for color_eyre::Result<T> {
    fn reject(self, context: &'static str) -> Result<T, AppError> {
        self.map_err(|e| {
            if e.downcast_ref::<GeneratorTimeout>().is_some() {
                tracing::warn!("{context}: {e}");
                return AppError::Timeout;
            }
            if e.downcast_ref::<GeneratorDisabled>().is_some() {
                tracing::warn!("{context}: {e}");
                return AppError::Unavailable;
            }
            tracing::error!("{context}: {e:?}");
            AppError::Internal(format!("{context}: {e:#}"))
        })
    }

    fn reject_input(self, key: &'static str) -> Result<T, AppError> {
        self.map_err(|e| {
            tracing::warn!("{key}: {e:#}");
            AppError::Input(key)
        })
    }
}

/// Rewrite every error response into `{"error": <localized>, "details"?}`.
/// Extractor rejections from axum (bad JSON, bad path) arrive as plain text
/// and are wrapped the same way.
pub async fn render_errors(
    State(state): State<AppState>,
    Locale(locale): Locale,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let (key, details) = match parts.extensions.get::<ErrorBody>() {
        Some(error) => (error.key, error.details.clone()),
        None => {
            // undecodable bodies are validation errors
            if status == StatusCode::UNPROCESSABLE_ENTITY {
                parts.status = StatusCode::BAD_REQUEST;
            }
            let text = match axum::body::to_bytes(body, MAX_ERROR_BODY).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(_) => String::new(),
            };
            (fallback_key(status), Some(text).filter(|t| !t.is_empty()))
        }
    };

    let mut payload = json!({ "error": t!(key, locale = locale) });
    if state.expose_error_details {
        if let Some(details) = details {
            payload["details"] = json!(details);
        }
    }

    let mut response = Response::from_parts(parts, Body::from(payload.to_string()));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response.headers_mut().remove(header::CONTENT_LENGTH);
    response
}

fn fallback_key(status: StatusCode) -> &'static str {
    match status {
        StatusCode::NOT_FOUND => "errors.route_not_found",
        StatusCode::METHOD_NOT_ALLOWED => "errors.method_not_allowed",
        StatusCode::UNAUTHORIZED => "errors.unauthorized",
        s if s.is_client_error() => "errors.bad_request",
        _ => "errors.internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_are_bad_requests() {
        assert_eq!(
            AppError::Conflict("errors.resposta_accepted").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Timeout.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn timeout_keeps_its_status_through_reject() {
        let failed: color_eyre::Result<()> = Err(GeneratorTimeout.into());
        assert!(matches!(failed.reject("generate quiz"), Err(AppError::Timeout)));
    }

    #[test]
    fn internal_errors_carry_details() {
        let failed: color_eyre::Result<()> = Err(color_eyre::eyre::eyre!("disk full"));
        match failed.reject("store quiz") {
            Err(AppError::Internal(details)) => assert!(details.contains("disk full")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn error_response_carries_key() {
        let response = AppError::NotFound("errors.pergunta_not_found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.extensions().get::<ErrorBody>().map(|b| b.key);
        assert_eq!(body, Some("errors.pergunta_not_found"));
    }
}

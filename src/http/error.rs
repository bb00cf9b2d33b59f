use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::{AppError, ErrorKind};

pub const STORE_FAILURE_CODE: &str = "STORE/FAILURE";

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound | ErrorKind::Disabled => StatusCode::NOT_FOUND,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let body = match kind {
            ErrorKind::Store => {
                tracing::error!(
                    target: "accountdeck",
                    event = "http_store_error",
                    code = %self.code,
                    error = %self
                );
                AppError::new(STORE_FAILURE_CODE, "the request could not be completed")
            }
            _ => {
                tracing::debug!(target: "accountdeck", event = "http_request_rejected", code = %self.code);
                AppError {
                    cause: None,
                    ..self
                }
            }
        };
        (kind.status(), Json(body)).into_response()
    }
}

/// JSON body extractor whose rejections use the `AppError` shape.
pub struct Payload<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Payload(value)),
            Err(rejection) => Err(rejection_error(rejection)),
        }
    }
}

fn rejection_error(rejection: JsonRejection) -> AppError {
    AppError::validation(rejection.body_text())
        .with_context("status", rejection.status().as_u16().to_string())
}

// HTTP mapping of management errors

use axum::{
    Json,
    async_trait,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::error;
use trellis_config::ConfigError;
use trellis_core::ManagementError;

/// A management error on its way out as `{message, ...details}`.
#[derive(Debug)]
pub struct ApiError(pub ManagementError);

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<ManagementError> for ApiError {
    fn from(err: ManagementError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_server_error() {
            error!(error = %self.0, "Management operation failed");
        }
        (status, Json(self.0.to_body())).into_response()
    }
}

/// JSON request body whose rejections answer in the management error shape.
pub struct Payload<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejection_error(rejection)),
        }
    }
}

fn rejection_error(rejection: JsonRejection) -> ApiError {
    ManagementError::invalid("Invalid request body.")
        .with_detail("errors", vec![rejection.body_text()])
        .into()
}

/// Failures while bootstrapping or serving the host.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bootstrap failed: {0}")]
    Bootstrap(#[from] ManagementError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_conflict_response() {
        let err = ManagementError::conflict("Recipe name 'Blog' is ambiguous. Use recipeId instead.")
            .with_detail("candidates", vec!["a|blog.recipe.json", "b|blog.recipe.json"]);
        let response = ApiError::from(err).into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_json(response).await,
            json!({
                "message": "Recipe name 'Blog' is ambiguous. Use recipeId instead.",
                "candidates": ["a|blog.recipe.json", "b|blog.recipe.json"]
            })
        );
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (ManagementError::invalid("x"), StatusCode::BAD_REQUEST),
            (ManagementError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (ManagementError::forbidden("x"), StatusCode::FORBIDDEN),
            (ManagementError::not_found("x"), StatusCode::NOT_FOUND),
            (ManagementError::problem("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_payload_rejection_shape() {
        let request = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{not json"))
            .unwrap();

        let rejection = Payload::<Value>::from_request(request, &()).await.err().unwrap();
        assert_eq!(rejection.status(), StatusCode::BAD_REQUEST);
        assert_eq!(rejection.0.message(), "Invalid request body.");
    }
}

use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::errors::{AppError, ErrorCode};

/// JSON body extractor that runs `validator` rules after deserializing.
///
/// A body that does not deserialize (missing field, wrong type, bad content
/// type) becomes `ValidationError` with the rejection text. A body that fails
/// its rules becomes `ValidationError` with the failing fields in `details`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::new(ErrorCode::ValidationError, rejection.body_text()))?;

        value.validate().map_err(|e| {
            let fields = serde_json::to_value(e.field_errors()).unwrap_or_default();
            AppError::with_details(ErrorCode::ValidationError, "request validation failed", fields)
        })?;

        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Signup {
        #[validate(email)]
        email: String,
    }

    fn request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn passes_valid_body() {
        let ValidatedJson(signup) = ValidatedJson::<Signup>::from_request(request(r#"{"email":"a@b.io"}"#), &())
            .await
            .unwrap();
        assert_eq!(signup.email, "a@b.io");
    }

    #[tokio::test]
    async fn missing_field_is_validation_error() {
        let err = ValidatedJson::<Signup>::from_request(request("{}"), &()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn rule_failure_is_validation_error() {
        let err = ValidatedJson::<Signup>::from_request(request(r#"{"email":"nope"}"#), &())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        match err {
            AppError::Known { details: Some(details), .. } => assert!(details.get("email").is_some()),
            other => panic!("expected field details, got {other:?}"),
        }
    }
}

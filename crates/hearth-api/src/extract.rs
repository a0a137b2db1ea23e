//! Request extractors

use crate::error::AppError;
use async_trait::async_trait;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;

/// JSON body extractor
///
/// Same as `axum::Json`, but a missing content type, unparsable JSON or a
/// missing field answers 400 with the `ApiError` body instead of axum's
/// plain-text rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{self, header};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Credentials {
        email: String,
        password: String,
    }

    fn request(content_type: Option<&str>, body: &str) -> Request {
        let mut builder = http::Request::builder().method("POST").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_valid_body() {
        let req = request(
            Some("application/json"),
            r#"{"email":"a@example.com","password":"pw"}"#,
        );
        let JsonBody(credentials) = JsonBody::<Credentials>::from_request(req, &())
            .await
            .unwrap();

        assert_eq!(credentials.email, "a@example.com");
        assert_eq!(credentials.password, "pw");
    }

    #[tokio::test]
    async fn test_rejections_become_bad_request() {
        let cases = [
            request(Some("application/json"), r#"{"email":"a@example.com"}"#),
            request(Some("application/json"), "{not json"),
            request(None, r#"{"email":"a@example.com","password":"pw"}"#),
        ];

        for req in cases {
            let err = JsonBody::<Credentials>::from_request(req, &())
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "got {err:?}");
        }
    }
}

//! Axum extractor that deserialises and validates query parameters

use crate::error::FlowmapError;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// An axum extractor based on the Query extractor that also performs validation using the
/// validator crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = FlowmapError;

    /// Extract a `ValidatedQuery` from request parts.
    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        value.validate()?;
        Ok(ValidatedQuery(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::ResampleQuery;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
        routing::get,
        Router,
    };
    use regex::Regex;
    use tower::ServiceExt;

    async fn test_handler(ValidatedQuery(query): ValidatedQuery<ResampleQuery>) -> String {
        format!("resample: {}", query.resample)
    }

    async fn request(uri: &str) -> Response {
        Router::new()
            .route("/", get(test_handler))
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        String::from_utf8(
            hyper::body::to_bytes(response.into_body())
                .await
                .unwrap()
                .to_vec(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn default() {
        let response = request("/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!("resample: 1", body_string(response).await);
    }

    #[tokio::test]
    async fn ok() {
        let response = request("/?resample=6").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!("resample: 6", body_string(response).await);
    }

    #[tokio::test]
    async fn not_a_number() {
        let response = request("/?resample=abc").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_string(response).await;
        let re = Regex::new(r"request query is not valid").unwrap();
        assert!(re.is_match(&body), "body: {body}");
        let re = Regex::new(r"Failed to deserialize query string").unwrap();
        assert!(re.is_match(&body), "body: {body}");
    }

    #[tokio::test]
    async fn negative() {
        let response = request("/?resample=-2").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn zero() {
        let response = request("/?resample=0").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_string(response).await;
        let re = Regex::new(r"request data is not valid").unwrap();
        assert!(re.is_match(&body), "body: {body}");
        let re = Regex::new(r"resample must be between 1 and 8784 hours").unwrap();
        assert!(re.is_match(&body), "body: {body}");
    }

    #[tokio::test]
    async fn too_large() {
        let response = request("/?resample=8785").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

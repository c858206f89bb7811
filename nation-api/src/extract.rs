/// Request extractors that reject with `ApiError`
///
/// axum's own `Json` and `Query` answer with plain-text bodies. These
/// wrappers run the same parsing but turn failures into a 422
/// `validation_error`, so every error body has the same shape.

use crate::error::ApiError;
use axum::{
    async_trait,
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Query, Request,
    },
    Json,
};
use serde::de::DeserializeOwned;

/// JSON body extractor
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// JSON body that may be left out
///
/// An empty body yields `T::default()`. A body that is present must parse,
/// otherwise the request is rejected like `ApiJson`.
#[derive(Debug)]
pub struct OptionalJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }

        let Json(value) = Json::<T>::from_bytes(&bytes)?;
        Ok(Self(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid("body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::invalid("query", rejection.body_text())
    }
}

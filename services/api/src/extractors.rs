use appin_common::error::AppinError;
use appin_source::CaseQuery;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;

use crate::error::ApiError;

/// Validated `createdAfter` / `createdBefore` / `product` query parameters.
pub struct CaseFilter(pub CaseQuery);

impl<S: Send + Sync> FromRequestParts<S> for CaseFilter {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<CaseQuery>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppinError::Validation(rejection.body_text()))?;

        query.validate()?;
        Ok(CaseFilter(query))
    }
}

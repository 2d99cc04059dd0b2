use axum::extract::State;
use axum::Json;

use crate::appin::responses::{AppInsResponse, OverviewResponse};
use crate::error::ApiError;
use crate::extractors::CaseFilter;
use crate::AppState;

pub async fn list_app_ins(
    State(state): State<AppState>,
    CaseFilter(query): CaseFilter,
) -> Result<Json<AppInsResponse>, ApiError> {
    let app_ins = state.appins.list_app_ins(&query).await?;
    Ok(Json(AppInsResponse { app_ins }))
}

pub async fn get_overview(
    State(state): State<AppState>,
    CaseFilter(query): CaseFilter,
) -> Result<Json<OverviewResponse>, ApiError> {
    let overview = state.appins.overview(&query).await?;
    Ok(Json(OverviewResponse { overview }))
}

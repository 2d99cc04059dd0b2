use appin_engine::Overview;
use appin_source::AppIn;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AppInsResponse {
    #[serde(rename = "appIns")]
    pub app_ins: Vec<AppIn>,
}

#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub overview: Overview,
}

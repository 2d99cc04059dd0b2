use std::sync::Arc;

use appin_common::error::AppinResult;
use appin_engine::{build_overview, CaseRecord, EngineConfig, Overview};
use appin_source::{AppIn, CaseQuery, CaseSource};
use chrono::{DateTime, Utc};

/// Fetches records from a [`CaseSource`] and runs the aggregation engine.
pub struct OverviewService {
    source: Arc<dyn CaseSource>,
    config: Arc<EngineConfig>,
}

impl OverviewService {
    pub fn new(source: Arc<dyn CaseSource>, config: Arc<EngineConfig>) -> Self {
        Self { source, config }
    }

    pub async fn list_app_ins(&self, query: &CaseQuery) -> AppinResult<Vec<AppIn>> {
        let app_ins = self.source.list_app_ins(query).await?;
        tracing::info!(app_ins = app_ins.len(), "listed applications");
        Ok(app_ins)
    }

    pub async fn overview(&self, query: &CaseQuery) -> AppinResult<Overview> {
        self.overview_at(query, Utc::now()).await
    }

    /// Overview as of `now`. Both lists are fetched concurrently and either
    /// failure fails the whole request.
    pub async fn overview_at(
        &self,
        query: &CaseQuery,
        now: DateTime<Utc>,
    ) -> AppinResult<Overview> {
        let (app_ins, ca_finals) = tokio::try_join!(
            self.source.list_app_ins(query),
            self.source.list_ca_finals(query),
        )?;

        tracing::info!(
            app_ins = app_ins.len(),
            ca_finals = ca_finals.len(),
            "fetched records for overview"
        );

        let applications: Vec<CaseRecord> = app_ins.iter().map(CaseRecord::from).collect();
        let reviews: Vec<CaseRecord> = ca_finals.iter().map(CaseRecord::from).collect();

        Ok(build_overview(&applications, Some(&reviews[..]), &self.config, now))
    }
}

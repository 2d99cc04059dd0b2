use appin_common::error::{AppinError, AppinResult};
use appin_config::GraphConfig;
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;

use crate::client::{GraphClient, ListItem};
use crate::models::{AppIn, CaFinal, RawAppIn, RawCaFinal, APP_IN_FIELDS, CA_FINAL_FIELDS};
use crate::query::CaseQuery;

/// Where applications and reviews come from.
#[async_trait]
pub trait CaseSource: Send + Sync {
    async fn list_app_ins(&self, query: &CaseQuery) -> AppinResult<Vec<AppIn>>;
    async fn list_ca_finals(&self, query: &CaseQuery) -> AppinResult<Vec<CaFinal>>;
}

/// [`CaseSource`] backed by the two SharePoint lists.
pub struct GraphCaseSource {
    client: GraphClient,
    list_id: String,
    ca_final_list_id: String,
}

impl GraphCaseSource {
    pub fn new(client: GraphClient, list_id: String, ca_final_list_id: String) -> Self {
        Self {
            client,
            list_id,
            ca_final_list_id,
        }
    }

    pub fn from_config(config: &GraphConfig) -> AppinResult<Self> {
        let client = GraphClient::new(config.clone())
            .map_err(|e| AppinError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::new(
            client,
            config.list_id.clone(),
            config.ca_final_list_id.clone(),
        ))
    }
}

#[async_trait]
impl CaseSource for GraphCaseSource {
    async fn list_app_ins(&self, query: &CaseQuery) -> AppinResult<Vec<AppIn>> {
        query.validate()?;
        let filter = query.application_filter(Utc::now());

        let items = self
            .client
            .list_items(&self.list_id, APP_IN_FIELDS, Some(&filter))
            .await?;

        Ok(decode_items::<RawAppIn>(items, &self.list_id)
            .into_iter()
            .map(AppIn::from)
            .collect())
    }

    async fn list_ca_finals(&self, query: &CaseQuery) -> AppinResult<Vec<CaFinal>> {
        query.validate()?;
        let filter = query.review_filter();

        let items = self
            .client
            .list_items(&self.ca_final_list_id, CA_FINAL_FIELDS, filter.as_deref())
            .await?;

        Ok(decode_items::<RawCaFinal>(items, &self.ca_final_list_id)
            .into_iter()
            .map(CaFinal::from)
            .collect())
    }
}

/// Decode item fields, skipping items without fields and items whose fields
/// do not match the expected columns.
fn decode_items<T: DeserializeOwned>(items: Vec<ListItem>, list_id: &str) -> Vec<T> {
    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| {
            let Some(fields) = item.fields else {
                tracing::warn!(list_id, item_id = %item.id, "list item has no fields");
                return None;
            };
            match serde_json::from_value(fields) {
                Ok(raw) => Some(raw),
                Err(e) => {
                    tracing::warn!(
                        list_id,
                        item_id = %item.id,
                        error = %e,
                        "undecodable list item"
                    );
                    None
                }
            }
        })
        .collect();

    if decoded.len() < total {
        tracing::info!(list_id, total, kept = decoded.len(), "skipped list items");
    }
    decoded
}

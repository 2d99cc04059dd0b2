use std::sync::Mutex;

use appin_common::error::{AppinError, AppinResult};
use appin_source::{AppIn, CaFinal, CaseQuery, CaseSource};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

/// In-memory [`CaseSource`] that records every query it receives.
pub struct MockSource {
    pub app_ins: Vec<AppIn>,
    pub ca_finals: Vec<CaFinal>,
    pub fail_reviews: bool,
    pub calls: Mutex<Vec<(&'static str, CaseQuery)>>,
}

impl MockSource {
    pub fn new(app_ins: Vec<AppIn>, ca_finals: Vec<CaFinal>) -> Self {
        Self {
            app_ins,
            ca_finals,
            fail_reviews: false,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CaseSource for MockSource {
    async fn list_app_ins(&self, query: &CaseQuery) -> AppinResult<Vec<AppIn>> {
        self.calls.lock().unwrap().push(("app_ins", query.clone()));
        Ok(self.app_ins.clone())
    }

    async fn list_ca_finals(&self, query: &CaseQuery) -> AppinResult<Vec<CaFinal>> {
        self.calls.lock().unwrap().push(("ca_finals", query.clone()));
        if self.fail_reviews {
            return Err(AppinError::Upstream("HTTP 503: unavailable".to_string()));
        }
        Ok(self.ca_finals.clone())
    }
}

fn created() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap()
}

/// Application created at 06:00 and completed after `done_mins`, if given.
pub fn app_in(number: &str, executor: &str, status: &str, done_mins: Option<i64>) -> AppIn {
    AppIn {
        number: number.to_string(),
        product: "MC".to_string(),
        customer_type: "New".to_string(),
        prename: String::new(),
        display_name: format!("Customer {number}"),
        display_name_english: String::new(),
        status: status.to_string(),
        finance_amount: "100000".to_string(),
        term: "48".to_string(),
        executor: executor.to_string(),
        created_by: "Front desk".to_string(),
        completed_at: done_mins.map(|m| created() + TimeDelta::minutes(m)),
        created_at: created(),
    }
}

pub fn ca_final(number: &str, executor: &str, status: &str, done_mins: Option<i64>) -> CaFinal {
    CaFinal {
        number: number.to_string(),
        display_name: format!("Customer {number}"),
        executor: executor.to_string(),
        status: status.to_string(),
        completed_at: done_mins.map(|m| created() + TimeDelta::minutes(m)),
        created_at: created(),
    }
}

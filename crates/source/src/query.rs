use appin_common::error::{AppinError, AppinResult};
use chrono::{DateTime, Months, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Customer types that belong to the App-In workflow. Other rows in the list
/// are tracked elsewhere.
pub const APP_IN_CUSTOMER_TYPES: &[&str] = &[
    "Change borrower",
    "C4C_Transfer",
    "C4C_Topup",
    "C4C_Normal",
    "EXC",
    "FL-EXC",
    "FL-NEW",
    "MC",
    "New",
    "Old",
    "Used Car",
];

/// Filter shared by the list and overview endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseQuery {
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub product: Option<String>,
}

impl CaseQuery {
    pub fn validate(&self) -> AppinResult<()> {
        if let (Some(after), Some(before)) = (self.created_after, self.created_before) {
            if after > before {
                return Err(AppinError::Validation(
                    "createdAfter must not be later than createdBefore".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn product(&self) -> Option<&str> {
        self.product
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// OData filter for the App-In list.
    ///
    /// Without any created window the last month before `now` is used.
    pub fn application_filter(&self, now: DateTime<Utc>) -> String {
        let types: Vec<String> = APP_IN_CUSTOMER_TYPES
            .iter()
            .map(|t| format!("fields/CustomerType eq {}", odata_string(t)))
            .collect();

        let mut clauses = vec![format!("({})", types.join(" or "))];

        if let Some(product) = self.product() {
            clauses.push(format!("fields/ServiceType eq {}", odata_string(product)));
        }

        match self.created_window() {
            Some(window) => clauses.push(window),
            None => {
                let month_ago = now.checked_sub_months(Months::new(1)).unwrap_or(now);
                clauses.push(format!("fields/Created ge '{}'", timestamp(month_ago)));
            }
        }

        clauses.join(" and ")
    }

    /// OData filter for the CA Final list; `None` when unbounded.
    pub fn review_filter(&self) -> Option<String> {
        self.created_window()
    }

    fn created_window(&self) -> Option<String> {
        match (self.created_after, self.created_before) {
            (Some(after), Some(before)) => Some(format!(
                "fields/Created ge '{}' and fields/Created le '{}'",
                timestamp(after),
                timestamp(before)
            )),
            (Some(after), None) => Some(format!("fields/Created ge '{}'", timestamp(after))),
            (None, Some(before)) => Some(format!("fields/Created le '{}'", timestamp(before))),
            (None, None) => None,
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Quote an OData string literal, doubling embedded single quotes.
fn odata_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

use appin_engine::CaseRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// `$select` list for App-In list items.
pub const APP_IN_FIELDS: &str = "Created,Title,LOFacility,ServiceType,CustomerType,Gender,\
ENGfullname,Status,CompletedDateTime,Creditamount,Instalmentperiod,AssignedTo,Author";

/// `$select` list for CA Final list items.
pub const CA_FINAL_FIELDS: &str = "FL,Fullname,CAFinalAssign,CaseStatus,FinalEndTime,AssignTime";

/// `fields` payload of an App-In list item, as stored in SharePoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAppIn {
    #[serde(rename = "LOFacility", default, deserialize_with = "lenient_string")]
    pub lo_facility: String,
    #[serde(rename = "ServiceType", default, deserialize_with = "lenient_string")]
    pub service_type: String,
    #[serde(rename = "CustomerType", default, deserialize_with = "lenient_string")]
    pub customer_type: String,
    #[serde(rename = "Gender", default, deserialize_with = "lenient_string")]
    pub gender: String,
    #[serde(rename = "Title", default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(rename = "ENGfullname", default, deserialize_with = "lenient_string")]
    pub eng_fullname: String,
    #[serde(rename = "Status", default, deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(rename = "Creditamount", default, deserialize_with = "lenient_string")]
    pub credit_amount: String,
    #[serde(rename = "Instalmentperiod", default, deserialize_with = "lenient_string")]
    pub instalment_period: String,
    #[serde(rename = "AssignedTo", default, deserialize_with = "lenient_string")]
    pub assigned_to: String,
    #[serde(rename = "Author", default, deserialize_with = "lenient_string")]
    pub author: String,
    #[serde(rename = "CompletedDateTime", default)]
    pub completed_date_time: Option<DateTime<Utc>>,
    #[serde(rename = "Created")]
    pub created: DateTime<Utc>,
}

/// `fields` payload of a CA Final list item.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCaFinal {
    #[serde(rename = "FL", default, deserialize_with = "lenient_string")]
    pub fl: String,
    #[serde(rename = "Fullname", default, deserialize_with = "lenient_string")]
    pub fullname: String,
    #[serde(rename = "CAFinalAssign", default, deserialize_with = "lenient_string")]
    pub ca_final_assign: String,
    #[serde(rename = "CaseStatus", default, deserialize_with = "lenient_string")]
    pub case_status: String,
    #[serde(rename = "FinalEndTime", default)]
    pub final_end_time: Option<DateTime<Utc>>,
    #[serde(rename = "AssignTime")]
    pub assign_time: DateTime<Utc>,
}

/// An App-In application as returned by `GET /v1/appins`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppIn {
    pub number: String,
    pub product: String,
    #[serde(rename = "type")]
    pub customer_type: String,
    pub prename: String,
    pub display_name: String,
    pub display_name_english: String,
    pub status: String,
    pub finance_amount: String,
    pub term: String,
    pub executor: String,
    pub created_by: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A CA Final review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaFinal {
    pub number: String,
    pub display_name: String,
    pub executor: String,
    pub status: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<RawAppIn> for AppIn {
    fn from(raw: RawAppIn) -> Self {
        Self {
            number: raw.lo_facility,
            product: raw.service_type,
            customer_type: raw.customer_type,
            prename: raw.gender,
            display_name: raw.title,
            display_name_english: raw.eng_fullname,
            status: raw.status,
            finance_amount: raw.credit_amount,
            term: raw.instalment_period,
            executor: raw.assigned_to,
            created_by: raw.author,
            completed_at: raw.completed_date_time,
            created_at: raw.created,
        }
    }
}

impl From<RawCaFinal> for CaFinal {
    fn from(raw: RawCaFinal) -> Self {
        Self {
            number: raw.fl,
            display_name: raw.fullname,
            executor: raw.ca_final_assign,
            status: raw.case_status,
            completed_at: raw.final_end_time,
            created_at: raw.assign_time,
        }
    }
}

impl From<&AppIn> for CaseRecord {
    fn from(a: &AppIn) -> Self {
        Self {
            number: a.number.clone(),
            display_name: a.display_name.clone(),
            product: a.product.clone(),
            category: a.customer_type.clone(),
            executor: a.executor.clone(),
            status: a.status.clone(),
            created_at: a.created_at,
            completed_at: a.completed_at,
        }
    }
}

impl From<&CaFinal> for CaseRecord {
    fn from(c: &CaFinal) -> Self {
        Self {
            number: c.number.clone(),
            display_name: c.display_name.clone(),
            product: String::new(),
            category: String::new(),
            executor: c.executor.clone(),
            status: c.status.clone(),
            created_at: c.created_at,
            completed_at: c.completed_at,
        }
    }
}

/// SharePoint returns some text columns as numbers (currency, counts) and
/// unset columns as `null`; accept all of them as text.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

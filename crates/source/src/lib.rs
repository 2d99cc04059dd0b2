//! Record retrieval from the SharePoint lists behind App-In and CA Final.

pub mod client;
pub mod models;
pub mod query;
pub mod source;

pub use client::{GraphClient, GraphClientError};
pub use models::{AppIn, CaFinal};
pub use query::CaseQuery;
pub use source::{CaseSource, GraphCaseSource};

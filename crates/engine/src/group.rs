use std::collections::BTreeMap;

use crate::config::ProductAlias;
use crate::models::CaseRecord;

/// Records per performer. Unassigned records are left out.
pub fn group_by_executor(records: &[CaseRecord]) -> BTreeMap<&str, Vec<&CaseRecord>> {
    let mut groups: BTreeMap<&str, Vec<&CaseRecord>> = BTreeMap::new();
    for record in records {
        let executor = record.executor_key();
        if executor.is_empty() {
            continue;
        }
        groups.entry(executor).or_default().push(record);
    }
    groups
}

/// Product key for a record, or `None` when the record has no type.
///
/// Aliased products are split by their type into `"{prefix} | {product}"`;
/// everything else is keyed by the raw product label.
pub fn product_key(record: &CaseRecord, aliases: &[ProductAlias]) -> Option<String> {
    let category = record.category.trim();
    if category.is_empty() {
        return None;
    }

    let product = record.product.trim();
    let prefix = aliases
        .iter()
        .find(|alias| alias.matches_product(product))
        .and_then(|alias| alias.prefix_for(category));

    Some(match prefix {
        Some(prefix) => format!("{prefix} | {product}"),
        None => product.to_string(),
    })
}

pub fn group_by_product<'a>(
    records: &'a [CaseRecord],
    aliases: &[ProductAlias],
) -> BTreeMap<String, Vec<&'a CaseRecord>> {
    let mut groups: BTreeMap<String, Vec<&CaseRecord>> = BTreeMap::new();
    for record in records {
        if let Some(key) = product_key(record, aliases) {
            groups.entry(key).or_default().push(record);
        }
    }
    groups
}

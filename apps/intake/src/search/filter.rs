use std::collections::BTreeSet;

use crate::models::resume::{ResumeRecord, ResumeStatus};
use crate::models::search::SearchFilters;

/// Case-insensitive substring match against the file name, parsed name or
/// parsed email. An empty query matches everything.
pub fn matches_query(record: &ResumeRecord, query: &str) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();

    [
        Some(record.file_name.as_str()),
        record.parsed_str("name"),
        record.parsed_str("email"),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(&needle))
}

/// An empty status set matches everything.
pub fn matches_status(record: &ResumeRecord, statuses: &BTreeSet<ResumeStatus>) -> bool {
    statuses.is_empty() || statuses.contains(&record.status)
}

pub fn matches(record: &ResumeRecord, filters: &SearchFilters) -> bool {
    matches_query(record, &filters.query)
        && matches_status(record, &filters.statuses)
        && filters
            .date_range
            .as_ref()
            .map_or(true, |range| range.contains(record.uploaded_at))
        && filters
            .group_id
            .map_or(true, |group_id| record.group_id == Some(group_id))
}

/// Records matching every active filter, in their original order.
pub fn filter_records(records: &[ResumeRecord], filters: &SearchFilters) -> Vec<ResumeRecord> {
    records
        .iter()
        .filter(|r| matches(r, filters))
        .cloned()
        .collect()
}

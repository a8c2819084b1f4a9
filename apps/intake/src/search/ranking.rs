//! Ranking Engine: orders candidate results by one scoring dimension.
//!
//! Numeric keys sort descending with a missing score counted as 0; `name`
//! sorts ascending, case-insensitively. Sorting is stable and there is no
//! secondary tie-break: equal keys keep their input order.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::candidate::CandidateResult;
use crate::models::group::Group;
use crate::models::resume::{ResumeRecord, ResumeStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Score,
    Name,
    Clarity,
    Experience,
    Reputation,
    Loyalty,
}

impl SortKey {
    fn numeric(self, candidate: &CandidateResult) -> f64 {
        let value = match self {
            SortKey::Score => candidate.score,
            SortKey::Clarity => candidate.clarity,
            SortKey::Experience => candidate.experience,
            SortKey::Reputation => candidate.reputation,
            SortKey::Loyalty => candidate.loyalty,
            SortKey::Name => None,
        };
        value.unwrap_or(0.0)
    }

    fn compare(self, a: &CandidateResult, b: &CandidateResult) -> Ordering {
        match self {
            SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            _ => self.numeric(b).total_cmp(&self.numeric(a)),
        }
    }
}

pub fn rank_candidates(mut candidates: Vec<CandidateResult>, key: SortKey) -> Vec<CandidateResult> {
    // `sort_by` is stable.
    candidates.sort_by(|a, b| key.compare(a, b));
    candidates
}

/// Projects completed records into candidate results, keeping record order.
pub fn project_candidates(records: &[ResumeRecord], groups: &[Group]) -> Vec<CandidateResult> {
    let group_names: HashMap<Uuid, &str> =
        groups.iter().map(|g| (g.id, g.name.as_str())).collect();

    records
        .iter()
        .filter(|r| r.status == ResumeStatus::Completed)
        .map(|r| {
            let group_name = r.group_id.and_then(|id| group_names.get(&id).copied());
            CandidateResult::from_record(r, group_name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, score: Option<f64>, clarity: Option<f64>) -> CandidateResult {
        CandidateResult {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: None,
            phone: None,
            clarity,
            experience: None,
            reputation: None,
            loyalty: None,
            score,
            match_score: None,
            group: None,
            comment: None,
        }
    }

    fn order(ranked: &[CandidateResult]) -> Vec<&str> {
        ranked.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_score_descending() {
        let ranked = rank_candidates(
            vec![
                candidate("low", Some(2.0), None),
                candidate("high", Some(9.0), None),
                candidate("mid", Some(5.0), None),
            ],
            SortKey::Score,
        );
        assert_eq!(order(&ranked), vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_equal_scores_keep_input_order() {
        let ranked = rank_candidates(
            vec![
                candidate("first", Some(7.0), None),
                candidate("top", Some(8.0), None),
                candidate("second", Some(7.0), None),
            ],
            SortKey::Score,
        );
        assert_eq!(order(&ranked), vec!["top", "first", "second"]);
    }

    #[test]
    fn test_missing_score_counts_as_zero() {
        let ranked = rank_candidates(
            vec![
                candidate("none", None, None),
                candidate("negative", Some(-1.0), None),
                candidate("some", Some(1.0), None),
            ],
            SortKey::Score,
        );
        assert_eq!(order(&ranked), vec!["some", "none", "negative"]);
    }

    #[test]
    fn test_name_ascending_case_insensitive_and_stable() {
        let mut a = candidate("alice", None, None);
        a.email = Some("first@x.io".to_string());
        let mut b = candidate("Alice", None, None);
        b.email = Some("second@x.io".to_string());

        let ranked = rank_candidates(
            vec![candidate("Zed", None, None), a, candidate("bob", None, None), b],
            SortKey::Name,
        );
        assert_eq!(order(&ranked), vec!["alice", "Alice", "bob", "Zed"]);
        assert_eq!(ranked[0].email.as_deref(), Some("first@x.io"));
    }

    #[test]
    fn test_sub_score_key() {
        let ranked = rank_candidates(
            vec![
                candidate("a", Some(9.0), Some(1.0)),
                candidate("b", Some(1.0), Some(9.0)),
            ],
            SortKey::Clarity,
        );
        assert_eq!(order(&ranked), vec!["b", "a"]);
    }

    #[test]
    fn test_projection_skips_unfinished_records() {
        let group = Group::new("Engineering", None);
        let mut done = ResumeRecord::placeholder("done.pdf", 10, Some(group.id));
        done.transition(ResumeStatus::Completed);
        let uploading = ResumeRecord::placeholder("wip.pdf", 10, None);

        let candidates = project_candidates(&[done, uploading], &[group]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "done");
        assert_eq!(candidates[0].group.as_deref(), Some("Engineering"));
    }

    #[test]
    fn test_sort_key_from_query_string() {
        let key: SortKey = serde_json::from_str("\"reputation\"").unwrap();
        assert_eq!(key, SortKey::Reputation);
    }
}

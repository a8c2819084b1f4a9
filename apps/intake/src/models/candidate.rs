use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::resume::ResumeRecord;

/// Read-only projection of a parsed resume used for search and ranking.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateResult {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub clarity: Option<f64>,
    pub experience: Option<f64>,
    pub reputation: Option<f64>,
    pub loyalty: Option<f64>,
    /// Aggregate score. Falls back to the mean of whichever sub-scores are present.
    pub score: Option<f64>,
    pub match_score: Option<f64>,
    pub group: Option<String>,
    pub comment: Option<String>,
}

impl CandidateResult {
    /// Builds a candidate from a record's parsed payload.
    ///
    /// Expected payload shape (all fields optional):
    /// `{ "name", "email", "phone", "comment", "match_score",
    ///    "scores": { "clarity", "experience", "reputation", "loyalty", "aggregate" } }`
    pub fn from_record(record: &ResumeRecord, group_name: Option<&str>) -> Self {
        let data = record.parsed_data.as_ref();
        let scores = data.and_then(|d| d.get("scores"));

        let clarity = number(scores, "clarity");
        let experience = number(scores, "experience");
        let reputation = number(scores, "reputation");
        let loyalty = number(scores, "loyalty");

        let score = number(scores, "aggregate").or_else(|| {
            let present: Vec<f64> = [clarity, experience, reputation, loyalty]
                .into_iter()
                .flatten()
                .collect();
            if present.is_empty() {
                None
            } else {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            }
        });

        let name = record
            .parsed_str("name")
            .map(String::from)
            .unwrap_or_else(|| file_stem(&record.file_name).to_string());

        Self {
            id: record.id,
            name,
            email: record.parsed_str("email").map(String::from),
            phone: record.parsed_str("phone").map(String::from),
            clarity,
            experience,
            reputation,
            loyalty,
            score,
            match_score: number(data, "match_score"),
            group: group_name.map(String::from),
            comment: record.parsed_str("comment").map(String::from),
        }
    }
}

fn number(source: Option<&Value>, key: &str) -> Option<f64> {
    source.and_then(|v| v.get(key)).and_then(Value::as_f64)
}

fn file_stem(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(file_name)
}

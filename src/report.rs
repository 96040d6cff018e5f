use serde::{Deserialize, Serialize};

/// One detected PII instance, exactly as the report endpoint returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    #[serde(rename = "type")]
    pub kind: String,
    /// `None` when the server sent null or left it out; re-serialised as null.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    /// Fields beyond type/value/score (offsets, hashes) carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub document_id: String,
    pub detections: Vec<DetectionRecord>,
}

impl Report {
    pub fn count_by_type(&self) -> std::collections::BTreeMap<&str, usize> {
        let mut counts = std::collections::BTreeMap::new();
        for d in &self.detections {
            *counts.entry(d.kind.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn max_score(&self) -> Option<f64> {
        self.detections
            .iter()
            .filter_map(|d| d.score)
            .fold(None, |acc, s| Some(acc.map_or(s, |a: f64| a.max(s))))
    }
}

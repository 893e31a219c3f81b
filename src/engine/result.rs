use serde::Serialize;
use std::collections::BTreeMap;

use super::season::{Provenance, SeasonSample};

/// How an insight reads for the requested side of the line.
///
/// Ordered from worst to best for the bettor: `Danger < Warning < Info < Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Evidence against the requested side
    Danger,
    /// Mixed or mildly unfavourable
    Warning,
    /// Neutral, informational, or not enough data to lean
    Info,
    /// Evidence supporting the requested side
    Success,
}

impl Status {
    /// ≥60% hits reads as support, under 40% as a warning sign.
    pub fn from_hit_rate(rate: Option<f64>) -> Self {
        match rate {
            None => Status::Info,
            Some(r) if r >= 0.6 => Status::Success,
            Some(r) if r >= 0.4 => Status::Warning,
            Some(_) => Status::Danger,
        }
    }

    /// Sign of a margin already oriented to the requested side.
    pub fn from_lean(lean: Option<f64>) -> Self {
        match lean {
            Some(l) if l > 0.0 => Status::Success,
            Some(l) if l < 0.0 => Status::Warning,
            _ => Status::Info,
        }
    }
}

/// One insight's verdict. Built once per request and never mutated after the
/// composer receives it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightResult {
    pub id: &'static str,
    pub narrative: String,
    pub values: BTreeMap<&'static str, Option<f64>>,
    pub status: Status,
    pub seasons_used: Vec<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InsightResult {
    pub fn new(id: &'static str, narrative: impl Into<String>, status: Status) -> Self {
        InsightResult {
            id,
            narrative: narrative.into(),
            values: BTreeMap::new(),
            status,
            seasons_used: Vec::new(),
            provenance: None,
            error: None,
        }
    }

    pub fn value(mut self, key: &'static str, value: Option<f64>) -> Self {
        self.values.insert(key, value);
        self
    }

    pub fn count(self, key: &'static str, value: usize) -> Self {
        self.value(key, Some(value as f64))
    }

    pub fn seasons(mut self, seasons: Vec<i32>) -> Self {
        self.seasons_used = seasons;
        self
    }

    /// Carry a sample's seasons and provenance.
    pub fn sample(mut self, sample: &SeasonSample) -> Self {
        self.seasons_used = sample.seasons_used.clone();
        self.provenance = Some(sample.provenance.clone());
        self
    }

    /// Valid result with null numbers for the given keys.
    pub fn insufficient(
        id: &'static str,
        have: usize,
        need: usize,
        keys: &[&'static str],
    ) -> Self {
        let mut result = InsightResult::new(
            id,
            format!(
                "Insufficient data: {} eligible game{}, need {}",
                have,
                if have == 1 { "" } else { "s" },
                need
            ),
            Status::Info,
        );
        for &key in keys {
            result.values.insert(key, None);
        }
        result
    }

    /// Error-flagged result standing in for a failed or timed-out insight.
    pub fn failed(id: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut result = InsightResult::new(id, format!("Unavailable: {}", message), Status::Info);
        result.error = Some(message);
        result
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

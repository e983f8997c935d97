//! Freeform fragment input model.
//!
//! The shape the external LLM-parsing layer hands to the normalizer: loose
//! rule fragments with short indicator labels and optional free-text
//! descriptions. Nothing here is trusted; everything flows through the
//! normalizer and validator before use.

use serde::{Deserialize, Serialize};

/// One freeform rule fragment extracted from the user's description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleFragment {
    /// Short indicator label, e.g. "opening range breakout" or "20 EMA".
    pub indicator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RuleFragment {
    pub fn new(indicator: &str, description: &str) -> Self {
        Self {
            indicator: indicator.to_string(),
            description: Some(description.to_string()),
        }
    }

    /// Label and description joined for keyword scanning.
    pub fn text(&self) -> String {
        match &self.description {
            Some(desc) => format!("{} {}", self.indicator, desc),
            None => self.indicator.clone(),
        }
    }
}

/// Loose position-sizing descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizingFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contracts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_contracts: Option<u32>,
}

/// Raw trading-hours filter, bounds as the user stated them ("09:30").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeFragment {
    pub start: String,
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// Everything the LLM layer extracted from one strategy conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedStrategy {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    pub instrument: String,
    #[serde(default)]
    pub entry_conditions: Vec<RuleFragment>,
    #[serde(default)]
    pub exit_conditions: Vec<RuleFragment>,
    #[serde(default)]
    pub filters: Vec<RuleFragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_sizing: Option<SizingFragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_filter: Option<TimeFragment>,
}

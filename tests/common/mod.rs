#![allow(dead_code)]

use stratagem::domain::fragments::{ParsedStrategy, RuleFragment, SizingFragment, TimeFragment};

pub fn fragment(indicator: &str, description: &str) -> RuleFragment {
    RuleFragment::new(indicator, description)
}

/// Scenario A input: 15-minute ES opening range breakout, opposite-range
/// stop, 1% risk capped at 5 contracts.
pub fn orb_bundle() -> ParsedStrategy {
    ParsedStrategy {
        name: "Morning ORB".to_string(),
        summary: "Long the break of the opening range".to_string(),
        instrument: "ES".to_string(),
        entry_conditions: vec![fragment(
            "opening range breakout",
            "15 minute opening range",
        )],
        exit_conditions: vec![fragment("stop loss", "opposite side of range")],
        filters: Vec::new(),
        position_sizing: Some(SizingFragment {
            description: Some("risk 1% per trade".to_string()),
            risk_percent: Some(1.0),
            contracts: None,
            max_contracts: Some(5),
        }),
        time_filter: Some(TimeFragment {
            start: "09:30".to_string(),
            end: "16:00".to_string(),
            timezone: None,
        }),
    }
}

pub fn ema_bundle() -> ParsedStrategy {
    ParsedStrategy {
        name: "EMA Dip Buyer".to_string(),
        summary: "Buy pullbacks in an uptrend".to_string(),
        instrument: "nasdaq".to_string(),
        entry_conditions: vec![fragment(
            "ema pullback",
            "pullback to the 21 ema when rsi is below 40",
        )],
        exit_conditions: vec![
            fragment("stop loss", "below the swing low"),
            fragment("take profit", "2:1 risk reward"),
        ],
        filters: vec![fragment("trend", "only take long setups")],
        position_sizing: None,
        time_filter: None,
    }
}

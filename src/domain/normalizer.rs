//! Pattern detection and normalization.
//!
//! Turns loose LLM-extracted rule fragments into a candidate canonical
//! record, then hands it to the validator before anything downstream sees it.
//!
//! # Classification semantics
//!
//! - Pattern rules run in table order: opening-range keywords are checked
//!   before generic breakout keywords (ORB text also contains "range" and
//!   "break"), and EMA pullback requires both an EMA-family term and a
//!   pullback term so a bare EMA mention never matches.
//! - Direction ambiguity resolves to the permissive `both`, never an error.
//! - Unknown instrument and unclassifiable pattern are blocking; both are
//!   reported together and no entry payload is built after either.
//! - Missing stop defaults to 20 fixed ticks, missing target to 2R. These two
//!   numbers are announced to the user by the conversational layer and must
//!   not drift.

use crate::domain::canonical::{
    BreakoutConfirmation, CanonicalStrategy, Direction, EntryOn, EntrySetup, ExitConfig, LevelType,
    Pattern, PositionSizing, PullbackConfirmation, RiskConfig, RsiDirection, RsiFilter, Session,
    StopKind, StopLoss, TakeProfit, TargetKind, TimeConfig, DEFAULT_MAX_CONTRACTS,
    DEFAULT_RISK_PERCENT, DEFAULT_STOP_TICKS, DEFAULT_TARGET_RR,
};
use crate::domain::error::NormalizeError;
use crate::domain::fragments::{ParsedStrategy, RuleFragment, SizingFragment, TimeFragment};
use crate::domain::instrument::InstrumentRegistry;
use crate::domain::validator;

/// One row of the ordered pattern classification table.
pub struct PatternRule {
    pub pattern: Pattern,
    pub matches: fn(&str) -> bool,
}

/// Ordered classification table. First match wins, so precedence is the
/// row order and nothing else.
pub static PATTERN_RULES: &[PatternRule] = &[
    PatternRule {
        pattern: Pattern::OpeningRangeBreakout,
        matches: is_opening_range,
    },
    PatternRule {
        pattern: Pattern::EmaPullback,
        matches: is_ema_pullback,
    },
    PatternRule {
        pattern: Pattern::Breakout,
        matches: is_breakout,
    },
];

fn is_opening_range(text: &str) -> bool {
    text.contains("opening range")
        || contains_word(text, "orb")
        || (contains_word(text, "open") && contains_word(text, "range"))
}

fn is_ema_pullback(text: &str) -> bool {
    let has_ema = contains_word(text, "ema")
        || text.contains("moving average")
        || text.contains("exponential average");
    let has_pullback = text.contains("pullback")
        || text.contains("pull back")
        || text.contains("retrace")
        || contains_word(text, "bounce")
        || contains_word(text, "dip");
    has_ema && has_pullback
}

fn is_breakout(text: &str) -> bool {
    text.contains("breakout")
        || text.contains("break out")
        || text.contains("break above")
        || text.contains("break below")
        || text.contains("breaks above")
        || text.contains("breaks below")
        || contains_word(text, "resistance")
        || contains_word(text, "support")
        || text.contains("new high")
        || text.contains("new low")
}

const LONG_VOCAB: &[&str] = &["long", "buy", "bull", "bullish", "upside", "calls"];
const SHORT_VOCAB: &[&str] = &["short", "sell", "bear", "bearish", "downside", "puts"];

fn mentions_stop(text: &str) -> bool {
    text.contains("stop") || contains_word(text, "sl") || text.contains("risk per trade")
}

fn mentions_target(text: &str) -> bool {
    text.contains("target") || text.contains("profit") || contains_word(text, "tp")
}

/// Normalize an AI-parsed fragment bundle into a validated canonical record.
pub fn normalize(
    parsed: &ParsedStrategy,
    registry: &InstrumentRegistry,
) -> Result<CanonicalStrategy, Vec<NormalizeError>> {
    let mut errors = Vec::new();

    let instrument = registry.resolve(&parsed.instrument);
    if instrument.is_none() {
        errors.push(NormalizeError::UnknownInstrument {
            input: parsed.instrument.clone(),
        });
    }

    let entry_text = joined_text(&parsed.entry_conditions);
    let pattern = classify_pattern(&entry_text);
    if pattern.is_none() {
        errors.push(NormalizeError::UnknownPattern);
    }

    // Both blocking conditions reported together; no payload is built past
    // this point without an instrument and a pattern.
    let (Some(instrument), Some(pattern)) = (instrument, pattern) else {
        return Err(errors);
    };

    let direction = classify_direction(&direction_text(parsed));
    let exit = normalize_exits(&parsed.exit_conditions);
    let risk = normalize_sizing(parsed.position_sizing.as_ref());
    let time = normalize_time(parsed.time_filter.as_ref());
    let setup = extract_entry(pattern, &entry_text);

    let candidate = CanonicalStrategy {
        direction,
        instrument: instrument.clone(),
        setup,
        exit,
        risk,
        time,
    };

    // A structurally-built candidate is not trusted on its own.
    match validator::validate(&candidate) {
        Ok(()) => Ok(candidate),
        Err(validation) => Err(validation.into_iter().map(NormalizeError::from).collect()),
    }
}

/// Evaluate the entry text against [`PATTERN_RULES`] in order.
pub fn classify_pattern(entry_text: &str) -> Option<Pattern> {
    let text = entry_text.to_lowercase();
    if text.trim().is_empty() {
        return None;
    }
    PATTERN_RULES
        .iter()
        .find(|rule| (rule.matches)(&text))
        .map(|rule| rule.pattern)
}

/// Scan for long-bias vs short-bias vocabulary. Both or neither found
/// resolves to [`Direction::Both`].
pub fn classify_direction(text: &str) -> Direction {
    let text = text.to_lowercase();
    let has_long = LONG_VOCAB.iter().any(|w| contains_word(&text, w));
    let has_short = SHORT_VOCAB.iter().any(|w| contains_word(&text, w));
    match (has_long, has_short) {
        (true, false) => Direction::Long,
        (false, true) => Direction::Short,
        _ => Direction::Both,
    }
}

fn direction_text(parsed: &ParsedStrategy) -> String {
    // Exits are excluded: "sell at the target" is not a short bias.
    let mut parts = vec![parsed.summary.clone()];
    parts.push(joined_text(&parsed.entry_conditions));
    parts.push(joined_text(&parsed.filters));
    parts.join(" ")
}

fn joined_text(fragments: &[RuleFragment]) -> String {
    fragments
        .iter()
        .map(RuleFragment::text)
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_exits(fragments: &[RuleFragment]) -> ExitConfig {
    let mut stop_text = None;
    let mut target_text = None;
    for fragment in fragments {
        let text = fragment.text().to_lowercase();
        if stop_text.is_none() && mentions_stop(&text) {
            stop_text = Some(text);
        } else if target_text.is_none() && mentions_target(&text) {
            target_text = Some(text);
        }
    }

    ExitConfig {
        stop_loss: stop_text.as_deref().map_or_else(
            || StopLoss {
                kind: StopKind::FixedTicks,
                value: DEFAULT_STOP_TICKS,
            },
            parse_stop_loss,
        ),
        take_profit: target_text.as_deref().map_or_else(
            || TakeProfit {
                kind: TargetKind::RrRatio,
                value: DEFAULT_TARGET_RR,
            },
            parse_take_profit,
        ),
    }
}

/// Ordered stop classification: structure > ATR > opposite-range > raw ticks.
/// Midpoint/percent-retrace wording counts as a structural reference.
pub fn parse_stop_loss(text: &str) -> StopLoss {
    let text = &text.to_lowercase();
    const STRUCTURE: &[&str] = &[
        "swing", "structure", "last low", "last high", "recent low", "recent high", "midpoint",
        "50%",
    ];
    if STRUCTURE.iter().any(|w| text.contains(w)) {
        return StopLoss {
            kind: StopKind::Structure,
            value: buffer_ticks(text),
        };
    }
    if contains_word(text, "atr") {
        return StopLoss {
            kind: StopKind::AtrMultiple,
            value: first_number(text).unwrap_or(1.5),
        };
    }
    if text.contains("opposite") || text.contains("other side") {
        return StopLoss {
            kind: StopKind::OppositeRange,
            value: buffer_ticks(text),
        };
    }
    StopLoss {
        kind: StopKind::FixedTicks,
        value: first_number(text).unwrap_or(DEFAULT_STOP_TICKS),
    }
}

/// Ordered target classification: R-multiple > structural level > raw ticks.
pub fn parse_take_profit(text: &str) -> TakeProfit {
    let text = &text.to_lowercase();
    const RR: &[&str] = &[
        "r:r",
        "risk reward",
        "risk-reward",
        "risk/reward",
        ":1",
        "r multiple",
    ];
    if RR.iter().any(|w| text.contains(w)) || has_r_multiple(text) {
        return TakeProfit {
            kind: TargetKind::RrRatio,
            value: first_number(text).unwrap_or(DEFAULT_TARGET_RR),
        };
    }
    const STRUCTURE: &[&str] = &[
        "structure",
        "swing",
        "resistance",
        "support",
        "midpoint",
        "previous high",
        "previous low",
        "50%",
    ];
    if STRUCTURE.iter().any(|w| text.contains(w)) {
        return TakeProfit {
            kind: TargetKind::Structure,
            value: buffer_ticks(text),
        };
    }
    if first_number(text).is_some() {
        return TakeProfit {
            kind: TargetKind::FixedTicks,
            value: first_number(text).unwrap_or(DEFAULT_STOP_TICKS),
        };
    }
    TakeProfit {
        kind: TargetKind::RrRatio,
        value: DEFAULT_TARGET_RR,
    }
}

fn normalize_sizing(fragment: Option<&SizingFragment>) -> RiskConfig {
    let Some(fragment) = fragment else {
        return RiskConfig::defaults();
    };
    let description = fragment
        .description
        .as_deref()
        .unwrap_or("")
        .to_lowercase();

    let percent_wording = description.contains('%')
        || description.contains("percent")
        || contains_word(&description, "risk");
    if fragment.risk_percent.is_some() || (percent_wording && fragment.contracts.is_none()) {
        let pct = fragment
            .risk_percent
            .or_else(|| first_number(&description))
            .unwrap_or(DEFAULT_RISK_PERCENT);
        return RiskConfig {
            position_sizing: PositionSizing::RiskPercent,
            risk_percent: Some(pct),
            contracts: None,
            max_contracts: fragment.max_contracts.unwrap_or(DEFAULT_MAX_CONTRACTS),
        };
    }

    let count_from_text = || {
        if description.contains("contract") {
            first_number(&description).map(|n| clamp_u32(n, 1, 10_000))
        } else {
            None
        }
    };
    if let Some(contracts) = fragment.contracts.or_else(count_from_text) {
        let contracts = contracts.max(1);
        return RiskConfig {
            position_sizing: PositionSizing::FixedContracts,
            risk_percent: None,
            contracts: Some(contracts),
            max_contracts: fragment
                .max_contracts
                .unwrap_or(DEFAULT_MAX_CONTRACTS)
                .max(contracts),
        };
    }

    RiskConfig::defaults()
}

/// Session table: 09:30-16:00 NY, 03:00-11:30 London, 20:00-04:00 Asia.
/// Anything else is custom with the raw bounds preserved as stated.
fn normalize_time(fragment: Option<&TimeFragment>) -> TimeConfig {
    let Some(fragment) = fragment else {
        return TimeConfig::defaults();
    };

    let session = match (parse_clock(&fragment.start), parse_clock(&fragment.end)) {
        (Some((9, 30)), Some((16, 0))) => Session::Ny,
        (Some((3, 0)), Some((11, 30))) => Session::London,
        (Some((20, 0)), Some((4, 0))) => Session::Asia,
        _ => Session::Custom,
    };

    let timezone = fragment
        .timezone
        .clone()
        .unwrap_or_else(|| session.default_timezone().to_string());

    match session {
        Session::Custom => TimeConfig {
            session,
            custom_start: Some(fragment.start.clone()),
            custom_end: Some(fragment.end.clone()),
            timezone,
        },
        _ => TimeConfig {
            session,
            custom_start: None,
            custom_end: None,
            timezone,
        },
    }
}

/// Build the pattern-specific entry payload from the joined entry text.
pub fn extract_entry(pattern: Pattern, entry_text: &str) -> EntrySetup {
    let text = entry_text.to_lowercase();
    match pattern {
        Pattern::OpeningRangeBreakout => extract_opening_range(&text),
        Pattern::EmaPullback => extract_ema_pullback(&text),
        Pattern::Breakout => extract_breakout(&text),
    }
}

fn extract_opening_range(text: &str) -> EntrySetup {
    let period_minutes = first_number(text)
        .map(|n| clamp_u32(n, 5, 120))
        .unwrap_or(15);

    let mentions_high = text.contains("high") || text.contains("break above");
    let mentions_low = text.contains("low") || text.contains("break below");
    let entry_on = match (mentions_high, mentions_low) {
        (true, false) => EntryOn::BreakHigh,
        (false, true) => EntryOn::BreakLow,
        _ => EntryOn::Both,
    };

    EntrySetup::OpeningRangeBreakout {
        period_minutes,
        entry_on,
    }
}

fn extract_ema_pullback(text: &str) -> EntrySetup {
    let ema_period = first_number(text).map(|n| clamp_u32(n, 2, 400)).unwrap_or(20);

    let pullback_confirmation = if contains_word(text, "bounce") {
        PullbackConfirmation::Bounce
    } else if text.contains("close above") || text.contains("closes above") {
        PullbackConfirmation::CloseAbove
    } else {
        PullbackConfirmation::Touch
    };

    let rsi_filter = text.find("rsi").map(|at| {
        let after = &text[at..];
        let direction = if contains_word(after, "above") || contains_word(after, "over") {
            RsiDirection::Above
        } else {
            RsiDirection::Below
        };
        RsiFilter {
            period: 14,
            threshold: first_number(after)
                .map(|n| f64::from(clamp_u32(n, 1, 99)))
                .unwrap_or(50.0),
            direction,
        }
    });

    EntrySetup::EmaPullback {
        ema_period,
        pullback_confirmation,
        rsi_filter,
    }
}

fn extract_breakout(text: &str) -> EntrySetup {
    let lookback_period = first_number(text)
        .map(|n| clamp_u32(n, 2, 500))
        .unwrap_or(20);

    let mentions_resistance = contains_word(text, "resistance") || text.contains("break above");
    let mentions_support = contains_word(text, "support") || text.contains("break below");
    let level_type = match (mentions_resistance, mentions_support) {
        (true, false) => LevelType::Resistance,
        (false, true) => LevelType::Support,
        _ => LevelType::Both,
    };

    let confirmation = if contains_word(text, "volume") {
        BreakoutConfirmation::Volume
    } else if text.contains("no confirmation") || text.contains("immediate") {
        BreakoutConfirmation::None
    } else {
        BreakoutConfirmation::Close
    };

    EntrySetup::Breakout {
        lookback_period,
        level_type,
        confirmation,
    }
}

/// Whole-word containment: "long" matches, "along" does not.
fn contains_word(text: &str, word: &str) -> bool {
    let mut start = 0;
    while let Some(at) = text[start..].find(word) {
        let begin = start + at;
        let end = begin + word.len();
        let boundary_before = begin == 0
            || !text[..begin]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let boundary_after = !text[end..].chars().next().is_some_and(|c| c.is_alphanumeric());
        if boundary_before && boundary_after {
            return true;
        }
        start = end;
    }
    false
}

/// First numeric token in the text, scanned by hand.
fn first_number(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            let mut has_dot = false;
            while i < bytes.len() && (bytes[i].is_ascii_digit() || (bytes[i] == b'.' && !has_dot)) {
                if bytes[i] == b'.' {
                    has_dot = true;
                }
                i += 1;
            }
            // Trailing dot is sentence punctuation, not a decimal point.
            let mut end = i;
            if bytes[end - 1] == b'.' {
                end -= 1;
            }
            if let Ok(n) = text[start..end].parse::<f64>() {
                return Some(n);
            }
        }
        i += 1;
    }
    None
}

/// "3R" / "2r" wording means an R-multiple target.
fn has_r_multiple(text: &str) -> bool {
    let bytes = text.as_bytes();
    for i in 0..bytes.len() {
        if (bytes[i] == b'r') && i > 0 && bytes[i - 1].is_ascii_digit() {
            let after = bytes.get(i + 1);
            if !after.is_some_and(|b| b.is_ascii_alphanumeric()) {
                return true;
            }
        }
    }
    false
}

/// Buffer ticks for structural stops/targets: a bare number near structural
/// wording reads as a tick buffer, absent means none.
fn buffer_ticks(text: &str) -> f64 {
    if text.contains("tick") {
        first_number(text).unwrap_or(0.0)
    } else {
        0.0
    }
}

fn clamp_u32(value: f64, min: u32, max: u32) -> u32 {
    if !value.is_finite() {
        return min;
    }
    let rounded = value.round();
    if rounded <= f64::from(min) {
        min
    } else if rounded >= f64::from(max) {
        max
    } else {
        rounded as u32
    }
}

fn parse_clock(raw: &str) -> Option<(u32, u32)> {
    let trimmed = raw.trim();
    let (hours, minutes) = trimmed.split_once(':')?;
    let h: u32 = hours.trim().parse().ok()?;
    let m: u32 = minutes.trim().get(..2).unwrap_or(minutes.trim()).parse().ok()?;
    if h < 24 && m < 60 { Some((h, m)) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(specs: &[(&str, &str)]) -> Vec<RuleFragment> {
        specs
            .iter()
            .map(|(label, desc)| RuleFragment::new(label, desc))
            .collect()
    }

    fn orb_parsed() -> ParsedStrategy {
        ParsedStrategy {
            name: "Morning ORB".to_string(),
            summary: "Trade the opening range breakout, long only".to_string(),
            instrument: "ES".to_string(),
            entry_conditions: fragments(&[(
                "opening range breakout",
                "15 minute opening range",
            )]),
            exit_conditions: fragments(&[("stop loss", "opposite side of range")]),
            filters: Vec::new(),
            position_sizing: Some(SizingFragment {
                description: Some("risk 1% per trade".to_string()),
                risk_percent: Some(1.0),
                contracts: None,
                max_contracts: Some(5),
            }),
            time_filter: None,
        }
    }

    #[test]
    fn scenario_a_normalizes_to_opening_range_breakout() {
        let registry = InstrumentRegistry::default();
        let canonical = normalize(&orb_parsed(), &registry).unwrap();

        assert_eq!(canonical.pattern(), Pattern::OpeningRangeBreakout);
        assert_eq!(canonical.instrument.symbol, "ES");
        assert_eq!(canonical.direction, Direction::Long);
        assert!(matches!(
            canonical.setup,
            EntrySetup::OpeningRangeBreakout {
                period_minutes: 15,
                ..
            }
        ));
        assert_eq!(canonical.exit.stop_loss.kind, StopKind::OppositeRange);
        assert_eq!(canonical.risk.position_sizing, PositionSizing::RiskPercent);
        assert_eq!(canonical.risk.risk_percent, Some(1.0));
        assert_eq!(canonical.risk.max_contracts, 5);
    }

    #[test]
    fn scenario_b_unknown_instrument_is_blocking() {
        let registry = InstrumentRegistry::default();
        let mut parsed = orb_parsed();
        parsed.instrument = "UNKNOWN".to_string();
        let errors = normalize(&parsed, &registry).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("instrument")));
    }

    #[test]
    fn blocking_errors_accumulate() {
        let registry = InstrumentRegistry::default();
        let mut parsed = orb_parsed();
        parsed.instrument = "UNKNOWN".to_string();
        parsed.entry_conditions = fragments(&[("candlestick magic", "hammer at noon")]);
        let errors = normalize(&parsed, &registry).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .any(|e| matches!(e, NormalizeError::UnknownInstrument { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, NormalizeError::UnknownPattern)));
    }

    #[test]
    fn orb_wins_over_generic_breakout_wording() {
        // ORB text also contains "range" and "break"; order decides.
        let pattern = classify_pattern("break of the 15 minute opening range high").unwrap();
        assert_eq!(pattern, Pattern::OpeningRangeBreakout);
    }

    #[test]
    fn bare_ema_mention_is_not_a_pullback() {
        let pattern = classify_pattern("price breaks above resistance with the 20 ema rising");
        assert_eq!(pattern, Some(Pattern::Breakout));
    }

    #[test]
    fn ema_with_pullback_term_classifies() {
        let pattern = classify_pattern("pullback to the 20 ema").unwrap();
        assert_eq!(pattern, Pattern::EmaPullback);
    }

    #[test]
    fn no_keywords_is_unknown() {
        assert_eq!(classify_pattern("buy when it feels right"), None);
        assert_eq!(classify_pattern(""), None);
    }

    #[test]
    fn direction_vocabulary() {
        assert_eq!(classify_direction("go long on strength"), Direction::Long);
        assert_eq!(classify_direction("short the weakness"), Direction::Short);
        assert_eq!(classify_direction("long and short setups"), Direction::Both);
        assert_eq!(classify_direction("trade the range"), Direction::Both);
        // Word boundaries: "along" is not "long".
        assert_eq!(classify_direction("move along the trend"), Direction::Both);
    }

    #[test]
    fn stop_parsing_precedence() {
        assert_eq!(
            parse_stop_loss("below the swing low").kind,
            StopKind::Structure
        );
        assert_eq!(parse_stop_loss("1.5 atr stop").kind, StopKind::AtrMultiple);
        assert_eq!(
            parse_stop_loss("opposite side of range").kind,
            StopKind::OppositeRange
        );
        assert_eq!(parse_stop_loss("30 tick stop").kind, StopKind::FixedTicks);
        // Structure outranks ATR when both appear.
        assert_eq!(
            parse_stop_loss("atr stop below the swing low").kind,
            StopKind::Structure
        );
    }

    #[test]
    fn stop_values_extracted_or_defaulted() {
        let atr = parse_stop_loss("2 atr stop");
        assert!((atr.value - 2.0).abs() < f64::EPSILON);
        let ticks = parse_stop_loss("stop 30 ticks away");
        assert!((ticks.value - 30.0).abs() < f64::EPSILON);
        let bare = parse_stop_loss("tight stop");
        assert_eq!(bare.kind, StopKind::FixedTicks);
        assert!((bare.value - DEFAULT_STOP_TICKS).abs() < f64::EPSILON);
    }

    #[test]
    fn target_parsing_precedence() {
        assert_eq!(parse_take_profit("2:1 risk reward").kind, TargetKind::RrRatio);
        assert_eq!(parse_take_profit("take profit at 3r").kind, TargetKind::RrRatio);
        assert_eq!(
            parse_take_profit("target the previous high").kind,
            TargetKind::Structure
        );
        assert_eq!(
            parse_take_profit("40 tick target").kind,
            TargetKind::FixedTicks
        );
    }

    #[test]
    fn missing_exits_fall_back_to_announced_defaults() {
        let registry = InstrumentRegistry::default();
        let mut parsed = orb_parsed();
        parsed.exit_conditions = Vec::new();
        let canonical = normalize(&parsed, &registry).unwrap();
        assert_eq!(canonical.exit.stop_loss.kind, StopKind::FixedTicks);
        assert!((canonical.exit.stop_loss.value - 20.0).abs() < f64::EPSILON);
        assert_eq!(canonical.exit.take_profit.kind, TargetKind::RrRatio);
        assert!((canonical.exit.take_profit.value - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fixed_contract_sizing() {
        let risk = normalize_sizing(Some(&SizingFragment {
            description: Some("always trade 2 contracts".to_string()),
            risk_percent: None,
            contracts: None,
            max_contracts: None,
        }));
        assert_eq!(risk.position_sizing, PositionSizing::FixedContracts);
        assert_eq!(risk.contracts, Some(2));
        assert_eq!(risk.max_contracts, DEFAULT_MAX_CONTRACTS);
    }

    #[test]
    fn fixed_count_above_ceiling_raises_the_ceiling() {
        let risk = normalize_sizing(Some(&SizingFragment {
            description: None,
            risk_percent: None,
            contracts: Some(15),
            max_contracts: None,
        }));
        assert_eq!(risk.contracts, Some(15));
        assert_eq!(risk.max_contracts, 15);
    }

    #[test]
    fn risk_percent_from_description_text() {
        let risk = normalize_sizing(Some(&SizingFragment {
            description: Some("risk 2% of the account".to_string()),
            risk_percent: None,
            contracts: None,
            max_contracts: None,
        }));
        assert_eq!(risk.position_sizing, PositionSizing::RiskPercent);
        assert_eq!(risk.risk_percent, Some(2.0));
    }

    #[test]
    fn missing_sizing_defaults() {
        let risk = normalize_sizing(None);
        assert_eq!(risk.position_sizing, PositionSizing::RiskPercent);
        assert_eq!(risk.risk_percent, Some(DEFAULT_RISK_PERCENT));
        assert_eq!(risk.max_contracts, DEFAULT_MAX_CONTRACTS);
    }

    #[test]
    fn dangerous_risk_is_rejected_at_the_trust_boundary() {
        let registry = InstrumentRegistry::default();
        let mut parsed = orb_parsed();
        parsed.position_sizing = Some(SizingFragment {
            description: Some("risk 10% per trade".to_string()),
            risk_percent: Some(10.0),
            contracts: None,
            max_contracts: None,
        });
        let errors = normalize(&parsed, &registry).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            NormalizeError::Validation(
                crate::domain::error::ValidationError::RiskCeilingExceeded { .. }
            )
        )));
    }

    #[test]
    fn session_table() {
        let ny = normalize_time(Some(&TimeFragment {
            start: "09:30".to_string(),
            end: "16:00".to_string(),
            timezone: None,
        }));
        assert_eq!(ny.session, Session::Ny);
        assert!(ny.custom_start.is_none());

        let london = normalize_time(Some(&TimeFragment {
            start: "03:00".to_string(),
            end: "11:30".to_string(),
            timezone: None,
        }));
        assert_eq!(london.session, Session::London);
        assert_eq!(london.timezone, "Europe/London");

        let asia = normalize_time(Some(&TimeFragment {
            start: "20:00".to_string(),
            end: "04:00".to_string(),
            timezone: None,
        }));
        assert_eq!(asia.session, Session::Asia);
    }

    #[test]
    fn unrecognized_hours_become_custom_with_raw_bounds() {
        let custom = normalize_time(Some(&TimeFragment {
            start: "10:15".to_string(),
            end: "14:45".to_string(),
            timezone: None,
        }));
        assert_eq!(custom.session, Session::Custom);
        assert_eq!(custom.custom_start.as_deref(), Some("10:15"));
        assert_eq!(custom.custom_end.as_deref(), Some("14:45"));
    }

    #[test]
    fn unparseable_hours_become_custom_preserved_verbatim() {
        let custom = normalize_time(Some(&TimeFragment {
            start: "after lunch".to_string(),
            end: "before close".to_string(),
            timezone: None,
        }));
        assert_eq!(custom.session, Session::Custom);
        assert_eq!(custom.custom_start.as_deref(), Some("after lunch"));
    }

    #[test]
    fn orb_period_clamped_to_sane_bounds() {
        let setup = extract_entry(Pattern::OpeningRangeBreakout, "600 minute opening range");
        assert!(matches!(
            setup,
            EntrySetup::OpeningRangeBreakout {
                period_minutes: 120,
                ..
            }
        ));
        let setup = extract_entry(Pattern::OpeningRangeBreakout, "1 minute opening range");
        assert!(matches!(
            setup,
            EntrySetup::OpeningRangeBreakout {
                period_minutes: 5,
                ..
            }
        ));
    }

    #[test]
    fn orb_entry_side_extraction() {
        let setup = extract_entry(
            Pattern::OpeningRangeBreakout,
            "break above the opening range high",
        );
        assert!(matches!(
            setup,
            EntrySetup::OpeningRangeBreakout {
                entry_on: EntryOn::BreakHigh,
                ..
            }
        ));
        let setup = extract_entry(Pattern::OpeningRangeBreakout, "opening range breakout");
        assert!(matches!(
            setup,
            EntrySetup::OpeningRangeBreakout {
                entry_on: EntryOn::Both,
                ..
            }
        ));
    }

    #[test]
    fn ema_extraction_with_rsi_filter() {
        let setup = extract_entry(
            Pattern::EmaPullback,
            "pullback to the 21 ema, enter when rsi is below 30",
        );
        match setup {
            EntrySetup::EmaPullback {
                ema_period,
                rsi_filter,
                ..
            } => {
                assert_eq!(ema_period, 21);
                let filter = rsi_filter.unwrap();
                assert!((filter.threshold - 30.0).abs() < f64::EPSILON);
                assert_eq!(filter.direction, RsiDirection::Below);
            }
            other => panic!("expected ema pullback, got {other:?}"),
        }
    }

    #[test]
    fn ema_confirmation_styles() {
        let bounce = extract_entry(Pattern::EmaPullback, "bounce off the 20 ema");
        assert!(matches!(
            bounce,
            EntrySetup::EmaPullback {
                pullback_confirmation: PullbackConfirmation::Bounce,
                ..
            }
        ));
        let close = extract_entry(Pattern::EmaPullback, "pullback then close above the 20 ema");
        assert!(matches!(
            close,
            EntrySetup::EmaPullback {
                pullback_confirmation: PullbackConfirmation::CloseAbove,
                ..
            }
        ));
    }

    #[test]
    fn breakout_extraction() {
        let setup = extract_entry(
            Pattern::Breakout,
            "break above 50 bar resistance on strong volume",
        );
        match setup {
            EntrySetup::Breakout {
                lookback_period,
                level_type,
                confirmation,
            } => {
                assert_eq!(lookback_period, 50);
                assert_eq!(level_type, LevelType::Resistance);
                assert_eq!(confirmation, BreakoutConfirmation::Volume);
            }
            other => panic!("expected breakout, got {other:?}"),
        }
    }

    #[test]
    fn first_number_scanning() {
        assert_eq!(first_number("15 minute range"), Some(15.0));
        assert_eq!(first_number("risk 1.5% max"), Some(1.5));
        assert_eq!(first_number("stop at 20."), Some(20.0));
        assert_eq!(first_number("no numbers here"), None);
    }

    #[test]
    fn r_multiple_wording() {
        assert!(has_r_multiple("take profit at 3r"));
        assert!(has_r_multiple("2r target"));
        assert!(!has_r_multiple("strong rally"));
        assert!(!has_r_multiple("4 reasons to enter"));
    }

    #[test]
    fn clock_parsing() {
        assert_eq!(parse_clock("09:30"), Some((9, 30)));
        assert_eq!(parse_clock(" 20:00 "), Some((20, 0)));
        assert_eq!(parse_clock("25:00"), None);
        assert_eq!(parse_clock("not a time"), None);
    }
}

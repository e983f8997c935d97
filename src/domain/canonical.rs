//! Canonical strategy schema.
//!
//! The closed, pattern-discriminated representation every downstream consumer
//! trusts. [`EntrySetup`] is an internally tagged sum type flattened into
//! [`CanonicalStrategy`], so the persisted JSON carries a `pattern`
//! discriminator and an `entry` payload whose shape cannot disagree with it:
//! a mismatched document fails to deserialize, and compiler/validator matches
//! are checked for exhaustiveness whenever a pattern is added.

use serde::{Deserialize, Serialize};

use crate::domain::instrument::InstrumentSpec;

/// Shared fallback stop: 20 ticks. Must stay consistent with what the
/// conversational layer tells the user it will assume.
pub const DEFAULT_STOP_TICKS: f64 = 20.0;
/// Shared fallback target: 2R.
pub const DEFAULT_TARGET_RR: f64 = 2.0;
pub const DEFAULT_RISK_PERCENT: f64 = 1.0;
pub const DEFAULT_MAX_CONTRACTS: u32 = 10;

/// Closed set of supported trade-setup archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    OpeningRangeBreakout,
    EmaPullback,
    Breakout,
}

impl Pattern {
    pub const ALL: [Pattern; 3] = [
        Pattern::OpeningRangeBreakout,
        Pattern::EmaPullback,
        Pattern::Breakout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Pattern::OpeningRangeBreakout => "opening_range_breakout",
            Pattern::EmaPullback => "ema_pullback",
            Pattern::Breakout => "breakout",
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOn {
    BreakHigh,
    BreakLow,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullbackConfirmation {
    Touch,
    CloseAbove,
    Bounce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiDirection {
    Above,
    Below,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RsiFilter {
    pub period: u32,
    pub threshold: f64,
    pub direction: RsiDirection,
}

impl RsiFilter {
    /// Baseline filter used when a typed-path update targets a filter field
    /// before any filter exists.
    pub fn baseline() -> Self {
        Self {
            period: 14,
            threshold: 50.0,
            direction: RsiDirection::Below,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelType {
    Resistance,
    Support,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakoutConfirmation {
    Close,
    Volume,
    None,
}

/// Pattern discriminator plus its pattern-specific entry payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern", content = "entry", rename_all = "snake_case")]
pub enum EntrySetup {
    #[serde(rename_all = "camelCase")]
    OpeningRangeBreakout { period_minutes: u32, entry_on: EntryOn },
    #[serde(rename_all = "camelCase")]
    EmaPullback {
        ema_period: u32,
        pullback_confirmation: PullbackConfirmation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rsi_filter: Option<RsiFilter>,
    },
    #[serde(rename_all = "camelCase")]
    Breakout {
        lookback_period: u32,
        level_type: LevelType,
        confirmation: BreakoutConfirmation,
    },
}

impl EntrySetup {
    pub fn pattern(&self) -> Pattern {
        match self {
            EntrySetup::OpeningRangeBreakout { .. } => Pattern::OpeningRangeBreakout,
            EntrySetup::EmaPullback { .. } => Pattern::EmaPullback,
            EntrySetup::Breakout { .. } => Pattern::Breakout,
        }
    }

    /// Documented entry defaults per pattern.
    pub fn defaults_for(pattern: Pattern) -> Self {
        match pattern {
            Pattern::OpeningRangeBreakout => EntrySetup::OpeningRangeBreakout {
                period_minutes: 15,
                entry_on: EntryOn::Both,
            },
            Pattern::EmaPullback => EntrySetup::EmaPullback {
                ema_period: 20,
                pullback_confirmation: PullbackConfirmation::Touch,
                rsi_filter: None,
            },
            Pattern::Breakout => EntrySetup::Breakout {
                lookback_period: 20,
                level_type: LevelType::Both,
                confirmation: BreakoutConfirmation::Close,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    FixedTicks,
    Structure,
    AtrMultiple,
    OppositeRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    RrRatio,
    FixedTicks,
    Structure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLoss {
    #[serde(rename = "type")]
    pub kind: StopKind,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeProfit {
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitConfig {
    pub stop_loss: StopLoss,
    pub take_profit: TakeProfit,
}

impl ExitConfig {
    pub fn defaults() -> Self {
        Self {
            stop_loss: StopLoss {
                kind: StopKind::FixedTicks,
                value: DEFAULT_STOP_TICKS,
            },
            take_profit: TakeProfit {
                kind: TargetKind::RrRatio,
                value: DEFAULT_TARGET_RR,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSizing {
    FixedContracts,
    RiskPercent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskConfig {
    pub position_sizing: PositionSizing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_percent: Option<f64>,
    /// Fixed contract count; required for fixed-contract sizing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contracts: Option<u32>,
    pub max_contracts: u32,
}

impl RiskConfig {
    pub fn defaults() -> Self {
        Self {
            position_sizing: PositionSizing::RiskPercent,
            risk_percent: Some(DEFAULT_RISK_PERCENT),
            contracts: None,
            max_contracts: DEFAULT_MAX_CONTRACTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Session {
    Ny,
    London,
    Asia,
    Custom,
}

impl Session {
    /// Exchange-local zone quoted to the user for each named session.
    pub fn default_timezone(&self) -> &'static str {
        match self {
            Session::Ny | Session::Custom => "America/New_York",
            Session::London => "Europe/London",
            Session::Asia => "Asia/Tokyo",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeConfig {
    pub session: Session,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_end: Option<String>,
    pub timezone: String,
}

impl TimeConfig {
    pub fn defaults() -> Self {
        Self {
            session: Session::Ny,
            custom_start: None,
            custom_end: None,
            timezone: Session::Ny.default_timezone().to_string(),
        }
    }
}

/// The validated, persisted strategy representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalStrategy {
    pub direction: Direction,
    pub instrument: InstrumentSpec,
    #[serde(flatten)]
    pub setup: EntrySetup,
    pub exit: ExitConfig,
    pub risk: RiskConfig,
    pub time: TimeConfig,
}

impl CanonicalStrategy {
    /// Documented defaults for a freshly created strategy: 20-tick stop, 2R
    /// target, 1% risk sizing capped at 10 contracts, NY session, plus the
    /// per-pattern entry defaults.
    pub fn defaults(pattern: Pattern, instrument: InstrumentSpec, direction: Direction) -> Self {
        Self {
            direction,
            instrument,
            setup: EntrySetup::defaults_for(pattern),
            exit: ExitConfig::defaults(),
            risk: RiskConfig::defaults(),
            time: TimeConfig::defaults(),
        }
    }

    pub fn pattern(&self) -> Pattern {
        self.setup.pattern()
    }
}

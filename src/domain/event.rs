//! Strategy edit events.
//!
//! Every mutation of a canonical strategy is an immutable event in an
//! append-only log; current state is only ever derived by folding the log.
//! Parameter updates address fields through [`ParamPath`], a closed typed
//! enum serialized as its dotted wire form, so an event can never create a
//! nested shape the schema does not have.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::canonical::{Direction, Pattern};
use crate::domain::error::ReplayError;
use crate::domain::instrument::InstrumentSpec;

/// Current on-disk format of the event log. Pre-migration records carry no
/// version marker and are lifted through `replay::from_canonical`.
pub const EVENT_LOG_VERSION: u32 = 1;

/// Typed address of one updatable canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamPath {
    Direction,
    StopLossType,
    StopLossValue,
    TakeProfitType,
    TakeProfitValue,
    PositionSizing,
    RiskPercent,
    Contracts,
    MaxContracts,
    Session,
    CustomStart,
    CustomEnd,
    Timezone,
    OrbPeriodMinutes,
    OrbEntryOn,
    EmaPeriod,
    EmaPullbackConfirmation,
    RsiFilterPeriod,
    RsiFilterThreshold,
    RsiFilterDirection,
    BreakoutLookback,
    BreakoutLevelType,
    BreakoutConfirmation,
}

impl ParamPath {
    pub const ALL: [ParamPath; 23] = [
        ParamPath::Direction,
        ParamPath::StopLossType,
        ParamPath::StopLossValue,
        ParamPath::TakeProfitType,
        ParamPath::TakeProfitValue,
        ParamPath::PositionSizing,
        ParamPath::RiskPercent,
        ParamPath::Contracts,
        ParamPath::MaxContracts,
        ParamPath::Session,
        ParamPath::CustomStart,
        ParamPath::CustomEnd,
        ParamPath::Timezone,
        ParamPath::OrbPeriodMinutes,
        ParamPath::OrbEntryOn,
        ParamPath::EmaPeriod,
        ParamPath::EmaPullbackConfirmation,
        ParamPath::RsiFilterPeriod,
        ParamPath::RsiFilterThreshold,
        ParamPath::RsiFilterDirection,
        ParamPath::BreakoutLookback,
        ParamPath::BreakoutLevelType,
        ParamPath::BreakoutConfirmation,
    ];

    /// Dotted wire form, identical to the persisted snapshot's field layout.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ParamPath::Direction => "direction",
            ParamPath::StopLossType => "exit.stopLoss.type",
            ParamPath::StopLossValue => "exit.stopLoss.value",
            ParamPath::TakeProfitType => "exit.takeProfit.type",
            ParamPath::TakeProfitValue => "exit.takeProfit.value",
            ParamPath::PositionSizing => "risk.positionSizing",
            ParamPath::RiskPercent => "risk.riskPercent",
            ParamPath::Contracts => "risk.contracts",
            ParamPath::MaxContracts => "risk.maxContracts",
            ParamPath::Session => "time.session",
            ParamPath::CustomStart => "time.customStart",
            ParamPath::CustomEnd => "time.customEnd",
            ParamPath::Timezone => "time.timezone",
            ParamPath::OrbPeriodMinutes => "entry.periodMinutes",
            ParamPath::OrbEntryOn => "entry.entryOn",
            ParamPath::EmaPeriod => "entry.emaPeriod",
            ParamPath::EmaPullbackConfirmation => "entry.pullbackConfirmation",
            ParamPath::RsiFilterPeriod => "entry.rsiFilter.period",
            ParamPath::RsiFilterThreshold => "entry.rsiFilter.threshold",
            ParamPath::RsiFilterDirection => "entry.rsiFilter.direction",
            ParamPath::BreakoutLookback => "entry.lookbackPeriod",
            ParamPath::BreakoutLevelType => "entry.levelType",
            ParamPath::BreakoutConfirmation => "entry.confirmation",
        }
    }
}

impl std::fmt::Display for ParamPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ParamPath {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParamPath::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ReplayError::UnknownPath {
                path: s.to_string(),
            })
    }
}

impl Serialize for ParamPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ParamPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Scalar payload of a parameter update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Number(f64::from(v))
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Flag(v)
    }
}

/// One smart default announced to the user alongside its explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedDefault {
    pub path: ParamPath,
    pub value: ParamValue,
    pub explanation: String,
}

/// The change itself, tagged by kind on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    #[serde(rename_all = "camelCase")]
    StrategyCreated {
        pattern: Pattern,
        instrument: InstrumentSpec,
        direction: Direction,
        initial_message: String,
    },
    #[serde(rename_all = "camelCase")]
    ParamUpdated {
        path: ParamPath,
        value: ParamValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_value: Option<ParamValue>,
        #[serde(default)]
        was_defaulted: bool,
    },
    #[serde(rename_all = "camelCase")]
    PatternChanged {
        from_pattern: Pattern,
        to_pattern: Pattern,
    },
    DefaultsApplied { defaults: Vec<AppliedDefault> },
}

impl EventKind {
    pub const fn name(&self) -> &'static str {
        match self {
            EventKind::StrategyCreated { .. } => "StrategyCreated",
            EventKind::ParamUpdated { .. } => "ParamUpdated",
            EventKind::PatternChanged { .. } => "PatternChanged",
            EventKind::DefaultsApplied { .. } => "DefaultsApplied",
        }
    }
}

/// An immutable log entry: unique id, wall-clock timestamp, and the change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl StrategyEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Ordered, append-only event sequence with its format-version marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    pub version: u32,
    pub events: Vec<StrategyEvent>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            version: EVENT_LOG_VERSION,
            events: Vec::new(),
        }
    }

    pub fn from_events(events: Vec<StrategyEvent>) -> Self {
        Self {
            version: EVENT_LOG_VERSION,
            events,
        }
    }

    /// Append a new event and return a reference to it.
    pub fn append(&mut self, kind: EventKind) -> &StrategyEvent {
        self.events.push(StrategyEvent::new(kind));
        &self.events[self.events.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

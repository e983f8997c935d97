//! Event fold and replay engine.
//!
//! Canonical state is only ever derived here: fold the log in order, then run
//! the result back through the validator. Folding is pure and cheap, so
//! replay-then-validate can run on every edit.
//!
//! # Fold semantics
//!
//! - `StrategyCreated` discards prior state and re-initializes from the
//!   pattern's documented defaults. It must be the first event of any log.
//! - `ParamUpdated` sets one typed-path field on a fresh copy of state.
//! - `PatternChanged` re-derives all entry defaults for the new pattern,
//!   discarding the old payload; instrument and direction carry forward.
//! - `DefaultsApplied` applies a batch of path/value pairs in order.
//! - Mode switches discard the other mode's parameter: setting fixed-contract
//!   sizing clears `riskPercent` (and vice versa), and naming a session
//!   clears custom bounds. Same rule as the pattern change, one level down.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::canonical::{CanonicalStrategy, EntrySetup, Pattern, PositionSizing, RsiFilter, Session};
use crate::domain::error::{ReplayError, ValidationError};
use crate::domain::event::{
    AppliedDefault, EventKind, EventLog, ParamPath, ParamValue, StrategyEvent,
};
use crate::domain::instrument::InstrumentSpec;
use crate::domain::validator;

/// Successful replay: the derived snapshot and how many events built it.
#[derive(Debug, Clone, PartialEq)]
pub struct Replayed {
    pub canonical: CanonicalStrategy,
    pub event_count: usize,
}

/// One problem found while replaying: either the stream itself is broken or
/// the folded result failed validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReplayIssue {
    #[error(transparent)]
    Stream(#[from] ReplayError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Reported, never thrown. `partial` holds the last good folded state for
/// diagnosis; `event_count` is how many events applied cleanly.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("replay failed after {event_count} event(s)")]
pub struct ReplayFailure {
    pub errors: Vec<ReplayIssue>,
    pub partial: Option<CanonicalStrategy>,
    pub event_count: usize,
}

/// Pure fold step: apply one event to the current state.
pub fn apply_event(
    state: Option<CanonicalStrategy>,
    event: &StrategyEvent,
) -> Result<CanonicalStrategy, ReplayError> {
    match &event.kind {
        EventKind::StrategyCreated {
            pattern,
            instrument,
            direction,
            ..
        } => Ok(CanonicalStrategy::defaults(
            *pattern,
            instrument.clone(),
            *direction,
        )),
        EventKind::ParamUpdated { path, value, .. } => {
            let mut next = require_state(state, "ParamUpdated")?;
            apply_param(&mut next, *path, value)?;
            Ok(next)
        }
        EventKind::PatternChanged { to_pattern, .. } => {
            let mut next = require_state(state, "PatternChanged")?;
            next.setup = EntrySetup::defaults_for(*to_pattern);
            Ok(next)
        }
        EventKind::DefaultsApplied { defaults } => {
            let mut next = require_state(state, "DefaultsApplied")?;
            for default in defaults {
                apply_param(&mut next, default.path, &default.value)?;
            }
            Ok(next)
        }
    }
}

fn require_state(
    state: Option<CanonicalStrategy>,
    found: &'static str,
) -> Result<CanonicalStrategy, ReplayError> {
    state.ok_or(ReplayError::FirstEventNotCreation { found })
}

/// Fold every event in order, then validate the result.
pub fn replay(log: &EventLog) -> Result<Replayed, ReplayFailure> {
    if log.is_empty() {
        return Err(ReplayFailure {
            errors: vec![ReplayError::EmptyLog.into()],
            partial: None,
            event_count: 0,
        });
    }

    let mut state: Option<CanonicalStrategy> = None;
    let mut applied = 0usize;
    for event in &log.events {
        match apply_event(state.take(), event) {
            Ok(next) => {
                state = Some(next);
                applied += 1;
            }
            Err(err) => {
                return Err(ReplayFailure {
                    errors: vec![err.into()],
                    partial: state,
                    event_count: applied,
                });
            }
        }
    }
    let Some(canonical) = state else {
        return Err(ReplayFailure {
            errors: vec![ReplayError::EmptyLog.into()],
            partial: None,
            event_count: 0,
        });
    };

    match validator::validate(&canonical) {
        Ok(()) => Ok(Replayed {
            canonical,
            event_count: applied,
        }),
        Err(validation) => Err(ReplayFailure {
            errors: validation.into_iter().map(ReplayIssue::from).collect(),
            partial: Some(canonical),
            event_count: applied,
        }),
    }
}

/// Latest pattern without a full replay.
pub fn current_pattern(log: &EventLog) -> Option<Pattern> {
    log.events.iter().rev().find_map(|event| match &event.kind {
        EventKind::PatternChanged { to_pattern, .. } => Some(*to_pattern),
        EventKind::StrategyCreated { pattern, .. } => Some(*pattern),
        _ => None,
    })
}

/// The instrument is only ever set at creation, immutable thereafter.
pub fn current_instrument(log: &EventLog) -> Option<&InstrumentSpec> {
    log.events.iter().rev().find_map(|event| match &event.kind {
        EventKind::StrategyCreated { instrument, .. } => Some(instrument),
        _ => None,
    })
}

/// Structural stream check: non-empty and opened by a creation event.
pub fn is_well_formed(log: &EventLog) -> bool {
    matches!(
        log.events.first().map(|e| &e.kind),
        Some(EventKind::StrategyCreated { .. })
    )
}

/// Lift a legacy, non-event-sourced snapshot into the event model: one
/// synthetic creation event, plus one defaults batch restating whatever
/// diverges from the pattern defaults so the snapshot replays to itself.
/// Prior edit history is lost; that is the documented cost of migration.
pub fn from_canonical(canonical: &CanonicalStrategy) -> Vec<StrategyEvent> {
    let mut events = vec![StrategyEvent::new(EventKind::StrategyCreated {
        pattern: canonical.pattern(),
        instrument: canonical.instrument.clone(),
        direction: canonical.direction,
        initial_message: "migrated from a saved strategy".to_string(),
    })];

    let baseline = CanonicalStrategy::defaults(
        canonical.pattern(),
        canonical.instrument.clone(),
        canonical.direction,
    );
    let defaults = diff_params(&baseline, canonical);
    if !defaults.is_empty() {
        events.push(StrategyEvent::new(EventKind::DefaultsApplied { defaults }));
    }
    events
}

fn apply_param(
    state: &mut CanonicalStrategy,
    path: ParamPath,
    value: &ParamValue,
) -> Result<(), ReplayError> {
    match path {
        ParamPath::Direction => state.direction = coerce(path, value)?,
        ParamPath::StopLossType => state.exit.stop_loss.kind = coerce(path, value)?,
        ParamPath::StopLossValue => state.exit.stop_loss.value = coerce(path, value)?,
        ParamPath::TakeProfitType => state.exit.take_profit.kind = coerce(path, value)?,
        ParamPath::TakeProfitValue => state.exit.take_profit.value = coerce(path, value)?,
        ParamPath::PositionSizing => {
            let sizing: PositionSizing = coerce(path, value)?;
            state.risk.position_sizing = sizing;
            match sizing {
                PositionSizing::FixedContracts => state.risk.risk_percent = None,
                PositionSizing::RiskPercent => state.risk.contracts = None,
            }
        }
        ParamPath::RiskPercent => state.risk.risk_percent = Some(coerce(path, value)?),
        ParamPath::Contracts => state.risk.contracts = Some(coerce(path, value)?),
        ParamPath::MaxContracts => state.risk.max_contracts = coerce(path, value)?,
        ParamPath::Session => {
            let session: Session = coerce(path, value)?;
            state.time.session = session;
            if session != Session::Custom {
                state.time.custom_start = None;
                state.time.custom_end = None;
            }
        }
        ParamPath::CustomStart => state.time.custom_start = Some(coerce(path, value)?),
        ParamPath::CustomEnd => state.time.custom_end = Some(coerce(path, value)?),
        ParamPath::Timezone => state.time.timezone = coerce(path, value)?,
        ParamPath::OrbPeriodMinutes
        | ParamPath::OrbEntryOn
        | ParamPath::EmaPeriod
        | ParamPath::EmaPullbackConfirmation
        | ParamPath::RsiFilterPeriod
        | ParamPath::RsiFilterThreshold
        | ParamPath::RsiFilterDirection
        | ParamPath::BreakoutLookback
        | ParamPath::BreakoutLevelType
        | ParamPath::BreakoutConfirmation => apply_entry_param(state, path, value)?,
    }
    Ok(())
}

fn apply_entry_param(
    state: &mut CanonicalStrategy,
    path: ParamPath,
    value: &ParamValue,
) -> Result<(), ReplayError> {
    let pattern = state.setup.pattern();
    match (&mut state.setup, path) {
        (
            EntrySetup::OpeningRangeBreakout { period_minutes, .. },
            ParamPath::OrbPeriodMinutes,
        ) => *period_minutes = coerce(path, value)?,
        (EntrySetup::OpeningRangeBreakout { entry_on, .. }, ParamPath::OrbEntryOn) => {
            *entry_on = coerce(path, value)?
        }
        (EntrySetup::EmaPullback { ema_period, .. }, ParamPath::EmaPeriod) => {
            *ema_period = coerce(path, value)?
        }
        (
            EntrySetup::EmaPullback {
                pullback_confirmation,
                ..
            },
            ParamPath::EmaPullbackConfirmation,
        ) => *pullback_confirmation = coerce(path, value)?,
        (EntrySetup::EmaPullback { rsi_filter, .. }, ParamPath::RsiFilterPeriod) => {
            rsi_filter.get_or_insert_with(RsiFilter::baseline).period = coerce(path, value)?
        }
        (EntrySetup::EmaPullback { rsi_filter, .. }, ParamPath::RsiFilterThreshold) => {
            rsi_filter.get_or_insert_with(RsiFilter::baseline).threshold = coerce(path, value)?
        }
        (EntrySetup::EmaPullback { rsi_filter, .. }, ParamPath::RsiFilterDirection) => {
            rsi_filter.get_or_insert_with(RsiFilter::baseline).direction = coerce(path, value)?
        }
        (EntrySetup::Breakout { lookback_period, .. }, ParamPath::BreakoutLookback) => {
            *lookback_period = coerce(path, value)?
        }
        (EntrySetup::Breakout { level_type, .. }, ParamPath::BreakoutLevelType) => {
            *level_type = coerce(path, value)?
        }
        (EntrySetup::Breakout { confirmation, .. }, ParamPath::BreakoutConfirmation) => {
            *confirmation = coerce(path, value)?
        }
        _ => {
            return Err(ReplayError::PathPatternMismatch {
                path: path.as_str(),
                pattern,
            });
        }
    }
    Ok(())
}

/// Reuse the schema's serde forms for coercion instead of a parallel keyword
/// table: "fixed_ticks" deserializes into `StopKind` the same way the
/// snapshot does.
fn coerce<T: DeserializeOwned>(path: ParamPath, value: &ParamValue) -> Result<T, ReplayError> {
    serde_json::from_value(wire_json(value)).map_err(|e| ReplayError::InvalidValue {
        path: path.as_str(),
        reason: e.to_string(),
    })
}

/// Whole numbers travel as integers so they can land in integer fields.
fn wire_json(value: &ParamValue) -> Value {
    match value {
        ParamValue::Number(n)
            if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 =>
        {
            Value::from(*n as i64)
        }
        ParamValue::Number(n) => serde_json::json!(n),
        ParamValue::Text(s) => Value::from(s.clone()),
        ParamValue::Flag(b) => Value::from(*b),
    }
}

fn wire_value<T: Serialize>(field: &T) -> ParamValue {
    match serde_json::to_value(field) {
        Ok(Value::String(s)) => ParamValue::Text(s),
        Ok(Value::Number(n)) => ParamValue::Number(n.as_f64().unwrap_or(0.0)),
        Ok(Value::Bool(b)) => ParamValue::Flag(b),
        _ => ParamValue::Text(String::new()),
    }
}

const MIGRATED: &str = "carried over from the saved strategy";

fn diff_params(baseline: &CanonicalStrategy, target: &CanonicalStrategy) -> Vec<AppliedDefault> {
    let mut out = Vec::new();
    let mut push = |path: ParamPath, value: ParamValue| {
        out.push(AppliedDefault {
            path,
            value,
            explanation: MIGRATED.to_string(),
        });
    };

    let (base_exit, exit) = (&baseline.exit, &target.exit);
    if exit.stop_loss.kind != base_exit.stop_loss.kind {
        push(ParamPath::StopLossType, wire_value(&exit.stop_loss.kind));
    }
    if exit.stop_loss.value != base_exit.stop_loss.value {
        push(ParamPath::StopLossValue, exit.stop_loss.value.into());
    }
    if exit.take_profit.kind != base_exit.take_profit.kind {
        push(ParamPath::TakeProfitType, wire_value(&exit.take_profit.kind));
    }
    if exit.take_profit.value != base_exit.take_profit.value {
        push(ParamPath::TakeProfitValue, exit.take_profit.value.into());
    }

    let (base_risk, risk) = (&baseline.risk, &target.risk);
    if risk.position_sizing != base_risk.position_sizing {
        push(ParamPath::PositionSizing, wire_value(&risk.position_sizing));
    }
    if let Some(pct) = risk.risk_percent {
        if base_risk.risk_percent != Some(pct) {
            push(ParamPath::RiskPercent, pct.into());
        }
    }
    if let Some(contracts) = risk.contracts {
        push(ParamPath::Contracts, contracts.into());
    }
    if risk.max_contracts != base_risk.max_contracts {
        push(ParamPath::MaxContracts, risk.max_contracts.into());
    }

    let (base_time, time) = (&baseline.time, &target.time);
    if time.session != base_time.session {
        push(ParamPath::Session, wire_value(&time.session));
    }
    if let Some(start) = &time.custom_start {
        push(ParamPath::CustomStart, start.as_str().into());
    }
    if let Some(end) = &time.custom_end {
        push(ParamPath::CustomEnd, end.as_str().into());
    }
    if time.timezone != base_time.timezone {
        push(ParamPath::Timezone, time.timezone.as_str().into());
    }

    diff_entry(&baseline.setup, &target.setup, &mut push);
    out
}

fn diff_entry(
    baseline: &EntrySetup,
    target: &EntrySetup,
    push: &mut impl FnMut(ParamPath, ParamValue),
) {
    match (baseline, target) {
        (
            EntrySetup::OpeningRangeBreakout {
                period_minutes: base_period,
                entry_on: base_on,
            },
            EntrySetup::OpeningRangeBreakout {
                period_minutes,
                entry_on,
            },
        ) => {
            if period_minutes != base_period {
                push(ParamPath::OrbPeriodMinutes, (*period_minutes).into());
            }
            if entry_on != base_on {
                push(ParamPath::OrbEntryOn, wire_value(entry_on));
            }
        }
        (
            EntrySetup::EmaPullback {
                ema_period: base_period,
                pullback_confirmation: base_confirmation,
                ..
            },
            EntrySetup::EmaPullback {
                ema_period,
                pullback_confirmation,
                rsi_filter,
            },
        ) => {
            if ema_period != base_period {
                push(ParamPath::EmaPeriod, (*ema_period).into());
            }
            if pullback_confirmation != base_confirmation {
                push(
                    ParamPath::EmaPullbackConfirmation,
                    wire_value(pullback_confirmation),
                );
            }
            // Pattern defaults never carry a filter, so any filter is a diff.
            if let Some(filter) = rsi_filter {
                push(ParamPath::RsiFilterPeriod, filter.period.into());
                push(ParamPath::RsiFilterThreshold, filter.threshold.into());
                push(ParamPath::RsiFilterDirection, wire_value(&filter.direction));
            }
        }
        (
            EntrySetup::Breakout {
                lookback_period: base_lookback,
                level_type: base_level,
                confirmation: base_confirmation,
            },
            EntrySetup::Breakout {
                lookback_period,
                level_type,
                confirmation,
            },
        ) => {
            if lookback_period != base_lookback {
                push(ParamPath::BreakoutLookback, (*lookback_period).into());
            }
            if level_type != base_level {
                push(ParamPath::BreakoutLevelType, wire_value(level_type));
            }
            if confirmation != base_confirmation {
                push(ParamPath::BreakoutConfirmation, wire_value(confirmation));
            }
        }
        // Baseline shares the target's pattern by construction.
        _ => {}
    }
}

//! Canonical schema validator.
//!
//! The single trusted gate: nothing is persisted, compiled, or replayed
//! without passing through [`validate`]. Errors accumulate so one pass
//! reports every violation. Field names in errors use the persisted wire
//! names ("exit.stopLoss.value"), matching the typed parameter paths.

use crate::domain::canonical::{
    CanonicalStrategy, EntrySetup, PositionSizing, Session, StopKind, TargetKind,
};
use crate::domain::error::ValidationError;

pub const ORB_PERIOD_MINUTES: (f64, f64) = (5.0, 120.0);
pub const EMA_PERIOD: (f64, f64) = (2.0, 400.0);
pub const RSI_PERIOD: (f64, f64) = (2.0, 100.0);
pub const RSI_THRESHOLD: (f64, f64) = (1.0, 99.0);
pub const BREAKOUT_LOOKBACK: (f64, f64) = (2.0, 500.0);

/// Hard ceiling on risk-percent sizing. Enforced here, at the trust boundary,
/// so it cannot be bypassed by skipping the UI-side heuristic detector.
pub const RISK_PERCENT_CEILING: f64 = 5.0;

/// Check a candidate against the closed schema: numeric bounds, sub-object
/// completeness, and per-pattern payload constraints.
pub fn validate(candidate: &CanonicalStrategy) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_instrument(candidate, &mut errors);
    check_entry(candidate, &mut errors);
    check_exit(candidate, &mut errors);
    check_risk(candidate, &mut errors);
    check_time(candidate, &mut errors);

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn check_range(
    field: &'static str,
    value: f64,
    (min, max): (f64, f64),
    errors: &mut Vec<ValidationError>,
) {
    if !value.is_finite() || value < min || value > max {
        errors.push(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
}

fn check_positive(field: &'static str, value: f64, errors: &mut Vec<ValidationError>) {
    if !value.is_finite() || value <= 0.0 {
        errors.push(ValidationError::Invalid {
            field,
            reason: format!("must be a positive number, got {value}"),
        });
    }
}

fn check_instrument(candidate: &CanonicalStrategy, errors: &mut Vec<ValidationError>) {
    if candidate.instrument.symbol.trim().is_empty() {
        errors.push(ValidationError::Missing {
            field: "instrument.symbol",
        });
    }
    check_positive("instrument.tickSize", candidate.instrument.tick_size, errors);
    check_positive(
        "instrument.tickValue",
        candidate.instrument.tick_value,
        errors,
    );
}

fn check_entry(candidate: &CanonicalStrategy, errors: &mut Vec<ValidationError>) {
    // Exhaustive on purpose: a fourth pattern fails to compile until it is
    // given bounds here, an extractor in the normalizer, and a default set.
    match &candidate.setup {
        EntrySetup::OpeningRangeBreakout { period_minutes, .. } => {
            check_range(
                "entry.periodMinutes",
                f64::from(*period_minutes),
                ORB_PERIOD_MINUTES,
                errors,
            );
        }
        EntrySetup::EmaPullback {
            ema_period,
            rsi_filter,
            ..
        } => {
            check_range("entry.emaPeriod", f64::from(*ema_period), EMA_PERIOD, errors);
            if let Some(filter) = rsi_filter {
                check_range(
                    "entry.rsiFilter.period",
                    f64::from(filter.period),
                    RSI_PERIOD,
                    errors,
                );
                check_range(
                    "entry.rsiFilter.threshold",
                    filter.threshold,
                    RSI_THRESHOLD,
                    errors,
                );
            }
        }
        EntrySetup::Breakout {
            lookback_period, ..
        } => {
            check_range(
                "entry.lookbackPeriod",
                f64::from(*lookback_period),
                BREAKOUT_LOOKBACK,
                errors,
            );
        }
    }
}

fn check_exit(candidate: &CanonicalStrategy, errors: &mut Vec<ValidationError>) {
    let stop = &candidate.exit.stop_loss;
    match stop.kind {
        StopKind::FixedTicks => check_range(
            "exit.stopLoss.value",
            stop.value,
            (1.0, 10_000.0),
            errors,
        ),
        StopKind::AtrMultiple => check_positive("exit.stopLoss.value", stop.value, errors),
        StopKind::Structure | StopKind::OppositeRange => {
            // Value is a buffer in ticks on top of the reference level.
            if !stop.value.is_finite() || stop.value < 0.0 {
                errors.push(ValidationError::Invalid {
                    field: "exit.stopLoss.value",
                    reason: format!("buffer must be non-negative, got {}", stop.value),
                });
            }
        }
    }

    let target = &candidate.exit.take_profit;
    match target.kind {
        TargetKind::RrRatio => check_range("exit.takeProfit.value", target.value, (0.1, 20.0), errors),
        TargetKind::FixedTicks => check_range(
            "exit.takeProfit.value",
            target.value,
            (1.0, 10_000.0),
            errors,
        ),
        TargetKind::Structure => {
            if !target.value.is_finite() || target.value < 0.0 {
                errors.push(ValidationError::Invalid {
                    field: "exit.takeProfit.value",
                    reason: format!("buffer must be non-negative, got {}", target.value),
                });
            }
        }
    }
}

fn check_risk(candidate: &CanonicalStrategy, errors: &mut Vec<ValidationError>) {
    let risk = &candidate.risk;
    if risk.max_contracts < 1 {
        errors.push(ValidationError::Invalid {
            field: "risk.maxContracts",
            reason: "must be at least 1".to_string(),
        });
    }
    match risk.position_sizing {
        PositionSizing::RiskPercent => match risk.risk_percent {
            None => errors.push(ValidationError::Missing {
                field: "risk.riskPercent",
            }),
            Some(pct) if !pct.is_finite() || pct <= 0.0 => {
                errors.push(ValidationError::Invalid {
                    field: "risk.riskPercent",
                    reason: format!("must be a positive number, got {pct}"),
                });
            }
            Some(pct) if pct > RISK_PERCENT_CEILING => {
                errors.push(ValidationError::RiskCeilingExceeded {
                    value: pct,
                    ceiling: RISK_PERCENT_CEILING,
                });
            }
            Some(_) => {}
        },
        PositionSizing::FixedContracts => match risk.contracts {
            None => errors.push(ValidationError::Missing {
                field: "risk.contracts",
            }),
            Some(0) => errors.push(ValidationError::Invalid {
                field: "risk.contracts",
                reason: "must be at least 1".to_string(),
            }),
            Some(_) => {}
        },
    }
}

fn check_time(candidate: &CanonicalStrategy, errors: &mut Vec<ValidationError>) {
    let time = &candidate.time;
    if time.timezone.trim().is_empty() {
        errors.push(ValidationError::Missing {
            field: "time.timezone",
        });
    }
    match time.session {
        Session::Custom => {
            if time.custom_start.is_none() {
                errors.push(ValidationError::Missing {
                    field: "time.customStart",
                });
            }
            if time.custom_end.is_none() {
                errors.push(ValidationError::Missing {
                    field: "time.customEnd",
                });
            }
        }
        Session::Ny | Session::London | Session::Asia => {
            if time.custom_start.is_some() || time.custom_end.is_some() {
                errors.push(ValidationError::Invalid {
                    field: "time.session",
                    reason: "named session must not carry custom bounds".to_string(),
                });
            }
        }
    }
}

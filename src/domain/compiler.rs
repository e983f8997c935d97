//! Strategy compiler.
//!
//! Turns a validated canonical record into pure decision functions over a
//! market snapshot. Every method is total: configuration reaching this module
//! has already passed the validator, so a panic here is a validator bug, not
//! a runtime condition.
//!
//! # Decision semantics
//!
//! - Opening range: current price against the recorded session range,
//!   filtered by the configured entry side.
//! - EMA pullback: proximity to the EMA plus the configured confirmation
//!   style, gated by the optional RSI filter.
//! - Breakout: rolling lookback high/low with plain or volume-confirmed
//!   close.
//! - A `both`-direction strategy infers the trade side from which level the
//!   price is violating; `long`/`short` strategies only ever take their side.

use crate::domain::canonical::{
    BreakoutConfirmation, CanonicalStrategy, Direction, EntryOn, EntrySetup, LevelType,
    PositionSizing, PullbackConfirmation, RsiDirection, StopKind, TargetKind,
    DEFAULT_RISK_PERCENT,
};

/// Tolerance around the EMA that still counts as a touch, in ticks.
const EMA_TOUCH_TICKS: f64 = 2.0;

/// Market snapshot handed in by the execution engine. Plain values, no I/O.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketContext {
    pub price: f64,
    pub prev_price: f64,
    /// Recorded opening-range bounds for the session.
    pub range_high: f64,
    pub range_low: f64,
    pub ema: f64,
    pub rsi: f64,
    /// Rolling lookback extremes for breakout levels.
    pub lookback_high: f64,
    pub lookback_low: f64,
    pub volume: f64,
    pub average_volume: f64,
    /// Structural reference level for structure stops/targets.
    pub structure_level: f64,
    pub atr: f64,
}

/// A validated strategy bundled with its decision functions.
#[derive(Debug, Clone)]
pub struct CompiledStrategy {
    strategy: CanonicalStrategy,
}

/// Compile a validated canonical record. The caller is responsible for having
/// run the validator; compilation itself cannot fail.
pub fn compile(validated: CanonicalStrategy) -> CompiledStrategy {
    CompiledStrategy {
        strategy: validated,
    }
}

impl CompiledStrategy {
    pub fn strategy(&self) -> &CanonicalStrategy {
        &self.strategy
    }

    pub fn should_enter(&self, ctx: &MarketContext) -> bool {
        match &self.strategy.setup {
            EntrySetup::OpeningRangeBreakout { entry_on, .. } => {
                let broke_high = ctx.price > ctx.range_high;
                let broke_low = ctx.price < ctx.range_low;
                let high_side = matches!(entry_on, EntryOn::BreakHigh | EntryOn::Both)
                    && self.allows(Direction::Long)
                    && broke_high;
                let low_side = matches!(entry_on, EntryOn::BreakLow | EntryOn::Both)
                    && self.allows(Direction::Short)
                    && broke_low;
                high_side || low_side
            }
            EntrySetup::EmaPullback {
                pullback_confirmation,
                rsi_filter,
                ..
            } => {
                if let Some(filter) = rsi_filter {
                    let passes = match filter.direction {
                        RsiDirection::Above => ctx.rsi > filter.threshold,
                        RsiDirection::Below => ctx.rsi < filter.threshold,
                    };
                    if !passes {
                        return false;
                    }
                }
                let long_ok = self.allows(Direction::Long)
                    && long_pullback(ctx, *pullback_confirmation, &self.strategy);
                let short_ok = self.allows(Direction::Short)
                    && short_pullback(ctx, *pullback_confirmation, &self.strategy);
                long_ok || short_ok
            }
            EntrySetup::Breakout {
                level_type,
                confirmation,
                ..
            } => {
                let volume_ok = match confirmation {
                    BreakoutConfirmation::Volume => ctx.volume > ctx.average_volume,
                    BreakoutConfirmation::Close | BreakoutConfirmation::None => true,
                };
                if !volume_ok {
                    return false;
                }
                let up = matches!(level_type, LevelType::Resistance | LevelType::Both)
                    && self.allows(Direction::Long)
                    && ctx.price > ctx.lookback_high;
                let down = matches!(level_type, LevelType::Support | LevelType::Both)
                    && self.allows(Direction::Short)
                    && ctx.price < ctx.lookback_low;
                up || down
            }
        }
    }

    /// Price the entry order is working: the violated level for level-based
    /// setups, the current price for pullbacks.
    pub fn entry_price(&self, ctx: &MarketContext) -> f64 {
        match &self.strategy.setup {
            EntrySetup::OpeningRangeBreakout { .. } => {
                if ctx.price > ctx.range_high {
                    ctx.range_high
                } else if ctx.price < ctx.range_low {
                    ctx.range_low
                } else {
                    ctx.price
                }
            }
            EntrySetup::EmaPullback { .. } => ctx.price,
            EntrySetup::Breakout { .. } => {
                if ctx.price > ctx.lookback_high {
                    ctx.lookback_high
                } else if ctx.price < ctx.lookback_low {
                    ctx.lookback_low
                } else {
                    ctx.price
                }
            }
        }
    }

    pub fn stop_price(&self, ctx: &MarketContext) -> f64 {
        let entry = self.entry_price(ctx);
        let tick = self.strategy.instrument.tick_size;
        let stop = &self.strategy.exit.stop_loss;
        let sign = side_sign(self.bias(ctx));
        match stop.kind {
            StopKind::FixedTicks => entry - sign * stop.value * tick,
            StopKind::AtrMultiple => entry - sign * stop.value * ctx.atr,
            StopKind::Structure => ctx.structure_level - sign * stop.value * tick,
            StopKind::OppositeRange => match self.bias(ctx) {
                Direction::Short => ctx.range_high + stop.value * tick,
                _ => ctx.range_low - stop.value * tick,
            },
        }
    }

    pub fn target_price(&self, ctx: &MarketContext) -> f64 {
        let entry = self.entry_price(ctx);
        let tick = self.strategy.instrument.tick_size;
        let target = &self.strategy.exit.take_profit;
        let sign = side_sign(self.bias(ctx));
        match target.kind {
            TargetKind::RrRatio => {
                let risk = (entry - self.stop_price(ctx)).abs();
                entry + sign * risk * target.value
            }
            TargetKind::FixedTicks => entry + sign * target.value * tick,
            TargetKind::Structure => ctx.structure_level + sign * target.value * tick,
        }
    }

    /// Contract count for a fill at `entry_price` with a stop at `stop_price`.
    ///
    /// Risk-percent sizing: floor((balance * pct / 100) / (ticks-at-risk *
    /// tick value)), clamped into [1, maxContracts]. Fixed sizing: the fixed
    /// count, clamped the same way.
    pub fn contract_quantity(&self, account_balance: f64, entry_price: f64, stop_price: f64) -> u32 {
        let risk = &self.strategy.risk;
        let max = risk.max_contracts.max(1);
        match risk.position_sizing {
            PositionSizing::FixedContracts => {
                risk.contracts.unwrap_or(max).clamp(1, max)
            }
            PositionSizing::RiskPercent => {
                let pct = risk.risk_percent.unwrap_or(DEFAULT_RISK_PERCENT);
                let ticks_at_risk =
                    (entry_price - stop_price).abs() / self.strategy.instrument.tick_size;
                let per_contract = ticks_at_risk * self.strategy.instrument.tick_value;
                let budget = account_balance * pct / 100.0;
                let raw = if per_contract > 0.0 && budget.is_finite() {
                    (budget / per_contract).floor()
                } else {
                    0.0
                };
                if raw >= f64::from(max) {
                    max
                } else if raw >= 1.0 {
                    raw as u32
                } else {
                    1
                }
            }
        }
    }

    fn allows(&self, side: Direction) -> bool {
        self.strategy.direction == Direction::Both || self.strategy.direction == side
    }

    /// Trade side for price derivation: the configured direction, or for a
    /// `both` strategy whichever side the context is violating.
    fn bias(&self, ctx: &MarketContext) -> Direction {
        match self.strategy.direction {
            Direction::Long => Direction::Long,
            Direction::Short => Direction::Short,
            Direction::Both => match &self.strategy.setup {
                EntrySetup::OpeningRangeBreakout { .. } => {
                    if ctx.price < ctx.range_low {
                        Direction::Short
                    } else {
                        Direction::Long
                    }
                }
                EntrySetup::EmaPullback { .. } => {
                    if ctx.price < ctx.ema {
                        Direction::Short
                    } else {
                        Direction::Long
                    }
                }
                EntrySetup::Breakout { .. } => {
                    if ctx.price < ctx.lookback_low {
                        Direction::Short
                    } else {
                        Direction::Long
                    }
                }
            },
        }
    }
}

fn long_pullback(
    ctx: &MarketContext,
    confirmation: PullbackConfirmation,
    strategy: &CanonicalStrategy,
) -> bool {
    match confirmation {
        PullbackConfirmation::Touch => {
            (ctx.price - ctx.ema).abs() <= EMA_TOUCH_TICKS * strategy.instrument.tick_size
        }
        PullbackConfirmation::CloseAbove => ctx.prev_price <= ctx.ema && ctx.price > ctx.ema,
        PullbackConfirmation::Bounce => ctx.prev_price <= ctx.ema && ctx.price > ctx.prev_price,
    }
}

fn short_pullback(
    ctx: &MarketContext,
    confirmation: PullbackConfirmation,
    strategy: &CanonicalStrategy,
) -> bool {
    match confirmation {
        PullbackConfirmation::Touch => {
            (ctx.price - ctx.ema).abs() <= EMA_TOUCH_TICKS * strategy.instrument.tick_size
        }
        PullbackConfirmation::CloseAbove => ctx.prev_price >= ctx.ema && ctx.price < ctx.ema,
        PullbackConfirmation::Bounce => ctx.prev_price >= ctx.ema && ctx.price < ctx.prev_price,
    }
}

fn side_sign(side: Direction) -> f64 {
    match side {
        Direction::Short => -1.0,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::canonical::{Pattern, RsiFilter, StopLoss, TakeProfit};
    use crate::domain::instrument::InstrumentRegistry;

    fn es_strategy(pattern: Pattern, direction: Direction) -> CanonicalStrategy {
        let es = InstrumentRegistry::default().resolve("ES").unwrap().clone();
        CanonicalStrategy::defaults(pattern, es, direction)
    }

    fn ctx() -> MarketContext {
        MarketContext {
            price: 5000.0,
            prev_price: 4999.0,
            range_high: 4995.0,
            range_low: 4985.0,
            ema: 4998.0,
            rsi: 45.0,
            lookback_high: 4999.0,
            lookback_low: 4980.0,
            volume: 1200.0,
            average_volume: 1000.0,
            structure_level: 4990.0,
            atr: 4.0,
        }
    }

    #[test]
    fn orb_enters_on_break_of_high() {
        let compiled = compile(es_strategy(Pattern::OpeningRangeBreakout, Direction::Long));
        let mut c = ctx();
        c.price = 4996.0; // above range_high 4995
        assert!(compiled.should_enter(&c));
        c.price = 4990.0; // inside the range
        assert!(!compiled.should_enter(&c));
    }

    #[test]
    fn orb_long_only_ignores_break_of_low() {
        let compiled = compile(es_strategy(Pattern::OpeningRangeBreakout, Direction::Long));
        let mut c = ctx();
        c.price = 4980.0; // below range_low
        assert!(!compiled.should_enter(&c));

        let both = compile(es_strategy(Pattern::OpeningRangeBreakout, Direction::Both));
        assert!(both.should_enter(&c));
    }

    #[test]
    fn orb_entry_side_filter() {
        let mut s = es_strategy(Pattern::OpeningRangeBreakout, Direction::Both);
        if let EntrySetup::OpeningRangeBreakout { entry_on, .. } = &mut s.setup {
            *entry_on = EntryOn::BreakLow;
        }
        let compiled = compile(s);
        let mut c = ctx();
        c.price = 4996.0;
        assert!(!compiled.should_enter(&c));
        c.price = 4980.0;
        assert!(compiled.should_enter(&c));
    }

    #[test]
    fn ema_touch_enters_near_the_average() {
        let compiled = compile(es_strategy(Pattern::EmaPullback, Direction::Long));
        let mut c = ctx();
        c.price = c.ema + 0.25; // within 2 ticks
        assert!(compiled.should_enter(&c));
        c.price = c.ema + 5.0;
        assert!(!compiled.should_enter(&c));
    }

    #[test]
    fn ema_close_above_requires_a_cross() {
        let mut s = es_strategy(Pattern::EmaPullback, Direction::Long);
        if let EntrySetup::EmaPullback {
            pullback_confirmation,
            ..
        } = &mut s.setup
        {
            *pullback_confirmation = PullbackConfirmation::CloseAbove;
        }
        let compiled = compile(s);
        let mut c = ctx();
        c.prev_price = c.ema - 1.0;
        c.price = c.ema + 1.0;
        assert!(compiled.should_enter(&c));
        c.prev_price = c.ema + 0.5; // never dipped
        assert!(!compiled.should_enter(&c));
    }

    #[test]
    fn rsi_filter_gates_entry() {
        let mut s = es_strategy(Pattern::EmaPullback, Direction::Long);
        if let EntrySetup::EmaPullback { rsi_filter, .. } = &mut s.setup {
            *rsi_filter = Some(RsiFilter {
                period: 14,
                threshold: 30.0,
                direction: RsiDirection::Below,
            });
        }
        let compiled = compile(s);
        let mut c = ctx();
        c.price = c.ema; // perfect touch
        c.rsi = 45.0; // filter demands rsi < 30
        assert!(!compiled.should_enter(&c));
        c.rsi = 25.0;
        assert!(compiled.should_enter(&c));
    }

    #[test]
    fn breakout_volume_confirmation() {
        let mut s = es_strategy(Pattern::Breakout, Direction::Long);
        if let EntrySetup::Breakout { confirmation, .. } = &mut s.setup {
            *confirmation = BreakoutConfirmation::Volume;
        }
        let compiled = compile(s);
        let mut c = ctx();
        c.price = 5000.0; // above lookback_high 4999
        c.volume = 900.0; // below average
        assert!(!compiled.should_enter(&c));
        c.volume = 1500.0;
        assert!(compiled.should_enter(&c));
    }

    #[test]
    fn breakout_level_type_filter() {
        let mut s = es_strategy(Pattern::Breakout, Direction::Both);
        if let EntrySetup::Breakout { level_type, .. } = &mut s.setup {
            *level_type = LevelType::Support;
        }
        let compiled = compile(s);
        let mut c = ctx();
        c.price = 5000.0; // above resistance, but we only trade support breaks
        assert!(!compiled.should_enter(&c));
        c.price = 4979.0;
        assert!(compiled.should_enter(&c));
    }

    #[test]
    fn entry_price_is_the_violated_level() {
        let compiled = compile(es_strategy(Pattern::OpeningRangeBreakout, Direction::Long));
        let mut c = ctx();
        c.price = 4997.0;
        assert!((compiled.entry_price(&c) - 4995.0).abs() < f64::EPSILON);
        c.price = 4990.0;
        assert!((compiled.entry_price(&c) - 4990.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fixed_tick_stop_arithmetic() {
        let compiled = compile(es_strategy(Pattern::OpeningRangeBreakout, Direction::Long));
        let mut c = ctx();
        c.price = 4996.0; // entry at 4995, stop 20 ticks * 0.25 = 5.00 below
        assert!((compiled.stop_price(&c) - 4990.0).abs() < f64::EPSILON);
    }

    #[test]
    fn opposite_range_stop_reads_the_range() {
        let mut s = es_strategy(Pattern::OpeningRangeBreakout, Direction::Both);
        s.exit.stop_loss = StopLoss {
            kind: StopKind::OppositeRange,
            value: 0.0,
        };
        let compiled = compile(s);
        let mut c = ctx();
        c.price = 4996.0; // long bias
        assert!((compiled.stop_price(&c) - c.range_low).abs() < f64::EPSILON);
        c.price = 4980.0; // short bias
        assert!((compiled.stop_price(&c) - c.range_high).abs() < f64::EPSILON);
    }

    #[test]
    fn atr_stop_scales_with_atr() {
        let mut s = es_strategy(Pattern::EmaPullback, Direction::Long);
        s.exit.stop_loss = StopLoss {
            kind: StopKind::AtrMultiple,
            value: 1.5,
        };
        let compiled = compile(s);
        let c = ctx(); // entry = price = 5000, atr = 4 -> stop 6 below
        assert!((compiled.stop_price(&c) - 4994.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rr_target_multiplies_realized_risk() {
        let compiled = compile(es_strategy(Pattern::OpeningRangeBreakout, Direction::Long));
        let mut c = ctx();
        c.price = 4996.0; // entry 4995, stop 4990, risk 5 -> 2R target 10 above
        assert!((compiled.target_price(&c) - 5005.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fixed_tick_target_for_short_bias() {
        let mut s = es_strategy(Pattern::OpeningRangeBreakout, Direction::Short);
        s.exit.take_profit = TakeProfit {
            kind: TargetKind::FixedTicks,
            value: 40.0,
        };
        let compiled = compile(s);
        let mut c = ctx();
        c.price = 4980.0; // entry at range_low 4985, target 10.00 below
        assert!((compiled.target_price(&c) - 4975.0).abs() < f64::EPSILON);
    }

    #[test]
    fn risk_percent_quantity_formula() {
        let compiled = compile(es_strategy(Pattern::OpeningRangeBreakout, Direction::Long));
        // 100k * 1% = 1000 budget; 20 ticks * 12.50 = 250 per contract -> 4.
        let qty = compiled.contract_quantity(100_000.0, 4995.0, 4990.0);
        assert_eq!(qty, 4);
    }

    #[test]
    fn quantity_clamps_to_max_contracts() {
        let mut s = es_strategy(Pattern::OpeningRangeBreakout, Direction::Long);
        s.risk.max_contracts = 2;
        let compiled = compile(s);
        let qty = compiled.contract_quantity(1_000_000.0, 4995.0, 4990.0);
        assert_eq!(qty, 2);
    }

    #[test]
    fn quantity_never_below_one() {
        let compiled = compile(es_strategy(Pattern::OpeningRangeBreakout, Direction::Long));
        let qty = compiled.contract_quantity(1_000.0, 4995.0, 4990.0);
        assert_eq!(qty, 1);
        // Degenerate zero-distance stop still sizes a single contract.
        let qty = compiled.contract_quantity(100_000.0, 4995.0, 4995.0);
        assert_eq!(qty, 1);
    }

    #[test]
    fn fixed_contract_quantity_clamped() {
        let mut s = es_strategy(Pattern::OpeningRangeBreakout, Direction::Long);
        s.risk.position_sizing = PositionSizing::FixedContracts;
        s.risk.risk_percent = None;
        s.risk.contracts = Some(8);
        s.risk.max_contracts = 5;
        let compiled = compile(s);
        assert_eq!(compiled.contract_quantity(100_000.0, 4995.0, 4990.0), 5);
    }

    #[test]
    fn decision_functions_are_total_over_degenerate_context() {
        let zero = MarketContext {
            price: 0.0,
            prev_price: 0.0,
            range_high: 0.0,
            range_low: 0.0,
            ema: 0.0,
            rsi: 0.0,
            lookback_high: 0.0,
            lookback_low: 0.0,
            volume: 0.0,
            average_volume: 0.0,
            structure_level: 0.0,
            atr: 0.0,
        };
        for pattern in Pattern::ALL {
            for direction in [Direction::Long, Direction::Short, Direction::Both] {
                let compiled = compile(es_strategy(pattern, direction));
                let _ = compiled.should_enter(&zero);
                let _ = compiled.entry_price(&zero);
                let _ = compiled.stop_price(&zero);
                let _ = compiled.target_price(&zero);
                let _ = compiled.contract_quantity(0.0, 0.0, 0.0);
            }
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Risk-percent sizing never leaves [1, maxContracts].
            #[test]
            fn sizing_stays_in_bounds(
                balance in 0.0f64..10_000_000.0,
                entry in 1000.0f64..10_000.0,
                distance in 0.0f64..500.0,
                pct in 0.1f64..5.0,
                max in 1u32..50,
            ) {
                let mut s = es_strategy(Pattern::Breakout, Direction::Long);
                s.risk.risk_percent = Some(pct);
                s.risk.max_contracts = max;
                let compiled = compile(s);
                let qty = compiled.contract_quantity(balance, entry, entry - distance);
                prop_assert!(qty >= 1);
                prop_assert!(qty <= max);
            }
        }
    }
}

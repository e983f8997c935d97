//! Instrument registry.
//!
//! Static table of tradable futures specs with alias resolution. Matching is
//! case-insensitive and exact: canonical symbol first, then the alias table.
//! Ambiguous or unknown input is never guessed at.

use serde::{Deserialize, Serialize};

/// Immutable contract spec for one tradable instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentSpec {
    pub symbol: String,
    /// Minimum price increment.
    pub tick_size: f64,
    /// Dollar value of one tick for one contract.
    pub tick_value: f64,
    pub aliases: Vec<String>,
}

impl InstrumentSpec {
    fn new(symbol: &str, tick_size: f64, tick_value: f64, aliases: &[&str]) -> Self {
        Self {
            symbol: symbol.to_string(),
            tick_size,
            tick_value,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Lookup table over the supported instrument universe, loaded once.
#[derive(Debug, Clone)]
pub struct InstrumentRegistry {
    instruments: Vec<InstrumentSpec>,
}

impl Default for InstrumentRegistry {
    fn default() -> Self {
        Self {
            instruments: vec![
                InstrumentSpec::new(
                    "ES",
                    0.25,
                    12.50,
                    &["e-mini", "emini", "s&p", "s&p 500", "sp500", "spx"],
                ),
                InstrumentSpec::new("NQ", 0.25, 5.00, &["nasdaq", "nas", "nasdaq 100"]),
                InstrumentSpec::new("YM", 1.00, 5.00, &["dow", "dow jones", "mini dow"]),
                InstrumentSpec::new("RTY", 0.10, 5.00, &["russell", "russell 2000"]),
                InstrumentSpec::new("CL", 0.01, 10.00, &["crude", "crude oil", "oil", "wti"]),
                InstrumentSpec::new("GC", 0.10, 10.00, &["gold"]),
                InstrumentSpec::new("SI", 0.005, 25.00, &["silver"]),
                InstrumentSpec::new("MES", 0.25, 1.25, &["micro e-mini", "micro es", "micro s&p"]),
                InstrumentSpec::new("MNQ", 0.25, 0.50, &["micro nasdaq", "micro nq"]),
            ],
        }
    }
}

impl InstrumentRegistry {
    /// Resolve a user-supplied symbol or alias to its spec.
    ///
    /// Exact canonical symbol wins over aliases; both comparisons ignore case
    /// and surrounding whitespace. No partial or fuzzy matching.
    pub fn resolve(&self, input: &str) -> Option<&InstrumentSpec> {
        let wanted = input.trim();
        if wanted.is_empty() {
            return None;
        }
        if let Some(spec) = self
            .instruments
            .iter()
            .find(|s| s.symbol.eq_ignore_ascii_case(wanted))
        {
            return Some(spec);
        }
        self.instruments
            .iter()
            .find(|s| s.aliases.iter().any(|a| a.eq_ignore_ascii_case(wanted)))
    }

    pub fn instruments(&self) -> &[InstrumentSpec] {
        &self.instruments
    }
}

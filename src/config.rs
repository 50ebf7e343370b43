//! Dashboard configuration parsed from environment variables.
//!
//! Every knob is optional. Missing or unparsable values fall back to the
//! defaults below, which reproduce the demo's stock timings.

use std::time::Duration;

pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_SUGGEST_DEBOUNCE_MS: u64 = 300;

pub const DEFAULT_SEARCH_ERROR_RATE: f64 = 0.05;
pub const DEFAULT_CHAT_ERROR_RATE: f64 = 0.0;
pub const DEFAULT_SUGGEST_ERROR_RATE: f64 = 0.0;
pub const DEFAULT_VALIDATE_ERROR_RATE: f64 = 0.0;

pub const DEFAULT_SEARCH_LATENCY: LatencyRange = LatencyRange::new(800, 1500);
pub const DEFAULT_CHAT_LATENCY: LatencyRange = LatencyRange::new(300, 600);
pub const DEFAULT_TOKEN_LATENCY: LatencyRange = LatencyRange::new(30, 80);
pub const DEFAULT_SUGGEST_LATENCY: LatencyRange = LatencyRange::new(200, 400);
pub const DEFAULT_VALIDATE_LATENCY: LatencyRange = LatencyRange::new(500, 1000);
pub const DEFAULT_FAILURE_LATENCY: LatencyRange = LatencyRange::new(500, 1000);

// =============================================================================
// TYPES
// =============================================================================

/// Inclusive range of simulated latency in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl LatencyRange {
    /// Build a range, swapping the bounds when given in the wrong order.
    #[must_use]
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        if min_ms <= max_ms { Self { min_ms, max_ms } } else { Self { min_ms: max_ms, max_ms: min_ms } }
    }

    /// No delay at all. Used by tests and the `--instant` CLI flag.
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }
}

/// Injected failure probability per operation, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorRates {
    pub search: f64,
    pub chat: f64,
    pub suggest: f64,
    pub validate: f64,
}

/// Simulated latency per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latencies {
    pub search: LatencyRange,
    /// Delay before the first chat fragment.
    pub chat: LatencyRange,
    /// Delay between streamed words.
    pub token: LatencyRange,
    pub suggest: LatencyRange,
    pub validate: LatencyRange,
    /// Delay before an injected failure is reported.
    pub failure: LatencyRange,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashboardConfig {
    pub search_debounce: Duration,
    pub suggest_debounce: Duration,
    pub error_rates: ErrorRates,
    pub latencies: Latencies,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl DashboardConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `SMARTDASH_SEARCH_DEBOUNCE_MS`: default 500
    /// - `SMARTDASH_SUGGEST_DEBOUNCE_MS`: default 300
    /// - `SMARTDASH_{SEARCH,CHAT,SUGGEST,VALIDATE}_ERROR_RATE`
    /// - `SMARTDASH_{SEARCH,CHAT,TOKEN,SUGGEST,VALIDATE,FAILURE}_LATENCY_{MIN,MAX}_MS`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get_u64 = |key: &str, default: u64| parse_or(lookup(key), default);
        let get_rate = |key: &str, default: f64| clamp_rate(parse_or(lookup(key), default));
        let get_range = |name: &str, default: LatencyRange| {
            LatencyRange::new(
                get_u64(&format!("SMARTDASH_{name}_LATENCY_MIN_MS"), default.min_ms),
                get_u64(&format!("SMARTDASH_{name}_LATENCY_MAX_MS"), default.max_ms),
            )
        };

        Self {
            search_debounce: Duration::from_millis(get_u64("SMARTDASH_SEARCH_DEBOUNCE_MS", DEFAULT_SEARCH_DEBOUNCE_MS)),
            suggest_debounce: Duration::from_millis(get_u64(
                "SMARTDASH_SUGGEST_DEBOUNCE_MS",
                DEFAULT_SUGGEST_DEBOUNCE_MS,
            )),
            error_rates: ErrorRates {
                search: get_rate("SMARTDASH_SEARCH_ERROR_RATE", DEFAULT_SEARCH_ERROR_RATE),
                chat: get_rate("SMARTDASH_CHAT_ERROR_RATE", DEFAULT_CHAT_ERROR_RATE),
                suggest: get_rate("SMARTDASH_SUGGEST_ERROR_RATE", DEFAULT_SUGGEST_ERROR_RATE),
                validate: get_rate("SMARTDASH_VALIDATE_ERROR_RATE", DEFAULT_VALIDATE_ERROR_RATE),
            },
            latencies: Latencies {
                search: get_range("SEARCH", DEFAULT_SEARCH_LATENCY),
                chat: get_range("CHAT", DEFAULT_CHAT_LATENCY),
                token: get_range("TOKEN", DEFAULT_TOKEN_LATENCY),
                suggest: get_range("SUGGEST", DEFAULT_SUGGEST_LATENCY),
                validate: get_range("VALIDATE", DEFAULT_VALIDATE_LATENCY),
                failure: get_range("FAILURE", DEFAULT_FAILURE_LATENCY),
            },
        }
    }

    /// Zero latency and no injected failures. Debounce windows are kept.
    #[must_use]
    pub fn instant(self) -> Self {
        Self {
            error_rates: ErrorRates { search: 0.0, chat: 0.0, suggest: 0.0, validate: 0.0 },
            latencies: Latencies {
                search: LatencyRange::zero(),
                chat: LatencyRange::zero(),
                token: LatencyRange::zero(),
                suggest: LatencyRange::zero(),
                validate: LatencyRange::zero(),
                failure: LatencyRange::zero(),
            },
            ..self
        }
    }
}

fn parse_or<T>(raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    raw.and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn clamp_rate(rate: f64) -> f64 {
    if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

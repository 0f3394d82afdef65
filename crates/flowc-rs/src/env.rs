use std::env;
use std::sync::OnceLock;

static FLOWC_MAX_SWEEPS: OnceLock<usize> = OnceLock::new();
static FLOWC_PASS_STATS: OnceLock<bool> = OnceLock::new();

const DEFAULT_MAX_SWEEPS: usize = 16;

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

/// Upper bound on pipeline sweeps before the fixed-point loop gives up.
pub(crate) fn max_sweeps() -> usize {
    *FLOWC_MAX_SWEEPS.get_or_init(|| match env::var("FLOWC_MAX_SWEEPS") {
        Ok(value) => value.trim().parse().unwrap_or(DEFAULT_MAX_SWEEPS),
        _ => DEFAULT_MAX_SWEEPS,
    })
}

pub(crate) fn pass_stats_enabled() -> bool {
    *FLOWC_PASS_STATS.get_or_init(|| match env::var("FLOWC_PASS_STATS") {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value),
        _ => false,
    })
}

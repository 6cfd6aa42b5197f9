//! Configuration surface and diagnostics sink for tree construction.

/// Tunables consumed by the construction pipeline.
///
/// The `None` defaults for `top_hits_size` and `nni_rounds` are resolved
/// against the input size: `m = round(sqrt(N))` and
/// `rounds = round(log2(N)) + 1`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildConfig {
    /// Top-hits list size `m`. Defaults to `round(sqrt(N))`.
    pub top_hits_size: Option<usize>,
    /// Bootstrap resampling rounds for NNI gating and per-node support
    /// values. Zero disables bootstrapping.
    pub bootstrap_rounds: usize,
    /// Fraction of alignment columns drawn (without replacement) per
    /// bootstrap round.
    pub bootstrap_fraction: f64,
    /// Refresh the total profile after this many joins.
    pub refresh_interval: usize,
    /// Number of full NNI passes. Defaults to `round(log2(N)) + 1`.
    pub nni_rounds: Option<usize>,
    /// Distance returned when a log-corrected distance saturates
    /// (argument of the logarithm drops to or below zero).
    pub saturation_distance: f64,
    /// Seed for the deterministic bootstrap RNG.
    pub seed: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            top_hits_size: None,
            bootstrap_rounds: 0,
            bootstrap_fraction: 0.8,
            refresh_interval: 200,
            nni_rounds: None,
            saturation_distance: 1.5,
            seed: 42,
        }
    }
}

impl BuildConfig {
    /// Default configuration with bootstrapping enabled at 50 rounds.
    pub fn with_bootstrap() -> Self {
        Self {
            bootstrap_rounds: 50,
            ..Self::default()
        }
    }

    /// Resolve `m` for an input of `n` sequences.
    pub fn resolved_top_hits_size(&self, n: usize) -> usize {
        self.top_hits_size
            .unwrap_or_else(|| (n as f64).sqrt().round() as usize)
            .max(1)
    }

    /// Resolve the NNI pass count for an input of `n` sequences.
    pub fn resolved_nni_rounds(&self, n: usize) -> usize {
        self.nni_rounds
            .unwrap_or_else(|| ((n.max(2) as f64).log2().round() as usize) + 1)
    }
}

/// Sink for progress events emitted during construction.
///
/// Implementations receive short human-readable phase messages. The default
/// sink discards everything, so callers that don't care pay nothing.
pub trait Diagnostics {
    fn event(&self, message: &str);
}

/// A diagnostics sink that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {
    fn event(&self, _message: &str) {}
}

//! Configuration for slice components.

/// Configuration for a [`SliceComponent`](crate::SliceComponent).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SliceConfig {
    /// Skip references whose asset cannot be loaded instead of failing.
    pub allow_partial_instantiation: bool,

    /// Seed for the entity id generator (`None` = system entropy).
    pub id_seed: Option<u64>,

    /// Log dropped patch edits at `warn` level.
    pub report_stale_edits: bool,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            allow_partial_instantiation: true,
            id_seed: None,
            report_stale_edits: true,
        }
    }
}

impl SliceConfig {
    /// Creates a configuration with reproducible entity ids.
    #[must_use]
    pub fn deterministic(seed: u64) -> Self {
        Self {
            id_seed: Some(seed),
            ..Self::default()
        }
    }

    /// Creates a configuration that fails on any missing asset.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            allow_partial_instantiation: false,
            ..Self::default()
        }
    }

    /// Builder method to allow or forbid partial instantiation.
    #[must_use]
    pub fn with_allow_partial_instantiation(mut self, allow: bool) -> Self {
        self.allow_partial_instantiation = allow;
        self
    }

    /// Builder method to set the id seed.
    #[must_use]
    pub fn with_id_seed(mut self, seed: Option<u64>) -> Self {
        self.id_seed = seed;
        self
    }

    /// Builder method to enable/disable stale edit warnings.
    #[must_use]
    pub fn with_report_stale_edits(mut self, report: bool) -> Self {
        self.report_stale_edits = report;
        self
    }
}

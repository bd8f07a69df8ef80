use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_START_OFFSET: isize = 0;
pub const DEFAULT_END_OFFSET: isize = 0;
pub const DEFAULT_MIN_HELIX_LENGTH: usize = 4;
pub const DEFAULT_CURVATURE_TOLERANCE: f64 = 0.5;
pub const DEFAULT_CLAMP_THRESHOLD: f64 = 6.0;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
    #[error("Unknown table layout '{0}' (expected 'per-structure' or 'per-descriptor')")]
    UnknownLayout(String),
}

impl ConfigError {
    fn invalid(parameter: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            parameter,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChainScope {
    #[default]
    All,
    Only(BTreeSet<char>),
}

impl ChainScope {
    pub fn contains(&self, chain: char) -> bool {
        match self {
            ChainScope::All => true,
            ChainScope::Only(chains) => chains.contains(&chain),
        }
    }
}

/// Inclusive residue-number window that bounds a reference helix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HelixWindow {
    pub start: isize,
    pub end: isize,
}

impl HelixWindow {
    pub fn new(start: isize, end: isize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, residue_number: isize) -> bool {
        (self.start..=self.end).contains(&residue_number)
    }
}

impl fmt::Display for HelixWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableLayout {
    /// One summary row per input structure.
    #[default]
    PerStructure,
    /// One row per helix segment and per clamp candidate.
    PerDescriptor,
}

impl FromStr for TableLayout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-structure" | "structure" => Ok(TableLayout::PerStructure),
            "per-descriptor" | "descriptor" | "per-helix" => Ok(TableLayout::PerDescriptor),
            other => Err(ConfigError::UnknownLayout(other.to_string())),
        }
    }
}

impl fmt::Display for TableLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TableLayout::PerStructure => "per-structure",
            TableLayout::PerDescriptor => "per-descriptor",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AlignmentReference {
    #[default]
    First,
    Named(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HelixConfig {
    pub start_offset: isize,
    pub end_offset: isize,
    pub min_length: usize,
    pub curvature_tolerance: f64,
    /// Reference helix windows; empty means whole chains are segmented.
    pub windows: Vec<HelixWindow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClampConfig {
    /// When false no charge clamp scan runs and reports carry no clamps.
    pub enabled: bool,
    pub distance_threshold: f64,
    /// Residue numbers of interest; empty reports every pair.
    pub focus_residues: BTreeSet<isize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorConfig {
    pub helix: HelixConfig,
    pub clamp: ClampConfig,
    pub chain_scope: ChainScope,
    pub workers: usize,
    pub layout: TableLayout,
    pub alignment_reference: AlignmentReference,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            helix: HelixConfig {
                start_offset: DEFAULT_START_OFFSET,
                end_offset: DEFAULT_END_OFFSET,
                min_length: DEFAULT_MIN_HELIX_LENGTH,
                curvature_tolerance: DEFAULT_CURVATURE_TOLERANCE,
                windows: Vec::new(),
            },
            clamp: ClampConfig {
                enabled: true,
                distance_threshold: DEFAULT_CLAMP_THRESHOLD,
                focus_residues: BTreeSet::new(),
            },
            chain_scope: ChainScope::All,
            workers: default_workers(),
            layout: TableLayout::default(),
            alignment_reference: AlignmentReference::First,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl DescriptorConfig {
    /// Rejects values that would make the run meaningless. Called by the builder
    /// and again by workflows before any structure is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.clamp.distance_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::invalid(
                "clamp.distance-threshold",
                format!("must be a positive distance in Angstroms, got {threshold}"),
            ));
        }
        if self.helix.min_length == 0 {
            return Err(ConfigError::invalid("helix.min-length", "must be at least 1"));
        }
        let tolerance = self.helix.curvature_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ConfigError::invalid(
                "helix.curvature-tolerance",
                format!("must be a non-negative distance, got {tolerance}"),
            ));
        }
        if self.workers == 0 {
            return Err(ConfigError::invalid("batch.workers", "must be at least 1"));
        }
        if let ChainScope::Only(chains) = &self.chain_scope {
            if chains.is_empty() {
                return Err(ConfigError::invalid("chains", "an explicit chain scope cannot be empty"));
            }
        }
        if let Some(window) = self.helix.windows.iter().find(|w| w.start > w.end) {
            return Err(ConfigError::invalid(
                "helix.windows",
                format!("window {} starts after it ends", window),
            ));
        }
        if let AlignmentReference::Named(name) = &self.alignment_reference {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid("alignment.reference", "identifier is empty"));
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct DescriptorConfigBuilder {
    start_offset: Option<isize>,
    end_offset: Option<isize>,
    min_length: Option<usize>,
    curvature_tolerance: Option<f64>,
    windows: Option<Vec<HelixWindow>>,
    clamp_detection: Option<bool>,
    distance_threshold: Option<f64>,
    focus_residues: Option<BTreeSet<isize>>,
    chain_scope: Option<ChainScope>,
    workers: Option<usize>,
    layout: Option<TableLayout>,
    alignment_reference: Option<AlignmentReference>,
}

impl DescriptorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_offset(mut self, offset: isize) -> Self {
        self.start_offset = Some(offset);
        self
    }
    pub fn end_offset(mut self, offset: isize) -> Self {
        self.end_offset = Some(offset);
        self
    }
    pub fn min_length(mut self, length: usize) -> Self {
        self.min_length = Some(length);
        self
    }
    pub fn curvature_tolerance(mut self, tolerance: f64) -> Self {
        self.curvature_tolerance = Some(tolerance);
        self
    }
    pub fn helix_windows(mut self, windows: Vec<HelixWindow>) -> Self {
        self.windows = Some(windows);
        self
    }
    pub fn clamp_detection(mut self, enabled: bool) -> Self {
        self.clamp_detection = Some(enabled);
        self
    }
    pub fn distance_threshold(mut self, threshold: f64) -> Self {
        self.distance_threshold = Some(threshold);
        self
    }
    pub fn focus_residues(mut self, residues: BTreeSet<isize>) -> Self {
        self.focus_residues = Some(residues);
        self
    }
    pub fn chain_scope(mut self, scope: ChainScope) -> Self {
        self.chain_scope = Some(scope);
        self
    }
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }
    pub fn layout(mut self, layout: TableLayout) -> Self {
        self.layout = Some(layout);
        self
    }
    pub fn alignment_reference(mut self, reference: AlignmentReference) -> Self {
        self.alignment_reference = Some(reference);
        self
    }

    pub fn build(self) -> Result<DescriptorConfig, ConfigError> {
        let defaults = DescriptorConfig::default();
        let config = DescriptorConfig {
            helix: HelixConfig {
                start_offset: self.start_offset.unwrap_or(defaults.helix.start_offset),
                end_offset: self.end_offset.unwrap_or(defaults.helix.end_offset),
                min_length: self.min_length.unwrap_or(defaults.helix.min_length),
                curvature_tolerance: self
                    .curvature_tolerance
                    .unwrap_or(defaults.helix.curvature_tolerance),
                windows: self.windows.unwrap_or(defaults.helix.windows),
            },
            clamp: ClampConfig {
                enabled: self.clamp_detection.unwrap_or(defaults.clamp.enabled),
                distance_threshold: self
                    .distance_threshold
                    .unwrap_or(defaults.clamp.distance_threshold),
                focus_residues: self.focus_residues.unwrap_or(defaults.clamp.focus_residues),
            },
            chain_scope: self.chain_scope.unwrap_or(defaults.chain_scope),
            workers: self.workers.unwrap_or(defaults.workers),
            layout: self.layout.unwrap_or(defaults.layout),
            alignment_reference: self
                .alignment_reference
                .unwrap_or(defaults.alignment_reference),
        };
        config.validate()?;
        Ok(config)
    }
}

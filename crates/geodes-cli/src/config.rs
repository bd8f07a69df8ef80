use crate::cli::CommonArgs;
use crate::error::{CliError, Result};
use geodes::core::alignment::external::DEFAULT_ALIGNER_TIMEOUT;
use geodes::core::secondary::dssp::{DEFAULT_DSSP_EXECUTABLE, DEFAULT_DSSP_TIMEOUT};
use geodes::engine::config::{self as core_config, AlignmentReference, ChainScope, HelixWindow, TableLayout};
use geodes::engine::profile::ProteinProfile;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialHelixConfig {
    #[serde(rename = "start-offset")]
    start_offset: Option<isize>,
    #[serde(rename = "end-offset")]
    end_offset: Option<isize>,
    #[serde(rename = "min-length")]
    min_length: Option<usize>,
    #[serde(rename = "curvature-tolerance")]
    curvature_tolerance: Option<f64>,
    windows: Option<Vec<[isize; 2]>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialClampConfig {
    enabled: Option<bool>,
    #[serde(rename = "distance-threshold")]
    distance_threshold: Option<f64>,
    #[serde(rename = "focus-residues")]
    focus_residues: Option<Vec<isize>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialToolsConfig {
    dssp: Option<PathBuf>,
    #[serde(rename = "dssp-timeout-secs")]
    dssp_timeout_secs: Option<u64>,
    aligner: Option<PathBuf>,
    #[serde(rename = "aligner-timeout-secs")]
    aligner_timeout_secs: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialBatchConfig {
    workers: Option<usize>,
    layout: Option<String>,
    reference: Option<String>,
}

/// Configuration file contents; every field is optional and CLI flags win.
///
/// ```toml
/// profile = "hvdr"
/// chains = ["A"]
///
/// [helix]
/// start-offset = 1
/// min-length = 5
///
/// [clamp]
/// enabled = true
/// distance-threshold = 5.5
///
/// [tools]
/// dssp = "/usr/local/bin/mkdssp"
///
/// [batch]
/// layout = "per-descriptor"
/// ```
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialDescriptorConfig {
    profile: Option<String>,
    chains: Option<Vec<char>>,
    helix: Option<PartialHelixConfig>,
    clamp: Option<PartialClampConfig>,
    tools: Option<PartialToolsConfig>,
    batch: Option<PartialBatchConfig>,
}

/// External programs used by a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSettings {
    pub dssp: PathBuf,
    pub dssp_timeout: Duration,
    /// `None` selects the built-in Kabsch superposition.
    pub aligner: Option<PathBuf>,
    pub aligner_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub descriptor: core_config::DescriptorConfig,
    pub tools: ToolSettings,
    pub profile: Option<String>,
}

/// Command-specific values that are not part of [`CommonArgs`].
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandOverrides<'a> {
    pub threads: Option<usize>,
    pub reference: Option<&'a str>,
    pub aligner: Option<&'a Path>,
}

fn resolve_profile(name_or_path: &str) -> Result<ProteinProfile> {
    let path = Path::new(name_or_path);
    if path.is_absolute() || name_or_path.contains(['/', '\\']) || name_or_path.ends_with(".toml") {
        return Ok(ProteinProfile::load(path)?);
    }
    Ok(ProteinProfile::builtin(name_or_path)?)
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

/// Comma separated values; an empty list is an error.
fn parse_list<T>(key: &str, value: &str, item: impl Fn(&str) -> Result<T>) -> Result<Vec<T>> {
    let items = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(item)
        .collect::<Result<Vec<_>>>()?;
    if items.is_empty() {
        return Err(CliError::Config(format!("Invalid value for {}: empty list", key)));
    }
    Ok(items)
}

fn parse_chain(key: &str, value: &str) -> Result<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(id), None) => Ok(id),
        _ => Err(CliError::Config(format!(
            "Invalid value for {}: '{}' is not a single-character chain",
            key, value
        ))),
    }
}

/// Accepts `10-30,40-50` or the file syntax `[[10, 30], [40, 50]]`.
fn parse_windows(key: &str, value: &str) -> Result<Vec<[isize; 2]>> {
    #[derive(Deserialize)]
    struct Inline {
        windows: Vec<[isize; 2]>,
    }

    let value = value.trim();
    if value.starts_with('[') {
        return toml::from_str::<Inline>(&format!("windows = {value}"))
            .map(|inline| inline.windows)
            .map_err(|e| CliError::Config(format!("Invalid value for {}: {}", key, e.message())));
    }
    parse_list(key, value, |range| {
        // Skip the first character so a leading minus stays with the start.
        let split = range
            .char_indices()
            .skip(1)
            .find(|&(_, c)| c == '-')
            .map(|(i, _)| i)
            .ok_or_else(|| CliError::Config(format!("Invalid value for {}: '{}' is not START-END", key, range)))?;
        Ok([parse_value(key, &range[..split])?, parse_value(key, &range[split + 1..])?])
    })
}

impl PartialDescriptorConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| CliError::FileParsing {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn merge_with_cli(mut self, args: &CommonArgs, overrides: CommandOverrides<'_>) -> Result<AppConfig> {
        self.apply_set_values(&args.set_values)?;

        let helix = self.helix.take().unwrap_or_default();
        let clamp = self.clamp.take().unwrap_or_default();
        let tools = self.tools.take().unwrap_or_default();
        let batch = self.batch.take().unwrap_or_default();

        let profile_name = args.profile.clone().or(self.profile.take());
        let profile = profile_name.as_deref().map(resolve_profile).transpose()?;

        let mut builder = core_config::DescriptorConfigBuilder::new();
        if let Some(offset) = args.start_offset.or(helix.start_offset) {
            builder = builder.start_offset(offset);
        }
        if let Some(offset) = args.end_offset.or(helix.end_offset) {
            builder = builder.end_offset(offset);
        }
        if let Some(length) = args.min_length.or(helix.min_length) {
            builder = builder.min_length(length);
        }
        if let Some(tolerance) = args.curvature_tolerance.or(helix.curvature_tolerance) {
            builder = builder.curvature_tolerance(tolerance);
        }
        if let Some(enabled) = clamp.enabled {
            builder = builder.clamp_detection(enabled);
        }
        if let Some(threshold) = args.threshold.or(clamp.distance_threshold) {
            builder = builder.distance_threshold(threshold);
        }

        let windows = match (helix.windows, &profile) {
            (Some(windows), _) => Some(windows.into_iter().map(|[s, e]| HelixWindow::new(s, e)).collect()),
            (None, Some(profile)) => Some(profile.windows()),
            (None, None) => None,
        };
        if let Some(windows) = windows {
            builder = builder.helix_windows(windows);
        }
        let focus = match (clamp.focus_residues, &profile) {
            (Some(residues), _) => Some(residues.into_iter().collect::<BTreeSet<_>>()),
            (None, Some(profile)) => Some(profile.focus_residues()),
            (None, None) => None,
        };
        if let Some(focus) = focus {
            builder = builder.focus_residues(focus);
        }

        let chains = if args.chains.is_empty() {
            self.chains.take()
        } else {
            Some(args.chains.clone())
        };
        if let Some(chains) = chains {
            builder = builder.chain_scope(ChainScope::Only(chains.into_iter().collect()));
        }

        if let Some(workers) = overrides.threads.or(batch.workers) {
            builder = builder.workers(workers);
        }
        if let Some(layout) = args.layout.as_deref().or(batch.layout.as_deref()) {
            let layout = TableLayout::from_str(layout)?;
            builder = builder.layout(layout);
        }
        if let Some(reference) = overrides.reference.map(str::to_string).or(batch.reference) {
            builder = builder.alignment_reference(AlignmentReference::Named(reference));
        }

        let descriptor = builder.build()?;

        let tools = ToolSettings {
            dssp: args
                .dssp
                .clone()
                .or(tools.dssp)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DSSP_EXECUTABLE)),
            dssp_timeout: tools
                .dssp_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_DSSP_TIMEOUT),
            aligner: overrides.aligner.map(Path::to_path_buf).or(tools.aligner),
            aligner_timeout: tools
                .aligner_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_ALIGNER_TIMEOUT),
        };
        if tools.dssp_timeout.is_zero() || tools.aligner_timeout.is_zero() {
            return Err(CliError::Config("Tool timeouts must be at least one second.".to_string()));
        }

        Ok(AppConfig {
            descriptor,
            tools,
            profile: profile.map(|p| p.name),
        })
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let key = key.trim();

            match key {
                "profile" => self.profile = Some(value_str.trim().to_string()),
                "chains" => self.chains = Some(parse_list(key, value_str, |id| parse_chain(key, id))?),
                "helix.windows" => {
                    self.helix.get_or_insert_with(Default::default).windows = Some(parse_windows(key, value_str)?);
                }
                "helix.start-offset" => {
                    self.helix.get_or_insert_with(Default::default).start_offset = Some(parse_value(key, value_str)?);
                }
                "helix.end-offset" => {
                    self.helix.get_or_insert_with(Default::default).end_offset = Some(parse_value(key, value_str)?);
                }
                "helix.min-length" => {
                    self.helix.get_or_insert_with(Default::default).min_length = Some(parse_value(key, value_str)?);
                }
                "helix.curvature-tolerance" => {
                    self.helix.get_or_insert_with(Default::default).curvature_tolerance =
                        Some(parse_value(key, value_str)?);
                }
                "clamp.enabled" => {
                    self.clamp.get_or_insert_with(Default::default).enabled = Some(parse_value(key, value_str)?);
                }
                "clamp.focus-residues" => {
                    self.clamp.get_or_insert_with(Default::default).focus_residues =
                        Some(parse_list(key, value_str, |n| parse_value(key, n))?);
                }
                "clamp.distance-threshold" => {
                    self.clamp.get_or_insert_with(Default::default).distance_threshold =
                        Some(parse_value(key, value_str)?);
                }
                "tools.dssp" => {
                    self.tools.get_or_insert_with(Default::default).dssp = Some(PathBuf::from(value_str.trim()));
                }
                "tools.dssp-timeout-secs" => {
                    self.tools.get_or_insert_with(Default::default).dssp_timeout_secs =
                        Some(parse_value(key, value_str)?);
                }
                "tools.aligner" => {
                    self.tools.get_or_insert_with(Default::default).aligner = Some(PathBuf::from(value_str.trim()));
                }
                "tools.aligner-timeout-secs" => {
                    self.tools.get_or_insert_with(Default::default).aligner_timeout_secs =
                        Some(parse_value(key, value_str)?);
                }
                "batch.workers" => {
                    self.batch.get_or_insert_with(Default::default).workers = Some(parse_value(key, value_str)?);
                }
                "batch.layout" => {
                    self.batch.get_or_insert_with(Default::default).layout = Some(value_str.trim().to_string());
                }
                "batch.reference" => {
                    self.batch.get_or_insert_with(Default::default).reference = Some(value_str.trim().to_string());
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

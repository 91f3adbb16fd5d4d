use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Filter backend to try first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMethod {
    /// Butterworth second-order sections run forwards and backwards
    Butter,
    /// Zero-phase FFT band mask, falling back to Butterworth on failure
    Fft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Highpass,
    Bandpass,
}

impl FromStr for FilterMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "butter" => Ok(FilterMethod::Butter),
            "fft" => Ok(FilterMethod::Fft),
            _ => Err(format!("Invalid filter method: {}. Use 'butter' or 'fft'", s)),
        }
    }
}

impl FromStr for FilterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "highpass" => Ok(FilterKind::Highpass),
            "bandpass" => Ok(FilterKind::Bandpass),
            _ => Err(format!("Invalid filter type: {}. Use 'highpass' or 'bandpass'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub enabled: bool,
    pub method: FilterMethod,
    #[serde(rename = "type")]
    pub kind: FilterKind,
    /// Hz, used by both highpass and bandpass
    pub lowcut: Option<f64>,
    /// Hz, bandpass only
    pub highcut: Option<f64>,
    pub order: usize,
}

impl Default for FilterParams {
    fn default() -> Self {
        FilterParams {
            enabled: true,
            method: FilterMethod::Butter,
            kind: FilterKind::Bandpass,
            lowcut: Some(0.5),
            highcut: Some(40.0),
            order: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutliersParams {
    pub enabled: bool,
    pub z_thresh: f64,
    /// Samples each detection is widened by (half on each side)
    pub min_len: usize,
    pub merge_gap: usize,
}

impl Default for OutliersParams {
    fn default() -> Self {
        OutliersParams {
            enabled: true,
            z_thresh: 3.5,
            min_len: 8,
            merge_gap: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RDropoutsParams {
    pub enabled: bool,
    pub win: usize,
    /// Local variance below this marks a dropout
    pub var_thresh: f64,
    pub merge_gap: usize,
}

impl Default for RDropoutsParams {
    fn default() -> Self {
        RDropoutsParams {
            enabled: true,
            win: 40,
            var_thresh: 1e-5,
            merge_gap: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionsParams {
    pub enabled: bool,
    pub win: usize,
    /// Local deviation above this marks motion
    pub std_thresh: f64,
    pub merge_gap: usize,
}

impl Default for MotionsParams {
    fn default() -> Self {
        MotionsParams {
            enabled: true,
            win: 20,
            std_thresh: 0.15,
            merge_gap: 10,
        }
    }
}

/// Settings for one pipeline run.
///
/// Every section is optional in a config file; missing keys keep their
/// defaults and unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sampling rate in Hz
    pub fs: f64,
    pub memory_lean: bool,
    pub filter: FilterParams,
    pub outliers: OutliersParams,
    pub rdropouts: RDropoutsParams,
    pub motions: MotionsParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            fs: 200.0,
            memory_lean: true,
            filter: FilterParams::default(),
            outliers: OutliersParams::default(),
            rdropouts: RDropoutsParams::default(),
            motions: MotionsParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a TOML config file, filling in defaults for anything missing.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: PipelineConfig = toml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fs > 0.0 && self.fs.is_finite()) {
            bail!("Sampling rate must be positive, got {}", self.fs);
        }
        Ok(())
    }
}

/// Remove gaps and artifacts from an ECG recording
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Signal file (.json array, or one sample per line / first CSV column)
    #[arg(help = "Signal file (.json array, or one sample per line)")]
    pub signal: PathBuf,

    /// Gap intervals file (.json pairs, or `start end` per line)
    #[arg(help = "Gap intervals file (.json pairs, or `start end` per line)")]
    pub gaps: PathBuf,

    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the sampling rate in Hz
    #[arg(long)]
    pub fs: Option<f64>,

    /// Override the first filter backend to try (butter or fft)
    #[arg(long)]
    pub filter_method: Option<FilterMethod>,

    /// Directory to store results
    #[arg(long, default_value = "outputs")]
    pub output_dir: PathBuf,

    /// Release intermediate buffers as soon as the next stage has consumed them
    #[arg(long, conflicts_with = "no_memory_lean")]
    pub memory_lean: bool,

    /// Keep intermediate buffers until the run finishes
    #[arg(long)]
    pub no_memory_lean: bool,

    /// Also write the start and final signals as CSV
    #[arg(long)]
    pub write_intermediates: bool,
}

impl Args {
    /// Resolve the effective config: file (or defaults) with CLI overrides.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(fs) = self.fs {
            config.fs = fs;
        }
        if let Some(method) = self.filter_method {
            config.filter.method = method;
        }
        if self.memory_lean {
            config.memory_lean = true;
        }
        if self.no_memory_lean {
            config.memory_lean = false;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let text = r#"
            fs = 250
            memory_lean = false

            [filter]
            type = "highpass"
            lowcut = 0.7

            [motions]
            std_thresh = 0.3
            unknown_key = "ignored"
        "#;
        let config: PipelineConfig = toml::from_str(text).unwrap();
        assert_eq!(config.fs, 250.0);
        assert!(!config.memory_lean);
        assert_eq!(config.filter.kind, FilterKind::Highpass);
        assert_eq!(config.filter.lowcut, Some(0.7));
        assert_eq!(config.filter.highcut, Some(40.0));
        assert_eq!(config.filter.method, FilterMethod::Butter);
        assert_eq!(config.motions.std_thresh, 0.3);
        assert_eq!(config.motions.win, 20);
        assert_eq!(config.outliers, OutliersParams::default());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_fs() {
        let config = PipelineConfig {
            fs: 0.0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from([
            "ecg-denoise",
            "ecg.csv",
            "gaps.txt",
            "--fs",
            "500",
            "--no-memory-lean",
            "--filter-method",
            "fft",
        ]);
        let config = args.pipeline_config().unwrap();
        assert_eq!(config.fs, 500.0);
        assert!(!config.memory_lean);
        assert_eq!(config.filter.method, FilterMethod::Fft);
    }
}

use crate::config::PipelineConfig;
use crate::detection::{Detector, DropoutDetector, MotionDetector, OutlierDetector};
use crate::index_map::{IndexMap, IndexMapError};
use crate::intervals::{self, Interval};
use crate::preprocessing::{filter_signal, remove_intervals};
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Kinds of removed ranges reported by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Gaps,
    Outliers,
    #[serde(rename = "rdropouts")]
    RDropouts,
    Motions,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Gaps,
        Category::Outliers,
        Category::RDropouts,
        Category::Motions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Gaps => "gaps",
            Category::Outliers => "outliers",
            Category::RDropouts => "rdropouts",
            Category::Motions => "motions",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect-and-remove stages, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Outliers,
    RDropouts,
    Motions,
}

impl Stage {
    pub fn category(&self) -> Category {
        match self {
            Stage::Outliers => Category::Outliers,
            Stage::RDropouts => Category::RDropouts,
            Stage::Motions => Category::Motions,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("back-projecting {category} failed: {source}")]
    Projection {
        category: Category,
        #[source]
        source: IndexMapError,
    },
}

/// Everything one run produced.
///
/// Native interval sets are in the index space of the signal their detector
/// saw. `projected_to_orig` and `projected_to_start` re-express all of them in
/// the original and start frames.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub signal_orig: Vec<f64>,
    /// Gap-free and filtered
    pub signal_start: Vec<f64>,
    pub signal_final: Vec<f64>,

    /// orig -> no gaps (same index space as start)
    pub map_gaps: IndexMap,
    /// start -> no outliers
    pub map_outliers: IndexMap,
    /// no outliers -> no dropouts
    pub map_rdropouts: IndexMap,
    /// no dropouts -> final
    pub map_motions: IndexMap,

    pub gaps: Vec<Interval>,
    pub outliers_on_start: Vec<Interval>,
    pub rdropouts_on_no_outliers: Vec<Interval>,
    pub motions_on_no_rdropouts: Vec<Interval>,

    pub projected_to_orig: BTreeMap<Category, Vec<Interval>>,
    pub projected_to_start: BTreeMap<Category, Vec<Interval>>,
}

/// Lengths and per-category counts of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub len_original: usize,
    pub len_start: usize,
    pub len_final: usize,
    pub gaps_count: usize,
    pub outliers_count_start: usize,
    pub rdropouts_count_start: usize,
    pub motions_count_start: usize,
}

impl PipelineResult {
    /// Direct map from the start frame to the final signal.
    pub fn start_to_final(&self) -> Result<IndexMap, IndexMapError> {
        self.map_outliers
            .compose(&self.map_rdropouts)?
            .compose(&self.map_motions)
    }

    /// Direct map from the original signal to the final signal.
    pub fn original_to_final(&self) -> Result<IndexMap, IndexMapError> {
        self.map_gaps.compose(&self.start_to_final()?)
    }

    pub fn summary(&self) -> RunSummary {
        let count = |category: Category| {
            self.projected_to_start
                .get(&category)
                .map_or(0, |spans| spans.len())
        };
        RunSummary {
            len_original: self.signal_orig.len(),
            len_start: self.signal_start.len(),
            len_final: self.signal_final.len(),
            gaps_count: self.projected_to_orig.get(&Category::Gaps).map_or(0, Vec::len),
            outliers_count_start: count(Category::Outliers),
            rdropouts_count_start: count(Category::RDropouts),
            motions_count_start: count(Category::Motions),
        }
    }
}

/// Gap removal, filtering and three detect-and-remove stages.
///
/// Holds only configuration; each [`Pipeline::run`] is self-contained.
pub struct Pipeline {
    config: PipelineConfig,
    outliers: Option<Box<dyn Detector>>,
    rdropouts: Option<Box<dyn Detector>>,
    motions: Option<Box<dyn Detector>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let outliers = config
            .outliers
            .enabled
            .then(|| Box::new(OutlierDetector::from(&config.outliers)) as Box<dyn Detector>);
        let rdropouts = config
            .rdropouts
            .enabled
            .then(|| Box::new(DropoutDetector::from(&config.rdropouts)) as Box<dyn Detector>);
        let motions = config
            .motions
            .enabled
            .then(|| Box::new(MotionDetector::from(&config.motions)) as Box<dyn Detector>);

        Pipeline {
            config,
            outliers,
            rdropouts,
            motions,
        }
    }

    /// Replace (or disable, with `None`) the detector used for one stage.
    pub fn with_detector(mut self, stage: Stage, detector: Option<Box<dyn Detector>>) -> Self {
        debug!(
            "{} stage uses {}",
            stage.category(),
            detector.as_ref().map_or("no detector", |d| d.name())
        );
        match stage {
            Stage::Outliers => self.outliers = detector,
            Stage::RDropouts => self.rdropouts = detector,
            Stage::Motions => self.motions = detector,
        }
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage over `signal`. `gaps` are in `signal`'s index space.
    pub fn run(&self, signal: &[f64], gaps: &[Interval]) -> Result<PipelineResult, PipelineError> {
        let cfg = &self.config;
        let lean = cfg.memory_lean;

        // 1) gaps
        let gaps = intervals::normalize(gaps, Some(signal.len()));
        let (no_gaps, map_gaps) = remove_intervals(signal, &gaps);
        info!(
            "Removed {} gap intervals: {} -> {} samples",
            gaps.len(),
            signal.len(),
            no_gaps.len()
        );

        // 2) filter; start shares the no-gaps index space
        let (start, no_gaps) = if cfg.filter.enabled {
            (filter_signal(&no_gaps, cfg.fs, &cfg.filter), Some(no_gaps))
        } else {
            (no_gaps, None)
        };
        let _no_gaps = no_gaps.and_then(|buffer| release("no-gaps", buffer, lean));

        // 3) outliers
        let outliers_on_start = detect_stage(self.outliers.as_deref(), &start);
        let (no_outliers, map_outliers) = remove_intervals(&start, &outliers_on_start);
        log_stage(Category::Outliers, &outliers_on_start, &map_outliers);

        // 4) dropouts
        let rdropouts_on_no_outliers = detect_stage(self.rdropouts.as_deref(), &no_outliers);
        let (no_rdropouts, map_rdropouts) = remove_intervals(&no_outliers, &rdropouts_on_no_outliers);
        log_stage(Category::RDropouts, &rdropouts_on_no_outliers, &map_rdropouts);
        let _no_outliers = release("no-outliers", no_outliers, lean);

        // 5) motions
        let motions_on_no_rdropouts = detect_stage(self.motions.as_deref(), &no_rdropouts);
        let (signal_final, map_motions) = remove_intervals(&no_rdropouts, &motions_on_no_rdropouts);
        log_stage(Category::Motions, &motions_on_no_rdropouts, &map_motions);
        let _no_rdropouts = release("no-rdropouts", no_rdropouts, lean);

        // back-projection, latest stage first
        let backward = |category: Category, map: &IndexMap, spans: &[Interval]| {
            map.project_backward(spans)
                .map_err(|source| PipelineError::Projection { category, source })
        };

        let rdropouts_on_start = backward(Category::RDropouts, &map_outliers, &rdropouts_on_no_outliers)?;
        let motions_on_no_outliers = backward(Category::Motions, &map_rdropouts, &motions_on_no_rdropouts)?;
        let motions_on_start = backward(Category::Motions, &map_outliers, &motions_on_no_outliers)?;

        let outliers_on_orig = backward(Category::Outliers, &map_gaps, &outliers_on_start)?;
        let rdropouts_on_orig = backward(Category::RDropouts, &map_gaps, &rdropouts_on_start)?;
        let motions_on_orig = backward(Category::Motions, &map_gaps, &motions_on_start)?;

        let projected_to_orig = BTreeMap::from([
            (Category::Gaps, gaps.clone()),
            (Category::Outliers, outliers_on_orig),
            (Category::RDropouts, rdropouts_on_orig),
            (Category::Motions, motions_on_orig),
        ]);
        let projected_to_start = BTreeMap::from([
            // gaps were deleted before the start frame exists
            (Category::Gaps, Vec::new()),
            (Category::Outliers, outliers_on_start.clone()),
            (Category::RDropouts, rdropouts_on_start),
            (Category::Motions, motions_on_start),
        ]);

        info!(
            "Pipeline finished: {} -> {} -> {} samples",
            signal.len(),
            start.len(),
            signal_final.len()
        );

        Ok(PipelineResult {
            signal_orig: signal.to_vec(),
            signal_start: start,
            signal_final,
            map_gaps,
            map_outliers,
            map_rdropouts,
            map_motions,
            gaps,
            outliers_on_start,
            rdropouts_on_no_outliers,
            motions_on_no_rdropouts,
            projected_to_orig,
            projected_to_start,
        })
    }
}

fn detect_stage(detector: Option<&dyn Detector>, signal: &[f64]) -> Vec<Interval> {
    match detector {
        Some(d) => intervals::normalize(&d.detect(signal), Some(signal.len())),
        None => Vec::new(),
    }
}

fn log_stage(category: Category, found: &[Interval], map: &IndexMap) {
    info!(
        "{}: {} intervals ({} samples), {} -> {} samples",
        category,
        found.len(),
        intervals::total_len(found),
        map.input_len(),
        map.output_len()
    );
    debug!("{} map has {} kept spans", category, map.kept().len());
}

/// Drops an intermediate buffer once the next stage has read it. Outside
/// memory-lean mode the buffer is handed back and lives until the run ends.
fn release(name: &str, buffer: Vec<f64>, lean: bool) -> Option<Vec<f64>> {
    if lean {
        debug!("Releasing {} buffer ({} samples)", name, buffer.len());
        drop(buffer);
        None
    } else {
        Some(buffer)
    }
}

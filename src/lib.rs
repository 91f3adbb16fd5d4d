pub mod config;
pub mod data_loading;
pub mod detection;
pub mod index_map;
pub mod intervals;
pub mod output;
pub mod pipeline;
pub mod preprocessing;

pub use config::PipelineConfig;
pub use index_map::{IndexMap, IndexMapError, KeptSpan};
pub use intervals::Interval;
pub use pipeline::{Category, Pipeline, PipelineError, PipelineResult, RunSummary, Stage};

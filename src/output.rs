use crate::intervals::Interval;
use crate::pipeline::{Category, PipelineResult};
use anyhow::{Context, Result};
use log::info;
use std::path::Path;

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating directory {}", dir.display()))?;
    }
    Ok(())
}

/// Write intervals as a pretty-printed JSON array of `[start, end]` pairs.
pub fn save_intervals_json(spans: &[Interval], path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, spans)
        .with_context(|| format!("writing intervals to {}", path.display()))?;
    Ok(())
}

/// Write a signal as a single-column CSV without header.
pub fn save_signal_csv(signal: &[f64], path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for value in signal {
        writer.write_record([value.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write every artifact of a run into `out_dir` and return the summary JSON.
///
/// Files: `<category>_on_orig.json` for all categories,
/// `<category>_on_start.json` for detected categories, `summary.json`, and
/// with `write_signals` also `signal_start.csv` / `signal_final.csv`.
pub fn write_run(result: &PipelineResult, out_dir: &Path, write_signals: bool) -> Result<String> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    for (category, spans) in &result.projected_to_orig {
        save_intervals_json(spans, &out_dir.join(format!("{}_on_orig.json", category)))?;
    }
    for (category, spans) in &result.projected_to_start {
        if *category == Category::Gaps {
            continue;
        }
        save_intervals_json(spans, &out_dir.join(format!("{}_on_start.json", category)))?;
    }

    if write_signals {
        save_signal_csv(&result.signal_start, &out_dir.join("signal_start.csv"))?;
        save_signal_csv(&result.signal_final, &out_dir.join("signal_final.csv"))?;
    }

    let summary = serde_json::to_string_pretty(&result.summary())?;
    let summary_path = out_dir.join("summary.json");
    std::fs::write(&summary_path, &summary)
        .with_context(|| format!("writing {}", summary_path.display()))?;

    info!("Wrote results to {}", out_dir.display());
    Ok(summary)
}

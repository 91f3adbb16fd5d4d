use crate::intervals::{self, Interval};
use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs::File;
use std::path::Path;

fn has_json_extension(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .as_deref(),
        Some("json") | Some("js")
    )
}

/// Convert a raw `(start, end)` pair read from disk into an interval.
///
/// Values are truncated towards zero, reversed pairs are swapped and negative
/// starts are clamped to 0. Returns `None` for non-finite values or a pair
/// lying entirely before sample 0.
fn interval_from_raw(a: f64, b: f64) -> Option<Interval> {
    if !a.is_finite() || !b.is_finite() {
        return None;
    }
    let (a, b) = (a.trunc(), b.trunc());
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if hi < 0.0 {
        return None;
    }
    Some(Interval::new(lo.max(0.0) as usize, hi as usize))
}

/// Parse `start end` pairs, one per line.
///
/// Commas count as whitespace, `#` lines and blank lines are ignored, and
/// lines that do not start with two numbers are skipped.
pub fn parse_intervals_from_lines<I, S>(lines: I) -> Vec<Interval>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = Vec::new();
    for (lineno, line) in lines.into_iter().enumerate() {
        let line = line.as_ref().trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let cleaned = line.replace(',', " ");
        let mut parts = cleaned.split_whitespace().map(|p| p.parse::<f64>());
        match (parts.next(), parts.next()) {
            (Some(Ok(a)), Some(Ok(b))) => match interval_from_raw(a, b) {
                Some(iv) => out.push(iv),
                None => debug!("Skipping out-of-range interval on line {}", lineno + 1),
            },
            _ => debug!("Skipping malformed interval line {}: {:?}", lineno + 1, line),
        }
    }
    out
}

/// Load an interval file: `.json` holds `[[start, end], ...]`, anything else
/// is read as text lines. With `length`, the set is normalized against it.
pub fn load_intervals(path: &Path, length: Option<usize>) -> Result<Vec<Interval>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading interval file {}", path.display()))?;

    let spans = if has_json_extension(path) {
        let pairs: Vec<(f64, f64)> = serde_json::from_str(&text)
            .with_context(|| format!("parsing interval JSON {}", path.display()))?;
        pairs
            .into_iter()
            .filter_map(|(a, b)| interval_from_raw(a, b))
            .collect()
    } else {
        parse_intervals_from_lines(text.lines())
    };

    debug!("Loaded {} intervals from {}", spans.len(), path.display());
    Ok(match length {
        Some(length) => intervals::normalize(&spans, Some(length)),
        None => spans,
    })
}

/// Load a signal: `.json` holds a flat number array, anything else has one
/// sample per row (first CSV column). Rows that do not parse are skipped.
pub fn load_signal(path: &Path) -> Result<Vec<f64>> {
    if has_json_extension(path) {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading signal file {}", path.display()))?;
        let signal: Vec<f64> = serde_json::from_str(&text)
            .with_context(|| format!("parsing signal JSON {}", path.display()))?;
        return Ok(signal);
    }

    let file = File::open(path).with_context(|| format!("opening signal file {}", path.display()))?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut signal = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result.with_context(|| format!("reading {}", path.display()))?;
        match record.get(0).map(str::parse::<f64>) {
            Some(Ok(value)) => signal.push(value),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("Skipped {} unparsable rows in {}", skipped, path.display());
    }
    debug!("Loaded {} samples from {}", signal.len(), path.display());
    Ok(signal)
}

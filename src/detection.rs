use crate::config::{MotionsParams, OutliersParams, RDropoutsParams};
use crate::intervals::{self, Interval};
use log::{debug, trace};

/// Floor added to the standard deviation before standardizing.
const STD_FLOOR: f64 = 1e-12;

/// Turns a signal into candidate intervals in that signal's own index space.
///
/// Implementations must be total: an empty signal, NaNs or a flat line all
/// produce an interval set (possibly empty), never a panic.
pub trait Detector {
    fn name(&self) -> &'static str;
    fn detect(&self, signal: &[f64]) -> Vec<Interval>;
}

/// Flags samples whose z-score exceeds a threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierDetector {
    pub z_thresh: f64,
    pub min_len: usize,
    pub merge_gap: usize,
}

/// Flags flat stretches where the local variance collapses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropoutDetector {
    pub win: usize,
    pub var_thresh: f64,
    pub merge_gap: usize,
}

/// Flags stretches where the local mean absolute deviation is too large.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionDetector {
    pub win: usize,
    pub std_thresh: f64,
    pub merge_gap: usize,
}

impl From<&OutliersParams> for OutlierDetector {
    fn from(p: &OutliersParams) -> Self {
        OutlierDetector {
            z_thresh: p.z_thresh,
            min_len: p.min_len,
            merge_gap: p.merge_gap,
        }
    }
}

impl From<&RDropoutsParams> for DropoutDetector {
    fn from(p: &RDropoutsParams) -> Self {
        DropoutDetector {
            win: p.win,
            var_thresh: p.var_thresh,
            merge_gap: p.merge_gap,
        }
    }
}

impl From<&MotionsParams> for MotionDetector {
    fn from(p: &MotionsParams) -> Self {
        MotionDetector {
            win: p.win,
            std_thresh: p.std_thresh,
            merge_gap: p.merge_gap,
        }
    }
}

impl Detector for OutlierDetector {
    fn name(&self) -> &'static str {
        "outliers"
    }

    fn detect(&self, signal: &[f64]) -> Vec<Interval> {
        detect_outliers(signal, self.z_thresh, self.min_len, self.merge_gap)
    }
}

impl Detector for DropoutDetector {
    fn name(&self) -> &'static str {
        "rdropouts"
    }

    fn detect(&self, signal: &[f64]) -> Vec<Interval> {
        detect_rdropouts(signal, self.win, self.var_thresh, self.merge_gap)
    }
}

impl Detector for MotionDetector {
    fn name(&self) -> &'static str {
        "motions"
    }

    fn detect(&self, signal: &[f64]) -> Vec<Interval> {
        detect_motions(signal, self.win, self.std_thresh, self.merge_gap)
    }
}

/// Z-score outlier detection.
///
/// Each flagged sample is widened by `max(1, min_len / 2)` on both sides,
/// clamped to the signal, and nearby spans are merged with `merge_gap`.
pub fn detect_outliers(signal: &[f64], z_thresh: f64, min_len: usize, merge_gap: usize) -> Vec<Interval> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    let mean = signal.iter().sum::<f64>() / n as f64;
    let variance = signal.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    let sd = variance.sqrt() + STD_FLOOR;
    debug!("Outlier detection: mean={:.4}, sd={:.4}", mean, sd);

    let half = (min_len / 2).max(1);
    let spans: Vec<Interval> = signal
        .iter()
        .enumerate()
        .filter(|(_, &x)| ((x - mean) / sd).abs() > z_thresh)
        .map(|(i, _)| Interval::new(i.saturating_sub(half), (i + half).min(n - 1)))
        .collect();

    trace!("Outlier detection flagged {} samples", spans.len());
    intervals::merge(&spans, merge_gap)
}

/// Low-variance (flat line) dropout detection.
pub fn detect_rdropouts(signal: &[f64], win: usize, var_thresh: f64, merge_gap: usize) -> Vec<Interval> {
    if signal.is_empty() {
        return Vec::new();
    }
    let win = win.max(2);

    let squares: Vec<f64> = signal.iter().map(|&x| x * x).collect();
    let mean = rolling_mean(signal, win);
    let mean_sq = rolling_mean(&squares, win);

    let hits: Vec<usize> = mean
        .iter()
        .zip(mean_sq.iter())
        .enumerate()
        .filter(|(_, (&m, &m2))| m2 - m * m < var_thresh)
        .map(|(i, _)| i)
        .collect();

    trace!("Dropout detection flagged {} samples", hits.len());
    intervals::merge(&expand_runs(&hits, win / 2, signal.len()), merge_gap)
}

/// High local deviation (motion artifact) detection.
///
/// The deviation is the windowed mean of `|x - rolling_mean(x)|`, a cheap
/// stand-in for a rolling standard deviation.
pub fn detect_motions(signal: &[f64], win: usize, std_thresh: f64, merge_gap: usize) -> Vec<Interval> {
    if signal.is_empty() {
        return Vec::new();
    }
    let win = win.max(2);

    let mean = rolling_mean(signal, win);
    let dev: Vec<f64> = signal
        .iter()
        .zip(mean.iter())
        .map(|(&x, &m)| (x - m).abs())
        .collect();
    let rstd = rolling_mean(&dev, win);

    let hits: Vec<usize> = rstd
        .iter()
        .enumerate()
        .filter(|(_, &d)| d > std_thresh)
        .map(|(i, _)| i)
        .collect();

    trace!("Motion detection flagged {} samples", hits.len());
    intervals::merge(&expand_runs(&hits, win / 2, signal.len()), merge_gap)
}

/// Centred moving average with zero padding, matching a "same"-mode
/// convolution with a box kernel of `win` taps.
///
/// The divisor is always `win`, so values near the edges are pulled towards
/// zero.
fn rolling_mean(data: &[f64], win: usize) -> Vec<f64> {
    let n = data.len();
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &x in data {
        acc += x;
        prefix.push(acc);
    }

    let offset = (win - 1) / 2;
    (0..n)
        .map(|i| {
            let hi = (i + offset).min(n - 1);
            let lo = (i + offset + 1).saturating_sub(win);
            (prefix[hi + 1] - prefix[lo]) / win as f64
        })
        .collect()
}

/// Groups ascending hit indices into contiguous runs and widens each run by
/// `pad` samples on both sides, clamped to `[0, n-1]`.
fn expand_runs(hits: &[usize], pad: usize, n: usize) -> Vec<Interval> {
    let mut spans = Vec::new();
    let Some((&first, rest)) = hits.split_first() else {
        return spans;
    };

    let mut start = first;
    let mut prev = first;
    for &i in rest {
        if i == prev + 1 {
            prev = i;
        } else {
            spans.push(Interval::new(start.saturating_sub(pad), (prev + pad).min(n - 1)));
            start = i;
            prev = i;
        }
    }
    spans.push(Interval::new(start.saturating_sub(pad), (prev + pad).min(n - 1)));
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(n: usize, amp: f64) -> Vec<f64> {
        (0..n)
            .map(|i| amp * (2.0 * std::f64::consts::PI * i as f64 / 25.0).sin())
            .collect()
    }

    #[test]
    fn test_rolling_mean_matches_same_convolution() {
        // np.convolve([1, 2, 3, 4, 5], np.ones(3) / 3, mode="same")
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        let expected = [1.0, 2.0, 3.0, 4.0, 3.0];
        for (a, b) in out.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12, "{out:?}");
        }

        // even window: np.convolve([1, 2, 3, 4], np.ones(2) / 2, mode="same")
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(out, vec![0.5, 1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_expand_runs() {
        let spans = expand_runs(&[3, 4, 5, 10, 19], 2, 20);
        assert_eq!(
            spans,
            vec![Interval::new(1, 7), Interval::new(8, 12), Interval::new(17, 19)]
        );
        assert!(expand_runs(&[], 2, 20).is_empty());
    }

    #[test]
    fn test_empty_signal() {
        assert!(detect_outliers(&[], 3.5, 8, 10).is_empty());
        assert!(detect_rdropouts(&[], 40, 1e-5, 10).is_empty());
        assert!(detect_motions(&[], 20, 0.15, 10).is_empty());
    }

    #[test]
    fn test_outlier_spike() {
        let mut x = sine(400, 1.0);
        x[200] = 50.0;
        let spans = detect_outliers(&x, 3.5, 8, 10);
        assert_eq!(spans, vec![Interval::new(196, 204)]);
    }

    #[test]
    fn test_outlier_spike_clamped_at_boundary() {
        let mut x = sine(400, 1.0);
        x[1] = -60.0;
        let spans = detect_outliers(&x, 3.5, 8, 0);
        assert_eq!(spans, vec![Interval::new(0, 5)]);
    }

    #[test]
    fn test_constant_signal_has_no_outliers() {
        assert!(detect_outliers(&vec![2.5; 100], 3.5, 8, 10).is_empty());
    }

    #[test]
    fn test_dropout_flat_segment() {
        let mut x = sine(600, 1.0);
        for v in &mut x[250..350] {
            *v = 0.0;
        }
        let spans = detect_rdropouts(&x, 40, 1e-5, 10);
        assert_eq!(spans.len(), 1);
        let span = spans[0];
        assert!(span.start <= 270 && span.end >= 330, "{span}");
        assert!(span.start >= 200 && span.end <= 400, "{span}");
    }

    #[test]
    fn test_motion_burst() {
        let mut x = sine(800, 0.05);
        for (i, v) in x[400..460].iter_mut().enumerate() {
            *v += if i % 2 == 0 { 2.0 } else { -2.0 };
        }
        let spans = detect_motions(&x, 20, 0.15, 10);
        assert_eq!(spans.len(), 1);
        let span = spans[0];
        assert!(span.start <= 400 && span.end >= 459, "{span}");
        assert!(span.start >= 370 && span.end <= 490, "{span}");
    }

    #[test]
    fn test_quiet_signal_has_no_motion() {
        assert!(detect_motions(&sine(500, 0.05), 20, 0.15, 10).is_empty());
    }

    #[test]
    fn test_detector_trait_objects() {
        let detectors: Vec<Box<dyn Detector>> = vec![
            Box::new(OutlierDetector::from(&OutliersParams::default())),
            Box::new(DropoutDetector::from(&RDropoutsParams::default())),
            Box::new(MotionDetector::from(&MotionsParams::default())),
        ];
        let names: Vec<&str> = detectors.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["outliers", "rdropouts", "motions"]);
        for d in &detectors {
            assert!(d.detect(&[]).is_empty());
        }
    }
}

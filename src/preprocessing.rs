use crate::config::{FilterKind, FilterMethod, FilterParams};
use crate::index_map::IndexMap;
use crate::intervals::Interval;
use log::{debug, warn};
use rustfft::{num_complex::Complex, FftPlanner};
use sci_rs::signal::filter::design::{
    butter_dyn, DigitalFilter, FilterBandType, FilterOutputType, SosFormatFilter,
};
use sci_rs::signal::filter::sosfiltfilt_dyn;
use thiserror::Error;

/// Fallback lower edge when a bandpass is configured without one.
const DEFAULT_LOWCUT_HZ: f64 = 0.3;
/// Upper edge ceiling when a bandpass is configured without one.
const DEFAULT_HIGHCUT_HZ: f64 = 40.0;

/// Reasons a filter backend could not produce a result.
///
/// These never leave this module: the next strategy in the chain is tried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    #[error("cutoff {cutoff} Hz is not inside (0, {nyquist}) Hz")]
    InvalidCutoff { cutoff: f64, nyquist: f64 },
    #[error("band edges are reversed: {low} Hz >= {high} Hz")]
    EmptyBand { low: f64, high: f64 },
    #[error("filter order must be at least 1")]
    ZeroOrder,
    #[error("signal of {len} samples is too short, filtfilt needs more than {padlen}")]
    TooShort { len: usize, padlen: usize },
    #[error("filter design did not return second-order sections")]
    UnexpectedDesign,
    #[error("filter output contains non-finite values")]
    NonFinite,
}

/// Pass band in Hz after defaults have been filled in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Band {
    Highpass { low: f64 },
    Bandpass { low: f64, high: f64 },
}

impl Band {
    fn check(&self, fs: f64) -> Result<(), FilterError> {
        let nyquist = fs / 2.0;
        let in_range = |cutoff: f64| {
            if cutoff > 0.0 && cutoff < nyquist {
                Ok(())
            } else {
                Err(FilterError::InvalidCutoff { cutoff, nyquist })
            }
        };
        match *self {
            Band::Highpass { low } => in_range(low),
            Band::Bandpass { low, high } => {
                in_range(low)?;
                in_range(high)?;
                if low >= high {
                    return Err(FilterError::EmptyBand { low, high });
                }
                Ok(())
            }
        }
    }

    fn passes(&self, freq: f64) -> bool {
        match *self {
            Band::Highpass { low } => freq >= low,
            Band::Bandpass { low, high } => freq >= low && freq <= high,
        }
    }
}

/// Fill in missing cutoffs. `None` means the configuration asks for no
/// filtering at all.
pub fn resolve_band(params: &FilterParams, fs: f64) -> Option<Band> {
    match params.kind {
        FilterKind::Highpass => match params.lowcut {
            Some(low) if low > 0.0 => Some(Band::Highpass { low }),
            _ => None,
        },
        FilterKind::Bandpass => {
            if params.lowcut.is_none() && params.highcut.is_none() {
                return None;
            }
            Some(Band::Bandpass {
                low: params.lowcut.unwrap_or(DEFAULT_LOWCUT_HZ),
                high: params
                    .highcut
                    .unwrap_or_else(|| DEFAULT_HIGHCUT_HZ.min(fs * 0.45)),
            })
        }
    }
}

/// A zero-phase, length-preserving filter backend.
pub trait FilterStrategy {
    fn name(&self) -> &'static str;
    fn apply(&self, signal: &[f64], fs: f64, band: Band, order: usize) -> Result<Vec<f64>, FilterError>;
}

/// Butterworth design run forwards and backwards as second-order sections.
pub struct ButterworthSos;

/// Zeroes FFT bins outside the pass band.
pub struct FftBandMask;

/// Returns the input unchanged; ends every chain.
pub struct Identity;

impl FilterStrategy for ButterworthSos {
    fn name(&self) -> &'static str {
        "butterworth"
    }

    fn apply(&self, signal: &[f64], fs: f64, band: Band, order: usize) -> Result<Vec<f64>, FilterError> {
        band.check(fs)?;
        if order == 0 {
            return Err(FilterError::ZeroOrder);
        }

        let (wn, btype) = match band {
            Band::Highpass { low } => (vec![low], FilterBandType::Highpass),
            Band::Bandpass { low, high } => (vec![low, high], FilterBandType::Bandpass),
        };
        let design = butter_dyn(
            order,
            wn,
            Some(btype),
            Some(false),
            Some(FilterOutputType::Sos),
            Some(fs),
        );
        let DigitalFilter::Sos(SosFormatFilter { sos }) = design else {
            return Err(FilterError::UnexpectedDesign);
        };

        // filtfilt pads with 3 * (2 * sections + 1) reflected samples
        let padlen = 3 * (2 * sos.len() + 1);
        if signal.len() <= padlen {
            return Err(FilterError::TooShort {
                len: signal.len(),
                padlen,
            });
        }

        let filtered = sosfiltfilt_dyn(signal.iter(), &sos);
        ensure_finite(filtered)
    }
}

impl FilterStrategy for FftBandMask {
    fn name(&self) -> &'static str {
        "fft"
    }

    fn apply(&self, signal: &[f64], fs: f64, band: Band, _order: usize) -> Result<Vec<f64>, FilterError> {
        band.check(fs)?;
        let n = signal.len();

        let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
        let mut planner = FftPlanner::new();
        planner.plan_fft_forward(n).process(&mut buffer);

        let freq_resolution = fs / n as f64;
        for (bin, value) in buffer.iter_mut().enumerate() {
            // negative frequencies mirror the positive half
            let freq = bin.min(n - bin) as f64 * freq_resolution;
            if !band.passes(freq) {
                *value = Complex::new(0.0, 0.0);
            }
        }

        planner.plan_fft_inverse(n).process(&mut buffer);
        let scale = n as f64;
        ensure_finite(buffer.iter().map(|c| c.re / scale).collect())
    }
}

impl FilterStrategy for Identity {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn apply(&self, signal: &[f64], _fs: f64, _band: Band, _order: usize) -> Result<Vec<f64>, FilterError> {
        Ok(signal.to_vec())
    }
}

fn ensure_finite(values: Vec<f64>) -> Result<Vec<f64>, FilterError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(values)
    } else {
        Err(FilterError::NonFinite)
    }
}

/// Backends tried in order for a configured method.
pub fn strategy_chain(method: FilterMethod) -> Vec<Box<dyn FilterStrategy>> {
    match method {
        FilterMethod::Butter => vec![Box::new(ButterworthSos), Box::new(Identity)],
        FilterMethod::Fft => vec![
            Box::new(FftBandMask),
            Box::new(ButterworthSos),
            Box::new(Identity),
        ],
    }
}

/// Filter `signal`, degrading through the configured backends down to the
/// identity. Never fails and always preserves the length.
pub fn filter_signal(signal: &[f64], fs: f64, params: &FilterParams) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }
    let Some(band) = resolve_band(params, fs) else {
        debug!("No cutoffs configured, skipping filter");
        return signal.to_vec();
    };

    for strategy in strategy_chain(params.method) {
        match strategy.apply(signal, fs, band, params.order) {
            Ok(filtered) => {
                debug!("Filtered {} samples with {} ({:?})", signal.len(), strategy.name(), band);
                return filtered;
            }
            Err(e) => warn!("{} filter failed: {}, falling back", strategy.name(), e),
        }
    }

    // unreachable in practice: every chain ends with Identity
    signal.to_vec()
}

/// Delete `removed` from `signal`, returning the shortened signal and the map
/// from the old index space to the new one.
pub fn remove_intervals(signal: &[f64], removed: &[Interval]) -> (Vec<f64>, IndexMap) {
    let map = IndexMap::from_removed_spans(removed, signal.len());
    let kept: Vec<f64> = map
        .kept()
        .iter()
        .flat_map(|k| signal[k.in_start..=k.in_end].iter().copied())
        .collect();
    (kept, map)
}

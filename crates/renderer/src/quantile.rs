//! Equal-count (quantile) classification for attribute styling.
//!
//! Breakpoints come from the sorted values: `bp[i] = sorted[floor(i * N / k)]`
//! for `i` in `0..k`, plus the maximum when the last breakpoint missed it.
//! Ties are not deduplicated, so heavily repeated values skew the buckets.

use raster_common::{Rgb, FALLBACK_GRAY};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClassificationError {
    /// No finite values were supplied.
    #[error("no valid numeric values to classify")]
    NoData,

    #[error("number of classes must be at least 1")]
    ZeroClasses,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuantileClassifier {
    sorted: Vec<f64>,
    breakpoints: Vec<f64>,
    num_classes: usize,
}

impl QuantileClassifier {
    /// Build from raw attribute values. Non-finite values are dropped first.
    pub fn new(
        values: impl IntoIterator<Item = f64>,
        num_classes: usize,
    ) -> Result<Self, ClassificationError> {
        if num_classes == 0 {
            return Err(ClassificationError::ZeroClasses);
        }
        let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return Err(ClassificationError::NoData);
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let mut breakpoints: Vec<f64> = (0..num_classes)
            .map(|i| sorted[i * n / num_classes])
            .collect();
        let max = sorted[n - 1];
        if breakpoints.last() != Some(&max) {
            breakpoints.push(max);
        }

        Ok(Self {
            sorted,
            breakpoints,
            num_classes,
        })
    }

    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Number of values that took part in the classification.
    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Class index of `value`, `None` for NaN.
    ///
    /// The largest `i` with `bp[i] <= value <= bp[i + 1]`; values at or above
    /// the last breakpoint go to the top class and values below the first
    /// to class 0.
    pub fn classify(&self, value: f64) -> Option<usize> {
        if value.is_nan() {
            return None;
        }
        let top = self.num_classes - 1;
        let bp = &self.breakpoints;
        if bp.len() < 2 || value >= bp[bp.len() - 1] {
            return Some(top);
        }
        if value < bp[0] {
            return Some(0);
        }
        let class = bp
            .windows(2)
            .rposition(|w| w[0] <= value && value <= w[1])
            .unwrap_or(0);
        Some(class.min(top))
    }

    /// Color for `value` from a palette with one color per class.
    pub fn color_for(&self, value: f64, colors: &[Rgb]) -> Rgb {
        self.classify(value)
            .and_then(|i| colors.get(i.min(colors.len().saturating_sub(1))))
            .copied()
            .unwrap_or(FALLBACK_GRAY)
    }

    /// `num_classes + 1` legend edges, ending at the maximum.
    pub fn legend_breaks(&self) -> Vec<f64> {
        let n = self.sorted.len();
        (0..=self.num_classes)
            .map(|i| self.sorted[(i * n / self.num_classes).min(n - 1)])
            .collect()
    }

    /// `"start - end"` label per class.
    pub fn legend_labels(&self) -> Vec<String> {
        self.legend_breaks()
            .windows(2)
            .map(|w| format!("{} - {}", format_legend_value(w[0]), format_legend_value(w[1])))
            .collect()
    }
}

/// Number formatting used in legends.
///
/// `|v| >= 1000` rounds to an integer with thousands separators, `|v| >= 1`
/// keeps at most one decimal, anything smaller at most two. Trailing zeros
/// are dropped.
pub fn format_legend_value(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let decimals = match value.abs() {
        a if a >= 1000.0 => 0,
        a if a >= 1.0 => 1,
        _ => 2,
    };
    let fixed = format!("{:.*}", decimals, value);
    let trimmed = if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.')
    } else {
        fixed.as_str()
    };

    let (sign, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", trimmed),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if grouped == "0" && frac_part.is_none() { "" } else { sign };
    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

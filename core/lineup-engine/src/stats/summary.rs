//! FILENAME: core/lineup-engine/src/stats/summary.rs
//! Summary types and the pure functions that compute them.

use serde::{Deserialize, Serialize};

use crate::column::Category;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    pub x0: f64,
    pub x1: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericSummary {
    /// Rows with a present value.
    pub count: usize,
    pub missing: usize,
    pub bins: Vec<HistogramBin>,
    /// Largest bin count.
    pub max_bin: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub q3: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBin {
    pub name: String,
    pub label: String,
    pub color: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoricalSummary {
    /// One bin per declared category, in declared order, zeros included.
    pub bins: Vec<CategoryBin>,
    pub missing: usize,
    pub max_bin: usize,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxPlot {
    /// Lower whisker: smallest value within 1.5 IQR below q1.
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Upper whisker: largest value within 1.5 IQR above q3.
    pub max: f64,
    /// Values beyond the whiskers, ascending.
    pub outliers: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxPlotSummary {
    pub count: usize,
    pub missing: usize,
    /// `None` when the subset has no present value.
    pub box_plot: Option<BoxPlot>,
}

/// A cached summary of one column over one subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Summary {
    Numeric(NumericSummary),
    Categorical(CategoricalSummary),
    BoxPlot(BoxPlotSummary),
}

impl Summary {
    pub fn as_numeric(&self) -> Option<&NumericSummary> {
        match self {
            Summary::Numeric(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_categorical(&self) -> Option<&CategoricalSummary> {
        match self {
            Summary::Categorical(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_box_plot(&self) -> Option<&BoxPlotSummary> {
        match self {
            Summary::BoxPlot(s) => Some(s),
            _ => None,
        }
    }
}

// ============================================================================
// COMPUTATION
// ============================================================================

/// Number of histogram bins for `n` present values: `ceil(log2 n) + 1`,
/// and a single bin for an empty subset.
pub fn bin_count(n: usize) -> usize {
    if n == 0 {
        1
    } else {
        (n as f64).log2().ceil() as usize + 1
    }
}

/// Quantile of sorted values with linear interpolation between closest ranks.
pub fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// Running count/mean/min/max of the present values of one column.
#[derive(Debug, Clone, Default)]
pub struct NumericAccumulator {
    pub values: Vec<f64>,
    pub missing: usize,
    pub mean: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericAccumulator {
    pub fn add(&mut self, value: f64) {
        if value.is_nan() {
            self.missing += 1;
            return;
        }
        self.values.push(value);
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        let delta = value - self.mean;
        self.mean += delta / self.values.len() as f64;
    }

    fn sorted(&self) -> Vec<f64> {
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        sorted
    }

    /// Histogram over `domain` when given, otherwise over the observed range.
    pub fn summarize(&self, domain: Option<[f64; 2]>) -> NumericSummary {
        let count = self.values.len();
        let [lo, hi] = domain
            .or_else(|| self.min.zip(self.max).map(|(a, b)| [a, b]))
            .unwrap_or([0.0, 0.0]);

        let bins: Vec<HistogramBin> = if lo == hi {
            vec![HistogramBin {
                x0: lo,
                x1: hi,
                count,
            }]
        } else {
            let k = bin_count(count);
            let width = (hi - lo) / k as f64;
            let mut bins: Vec<HistogramBin> = (0..k)
                .map(|i| HistogramBin {
                    x0: lo + width * i as f64,
                    x1: if i + 1 == k { hi } else { lo + width * (i + 1) as f64 },
                    count: 0,
                })
                .collect();
            for v in &self.values {
                let slot = (((v - lo) / width).floor().max(0.0) as usize).min(k - 1);
                bins[slot].count += 1;
            }
            bins
        };

        let sorted = self.sorted();
        NumericSummary {
            count,
            missing: self.missing,
            max_bin: bins.iter().map(|b| b.count).max().unwrap_or(0),
            bins,
            min: self.min,
            max: self.max,
            mean: (count > 0).then_some(self.mean),
            q1: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q3: quantile(&sorted, 0.75),
        }
    }

    pub fn box_plot(&self) -> BoxPlotSummary {
        let sorted = self.sorted();
        let box_plot = match (
            quantile(&sorted, 0.25),
            quantile(&sorted, 0.5),
            quantile(&sorted, 0.75),
        ) {
            (Some(q1), Some(median), Some(q3)) => {
                let iqr = q3 - q1;
                let (lower, upper) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
                let inside = || sorted.iter().copied().filter(|v| *v >= lower && *v <= upper);
                Some(BoxPlot {
                    min: inside().next().unwrap_or(q1),
                    q1,
                    median,
                    q3,
                    max: inside().last().unwrap_or(q3),
                    outliers: sorted
                        .iter()
                        .copied()
                        .filter(|v| *v < lower || *v > upper)
                        .collect(),
                })
            }
            _ => None,
        };
        BoxPlotSummary {
            count: sorted.len(),
            missing: self.missing,
            box_plot,
        }
    }
}

/// Per-category counts of one column.
#[derive(Debug, Clone)]
pub struct CategoricalAccumulator {
    pub counts: Vec<usize>,
    pub missing: usize,
}

impl CategoricalAccumulator {
    pub fn new(categories: usize) -> Self {
        CategoricalAccumulator {
            counts: vec![0; categories],
            missing: 0,
        }
    }

    pub fn add(&mut self, category: Option<usize>) {
        match category {
            Some(i) => self.counts[i] += 1,
            None => self.missing += 1,
        }
    }

    pub fn summarize(&self, categories: &[Category]) -> CategoricalSummary {
        let bins: Vec<CategoryBin> = categories
            .iter()
            .zip(&self.counts)
            .map(|(c, count)| CategoryBin {
                name: c.name.clone(),
                label: c.label().to_string(),
                color: c.color().to_string(),
                count: *count,
            })
            .collect();
        CategoricalSummary {
            max_bin: self.counts.iter().copied().max().unwrap_or(0),
            count: self.counts.iter().sum(),
            missing: self.missing,
            bins,
        }
    }
}

//! Per-column running statistics.

use datadesk_core::{ColumnBound, ColumnProfile};
use std::collections::HashSet;

/// Streams the values of one column and summarizes them.
///
/// Numeric bounds and mean are reported only while every non-null value
/// parses as a finite `f64`; the first non-numeric value switches the
/// column to lexicographic string bounds.
#[derive(Debug, Clone)]
pub struct ColumnAccumulator {
    null_count: u64,
    count: u64,
    distinct: HashSet<String>,
    numeric: bool,
    sum: f64,
    min_num: f64,
    max_num: f64,
    min_text: Option<String>,
    max_text: Option<String>,
}

impl Default for ColumnAccumulator {
    fn default() -> Self {
        Self {
            null_count: 0,
            count: 0,
            distinct: HashSet::new(),
            numeric: true,
            sum: 0.0,
            min_num: f64::INFINITY,
            max_num: f64::NEG_INFINITY,
            min_text: None,
            max_text: None,
        }
    }
}

fn parse_finite(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl ColumnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Option<&str>) {
        let Some(value) = value else {
            self.null_count += 1;
            return;
        };
        self.count += 1;
        if !self.distinct.contains(value) {
            self.distinct.insert(value.to_string());
        }
        if self.min_text.as_deref().is_none_or(|m| value < m) {
            self.min_text = Some(value.to_string());
        }
        if self.max_text.as_deref().is_none_or(|m| value > m) {
            self.max_text = Some(value.to_string());
        }
        if self.numeric {
            match parse_finite(value) {
                Some(v) => {
                    self.sum += v;
                    self.min_num = self.min_num.min(v);
                    self.max_num = self.max_num.max(v);
                }
                None => self.numeric = false,
            }
        }
    }

    pub fn null_count(&self) -> u64 {
        self.null_count
    }

    /// Number of non-null values.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn distinct_count(&self) -> u64 {
        self.distinct.len() as u64
    }

    /// Whether the column has values and all of them are numeric.
    pub fn is_numeric(&self) -> bool {
        self.numeric && self.count > 0
    }

    pub fn sum(&self) -> Option<f64> {
        self.is_numeric().then_some(self.sum)
    }

    /// Arithmetic mean, kept within the numeric bounds when rounding in
    /// the sum would push it outside them.
    pub fn mean(&self) -> Option<f64> {
        self.is_numeric()
            .then(|| (self.sum / self.count as f64).clamp(self.min_num, self.max_num))
    }

    pub fn min(&self) -> Option<ColumnBound> {
        if self.is_numeric() {
            Some(ColumnBound::Number(self.min_num))
        } else {
            self.min_text.clone().map(ColumnBound::Text)
        }
    }

    pub fn max(&self) -> Option<ColumnBound> {
        if self.is_numeric() {
            Some(ColumnBound::Number(self.max_num))
        } else {
            self.max_text.clone().map(ColumnBound::Text)
        }
    }

    pub fn profile(&self) -> ColumnProfile {
        ColumnProfile {
            null_count: self.null_count,
            distinct_count: self.distinct_count(),
            min: self.min(),
            max: self.max(),
            mean: self.mean(),
        }
    }
}

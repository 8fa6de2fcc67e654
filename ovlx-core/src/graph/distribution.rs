//! Empirical distributions over the features of accepted edges
//!
//! The scoring model compares every relationship against normal
//! approximations of the current edge population.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Running mean and variance (Welford) plus extremes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Default for Distribution {
    fn default() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Distribution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_datapoint(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn average(&self) -> f64 {
        self.mean
    }

    /// Sample variance, 0 with fewer than two points
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }
}

impl Extend<f64> for Distribution {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.process_datapoint(value);
        }
    }
}

impl FromIterator<f64> for Distribution {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut dist = Distribution::new();
        dist.extend(iter);
        dist
    }
}

/// Normal approximation of a feature. A zero variance degenerates into a
/// step at the mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalDistribution {
    mean: f64,
    variance: f64,
}

impl NormalDistribution {
    pub fn new(mean: f64, variance: f64) -> Self {
        Self {
            mean,
            variance: variance.max(0.0),
        }
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn standard_deviation(&self) -> f64 {
        self.variance.sqrt()
    }

    /// P(X <= x)
    pub fn cumulative(&self, x: f64) -> f64 {
        match Normal::new(self.mean, self.standard_deviation()) {
            Ok(normal) if self.variance > 0.0 => normal.cdf(x),
            _ => {
                if x < self.mean {
                    0.0
                } else if x > self.mean {
                    1.0
                } else {
                    0.5
                }
            }
        }
    }
}

impl From<&Distribution> for NormalDistribution {
    fn from(dist: &Distribution) -> Self {
        Self::new(dist.average(), dist.variance())
    }
}

impl Default for NormalDistribution {
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

/// The six edge features the cost model is fitted on
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeDistributions {
    pub overlap: NormalDistribution,
    pub weighted_coverage: NormalDistribution,
    pub coverage_proportion: NormalDistribution,
    pub overlap_standard_deviation: NormalDistribution,
    pub evidence_proportion: NormalDistribution,
    pub indels_per_kbp: NormalDistribution,
}

/// Contiguity summary of a set of lengths: N10 to N90 plus totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NStatistics {
    pub count: usize,
    pub total_length: u64,
    pub longest: u64,
    /// `values[i]` is the N(10*(i+1)) length
    pub values: [u64; 9],
}

impl NStatistics {
    pub fn from_lengths(lengths: &[u64]) -> Option<Self> {
        if lengths.is_empty() {
            return None;
        }
        let mut sorted = lengths.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        let total_length: u64 = sorted.iter().sum();
        let mut values = [0u64; 9];
        let mut accumulated = 0u64;
        let mut next = 0usize;
        for &length in &sorted {
            accumulated += length;
            while next < values.len() && accumulated * 10 >= total_length * (next as u64 + 1) {
                values[next] = length;
                next += 1;
            }
        }
        Some(Self {
            count: sorted.len(),
            total_length,
            longest: sorted[0],
            values,
        })
    }

    pub fn n50(&self) -> u64 {
        self.values[4]
    }
}

impl std::fmt::Display for NStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "count={} total={} longest={}", self.count, self.total_length, self.longest)?;
        for (i, value) in self.values.iter().enumerate() {
            write!(f, " N{}={}", 10 * (i + 1), value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_statistics() {
        let dist: Distribution = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].into_iter().collect();
        assert_eq!(dist.count(), 8);
        assert!((dist.average() - 5.0).abs() < 1e-12);
        assert!((dist.variance() - 32.0 / 7.0).abs() < 1e-12);
        assert_eq!(dist.min(), Some(2.0));
        assert_eq!(dist.max(), Some(9.0));
        assert_eq!(Distribution::new().min(), None);
    }

    #[test]
    fn test_normal_cumulative() {
        let normal = NormalDistribution::new(100.0, 25.0);
        assert!((normal.cumulative(100.0) - 0.5).abs() < 1e-9);
        assert!(normal.cumulative(90.0) < 0.05);
        assert!(normal.cumulative(115.0) > 0.99);
    }

    #[test]
    fn test_degenerate_normal_is_a_step() {
        let normal = NormalDistribution::from(&[3.0].into_iter().collect::<Distribution>());
        assert_eq!(normal.variance(), 0.0);
        assert_eq!(normal.cumulative(2.0), 0.0);
        assert_eq!(normal.cumulative(3.0), 0.5);
        assert_eq!(normal.cumulative(4.0), 1.0);
    }

    #[test]
    fn test_n_statistics() {
        let stats = NStatistics::from_lengths(&[100, 200, 300, 400]).unwrap();
        assert_eq!(stats.total_length, 1000);
        assert_eq!(stats.longest, 400);
        // 400 covers 40%, 400+300 covers 70%
        assert_eq!(stats.values[3], 400);
        assert_eq!(stats.n50(), 300);
        assert_eq!(stats.values[8], 200);
        assert!(NStatistics::from_lengths(&[]).is_none());
    }
}

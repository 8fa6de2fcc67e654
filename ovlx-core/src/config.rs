//! Configuration handling for OVLX
//!
//! Supports loading the engine configuration from `ovlx.toml` files. Every
//! field has a default so partial files are accepted.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{LayoutError, LayoutResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// K-mer length used by the minimizer codec
    #[serde(default = "default_kmer_length")]
    pub kmer_length: usize,

    /// Number of consecutive k-mers per minimizer window
    #[serde(default = "default_window_length")]
    pub window_length: usize,

    /// Ploidy of the sample being assembled
    #[serde(default = "default_ploidy")]
    pub ploidy: usize,

    /// Worker pool size
    #[serde(default = "default_threads")]
    pub num_threads: usize,

    /// Minimum percentage of the query informative k-mers a subject must hit
    #[serde(default = "default_min_kmer_percentage")]
    pub min_kmer_percentage: f64,

    /// Weight of evidence proportion and indel rate in scores and costs
    #[serde(default = "default_secondary_features_weight")]
    pub secondary_features_weight: f64,

    /// Sequences indexed in the first pass, as a multiple of ploidy times the expected assembly length
    #[serde(default = "default_backbone_coverage")]
    pub backbone_coverage: f64,

    /// Maximum number of co-linear hit clusters extracted per subject
    #[serde(default = "default_max_clusters_per_subject")]
    pub max_clusters_per_subject: usize,

    /// Maximum diagonal difference between chained hits
    #[serde(default = "default_max_diagonal_drift")]
    pub max_diagonal_drift: i64,

    /// Relationships scoring below this fraction of the best one around a sequence are dropped
    #[serde(default = "default_filter_score_ratio")]
    pub filter_score_ratio: f64,

    /// Embedded reads required on each side of a coverage gap to flag a host as chimeric
    #[serde(default = "default_min_chimeric_flank_depth")]
    pub min_chimeric_flank_depth: usize,

    /// Path selection thresholds
    #[serde(default)]
    pub layout: LayoutThresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutThresholds {
    /// Paths with fewer edges are dropped from the final output
    #[serde(default = "default_min_path_length")]
    pub min_path_length: usize,

    /// Run the absorb and merge passes after the Kruskal connection
    #[serde(default = "default_true")]
    pub run_improvement_algorithms: bool,

    /// Connecting edges above mean + factor * stddev indels/kbp are skipped
    #[serde(default = "default_ikbp_stddev_factor")]
    pub ikbp_stddev_factor: f64,

    /// Longest path (in edges) that can be absorbed as an alternative branch
    #[serde(default = "default_absorb_max_path_length")]
    pub absorb_max_path_length: usize,

    /// Maximum length of an absorbed path relative to its host
    #[serde(default = "default_absorb_max_length_ratio")]
    pub absorb_max_length_ratio: f64,

    /// Maximum distance between connection points, relative to the absorbed path length
    #[serde(default = "default_absorb_max_distance_factor")]
    pub absorb_max_distance_factor: f64,

    /// Number of positions from a path end where a vote may attach
    #[serde(default = "default_merge_end_window")]
    pub merge_end_window: usize,

    /// Votes with a cost above this multiple of the mean path edge cost are ignored
    #[serde(default = "default_merge_max_cost_factor")]
    pub merge_max_cost_factor: f64,
}

// Default value functions
fn default_kmer_length() -> usize { 15 }
fn default_window_length() -> usize { 10 }
fn default_ploidy() -> usize { 1 }
fn default_threads() -> usize { 1 }
fn default_min_kmer_percentage() -> f64 { 5.0 }
fn default_secondary_features_weight() -> f64 { 0.5 }
fn default_backbone_coverage() -> f64 { 10.0 }
fn default_max_clusters_per_subject() -> usize { 3 }
fn default_max_diagonal_drift() -> i64 { 100 }
fn default_filter_score_ratio() -> f64 { 0.5 }
fn default_min_chimeric_flank_depth() -> usize { 3 }
fn default_min_path_length() -> usize { 6 }
fn default_true() -> bool { true }
fn default_ikbp_stddev_factor() -> f64 { 15.0 }
fn default_absorb_max_path_length() -> usize { 10 }
fn default_absorb_max_length_ratio() -> f64 { 0.1 }
fn default_absorb_max_distance_factor() -> f64 { 1.5 }
fn default_merge_end_window() -> usize { 4 }
fn default_merge_max_cost_factor() -> f64 { 2.0 }

impl Default for LayoutThresholds {
    fn default() -> Self {
        Self {
            min_path_length: default_min_path_length(),
            run_improvement_algorithms: true,
            ikbp_stddev_factor: default_ikbp_stddev_factor(),
            absorb_max_path_length: default_absorb_max_path_length(),
            absorb_max_length_ratio: default_absorb_max_length_ratio(),
            absorb_max_distance_factor: default_absorb_max_distance_factor(),
            merge_end_window: default_merge_end_window(),
            merge_max_cost_factor: default_merge_max_cost_factor(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            kmer_length: default_kmer_length(),
            window_length: default_window_length(),
            ploidy: default_ploidy(),
            num_threads: default_threads(),
            min_kmer_percentage: default_min_kmer_percentage(),
            secondary_features_weight: default_secondary_features_weight(),
            backbone_coverage: default_backbone_coverage(),
            max_clusters_per_subject: default_max_clusters_per_subject(),
            max_diagonal_drift: default_max_diagonal_drift(),
            filter_score_ratio: default_filter_score_ratio(),
            min_chimeric_flank_depth: default_min_chimeric_flank_depth(),
            layout: LayoutThresholds::default(),
        }
    }
}

impl LayoutConfig {
    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> LayoutResult<Self> {
        log::info!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> LayoutResult<Self> {
        let config: LayoutConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> LayoutResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> LayoutResult<String> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }

    /// Reject values that would make any phase meaningless. Called before
    /// any work starts.
    pub fn validate(&self) -> LayoutResult<()> {
        if self.num_threads == 0 {
            return Err(LayoutError::config("num_threads must be at least 1"));
        }
        if self.kmer_length == 0 || self.kmer_length > 31 {
            return Err(LayoutError::config(format!(
                "kmer_length must be between 1 and 31, got {}",
                self.kmer_length
            )));
        }
        if self.window_length == 0 {
            return Err(LayoutError::config("window_length must be at least 1"));
        }
        if self.ploidy == 0 {
            return Err(LayoutError::config("ploidy must be at least 1"));
        }
        if !(0.0..=100.0).contains(&self.min_kmer_percentage) {
            return Err(LayoutError::config(format!(
                "min_kmer_percentage must be within [0, 100], got {}",
                self.min_kmer_percentage
            )));
        }
        if self.secondary_features_weight < 0.0 {
            return Err(LayoutError::config("secondary_features_weight cannot be negative"));
        }
        if self.backbone_coverage <= 0.0 {
            return Err(LayoutError::config("backbone_coverage must be positive"));
        }
        if self.max_clusters_per_subject == 0 {
            return Err(LayoutError::config("max_clusters_per_subject must be at least 1"));
        }
        if self.max_diagonal_drift < 0 {
            return Err(LayoutError::config("max_diagonal_drift cannot be negative"));
        }
        if !(0.0..=1.0).contains(&self.filter_score_ratio) {
            return Err(LayoutError::config("filter_score_ratio must be within [0, 1]"));
        }
        let t = &self.layout;
        if t.ikbp_stddev_factor < 0.0
            || t.absorb_max_length_ratio < 0.0
            || t.absorb_max_distance_factor < 0.0
            || t.merge_max_cost_factor < 0.0
        {
            return Err(LayoutError::config("layout thresholds cannot be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = LayoutConfig::default();
        assert_eq!(config.kmer_length, 15);
        assert_eq!(config.window_length, 10);
        assert_eq!(config.layout.min_path_length, 6);
        assert_eq!(config.secondary_features_weight, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() -> LayoutResult<()> {
        let mut config = LayoutConfig::default();
        config.num_threads = 4;
        config.layout.merge_end_window = 6;
        let temp_file = NamedTempFile::new()?;

        config.save_to_file(temp_file.path())?;
        let loaded = LayoutConfig::load_from_file(temp_file.path())?;

        assert_eq!(config, loaded);
        Ok(())
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = LayoutConfig::from_toml_str("num_threads = 8\n[layout]\nmin_path_length = 2\n").unwrap();
        assert_eq!(config.num_threads, 8);
        assert_eq!(config.layout.min_path_length, 2);
        assert_eq!(config.layout.merge_end_window, 4);
        assert_eq!(config.kmer_length, 15);
    }

    #[test]
    fn test_invalid_values_fail_fast() {
        let err = LayoutConfig::from_toml_str("num_threads = 0").unwrap_err();
        assert!(matches!(err, LayoutError::Config { .. }));

        let config = LayoutConfig { kmer_length: 40, ..Default::default() };
        assert!(config.validate().is_err());

        let config = LayoutConfig { ploidy: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_example_toml_generation() {
        let example = LayoutConfig::example_toml().unwrap();
        assert!(example.contains("kmer_length"));
        assert!(example.contains("[layout]"));
    }
}

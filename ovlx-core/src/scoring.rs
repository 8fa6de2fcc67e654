//! Relationship scoring model
//!
//! A relationship gets two numbers: a score, growing with overlap length,
//! coverage and evidence, and a cost summing the negative log tail
//! probabilities of its features under the distributions fitted over the
//! accepted edges. Path selection works on the cost; lower is better.

use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::error::{LayoutError, LayoutResult};
use crate::graph::distribution::EdgeDistributions;
use crate::graph::relationship::Relationship;

/// Upper bound of each individual feature cost
const MAX_INDIVIDUAL_COST: f64 = 10.0;

/// Tail probabilities above these limits contribute a constant cost
const LIMIT_P_VALUES: [f64; 6] = [1.0, 0.5, 0.1, 0.05, 0.5, 0.25];

/// Neutral tail probability for the diagonal spread of embeddings
const EMBEDDED_OVERLAP_SD_P_VALUE: f64 = 0.5;

/// `-log10(p)`, capped at `limit`
pub fn negative_log10_with_limit(p: f64, limit: f64) -> f64 {
    if p <= 10f64.powf(-limit) {
        limit
    } else {
        -p.log10()
    }
}

#[derive(Debug, Clone)]
pub struct ScoresCalculator {
    secondary_features_weight: f64,
    indels_model: ChiSquared,
}

impl ScoresCalculator {
    pub fn new(secondary_features_weight: f64) -> LayoutResult<Self> {
        if secondary_features_weight.is_nan() || secondary_features_weight < 0.0 {
            return Err(LayoutError::config("secondary_features_weight cannot be negative"));
        }
        let indels_model = ChiSquared::new(2.0)
            .map_err(|e| LayoutError::config(format!("invalid indel rate model: {}", e)))?;
        Ok(Self {
            secondary_features_weight,
            indels_model,
        })
    }

    pub fn secondary_features_weight(&self) -> f64 {
        self.secondary_features_weight
    }

    /// Feature weights in the order overlap, coverage, coverage proportion,
    /// overlap deviation, evidence proportion, indel rate
    fn weights(&self) -> [f64; 6] {
        let w = self.secondary_features_weight;
        [1.0, 1.0, 0.0, 0.0, w, w]
    }

    pub fn score(&self, relationship: &Relationship) -> u64 {
        let evidence = relationship.evidence();
        let ev_prop = evidence.evidence_proportion.max(0.0);
        let mut score = f64::from(evidence.overlap).sqrt()
            * (0.01 * evidence.weighted_coverage)
            * ev_prop.sqrt();
        if self.secondary_features_weight > 0.0 {
            score *= ev_prop.sqrt();
            score /= evidence.indels_per_kbp.max(1.0).sqrt();
        }
        score.round().max(0.0) as u64
    }

    /// Individual feature costs before weighting
    pub fn individual_costs(&self, relationship: &Relationship, dists: &EdgeDistributions) -> [f64; 6] {
        let evidence = relationship.evidence();
        let cumulative_overlap = dists.overlap.cumulative(f64::from(evidence.overlap));
        let cumulative_coverage = dists.weighted_coverage.cumulative(evidence.weighted_coverage);
        let cumulative_coverage_prop = dists
            .coverage_proportion
            .cumulative(evidence.coverage_proportion());
        let p_value_overlap_sd = match relationship.overlap_standard_deviation() {
            Some(sd) => 1.0 - dists.overlap_standard_deviation.cumulative(sd),
            None => EMBEDDED_OVERLAP_SD_P_VALUE,
        };
        let cumulative_ev_prop = dists
            .evidence_proportion
            .cumulative(evidence.evidence_proportion);
        let p_value_indels = self.indels_model.sf(evidence.indels_per_kbp.max(0.0));

        let p_values = [
            cumulative_overlap,
            cumulative_coverage,
            cumulative_coverage_prop,
            p_value_overlap_sd,
            cumulative_ev_prop,
            p_value_indels,
        ];
        let mut costs = [0.0; 6];
        for (i, p) in p_values.iter().enumerate() {
            costs[i] = negative_log10_with_limit(LIMIT_P_VALUES[i].min(*p), MAX_INDIVIDUAL_COST);
        }
        costs
    }

    pub fn cost(&self, relationship: &Relationship, dists: &EdgeDistributions) -> u64 {
        let costs = self.individual_costs(relationship, dists);
        let weighted: f64 = costs
            .iter()
            .zip(self.weights().iter())
            .map(|(cost, weight)| cost * weight)
            .sum();
        let cumulative_overlap = dists
            .overlap
            .cumulative(f64::from(relationship.evidence().overlap));
        let cost = (10_000.0 * weighted) as u64;
        (cost as f64 + 10.0 * cumulative_overlap) as u64
    }

    /// Assign score and cost in place
    pub fn update(&self, relationship: &mut Relationship, dists: &EdgeDistributions) {
        let score = self.score(relationship);
        let cost = self.cost(relationship, dists);
        relationship.set_score(score);
        relationship.set_cost(cost);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::distribution::NormalDistribution;
    use crate::graph::relationship::{AssemblyEdge, AssemblyEmbedded, AssemblyVertex, Evidence};

    fn evidence(indels_per_kbp: f64) -> Evidence {
        Evidence {
            overlap: 2000,
            shared_kmers: 150,
            weighted_coverage: 1800.0,
            evidence_proportion: 0.95,
            indels_per_kbp,
        }
    }

    fn edge(indels_per_kbp: f64) -> Relationship {
        AssemblyEdge::new(AssemblyVertex::end(0), AssemblyVertex::start(1), evidence(indels_per_kbp)).into()
    }

    fn dists() -> EdgeDistributions {
        EdgeDistributions {
            overlap: NormalDistribution::new(1500.0, 250_000.0),
            weighted_coverage: NormalDistribution::new(1300.0, 200_000.0),
            coverage_proportion: NormalDistribution::new(0.85, 0.01),
            overlap_standard_deviation: NormalDistribution::new(5.0, 4.0),
            evidence_proportion: NormalDistribution::new(0.9, 0.004),
            indels_per_kbp: NormalDistribution::new(3.0, 4.0),
        }
    }

    #[test]
    fn test_negative_log10_with_limit() {
        assert!((negative_log10_with_limit(0.01, 10.0) - 2.0).abs() < 1e-12);
        assert_eq!(negative_log10_with_limit(0.0, 10.0), 10.0);
        assert_eq!(negative_log10_with_limit(1e-12, 10.0), 10.0);
    }

    #[test]
    fn test_score_formula() {
        let calc = ScoresCalculator::new(0.0).unwrap();
        let rel = edge(4.0);
        let expected = (2000f64.sqrt() * 18.0 * 0.95f64.sqrt()).round() as u64;
        assert_eq!(calc.score(&rel), expected);

        let calc = ScoresCalculator::new(0.5).unwrap();
        let dampened = (2000f64.sqrt() * 18.0 * 0.95 / 2.0).round() as u64;
        assert_eq!(calc.score(&rel), dampened);
    }

    #[test]
    fn test_lower_indel_rate_costs_less() {
        let calc = ScoresCalculator::new(0.5).unwrap();
        let clean = calc.cost(&edge(0.0), &dists());
        let noisy = calc.cost(&edge(20.0), &dists());
        assert!(clean < noisy, "{} vs {}", clean, noisy);
    }

    #[test]
    fn test_longer_overlap_costs_less() {
        let calc = ScoresCalculator::new(0.5).unwrap();
        let mut short = evidence(1.0);
        short.overlap = 800;
        short.weighted_coverage = 700.0;
        let short: Relationship =
            AssemblyEdge::new(AssemblyVertex::end(0), AssemblyVertex::start(2), short).into();
        assert!(calc.cost(&edge(1.0), &dists()) < calc.cost(&short, &dists()));
    }

    #[test]
    fn test_embedded_uses_neutral_deviation() {
        let calc = ScoresCalculator::new(0.5).unwrap();
        let rel: Relationship = AssemblyEmbedded::new(3, 0, 100, 2100, false, evidence(0.0)).into();
        let costs = calc.individual_costs(&rel, &dists());
        assert!((costs[3] - negative_log10_with_limit(0.05, 10.0)).abs() < 1e-12);
    }

    #[test]
    fn test_negative_weight_is_rejected() {
        assert!(ScoresCalculator::new(-1.0).is_err());
    }

    #[test]
    fn test_update_sets_both_values() {
        let calc = ScoresCalculator::new(0.5).unwrap();
        let mut rel = edge(0.0);
        calc.update(&mut rel, &dists());
        assert!(rel.score() > 0);
        assert!(rel.cost() > 0);
    }
}

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::feedback::ConfigError;
use crate::metrics::LinkMetricSample;

/// Composite cost of a link, always within [0, 100]. Lower is better.
///
/// Decoding rejects anything outside of that range, so a cost read off the wire can be trusted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct LinkCost(f64);

impl LinkCost {
    pub const MIN: LinkCost = LinkCost(0.0);
    pub const MAX: LinkCost = LinkCost(100.0);

    /// Clamps `value` into range, NaN is treated as the worst possible cost
    pub fn saturating(value: f64) -> Self {
        if value.is_nan() {
            Self::MAX
        } else {
            LinkCost(value.clamp(Self::MIN.0, Self::MAX.0))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for LinkCost {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Ok(LinkCost(value))
        } else {
            Err(format!("link cost {value} is outside of [0, 100]"))
        }
    }
}

impl From<LinkCost> for f64 {
    fn from(cost: LinkCost) -> Self {
        cost.0
    }
}

impl Display for LinkCost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Percentages, must sum to 100
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostWeights {
    pub latency: u32,
    pub jitter: u32,
    pub loss: u32,
    pub bandwidth: u32,
}

impl CostWeights {
    /// Summed in `u64`, four `u32` weights cannot overflow it
    pub fn total(&self) -> u64 {
        [self.latency, self.jitter, self.loss, self.bandwidth]
            .into_iter()
            .map(u64::from)
            .sum()
    }
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            latency: 25,
            jitter: 35,
            loss: 30,
            bandwidth: 10,
        }
    }
}

/// Values at (or beyond) which a metric contributes its full weight.
/// For bandwidth it is the reverse: at or beyond the reference it contributes nothing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostThresholds {
    pub latency_max_ms: f64,
    pub jitter_max_ms: f64,
    pub bandwidth_ref_mbps: f64,
}

impl Default for CostThresholds {
    fn default() -> Self {
        Self {
            latency_max_ms: 100.0,
            jitter_max_ms: 20.0,
            bandwidth_ref_mbps: 1000.0,
        }
    }
}

/// Each component within [0, 1], 1 being the worst
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NormalisedSample {
    pub latency: f64,
    pub jitter: f64,
    pub loss: f64,
    pub bandwidth: f64,
}

/// Weighted contribution of every metric, for diagnosing why a link costs what it does
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub normalised: NormalisedSample,
    pub latency: f64,
    pub jitter: f64,
    pub loss: f64,
    pub bandwidth: f64,
    pub total: LinkCost,
}

/// Turns a metric sample into a [`LinkCost`]. Pure, the same sample always costs the same.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CostModel {
    weights: CostWeights,
    thresholds: CostThresholds,
}

impl CostModel {
    pub fn new(weights: CostWeights, thresholds: CostThresholds) -> Result<Self, ConfigError> {
        let total = weights.total();
        if total != 100 {
            return Err(ConfigError::WeightsSum(total));
        }
        for (name, value) in [
            ("latency_max_ms", thresholds.latency_max_ms),
            ("jitter_max_ms", thresholds.jitter_max_ms),
            ("bandwidth_ref_mbps", thresholds.bandwidth_ref_mbps),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Threshold { name, value });
            }
        }
        Ok(Self { weights, thresholds })
    }

    pub fn weights(&self) -> &CostWeights {
        &self.weights
    }

    pub fn thresholds(&self) -> &CostThresholds {
        &self.thresholds
    }

    pub fn normalise(&self, sample: &LinkMetricSample) -> NormalisedSample {
        let t = &self.thresholds;
        // an undefined latency or jitter (nothing came back) is as bad as it gets
        let ratio = |value: Option<f64>, max: f64| match value {
            Some(v) if v.is_finite() => (v / max).clamp(0.0, 1.0),
            _ => 1.0,
        };
        let bandwidth = if sample.bandwidth_mbps.is_finite() {
            (sample.bandwidth_mbps / t.bandwidth_ref_mbps).clamp(0.0, 1.0)
        } else {
            0.0
        };
        NormalisedSample {
            latency: ratio(sample.latency_ms, t.latency_max_ms),
            jitter: ratio(sample.jitter_ms, t.jitter_max_ms),
            loss: if sample.loss_percent.is_finite() {
                (sample.loss_percent / 100.0).clamp(0.0, 1.0)
            } else {
                1.0
            },
            bandwidth: 1.0 - bandwidth,
        }
    }

    pub fn breakdown(&self, sample: &LinkMetricSample) -> CostBreakdown {
        let n = self.normalise(sample);
        let w = &self.weights;
        let latency = w.latency as f64 * n.latency;
        let jitter = w.jitter as f64 * n.jitter;
        let loss = w.loss as f64 * n.loss;
        let bandwidth = w.bandwidth as f64 * n.bandwidth;
        CostBreakdown {
            normalised: n,
            latency,
            jitter,
            loss,
            bandwidth,
            total: LinkCost::saturating(latency + jitter + loss + bandwidth),
        }
    }

    pub fn cost(&self, sample: &LinkMetricSample) -> LinkCost {
        self.breakdown(sample).total
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            weights: CostWeights::default(),
            thresholds: CostThresholds::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_cost_out_of_range_is_rejected() {
        assert!(serde_json::from_str::<LinkCost>("42.5").is_ok());
        assert!(serde_json::from_str::<LinkCost>("100.5").is_err());
        assert!(serde_json::from_str::<LinkCost>("-1").is_err());
    }

    #[test]
    fn saturating_clamps() {
        assert_eq!(LinkCost::saturating(150.0), LinkCost::MAX);
        assert_eq!(LinkCost::saturating(-3.0), LinkCost::MIN);
        assert_eq!(LinkCost::saturating(f64::NAN), LinkCost::MAX);
    }

    #[test]
    fn weights_must_sum_to_100() {
        let weights = CostWeights {
            latency: 50,
            jitter: 50,
            loss: 10,
            bandwidth: 0,
        };
        assert_eq!(
            CostModel::new(weights, CostThresholds::default()),
            Err(ConfigError::WeightsSum(110))
        );
    }
}

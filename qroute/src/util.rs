use std::cmp::Ordering;

/// Arithmetic mean, `None` for an empty slice
///
/// # Examples
///
/// ```
/// assert_eq!(qroute::util::mean(&[10.0, 12.0, 8.0]), Some(10.0));
/// assert_eq!(qroute::util::mean(&[]), None);
/// ```
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Population standard deviation, `None` for fewer than two samples
///
/// # Examples
///
/// ```
/// let sd = qroute::util::population_std_dev(&[10.0, 12.0, 8.0, 11.0, 9.0]).unwrap();
/// assert!((sd - 2f64.sqrt()).abs() < 1e-9);
/// assert_eq!(qroute::util::population_std_dev(&[10.0]), None);
/// ```
pub fn population_std_dev(samples: &[f64]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let mean = mean(samples)?;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
    Some(variance.sqrt())
}

/// Spread of the samples, `None` if there are none
pub fn range(samples: &[f64]) -> Option<f64> {
    let max = samples.iter().copied().max_by(f64::total_cmp)?;
    let min = samples.iter().copied().min_by(f64::total_cmp)?;
    Some(max - min)
}

/// Total ordering over finite path costs, so they can live in a heap
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Distance(pub f64);

impl Eq for Distance {}

impl PartialOrd for Distance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Distance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

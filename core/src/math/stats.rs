pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = samples.iter().map(|&v| v as f64).sum();
        (sum / samples.len() as f64) as f32
    }

    /// Sum of squared samples.
    pub fn power(samples: &[f32]) -> f64 {
        samples.iter().map(|&v| (v as f64) * (v as f64)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_power() {
        assert_eq!(StatsHelper::mean(&[]), 0.0);
        assert_eq!(StatsHelper::mean(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(StatsHelper::power(&[3.0, 4.0]), 25.0);
    }
}

//! Summary statistics over a batch of values.

/// Mean and spread of a data window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    /// Mean value of the data
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator); 0 for fewer than two values
    pub std_dev: f64,
}

impl Statistics {
    /// Summarize `data`; `None` when it is empty
    #[must_use]
    pub fn of(data: &[f64]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;

        let std_dev = if data.len() < 2 {
            0.0
        } else {
            let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt()
        };

        Some(Self { mean, std_dev })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_calculation() {
        let stats = Statistics::of(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(stats.mean, 3.0);
        assert!((stats.std_dev - 1.5811388300841898).abs() < 1e-10);
    }

    #[test]
    fn test_single_value_has_zero_spread() {
        let stats = Statistics::of(&[7.5]).unwrap();
        assert_eq!(stats.mean, 7.5);
        assert_eq!(stats.std_dev, 0.0);
    }

    #[test]
    fn test_constant_values_have_zero_spread() {
        let stats = Statistics::of(&[2.0; 6]).unwrap();
        assert_eq!(stats.mean, 2.0);
        assert_eq!(stats.std_dev, 0.0);
    }

    #[test]
    fn test_empty_is_none() {
        assert!(Statistics::of(&[]).is_none());
    }
}

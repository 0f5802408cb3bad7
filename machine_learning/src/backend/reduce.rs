use std::{
    fmt::{self, Display},
    str::FromStr,
};

use crate::MlErr;

/// How the per-row gradients of a variable are collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReduceStrategy {
    #[default]
    Avg,
    Median,
    /// Keep the raw per-row sequence.
    None,
}

impl ReduceStrategy {
    /// Collapses `values` according to the strategy.
    ///
    /// `Avg` and `Median` of an empty sequence are `NaN`.
    pub fn reduce(self, mut values: Vec<f32>) -> Reduced {
        match self {
            ReduceStrategy::Avg => {
                let sum: f32 = values.iter().sum();
                Reduced::Scalar(sum / values.len() as f32)
            }
            ReduceStrategy::Median => {
                if values.is_empty() {
                    return Reduced::Scalar(f32::NAN);
                }

                values.sort_by(f32::total_cmp);
                let mid = values.len() / 2;

                let median = if values.len() % 2 == 0 {
                    (values[mid - 1] + values[mid]) / 2.
                } else {
                    values[mid]
                };

                Reduced::Scalar(median)
            }
            ReduceStrategy::None => Reduced::Raw(values),
        }
    }
}

impl FromStr for ReduceStrategy {
    type Err = MlErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg" => Ok(ReduceStrategy::Avg),
            "median" => Ok(ReduceStrategy::Median),
            "none" => Ok(ReduceStrategy::None),
            other => Err(MlErr::UnsupportedReduceStrategy(other.to_string())),
        }
    }
}

impl Display for ReduceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReduceStrategy::Avg => "avg",
            ReduceStrategy::Median => "median",
            ReduceStrategy::None => "none",
        };

        f.write_str(name)
    }
}

/// A reduced gradient.
#[derive(Debug, Clone, PartialEq)]
pub enum Reduced {
    Scalar(f32),
    Raw(Vec<f32>),
}

impl Reduced {
    /// Returns the scalar value, if it was reduced to one.
    pub fn scalar(&self) -> Option<f32> {
        match self {
            Reduced::Scalar(value) => Some(*value),
            Reduced::Raw(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_strategies_only() {
        assert_eq!("avg".parse(), Ok(ReduceStrategy::Avg));
        assert_eq!("median".parse(), Ok(ReduceStrategy::Median));
        assert_eq!("none".parse(), Ok(ReduceStrategy::None));
        assert_eq!(
            "max".parse::<ReduceStrategy>(),
            Err(MlErr::UnsupportedReduceStrategy("max".into()))
        );
    }

    #[test]
    fn reductions() {
        let values = vec![4., 1., 3., 2.];

        assert_eq!(ReduceStrategy::Avg.reduce(values.clone()), Reduced::Scalar(2.5));
        assert_eq!(ReduceStrategy::Median.reduce(values.clone()), Reduced::Scalar(2.5));
        assert_eq!(ReduceStrategy::Median.reduce(vec![5., 1., 3.]), Reduced::Scalar(3.));
        assert_eq!(ReduceStrategy::None.reduce(values.clone()), Reduced::Raw(values));
    }
}

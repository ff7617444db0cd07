use serde::Serialize;

/// Descriptive statistics summarizing a dataset.
///
/// Used to summarize fit residuals, so it carries the root mean square
/// alongside the usual measures of central tendency and spread.
#[derive(Debug, Clone, Serialize)]
pub struct DescriptiveStats {
    /// The number of values in the dataset.
    pub count: usize,
    /// The minimum value in the dataset.
    pub min: f64,
    /// The maximum value in the dataset.
    pub max: f64,
    /// The arithmetic mean of the dataset.
    pub mean: f64,
    /// The median value of the dataset.
    pub median: f64,
    /// The population variance of the dataset.
    pub variance: f64,
    /// The population standard deviation of the dataset.
    pub std_dev: f64,
    /// The root mean square (`sqrt(mean(v^2))`).
    pub rms: f64,
}

impl DescriptiveStats {
    /// Computes descriptive statistics from unsorted values.
    ///
    /// Non-finite values are skipped.
    ///
    /// # Returns
    ///
    /// * `Some(DescriptiveStats)` - if the dataset contains at least one finite value
    /// * `None` - otherwise
    ///
    /// # Examples
    ///
    /// ```
    /// # use hustle_stats::descriptive::DescriptiveStats;
    /// let stats = DescriptiveStats::new([5.0, 2.0, f64::NAN, 4.0, 1.0, 3.0]).unwrap();
    /// assert_eq!(stats.count, 5);
    /// assert_eq!(stats.min, 1.0);
    /// assert_eq!(stats.max, 5.0);
    /// assert_eq!(stats.mean, 3.0);
    /// assert_eq!(stats.median, 3.0);
    /// ```
    #[must_use]
    pub fn new<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut values = values
            .into_iter()
            .filter(|v| v.is_finite())
            .collect::<Vec<_>>();
        values.sort_by(f64::total_cmp);
        Self::from_sorted(&values)
    }

    /// Computes descriptive statistics from pre-sorted finite values.
    ///
    /// # Panics
    ///
    /// Panics if `sorted_values` is not sorted in ascending order.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_sorted(sorted_values: &[f64]) -> Option<Self> {
        assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be sorted in ascending order"
        );

        let min = *sorted_values.first()?;
        let max = *sorted_values.last()?;
        let count = sorted_values.len();
        let n = count as f64;
        let mean = sorted_values.iter().sum::<f64>() / n;
        let median = if count % 2 == 0 {
            f64::midpoint(sorted_values[count / 2 - 1], sorted_values[count / 2])
        } else {
            sorted_values[count / 2]
        };
        let variance = sorted_values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / n;
        let rms = (sorted_values.iter().map(|v| v * v).sum::<f64>() / n).sqrt();

        Some(Self {
            count,
            min,
            max,
            mean,
            median,
            variance,
            std_dev: variance.sqrt(),
            rms,
        })
    }
}

/// Weighted coefficient of determination (R²) of fitted values.
///
/// Each item is `(observed, fitted, weight)`. Returns `None` when the total
/// weight is not positive or the observed values have no weighted variance.
///
/// # Examples
///
/// ```
/// # use hustle_stats::descriptive::coefficient_of_determination;
/// let perfect = [(1.0, 1.0, 1.0), (3.0, 3.0, 1.0)];
/// assert_eq!(coefficient_of_determination(perfect), Some(1.0));
///
/// let mean_only = [(1.0, 2.0, 1.0), (3.0, 2.0, 1.0)];
/// assert_eq!(coefficient_of_determination(mean_only), Some(0.0));
/// ```
#[must_use]
pub fn coefficient_of_determination<I>(items: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64, f64)>,
{
    let items = items.into_iter().collect::<Vec<_>>();
    let total_weight = items.iter().map(|(_, _, w)| w).sum::<f64>();
    if total_weight <= 0.0 {
        return None;
    }
    let mean = items.iter().map(|(y, _, w)| w * y).sum::<f64>() / total_weight;
    let ss_tot = items
        .iter()
        .map(|(y, _, w)| w * (y - mean).powi(2))
        .sum::<f64>();
    if ss_tot <= 0.0 {
        return None;
    }
    let ss_res = items
        .iter()
        .map(|(y, fitted, w)| w * (y - fitted).powi(2))
        .sum::<f64>();
    Some(1.0 - ss_res / ss_tot)
}

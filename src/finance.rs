//! General functions related to finance.
use itertools::Itertools;

/// Calculates the discount factor applied to costs incurred in `year`.
///
/// Costs are discounted back to the first modelled year, so the factor is
/// `(1 + discount_rate)^(base_year - year)` and equals one in the base year.
pub fn discount_factor(base_year: u32, year: u32, discount_rate: f64) -> f64 {
    (1.0 + discount_rate).powi(base_year as i32 - year as i32)
}

/// Calculates the number of years each modelled year stands in for.
///
/// This is the distance to the next modelled year, or one for the last year. The years must be
/// sorted and unique.
pub fn year_gaps(years: &[u32]) -> Vec<f64> {
    years
        .iter()
        .tuple_windows()
        .map(|(year, next)| (next - year) as f64)
        .chain(years.last().map(|_| 1.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(2020, 2020, 0.05, 1.0)]
    #[case(2020, 2021, 0.0, 1.0)]
    #[case(2020, 2030, 0.05, 0.6139132535407591)]
    #[case(2020, 2025, 0.1, 0.6209213230591549)]
    fn test_discount_factor(
        #[case] base_year: u32,
        #[case] year: u32,
        #[case] discount_rate: f64,
        #[case] expected: f64,
    ) {
        assert_approx_eq!(
            f64,
            discount_factor(base_year, year, discount_rate),
            expected,
            epsilon = 1e-12
        );
    }

    #[rstest]
    #[case(&[], &[])]
    #[case(&[2020], &[1.0])]
    #[case(&[2020, 2025, 2030], &[5.0, 5.0, 1.0])]
    #[case(&[2020, 2021, 2030, 2050], &[1.0, 9.0, 20.0, 1.0])] // irregular grid
    fn test_year_gaps(#[case] years: &[u32], #[case] expected: &[f64]) {
        assert_eq!(year_gaps(years), expected);
    }
}

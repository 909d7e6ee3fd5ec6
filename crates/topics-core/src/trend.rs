//! View-count trend calculation.
//!
//! The trend is the ordinary least-squares slope of a view series plotted
//! against its observation index `x = 1..=n`:
//!
//! ```text
//! slope = (n·Σxy − Σx·Σy) / (n·Σx² − (Σx)²)
//! ```
//!
//! It is a signed momentum signal, not normalised to any range. A zero
//! denominator (fewer than two points) yields `0.0`.

/// Returns the least-squares slope of `views` over `x = 1..=views.len()`.
///
/// Sums are accumulated in `f64`, so arbitrarily large view counts cannot
/// overflow. Never returns NaN.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn trend(views: &[u64]) -> f64 {
    let n = views.len() as f64;

    let mut sum_x = 0.0_f64;
    let mut sum_y = 0.0_f64;
    let mut sum_xy = 0.0_f64;
    let mut sum_x2 = 0.0_f64;

    for (i, &count) in views.iter().enumerate() {
        let x = (i + 1) as f64;
        let y = count as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }

    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return 0.0;
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    if slope.is_finite() {
        slope
    } else {
        0.0
    }
}

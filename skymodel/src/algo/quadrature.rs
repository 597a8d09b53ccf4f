//! Trapezoidal quadrature over irregular samples.

/// Integrates samples `y` over abscissae `x` with the trapezoidal rule.
///
/// Both slices must have the same length; fewer than two samples integrate to zero.
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| 0.5 * (xs[1] - xs[0]) * (ys[0] + ys[1]))
        .sum()
}

/// Integrates the product of two sampled functions.
pub fn trapezoid_product(x: &[f64], a: &[f64], b: &[f64]) -> f64 {
    let product: Vec<f64> = a.iter().zip(b).map(|(p, q)| p * q).collect();
    trapezoid(x, &product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_function_is_exact() {
        let x = [0.0, 0.5, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        assert_relative_eq!(trapezoid(&x, &y), 12.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(trapezoid(&[], &[]), 0.0);
        assert_eq!(trapezoid(&[1.0], &[5.0]), 0.0);
    }

    #[test]
    fn test_product() {
        let x = [0.0, 1.0, 2.0];
        assert_relative_eq!(trapezoid_product(&x, &[1.0, 1.0, 1.0], &[2.0, 2.0, 2.0]), 4.0);
    }
}

//! Ordinary least squares on small dense designs.
//!
//! Fits y = b0 + b1*x1 + ... + bk*xk by solving the normal equations
//! (X'X) b = X'y with Gaussian elimination and partial pivoting.

/// Pivots smaller than this are treated as a singular system.
const SINGULAR_EPS: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub struct OlsFit {
    pub intercept:    f64,
    /// One coefficient per regressor column, in input order.
    pub coefficients: Vec<f64>,
    /// `None` when y has zero variance.
    pub r_squared:    Option<f64>,
    pub sample_size:  usize,
}

/// Population variance. Zero for fewer than two values.
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Fit `y` on the regressor columns `xs`.
///
/// Returns `None` when the system is underdetermined (fewer rows than
/// parameters), when a column length differs from `y`, or when the
/// normal equations are singular (e.g. collinear columns).
pub fn ols(y: &[f64], xs: &[&[f64]]) -> Option<OlsFit> {
    let n = y.len();
    let k = xs.len();
    let p = k + 1;

    if n < p || xs.iter().any(|col| col.len() != n) {
        return None;
    }

    // Normal equations, augmented: [X'X | X'y].
    let mut m = vec![vec![0.0; p + 1]; p];
    for row in 0..n {
        let x_row: Vec<f64> = std::iter::once(1.0)
            .chain(xs.iter().map(|col| col[row]))
            .collect();
        for i in 0..p {
            for j in 0..p {
                m[i][j] += x_row[i] * x_row[j];
            }
            m[i][p] += x_row[i] * y[row];
        }
    }

    let beta = solve_augmented(m)?;

    let predicted: Vec<f64> = (0..n)
        .map(|row| {
            beta[0]
                + xs.iter()
                    .enumerate()
                    .map(|(j, col)| beta[j + 1] * col[row])
                    .sum::<f64>()
        })
        .collect();

    Some(OlsFit {
        intercept:    beta[0],
        coefficients: beta[1..].to_vec(),
        r_squared:    r_squared(y, &predicted),
        sample_size:  n,
    })
}

fn r_squared(y: &[f64], predicted: &[f64]) -> Option<f64> {
    let n = y.len() as f64;
    let mean = y.iter().sum::<f64>() / n;
    let ss_tot: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    if ss_tot <= f64::EPSILON {
        return None;
    }
    let ss_res: f64 = y
        .iter()
        .zip(predicted)
        .map(|(a, f)| (a - f).powi(2))
        .sum();
    Some((1.0 - ss_res / ss_tot).clamp(0.0, 1.0))
}

/// Gaussian elimination with partial pivoting on an augmented p×(p+1) matrix.
fn solve_augmented(mut m: Vec<Vec<f64>>) -> Option<Vec<f64>> {
    let p = m.len();
    let scale = m
        .iter()
        .flat_map(|row| row[..p].iter())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()))
        .max(1.0);

    for col in 0..p {
        let pivot_row = (col..p).max_by(|&a, &b| {
            m[a][col]
                .abs()
                .partial_cmp(&m[b][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;

        if m[pivot_row][col].abs() < SINGULAR_EPS * scale {
            return None;
        }
        m.swap(col, pivot_row);

        for row in (col + 1)..p {
            let factor = m[row][col] / m[col][col];
            if factor == 0.0 {
                continue;
            }
            for j in col..=p {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut x = vec![0.0; p];
    for row in (0..p).rev() {
        let tail: f64 = ((row + 1)..p).map(|j| m[row][j] * x[j]).sum();
        x[row] = (m[row][p] - tail) / m[row][row];
    }

    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_linear_relationship() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|v| 3.0 - 2.0 * v).collect();

        let fit = ols(&y, &[&x]).expect("fit");

        assert!((fit.intercept - 3.0).abs() < 1e-9);
        assert!((fit.coefficients[0] + 2.0).abs() < 1e-9);
        assert!(fit.r_squared.expect("r2") > 0.999_999);
        assert_eq!(fit.sample_size, 4);
    }

    #[test]
    fn two_regressor_fit() {
        let x1 = [0.0, 1.0, 0.0, 1.0, 2.0];
        let x2 = [0.0, 0.0, 1.0, 1.0, 3.0];
        let y: Vec<f64> = x1
            .iter()
            .zip(&x2)
            .map(|(a, b)| 1.0 + 0.5 * a - 1.5 * b)
            .collect();

        let fit = ols(&y, &[&x1, &x2]).expect("fit");

        assert!((fit.coefficients[0] - 0.5).abs() < 1e-9);
        assert!((fit.coefficients[1] + 1.5).abs() < 1e-9);
    }

    #[test]
    fn collinear_columns_are_singular() {
        let x1 = [1.0, 2.0, 3.0, 4.0];
        let x2 = [2.0, 4.0, 6.0, 8.0];
        let y = [1.0, 2.0, 2.5, 4.0];

        assert!(ols(&y, &[&x1, &x2]).is_none());
    }

    #[test]
    fn underdetermined_system_is_rejected() {
        let x1 = [1.0, 2.0];
        let x2 = [3.0, 1.0];
        let y = [1.0, 2.0];

        assert!(ols(&y, &[&x1, &x2]).is_none());
    }

    #[test]
    fn constant_target_has_no_r_squared() {
        let x = [1.0, 2.0, 3.0];
        let y = [5.0, 5.0, 5.0];

        let fit = ols(&y, &[&x]).expect("fit");

        assert!(fit.coefficients[0].abs() < 1e-9);
        assert_eq!(fit.r_squared, None);
    }
}

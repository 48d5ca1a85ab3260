//! Linear-algebra helpers for the conjugate fitting backend.
//!
//! The backend repeatedly solves small ridge-augmented least-squares
//! problems:
//!
//! ```text
//! minimize ||A β - b||²
//! ```
//!
//! where `A` stacks data rows and prior pseudo-observation rows. With a
//! proper prior on every coefficient, `AᵀA` is positive definite, so a
//! Cholesky solve is the fast path; an SVD with a progressive tolerance
//! ladder handles near-singular systems.

use nalgebra::{Cholesky, DMatrix, DVector};

/// Solve `AᵀA β = Aᵀb` via Cholesky, falling back to an SVD least-squares
/// solve when the normal equations are too ill-conditioned.
///
/// Returns `None` if neither route produces a finite solution.
pub fn solve_least_squares(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let ata = a.transpose() * a;
    let atb = a.transpose() * b;

    if let Some(chol) = Cholesky::new(ata) {
        let beta = chol.solve(&atb);
        if beta.iter().all(|v| v.is_finite()) {
            return Some(beta);
        }
    }

    let svd = a.clone().svd(true, true);
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(b, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Inverse of a symmetric positive-definite matrix.
pub fn spd_inverse(m: DMatrix<f64>) -> Option<DMatrix<f64>> {
    Cholesky::new(m).map(|chol| chol.inverse())
}

//! Dense in-place solver for `A·X = B` systems.
//!
//! Used by the constraint group solver, where `A` couples every constraint
//! parameter with every constraint equation and `B` carries one column per
//! error derivative. Both inputs are destroyed: on return `b` holds `X`.
//!
//! Singular systems are not detected. A zero pivot feeds a division by zero
//! through and the result contains non-finite values; callers that care must
//! check the solution with [`is_finite`].

use nalgebra::{DMatrix, DVector};

/// Solves `a · x = b` in place with partial-pivot Gaussian elimination.
///
/// `a` must be square (n×n) and `b` must have n rows; any number of columns is
/// solved simultaneously. On return `a` is upper triangular garbage and `b`
/// contains the solution.
pub fn solve_in_place(a: &mut DMatrix<f64>, b: &mut DMatrix<f64>) {
    let n = a.nrows();
    debug_assert_eq!(a.ncols(), n, "system matrix must be square");
    debug_assert_eq!(b.nrows(), n, "right hand side must have one row per equation");
    let columns = b.ncols();

    for pivot in 0..n {
        let mut best_row = pivot;
        let mut best_value = a[(pivot, pivot)].abs();
        for row in (pivot + 1)..n {
            let value = a[(row, pivot)].abs();
            if value > best_value {
                best_value = value;
                best_row = row;
            }
        }

        if best_row != pivot {
            a.swap_rows(best_row, pivot);
            b.swap_rows(best_row, pivot);
        }

        let diagonal = a[(pivot, pivot)];
        for row in (pivot + 1)..n {
            let factor = a[(row, pivot)] / diagonal;
            for col in pivot..n {
                let above = a[(pivot, col)];
                a[(row, col)] -= factor * above;
            }
            for col in 0..columns {
                let above = b[(pivot, col)];
                b[(row, col)] -= factor * above;
            }
        }
    }

    for row in (0..n).rev() {
        for known in (row + 1)..n {
            let coefficient = a[(row, known)];
            for col in 0..columns {
                let solved = b[(known, col)];
                b[(row, col)] -= coefficient * solved;
            }
        }
        let diagonal = a[(row, row)];
        for col in 0..columns {
            b[(row, col)] /= diagonal;
        }
    }
}

/// Solves `a · x = b` for a single right-hand side vector, in place.
pub fn solve_vector_in_place(a: &mut DMatrix<f64>, b: &mut DVector<f64>) {
    let n = b.nrows();
    let mut rhs = DMatrix::from_column_slice(n, 1, b.as_slice());
    solve_in_place(a, &mut rhs);
    b.copy_from_slice(rhs.as_slice());
}

/// Returns true if every entry of the matrix is finite
pub fn is_finite(m: &DMatrix<f64>) -> bool {
    m.iter().all(|v| v.is_finite())
}

use std::fmt;

use crate::error::{Result, SolverError};

/// Dense simplex tableau.
///
/// Row 0 is the objective (reduced-cost) row; rows `1..rows()` are constraint
/// rows. The last column is the right-hand side. A column is basic when
/// exactly one constraint row holds 1 in it and every other row, the
/// objective row included, holds 0.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Tableau {
    data: Vec<Vec<f64>>,
}

impl Tableau {
    /// Zero tableau with `constraints + 1` rows and `columns + 1` columns
    /// (the extra column holds the right-hand side).
    pub fn new(constraints: usize, columns: usize) -> Self {
        Self {
            data: vec![vec![0.0; columns + 1]; constraints + 1],
        }
    }

    /// Builds a tableau from raw rows. Every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if width == 0 {
            return Err(SolverError::InvalidOperation("tableau needs at least one column".into()));
        }
        if let Some(row) = rows.iter().find(|r| r.len() != width) {
            return Err(SolverError::DimensionMismatch {
                expected: width,
                found: row.len(),
            });
        }
        Ok(Self { data: rows })
    }

    pub fn rows(&self) -> usize {
        self.data.len()
    }

    /// Column count including the right-hand side.
    pub fn cols(&self) -> usize {
        self.data[0].len()
    }

    pub fn num_constraints(&self) -> usize {
        self.data.len() - 1
    }

    pub fn rhs_col(&self) -> usize {
        self.cols() - 1
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row][col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row][col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row]
    }

    pub fn rhs(&self, row: usize) -> f64 {
        self.data[row][self.rhs_col()]
    }

    /// Right-hand side of the objective row.
    pub fn objective_value(&self) -> f64 {
        self.rhs(0)
    }

    /// Inserts a zero column just before the right-hand side and returns its
    /// index.
    pub fn insert_column(&mut self) -> usize {
        let at = self.rhs_col();
        for row in &mut self.data {
            row.insert(at, 0.0);
        }
        at
    }

    /// Appends a constraint row and returns its index.
    pub fn push_row(&mut self, row: Vec<f64>) -> Result<usize> {
        if row.len() != self.cols() {
            return Err(SolverError::DimensionMismatch {
                expected: self.cols(),
                found: row.len(),
            });
        }
        self.data.push(row);
        Ok(self.data.len() - 1)
    }

    /// `row[target] -= factor * row[source]`
    pub fn subtract_row(&mut self, target: usize, source: usize, factor: f64) {
        if factor == 0.0 || target == source {
            return;
        }
        let source_row = self.data[source].clone();
        for (t, s) in self.data[target].iter_mut().zip(&source_row) {
            *t -= factor * s;
        }
    }

    pub fn negate_row(&mut self, row: usize) {
        for v in &mut self.data[row] {
            *v = -*v;
        }
    }

    /// Gauss-Jordan pivot on `(row, col)`.
    ///
    /// Fails with [`SolverError::NumericalDegeneracy`] when the pivot element
    /// is not larger than `tolerance` in magnitude.
    pub fn pivot(&mut self, row: usize, col: usize, tolerance: f64) -> Result<()> {
        let pivot_val = self.data[row][col];
        if !(pivot_val.abs() > tolerance) {
            return Err(SolverError::NumericalDegeneracy {
                row,
                column: col,
                value: pivot_val,
            });
        }

        // Scale pivot row
        for v in &mut self.data[row] {
            *v /= pivot_val;
        }

        // Eliminate column in other rows
        let pivot_row = self.data[row].clone();
        for (i, other) in self.data.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = other[col];
            if factor == 0.0 {
                continue;
            }
            for (v, p) in other.iter_mut().zip(&pivot_row) {
                *v -= factor * p;
            }
            other[col] = 0.0;
        }
        Ok(())
    }

    /// Every objective-row entry except the right-hand side is >= -tolerance.
    pub fn is_optimal(&self, tolerance: f64) -> bool {
        self.data[0][..self.rhs_col()].iter().all(|&v| v >= -tolerance)
    }

    /// Every constraint right-hand side is >= -tolerance.
    pub fn is_primal_feasible(&self, tolerance: f64) -> bool {
        (1..self.rows()).all(|i| self.rhs(i) >= -tolerance)
    }

    /// Dantzig rule: most negative objective-row entry, leftmost on ties.
    pub fn entering_column(&self, tolerance: f64) -> Option<usize> {
        self.entering_column_where(tolerance, |_| true)
    }

    /// Dantzig rule restricted to columns accepted by `eligible`.
    pub fn entering_column_where(&self, tolerance: f64, eligible: impl Fn(usize) -> bool) -> Option<usize> {
        let mut min_val = -tolerance;
        let mut min_col = None;

        for j in 0..self.rhs_col() {
            let v = self.data[0][j];
            if v < min_val && eligible(j) {
                min_val = v;
                min_col = Some(j);
            }
        }

        min_col
    }

    /// Minimum-ratio test over rows whose entry in `col` exceeds the
    /// tolerance; first row wins ties. `None` means the column is unbounded.
    pub fn leaving_row(&self, col: usize, tolerance: f64) -> Option<usize> {
        let rhs_col = self.rhs_col();
        let mut min_ratio = f64::INFINITY;
        let mut min_row = None;

        for i in 1..self.rows() {
            let val = self.data[i][col];
            if val > tolerance {
                let ratio = self.data[i][rhs_col] / val;
                if ratio < min_ratio {
                    min_ratio = ratio;
                    min_row = Some(i);
                }
            }
        }

        min_row
    }

    /// Constraint row in which `col` is basic, if any.
    pub fn basic_row(&self, col: usize, tolerance: f64) -> Option<usize> {
        self.unit_row(col, 1.0, tolerance)
    }

    /// Like [`Tableau::basic_row`] but looking for a `target` entry (1 or -1)
    /// in the single non-zero row.
    pub fn unit_row(&self, col: usize, target: f64, tolerance: f64) -> Option<usize> {
        if self.data[0][col].abs() > tolerance {
            return None;
        }
        let mut found = None;
        for i in 1..self.rows() {
            let v = self.data[i][col];
            if (v - target).abs() <= tolerance {
                if found.is_some() {
                    return None;
                }
                found = Some(i);
            } else if v.abs() > tolerance {
                return None;
            }
        }
        found
    }

    /// Value of the variable in `col`: its basic row's right-hand side, or 0.
    pub fn column_value(&self, col: usize, tolerance: f64) -> f64 {
        match self.basic_row(col, tolerance) {
            Some(row) => self.rhs(row),
            None => 0.0,
        }
    }
}

impl fmt::Display for Tableau {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.data.iter().enumerate() {
            let label = if i == 0 { "z".to_string() } else { format!("r{}", i) };
            write!(f, "{:>4} |", label)?;
            for (j, v) in row.iter().enumerate() {
                if j == row.len() - 1 {
                    write!(f, " |")?;
                }
                // Avoid printing -0.000
                let v = if v.abs() < 5e-5 { 0.0 } else { *v };
                write!(f, " {:>9.4}", v)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tableau {
        // max 3x1 + 5x2; x1 <= 4; 2x2 <= 12; 3x1 + 2x2 <= 18
        Tableau::from_rows(vec![
            vec![-3.0, -5.0, 0.0, 0.0, 0.0, 0.0],
            vec![1.0, 0.0, 1.0, 0.0, 0.0, 4.0],
            vec![0.0, 2.0, 0.0, 1.0, 0.0, 12.0],
            vec![3.0, 2.0, 0.0, 0.0, 1.0, 18.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_pivot_makes_unit_column() {
        let mut t = sample();
        t.pivot(2, 1, 1e-9).unwrap();

        assert!((t.get(2, 1) - 1.0).abs() < 1e-12);
        for i in [0, 1, 3] {
            assert!(t.get(i, 1).abs() < 1e-12, "row {} not eliminated", i);
        }
        assert!((t.objective_value() - 30.0).abs() < 1e-9);
        assert_eq!(t.basic_row(1, 1e-9), Some(2));
    }

    #[test]
    fn test_pivot_rejects_tiny_element() {
        let mut t = sample();
        let err = t.pivot(1, 1, 1e-9).unwrap_err();
        assert!(matches!(err, SolverError::NumericalDegeneracy { row: 1, column: 1, .. }));
    }

    #[test]
    fn test_entering_and_leaving() {
        let t = sample();
        assert_eq!(t.entering_column(1e-9), Some(1));
        // ratios: row 2 -> 6, row 3 -> 9
        assert_eq!(t.leaving_row(1, 1e-9), Some(2));
        assert_eq!(t.entering_column_where(1e-9, |j| j != 1), Some(0));
    }

    #[test]
    fn test_entering_tie_takes_leftmost() {
        let t = Tableau::from_rows(vec![vec![-2.0, -2.0, 0.0], vec![1.0, 1.0, 1.0]]).unwrap();
        assert_eq!(t.entering_column(1e-9), Some(0));
    }

    #[test]
    fn test_unbounded_column_has_no_leaving_row() {
        let t = Tableau::from_rows(vec![vec![-1.0, 0.0, 0.0], vec![-1.0, 1.0, 2.0]]).unwrap();
        assert_eq!(t.leaving_row(0, 1e-9), None);
    }

    #[test]
    fn test_optimality_and_feasibility() {
        let t = sample();
        assert!(!t.is_optimal(1e-9));
        assert!(t.is_primal_feasible(1e-9));

        let t = Tableau::from_rows(vec![vec![0.0, 1.0, 5.0], vec![1.0, 1.0, -1.0]]).unwrap();
        assert!(t.is_optimal(1e-9));
        assert!(!t.is_primal_feasible(1e-9));
    }

    #[test]
    fn test_structural_growth() {
        let mut t = sample();
        let col = t.insert_column();
        assert_eq!(col, 5);
        assert_eq!(t.cols(), 7);
        let row = t.push_row(vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0]).unwrap();
        assert_eq!(row, 4);
        assert_eq!(t.basic_row(5, 1e-9), Some(4));
        assert!(t.push_row(vec![1.0]).is_err());
    }
}

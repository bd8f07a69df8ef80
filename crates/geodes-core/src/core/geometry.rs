use nalgebra::{DMatrix, Matrix3, Point3, SymmetricEigen, Vector3};
use thiserror::Error;

/// Variance (Å²) below which a point cloud is treated as coincident.
pub const DEGENERACY_EPSILON: f64 = 1e-6;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Insufficient atoms for fitting: found {found}, need at least {required}")]
    InsufficientAtoms { found: usize, required: usize },
    #[error("Degenerate geometry: points are (near-)coincident or collinear where a spread is required")]
    Degenerate,
}

/// A least-squares line through a set of points.
#[derive(Debug, Clone, PartialEq)]
pub struct LineFit {
    pub origin: Point3<f64>,
    /// Unit direction. The sign is arbitrary until [`LineFit::oriented_towards`] is applied.
    pub direction: Vector3<f64>,
    /// RMS perpendicular distance of the points from the line (Å).
    pub residual: f64,
}

impl LineFit {
    /// Flips the direction so that it points from `from` towards `to`.
    pub fn oriented_towards(mut self, from: &Point3<f64>, to: &Point3<f64>) -> Self {
        if self.direction.dot(&(to - from)) < 0.0 {
            self.direction = -self.direction;
        }
        self
    }

    /// Signed distance of a point along the line, measured from the origin.
    pub fn project(&self, point: &Point3<f64>) -> f64 {
        (point - self.origin).dot(&self.direction)
    }
}

pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / points.len() as f64))
}

/// Fits a line minimizing perpendicular distances (principal axis of the covariance).
pub fn fit_line(points: &[Point3<f64>]) -> Result<LineFit, GeometryError> {
    if points.len() < 2 {
        return Err(GeometryError::InsufficientAtoms {
            found: points.len(),
            required: 2,
        });
    }
    let origin = centroid(points).ok_or(GeometryError::Degenerate)?;

    let covariance = points.iter().fold(Matrix3::<f64>::zeros(), |acc, p| {
        let d = p - origin;
        acc + d * d.transpose()
    }) / points.len() as f64;

    let eigen = SymmetricEigen::new(covariance);
    let (index, variance) = eigen
        .eigenvalues
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or(GeometryError::Degenerate)?;
    if !variance.is_finite() || variance < DEGENERACY_EPSILON {
        return Err(GeometryError::Degenerate);
    }

    let direction = eigen.eigenvectors.column(index).normalize();
    let sum_sq: f64 = points
        .iter()
        .map(|p| {
            let d = p - origin;
            (d - direction * d.dot(&direction)).norm_squared()
        })
        .sum();

    Ok(LineFit {
        origin,
        direction,
        residual: (sum_sq / points.len() as f64).sqrt(),
    })
}

/// Angle between two vectors in degrees, in `[0, 180]`.
pub fn angle_between_degrees(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let denom = a.norm() * b.norm();
    if denom == 0.0 {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos().to_degrees()
}

pub fn rmsd(a: &[Point3<f64>], b: &[Point3<f64>]) -> Option<f64> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let sum_sq: f64 = a.iter().zip(b).map(|(p, q)| (p - q).norm_squared()).sum();
    Some((sum_sq / a.len() as f64).sqrt())
}

/// Optimal rotation and translation mapping `mobile` onto `reference` (Kabsch).
///
/// Point `i` of `mobile` corresponds to point `i` of `reference`. The returned
/// rotation is proper (det = +1).
pub fn kabsch(
    reference: &[Point3<f64>],
    mobile: &[Point3<f64>],
) -> Result<(Matrix3<f64>, Vector3<f64>), GeometryError> {
    let n = reference.len().min(mobile.len());
    if n < 3 || reference.len() != mobile.len() {
        return Err(GeometryError::InsufficientAtoms {
            found: n,
            required: 3,
        });
    }
    let ref_center = centroid(reference).ok_or(GeometryError::Degenerate)?;
    let mob_center = centroid(mobile).ok_or(GeometryError::Degenerate)?;

    // Cross-covariance H = sum(p_mobile * p_reference^T)
    let h = mobile
        .iter()
        .zip(reference)
        .fold(Matrix3::<f64>::zeros(), |acc, (m, r)| {
            acc + (m - mob_center) * (r - ref_center).transpose()
        });

    let svd = h.svd(true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Err(GeometryError::Degenerate),
    };
    if svd.singular_values.iter().filter(|s| **s > DEGENERACY_EPSILON).count() < 2 {
        return Err(GeometryError::Degenerate);
    }

    let v = v_t.transpose();
    let d = (v * u.transpose()).determinant().signum();
    let correction = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, d));
    let rotation = v * correction * u.transpose();
    let translation = ref_center.coords - rotation * mob_center.coords;
    Ok((rotation, translation))
}

/// Least-squares quadratic `r(t) = a + b·t + c·t²` through `(t_i, p_i)`.
///
/// Returns the coefficient vectors `[a, b, c]`.
pub fn fit_quadratic(
    parameters: &[f64],
    points: &[Point3<f64>],
) -> Result<[Vector3<f64>; 3], GeometryError> {
    let n = points.len();
    if n < 3 || parameters.len() != n {
        return Err(GeometryError::InsufficientAtoms {
            found: n.min(parameters.len()),
            required: 3,
        });
    }
    let design = DMatrix::from_fn(n, 3, |row, col| parameters[row].powi(col as i32));
    let rhs = DMatrix::from_fn(n, 3, |row, col| points[row][col]);

    let coefficients = design
        .svd(true, true)
        .solve(&rhs, 1e-12)
        .map_err(|_| GeometryError::Degenerate)?;
    if coefficients.iter().any(|v| !v.is_finite()) {
        return Err(GeometryError::Degenerate);
    }

    let row = |i: usize| Vector3::new(coefficients[(i, 0)], coefficients[(i, 1)], coefficients[(i, 2)]);
    Ok([row(0), row(1), row(2)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Unit};

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn centroid_of_empty_slice_is_none() {
        assert!(centroid(&[]).is_none());
        let c = centroid(&[Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 4.0, 6.0)]).unwrap();
        assert_eq!(c, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn fit_line_recovers_colinear_direction_with_zero_residual() {
        let points: Vec<_> = (0..6)
            .map(|i| Point3::new(1.0 + i as f64, 2.0 + 2.0 * i as f64, 3.0))
            .collect();
        let fit = fit_line(&points)
            .unwrap()
            .oriented_towards(&points[0], &points[5]);
        let expected = Vector3::new(1.0, 2.0, 0.0).normalize();
        assert!(approx(fit.direction.dot(&expected), 1.0, 1e-9));
        assert!(fit.residual < 1e-9);
        assert!(approx(fit.direction.norm(), 1.0, 1e-12));
    }

    #[test]
    fn fit_line_rejects_coincident_points() {
        let points = vec![Point3::new(1.0, 1.0, 1.0); 5];
        assert_eq!(fit_line(&points), Err(GeometryError::Degenerate));
        assert_eq!(
            fit_line(&points[..1]),
            Err(GeometryError::InsufficientAtoms { found: 1, required: 2 })
        );
    }

    #[test]
    fn orientation_follows_requested_endpoints() {
        let points = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, 5.0)];
        let fit = fit_line(&points).unwrap();
        let down = fit.clone().oriented_towards(&points[1], &points[0]);
        let up = fit.oriented_towards(&points[0], &points[1]);
        assert!(up.direction.z > 0.0);
        assert!(down.direction.z < 0.0);
    }

    #[test]
    fn angle_between_handles_parallel_and_perpendicular() {
        let x = Vector3::x();
        assert!(approx(angle_between_degrees(&x, &(x * 3.0)), 0.0, 1e-9));
        assert!(approx(angle_between_degrees(&x, &Vector3::y()), 90.0, 1e-9));
        assert!(approx(angle_between_degrees(&x, &-x), 180.0, 1e-9));
    }

    #[test]
    fn kabsch_recovers_known_rigid_motion() {
        let reference = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.5, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(0.0, 0.0, 2.5),
            Point3::new(1.0, 1.0, 1.0),
        ];
        let rot = Rotation3::from_axis_angle(&Unit::new_normalize(Vector3::new(1.0, 2.0, 3.0)), 0.7);
        let shift = Vector3::new(10.0, -4.0, 2.0);
        let mobile: Vec<_> = reference.iter().map(|p| rot * p + shift).collect();

        let (r, t) = kabsch(&reference, &mobile).unwrap();
        assert!(approx(r.determinant(), 1.0, 1e-9));
        let moved: Vec<_> = mobile.iter().map(|p| Point3::from(r * p.coords + t)).collect();
        assert!(rmsd(&reference, &moved).unwrap() < 1e-9);
    }

    #[test]
    fn kabsch_requires_three_pairs() {
        let pts = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        assert!(matches!(
            kabsch(&pts, &pts),
            Err(GeometryError::InsufficientAtoms { found: 2, .. })
        ));
    }

    #[test]
    fn quadratic_fit_recovers_parabola_coefficients() {
        let ts: Vec<f64> = (0..7).map(|i| i as f64 - 3.0).collect();
        let points: Vec<_> = ts
            .iter()
            .map(|&t| Point3::new(t, 0.5 * t * t, 1.0))
            .collect();
        let [a, b, c] = fit_quadratic(&ts, &points).unwrap();
        assert!((a - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-9);
        assert!((b - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-9);
        assert!((c - Vector3::new(0.0, 0.5, 0.0)).norm() < 1e-9);
    }
}

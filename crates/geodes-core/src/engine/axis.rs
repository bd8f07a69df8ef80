use super::segmenter::SegmentSpan;
use crate::core::geometry::{GeometryError, LineFit, angle_between_degrees, centroid, fit_line, fit_quadratic};
use crate::core::models::atom::AXIS_BACKBONE_ATOMS;
use crate::core::models::structure::Structure;
use nalgebra::{Point3, Vector3};
use std::fmt;

/// Residues averaged per trace point: roughly one α-helical turn.
const TURN_RESIDUES: usize = 4;
const MIN_BACKBONE_ATOMS: usize = 3;
const MIN_BEND_TRACE_POINTS: usize = 4;
const MIN_QUADRATIC_TRACE_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisModel {
    Linear,
    Quadratic,
}

impl fmt::Display for AxisModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AxisModel::Linear => "linear",
            AxisModel::Quadratic => "quadratic",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HelixAxis {
    /// Centroid of the axis trace.
    pub origin: Point3<f64>,
    /// Unit vector pointing from the N- to the C-terminal end.
    pub direction: Vector3<f64>,
    /// Unit tangent of the axis at each residue, N to C. `None` for residues
    /// without backbone atoms, which have no position along the axis.
    pub local_directions: Vec<Option<Vector3<f64>>>,
    /// Local curvature at each residue (1/Å), index-aligned with
    /// `local_directions`. Zero for the linear model.
    pub local_curvature: Vec<Option<f64>>,
    pub model: AxisModel,
}

impl HelixAxis {
    /// Mean over the residues that have a curvature value.
    pub fn mean_curvature(&self) -> f64 {
        let (sum, count) = self
            .local_curvature
            .iter()
            .flatten()
            .fold((0.0, 0usize), |(s, n), k| (s + k, n + 1));
        if count == 0 { 0.0 } else { sum / count as f64 }
    }

    pub fn max_curvature(&self) -> f64 {
        self.local_curvature.iter().flatten().copied().fold(0.0, f64::max)
    }
}

/// Backbone coordinates of one residue along the axis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResidueBackbone {
    pub n: Option<Point3<f64>>,
    pub ca: Option<Point3<f64>>,
    pub c: Option<Point3<f64>>,
}

impl ResidueBackbone {
    pub fn new(n: Point3<f64>, ca: Point3<f64>, c: Point3<f64>) -> Self {
        Self {
            n: Some(n),
            ca: Some(ca),
            c: Some(c),
        }
    }

    fn atoms(&self) -> impl Iterator<Item = Point3<f64>> + '_ {
        [self.n, self.ca, self.c].into_iter().flatten()
    }

    fn center(&self) -> Option<Point3<f64>> {
        let atoms: Vec<_> = self.atoms().collect();
        centroid(&atoms)
    }
}

/// Geometry of one fitted helix.
#[derive(Debug, Clone, PartialEq)]
pub struct HelixFit {
    pub axis: HelixAxis,
    /// Extent of the backbone atom projections on the axis (Å).
    pub length: f64,
    pub rise_per_residue: f64,
    /// Angle between the first-half and second-half axes (degrees).
    pub bend_angle: Option<f64>,
    /// RMS distance of the axis trace from the chosen model (Å).
    pub residual: f64,
}

/// A fitted helix segment. Immutable once computed.
#[derive(Debug, Clone, PartialEq)]
pub struct HelixSegment {
    pub chain: char,
    pub start_index: usize,
    pub end_index: usize,
    pub start_number: isize,
    pub end_number: isize,
    pub window: Option<usize>,
    pub residue_count: usize,
    pub axis: HelixAxis,
    pub length: f64,
    pub rise_per_residue: f64,
    pub bend_angle: Option<f64>,
    pub residual: f64,
}

impl HelixSegment {
    pub fn from_fit(span: &SegmentSpan, fit: HelixFit) -> Self {
        Self {
            chain: span.chain,
            start_index: span.start_index,
            end_index: span.end_index,
            start_number: span.start_number,
            end_number: span.end_number,
            window: span.window,
            residue_count: span.residues.len(),
            axis: fit.axis,
            length: fit.length,
            rise_per_residue: fit.rise_per_residue,
            bend_angle: fit.bend_angle,
            residual: fit.residual,
        }
    }
}

/// Fits the axis of a segment of `structure`.
pub fn fit_segment(
    structure: &Structure,
    span: &SegmentSpan,
    curvature_tolerance: f64,
) -> Result<HelixSegment, GeometryError> {
    let backbone: Vec<ResidueBackbone> = span
        .residues
        .iter()
        .map(|&residue_id| {
            let [n, ca, c] = AXIS_BACKBONE_ATOMS
                .map(|name| structure.residue_atom(residue_id, name).map(|a| a.position));
            ResidueBackbone { n, ca, c }
        })
        .collect();
    let fit = fit_backbone(&backbone, curvature_tolerance)?;
    Ok(HelixSegment::from_fit(span, fit))
}

/// Fits a helix axis through per-residue backbone atoms ordered N to C.
pub fn fit_backbone(residues: &[ResidueBackbone], curvature_tolerance: f64) -> Result<HelixFit, GeometryError> {
    let atoms: Vec<Point3<f64>> = residues.iter().flat_map(|r| r.atoms()).collect();
    if atoms.len() < MIN_BACKBONE_ATOMS {
        return Err(GeometryError::InsufficientAtoms {
            found: atoms.len(),
            required: MIN_BACKBONE_ATOMS,
        });
    }

    let trace = axis_trace(residues, &atoms);
    let (first, last) = match (trace.first(), trace.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err(GeometryError::Degenerate),
    };
    let line = fit_line(&trace)?.oriented_towards(&first, &last);

    let (min, max) = atoms.iter().map(|p| line.project(p)).fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(lo, hi), t| (lo.min(t), hi.max(t)),
    );
    let length = max - min;
    let rise_per_residue = if residues.len() > 1 {
        length / (residues.len() - 1) as f64
    } else {
        0.0
    };

    let residue_params: Vec<Option<f64>> = residues
        .iter()
        .map(|r| r.center().map(|p| line.project(&p)))
        .collect();

    let curved = if line.residual > curvature_tolerance && trace.len() >= MIN_QUADRATIC_TRACE_POINTS {
        quadratic_axis(&line, &trace, &residue_params).ok()
    } else {
        None
    };

    let (axis, residual) = match curved {
        Some(result) => result,
        None => (
            HelixAxis {
                origin: line.origin,
                direction: line.direction,
                local_directions: residue_params.iter().map(|t| t.map(|_| line.direction)).collect(),
                local_curvature: residue_params.iter().map(|t| t.map(|_| 0.0)).collect(),
                model: AxisModel::Linear,
            },
            line.residual,
        ),
    };

    Ok(HelixFit {
        axis,
        length,
        rise_per_residue,
        bend_angle: bend_angle(&trace),
        residual,
    })
}

/// Points sampled along the helix axis, N to C.
///
/// The mean of every window of four consecutive CA atoms lies close to the
/// axis. Short or CA-incomplete segments fall back to per-residue backbone
/// centroids, and finally to the raw backbone atoms.
fn axis_trace(residues: &[ResidueBackbone], atoms: &[Point3<f64>]) -> Vec<Point3<f64>> {
    let cas: Vec<Point3<f64>> = residues.iter().filter_map(|r| r.ca).collect();
    if residues.len() >= TURN_RESIDUES && cas.len() == residues.len() {
        let running: Vec<_> = cas.windows(TURN_RESIDUES).filter_map(centroid).collect();
        if running.len() >= 2 {
            return running;
        }
    }
    let centers: Vec<_> = residues.iter().filter_map(ResidueBackbone::center).collect();
    if centers.len() >= 2 {
        return centers;
    }
    atoms.to_vec()
}

fn quadratic_axis(
    line: &LineFit,
    trace: &[Point3<f64>],
    residue_params: &[Option<f64>],
) -> Result<(HelixAxis, f64), GeometryError> {
    let params: Vec<f64> = trace.iter().map(|p| line.project(p)).collect();
    let [a, b, c] = fit_quadratic(&params, trace)?;
    let curve = |t: f64| Point3::from(a + b * t + c * (t * t));

    let sum_sq: f64 = trace
        .iter()
        .zip(&params)
        .map(|(p, &t)| (p - curve(t)).norm_squared())
        .sum();
    let residual = (sum_sq / trace.len() as f64).sqrt();

    let second = c * 2.0;
    let local_frame = |t: f64| {
        let tangent = b + c * (2.0 * t);
        let speed = tangent.norm();
        if speed < 1e-9 {
            return (line.direction, 0.0);
        }
        let mut direction = tangent / speed;
        if direction.dot(&line.direction) < 0.0 {
            direction = -direction;
        }
        (direction, tangent.cross(&second).norm() / speed.powi(3))
    };
    let (local_directions, local_curvature): (Vec<_>, Vec<_>) = residue_params
        .iter()
        .map(|t| match t.map(&local_frame) {
            Some((direction, curvature)) => (Some(direction), Some(curvature)),
            None => (None, None),
        })
        .unzip();

    Ok((
        HelixAxis {
            origin: line.origin,
            direction: line.direction,
            local_directions,
            local_curvature,
            model: AxisModel::Quadratic,
        },
        residual,
    ))
}

fn bend_angle(trace: &[Point3<f64>]) -> Option<f64> {
    if trace.len() < MIN_BEND_TRACE_POINTS {
        return None;
    }
    let (head, tail) = trace.split_at(trace.len() / 2);
    let half_direction = |points: &[Point3<f64>]| -> Option<Vector3<f64>> {
        let (first, last) = (points.first()?, points.last()?);
        fit_line(points)
            .ok()
            .map(|fit| fit.oriented_towards(first, last).direction)
    };
    Some(angle_between_degrees(&half_direction(head)?, &half_direction(tail)?))
}

//! Design surface seam and its Delaunay adapter.
//!
//! The engine only needs "design elevation at (x, y), if covered". How the
//! surface is triangulated belongs to whoever implements [`DesignSurface`];
//! [`DelaunaySurfaceBuilder`] hands the work to `spade`.

use crate::geometry::SurveyPoint;
use spade::{DelaunayTriangulation, FloatTriangulation, HasPosition, Point2, Triangulation};
use thiserror::Error;
use tracing::debug;

/// Errors building or querying a design surface.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// Not enough survey points to span a surface.
    #[error("Need at least 3 survey points, got {0}")]
    TooFewPoints(usize),

    /// A survey point has a NaN or infinite ordinate.
    #[error("Survey point {index} is not finite")]
    NonFinite { index: usize },

    /// Two survey points share the same (x, y).
    #[error("Survey point {index} duplicates position ({x}, {y})")]
    DuplicatePoint { index: usize, x: f64, y: f64 },

    /// All survey points lie on one line.
    #[error("Survey points are collinear")]
    Collinear,

    /// The triangulation backend rejected a point.
    #[error("Triangulation failed: {0}")]
    Triangulation(String),

    /// A query against the surface failed.
    #[error("Design surface query failed: {0}")]
    Query(String),
}

/// Design elevation lookup.
pub trait DesignSurface: Send + Sync {
    /// Design elevation at (x, y). `Ok(None)` means the point is outside the surface.
    fn elevation_at(&self, x: f64, y: f64) -> Result<Option<f64>, SurfaceError>;
}

/// Builds a [`DesignSurface`] from survey points.
pub trait DesignSurfaceBuilder: Send + Sync {
    fn build(&self, points: &[SurveyPoint]) -> Result<Box<dyn DesignSurface>, SurfaceError>;
}

impl<T: DesignSurface + ?Sized> DesignSurface for Box<T> {
    fn elevation_at(&self, x: f64, y: f64) -> Result<Option<f64>, SurfaceError> {
        (**self).elevation_at(x, y)
    }
}

struct SurveyVertex {
    position: Point2<f64>,
    z: f64,
}

impl HasPosition for SurveyVertex {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        self.position
    }
}

/// Linear interpolation over the Delaunay triangulation of the survey points.
/// Points outside the convex hull are not covered.
pub struct DelaunaySurface {
    triangulation: DelaunayTriangulation<SurveyVertex>,
}

impl std::fmt::Debug for DelaunaySurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelaunaySurface")
            .field("vertices", &self.triangulation.num_vertices())
            .field("triangles", &self.triangulation.num_inner_faces())
            .finish()
    }
}

impl DelaunaySurface {
    pub fn from_points(points: &[SurveyPoint]) -> Result<Self, SurfaceError> {
        if points.len() < 3 {
            return Err(SurfaceError::TooFewPoints(points.len()));
        }

        let mut triangulation = DelaunayTriangulation::<SurveyVertex>::new();
        for (index, p) in points.iter().enumerate() {
            if !p.x.is_finite() || !p.y.is_finite() || !p.z.is_finite() {
                return Err(SurfaceError::NonFinite { index });
            }
            let before = triangulation.num_vertices();
            triangulation
                .insert(SurveyVertex {
                    position: Point2::new(p.x, p.y),
                    z: p.z,
                })
                .map_err(|e| SurfaceError::Triangulation(format!("point {}: {:?}", index, e)))?;
            // spade replaces a vertex at an existing position instead of adding one
            if triangulation.num_vertices() == before {
                return Err(SurfaceError::DuplicatePoint { index, x: p.x, y: p.y });
            }
        }

        if is_degenerate(&triangulation, points) {
            return Err(SurfaceError::Collinear);
        }

        debug!(
            vertices = triangulation.num_vertices(),
            triangles = triangulation.num_inner_faces(),
            "triangulated design surface"
        );
        Ok(Self { triangulation })
    }

    pub fn vertex_count(&self) -> usize {
        self.triangulation.num_vertices()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangulation.num_inner_faces()
    }
}

impl DesignSurface for DelaunaySurface {
    fn elevation_at(&self, x: f64, y: f64) -> Result<Option<f64>, SurfaceError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(SurfaceError::Query(format!("non-finite position ({}, {})", x, y)));
        }
        Ok(self
            .triangulation
            .barycentric()
            .interpolate(|v| v.data().z, Point2::new(x, y)))
    }
}

/// Largest triangle area, relative to the squared extent of the survey, at
/// which the triangulation still counts as a line.
const DEGENERATE_AREA_RATIO: f64 = 1e-10;

/// True when no triangle spans a usable area. Points collinear on paper are
/// rarely collinear in f64, so spade may still build sliver triangles.
fn is_degenerate(triangulation: &DelaunayTriangulation<SurveyVertex>, points: &[SurveyPoint]) -> bool {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }
    let extent = (max_x - min_x).max(max_y - min_y);
    let tolerance = DEGENERATE_AREA_RATIO * extent * extent;

    let largest = triangulation
        .inner_faces()
        .map(|face| {
            let [a, b, c] = face.vertices().map(|v| v.position());
            ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)).abs() / 2.0
        })
        .fold(0.0, f64::max);
    largest <= tolerance
}

/// Builds [`DelaunaySurface`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelaunaySurfaceBuilder;

impl DesignSurfaceBuilder for DelaunaySurfaceBuilder {
    fn build(&self, points: &[SurveyPoint]) -> Result<Box<dyn DesignSurface>, SurfaceError> {
        Ok(Box::new(DelaunaySurface::from_points(points)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn plane(points: &[(f64, f64)]) -> Vec<SurveyPoint> {
        // z = 100 + 2x + 3y
        points
            .iter()
            .map(|&(x, y)| SurveyPoint::new(x, y, 100.0 + 2.0 * x + 3.0 * y))
            .collect()
    }

    #[test]
    fn test_interpolates_plane_exactly() {
        let surface =
            DelaunaySurface::from_points(&plane(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)])).unwrap();
        assert_eq!(surface.vertex_count(), 4);
        assert_eq!(surface.triangle_count(), 2);

        let z = surface.elevation_at(0.25, 0.5).unwrap().unwrap();
        assert_relative_eq!(z, 100.0 + 0.5 + 1.5, epsilon = 1e-9);

        // Vertices reproduce their own elevation
        let z = surface.elevation_at(1.0, 1.0).unwrap().unwrap();
        assert_relative_eq!(z, 105.0, epsilon = 1e-9);
    }

    #[test]
    fn test_outside_hull_is_uncovered() {
        let surface = DelaunaySurface::from_points(&plane(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)])).unwrap();
        assert_eq!(surface.elevation_at(0.9, 0.9).unwrap(), None);
        assert_eq!(surface.elevation_at(-0.1, 0.5).unwrap(), None);
        assert!(surface.elevation_at(0.2, 0.2).unwrap().is_some());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            DelaunaySurface::from_points(&plane(&[(0.0, 0.0), (1.0, 0.0)])),
            Err(SurfaceError::TooFewPoints(2))
        ));

        let collinear = plane(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        assert!(matches!(
            DelaunaySurface::from_points(&collinear),
            Err(SurfaceError::Collinear)
        ));

        let mut duplicate = plane(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
        duplicate.push(SurveyPoint::new(1.0, 0.0, 7.0));
        assert!(matches!(
            DelaunaySurface::from_points(&duplicate),
            Err(SurfaceError::DuplicatePoint { index: 3, .. })
        ));

        // Collinear on paper but not exactly in f64
        let geographic = vec![
            SurveyPoint::new(104.0, 30.0, 1.0),
            SurveyPoint::new(104.1, 30.1, 1.0),
            SurveyPoint::new(104.2, 30.2, 1.0),
        ];
        assert!(matches!(
            DelaunaySurface::from_points(&geographic),
            Err(SurfaceError::Collinear)
        ));

        let mut nan = plane(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
        nan[0].z = f64::NAN;
        assert!(matches!(
            DelaunaySurface::from_points(&nan),
            Err(SurfaceError::NonFinite { index: 0 })
        ));
    }

    #[test]
    fn test_thin_but_real_triangle_is_accepted() {
        // About 1 m wide over 100 m at site scale
        let thin = plane(&[(104.0, 30.0), (104.001, 30.0), (104.0005, 30.00001)]);
        let surface = DelaunaySurface::from_points(&thin).unwrap();
        assert_eq!(surface.triangle_count(), 1);
    }

    #[test]
    fn test_builder_returns_trait_object() {
        let surface = DelaunaySurfaceBuilder
            .build(&plane(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]))
            .unwrap();
        assert!(surface.elevation_at(0.1, 0.1).unwrap().is_some());
        assert!(matches!(
            surface.elevation_at(f64::NAN, 0.0),
            Err(SurfaceError::Query(_))
        ));
    }
}

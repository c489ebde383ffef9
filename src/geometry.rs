//! Plane geometry used by expressions and the vertex placement rule.

/// A 2-dimensional vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean length.
    pub fn norm(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Dot product.
    pub fn dot(self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Perpendicular vector, rotated 90 degrees counter-clockwise.
    pub fn perp_left(self) -> Vec2 {
        Vec2::new(-self.y, self.x)
    }

    /// Perpendicular vector, rotated 90 degrees clockwise.
    pub fn perp_right(self) -> Vec2 {
        Vec2::new(self.y, -self.x)
    }

    /// Rotate by `angle` radians, counter-clockwise.
    pub fn rotate(self, angle: f64) -> Vec2 {
        let (sin, cos) = angle.sin_cos();
        Vec2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    pub fn scale(self, factor: f64) -> Vec2 {
        Vec2::new(self.x * factor, self.y * factor)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }
}

/// Angle between two vectors in radians, in `[0, pi]`.
///
/// Returns 0.0 when either vector has zero length.
pub fn angle_between(a: Vec2, b: Vec2) -> f64 {
    let denom = a.norm() * b.norm();
    if denom == 0.0 {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}

/// Summary of a point cloud: barycenter, principal orientation, and extent.
///
/// Used by the placement rule to transplant daughter-relative coordinates
/// into host space.
#[derive(Debug, Clone, Copy)]
pub struct PointSummary {
    pub barycenter: Vec2,
    /// Orientation of the principal axis in radians. 0.0 for degenerate
    /// clouds (fewer than two distinct points).
    pub orientation: f64,
    /// Maximum distance of any point from the barycenter. 0.0 for a single
    /// point.
    pub extent: f64,
}

impl PointSummary {
    /// Summarize a set of points.
    ///
    /// The principal orientation comes from a least-squares line fit,
    /// regressing along whichever axis has the larger spread so near-vertical
    /// clouds are not degenerate.
    pub fn of(points: &[Vec2]) -> PointSummary {
        if points.is_empty() {
            return PointSummary {
                barycenter: Vec2::default(),
                orientation: 0.0,
                extent: 0.0,
            };
        }
        let n = points.len() as f64;
        let mut bary = Vec2::default();
        for p in points {
            bary = bary + *p;
        }
        bary = bary.scale(1.0 / n);

        let mut sxx = 0.0;
        let mut syy = 0.0;
        let mut sxy = 0.0;
        let mut extent: f64 = 0.0;
        for p in points {
            let d = *p - bary;
            sxx += d.x * d.x;
            syy += d.y * d.y;
            sxy += d.x * d.y;
            extent = extent.max(d.norm());
        }

        let orientation = if sxx == 0.0 && syy == 0.0 {
            0.0
        } else if sxx >= syy {
            // y = a*x fit through the barycenter
            (sxy / sxx).atan()
        } else {
            // x = a*y fit, mapped back to an angle from the x axis
            std::f64::consts::FRAC_PI_2 - (sxy / syy).atan()
        };

        PointSummary {
            barycenter: bary,
            orientation,
            extent,
        }
    }
}

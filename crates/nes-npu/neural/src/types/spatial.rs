// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Spatial types for compartment geometry (micrometres)

use serde::{Deserialize, Serialize};

use super::error::{require_finite, require_positive, NeuralResult};

/// 3D point or vector in micrometres
///
/// Serialized as a plain `[x, y, z]` array.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vec3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3D {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn midpoint(&self, other: &Vec3D) -> Vec3D {
        Vec3D::new(
            (self.x + other.x) / 2.0,
            (self.y + other.y) / 2.0,
            (self.z + other.z) / 2.0,
        )
    }

    pub fn distance(&self, other: &Vec3D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Arithmetic mean of a set of points; `None` when the set is empty.
    pub fn centroid<'a, I>(points: I) -> Option<Vec3D>
    where
        I: IntoIterator<Item = &'a Vec3D>,
    {
        let mut sum = Vec3D::default();
        let mut count = 0usize;
        for p in points {
            sum.x += p.x;
            sum.y += p.y;
            sum.z += p.z;
            count += 1;
        }
        if count == 0 {
            return None;
        }
        let n = count as f64;
        Some(Vec3D::new(sum.x / n, sum.y / n, sum.z / n))
    }

    fn validate(&self, name: &str) -> NeuralResult<()> {
        require_finite(name, self.x)?;
        require_finite(name, self.y)?;
        require_finite(name, self.z)
    }
}

impl From<[f64; 3]> for Vec3D {
    fn from(v: [f64; 3]) -> Self {
        Vec3D::new(v[0], v[1], v[2])
    }
}

impl From<Vec3D> for [f64; 3] {
    fn from(v: Vec3D) -> Self {
        [v.x, v.y, v.z]
    }
}

/// Geometric primitive a compartment occupies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Sphere {
        center_um: Vec3D,
        radius_um: f64,
    },
    Cylinder {
        point1_um: Vec3D,
        point1_radius_um: f64,
        point2_um: Vec3D,
        point2_radius_um: f64,
    },
}

impl Shape {
    pub fn sphere(center_um: Vec3D, radius_um: f64) -> NeuralResult<Self> {
        center_um.validate("Center_um")?;
        require_positive("Radius_um", radius_um)?;
        Ok(Shape::Sphere {
            center_um,
            radius_um,
        })
    }

    pub fn cylinder(
        point1_um: Vec3D,
        point1_radius_um: f64,
        point2_um: Vec3D,
        point2_radius_um: f64,
    ) -> NeuralResult<Self> {
        point1_um.validate("Point1Position_um")?;
        point2_um.validate("Point2Position_um")?;
        require_positive("Point1Radius_um", point1_radius_um)?;
        require_positive("Point2Radius_um", point2_radius_um)?;
        Ok(Shape::Cylinder {
            point1_um,
            point1_radius_um,
            point2_um,
            point2_radius_um,
        })
    }

    /// Geometric center of the shape
    pub fn center(&self) -> Vec3D {
        match self {
            Shape::Sphere { center_um, .. } => *center_um,
            Shape::Cylinder {
                point1_um,
                point2_um,
                ..
            } => point1_um.midpoint(point2_um),
        }
    }

    /// Volume in cubic micrometres (cylinders are treated as conical frustums)
    pub fn volume_um3(&self) -> f64 {
        use std::f64::consts::PI;
        match self {
            Shape::Sphere { radius_um, .. } => 4.0 / 3.0 * PI * radius_um.powi(3),
            Shape::Cylinder {
                point1_um,
                point1_radius_um: r1,
                point2_um,
                point2_radius_um: r2,
            } => {
                let h = point1_um.distance(point2_um);
                PI * h * (r1 * r1 + r1 * r2 + r2 * r2) / 3.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cylinder_center_is_midpoint() {
        let c = Shape::cylinder(
            Vec3D::new(0.0, 0.0, 0.0),
            1.0,
            Vec3D::new(10.0, 0.0, 0.0),
            1.0,
        )
        .unwrap();
        assert_eq!(c.center(), Vec3D::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_sphere_rejects_non_positive_radius() {
        assert!(Shape::sphere(Vec3D::default(), 0.0).is_err());
        assert!(Shape::sphere(Vec3D::new(f64::NAN, 0.0, 0.0), 1.0).is_err());
    }

    #[test]
    fn test_vec3d_json_is_array() {
        let v: Vec3D = serde_json::from_str("[1.0, 2.0, 3.5]").unwrap();
        assert_eq!(v, Vec3D::new(1.0, 2.0, 3.5));
        assert_eq!(serde_json::to_string(&v).unwrap(), "[1.0,2.0,3.5]");
    }

    #[test]
    fn test_centroid() {
        let pts = [Vec3D::new(0.0, 0.0, 0.0), Vec3D::new(2.0, 4.0, 6.0)];
        assert_eq!(Vec3D::centroid(pts.iter()), Some(Vec3D::new(1.0, 2.0, 3.0)));
        assert_eq!(Vec3D::centroid(std::iter::empty()), None);
    }
}

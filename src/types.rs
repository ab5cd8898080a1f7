//! # Core Types
//!
//! Geometric primitives shared by the detector, distributions and records.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// VECTOR TYPES (3D)
// ============================================================================

/// 3D vector for positions and directions (meters / unit vectors)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Create new vector
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0 }
    }

    /// Unit vectors
    pub const fn unit_x() -> Self { Self::new(1.0, 0.0, 0.0) }
    pub const fn unit_y() -> Self { Self::new(0.0, 1.0, 0.0) }
    pub const fn unit_z() -> Self { Self::new(0.0, 0.0, 1.0) }

    /// Magnitude squared
    pub fn mag_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Magnitude
    pub fn mag(&self) -> f64 {
        self.mag_squared().sqrt()
    }

    /// Normalize to unit vector
    pub fn normalize(&self) -> Self {
        let m = self.mag();
        if m > 1e-15 {
            Self::new(self.x / m, self.y / m, self.z / m)
        } else {
            Self::zero()
        }
    }

    /// Dot product
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product
    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Scale by scalar
    pub fn scale(&self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    /// Distance between two points
    pub fn distance(&self, other: &Self) -> f64 {
        (*self - *other).mag()
    }

    /// Component by axis index (0 = x, 1 = y, 2 = z)
    pub fn axis(&self, i: usize) -> f64 {
        match i {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Deflect this unit direction by polar cosine `mu` and azimuth `phi`.
    ///
    /// The result is a unit vector making angle acos(mu) with `self`.
    pub fn deflect(&self, mu: f64, phi: f64) -> Self {
        let mu = mu.clamp(-1.0, 1.0);
        let sin_theta = (1.0 - mu * mu).sqrt();
        let (u, v, w) = (self.x, self.y, self.z);

        let out = if w.abs() < 0.999 {
            let a = (1.0 - w * w).sqrt();
            Self::new(
                mu * u + sin_theta * (u * w * phi.cos() - v * phi.sin()) / a,
                mu * v + sin_theta * (v * w * phi.cos() + u * phi.sin()) / a,
                mu * w - sin_theta * phi.cos() * a,
            )
        } else {
            // Nearly along z
            Self::new(
                sin_theta * phi.cos(),
                sin_theta * phi.sin(),
                mu * w.signum(),
            )
        };

        out.normalize()
    }

    /// Two unit vectors spanning the plane perpendicular to `self`
    pub fn orthonormal_basis(&self) -> (Self, Self) {
        let n = self.normalize();
        let helper = if n.x.abs() < 0.9 { Self::unit_x() } else { Self::unit_y() };
        let e1 = n.cross(&helper).normalize();
        let e2 = n.cross(&e1);
        (e1, e2)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl std::ops::Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }
}

impl std::ops::Mul<Vec3> for f64 {
    type Output = Vec3;
    fn mul(self, v: Vec3) -> Vec3 {
        Vec3::new(self * v.x, self * v.y, self * v.z)
    }
}

impl std::ops::AddAssign for Vec3 {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6e}, {:.6e}, {:.6e})", self.x, self.y, self.z)
    }
}

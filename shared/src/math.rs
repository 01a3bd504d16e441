//! Rigid transform math for bind poses and animation keyframes
//!
//! [`TMatrix`] is a 4x4 column-major matrix that is always a concatenation of
//! translations and rotations. Scale and shear are not representable; the
//! cheap [`TMatrix::inverse`] relies on that.
//!
//! [`Quaternion::to_matrix`] and [`TMatrix::get_rotation`] follow the
//! convention of the RW4 joint pose records: the rotation block produced for
//! a quaternion is the transpose of the textbook form. Callers that export to
//! other formats negate or invert at specific sites; keep those call sites as
//! they are.

use std::ops::{Mul, Neg};

use glam::{DMat4, DVec3};
use tracing::warn;

/// Direction in 3D space (translation ignored when transformed)
pub type Vector = DVec3;

/// Position in 3D space (translation applied when transformed)
pub type Point = DVec3;

/// Tolerance for the per-column unit length check
const SCALE_TOLERANCE: f64 = 1e-4;

/// Accepted determinant range for the rotation block
const DET_MIN: f64 = 0.99999;
const DET_MAX: f64 = 1.00001;

/// Squared distance above which the post-extraction self-check warns
const SELF_CHECK_TOLERANCE: f64 = 1e-4;

/// Errors raised when a matrix is not a translation·rotation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransformError {
    #[error("not a rotation+translation: bottom row is {row:?}")]
    NotRigid { row: [f64; 4] },
    #[error("not a rotation+translation: column {column} has squared length {length_sq}")]
    Scaled { column: usize, length_sq: f64 },
    #[error("not a rotation+translation: determinant {det}")]
    NotSpecialOrthogonal { det: f64 },
}

impl TransformError {
    /// Short machine-readable code used in failure tallies
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotRigid { .. } => "XF001",
            Self::Scaled { .. } => "XF002",
            Self::NotSpecialOrthogonal { .. } => "XF003",
        }
    }
}

// ============================================================================
// TMatrix
// ============================================================================

/// Translation·rotation matrix, column-major
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TMatrix(DMat4);

impl Default for TMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl TMatrix {
    pub const IDENTITY: Self = Self(DMat4::IDENTITY);

    /// Build from 16 column-major values.
    ///
    /// The last element is forced to 1; RW4 inverse bind matrices store 0
    /// there.
    pub fn from_cols_array(m: &[f64; 16]) -> Self {
        let mut m = *m;
        m[15] = 1.0;
        Self(DMat4::from_cols_array(&m))
    }

    /// Build from 16 column-major `f32` values as stored in a file
    pub fn from_f32_array(m: &[f32; 16]) -> Self {
        Self::from_cols_array(&m.map(f64::from))
    }

    pub fn to_cols_array(&self) -> [f64; 16] {
        self.0.to_cols_array()
    }

    pub fn translation(v: Vector) -> Self {
        Self(DMat4::from_translation(v))
    }

    /// Copy of this matrix with `v` added to the translation column
    pub fn translated(&self, v: Vector) -> Self {
        let mut m = self.0;
        m.w_axis.x += v.x;
        m.w_axis.y += v.y;
        m.w_axis.z += v.z;
        Self(m)
    }

    /// First three rows of column `c`; column 3 is the translation
    pub fn column(&self, c: usize) -> Vector {
        self.0.col(c).truncate()
    }

    pub fn transform_vector(&self, v: Vector) -> Vector {
        self.column(0) * v.x + self.column(1) * v.y + self.column(2) * v.z
    }

    pub fn transform_point(&self, p: Point) -> Point {
        self.transform_vector(p) + self.column(3)
    }

    /// Inverse of a translation·rotation: transposed rotation, and the
    /// translation rotated back and negated. Not valid for general affine
    /// matrices.
    pub fn inverse(&self) -> Self {
        let m = self.to_cols_array();
        let mut res = [0.0; 16];
        for i in 0..3 {
            for j in 0..3 {
                res[i * 4 + j] = m[i + j * 4];
            }
        }
        res[15] = 1.0;
        let rot = Self::from_cols_array(&res);
        let t = rot.transform_vector(self.column(3));
        res[12] = -t.x;
        res[13] = -t.y;
        res[14] = -t.z;
        Self::from_cols_array(&res)
    }

    /// Extract the rotation of this translation·rotation as a quaternion.
    ///
    /// Fails when the bottom row is not `[0 0 0 1]`, when a column is not of
    /// unit length, or when the rotation block is not special orthogonal.
    pub fn get_rotation(&self) -> Result<Quaternion, TransformError> {
        let m = self.to_cols_array();
        if m[3] != 0.0 || m[7] != 0.0 || m[11] != 0.0 || m[15] != 1.0 {
            return Err(TransformError::NotRigid {
                row: [m[3], m[7], m[11], m[15]],
            });
        }

        for i in 0..3 {
            let length_sq = m[i] * m[i] + m[4 + i] * m[4 + i] + m[8 + i] * m[8 + i];
            if (length_sq - 1.0).abs() > SCALE_TOLERANCE {
                return Err(TransformError::Scaled {
                    column: i,
                    length_sq,
                });
            }
        }

        let mut r = [0.0; 9];
        for i in 0..3 {
            for j in 0..3 {
                r[i * 3 + j] = m[i * 4 + j];
            }
        }

        let det = r[0] * (r[4] * r[8] - r[7] * r[5]) - r[1] * (r[3] * r[8] - r[6] * r[5])
            + r[2] * (r[3] * r[7] - r[6] * r[4]);
        if !(DET_MIN..=DET_MAX).contains(&det) {
            return Err(TransformError::NotSpecialOrthogonal { det });
        }

        let mut rotation = quaternion_from_rotation_block(&r);

        let tv = Vector::new(1.0, 2.0, 3.0);
        let tp = (rotation.to_matrix().inverse() * *self).transform_vector(tv);
        if (tp - tv).length_squared() > SELF_CHECK_TOLERANCE {
            warn!(
                drift = (tp - tv).length_squared(),
                "GetRotation error: extracted quaternion does not reproduce the rotation"
            );
        }

        rotation.renormalize();
        Ok(rotation)
    }
}

/// Branch on the trace, then on the largest diagonal element, so the divisor
/// never gets close to zero.
fn quaternion_from_rotation_block(r: &[f64; 9]) -> Quaternion {
    let trace = r[0] + r[4] + r[8];
    if trace > 0.0 {
        let s = 0.5 / (trace + 1.0).sqrt();
        Quaternion {
            w: 0.25 / s,
            x: (r[7] - r[5]) * s,
            y: (r[2] - r[6]) * s,
            z: (r[3] - r[1]) * s,
        }
    } else if r[0] > r[4] && r[0] > r[8] {
        let s = (1.0 + r[0] - r[4] - r[8]).sqrt();
        let x = s * 0.5;
        let s = 0.5 / s;
        Quaternion {
            x,
            w: (r[7] - r[5]) * s,
            y: (r[1] + r[3]) * s,
            z: (r[2] + r[6]) * s,
        }
    } else if r[4] > r[8] {
        let s = (1.0 + r[4] - r[0] - r[8]).sqrt();
        let y = s * 0.5;
        let s = 0.5 / s;
        Quaternion {
            y,
            w: (r[2] - r[6]) * s,
            x: (r[1] + r[3]) * s,
            z: (r[5] + r[7]) * s,
        }
    } else {
        let s = (1.0 + r[8] - r[0] - r[4]).sqrt();
        let z = s * 0.5;
        let s = 0.5 / s;
        Quaternion {
            z,
            w: (r[3] - r[1]) * s,
            x: (r[2] + r[6]) * s,
            y: (r[5] + r[7]) * s,
        }
    }
}

impl Mul for TMatrix {
    type Output = TMatrix;

    fn mul(self, rhs: TMatrix) -> TMatrix {
        TMatrix(self.0 * rhs.0)
    }
}

// ============================================================================
// Quaternion
// ============================================================================

/// Rotation quaternion with scalar part `w`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Rotation of `angle` radians about a unit axis
    pub fn new(angle: f64, unit_axis: Vector) -> Self {
        let (sa, ca) = (angle * 0.5).sin_cos();
        Self {
            x: unit_axis.x * sa,
            y: unit_axis.y * sa,
            z: unit_axis.z * sa,
            w: ca,
        }
    }

    pub fn angle(&self) -> f64 {
        self.w.acos() * 2.0
    }

    /// Rotation axis; the raw vector part when the angle is near zero
    pub fn axis(&self) -> Vector {
        let mut sin_a = (1.0 - self.w * self.w).sqrt();
        if sin_a < 1e-5 {
            sin_a = 1.0;
        }
        Vector::new(self.x / sin_a, self.y / sin_a, self.z / sin_a)
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// Scale back to unit length so `angle` never sees `w > 1`
    pub fn renormalize(&mut self) {
        let iw = 1.0 / self.length();
        self.x *= iw;
        self.y *= iw;
        self.z *= iw;
        self.w *= iw;
    }

    pub fn to_matrix(&self) -> TMatrix {
        let Self { x, y, z, w } = *self;
        let (xx, xy, xz, xw) = (x * x, x * y, x * z, x * w);
        let (yy, yz, yw) = (y * y, y * z, y * w);
        let (zz, zw) = (z * z, z * w);
        TMatrix::from_cols_array(&[
            1.0 - 2.0 * (yy + zz),
            2.0 * (xy - zw),
            2.0 * (xz + yw),
            0.0,
            2.0 * (xy + zw),
            1.0 - 2.0 * (xx + zz),
            2.0 * (yz - xw),
            0.0,
            2.0 * (xz - yw),
            2.0 * (yz + xw),
            1.0 - 2.0 * (xx + yy),
            0.0,
            0.0,
            0.0,
            0.0,
            1.0,
        ])
    }
}

/// Conjugate: negates the vector part
impl Neg for Quaternion {
    type Output = Quaternion;

    fn neg(self) -> Quaternion {
        Quaternion {
            x: -self.x,
            y: -self.y,
            z: -self.z,
            w: self.w,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    fn random_vector(rng: &mut Pcg64) -> Vector {
        Vector::new(
            rng.random::<f64>() - 0.5,
            rng.random::<f64>() - 0.5,
            rng.random::<f64>() - 0.5,
        )
    }

    fn assert_close(a: Vector, b: Vector) {
        assert!(
            (a - b).length_squared() < 1e-8,
            "expected {b:?}, got {a:?}"
        );
    }

    // ========================================================================
    // TMatrix
    // ========================================================================

    #[test]
    fn test_constructor_forces_homogeneous_corner() {
        let mut m = [0.0; 16];
        m[0] = 1.0;
        m[5] = 1.0;
        m[10] = 1.0;
        let t = TMatrix::from_cols_array(&m);
        assert_eq!(t, TMatrix::IDENTITY);
    }

    #[test]
    fn test_translation_and_column() {
        let t = TMatrix::translation(Vector::new(1.0, 2.0, 3.0));
        assert_eq!(t.column(3), Vector::new(1.0, 2.0, 3.0));
        assert_eq!(t.transform_point(Point::ZERO), Point::new(1.0, 2.0, 3.0));
        assert_eq!(t.transform_vector(Vector::X), Vector::X);
        let moved = t.translated(Vector::new(1.0, 1.0, 1.0));
        assert_eq!(moved.column(3), Vector::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn test_mul_applies_right_then_left() {
        let rot = Quaternion::new(std::f64::consts::FRAC_PI_2, Vector::Z).to_matrix();
        let t = TMatrix::translation(Vector::new(10.0, 0.0, 0.0));
        let p = (t * rot).transform_point(Point::new(1.0, 0.0, 0.0));
        let expected = Point::new(10.0, 0.0, 0.0) + rot.transform_vector(Vector::X);
        assert_close(p, expected);
    }

    #[test]
    fn test_inverse_round_trips_points() {
        let mut rng = Pcg64::seed_from_u64(7);
        for _ in 0..100 {
            let axis = random_vector(&mut rng).normalize();
            let q = Quaternion::new(rng.random::<f64>() * std::f64::consts::PI, axis);
            let m = TMatrix::translation(random_vector(&mut rng) * 10.0) * q.to_matrix();
            let p = random_vector(&mut rng) * 10.0;
            assert_close((m.inverse() * m).transform_point(p), p);
            assert_close(m.inverse().transform_point(m.transform_point(p)), p);
        }
    }

    // ========================================================================
    // get_rotation
    // ========================================================================

    #[test]
    fn test_get_rotation_random_samples() {
        let mut rng = Pcg64::seed_from_u64(0x5eed);
        for _ in 0..1000 {
            let u = random_vector(&mut rng).normalize();
            let t1 = random_vector(&mut rng) * 10.0;
            let t2 = random_vector(&mut rng) * 10.0;
            let p1 = random_vector(&mut rng) * 10.0;

            let q = Quaternion::new(rng.random::<f64>() * std::f64::consts::PI, u);
            let m = q.to_matrix();
            let mt = TMatrix::translation(t1) * m * TMatrix::translation(t2);
            let m2 = mt.get_rotation().unwrap().to_matrix();

            let d = m.transform_point(p1) - m2.transform_point(p1);
            assert!(d.length_squared() <= 1e-4, "drift {}", d.length_squared());
        }
    }

    #[test]
    fn test_get_rotation_near_pi() {
        let q = Quaternion::new(
            3.1414934204542249,
            Vector::new(-0.920567453, -0.390583634, 0.0),
        );
        let r = q.to_matrix().get_rotation().unwrap();
        assert!((r.length() - 1.0).abs() < 1e-9);
        assert!(r.angle().is_finite());
        assert!((r.angle() - 3.1414934204542249).abs() < 1e-3);

        let p = Point::new(1.0, 2.0, 3.0);
        let d = q.to_matrix().transform_point(p) - r.to_matrix().transform_point(p);
        assert!(d.length_squared() < 1e-4);
    }

    #[test]
    fn test_get_rotation_identity() {
        let r = TMatrix::IDENTITY.get_rotation().unwrap();
        assert_eq!(r, Quaternion::IDENTITY);
        assert_eq!(r.angle(), 0.0);
    }

    #[test]
    fn test_get_rotation_rejects_projective_row() {
        let mut m = TMatrix::IDENTITY.to_cols_array();
        m[3] = 0.5;
        let err = TMatrix::from_cols_array(&m).get_rotation().unwrap_err();
        assert_eq!(err.code(), "XF001");
    }

    #[test]
    fn test_get_rotation_rejects_scale() {
        let mut m = TMatrix::IDENTITY.to_cols_array();
        m[5] = 2.0;
        let err = TMatrix::from_cols_array(&m).get_rotation().unwrap_err();
        assert_eq!(err.code(), "XF002");
    }

    #[test]
    fn test_get_rotation_rejects_reflection() {
        let mut m = TMatrix::IDENTITY.to_cols_array();
        m[10] = -1.0;
        let err = TMatrix::from_cols_array(&m).get_rotation().unwrap_err();
        assert!(matches!(err, TransformError::NotSpecialOrthogonal { .. }));
        assert_eq!(err.code(), "XF003");
    }

    // ========================================================================
    // Quaternion
    // ========================================================================

    #[test]
    fn test_axis_angle() {
        let q = Quaternion::new(1.0, Vector::Y);
        assert!((q.angle() - 1.0).abs() < 1e-12);
        assert_close(q.axis(), Vector::Y);
        assert_eq!(Quaternion::IDENTITY.axis(), Vector::ZERO);
    }

    #[test]
    fn test_neg_conjugates() {
        let q = Quaternion::new(0.5, Vector::X);
        let c = -q;
        assert_eq!(c.w, q.w);
        assert_eq!(c.x, -q.x);
        let p = Point::new(0.0, 1.0, 0.0);
        let back = c.to_matrix().transform_point(q.to_matrix().transform_point(p));
        assert_close(back, p);
    }

    #[test]
    fn test_renormalize() {
        let mut q = Quaternion {
            x: 0.0,
            y: 0.0,
            z: 2.0,
            w: 2.0,
        };
        q.renormalize();
        assert!((q.length() - 1.0).abs() < 1e-12);
    }
}

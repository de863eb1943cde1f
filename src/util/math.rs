//! Math re-exports and matrix helpers used by the exporter.

pub use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

/// Elements of `m` in row-major order.
///
/// glam stores matrices column-major; scene files expect rows.
#[inline]
pub fn row_major(m: &Mat4) -> [f32; 16] {
    m.transpose().to_cols_array()
}

/// Build a matrix from 16 row-major elements.
#[inline]
pub fn from_row_major(rows: &[f32; 16]) -> Mat4 {
    Mat4::from_cols_array(rows).transpose()
}

/// Raise a transform to a non-negative integer power.
pub fn mat4_pow(m: &Mat4, exp: u32) -> Mat4 {
    let mut result = Mat4::IDENTITY;
    let mut base = *m;
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result *= base;
        }
        base *= base;
        e >>= 1;
    }
    result
}

/// Whether `m` has a finite inverse. Small uniform scales are invertible.
#[inline]
pub fn is_invertible(m: &Mat4) -> bool {
    let det = m.determinant();
    det != 0.0 && det.is_finite() && m.inverse().is_finite()
}

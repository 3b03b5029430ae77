//! Spline and quaternion helpers for camera interpolation.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// Uniform Catmull-Rom interpolation of one scalar channel.
///
/// Passes through `p1` at `mu = 0` and `p2` at `mu = 1`, with tangents
/// estimated from the two neighbours.
pub fn catmull_rom(p0: f32, p1: f32, p2: f32, p3: f32, mu: f32) -> f32 {
    let mu2 = mu * mu;
    let mu3 = mu2 * mu;

    0.5 * (2.0 * p1
        + (p2 - p0) * mu
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * mu2
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * mu3)
}

/// Componentwise Catmull-Rom over a position.
pub fn catmull_rom_vec3(
    p0: &Vector3<f32>,
    p1: &Vector3<f32>,
    p2: &Vector3<f32>,
    p3: &Vector3<f32>,
    mu: f32,
) -> Vector3<f32> {
    Vector3::new(
        catmull_rom(p0.x, p1.x, p2.x, p3.x, mu),
        catmull_rom(p0.y, p1.y, p2.y, p3.y, mu),
        catmull_rom(p0.z, p1.z, p2.z, p3.z, mu),
    )
}

/// Catmull-Rom over the raw quaternion coefficients, renormalised back
/// onto the unit sphere. Not a geodesic blend, but it is smooth and it
/// matches the keyframes exactly, which is what a camera path wants.
pub fn catmull_rom_quat(
    q0: &UnitQuaternion<f32>,
    q1: &UnitQuaternion<f32>,
    q2: &UnitQuaternion<f32>,
    q3: &UnitQuaternion<f32>,
    mu: f32,
) -> UnitQuaternion<f32> {
    let c0 = q0.coords;
    let c1 = q1.coords;
    let c2 = q2.coords;
    let c3 = q3.coords;

    let blended = Quaternion::from_vector(nalgebra::Vector4::new(
        catmull_rom(c0.x, c1.x, c2.x, c3.x, mu),
        catmull_rom(c0.y, c1.y, c2.y, c3.y, mu),
        catmull_rom(c0.z, c1.z, c2.z, c3.z, mu),
        catmull_rom(c0.w, c1.w, c2.w, c3.w, mu),
    ));
    UnitQuaternion::new_normalize(blended)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_scalar_endpoints() {
        assert!((catmull_rom(0.0, 1.0, 2.0, 3.0, 0.0) - 1.0).abs() < EPS);
        assert!((catmull_rom(0.0, 1.0, 2.0, 3.0, 1.0) - 2.0).abs() < EPS);
    }

    #[test]
    fn test_scalar_linear_segment_is_linear() {
        // Evenly spaced collinear points reduce to linear interpolation.
        let v = catmull_rom(0.0, 1.0, 2.0, 3.0, 0.5);
        assert!((v - 1.5).abs() < EPS);
    }

    #[test]
    fn test_vec3_endpoints() {
        let p0 = Vector3::new(0.0, 0.0, 0.0);
        let p1 = Vector3::new(1.0, 2.0, 3.0);
        let p2 = Vector3::new(4.0, 5.0, 6.0);
        let p3 = Vector3::new(7.0, 8.0, 9.0);

        assert!((catmull_rom_vec3(&p0, &p1, &p2, &p3, 0.0) - p1).norm() < EPS);
        assert!((catmull_rom_vec3(&p0, &p1, &p2, &p3, 1.0) - p2).norm() < EPS);
    }

    #[test]
    fn test_quat_endpoints_and_unit_length() {
        let q0 = UnitQuaternion::identity();
        let q1 = UnitQuaternion::from_euler_angles(0.0, 0.3, 0.0);
        let q2 = UnitQuaternion::from_euler_angles(0.0, 0.6, 0.0);
        let q3 = UnitQuaternion::from_euler_angles(0.0, 0.9, 0.0);

        let at0 = catmull_rom_quat(&q0, &q1, &q2, &q3, 0.0);
        let at1 = catmull_rom_quat(&q0, &q1, &q2, &q3, 1.0);
        assert!(at0.angle_to(&q1) < 1e-4);
        assert!(at1.angle_to(&q2) < 1e-4);

        let mid = catmull_rom_quat(&q0, &q1, &q2, &q3, 0.5);
        assert!((mid.coords.norm() - 1.0).abs() < EPS);
    }
}

//! Planar stress algebra and small vector helpers.
//!
//! Planar stress states are carried as pseudo-vectors (σx, σy, τxy) and
//! converted to 2×2 symmetric tensors only inside transformations. All
//! functions are pure math over fixed-size arrays.

/// Clamp bound guarding inverse trigonometric calls against floating-point
/// overshoot of the [-1, 1] domain.
const TRIG_BOUND: f64 = 0.9999;

// ─────────────────────────────────────────────────────────────
//  Guarded inverse trigonometry
// ─────────────────────────────────────────────────────────────

/// Inverse sine with the argument clamped for numerical stability.
#[inline]
pub fn arc_sin(value: f64) -> f64 {
    value.clamp(-TRIG_BOUND, TRIG_BOUND).asin()
}

/// Inverse cosine with the argument clamped for numerical stability.
#[inline]
pub fn arc_cos(value: f64) -> f64 {
    value.clamp(-TRIG_BOUND, TRIG_BOUND).acos()
}

// ─────────────────────────────────────────────────────────────
//  3-vector helpers
// ─────────────────────────────────────────────────────────────

#[inline]
pub fn sub(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn norm(a: &[f64; 3]) -> f64 {
    a[0].hypot(a[1]).hypot(a[2])
}

/// Unit vector along `a`; the zero vector stays zero.
#[inline]
pub fn normalize(a: &[f64; 3]) -> [f64; 3] {
    let n = norm(a);
    if n == 0.0 {
        return [0.0; 3];
    }
    [a[0] / n, a[1] / n, a[2] / n]
}

/// Distance between two 3D points using the hypotenuse.
#[inline]
pub fn euclidean_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1]).hypot(a[2] - b[2])
}

// ─────────────────────────────────────────────────────────────
//  Planar stress pseudo-vectors
// ─────────────────────────────────────────────────────────────

/// Planar rotation matrix for an angle in radians.
pub fn planar_rotation(angle: f64) -> [[f64; 2]; 2] {
    let (s, c) = angle.sin_cos();
    [[c, -s], [s, c]]
}

/// Whether a planar stress pseudo-vector is isotropic.
///
/// Exact comparison: near-equal components still define a principal
/// direction and must not be short-circuited.
#[inline]
pub fn is_isotropic(vec: &[f64; 3]) -> bool {
    vec[0] == vec[1] && vec[2] == 0.0
}

/// Convert planar stresses from pseudo-vector to tensor form.
#[inline]
pub fn stress_vec_to_tensor(vec: &[f64; 3]) -> [[f64; 2]; 2] {
    [[vec[0], vec[2]], [vec[2], vec[1]]]
}

/// Convert planar stresses from tensor to pseudo-vector form.
#[inline]
pub fn stress_tensor_to_vec(tens: &[[f64; 2]; 2]) -> [f64; 3] {
    [tens[0][0], tens[1][1], tens[0][1]]
}

fn mat2_mul(a: &[[f64; 2]; 2], b: &[[f64; 2]; 2]) -> [[f64; 2]; 2] {
    let mut out = [[0.0; 2]; 2];
    for i in 0..2 {
        for j in 0..2 {
            out[i][j] = a[i][0] * b[0][j] + a[i][1] * b[1][j];
        }
    }
    out
}

fn mat2_transpose(a: &[[f64; 2]; 2]) -> [[f64; 2]; 2] {
    [[a[0][0], a[1][0]], [a[0][1], a[1][1]]]
}

/// Transform a planar stress pseudo-vector by a 2×2 rotation matrix.
///
/// Computes Rᵀ·S·R, or R·S·Rᵀ when `invert` is set.
pub fn transform_stress(stress: &[f64; 3], rotation: &[[f64; 2]; 2], invert: bool) -> [f64; 3] {
    let s = stress_vec_to_tensor(stress);
    let rt = mat2_transpose(rotation);
    let r = if invert {
        mat2_mul(&mat2_mul(rotation, &s), &rt)
    } else {
        mat2_mul(&mat2_mul(&rt, &s), rotation)
    };
    stress_tensor_to_vec(&r)
}

/// Transform a planar stress pseudo-vector by an angle in radians.
///
/// `invert` flips the sign of the angle, selecting the inverse transform.
pub fn transform_stress_angle(stress: &[f64; 3], angle: f64, invert: bool) -> [f64; 3] {
    let a = if invert { -angle } else { angle };
    let (sa, ca) = a.sin_cos();
    let s2a = sa * sa;
    let c2a = ca * ca;
    let sca = sa * ca;
    let [sx, sy, txy] = *stress;
    [
        c2a * sx + s2a * sy + 2.0 * sca * txy,
        s2a * sx + c2a * sy - 2.0 * sca * txy,
        -sca * sx + sca * sy + (c2a - s2a) * txy,
    ]
}

/// Principal values and eigen-angle of a planar stress pseudo-vector.
///
/// Returns ((σ1, σ2), θ) with σ1 ≥ σ2 and θ the angle from the local x-axis
/// to the σ1 direction. The isotropic case is short-circuited to θ = 0
/// since every direction is principal.
pub fn principal_stresses(vec: &[f64; 3]) -> ([f64; 2], f64) {
    if is_isotropic(vec) {
        return ([vec[0], vec[0]], 0.0);
    }
    let [sx, sy, txy] = *vec;
    let avg = 0.5 * (sx + sy);
    let radius = (0.25 * (sx - sy) * (sx - sy) + txy * txy).sqrt();
    let angle = 0.5 * (2.0 * txy).atan2(sx - sy);
    ([avg + radius, avg - radius], angle)
}

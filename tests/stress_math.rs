//! Unit tests for the planar stress algebra helpers.

use taut::math::*;

fn assert_close(a: f64, b: f64, tol: f64, what: &str) {
    assert!(
        (a - b).abs() <= tol,
        "{what}: {a} vs {b} (diff {:.3e}, tol {tol:.1e})",
        (a - b).abs(),
    );
}

fn assert_vec_close(a: &[f64; 3], b: &[f64; 3], tol: f64, what: &str) {
    for d in 0..3 {
        assert_close(a[d], b[d], tol, &format!("{what}[{d}]"));
    }
}

// ─────────────────────────────────────────────────────────────
//  Pseudo-vector ↔ tensor conversion
// ─────────────────────────────────────────────────────────────

/// The conversion is an exact involution, bit for bit.
#[test]
fn vec_tensor_involution() {
    for v in [
        [1.0, 1.0, 0.0],
        [2.5, -0.75, 0.3],
        [0.0, 0.0, 0.0],
        [-1.0, 4.0, -2.25],
    ] {
        let roundtrip = stress_tensor_to_vec(&stress_vec_to_tensor(&v));
        assert_eq!(roundtrip, v, "involution must be exact for {v:?}");
    }

    let t = stress_vec_to_tensor(&[3.0, 5.0, -1.5]);
    assert_eq!(t[0][1], t[1][0], "tensor must be symmetric");
    assert_eq!(t[0][0], 3.0);
    assert_eq!(t[1][1], 5.0);
}

// ─────────────────────────────────────────────────────────────
//  Stress transformation round-trips
// ─────────────────────────────────────────────────────────────

/// Rotating by θ then by θ with `invert` set returns the original vector.
#[test]
fn angle_transform_roundtrip() {
    let stress = [1.5, 0.7, 0.3];
    for angle in [0.0, 0.31, -1.2, 2.9, std::f64::consts::FRAC_PI_2] {
        let rotated = transform_stress_angle(&stress, angle, false);
        let back = transform_stress_angle(&rotated, angle, true);
        assert_vec_close(&back, &stress, 1e-12, "angle roundtrip");
    }
}

/// Matrix form round-trips with the `invert` flag toggled, and agrees with
/// the angle form for the matching rotation.
#[test]
fn matrix_transform_roundtrip() {
    let stress = [2.0, -0.4, 0.9];
    for angle in [0.45, -0.8, 1.7] {
        let rotation = planar_rotation(angle);
        let rotated = transform_stress(&stress, &rotation, false);
        let back = transform_stress(&rotated, &rotation, true);
        assert_vec_close(&back, &stress, 1e-12, "matrix roundtrip");

        let by_angle = transform_stress_angle(&stress, angle, false);
        assert_vec_close(&rotated, &by_angle, 1e-12, "matrix vs angle form");
    }
}

/// Uniaxial stress rotated a quarter turn swaps its normal components.
#[test]
fn quarter_turn_swaps_axes() {
    let rotated = transform_stress_angle(&[1.0, 0.0, 0.0], std::f64::consts::FRAC_PI_2, false);
    assert_vec_close(&rotated, &[0.0, 1.0, 0.0], 1e-12, "quarter turn");
}

// ─────────────────────────────────────────────────────────────
//  Isotropy check
// ─────────────────────────────────────────────────────────────

#[test]
fn isotropy_is_exact_equality() {
    assert!(is_isotropic(&[1.0, 1.0, 0.0]));
    assert!(is_isotropic(&[-2.5, -2.5, 0.0]));
    assert!(is_isotropic(&[0.0, 0.0, 0.0]));

    assert!(!is_isotropic(&[1.0, 1.0 + 1e-9, 0.0]));
    assert!(!is_isotropic(&[1.0, 1.0, 1e-12]));
    assert!(!is_isotropic(&[2.0, 1.0, 0.0]));
}

// ─────────────────────────────────────────────────────────────
//  Principal stresses
// ─────────────────────────────────────────────────────────────

#[test]
fn principal_uniaxial() {
    let (values, angle) = principal_stresses(&[2.0, 0.0, 0.0]);
    assert_close(values[0], 2.0, 1e-12, "sigma 1");
    assert_close(values[1], 0.0, 1e-12, "sigma 2");
    assert_close(angle, 0.0, 1e-12, "angle");
}

#[test]
fn principal_pure_shear() {
    let (values, angle) = principal_stresses(&[0.0, 0.0, 1.0]);
    assert_close(values[0], 1.0, 1e-12, "sigma 1");
    assert_close(values[1], -1.0, 1e-12, "sigma 2");
    assert_close(angle, std::f64::consts::FRAC_PI_4, 1e-12, "angle");
}

/// The isotropic state short-circuits to a zero eigen-angle.
#[test]
fn principal_isotropic_short_circuit() {
    let (values, angle) = principal_stresses(&[3.0, 3.0, 0.0]);
    assert_eq!(values, [3.0, 3.0]);
    assert_eq!(angle, 0.0);
}

/// Reconstructing the components from values and angle recovers the input.
#[test]
fn principal_reconstruction() {
    let stress = [1.8, -0.6, 0.75];
    let (values, angle) = principal_stresses(&stress);
    assert!(values[0] >= values[1]);

    let (s, c) = angle.sin_cos();
    let (s1, s2) = (values[0], values[1]);
    assert_close(s1 * c * c + s2 * s * s, stress[0], 1e-12, "sigma x");
    assert_close(s1 * s * s + s2 * c * c, stress[1], 1e-12, "sigma y");
    assert_close((s1 - s2) * s * c, stress[2], 1e-12, "tau xy");
}

// ─────────────────────────────────────────────────────────────
//  Guarded inverse trigonometry
// ─────────────────────────────────────────────────────────────

/// Arguments overshooting [-1, 1] are clamped instead of producing NaN.
#[test]
fn inverse_trig_clamps() {
    assert!(arc_sin(1.0000001).is_finite());
    assert!(arc_cos(-5.0).is_finite());
    assert_close(arc_sin(2.0), 0.9999_f64.asin(), 1e-15, "arc_sin clamp");
    assert_close(arc_cos(-2.0), (-0.9999_f64).acos(), 1e-15, "arc_cos clamp");
    assert_close(arc_sin(0.5), 0.5_f64.asin(), 1e-15, "arc_sin in range");
}

#[test]
fn distance_hypotenuse() {
    let d = euclidean_distance(&[1.0, 2.0, 3.0], &[4.0, 6.0, 3.0]);
    assert_close(d, 5.0, 1e-12, "3-4-5 distance");
}

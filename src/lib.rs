//! **Taut** — natural force density equilibrium solver for cable and membrane meshes.
//!
//! The crate finds the equilibrium geometry of a pin-jointed network of
//! edges and (optionally) membrane faces under load:
//!
//! 1. **Stress algebra** (`math`): planar stress pseudo-vectors, rotations,
//!    closed-form diagonalization.
//! 2. **Geometry elements** (`geometry`): natural edges and tri/quad faces,
//!    local frames, stress-to-force-density derivation.
//! 3. **Assembly** (`matrices`): sparse force-density stiffness matrix and
//!    geometry-dependent load matrix.
//! 4. **Solver** (`solver`): inner sparse equilibrium solve and the outer
//!    natural force density driver with stress/displacement convergence.

pub mod types;
pub mod math;
pub mod geometry;
pub mod matrices;
pub mod solver;

use ndarray::Array2;
use std::fmt;

// ─────────────────────────────────────────────────────────────
//  Error type
// ─────────────────────────────────────────────────────────────

/// Unified error type for all fallible operations in the crate.
///
/// Every fallible public function returns `Result<T, TautError>` instead of
/// panicking. Non-convergence is not an error: the driver reports it through
/// [`SolverResult::converged`] and the residual fields.
#[derive(Debug)]
pub enum TautError {
    /// Linear algebra failure (singular / ill-conditioned stiffness matrix).
    Linalg(sprs::errors::LinalgError),
    /// The mesh has no fixed vertices, so the free-vertex system is singular.
    NoFixedVertices,
    /// Shape or index mismatch in input data.
    Shape(String),
}

impl fmt::Display for TautError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linalg(e) => write!(f, "linear algebra error: {e}"),
            Self::NoFixedVertices =>
                write!(f, "mesh has no fixed vertices to anchor the equilibrium system"),
            Self::Shape(msg) => write!(f, "shape error: {msg}"),
        }
    }
}

impl std::error::Error for TautError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Linalg(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sprs::errors::LinalgError> for TautError {
    fn from(e: sprs::errors::LinalgError) -> Self {
        Self::Linalg(e)
    }
}

// ─────────────────────────────────────────────────────────────
//  Stress output selection
// ─────────────────────────────────────────────────────────────

/// Which per-face stress quantities the final solve reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StressMode {
    /// Do not compute stress output.
    Skip,
    /// Second Piola-Kirchhoff stress pseudo-vectors per face.
    Pk2,
    /// Principal stress values and eigenvectors in the local face frame.
    Principal,
    /// Principal stress values and eigenvectors in the global frame.
    PrincipalGlobal,
}

/// Per-face stress output, shaped by the requested [`StressMode`].
#[derive(Debug, Clone)]
pub enum StressOutput {
    /// (σx, σy, τxy) in the local face frame, one entry per face.
    Pk2 { amplitudes: Vec<[f64; 3]> },
    /// Principal values (max, min) with in-plane unit eigenvectors.
    Principal {
        values: Vec<[f64; 2]>,
        directions: Vec<[[f64; 2]; 2]>,
    },
    /// Principal values with eigenvectors expressed in global coordinates.
    PrincipalGlobal {
        values: Vec<[f64; 2]>,
        directions: Vec<[[f64; 3]; 2]>,
    },
}

// ─────────────────────────────────────────────────────────────
//  Goals  (target internal force distribution)
// ─────────────────────────────────────────────────────────────

/// Target internal force state driving the equilibrium search.
///
/// Faces without an explicit stress goal default to the uniform isotropic
/// field (1, 1, 0). Force density goals take precedence over force goals.
#[derive(Debug, Clone, Default)]
pub struct Goals {
    /// Goal (σx, σy, τxy) stress field per face, in local face directions
    /// and normalized over thickness.
    pub stress_goals: Option<Vec<[f64; 3]>>,
    /// Goal force density per edge.
    pub fd_goals: Option<Vec<f64>>,
    /// Goal force per edge, converted to a force density through the
    /// current member length at each assembly.
    pub force_goals: Option<Vec<f64>>,
    /// Normal of the reference plane orienting anisotropic stress goals.
    pub reference_normal: Option<[f64; 3]>,
}

// ─────────────────────────────────────────────────────────────
//  Loads
// ─────────────────────────────────────────────────────────────

/// Applied loads. Any subset may be present.
///
/// Face loads are per unit area and geometry dependent: they are
/// redistributed from the current face areas (and, for local loads, the
/// current face frames) at every iteration.
#[derive(Debug, Clone, Default)]
pub struct Loads {
    /// Global XYZ load per vertex (n × 3).
    pub vertex_loads: Option<Array2<f64>>,
    /// Global XYZ load per face area (faces × 3).
    pub global_face_loads: Option<Array2<f64>>,
    /// Local face frame XYZ load per face area (faces × 3).
    pub local_face_loads: Option<Array2<f64>>,
    /// Surface density for self-weight, applied against global Z.
    pub selfweight_density: Option<f64>,
}

// ─────────────────────────────────────────────────────────────
//  Solver options
// ─────────────────────────────────────────────────────────────

/// Tunable parameters of the natural force density driver.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Stress output computed by the final solve.
    pub stress_mode: StressMode,
    /// Tolerance on the mean face stress residual.
    pub stress_tolerance: f64,
    /// Tolerance on the max per-vertex displacement between iterations.
    pub displacement_tolerance: f64,
    /// Outer iteration cap. A value of 1 bypasses the outer loop and runs
    /// the plain, non-iterative force density method.
    pub max_iterations: usize,
    /// Report residuals to stderr every this many iterations (0 = silent).
    pub report_frequency: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            stress_mode: StressMode::Pk2,
            stress_tolerance: 1e-2,
            displacement_tolerance: 1e-2,
            max_iterations: 10,
            report_frequency: 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Problem definition  (immutable after construction)
// ─────────────────────────────────────────────────────────────

/// A complete form-finding problem over plain arrays.
///
/// The caller owns the mesh; the solver consumes coordinates, connectivity
/// and goals, and returns result arrays to be mapped back onto the mesh.
#[derive(Debug, Clone)]
pub struct Problem {
    /// Initial vertex coordinates (n × 3).
    pub vertices: Array2<f64>,
    /// Indices of fixed (anchored) vertices. All others are solved for.
    pub fixed: Vec<usize>,
    /// Edge list as vertex index pairs.
    pub edges: Vec<(usize, usize)>,
    /// Face vertex lists, 3 or 4 entries each, in cyclic order.
    pub faces: Vec<Vec<usize>>,
    pub goals: Goals,
    pub loads: Loads,
}

// ─────────────────────────────────────────────────────────────
//  Solver result
// ─────────────────────────────────────────────────────────────

/// Output of a solver run. Residuals and the convergence flag are always
/// populated so callers can tell early convergence from an exhausted
/// iteration budget.
#[derive(Debug, Clone)]
pub struct SolverResult {
    /// Equilibrium vertex coordinates (n × 3).
    pub xyz: Array2<f64>,
    /// Residual forces per vertex; reactions at the fixed vertices.
    pub residuals: Array2<f64>,
    /// Per-face stress output, `None` when [`StressMode::Skip`] was requested.
    pub stresses: Option<StressOutput>,
    /// Axial force per edge.
    pub forces: Vec<f64>,
    /// Current length per edge.
    pub lengths: Vec<f64>,
    /// Outer iterations run.
    pub iterations: usize,
    /// Whether a residual dropped under its tolerance within the budget.
    pub converged: bool,
    /// Mean Euclidean distance between face stress goals and amplitudes.
    pub stress_residual: f64,
    /// Max per-vertex displacement of the last iteration.
    pub displacement_residual: f64,
}

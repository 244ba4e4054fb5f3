//! Geometry elements: natural edges and tri/quad membrane faces.
//!
//! Elements hold index references into a shared coordinate array and cache
//! their derived state. Force densities are derived from goals **at
//! stiffness assembly time** and kept through the subsequent solve, so the
//! stress recovered after the solve combines pre-solve densities with
//! post-solve geometry. At convergence the two geometries coincide and the
//! recovered stress matches the goal.

use crate::math::{
    arc_cos, cross, dot, euclidean_distance, is_isotropic, norm, normalize, principal_stresses,
    sub, transform_stress_angle,
};
use crate::types::{Problem, StressMode, StressOutput, TautError};
use ndarray::Array2;

/// Default isotropic stress goal for faces without an explicit one.
pub const DEFAULT_STRESS_GOAL: [f64; 3] = [1.0, 1.0, 0.0];

#[inline]
fn point(xyz: &Array2<f64>, i: usize) -> [f64; 3] {
    [xyz[[i, 0]], xyz[[i, 1]], xyz[[i, 2]]]
}

// ─────────────────────────────────────────────────────────────
//  Natural edge
// ─────────────────────────────────────────────────────────────

/// A cable segment between two vertices.
#[derive(Debug, Clone)]
pub struct NaturalEdge {
    pub vertices: (usize, usize),
    fd_goal: Option<f64>,
    force_goal: Option<f64>,
    /// Force density cached at the last stiffness assembly.
    pub force_density: f64,
    /// Current member length.
    pub length: f64,
}

impl NaturalEdge {
    pub fn new(vertices: (usize, usize), fd_goal: Option<f64>, force_goal: Option<f64>) -> Self {
        Self {
            vertices,
            fd_goal,
            force_goal,
            force_density: 0.0,
            length: 0.0,
        }
    }

    /// Refresh the member length from the given coordinates.
    pub fn update_xyz(&mut self, xyz: &Array2<f64>) {
        let (u, v) = self.vertices;
        self.length = euclidean_distance(&point(xyz, u), &point(xyz, v));
    }

    /// Derive the force density from the edge goals and the current length.
    /// Called by the stiffness assembler; the value is cached until the
    /// next assembly. A force density goal takes precedence over a force
    /// goal; an edge without goals contributes nothing.
    pub fn compute_force_density(&mut self) -> f64 {
        self.force_density = match (self.fd_goal, self.force_goal) {
            (Some(q), _) => q,
            (None, Some(f)) => f / self.length,
            (None, None) => 0.0,
        };
        self.force_density
    }

    /// Axial force: cached force density times current length.
    pub fn force(&self) -> f64 {
        self.force_density * self.length
    }
}

// ─────────────────────────────────────────────────────────────
//  Local face frame
// ─────────────────────────────────────────────────────────────

/// Orthonormal material frame embedded in a face.
#[derive(Debug, Clone, Copy)]
pub struct FaceFrame {
    pub origin: [f64; 3],
    pub xaxis: [f64; 3],
    pub yaxis: [f64; 3],
    pub normal: [f64; 3],
}

impl FaceFrame {
    fn zero() -> Self {
        Self {
            origin: [0.0; 3],
            xaxis: [0.0; 3],
            yaxis: [0.0; 3],
            normal: [0.0; 3],
        }
    }

    /// In-plane components of a global direction vector.
    #[inline]
    pub fn to_local(&self, v: &[f64; 3]) -> [f64; 2] {
        [dot(v, &self.xaxis), dot(v, &self.yaxis)]
    }

    /// Rotate a local-frame vector into global coordinates.
    #[inline]
    pub fn rotate_to_global(&self, v: &[f64; 3]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for k in 0..3 {
            out[k] = self.xaxis[k] * v[0] + self.yaxis[k] * v[1] + self.normal[k] * v[2];
        }
        out
    }
}

// ─────────────────────────────────────────────────────────────
//  Stress-to-force-density algebra  (free functions, pure math)
// ─────────────────────────────────────────────────────────────

fn det3(a: &[f64; 3], b: &[f64; 3], c: &[f64; 3]) -> f64 {
    a[0] * (b[1] * c[2] - c[1] * b[2]) - b[0] * (a[1] * c[2] - c[1] * a[2])
        + c[0] * (a[1] * b[2] - b[1] * a[2])
}

/// Solve the 3×3 system with the given columns by Cramer's rule.
fn solve3(c0: &[f64; 3], c1: &[f64; 3], c2: &[f64; 3], rhs: &[f64; 3]) -> [f64; 3] {
    let det = det3(c0, c1, c2);
    [
        det3(rhs, c1, c2) / det,
        det3(c0, rhs, c2) / det,
        det3(c0, c1, rhs) / det,
    ]
}

/// Closed-form triangle force densities for a goal stress state.
///
/// A uniform planar stress σ over a triangle is statically equivalent to
/// axial member forces along its edges, through σ·2A = Σᵢ nᵢ (eᵢ ⊗ eᵢ)
/// with eᵢ the local 2D edge vectors. Expanding the dyadics gives three
/// linear equations in the three densities, solved directly.
pub fn tri_force_densities(
    edge_vecs: &[[f64; 2]; 3],
    double_area: f64,
    goal: &[f64; 3],
) -> [f64; 3] {
    let col = |e: &[f64; 2]| [e[0] * e[0], e[1] * e[1], e[0] * e[1]];
    let c0 = col(&edge_vecs[0]);
    let c1 = col(&edge_vecs[1]);
    let c2 = col(&edge_vecs[2]);
    let rhs = [
        double_area * goal[0],
        double_area * goal[1],
        double_area * goal[2],
    ];
    solve3(&c0, &c1, &c2, &rhs)
}

/// Recover the stress pseudo-vector carried by a set of member force
/// densities on the current geometry. Exact inverse of the derivation.
pub fn stress_from_densities(
    edge_vecs: &[[f64; 2]],
    densities: &[f64],
    double_area: f64,
) -> [f64; 3] {
    let mut s = [0.0; 3];
    for (e, n) in edge_vecs.iter().zip(densities) {
        s[0] += n * e[0] * e[0];
        s[1] += n * e[1] * e[1];
        s[2] += n * e[0] * e[1];
    }
    [s[0] / double_area, s[1] / double_area, s[2] / double_area]
}

/// Doubled signed area of a 2D triangle.
#[inline]
fn double_area_2d(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])
}

/// Orient an input stress goal into the face frame.
///
/// Anisotropic goals are understood in a frame whose x-axis runs along the
/// intersection of the face plane with the reference plane; the goal is
/// rotated from there into the face frame by the signed in-plane angle.
/// Isotropic goals and faces parallel to the reference plane pass through.
fn oriented_goal(goal: &[f64; 3], reference_normal: Option<&[f64; 3]>, frame: &FaceFrame) -> [f64; 3] {
    if is_isotropic(goal) {
        return *goal;
    }
    let Some(reference) = reference_normal else {
        return *goal;
    };
    let trace = cross(reference, &frame.normal);
    if norm(&trace) < 1e-12 {
        return *goal;
    }
    let trace = normalize(&trace);
    let sign = if dot(&cross(&frame.xaxis, &trace), &frame.normal) < 0.0 {
        -1.0
    } else {
        1.0
    };
    let angle = sign * arc_cos(dot(&frame.xaxis, &trace));
    transform_stress_angle(goal, angle, true)
}

// ─────────────────────────────────────────────────────────────
//  Triangular face
// ─────────────────────────────────────────────────────────────

/// Membrane triangle. Member i spans the two vertices other than i.
#[derive(Debug, Clone)]
pub struct TriFace {
    pub vertices: [usize; 3],
    stress_goal: [f64; 3],
    reference_normal: Option<[f64; 3]>,
    pub frame: FaceFrame,
    pub area: f64,
    /// Local 2D member vectors.
    edge_vecs: [[f64; 2]; 3],
    pub force_densities: [f64; 3],
}

impl TriFace {
    pub fn new(
        vertices: [usize; 3],
        stress_goal: [f64; 3],
        reference_normal: Option<[f64; 3]>,
    ) -> Self {
        Self {
            vertices,
            stress_goal,
            reference_normal,
            frame: FaceFrame::zero(),
            area: 0.0,
            edge_vecs: [[0.0; 2]; 3],
            force_densities: [0.0; 3],
        }
    }

    /// Refresh frame, area and local member vectors from coordinates.
    pub fn update_xyz(&mut self, xyz: &Array2<f64>) {
        let p0 = point(xyz, self.vertices[0]);
        let p1 = point(xyz, self.vertices[1]);
        let p2 = point(xyz, self.vertices[2]);

        let e01 = sub(&p1, &p0);
        let e02 = sub(&p2, &p0);
        let n = cross(&e01, &e02);
        self.area = 0.5 * norm(&n);

        let normal = normalize(&n);
        let xaxis = normalize(&e01);
        let yaxis = cross(&normal, &xaxis);
        self.frame = FaceFrame {
            origin: [
                (p0[0] + p1[0] + p2[0]) / 3.0,
                (p0[1] + p1[1] + p2[1]) / 3.0,
                (p0[2] + p1[2] + p2[2]) / 3.0,
            ],
            xaxis,
            yaxis,
            normal,
        };

        let frame = self.frame;
        let members = [sub(&p2, &p1), sub(&p0, &p2), sub(&p1, &p0)];
        self.edge_vecs = members.map(|m| frame.to_local(&m));
    }

    /// Stress goal expressed in the current face frame.
    pub fn stress_goal_local(&self) -> [f64; 3] {
        oriented_goal(&self.stress_goal, self.reference_normal.as_ref(), &self.frame)
    }

    /// Derive and cache the member force densities reproducing the goal
    /// stress on the current geometry.
    pub fn compute_force_densities(&mut self) -> [f64; 3] {
        let goal = self.stress_goal_local();
        self.force_densities = tri_force_densities(&self.edge_vecs, 2.0 * self.area, &goal);
        self.force_densities
    }

    /// Stress carried by the cached densities on the current geometry.
    pub fn stress_amplitude(&self) -> [f64; 3] {
        stress_from_densities(&self.edge_vecs, &self.force_densities, 2.0 * self.area)
    }
}

// ─────────────────────────────────────────────────────────────
//  Quadrilateral face
// ─────────────────────────────────────────────────────────────

/// Membrane quadrilateral. Members are the four edges followed by the two
/// diagonals: e01, e12, e23, e30, d13, d02.
///
/// All algebra happens on the vertices projected into the quad's local
/// plane; both diagonal decompositions into triangles are computed and
/// averaged, which is exact for planar quads and a consistent fallback for
/// warped ones.
#[derive(Debug, Clone)]
pub struct QuadFace {
    pub vertices: [usize; 4],
    stress_goal: [f64; 3],
    reference_normal: Option<[f64; 3]>,
    pub frame: FaceFrame,
    pub area: f64,
    /// Projected 2D vertex positions.
    local_pts: [[f64; 2]; 4],
    /// Local 2D member vectors.
    edge_vecs: [[f64; 2]; 6],
    pub force_densities: [f64; 6],
}

impl QuadFace {
    pub fn new(
        vertices: [usize; 4],
        stress_goal: [f64; 3],
        reference_normal: Option<[f64; 3]>,
    ) -> Self {
        Self {
            vertices,
            stress_goal,
            reference_normal,
            frame: FaceFrame::zero(),
            area: 0.0,
            local_pts: [[0.0; 2]; 4],
            edge_vecs: [[0.0; 2]; 6],
            force_densities: [0.0; 6],
        }
    }

    pub fn update_xyz(&mut self, xyz: &Array2<f64>) {
        let pts: [[f64; 3]; 4] = [
            point(xyz, self.vertices[0]),
            point(xyz, self.vertices[1]),
            point(xyz, self.vertices[2]),
            point(xyz, self.vertices[3]),
        ];

        // Plane from the diagonal cross product, x-axis along the first
        // edge projected into that plane.
        let d02 = sub(&pts[2], &pts[0]);
        let d13 = sub(&pts[3], &pts[1]);
        let normal = normalize(&cross(&d02, &d13));
        let e01 = sub(&pts[1], &pts[0]);
        let off = dot(&e01, &normal);
        let xaxis = normalize(&[
            e01[0] - off * normal[0],
            e01[1] - off * normal[1],
            e01[2] - off * normal[2],
        ]);
        let yaxis = cross(&normal, &xaxis);
        let origin = [
            (pts[0][0] + pts[1][0] + pts[2][0] + pts[3][0]) / 4.0,
            (pts[0][1] + pts[1][1] + pts[2][1] + pts[3][1]) / 4.0,
            (pts[0][2] + pts[1][2] + pts[2][2] + pts[3][2]) / 4.0,
        ];
        self.frame = FaceFrame {
            origin,
            xaxis,
            yaxis,
            normal,
        };

        let frame = self.frame;
        for (q, p) in self.local_pts.iter_mut().zip(&pts) {
            *q = frame.to_local(&sub(p, &origin));
        }
        let q = &self.local_pts;
        self.edge_vecs = [
            [q[1][0] - q[0][0], q[1][1] - q[0][1]],
            [q[2][0] - q[1][0], q[2][1] - q[1][1]],
            [q[3][0] - q[2][0], q[3][1] - q[2][1]],
            [q[0][0] - q[3][0], q[0][1] - q[3][1]],
            [q[3][0] - q[1][0], q[3][1] - q[1][1]],
            [q[2][0] - q[0][0], q[2][1] - q[0][1]],
        ];

        // Mean of the two decomposition areas, so that stress recovery over
        // all six members inverts the derivation on planar geometry.
        let a_first = 0.5
            * (double_area_2d(&q[0], &q[1], &q[2]).abs()
                + double_area_2d(&q[0], &q[2], &q[3]).abs());
        let a_second = 0.5
            * (double_area_2d(&q[1], &q[2], &q[3]).abs()
                + double_area_2d(&q[3], &q[0], &q[1]).abs());
        self.area = 0.5 * (a_first + a_second);
    }

    pub fn stress_goal_local(&self) -> [f64; 3] {
        oriented_goal(&self.stress_goal, self.reference_normal.as_ref(), &self.frame)
    }

    /// Derive and cache the six member force densities.
    ///
    /// Each diagonal decomposition reproduces the goal stress on its own;
    /// averaging the two weights every member at one half, keeping the
    /// scheme symmetric in the diagonals.
    pub fn compute_force_densities(&mut self) -> [f64; 6] {
        let goal = self.stress_goal_local();
        let q = &self.local_pts;
        let member = |i: usize, j: usize| [q[j][0] - q[i][0], q[j][1] - q[i][1]];

        let tri = |a: usize, b: usize, c: usize| -> [f64; 3] {
            let vecs = [member(b, c), member(c, a), member(a, b)];
            let double_area = double_area_2d(&q[a], &q[b], &q[c]).abs();
            tri_force_densities(&vecs, double_area, &goal)
        };

        // First decomposition shares d02, second shares d13. Member i of a
        // triangle (a, b, c) spans the two vertices other than local i.
        let first_a = tri(0, 1, 2); // members: e12, d02, e01
        let first_b = tri(0, 2, 3); // members: e23, e30, d02
        let second_a = tri(1, 2, 3); // members: e23, d13, e12
        let second_b = tri(3, 0, 1); // members: e01, d13, e30

        self.force_densities = [
            0.5 * (first_a[2] + second_b[0]),
            0.5 * (first_a[0] + second_a[2]),
            0.5 * (first_b[0] + second_a[0]),
            0.5 * (first_b[1] + second_b[2]),
            0.5 * (second_a[1] + second_b[1]),
            0.5 * (first_a[1] + first_b[2]),
        ];
        self.force_densities
    }

    pub fn stress_amplitude(&self) -> [f64; 3] {
        stress_from_densities(&self.edge_vecs, &self.force_densities, 2.0 * self.area)
    }
}

// ─────────────────────────────────────────────────────────────
//  Face dispatch
// ─────────────────────────────────────────────────────────────

/// A processed membrane face of either arity.
#[derive(Debug, Clone)]
pub enum NaturalFace {
    Tri(TriFace),
    Quad(QuadFace),
}

impl NaturalFace {
    pub fn vertex_ids(&self) -> &[usize] {
        match self {
            Self::Tri(t) => &t.vertices,
            Self::Quad(q) => &q.vertices,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Self::Tri(_) => 3,
            Self::Quad(_) => 4,
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            Self::Tri(t) => t.area,
            Self::Quad(q) => q.area,
        }
    }

    pub fn frame(&self) -> &FaceFrame {
        match self {
            Self::Tri(t) => &t.frame,
            Self::Quad(q) => &q.frame,
        }
    }

    pub fn update_xyz(&mut self, xyz: &Array2<f64>) {
        match self {
            Self::Tri(t) => t.update_xyz(xyz),
            Self::Quad(q) => q.update_xyz(xyz),
        }
    }

    pub fn force_densities(&self) -> &[f64] {
        match self {
            Self::Tri(t) => &t.force_densities,
            Self::Quad(q) => &q.force_densities,
        }
    }

    pub fn stress_goal_local(&self) -> [f64; 3] {
        match self {
            Self::Tri(t) => t.stress_goal_local(),
            Self::Quad(q) => q.stress_goal_local(),
        }
    }

    pub fn stress_amplitude(&self) -> [f64; 3] {
        match self {
            Self::Tri(t) => t.stress_amplitude(),
            Self::Quad(q) => q.stress_amplitude(),
        }
    }
}

/// Assemble the requested stress output from current face state.
pub fn face_stresses(faces: &[NaturalFace], mode: StressMode) -> Option<StressOutput> {
    match mode {
        StressMode::Skip => None,
        StressMode::Pk2 => Some(StressOutput::Pk2 {
            amplitudes: faces.iter().map(|f| f.stress_amplitude()).collect(),
        }),
        StressMode::Principal => {
            let mut values = Vec::with_capacity(faces.len());
            let mut directions = Vec::with_capacity(faces.len());
            for face in faces {
                let (vals, angle) = principal_stresses(&face.stress_amplitude());
                let (sa, ca) = angle.sin_cos();
                values.push(vals);
                directions.push([[ca, sa], [-sa, ca]]);
            }
            Some(StressOutput::Principal { values, directions })
        }
        StressMode::PrincipalGlobal => {
            let mut values = Vec::with_capacity(faces.len());
            let mut directions = Vec::with_capacity(faces.len());
            for face in faces {
                let (vals, angle) = principal_stresses(&face.stress_amplitude());
                let (sa, ca) = angle.sin_cos();
                let frame = face.frame();
                let mut first = [0.0; 3];
                let mut second = [0.0; 3];
                for k in 0..3 {
                    first[k] = frame.xaxis[k] * ca + frame.yaxis[k] * sa;
                    second[k] = -frame.xaxis[k] * sa + frame.yaxis[k] * ca;
                }
                values.push(vals);
                directions.push([first, second]);
            }
            Some(StressOutput::PrincipalGlobal { values, directions })
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Mesh preprocessing
// ─────────────────────────────────────────────────────────────

/// Validated, processed element arrays ready for the solver.
#[derive(Debug)]
pub struct Preprocessed {
    pub faces: Vec<NaturalFace>,
    /// Input face index of each processed face (skipped faces removed).
    pub face_sources: Vec<usize>,
    pub edges: Vec<NaturalEdge>,
    /// Working copy of the vertex coordinates.
    pub xyz: Array2<f64>,
    pub free: Vec<usize>,
    pub fixed: Vec<usize>,
}

/// Validate the problem arrays and build the processed elements.
///
/// Faces with an arity other than 3 or 4 carry no stress state and are
/// skipped from assembly with a configuration warning.
pub fn mesh_preprocess(problem: &Problem) -> Result<Preprocessed, TautError> {
    let nn = problem.vertices.nrows();
    if problem.vertices.ncols() != 3 {
        return Err(TautError::Shape(format!(
            "vertex array must be n x 3, got n x {}",
            problem.vertices.ncols()
        )));
    }

    let mut fixed = problem.fixed.clone();
    fixed.sort_unstable();
    fixed.dedup();
    if let Some(&last) = fixed.last() {
        if last >= nn {
            return Err(TautError::Shape(format!(
                "fixed vertex index {last} out of range for {nn} vertices"
            )));
        }
    }
    let mut is_fixed = vec![false; nn];
    for &v in &fixed {
        is_fixed[v] = true;
    }
    let free: Vec<usize> = (0..nn).filter(|&v| !is_fixed[v]).collect();

    let goals = &problem.goals;
    if let Some(sg) = &goals.stress_goals {
        if sg.len() != problem.faces.len() {
            return Err(TautError::Shape(format!(
                "{} stress goals for {} faces",
                sg.len(),
                problem.faces.len()
            )));
        }
    }
    for (name, lens) in [
        ("force density", goals.fd_goals.as_ref().map(|g| g.len())),
        ("force", goals.force_goals.as_ref().map(|g| g.len())),
    ] {
        if let Some(len) = lens {
            if len != problem.edges.len() {
                return Err(TautError::Shape(format!(
                    "{} {} goals for {} edges",
                    len,
                    name,
                    problem.edges.len()
                )));
            }
        }
    }

    let mut edges = Vec::with_capacity(problem.edges.len());
    for (i, &(u, v)) in problem.edges.iter().enumerate() {
        if u >= nn || v >= nn {
            return Err(TautError::Shape(format!(
                "edge {i} references vertex out of range for {nn} vertices"
            )));
        }
        if u == v {
            return Err(TautError::Shape(format!("edge {i} joins vertex {u} to itself")));
        }
        let fd = goals.fd_goals.as_ref().map(|g| g[i]);
        let force = if fd.is_some() {
            None
        } else {
            goals.force_goals.as_ref().map(|g| g[i])
        };
        edges.push(NaturalEdge::new((u, v), fd, force));
    }

    let mut faces = Vec::with_capacity(problem.faces.len());
    let mut face_sources = Vec::with_capacity(problem.faces.len());
    for (i, ids) in problem.faces.iter().enumerate() {
        for &v in ids {
            if v >= nn {
                return Err(TautError::Shape(format!(
                    "face {i} references vertex {v} out of range for {nn} vertices"
                )));
            }
        }
        let goal = goals
            .stress_goals
            .as_ref()
            .map_or(DEFAULT_STRESS_GOAL, |g| g[i]);
        match ids.len() {
            3 => {
                faces.push(NaturalFace::Tri(TriFace::new(
                    [ids[0], ids[1], ids[2]],
                    goal,
                    goals.reference_normal,
                )));
                face_sources.push(i);
            }
            4 => {
                faces.push(NaturalFace::Quad(QuadFace::new(
                    [ids[0], ids[1], ids[2], ids[3]],
                    goal,
                    goals.reference_normal,
                )));
                face_sources.push(i);
            }
            n => {
                eprintln!(
                    "warning: face {i} has {n} vertices and is skipped \
                     (only triangles and quadrilaterals carry a stress state)"
                );
            }
        }
    }

    let xyz = problem.vertices.clone();
    for face in &mut faces {
        face.update_xyz(&xyz);
    }
    for edge in &mut edges {
        edge.update_xyz(&xyz);
    }

    Ok(Preprocessed {
        faces,
        face_sources,
        edges,
        xyz,
        free,
        fixed,
    })
}

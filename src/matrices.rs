//! Assembly of the global force-density stiffness matrix and the vertex
//! load matrix.
//!
//! The stiffness assembler is instantiated fresh at every solver iteration:
//! face force densities are geometry dependent, so the matrix is rebuilt
//! from scratch. The load assembler is instantiated once per run and
//! refreshed through `update` as face areas and frames change.

use crate::geometry::{NaturalEdge, NaturalFace};
use crate::types::{Loads, TautError};
use ndarray::Array2;
use sprs::{CsMat, TriMat};

// ─────────────────────────────────────────────────────────────
//  Stiffness matrix assembler
// ─────────────────────────────────────────────────────────────

/// Global force-density stiffness matrix with its free/free and free/fixed
/// blocks, assembled in one triplet pass.
///
/// Entry (i, j) accumulates the contributions of every edge and face
/// touching both vertices; duplicate triplets are summed on conversion, so
/// elements sharing a vertex pair stack additively. Each row sums to zero
/// (weighted graph-Laplacian structure).
pub struct StiffnessMatrixAssembler {
    /// Full matrix over all vertices.
    pub full: CsMat<f64>,
    /// Free-row, free-column block.
    pub free: CsMat<f64>,
    /// Free-row, fixed-column block.
    pub fixed: CsMat<f64>,
}

struct TripletSink {
    full: TriMat<f64>,
    free_block: TriMat<f64>,
    fixed_block: TriMat<f64>,
    to_free: Vec<Option<usize>>,
    to_fixed: Vec<Option<usize>>,
}

impl TripletSink {
    fn push(&mut self, row: usize, col: usize, val: f64) {
        self.full.add_triplet(row, col, val);
        if let Some(fr) = self.to_free[row] {
            if let Some(fc) = self.to_free[col] {
                self.free_block.add_triplet(fr, fc, val);
            } else if let Some(xc) = self.to_fixed[col] {
                self.fixed_block.add_triplet(fr, xc, val);
            }
        }
    }

    /// Triangle pattern: diagonal i sums the two densities adjacent to
    /// vertex i, off-diagonal (i, j) carries minus the density of the
    /// member between i and j.
    fn add_tri_block(&mut self, v: [usize; 3], n: [f64; 3]) {
        let entries = [
            (v[0], v[0], n[1] + n[2]),
            (v[0], v[1], -n[2]),
            (v[0], v[2], -n[1]),
            (v[1], v[0], -n[2]),
            (v[1], v[1], n[0] + n[2]),
            (v[1], v[2], -n[0]),
            (v[2], v[0], -n[1]),
            (v[2], v[1], -n[0]),
            (v[2], v[2], n[0] + n[1]),
        ];
        for (r, c, val) in entries {
            self.push(r, c, val);
        }
    }

    /// Quadrilateral pattern over the members e01, e12, e23, e30, d13, d02,
    /// same accumulation rule with the diagonal connections included.
    fn add_quad_block(&mut self, v: [usize; 4], n: [f64; 6]) {
        let entries = [
            (v[0], v[0], n[0] + n[3] + n[5]),
            (v[0], v[1], -n[0]),
            (v[0], v[2], -n[5]),
            (v[0], v[3], -n[3]),
            (v[1], v[0], -n[0]),
            (v[1], v[1], n[0] + n[1] + n[4]),
            (v[1], v[2], -n[1]),
            (v[1], v[3], -n[4]),
            (v[2], v[0], -n[5]),
            (v[2], v[1], -n[1]),
            (v[2], v[2], n[1] + n[2] + n[5]),
            (v[2], v[3], -n[2]),
            (v[3], v[0], -n[3]),
            (v[3], v[1], -n[4]),
            (v[3], v[2], -n[2]),
            (v[3], v[3], n[2] + n[3] + n[4]),
        ];
        for (r, c, val) in entries {
            self.push(r, c, val);
        }
    }

    fn add_edge(&mut self, v: (usize, usize), n: f64) {
        self.push(v.0, v.0, n);
        self.push(v.1, v.1, n);
        self.push(v.0, v.1, -n);
        self.push(v.1, v.0, -n);
    }
}

impl StiffnessMatrixAssembler {
    /// Assemble from the current geometry. Element force densities are
    /// derived (and cached on the elements) here, so the matrix always
    /// matches the geometry the elements were last updated with.
    pub fn new(
        free: &[usize],
        fixed: &[usize],
        edges: &mut [NaturalEdge],
        faces: &mut [NaturalFace],
    ) -> Self {
        let nn = free.len() + fixed.len();
        let mut to_free = vec![None; nn];
        let mut to_fixed = vec![None; nn];
        for (i, &v) in free.iter().enumerate() {
            to_free[v] = Some(i);
        }
        for (i, &v) in fixed.iter().enumerate() {
            to_fixed[v] = Some(i);
        }

        let mut sink = TripletSink {
            full: TriMat::new((nn, nn)),
            free_block: TriMat::new((free.len(), free.len())),
            fixed_block: TriMat::new((free.len(), fixed.len())),
            to_free,
            to_fixed,
        };

        for face in faces.iter_mut() {
            match face {
                NaturalFace::Tri(t) => {
                    let n = t.compute_force_densities();
                    sink.add_tri_block(t.vertices, n);
                }
                NaturalFace::Quad(q) => {
                    let n = q.compute_force_densities();
                    sink.add_quad_block(q.vertices, n);
                }
            }
        }
        for edge in edges.iter_mut() {
            let n = edge.compute_force_density();
            sink.add_edge(edge.vertices, n);
        }

        Self {
            full: sink.full.to_csc(),
            free: sink.free_block.to_csc(),
            fixed: sink.fixed_block.to_csc(),
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Load matrix assembler
// ─────────────────────────────────────────────────────────────

/// Dense vertex load matrix (n × 3): a static vertex-load baseline plus
/// geometry-dependent face loads redistributed on every `update`.
pub struct LoadMatrixAssembler {
    vertex_baseline: Array2<f64>,
    global_face_loads: Option<Array2<f64>>,
    local_face_loads: Option<Array2<f64>>,
    selfweight_density: Option<f64>,
    has_face_loads: bool,
    /// Current full load matrix.
    pub matrix: Array2<f64>,
}

impl LoadMatrixAssembler {
    /// Build from the problem loads. `face_sources` maps processed faces
    /// back to input face rows, so skipped faces drop their load rows too.
    pub fn new(
        vertex_count: usize,
        loads: &Loads,
        face_sources: &[usize],
        input_face_count: usize,
    ) -> Result<Self, TautError> {
        let vertex_baseline = match &loads.vertex_loads {
            Some(vl) => {
                if vl.nrows() != vertex_count || vl.ncols() != 3 {
                    return Err(TautError::Shape(format!(
                        "vertex load matrix is {} x {}, expected {} x 3",
                        vl.nrows(),
                        vl.ncols(),
                        vertex_count
                    )));
                }
                vl.clone()
            }
            None => Array2::zeros((vertex_count, 3)),
        };

        let select = |name: &str, m: &Option<Array2<f64>>| -> Result<Option<Array2<f64>>, TautError> {
            let Some(m) = m else { return Ok(None) };
            if m.nrows() != input_face_count || m.ncols() != 3 {
                return Err(TautError::Shape(format!(
                    "{name} load matrix is {} x {}, expected {input_face_count} x 3",
                    m.nrows(),
                    m.ncols()
                )));
            }
            let mut rows = Array2::zeros((face_sources.len(), 3));
            for (i, &src) in face_sources.iter().enumerate() {
                for d in 0..3 {
                    rows[[i, d]] = m[[src, d]];
                }
            }
            Ok(Some(rows))
        };

        let global_face_loads = select("global face", &loads.global_face_loads)?;
        let local_face_loads = select("local face", &loads.local_face_loads)?;
        let selfweight_density = loads.selfweight_density;
        let has_face_loads = global_face_loads.is_some()
            || local_face_loads.is_some()
            || selfweight_density.is_some();

        Ok(Self {
            matrix: vertex_baseline.clone(),
            vertex_baseline,
            global_face_loads,
            local_face_loads,
            selfweight_density,
            has_face_loads,
        })
    }

    /// Redistribute all loads for the current geometry. A no-op for the
    /// static case; otherwise resets to the vertex baseline and adds each
    /// face load scaled by area over vertex count, rotating local-frame
    /// loads into global coordinates first.
    pub fn update(&mut self, faces: &[NaturalFace]) {
        if !self.has_face_loads {
            return;
        }
        self.matrix.assign(&self.vertex_baseline);

        if let Some(gfl) = &self.global_face_loads {
            for (i, face) in faces.iter().enumerate() {
                let scale = face.area() / face.arity() as f64;
                let load = [gfl[[i, 0]] * scale, gfl[[i, 1]] * scale, gfl[[i, 2]] * scale];
                for &v in face.vertex_ids() {
                    for d in 0..3 {
                        self.matrix[[v, d]] += load[d];
                    }
                }
            }
        }

        if let Some(lfl) = &self.local_face_loads {
            for (i, face) in faces.iter().enumerate() {
                let scale = face.area() / face.arity() as f64;
                let local = [lfl[[i, 0]], lfl[[i, 1]], lfl[[i, 2]]];
                let global = face.frame().rotate_to_global(&local);
                for &v in face.vertex_ids() {
                    for d in 0..3 {
                        self.matrix[[v, d]] += global[d] * scale;
                    }
                }
            }
        }

        if let Some(density) = self.selfweight_density {
            for face in faces {
                let weight = density * face.area() / face.arity() as f64;
                for &v in face.vertex_ids() {
                    self.matrix[[v, 2]] -= weight;
                }
            }
        }
    }
}

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use glam::DVec3;

/// A triangle mesh with optional per-vertex normals and colors.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub vertices: Vec<[f64; 3]>,
    /// Per-vertex unit normals, when computed.
    pub normals: Option<Vec<[f64; 3]>>,
    /// Per-vertex RGB colors, when carried.
    pub colors: Option<Vec<[u8; 3]>>,
    /// Triangles as vertex index triples.
    pub triangles: Vec<[usize; 3]>,
}

impl TriangleMesh {
    /// Creates a new, empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the mesh carries no renderable geometry.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.triangles.is_empty()
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Remove triangles that reference a vertex twice or span zero area.
    pub fn remove_degenerate_triangles(&mut self) {
        let vertices = &self.vertices;
        self.triangles.retain(|t| {
            if t[0] == t[1] || t[1] == t[2] || t[0] == t[2] {
                return false;
            }
            triangle_area_vector(vertices, t).length_squared() > 0.0
        });
    }

    /// Remove triangles referencing the same three vertices, in any order.
    pub fn remove_duplicated_triangles(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.triangles.retain(|t| {
            let mut key = *t;
            key.sort_unstable();
            seen.insert(key)
        });
    }

    /// Merge vertices with bit-identical positions, remapping triangles.
    ///
    /// Attributes of the first occurrence win.
    pub fn remove_duplicated_vertices(&mut self) {
        let mut first_at: HashMap<[u64; 3], usize> = HashMap::new();
        let mut remap = vec![0usize; self.vertices.len()];
        let mut keep = Vec::with_capacity(self.vertices.len());

        for (i, vertex) in self.vertices.iter().enumerate() {
            let key = [
                vertex[0].to_bits(),
                vertex[1].to_bits(),
                vertex[2].to_bits(),
            ];
            match first_at.get(&key) {
                Some(&j) => remap[i] = j,
                None => {
                    let new_index = keep.len();
                    first_at.insert(key, new_index);
                    remap[i] = new_index;
                    keep.push(i);
                }
            }
        }

        self.apply_vertex_selection(&keep, &remap);
    }

    /// Drop triangles whose insertion would share an edge with more than two
    /// triangles, keeping the first two in index order.
    pub fn remove_non_manifold_edges(&mut self) {
        let mut edge_count: HashMap<(usize, usize), usize> = HashMap::new();
        let mut kept = Vec::with_capacity(self.triangles.len());

        for triangle in &self.triangles {
            let edges = triangle_edges(triangle);
            let fits = edges
                .iter()
                .all(|e| edge_count.get(e).copied().unwrap_or(0) < 2);
            if fits {
                for e in edges {
                    *edge_count.entry(e).or_insert(0) += 1;
                }
                kept.push(*triangle);
            }
        }

        self.triangles = kept;
    }

    /// Remove vertices referenced by no triangle, compacting indices.
    pub fn remove_unreferenced_vertices(&mut self) {
        let mut used = vec![false; self.vertices.len()];
        for t in &self.triangles {
            for &i in t {
                used[i] = true;
            }
        }

        let mut remap = vec![0usize; self.vertices.len()];
        let mut keep = Vec::new();
        for (i, &is_used) in used.iter().enumerate() {
            if is_used {
                remap[i] = keep.len();
                keep.push(i);
            }
        }

        self.apply_vertex_selection(&keep, &remap);
    }

    /// Apply Taubin smoothing (lambda/mu passes over the umbrella operator).
    pub fn filter_smooth_taubin(&mut self, iterations: usize) {
        const LAMBDA: f64 = 0.5;
        const MU: f64 = -0.53;

        if iterations == 0 || self.vertices.is_empty() {
            return;
        }

        let neighbours = self.vertex_neighbours();
        for _ in 0..iterations {
            for factor in [LAMBDA, MU] {
                let current = self.vertices.clone();
                for (i, vertex) in self.vertices.iter_mut().enumerate() {
                    if neighbours[i].is_empty() {
                        continue;
                    }
                    let mut mean = DVec3::ZERO;
                    for &j in &neighbours[i] {
                        mean += DVec3::from_array(current[j]);
                    }
                    mean /= neighbours[i].len() as f64;
                    let p = DVec3::from_array(current[i]);
                    *vertex = (p + factor * (mean - p)).to_array();
                }
            }
        }
    }

    /// Close small holes by fan-triangulating boundary loops whose extent from
    /// their centroid stays within `radius`. Larger holes are left open.
    pub fn fill_holes(&mut self, radius: f64) {
        if radius <= 0.0 {
            return;
        }

        for hole in self.boundary_loops() {
            let centroid = hole
                .iter()
                .fold(DVec3::ZERO, |acc, &i| acc + DVec3::from_array(self.vertices[i]))
                / hole.len() as f64;
            let extent = hole
                .iter()
                .map(|&i| (DVec3::from_array(self.vertices[i]) - centroid).length())
                .fold(0.0, f64::max);
            if extent > radius {
                continue;
            }

            let centroid_index = self.vertices.len();
            self.vertices.push(centroid.to_array());
            if let Some(colors) = self.colors.as_mut() {
                let mut sum = [0u64; 3];
                for &i in &hole {
                    for k in 0..3 {
                        sum[k] += colors[i][k] as u64;
                    }
                }
                colors.push([
                    (sum[0] / hole.len() as u64) as u8,
                    (sum[1] / hole.len() as u64) as u8,
                    (sum[2] / hole.len() as u64) as u8,
                ]);
            }
            if let Some(normals) = self.normals.as_mut() {
                normals.push([0.0, 0.0, 0.0]);
            }

            // Boundary edges run opposite to the winding of the surrounding
            // faces; the fan reverses them to keep orientation consistent.
            for w in 0..hole.len() {
                let a = hole[w];
                let b = hole[(w + 1) % hole.len()];
                self.triangles.push([b, a, centroid_index]);
            }
        }
    }

    /// Recompute per-vertex normals as area-weighted face normal averages.
    pub fn compute_vertex_normals(&mut self) {
        let mut normals = vec![DVec3::ZERO; self.vertices.len()];
        for t in &self.triangles {
            let face_normal = triangle_area_vector(&self.vertices, t);
            for &i in t {
                normals[i] += face_normal;
            }
        }
        self.normals = Some(
            normals
                .into_iter()
                .map(|n| {
                    if n.length_squared() > 0.0 {
                        n.normalize().to_array()
                    } else {
                        [0.0, 0.0, 0.0]
                    }
                })
                .collect(),
        );
    }

    // Closed boundary loops of the mesh, each as an ordered vertex cycle.
    fn boundary_loops(&self) -> Vec<Vec<usize>> {
        let mut directed: HashMap<(usize, usize), usize> = HashMap::new();
        for t in &self.triangles {
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                *directed.entry((a, b)).or_insert(0) += 1;
            }
        }

        // A boundary edge appears exactly once with no opposing half-edge.
        let mut successor: HashMap<usize, Option<usize>> = HashMap::new();
        for (&(a, b), &count) in &directed {
            if count == 1 && !directed.contains_key(&(b, a)) {
                match successor.entry(a) {
                    // Two outgoing boundary edges: non-manifold boundary vertex.
                    Entry::Occupied(mut entry) => {
                        entry.insert(None);
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(Some(b));
                    }
                }
            }
        }

        let mut loops = Vec::new();
        let mut visited = std::collections::HashSet::new();
        let mut starts: Vec<usize> = successor.keys().copied().collect();
        starts.sort_unstable();

        'outer: for start in starts {
            if visited.contains(&start) {
                continue;
            }
            let mut cycle = vec![start];
            let mut current = start;
            loop {
                let next = match successor.get(&current) {
                    Some(Some(next)) => *next,
                    _ => continue 'outer,
                };
                if next == start {
                    break;
                }
                if visited.contains(&next) || cycle.contains(&next) {
                    continue 'outer;
                }
                cycle.push(next);
                current = next;
            }
            if cycle.len() >= 3 {
                for &v in &cycle {
                    visited.insert(v);
                }
                loops.push(cycle);
            }
        }

        loops
    }

    // Unique vertex adjacency over triangle edges.
    fn vertex_neighbours(&self) -> Vec<Vec<usize>> {
        let mut neighbours = vec![Vec::new(); self.vertices.len()];
        for t in &self.triangles {
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                neighbours[a].push(b);
                neighbours[b].push(a);
            }
        }
        for list in &mut neighbours {
            list.sort_unstable();
            list.dedup();
        }
        neighbours
    }

    // Keep the vertices listed in `keep` (old indices), rewriting triangles
    // through `remap` (old index -> new index).
    fn apply_vertex_selection(&mut self, keep: &[usize], remap: &[usize]) {
        self.vertices = keep.iter().map(|&i| self.vertices[i]).collect();
        if let Some(colors) = self.colors.take() {
            self.colors = Some(keep.iter().map(|&i| colors[i]).collect());
        }
        if let Some(normals) = self.normals.take() {
            self.normals = Some(keep.iter().map(|&i| normals[i]).collect());
        }
        for t in &mut self.triangles {
            for i in t.iter_mut() {
                *i = remap[*i];
            }
        }
    }
}

// Cross-product area vector of a triangle (length = 2x area).
fn triangle_area_vector(vertices: &[[f64; 3]], t: &[usize; 3]) -> DVec3 {
    let v0 = DVec3::from_array(vertices[t[0]]);
    let v1 = DVec3::from_array(vertices[t[1]]);
    let v2 = DVec3::from_array(vertices[t[2]]);
    (v1 - v0).cross(v2 - v0)
}

// Undirected edges of a triangle, endpoints ordered.
fn triangle_edges(t: &[usize; 3]) -> [(usize, usize); 3] {
    let edge = |a: usize, b: usize| if a < b { (a, b) } else { (b, a) };
    [
        edge(t[0], t[1]),
        edge(t[1], t[2]),
        edge(t[2], t[0]),
    ]
}

use scanforge_3d::mesh::TriangleMesh;

/// Apply the fixed mesh cleanup sequence in place.
///
/// Topological repairs run first, smoothing and hole filling are gated on
/// their parameters, and vertex normals are recomputed last.
pub fn clean_mesh(mesh: &mut TriangleMesh, smooth_iterations: usize, fill_hole_radius: f64) {
    mesh.remove_degenerate_triangles();
    mesh.remove_duplicated_triangles();
    mesh.remove_duplicated_vertices();
    mesh.remove_non_manifold_edges();
    mesh.remove_unreferenced_vertices();
    if smooth_iterations > 0 {
        mesh.filter_smooth_taubin(smooth_iterations);
    }
    if fill_hole_radius > 0.0 {
        mesh.fill_holes(fill_hole_radius);
    }
    mesh.compute_vertex_normals();
}

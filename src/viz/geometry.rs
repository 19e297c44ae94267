//! Shared mesh primitives for the visualization scene.
//!
//! Three meshes cover every mode: a UV sphere (orb, particles, matrix
//! pillars reuse the cube), a unit cube (bars, cube, tunnel segments,
//! matrix), and a flat disc (vinyl platter and label). All are unit-ish
//! sized and scaled per instance.

use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};

/// Vertex data shared by all meshes (position + normal + UV)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// CPU-side mesh ready for upload.
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// Unit-radius UV sphere centered at the origin.
///
/// Ring/segment layout keeps vertex order stable so radial deformation
/// can rewrite positions in place each frame.
pub fn uv_sphere(rings: usize, segments: usize) -> Mesh {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for ring in 0..=rings {
        let v = ring as f32 / rings as f32;
        let phi = v * PI;
        for segment in 0..=segments {
            let u = segment as f32 / segments as f32;
            let theta = u * 2.0 * PI;

            let x = phi.sin() * theta.cos();
            let y = phi.cos();
            let z = phi.sin() * theta.sin();

            vertices.push(Vertex {
                position: [x, y, z],
                // Unit sphere: the normal is the position.
                normal: [x, y, z],
                uv: [u, v],
            });
        }
    }

    for ring in 0..rings {
        for segment in 0..segments {
            let top_left = (ring * (segments + 1) + segment) as u32;
            let top_right = top_left + 1;
            let bottom_left = ((ring + 1) * (segments + 1) + segment) as u32;
            let bottom_right = bottom_left + 1;

            indices.extend_from_slice(&[
                top_left,
                bottom_left,
                top_right,
                top_right,
                bottom_left,
                bottom_right,
            ]);
        }
    }

    Mesh { vertices, indices }
}

/// Axis-aligned unit cube centered at the origin, flat-shaded (four
/// vertices per face so normals stay crisp).
pub fn cube() -> Mesh {
    // Per-face: normal, then four corners counter-clockwise when viewed
    // from outside.
    const FACES: [([f32; 3], [[f32; 3]; 4]); 6] = [
        (
            [0.0, 0.0, 1.0],
            [
                [-0.5, -0.5, 0.5],
                [0.5, -0.5, 0.5],
                [0.5, 0.5, 0.5],
                [-0.5, 0.5, 0.5],
            ],
        ),
        (
            [0.0, 0.0, -1.0],
            [
                [0.5, -0.5, -0.5],
                [-0.5, -0.5, -0.5],
                [-0.5, 0.5, -0.5],
                [0.5, 0.5, -0.5],
            ],
        ),
        (
            [1.0, 0.0, 0.0],
            [
                [0.5, -0.5, 0.5],
                [0.5, -0.5, -0.5],
                [0.5, 0.5, -0.5],
                [0.5, 0.5, 0.5],
            ],
        ),
        (
            [-1.0, 0.0, 0.0],
            [
                [-0.5, -0.5, -0.5],
                [-0.5, -0.5, 0.5],
                [-0.5, 0.5, 0.5],
                [-0.5, 0.5, -0.5],
            ],
        ),
        (
            [0.0, 1.0, 0.0],
            [
                [-0.5, 0.5, 0.5],
                [0.5, 0.5, 0.5],
                [0.5, 0.5, -0.5],
                [-0.5, 0.5, -0.5],
            ],
        ),
        (
            [0.0, -1.0, 0.0],
            [
                [-0.5, -0.5, -0.5],
                [0.5, -0.5, -0.5],
                [0.5, -0.5, 0.5],
                [-0.5, -0.5, 0.5],
            ],
        ),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, corners) in FACES {
        let base = vertices.len() as u32;
        for (i, corner) in corners.iter().enumerate() {
            let uv = match i {
                0 => [0.0, 1.0],
                1 => [1.0, 1.0],
                2 => [1.0, 0.0],
                _ => [0.0, 0.0],
            };
            vertices.push(Vertex {
                position: *corner,
                normal,
                uv,
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    Mesh { vertices, indices }
}

/// Unit-radius disc in the XZ plane facing +Y, UV-mapped so a square
/// texture lands centered on the face (vinyl label).
pub fn disc(segments: usize) -> Mesh {
    let mut vertices = Vec::with_capacity(segments + 2);
    let mut indices = Vec::with_capacity(segments * 3);

    vertices.push(Vertex {
        position: [0.0, 0.0, 0.0],
        normal: [0.0, 1.0, 0.0],
        uv: [0.5, 0.5],
    });

    for segment in 0..=segments {
        let theta = segment as f32 / segments as f32 * 2.0 * PI;
        let (sin, cos) = theta.sin_cos();
        vertices.push(Vertex {
            position: [cos, 0.0, sin],
            normal: [0.0, 1.0, 0.0],
            uv: [0.5 + cos * 0.5, 0.5 + sin * 0.5],
        });
    }

    for segment in 0..segments as u32 {
        // Winding keeps +Y as the front face.
        indices.extend_from_slice(&[0, segment + 2, segment + 1]);
    }

    Mesh { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_sphere_counts_and_radius() {
        let mesh = uv_sphere(16, 24);
        assert_eq!(mesh.vertices.len(), 17 * 25);
        assert_eq!(mesh.indices.len(), 16 * 24 * 6);

        for vertex in &mesh.vertices {
            let radius = Vec3::from_array(vertex.position).length();
            assert!((radius - 1.0).abs() < 1e-4, "radius {radius}");
        }
    }

    #[test]
    fn test_cube_is_unit_sized() {
        let mesh = cube();
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        for vertex in &mesh.vertices {
            for &coord in &vertex.position {
                assert!((coord.abs() - 0.5).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_disc_lies_flat() {
        let mesh = disc(32);
        assert_eq!(mesh.vertices.len(), 34);
        assert_eq!(mesh.indices.len(), 32 * 3);
        for vertex in &mesh.vertices {
            assert_eq!(vertex.position[1], 0.0);
            assert_eq!(vertex.normal, [0.0, 1.0, 0.0]);
        }
    }

    #[test]
    fn test_indices_in_bounds() {
        for mesh in [uv_sphere(8, 12), cube(), disc(16)] {
            let max = mesh.vertices.len() as u32;
            assert!(mesh.indices.iter().all(|&i| i < max));
        }
    }
}

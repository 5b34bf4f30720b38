//! CPU-side mesh representation used by loaders.

/// Vertex with position/normal/uv. Values are in object space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Indexed triangle mesh with tightly-packed vertices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Returns `true` if both buffers are non-empty and every index hits a vertex.
    pub fn is_valid(&self) -> bool {
        !self.vertices.is_empty()
            && !self.indices.is_empty()
            && self.indices.len() % 3 == 0
            && self
                .indices
                .iter()
                .all(|&i| (i as usize) < self.vertices.len())
    }

    /// Replace normals with area-weighted face normals averaged per vertex.
    pub fn compute_normals(&mut self) {
        let mut acc = vec![[0.0f32; 3]; self.vertices.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if a >= acc.len() || b >= acc.len() || c >= acc.len() {
                continue;
            }
            let pa = self.vertices[a].position;
            let pb = self.vertices[b].position;
            let pc = self.vertices[c].position;
            let e1 = [pb[0] - pa[0], pb[1] - pa[1], pb[2] - pa[2]];
            let e2 = [pc[0] - pa[0], pc[1] - pa[1], pc[2] - pa[2]];
            let n = [
                e1[1] * e2[2] - e1[2] * e2[1],
                e1[2] * e2[0] - e1[0] * e2[2],
                e1[0] * e2[1] - e1[1] * e2[0],
            ];
            for v in [a, b, c] {
                for k in 0..3 {
                    acc[v][k] += n[k];
                }
            }
        }
        for (vertex, n) in self.vertices.iter_mut().zip(acc) {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            vertex.normal = if len > f32::EPSILON {
                [n[0] / len, n[1] / len, n[2] / len]
            } else {
                [0.0, 1.0, 0.0]
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_data_validity() {
        let data = MeshData::new(vec![MeshVertex::default(); 3], vec![0, 1, 2]);
        assert!(data.is_valid());

        let dangling = MeshData::new(vec![MeshVertex::default()], vec![0, 1, 2]);
        assert!(!dangling.is_valid());
    }

    #[test]
    fn computed_normals_follow_winding() {
        let mut data = MeshData::new(
            vec![
                MeshVertex::new([0.0, 0.0, 0.0], [0.0; 3], [0.0; 2]),
                MeshVertex::new([1.0, 0.0, 0.0], [0.0; 3], [0.0; 2]),
                MeshVertex::new([0.0, 1.0, 0.0], [0.0; 3], [0.0; 2]),
            ],
            vec![0, 1, 2],
        );
        data.compute_normals();
        for v in &data.vertices {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
    }
}

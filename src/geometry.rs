//! CPU-side triangle geometry and STL parsing.

use std::io::{Read, Seek};
use std::path::Path;

use glam::Vec3;

use crate::error::AssetError;
use crate::gpu::GpuContext;
use crate::mesh::{Mesh, Vertex3d};

/// Indexed triangles held in memory before upload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawGeometry {
    pub vertices: Vec<Vertex3d>,
    pub indices: Vec<u32>,
}

impl RawGeometry {
    pub fn new(vertices: Vec<Vertex3d>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Axis-aligned `(min, max)` corners, or `None` without vertices.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut positions = self.vertices.iter().map(|v| Vec3::from(v.position));
        let first = positions.next()?;
        Some(positions.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
    }

    /// Replace every normal with the area-weighted average of its faces.
    pub fn recalculate_normals(&mut self) {
        for v in &mut self.vertices {
            v.normal = [0.0; 3];
        }

        for tri in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if i0.max(i1).max(i2) >= self.vertices.len() {
                continue;
            }
            let p0 = Vec3::from(self.vertices[i0].position);
            let p1 = Vec3::from(self.vertices[i1].position);
            let p2 = Vec3::from(self.vertices[i2].position);
            // Unnormalized, so larger faces weigh more
            let face = (p1 - p0).cross(p2 - p0);
            for i in [i0, i1, i2] {
                let n = Vec3::from(self.vertices[i].normal) + face;
                self.vertices[i].normal = n.into();
            }
        }

        for v in &mut self.vertices {
            v.normal = Vec3::from(v.normal).normalize_or_zero().into();
        }
    }

    pub fn upload(&self, gpu: &GpuContext) -> Mesh {
        Mesh::new(gpu, &self.vertices, &self.indices)
    }

    /// Read an STL file (binary or ASCII).
    pub fn from_stl_file(path: &Path) -> Result<Self, AssetError> {
        let file = std::fs::File::open(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = std::io::BufReader::new(file);
        Self::parse_stl(&mut reader).map_err(|message| AssetError::Stl {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse STL data. Faces keep their file normals and get zero UVs.
    pub fn parse_stl<R: Read + Seek>(reader: &mut R) -> Result<Self, String> {
        let stl = stl_io::read_stl(reader).map_err(|e| e.to_string())?;

        let mut vertices = Vec::with_capacity(stl.faces.len() * 3);
        let mut indices = Vec::with_capacity(stl.faces.len() * 3);

        for face in &stl.faces {
            let normal: [f32; 3] = face.normal.into();
            for &vertex_idx in &face.vertices {
                let position = stl
                    .vertices
                    .get(vertex_idx)
                    .ok_or_else(|| format!("face references missing vertex {vertex_idx}"))?;
                indices.push(vertices.len() as u32);
                vertices.push(Vertex3d::new((*position).into(), normal, [0.0, 0.0]));
            }
        }

        let mut geometry = Self::new(vertices, indices);
        // Some exporters write zero normals
        if geometry
            .vertices
            .iter()
            .any(|v| Vec3::from(v.normal).length_squared() < 1e-12)
        {
            geometry.recalculate_normals();
        }
        Ok(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASCII_TRIANGLE: &str = "solid tri
facet normal 0 0 1
  outer loop
    vertex 0 0 0
    vertex 1 0 0
    vertex 0 1 0
  endloop
endfacet
endsolid tri
";

    #[test]
    fn bounds_cover_all_vertices() {
        let geom = RawGeometry::new(
            vec![
                Vertex3d::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
                Vertex3d::new([1.0, 2.0, 3.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
                Vertex3d::new([-1.0, -1.0, -1.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            ],
            vec![0, 1, 2],
        );
        assert_eq!(
            geom.bounds(),
            Some((Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 2.0, 3.0)))
        );
        assert_eq!(RawGeometry::default().bounds(), None);
    }

    #[test]
    fn recalculated_normals_face_outward_for_ccw_triangles() {
        let mut geom = RawGeometry::new(
            vec![
                Vertex3d::new([0.0, 0.0, 0.0], [0.0; 3], [0.0, 0.0]),
                Vertex3d::new([1.0, 0.0, 0.0], [0.0; 3], [0.0, 0.0]),
                Vertex3d::new([0.0, 1.0, 0.0], [0.0; 3], [0.0, 0.0]),
            ],
            vec![0, 1, 2],
        );
        geom.recalculate_normals();
        for v in &geom.vertices {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn out_of_range_indices_are_skipped() {
        let mut geom = RawGeometry::new(
            vec![Vertex3d::new([0.0, 0.0, 0.0], [0.0; 3], [0.0, 0.0])],
            vec![0, 1, 2],
        );
        geom.recalculate_normals();
        assert_eq!(geom.vertices[0].normal, [0.0; 3]);
    }

    #[test]
    fn parses_ascii_stl() {
        let mut cursor = std::io::Cursor::new(ASCII_TRIANGLE.as_bytes());
        let geom = RawGeometry::parse_stl(&mut cursor).expect("valid stl");
        assert_eq!(geom.indices, vec![0, 1, 2]);
        assert_eq!(geom.vertices.len(), 3);
        assert_eq!(geom.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(geom.vertices[0].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn missing_stl_file_is_an_io_error() {
        let err = RawGeometry::from_stl_file(Path::new("definitely/not/here.stl")).unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
    }
}

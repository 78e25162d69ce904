use crate::error::BuildError;
use crate::feature::{Point, distance_to_polyline};
use crate::network::{Network, NodeRole};
use std::collections::{HashMap, HashSet};

// 2D computational mesh. Vertices and faces carry explicit identifiers:
// imported meshes keep the identifiers of their source artifact, generated
// meshes get fresh sequential ones.
#[derive(Debug, Clone, Default)]
pub struct Mesh2d {
    pub vertices: Vec<Point>,
    pub vertex_ids: Vec<i64>,
    // Face connectivity as indices into `vertices`.
    pub faces: Vec<Vec<usize>>,
    pub face_ids: Vec<i64>,
}

// Explicit 1D-node-to-2D-face coupling. Links are recorded here, never
// inferred by the simulator at run time.
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingLink {
    pub node_id: String,
    pub face_id: i64,
}

impl Mesh2d {
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn face_center(&self, face: usize) -> Point {
        let verts = &self.faces[face];
        let n = verts.len() as f64;
        let (sx, sy) = verts
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &v| (sx + self.vertices[v].x, sy + self.vertices[v].y));
        Point::new(sx / n, sy / n)
    }

    pub fn max_face_nodes(&self) -> usize {
        self.faces.iter().map(|f| f.len()).max().unwrap_or(0)
    }

    // Generate a regular quad mesh over the network extent. Cells whose
    // center lies farther than `buffer` from every branch are clipped.
    // Identifiers are assigned sequentially from 1.
    pub fn generate(network: &Network, cell_size: f64, buffer: f64) -> Self {
        let mut mesh = Mesh2d::default();
        let points: Vec<&Point> = network
            .branches
            .iter()
            .flat_map(|b| b.geometry.iter())
            .collect();
        if points.is_empty() || cell_size <= 0.0 {
            return mesh;
        }
        let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min) - buffer;
        let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max) + buffer;
        let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min) - buffer;
        let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max) + buffer;

        let nx = ((max_x - min_x) / cell_size).ceil() as usize;
        let ny = ((max_y - min_y) / cell_size).ceil() as usize;

        let mut vertex_lookup: HashMap<(usize, usize), usize> = HashMap::new();
        for iy in 0..ny {
            for ix in 0..nx {
                let cx = min_x + (ix as f64 + 0.5) * cell_size;
                let cy = min_y + (iy as f64 + 0.5) * cell_size;
                let center = Point::new(cx, cy);
                let near = network
                    .branches
                    .iter()
                    .any(|b| distance_to_polyline(&center, &b.geometry) <= buffer);
                if !near {
                    continue;
                }
                // Counter-clockwise corner order
                let corners = [(ix, iy), (ix + 1, iy), (ix + 1, iy + 1), (ix, iy + 1)];
                let face: Vec<usize> = corners
                    .iter()
                    .map(|&(gx, gy)| {
                        *vertex_lookup.entry((gx, gy)).or_insert_with(|| {
                            mesh.vertices.push(Point::new(
                                min_x + gx as f64 * cell_size,
                                min_y + gy as f64 * cell_size,
                            ));
                            mesh.vertex_ids.push(mesh.vertices.len() as i64);
                            mesh.vertices.len() - 1
                        })
                    })
                    .collect();
                mesh.faces.push(face);
                mesh.face_ids.push(mesh.faces.len() as i64);
            }
        }
        mesh
    }

    // Import a mesh from a prior artifact, keeping its identifiers.
    pub fn import(
        vertices: Vec<Point>,
        vertex_ids: Vec<i64>,
        faces: Vec<Vec<usize>>,
        face_ids: Vec<i64>,
    ) -> Result<Self, BuildError> {
        if vertices.len() != vertex_ids.len() || faces.len() != face_ids.len() {
            return Err(BuildError::geometry(
                "mesh2d",
                "identifier count does not match vertex/face count",
            ));
        }
        for face in &faces {
            if face.len() < 3 {
                return Err(BuildError::geometry("mesh2d", "face with fewer than 3 vertices"));
            }
            if face.iter().any(|&v| v >= vertices.len()) {
                return Err(BuildError::geometry(
                    "mesh2d",
                    "face references a vertex outside the mesh",
                ));
            }
        }
        let unique: HashSet<&i64> = face_ids.iter().collect();
        if unique.len() != face_ids.len() {
            return Err(BuildError::geometry("mesh2d", "duplicate face identifiers"));
        }
        Ok(Mesh2d {
            vertices,
            vertex_ids,
            faces,
            face_ids,
        })
    }

    // Extend this mesh with another, keeping both sides' identifiers.
    pub fn merge(&mut self, other: Mesh2d) -> Result<(), BuildError> {
        let existing: HashSet<i64> = self.face_ids.iter().copied().collect();
        if other.face_ids.iter().any(|id| existing.contains(id)) {
            return Err(BuildError::geometry(
                "mesh2d",
                "face identifier collision while merging meshes",
            ));
        }
        let offset = self.vertices.len();
        self.vertices.extend(other.vertices);
        self.vertex_ids.extend(other.vertex_ids);
        for face in other.faces {
            self.faces.push(face.into_iter().map(|v| v + offset).collect());
        }
        self.face_ids.extend(other.face_ids);
        Ok(())
    }
}

// Couple each 1D node to the nearest 2D face within `max_distance`. Links
// landing on boundary-condition nodes are dropped again: a link next to a
// forced node would short-circuit the boundary.
pub fn generate_coupling_links(
    network: &Network,
    mesh: &Mesh2d,
    max_distance: f64,
) -> (Vec<CouplingLink>, usize) {
    let mut links = Vec::new();
    let mut removed = 0;
    if mesh.is_empty() {
        return (links, removed);
    }
    let centers: Vec<Point> = (0..mesh.faces.len()).map(|i| mesh.face_center(i)).collect();

    for node in &network.nodes {
        let pt = Point::new(node.x, node.y);
        let nearest = centers
            .iter()
            .enumerate()
            .map(|(i, c)| (i, pt.distance(c)))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        let Some((face, dist)) = nearest else {
            continue;
        };
        if dist > max_distance {
            continue;
        }
        if node.role == NodeRole::Boundary {
            removed += 1;
            continue;
        }
        links.push(CouplingLink {
            node_id: node.id.clone(),
            face_id: mesh.face_ids[face],
        });
    }
    (links, removed)
}

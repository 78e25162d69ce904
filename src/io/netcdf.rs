use crate::error::BuildResult;
use crate::mesh::{CouplingLink, Mesh2d};
use crate::network::Network;
use netcdf::{self};
use std::collections::HashMap;
use std::path::Path;

const FACE_FILL: i32 = -999;

// Write the network/geometry file: 1D node coordinates and edge
// connectivity, plus the 2D mesh and 1d2d links when present. Node
// coordinates go out exactly as stored, no rounding.
pub fn write_net_file(
    path: &Path,
    network: &Network,
    mesh: Option<&Mesh2d>,
    links: &[CouplingLink],
) -> BuildResult<()> {
    let mut file = netcdf::create(path)?;

    // 1D network
    file.add_dimension("network_node", network.nodes.len())?;
    file.add_dimension("network_edge", network.branches.len())?;
    file.add_dimension("two", 2)?;

    let node_x: Vec<f64> = network.nodes.iter().map(|n| n.x).collect();
    let node_y: Vec<f64> = network.nodes.iter().map(|n| n.y).collect();

    let mut x_var = file.add_variable::<f64>("network_node_x", &["network_node"])?;
    x_var.put_attribute("standard_name", "projection_x_coordinate")?;
    x_var.put_attribute("units", "m")?;
    x_var.put_values(&node_x, ..)?;

    let mut y_var = file.add_variable::<f64>("network_node_y", &["network_node"])?;
    y_var.put_attribute("standard_name", "projection_y_coordinate")?;
    y_var.put_attribute("units", "m")?;
    y_var.put_values(&node_y, ..)?;

    let mut edge_var =
        file.add_variable::<i32>("network_edge_nodes", &["network_edge", "two"])?;
    edge_var.put_attribute("long_name", "start and end node of each branch")?;
    edge_var.put_attribute("start_index", 0)?;
    for (i, branch) in network.branches.iter().enumerate() {
        let pair = [branch.up_node as i32, branch.down_node as i32];
        edge_var.put_values(&pair, (i..i + 1, ..))?;
    }

    let mut length_var = file.add_variable::<f64>("network_edge_length", &["network_edge"])?;
    length_var.put_attribute("long_name", "branch length along the geometry")?;
    length_var.put_attribute("units", "m")?;
    let lengths: Vec<f64> = network.branches.iter().map(|b| b.length).collect();
    length_var.put_values(&lengths, ..)?;

    // 2D mesh
    if let Some(mesh) = mesh {
        if !mesh.is_empty() {
            file.add_dimension("mesh2d_node", mesh.vertices.len())?;
            file.add_dimension("mesh2d_face", mesh.faces.len())?;
            file.add_dimension("mesh2d_max_face_nodes", mesh.max_face_nodes())?;

            let vx: Vec<f64> = mesh.vertices.iter().map(|p| p.x).collect();
            let vy: Vec<f64> = mesh.vertices.iter().map(|p| p.y).collect();

            let mut mvx = file.add_variable::<f64>("mesh2d_node_x", &["mesh2d_node"])?;
            mvx.put_attribute("units", "m")?;
            mvx.put_values(&vx, ..)?;

            let mut mvy = file.add_variable::<f64>("mesh2d_node_y", &["mesh2d_node"])?;
            mvy.put_attribute("units", "m")?;
            mvy.put_values(&vy, ..)?;

            let mut face_id_var = file.add_variable::<i64>("mesh2d_face_id", &["mesh2d_face"])?;
            face_id_var.put_attribute("long_name", "face identifier")?;
            face_id_var.put_values(&mesh.face_ids, ..)?;

            let mut face_var = file
                .add_variable::<i32>("mesh2d_face_nodes", &["mesh2d_face", "mesh2d_max_face_nodes"])?;
            face_var.put_attribute("_FillValue", FACE_FILL)?;
            face_var.put_attribute("start_index", 0)?;
            let width = mesh.max_face_nodes();
            for (i, face) in mesh.faces.iter().enumerate() {
                let mut row = vec![FACE_FILL; width];
                for (j, &v) in face.iter().enumerate() {
                    row[j] = v as i32;
                }
                face_var.put_values(&row, (i..i + 1, ..))?;
            }
        }
    }

    // 1d2d coupling links
    if !links.is_empty() {
        let node_lookup: HashMap<&str, usize> = network
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();
        file.add_dimension("link1d2d", links.len())?;

        let mut link_node_var = file.add_variable::<i32>("link1d2d_node", &["link1d2d"])?;
        link_node_var.put_attribute("long_name", "1D node index of each coupling link")?;
        link_node_var.put_attribute("start_index", 0)?;
        let link_nodes: Vec<i32> = links
            .iter()
            .map(|l| node_lookup.get(l.node_id.as_str()).copied().unwrap_or(0) as i32)
            .collect();
        link_node_var.put_values(&link_nodes, ..)?;

        let mut link_face_var = file.add_variable::<i64>("link1d2d_face", &["link1d2d"])?;
        link_face_var.put_attribute("long_name", "2D face identifier of each coupling link")?;
        let link_faces: Vec<i64> = links.iter().map(|l| l.face_id).collect();
        link_face_var.put_values(&link_faces, ..)?;
    }

    file.add_attribute("Conventions", "CF-1.8 UGRID-1.0")?;
    file.add_attribute("title", "1D network and 2D mesh geometry")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::ChannelFeature;
    use crate::feature::Point;
    use crate::network::NetworkBuilder;

    fn channel(code: &str, pts: &[(f64, f64)]) -> ChannelFeature {
        ChannelFeature {
            code: code.to_string(),
            geometry: pts.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            friction_type: "Manning".to_string(),
            friction_value: 0.03,
            order: 0,
        }
    }

    #[test]
    fn test_all_node_coordinates_written() {
        let outcome = NetworkBuilder::new(0.1).build(&[
            channel("a", &[(0.0, 0.0), (100.0, 0.0)]),
            channel("b", &[(100.0, 0.0), (200.0, 50.0)]),
        ]);
        let network = outcome.network;
        assert_eq!(network.nodes.len(), 3);

        let path = std::env::temp_dir().join("hydronet_net_nodes_test.nc");
        let _ = std::fs::remove_file(&path);
        write_net_file(&path, &network, None, &[]).unwrap();

        let file = netcdf::open(&path).unwrap();
        let x_var = file.variable("network_node_x").unwrap();
        let xs = x_var.get_values::<f64, _>(..).unwrap();
        // Every node's x must appear, including intermediate junctions.
        assert_eq!(xs.len(), 3);
        for node in &network.nodes {
            assert!(xs.iter().any(|&x| (x - node.x).abs() < 1e-9));
        }
        let edge_var = file.variable("network_edge_nodes").unwrap();
        let edges = edge_var.get_values::<i32, _>(..).unwrap();
        assert_eq!(edges.len(), 4);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_mesh_and_links_written() {
        let outcome = NetworkBuilder::new(0.1)
            .build(&[channel("a", &[(0.0, 0.0), (100.0, 0.0)])]);
        let network = outcome.network;
        let mesh = Mesh2d::generate(&network, 50.0, 50.0);
        assert!(!mesh.is_empty());
        let links = vec![CouplingLink {
            node_id: network.nodes[0].id.clone(),
            face_id: mesh.face_ids[0],
        }];

        let path = std::env::temp_dir().join("hydronet_net_mesh_test.nc");
        let _ = std::fs::remove_file(&path);
        write_net_file(&path, &network, Some(&mesh), &links).unwrap();

        let file = netcdf::open(&path).unwrap();
        assert!(file.variable("mesh2d_face_nodes").is_some());
        let link_var = file.variable("link1d2d_face").unwrap();
        let faces = link_var.get_values::<i64, _>(..).unwrap();
        assert_eq!(faces, vec![mesh.face_ids[0]]);
        std::fs::remove_file(&path).unwrap();
    }
}

use crate::error::BuildError;
use crate::feature::{
    ChannelFeature, Point, distance_to_polyline, polyline_length, project_chainage, segments_cross,
};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Connection,
    Boundary,
    StructureAnchor,
}

// Computation point of the 1D network. Nodes live in a flat arena and are
// referenced by index; identifiers stay stable across the build.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub bed_level: Option<f64>,
    pub role: NodeRole,
}

// Directed channel reach between two nodes. Direction follows the
// digitized line direction.
#[derive(Debug, Clone)]
pub struct Branch {
    pub id: String,
    pub geometry: Vec<Point>,
    pub up_node: usize,
    pub down_node: usize,
    pub length: f64,
    pub order: i32,
    pub friction_type: String,
    pub friction_value: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Network {
    pub nodes: Vec<Node>,
    pub branches: Vec<Branch>,
    branch_index: HashMap<String, usize>,
    node_index: HashMap<String, usize>,
}

impl Network {
    pub fn branch(&self, id: &str) -> Option<&Branch> {
        self.branch_index.get(id).map(|&i| &self.branches[i])
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn node_id(&self, idx: usize) -> &str {
        &self.nodes[idx].id
    }

    // Branch nearest to a point, with the distance to it.
    pub fn nearest_branch(&self, pt: &Point) -> Option<(usize, f64)> {
        self.branches
            .iter()
            .enumerate()
            .map(|(i, b)| (i, distance_to_polyline(pt, &b.geometry)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    // Locate a point on the network: nearest branch id plus the chainage of
    // the projection. Structures and cross-sections anchor through this.
    pub fn locate(&self, pt: &Point) -> Option<(String, f64)> {
        let (idx, _) = self.nearest_branch(pt)?;
        let branch = &self.branches[idx];
        let chainage = project_chainage(pt, &branch.geometry);
        Some((branch.id.clone(), chainage))
    }

    pub fn nearest_node(&self, pt: &Point) -> Option<(usize, f64)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (i, pt.distance(&Point::new(n.x, n.y))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn mark_boundary(&mut self, node_idx: usize) {
        self.nodes[node_idx].role = NodeRole::Boundary;
    }

    pub fn node_degree(&self, node_idx: usize) -> usize {
        self.branches
            .iter()
            .filter(|b| b.up_node == node_idx || b.down_node == node_idx)
            .count()
    }

    pub fn total_length(&self) -> f64 {
        self.branches.iter().map(|b| b.length).sum()
    }
}

#[derive(Debug)]
pub struct NetworkBuildOutcome {
    pub network: Network,
    // Per-feature rejections: the caller gets the partial network and the
    // reasons, the build never aborts on a single bad channel.
    pub rejected: Vec<BuildError>,
}

pub struct NetworkBuilder {
    // Endpoints closer than this collapse into one node.
    pub merge_tolerance: f64,
    // Free endpoints within this distance of an anchor point are legal
    // boundary ends instead of dangling geometry.
    pub anchor_tolerance: f64,
    anchors: Vec<Point>,
}

impl NetworkBuilder {
    pub fn new(merge_tolerance: f64) -> Self {
        NetworkBuilder {
            merge_tolerance,
            anchor_tolerance: 1.0,
            anchors: Vec::new(),
        }
    }

    // Boundary condition locations and other sanctioned free ends.
    pub fn with_anchors(mut self, anchors: Vec<Point>) -> Self {
        self.anchors = anchors;
        self
    }

    pub fn build(&self, channels: &[ChannelFeature]) -> NetworkBuildOutcome {
        let mut rejected = Vec::new();
        let mut accepted: Vec<&ChannelFeature> = Vec::new();
        let mut seen_codes: HashSet<&str> = HashSet::new();

        for feature in channels {
            match self.validate_geometry(feature) {
                Ok(()) => {
                    if !seen_codes.insert(feature.code.as_str()) {
                        rejected.push(BuildError::geometry(
                            &feature.code,
                            "duplicate channel identifier",
                        ));
                    } else {
                        accepted.push(feature);
                    }
                }
                Err(e) => rejected.push(e),
            }
        }

        // Merge coincident endpoints into shared nodes.
        let mut nodes: Vec<Node> = Vec::new();
        let mut endpoints: Vec<(usize, usize)> = Vec::new();
        for feature in &accepted {
            let first = feature.geometry[0];
            let last = *feature.geometry.last().unwrap();
            let up = self.find_or_add_node(&mut nodes, first);
            let down = self.find_or_add_node(&mut nodes, last);
            endpoints.push((up, down));
        }

        let mut degree = vec![0usize; nodes.len()];
        for &(up, down) in &endpoints {
            degree[up] += 1;
            degree[down] += 1;
        }

        // Dangling pass: endpoints nobody shares and no anchor sanctions are
        // reported, and the offending branch is withheld from the network.
        let mut kept: Vec<(usize, (usize, usize))> = Vec::new();
        for (i, feature) in accepted.iter().enumerate() {
            let (up, down) = endpoints[i];
            let mut dangling_at = None;
            for &node_idx in &[up, down] {
                if degree[node_idx] == 1 && !self.near_anchor(&nodes[node_idx]) {
                    dangling_at = Some(node_idx);
                }
            }
            match dangling_at {
                Some(node_idx) => rejected.push(BuildError::geometry(
                    &feature.code,
                    format!(
                        "dangling endpoint at ({:.2}, {:.2}): not shared with another channel and not a boundary anchor",
                        nodes[node_idx].x, nodes[node_idx].y
                    ),
                )),
                None => kept.push((i, (up, down))),
            }
        }

        // Compact the node arena to the nodes that are still referenced.
        let mut remap: HashMap<usize, usize> = HashMap::new();
        let mut network = Network::default();
        for &(_, (up, down)) in &kept {
            for &old in &[up, down] {
                if !remap.contains_key(&old) {
                    let new_idx = network.nodes.len();
                    let mut node = nodes[old].clone();
                    if self.near_anchor(&node) {
                        node.role = NodeRole::Boundary;
                    }
                    network.node_index.insert(node.id.clone(), new_idx);
                    network.nodes.push(node);
                    remap.insert(old, new_idx);
                }
            }
        }

        for (i, (up, down)) in kept {
            let feature = accepted[i];
            let branch = Branch {
                id: feature.code.clone(),
                geometry: feature.geometry.clone(),
                up_node: remap[&up],
                down_node: remap[&down],
                length: polyline_length(&feature.geometry),
                order: feature.order,
                friction_type: feature.friction_type.clone(),
                friction_value: feature.friction_value,
            };
            network.branch_index.insert(branch.id.clone(), network.branches.len());
            network.branches.push(branch);
        }

        NetworkBuildOutcome { network, rejected }
    }

    fn validate_geometry(&self, feature: &ChannelFeature) -> Result<(), BuildError> {
        let pts = &feature.geometry;
        if pts.len() < 2 {
            return Err(BuildError::geometry(
                &feature.code,
                format!("malformed line: {} coordinate(s)", pts.len()),
            ));
        }
        if polyline_length(pts) <= self.merge_tolerance {
            return Err(BuildError::geometry(&feature.code, "zero-length line"));
        }
        if pts[0].distance(pts.last().unwrap()) <= self.merge_tolerance {
            return Err(BuildError::geometry(
                &feature.code,
                "ring geometry: start and end coincide",
            ));
        }
        for i in 0..pts.len().saturating_sub(1) {
            for j in (i + 2)..pts.len().saturating_sub(1) {
                if segments_cross(&pts[i], &pts[i + 1], &pts[j], &pts[j + 1]) {
                    return Err(BuildError::geometry(
                        &feature.code,
                        "self-intersecting line",
                    ));
                }
            }
        }
        Ok(())
    }

    fn find_or_add_node(&self, nodes: &mut Vec<Node>, pt: Point) -> usize {
        for (i, node) in nodes.iter().enumerate() {
            if pt.distance(&Point::new(node.x, node.y)) <= self.merge_tolerance {
                return i;
            }
        }
        let node = Node {
            id: format!("{:.2}_{:.2}", pt.x, pt.y),
            x: pt.x,
            y: pt.y,
            bed_level: None,
            role: NodeRole::Connection,
        };
        nodes.push(node);
        nodes.len() - 1
    }

    fn near_anchor(&self, node: &Node) -> bool {
        let pt = Point::new(node.x, node.y);
        self.anchors
            .iter()
            .any(|a| a.distance(&pt) <= self.anchor_tolerance)
    }
}

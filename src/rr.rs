use crate::error::BuildError;
use crate::feature::CatchmentFeature;
use crate::network::Network;

// Catchment record of the coupled rainfall-runoff model. Linked to the 1D
// network through the shared node identifier namespace, never through a
// duplicated topology.
#[derive(Debug, Clone)]
pub struct Catchment {
    pub id: String,
    pub area_m2: f64,
    pub runoff_coefficient: f64,
    pub node_id: String,
}

// Link from a catchment outlet to its network node.
#[derive(Debug, Clone)]
pub struct RrLink {
    pub id: String,
    pub catchment_id: String,
    pub node_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct RrModel {
    pub catchments: Vec<Catchment>,
    pub links: Vec<RrLink>,
}

impl RrModel {
    // Derive catchments and links from the source features. An explicit
    // node code wins; otherwise the nearest network node is used.
    pub fn build(features: &[CatchmentFeature], network: &Network) -> (Self, Vec<BuildError>) {
        let mut model = RrModel::default();
        let mut errors = Vec::new();
        for feature in features {
            let node_id = match &feature.node_code {
                Some(code) => match network.node(code) {
                    Some(node) => node.id.clone(),
                    None => {
                        errors.push(BuildError::geometry(
                            &feature.code,
                            format!("catchment references unknown node '{code}'"),
                        ));
                        continue;
                    }
                },
                None => match network.nearest_node(&feature.centroid) {
                    Some((idx, _)) => network.node_id(idx).to_string(),
                    None => {
                        errors.push(BuildError::geometry(
                            &feature.code,
                            "no network node to link catchment to",
                        ));
                        continue;
                    }
                },
            };
            if feature.area_m2 <= 0.0 {
                errors.push(BuildError::geometry(
                    &feature.code,
                    format!("non-positive catchment area {}", feature.area_m2),
                ));
                continue;
            }
            model.links.push(RrLink {
                id: format!("lnk_{}", feature.code),
                catchment_id: feature.code.clone(),
                node_id: node_id.clone(),
            });
            model.catchments.push(Catchment {
                id: feature.code.clone(),
                area_m2: feature.area_m2,
                runoff_coefficient: feature.runoff_coefficient,
                node_id,
            });
        }
        (model, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{ChannelFeature, Point};
    use crate::network::NetworkBuilder;

    fn network() -> Network {
        let channels = vec![ChannelFeature {
            code: "ch-1".to_string(),
            geometry: vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)],
            friction_type: "manning".to_string(),
            friction_value: 0.03,
            order: 1,
        }];
        NetworkBuilder::new(0.1)
            .with_anchors(vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)])
            .build(&channels)
            .network
    }

    #[test]
    fn test_catchment_links_to_nearest_node() {
        let network = network();
        let features = vec![CatchmentFeature {
            code: "cat-1".to_string(),
            centroid: Point::new(95.0, 40.0),
            area_m2: 2.5e6,
            runoff_coefficient: 0.6,
            node_code: None,
        }];
        let (model, errors) = RrModel::build(&features, &network);
        assert!(errors.is_empty());
        assert_eq!(model.catchments.len(), 1);
        assert_eq!(model.catchments[0].node_id, "100.00_0.00");
        assert_eq!(model.links[0].node_id, model.catchments[0].node_id);
    }

    #[test]
    fn test_unknown_explicit_node_reported() {
        let network = network();
        let features = vec![CatchmentFeature {
            code: "cat-2".to_string(),
            centroid: Point::new(0.0, 0.0),
            area_m2: 1.0e6,
            runoff_coefficient: 0.5,
            node_code: Some("nope".to_string()),
        }];
        let (model, errors) = RrModel::build(&features, &network);
        assert!(model.catchments.is_empty());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_non_positive_area_rejected() {
        let network = network();
        let features = vec![CatchmentFeature {
            code: "cat-3".to_string(),
            centroid: Point::new(10.0, 0.0),
            area_m2: 0.0,
            runoff_coefficient: 0.5,
            node_code: None,
        }];
        let (_, errors) = RrModel::build(&features, &network);
        assert_eq!(errors.len(), 1);
    }
}

use crate::error::BuildError;
use crate::feature::{CrossSectionFeature, ParameterizedProfileFeature};
use crate::network::Network;
use std::collections::HashMap;

// Friction formulation, carried per definition. Source datasets deliver
// either a numeric code or a name; the simulator wants its own code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrictionType {
    Chezy,
    Manning,
    Nikuradse,
    StricklerKs,
    WhiteColebrook,
    BosBijkerk,
}

impl FrictionType {
    pub fn from_source(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "1" | "chezy" => Some(Self::Chezy),
            "2" | "manning" => Some(Self::Manning),
            "3" | "nikuradse" => Some(Self::Nikuradse),
            "4" | "stricklerks" => Some(Self::StricklerKs),
            "5" | "whitecolebrook" => Some(Self::WhiteColebrook),
            "6" | "bosbijkerk" => Some(Self::BosBijkerk),
            _ => None,
        }
    }

    pub fn simulator_code(&self) -> u8 {
        match self {
            Self::Chezy => 1,
            Self::Manning => 4,
            Self::Nikuradse => 5,
            Self::StricklerKs => 6,
            Self::WhiteColebrook => 7,
            Self::BosBijkerk => 9,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Chezy => "Chezy",
            Self::Manning => "Manning",
            Self::Nikuradse => "Nikuradse",
            Self::StricklerKs => "StricklerKs",
            Self::WhiteColebrook => "WhiteColebrook",
            Self::BosBijkerk => "BosBijkerk",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileShape {
    Yz { y: Vec<f64>, z: Vec<f64> },
    Circle { diameter: f64 },
    Rectangle { width: f64, height: f64, closed: bool },
    Trapezium {
        slope: f64,
        maximum_flow_width: f64,
        bottom_width: f64,
        closed: bool,
    },
}

#[derive(Debug, Clone)]
pub struct CrossSectionDefinition {
    pub id: String,
    pub shape: ProfileShape,
    pub friction_type: FrictionType,
    pub friction_value: f64,
}

#[derive(Debug, Clone)]
pub struct CrossSectionLocation {
    pub id: String,
    pub branch_id: String,
    pub chainage: f64,
    pub shift: f64,
    pub definition: String,
}

// Outcome of resolving a structure to a cross-section. Ambiguity never
// resolves silently: the winner is returned with a warning attached.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub definition: String,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CrossSections {
    definitions: Vec<CrossSectionDefinition>,
    definition_index: HashMap<String, usize>,
    pub locations: Vec<CrossSectionLocation>,
}

impl CrossSections {
    pub fn definition(&self, id: &str) -> Option<&CrossSectionDefinition> {
        self.definition_index.get(id).map(|&i| &self.definitions[i])
    }

    pub fn definitions(&self) -> impl Iterator<Item = &CrossSectionDefinition> {
        self.definitions.iter()
    }

    pub fn definition_count(&self) -> usize {
        self.definitions.len()
    }

    // Shape-derived names make identical profiles collapse into a single
    // definition record.
    pub fn add_circle(&mut self, diameter: f64, friction: FrictionType, value: f64) -> String {
        let id = format!("circ_d{diameter:.3}");
        self.insert(CrossSectionDefinition {
            id: id.clone(),
            shape: ProfileShape::Circle { diameter },
            friction_type: friction,
            friction_value: value,
        });
        id
    }

    pub fn add_rectangle(
        &mut self,
        width: f64,
        height: f64,
        closed: bool,
        friction: FrictionType,
        value: f64,
    ) -> String {
        let id = format!("rect_h{height:.3}_w{width:.3}");
        self.insert(CrossSectionDefinition {
            id: id.clone(),
            shape: ProfileShape::Rectangle {
                width,
                height,
                closed,
            },
            friction_type: friction,
            friction_value: value,
        });
        id
    }

    pub fn add_trapezium(
        &mut self,
        slope: f64,
        maximum_flow_width: f64,
        bottom_width: f64,
        friction: FrictionType,
        value: f64,
    ) -> String {
        let id = format!("trapz_s{slope:.1}_bw{bottom_width:.1}_fw{maximum_flow_width:.1}");
        self.insert(CrossSectionDefinition {
            id: id.clone(),
            shape: ProfileShape::Trapezium {
                slope,
                maximum_flow_width,
                bottom_width,
                closed: false,
            },
            friction_type: friction,
            friction_value: value,
        });
        id
    }

    fn insert(&mut self, def: CrossSectionDefinition) {
        if !self.definition_index.contains_key(&def.id) {
            self.definition_index
                .insert(def.id.clone(), self.definitions.len());
            self.definitions.push(def);
        }
    }

    // Convert a surveyed xyz profile into a yz definition and anchor it on
    // the nearest branch at the chainage of the profile midpoint.
    pub fn add_surveyed_profile(
        &mut self,
        feature: &CrossSectionFeature,
        network: &Network,
    ) -> Result<(), BuildError> {
        if feature.geometry.len() < 2 {
            return Err(BuildError::geometry(
                &feature.code,
                "cross-section profile needs at least two points",
            ));
        }
        let friction = FrictionType::from_source(&feature.friction_type).ok_or_else(|| {
            BuildError::geometry(
                &feature.code,
                format!("unknown friction type '{}'", feature.friction_type),
            )
        })?;

        // y = cumulative horizontal distance along the surveyed line, z as-is.
        let mut y = vec![0.0];
        for w in feature.geometry.windows(2) {
            let d = w[0].xy().distance(&w[1].xy());
            y.push(y.last().unwrap() + d);
        }
        let z: Vec<f64> = feature.geometry.iter().map(|p| p.z).collect();

        let mid = feature.geometry[feature.geometry.len() / 2].xy();
        let (branch_id, chainage) = network.locate(&mid).ok_or_else(|| {
            BuildError::geometry(&feature.code, "no branch to anchor cross-section on")
        })?;

        self.insert(CrossSectionDefinition {
            id: feature.code.clone(),
            shape: ProfileShape::Yz { y, z },
            friction_type: friction,
            friction_value: feature.friction_value,
        });
        self.locations.push(CrossSectionLocation {
            id: format!("{branch_id}_{chainage:.1}"),
            branch_id,
            chainage,
            shift: 0.0,
            definition: feature.code.clone(),
        });
        Ok(())
    }

    // Resolve the cross-section for a structure. An explicit definition id
    // wins outright; otherwise the candidates on the structure's branch are
    // ranked by chainage distance. Near-ties are reported, not swallowed.
    pub fn resolve_for_structure(
        &self,
        hint: Option<&str>,
        branch_id: &str,
        chainage: f64,
    ) -> Option<Resolution> {
        if let Some(id) = hint {
            if self.definition_index.contains_key(id) {
                return Some(Resolution {
                    definition: id.to_string(),
                    warning: None,
                });
            }
        }

        let mut candidates: Vec<&CrossSectionLocation> = self
            .locations
            .iter()
            .filter(|loc| loc.branch_id == branch_id)
            .collect();
        candidates.sort_by(|a, b| {
            (a.chainage - chainage)
                .abs()
                .total_cmp(&(b.chainage - chainage).abs())
                .then_with(|| a.definition.cmp(&b.definition))
        });

        let best = candidates.first()?;
        let warning = candidates.get(1).and_then(|second| {
            let d_best = (best.chainage - chainage).abs();
            let d_second = (second.chainage - chainage).abs();
            if (d_second - d_best).abs() <= 0.5 {
                Some(format!(
                    "ambiguous cross-section match on branch '{branch_id}' at chainage {chainage:.1}: \
                     '{}' and '{}' are equally close, picked '{}'",
                    best.definition, second.definition, best.definition
                ))
            } else {
                None
            }
        });

        Some(Resolution {
            definition: best.definition.clone(),
            warning,
        })
    }

    pub fn branches_without_cross_section(&self, network: &Network) -> Vec<String> {
        let covered: Vec<&str> = self.locations.iter().map(|l| l.branch_id.as_str()).collect();
        network
            .branches
            .iter()
            .filter(|b| !covered.contains(&b.id.as_str()))
            .map(|b| b.id.clone())
            .collect()
    }

    // Default profiles for branches lacking a surveyed section, derived from
    // parameterized channel attributes. Trapezium when embankments and
    // slopes are known, rectangle otherwise. Returns warnings for branches
    // that stay uncovered.
    pub fn add_default_profiles(
        &mut self,
        profiles: &[ParameterizedProfileFeature],
        missing_branches: &[String],
        network: &Network,
    ) -> Vec<String> {
        let mut warnings = Vec::new();
        for branch_id in missing_branches {
            let Some(branch) = network.branch(branch_id) else {
                continue;
            };
            let friction = FrictionType::from_source(&branch.friction_type)
                .unwrap_or(FrictionType::StricklerKs);

            let Some(p) = profiles.iter().find(|p| &p.branch_code == branch_id) else {
                warnings.push(format!(
                    "branch '{branch_id}' has no cross-section and no parameterized profile"
                ));
                continue;
            };
            let (Some(bottom_width), Some(bed_up), Some(bed_down)) =
                (p.bottom_width, p.bed_level_upstream, p.bed_level_downstream)
            else {
                warnings.push(format!(
                    "parameterized profile for branch '{branch_id}' is missing bed data"
                ));
                continue;
            };
            let bed = (bed_up + bed_down) / 2.0;

            let definition = match (
                p.embankment_left,
                p.embankment_right,
                p.slope_left,
                p.slope_right,
            ) {
                (Some(el), Some(er), Some(sl), Some(sr)) => {
                    let dh1 = el - bed;
                    let dh2 = er - bed;
                    let max_flow_width = bottom_width + sl * dh1 + sr * dh2;
                    let slope = (sl + sr) / 2.0;
                    self.add_trapezium(
                        (slope * 10.0).round() / 10.0,
                        (max_flow_width * 10.0).round() / 10.0,
                        (bottom_width * 1000.0).round() / 1000.0,
                        friction,
                        branch.friction_value,
                    )
                }
                _ => self.add_rectangle(
                    (bottom_width * 1000.0).round() / 1000.0,
                    5.0,
                    false,
                    friction,
                    branch.friction_value,
                ),
            };

            self.locations.push(CrossSectionLocation {
                id: format!("{branch_id}_{:.1}", branch.length / 2.0),
                branch_id: branch_id.clone(),
                chainage: branch.length / 2.0,
                shift: bed,
                definition,
            });
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{ChannelFeature, Point, Point3};
    use crate::network::NetworkBuilder;

    fn test_network() -> Network {
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
    fn test_shape_named_definitions_deduplicate() {
        let mut css = CrossSections::default();
        let a = css.add_circle(0.5, FrictionType::StricklerKs, 75.0);
        let b = css.add_circle(0.5, FrictionType::StricklerKs, 75.0);
        assert_eq!(a, b);
        assert_eq!(a, "circ_d0.500");
        assert_eq!(css.definition_count(), 1);
    }

    #[test]
    fn test_surveyed_profile_becomes_yz_on_branch() {
        let network = test_network();
        let mut css = CrossSections::default();
        let feature = CrossSectionFeature {
            code: "prof-1".to_string(),
            geometry: vec![
                Point3::new(50.0, -5.0, 2.0),
                Point3::new(50.0, 0.0, 0.5),
                Point3::new(50.0, 5.0, 2.1),
            ],
            friction_type: "2".to_string(),
            friction_value: 0.035,
        };
        css.add_surveyed_profile(&feature, &network).unwrap();

        let def = css.definition("prof-1").unwrap();
        match &def.shape {
            ProfileShape::Yz { y, z } => {
                assert_eq!(y, &vec![0.0, 5.0, 10.0]);
                assert_eq!(z, &vec![2.0, 0.5, 2.1]);
            }
            other => panic!("unexpected shape: {other:?}"),
        }
        assert_eq!(def.friction_type, FrictionType::Manning);
        assert_eq!(css.locations[0].branch_id, "ch-1");
        assert!((css.locations[0].chainage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_prefers_explicit_hint() {
        let mut css = CrossSections::default();
        css.add_circle(1.0, FrictionType::StricklerKs, 75.0);
        let res = css
            .resolve_for_structure(Some("circ_d1.000"), "ch-1", 10.0)
            .unwrap();
        assert_eq!(res.definition, "circ_d1.000");
        assert!(res.warning.is_none());
    }

    #[test]
    fn test_resolve_without_candidates_is_none() {
        let css = CrossSections::default();
        assert!(css.resolve_for_structure(None, "ch-1", 10.0).is_none());
    }

    #[test]
    fn test_ambiguous_resolution_warns() {
        let mut css = CrossSections::default();
        for (code, chainage) in [("prof-a", 40.0), ("prof-b", 60.0)] {
            css.insert(CrossSectionDefinition {
                id: code.to_string(),
                shape: ProfileShape::Rectangle {
                    width: 5.0,
                    height: 2.0,
                    closed: false,
                },
                friction_type: FrictionType::Manning,
                friction_value: 0.03,
            });
            css.locations.push(CrossSectionLocation {
                id: format!("ch-1_{chainage:.1}"),
                branch_id: "ch-1".to_string(),
                chainage,
                shift: 0.0,
                definition: code.to_string(),
            });
        }
        let res = css.resolve_for_structure(None, "ch-1", 50.0).unwrap();
        assert_eq!(res.definition, "prof-a");
        assert!(res.warning.unwrap().contains("ambiguous"));
    }

    #[test]
    fn test_default_profiles_for_uncovered_branches() {
        let network = test_network();
        let mut css = CrossSections::default();
        let missing = css.branches_without_cross_section(&network);
        assert_eq!(missing, vec!["ch-1".to_string()]);

        let profiles = vec![ParameterizedProfileFeature {
            branch_code: "ch-1".to_string(),
            bottom_width: Some(4.0),
            bed_level_upstream: Some(1.0),
            bed_level_downstream: Some(0.8),
            embankment_left: Some(2.9),
            embankment_right: Some(2.9),
            slope_left: Some(2.0),
            slope_right: Some(2.0),
        }];
        let warnings = css.add_default_profiles(&profiles, &missing, &network);
        assert!(warnings.is_empty());
        assert!(css.branches_without_cross_section(&network).is_empty());

        let def = css.definition(&css.locations[0].definition).unwrap();
        match def.shape {
            ProfileShape::Trapezium {
                slope,
                maximum_flow_width,
                bottom_width,
                ..
            } => {
                assert_eq!(slope, 2.0);
                assert_eq!(bottom_width, 4.0);
                // 4.0 + 2*2.0 + 2*2.0
                assert_eq!(maximum_flow_width, 12.0);
            }
            ref other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_default_profile_missing_data_warns() {
        let network = test_network();
        let mut css = CrossSections::default();
        let missing = css.branches_without_cross_section(&network);
        let warnings = css.add_default_profiles(&[], &missing, &network);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("ch-1"));
    }
}

use crate::config::{capacity_per_min_to_per_s, margin_cm_to_m};
use crate::crosssection::{CrossSections, FrictionType, ProfileShape};
use crate::error::BuildError;
use crate::feature::{
    BridgeFeature, CompoundFeature, CulvertFeature, CulvertShape, OrificeFeature, Point,
    PumpControlFeature, PumpFeature, WeirFeature,
};
use crate::network::Network;
use std::collections::HashMap;

// Where a structure sits in the network. Everything needed to serialize
// the record independently is resolved up front.
#[derive(Debug, Clone)]
pub struct StructureAnchor {
    pub branch_id: String,
    pub chainage: f64,
    pub location: Point,
}

#[derive(Debug, Clone)]
pub enum StructureKind {
    Bridge {
        definition: String,
        bed_level: f64,
        length: f64,
        inlet_loss: f64,
        outlet_loss: f64,
    },
    Weir {
        crest_level: f64,
        crest_width: f64,
        discharge_coeff: f64,
    },
    UniversalWeir {
        y: Vec<f64>,
        z: Vec<f64>,
        crest_level: f64,
        discharge_coeff: f64,
    },
    Orifice {
        crest_level: f64,
        gate_lower_edge: f64,
        opening_width: f64,
        contraction_coeff: f64,
    },
    Culvert {
        definition: String,
        length: f64,
        left_level: f64,
        right_level: f64,
        inlet_loss: f64,
        outlet_loss: f64,
    },
    Pump {
        // m3/s after ingest normalization
        capacity: f64,
        direction: i32,
        // Absolute suction-side elevations (m + datum)
        start_level_suction: f64,
        stop_level_suction: f64,
    },
    Compound {
        members: Vec<String>,
    },
}

impl StructureKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bridge { .. } => "bridge",
            Self::Weir { .. } => "weir",
            Self::UniversalWeir { .. } => "universalWeir",
            Self::Orifice { .. } => "orifice",
            Self::Culvert { .. } => "culvert",
            Self::Pump { .. } => "pump",
            Self::Compound { .. } => "compound",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Structure {
    pub id: String,
    pub anchor: StructureAnchor,
    pub kind: StructureKind,
}

#[derive(Debug, Default)]
pub struct StructureRegistry {
    structures: Vec<Structure>,
    index: HashMap<String, usize>,
    pub warnings: Vec<String>,
}

impl StructureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Structure> {
        self.index.get(id).map(|&i| &self.structures[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Structure> {
        self.structures.iter()
    }

    pub fn count_of(&self, type_name: &str) -> usize {
        self.structures
            .iter()
            .filter(|s| s.kind.type_name() == type_name)
            .count()
    }

    pub fn push(&mut self, structure: Structure) {
        self.index
            .insert(structure.id.clone(), self.structures.len());
        self.structures.push(structure);
    }

    fn anchor_for(&self, network: &Network, id: &str, pt: &Point) -> Result<StructureAnchor, BuildError> {
        let (branch_id, chainage) = network
            .locate(pt)
            .ok_or_else(|| BuildError::geometry(id, "no branch to anchor structure on"))?;
        Ok(StructureAnchor {
            branch_id,
            chainage,
            location: *pt,
        })
    }

    // Bridges require a resolvable cross-section; a miss is an association
    // error and the bridge is excluded from the model.
    pub fn add_bridges(
        &mut self,
        features: &[BridgeFeature],
        network: &Network,
        css: &CrossSections,
    ) -> Vec<BuildError> {
        let mut errors = Vec::new();
        for feature in features {
            let anchor = match self.anchor_for(network, &feature.code, &feature.location) {
                Ok(a) => a,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            let resolution = css.resolve_for_structure(
                feature.cross_section.as_deref(),
                &anchor.branch_id,
                anchor.chainage,
            );
            let Some(resolution) = resolution else {
                errors.push(BuildError::association(
                    &feature.code,
                    "bridge has no resolvable cross-section",
                ));
                continue;
            };
            // A branch-default rectangle or trapezium is not good enough
            // for a bridge opening; only a surveyed yz profile counts.
            let surveyed = matches!(
                css.definition(&resolution.definition).map(|d| &d.shape),
                Some(ProfileShape::Yz { .. })
            );
            if !surveyed {
                errors.push(BuildError::association(
                    &feature.code,
                    "bridge has no resolvable cross-section (only a default profile found)",
                ));
                continue;
            }
            if let Some(warning) = resolution.warning {
                self.warnings.push(warning);
            }
            self.push(Structure {
                id: feature.code.clone(),
                anchor,
                kind: StructureKind::Bridge {
                    definition: resolution.definition,
                    bed_level: feature.bed_level,
                    length: feature.length,
                    inlet_loss: feature.inlet_loss,
                    outlet_loss: feature.outlet_loss,
                },
            });
        }
        errors
    }

    // A weir with a surveyed profile becomes a universal weir and then the
    // profile is mandatory; a plain weir needs only crest level and width.
    pub fn add_weirs(
        &mut self,
        features: &[WeirFeature],
        network: &Network,
        css: &CrossSections,
    ) -> Vec<BuildError> {
        let mut errors = Vec::new();
        for feature in features {
            let anchor = match self.anchor_for(network, &feature.code, &feature.location) {
                Ok(a) => a,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            let kind = if let Some(hint) = feature.cross_section.as_deref() {
                let resolution =
                    css.resolve_for_structure(Some(hint), &anchor.branch_id, anchor.chainage);
                let Some(resolution) = resolution else {
                    errors.push(BuildError::association(
                        &feature.code,
                        format!("universal weir references unknown cross-section '{hint}'"),
                    ));
                    continue;
                };
                if let Some(warning) = resolution.warning {
                    self.warnings.push(warning);
                }
                let Some(ProfileShape::Yz { y, z }) =
                    css.definition(&resolution.definition).map(|d| &d.shape)
                else {
                    errors.push(BuildError::association(
                        &feature.code,
                        format!(
                            "universal weir needs a yz profile, '{}' is not one",
                            resolution.definition
                        ),
                    ));
                    continue;
                };
                StructureKind::UniversalWeir {
                    y: y.clone(),
                    z: z.clone(),
                    crest_level: feature.crest_level,
                    discharge_coeff: feature.discharge_coeff,
                }
            } else {
                StructureKind::Weir {
                    crest_level: feature.crest_level,
                    crest_width: feature.crest_width,
                    discharge_coeff: feature.discharge_coeff,
                }
            };
            self.push(Structure {
                id: feature.code.clone(),
                anchor,
                kind,
            });
        }
        errors
    }

    pub fn add_orifices(&mut self, features: &[OrificeFeature], network: &Network) -> Vec<BuildError> {
        let mut errors = Vec::new();
        for feature in features {
            match self.anchor_for(network, &feature.code, &feature.location) {
                Ok(anchor) => self.push(Structure {
                    id: feature.code.clone(),
                    anchor,
                    kind: StructureKind::Orifice {
                        crest_level: feature.crest_level,
                        gate_lower_edge: feature.gate_lower_edge,
                        opening_width: feature.opening_width,
                        contraction_coeff: feature.contraction_coeff,
                    },
                }),
                Err(e) => errors.push(e),
            }
        }
        errors
    }

    // Culvert length is the chainage delta of its endpoints along the owning
    // branch. The digitized barrel line routinely diverges from the
    // hydraulic length, so the raw line length is never used.
    pub fn add_culverts(
        &mut self,
        features: &[CulvertFeature],
        network: &Network,
        css: &mut CrossSections,
    ) -> Vec<BuildError> {
        let mut errors = Vec::new();
        for feature in features {
            if feature.geometry.len() < 2 {
                errors.push(BuildError::geometry(
                    &feature.code,
                    "culvert line needs two endpoints",
                ));
                continue;
            }
            let first = feature.geometry[0];
            let last = *feature.geometry.last().unwrap();
            let mid = Point::new((first.x + last.x) / 2.0, (first.y + last.y) / 2.0);
            let Some((branch_id, _)) = network.locate(&mid) else {
                errors.push(BuildError::geometry(
                    &feature.code,
                    "no branch to anchor culvert on",
                ));
                continue;
            };
            let branch = network.branch(&branch_id).unwrap();
            let chainage_start = crate::feature::project_chainage(&first, &branch.geometry);
            let chainage_end = crate::feature::project_chainage(&last, &branch.geometry);
            let length = (chainage_end - chainage_start).abs();
            if length == 0.0 {
                errors.push(BuildError::geometry(
                    &feature.code,
                    "culvert endpoints project onto the same chainage",
                ));
                continue;
            }

            let Some(shape) = CulvertShape::from_code(&feature.shape) else {
                errors.push(BuildError::geometry(
                    &feature.code,
                    format!("unknown culvert shape code '{}'", feature.shape),
                ));
                continue;
            };
            let friction = FrictionType::from_source(&feature.friction_type)
                .unwrap_or(FrictionType::StricklerKs);
            let definition = match shape {
                CulvertShape::Round => {
                    css.add_circle(feature.opening_height, friction, feature.friction_value)
                }
                CulvertShape::Rectangular => css.add_rectangle(
                    feature.opening_width,
                    feature.opening_height,
                    true,
                    friction,
                    feature.friction_value,
                ),
            };

            self.push(Structure {
                id: feature.code.clone(),
                anchor: StructureAnchor {
                    branch_id,
                    chainage: (chainage_start + chainage_end) / 2.0,
                    location: mid,
                },
                kind: StructureKind::Culvert {
                    definition,
                    length,
                    left_level: feature.left_level,
                    right_level: feature.right_level,
                    inlet_loss: feature.inlet_loss,
                    outlet_loss: feature.outlet_loss,
                },
            });
        }
        errors
    }

    // Start/stop suction levels are absolute elevations. Legacy
    // setpoint-plus-margin records are converted here, at ingest, so the
    // serialized record always carries elevations.
    pub fn add_pumps(&mut self, features: &[PumpFeature], network: &Network) -> Vec<BuildError> {
        let mut errors = Vec::new();
        for feature in features {
            let anchor = match self.anchor_for(network, &feature.code, &feature.location) {
                Ok(a) => a,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            let (start_level, stop_level) = match &feature.control {
                PumpControlFeature::Absolute {
                    start_level,
                    stop_level,
                } => (*start_level, *stop_level),
                PumpControlFeature::LegacySetpoint {
                    target_level,
                    upper_margin,
                    lower_margin,
                } => {
                    let upper = match margin_cm_to_m("bovenmarge", upper_margin) {
                        Ok(v) => v,
                        Err(e) => {
                            errors.push(e);
                            continue;
                        }
                    };
                    let lower = match margin_cm_to_m("ondermarge", lower_margin) {
                        Ok(v) => v,
                        Err(e) => {
                            errors.push(e);
                            continue;
                        }
                    };
                    (target_level + upper, target_level - lower)
                }
            };
            self.push(Structure {
                id: feature.code.clone(),
                anchor,
                kind: StructureKind::Pump {
                    capacity: capacity_per_min_to_per_s(feature.capacity),
                    direction: feature.direction,
                    start_level_suction: start_level,
                    stop_level_suction: stop_level,
                },
            });
        }
        errors
    }

    // A compound groups already-registered structures into one hydraulic
    // unit. Members must exist and share one location.
    pub fn add_compounds(
        &mut self,
        features: &[CompoundFeature],
        colocation_tolerance: f64,
    ) -> Vec<BuildError> {
        let mut errors = Vec::new();
        for feature in features {
            if feature.members.len() < 2 {
                errors.push(BuildError::composition(
                    &feature.code,
                    "a compound needs at least two members",
                ));
                continue;
            }
            let mut anchors = Vec::new();
            let mut missing = Vec::new();
            for member in &feature.members {
                match self.get(member) {
                    Some(s) => anchors.push(s.anchor.clone()),
                    None => missing.push(member.clone()),
                }
            }
            if !missing.is_empty() {
                errors.push(BuildError::composition(
                    &feature.code,
                    format!("unknown member structure(s): {}", missing.join(", ")),
                ));
                continue;
            }
            let colocated = anchors.iter().all(|a| {
                anchors
                    .iter()
                    .all(|b| a.location.distance(&b.location) <= colocation_tolerance)
            });
            if !colocated {
                errors.push(BuildError::composition(
                    &feature.code,
                    "member structures are not co-located",
                ));
                continue;
            }
            self.push(Structure {
                id: feature.code.clone(),
                anchor: anchors[0].clone(),
                kind: StructureKind::Compound {
                    members: feature.members.clone(),
                },
            });
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::ChannelFeature;
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

    fn culvert(code: &str, geometry: Vec<Point>) -> CulvertFeature {
        CulvertFeature {
            code: code.to_string(),
            geometry,
            shape: "rond".to_string(),
            opening_height: 0.8,
            opening_width: 0.0,
            left_level: 0.2,
            right_level: 0.1,
            inlet_loss: 0.6,
            outlet_loss: 1.0,
            friction_type: "4".to_string(),
            friction_value: 75.0,
        }
    }

    #[test]
    fn test_culvert_length_from_chainage_not_line_length() {
        let network = network();
        let mut css = CrossSections::default();
        let mut registry = StructureRegistry::new();

        // Digitized with a detour: raw line length is ~28 m, but the
        // endpoints are 20 m apart along the branch.
        let feature = culvert(
            "cu-1",
            vec![Point::new(40.0, 0.0), Point::new(50.0, 9.0), Point::new(60.0, 0.0)],
        );
        let errors = registry.add_culverts(&[feature], &network, &mut css);
        assert!(errors.is_empty(), "{errors:?}");

        match &registry.get("cu-1").unwrap().kind {
            StructureKind::Culvert { length, definition, .. } => {
                assert!((length - 20.0).abs() < 1e-9);
                assert_eq!(definition, "circ_d0.800");
            }
            other => panic!("unexpected kind: {other:?}"),
        }
        assert!(css.definition("circ_d0.800").is_some());
    }

    #[test]
    fn test_pump_absolute_levels_pass_through_unchanged() {
        let network = network();
        let mut registry = StructureRegistry::new();
        let feature = PumpFeature {
            code: "pmp-1".to_string(),
            location: Point::new(30.0, 0.0),
            capacity: 90.0,
            direction: 1,
            control: PumpControlFeature::Absolute {
                start_level: 1.25,
                stop_level: 0.75,
            },
        };
        let errors = registry.add_pumps(&[feature], &network);
        assert!(errors.is_empty());
        match registry.get("pmp-1").unwrap().kind {
            StructureKind::Pump {
                capacity,
                start_level_suction,
                stop_level_suction,
                ..
            } => {
                assert_eq!(start_level_suction, 1.25);
                assert_eq!(stop_level_suction, 0.75);
                // 90 m3/min -> 1.5 m3/s
                assert_eq!(capacity, 1.5);
            }
            ref other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_pump_legacy_margins_converted_at_ingest() {
        let network = network();
        let mut registry = StructureRegistry::new();
        let feature = PumpFeature {
            code: "pmp-2".to_string(),
            location: Point::new(30.0, 0.0),
            capacity: 60.0,
            direction: 1,
            control: PumpControlFeature::LegacySetpoint {
                target_level: 1.0,
                upper_margin: "25".to_string(),
                lower_margin: "10 cm".to_string(),
            },
        };
        let errors = registry.add_pumps(&[feature], &network);
        assert!(errors.is_empty());
        match registry.get("pmp-2").unwrap().kind {
            StructureKind::Pump {
                start_level_suction,
                stop_level_suction,
                ..
            } => {
                assert!((start_level_suction - 1.25).abs() < 1e-12);
                assert!((stop_level_suction - 0.90).abs() < 1e-12);
            }
            ref other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_pump_bad_margin_is_unit_conversion_error() {
        let network = network();
        let mut registry = StructureRegistry::new();
        let feature = PumpFeature {
            code: "pmp-3".to_string(),
            location: Point::new(30.0, 0.0),
            capacity: 60.0,
            direction: 1,
            control: PumpControlFeature::LegacySetpoint {
                target_level: 1.0,
                upper_margin: "onbekend".to_string(),
                lower_margin: "10".to_string(),
            },
        };
        let errors = registry.add_pumps(&[feature], &network);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], BuildError::UnitConversion { .. }));
        assert!(registry.get("pmp-3").is_none());
    }

    #[test]
    fn test_bridge_without_cross_section_rejected_others_kept() {
        let network = network();
        let css = CrossSections::default();
        let mut registry = StructureRegistry::new();

        let bad = BridgeFeature {
            code: "br-1".to_string(),
            location: Point::new(20.0, 0.0),
            bed_level: 0.5,
            length: 8.0,
            inlet_loss: 0.5,
            outlet_loss: 0.5,
            cross_section: None,
        };
        let bridge_errors = registry.add_bridges(&[bad], &network, &css);
        assert_eq!(bridge_errors.len(), 1);
        assert!(matches!(bridge_errors[0], BuildError::Association { .. }));
        assert!(registry.get("br-1").is_none());

        let weir = WeirFeature {
            code: "wr-1".to_string(),
            location: Point::new(70.0, 0.0),
            crest_level: 1.1,
            crest_width: 3.0,
            discharge_coeff: 1.0,
            cross_section: None,
        };
        let weir_errors = registry.add_weirs(&[weir], &network, &css);
        assert!(weir_errors.is_empty());
        assert!(registry.get("wr-1").is_some());
    }

    #[test]
    fn test_compound_with_scattered_members_rejected() {
        let network = network();
        let mut registry = StructureRegistry::new();
        let weirs = vec![
            WeirFeature {
                code: "wr-a".to_string(),
                location: Point::new(20.0, 0.0),
                crest_level: 1.0,
                crest_width: 2.0,
                discharge_coeff: 1.0,
                cross_section: None,
            },
            WeirFeature {
                code: "wr-b".to_string(),
                location: Point::new(80.0, 0.0),
                crest_level: 1.0,
                crest_width: 2.0,
                discharge_coeff: 1.0,
                cross_section: None,
            },
        ];
        registry.add_weirs(&weirs, &network, &CrossSections::default());

        let compound = CompoundFeature {
            code: "cmp-1".to_string(),
            members: vec!["wr-a".to_string(), "wr-b".to_string()],
        };
        let errors = registry.add_compounds(&[compound], 1.0);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], BuildError::Composition { .. }));
        assert!(registry.get("cmp-1").is_none());
    }

    #[test]
    fn test_compound_with_colocated_members_accepted() {
        let network = network();
        let mut registry = StructureRegistry::new();
        let weirs = vec![
            WeirFeature {
                code: "wr-a".to_string(),
                location: Point::new(50.0, 0.0),
                crest_level: 1.0,
                crest_width: 2.0,
                discharge_coeff: 1.0,
                cross_section: None,
            },
            WeirFeature {
                code: "wr-b".to_string(),
                location: Point::new(50.4, 0.0),
                crest_level: 1.4,
                crest_width: 2.0,
                discharge_coeff: 1.0,
                cross_section: None,
            },
        ];
        registry.add_weirs(&weirs, &network, &CrossSections::default());
        let compound = CompoundFeature {
            code: "cmp-2".to_string(),
            members: vec!["wr-a".to_string(), "wr-b".to_string()],
        };
        let errors = registry.add_compounds(&[compound], 1.0);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(registry.count_of("compound"), 1);
    }

    #[test]
    fn test_unknown_compound_member_rejected() {
        let mut registry = StructureRegistry::new();
        let compound = CompoundFeature {
            code: "cmp-3".to_string(),
            members: vec!["ghost-1".to_string(), "ghost-2".to_string()],
        };
        let errors = registry.add_compounds(&[compound], 1.0);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("ghost-1"));
    }
}

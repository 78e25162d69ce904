use crate::config::BuildConfig;
use crate::crosssection::CrossSections;
use crate::error::BuildError;
use crate::feature::FeatureSet;
use crate::forcing::Forcings;
use crate::mesh::{CouplingLink, Mesh2d, generate_coupling_links};
use crate::network::{Network, NetworkBuilder};
use crate::rr::RrModel;
use crate::structures::StructureRegistry;

// The fully resolved model, ready for serialization. The serializer only
// reads from this; ownership of the graph stays here.
#[derive(Debug)]
pub struct Model {
    pub network: Network,
    pub cross_sections: CrossSections,
    pub structures: StructureRegistry,
    pub forcings: Forcings,
    pub mesh: Option<Mesh2d>,
    pub coupling_links: Vec<CouplingLink>,
    pub rr: RrModel,
}

// What the build accepted and what it refused, with reasons. Per-feature
// problems land here instead of aborting the pipeline.
#[derive(Debug, Default)]
pub struct BuildSummary {
    pub rejected: Vec<BuildError>,
    pub warnings: Vec<String>,
}

impl BuildSummary {
    fn absorb(&mut self, errors: Vec<BuildError>) {
        self.rejected.extend(errors);
    }

    pub fn report(&self, model: &Model) -> String {
        let mut lines = vec![
            format!(
                "accepted: {} nodes, {} branches ({:.1} m), {} cross-section definitions, \
                 {} structures, {} boundary conditions, {} catchments",
                model.network.nodes.len(),
                model.network.branches.len(),
                model.network.total_length(),
                model.cross_sections.definition_count(),
                model.structures.len(),
                model.forcings.boundaries.len(),
                model.rr.catchments.len(),
            ),
        ];
        if let Some(mesh) = &model.mesh {
            lines.push(format!(
                "mesh2d: {} faces, {} coupling links",
                mesh.faces.len(),
                model.coupling_links.len()
            ));
        }
        for warning in &self.warnings {
            lines.push(format!("warning: {warning}"));
        }
        for error in &self.rejected {
            lines.push(format!("rejected: {error}"));
        }
        lines.join("\n")
    }
}

pub struct ModelBuilder {
    config: BuildConfig,
}

impl ModelBuilder {
    pub fn new(config: BuildConfig) -> Self {
        ModelBuilder { config }
    }

    // Single-pass synchronous pipeline: topology, cross-sections,
    // structures, boundaries, then the independent mesh and RR sub-builds
    // behind a join barrier, all before serialization.
    pub fn build(&self, features: &FeatureSet) -> (Model, BuildSummary) {
        let mut summary = BuildSummary::default();

        // Boundary locations sanction otherwise-dangling channel ends.
        let anchors = features.boundaries.iter().map(|b| b.location).collect();
        let outcome = NetworkBuilder::new(self.config.node_merge_tolerance)
            .with_anchors(anchors)
            .build(&features.channels);
        let mut network = outcome.network;
        summary.absorb(outcome.rejected);

        let mut cross_sections = CrossSections::default();
        for feature in &features.cross_sections {
            if let Err(e) = cross_sections.add_surveyed_profile(feature, &network) {
                summary.rejected.push(e);
            }
        }
        let missing = cross_sections.branches_without_cross_section(&network);
        let warnings = cross_sections.add_default_profiles(
            &features.parameterized_profiles,
            &missing,
            &network,
        );
        summary.warnings.extend(warnings);

        let mut structures = StructureRegistry::new();
        summary.absorb(structures.add_weirs(&features.weirs, &network, &cross_sections));
        summary.absorb(structures.add_bridges(&features.bridges, &network, &cross_sections));
        summary.absorb(structures.add_orifices(&features.orifices, &network));
        summary.absorb(structures.add_culverts(&features.culverts, &network, &mut cross_sections));
        summary.absorb(structures.add_pumps(&features.pumps, &network));
        summary.absorb(
            structures.add_compounds(&features.compounds, self.config.colocation_tolerance),
        );
        summary.warnings.append(&mut structures.warnings);

        let mut forcings = Forcings::new();
        summary.absorb(forcings.derive_constant_boundaries(&features.boundaries, &mut network));
        // Time-series boundaries have no batch path; each one is registered
        // explicitly here. Known limitation carried over from the source
        // format, not something to paper over.
        for feature in features.boundaries.iter().filter(|b| b.series.is_some()) {
            if let Err(e) = forcings.add_time_series(feature, &mut network) {
                summary.rejected.push(e);
            }
        }
        if let Some(level) = self.config.initial_water_level {
            forcings.set_initial_water_level(level);
        }

        // Mesh and RR builds are independent; run them in parallel and join
        // before anything gets serialized.
        let cell_size = self.config.mesh_cell_size;
        let buffer = self.config.mesh_buffer;
        let (mesh, (rr, rr_errors)) = rayon::join(
            || cell_size.map(|size| Mesh2d::generate(&network, size, buffer)),
            || RrModel::build(&features.catchments, &network),
        );
        summary.absorb(rr_errors);

        let coupling_links = match &mesh {
            Some(mesh) => {
                let (links, removed) =
                    generate_coupling_links(&network, mesh, self.config.coupling_max_distance);
                if removed > 0 {
                    summary.warnings.push(format!(
                        "removed {removed} coupling link(s) next to boundary condition nodes"
                    ));
                }
                links
            }
            None => Vec::new(),
        };

        let model = Model {
            network,
            cross_sections,
            structures,
            forcings,
            mesh,
            coupling_links,
            rr,
        };
        (model, summary)
    }
}

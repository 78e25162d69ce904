pub mod csv;
pub mod gpkg;
pub mod ini;
pub mod netcdf;
pub mod timefmt;

use crate::builder::Model;
use crate::config::FormatVersion;
use crate::error::{BuildError, BuildResult};
use crate::structures::StructureKind;
use chrono::NaiveDateTime;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

// Version-aware writer for the full artifact set. Validation runs before
// any file is touched: a model the target format cannot express leaves no
// partial output behind.
pub struct Serializer {
    pub version: FormatVersion,
    pub reference_time: NaiveDateTime,
}

impl Serializer {
    pub fn new(version: FormatVersion, reference_time: NaiveDateTime) -> Self {
        Serializer {
            version,
            reference_time,
        }
    }

    pub fn validate(&self, model: &Model) -> BuildResult<()> {
        if !self.version.supports_orifice() {
            for structure in model.structures.iter() {
                if matches!(structure.kind, StructureKind::Orifice { .. }) {
                    return Err(BuildError::serialization(format!(
                        "structure '{}': orifices are not supported by format {}",
                        structure.id,
                        self.version.structure_file_version()
                    )));
                }
            }
        }
        for bc in &model.forcings.boundaries {
            if model.network.node(&bc.node_id).is_none() {
                return Err(BuildError::serialization(format!(
                    "boundary '{}' references unknown node '{}'",
                    bc.id, bc.node_id
                )));
            }
        }
        Ok(())
    }

    // Write every artifact into `dir`, returning the paths written.
    pub fn write_all(&self, dir: &Path, model: &Model) -> BuildResult<Vec<PathBuf>> {
        self.validate(model)?;
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();

        let mdu = dir.join("model.mdu");
        let mut w = BufWriter::new(File::create(&mdu)?);
        ini::write_control_file(&mut w, self.version, &model.forcings)?;
        written.push(mdu);

        let crsdef = dir.join("crsdef.ini");
        let mut w = BufWriter::new(File::create(&crsdef)?);
        ini::write_cross_section_definitions(&mut w, self.version, &model.cross_sections)?;
        written.push(crsdef);

        let crsloc = dir.join("crsloc.ini");
        let mut w = BufWriter::new(File::create(&crsloc)?);
        ini::write_cross_section_locations(&mut w, self.version, &model.cross_sections)?;
        written.push(crsloc);

        let structures = dir.join("structures.ini");
        let mut w = BufWriter::new(File::create(&structures)?);
        ini::write_structures(&mut w, self.version, &model.structures)?;
        written.push(structures);

        let forcing = dir.join("forcing.bc");
        let mut w = BufWriter::new(File::create(&forcing)?);
        ini::write_forcing_file(&mut w, self.version, &self.reference_time, &model.forcings)?;
        written.push(forcing);

        let net = dir.join("network_net.nc");
        netcdf::write_net_file(
            &net,
            &model.network,
            model.mesh.as_ref(),
            &model.coupling_links,
        )?;
        written.push(net);

        if !model.rr.catchments.is_empty() {
            let catchments = dir.join("rr_catchments.ini");
            let mut w = BufWriter::new(File::create(&catchments)?);
            ini::write_rr_catchments(&mut w, &model.rr)?;
            written.push(catchments);

            let links = dir.join("rr_links.ini");
            let mut w = BufWriter::new(File::create(&links)?);
            ini::write_rr_links(&mut w, &model.rr)?;
            written.push(links);
        }

        Ok(written)
    }
}

//! INI-chunk writers for the simulator's text artifacts: model control
//! file, cross-section definition/location files, structure file, the
//! unified forcing file and the RR component files. Value formatting goes
//! through `io::timefmt` only.

use crate::config::FormatVersion;
use crate::crosssection::{CrossSections, ProfileShape};
use crate::error::BuildResult;
use crate::forcing::{ForcingData, Forcings, InitialQuantity};
use crate::io::timefmt;
use crate::rr::RrModel;
use crate::structures::{StructureKind, StructureRegistry};
use chrono::NaiveDateTime;
use std::io::Write;

// One "[Header]" block with aligned key/value entries and optional raw
// data lines (used for time series tables).
struct Chunk {
    header: &'static str,
    entries: Vec<(String, String)>,
    data: Vec<String>,
}

impl Chunk {
    fn new(header: &'static str) -> Self {
        Chunk {
            header,
            entries: Vec::new(),
            data: Vec::new(),
        }
    }

    fn push(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.entries.push((key.to_string(), value.into()));
        self
    }

    fn write_to<W: Write>(&self, w: &mut W) -> BuildResult<()> {
        writeln!(w, "[{}]", self.header)?;
        let width = self
            .entries
            .iter()
            .map(|(k, _)| k.len())
            .max()
            .unwrap_or(0)
            .max(12);
        for (key, value) in &self.entries {
            writeln!(w, "    {key:width$} = {value}")?;
        }
        for line in &self.data {
            writeln!(w, "    {line}")?;
        }
        writeln!(w)?;
        Ok(())
    }
}

fn general_chunk(version: &str, file_type: &str) -> Chunk {
    let mut chunk = Chunk::new("General");
    chunk.push("fileVersion", version).push("fileType", file_type);
    chunk
}

// Model control file. The initial condition is referenced from here, not
// written into the forcing file.
pub fn write_control_file<W: Write>(
    w: &mut W,
    version: FormatVersion,
    forcings: &Forcings,
) -> BuildResult<()> {
    general_chunk("1.09", "modelDef").write_to(w)?;

    let mut geometry = Chunk::new("Geometry");
    geometry
        .push("netFile", "network_net.nc")
        .push("structureFile", "structures.ini")
        .push("crossDefFile", "crsdef.ini")
        .push("crossLocFile", "crsloc.ini");
    geometry.write_to(w)?;

    let mut forcing = Chunk::new("ExternalForcing");
    forcing.push("extForceFileNew", "forcing.bc");
    forcing.write_to(w)?;

    let mut initial = Chunk::new("InitialConditions");
    match forcings.initial {
        Some(ic) => {
            let key = match ic.quantity {
                InitialQuantity::WaterLevel => "waterLevIni",
                InitialQuantity::WaterDepth => "waterDepthIni",
            };
            initial.push(key, timefmt::fmt_f64(ic.value, 3));
        }
        None => {
            initial.push("waterLevIni", timefmt::fmt_f64(0.0, 3));
        }
    }
    initial.write_to(w)?;

    let mut output = Chunk::new("Output");
    output.push("formatVersion", version.network_file_version());
    output.write_to(w)?;
    Ok(())
}

pub fn write_cross_section_definitions<W: Write>(
    w: &mut W,
    version: FormatVersion,
    css: &CrossSections,
) -> BuildResult<()> {
    general_chunk(version.structure_file_version(), "crossDef").write_to(w)?;
    for def in css.definitions() {
        let mut chunk = Chunk::new("Definition");
        chunk.push("id", &def.id);
        match &def.shape {
            ProfileShape::Yz { y, z } => {
                chunk
                    .push("type", "yz")
                    .push("yzCount", y.len().to_string())
                    .push("yCoordinates", timefmt::fmt_list(y, 3))
                    .push("zCoordinates", timefmt::fmt_list(z, 3))
                    .push("sectionCount", "1")
                    .push(
                        "frictionPositions",
                        timefmt::fmt_list(&[y[0], y[y.len() - 1]], 3),
                    );
            }
            ProfileShape::Circle { diameter } => {
                chunk
                    .push("type", "circle")
                    .push("diameter", timefmt::fmt_f64(*diameter, 3));
            }
            ProfileShape::Rectangle {
                width,
                height,
                closed,
            } => {
                chunk
                    .push("type", "rectangle")
                    .push("width", timefmt::fmt_f64(*width, 3))
                    .push("height", timefmt::fmt_f64(*height, 3))
                    .push("closed", if *closed { "1" } else { "0" });
            }
            ProfileShape::Trapezium {
                slope,
                maximum_flow_width,
                bottom_width,
                closed,
            } => {
                chunk
                    .push("type", "trapezium")
                    .push("slope", timefmt::fmt_f64(*slope, 1))
                    .push("maximumFlowWidth", timefmt::fmt_f64(*maximum_flow_width, 1))
                    .push("bottomWidth", timefmt::fmt_f64(*bottom_width, 3))
                    .push("closed", if *closed { "1" } else { "0" });
            }
        }
        chunk
            .push("frictionType", def.friction_type.name())
            .push("frictionValue", timefmt::fmt_f64(def.friction_value, 3));
        chunk.write_to(w)?;
    }
    Ok(())
}

pub fn write_cross_section_locations<W: Write>(
    w: &mut W,
    version: FormatVersion,
    css: &CrossSections,
) -> BuildResult<()> {
    general_chunk(version.structure_file_version(), "crossLoc").write_to(w)?;
    for loc in &css.locations {
        let mut chunk = Chunk::new("CrossSection");
        chunk
            .push("id", &loc.id)
            .push("branchId", &loc.branch_id)
            .push("chainage", timefmt::fmt_f64(loc.chainage, 3))
            .push("shift", timefmt::fmt_f64(loc.shift, 3))
            .push("definitionId", &loc.definition);
        chunk.write_to(w)?;
    }
    Ok(())
}

pub fn write_structures<W: Write>(
    w: &mut W,
    version: FormatVersion,
    registry: &StructureRegistry,
) -> BuildResult<()> {
    general_chunk(version.structure_file_version(), "structure").write_to(w)?;
    for structure in registry.iter() {
        let mut chunk = Chunk::new("Structure");
        chunk
            .push("id", &structure.id)
            .push("type", structure.kind.type_name())
            .push("branchId", &structure.anchor.branch_id)
            .push("chainage", timefmt::fmt_f64(structure.anchor.chainage, 3));
        match &structure.kind {
            StructureKind::Bridge {
                definition,
                bed_level,
                length,
                inlet_loss,
                outlet_loss,
            } => {
                chunk
                    .push("csDefId", definition)
                    .push("shift", timefmt::fmt_f64(*bed_level, 3))
                    .push("length", timefmt::fmt_f64(*length, 3))
                    .push("inletLossCoeff", timefmt::fmt_f64(*inlet_loss, 3))
                    .push("outletLossCoeff", timefmt::fmt_f64(*outlet_loss, 3));
            }
            StructureKind::Weir {
                crest_level,
                crest_width,
                discharge_coeff,
            } => {
                chunk
                    .push("crestLevel", timefmt::fmt_f64(*crest_level, 3))
                    .push("crestWidth", timefmt::fmt_f64(*crest_width, 3))
                    .push("corrCoeff", timefmt::fmt_f64(*discharge_coeff, 3));
            }
            StructureKind::UniversalWeir {
                y,
                z,
                crest_level,
                discharge_coeff,
            } => {
                chunk
                    .push("numLevels", y.len().to_string())
                    .push("yValues", timefmt::fmt_list(y, 3))
                    .push("zValues", timefmt::fmt_list(z, 3))
                    .push("crestLevel", timefmt::fmt_f64(*crest_level, 3))
                    .push("dischargeCoeff", timefmt::fmt_f64(*discharge_coeff, 3));
            }
            StructureKind::Orifice {
                crest_level,
                gate_lower_edge,
                opening_width,
                contraction_coeff,
            } => {
                chunk
                    .push("crestLevel", timefmt::fmt_f64(*crest_level, 3))
                    .push("gateLowerEdgeLevel", timefmt::fmt_f64(*gate_lower_edge, 3))
                    .push("crestWidth", timefmt::fmt_f64(*opening_width, 3))
                    .push("corrCoeff", timefmt::fmt_f64(*contraction_coeff, 3));
            }
            StructureKind::Culvert {
                definition,
                length,
                left_level,
                right_level,
                inlet_loss,
                outlet_loss,
            } => {
                chunk
                    .push("csDefId", definition)
                    .push("length", timefmt::fmt_f64(*length, 3))
                    .push("leftLevel", timefmt::fmt_f64(*left_level, 3))
                    .push("rightLevel", timefmt::fmt_f64(*right_level, 3))
                    .push("inletLossCoeff", timefmt::fmt_f64(*inlet_loss, 3))
                    .push("outletLossCoeff", timefmt::fmt_f64(*outlet_loss, 3));
            }
            StructureKind::Pump {
                capacity,
                direction,
                start_level_suction,
                stop_level_suction,
            } => {
                chunk
                    .push("capacity", timefmt::fmt_f64(*capacity, 3))
                    .push("direction", direction.to_string())
                    .push("numStages", "1")
                    .push(
                        "startLevelSuctionSide",
                        timefmt::fmt_f64(*start_level_suction, 3),
                    )
                    .push(
                        "stopLevelSuctionSide",
                        timefmt::fmt_f64(*stop_level_suction, 3),
                    );
            }
            StructureKind::Compound { members } => {
                chunk
                    .push("numStructures", members.len().to_string())
                    .push("structureIds", members.join(";"));
            }
        }
        chunk.write_to(w)?;
    }
    Ok(())
}

// Unified forcing file: constant and time-series boundary conditions in
// one format. Time axes are minutes relative to the reference time, whose
// stamp always carries the zero-padded hour and minute.
pub fn write_forcing_file<W: Write>(
    w: &mut W,
    version: FormatVersion,
    reference_time: &NaiveDateTime,
    forcings: &Forcings,
) -> BuildResult<()> {
    general_chunk(version.forcing_file_version(), "boundConds").write_to(w)?;
    for bc in &forcings.boundaries {
        let mut chunk = Chunk::new("Forcing");
        chunk.push("name", &bc.id).push("nodeId", &bc.node_id);
        match &bc.data {
            ForcingData::Constant(value) => {
                chunk
                    .push("function", "constant")
                    .push("quantity", bc.quantity.boundary_name())
                    .push("unit", bc.quantity.unit())
                    .push("value", timefmt::fmt_f64(*value, 4));
            }
            ForcingData::TimeSeries(series) => {
                chunk
                    .push("function", "timeseries")
                    .push("timeInterpolation", "linear")
                    .push("quantity", "time")
                    .push("unit", timefmt::reference_units(reference_time))
                    .push("quantity", bc.quantity.boundary_name())
                    .push("unit", bc.quantity.unit());
                for (t, value) in series {
                    chunk.data.push(format!(
                        "{} {}",
                        timefmt::fmt_f64(timefmt::minutes_since(reference_time, t), 2),
                        timefmt::fmt_f64(*value, 4)
                    ));
                }
            }
        }
        chunk.write_to(w)?;
    }
    Ok(())
}

pub fn write_rr_catchments<W: Write>(w: &mut W, rr: &RrModel) -> BuildResult<()> {
    general_chunk("1.00", "rrCatchments").write_to(w)?;
    for catchment in &rr.catchments {
        let mut chunk = Chunk::new("Catchment");
        chunk
            .push("id", &catchment.id)
            .push("area", timefmt::fmt_f64(catchment.area_m2, 1))
            .push(
                "runoffCoefficient",
                timefmt::fmt_f64(catchment.runoff_coefficient, 3),
            )
            .push("nodeId", &catchment.node_id);
        chunk.write_to(w)?;
    }
    Ok(())
}

pub fn write_rr_links<W: Write>(w: &mut W, rr: &RrModel) -> BuildResult<()> {
    general_chunk("1.00", "rrLinks").write_to(w)?;
    for link in &rr.links {
        let mut chunk = Chunk::new("Link");
        chunk
            .push("id", &link.id)
            .push("catchmentId", &link.catchment_id)
            .push("nodeId", &link.node_id);
        chunk.write_to(w)?;
    }
    Ok(())
}

use crate::error::{BuildError, BuildResult};
use chrono::NaiveDateTime;
use serde::Deserialize;

// Column name mapping for the source attribute tables. Different dataset
// versions spell these differently, so they are configurable rather than
// hard coded in the ingest queries.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldMapping {
    pub code: String,
    pub friction_type: String,
    pub friction_value: String,
    pub crest_level: String,
    pub crest_width: String,
    pub bed_level: String,
    pub opening_height: String,
    pub opening_width: String,
    pub shape: String,
    pub capacity: String,
    pub target_level: String,
    pub upper_margin: String,
    pub lower_margin: String,
    pub quantity: String,
    pub value: String,
    pub area: String,
    pub runoff_coefficient: String,
}

impl FieldMapping {
    pub fn new() -> Self {
        FieldMapping {
            code: "code".to_string(),
            friction_type: "ruwheidstypecode".to_string(),
            friction_value: "ruwheidswaarde".to_string(),
            crest_level: "laagstedoorstroomhoogte".to_string(),
            crest_width: "kruinbreedte".to_string(),
            bed_level: "bodemhoogte".to_string(),
            opening_height: "hoogteopening".to_string(),
            opening_width: "breedteopening".to_string(),
            shape: "vormcode".to_string(),
            capacity: "maximalecapaciteit".to_string(),
            target_level: "streefwaarde".to_string(),
            upper_margin: "bovenmarge".to_string(),
            lower_margin: "ondermarge".to_string(),
            quantity: "typerandvoorwaardecode".to_string(),
            value: "waterstand".to_string(),
            area: "oppervlakte".to_string(),
            runoff_coefficient: "afvoercoefficient".to_string(),
        }
    }
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self::new()
    }
}

// Target simulator format version. The writers are version-aware: file
// version stamps and the supported structure set differ between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum FormatVersion {
    V2020_02,
    V2021_03,
}

impl FormatVersion {
    pub fn network_file_version(&self) -> &'static str {
        match self {
            FormatVersion::V2020_02 => "1.09",
            FormatVersion::V2021_03 => "2.00",
        }
    }

    pub fn structure_file_version(&self) -> &'static str {
        match self {
            FormatVersion::V2020_02 => "2.00",
            FormatVersion::V2021_03 => "3.00",
        }
    }

    pub fn forcing_file_version(&self) -> &'static str {
        "1.01"
    }

    // Orifices only arrived in the newer structure schema.
    pub fn supports_orifice(&self) -> bool {
        matches!(self, FormatVersion::V2021_03)
    }
}

// Build-wide knobs, owned by the pipeline driver.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub fields: FieldMapping,
    pub version: FormatVersion,
    // Endpoints closer than this merge into one network node (m).
    pub node_merge_tolerance: f64,
    // Structures of a compound must lie within this distance of each other (m).
    pub colocation_tolerance: f64,
    // 2D mesh cell size (m); None skips mesh generation.
    pub mesh_cell_size: Option<f64>,
    // Cells farther than this from any branch are clipped from a generated mesh (m).
    pub mesh_buffer: f64,
    // Maximum length of a 1d2d coupling link (m).
    pub coupling_max_distance: f64,
    // Epoch for the relative time axis in the forcing file.
    pub reference_time: NaiveDateTime,
    // Model-wide initial water level, referenced from the control file.
    pub initial_water_level: Option<f64>,
}

impl BuildConfig {
    pub fn new(reference_time: NaiveDateTime) -> Self {
        BuildConfig {
            fields: FieldMapping::new(),
            version: FormatVersion::V2021_03,
            node_merge_tolerance: 0.1,
            colocation_tolerance: 1.0,
            mesh_cell_size: None,
            mesh_buffer: 100.0,
            coupling_max_distance: 50.0,
            reference_time,
            initial_water_level: None,
        }
    }
}

// Legacy margins arrive as centimeter text fields, sometimes with a unit
// suffix. Everything downstream works in meters.
pub fn margin_cm_to_m(field: &'static str, raw: &str) -> BuildResult<f64> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix("cm").unwrap_or(trimmed).trim();
    let cm: f64 = trimmed
        .parse()
        .map_err(|_| BuildError::unit_conversion(field, raw))?;
    if !cm.is_finite() {
        return Err(BuildError::unit_conversion(field, raw));
    }
    Ok(cm / 100.0)
}

// Pump capacities are delivered in m3/min, the simulator wants m3/s.
pub fn capacity_per_min_to_per_s(capacity: f64) -> f64 {
    capacity / 60.0
}

use crate::config::FieldMapping;
use crate::error::BuildResult;
use crate::feature::{
    BoundaryFeature, BridgeFeature, CatchmentFeature, ChannelFeature, CompoundFeature,
    CrossSectionFeature, CulvertFeature, FeatureSet, OrificeFeature, ParameterizedProfileFeature,
    Point, Point3, PumpControlFeature, PumpFeature, WeirFeature,
};
use crate::io::csv::read_time_series;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::Path;

// Attribute ingest from the source GeoPackage. Geometries are stored in
// companion `<table>_point` tables (one row per vertex, ordered by `seq`);
// the dataset preprocessor flattens the blobs there so this reader never
// touches WKB.

fn table_exists(conn: &Connection, name: &str) -> BuildResult<bool> {
    let mut stmt =
        conn.prepare("SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?")?;
    let count: i64 = stmt.query_row([name], |row| row.get(0))?;
    Ok(count > 0)
}

// Vertex table rows grouped per feature code, digitizing order preserved.
fn load_lines(conn: &Connection, table: &str) -> BuildResult<HashMap<String, Vec<Point>>> {
    let query = format!("SELECT code, x, y FROM '{table}' ORDER BY code, seq");
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, f64>(1)?,
            row.get::<_, f64>(2)?,
        ))
    })?;
    let mut lines: HashMap<String, Vec<Point>> = HashMap::new();
    for row in rows {
        let (code, x, y) = row?;
        lines.entry(code).or_default().push(Point::new(x, y));
    }
    Ok(lines)
}

fn load_lines_3d(conn: &Connection, table: &str) -> BuildResult<HashMap<String, Vec<Point3>>> {
    let query = format!("SELECT code, x, y, z FROM '{table}' ORDER BY code, seq");
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, f64>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, f64>(3)?,
        ))
    })?;
    let mut lines: HashMap<String, Vec<Point3>> = HashMap::new();
    for row in rows {
        let (code, x, y, z) = row?;
        lines.entry(code).or_default().push(Point3::new(x, y, z));
    }
    Ok(lines)
}

fn load_channels(conn: &Connection, fields: &FieldMapping) -> BuildResult<Vec<ChannelFeature>> {
    if !table_exists(conn, "channel")? {
        return Ok(Vec::new());
    }
    let mut lines = load_lines(conn, "channel_point")?;
    let query = format!(
        "SELECT {}, {}, {}, branch_order FROM 'channel'",
        fields.code, fields.friction_type, fields.friction_value
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| {
        Ok(ChannelFeature {
            code: row.get::<_, String>(0)?,
            geometry: Vec::new(),
            friction_type: row.get::<_, String>(1)?,
            friction_value: row.get::<_, f64>(2)?,
            order: row.get::<_, Option<i32>>(3)?.unwrap_or(-1),
        })
    })?;
    let mut channels = Vec::new();
    for row in rows {
        let mut channel = row?;
        channel.geometry = lines.remove(&channel.code).unwrap_or_default();
        channels.push(channel);
    }
    Ok(channels)
}

fn load_cross_sections(
    conn: &Connection,
    fields: &FieldMapping,
) -> BuildResult<Vec<CrossSectionFeature>> {
    if !table_exists(conn, "crosssection")? {
        return Ok(Vec::new());
    }
    let mut lines = load_lines_3d(conn, "crosssection_point")?;
    let query = format!(
        "SELECT {}, {}, {} FROM 'crosssection'",
        fields.code, fields.friction_type, fields.friction_value
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| {
        Ok(CrossSectionFeature {
            code: row.get::<_, String>(0)?,
            geometry: Vec::new(),
            friction_type: row.get::<_, String>(1)?,
            friction_value: row.get::<_, f64>(2)?,
        })
    })?;
    let mut sections = Vec::new();
    for row in rows {
        let mut section = row?;
        section.geometry = lines.remove(&section.code).unwrap_or_default();
        sections.push(section);
    }
    Ok(sections)
}

fn load_parameterized_profiles(
    conn: &Connection,
) -> BuildResult<Vec<ParameterizedProfileFeature>> {
    if !table_exists(conn, "parameterized_profile")? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(
        "SELECT branch_code, bottom_width, bed_level_upstream, bed_level_downstream, \
         embankment_left, embankment_right, slope_left, slope_right \
         FROM 'parameterized_profile'",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ParameterizedProfileFeature {
            branch_code: row.get(0)?,
            bottom_width: row.get(1)?,
            bed_level_upstream: row.get(2)?,
            bed_level_downstream: row.get(3)?,
            embankment_left: row.get(4)?,
            embankment_right: row.get(5)?,
            slope_left: row.get(6)?,
            slope_right: row.get(7)?,
        })
    })?;
    let mut profiles = Vec::new();
    for row in rows {
        profiles.push(row?);
    }
    Ok(profiles)
}

fn load_bridges(conn: &Connection, fields: &FieldMapping) -> BuildResult<Vec<BridgeFeature>> {
    if !table_exists(conn, "bridge")? {
        return Ok(Vec::new());
    }
    let query = format!(
        "SELECT {}, x, y, {}, lengte, intreeverlies, uittreeverlies, crosssection_code \
         FROM 'bridge'",
        fields.code, fields.bed_level
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| {
        Ok(BridgeFeature {
            code: row.get(0)?,
            location: Point::new(row.get(1)?, row.get(2)?),
            bed_level: row.get(3)?,
            length: row.get(4)?,
            inlet_loss: row.get(5)?,
            outlet_loss: row.get(6)?,
            cross_section: row.get(7)?,
        })
    })?;
    let mut bridges = Vec::new();
    for row in rows {
        bridges.push(row?);
    }
    Ok(bridges)
}

fn load_weirs(conn: &Connection, fields: &FieldMapping) -> BuildResult<Vec<WeirFeature>> {
    if !table_exists(conn, "weir")? {
        return Ok(Vec::new());
    }
    let query = format!(
        "SELECT {}, x, y, {}, {}, afvoercoefficient, crosssection_code FROM 'weir'",
        fields.code, fields.crest_level, fields.crest_width
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| {
        Ok(WeirFeature {
            code: row.get(0)?,
            location: Point::new(row.get(1)?, row.get(2)?),
            crest_level: row.get(3)?,
            crest_width: row.get(4)?,
            discharge_coeff: row.get(5)?,
            cross_section: row.get(6)?,
        })
    })?;
    let mut weirs = Vec::new();
    for row in rows {
        weirs.push(row?);
    }
    Ok(weirs)
}

fn load_orifices(conn: &Connection, fields: &FieldMapping) -> BuildResult<Vec<OrificeFeature>> {
    if !table_exists(conn, "orifice")? {
        return Ok(Vec::new());
    }
    // The gate lower edge is the sill plus the opening height.
    let query = format!(
        "SELECT {}, x, y, {}, {}, {}, contractiecoefficient FROM 'orifice'",
        fields.code, fields.crest_level, fields.opening_height, fields.opening_width
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| {
        let crest_level: f64 = row.get(3)?;
        let opening_height: f64 = row.get(4)?;
        Ok(OrificeFeature {
            code: row.get(0)?,
            location: Point::new(row.get(1)?, row.get(2)?),
            crest_level,
            gate_lower_edge: crest_level + opening_height,
            opening_width: row.get(5)?,
            contraction_coeff: row.get(6)?,
        })
    })?;
    let mut orifices = Vec::new();
    for row in rows {
        orifices.push(row?);
    }
    Ok(orifices)
}

fn load_culverts(conn: &Connection, fields: &FieldMapping) -> BuildResult<Vec<CulvertFeature>> {
    if !table_exists(conn, "culvert")? {
        return Ok(Vec::new());
    }
    let mut lines = load_lines(conn, "culvert_point")?;
    let query = format!(
        "SELECT {}, {}, {}, {}, left_level, right_level, intreeverlies, uittreeverlies, \
         {}, {} FROM 'culvert'",
        fields.code,
        fields.shape,
        fields.opening_height,
        fields.opening_width,
        fields.friction_type,
        fields.friction_value
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| {
        Ok(CulvertFeature {
            code: row.get::<_, String>(0)?,
            geometry: Vec::new(),
            shape: row.get(1)?,
            opening_height: row.get(2)?,
            opening_width: row.get(3)?,
            left_level: row.get(4)?,
            right_level: row.get(5)?,
            inlet_loss: row.get(6)?,
            outlet_loss: row.get(7)?,
            friction_type: row.get(8)?,
            friction_value: row.get(9)?,
        })
    })?;
    let mut culverts = Vec::new();
    for row in rows {
        let mut culvert = row?;
        culvert.geometry = lines.remove(&culvert.code).unwrap_or_default();
        culverts.push(culvert);
    }
    Ok(culverts)
}

fn load_pumps(conn: &Connection, fields: &FieldMapping) -> BuildResult<Vec<PumpFeature>> {
    if !table_exists(conn, "pump")? {
        return Ok(Vec::new());
    }
    let query = format!(
        "SELECT {}, x, y, {}, direction, start_level, stop_level, {}, {}, {} FROM 'pump'",
        fields.code, fields.capacity, fields.target_level, fields.upper_margin, fields.lower_margin
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| {
        let start: Option<f64> = row.get(5)?;
        let stop: Option<f64> = row.get(6)?;
        let control = match (start, stop) {
            (Some(start_level), Some(stop_level)) => PumpControlFeature::Absolute {
                start_level,
                stop_level,
            },
            _ => PumpControlFeature::LegacySetpoint {
                target_level: row.get(7)?,
                upper_margin: row.get(8)?,
                lower_margin: row.get(9)?,
            },
        };
        Ok(PumpFeature {
            code: row.get(0)?,
            location: Point::new(row.get(1)?, row.get(2)?),
            capacity: row.get(3)?,
            direction: row.get::<_, Option<i32>>(4)?.unwrap_or(1),
            control,
        })
    })?;
    let mut pumps = Vec::new();
    for row in rows {
        pumps.push(row?);
    }
    Ok(pumps)
}

fn load_compounds(conn: &Connection, fields: &FieldMapping) -> BuildResult<Vec<CompoundFeature>> {
    if !table_exists(conn, "compound")? {
        return Ok(Vec::new());
    }
    let query = format!("SELECT {}, members FROM 'compound'", fields.code);
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| {
        let members: String = row.get(1)?;
        Ok(CompoundFeature {
            code: row.get(0)?,
            members: members
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
        })
    })?;
    let mut compounds = Vec::new();
    for row in rows {
        compounds.push(row?);
    }
    Ok(compounds)
}

fn load_boundaries(
    conn: &Connection,
    fields: &FieldMapping,
    base_dir: &Path,
) -> BuildResult<Vec<BoundaryFeature>> {
    if !table_exists(conn, "boundary")? {
        return Ok(Vec::new());
    }
    let query = format!(
        "SELECT {}, x, y, {}, {}, series_file FROM 'boundary'",
        fields.code, fields.quantity, fields.value
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            BoundaryFeature {
                code: row.get(0)?,
                location: Point::new(row.get(1)?, row.get(2)?),
                quantity: row.get(3)?,
                value: row.get(4)?,
                series: None,
            },
            row.get::<_, Option<String>>(5)?,
        ))
    })?;
    let mut boundaries = Vec::new();
    for row in rows {
        let (mut boundary, series_file) = row?;
        if let Some(file) = series_file {
            boundary.series = Some(read_time_series(&base_dir.join(file))?);
        }
        boundaries.push(boundary);
    }
    Ok(boundaries)
}

fn load_catchments(conn: &Connection, fields: &FieldMapping) -> BuildResult<Vec<CatchmentFeature>> {
    if !table_exists(conn, "catchment")? {
        return Ok(Vec::new());
    }
    let query = format!(
        "SELECT {}, x, y, {}, {}, node_code FROM 'catchment'",
        fields.code, fields.area, fields.runoff_coefficient
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| {
        Ok(CatchmentFeature {
            code: row.get(0)?,
            centroid: Point::new(row.get(1)?, row.get(2)?),
            area_m2: row.get(3)?,
            runoff_coefficient: row.get(4)?,
            node_code: row.get(5)?,
        })
    })?;
    let mut catchments = Vec::new();
    for row in rows {
        catchments.push(row?);
    }
    Ok(catchments)
}

// Load every feature table that exists; missing tables yield empty lists,
// a model without pumps is just a model without pumps.
pub fn load_feature_set(
    conn: &Connection,
    fields: &FieldMapping,
    base_dir: &Path,
) -> BuildResult<FeatureSet> {
    Ok(FeatureSet {
        channels: load_channels(conn, fields)?,
        cross_sections: load_cross_sections(conn, fields)?,
        parameterized_profiles: load_parameterized_profiles(conn)?,
        bridges: load_bridges(conn, fields)?,
        weirs: load_weirs(conn, fields)?,
        orifices: load_orifices(conn, fields)?,
        culverts: load_culverts(conn, fields)?,
        pumps: load_pumps(conn, fields)?,
        compounds: load_compounds(conn, fields)?,
        boundaries: load_boundaries(conn, fields, base_dir)?,
        catchments: load_catchments(conn, fields)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE channel (code TEXT, ruwheidstypecode TEXT, ruwheidswaarde REAL, branch_order INTEGER);
             CREATE TABLE channel_point (code TEXT, seq INTEGER, x REAL, y REAL);
             CREATE TABLE pump (code TEXT, x REAL, y REAL, maximalecapaciteit REAL, direction INTEGER,
                                start_level REAL, stop_level REAL, streefwaarde REAL,
                                bovenmarge TEXT, ondermarge TEXT);
             INSERT INTO channel VALUES ('ch-1', '4', 0.03, 1);
             INSERT INTO channel_point VALUES ('ch-1', 0, 0.0, 0.0);
             INSERT INTO channel_point VALUES ('ch-1', 1, 50.0, 0.0);
             INSERT INTO channel_point VALUES ('ch-1', 2, 100.0, 0.0);
             INSERT INTO pump VALUES ('pmp-1', 10.0, 0.0, 90.0, 1, 1.25, 0.75, NULL, NULL, NULL);
             INSERT INTO pump VALUES ('pmp-2', 20.0, 0.0, 60.0, 1, NULL, NULL, 1.0, '25', '10 cm');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_missing_tables_yield_empty_lists() {
        let conn = test_db();
        let fields = FieldMapping::new();
        let set = load_feature_set(&conn, &fields, Path::new(".")).unwrap();
        assert!(set.weirs.is_empty());
        assert!(set.boundaries.is_empty());
        assert_eq!(set.channels.len(), 1);
    }

    #[test]
    fn test_channel_vertices_keep_order() {
        let conn = test_db();
        let channels = load_channels(&conn, &FieldMapping::new()).unwrap();
        assert_eq!(channels[0].geometry.len(), 3);
        assert_eq!(channels[0].geometry[1].x, 50.0);
        assert_eq!(channels[0].order, 1);
    }

    #[test]
    fn test_pump_control_variants() {
        let conn = test_db();
        let mut pumps = load_pumps(&conn, &FieldMapping::new()).unwrap();
        pumps.sort_by(|a, b| a.code.cmp(&b.code));
        assert!(matches!(
            pumps[0].control,
            PumpControlFeature::Absolute { start_level, stop_level }
                if start_level == 1.25 && stop_level == 0.75
        ));
        match &pumps[1].control {
            PumpControlFeature::LegacySetpoint {
                target_level,
                upper_margin,
                lower_margin,
            } => {
                assert_eq!(*target_level, 1.0);
                assert_eq!(upper_margin, "25");
                assert_eq!(lower_margin, "10 cm");
            }
            other => panic!("unexpected control: {other:?}"),
        }
    }
}

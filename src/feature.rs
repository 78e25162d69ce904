use chrono::NaiveDateTime;

// Planar coordinate in the projected CRS of the source dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

// Coordinate with elevation, used for surveyed cross-section profiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Point3 { x, y, z }
    }

    pub fn xy(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

pub fn polyline_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance(&w[1])).sum()
}

// Distance from a point to a polyline, by projecting onto every segment.
pub fn distance_to_polyline(pt: &Point, line: &[Point]) -> f64 {
    line.windows(2)
        .map(|w| distance_to_segment(pt, &w[0], &w[1]))
        .fold(f64::INFINITY, f64::min)
}

// Chainage of the projection of `pt` onto `line`, measured from the start.
pub fn project_chainage(pt: &Point, line: &[Point]) -> f64 {
    let mut best_dist = f64::INFINITY;
    let mut best_chainage = 0.0;
    let mut travelled = 0.0;
    for w in line.windows(2) {
        let seg_len = w[0].distance(&w[1]);
        let t = segment_parameter(pt, &w[0], &w[1]);
        let proj = Point::new(
            w[0].x + t * (w[1].x - w[0].x),
            w[0].y + t * (w[1].y - w[0].y),
        );
        let d = pt.distance(&proj);
        if d < best_dist {
            best_dist = d;
            best_chainage = travelled + t * seg_len;
        }
        travelled += seg_len;
    }
    best_chainage
}

fn segment_parameter(pt: &Point, a: &Point, b: &Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return 0.0;
    }
    (((pt.x - a.x) * dx + (pt.y - a.y) * dy) / len2).clamp(0.0, 1.0)
}

fn distance_to_segment(pt: &Point, a: &Point, b: &Point) -> f64 {
    let t = segment_parameter(pt, a, b);
    let proj = Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y));
    pt.distance(&proj)
}

// Proper crossing test for two segments, endpoints excluded. Used to flag
// self-intersecting channel lines.
pub fn segments_cross(a1: &Point, a2: &Point, b1: &Point, b2: &Point) -> bool {
    fn orient(p: &Point, q: &Point, r: &Point) -> f64 {
        (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x)
    }
    let d1 = orient(b1, b2, a1);
    let d2 = orient(b1, b2, a2);
    let d3 = orient(a1, a2, b1);
    let d4 = orient(a1, a2, b2);
    (d1 * d2 < 0.0) && (d3 * d4 < 0.0)
}

// ---------------------------------------------------------------------------
// Typed feature records, the output of the external GIS ingest adapter.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ChannelFeature {
    pub code: String,
    pub geometry: Vec<Point>,
    pub friction_type: String,
    pub friction_value: f64,
    pub order: i32,
}

#[derive(Debug, Clone)]
pub struct CrossSectionFeature {
    pub code: String,
    // Surveyed xyz profile across the channel.
    pub geometry: Vec<Point3>,
    pub friction_type: String,
    pub friction_value: f64,
}

// Fallback profile parameters for branches without a surveyed section.
#[derive(Debug, Clone)]
pub struct ParameterizedProfileFeature {
    pub branch_code: String,
    pub bottom_width: Option<f64>,
    pub bed_level_upstream: Option<f64>,
    pub bed_level_downstream: Option<f64>,
    pub embankment_left: Option<f64>,
    pub embankment_right: Option<f64>,
    pub slope_left: Option<f64>,
    pub slope_right: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct BridgeFeature {
    pub code: String,
    pub location: Point,
    pub bed_level: f64,
    pub length: f64,
    pub inlet_loss: f64,
    pub outlet_loss: f64,
    // Code of the associated cross-section; the association is mandatory.
    pub cross_section: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WeirFeature {
    pub code: String,
    pub location: Point,
    pub crest_level: f64,
    pub crest_width: f64,
    pub discharge_coeff: f64,
    // Present when the weir has a surveyed profile and must be written as
    // a universal weir.
    pub cross_section: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OrificeFeature {
    pub code: String,
    pub location: Point,
    pub crest_level: f64,
    pub gate_lower_edge: f64,
    pub opening_width: f64,
    pub contraction_coeff: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CulvertShape {
    Round,
    Rectangular,
}

impl CulvertShape {
    // Source shape codes: 1/rond and 5/ellipsvormig map to round,
    // 3/rechthoekig and 99/onbekend to rectangular.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "1" | "5" | "rond" | "ellipsvormig" => Some(CulvertShape::Round),
            "3" | "99" | "rechthoekig" | "onbekend" => Some(CulvertShape::Rectangular),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CulvertFeature {
    pub code: String,
    // Digitized line of the culvert barrel. Only used to locate the culvert
    // on its branch; the hydraulic length comes from the chainage delta.
    pub geometry: Vec<Point>,
    pub shape: String,
    pub opening_height: f64,
    pub opening_width: f64,
    pub left_level: f64,
    pub right_level: f64,
    pub inlet_loss: f64,
    pub outlet_loss: f64,
    pub friction_type: String,
    pub friction_value: f64,
}

// Pump control input. Absolute levels pass through unchanged; legacy
// records carry a setpoint plus margins in centimeter text fields and are
// converted to absolute elevations at ingest.
#[derive(Debug, Clone)]
pub enum PumpControlFeature {
    Absolute {
        start_level: f64,
        stop_level: f64,
    },
    LegacySetpoint {
        target_level: f64,
        upper_margin: String,
        lower_margin: String,
    },
}

#[derive(Debug, Clone)]
pub struct PumpFeature {
    pub code: String,
    pub location: Point,
    // m3/min as delivered by the source schema.
    pub capacity: f64,
    pub direction: i32,
    pub control: PumpControlFeature,
}

#[derive(Debug, Clone)]
pub struct CompoundFeature {
    pub code: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BoundaryFeature {
    pub code: String,
    pub location: Point,
    pub quantity: String,
    pub value: Option<f64>,
    pub series: Option<Vec<(NaiveDateTime, f64)>>,
}

#[derive(Debug, Clone)]
pub struct CatchmentFeature {
    pub code: String,
    pub centroid: Point,
    pub area_m2: f64,
    pub runoff_coefficient: f64,
    // Optional explicit target node; otherwise the nearest node is used.
    pub node_code: Option<String>,
}

// The full normalized input set handed to the model builder.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    pub channels: Vec<ChannelFeature>,
    pub cross_sections: Vec<CrossSectionFeature>,
    pub parameterized_profiles: Vec<ParameterizedProfileFeature>,
    pub bridges: Vec<BridgeFeature>,
    pub weirs: Vec<WeirFeature>,
    pub orifices: Vec<OrificeFeature>,
    pub culverts: Vec<CulvertFeature>,
    pub pumps: Vec<PumpFeature>,
    pub compounds: Vec<CompoundFeature>,
    pub boundaries: Vec<BoundaryFeature>,
    pub catchments: Vec<CatchmentFeature>,
}

impl FeatureSet {
    pub fn feature_count(&self) -> usize {
        self.channels.len()
            + self.cross_sections.len()
            + self.parameterized_profiles.len()
            + self.bridges.len()
            + self.weirs.len()
            + self.orifices.len()
            + self.culverts.len()
            + self.pumps.len()
            + self.compounds.len()
            + self.boundaries.len()
            + self.catchments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polyline_length() {
        let line = vec![Point::new(0.0, 0.0), Point::new(3.0, 4.0), Point::new(3.0, 14.0)];
        assert!((polyline_length(&line) - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_project_chainage_midpoint() {
        let line = vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
        let ch = project_chainage(&Point::new(4.0, 2.0), &line);
        assert!((ch - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_project_chainage_clamps_to_ends() {
        let line = vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
        assert_eq!(project_chainage(&Point::new(-5.0, 1.0), &line), 0.0);
        assert_eq!(project_chainage(&Point::new(15.0, 1.0), &line), 10.0);
    }

    #[test]
    fn test_segments_cross() {
        let a1 = Point::new(0.0, 0.0);
        let a2 = Point::new(10.0, 10.0);
        let b1 = Point::new(0.0, 10.0);
        let b2 = Point::new(10.0, 0.0);
        assert!(segments_cross(&a1, &a2, &b1, &b2));
        // Sharing an endpoint is not a crossing
        let c2 = Point::new(10.0, 10.0);
        assert!(!segments_cross(&a1, &a2, &a2, &c2));
    }

    #[test]
    fn test_culvert_shape_codes() {
        assert_eq!(CulvertShape::from_code("1"), Some(CulvertShape::Round));
        assert_eq!(CulvertShape::from_code("rond"), Some(CulvertShape::Round));
        assert_eq!(
            CulvertShape::from_code("99"),
            Some(CulvertShape::Rectangular)
        );
        assert_eq!(CulvertShape::from_code("7"), None);
    }
}

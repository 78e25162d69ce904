use crate::error::BuildError;
use crate::feature::BoundaryFeature;
use crate::network::Network;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcingQuantity {
    WaterLevel,
    Discharge,
}

impl ForcingQuantity {
    // Source quantity codes: 0/waterstand is a water level, 1/afvoer a
    // discharge.
    pub fn from_source(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "0" | "waterstand" | "waterlevel" => Some(Self::WaterLevel),
            "1" | "afvoer" | "discharge" => Some(Self::Discharge),
            _ => None,
        }
    }

    pub fn boundary_name(&self) -> &'static str {
        match self {
            Self::WaterLevel => "waterlevelbnd",
            Self::Discharge => "dischargebnd",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Self::WaterLevel => "m",
            Self::Discharge => "m3/s",
        }
    }
}

#[derive(Debug, Clone)]
pub enum ForcingData {
    Constant(f64),
    TimeSeries(Vec<(NaiveDateTime, f64)>),
}

#[derive(Debug, Clone)]
pub struct BoundaryCondition {
    pub id: String,
    pub node_id: String,
    pub quantity: ForcingQuantity,
    pub data: ForcingData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialQuantity {
    WaterLevel,
    WaterDepth,
}

// Initial conditions are a reference resolved from the model control file,
// never inline forcing records.
#[derive(Debug, Clone, Copy)]
pub struct InitialCondition {
    pub quantity: InitialQuantity,
    pub value: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Forcings {
    pub boundaries: Vec<BoundaryCondition>,
    pub initial: Option<InitialCondition>,
}

impl Forcings {
    pub fn new() -> Self {
        Self::default()
    }

    // Batch path: every constant-valued boundary feature in the collection
    // becomes a record in one pass. Time-series features are deliberately
    // not picked up here; they need an explicit add_time_series call per
    // feature. That asymmetry mirrors the source scheme and is a documented
    // limitation, not an oversight.
    pub fn derive_constant_boundaries(
        &mut self,
        features: &[BoundaryFeature],
        network: &mut Network,
    ) -> Vec<BuildError> {
        let mut errors = Vec::new();
        for feature in features {
            if feature.series.is_some() {
                continue;
            }
            // Validate before resolving the node: a rejected feature must
            // leave the partial model untouched.
            let Some(value) = feature.value else {
                errors.push(BuildError::geometry(
                    &feature.code,
                    "boundary feature carries neither a value nor a series",
                ));
                continue;
            };
            match self.boundary_record(feature, network) {
                Ok((mut bc, node_idx)) => {
                    bc.data = ForcingData::Constant(value);
                    network.mark_boundary(node_idx);
                    self.boundaries.push(bc);
                }
                Err(e) => errors.push(e),
            }
        }
        errors
    }

    // Explicit per-feature path for time-varying boundaries.
    pub fn add_time_series(
        &mut self,
        feature: &BoundaryFeature,
        network: &mut Network,
    ) -> Result<(), BuildError> {
        let series = feature.series.as_ref().ok_or_else(|| {
            BuildError::geometry(&feature.code, "boundary feature has no time series")
        })?;
        if series.is_empty() {
            return Err(BuildError::geometry(&feature.code, "empty time series"));
        }
        if series.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(BuildError::geometry(
                &feature.code,
                "time series timestamps are not strictly increasing",
            ));
        }
        let (mut bc, node_idx) = self.boundary_record(feature, network)?;
        bc.data = ForcingData::TimeSeries(series.clone());
        network.mark_boundary(node_idx);
        self.boundaries.push(bc);
        Ok(())
    }

    // Resolve the record without mutating anything; the node role only
    // changes once the caller commits the record.
    fn boundary_record(
        &self,
        feature: &BoundaryFeature,
        network: &Network,
    ) -> Result<(BoundaryCondition, usize), BuildError> {
        let quantity = ForcingQuantity::from_source(&feature.quantity).ok_or_else(|| {
            BuildError::geometry(
                &feature.code,
                format!("unknown boundary quantity '{}'", feature.quantity),
            )
        })?;
        let (node_idx, _) = network.nearest_node(&feature.location).ok_or_else(|| {
            BuildError::geometry(&feature.code, "no network node to attach boundary to")
        })?;
        Ok((
            BoundaryCondition {
                id: feature.code.clone(),
                node_id: network.node_id(node_idx).to_string(),
                quantity,
                data: ForcingData::Constant(0.0),
            },
            node_idx,
        ))
    }

    pub fn set_initial_water_level(&mut self, level: f64) {
        self.initial = Some(InitialCondition {
            quantity: InitialQuantity::WaterLevel,
            value: level,
        });
    }

    pub fn set_initial_water_depth(&mut self, depth: f64) {
        self.initial = Some(InitialCondition {
            quantity: InitialQuantity::WaterDepth,
            value: depth,
        });
    }
}

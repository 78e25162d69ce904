use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

// Error taxonomy for the model build. Per-feature errors (geometry,
// association, composition, unit conversion) are collected in the build
// summary next to a best-effort partial model; serialization errors are
// fatal and abort before any artifact is written.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("geometry error for '{feature}': {reason}")]
    Geometry { feature: String, reason: String },

    #[error("association error for structure '{structure}': {reason}")]
    Association { structure: String, reason: String },

    #[error("composition error for compound '{compound}': {reason}")]
    Composition { compound: String, reason: String },

    #[error("cannot convert {field} value '{value}'")]
    UnitConversion { field: &'static str, value: String },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("netcdf error: {0}")]
    NetCdf(#[from] netcdf::Error),
}

impl BuildError {
    pub fn geometry(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Geometry {
            feature: feature.into(),
            reason: reason.into(),
        }
    }

    pub fn association(structure: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Association {
            structure: structure.into(),
            reason: reason.into(),
        }
    }

    pub fn composition(compound: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Composition {
            compound: compound.into(),
            reason: reason.into(),
        }
    }

    pub fn unit_conversion(field: &'static str, value: impl Into<String>) -> Self {
        Self::UnitConversion {
            field,
            value: value.into(),
        }
    }

    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }

    // Serialization errors are global and abort the build before any
    // output file is touched; everything else is reported per feature.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Serialization { .. } | Self::Io(_) | Self::NetCdf(_)
        )
    }
}

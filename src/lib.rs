pub mod builder;
pub mod cli;
pub mod config;
pub mod crosssection;
pub mod error;
pub mod feature;
pub mod forcing;
pub mod io;
pub mod mesh;
pub mod network;
pub mod rr;
pub mod structures;

pub use builder::{BuildSummary, Model, ModelBuilder};
pub use config::{BuildConfig, FieldMapping, FormatVersion};
pub use error::{BuildError, BuildResult};
pub use io::Serializer;

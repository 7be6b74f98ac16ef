pub mod bundle;
pub mod cleaning;
pub mod compute;
pub mod enrich;
pub mod error;
pub mod geo;
pub mod pipeline;
pub mod reports;
pub mod schema;
pub mod seasons;
pub mod workbook;

pub use error::ReportError;
pub use pipeline::{run, RunConfig};

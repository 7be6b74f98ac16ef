use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Missing bundle table: {0}")]
    MissingTable(PathBuf),

    #[error("Missing auxiliary file: {0}")]
    MissingAuxiliary(PathBuf),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[error("Raster error: {0}")]
    Raster(#[from] tiff::TiffError),

    #[error("InvalidData: {0}")]
    InvalidData(String),
}

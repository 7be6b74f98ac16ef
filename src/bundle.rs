use std::path::Path;

use polars::datatypes::TimeUnit;
use polars::prelude::StrptimeOptions;
use polars::prelude::*;

use crate::error::ReportError;
use crate::schema::{deployments, images};

/// Timestamp format used by image records.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Date format used by deployment start/end dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The four tables of a camera-trap survey bundle.
#[derive(Debug)]
pub struct Bundle {
    pub cameras: DataFrame,
    pub deployments: DataFrame,
    pub images: DataFrame,
    pub projects: DataFrame,
}

/// Read a bundle directory.
///
/// Expects cameras.csv, deployments.csv, images.csv and projects.csv.
/// Image timestamps and deployment start/end dates are parsed to Datetime;
/// a `taxon` column (genus + species epithet) is derived on the images.
pub fn read_bundle(path: &Path) -> Result<Bundle, ReportError> {
    let cameras = read_csv_as_strings(&path.join("cameras.csv"))?;
    let deployments_df = read_csv_as_strings(&path.join("deployments.csv"))?;
    let images_df = read_csv_as_strings(&path.join("images.csv"))?;
    let projects = read_csv_as_strings(&path.join("projects.csv"))?;

    require_columns(&images_df, &images::REQUIRED)?;
    require_columns(&deployments_df, &deployments::REQUIRED)?;

    let images_df = parse_datetime_column(images_df, images::TIMESTAMP, TIMESTAMP_FORMAT)?;
    let images_df = with_taxon_column(images_df)?;

    let deployments_df =
        parse_datetime_column(deployments_df, deployments::START_DATE, DATE_FORMAT)?;
    let deployments_df = parse_datetime_column(deployments_df, deployments::END_DATE, DATE_FORMAT)?;

    Ok(Bundle {
        cameras,
        deployments: deployments_df,
        images: images_df,
        projects,
    })
}

/// Read a CSV file with all columns as String dtype.
/// Trims whitespace from column names.
pub fn read_csv_as_strings(path: &Path) -> Result<DataFrame, ReportError> {
    if !path.is_file() {
        return Err(ReportError::MissingTable(path.to_path_buf()));
    }
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    Ok(df)
}

pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), ReportError> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(ReportError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

/// Parse a string column to Datetime. Leaves the frame untouched when the
/// column is absent.
pub fn parse_datetime_column(
    df: DataFrame,
    column: &str,
    format: &str,
) -> Result<DataFrame, ReportError> {
    if df.column(column).is_ok() {
        let df = df
            .lazy()
            .with_columns([col(column)
                .str()
                .strip_chars(lit(" \t\r\n"))
                .str()
                .to_datetime(
                    Some(TimeUnit::Microseconds),
                    None,
                    StrptimeOptions {
                        format: Some(format.into()),
                        strict: false,
                        ..Default::default()
                    },
                    lit("raise"),
                )])
            .collect()?;
        Ok(df)
    } else {
        Ok(df)
    }
}

/// Derive the scientific-name column from genus and species epithet.
///
/// `taxon` is "Genus epithet" when the epithet is present, the genus alone
/// when only the genus is identified, and null otherwise.
pub fn with_taxon_column(df: DataFrame) -> Result<DataFrame, ReportError> {
    let genus = df.column(images::GENUS)?.str()?;
    let species = df.column(images::SPECIES)?.str()?;

    let mut taxa: Vec<Option<String>> = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let g = genus.get(i).map(str::trim).filter(|g| !g.is_empty());
        let s = species.get(i).map(str::trim).filter(|s| !s.is_empty());
        taxa.push(match (g, s) {
            (Some(g), Some(s)) => Some(format!("{g} {s}")),
            (Some(g), None) => Some(g.to_string()),
            (None, _) => None,
        });
    }

    let mut df = df;
    df.with_column(Column::new(images::TAXON.into(), taxa))?;
    Ok(df)
}

use std::collections::BTreeSet;

use polars::prelude::*;
use regex::Regex;

use crate::bundle::require_columns;
use crate::error::ReportError;
use crate::schema::{images, CONSOLIDADO};

/// Grouping granularity applied by every report generator.
///
/// The whole-survey partition aggregates deployments to physical locations
/// (several deployments can share a site across seasons); a named-season
/// partition keeps each deployment as its own unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Location,
    Deployment,
}

/// One (label, record-subset) pair of the partition sequence.
#[derive(Debug, Clone)]
pub struct Partition {
    pub label: String,
    pub granularity: Granularity,
    /// Season value to filter on; `None` selects the full record set.
    pub season: Option<String>,
}

impl Partition {
    fn consolidado() -> Self {
        Self {
            label: CONSOLIDADO.to_string(),
            granularity: Granularity::Location,
            season: None,
        }
    }

    fn named(label: &str) -> Self {
        Self {
            label: label.to_string(),
            granularity: Granularity::Deployment,
            season: Some(label.to_string()),
        }
    }

    /// The record subset this partition covers.
    pub fn subset(&self, df: &DataFrame) -> Result<DataFrame, ReportError> {
        match &self.season {
            None => Ok(df.clone()),
            Some(season) => {
                require_columns(df, &[images::SEASON])?;
                let out = df
                    .clone()
                    .lazy()
                    .filter(col(images::SEASON).eq(lit(season.as_str())))
                    .collect()?;
                Ok(out)
            }
        }
    }
}

/// Add the season column, extracted from the deployment identifier.
///
/// The season is the first `T<digit>` match in the identifier; identifiers
/// without a match get a null season and belong to no named partition.
pub fn with_season_column(df: DataFrame) -> Result<DataFrame, ReportError> {
    require_columns(&df, &[images::DEPLOYMENT_ID])?;

    let pattern = Regex::new(r"T\d").expect("static season pattern");
    let ids = df.column(images::DEPLOYMENT_ID)?.str()?;

    let seasons: Vec<Option<String>> = ids
        .into_iter()
        .map(|id| {
            id.and_then(|id| pattern.find(id))
                .map(|m| m.as_str().to_string())
        })
        .collect();

    let mut df = df;
    df.with_column(Column::new(images::SEASON.into(), seasons))?;
    Ok(df)
}

/// Build the ordered partition sequence.
///
/// "Consolidado" over the full set always comes first; when seasons are
/// enabled one partition per distinct season label follows, in sorted order.
pub fn build_partitions(
    images: &DataFrame,
    seasons_enabled: bool,
) -> Result<Vec<Partition>, ReportError> {
    let mut partitions = vec![Partition::consolidado()];
    if !seasons_enabled {
        return Ok(partitions);
    }

    require_columns(images, &[images::SEASON])?;
    let seasons = images.column(images::SEASON)?.str()?;

    let labels: BTreeSet<String> = seasons
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    for label in labels {
        if label == CONSOLIDADO {
            return Err(ReportError::InvalidData(format!(
                "season label collides with the reserved partition name {CONSOLIDADO:?}"
            )));
        }
        partitions.push(Partition::named(&label));
    }

    Ok(partitions)
}

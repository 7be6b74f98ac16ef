//! Ecological computations consumed by the report generators.
//!
//! Long-form aggregates use polars lazy expressions; pivoted tables are
//! assembled column by column from `partition_by` groups.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use polars::prelude::*;
use tracing::warn;

use crate::bundle::require_columns;
use crate::error::ReportError;
use crate::schema::{deployments, images, report};
use crate::seasons::Granularity;

const US_PER_DAY: i64 = 86_400_000_000;

/// Attach the grouping-unit column for the requested granularity.
///
/// Returns the frame together with the unit column name: `placename`
/// (joined in from the deployments table) for location granularity,
/// `deployment_id` for deployment granularity.
pub fn attach_unit(
    images_df: &DataFrame,
    deployments_df: &DataFrame,
    granularity: Granularity,
) -> Result<(DataFrame, &'static str), ReportError> {
    match granularity {
        Granularity::Deployment => Ok((images_df.clone(), images::DEPLOYMENT_ID)),
        Granularity::Location => {
            require_columns(
                deployments_df,
                &[deployments::DEPLOYMENT_ID, deployments::PLACENAME],
            )?;
            let joined = images_df
                .clone()
                .lazy()
                .join(
                    deployments_df
                        .clone()
                        .lazy()
                        .group_by([col(deployments::DEPLOYMENT_ID)])
                        .agg([col(deployments::PLACENAME).first()]),
                    [col(images::DEPLOYMENT_ID)],
                    [col(deployments::DEPLOYMENT_ID)],
                    JoinArgs::new(JoinType::Left),
                )
                .collect()?;
            Ok((joined, deployments::PLACENAME))
        }
    }
}

/// Per-taxon detection count with taxonomy columns and the number of
/// grouping units the taxon was recorded at.
pub fn compute_general_count(
    images_df: &DataFrame,
    deployments_df: &DataFrame,
    granularity: Granularity,
) -> Result<DataFrame, ReportError> {
    require_columns(images_df, &[images::TAXON, images::CLASS])?;
    let (df, unit) = attach_unit(images_df, deployments_df, granularity)?;

    let out = df
        .lazy()
        .filter(col(images::TAXON).is_not_null())
        .group_by([col(images::TAXON)])
        .agg([
            col(images::CLASS).first(),
            col(images::GENUS).first(),
            col(images::SPECIES).first(),
            len().alias(report::RECORDS),
            col(unit).n_unique().alias(report::UNITS),
        ])
        .sort([images::TAXON], Default::default())
        .collect()?;
    Ok(out)
}

/// Per-unit record and taxa summary over the raw image set.
///
/// Identified columns exclude records without a genus-rank identification;
/// per-class breakdowns cover the classes present among identified records.
pub fn compute_count_summary(
    images_df: &DataFrame,
    deployments_df: &DataFrame,
    granularity: Granularity,
) -> Result<DataFrame, ReportError> {
    require_columns(images_df, &[images::CLASS, images::GENUS, images::TAXON])?;
    let (df, unit) = attach_unit(images_df, deployments_df, granularity)?;

    let genus_col = df.column(images::GENUS)?.str()?;
    let class_col = df.column(images::CLASS)?.str()?;

    // Class breakdown columns are fixed across units.
    let mut classes: BTreeSet<String> = BTreeSet::new();
    for i in 0..df.height() {
        if is_identified(genus_col.get(i)) {
            if let Some(c) = class_col.get(i).map(str::trim).filter(|c| !c.is_empty()) {
                classes.insert(c.to_string());
            }
        }
    }
    let classes: Vec<String> = classes.into_iter().collect();

    struct UnitSummary {
        unit: String,
        total: i64,
        identified: i64,
        records_by_class: Vec<i64>,
        taxa: i64,
        taxa_by_class: Vec<i64>,
    }

    let mut summaries: Vec<UnitSummary> = Vec::new();
    for group in df.partition_by([unit], true)? {
        let units = group.column(unit)?.str()?;
        let Some(unit_name) = units.get(0).map(str::to_string) else {
            warn!(
                records = group.height(),
                "records without a matching deployment left out of the summary"
            );
            continue;
        };

        let genus = group.column(images::GENUS)?.str()?;
        let class = group.column(images::CLASS)?.str()?;
        let taxon = group.column(images::TAXON)?.str()?;

        let mut identified = 0i64;
        let mut records_by_class = vec![0i64; classes.len()];
        let mut taxa: HashSet<String> = HashSet::new();
        let mut taxa_by_class: Vec<HashSet<String>> = vec![HashSet::new(); classes.len()];

        for i in 0..group.height() {
            if !is_identified(genus.get(i)) {
                continue;
            }
            identified += 1;
            let class_idx = class
                .get(i)
                .map(str::trim)
                .and_then(|c| classes.iter().position(|k| k == c));
            if let Some(idx) = class_idx {
                records_by_class[idx] += 1;
            }
            if let Some(t) = taxon.get(i) {
                taxa.insert(t.to_string());
                if let Some(idx) = class_idx {
                    taxa_by_class[idx].insert(t.to_string());
                }
            }
        }

        summaries.push(UnitSummary {
            unit: unit_name,
            total: group.height() as i64,
            identified,
            records_by_class,
            taxa: taxa.len() as i64,
            taxa_by_class: taxa_by_class.iter().map(|s| s.len() as i64).collect(),
        });
    }
    summaries.sort_by(|a, b| a.unit.cmp(&b.unit));

    let mut columns: Vec<Column> = vec![
        Column::new(
            unit.into(),
            summaries.iter().map(|s| s.unit.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            report::TOTAL_RECORDS.into(),
            summaries.iter().map(|s| s.total).collect::<Vec<_>>(),
        ),
        Column::new(
            report::IDENTIFIED_RECORDS.into(),
            summaries.iter().map(|s| s.identified).collect::<Vec<_>>(),
        ),
    ];
    for (idx, class_name) in classes.iter().enumerate() {
        columns.push(Column::new(
            format!("records_{class_name}").into(),
            summaries
                .iter()
                .map(|s| s.records_by_class[idx])
                .collect::<Vec<_>>(),
        ));
    }
    columns.push(Column::new(
        report::TAXA.into(),
        summaries.iter().map(|s| s.taxa).collect::<Vec<_>>(),
    ));
    for (idx, class_name) in classes.iter().enumerate() {
        columns.push(Column::new(
            format!("taxa_{class_name}").into(),
            summaries
                .iter()
                .map(|s| s.taxa_by_class[idx])
                .collect::<Vec<_>>(),
        ));
    }

    Ok(DataFrame::new(columns)?)
}

/// Per-taxon abundance pivoted to one column per grouping unit, zero-filled.
pub fn compute_detection(
    images_df: &DataFrame,
    deployments_df: &DataFrame,
    granularity: Granularity,
) -> Result<DataFrame, ReportError> {
    require_columns(images_df, &[images::TAXON])?;
    let (df, unit) = attach_unit(images_df, deployments_df, granularity)?;

    let taxon_col = df.column(images::TAXON)?.str()?;
    let unit_col = df.column(unit)?.str()?;

    let mut taxa: BTreeSet<String> = BTreeSet::new();
    let mut units: BTreeSet<String> = BTreeSet::new();
    let mut counts: HashMap<(String, String), i64> = HashMap::new();

    for i in 0..df.height() {
        let (Some(taxon), Some(unit_name)) = (taxon_col.get(i), unit_col.get(i)) else {
            continue;
        };
        taxa.insert(taxon.to_string());
        units.insert(unit_name.to_string());
        *counts
            .entry((taxon.to_string(), unit_name.to_string()))
            .or_insert(0) += 1;
    }

    let taxa: Vec<String> = taxa.into_iter().collect();
    let mut columns: Vec<Column> = vec![Column::new(images::TAXON.into(), taxa.clone())];
    for unit_name in units {
        let values: Vec<i64> = taxa
            .iter()
            .map(|t| {
                counts
                    .get(&(t.clone(), unit_name.clone()))
                    .copied()
                    .unwrap_or(0)
            })
            .collect();
        columns.push(Column::new(unit_name.as_str().into(), values));
    }

    Ok(DataFrame::new(columns)?)
}

/// Binary detection history per (deployment, taxon) over consecutive
/// `days`-day bins spanning the deployment periods.
///
/// Bins outside a deployment's active period are null; the caller decides
/// how to render them.
pub fn compute_detection_history(
    images_df: &DataFrame,
    deployments_df: &DataFrame,
    days: i64,
) -> Result<DataFrame, ReportError> {
    require_columns(images_df, &[images::DEPLOYMENT_ID, images::TAXON, images::TIMESTAMP])?;
    require_columns(
        deployments_df,
        &[
            deployments::DEPLOYMENT_ID,
            deployments::START_DATE,
            deployments::END_DATE,
        ],
    )?;

    // Active periods, in whole days since epoch.
    let periods_df = deployments_df
        .clone()
        .lazy()
        .select([
            col(deployments::DEPLOYMENT_ID),
            col(deployments::START_DATE).cast(DataType::Int64),
            col(deployments::END_DATE).cast(DataType::Int64),
        ])
        .collect()?;
    let ids = periods_df.column(deployments::DEPLOYMENT_ID)?.str()?;
    let starts = periods_df.column(deployments::START_DATE)?.i64()?;
    let ends = periods_df.column(deployments::END_DATE)?.i64()?;

    let mut periods: HashMap<String, (i64, i64)> = HashMap::new();
    for i in 0..periods_df.height() {
        if let (Some(id), Some(start), Some(end)) = (ids.get(i), starts.get(i), ends.get(i)) {
            periods.insert(
                id.to_string(),
                (start.div_euclid(US_PER_DAY), end.div_euclid(US_PER_DAY)),
            );
        }
    }

    // Detection days per (deployment, taxon).
    let with_ts = images_df
        .clone()
        .lazy()
        .with_columns([col(images::TIMESTAMP).cast(DataType::Int64)])
        .collect()?;
    let dep_col = with_ts.column(images::DEPLOYMENT_ID)?.str()?;
    let taxon_col = with_ts.column(images::TAXON)?.str()?;
    let ts_col = with_ts.column(images::TIMESTAMP)?.i64()?;

    let mut detections: BTreeMap<(String, String), Vec<i64>> = BTreeMap::new();
    for i in 0..with_ts.height() {
        let (Some(dep), Some(taxon), Some(ts)) = (dep_col.get(i), taxon_col.get(i), ts_col.get(i))
        else {
            continue;
        };
        if !periods.contains_key(dep) {
            continue; // image without a matching deployment record
        }
        detections
            .entry((dep.to_string(), taxon.to_string()))
            .or_default()
            .push(ts.div_euclid(US_PER_DAY));
    }

    // Bin layout over the union of observed deployment periods.
    let observed: Vec<&(i64, i64)> = detections
        .keys()
        .filter_map(|(dep, _)| periods.get(dep))
        .collect();
    let Some(first_day) = observed.iter().map(|p| p.0).min() else {
        return Ok(DataFrame::new(vec![
            Column::new(images::DEPLOYMENT_ID.into(), Vec::<String>::new()),
            Column::new(images::TAXON.into(), Vec::<String>::new()),
        ])?);
    };
    let last_day = observed
        .iter()
        .map(|p| p.1)
        .max()
        .expect("non-empty observed periods");
    let n_bins = ((last_day - first_day) / days + 1) as usize;

    let mut dep_values: Vec<String> = Vec::with_capacity(detections.len());
    let mut taxon_values: Vec<String> = Vec::with_capacity(detections.len());
    let mut bin_values: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(detections.len()); n_bins];

    for ((dep, taxon), det_days) in &detections {
        let (start, end) = periods[dep.as_str()];
        dep_values.push(dep.clone());
        taxon_values.push(taxon.clone());
        for (bin, values) in bin_values.iter_mut().enumerate() {
            let bin_start = first_day + bin as i64 * days;
            let bin_end = bin_start + days - 1;
            if bin_end < start || bin_start > end {
                values.push(None);
            } else {
                let detected = det_days.iter().any(|d| *d >= bin_start && *d <= bin_end);
                values.push(Some(if detected { 1.0 } else { 0.0 }));
            }
        }
    }

    let mut columns: Vec<Column> = vec![
        Column::new(images::DEPLOYMENT_ID.into(), dep_values),
        Column::new(images::TAXON.into(), taxon_values),
    ];
    for (bin, values) in bin_values.into_iter().enumerate() {
        let label = day_label(first_day + bin as i64 * days);
        columns.push(Column::new(label.as_str().into(), values));
    }

    Ok(DataFrame::new(columns)?)
}

/// Hill diversity numbers of orders q=0, 1, 2 per grouping unit, pivoted to
/// one column per order.
pub fn compute_hill_numbers(
    images_df: &DataFrame,
    deployments_df: &DataFrame,
    granularity: Granularity,
) -> Result<DataFrame, ReportError> {
    require_columns(images_df, &[images::TAXON])?;
    let (df, unit) = attach_unit(images_df, deployments_df, granularity)?;

    struct UnitDiversity {
        unit: String,
        q: [f64; 3],
    }

    let mut rows: Vec<UnitDiversity> = Vec::new();
    for group in df.partition_by([unit], true)? {
        let units = group.column(unit)?.str()?;
        let Some(unit_name) = units.get(0).map(str::to_string) else {
            warn!(
                records = group.height(),
                "records without a matching deployment left out of the diversity table"
            );
            continue;
        };

        let taxon = group.column(images::TAXON)?.str()?;
        let mut abundance: HashMap<String, f64> = HashMap::new();
        for value in taxon.into_iter().flatten() {
            *abundance.entry(value.to_string()).or_insert(0.0) += 1.0;
        }
        let total: f64 = abundance.values().sum();
        if total == 0.0 {
            continue;
        }

        let richness = abundance.len() as f64;
        let mut shannon = 0.0;
        let mut simpson = 0.0;
        for count in abundance.values() {
            let p = count / total;
            shannon -= p * p.ln();
            simpson += p * p;
        }

        rows.push(UnitDiversity {
            unit: unit_name,
            q: [richness, shannon.exp(), 1.0 / simpson],
        });
    }
    rows.sort_by(|a, b| a.unit.cmp(&b.unit));

    Ok(DataFrame::new(vec![
        Column::new(
            unit.into(),
            rows.iter().map(|r| r.unit.clone()).collect::<Vec<_>>(),
        ),
        Column::new("0".into(), rows.iter().map(|r| r.q[0]).collect::<Vec<_>>()),
        Column::new("1".into(), rows.iter().map(|r| r.q[1]).collect::<Vec<_>>()),
        Column::new("2".into(), rows.iter().map(|r| r.q[2]).collect::<Vec<_>>()),
    ])?)
}

fn is_identified(genus: Option<&str>) -> bool {
    genus.map(str::trim).is_some_and(|g| !g.is_empty())
}

fn day_label(day: i64) -> String {
    DateTime::<Utc>::from_timestamp(day * 86_400, 0)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| day.to_string())
}

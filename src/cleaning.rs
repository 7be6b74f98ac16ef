use polars::prelude::*;

use crate::bundle::require_columns;
use crate::error::ReportError;
use crate::schema::images;

/// Sliding window for collapsing repeated detections of the same taxon
/// at the same deployment.
pub const DUPLICATE_WINDOW_MINUTES: i64 = 30;

/// Scientific names treated as domestic taxa and excluded from all
/// ecological counts.
pub const DOMESTIC_TAXA: [&str; 14] = [
    "Bos taurus",
    "Bos indicus",
    "Bubalus bubalis",
    "Canis familiaris",
    "Canis lupus familiaris",
    "Capra hircus",
    "Cairina moschata",
    "Equus asinus",
    "Equus caballus",
    "Equus ferus",
    "Felis catus",
    "Gallus gallus",
    "Ovis aries",
    "Sus scrofa",
];

const TS_US: &str = "__ts_us";
const WINDOW_US: i64 = DUPLICATE_WINDOW_MINUTES * 60 * 1_000_000;

/// Full cleaning sequence: domestic removal, unidentified removal at genus
/// rank, 30-minute duplicate collapsing. Order is fixed.
pub fn clean_images(images: &DataFrame) -> Result<DataFrame, ReportError> {
    let cleaned = remove_domestic(images)?;
    let cleaned = remove_unidentified(&cleaned)?;
    remove_duplicates(&cleaned)
}

/// Drop records whose scientific name is a known domestic taxon.
/// Unidentified records (null taxon) pass through untouched.
pub fn remove_domestic(df: &DataFrame) -> Result<DataFrame, ReportError> {
    require_columns(df, &[images::TAXON])?;

    let domestic = Series::new("domestic".into(), DOMESTIC_TAXA.as_slice());
    let out = df
        .clone()
        .lazy()
        .filter(
            col(images::TAXON)
                .is_in(lit(domestic), false)
                .not()
                .or(col(images::TAXON).is_null()),
        )
        .collect()?;
    Ok(out)
}

/// Drop records that are not identified at genus rank or below.
pub fn remove_unidentified(df: &DataFrame) -> Result<DataFrame, ReportError> {
    require_columns(df, &[images::GENUS])?;

    let out = df
        .clone()
        .lazy()
        .filter(
            col(images::GENUS)
                .is_not_null()
                .and(col(images::GENUS).neq(lit(""))),
        )
        .collect()?;
    Ok(out)
}

/// Collapse detections of the same taxon at the same deployment that fall
/// within the 30-minute window, keeping the earliest record of each window.
///
/// A record is kept when it is more than the window apart from the last
/// kept record of its (deployment, taxon) group, so the operation is
/// idempotent on an already collapsed set.
pub fn remove_duplicates(df: &DataFrame) -> Result<DataFrame, ReportError> {
    require_columns(df, &[images::DEPLOYMENT_ID, images::TAXON, images::TIMESTAMP])?;

    let with_ts = df
        .clone()
        .lazy()
        .with_columns([col(images::TIMESTAMP)
            .cast(DataType::Int64)
            .alias(TS_US)])
        .collect()?;

    let partitions = with_ts.partition_by([images::DEPLOYMENT_ID, images::TAXON], true)?;

    let mut acc: Option<DataFrame> = None;
    for partition in partitions {
        let sorted = partition.sort([images::TIMESTAMP], SortMultipleOptions::default())?;
        let ts = sorted.column(TS_US)?.i64()?;

        let mut keep = Vec::with_capacity(sorted.height());
        let mut last_kept: Option<i64> = None;
        for value in ts.into_iter() {
            let kept = match (value, last_kept) {
                (Some(t), Some(prev)) => t - prev > WINDOW_US,
                // Unparseable timestamps cannot be deduplicated; keep them.
                _ => true,
            };
            if kept {
                last_kept = value.or(last_kept);
            }
            keep.push(kept);
        }

        let mask = BooleanChunked::from_slice("keep".into(), &keep);
        let filtered = sorted.filter(&mask)?;
        match acc.as_mut() {
            Some(all) => {
                all.vstack_mut(&filtered)?;
            }
            None => acc = Some(filtered),
        }
    }

    let mut out = acc.unwrap_or_else(|| with_ts.clear());
    let _ = out.drop_in_place(TS_US)?;
    Ok(out)
}

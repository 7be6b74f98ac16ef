//! The five report generators. Each one iterates the partition sequence,
//! builds one table per partition and writes one workbook per artifact
//! (detection histories and Hill numbers write three artifacts each).

use std::path::Path;

use polars::prelude::*;

use crate::compute;
use crate::enrich::Enrich;
use crate::error::ReportError;
use crate::schema::{deployments, images};
use crate::seasons::{Granularity, Partition};

/// Survey-effort window sizes for detection histories, in days.
pub const DETECTION_HISTORY_DAYS: [i64; 3] = [5, 8, 10];
/// Taxonomic class subsets for the Hill-number artifacts; the empty string
/// selects all records.
pub const HILL_CLASS_GROUPS: [&str; 3] = ["", "Aves", "Mammalia"];

const NA_SENTINEL: &str = "NA";

fn unit_key(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Location => deployments::PLACENAME,
        Granularity::Deployment => deployments::DEPLOYMENT_ID,
    }
}

/// General summary statistics over the raw record set (DatosGenerales.xlsx).
pub fn write_general_data(
    raw_images: &DataFrame,
    deployments_df: &DataFrame,
    partitions: &[Partition],
    enricher: &dyn Enrich,
    output_path: &Path,
) -> Result<(), ReportError> {
    let mut sheets = Vec::with_capacity(partitions.len());
    for partition in partitions {
        let subset = partition.subset(raw_images)?;
        let table = compute::compute_count_summary(&subset, deployments_df, partition.granularity)?;
        let table =
            enricher.add_site_context(table, deployments_df, unit_key(partition.granularity))?;
        sheets.push((partition.label.clone(), table));
    }
    crate::workbook::write_workbook(&output_path.join("DatosGenerales.xlsx"), &sheets, None)
}

/// Per-species counts with checklist fields (ConteoDetalladoEspecie.xlsx).
pub fn write_general_count(
    clean_images: &DataFrame,
    deployments_df: &DataFrame,
    partitions: &[Partition],
    enricher: &dyn Enrich,
    output_path: &Path,
) -> Result<(), ReportError> {
    let mut sheets = Vec::with_capacity(partitions.len());
    for partition in partitions {
        let subset = partition.subset(clean_images)?;
        let table = compute::compute_general_count(&subset, deployments_df, partition.granularity)?;
        let table = enricher.add_checklist_fields(table)?;
        sheets.push((partition.label.clone(), table));
    }
    crate::workbook::write_workbook(
        &output_path.join("ConteoDetalladoEspecie.xlsx"),
        &sheets,
        None,
    )
}

/// Taxon-by-unit abundance matrix (ConteoDetallado.xlsx).
pub fn write_detection(
    clean_images: &DataFrame,
    deployments_df: &DataFrame,
    partitions: &[Partition],
    output_path: &Path,
) -> Result<(), ReportError> {
    let mut sheets = Vec::with_capacity(partitions.len());
    for partition in partitions {
        let subset = partition.subset(clean_images)?;
        let table = compute::compute_detection(&subset, deployments_df, partition.granularity)?;
        sheets.push((partition.label.clone(), table));
    }
    crate::workbook::write_workbook(&output_path.join("ConteoDetallado.xlsx"), &sheets, None)
}

/// Detection histories per effort window (HistoriasDeteccion{5,8,10}dias.xlsx).
///
/// Aggregate histories over the whole survey are not meaningful, so only
/// named-season partitions produce sheets; with no named season the
/// artifacts are not written at all.
pub fn write_detection_history(
    clean_images: &DataFrame,
    deployments_df: &DataFrame,
    partitions: &[Partition],
    output_path: &Path,
) -> Result<(), ReportError> {
    for days in DETECTION_HISTORY_DAYS {
        let mut sheets = Vec::new();
        for partition in partitions.iter().filter(|p| p.season.is_some()) {
            let subset = partition.subset(clean_images)?;
            let table = compute::compute_detection_history(&subset, deployments_df, days)?;
            sheets.push((partition.label.clone(), table));
        }
        crate::workbook::write_workbook(
            &output_path.join(format!("HistoriasDeteccion{days}dias.xlsx")),
            &sheets,
            Some(NA_SENTINEL),
        )?;
    }
    Ok(())
}

/// Hill diversity numbers per class subset (NumerosHill{,Aves,Mammalia}.xlsx).
pub fn write_hill_numbers(
    clean_images: &DataFrame,
    deployments_df: &DataFrame,
    partitions: &[Partition],
    output_path: &Path,
) -> Result<(), ReportError> {
    for group in HILL_CLASS_GROUPS {
        let group_images = if group.is_empty() {
            clean_images.clone()
        } else {
            clean_images
                .clone()
                .lazy()
                .filter(col(images::CLASS).eq(lit(group)))
                .collect()?
        };

        let mut sheets = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let subset = partition.subset(&group_images)?;
            let table =
                compute::compute_hill_numbers(&subset, deployments_df, partition.granularity)?;
            sheets.push((partition.label.clone(), table));
        }
        crate::workbook::write_workbook(
            &output_path.join(format!("NumerosHill{group}.xlsx")),
            &sheets,
            None,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{parse_datetime_column, with_taxon_column, DATE_FORMAT, TIMESTAMP_FORMAT};
    use crate::enrich::NoEnrichment;
    use crate::seasons::{build_partitions, with_season_column};

    fn images_fixture() -> DataFrame {
        let df = df![
            images::DEPLOYMENT_ID => ["CT-T1-001", "CT-T1-001", "CT-T2-002"],
            images::TIMESTAMP => [
                "2021-03-02 08:00:00",
                "2021-03-04 10:00:00",
                "2021-06-07 09:00:00",
            ],
            images::CLASS => ["Mammalia", "Aves", "Mammalia"],
            images::GENUS => ["Leopardus", "Crax", "Dasyprocta"],
            images::SPECIES => ["pardalis", "alector", "fuliginosa"],
        ]
        .unwrap();
        let df = parse_datetime_column(df, images::TIMESTAMP, TIMESTAMP_FORMAT).unwrap();
        let df = with_taxon_column(df).unwrap();
        with_season_column(df).unwrap()
    }

    fn deployments_fixture() -> DataFrame {
        let df = df![
            deployments::DEPLOYMENT_ID => ["CT-T1-001", "CT-T2-002"],
            deployments::PLACENAME => ["La Selva", "La Selva"],
            deployments::LONGITUDE => ["-73.5", "-73.6"],
            deployments::LATITUDE => ["4.5", "4.6"],
            deployments::START_DATE => ["2021-03-01", "2021-06-01"],
            deployments::END_DATE => ["2021-03-10", "2021-06-10"],
        ]
        .unwrap();
        let df = parse_datetime_column(df, deployments::START_DATE, DATE_FORMAT).unwrap();
        parse_datetime_column(df, deployments::END_DATE, DATE_FORMAT).unwrap()
    }

    #[test]
    fn every_generator_writes_its_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path();
        let imgs = images_fixture();
        let deps = deployments_fixture();
        let partitions = build_partitions(&imgs, true).unwrap();

        write_general_data(&imgs, &deps, &partitions, &NoEnrichment, out).unwrap();
        write_general_count(&imgs, &deps, &partitions, &NoEnrichment, out).unwrap();
        write_detection(&imgs, &deps, &partitions, out).unwrap();
        write_detection_history(&imgs, &deps, &partitions, out).unwrap();
        write_hill_numbers(&imgs, &deps, &partitions, out).unwrap();

        for artifact in [
            "DatosGenerales.xlsx",
            "ConteoDetalladoEspecie.xlsx",
            "ConteoDetallado.xlsx",
            "HistoriasDeteccion5dias.xlsx",
            "HistoriasDeteccion8dias.xlsx",
            "HistoriasDeteccion10dias.xlsx",
            "NumerosHill.xlsx",
            "NumerosHillAves.xlsx",
            "NumerosHillMammalia.xlsx",
        ] {
            assert!(out.join(artifact).exists(), "missing {artifact}");
        }
    }

    #[test]
    fn detection_history_is_skipped_without_named_seasons() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path();
        let imgs = images_fixture();
        let deps = deployments_fixture();
        let partitions = build_partitions(&imgs, false).unwrap();

        write_detection_history(&imgs, &deps, &partitions, out).unwrap();
        assert!(!out.join("HistoriasDeteccion5dias.xlsx").exists());
    }

    #[test]
    fn degraded_mode_adds_no_enrichment_columns() {
        let imgs = images_fixture();
        let deps = deployments_fixture();
        let partitions = build_partitions(&imgs, false).unwrap();

        let subset = partitions[0].subset(&imgs).unwrap();
        let table =
            compute::compute_general_count(&subset, &deps, partitions[0].granularity).unwrap();
        let table = NoEnrichment.add_checklist_fields(table).unwrap();
        assert!(table.column(crate::schema::enrichment::CATEGORIA_MADS).is_err());

        let summary =
            compute::compute_count_summary(&subset, &deps, partitions[0].granularity).unwrap();
        let summary = NoEnrichment
            .add_site_context(summary, &deps, unit_key(partitions[0].granularity))
            .unwrap();
        assert!(summary.column(crate::schema::enrichment::BIOMA).is_err());
        assert!(summary.column(deployments::LONGITUDE).is_err());
    }
}

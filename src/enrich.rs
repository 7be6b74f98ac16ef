//! Enrichment adapter: checklist conservation fields by scientific name and
//! geographic context for grouping units. Reports receive one of these as a
//! capability object; the no-op variant is the degraded mode used when no
//! auxiliary data folder was supplied.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::bundle::require_columns;
use crate::error::ReportError;
use crate::geo;
use crate::schema::{checklist, deployments, ecosystems, enrichment, images};

/// Fixed auxiliary-data layout inside the data folder.
const CHECKLIST_CSV: &str = "taxonomic/Cifras_resolucion_2019_CC.csv";
const ECOSYSTEMS_SHP: &str = "geographic/E_ECCMC_Ver21_100K.shp";
const FOREST_TIF: &str = "geographic/porcentaje_bosque.tif";
const FOOTPRINT_TIF: &str = "geographic/IHEH_2018.tif";

pub trait Enrich {
    /// Append the four checklist conservation fields, joined on the taxon
    /// column. Taxa absent from the checklist get null values.
    fn add_checklist_fields(&self, table: DataFrame) -> Result<DataFrame, ReportError>;

    /// Append biome, ecosystem, forest-cover and human-footprint columns
    /// for each grouping unit, using coordinates from the deployments table.
    fn add_site_context(
        &self,
        table: DataFrame,
        deployments_df: &DataFrame,
        key_col: &str,
    ) -> Result<DataFrame, ReportError>;
}

/// Degraded mode: leaves every table untouched.
pub struct NoEnrichment;

impl Enrich for NoEnrichment {
    fn add_checklist_fields(&self, table: DataFrame) -> Result<DataFrame, ReportError> {
        Ok(table)
    }

    fn add_site_context(
        &self,
        table: DataFrame,
        _deployments_df: &DataFrame,
        _key_col: &str,
    ) -> Result<DataFrame, ReportError> {
        Ok(table)
    }
}

/// Enrichment backed by the auxiliary data folder.
#[derive(Debug)]
pub struct DataFolderEnrichment {
    checklist: DataFrame,
    ecosystems_shp: PathBuf,
    forest_tif: PathBuf,
    footprint_tif: PathBuf,
}

impl DataFolderEnrichment {
    /// Open the auxiliary folder. The checklist is loaded eagerly and the
    /// geographic layers are verified to exist; a missing file is fatal
    /// because the caller explicitly asked for enrichment.
    pub fn open(data_folder: &Path) -> Result<Self, ReportError> {
        let checklist_path = data_folder.join(CHECKLIST_CSV);
        if !checklist_path.is_file() {
            return Err(ReportError::MissingAuxiliary(checklist_path));
        }
        let checklist = read_latin1_csv(&checklist_path)?;
        require_columns(
            &checklist,
            &[
                checklist::SCIENTIFIC_NAME,
                checklist::THREAT_MADS,
                checklist::ENDEMISM,
                checklist::CITES_APPENDIX,
                checklist::THREAT_STATUS,
            ],
        )?;

        let ecosystems_shp = data_folder.join(ECOSYSTEMS_SHP);
        let forest_tif = data_folder.join(FOREST_TIF);
        let footprint_tif = data_folder.join(FOOTPRINT_TIF);
        for path in [&ecosystems_shp, &forest_tif, &footprint_tif] {
            if !path.is_file() {
                return Err(ReportError::MissingAuxiliary(path.clone()));
            }
        }

        Ok(Self {
            checklist,
            ecosystems_shp,
            forest_tif,
            footprint_tif,
        })
    }
}

impl Enrich for DataFolderEnrichment {
    fn add_checklist_fields(&self, table: DataFrame) -> Result<DataFrame, ReportError> {
        join_checklist(table, &self.checklist)
    }

    fn add_site_context(
        &self,
        table: DataFrame,
        deployments_df: &DataFrame,
        key_col: &str,
    ) -> Result<DataFrame, ReportError> {
        let mut table = join_coordinates(table, deployments_df, key_col)?;
        let points = unit_points(&table)?;

        let bioma = geo::read_layer_field(&self.ecosystems_shp, &points, ecosystems::BIOME_FIELD)?;
        let ecosistema =
            geo::read_layer_field(&self.ecosystems_shp, &points, ecosystems::ECOSYSTEM_FIELD)?;
        let forest = geo::sample_raster(&self.forest_tif, &points)?;
        let footprint = geo::sample_raster(&self.footprint_tif, &points)?;
        let categories: Vec<Option<String>> = footprint
            .iter()
            .map(|v| v.and_then(footprint_category).map(String::from))
            .collect();

        table.with_column(Column::new(enrichment::BIOMA.into(), bioma))?;
        table.with_column(Column::new(enrichment::ECOSISTEMA.into(), ecosistema))?;
        table.with_column(Column::new(enrichment::PORCENTAJE_BOSQUE.into(), forest))?;
        table.with_column(Column::new(enrichment::IHEH.into(), footprint))?;
        table.with_column(Column::new(enrichment::IHEH_CAT.into(), categories))?;

        // Coordinates are working data, not report columns.
        let _ = table.drop_in_place(deployments::LONGITUDE)?;
        let _ = table.drop_in_place(deployments::LATITUDE)?;
        Ok(table)
    }
}

/// Bucket the human-footprint index into its four ordinal categories.
/// Values outside [0, 100] belong to no category.
pub fn footprint_category(value: f64) -> Option<&'static str> {
    if !(0.0..=100.0).contains(&value) {
        return None;
    }
    Some(if value <= 15.0 {
        "Natural"
    } else if value <= 40.0 {
        "Bajo"
    } else if value <= 60.0 {
        "Medio"
    } else {
        "Alto"
    })
}

/// Left-join the four checklist fields onto the table's taxon column.
pub fn join_checklist(table: DataFrame, checklist_df: &DataFrame) -> Result<DataFrame, ReportError> {
    require_columns(&table, &[images::TAXON])?;

    let lookup = checklist_df
        .clone()
        .lazy()
        .group_by([col(checklist::SCIENTIFIC_NAME)])
        .agg([
            col(checklist::THREAT_MADS)
                .first()
                .alias(enrichment::CATEGORIA_MADS),
            col(checklist::ENDEMISM).first().alias(enrichment::ENDEMISMO),
            col(checklist::CITES_APPENDIX).first().alias(enrichment::CITES),
            col(checklist::THREAT_STATUS)
                .first()
                .alias(enrichment::CATEGORIA_IUCN),
        ]);

    let out = table
        .lazy()
        .join(
            lookup,
            [col(images::TAXON)],
            [col(checklist::SCIENTIFIC_NAME)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;
    Ok(out)
}

/// Left-join longitude/latitude (as floats) onto the table's unit column.
fn join_coordinates(
    table: DataFrame,
    deployments_df: &DataFrame,
    key_col: &str,
) -> Result<DataFrame, ReportError> {
    require_columns(
        deployments_df,
        &[key_col, deployments::LONGITUDE, deployments::LATITUDE],
    )?;

    let coords = deployments_df
        .clone()
        .lazy()
        .group_by([col(key_col)])
        .agg([
            col(deployments::LONGITUDE)
                .cast(DataType::Float64)
                .first(),
            col(deployments::LATITUDE).cast(DataType::Float64).first(),
        ]);

    let out = table
        .lazy()
        .join(
            coords,
            [col(key_col)],
            [col(key_col)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;
    Ok(out)
}

/// Per-row lon/lat pairs; rows without coordinates get non-finite values,
/// which every lookup treats as a miss.
fn unit_points(table: &DataFrame) -> Result<Vec<(f64, f64)>, ReportError> {
    let lon = table.column(deployments::LONGITUDE)?.f64()?;
    let lat = table.column(deployments::LATITUDE)?.f64()?;
    Ok((0..table.height())
        .map(|i| {
            (
                lon.get(i).unwrap_or(f64::NAN),
                lat.get(i).unwrap_or(f64::NAN),
            )
        })
        .collect())
}

/// Read a latin-1 encoded CSV into a string-typed frame.
fn read_latin1_csv(path: &Path) -> Result<DataFrame, ReportError> {
    let bytes = std::fs::read(path)?;
    let text: String = bytes.iter().map(|&b| char::from(b)).collect();

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(text.into_bytes()))
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::report;

    fn write_checklist(data_folder: &std::path::Path) {
        std::fs::create_dir_all(data_folder.join("taxonomic")).unwrap();
        let header = [
            checklist::SCIENTIFIC_NAME,
            checklist::THREAT_MADS,
            checklist::ENDEMISM,
            checklist::CITES_APPENDIX,
            checklist::THREAT_STATUS,
        ]
        .join(",");
        std::fs::write(
            data_folder.join(CHECKLIST_CSV),
            format!("{header}\nLeopardus pardalis,VU,No,I,LC\n"),
        )
        .unwrap();
    }

    #[test]
    fn missing_checklist_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = DataFolderEnrichment::open(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            ReportError::MissingAuxiliary(p) if p.ends_with(CHECKLIST_CSV)
        ));
    }

    #[test]
    fn missing_raster_is_fatal_even_with_checklist_present() {
        let dir = tempfile::tempdir().unwrap();
        write_checklist(dir.path());
        std::fs::create_dir_all(dir.path().join("geographic")).unwrap();
        std::fs::write(dir.path().join(ECOSYSTEMS_SHP), b"").unwrap();
        std::fs::write(dir.path().join(FOREST_TIF), b"").unwrap();

        let err = DataFolderEnrichment::open(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            ReportError::MissingAuxiliary(p) if p.ends_with(FOOTPRINT_TIF)
        ));
    }

    #[test]
    fn footprint_buckets_partition_the_index_range() {
        assert_eq!(footprint_category(0.0), Some("Natural"));
        assert_eq!(footprint_category(15.0), Some("Natural"));
        assert_eq!(footprint_category(16.0), Some("Bajo"));
        assert_eq!(footprint_category(40.0), Some("Bajo"));
        assert_eq!(footprint_category(41.0), Some("Medio"));
        assert_eq!(footprint_category(60.0), Some("Medio"));
        assert_eq!(footprint_category(61.0), Some("Alto"));
        assert_eq!(footprint_category(100.0), Some("Alto"));
        assert_eq!(footprint_category(-1.0), None);
        assert_eq!(footprint_category(100.5), None);
        // Fractional values still fall into exactly one bucket.
        assert_eq!(footprint_category(15.5), Some("Bajo"));
    }

    #[test]
    fn no_enrichment_leaves_tables_untouched() {
        let table = df![
            images::TAXON => ["Leopardus pardalis"],
            report::RECORDS => [3i64],
        ]
        .unwrap();
        let out = NoEnrichment.add_checklist_fields(table.clone()).unwrap();
        assert_eq!(out.width(), table.width());
        assert!(out.column(enrichment::CATEGORIA_MADS).is_err());
    }

    #[test]
    fn checklist_join_fills_matches_and_nulls_misses() {
        let table = df![
            images::TAXON => ["Leopardus pardalis", "Crax alector"],
            report::RECORDS => [3i64, 1],
        ]
        .unwrap();
        let checklist_df = df![
            checklist::SCIENTIFIC_NAME => ["Leopardus pardalis"],
            checklist::THREAT_MADS => ["VU"],
            checklist::ENDEMISM => ["No"],
            checklist::CITES_APPENDIX => ["I"],
            checklist::THREAT_STATUS => ["LC"],
        ]
        .unwrap();

        let out = join_checklist(table, &checklist_df).unwrap();
        let taxon = out.column(images::TAXON).unwrap().str().unwrap();
        let mads = out.column(enrichment::CATEGORIA_MADS).unwrap().str().unwrap();
        for i in 0..out.height() {
            match taxon.get(i).unwrap() {
                "Leopardus pardalis" => assert_eq!(mads.get(i), Some("VU")),
                _ => assert_eq!(mads.get(i), None),
            }
        }
        assert!(out.column(enrichment::CITES).is_ok());
    }
}

//! Pipeline driver: bundle loading, season labelling, cleaning, and the
//! five report generators in fixed order. The only module that creates
//! directories; a failure in any step aborts the remaining generators and
//! leaves already-written artifacts in place.

use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::bundle;
use crate::cleaning;
use crate::enrich::{DataFolderEnrichment, Enrich, NoEnrichment};
use crate::error::ReportError;
use crate::reports;
use crate::seasons;

pub struct RunConfig {
    pub bundle_path: PathBuf,
    pub output_path: PathBuf,
    pub seasons: bool,
    pub data_folder: Option<PathBuf>,
}

pub fn run(config: &RunConfig) -> Result<(), ReportError> {
    info!(bundle = %config.bundle_path.display(), "reading bundle");
    let bundle = bundle::read_bundle(&config.bundle_path)?;
    info!(
        deployments = bundle.deployments.height(),
        images = bundle.images.height(),
        "bundle loaded"
    );

    let enricher: Box<dyn Enrich> = match &config.data_folder {
        Some(folder) => Box::new(DataFolderEnrichment::open(folder)?),
        None => {
            info!("no auxiliary data folder given; enrichment columns will be absent");
            Box::new(NoEnrichment)
        }
    };

    let images = if config.seasons {
        seasons::with_season_column(bundle.images)?
    } else {
        bundle.images
    };
    let partitions = seasons::build_partitions(&images, config.seasons)?;

    info!("filtering images");
    let clean = cleaning::clean_images(&images)?;

    fs::create_dir_all(&config.output_path)?;
    let out = config.output_path.as_path();
    let deployments = &bundle.deployments;

    info!("creating general data tables");
    reports::write_general_data(&images, deployments, &partitions, enricher.as_ref(), out)?;

    info!("creating general count tables");
    reports::write_general_count(&clean, deployments, &partitions, enricher.as_ref(), out)?;

    info!("creating detection tables");
    reports::write_detection(&clean, deployments, &partitions, out)?;

    info!("creating detection history tables");
    reports::write_detection_history(&clean, deployments, &partitions, out)?;

    info!("creating Hill number tables");
    reports::write_hill_numbers(&clean, deployments, &partitions, out)?;

    Ok(())
}

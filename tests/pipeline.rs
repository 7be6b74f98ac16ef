use std::fs;
use std::path::Path;

use camtrap_tables::pipeline::{run, RunConfig};
use camtrap_tables::schema::{images, CONSOLIDADO};
use camtrap_tables::{bundle, cleaning, seasons};

fn write_bundle(dir: &Path) {
    fs::write(dir.join("cameras.csv"), "camera_id,make\ncam1,Bushnell\n").unwrap();
    fs::write(dir.join("projects.csv"), "project_id,project_name\np1,Monitoreo\n").unwrap();
    fs::write(
        dir.join("deployments.csv"),
        "deployment_id,placename,longitude,latitude,start_date,end_date\n\
         CT-T1-001,La Selva,-73.5,4.5,2021-03-01,2021-03-10\n\
         CT-T2-002,La Selva,-73.6,4.6,2021-06-01,2021-06-10\n",
    )
    .unwrap();
    // 10 images: 2 domestic, 2 unidentified at genus, 4 detections of one
    // taxon within a single 30-minute window, 2 independent records.
    fs::write(
        dir.join("images.csv"),
        "deployment_id,timestamp,class,genus,species\n\
         CT-T1-001,2021-03-01 08:00:00,Mammalia,Bos,taurus\n\
         CT-T1-001,2021-03-01 08:30:00,Mammalia,Canis,familiaris\n\
         CT-T1-001,2021-03-02 09:00:00,Mammalia,,\n\
         CT-T2-002,2021-06-02 10:00:00,Aves,,\n\
         CT-T1-001,2021-03-03 10:00:00,Mammalia,Leopardus,pardalis\n\
         CT-T1-001,2021-03-03 10:10:00,Mammalia,Leopardus,pardalis\n\
         CT-T1-001,2021-03-03 10:20:00,Mammalia,Leopardus,pardalis\n\
         CT-T1-001,2021-03-03 10:28:00,Mammalia,Leopardus,pardalis\n\
         CT-T2-002,2021-06-05 06:00:00,Aves,Crax,alector\n\
         CT-T2-002,2021-06-07 18:00:00,Mammalia,Dasyprocta,fuliginosa\n",
    )
    .unwrap();
}

const ALL_ARTIFACTS: [&str; 9] = [
    "DatosGenerales.xlsx",
    "ConteoDetalladoEspecie.xlsx",
    "ConteoDetallado.xlsx",
    "HistoriasDeteccion5dias.xlsx",
    "HistoriasDeteccion8dias.xlsx",
    "HistoriasDeteccion10dias.xlsx",
    "NumerosHill.xlsx",
    "NumerosHillAves.xlsx",
    "NumerosHillMammalia.xlsx",
];

#[test]
fn full_run_with_seasons_writes_all_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let bundle_dir = dir.path().join("bundle");
    fs::create_dir(&bundle_dir).unwrap();
    write_bundle(&bundle_dir);
    let out = dir.path().join("reports");

    run(&RunConfig {
        bundle_path: bundle_dir,
        output_path: out.clone(),
        seasons: true,
        data_folder: None,
    })
    .unwrap();

    for artifact in ALL_ARTIFACTS {
        assert!(out.join(artifact).exists(), "missing {artifact}");
    }
}

#[test]
fn run_without_seasons_skips_detection_histories() {
    let dir = tempfile::tempdir().unwrap();
    let bundle_dir = dir.path().join("bundle");
    fs::create_dir(&bundle_dir).unwrap();
    write_bundle(&bundle_dir);
    let out = dir.path().join("reports");

    run(&RunConfig {
        bundle_path: bundle_dir,
        output_path: out.clone(),
        seasons: false,
        data_folder: None,
    })
    .unwrap();

    assert!(out.join("DatosGenerales.xlsx").exists());
    for days in [5, 8, 10] {
        assert!(!out.join(format!("HistoriasDeteccion{days}dias.xlsx")).exists());
    }
}

#[test]
fn cleaning_and_partitioning_match_the_documented_example() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path());

    let bundle = bundle::read_bundle(dir.path()).unwrap();
    let with_seasons = seasons::with_season_column(bundle.images).unwrap();
    let clean = cleaning::clean_images(&with_seasons).unwrap();
    assert_eq!(clean.height(), 3);

    let partitions = seasons::build_partitions(&with_seasons, true).unwrap();
    let labels: Vec<&str> = partitions.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(labels, vec![CONSOLIDADO, "T1", "T2"]);

    let consolidado = partitions[0].subset(&clean).unwrap();
    assert_eq!(consolidado.height(), 3);
    let t1 = partitions[1].subset(&clean).unwrap();
    let t2 = partitions[2].subset(&clean).unwrap();
    assert_eq!(t1.height() + t2.height(), 3);
    assert_eq!(t1.height(), 1);
}

#[test]
fn incomplete_data_folder_aborts_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let bundle_dir = dir.path().join("bundle");
    fs::create_dir(&bundle_dir).unwrap();
    write_bundle(&bundle_dir);
    // Data folder exists but lacks the auxiliary files.
    let data_dir = dir.path().join("data");
    fs::create_dir(&data_dir).unwrap();
    let out = dir.path().join("reports");

    let err = run(&RunConfig {
        bundle_path: bundle_dir,
        output_path: out.clone(),
        seasons: false,
        data_folder: Some(data_dir),
    })
    .unwrap_err();

    assert!(matches!(
        err,
        camtrap_tables::ReportError::MissingAuxiliary(_)
    ));
    assert!(!out.exists(), "no artifact may be written on a bad data folder");
}

#[test]
fn missing_required_column_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path());
    // Drop the genus column from the images table.
    fs::write(
        dir.path().join("images.csv"),
        "deployment_id,timestamp,class,species\n\
         CT-T1-001,2021-03-01 08:00:00,Mammalia,taurus\n",
    )
    .unwrap();

    let err = bundle::read_bundle(dir.path()).unwrap_err();
    assert!(matches!(
        err,
        camtrap_tables::ReportError::MissingColumn(c) if c == images::GENUS
    ));
}

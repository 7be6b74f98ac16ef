/// Column-name constants for camtrap-tables.
/// Single source of truth for every frame the pipeline touches.

// ── Image columns ───────────────────────────────────────────────────────────
pub mod images {
    pub const DEPLOYMENT_ID: &str = "deployment_id";
    pub const TIMESTAMP: &str = "timestamp";
    pub const CLASS: &str = "class";
    pub const GENUS: &str = "genus";
    pub const SPECIES: &str = "species";

    /// Scientific name derived from genus + species epithet.
    pub const TAXON: &str = "taxon";
    /// Survey season extracted from the deployment identifier.
    pub const SEASON: &str = "season";

    pub const REQUIRED: [&str; 5] = [DEPLOYMENT_ID, TIMESTAMP, CLASS, GENUS, SPECIES];
}

// ── Deployment columns ──────────────────────────────────────────────────────
pub mod deployments {
    pub const DEPLOYMENT_ID: &str = "deployment_id";
    pub const PLACENAME: &str = "placename";
    pub const LONGITUDE: &str = "longitude";
    pub const LATITUDE: &str = "latitude";
    pub const START_DATE: &str = "start_date";
    pub const END_DATE: &str = "end_date";

    pub const REQUIRED: [&str; 6] = [
        DEPLOYMENT_ID,
        PLACENAME,
        LONGITUDE,
        LATITUDE,
        START_DATE,
        END_DATE,
    ];
}

// ── Report columns ──────────────────────────────────────────────────────────
pub mod report {
    pub const RECORDS: &str = "records";
    pub const UNITS: &str = "sites";
    pub const TOTAL_RECORDS: &str = "total_records";
    pub const IDENTIFIED_RECORDS: &str = "identified_records";
    pub const TAXA: &str = "taxa";
}

// ── Enrichment columns ──────────────────────────────────────────────────────
pub mod enrichment {
    pub const CATEGORIA_MADS: &str = "categoria_mads";
    pub const ENDEMISMO: &str = "endemismo";
    pub const CITES: &str = "cites";
    pub const CATEGORIA_IUCN: &str = "categoria_iucn";

    pub const BIOMA: &str = "bioma";
    pub const ECOSISTEMA: &str = "ecosistema";
    pub const PORCENTAJE_BOSQUE: &str = "porcentaje_bosque";
    pub const IHEH: &str = "IHEH";
    pub const IHEH_CAT: &str = "IHEH_cat";
}

// ── Checklist source columns ────────────────────────────────────────────────
pub mod checklist {
    pub const SCIENTIFIC_NAME: &str = "scientificName";
    pub const THREAT_MADS: &str = "measurementValue (Categoria de amenaza MADS)";
    pub const ENDEMISM: &str = "measurementValue (ENDEMISMO)";
    pub const CITES_APPENDIX: &str = "appendixCITES";
    pub const THREAT_STATUS: &str = "threatStatus";
}

// ── Shapefile attribute fields ──────────────────────────────────────────────
pub mod ecosystems {
    pub const BIOME_FIELD: &str = "BIOMA_IAvH";
    pub const ECOSYSTEM_FIELD: &str = "ECOS_SINTE";
}

/// The synthetic whole-survey partition label.
pub const CONSOLIDADO: &str = "Consolidado";

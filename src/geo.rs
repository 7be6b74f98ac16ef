//! Geospatial lookups for the enrichment adapter: polygon attribute
//! matching from a shapefile layer and nearest-pixel sampling of
//! single-band GeoTIFF rasters. Query points are EPSG:4326 lon/lat.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use geo::{BoundingRect, Contains, MultiPolygon, Point, Rect};
use shapefile::dbase::FieldValue;
use shapefile::Shape;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use crate::error::ReportError;

/// Look up a named attribute of the polygon containing each point.
///
/// Polygons are pre-filtered to the bounding box of the query points before
/// containment tests. Points outside every polygon yield `None`.
pub fn read_layer_field(
    shp_path: &Path,
    points: &[(f64, f64)],
    field: &str,
) -> Result<Vec<Option<String>>, ReportError> {
    let Some(mask) = points_bbox(points) else {
        return Ok(vec![]);
    };

    let mut reader = shapefile::Reader::from_path(shp_path)?;
    let mut polygons: Vec<(MultiPolygon<f64>, Option<String>)> = Vec::new();
    for entry in reader.iter_shapes_and_records() {
        let (shape, record) = entry?;
        let Shape::Polygon(polygon) = shape else {
            continue;
        };
        let multi: MultiPolygon<f64> = polygon.into();
        let intersects = multi
            .bounding_rect()
            .is_some_and(|rect| rects_intersect(&rect, &mask));
        if !intersects {
            continue;
        }
        let value = match record.get(field) {
            Some(FieldValue::Character(value)) => value.clone(),
            Some(FieldValue::Numeric(value)) => value.map(|v| v.to_string()),
            Some(FieldValue::Float(value)) => value.map(|v| v.to_string()),
            Some(FieldValue::Integer(value)) => Some(value.to_string()),
            Some(FieldValue::Memo(value)) => Some(value.clone()),
            Some(_) | None => None,
        };
        polygons.push((multi, value));
    }

    Ok(points
        .iter()
        .map(|&(x, y)| containing_value(&polygons, x, y))
        .collect())
}

fn containing_value(
    polygons: &[(MultiPolygon<f64>, Option<String>)],
    x: f64,
    y: f64,
) -> Option<String> {
    let point = Point::new(x, y);
    polygons
        .iter()
        .find(|(polygon, _)| polygon.contains(&point))
        .and_then(|(_, value)| value.clone())
}

fn points_bbox(points: &[(f64, f64)]) -> Option<Rect<f64>> {
    let mut iter = points.iter();
    let &(x0, y0) = iter.next()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (x0, y0, x0, y0);
    for &(x, y) in iter {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    // Small margin so boundary points keep their candidate polygons.
    let margin = 0.01;
    Some(Rect::new(
        (min_x - margin, min_y - margin),
        (max_x + margin, max_y + margin),
    ))
}

fn rects_intersect(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x && a.max().x >= b.min().x && a.min().y <= b.max().y && a.max().y >= b.min().y
}

/// Georeference of a north-up raster, from the GeoTIFF pixel-scale and
/// tiepoint tags.
struct RasterGrid {
    width: u32,
    height: u32,
    origin_x: f64,
    origin_y: f64,
    scale_x: f64,
    scale_y: f64,
}

impl RasterGrid {
    /// Index of the pixel containing the point, row-major.
    fn pixel_index(&self, x: f64, y: f64) -> Option<usize> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let col = ((x - self.origin_x) / self.scale_x).floor();
        let row = ((self.origin_y - y) / self.scale_y).floor();
        if col < 0.0 || row < 0.0 || col >= self.width as f64 || row >= self.height as f64 {
            return None;
        }
        Some(row as usize * self.width as usize + col as usize)
    }
}

/// Sample a single-band raster at each point, nearest-neighbor.
///
/// Points outside the raster extent and nodata pixels yield `None`.
pub fn sample_raster(
    tif_path: &Path,
    points: &[(f64, f64)],
) -> Result<Vec<Option<f64>>, ReportError> {
    let file = File::open(tif_path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;

    let (width, height) = decoder.dimensions()?;
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag)?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag)?;
    if scale.len() < 2 || tiepoint.len() < 5 {
        return Err(ReportError::InvalidData(format!(
            "raster {} lacks a usable georeference",
            tif_path.display()
        )));
    }
    let nodata: Option<f64> = decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim().parse().ok());

    // Tiepoint maps raster (i, j) to model (x, y).
    let grid = RasterGrid {
        width,
        height,
        origin_x: tiepoint[3] - tiepoint[0] * scale[0],
        origin_y: tiepoint[4] + tiepoint[1] * scale[1],
        scale_x: scale[0],
        scale_y: scale[1],
    };

    let band = decoder.read_image()?;
    Ok(points
        .iter()
        .map(|&(x, y)| {
            grid.pixel_index(x, y)
                .and_then(|idx| band_value(&band, idx))
                .filter(|v| Some(*v) != nodata)
        })
        .collect())
}

fn band_value(band: &DecodingResult, idx: usize) -> Option<f64> {
    match band {
        DecodingResult::U8(buf) => buf.get(idx).map(|&v| v as f64),
        DecodingResult::U16(buf) => buf.get(idx).map(|&v| v as f64),
        DecodingResult::U32(buf) => buf.get(idx).map(|&v| v as f64),
        DecodingResult::U64(buf) => buf.get(idx).map(|&v| v as f64),
        DecodingResult::I8(buf) => buf.get(idx).map(|&v| v as f64),
        DecodingResult::I16(buf) => buf.get(idx).map(|&v| v as f64),
        DecodingResult::I32(buf) => buf.get(idx).map(|&v| v as f64),
        DecodingResult::I64(buf) => buf.get(idx).map(|&v| v as f64),
        DecodingResult::F32(buf) => buf.get(idx).map(|&v| v as f64),
        DecodingResult::F64(buf) => buf.get(idx).copied(),
    }
}

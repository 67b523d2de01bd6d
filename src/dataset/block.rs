use std::collections::BTreeMap;

use geo::{Area, Centroid, MultiPolygon, Point};

/// Stable key for a block within one dataset.
pub type BlockId = i64;

/// A single urban block with its observed (or missing) structural attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub centroid: Point<f64>,           // Planar projection (e.g. local UTM)
    pub site_area: f64,                 // Area of the block itself
    pub footprint_area: Option<f64>,    // Ground-covered area, None if unobserved
    pub build_floor_area: Option<f64>,  // Floor area summed over stories, None if unobserved
    pub attributes: BTreeMap<String, f64>,
}

impl Block {
    pub fn new(id: BlockId, x: f64, y: f64, site_area: f64) -> Self {
        Self {
            id,
            centroid: Point::new(x, y),
            site_area,
            footprint_area: None,
            build_floor_area: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Build a block from its planar geometry.
    /// The centroid is the polygon centroid and the site area is its unsigned area.
    pub fn from_polygon(id: BlockId, geometry: &MultiPolygon<f64>) -> Self {
        let centroid = geometry.centroid().unwrap_or(Point::new(f64::NAN, f64::NAN));
        Self::new(id, centroid.x(), centroid.y(), geometry.unsigned_area())
    }

    pub fn with_footprint_area(mut self, value: f64) -> Self {
        self.footprint_area = Some(value);
        self
    }

    pub fn with_build_floor_area(mut self, value: f64) -> Self {
        self.build_floor_area = Some(value);
        self
    }

    /// Attach an auxiliary numeric attribute (land-use share, counts, ...).
    pub fn with_attribute(mut self, name: impl Into<String>, value: f64) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Floor-space index, `build_floor_area / site_area`.
    pub fn fsi(&self) -> Option<f64> {
        self.build_floor_area
            .filter(|_| self.site_area > 0.0)
            .map(|bfa| bfa / self.site_area)
    }

    /// Ground-space index, `footprint_area / site_area`.
    pub fn gsi(&self) -> Option<f64> {
        self.footprint_area
            .filter(|_| self.site_area > 0.0)
            .map(|fa| fa / self.site_area)
    }
}

use serde::{Deserialize, Serialize};
use serde_json::from_slice;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use geojson::GeoJson;
use tracing::{info, warn};

use crate::{boundary::BoundarySet, error::Result};

/// Name of the shape holding every region at once.
pub const BASE_MAP: &str = "HK";

/// Resolution of the boundary geometry used for the base map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryDetail {
    Simple,
    #[default]
    Detailed,
}

impl BoundaryDetail {
    pub fn file_name(self) -> &'static str {
        match self {
            BoundaryDetail::Simple   => "geo_hk_simple.json",
            BoundaryDetail::Detailed => "geo_hk.json",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BoundaryDetail::Simple   => "Simple",
            BoundaryDetail::Detailed => "Detailed",
        }
    }
}

/// One administrative area and its metric value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub value: f64,
}

impl Region {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self { name: name.into(), value }
    }
}

/// The metric table, sorted ascending by value once at construction.
#[derive(Clone, Debug, Default)]
pub struct RegionTable {
    regions: Vec<Region>,
}

impl RegionTable {
    pub fn new(mut regions: Vec<Region>) -> Self {
        regions.sort_by(|a, b| a.value.total_cmp(&b.value));
        Self { regions }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn get(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Smallest and largest metric over all regions.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        Some((self.regions.first()?.value, self.regions.last()?.value))
    }
}

/// Ordered mapping from a group label to the region names it covers.
#[derive(Clone, Debug, Default)]
pub struct RegionGroups {
    groups: Vec<(String, Vec<String>)>,
}

impl RegionGroups {
    pub fn new(groups: Vec<(String, Vec<String>)>) -> Self {
        Self { groups }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(label, _)| label.as_str())
    }

    pub fn members(&self, label: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, names)| names.as_slice())
    }

    pub fn hong_kong() -> Self {
        let group = |label: &str, names: &[&str]| {
            (label.to_string(), names.iter().map(|n| n.to_string()).collect())
        };
        Self::new(vec![
            group("HK Island", &["Central and Western", "Eastern", "Southern", "Wan Chai"]),
            group("Kowloon", &["Kowloon City", "Kwun Tong", "Sham Shui Po", "Wong Tai Sin", "Yau Tsim Mong"]),
            group("New Territories", &[
                "Islands", "Kwai Tsing", "North", "Sai Kung", "Sha Tin",
                "Tai Po", "Tsuen Wan", "Tuen Mun", "Yuen Long",
            ]),
        ])
    }
}

/// Population of the 18 Hong Kong districts.
pub fn hong_kong_districts() -> Vec<Region> {
    [
        ("Central and Western", 244_600.0),
        ("Eastern", 555_200.0),
        ("Islands", 185_300.0),
        ("Kowloon City", 418_700.0),
        ("Kwai Tsing", 524_800.0),
        ("Kwun Tong", 648_500.0),
        ("North", 315_700.0),
        ("Sai Kung", 489_200.0),
        ("Sha Tin", 659_800.0),
        ("Sham Shui Po", 405_900.0),
        ("Southern", 274_900.0),
        ("Tai Po", 303_600.0),
        ("Tsuen Wan", 304_600.0),
        ("Tuen Mun", 504_300.0),
        ("Wan Chai", 152_600.0),
        ("Wong Tai Sin", 420_800.0),
        ("Yau Tsim Mong", 318_100.0),
        ("Yuen Long", 607_200.0),
    ]
    .into_iter()
    .map(|(name, value)| Region::new(name, value))
    .collect()
}

/// Loads boundary files and metric tables, keeping each parsed boundary set.
pub struct DataCache {
    base: PathBuf,
    boundaries: BTreeMap<BoundaryDetail, BoundarySet>,
}

impl DataCache {
    pub fn new<P: AsRef<Path>>(base: P) -> Self {
        Self { base: base.as_ref().to_path_buf(), boundaries: BTreeMap::new() }
    }

    pub fn load_geojson(&self, detail: BoundaryDetail) -> Result<GeoJson> {
        let txt = fs::read_to_string(self.base.join(detail.file_name()))?;
        Ok(GeoJson::from_str(&txt)?)
    }

    /// Parses the boundary file for `detail` on first use.
    pub fn boundaries(&mut self, detail: BoundaryDetail) -> Result<&BoundarySet> {
        if !self.boundaries.contains_key(&detail) {
            let raw = self.load_geojson(detail)?;
            let set = BoundarySet::from_geojson(raw, detail)?;
            info!(detail = detail.label(), regions = set.len(), "loaded boundaries");
            if set.is_empty() {
                warn!(detail = detail.label(), "boundary file has no usable regions");
            }
            self.boundaries.insert(detail, set);
        }
        self.boundaries
            .get(&detail)
            .ok_or_else(|| crate::error::AtlasError::InvalidBoundary(detail.label().to_string()))
    }

    /// Seeds the cache with an already parsed set.
    #[cfg(test)]
    pub fn insert(&mut self, set: BoundarySet) {
        self.boundaries.insert(set.detail(), set);
    }
}

/// Reads a metric table, falling back to the built-in districts.
pub fn load_metrics(path: Option<&Path>) -> Result<RegionTable> {
    let rows = match path {
        Some(path) => {
            let data = fs::read(path)?;
            let rows: Vec<Region> = from_slice(&data)?;
            info!(path = %path.display(), rows = rows.len(), "loaded metric table");
            rows
        }
        None => hong_kong_districts(),
    };
    Ok(RegionTable::new(rows))
}

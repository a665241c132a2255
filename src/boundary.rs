use geo::{BoundingRect, Contains, Geometry, MultiPolygon, Point, Rect};
use geojson::GeoJson;
use tracing::warn;

use crate::{
    data::{BoundaryDetail, RegionTable, BASE_MAP},
    error::{AtlasError, Result},
};

/// Region geometries of one boundary file, keyed by the feature's `name`.
#[derive(Clone, Debug)]
pub struct BoundarySet {
    detail: BoundaryDetail,
    items: Vec<(String, MultiPolygon<f64>)>,
}

impl BoundarySet {
    #[cfg(test)]
    pub fn new(detail: BoundaryDetail, items: Vec<(String, MultiPolygon<f64>)>) -> Self {
        Self { detail, items }
    }

    pub fn from_geojson(raw: GeoJson, detail: BoundaryDetail) -> Result<Self> {
        let GeoJson::FeatureCollection(fc) = raw else {
            return Err(AtlasError::InvalidBoundary(format!(
                "{} is not a FeatureCollection",
                detail.file_name()
            )));
        };

        let mut items: Vec<(String, MultiPolygon<f64>)> = Vec::new();
        for feature in fc.features {
            let Some(name) = feature
                .properties
                .as_ref()
                .and_then(|p| p.get("name").and_then(|v| v.as_str()))
                .map(str::to_string)
            else {
                warn!(detail = detail.label(), "skipping feature without a name");
                continue;
            };

            let Some(gj) = feature.geometry else {
                warn!(region = %name, "skipping feature without geometry");
                continue;
            };
            let geom: Geometry<f64> = gj.value.try_into()?;
            let mp = match geom {
                Geometry::Polygon(p) => p.into(),
                Geometry::MultiPolygon(m) => m,
                _ => {
                    warn!(region = %name, "skipping non-areal geometry");
                    continue;
                }
            };

            if items.iter().any(|(n, _)| *n == name) {
                warn!(region = %name, "duplicate region name, keeping the first geometry");
                continue;
            }
            items.push((name, mp));
        }

        Ok(Self { detail, items })
    }

    pub fn detail(&self) -> BoundaryDetail {
        self.detail
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|(n, _)| n == name)
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&MultiPolygon<f64>> {
        self.items.iter().find(|(n, _)| n == name).map(|(_, mp)| mp)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(n, _)| n.as_str())
    }

    /// The base map plus one single-region shape per region.
    pub fn shapes(&self) -> Vec<Shape> {
        let mut shapes = Vec::with_capacity(self.items.len() + 1);
        if let Some(base) = Shape::new(BASE_MAP, self.items.clone()) {
            shapes.push(base);
        }
        for (name, mp) in &self.items {
            if let Some(shape) = Shape::new(name, vec![(name.clone(), mp.clone())]) {
                shapes.push(shape);
            }
        }
        shapes
    }
}

/// A named map the render engine can draw, made of one or more regions.
#[derive(Clone, Debug)]
pub struct Shape {
    pub name: String,
    pub regions: Vec<(String, MultiPolygon<f64>)>,
    pub bounds: Rect<f64>,
}

impl Shape {
    /// `None` when the regions carry no coordinates at all.
    pub fn new(name: &str, regions: Vec<(String, MultiPolygon<f64>)>) -> Option<Self> {
        let bounds = regions
            .iter()
            .filter_map(|(_, mp)| mp.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                    (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
                )
            })?;
        Some(Self { name: name.to_string(), regions, bounds })
    }

    /// Name of the region covering the point, if any.
    pub fn region_at(&self, x: f64, y: f64) -> Option<&str> {
        let p = Point::new(x, y);
        self.regions
            .iter()
            .find(|(_, mp)| mp.contains(&p))
            .map(|(name, _)| name.as_str())
    }
}

/// Names present on only one side of the metric/boundary join.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JoinReport {
    pub missing_geometry: Vec<String>,
    pub missing_metric: Vec<String>,
}

impl JoinReport {
    pub fn is_clean(&self) -> bool {
        self.missing_geometry.is_empty() && self.missing_metric.is_empty()
    }
}

/// Checks that every metric row has a geometry and vice versa.
pub fn check_join(table: &RegionTable, set: &BoundarySet) -> JoinReport {
    let report = JoinReport {
        missing_geometry: table
            .regions()
            .iter()
            .filter(|r| !set.contains(&r.name))
            .map(|r| r.name.clone())
            .collect(),
        missing_metric: set
            .names()
            .filter(|n| table.get(n).is_none())
            .map(str::to_string)
            .collect(),
    };
    if !report.is_clean() {
        warn!(
            detail = set.detail().label(),
            missing_geometry = ?report.missing_geometry,
            missing_metric = ?report.missing_metric,
            "metric table and boundaries disagree"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Region;
    use crate::test_support::{sample_geojson, sample_set};

    #[test]
    fn parses_named_features() {
        let set = sample_set(BoundaryDetail::Detailed);
        assert_eq!(set.len(), 3);
        assert!(set.contains("B"));
        assert_eq!(set.names().collect::<Vec<_>>(), ["A", "B", "C"]);
    }

    #[test]
    fn rejects_bare_geometry() {
        let raw: GeoJson = r#"{"type":"Point","coordinates":[0.0,0.0]}"#.parse().unwrap();
        let err = BoundarySet::from_geojson(raw, BoundaryDetail::Simple).unwrap_err();
        assert!(matches!(err, AtlasError::InvalidBoundary(_)));
    }

    #[test]
    fn unnamed_and_point_features_are_skipped() {
        let raw: GeoJson = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}},
            {"type":"Feature","properties":{"name":"P"},"geometry":{"type":"Point","coordinates":[0,0]}},
            {"type":"Feature","properties":{"name":"Q"},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}}
        ]}"#
        .parse()
        .unwrap();
        let set = BoundarySet::from_geojson(raw, BoundaryDetail::Simple).unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), ["Q"]);
    }

    #[test]
    fn shapes_register_base_and_each_region() {
        let set = sample_set(BoundaryDetail::Detailed);
        let shapes = set.shapes();
        let names: Vec<&str> = shapes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, [BASE_MAP, "A", "B", "C"]);
        assert_eq!(shapes[0].regions.len(), 3);
        assert_eq!(shapes[2].regions.len(), 1);
        assert_eq!(shapes[2].regions[0].0, "B");
        assert_eq!(shapes[0].bounds.min().x, 0.0);
        assert_eq!(shapes[0].bounds.max().x, 3.0);
    }

    #[test]
    fn region_hit_testing() {
        let set = sample_set(BoundaryDetail::Detailed);
        let base = &set.shapes()[0];
        assert_eq!(base.region_at(0.5, 0.5), Some("A"));
        assert_eq!(base.region_at(2.5, 0.5), Some("C"));
        assert_eq!(base.region_at(5.0, 5.0), None);
    }

    #[test]
    fn join_report_lists_both_sides() {
        let set = BoundarySet::from_geojson(sample_geojson(), BoundaryDetail::Simple).unwrap();
        let table = RegionTable::new(vec![
            Region::new("A", 1.0),
            Region::new("B", 2.0),
            Region::new("Z", 3.0),
        ]);
        let report = check_join(&table, &set);
        assert_eq!(report.missing_geometry, ["Z"]);
        assert_eq!(report.missing_metric, ["C"]);
        assert!(!report.is_clean());
    }
}

//! Fixtures shared by the unit tests.

use std::{cell::RefCell, rc::Rc};

use geojson::GeoJson;

use crate::{
    boundary::{BoundarySet, Shape},
    chart::{build_map_spec, ChartSpec, ChartText},
    config::ExplorerConfig,
    data::{BoundaryDetail, DataCache, Region, RegionGroups, RegionTable},
    display::DisplayState,
    engine::RenderEngine,
    error::{AtlasError, Result},
    explorer::{RegionData, RegionExplorer},
};

/// Three unit squares side by side: A at x 0..1, B at 1..2, C at 2..3.
pub fn sample_geojson() -> GeoJson {
    let square = |name: &str, x: u32| {
        format!(
            r#"{{"type":"Feature","properties":{{"name":"{name}"}},"geometry":{{"type":"Polygon","coordinates":[[[{x},0],[{x1},0],[{x1},1],[{x},1],[{x},0]]]}}}}"#,
            x1 = x + 1
        )
    };
    format!(
        r#"{{"type":"FeatureCollection","features":[{},{},{}]}}"#,
        square("A", 0),
        square("B", 1),
        square("C", 2)
    )
    .parse()
    .unwrap()
}

pub fn sample_set(detail: BoundaryDetail) -> BoundarySet {
    BoundarySet::from_geojson(sample_geojson(), detail).unwrap()
}

pub fn sample_table() -> RegionTable {
    RegionTable::new(vec![
        Region::new("A", 100.0),
        Region::new("B", 500.0),
        Region::new("C", 300.0),
    ])
}

pub fn sample_groups() -> RegionGroups {
    RegionGroups::new(vec![("G1".to_string(), vec!["A".to_string(), "B".to_string()])])
}

/// Map spec pointing at `map`, built over the sample table.
pub fn map_spec(map: &str) -> ChartSpec {
    let text = ChartText { title: "Population".into(), metric_label: "Population".into() };
    let state = DisplayState::new(1024, 768, std::time::Duration::from_millis(1000));
    let mut spec = build_map_spec(&sample_table(), &state, &text);
    spec.series.map = map.to_string();
    ChartSpec::Map(spec)
}

#[derive(Debug, Default)]
pub struct EngineLog {
    pub shapes: Vec<String>,
    pub applied: Vec<ChartSpec>,
    pub resized: Vec<u32>,
    pub disposed: usize,
}

/// Engine that records every call and rejects maps it has not seen registered.
#[derive(Default)]
pub struct RecordingEngine {
    log: Rc<RefCell<EngineLog>>,
}

impl RecordingEngine {
    pub fn log(&self) -> Rc<RefCell<EngineLog>> {
        Rc::clone(&self.log)
    }
}

impl RenderEngine for RecordingEngine {
    fn register_shape(&mut self, shape: Shape) {
        self.log.borrow_mut().shapes.push(shape.name);
    }

    fn apply(&mut self, spec: &ChartSpec) -> Result<()> {
        let mut log = self.log.borrow_mut();
        if let ChartSpec::Map(map) = spec {
            if !log.shapes.contains(&map.series.map) {
                return Err(AtlasError::UnknownShape(map.series.map.clone()));
            }
        }
        log.applied.push(spec.clone());
        Ok(())
    }

    fn resize(&mut self, width_px: u32) {
        self.log.borrow_mut().resized.push(width_px);
    }

    fn dispose(&mut self) {
        self.log.borrow_mut().disposed += 1;
    }
}

pub fn explorer_with_log(viewport_px: u32) -> (RegionExplorer<RecordingEngine>, Rc<RefCell<EngineLog>>) {
    let mut cache = DataCache::new("/nonexistent/region-atlas");
    cache.insert(sample_set(BoundaryDetail::Detailed));
    cache.insert(sample_set(BoundaryDetail::Simple));
    let data = RegionData { cache, table: sample_table(), groups: sample_groups() };
    let engine = RecordingEngine::default();
    let log = engine.log();
    let ex = RegionExplorer::mount(engine, data, &ExplorerConfig::default(), viewport_px, BoundaryDetail::Detailed)
        .unwrap();
    (ex, log)
}

pub fn explorer(viewport_px: u32) -> RegionExplorer<RecordingEngine> {
    explorer_with_log(viewport_px).0
}

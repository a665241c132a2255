//! The region explorer: owns the display state and the mounted render engine,
//! and re-applies a fresh chart spec after every state change.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::{
    boundary::{check_join, BoundarySet},
    chart::{build_spec, ChartSpec, ChartText},
    config::ExplorerConfig,
    data::{BoundaryDetail, DataCache, Region, RegionGroups, RegionTable},
    display::{filter_regions, DisplayState, ViewMode, ZoomChange},
    engine::{ChartClick, EngineBinding, RenderEngine, SeriesKind},
    error::Result,
};

/// Static inputs of the explorer.
pub struct RegionData {
    pub cache: DataCache,
    pub table: RegionTable,
    pub groups: RegionGroups,
}

pub struct RegionExplorer<E: RenderEngine> {
    cache: DataCache,
    table: RegionTable,
    groups: RegionGroups,
    boundaries: BoundarySet,
    text: ChartText,
    breakpoint_px: u32,
    state: DisplayState,
    binding: EngineBinding<E>,
}

impl<E: RenderEngine> RegionExplorer<E> {
    pub fn mount(
        engine: E,
        data: RegionData,
        config: &ExplorerConfig,
        viewport_px: u32,
        detail: BoundaryDetail,
    ) -> Result<Self> {
        let RegionData { mut cache, table, groups } = data;
        let boundaries = cache.boundaries(detail)?.clone();
        check_join(&table, &boundaries);
        if table.is_empty() {
            warn!("metric table is empty, every region is drawn without data");
        }

        let breakpoint_px = config.layout.compact_breakpoint_px;
        let mut state = DisplayState::new(viewport_px, breakpoint_px, config.reveal_delay());
        state.boundary_detail = detail;

        let mut binding = EngineBinding::mount(engine);
        binding.resize(viewport_px);
        binding.register_shapes(boundaries.shapes());

        let mut explorer = Self {
            cache,
            table,
            groups,
            boundaries,
            text: ChartText { title: config.title.clone(), metric_label: config.metric_label.clone() },
            breakpoint_px,
            state,
            binding,
        };
        explorer.refresh();
        info!(regions = explorer.table.len(), detail = detail.label(), "region explorer mounted");
        Ok(explorer)
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    pub fn table(&self) -> &RegionTable {
        &self.table
    }

    pub fn groups(&self) -> &RegionGroups {
        &self.groups
    }

    #[cfg(test)]
    pub fn boundaries(&self) -> &BoundarySet {
        &self.boundaries
    }

    pub fn engine(&self) -> Option<&E> {
        self.binding.engine()
    }

    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.binding.engine_mut()
    }

    /// Regions the active view lists: the filtered set in bar view, all of them on the map.
    pub fn visible_regions(&self) -> Vec<&Region> {
        match self.state.view_mode {
            ViewMode::Map => self.table.regions().iter().collect(),
            ViewMode::Bar => filter_regions(self.table.regions(), &self.groups, self.state.group_filter()),
        }
    }

    pub fn spec(&self) -> ChartSpec {
        build_spec(&self.table, &self.groups, &self.state, &self.text)
    }

    /// Rebuilds the spec for the current state and hands it to the engine.
    pub fn refresh(&mut self) -> bool {
        let spec = self.spec();
        self.binding.apply(&spec)
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.state.view_mode = mode;
        debug!(mode = mode.label(), "view mode");
        self.refresh();
    }

    /// Switches geometry resolution and re-registers every shape. On a load
    /// failure the current detail stays active.
    pub fn set_boundary_detail(&mut self, detail: BoundaryDetail) -> Result<()> {
        if detail == self.boundaries.detail() {
            self.state.boundary_detail = detail;
            return Ok(());
        }
        let boundaries = self.cache.boundaries(detail)?.clone();
        check_join(&self.table, &boundaries);
        self.binding.register_shapes(boundaries.shapes());
        self.state.retain_zoom_in(&boundaries);
        self.state.boundary_detail = detail;
        self.boundaries = boundaries;
        debug!(detail = detail.label(), "boundary detail");
        self.refresh();
        Ok(())
    }

    pub fn toggle_region_zoom(&mut self, name: &str) -> ZoomChange {
        self.toggle_region_zoom_at(name, Instant::now())
    }

    pub fn toggle_region_zoom_at(&mut self, name: &str, now: Instant) -> ZoomChange {
        let change = self.state.toggle_region_zoom(name, &self.boundaries, now);
        if change != ZoomChange::Ignored {
            self.refresh();
        }
        change
    }

    pub fn reset_zoom(&mut self) {
        if self.state.clear_zoom() {
            self.refresh();
        }
    }

    pub fn toggle_group_filter(&mut self, group: &str) {
        self.state.toggle_group_filter(group);
        debug!(filter = ?self.state.group_filter(), "group filter");
        self.refresh();
    }

    pub fn on_viewport_resize(&mut self, viewport_px: u32) {
        self.binding.resize(viewport_px);
        if self.state.on_viewport_resize(viewport_px, self.breakpoint_px) {
            debug!(viewport_px, compact = self.state.is_compact_layout, "layout changed");
            self.refresh();
        }
    }

    /// Map clicks toggle zoom; every other click is ignored.
    pub fn on_chart_click(&mut self, click: &ChartClick) -> ZoomChange {
        if click.series != SeriesKind::Map || self.state.view_mode != ViewMode::Map {
            return ZoomChange::Ignored;
        }
        self.toggle_region_zoom(&click.name)
    }

    /// Fires due timers. Returns true when the chart was re-applied.
    pub fn poll_timers(&mut self, now: Instant) -> bool {
        self.state.poll_reveal(now) && self.refresh()
    }

    /// Cancels pending timers and disposes the engine.
    pub fn unmount(&mut self) {
        self.state.clear_zoom();
        self.binding.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartSpec;
    use crate::display::LabelReveal;
    use crate::test_support::{explorer, explorer_with_log, sample_set};
    use std::time::Duration;

    const DELAY: Duration = Duration::from_millis(1000);

    #[test]
    fn mount_registers_shapes_and_applies_map() {
        let (ex, log) = explorer_with_log(1024);
        let log = log.borrow();
        assert_eq!(log.shapes, ["HK", "A", "B", "C"]);
        assert_eq!(log.applied.len(), 1);
        assert!(matches!(&log.applied[0], ChartSpec::Map(m) if m.series.map == "HK"));
        assert!(!ex.state().is_compact_layout);
    }

    #[test]
    fn view_switch_reapplies_bar_spec() {
        let (mut ex, log) = explorer_with_log(1024);
        ex.set_view_mode(ViewMode::Bar);
        let log = log.borrow();
        let ChartSpec::Bar(bar) = log.applied.last().unwrap() else {
            panic!("expected bar spec");
        };
        assert_eq!(bar.category_axis.data, ["A", "C", "B"]);
        assert_eq!(bar.values, [100.0, 300.0, 500.0]);
    }

    #[test]
    fn zoom_flow_reveals_label_after_delay() {
        let (mut ex, log) = explorer_with_log(1024);
        let t0 = Instant::now();
        assert_eq!(ex.toggle_region_zoom_at("B", t0), ZoomChange::ZoomedIn);
        assert!(!ex.poll_timers(t0 + Duration::from_millis(500)));
        assert!(ex.poll_timers(t0 + DELAY));
        assert_eq!(ex.state().label_reveal(), LabelReveal::Revealed);

        let log = log.borrow();
        let ChartSpec::Map(last) = log.applied.last().unwrap() else {
            panic!("expected map spec");
        };
        assert_eq!(last.series.map, "B");
        assert!(last.series.label.show);
    }

    #[test]
    fn superseded_zoom_never_flashes_old_label() {
        let (mut ex, log) = explorer_with_log(1024);
        let t0 = Instant::now();
        ex.toggle_region_zoom_at("A", t0);
        ex.toggle_region_zoom_at("A", t0 + Duration::from_millis(300));
        let applied_before = log.borrow().applied.len();
        assert!(!ex.poll_timers(t0 + DELAY * 3));
        assert_eq!(log.borrow().applied.len(), applied_before);
        assert_eq!(ex.state().label_reveal(), LabelReveal::Hidden);
    }

    #[test]
    fn unknown_zoom_target_changes_nothing() {
        let (mut ex, log) = explorer_with_log(1024);
        let before = log.borrow().applied.len();
        assert_eq!(ex.toggle_region_zoom("Nowhere"), ZoomChange::Ignored);
        assert_eq!(ex.state().zoomed_region(), None);
        assert_eq!(log.borrow().applied.len(), before);
    }

    #[test]
    fn clicks_only_drive_zoom_on_the_map() {
        let mut ex = explorer(1024);
        let click = ChartClick { series: SeriesKind::Map, name: "C".into() };
        assert_eq!(ex.on_chart_click(&click), ZoomChange::ZoomedIn);
        assert_eq!(ex.on_chart_click(&click), ZoomChange::ZoomedOut);

        let bar_click = ChartClick { series: SeriesKind::Bar, name: "C".into() };
        assert_eq!(ex.on_chart_click(&bar_click), ZoomChange::Ignored);
        ex.set_view_mode(ViewMode::Bar);
        assert_eq!(ex.on_chart_click(&click), ZoomChange::Ignored);
    }

    #[test]
    fn resize_across_breakpoint_rebuilds_once() {
        let (mut ex, log) = explorer_with_log(1024);
        let before = log.borrow().applied.len();
        ex.on_viewport_resize(900);
        assert_eq!(log.borrow().applied.len(), before);
        ex.on_viewport_resize(767);
        ex.on_viewport_resize(700);
        assert_eq!(log.borrow().applied.len(), before + 1);
        assert!(ex.state().is_compact_layout);
        assert_eq!(log.borrow().resized, [1024, 900, 767, 700]);
    }

    #[test]
    fn detail_switch_reregisters_and_keeps_valid_zoom() {
        let (mut ex, log) = explorer_with_log(1024);
        ex.toggle_region_zoom("A");
        log.borrow_mut().shapes.clear();
        ex.set_boundary_detail(BoundaryDetail::Simple).unwrap();
        assert_eq!(log.borrow().shapes, ["HK", "A", "B", "C"]);
        assert_eq!(ex.state().boundary_detail, BoundaryDetail::Simple);
        assert_eq!(ex.state().zoomed_region(), Some("A"));
        assert_eq!(ex.boundaries().detail(), BoundaryDetail::Simple);
    }

    #[test]
    fn failed_detail_load_keeps_current_boundaries() {
        let mut cache = DataCache::new("/nonexistent/region-atlas");
        cache.insert(sample_set(BoundaryDetail::Detailed));
        let data = RegionData {
            cache,
            table: crate::test_support::sample_table(),
            groups: RegionGroups::default(),
        };
        let mut ex = RegionExplorer::mount(
            crate::test_support::RecordingEngine::default(),
            data,
            &ExplorerConfig::default(),
            1024,
            BoundaryDetail::Detailed,
        )
        .unwrap();
        assert!(ex.set_boundary_detail(BoundaryDetail::Simple).is_err());
        assert_eq!(ex.state().boundary_detail, BoundaryDetail::Detailed);
        assert_eq!(ex.boundaries().detail(), BoundaryDetail::Detailed);
    }

    #[test]
    fn bar_filter_flow() {
        let (mut ex, log) = explorer_with_log(1024);
        ex.set_view_mode(ViewMode::Bar);
        ex.toggle_group_filter("G1");
        assert_eq!(ex.visible_regions().len(), 2);
        {
            let log = log.borrow();
            let ChartSpec::Bar(bar) = log.applied.last().unwrap() else {
                panic!("expected bar spec");
            };
            assert_eq!(bar.category_axis.data, ["A", "B"]);
        }
        ex.toggle_group_filter("All");
        assert_eq!(ex.visible_regions().len(), 3);
    }

    #[test]
    fn unmount_disposes_and_cancels_timer() {
        let (mut ex, log) = explorer_with_log(1024);
        ex.toggle_region_zoom("A");
        ex.unmount();
        assert!(ex.state().reveal_timer().is_none());
        assert_eq!(log.borrow().disposed, 1);
        assert!(!ex.refresh());
        drop(ex);
        assert_eq!(log.borrow().disposed, 1);
    }
}

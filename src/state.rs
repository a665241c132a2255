use std::time::Instant;

use crossterm::event::{KeyCode, MouseButton, MouseEvent, MouseEventKind};
use tracing::error;

use crate::{
    config::{ExplorerConfig, LayoutConfig},
    data::{load_metrics, BoundaryDetail, DataCache, RegionGroups},
    display::{Debounce, ViewMode, ALL_GROUPS},
    engine::SeriesKind,
    error::Result,
    explorer::{RegionData, RegionExplorer},
    map_draw::TerminalEngine,
    treemap::{load_categories, CategoryExplorer},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Page { Districts, Categories }

pub struct AppState {
    pub regions: RegionExplorer<TerminalEngine>,
    pub categories: CategoryExplorer<TerminalEngine>,
    pub page: Page,
    pub selected: usize,
    pub status: Option<String>,
    layout: LayoutConfig,
    resize: Debounce<u16>,
}

impl AppState {
    pub const HELP_TEXT: &'static str = "\
↑/↓: move in list
Enter: zoom / drill into selection
m / b: map or bar view
s / d: simple or detailed boundaries
r / Esc: view full map
0: all groups, 1-3: toggle group
Backspace: category back
Tab: switch page
q: quit";

    pub fn new(config: &ExplorerConfig, columns: u16, detail: BoundaryDetail) -> Result<Self> {
        let data = RegionData {
            cache: DataCache::new(&config.data_dir),
            table: load_metrics(config.metrics_file.as_deref())?,
            groups: RegionGroups::hong_kong(),
        };
        let viewport_px = config.layout.columns_to_px(columns);
        let regions = RegionExplorer::mount(TerminalEngine::default(), data, config, viewport_px, detail)?;
        let categories = CategoryExplorer::mount(
            TerminalEngine::default(),
            load_categories(config.categories_file.as_deref())?,
        );

        Ok(Self {
            regions,
            categories,
            page: Page::Districts,
            selected: 0,
            status: None,
            layout: config.layout.clone(),
            resize: Debounce::new(config.layout.resize_debounce()),
        })
    }

    /// "All" followed by every group label.
    pub fn group_choices(&self) -> Vec<String> {
        std::iter::once(ALL_GROUPS)
            .chain(self.regions.groups().labels())
            .map(str::to_string)
            .collect()
    }

    /// Names listed in the left panel of the active page.
    pub fn list_items(&self) -> Vec<String> {
        match self.page {
            Page::Districts => self.regions.visible_regions().iter().map(|r| r.name.clone()).collect(),
            Page::Categories => self.categories.nodes().iter().map(|n| n.name.clone()).collect(),
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.list_items().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    /// Returns true when the app should quit.
    pub fn handle_input(&mut self, key: KeyCode) -> bool {
        use KeyCode::*;
        self.status = None;
        match key {
            Char('q') => return true,
            Tab => {
                self.page = match self.page {
                    Page::Districts  => Page::Categories,
                    Page::Categories => Page::Districts,
                };
                self.selected = 0;
            }
            Up => if self.selected > 0 { self.selected -= 1 },
            Down => if self.selected + 1 < self.list_items().len() { self.selected += 1 },
            Enter => {
                let Some(choice) = self.list_items().get(self.selected).cloned() else {
                    return false;
                };
                match self.page {
                    Page::Districts => {
                        if self.regions.state().view_mode == ViewMode::Map {
                            self.regions.toggle_region_zoom(&choice);
                        }
                    }
                    Page::Categories => {
                        if self.categories.drill(&choice) {
                            self.selected = 0;
                        }
                    }
                }
            }
            Backspace if self.page == Page::Categories => {
                self.categories.back();
                self.selected = 0;
            }
            _ if self.page == Page::Districts => self.handle_district_key(key),
            _ => {}
        }
        false
    }

    fn handle_district_key(&mut self, key: KeyCode) {
        use KeyCode::*;
        match key {
            Char('m') => self.regions.set_view_mode(ViewMode::Map),
            Char('b') => self.regions.set_view_mode(ViewMode::Bar),
            Char('s') | Char('d') if self.regions.state().view_mode == ViewMode::Map => {
                let detail = if key == Char('s') { BoundaryDetail::Simple } else { BoundaryDetail::Detailed };
                if let Err(e) = self.regions.set_boundary_detail(detail) {
                    error!(error = %e, detail = detail.label(), "could not switch boundaries");
                    self.status = Some(format!("{} boundaries unavailable: {e}", detail.label()));
                }
            }
            Char('r') | Esc => self.regions.reset_zoom(),
            Char(c @ '0'..='9') if self.regions.state().view_mode == ViewMode::Bar => {
                let idx = c as usize - '0' as usize;
                if let Some(group) = self.group_choices().get(idx) {
                    self.regions.toggle_group_filter(group);
                    self.clamp_selection();
                }
            }
            _ => {}
        }
    }

    pub fn handle_mouse(&mut self, ev: MouseEvent) {
        match ev.kind {
            MouseEventKind::Down(MouseButton::Left) => self.click(ev.column, ev.row),
            MouseEventKind::Moved => match self.page {
                Page::Districts => {
                    if let Some(engine) = self.regions.engine_mut() {
                        engine.hover_at(ev.column, ev.row);
                    }
                }
                Page::Categories => {
                    if let Some(engine) = self.categories.engine_mut() {
                        engine.hover_at(ev.column, ev.row);
                    }
                }
            },
            _ => {}
        }
    }

    fn click(&mut self, col: u16, row: u16) {
        match self.page {
            Page::Districts => {
                let Some(click) = self.regions.engine().and_then(|e| e.click_at(col, row)) else {
                    return;
                };
                if click.series == SeriesKind::Bar {
                    if let Some(pos) = self.list_items().iter().position(|n| *n == click.name) {
                        self.selected = pos;
                    }
                }
                self.regions.on_chart_click(&click);
            }
            Page::Categories => {
                let Some(click) = self.categories.engine().and_then(|e| e.click_at(col, row)) else {
                    return;
                };
                if self.categories.on_chart_click(&click) {
                    self.selected = 0;
                }
            }
        }
    }

    /// Records a terminal resize; applied once the size settles.
    pub fn queue_resize(&mut self, columns: u16, now: Instant) {
        self.resize.push(columns, now);
    }

    /// Applies a settled resize and fires due timers.
    pub fn tick(&mut self, now: Instant) {
        if let Some(columns) = self.resize.take_ready(now) {
            self.regions.on_viewport_resize(self.layout.columns_to_px(columns));
        }
        self.regions.poll_timers(now);
    }

    pub fn is_compact(&self) -> bool {
        self.regions.state().is_compact_layout
    }

    pub fn shutdown(&mut self) {
        self.resize.cancel();
        self.regions.unmount();
        self.categories.unmount();
    }
}

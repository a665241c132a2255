use std::collections::HashMap;

use geo::{BoundingRect, Contains, InteriorPoint, MultiPolygon, Point, Rect as GeoRect};
use ratatui::{
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{self, Canvas, Points},
        Bar, BarChart, BarGroup, Block, Borders, Paragraph, Wrap,
    },
    Frame,
};
use tracing::debug;

use crate::{
    boundary::Shape,
    chart::{BarSpec, ChartSpec, LegendSpec, MapSpec, Orient, Rgb, TreemapSpec},
    engine::{ChartClick, RenderEngine, SeriesKind},
    error::{AtlasError, Result},
    treemap::{squarify, Cell, SERIES_COLORS},
};

const OUTLINE: Color = Color::Rgb(0xba, 0xba, 0xba);
const NO_DATA: Color = Color::DarkGray;
const HOVER: Color = Color::White;

fn tui_color(c: Rgb) -> Color {
    Color::Rgb(c.0, c.1, c.2)
}

/// Where the last map was drawn, for turning terminal cells into map coordinates.
#[derive(Clone, Debug, PartialEq)]
struct MapHit {
    inner: Rect,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    shape: String,
    silent: bool,
}

impl MapHit {
    fn to_world(&self, col: u16, row: u16) -> Option<(f64, f64)> {
        let r = self.inner;
        if col < r.x || row < r.y || col >= r.x + r.width || row >= r.y + r.height {
            return None;
        }
        let fx = (f64::from(col - r.x) + 0.5) / f64::from(r.width);
        let fy = (f64::from(row - r.y) + 0.5) / f64::from(r.height);
        let x = self.x_bounds[0] + fx * (self.x_bounds[1] - self.x_bounds[0]);
        let y = self.y_bounds[1] - fy * (self.y_bounds[1] - self.y_bounds[0]);
        Some((x, y))
    }

    #[cfg(test)]
    fn to_cell(&self, x: f64, y: f64) -> Option<(u16, u16)> {
        let r = self.inner;
        let fx = (x - self.x_bounds[0]) / (self.x_bounds[1] - self.x_bounds[0]);
        let fy = (self.y_bounds[1] - y) / (self.y_bounds[1] - self.y_bounds[0]);
        if !(0.0..1.0).contains(&fx) || !(0.0..1.0).contains(&fy) {
            return None;
        }
        let col = r.x + (fx * f64::from(r.width)) as u16;
        let row = r.y + (fy * f64::from(r.height)) as u16;
        Some((col, row))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
enum Hit {
    #[default]
    Nothing,
    Map(MapHit),
    Bar { rows: Vec<(u16, String)>, inner: Rect },
    Treemap(Vec<(Rect, String)>),
}

/// Sampled braille dot centres per region, reused while nothing changes.
struct FillCache {
    key: (String, Rect),
    points: Vec<Vec<(f64, f64)>>,
}

/// Render engine drawing chart specs into a ratatui frame.
#[derive(Default)]
pub struct TerminalEngine {
    shapes: HashMap<String, Shape>,
    spec: Option<ChartSpec>,
    width_px: u32,
    disposed: bool,
    hit: Hit,
    hovered: Option<String>,
    fill: Option<FillCache>,
}

impl RenderEngine for TerminalEngine {
    fn register_shape(&mut self, shape: Shape) {
        self.fill = None;
        self.shapes.insert(shape.name.clone(), shape);
    }

    fn apply(&mut self, spec: &ChartSpec) -> Result<()> {
        if self.disposed {
            return Err(AtlasError::EngineDisposed);
        }
        if let ChartSpec::Map(map) = spec {
            if !self.shapes.contains_key(&map.series.map) {
                return Err(AtlasError::UnknownShape(map.series.map.clone()));
            }
        }
        self.hovered = None;
        self.spec = Some(spec.clone());
        Ok(())
    }

    fn resize(&mut self, width_px: u32) {
        self.width_px = width_px;
        self.fill = None;
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.shapes.clear();
        self.spec = None;
        self.fill = None;
        self.hit = Hit::Nothing;
        debug!(width_px = self.width_px, "terminal engine disposed");
    }
}

impl TerminalEngine {
    #[cfg(test)]
    pub fn spec(&self) -> Option<&ChartSpec> {
        self.spec.as_ref()
    }

    pub fn draw(&mut self, f: &mut Frame, area: Rect) {
        let Some(spec) = self.spec.take() else {
            let txt = Paragraph::new("Nothing to display")
                .block(Block::default().borders(Borders::ALL).title("Chart"))
                .wrap(Wrap { trim: true });
            f.render_widget(txt, area);
            self.hit = Hit::Nothing;
            return;
        };
        self.hit = match &spec {
            ChartSpec::Map(map) => self.draw_map(f, area, map),
            ChartSpec::Bar(bar) => draw_bar(f, area, bar),
            ChartSpec::Treemap(tree) => draw_treemap(f, area, tree),
        };
        self.spec = Some(spec);
    }

    /// The item under a click, if the drawn chart is interactive there.
    pub fn click_at(&self, col: u16, row: u16) -> Option<ChartClick> {
        let (series, name) = match &self.hit {
            Hit::Nothing => return None,
            Hit::Map(hit) => {
                if hit.silent {
                    return None;
                }
                (SeriesKind::Map, self.region_under(hit, col, row)?)
            }
            Hit::Bar { rows, inner } => {
                if col < inner.x || col >= inner.x + inner.width {
                    return None;
                }
                let (_, name) = rows.iter().find(|(r, _)| *r == row)?;
                (SeriesKind::Bar, name.clone())
            }
            Hit::Treemap(cells) => {
                let (_, name) = cells.iter().find(|(r, _)| r.contains(Position::new(col, row)))?;
                (SeriesKind::Treemap, name.clone())
            }
        };
        Some(ChartClick { series, name })
    }

    /// Tracks the hovered item for the tooltip.
    pub fn hover_at(&mut self, col: u16, row: u16) {
        self.hovered = self.click_at(col, row).map(|c| c.name);
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    /// Tooltip text for the hovered item when the spec enables tooltips.
    pub fn tooltip(&self) -> Option<String> {
        let name = self.hovered()?;
        match self.spec.as_ref()? {
            ChartSpec::Map(map) if map.tooltip.show => {
                Some(map.tooltip.text(name, map.series.value_of(name).unwrap_or(0.0)))
            }
            ChartSpec::Bar(bar) if bar.tooltip.show => {
                let idx = bar.category_axis.data.iter().position(|n| n == name)?;
                Some(bar.tooltip.text(name, bar.values.get(idx).copied()?))
            }
            ChartSpec::Treemap(tree) => {
                let node = tree.nodes.iter().find(|n| n.name == name)?;
                Some(node.tooltip())
            }
            _ => None,
        }
    }

    /// Terminal cell showing map coordinate `(x, y)` in the last drawn map.
    #[cfg(test)]
    pub fn cell_for(&self, x: f64, y: f64) -> Option<(u16, u16)> {
        match &self.hit {
            Hit::Map(hit) => hit.to_cell(x, y),
            _ => None,
        }
    }

    fn region_under(&self, hit: &MapHit, col: u16, row: u16) -> Option<String> {
        let (x, y) = hit.to_world(col, row)?;
        let shape = self.shapes.get(&hit.shape)?;
        shape.region_at(x, y).map(str::to_string)
    }

    fn draw_map(&mut self, f: &mut Frame, area: Rect, spec: &MapSpec) -> Hit {
        let (chart_area, legend_area) = split_legend(area, &spec.legend);
        if let Some(legend_area) = legend_area {
            draw_legend(f, legend_area, &spec.legend);
        }

        let block = Block::default()
            .title(Span::styled(spec.title.text.clone(), Style::default().add_modifier(Modifier::BOLD)))
            .borders(Borders::ALL);
        let inner = block.inner(chart_area);

        let Some(shape) = self.shapes.get(&spec.series.map) else {
            f.render_widget(Paragraph::new(format!("Map '{}' is not registered", spec.series.map)).block(block), chart_area);
            return Hit::Nothing;
        };
        let (x_bounds, y_bounds) = fit_bounds(shape.bounds, inner);

        let key = (shape.name.clone(), inner);
        if self.fill.as_ref().is_none_or(|c| c.key != key) {
            self.fill = Some(FillCache { key, points: sample_fill(shape, x_bounds, y_bounds, inner) });
        }
        let fills: &[Vec<(f64, f64)>] = self.fill.as_ref().map_or(&[], |c| c.points.as_slice());

        let colors: Vec<Color> = shape
            .regions
            .iter()
            .map(|(name, _)| {
                spec.series
                    .value_of(name)
                    .map_or(NO_DATA, |v| tui_color(spec.legend.scale.color_at(v)))
            })
            .collect();

        let hovered = if spec.tooltip.show { self.hovered.as_deref() } else { None };
        let label = spec.series.label.show.then(|| {
            shape.regions.iter().find_map(|(name, mp)| {
                let value = spec.series.value_of(name)?;
                let p = mp.interior_point()?;
                Some((p.x(), p.y(), spec.series.label.text(value)))
            })
        }).flatten();

        let canvas = Canvas::default()
            .block(block)
            .marker(Marker::Braille)
            .x_bounds(x_bounds)
            .y_bounds(y_bounds)
            .paint(|ctx| {
                for (points, color) in fills.iter().zip(&colors) {
                    ctx.draw(&Points { coords: points, color: *color });
                }
                ctx.layer();
                for (name, mp) in &shape.regions {
                    let color = if hovered == Some(name.as_str()) { HOVER } else { OUTLINE };
                    draw_outline(ctx, mp, color);
                }
                if let Some((x, y, text)) = &label {
                    ctx.print(*x, *y, Span::styled(text.clone(), Style::default().fg(Color::Black).bg(Color::White).add_modifier(Modifier::BOLD)));
                }
            });
        f.render_widget(canvas, chart_area);

        Hit::Map(MapHit {
            inner,
            x_bounds,
            y_bounds,
            shape: shape.name.clone(),
            silent: spec.series.silent,
        })
    }
}

fn draw_outline(ctx: &mut canvas::Context, mp: &MultiPolygon<f64>, color: Color) {
    for poly in &mp.0 {
        for ring in std::iter::once(poly.exterior()).chain(poly.interiors()) {
            for window in ring.0.windows(2) {
                let a = window[0];
                let b = window[1];
                ctx.draw(&canvas::Line { x1: a.x, y1: a.y, x2: b.x, y2: b.y, color });
            }
        }
    }
}

/// Widens the shorter side of `bounds` so braille dots stay square.
fn fit_bounds(bounds: GeoRect<f64>, inner: Rect) -> ([f64; 2], [f64; 2]) {
    let (dots_x, dots_y) = (f64::from(inner.width.max(1)) * 2.0, f64::from(inner.height.max(1)) * 4.0);
    let (w, h) = (bounds.width().max(f64::EPSILON), bounds.height().max(f64::EPSILON));
    let unit = (w / dots_x).max(h / dots_y);
    let (half_w, half_h) = (unit * dots_x / 2.0, unit * dots_y / 2.0);
    let c = bounds.center();
    ([c.x - half_w, c.x + half_w], [c.y - half_h, c.y + half_h])
}

/// Centres of the braille dots inside each region of `shape`.
fn sample_fill(shape: &Shape, x_bounds: [f64; 2], y_bounds: [f64; 2], inner: Rect) -> Vec<Vec<(f64, f64)>> {
    let (dots_x, dots_y) = (u32::from(inner.width) * 2, u32::from(inner.height) * 4);
    let step_x = (x_bounds[1] - x_bounds[0]) / f64::from(dots_x.max(1));
    let step_y = (y_bounds[1] - y_bounds[0]) / f64::from(dots_y.max(1));

    shape
        .regions
        .iter()
        .map(|(_, mp)| {
            let Some(bb) = mp.bounding_rect() else {
                return Vec::new();
            };
            let i0 = ((bb.min().x - x_bounds[0]) / step_x).floor().max(0.0) as u32;
            let i1 = (((bb.max().x - x_bounds[0]) / step_x).ceil() as u32).min(dots_x);
            let j0 = ((y_bounds[1] - bb.max().y) / step_y).floor().max(0.0) as u32;
            let j1 = (((y_bounds[1] - bb.min().y) / step_y).ceil() as u32).min(dots_y);

            let mut points = Vec::new();
            for j in j0..j1 {
                let y = y_bounds[1] - (f64::from(j) + 0.5) * step_y;
                for i in i0..i1 {
                    let x = x_bounds[0] + (f64::from(i) + 0.5) * step_x;
                    if mp.contains(&Point::new(x, y)) {
                        points.push((x, y));
                    }
                }
            }
            points
        })
        .collect()
}

fn split_legend(area: Rect, legend: &LegendSpec) -> (Rect, Option<Rect>) {
    if !legend.show {
        return (area, None);
    }
    match legend.orient {
        Orient::Vertical => {
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Min(10), Constraint::Length(10)])
                .split(area);
            (chunks[0], Some(chunks[1]))
        }
        Orient::Horizontal => {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(5), Constraint::Length(4)])
                .split(area);
            (chunks[0], Some(chunks[1]))
        }
    }
}

fn draw_legend(f: &mut Frame, area: Rect, legend: &LegendSpec) {
    let scale = &legend.scale;
    let swatch = |t: f64| {
        let v = scale.min + t * (scale.max - scale.min);
        Span::styled("██", Style::default().fg(tui_color(scale.color_at(v))))
    };
    let [high, low] = &legend.text;
    let dim = Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD);

    let lines: Vec<Line> = match legend.orient {
        Orient::Vertical => {
            let steps = area.height.saturating_sub(4).max(2);
            let mut lines = vec![Line::from(Span::styled(high.clone(), dim))];
            for k in 0..steps {
                let t = 1.0 - f64::from(k) / f64::from(steps - 1);
                lines.push(Line::from(swatch(t)));
            }
            lines.push(Line::from(Span::styled(low.clone(), dim)));
            lines
        }
        Orient::Horizontal => {
            let steps = (area.width.saturating_sub(2) / 2).max(2);
            let bar: Vec<Span> = (0..steps)
                .map(|k| swatch(f64::from(k) / f64::from(steps - 1)))
                .collect();
            vec![
                Line::from(bar),
                Line::from(Span::styled(format!("{low} .. {high}"), dim)),
            ]
        }
    };
    f.render_widget(Paragraph::new(lines).block(Block::default().borders(Borders::NONE)), area);
}

fn draw_bar(f: &mut Frame, area: Rect, spec: &BarSpec) -> Hit {
    let block = Block::default()
        .title(Span::styled(spec.title.text.clone(), Style::default().add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL);
    let inner = block.inner(area);

    let bars: Vec<Bar> = spec
        .category_axis
        .data
        .iter()
        .zip(&spec.values)
        .map(|(name, &value)| {
            let color = tui_color(spec.scale.color_at(value));
            Bar::default()
                .value(value.max(0.0).round() as u64)
                .label(Line::from(name.clone()))
                .text_value(spec.value_axis.format.format(value))
                .style(Style::default().fg(color))
                .value_style(Style::default().fg(Color::Black).bg(color))
        })
        .collect();

    let chart = BarChart::default()
        .block(block)
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .data(BarGroup::default().bars(&bars));
    f.render_widget(chart, area);

    let rows = spec
        .category_axis
        .data
        .iter()
        .take(usize::from(inner.height))
        .enumerate()
        .map(|(i, name)| (inner.y + i as u16, name.clone()))
        .collect();
    Hit::Bar { rows, inner }
}

fn draw_treemap(f: &mut Frame, area: Rect, spec: &TreemapSpec) -> Hit {
    let block = Block::default()
        .title(Span::styled(spec.title.text.clone(), Style::default().add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let values: Vec<f64> = spec.nodes.iter().map(|n| n.value).collect();
    let bounds = Cell::new(f64::from(inner.x), f64::from(inner.y), f64::from(inner.width), f64::from(inner.height));
    let cells = squarify(&values, bounds);

    let mut hits = Vec::with_capacity(cells.len());
    for (i, (node, cell)) in spec.nodes.iter().zip(cells).enumerate() {
        let x0 = cell.x.round() as u16;
        let y0 = cell.y.round() as u16;
        let x1 = (cell.x + cell.w).round() as u16;
        let y1 = (cell.y + cell.h).round() as u16;
        if x1 <= x0 || y1 <= y0 {
            continue;
        }
        let rect = Rect::new(x0, y0, x1 - x0, y1 - y0);
        let bg = tui_color(SERIES_COLORS[i % SERIES_COLORS.len()]);
        let mut label = node.label();
        if node.has_children {
            label.push_str(" ▸");
        }
        let tile = Paragraph::new(label)
            .style(Style::default().fg(Color::White).bg(bg).add_modifier(Modifier::BOLD))
            .wrap(Wrap { trim: true });
        f.render_widget(tile, rect);
        hits.push((rect, node.name.clone()));
    }
    Hit::Treemap(hits)
}

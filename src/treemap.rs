//! Category treemap: a two-level tree of programme categories with click-to-drill and a back stack.

use std::{fs, path::Path};

use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    chart::{ChartSpec, Rgb, TitleSpec, TreemapNode, TreemapSpec},
    engine::{ChartClick, EngineBinding, RenderEngine, SeriesKind},
    error::Result,
};

pub const ROOT_TITLE: &str = "表演藝術節目類型分佈";

/// Default categorical colours, cycled by position.
pub const SERIES_COLORS: [Rgb; 9] = [
    Rgb::hex(0x5470c6),
    Rgb::hex(0x91cc75),
    Rgb::hex(0xfac858),
    Rgb::hex(0xee6666),
    Rgb::hex(0x73c0de),
    Rgb::hex(0x3ba272),
    Rgb::hex(0xfc8452),
    Rgb::hex(0x9a60b4),
    Rgb::hex(0xea7ccc),
];

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CategoryNode {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    fn new(name: &str, value: f64, description: &str, children: Vec<CategoryNode>) -> Self {
        Self {
            name: name.to_string(),
            value,
            description: Some(description.to_string()),
            children,
        }
    }

    fn to_spec_node(&self) -> TreemapNode {
        TreemapNode {
            name: self.name.clone(),
            value: self.value,
            description: self.description.clone(),
            has_children: !self.children.is_empty(),
        }
    }
}

pub fn performing_arts() -> Vec<CategoryNode> {
    let leaf = |name: &str, value: f64, desc: &str| CategoryNode::new(name, value, desc, Vec::new());
    vec![
        CategoryNode::new("劇場", 35.0, "+25%", vec![
            leaf("音樂劇", 15.0, "+30%"),
            leaf("劇場", 15.0, "+20%"),
            leaf("讀劇", 5.0, "+50%"),
        ]),
        leaf("粵劇", 28.0, "+15%"),
        CategoryNode::new("舞蹈", 32.0, "+40%", vec![
            leaf("芭蕾表演", 14.0, "+18%"),
            leaf("當代舞蹈", 18.0, "+60%"),
            leaf("K-dance", 18.0, "+200%"),
        ]),
        leaf("棟篤笑", 22.0, "+33%"),
        CategoryNode::new("音樂", 20.0, "+28%", vec![
            leaf("流行音樂會", 10.0, "+25%"),
            leaf("古典音樂會", 10.0, "+30%"),
        ]),
        CategoryNode::new("其他", 14.0, "+75%", vec![leaf("Art Tech", 9.0, "+125%")]),
    ]
}

/// Reads a category tree, falling back to the built-in one.
pub fn load_categories(path: Option<&Path>) -> Result<Vec<CategoryNode>> {
    match path {
        Some(path) => {
            let nodes: Vec<CategoryNode> = serde_json::from_slice(&fs::read(path)?)?;
            info!(path = %path.display(), categories = nodes.len(), "loaded categories");
            Ok(nodes)
        }
        None => Ok(performing_arts()),
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Level {
    title: String,
    nodes: Vec<CategoryNode>,
}

pub struct CategoryExplorer<E: RenderEngine> {
    root: Vec<CategoryNode>,
    current: Level,
    stack: Vec<Level>,
    binding: EngineBinding<E>,
}

impl<E: RenderEngine> CategoryExplorer<E> {
    pub fn mount(engine: E, root: Vec<CategoryNode>) -> Self {
        let mut explorer = Self {
            current: Level { title: ROOT_TITLE.to_string(), nodes: root.clone() },
            root,
            stack: Vec::new(),
            binding: EngineBinding::mount(engine),
        };
        explorer.refresh();
        explorer
    }

    pub fn title(&self) -> &str {
        &self.current.title
    }

    pub fn nodes(&self) -> &[CategoryNode] {
        &self.current.nodes
    }

    pub fn can_go_back(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn engine(&self) -> Option<&E> {
        self.binding.engine()
    }

    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.binding.engine_mut()
    }

    pub fn spec(&self) -> ChartSpec {
        ChartSpec::Treemap(TreemapSpec {
            title: TitleSpec { text: self.current.title.clone(), font_size: 24 },
            nodes: self.current.nodes.iter().map(CategoryNode::to_spec_node).collect(),
            label_font_size: 14,
        })
    }

    pub fn refresh(&mut self) -> bool {
        let spec = self.spec();
        self.binding.apply(&spec)
    }

    /// Shows the children of `name`. Nodes without children are not drillable.
    pub fn drill(&mut self, name: &str) -> bool {
        let Some(node) = self
            .current
            .nodes
            .iter()
            .find(|n| n.name == name && !n.children.is_empty())
        else {
            return false;
        };
        let next = Level { title: format!("{}節目分佈", node.name), nodes: node.children.clone() };
        let prev = std::mem::replace(&mut self.current, next);
        self.stack.push(prev);
        debug!(category = name, depth = self.stack.len(), "drilled into category");
        self.refresh();
        true
    }

    /// Restores the previous view, or the root view when the stack is empty.
    pub fn back(&mut self) {
        self.current = self
            .stack
            .pop()
            .unwrap_or_else(|| Level { title: ROOT_TITLE.to_string(), nodes: self.root.clone() });
        debug!(depth = self.stack.len(), "category back");
        self.refresh();
    }

    pub fn on_chart_click(&mut self, click: &ChartClick) -> bool {
        click.series == SeriesKind::Treemap && self.drill(&click.name)
    }

    pub fn unmount(&mut self) {
        self.binding.unmount();
    }
}

/// An axis-aligned cell in layout units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Cell {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    #[cfg(test)]
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px < self.x + self.w && py >= self.y && py < self.y + self.h
    }
}

/// Squarified treemap layout. Cells come back in the order of `values`;
/// non-positive values get an empty cell.
pub fn squarify(values: &[f64], bounds: Cell) -> Vec<Cell> {
    let mut out = vec![Cell::new(bounds.x, bounds.y, 0.0, 0.0); values.len()];
    let total: f64 = values.iter().filter(|v| **v > 0.0).sum();
    if total <= 0.0 || bounds.w <= 0.0 || bounds.h <= 0.0 {
        return out;
    }

    let scale = bounds.w * bounds.h / total;
    let mut order: Vec<usize> = (0..values.len()).filter(|&i| values[i] > 0.0).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    let areas: Vec<(usize, f64)> = order.into_iter().map(|i| (i, values[i] * scale)).collect();

    let mut rest = bounds;
    let mut row: Vec<(usize, f64)> = Vec::new();
    let mut i = 0;
    while i < areas.len() {
        let side = rest.w.min(rest.h);
        let mut candidate = row.clone();
        candidate.push(areas[i]);
        if row.is_empty() || worst_ratio(&candidate, side) <= worst_ratio(&row, side) {
            row = candidate;
            i += 1;
        } else {
            rest = lay_row(&row, rest, &mut out);
            row.clear();
        }
    }
    if !row.is_empty() {
        lay_row(&row, rest, &mut out);
    }
    out
}

fn worst_ratio(row: &[(usize, f64)], side: f64) -> f64 {
    let sum: f64 = row.iter().map(|r| r.1).sum();
    let max = row.iter().map(|r| r.1).fold(f64::MIN, f64::max);
    let min = row.iter().map(|r| r.1).fold(f64::MAX, f64::min);
    let (s2, w2) = (sum * sum, side * side);
    (w2 * max / s2).max(s2 / (w2 * min))
}

/// Places `row` along the shorter side of `rest` and returns what is left.
fn lay_row(row: &[(usize, f64)], rest: Cell, out: &mut [Cell]) -> Cell {
    let sum: f64 = row.iter().map(|r| r.1).sum();
    if rest.w >= rest.h {
        let col_w = sum / rest.h;
        let mut y = rest.y;
        for &(idx, area) in row {
            let h = area / col_w;
            out[idx] = Cell::new(rest.x, y, col_w, h);
            y += h;
        }
        Cell::new(rest.x + col_w, rest.y, rest.w - col_w, rest.h)
    } else {
        let row_h = sum / rest.w;
        let mut x = rest.x;
        for &(idx, area) in row {
            let w = area / row_h;
            out[idx] = Cell::new(x, rest.y, w, row_h);
            x += w;
        }
        Cell::new(rest.x, rest.y + row_h, rest.w, rest.h - row_h)
    }
}

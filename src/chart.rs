//! Declarative chart specifications and the builders that derive them from display state.

use serde::{Serialize, Serializer};

use crate::{
    data::{RegionGroups, RegionTable, BASE_MAP},
    display::{filter_regions, DisplayState, LabelReveal, ViewMode},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn hex(v: u32) -> Self {
        Rgb((v >> 16) as u8, (v >> 8) as u8, v as u8)
    }

    fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2))
    }
}

/// Diverging blue to red palette, low to high.
pub const PALETTE: [Rgb; 11] = [
    Rgb::hex(0x313695),
    Rgb::hex(0x4575b4),
    Rgb::hex(0x74add1),
    Rgb::hex(0xabd9e9),
    Rgb::hex(0xe0f3f8),
    Rgb::hex(0xffffbf),
    Rgb::hex(0xfee090),
    Rgb::hex(0xfdae61),
    Rgb::hex(0xf46d43),
    Rgb::hex(0xd73027),
    Rgb::hex(0xa50026),
];

/// Fixed strings shared by every chart of the explorer.
#[derive(Clone, Debug)]
pub struct ChartText {
    pub title: String,
    pub metric_label: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChartSpec {
    Map(MapSpec),
    Bar(BarSpec),
    Treemap(TreemapSpec),
}

impl ChartSpec {
    pub fn title(&self) -> &TitleSpec {
        match self {
            ChartSpec::Map(s) => &s.title,
            ChartSpec::Bar(s) => &s.title,
            ChartSpec::Treemap(s) => &s.title,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TitleSpec {
    pub text: String,
    pub font_size: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TooltipTrigger {
    Item,
    Axis,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TooltipSpec {
    pub show: bool,
    pub trigger: TooltipTrigger,
    pub font_size: u16,
    pub metric_label: String,
}

impl TooltipSpec {
    pub fn text(&self, name: &str, value: f64) -> String {
        format!("{name}\n{}: {}", self.metric_label, format_thousands(value))
    }
}

/// Linear colour scale over a value domain.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColorScale {
    pub min: f64,
    pub max: f64,
    pub palette: Vec<Rgb>,
}

impl ColorScale {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max, palette: PALETTE.to_vec() }
    }

    pub fn color_at(&self, value: f64) -> Rgb {
        let Some(&last) = self.palette.last() else {
            return Rgb(128, 128, 128);
        };
        let span = self.max - self.min;
        let t = if span > 0.0 { ((value - self.min) / span).clamp(0.0, 1.0) } else { 0.0 };
        let pos = t * (self.palette.len() - 1) as f64;
        let i = pos.floor() as usize;
        if i + 1 >= self.palette.len() {
            return last;
        }
        self.palette[i].lerp(self.palette[i + 1], pos - i as f64)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Orient {
    Horizontal,
    Vertical,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LegendSpec {
    pub show: bool,
    pub orient: Orient,
    pub item_width: u16,
    pub item_height: u16,
    pub font_size: u16,
    pub scale: ColorScale,
    /// High end first, then low end.
    pub text: [String; 2],
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub name: String,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LabelSpec {
    pub show: bool,
    pub font_size: u16,
    pub metric_label: String,
}

impl LabelSpec {
    pub fn text(&self, value: f64) -> String {
        format!("{}: {}", self.metric_label, format_thousands(value))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MapSeries {
    /// Registered shape to draw.
    pub map: String,
    pub data: Vec<SeriesPoint>,
    /// No hover or click interaction.
    pub silent: bool,
    pub roam: bool,
    pub label: LabelSpec,
}

impl MapSeries {
    pub fn value_of(&self, name: &str) -> Option<f64> {
        self.data.iter().find(|p| p.name == name).map(|p| p.value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MapSpec {
    pub title: TitleSpec,
    pub tooltip: TooltipSpec,
    pub legend: LegendSpec,
    pub series: MapSeries,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelInterval {
    /// Engine thins labels to fit.
    Auto,
    All,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AxisLabel {
    pub rotate: i16,
    pub font_size: u16,
    pub interval: LabelInterval,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    /// `652,800`
    Thousands,
    /// `653k`
    Abbreviated,
}

impl ValueFormat {
    pub fn format(self, value: f64) -> String {
        match self {
            ValueFormat::Thousands => format_thousands(value),
            ValueFormat::Abbreviated => format!("{}k", (value / 1000.0).round()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryAxis {
    pub data: Vec<String>,
    pub label: AxisLabel,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValueAxis {
    pub label: AxisLabel,
    pub format: ValueFormat,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BarSpec {
    pub title: TitleSpec,
    pub tooltip: TooltipSpec,
    pub category_axis: CategoryAxis,
    pub value_axis: ValueAxis,
    pub values: Vec<f64>,
    /// Bar colours; never drawn as a legend.
    pub scale: ColorScale,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TreemapNode {
    pub name: String,
    pub value: f64,
    pub description: Option<String>,
    pub has_children: bool,
}

impl TreemapNode {
    fn description(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.is_empty())
    }

    /// Tile text: the name, with the description under it when there is one.
    pub fn label(&self) -> String {
        match self.description() {
            Some(desc) => format!("{}\n{desc}", self.name),
            None => self.name.clone(),
        }
    }

    /// Name, then `數值：<value>` unless the value is zero, then the description.
    pub fn tooltip(&self) -> String {
        let mut lines = vec![self.name.clone()];
        if self.value != 0.0 {
            lines.push(format!("數值：{}", format_thousands(self.value)));
        }
        lines.extend(self.description().map(str::to_string));
        lines.join("\n")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TreemapSpec {
    pub title: TitleSpec,
    pub nodes: Vec<TreemapNode>,
    pub label_font_size: u16,
}

/// Global scale over every region so colours stay put across zoom and filter.
fn region_scale(table: &RegionTable) -> ColorScale {
    let (min, max) = table.value_range().unwrap_or((0.0, 0.0));
    ColorScale::new(min, max)
}

pub fn build_map_spec(table: &RegionTable, state: &DisplayState, text: &ChartText) -> MapSpec {
    let zoomed = state.zoomed_region();
    let compact = state.is_compact_layout;

    let title = TitleSpec {
        text: zoomed.map_or_else(|| text.title.clone(), str::to_string),
        font_size: match (zoomed.is_some(), compact) {
            (true, false) => 38,
            (true, true) => 28,
            (false, false) => 24,
            (false, true) => 18,
        },
    };

    let data = table
        .regions()
        .iter()
        .filter(|r| zoomed.is_none_or(|z| z == r.name))
        .map(|r| SeriesPoint { name: r.name.clone(), value: r.value })
        .collect();

    MapSpec {
        title,
        tooltip: TooltipSpec {
            show: zoomed.is_none(),
            trigger: TooltipTrigger::Item,
            font_size: 14,
            metric_label: text.metric_label.clone(),
        },
        legend: LegendSpec {
            show: zoomed.is_none(),
            orient: if compact { Orient::Horizontal } else { Orient::Vertical },
            item_width: if compact { 12 } else { 20 },
            item_height: if compact { 80 } else { 200 },
            font_size: if compact { 10 } else { 14 },
            scale: region_scale(table),
            text: ["High".to_string(), "Low".to_string()],
        },
        series: MapSeries {
            map: zoomed.unwrap_or(BASE_MAP).to_string(),
            data,
            silent: zoomed.is_some(),
            roam: true,
            label: LabelSpec {
                show: zoomed.is_some() && state.label_reveal() == LabelReveal::Revealed,
                font_size: 24,
                metric_label: text.metric_label.clone(),
            },
        },
    }
}

pub fn build_bar_spec(table: &RegionTable, groups: &RegionGroups, state: &DisplayState, text: &ChartText) -> BarSpec {
    let compact = state.is_compact_layout;
    let filter = state.group_filter();
    let shown = filter_regions(table.regions(), groups, filter);

    let title = if filter.is_empty() {
        text.title.clone()
    } else {
        format!("{} - {}", filter.join(", "), text.title)
    };

    BarSpec {
        title: TitleSpec { text: title, font_size: if compact { 16 } else { 20 } },
        tooltip: TooltipSpec {
            show: true,
            trigger: TooltipTrigger::Axis,
            font_size: if compact { 12 } else { 14 },
            metric_label: text.metric_label.clone(),
        },
        category_axis: CategoryAxis {
            data: shown.iter().map(|r| r.name.clone()).collect(),
            label: AxisLabel {
                rotate: 45,
                font_size: if compact { 9 } else { 11 },
                interval: LabelInterval::All,
            },
        },
        value_axis: ValueAxis {
            label: AxisLabel {
                rotate: if compact { 45 } else { 0 },
                font_size: if compact { 9 } else { 11 },
                interval: if compact { LabelInterval::Auto } else { LabelInterval::All },
            },
            format: if compact { ValueFormat::Abbreviated } else { ValueFormat::Thousands },
        },
        values: shown.iter().map(|r| r.value).collect(),
        scale: region_scale(table),
    }
}

/// Spec for the active view.
pub fn build_spec(table: &RegionTable, groups: &RegionGroups, state: &DisplayState, text: &ChartText) -> ChartSpec {
    match state.view_mode {
        ViewMode::Map => ChartSpec::Map(build_map_spec(table, state, text)),
        ViewMode::Bar => ChartSpec::Bar(build_bar_spec(table, groups, state, text)),
    }
}

/// Groups the integer part in threes and keeps at most three decimals.
pub fn format_thousands(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    let sign = if rounded < 0.0 { "-" } else { "" };
    let abs = rounded.abs();
    let int = abs.trunc() as u64;

    let digits = int.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let frac = format!("{:.3}", abs.fract());
    let frac = frac.trim_start_matches('0').trim_end_matches('0');
    if frac.len() > 1 {
        format!("{sign}{grouped}{frac}")
    } else {
        format!("{sign}{grouped}")
    }
}

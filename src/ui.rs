use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::{
    chart::format_thousands,
    data::BoundaryDetail,
    display::ViewMode,
    state::{AppState, Page},
};

const ACTIVE: Style = Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD);

pub fn draw(f: &mut Frame, state: &mut AppState) {
    let (list_area, chart_area, side) = if state.is_compact() {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(7), Constraint::Min(8), Constraint::Length(8)])
            .split(f.area());
        let top = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[0]);
        (top[0], rows[1], [top[1], rows[2]])
    } else {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(20),
                Constraint::Percentage(60),
                Constraint::Percentage(20),
            ])
            .split(f.area());
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(30), Constraint::Percentage(30)])
            .split(chunks[2]);
        draw_help(f, right[2]);
        (chunks[0], chunks[1], [right[0], right[1]])
    };

    draw_list(f, list_area, state);
    match state.page {
        Page::Districts => {
            if let Some(engine) = state.regions.engine_mut() {
                engine.draw(f, chart_area);
            }
        }
        Page::Categories => {
            if let Some(engine) = state.categories.engine_mut() {
                engine.draw(f, chart_area);
            }
        }
    }
    draw_controls(f, side[0], state);
    draw_details(f, side[1], state);
}

fn draw_list(f: &mut Frame, area: Rect, state: &AppState) {
    let (title, items): (&str, Vec<ListItem>) = match state.page {
        Page::Districts => (
            "Districts",
            state
                .regions
                .visible_regions()
                .iter()
                .map(|r| ListItem::new(format!("{} {}", r.name, format_thousands(r.value))))
                .collect(),
        ),
        Page::Categories => (
            "Categories",
            state
                .categories
                .nodes()
                .iter()
                .map(|n| {
                    let marker = if n.children.is_empty() { "" } else { " ▸" };
                    ListItem::new(format!("{}{marker}", n.name))
                })
                .collect(),
        ),
    };
    let mut list_state = ListState::default();
    list_state.select(Some(state.selected));
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_symbol(">> ")
        .highlight_style(Style::default().fg(Color::Red));
    f.render_stateful_widget(list, area, &mut list_state);
}

fn choice(label: &str, on: bool) -> Span<'static> {
    if on {
        Span::styled(format!("[{label}]"), ACTIVE)
    } else {
        Span::raw(format!(" {label} "))
    }
}

fn checkbox(label: &str, on: bool) -> String {
    format!("[{}] {label}", if on { "x" } else { " " })
}

fn control_lines(state: &AppState) -> Vec<Line<'static>> {
    if state.page == Page::Categories {
        let mut lines = vec![Line::from(state.categories.title().to_string())];
        if state.categories.can_go_back() {
            lines.push(Line::from("Backspace: 返回"));
        }
        return lines;
    }

    let display = state.regions.state();
    let mode = display.view_mode;
    let mut lines = vec![Line::from(vec![
        Span::raw("View: "),
        choice(ViewMode::Map.label(), mode == ViewMode::Map),
        choice(ViewMode::Bar.label(), mode == ViewMode::Bar),
    ])];

    match mode {
        ViewMode::Map => {
            let detail = display.boundary_detail;
            lines.push(Line::from(vec![
                Span::raw("Boundaries: "),
                choice(BoundaryDetail::Simple.label(), detail == BoundaryDetail::Simple),
                choice(BoundaryDetail::Detailed.label(), detail == BoundaryDetail::Detailed),
            ]));
            if display.zoomed_region().is_some() {
                lines.push(Line::styled("r: View Full Map", ACTIVE));
            }
        }
        ViewMode::Bar => {
            let filter = display.group_filter();
            for (i, group) in state.group_choices().iter().enumerate() {
                let on = if i == 0 { filter.is_empty() } else { filter.contains(group) };
                lines.push(Line::from(format!("{i} {}", checkbox(group, on))));
            }
        }
    }
    lines
}

fn draw_controls(f: &mut Frame, area: Rect, state: &AppState) {
    let controls = Paragraph::new(control_lines(state))
        .block(Block::default().borders(Borders::ALL).title("Controls"))
        .wrap(Wrap { trim: true });
    f.render_widget(controls, area);
}

fn details_text(state: &AppState) -> String {
    if let Some(status) = &state.status {
        return status.clone();
    }
    let tooltip = match state.page {
        Page::Districts => state.regions.engine().and_then(|e| e.tooltip()),
        Page::Categories => state.categories.engine().and_then(|e| e.tooltip()),
    };
    if let Some(tooltip) = tooltip {
        return tooltip;
    }
    match (state.page, state.regions.state().zoomed_region()) {
        (Page::Districts, Some(name)) => {
            let value = state.regions.table().get(name).map(|r| format_thousands(r.value));
            format!("{name}\n{}", value.unwrap_or_else(|| "-".to_string()))
        }
        (Page::Districts, None) => "Click a district to zoom in".to_string(),
        (Page::Categories, _) => "Click a category to see its programmes".to_string(),
    }
}

fn draw_details(f: &mut Frame, area: Rect, state: &AppState) {
    let details = Paragraph::new(details_text(state))
        .block(Block::default().borders(Borders::ALL).title("Details"))
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: true });
    f.render_widget(details, area);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help = Paragraph::new(AppState::HELP_TEXT)
        .block(Block::default().borders(Borders::ALL).title("Keys"))
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: true });
    f.render_widget(help, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExplorerConfig;
    use crossterm::event::KeyCode;
    use ratatui::{backend::TestBackend, Terminal};
    use std::fs;

    fn app(dir: &std::path::Path, columns: u16) -> AppState {
        let geo = crate::test_support::sample_geojson().to_string();
        fs::write(dir.join("geo_hk.json"), &geo).unwrap();
        fs::write(dir.join("geo_hk_simple.json"), &geo).unwrap();
        let config = ExplorerConfig { data_dir: dir.to_path_buf(), ..ExplorerConfig::default() };
        AppState::new(&config, columns, BoundaryDetail::Detailed).unwrap()
    }

    fn screen(state: &mut AppState, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| draw(f, state)).unwrap();
        terminal.backend().buffer().content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn wide_layout_shows_all_panels() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = app(dir.path(), 160);
        let out = screen(&mut state, 160, 40);
        assert!(out.contains("Districts"));
        assert!(out.contains("Controls"));
        assert!(out.contains("Keys"));
        assert!(out.contains("[Map]"));
        assert!(!out.contains("View Full Map"));
    }

    #[test]
    fn bar_view_lists_group_checkboxes() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = app(dir.path(), 160);
        state.handle_input(KeyCode::Char('b'));
        state.handle_input(KeyCode::Char('2'));
        let out = screen(&mut state, 160, 40);
        assert!(out.contains("[Bar]"));
        assert!(out.contains("[ ] All"));
        assert!(out.contains("[x] Kowloon"));
    }

    #[test]
    fn compact_layout_drops_help_panel() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = app(dir.path(), 80);
        assert!(state.is_compact());
        let out = screen(&mut state, 80, 40);
        assert!(out.contains("Details"));
        assert!(!out.contains("Keys"));
    }

    #[test]
    fn categories_page_offers_back_after_drill() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = app(dir.path(), 160);
        state.handle_input(KeyCode::Tab);
        let out = screen(&mut state, 160, 40);
        assert!(out.contains("Categories"));
        assert!(!out.contains("Backspace: 返回"));
        assert!(details_text(&state).starts_with("Click a category"));
        state.handle_input(KeyCode::Enter);
        let lines = control_lines(&state);
        assert_eq!(lines[0].to_string(), "劇場節目分佈");
        assert_eq!(lines[1].to_string(), "Backspace: 返回");
    }

    #[test]
    fn zoomed_region_fills_details_and_reset_control() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = app(dir.path(), 160);
        state.regions.toggle_region_zoom("Sha Tin");
        assert_eq!(details_text(&state), "Click a district to zoom in");
        // built-in table, sample shapes: "A" has a shape but no metric row
        state.regions.toggle_region_zoom("A");
        assert_eq!(details_text(&state), "A\n-");
        let lines = control_lines(&state);
        assert_eq!(lines.last().unwrap().to_string(), "r: View Full Map");
    }
}

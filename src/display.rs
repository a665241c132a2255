//! Display state of the region explorer and the pure derivations over it.

use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use crate::{
    boundary::BoundarySet,
    data::{BoundaryDetail, Region, RegionGroups},
};

/// Label that clears the group filter.
pub const ALL_GROUPS: &str = "All";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    Map,
    Bar,
}

impl ViewMode {
    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Map => "Map",
            ViewMode::Bar => "Bar",
        }
    }
}

/// Visibility of the value label shown on a zoomed region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LabelReveal {
    #[default]
    Hidden,
    PendingReveal,
    Revealed,
}

/// A pending reveal, armed for one zoom target.
#[derive(Clone, Debug, PartialEq)]
pub struct RevealTimer {
    target: String,
    deadline: Instant,
}

#[cfg(test)]
impl RevealTimer {
    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Outcome of a zoom toggle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoomChange {
    ZoomedIn,
    ZoomedOut,
    Ignored,
}

#[derive(Clone, Debug)]
pub struct DisplayState {
    pub view_mode: ViewMode,
    pub boundary_detail: BoundaryDetail,
    zoomed_region: Option<String>,
    /// Selected group labels in the order they were switched on.
    group_filter: Vec<String>,
    pub is_compact_layout: bool,
    label_reveal: LabelReveal,
    reveal_timer: Option<RevealTimer>,
    reveal_delay: Duration,
}

impl DisplayState {
    pub fn new(viewport_px: u32, breakpoint_px: u32, reveal_delay: Duration) -> Self {
        Self {
            view_mode: ViewMode::Map,
            boundary_detail: BoundaryDetail::Detailed,
            zoomed_region: None,
            group_filter: Vec::new(),
            is_compact_layout: is_compact(viewport_px, breakpoint_px),
            label_reveal: LabelReveal::Hidden,
            reveal_timer: None,
            reveal_delay,
        }
    }

    pub fn zoomed_region(&self) -> Option<&str> {
        self.zoomed_region.as_deref()
    }

    pub fn group_filter(&self) -> &[String] {
        &self.group_filter
    }

    pub fn label_reveal(&self) -> LabelReveal {
        self.label_reveal
    }

    #[cfg(test)]
    pub fn reveal_timer(&self) -> Option<&RevealTimer> {
        self.reveal_timer.as_ref()
    }

    /// Zooms into `name`, or out when it is already the zoom target.
    ///
    /// Names absent from `boundaries` leave the state untouched.
    pub fn toggle_region_zoom(&mut self, name: &str, boundaries: &BoundarySet, now: Instant) -> ZoomChange {
        if self.zoomed_region.as_deref() == Some(name) {
            self.clear_zoom();
            return ZoomChange::ZoomedOut;
        }
        if !boundaries.contains(name) {
            warn!(region = name, detail = boundaries.detail().label(), "zoom target has no boundary, ignoring");
            return ZoomChange::Ignored;
        }
        self.zoomed_region = Some(name.to_string());
        self.label_reveal = LabelReveal::PendingReveal;
        self.reveal_timer = Some(RevealTimer {
            target: name.to_string(),
            deadline: now + self.reveal_delay,
        });
        debug!(region = name, "zoomed in, label reveal armed");
        ZoomChange::ZoomedIn
    }

    /// Drops the zoom target and any pending reveal.
    pub fn clear_zoom(&mut self) -> bool {
        let was_zoomed = self.zoomed_region.take().is_some();
        self.reveal_timer = None;
        self.label_reveal = LabelReveal::Hidden;
        if was_zoomed {
            debug!("zoomed out");
        }
        was_zoomed
    }

    /// Fires the reveal timer once its deadline has passed. Returns true on a state change.
    pub fn poll_reveal(&mut self, now: Instant) -> bool {
        let Some(timer) = &self.reveal_timer else {
            return false;
        };
        let stale = self.zoomed_region.as_deref() != Some(timer.target.as_str());
        let due = now >= timer.deadline;
        if stale {
            self.reveal_timer = None;
            return false;
        }
        if !due {
            return false;
        }
        self.reveal_timer = None;
        self.label_reveal = LabelReveal::Revealed;
        debug!(region = ?self.zoomed_region, "label revealed");
        true
    }

    /// `"All"` clears the filter; any other label flips its membership.
    pub fn toggle_group_filter(&mut self, group: &str) {
        if group == ALL_GROUPS {
            self.group_filter.clear();
        } else if let Some(pos) = self.group_filter.iter().position(|g| g == group) {
            self.group_filter.remove(pos);
        } else {
            self.group_filter.push(group.to_string());
        }
    }

    /// Recomputes the compact flag. Returns true when it flipped.
    pub fn on_viewport_resize(&mut self, viewport_px: u32, breakpoint_px: u32) -> bool {
        let compact = is_compact(viewport_px, breakpoint_px);
        let changed = compact != self.is_compact_layout;
        self.is_compact_layout = compact;
        changed
    }

    /// Keeps the zoom target only if the new boundary set still has it.
    pub fn retain_zoom_in(&mut self, boundaries: &BoundarySet) {
        if let Some(name) = &self.zoomed_region {
            if !boundaries.contains(name) {
                warn!(region = %name, detail = boundaries.detail().label(), "zoom target missing after detail switch");
                self.clear_zoom();
            }
        }
    }
}

pub fn is_compact(viewport_px: u32, breakpoint_px: u32) -> bool {
    viewport_px < breakpoint_px
}

/// Regions of the selected groups, in the order of `regions`.
///
/// An empty filter, or one whose groups match nothing, yields every region.
pub fn filter_regions<'a>(regions: &'a [Region], groups: &RegionGroups, filter: &[String]) -> Vec<&'a Region> {
    if filter.is_empty() {
        return regions.iter().collect();
    }

    let allowed: HashSet<&str> = filter
        .iter()
        .filter_map(|g| groups.members(g))
        .flatten()
        .map(String::as_str)
        .collect();

    let filtered: Vec<&Region> = regions
        .iter()
        .filter(|r| allowed.contains(r.name.as_str()))
        .collect();
    if filtered.is_empty() {
        warn!(groups = ?filter, "group filter matched no regions, showing all");
        return regions.iter().collect();
    }
    filtered
}

/// Trailing-edge debounce: keeps the latest value until `quiet` has passed without a newer one.
#[derive(Debug)]
pub struct Debounce<T> {
    quiet: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debounce<T> {
    pub fn new(quiet: Duration) -> Self {
        Self { quiet, pending: None }
    }

    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    pub fn take_ready(&mut self, now: Instant) -> Option<T> {
        let ready = matches!(&self.pending, Some((_, at)) if now.duration_since(*at) >= self.quiet);
        if ready { self.pending.take().map(|(v, _)| v) } else { None }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

// Line-by-line layout of the sidebar. Rendering and mouse hit-testing both
// read rows from here and nowhere else.

use std::collections::BTreeMap;

use crate::config::SidebarConfig;
use crate::state::window::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarLine {
    Header,
    Blank,
    WorkspaceHeader(u32),
    /// Index into the window list
    WindowItem(usize),
    /// Spacer between two workspace sections
    Gap,
    /// Placeholder text when there are no windows, by line number
    EmptyState(usize),
    Footer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEntry {
    pub role: SidebarLine,
    /// First row, relative to the top of the sidebar
    pub start_y: i32,
    /// One past the last row
    pub end_y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarLayout {
    pub width: u16,
    pub lines: Vec<LineEntry>,
}

impl SidebarLayout {
    /// Total rows used by all entries
    pub fn line_count(&self) -> usize {
        self.lines.last().map_or(0, |l| l.end_y.max(0) as usize)
    }

    pub fn entry_at(&self, relative_y: i32) -> Option<&LineEntry> {
        self.lines
            .iter()
            .find(|l| relative_y >= l.start_y && relative_y < l.end_y)
    }

    /// Window index under a sidebar-relative row
    pub fn item_at(&self, relative_y: i32) -> Option<usize> {
        match self.entry_at(relative_y)?.role {
            SidebarLine::WindowItem(index) => Some(index),
            _ => None,
        }
    }

    /// Window indices in display order
    pub fn items(&self) -> impl Iterator<Item = usize> + '_ {
        self.lines.iter().filter_map(|l| match l.role {
            SidebarLine::WindowItem(index) => Some(index),
            _ => None,
        })
    }

    pub fn item_y(&self, index: usize) -> Option<i32> {
        self.lines
            .iter()
            .find(|l| l.role == SidebarLine::WindowItem(index))
            .map(|l| l.start_y)
    }

    pub fn workspace_y(&self, workspace: u32) -> Option<i32> {
        self.lines
            .iter()
            .find(|l| l.role == SidebarLine::WorkspaceHeader(workspace))
            .map(|l| l.start_y)
    }
}

/// `width_percent` of the viewport, clamped to `[min_width, max_width]`
pub fn sidebar_width(viewport_width: u16, config: &SidebarConfig) -> u16 {
    let width = (viewport_width as f64 * config.width_percent) as u16;
    width.clamp(config.min_width, config.max_width.max(config.min_width))
}

/// Lay out the sidebar for `windows`: header, one section per workspace in
/// ascending order (windows in list order), then the closing block.
pub fn build_sidebar_layout(windows: &[Window], viewport_width: u16, config: &SidebarConfig) -> SidebarLayout {
    let mut lines = Vec::new();
    let mut y = 0;
    let mut push = |role: SidebarLine| {
        lines.push(LineEntry {
            role,
            start_y: y,
            end_y: y + 1,
        });
        y += 1;
    };

    push(SidebarLine::Header);
    push(SidebarLine::Blank);

    let mut workspaces: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (index, window) in windows.iter().enumerate() {
        workspaces.entry(window.workspace).or_default().push(index);
    }

    let sections = workspaces.len();
    for (n, (workspace, indices)) in workspaces.into_iter().enumerate() {
        push(SidebarLine::WorkspaceHeader(workspace));
        for index in indices {
            push(SidebarLine::WindowItem(index));
        }
        if n + 1 < sections {
            push(SidebarLine::Gap);
        }
    }

    if windows.is_empty() {
        push(SidebarLine::EmptyState(0));
        push(SidebarLine::EmptyState(1));
    }
    push(SidebarLine::Blank);
    push(SidebarLine::Footer);

    SidebarLayout {
        width: sidebar_width(viewport_width, config),
        lines,
    }
}

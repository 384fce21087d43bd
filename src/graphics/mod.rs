//! Inline image passthrough.
//!
//! Graphics escapes found in window output never reach the cell canvas.
//! Instead each image becomes a [`Placement`] anchored to its window's
//! scrollback, and every frame the registry compares where each placement
//! should be against where it was last drawn. The differences turn into
//! protocol bytes, buffered and written to the terminal device in one go.
//!
//! [`Passthrough`] holds everything both protocols share; [`ImageProtocol`]
//! is the encoding seam implemented by [`kitty::Kitty`] and [`sixel::Sixel`].

pub mod kitty;
pub mod sixel;

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use self::kitty::Kitty;
use self::sixel::Sixel;
use crate::config::GraphicsConfig;
use crate::geometry::CellRect;
use crate::state::Os;
use crate::term::{GraphicsEvent, GraphicsSequence};

/// Per-window geometry handed to a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPositionInfo {
    pub window_x: i32,
    pub window_y: i32,
    pub content_offset_x: i32,
    pub content_offset_y: i32,
    pub width: u16,
    pub height: u16,
    pub visible: bool,
    pub scrollback_len: usize,
    /// Lines the window's terminal has discarded off the top of its history
    pub lines_dropped: u64,
    pub scroll_offset: usize,
    pub is_being_manipulated: bool,
    pub window_z: i32,
    pub is_alt_screen: bool,
}

impl WindowPositionInfo {
    pub fn bounds(&self) -> CellRect {
        CellRect::new(
            self.window_x,
            self.window_y,
            self.width as i32,
            self.height as i32,
        )
    }

    /// Inside of the border
    pub fn content_area(&self) -> CellRect {
        CellRect::new(
            self.window_x + self.content_offset_x,
            self.window_y + self.content_offset_y,
            self.width as i32 - 2 * self.content_offset_x,
            self.height as i32 - 2 * self.content_offset_y,
        )
    }
}

/// Everything a refresh may look at. Windows missing from `windows` count
/// as not visible.
#[derive(Debug, Clone, Default)]
pub struct GeometrySnapshot {
    /// Area windows are drawn into
    pub viewport: CellRect,
    pub windows: HashMap<String, WindowPositionInfo>,
    /// Chrome painted above every window (the sidebar)
    pub covered: Vec<CellRect>,
}

/// Where in its window's history an image was emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub col: u16,
    /// Absolute line: every line above the live screen at emission (dropped
    /// or still in history) plus the cursor row
    pub line: i64,
    pub alt_screen: bool,
}

impl Anchor {
    pub fn from_event(event: &GraphicsEvent) -> Self {
        Self {
            col: event.cursor.col,
            line: event.lines_dropped as i64
                + event.scrollback_len as i64
                + event.cursor.row as i64,
            alt_screen: event.alt_screen,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement<I> {
    pub image: I,
    pub anchor: Anchor,
    pub cols: u16,
    pub rows: u16,
    /// Screen rect it was last drawn at, `None` while hidden
    pub shown: Option<CellRect>,
    /// The host may have painted over `shown`; draw again even if unmoved
    pub stale: bool,
}

impl<I> Placement<I> {
    pub fn new(image: I, anchor: Anchor, cols: u16, rows: u16) -> Self {
        Self {
            image,
            anchor,
            cols,
            rows,
            shown: None,
            stale: false,
        }
    }

    /// Screen rect this placement should occupy, or `None` if it must not be drawn
    fn target(&self, window_id: &str, snapshot: &GeometrySnapshot) -> Option<CellRect> {
        let info = snapshot.windows.get(window_id)?;
        if !info.visible || info.is_being_manipulated || info.is_alt_screen != self.anchor.alt_screen {
            return None;
        }

        let content = info.content_area();
        let top_line =
            info.lines_dropped as i64 + info.scrollback_len as i64 - info.scroll_offset as i64;
        let row = self.anchor.line - top_line;
        let rect = CellRect::new(
            content.x + self.anchor.col as i32,
            content.y + i32::try_from(row).ok()?,
            self.cols as i32,
            self.rows as i32,
        );

        if !content.contains_rect(&rect) || !snapshot.viewport.contains_rect(&rect) {
            return None;
        }
        let occluded = snapshot.windows.iter().any(|(id, other)| {
            id != window_id && other.window_z > info.window_z && other.bounds().intersects(&rect)
        });
        if occluded || snapshot.covered.iter().any(|c| c.intersects(&rect)) {
            return None;
        }
        Some(rect)
    }
}

/// Protocol-specific encoding. Every method appends to `out` and never writes
/// to the terminal itself.
pub trait ImageProtocol {
    type Image: std::fmt::Debug;

    const NAME: &'static str;

    fn show(&mut self, image: &Self::Image, rect: CellRect, out: &mut Vec<u8>) -> io::Result<()>;

    fn hide(&mut self, image: &Self::Image, rect: CellRect, out: &mut Vec<u8>) -> io::Result<()>;

    fn relocate(
        &mut self,
        image: &Self::Image,
        from: CellRect,
        to: CellRect,
        out: &mut Vec<u8>,
    ) -> io::Result<()> {
        self.hide(image, from, out)?;
        self.show(image, to, out)
    }

    /// Release whatever the host keeps for a closed window
    fn forget_window(&mut self, _window_id: &str, _out: &mut Vec<u8>) -> io::Result<()> {
        Ok(())
    }

    /// Hiding leaves garbage the cell renderer does not know about
    fn hide_needs_repaint(&self) -> bool {
        false
    }
}

/// Placement registry plus pending output for one protocol
#[derive(Debug)]
pub struct Passthrough<P: ImageProtocol> {
    protocol: P,
    placements: HashMap<String, Vec<Placement<P::Image>>>,
    pending: Vec<u8>,
    repaint: bool,
}

impl<P: ImageProtocol> Passthrough<P> {
    pub fn new(protocol: P) -> Self {
        Self {
            protocol,
            placements: HashMap::new(),
            pending: Vec::new(),
            repaint: false,
        }
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    pub fn add_placement(&mut self, window_id: &str, placement: Placement<P::Image>) {
        debug!(
            protocol = P::NAME,
            window = %window_id,
            cols = placement.cols,
            rows = placement.rows,
            "new placement"
        );
        self.placements
            .entry(window_id.to_string())
            .or_default()
            .push(placement);
    }

    pub fn has_placements(&self) -> bool {
        self.placements.values().any(|list| !list.is_empty())
    }

    pub fn placement_count(&self) -> usize {
        self.placements.values().map(Vec::len).sum()
    }

    pub fn placements(&self, window_id: &str) -> &[Placement<P::Image>] {
        self.placements.get(window_id).map_or(&[], Vec::as_slice)
    }

    /// Drop the placements of `window_id` matching `pred`, hiding any on screen
    pub fn remove_placements(&mut self, window_id: &str, mut pred: impl FnMut(&Placement<P::Image>) -> bool) {
        let Self {
            protocol,
            placements,
            pending,
            repaint,
        } = self;
        let Some(list) = placements.get_mut(window_id) else {
            return;
        };
        list.retain(|placement| {
            if !pred(placement) {
                return true;
            }
            if let Some(rect) = placement.shown {
                hide(protocol, &placement.image, rect, pending, repaint);
            }
            false
        });
        if list.is_empty() {
            placements.remove(window_id);
        }
    }

    /// Tear down everything belonging to a closed window
    pub fn remove_window(&mut self, window_id: &str) {
        self.remove_placements(window_id, |_| true);
        if let Err(e) = self.protocol.forget_window(window_id, &mut self.pending) {
            warn!(protocol = P::NAME, "failed to encode cleanup: {e}");
        }
    }

    /// Force the window's placements to be drawn again on the next refresh
    pub fn mark_stale(&mut self, window_id: &str) {
        if let Some(list) = self.placements.get_mut(window_id) {
            for placement in list.iter_mut() {
                placement.stale = true;
            }
        }
    }

    /// Bring every placement in line with `snapshot`
    pub fn refresh(&mut self, snapshot: &GeometrySnapshot) {
        let Self {
            protocol,
            placements,
            pending,
            repaint,
        } = self;

        for (window_id, list) in placements.iter_mut() {
            let info = snapshot.windows.get(window_id);
            list.retain_mut(|placement| {
                // Its line left retained history, or its alternate screen is gone
                if let Some(info) = info {
                    let evicted = info.is_alt_screen == placement.anchor.alt_screen
                        && placement.anchor.line < info.lines_dropped as i64;
                    let alt_closed = placement.anchor.alt_screen && !info.is_alt_screen;
                    if evicted || alt_closed {
                        if let Some(rect) = placement.shown {
                            hide(protocol, &placement.image, rect, pending, repaint);
                        }
                        return false;
                    }
                }

                let target = placement.target(window_id, snapshot);
                let result = match (placement.shown, target) {
                    (None, Some(to)) => protocol.show(&placement.image, to, pending),
                    (Some(from), None) => {
                        hide(protocol, &placement.image, from, pending, repaint);
                        Ok(())
                    }
                    (Some(from), Some(to)) if from != to => {
                        if protocol.hide_needs_repaint() {
                            *repaint = true;
                        }
                        protocol.relocate(&placement.image, from, to, pending)
                    }
                    (Some(_), Some(to)) if placement.stale => {
                        protocol.show(&placement.image, to, pending)
                    }
                    _ => Ok(()),
                };
                if let Err(e) = result {
                    warn!(protocol = P::NAME, "failed to encode placement: {e}");
                }
                placement.shown = target;
                placement.stale = false;
                true
            });
        }
        placements.retain(|_, list| !list.is_empty());
    }

    /// Queue bytes that go out unchanged (image uploads)
    pub fn queue_raw(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    pub fn flush_pending(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }

    /// True once after something was hidden that the cell renderer must paint over
    pub fn take_repaint_request(&mut self) -> bool {
        std::mem::take(&mut self.repaint)
    }
}

fn hide<P: ImageProtocol>(
    protocol: &mut P,
    image: &P::Image,
    rect: CellRect,
    pending: &mut Vec<u8>,
    repaint: &mut bool,
) {
    if let Err(e) = protocol.hide(image, rect, pending) {
        warn!(protocol = P::NAME, "failed to encode hide: {e}");
    }
    if protocol.hide_needs_repaint() {
        *repaint = true;
    }
}

/// Write `bytes` to the terminal device in one call. Failures only cost the
/// images, so they are logged and dropped.
pub fn write_to_device(device: &Path, bytes: &[u8]) -> bool {
    let mut file = match OpenOptions::new().write(true).open(device) {
        Ok(file) => file,
        Err(e) => {
            debug!(device = %device.display(), "cannot open graphics device: {e}");
            return false;
        }
    };
    match file.write_all(bytes) {
        Ok(()) => true,
        Err(e) => {
            debug!(device = %device.display(), "graphics write failed: {e}");
            false
        }
    }
}

/// Refresh (when anything is placed), flush and write one protocol's output.
/// Returns the number of bytes handed to the device.
pub fn present<P: ImageProtocol>(
    passthrough: &mut Passthrough<P>,
    snapshot: impl FnOnce() -> GeometrySnapshot,
    device: &Path,
) -> usize {
    if passthrough.has_placements() {
        passthrough.refresh(&snapshot());
    }
    let bytes = passthrough.flush_pending();
    if bytes.is_empty() {
        return 0;
    }
    debug!(protocol = P::NAME, len = bytes.len(), "flushing graphics");
    if write_to_device(device, &bytes) {
        bytes.len()
    } else {
        0
    }
}

/// Both protocols behind one handle, each enabled by config
#[derive(Debug)]
pub struct GraphicsPassthrough {
    pub kitty: Option<Passthrough<Kitty>>,
    pub sixel: Option<Passthrough<Sixel>>,
    device: PathBuf,
}

impl GraphicsPassthrough {
    pub fn new(config: &GraphicsConfig) -> Self {
        Self {
            kitty: config
                .kitty
                .then(|| Passthrough::new(Kitty::new(config.cell_width_px, config.cell_height_px))),
            sixel: config
                .sixel
                .then(|| Passthrough::new(Sixel::new(config.cell_width_px, config.cell_height_px))),
            device: config.device.clone(),
        }
    }

    /// Route a graphics escape from `window_id`'s output. The returned bytes,
    /// if any, are a reply for the window's PTY.
    pub fn ingest(&mut self, window_id: &str, event: &GraphicsEvent) -> Option<Vec<u8>> {
        match &event.sequence {
            GraphicsSequence::Kitty(_) => self.kitty.as_mut()?.ingest(window_id, event),
            GraphicsSequence::Sixel(_) => {
                self.sixel.as_mut()?.ingest(window_id, event);
                None
            }
        }
    }

    pub fn remove_window(&mut self, window_id: &str) {
        if let Some(kitty) = self.kitty.as_mut() {
            kitty.remove_window(window_id);
        }
        if let Some(sixel) = self.sixel.as_mut() {
            sixel.remove_window(window_id);
        }
    }

    pub fn mark_stale(&mut self, window_id: &str) {
        if let Some(kitty) = self.kitty.as_mut() {
            kitty.mark_stale(window_id);
        }
        if let Some(sixel) = self.sixel.as_mut() {
            sixel.mark_stale(window_id);
        }
    }

    /// Present both protocols against the current state. Returns true when
    /// the caller must repaint the whole screen.
    pub fn present(&mut self, os: &Os) -> bool {
        let mut repaint = false;
        if let Some(kitty) = self.kitty.as_mut() {
            present(kitty, || os.graphics_snapshot(), &self.device);
        }
        if let Some(sixel) = self.sixel.as_mut() {
            present(sixel, || os.graphics_snapshot(), &self.device);
            repaint = sixel.take_repaint_request();
        }
        repaint
    }
}

impl Os {
    /// Geometry of every window in the current workspace that is not minimized
    pub fn graphics_snapshot(&self) -> GeometrySnapshot {
        let windows = self
            .windows
            .iter()
            .filter(|w| w.workspace == self.current_workspace && !w.minimized)
            .map(|w| {
                let info = WindowPositionInfo {
                    window_x: w.x,
                    window_y: w.y,
                    content_offset_x: 1,
                    content_offset_y: 1,
                    width: w.width,
                    height: w.height,
                    visible: true,
                    scrollback_len: w.scrollback_len(),
                    lines_dropped: w.lines_dropped(),
                    scroll_offset: w.scroll_offset,
                    is_being_manipulated: w.is_being_manipulated,
                    window_z: w.z,
                    is_alt_screen: w.is_alt_screen(),
                };
                (w.id.clone(), info)
            })
            .collect();

        let mut covered = Vec::new();
        if self.sidebar_visible {
            covered.push(CellRect::new(
                0,
                self.sidebar_origin_y() as i32,
                self.sidebar_width() as i32,
                self.usable_height() as i32,
            ));
        }

        GeometrySnapshot {
            viewport: CellRect::new(
                0,
                self.top_margin() as i32,
                self.render_width() as i32,
                self.usable_height() as i32,
            ),
            windows,
            covered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Protocol that records calls as text
    #[derive(Debug, Default)]
    struct Recorder {
        repaint_on_hide: bool,
    }

    impl ImageProtocol for Recorder {
        type Image = &'static str;

        const NAME: &'static str = "recorder";

        fn show(&mut self, image: &Self::Image, rect: CellRect, out: &mut Vec<u8>) -> io::Result<()> {
            write!(out, "show {image} {},{};", rect.x, rect.y)
        }

        fn hide(&mut self, image: &Self::Image, rect: CellRect, out: &mut Vec<u8>) -> io::Result<()> {
            write!(out, "hide {image} {},{};", rect.x, rect.y)
        }

        fn forget_window(&mut self, window_id: &str, out: &mut Vec<u8>) -> io::Result<()> {
            write!(out, "forget {window_id};")
        }

        fn hide_needs_repaint(&self) -> bool {
            self.repaint_on_hide
        }
    }

    fn info(x: i32, y: i32, z: i32) -> WindowPositionInfo {
        WindowPositionInfo {
            window_x: x,
            window_y: y,
            content_offset_x: 1,
            content_offset_y: 1,
            width: 30,
            height: 12,
            visible: true,
            scrollback_len: 0,
            lines_dropped: 0,
            scroll_offset: 0,
            is_being_manipulated: false,
            window_z: z,
            is_alt_screen: false,
        }
    }

    fn snapshot(windows: &[(&str, WindowPositionInfo)]) -> GeometrySnapshot {
        GeometrySnapshot {
            viewport: CellRect::new(0, 0, 100, 40),
            windows: windows.iter().map(|(id, i)| (id.to_string(), *i)).collect(),
            covered: Vec::new(),
        }
    }

    fn anchor(col: u16, line: i64) -> Anchor {
        Anchor {
            col,
            line,
            alt_screen: false,
        }
    }

    fn drain(p: &mut Passthrough<Recorder>) -> String {
        String::from_utf8(p.flush_pending()).unwrap()
    }

    #[test]
    fn test_image_follows_window() {
        let mut p = Passthrough::new(Recorder::default());
        p.add_placement("w", Placement::new("cat", anchor(2, 1), 4, 2));

        p.refresh(&snapshot(&[("w", info(10, 5, 1))]));
        assert_eq!(drain(&mut p), "show cat 13,7;");

        p.refresh(&snapshot(&[("w", info(10, 5, 1))]));
        assert_eq!(drain(&mut p), "");

        p.refresh(&snapshot(&[("w", info(20, 5, 1))]));
        assert_eq!(drain(&mut p), "hide cat 13,7;show cat 23,7;");
    }

    #[test]
    fn test_window_leaving_snapshot_emits_removal() {
        let mut p = Passthrough::new(Recorder::default());
        p.add_placement("w", Placement::new("cat", anchor(0, 0), 4, 2));
        p.refresh(&snapshot(&[("w", info(0, 0, 1))]));
        p.flush_pending();

        p.refresh(&snapshot(&[]));
        let out = p.flush_pending();
        assert!(!out.is_empty());
        assert_eq!(String::from_utf8(out).unwrap(), "hide cat 1,1;");
        assert!(p.has_placements(), "placement survives, window may come back");
    }

    #[test]
    fn test_hidden_while_manipulated_or_on_other_screen() {
        let mut p = Passthrough::new(Recorder::default());
        p.add_placement("w", Placement::new("cat", anchor(0, 0), 4, 2));

        let mut dragging = info(0, 0, 1);
        dragging.is_being_manipulated = true;
        p.refresh(&snapshot(&[("w", dragging)]));
        assert_eq!(drain(&mut p), "");

        let mut alt = info(0, 0, 1);
        alt.is_alt_screen = true;
        p.refresh(&snapshot(&[("w", alt)]));
        assert_eq!(drain(&mut p), "");

        p.refresh(&snapshot(&[("w", info(0, 0, 1))]));
        assert_eq!(drain(&mut p), "show cat 1,1;");
    }

    #[test]
    fn test_higher_window_occludes() {
        let mut p = Passthrough::new(Recorder::default());
        p.add_placement("w", Placement::new("cat", anchor(0, 0), 4, 2));

        p.refresh(&snapshot(&[("w", info(0, 0, 1)), ("top", info(3, 0, 2))]));
        assert_eq!(drain(&mut p), "");

        // Lower window on top of it does not count
        p.refresh(&snapshot(&[("w", info(0, 0, 2)), ("low", info(3, 0, 1))]));
        assert_eq!(drain(&mut p), "show cat 1,1;");
    }

    #[test]
    fn test_scrolling_moves_then_clips() {
        let mut p = Passthrough::new(Recorder::default());
        p.add_placement("w", Placement::new("cat", anchor(0, 3), 4, 2));

        let mut scrolled = info(0, 0, 1);
        scrolled.scrollback_len = 2;
        p.refresh(&snapshot(&[("w", scrolled)]));
        assert_eq!(drain(&mut p), "show cat 1,2;");

        // Scrolled up past the top of the content area
        scrolled.scrollback_len = 6;
        p.refresh(&snapshot(&[("w", scrolled)]));
        assert_eq!(drain(&mut p), "hide cat 1,2;");

        // Viewing history brings it back
        scrolled.scroll_offset = 4;
        p.refresh(&snapshot(&[("w", scrolled)]));
        assert_eq!(drain(&mut p), "show cat 1,2;");
    }

    #[test]
    fn test_cleared_history_destroys_placement() {
        let mut p = Passthrough::new(Recorder::default());
        p.add_placement("w", Placement::new("old", anchor(0, 2), 1, 1));
        p.add_placement("w", Placement::new("live", anchor(0, 6), 1, 1));

        let mut win = info(0, 0, 1);
        win.scrollback_len = 5;
        p.refresh(&snapshot(&[("w", win)]));
        assert_eq!(p.placement_count(), 2);

        // History cleared: the five lines above the screen are gone
        win.scrollback_len = 0;
        win.lines_dropped = 5;
        p.refresh(&snapshot(&[("w", win)]));
        assert_eq!(p.placement_count(), 1);
        assert_eq!(p.placements("w")[0].image, "live");
    }

    #[test]
    fn test_image_tracks_output_past_history_cap() {
        use crate::term::{PlainTerminal, TerminalView};

        fn view(term: &PlainTerminal) -> WindowPositionInfo {
            let mut win = info(0, 0, 1);
            win.scrollback_len = term.scrollback_len();
            win.lines_dropped = term.lines_dropped();
            win
        }

        let mut term = PlainTerminal::new(20, 5);
        for i in 0..2100 {
            term.feed(format!("{i}\r\n").as_bytes());
        }
        let events = term.feed(b"\x1b_Ga=T,f=100;AAAA\x1b\\");
        assert_eq!(events.len(), 1);

        let mut p = Passthrough::new(Recorder::default());
        p.add_placement("w", Placement::new("cat", Anchor::from_event(&events[0]), 1, 1));
        p.refresh(&snapshot(&[("w", view(&term))]));
        assert_eq!(drain(&mut p), "show cat 1,5;");

        // History is full, yet the image still scrolls with the text
        term.feed(b"a\r\nb\r\nc\r\n");
        p.refresh(&snapshot(&[("w", view(&term))]));
        assert_eq!(drain(&mut p), "hide cat 1,5;show cat 1,2;");

        term.feed(b"\r\n".repeat(10).as_slice());
        p.refresh(&snapshot(&[("w", view(&term))]));
        assert_eq!(drain(&mut p), "hide cat 1,2;");
        assert_eq!(p.placement_count(), 1, "still reachable in scrollback");

        term.feed(b"\r\n".repeat(2000).as_slice());
        p.refresh(&snapshot(&[("w", view(&term))]));
        assert!(!p.has_placements());
    }

    #[test]
    fn test_leaving_alt_screen_destroys_its_placements() {
        let mut p = Passthrough::new(Recorder::default());
        let mut on_alt = anchor(0, 0);
        on_alt.alt_screen = true;
        p.add_placement("w", Placement::new("vim", on_alt, 4, 2));
        p.add_placement("w", Placement::new("shell", anchor(0, 3), 4, 2));

        let mut alt = info(0, 0, 1);
        alt.is_alt_screen = true;
        p.refresh(&snapshot(&[("w", alt)]));
        assert_eq!(drain(&mut p), "show vim 1,1;");

        p.refresh(&snapshot(&[("w", info(0, 0, 1))]));
        assert_eq!(drain(&mut p), "hide vim 1,1;show shell 1,4;");
        assert_eq!(p.placement_count(), 1);
    }

    #[test]
    fn test_remove_window_hides_and_forgets() {
        let mut p = Passthrough::new(Recorder {
            repaint_on_hide: true,
        });
        p.add_placement("w", Placement::new("cat", anchor(0, 0), 4, 2));
        p.refresh(&snapshot(&[("w", info(0, 0, 1))]));
        p.flush_pending();

        p.remove_window("w");
        assert_eq!(drain(&mut p), "hide cat 1,1;forget w;");
        assert!(p.take_repaint_request());
        assert!(!p.take_repaint_request());
        assert!(!p.has_placements());
    }

    #[test]
    fn test_mark_stale_redraws_in_place() {
        let mut p = Passthrough::new(Recorder::default());
        p.add_placement("w", Placement::new("cat", anchor(0, 0), 4, 2));
        p.refresh(&snapshot(&[("w", info(0, 0, 1))]));
        p.flush_pending();

        p.mark_stale("w");
        p.refresh(&snapshot(&[("w", info(0, 0, 1))]));
        assert_eq!(drain(&mut p), "show cat 1,1;");

        p.refresh(&snapshot(&[("w", info(0, 0, 1))]));
        assert_eq!(drain(&mut p), "");
    }

    #[test]
    fn test_stale_placement_still_hides_when_target_lost() {
        let mut p = Passthrough::new(Recorder::default());
        p.add_placement("w", Placement::new("cat", anchor(0, 0), 4, 2));
        p.refresh(&snapshot(&[("w", info(0, 0, 1))]));
        p.flush_pending();

        // Output arrived while the window is being dragged
        p.mark_stale("w");
        let mut dragging = info(0, 0, 1);
        dragging.is_being_manipulated = true;
        p.refresh(&snapshot(&[("w", dragging)]));
        assert_eq!(drain(&mut p), "hide cat 1,1;");

        p.mark_stale("w");
        p.refresh(&snapshot(&[("w", info(5, 0, 1))]));
        assert_eq!(drain(&mut p), "show cat 6,1;");
    }

    #[test]
    fn test_present_skips_device_when_nothing_pending() {
        let mut p = Passthrough::new(Recorder::default());
        let written = present(&mut p, GeometrySnapshot::default, Path::new("/nonexistent/tty"));
        assert_eq!(written, 0);
    }

    #[test]
    fn test_present_swallows_device_errors() {
        let mut p = Passthrough::new(Recorder::default());
        p.queue_raw(b"payload");
        let written = present(&mut p, GeometrySnapshot::default, Path::new("/nonexistent/tty"));
        assert_eq!(written, 0);
        assert_eq!(drain(&mut p), "", "pending output is consumed even on failure");
    }

    #[test]
    fn test_snapshot_covers_current_workspace() {
        let mut os = Os::new(crate::config::Config::default(), 100, 30);
        let a = os.spawn_window("a");
        let b = os.spawn_window("b");
        os.current_workspace = 2;
        let other = os.spawn_window("other");
        os.current_workspace = 1;
        let index = os.index_of(&b).unwrap();
        os.minimize_window(index);

        let snap = os.graphics_snapshot();
        assert!(snap.windows.contains_key(&a));
        assert!(!snap.windows.contains_key(&b));
        assert!(!snap.windows.contains_key(&other));
        assert_eq!(snap.windows[&a].content_offset_x, 1);
        assert_eq!(snap.viewport, CellRect::new(0, 0, 100, 29));
        assert!(snap.covered.is_empty());
    }
}

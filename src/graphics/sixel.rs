// Sixel: DCS `ESC P <params> q <data> ESC \`. The host has no notion of a
// placement, so moving an image means erasing its cells and drawing the
// whole sequence again somewhere else.

use std::io::{self, Write};
use std::sync::Arc;

use crossterm::cursor::{MoveTo, RestorePosition, SavePosition};
use crossterm::queue;
use tracing::debug;

use super::{Anchor, ImageProtocol, Passthrough, Placement};
use crate::geometry::CellRect;
use crate::term::{GraphicsEvent, GraphicsSequence};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SixelImage {
    /// Full DCS sequence as the window emitted it
    pub data: Arc<[u8]>,
}

#[derive(Debug)]
pub struct Sixel {
    cell_width_px: u32,
    cell_height_px: u32,
}

/// Pixel size of a sixel image: raster attributes when present, else
/// measured from the sixel data itself
pub fn pixel_size(sequence: &[u8]) -> Option<(u32, u32)> {
    let body = sequence.strip_prefix(b"\x1bP")?;
    let q = body.iter().position(|&b| b == b'q')?;
    let data = body[q + 1..].strip_suffix(b"\x1b\\").unwrap_or(&body[q + 1..]);

    if let Some(raster) = data.strip_prefix(b"\"") {
        let params = numbers(raster);
        if let (Some(&w), Some(&h)) = (params.get(2), params.get(3)) {
            if w > 0 && h > 0 {
                return Some((w, h));
            }
        }
    }

    let mut width = 0u32;
    let mut x = 0u32;
    let mut bands = 1u32;
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'#' | b'"' => {
                i += 1;
                while i < data.len() && (data[i].is_ascii_digit() || data[i] == b';') {
                    i += 1;
                }
                continue;
            }
            b'!' => {
                i += 1;
                let start = i;
                while i < data.len() && data[i].is_ascii_digit() {
                    i += 1;
                }
                let count: u32 = std::str::from_utf8(&data[start..i])
                    .ok()
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(1);
                if i < data.len() && (b'?'..=b'~').contains(&data[i]) {
                    x = x.saturating_add(count);
                }
            }
            b'?'..=b'~' => x += 1,
            b'$' => {
                width = width.max(x);
                x = 0;
            }
            b'-' => {
                width = width.max(x);
                x = 0;
                bands += 1;
            }
            _ => {}
        }
        i += 1;
    }
    width = width.max(x);
    (width > 0).then_some((width, bands * 6))
}

/// Leading `;`-separated decimal numbers
fn numbers(bytes: &[u8]) -> Vec<u32> {
    let end = bytes
        .iter()
        .position(|b| !(b.is_ascii_digit() || *b == b';'))
        .unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end])
        .unwrap_or_default()
        .split(';')
        .map(|n| n.parse().unwrap_or(0))
        .collect()
}

impl Sixel {
    pub fn new(cell_width_px: u32, cell_height_px: u32) -> Self {
        Self {
            cell_width_px: cell_width_px.max(1),
            cell_height_px: cell_height_px.max(1),
        }
    }

    pub fn size_in_cells(&self, sequence: &[u8]) -> Option<(u16, u16)> {
        let (w, h) = pixel_size(sequence)?;
        let cols = w.div_ceil(self.cell_width_px).clamp(1, u16::MAX as u32) as u16;
        let rows = h.div_ceil(self.cell_height_px).clamp(1, u16::MAX as u32) as u16;
        Some((cols, rows))
    }
}

impl ImageProtocol for Sixel {
    type Image = SixelImage;

    const NAME: &'static str = "sixel";

    fn show(&mut self, image: &SixelImage, rect: CellRect, out: &mut Vec<u8>) -> io::Result<()> {
        queue!(out, SavePosition, MoveTo(rect.x as u16, rect.y as u16))?;
        out.write_all(&image.data)?;
        queue!(out, RestorePosition)
    }

    /// Blank the cells the image covered
    fn hide(&mut self, _image: &SixelImage, rect: CellRect, out: &mut Vec<u8>) -> io::Result<()> {
        queue!(out, SavePosition)?;
        for row in 0..rect.height {
            queue!(out, MoveTo(rect.x as u16, (rect.y + row) as u16))?;
            write!(out, "\x1b[{}X", rect.width)?;
        }
        queue!(out, RestorePosition)
    }

    fn hide_needs_repaint(&self) -> bool {
        true
    }
}

impl Passthrough<Sixel> {
    /// Register a sixel image drawn by `window_id`. A new image at the same
    /// spot replaces the old one.
    pub fn ingest(&mut self, window_id: &str, event: &GraphicsEvent) {
        let GraphicsSequence::Sixel(sequence) = &event.sequence else {
            return;
        };
        let Some((cols, rows)) = self.protocol.size_in_cells(sequence) else {
            debug!(window = %window_id, "sixel image without pixels, ignored");
            return;
        };
        let anchor = Anchor::from_event(event);
        self.remove_placements(window_id, |p| {
            p.anchor.col == anchor.col
                && p.anchor.line == anchor.line
                && p.anchor.alt_screen == anchor.alt_screen
        });
        let image = SixelImage {
            data: Arc::from(sequence.as_slice()),
        };
        self.add_placement(window_id, Placement::new(image, anchor, cols, rows));
    }
}

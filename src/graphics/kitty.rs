// Kitty graphics protocol: APC `ESC _ G <controls> ; <payload> ESC \`.
//
// Uploads are forwarded to the host with remapped ids and replies suppressed;
// placements are re-issued by the registry wherever the window puts them.

use std::collections::HashMap;
use std::io::{self, Write};

use base64::{engine::general_purpose, Engine as _};
use crossterm::cursor::{MoveTo, RestorePosition, SavePosition};
use crossterm::queue;
use tracing::debug;

use super::{Anchor, ImageProtocol, Passthrough, Placement};
use crate::geometry::CellRect;
use crate::term::{GraphicsEvent, GraphicsSequence};

const APC_PREFIX: &[u8] = b"\x1b_G";
const ST: &[u8] = b"\x1b\\";

/// Keys that describe the uploaded data and survive into the forwarded upload
const TRANSMIT_KEYS: &[&str] = &["f", "t", "s", "v", "S", "O", "o"];

/// Parsed control data of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    controls: Vec<(String, String)>,
    payload: Vec<u8>,
}

impl Command {
    /// Parse a complete APC sequence
    pub fn parse(sequence: &[u8]) -> Option<Self> {
        let body = sequence.strip_prefix(APC_PREFIX)?;
        let body = body.strip_suffix(ST).unwrap_or(body);
        let (control_part, payload) = match body.iter().position(|&b| b == b';') {
            Some(pos) => (&body[..pos], &body[pos + 1..]),
            None => (body, &[][..]),
        };
        let control_str = std::str::from_utf8(control_part).ok()?;

        let controls = control_str
            .split(',')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let mut parts = pair.splitn(2, '=');
                let key = parts.next().unwrap_or_default().to_string();
                let value = parts.next().unwrap_or_default().to_string();
                (key, value)
            })
            .collect();

        Some(Self {
            controls,
            payload: payload.to_vec(),
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.controls
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn action(&self) -> char {
        self.get("a").and_then(|a| a.chars().next()).unwrap_or('t')
    }

    /// 0 = all replies, 1 = errors only, 2 = none
    pub fn quiet(&self) -> u32 {
        self.get_u32("q").unwrap_or(0)
    }

    pub fn more_chunks(&self) -> bool {
        self.get("m") == Some("1")
    }
}

/// An image as it exists on the host terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KittyImage {
    pub host_id: u32,
    pub placement_id: u32,
}

/// A chunked upload still waiting for its last chunk
#[derive(Debug)]
struct Upload {
    first: Command,
    anchor: Anchor,
    host_id: u32,
    client_id: Option<u32>,
    chunks: Vec<Vec<u8>>,
}

#[derive(Debug)]
pub struct Kitty {
    cell_width_px: u32,
    cell_height_px: u32,
    next_host_id: u32,
    next_placement_id: u32,
    /// (window id, client image id) -> host image id
    ids: HashMap<(String, u32), u32>,
    /// Host image id -> size in cells
    sizes: HashMap<u32, (u16, u16)>,
    uploads: HashMap<String, Upload>,
}

impl Kitty {
    pub fn new(cell_width_px: u32, cell_height_px: u32) -> Self {
        Self {
            cell_width_px: cell_width_px.max(1),
            cell_height_px: cell_height_px.max(1),
            next_host_id: 1,
            next_placement_id: 1,
            ids: HashMap::new(),
            sizes: HashMap::new(),
            uploads: HashMap::new(),
        }
    }

    /// Host id for an upload. Re-sending a known client id replaces that image.
    fn allocate_host_id(&mut self, window_id: &str, client_id: Option<u32>) -> u32 {
        if let Some(host_id) = client_id.and_then(|id| self.host_id(window_id, id)) {
            return host_id;
        }
        let host_id = self.next_host_id;
        self.next_host_id = self.next_host_id.wrapping_add(1).max(1);
        if let Some(client_id) = client_id {
            self.ids.insert((window_id.to_string(), client_id), host_id);
        }
        host_id
    }

    fn allocate_placement_id(&mut self) -> u32 {
        let id = self.next_placement_id;
        self.next_placement_id = self.next_placement_id.wrapping_add(1).max(1);
        id
    }

    pub fn host_id(&self, window_id: &str, client_id: u32) -> Option<u32> {
        self.ids.get(&(window_id.to_string(), client_id)).copied()
    }

    fn px_to_cells(px: u32, cell: u32) -> u16 {
        px.div_ceil(cell).clamp(1, u16::MAX as u32) as u16
    }

    /// Size in cells from `c`/`r`, then `s`/`v` pixels, then the PNG header
    fn size_in_cells(&self, command: &Command, first_chunk: &[u8]) -> Option<(u16, u16)> {
        if let (Some(c), Some(r)) = (command.get_u32("c"), command.get_u32("r")) {
            return Some((c.clamp(1, u16::MAX as u32) as u16, r.clamp(1, u16::MAX as u32) as u16));
        }
        let (w, h) = match (command.get_u32("s"), command.get_u32("v")) {
            (Some(w), Some(h)) => (w, h),
            _ => png_dimensions(first_chunk)?,
        };
        Some((
            Self::px_to_cells(w, self.cell_width_px),
            Self::px_to_cells(h, self.cell_height_px),
        ))
    }
}

/// Width and height from the IHDR chunk of a base64 PNG
fn png_dimensions(base64_payload: &[u8]) -> Option<(u32, u32)> {
    // 24 bytes of signature + IHDR header are 32 base64 characters
    let head = base64_payload.get(..32)?;
    let bytes = general_purpose::STANDARD.decode(head).ok()?;
    if bytes.get(..8)? != b"\x89PNG\r\n\x1a\n" || bytes.get(12..16)? != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes.get(16..20)?.try_into().ok()?);
    let height = u32::from_be_bytes(bytes.get(20..24)?.try_into().ok()?);
    Some((width, height))
}

fn reply(client_id: u32, message: &str) -> Vec<u8> {
    format!("\x1b_Gi={client_id};{message}\x1b\\").into_bytes()
}

fn ok_reply(command: &Command, client_id: Option<u32>) -> Option<Vec<u8>> {
    match client_id {
        Some(id) if command.quiet() == 0 => Some(reply(id, "OK")),
        _ => None,
    }
}

fn error_reply(command: &Command, client_id: u32, message: &str) -> Option<Vec<u8>> {
    (command.quiet() < 2).then(|| reply(client_id, message))
}

impl ImageProtocol for Kitty {
    type Image = KittyImage;

    const NAME: &'static str = "kitty";

    fn show(&mut self, image: &KittyImage, rect: CellRect, out: &mut Vec<u8>) -> io::Result<()> {
        queue!(out, SavePosition, MoveTo(rect.x as u16, rect.y as u16))?;
        write!(
            out,
            "\x1b_Ga=p,i={},p={},c={},r={},C=1,q=2\x1b\\",
            image.host_id, image.placement_id, rect.width, rect.height
        )?;
        queue!(out, RestorePosition)
    }

    fn hide(&mut self, image: &KittyImage, _rect: CellRect, out: &mut Vec<u8>) -> io::Result<()> {
        write!(
            out,
            "\x1b_Ga=d,d=i,i={},p={},q=2\x1b\\",
            image.host_id, image.placement_id
        )
    }

    /// Re-putting an existing placement id moves it
    fn relocate(&mut self, image: &KittyImage, _from: CellRect, to: CellRect, out: &mut Vec<u8>) -> io::Result<()> {
        self.show(image, to, out)
    }

    fn forget_window(&mut self, window_id: &str, out: &mut Vec<u8>) -> io::Result<()> {
        self.uploads.remove(window_id);
        let mut host_ids = Vec::new();
        self.ids.retain(|(owner, _), host_id| {
            if owner == window_id {
                host_ids.push(*host_id);
                false
            } else {
                true
            }
        });
        host_ids.sort_unstable();
        for host_id in host_ids {
            self.sizes.remove(&host_id);
            write!(out, "\x1b_Ga=d,d=I,i={host_id},q=2\x1b\\")?;
        }
        Ok(())
    }
}

impl Passthrough<Kitty> {
    /// Handle one Kitty command from `window_id`. Returns the reply the
    /// client expects, if any.
    pub fn ingest(&mut self, window_id: &str, event: &GraphicsEvent) -> Option<Vec<u8>> {
        let GraphicsSequence::Kitty(sequence) = &event.sequence else {
            return None;
        };
        let command = Command::parse(sequence)?;

        // Continuation chunks carry only `m` (and maybe `q`)
        if self.protocol.uploads.contains_key(window_id) {
            return self.continue_upload(window_id, command);
        }

        match command.action() {
            't' | 'T' => self.start_upload(window_id, command, Anchor::from_event(event)),
            'p' => self.put(window_id, &command, Anchor::from_event(event)),
            'd' => {
                self.delete(window_id, &command);
                None
            }
            'q' => {
                let id = command.get_u32("i")?;
                ok_reply(&command, Some(id))
            }
            other => {
                debug!(window = %window_id, action = %other, "ignoring kitty action");
                None
            }
        }
    }

    fn start_upload(&mut self, window_id: &str, command: Command, anchor: Anchor) -> Option<Vec<u8>> {
        let client_id = command.get_u32("i");
        let host_id = self.protocol.allocate_host_id(window_id, client_id);
        let upload = Upload {
            chunks: vec![command.payload.clone()],
            first: command,
            anchor,
            host_id,
            client_id,
        };
        if upload.first.more_chunks() {
            self.protocol.uploads.insert(window_id.to_string(), upload);
            None
        } else {
            self.finish_upload(window_id, upload)
        }
    }

    fn continue_upload(&mut self, window_id: &str, command: Command) -> Option<Vec<u8>> {
        let more = command.more_chunks();
        let upload = self.protocol.uploads.get_mut(window_id)?;
        upload.chunks.push(command.payload);
        if more {
            return None;
        }
        let upload = self.protocol.uploads.remove(window_id)?;
        self.finish_upload(window_id, upload)
    }

    /// Forward a complete upload in one piece and place it for `a=T`
    fn finish_upload(&mut self, window_id: &str, upload: Upload) -> Option<Vec<u8>> {
        let Upload {
            first,
            anchor,
            host_id,
            client_id,
            chunks,
        } = upload;

        let mut keys = format!("a=t,i={host_id},q=2");
        for (key, value) in &first.controls {
            if TRANSMIT_KEYS.contains(&key.as_str()) {
                keys.push_str(&format!(",{key}={value}"));
            }
        }
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            let more = u8::from(i < last);
            let head = if i == 0 {
                format!("\x1b_G{keys},m={more};")
            } else {
                format!("\x1b_Gm={more};")
            };
            self.queue_raw(head.as_bytes());
            self.queue_raw(chunk);
            self.queue_raw(ST);
        }

        let first_chunk = chunks.first().map_or(&[][..], Vec::as_slice);
        let size = self.protocol.size_in_cells(&first, first_chunk);
        if let Some(size) = size {
            self.protocol.sizes.insert(host_id, size);
        }

        if first.action() == 'T' {
            match size {
                Some((cols, rows)) => {
                    let image = KittyImage {
                        host_id,
                        placement_id: self.protocol.allocate_placement_id(),
                    };
                    self.add_placement(window_id, Placement::new(image, anchor, cols, rows));
                }
                None => debug!(window = %window_id, "kitty image without a size, not placed"),
            }
        }
        ok_reply(&first, client_id)
    }

    fn put(&mut self, window_id: &str, command: &Command, anchor: Anchor) -> Option<Vec<u8>> {
        let client_id = command.get_u32("i")?;
        let Some(host_id) = self.protocol.host_id(window_id, client_id) else {
            return error_reply(command, client_id, "ENOENT:image not found");
        };
        let size = match (command.get_u32("c"), command.get_u32("r")) {
            (Some(c), Some(r)) => Some((c.clamp(1, u16::MAX as u32) as u16, r.clamp(1, u16::MAX as u32) as u16)),
            _ => self.protocol.sizes.get(&host_id).copied(),
        };
        let Some((cols, rows)) = size else {
            return error_reply(command, client_id, "EINVAL:unknown image size");
        };
        let image = KittyImage {
            host_id,
            placement_id: self.protocol.allocate_placement_id(),
        };
        self.add_placement(window_id, Placement::new(image, anchor, cols, rows));
        ok_reply(command, Some(client_id))
    }

    fn delete(&mut self, window_id: &str, command: &Command) {
        let target = command.get("d").and_then(|d| d.chars().next()).unwrap_or('a');
        let free_data = target.is_ascii_uppercase();
        match target.to_ascii_lowercase() {
            'a' => {
                self.remove_placements(window_id, |_| true);
                if free_data {
                    let mut cleanup = Vec::new();
                    if self.protocol.forget_window(window_id, &mut cleanup).is_ok() {
                        self.queue_raw(&cleanup);
                    }
                }
            }
            'i' => {
                let Some(client_id) = command.get_u32("i") else {
                    return;
                };
                let Some(host_id) = self.protocol.host_id(window_id, client_id) else {
                    return;
                };
                self.remove_placements(window_id, |p| p.image.host_id == host_id);
                if free_data {
                    self.protocol.ids.remove(&(window_id.to_string(), client_id));
                    self.protocol.sizes.remove(&host_id);
                    self.queue_raw(format!("\x1b_Ga=d,d=I,i={host_id},q=2\x1b\\").as_bytes());
                }
            }
            other => debug!(window = %window_id, target = %other, "unsupported kitty delete target"),
        }
    }
}

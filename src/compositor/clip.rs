// Clip a rendered window box to the viewport

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;

/// Visible part of a window box and where it lands on the canvas
#[derive(Debug, Clone, PartialEq)]
pub struct Clipped {
    pub content: Buffer,
    pub x: i32,
    pub y: i32,
}

/// Trim `content` (drawn with its top-left at `x`, `y`) to a viewport of
/// `viewport_width` x `viewport_height` cells anchored at the origin.
///
/// Rows/columns hanging above or left of the viewport are dropped and the
/// origin moves to 0 on that axis; overhang below or right is cut off.
/// Content wholly outside the viewport comes back empty.
pub fn clip_window_content(
    content: &Buffer,
    x: i32,
    y: i32,
    viewport_width: u16,
    viewport_height: u16,
) -> Clipped {
    let width = content.area.width as i32;
    let height = content.area.height as i32;

    let skip_cols = (-x).max(0);
    let skip_rows = (-y).max(0);
    let final_x = x.max(0);
    let final_y = y.max(0);

    let visible_width = (width - skip_cols).min(viewport_width as i32 - final_x);
    let visible_height = (height - skip_rows).min(viewport_height as i32 - final_y);

    if visible_width <= 0 || visible_height <= 0 {
        return Clipped {
            content: Buffer::empty(Rect::default()),
            x: final_x,
            y: final_y,
        };
    }

    // Fast path: nothing to trim
    if skip_cols == 0 && skip_rows == 0 && visible_width == width && visible_height == height {
        return Clipped {
            content: content.clone(),
            x: final_x,
            y: final_y,
        };
    }

    let mut clipped = Buffer::empty(Rect::new(0, 0, visible_width as u16, visible_height as u16));
    let origin_x = content.area.x;
    let origin_y = content.area.y;
    for row in 0..visible_height as u16 {
        for col in 0..visible_width as u16 {
            let src = (
                origin_x + skip_cols as u16 + col,
                origin_y + skip_rows as u16 + row,
            );
            clipped[(col, row)] = content[src].clone();
        }
    }

    Clipped {
        content: clipped,
        x: final_x,
        y: final_y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Box whose cells spell their own coordinates as `"{col}{row}"`
    fn labelled(width: u16, height: u16) -> Buffer {
        let mut buf = Buffer::empty(Rect::new(0, 0, width, height));
        for y in 0..height {
            for x in 0..width {
                buf[(x, y)].set_symbol(&format!("{x}{y}"));
            }
        }
        buf
    }

    #[test]
    fn test_fully_inside_is_untouched() {
        let content = labelled(4, 3);
        let clipped = clip_window_content(&content, 2, 1, 80, 24);
        assert_eq!(clipped.content, content);
        assert_eq!((clipped.x, clipped.y), (2, 1));
    }

    #[test]
    fn test_top_left_overhang_trims_leading() {
        let content = labelled(5, 4);
        let clipped = clip_window_content(&content, -2, -1, 80, 24);

        assert_eq!((clipped.x, clipped.y), (0, 0));
        assert_eq!(clipped.content.area, Rect::new(0, 0, 3, 3));
        assert_eq!(clipped.content[(0, 0)].symbol(), "21");
        assert_eq!(clipped.content[(2, 2)].symbol(), "43");
    }

    #[test]
    fn test_bottom_right_overhang_trims_trailing() {
        let content = labelled(5, 4);
        let clipped = clip_window_content(&content, 8, 21, 10, 23);

        assert_eq!((clipped.x, clipped.y), (8, 21));
        assert_eq!(clipped.content.area, Rect::new(0, 0, 2, 2));
        assert_eq!(clipped.content[(1, 1)].symbol(), "11");
    }

    #[test]
    fn test_outside_or_empty_yields_empty() {
        let content = labelled(5, 4);
        assert!(clip_window_content(&content, 100, 0, 80, 24).content.area.is_empty());
        assert!(clip_window_content(&content, -10, 0, 80, 24).content.area.is_empty());
        assert!(clip_window_content(&content, 0, 30, 80, 24).content.area.is_empty());

        let empty = Buffer::empty(Rect::default());
        assert!(clip_window_content(&empty, 0, 0, 80, 24).content.area.is_empty());
    }
}

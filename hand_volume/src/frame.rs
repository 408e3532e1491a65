//! Owned pixel buffer plus the software drawing primitives the overlay
//! needs. One `Frame` lives for exactly one loop iteration: the capture
//! source produces it, the detector and the loop annotate it in place, the
//! visualizer presents it, and it is dropped.

use pinch_scale::Point;

/// A mutable ARGB (0xAARRGGBB) pixel buffer.
pub struct Frame {
    pub pixels: Vec<u32>,
    pub width:  usize,
    pub height: usize,
}

impl Frame {
    /// A frame cleared to `color`.
    pub fn filled(width: usize, height: usize, color: u32) -> Self {
        Frame { pixels: vec![color; width * height], width, height }
    }

    /// Wrap an existing pixel buffer. `pixels.len()` must equal
    /// `width * height`.
    pub fn from_pixels(pixels: Vec<u32>, width: usize, height: usize) -> Self {
        debug_assert_eq!(pixels.len(), width * height);
        Frame { pixels, width, height }
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            self.pixels[y as usize * self.width + x as usize] = color;
        }
    }

    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y + h).min(self.height) {
            for col in x..(x + w).min(self.width) {
                self.pixels[row * self.width + col] = color;
            }
        }
    }

    /// Filled disc centred on `center`.
    pub fn circle_filled(&mut self, center: Point, radius: i32, color: u32) {
        let (cx, cy) = (center.x.round() as i32, center.y.round() as i32);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.set_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    /// Straight segment from `a` to `b`. Each Bresenham step stamps a
    /// `thickness`-square block centred on the step, so diagonals stay
    /// solid and the stroke straddles the segment instead of hanging off
    /// one side.
    pub fn line(&mut self, a: Point, b: Point, thickness: i32, color: u32) {
        let (mut x0, mut y0) = (a.x.round() as i32, a.y.round() as i32);
        let (x1, y1) = (b.x.round() as i32, b.y.round() as i32);

        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        let t = thickness.max(1);
        let off = t / 2; // centre the stamp

        loop {
            for ty in 0..t {
                for tx in 0..t {
                    self.set_pixel(x0 + tx - off, y0 + ty - off, color);
                }
            }
            if x0 == x1 && y0 == y1 { break; }
            let e2 = 2 * err;
            if e2 >= dy { err += dy; x0 += sx; }
            if e2 <= dx { err += dx; y0 += sy; }
        }
    }

    /// Bitmap-font text at integer `scale` (1 = 3×5 px glyphs).
    pub fn draw_label(&mut self, text: &str, x: usize, y: usize, scale: usize, color: u32) {
        let scale = scale.max(1);
        let mut cx = x;
        for ch in text.chars() {
            let glyph = char_glyph(ch);
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..3usize {
                    if bits & (1 << (2 - col)) != 0 {
                        self.fill_rect(
                            cx + col * scale,
                            y + row * scale,
                            scale, scale,
                            color,
                        );
                    }
                }
            }
            cx += 4 * scale; // 3 wide + 1 gap
            if cx + 4 * scale > self.width { break; }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

fn char_glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'a' | 'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'b' | 'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' | 'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'd' | 'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' | 'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'f' | 'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'g' | 'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'h' | 'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' | 'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' | 'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'k' | 'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' | 'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' | 'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'n' | 'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'o' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'p' | 'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'q' | 'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'r' | 'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' | 'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        't' | 'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' | 'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' | 'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        'w' | 'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'x' | 'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' | 'Y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'z' | 'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _   => [0b000, 0b000, 0b010, 0b000, 0b000], // fallback dot
    }
}

/// Alpha-blend two ARGB colors. `t` = 0.0 → all `a`, `t` = 1.0 → all `b`.
pub fn blend(a: u32, b: u32, t: f32) -> u32 {
    let t = t.clamp(0.0, 1.0);
    let lerp = |ca: u32, cb: u32| (ca as f32 * (1.0 - t) + cb as f32 * t) as u32;
    let ar = (a >> 16) & 0xFF; let br = (b >> 16) & 0xFF;
    let ag = (a >>  8) & 0xFF; let bg = (b >>  8) & 0xFF;
    let ab =  a        & 0xFF; let bb =  b        & 0xFF;
    0xFF000000 | (lerp(ar, br) << 16) | (lerp(ag, bg) << 8) | lerp(ab, bb)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const INK: u32 = 0xFFFF00FF;
    const BG:  u32 = 0xFF000000;

    fn canvas() -> Frame {
        Frame::filled(64, 48, BG)
    }

    #[test]
    fn set_pixel_out_of_range_is_ignored() {
        let mut f = canvas();
        f.set_pixel(-1, 10, INK);
        f.set_pixel(10, -1, INK);
        f.set_pixel(64, 10, INK);
        f.set_pixel(10, 48, INK);
        assert!(f.pixels.iter().all(|&p| p == BG));
    }

    #[test]
    fn fill_rect_clamps_to_frame() {
        let mut f = canvas();
        f.fill_rect(60, 44, 100, 100, INK);
        assert_eq!(f.pixels[47 * 64 + 63], INK);
        assert_eq!(f.pixels[0], BG);
    }

    #[test]
    fn circle_paints_centre_and_respects_radius() {
        let mut f = canvas();
        f.circle_filled(Point::new(32.0, 24.0), 5, INK);
        assert_eq!(f.pixels[24 * 64 + 32], INK);
        assert_eq!(f.pixels[24 * 64 + 37], INK);      // on the radius
        assert_eq!(f.pixels[24 * 64 + 38], BG);       // just outside
    }

    #[test]
    fn circle_near_edge_does_not_panic() {
        let mut f = canvas();
        f.circle_filled(Point::new(1.0, 1.0), 10, INK);
        assert_eq!(f.pixels[0], INK);
    }

    #[test]
    fn line_covers_both_endpoints() {
        let mut f = canvas();
        f.line(Point::new(3.0, 4.0), Point::new(40.0, 30.0), 1, INK);
        assert_eq!(f.pixels[4 * 64 + 3], INK);
        assert_eq!(f.pixels[30 * 64 + 40], INK);
    }

    #[test]
    fn line_handles_single_point() {
        let mut f = canvas();
        f.line(Point::new(5.0, 5.0), Point::new(5.0, 5.0), 2, INK);
        assert_eq!(f.pixels[5 * 64 + 5], INK);
    }

    #[test]
    fn thick_line_straddles_the_segment() {
        let mut f = canvas();
        f.line(Point::new(5.0, 6.0), Point::new(20.0, 6.0), 2, INK);
        assert_eq!(f.pixels[5 * 64 + 12], INK);   // row above the segment
        assert_eq!(f.pixels[6 * 64 + 12], INK);   // the segment row
        assert_eq!(f.pixels[7 * 64 + 12], BG);    // not dragged below
    }

    #[test]
    fn label_marks_pixels_at_origin() {
        let mut f = canvas();
        f.draw_label("8", 0, 0, 1, INK);
        // '8' lights its full top row.
        assert_eq!(f.pixels[0], INK);
        assert_eq!(f.pixels[1], INK);
        assert_eq!(f.pixels[2], INK);
    }

    #[test]
    fn label_scale_doubles_footprint() {
        let mut f = canvas();
        f.draw_label("1", 0, 0, 2, INK);
        let marked = f.pixels.iter().filter(|&&p| p == INK).count();

        let mut g = canvas();
        g.draw_label("1", 0, 0, 1, INK);
        let base = g.pixels.iter().filter(|&&p| p == INK).count();

        assert_eq!(marked, base * 4);
    }

    #[test]
    fn blend_endpoints() {
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 0.0) & 0xFFFFFF, 0x000000);
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 1.0) & 0xFFFFFF, 0xFFFFFF);
    }
}

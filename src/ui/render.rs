// Software rendering primitives for the softbuffer framebuffer
// (u32 per pixel, 0x00RRGGBB).

pub type Rgba = (u8, u8, u8, u8);

pub const BG_COLOR: [u8; 3] = [18, 18, 20];
pub const WHITE: Rgba = (255, 255, 255, 255);

/// Glyph cell advance, in font pixels: 5 columns plus 1 spacing.
const GLYPH_ADVANCE: u32 = 6;
const GLYPH_HEIGHT: u32 = 7;

// 5x7 bitmap font for ASCII 32..=127, five column bytes per glyph
// (LSB = top row), four glyphs per line.
static FONT_5X7: [u8; 96 * 5] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x5F, 0x00, 0x00, 0x00, 0x07, 0x00, 0x07, 0x00, 0x14, 0x7F, 0x14, 0x7F, 0x14,
    0x24, 0x2A, 0x7F, 0x2A, 0x12, 0x23, 0x13, 0x08, 0x64, 0x62, 0x36, 0x49, 0x55, 0x22, 0x50, 0x00, 0x05, 0x03, 0x00, 0x00,
    0x00, 0x1C, 0x22, 0x41, 0x00, 0x00, 0x41, 0x22, 0x1C, 0x00, 0x14, 0x08, 0x3E, 0x08, 0x14, 0x08, 0x08, 0x3E, 0x08, 0x08,
    0x00, 0x50, 0x30, 0x00, 0x00, 0x08, 0x08, 0x08, 0x08, 0x08, 0x00, 0x60, 0x60, 0x00, 0x00, 0x20, 0x10, 0x08, 0x04, 0x02,
    0x3E, 0x51, 0x49, 0x45, 0x3E, 0x00, 0x42, 0x7F, 0x40, 0x00, 0x42, 0x61, 0x51, 0x49, 0x46, 0x21, 0x41, 0x45, 0x4B, 0x31,
    0x18, 0x14, 0x12, 0x7F, 0x10, 0x27, 0x45, 0x45, 0x45, 0x39, 0x3C, 0x4A, 0x49, 0x49, 0x30, 0x01, 0x71, 0x09, 0x05, 0x03,
    0x36, 0x49, 0x49, 0x49, 0x36, 0x06, 0x49, 0x49, 0x29, 0x1E, 0x00, 0x36, 0x36, 0x00, 0x00, 0x00, 0x56, 0x36, 0x00, 0x00,
    0x08, 0x14, 0x22, 0x41, 0x00, 0x14, 0x14, 0x14, 0x14, 0x14, 0x00, 0x41, 0x22, 0x14, 0x08, 0x02, 0x01, 0x51, 0x09, 0x06,
    0x3E, 0x41, 0x5D, 0x55, 0x1E, 0x7E, 0x11, 0x11, 0x11, 0x7E, 0x7F, 0x49, 0x49, 0x49, 0x36, 0x3E, 0x41, 0x41, 0x41, 0x22,
    0x7F, 0x41, 0x41, 0x22, 0x1C, 0x7F, 0x49, 0x49, 0x49, 0x41, 0x7F, 0x09, 0x09, 0x09, 0x01, 0x3E, 0x41, 0x49, 0x49, 0x7A,
    0x7F, 0x08, 0x08, 0x08, 0x7F, 0x00, 0x41, 0x7F, 0x41, 0x00, 0x20, 0x40, 0x41, 0x3F, 0x01, 0x7F, 0x08, 0x14, 0x22, 0x41,
    0x7F, 0x40, 0x40, 0x40, 0x40, 0x7F, 0x02, 0x0C, 0x02, 0x7F, 0x7F, 0x04, 0x08, 0x10, 0x7F, 0x3E, 0x41, 0x41, 0x41, 0x3E,
    0x7F, 0x09, 0x09, 0x09, 0x06, 0x3E, 0x41, 0x51, 0x21, 0x5E, 0x7F, 0x09, 0x19, 0x29, 0x46, 0x46, 0x49, 0x49, 0x49, 0x31,
    0x01, 0x01, 0x7F, 0x01, 0x01, 0x3F, 0x40, 0x40, 0x40, 0x3F, 0x1F, 0x20, 0x40, 0x20, 0x1F, 0x3F, 0x40, 0x38, 0x40, 0x3F,
    0x63, 0x14, 0x08, 0x14, 0x63, 0x07, 0x08, 0x70, 0x08, 0x07, 0x61, 0x51, 0x49, 0x45, 0x43, 0x00, 0x7F, 0x41, 0x41, 0x00,
    0x02, 0x04, 0x08, 0x10, 0x20, 0x00, 0x41, 0x41, 0x7F, 0x00, 0x04, 0x02, 0x01, 0x02, 0x04, 0x40, 0x40, 0x40, 0x40, 0x40,
    0x00, 0x01, 0x02, 0x04, 0x00, 0x20, 0x54, 0x54, 0x54, 0x78, 0x7F, 0x48, 0x44, 0x44, 0x38, 0x38, 0x44, 0x44, 0x44, 0x20,
    0x38, 0x44, 0x44, 0x48, 0x7F, 0x38, 0x54, 0x54, 0x54, 0x18, 0x08, 0x7E, 0x09, 0x01, 0x02, 0x0C, 0x52, 0x52, 0x52, 0x3E,
    0x7F, 0x08, 0x04, 0x04, 0x78, 0x00, 0x44, 0x7D, 0x40, 0x00, 0x20, 0x40, 0x44, 0x3D, 0x00, 0x7F, 0x10, 0x28, 0x44, 0x00,
    0x00, 0x41, 0x7F, 0x40, 0x00, 0x7C, 0x04, 0x18, 0x04, 0x78, 0x7C, 0x08, 0x04, 0x04, 0x78, 0x38, 0x44, 0x44, 0x44, 0x38,
    0x7C, 0x14, 0x14, 0x14, 0x08, 0x08, 0x14, 0x14, 0x18, 0x7C, 0x7C, 0x08, 0x04, 0x04, 0x08, 0x48, 0x54, 0x54, 0x54, 0x20,
    0x04, 0x3F, 0x44, 0x40, 0x20, 0x3C, 0x40, 0x40, 0x20, 0x7C, 0x1C, 0x20, 0x40, 0x20, 0x1C, 0x3C, 0x40, 0x30, 0x40, 0x3C,
    0x44, 0x28, 0x10, 0x28, 0x44, 0x0C, 0x50, 0x50, 0x50, 0x3C, 0x44, 0x64, 0x54, 0x4C, 0x44, 0x00, 0x08, 0x36, 0x41, 0x00,
    0x00, 0x00, 0x7F, 0x00, 0x00, 0x00, 0x41, 0x36, 0x08, 0x00, 0x10, 0x08, 0x08, 0x10, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Pack RGB into softbuffer u32 format: 0x00RRGGBB.
pub fn rgb(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

fn unpack_rgb(v: u32) -> (u8, u8, u8) {
    ((v >> 16) as u8, (v >> 8) as u8, v as u8)
}

fn blend(dst: u32, color: Rgba) -> u32 {
    let a = color.3 as u32;
    if a == 255 {
        return rgb(color.0, color.1, color.2);
    }
    let inv = 255 - a;
    let (dr, dg, db) = unpack_rgb(dst);
    rgb(
        ((color.0 as u32 * a + dr as u32 * inv) / 255) as u8,
        ((color.1 as u32 * a + dg as u32 * inv) / 255) as u8,
        ((color.2 as u32 * a + db as u32 * inv) / 255) as u8,
    )
}

fn glyph(ch: char) -> &'static [u8] {
    let idx = (ch as u32).wrapping_sub(32) as usize;
    // Anything outside the table renders as '?'.
    let idx = if idx >= 96 { 31 } else { idx };
    &FONT_5X7[idx * 5..idx * 5 + 5]
}

fn draw_char(buf: &mut [u32], stride: u32, buf_h: u32, ch: char, px: i32, py: i32, scale: u32, color: Rgba) {
    for (col, bits) in glyph(ch).iter().enumerate() {
        for row in 0..GLYPH_HEIGHT {
            if bits & (1 << row) == 0 {
                continue;
            }
            for sy in 0..scale {
                for sx in 0..scale {
                    let x = px + (col as u32 * scale + sx) as i32;
                    let y = py + (row * scale + sy) as i32;
                    if x >= 0 && y >= 0 && (x as u32) < stride && (y as u32) < buf_h {
                        let off = (y as u32 * stride + x as u32) as usize;
                        buf[off] = blend(buf[off], color);
                    }
                }
            }
        }
    }
}

/// Draw a string. Returns the x position after the last character.
pub fn draw_text(buf: &mut [u32], stride: u32, buf_h: u32, text: &str, px: i32, py: i32, scale: u32, color: Rgba) -> i32 {
    let mut x = px;
    for ch in text.chars() {
        draw_char(buf, stride, buf_h, ch, x, py, scale, color);
        x += (GLYPH_ADVANCE * scale) as i32;
    }
    x
}

pub fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * GLYPH_ADVANCE * scale
}

pub fn text_height(scale: u32) -> u32 {
    GLYPH_HEIGHT * scale
}

/// Draw `text` horizontally centred on `cx`.
pub fn draw_text_centered(buf: &mut [u32], stride: u32, buf_h: u32, text: &str, cx: i32, py: i32, scale: u32, color: Rgba) {
    let x = cx - (text_width(text, scale) / 2) as i32;
    draw_text(buf, stride, buf_h, text, x, py, scale, color);
}

/// Fill a rectangle with a color (with alpha blending).
pub fn fill_rect(buf: &mut [u32], stride: u32, buf_h: u32, rx: i32, ry: i32, rw: u32, rh: u32, color: Rgba) {
    for row in 0..rh {
        let y = ry + row as i32;
        if y < 0 || y as u32 >= buf_h {
            continue;
        }
        for col in 0..rw {
            let x = rx + col as i32;
            if x < 0 || x as u32 >= stride {
                continue;
            }
            let off = (y as u32 * stride + x as u32) as usize;
            buf[off] = blend(buf[off], color);
        }
    }
}

/// Scale at which an image covers the whole window (cropping the overflow).
pub fn cover_scale(img_w: f32, img_h: f32, win_w: f32, win_h: f32) -> f32 {
    (win_w / img_w).max(win_h / img_h)
}

/// Draw `src` (RGBA) scaled by `scale` with its top-left at (x0, y0), after
/// `rotation` quarter turns counter-clockwise.
pub fn blit_scaled_rotated(
    dst: &mut [u32], dst_w: u32, dst_h: u32,
    src: &[u8], src_w: u32, src_h: u32,
    x0: f32, y0: f32, scale: f32,
    rotation: u8,
) {
    let (draw_w, draw_h) = if rotation % 2 == 1 {
        (src_h as f32 * scale, src_w as f32 * scale)
    } else {
        (src_w as f32 * scale, src_h as f32 * scale)
    };

    let dx_start = x0.max(0.0) as u32;
    let dy_start = y0.max(0.0) as u32;
    let dx_end = ((x0 + draw_w).ceil().max(0.0) as u32).min(dst_w);
    let dy_end = ((y0 + draw_h).ceil().max(0.0) as u32).min(dst_h);

    let inv_scale = 1.0 / scale;
    let (sw, sh) = (src_w as f32, src_h as f32);

    for dy in dy_start..dy_end {
        let vy = (dy as f32 - y0) * inv_scale;
        for dx in dx_start..dx_end {
            let vx = (dx as f32 - x0) * inv_scale;

            let (sx, sy) = match rotation % 4 {
                1 => ((sw - 1.0 - vy) as u32, vx as u32),
                2 => ((sw - 1.0 - vx) as u32, (sh - 1.0 - vy) as u32),
                3 => (vy as u32, (sh - 1.0 - vx) as u32),
                _ => (vx as u32, vy as u32),
            };
            if sx >= src_w || sy >= src_h {
                continue;
            }

            let si = (sy as usize * src_w as usize + sx as usize) * 4;
            let di = dy as usize * dst_w as usize + dx as usize;
            let sa = src[si + 3];
            if sa > 0 {
                dst[di] = blend(dst[di], (src[si], src[si + 1], src[si + 2], sa));
            }
        }
    }
}

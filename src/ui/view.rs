use crate::cli::HELP_KEYS;
use crate::loader::DecodedImage;
use crate::ui::render::{
    blit_scaled_rotated, cover_scale, draw_text, draw_text_centered, fill_rect, rgb, text_height,
    text_width, Rgba, BG_COLOR, WHITE,
};
use crate::ui::state::GalleryState;

const DIM: Rgba = (150, 150, 160, 255);
const ERROR_RED: Rgba = (230, 70, 70, 255);
const ACCENT: Rgba = (240, 200, 90, 255);
const PANEL: Rgba = (0, 0, 0, 170);

/// Rolodex rows drawn either side of the active one.
const ROLODEX_SPAN: i64 = 4;
/// Rail entries drawn either side of the active postcode.
const RAIL_SPAN: i64 = 12;

impl GalleryState {
    pub fn render(&self, frame: &mut [u32], fb_w: u32, fb_h: u32, shown: Option<&DecodedImage>) {
        let bg = rgb(BG_COLOR[0], BG_COLOR[1], BG_COLOR[2]);
        frame.fill(bg);

        if !self.gate.is_unlocked() {
            self.render_gate(frame, fb_w, fb_h);
            return;
        }
        if self.catalog.is_empty() {
            return;
        }

        match shown.filter(|_| self.is_landed()) {
            Some(img) => self.render_landed(frame, fb_w, fb_h, img),
            None => self.render_rolodex(frame, fb_w, fb_h),
        }

        self.render_rail(frame, fb_w, fb_h);
        self.render_footer(frame, fb_w, fb_h);
        if self.show_info {
            self.render_info(frame, fb_w, fb_h, shown);
        }
        if self.show_help {
            render_help(frame, fb_w, fb_h);
        }
    }

    fn render_gate(&self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let cx = fb_w as i32 / 2;
        let cy = fb_h as i32 / 2;
        draw_text_centered(frame, fb_w, fb_h, "POSTCODE GALLERY", cx, cy - 80, 4, WHITE);

        let masked: String = "*".repeat(self.gate.input().chars().count());
        let line = format!("Password: {}_", masked);
        draw_text_centered(frame, fb_w, fb_h, &line, cx, cy, 2, DIM);

        if let Some(err) = self.gate.error() {
            draw_text_centered(frame, fb_w, fb_h, err, cx, cy + 40, 2, ERROR_RED);
        }
    }

    fn render_landed(&self, frame: &mut [u32], fb_w: u32, fb_h: u32, img: &DecodedImage) {
        let (w, h) = if img.rotation % 2 == 1 {
            (img.height as f32, img.width as f32)
        } else {
            (img.width as f32, img.height as f32)
        };
        if w > 0.0 && h > 0.0 {
            let scale = cover_scale(w, h, fb_w as f32, fb_h as f32);
            let x0 = (fb_w as f32 - w * scale) / 2.0;
            let y0 = (fb_h as f32 - h * scale) / 2.0;
            blit_scaled_rotated(
                frame, fb_w, fb_h,
                &img.rgba_bytes, img.width, img.height,
                x0, y0, scale,
                img.rotation,
            );
        }

        if let Some(rec) = self.active_record() {
            let caption = format!("{}  {} {}", rec.postcode, rec.suburb, rec.state);
            let y = fb_h as i32 - 90;
            fill_rect(frame, fb_w, fb_h, 0, y - 10, fb_w, text_height(3) + 20, PANEL);
            draw_text(frame, fb_w, fb_h, &caption, 24, y, 3, WHITE);
        }
    }

    /// Typography view: the active record large in the middle, neighbours
    /// fading out above and below, offset by the fractional scroll position.
    fn render_rolodex(&self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let pos = self.scroll.position();
        let base = pos.floor() as i64;
        let frac = pos - base as f64;
        let row_h = (fb_h as f64 / (2 * ROLODEX_SPAN + 1) as f64).max(24.0);
        let cx = fb_w as i32 / 2;
        let cy = fb_h as f64 / 2.0;

        for k in -ROLODEX_SPAN..=ROLODEX_SPAN {
            let idx = self.catalog.wrap(base + k);
            let Some(rec) = self.catalog.get(idx) else { continue };
            let dist = (k as f64 - frac).abs();
            let fade = (1.0 - dist / (ROLODEX_SPAN as f64 + 1.0)).clamp(0.0, 1.0);
            let alpha = (fade * fade * 255.0) as u8;
            if alpha == 0 {
                continue;
            }
            let scale = if dist < 0.5 { 8 } else { 4 };
            let y = (cy + (k as f64 - frac) * row_h) as i32 - (text_height(scale) / 2) as i32;
            let color = if idx == self.active_index() { (255, 255, 255, alpha) } else { (180, 180, 190, alpha) };
            draw_text_centered(frame, fb_w, fb_h, &rec.postcode, cx, y, scale, color);

            if dist < 0.5 {
                let sub = format!("{} {}", rec.suburb, rec.state);
                let sy = y + text_height(scale) as i32 + 8;
                draw_text_centered(frame, fb_w, fb_h, &sub, cx, sy, 2, (200, 200, 210, alpha));
            }
        }
    }

    /// Side index of unique postcodes around the current one. A marker shows
    /// postcodes with an image in any orientation.
    fn render_rail(&self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let unique = self.catalog.unique_postcodes();
        let Some(rec) = self.active_record() else { return };
        let Some(here) = unique.iter().position(|p| *p == rec.postcode) else { return };

        let line_h = text_height(1) as i32 + 6;
        let x = fb_w as i32 - text_width("> 0000", 1) as i32 - 16;
        let cy = fb_h as i32 / 2;
        let n = unique.len() as i64;
        let span = RAIL_SPAN.min((n - 1) / 2);

        for k in -span..=span {
            let i = (here as i64 + k).rem_euclid(n) as usize;
            let pc = &unique[i];
            let y = cy + k as i32 * line_h;
            let marked = self.catalog.index_of(pc).is_some_and(|idx| self.images().has_any_image(idx));
            let color = if k == 0 { WHITE } else { DIM };
            if marked {
                draw_text(frame, fb_w, fb_h, "*", x, y, 1, ACCENT);
            }
            draw_text(frame, fb_w, fb_h, pc, x + 12, y, 1, color);
        }
    }

    fn render_footer(&self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let mut text = format!("{} | {}", self.mode().label(), self.orientation());
        if self.stops().is_empty() {
            text.push_str(" | no images");
        }
        let digits = self.input.digits.as_str();
        if !digits.is_empty() {
            text.push_str(&format!(" | go to {:_<4}", digits));
        }
        let y = fb_h as i32 - text_height(2) as i32 - 12;
        draw_text(frame, fb_w, fb_h, &text, 12, y, 2, DIM);
    }

    fn render_info(&self, frame: &mut [u32], fb_w: u32, fb_h: u32, shown: Option<&DecodedImage>) {
        let mut lines = vec![
            format!("index {}/{}", self.active_index() + 1, self.scroll.len()),
            format!("scroll {:.0} of {:.0}", self.scroll.scroll_top(), self.scroll.total_height()),
            format!(
                "cycle {}/{}",
                (self.scroll.scroll_top() / self.scroll.list_height()).floor() as u64 + 1,
                self.scroll.multiplier()
            ),
            format!("image stops {}", self.stops().len()),
            format!("landed {}", self.is_landed()),
        ];
        if let Some(img) = shown.filter(|_| self.is_landed()) {
            lines.push(format!("{} {}x{} {} KB", img.format_name, img.width, img.height, img.file_size / 1024));
        }
        let line_h = text_height(2) as i32 + 6;
        let w = lines.iter().map(|l| text_width(l, 2)).max().unwrap_or(0) + 16;
        fill_rect(frame, fb_w, fb_h, 8, 8, w, (lines.len() as i32 * line_h + 12) as u32, PANEL);
        for (i, line) in lines.iter().enumerate() {
            draw_text(frame, fb_w, fb_h, line, 16, 14 + i as i32 * line_h, 2, WHITE);
        }
    }
}

fn render_help(frame: &mut [u32], fb_w: u32, fb_h: u32) {
    let lines: Vec<&str> = HELP_KEYS.lines().collect();
    let line_h = text_height(2) as i32 + 6;
    let h = lines.len() as i32 * line_h + 24;
    let w = lines.iter().map(|l| text_width(l, 2)).max().unwrap_or(0) + 32;
    let x = (fb_w as i32 - w as i32) / 2;
    let y = (fb_h as i32 - h) / 2;
    fill_rect(frame, fb_w, fb_h, x, y, w, h as u32, (0, 0, 0, 210));
    for (i, line) in lines.iter().enumerate() {
        draw_text(frame, fb_w, fb_h, line, x + 16, y + 12 + i as i32 * line_h, 2, WHITE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::state::tests::gallery;
    use crate::ui::state::{NavMode, PointerKind};

    #[test]
    fn renders_every_screen_without_panicking() {
        let mut g = gallery(NavMode::FreeScroll, PointerKind::Desktop);
        g.show_help = true;
        g.show_info = true;
        for (w, h) in [(640, 480), (80, 40), (1, 1)] {
            let mut frame = vec![0u32; (w * h) as usize];
            g.render(&mut frame, w, h, None);
        }

        let img = DecodedImage {
            rgba_bytes: vec![255; 4 * 4 * 3],
            width: 4,
            height: 3,
            rotation: 1,
            file_size: 0,
            format_name: "PNG".into(),
        };
        let mut frame = vec![0u32; 320 * 240];
        g.render(&mut frame, 320, 240, Some(&img));
    }

    #[test]
    fn landed_image_covers_the_frame() {
        let g = gallery(NavMode::ImagesOnly, PointerKind::Desktop);
        assert!(g.is_landed());
        let img = DecodedImage {
            rgba_bytes: vec![255; 2 * 2 * 4],
            width: 2,
            height: 2,
            rotation: 0,
            file_size: 0,
            format_name: "PNG".into(),
        };
        let mut frame = vec![0u32; 320 * 240];
        g.render(&mut frame, 320, 240, Some(&img));
        // Centre and corner are image, not background.
        assert_eq!(frame[120 * 320 + 160], rgb(255, 255, 255));
        assert_eq!(frame[0], rgb(255, 255, 255));
    }

    #[test]
    fn locked_gate_hides_the_gallery() {
        let mut g = gallery(NavMode::ImagesOnly, PointerKind::Desktop);
        g.gate = crate::auth::AuthGate::new("pw".into(), crate::auth::SessionStore::default());
        let img = DecodedImage {
            rgba_bytes: vec![255; 4],
            width: 1,
            height: 1,
            rotation: 0,
            file_size: 0,
            format_name: "PNG".into(),
        };
        let mut frame = vec![0u32; 64 * 48];
        g.render(&mut frame, 64, 48, Some(&img));
        assert!(frame.iter().all(|&p| p != rgb(255, 255, 255)));
    }
}

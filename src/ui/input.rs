use std::time::{Duration, Instant};

use crate::scroll::Direction;
use crate::timer::Timer;
use crate::ui::state::{GalleryState, NavMode, PointerKind};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Pixels per wheel "line" when the platform reports lines.
pub const LINE_PX: f64 = 40.0;
/// Base multiplier applied to raw wheel deltas in free scroll.
const WHEEL_DAMPING: f64 = 0.35;
/// Accumulated desktop wheel travel that triggers one step.
const WHEEL_STEP_THRESHOLD: f64 = 60.0;
/// Wheel accumulator is dropped after this much quiet.
const WHEEL_REARM: Duration = Duration::from_millis(220);
/// Vertical drag that triggers one step per touch gesture.
const TOUCH_STEP_THRESHOLD: f64 = 40.0;
const DIGIT_BUFFER_LEN: usize = 4;
const DIGIT_RESET: Duration = Duration::from_millis(1500);

/// Extra damping near image-bearing records: (max distance, factor). The
/// closer an image, the slower the wheel moves, so free scroll drifts into
/// image positions.
const GRAVITY_BANDS: &[(usize, f64)] = &[(0, 0.35), (1, 0.55), (3, 0.75), (6, 0.9)];

fn gravity(distance: Option<usize>) -> f64 {
    let Some(d) = distance else { return 1.0 };
    GRAVITY_BANDS
        .iter()
        .find(|(max, _)| d <= *max)
        .map(|(_, f)| *f)
        .unwrap_or(1.0)
}

// ---------------------------------------------------------------------------
// Input state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct TouchTrack {
    start_y: f64,
    last_y: f64,
    armed: bool,
}

/// Typed postcode digits, cleared after a pause.
#[derive(Debug, Default)]
pub struct DigitBuffer {
    digits: String,
    reset: Timer,
}

impl DigitBuffer {
    /// Append a digit. Returns the full postcode once four are typed.
    pub fn push(&mut self, c: char, now: Instant) -> Option<String> {
        if !c.is_ascii_digit() {
            return None;
        }
        self.digits.push(c);
        if self.digits.len() >= DIGIT_BUFFER_LEN {
            self.reset.clear();
            return Some(std::mem::take(&mut self.digits));
        }
        self.reset.start(now, DIGIT_RESET);
        None
    }

    pub fn as_str(&self) -> &str {
        &self.digits
    }

    fn expire(&mut self, now: Instant) {
        if self.reset.fire(now) {
            self.digits.clear();
        }
    }

    fn clear(&mut self) {
        self.digits.clear();
        self.reset.clear();
    }
}

#[derive(Debug, Default)]
pub struct InputState {
    wheel_accum: f64,
    wheel_rearm: Timer,
    touch: Option<TouchTrack>,
    pub digits: DigitBuffer,
}

impl InputState {
    pub fn reset(&mut self) {
        self.wheel_accum = 0.0;
        self.wheel_rearm.clear();
        self.touch = None;
        self.digits.clear();
    }

    pub fn expire(&mut self, now: Instant) {
        if self.wheel_rearm.fire(now) {
            self.wheel_accum = 0.0;
        }
        self.digits.expire(now);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [self.wheel_rearm.due(), self.digits.reset.due()]
            .into_iter()
            .flatten()
            .min()
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Keys the gallery reacts to, independent of the windowing backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    ArrowUp,
    ArrowDown,
    Enter,
    Backspace,
    Escape,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Handled,
    Ignored,
    ToggleFullscreen,
    Quit,
}

// ---------------------------------------------------------------------------
// Fanout
// ---------------------------------------------------------------------------

impl GalleryState {
    /// Wheel travel in pixels, positive = forward.
    pub fn on_wheel(&mut self, delta: f64, now: Instant) {
        if !self.gate.is_unlocked() || delta == 0.0 {
            return;
        }
        if !self.mode().is_stepped() {
            let distance = self.nearest_image_distance();
            self.free_scroll(delta * WHEEL_DAMPING * gravity(distance), now);
            return;
        }

        if self.lock.is_engaged(now) {
            self.input.wheel_accum = 0.0;
            return;
        }
        match self.pointer {
            PointerKind::Touch => {
                if let Some(dir) = Direction::from_delta(delta) {
                    self.step(dir, now);
                }
            }
            PointerKind::Desktop => {
                self.input.wheel_accum += delta;
                self.input.wheel_rearm.start(now, WHEEL_REARM);
                if self.input.wheel_accum.abs() >= WHEEL_STEP_THRESHOLD {
                    let dir = Direction::from_delta(self.input.wheel_accum);
                    self.input.wheel_accum = 0.0;
                    if let Some(dir) = dir {
                        self.step(dir, now);
                    }
                }
            }
        }
    }

    fn nearest_image_distance(&self) -> Option<usize> {
        let active = self.active_index();
        self.stops()
            .nearest(active as i64)
            .map(|i| crate::scroll::circular_distance(i, active, self.catalog.len()))
    }

    pub fn on_touch_start(&mut self, y: f64, _now: Instant) {
        self.pointer = PointerKind::Touch;
        self.input.touch = Some(TouchTrack {
            start_y: y,
            last_y: y,
            armed: true,
        });
    }

    pub fn on_touch_move(&mut self, y: f64, now: Instant) {
        if !self.gate.is_unlocked() {
            return;
        }
        let Some(mut touch) = self.input.touch else { return };

        if self.mode().is_stepped() {
            let travel = touch.start_y - y;
            if touch.armed && travel.abs() > TOUCH_STEP_THRESHOLD {
                touch.armed = false;
                if let Some(dir) = Direction::from_delta(travel) {
                    self.step(dir, now);
                }
            }
        } else {
            // Finger moving up pulls later records into view.
            self.free_scroll(touch.last_y - y, now);
        }
        touch.last_y = y;
        self.input.touch = Some(touch);
    }

    pub fn on_touch_end(&mut self, _now: Instant) {
        self.input.touch = None;
    }

    /// Any mouse activity switches back to desktop behaviour.
    pub fn on_pointer_moved(&mut self) {
        if self.input.touch.is_none() {
            self.pointer = PointerKind::Desktop;
        }
    }

    pub fn on_key(&mut self, key: KeyInput, now: Instant) -> KeyOutcome {
        if !self.gate.is_unlocked() {
            return self.on_gate_key(key, now);
        }

        match key {
            KeyInput::Escape => KeyOutcome::Quit,
            KeyInput::ArrowUp | KeyInput::ArrowDown => {
                let dir = if key == KeyInput::ArrowDown {
                    Direction::Forward
                } else {
                    Direction::Backward
                };
                if self.mode().is_stepped() {
                    self.step(dir, now);
                } else {
                    let row = match dir {
                        Direction::Forward => self.scroll.step(),
                        Direction::Backward => -self.scroll.step(),
                    };
                    self.free_scroll(row, now);
                }
                KeyOutcome::Handled
            }
            KeyInput::Char(c) if c.is_ascii_digit() => {
                if let Some(postcode) = self.input.digits.push(c, now) {
                    self.seek_postcode(&postcode, now);
                }
                KeyOutcome::Handled
            }
            KeyInput::Char(c) => match c.to_ascii_lowercase() {
                'q' => KeyOutcome::Quit,
                'm' => {
                    self.cycle_mode(now);
                    KeyOutcome::Handled
                }
                'o' => {
                    self.toggle_orientation(now);
                    KeyOutcome::Handled
                }
                'f' => KeyOutcome::ToggleFullscreen,
                'i' => {
                    self.show_info = !self.show_info;
                    KeyOutcome::Handled
                }
                '?' => {
                    self.show_help = !self.show_help;
                    KeyOutcome::Handled
                }
                _ => KeyOutcome::Ignored,
            },
            KeyInput::Enter | KeyInput::Backspace => KeyOutcome::Ignored,
        }
    }

    fn on_gate_key(&mut self, key: KeyInput, now: Instant) -> KeyOutcome {
        match key {
            KeyInput::Escape => KeyOutcome::Quit,
            KeyInput::Char(c) => {
                self.gate.push_char(c);
                KeyOutcome::Handled
            }
            KeyInput::Backspace => {
                self.gate.backspace();
                KeyOutcome::Handled
            }
            KeyInput::Enter => {
                if self.gate.submit() {
                    self.on_unlocked(now);
                }
                KeyOutcome::Handled
            }
            KeyInput::ArrowUp | KeyInput::ArrowDown => KeyOutcome::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthGate, SessionStore};
    use crate::catalog::PostcodeCatalog;
    use crate::image_index::{ImageIndex, Orientation};
    use crate::scroll::{motion, ScrollConfig};
    use crate::ui::state::tests::gallery;
    use std::path::Path;
    use std::sync::Arc;

    #[test]
    fn gravity_is_strongest_on_images() {
        assert_eq!(gravity(Some(0)), 0.35);
        assert_eq!(gravity(Some(2)), 0.75);
        assert_eq!(gravity(Some(50)), 1.0);
        assert_eq!(gravity(None), 1.0);
        let mut prev = 0.0;
        for d in 0..10 {
            assert!(gravity(Some(d)) >= prev);
            prev = gravity(Some(d));
        }
    }

    #[test]
    fn free_wheel_is_damped_near_images() {
        let mut g = gallery(NavMode::FreeScroll, PointerKind::Desktop);
        let t0 = Instant::now();
        // Record 0: nearest image (2) is two rows away.
        let top = g.scroll.scroll_top();
        g.on_wheel(100.0, t0);
        let moved = g.scroll.scroll_top() - top;
        assert!((moved - 100.0 * WHEEL_DAMPING * 0.75).abs() < 1e-9);
    }

    #[test]
    fn desktop_wheel_accumulates_to_one_step() {
        let mut g = gallery(NavMode::SnapToImage, PointerKind::Desktop);
        let t0 = Instant::now();
        g.on_wheel(30.0, t0);
        assert_eq!(g.active_index(), 2);
        g.on_wheel(30.0, t0 + Duration::from_millis(10));
        assert_eq!(g.active_index(), 5);
        // Locked while the step settles.
        g.on_wheel(200.0, t0 + Duration::from_millis(20));
        assert_eq!(g.active_index(), 5);
    }

    #[test]
    fn wheel_accumulator_rearms_after_quiet() {
        let mut g = gallery(NavMode::SnapToImage, PointerKind::Desktop);
        let t0 = Instant::now();
        g.on_wheel(40.0, t0);
        let later = t0 + WHEEL_REARM + Duration::from_millis(1);
        g.tick(later);
        g.on_wheel(40.0, later);
        assert_eq!(g.active_index(), 2);
    }

    #[test]
    fn mobile_wheel_steps_per_tick() {
        let mut g = gallery(NavMode::SnapToImage, PointerKind::Touch);
        let t0 = Instant::now();
        g.on_wheel(1.0, t0);
        assert_eq!(g.active_index(), 5);
    }

    #[test]
    fn touch_drag_steps_once_per_gesture() {
        let mut g = gallery(NavMode::SnapToImage, PointerKind::Desktop);
        let t0 = Instant::now();
        g.on_touch_start(500.0, t0);
        assert_eq!(g.pointer, PointerKind::Touch);
        g.on_touch_move(480.0, t0);
        assert_eq!(g.active_index(), 2);
        g.on_touch_move(450.0, t0);
        assert_eq!(g.active_index(), 5);
        // Lock long gone, but the gesture is disarmed.
        let later = t0 + Duration::from_secs(2);
        g.tick(later);
        g.on_touch_move(300.0, later);
        assert_eq!(g.active_index(), 5);
        g.on_touch_end(later);

        g.on_touch_start(300.0, later);
        g.on_touch_move(400.0, later);
        assert_eq!(g.active_index(), 2);
    }

    #[test]
    fn touch_drag_scrolls_freely() {
        let mut g = gallery(NavMode::FreeScroll, PointerKind::Desktop);
        let t0 = Instant::now();
        g.on_touch_start(500.0, t0);
        g.on_touch_move(470.0, t0);
        assert_eq!(g.active_index(), 2);
        g.on_touch_move(485.0, t0);
        assert_eq!(g.active_index(), 1);
    }

    #[test]
    fn arrows_step_in_snap_mode() {
        let mut g = gallery(NavMode::SnapToImage, PointerKind::Touch);
        let t0 = Instant::now();
        assert_eq!(g.on_key(KeyInput::ArrowDown, t0), KeyOutcome::Handled);
        assert_eq!(g.active_index(), 5);
        let t1 = t0 + motion::touch_settle(10);
        g.tick(t1);
        g.on_key(KeyInput::ArrowUp, t1);
        assert_eq!(g.active_index(), 2);
    }

    #[test]
    fn four_digits_jump_to_postcode() {
        let mut g = gallery(NavMode::FreeScroll, PointerKind::Desktop);
        let t0 = Instant::now();
        for c in "100".chars() {
            g.on_key(KeyInput::Char(c), t0);
        }
        assert_eq!(g.input.digits.as_str(), "100");
        g.on_key(KeyInput::Char('8'), t0);
        assert_eq!(g.active_index(), 8);
        assert_eq!(g.input.digits.as_str(), "");
    }

    #[test]
    fn digit_buffer_resets_after_pause() {
        let mut g = gallery(NavMode::FreeScroll, PointerKind::Desktop);
        let t0 = Instant::now();
        g.on_key(KeyInput::Char('1'), t0);
        g.on_key(KeyInput::Char('0'), t0);
        let later = t0 + DIGIT_RESET;
        g.tick(later);
        assert_eq!(g.input.digits.as_str(), "");
        for c in "1004".chars() {
            g.on_key(KeyInput::Char(c), later);
        }
        assert_eq!(g.active_index(), 4);
    }

    #[test]
    fn gate_consumes_keys_until_unlocked() {
        let catalog = PostcodeCatalog::parse("1002,a,NSW\n1003,b,NSW\n");
        let mut g = GalleryState::new(
            Arc::new(catalog),
            Arc::new(ImageIndex::default()),
            AuthGate::new("Pw".into(), SessionStore::default()),
            ScrollConfig::default(),
            NavMode::FreeScroll,
            Orientation::Landscape,
            PointerKind::Desktop,
        );
        let t0 = Instant::now();
        g.on_wheel(500.0, t0);
        assert_eq!(g.active_index(), 0);

        for c in "pw".chars() {
            g.on_key(KeyInput::Char(c), t0);
        }
        g.on_key(KeyInput::Enter, t0);
        assert_eq!(g.gate.error(), Some("Incorrect password"));
        assert!(!g.gate.is_unlocked());

        for c in "Pw".chars() {
            g.on_key(KeyInput::Char(c), t0);
        }
        g.on_key(KeyInput::Enter, t0);
        assert!(g.gate.is_unlocked());
        assert_eq!(g.gate.error(), None);
        // 'm' now drives the gallery rather than the password field.
        g.on_key(KeyInput::Char('m'), t0);
        assert_eq!(g.mode(), NavMode::SnapToImage);
    }

    #[test]
    fn keys_toggle_orientation_and_quit() {
        let mut g = gallery(NavMode::SnapToImage, PointerKind::Desktop);
        let t0 = Instant::now();
        g.on_key(KeyInput::Char('o'), t0);
        assert_eq!(g.orientation(), Orientation::Portrait);
        assert_eq!(g.active_image(), Some(Path::new("portrait/1009.jpg")));
        assert_eq!(g.on_key(KeyInput::Char('f'), t0), KeyOutcome::ToggleFullscreen);
        assert_eq!(g.on_key(KeyInput::Escape, t0), KeyOutcome::Quit);
    }
}

use std::time::{Duration, Instant};

/// Motion tuning for the rolodex. Everything the snap physics feels like is
/// set here.
pub mod motion {
    use std::time::Duration;

    /// Pixel height of one record in the virtual scroll range.
    pub const STEP_PX: f64 = 15.0;
    /// Virtual range the cycle count is sized to reach.
    pub const TARGET_HEIGHT_PX: f64 = 8_000_000.0;
    /// Lower bound on cycles regardless of catalog size.
    pub const MIN_CYCLES: u32 = 20;

    /// Desktop snap animation: base duration plus a per-row component.
    pub const SNAP_BASE_MS: u64 = 380;
    pub const SNAP_PER_ROW_MS: u64 = 14;
    pub const SNAP_MAX_MS: u64 = 1200;

    /// Touch jumps are immediate; the gesture lock holds for this long.
    pub const TOUCH_SETTLE_BASE_MS: u64 = 90;
    pub const TOUCH_SETTLE_PER_ROW_MS: u64 = 6;
    pub const TOUCH_SETTLE_MAX_MS: u64 = 360;

    /// Ease-out power grows from MIN to MAX over this many rows.
    pub const EASE_POWER_MIN: f64 = 2.0;
    pub const EASE_POWER_MAX: f64 = 5.0;
    pub const EASE_POWER_ROWS: usize = 24;

    pub fn snap_duration(rows: usize) -> Duration {
        let ms = SNAP_BASE_MS + SNAP_PER_ROW_MS * rows as u64;
        Duration::from_millis(ms.min(SNAP_MAX_MS))
    }

    pub fn touch_settle(rows: usize) -> Duration {
        let ms = TOUCH_SETTLE_BASE_MS + TOUCH_SETTLE_PER_ROW_MS * rows as u64;
        Duration::from_millis(ms.min(TOUCH_SETTLE_MAX_MS))
    }
}

// Tolerance for floor() on row boundaries, as a fraction of the virtual range
// in rows. The step need not be an integer.
const ROW_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Positive deltas move forward through the catalog.
    pub fn from_delta(delta: f64) -> Option<Self> {
        if delta > 0.0 {
            Some(Direction::Forward)
        } else if delta < 0.0 {
            Some(Direction::Backward)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Easing {
    /// `1 - (1 - t)^power`; larger powers decelerate over a longer tail.
    EaseOut { power: f64 },
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::EaseOut { power } => 1.0 - (1.0 - t).powf(power),
        }
    }

    pub fn for_distance(rows: usize) -> Self {
        let frac = rows.min(motion::EASE_POWER_ROWS) as f64 / motion::EASE_POWER_ROWS as f64;
        Easing::EaseOut {
            power: motion::EASE_POWER_MIN + (motion::EASE_POWER_MAX - motion::EASE_POWER_MIN) * frac,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    Jump,
    Animate { duration: Duration, easing: Easing },
}

#[derive(Debug, Clone, Copy)]
struct ScrollAnimation {
    from: f64,
    to: f64,
    start: Instant,
    duration: Duration,
    easing: Easing,
}

impl ScrollAnimation {
    fn position(&self, now: Instant) -> (f64, bool) {
        let elapsed = now.saturating_duration_since(self.start);
        if elapsed >= self.duration {
            return (self.to, true);
        }
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        (self.from + (self.to - self.from) * self.easing.apply(t), false)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScrollConfig {
    pub step: f64,
    pub target_height: f64,
    pub min_cycles: u32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            step: motion::STEP_PX,
            target_height: motion::TARGET_HEIGHT_PX,
            min_cycles: motion::MIN_CYCLES,
        }
    }
}

/// An apparently endless vertical scroll over `len` records, built by
/// repeating the list `multiplier` times and quietly recentering.
#[derive(Debug)]
pub struct VirtualScroll {
    step: f64,
    len: usize,
    multiplier: u32,
    scroll_top: f64,
    active_index: usize,
    animation: Option<ScrollAnimation>,
}

impl VirtualScroll {
    pub fn new(len: usize, cfg: ScrollConfig) -> Self {
        let step = cfg.step.max(1.0);
        let list_height = len as f64 * step;
        // Five cycles keep the middle one clear of both recenter margins.
        let min_cycles = cfg.min_cycles.max(5);
        let multiplier = if list_height > 0.0 {
            ((cfg.target_height / list_height).ceil() as u32).max(min_cycles)
        } else {
            min_cycles
        };

        let mut vs = Self {
            step,
            len,
            multiplier,
            scroll_top: 0.0,
            active_index: 0,
            animation: None,
        };
        vs.scroll_top = vs.middle_cycle_start();
        vs
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    pub fn list_height(&self) -> f64 {
        self.len as f64 * self.step
    }

    pub fn total_height(&self) -> f64 {
        self.multiplier as f64 * self.list_height()
    }

    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    fn middle_cycle_start(&self) -> f64 {
        (self.multiplier / 2) as f64 * self.list_height()
    }

    /// Absolute row under `scroll_top`, counting from the top of the range.
    fn row_at(&self, scroll_top: f64) -> i64 {
        // One tolerance for the whole range, so recentering rounds the same
        // way at both ends.
        let total_rows = (self.multiplier as f64 * self.len as f64).max(1.0);
        (scroll_top / self.step + ROW_EPSILON * total_rows).floor() as i64
    }

    /// Start of the cycle holding the current row. Derived from the row so
    /// it agrees with `index_at` on boundaries.
    fn cycle_start(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        self.row_at(self.scroll_top).div_euclid(self.len as i64) as f64 * self.list_height()
    }

    pub fn wrap(&self, idx: i64) -> usize {
        if self.len == 0 {
            return 0;
        }
        idx.rem_euclid(self.len as i64) as usize
    }

    /// Record under an arbitrary scroll offset.
    pub fn index_at(&self, scroll_top: f64) -> usize {
        if self.len == 0 {
            return 0;
        }
        self.row_at(scroll_top).rem_euclid(self.len as i64) as usize
    }

    /// Fractional row position within the cycle, for drawing the rolodex
    /// between rows.
    pub fn position(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        ((self.scroll_top - self.cycle_start()) / self.step).max(0.0)
    }

    /// Jump back into the middle cycle when close to either end. Preserves
    /// the offset within the cycle, and therefore the index.
    fn recenter(&mut self) {
        let lh = self.list_height();
        if lh <= 0.0 {
            return;
        }
        let margin = 1.5 * lh;
        let top = self.scroll_top;
        if top >= margin && top <= self.total_height() - margin {
            return;
        }
        let new_top = self.middle_cycle_start() + (top - self.cycle_start());
        let delta = new_top - top;
        self.scroll_top = new_top;
        if let Some(anim) = self.animation.as_mut() {
            anim.from += delta;
            anim.to += delta;
        }
        log::trace!("recentered scroll_top {:.0} -> {:.0}", top, new_top);
    }

    /// Synchronous position read: recenters, then derives the active index
    /// from the offset unless an animation has pinned it.
    pub fn sync(&mut self) -> usize {
        self.recenter();
        if self.animation.is_none() {
            self.active_index = self.index_at(self.scroll_top);
        }
        self.active_index
    }

    /// Direct user scroll. Overrides any animation in flight.
    pub fn scroll_by(&mut self, delta: f64) -> usize {
        self.animation = None;
        self.scroll_top += delta;
        self.sync()
    }

    pub fn cancel_animation(&mut self) {
        if self.animation.take().is_some() {
            self.sync();
        }
    }

    /// Offset of `idx` within the cycle the view is currently in.
    pub fn offset_in_current_cycle(&self, idx: usize) -> f64 {
        self.cycle_start() + idx as f64 * self.step
    }

    /// Offset for `idx` that lies strictly in `direction` from the current
    /// position, moving one cycle over when needed.
    pub fn directional_offset(&self, idx: usize, direction: Direction) -> f64 {
        let mut target = self.offset_in_current_cycle(idx);
        match direction {
            Direction::Forward if target <= self.scroll_top => target += self.list_height(),
            Direction::Backward if target >= self.scroll_top => target -= self.list_height(),
            _ => {}
        }
        target
    }

    /// Rows between the current position and `offset`, rounded.
    pub fn rows_to(&self, offset: f64) -> usize {
        ((offset - self.scroll_top).abs() / self.step).round() as usize
    }

    pub fn scroll_to_index(&mut self, idx: i64, motion: Motion, now: Instant) {
        if self.len == 0 {
            return;
        }
        let idx = self.wrap(idx);
        let target = self.offset_in_current_cycle(idx);
        self.go_to(idx, target, motion, now);
    }

    pub fn scroll_to_directional(&mut self, idx: i64, direction: Direction, motion: Motion, now: Instant) {
        if self.len == 0 {
            return;
        }
        let idx = self.wrap(idx);
        let target = self.directional_offset(idx, direction);
        self.go_to(idx, target, motion, now);
    }

    fn go_to(&mut self, idx: usize, target: f64, motion: Motion, now: Instant) {
        self.active_index = idx;
        match motion {
            Motion::Animate { duration, easing } if !duration.is_zero() && target != self.scroll_top => {
                // Replaces whatever was in flight.
                self.animation = Some(ScrollAnimation {
                    from: self.scroll_top,
                    to: target,
                    start: now,
                    duration,
                    easing,
                });
            }
            _ => {
                self.animation = None;
                self.scroll_top = target;
            }
        }
        self.recenter();
    }

    /// Advance the animation. Returns true while it is still running.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(anim) = self.animation else { return false };
        let (pos, done) = anim.position(now);
        self.scroll_top = pos;
        if done {
            self.animation = None;
        }
        self.recenter();
        !done
    }
}

/// Circular distance between two indices on a ring of `n`.
pub fn circular_distance(a: usize, b: usize, n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let d = a.abs_diff(b) % n;
    d.min(n - d)
}

/// Image-bearing indices in ascending order, treated as a ring.
#[derive(Debug, Clone, Default)]
pub struct ImageStops {
    indices: Vec<usize>,
    len: usize,
}

impl ImageStops {
    pub fn new(mut indices: Vec<usize>, len: usize) -> Self {
        indices.retain(|&i| i < len);
        indices.sort_unstable();
        indices.dedup();
        Self { indices, len }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[cfg(test)]
    pub fn as_slice(&self) -> &[usize] {
        &self.indices
    }

    fn normalize(&self, idx: i64) -> usize {
        idx.rem_euclid(self.len.max(1) as i64) as usize
    }

    /// Closest stop by circular distance; ties go to the earlier stop.
    pub fn nearest(&self, idx: i64) -> Option<usize> {
        let idx = self.normalize(idx);
        let mut best: Option<(usize, usize)> = None;
        for &stop in &self.indices {
            let d = circular_distance(stop, idx, self.len);
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((stop, d));
            }
        }
        best.map(|(stop, _)| stop)
    }

    /// Next stop strictly after (or before) `idx`, wrapping around.
    pub fn next(&self, idx: i64, direction: Direction) -> Option<usize> {
        let idx = self.normalize(idx);
        match direction {
            Direction::Forward => self
                .indices
                .iter()
                .copied()
                .find(|&s| s > idx)
                .or_else(|| self.indices.first().copied()),
            Direction::Backward => self
                .indices
                .iter()
                .rev()
                .copied()
                .find(|&s| s < idx)
                .or_else(|| self.indices.last().copied()),
        }
    }
}

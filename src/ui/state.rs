use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::ValueEnum;

use crate::auth::AuthGate;
use crate::catalog::{PostcodeCatalog, PostcodeRecord};
use crate::image_index::{ImageIndex, Orientation};
use crate::resolver::ImageMap;
use crate::scroll::{motion, Direction, Easing, ImageStops, Motion, ScrollConfig, VirtualScroll};
use crate::timer::{GestureLock, Timer};
use crate::ui::input::InputState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Quiet period after the last free-scroll movement before we consider the
/// scroll stopped.
const SCROLL_SETTLE: Duration = Duration::from_millis(160);
/// After landing on an image, nearby jumps keep the image shell up.
const HOLD_WINDOW: Duration = Duration::from_millis(450);
const HOLD_MAX_ROWS: usize = 8;

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NavMode {
    FreeScroll,
    SnapToImage,
    ImagesOnly,
}

impl NavMode {
    pub fn next(self) -> Self {
        match self {
            NavMode::FreeScroll => NavMode::SnapToImage,
            NavMode::SnapToImage => NavMode::ImagesOnly,
            NavMode::ImagesOnly => NavMode::FreeScroll,
        }
    }

    /// Gestures move between image-bearing records rather than rows.
    pub fn is_stepped(self) -> bool {
        self != NavMode::FreeScroll
    }

    pub fn label(self) -> &'static str {
        match self {
            NavMode::FreeScroll => "free scroll",
            NavMode::SnapToImage => "snap to image",
            NavMode::ImagesOnly => "images only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landed {
    Scrolling,
    Landed,
}

/// Where the last gesture came from. Touch jumps are immediate; desktop
/// steps animate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Desktop,
    Touch,
}

// ---------------------------------------------------------------------------
// Gallery state
// ---------------------------------------------------------------------------

pub struct GalleryState {
    pub catalog: Arc<PostcodeCatalog>,
    index: Arc<ImageIndex>,
    images: ImageMap,
    stops: ImageStops,
    pub scroll: VirtualScroll,
    pub gate: AuthGate,

    mode: NavMode,
    orientation: Orientation,
    landed: Landed,
    pub(crate) pointer: PointerKind,

    /// Free scroll: fires once the wheel/drag has gone quiet.
    settle: Timer,
    /// Snap: fires when a step has arrived.
    landing: Timer,
    hold: Timer,
    pub(crate) lock: GestureLock,
    pub(crate) input: InputState,

    pub show_help: bool,
    pub show_info: bool,
}

impl GalleryState {
    pub fn new(
        catalog: Arc<PostcodeCatalog>,
        index: Arc<ImageIndex>,
        gate: AuthGate,
        scroll_cfg: ScrollConfig,
        mode: NavMode,
        orientation: Orientation,
        pointer: PointerKind,
    ) -> Self {
        let images = ImageMap::build(&catalog, &index, orientation);
        let stops = ImageStops::new(images.image_indices(), catalog.len());
        log::info!(
            "{} of {} records have a {} image ({} assets indexed)",
            stops.len(),
            catalog.len(),
            orientation,
            index.len()
        );
        let scroll = VirtualScroll::new(catalog.len(), scroll_cfg);

        let mut state = Self {
            catalog,
            index,
            images,
            stops,
            scroll,
            gate,
            mode,
            orientation,
            landed: Landed::Scrolling,
            pointer,
            settle: Timer::default(),
            landing: Timer::default(),
            hold: Timer::default(),
            lock: GestureLock::default(),
            input: InputState::default(),
            show_help: false,
            show_info: false,
        };
        state.enter_mode(Instant::now());
        state
    }

    pub fn mode(&self) -> NavMode {
        self.mode
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn stops(&self) -> &ImageStops {
        &self.stops
    }

    pub fn images(&self) -> &ImageMap {
        &self.images
    }

    pub fn active_index(&self) -> usize {
        self.scroll.active_index()
    }

    pub fn active_record(&self) -> Option<&PostcodeRecord> {
        self.catalog.get(self.scroll.active_index())
    }

    /// Image for the active record in the current orientation.
    pub fn active_image(&self) -> Option<&Path> {
        self.images.url(self.scroll.active_index())
    }

    pub fn is_landed(&self) -> bool {
        self.mode == NavMode::ImagesOnly || self.landed == Landed::Landed
    }

    /// Image to show right now: the landed record's, or nothing while the
    /// typography overlay is up.
    pub fn wanted_image(&self) -> Option<&Path> {
        if !self.gate.is_unlocked() || !self.is_landed() {
            return None;
        }
        self.active_image()
    }

    /// Neighbouring image stops worth decoding ahead of time.
    pub fn prefetch_images(&self) -> Vec<&Path> {
        let active = self.scroll.active_index() as i64;
        [Direction::Forward, Direction::Backward]
            .into_iter()
            .filter_map(|d| self.stops.next(active, d))
            .filter_map(|i| self.images.url(i))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Called once the password gate opens.
    pub fn on_unlocked(&mut self, now: Instant) {
        self.enter_mode(now);
    }

    pub fn set_mode(&mut self, mode: NavMode, now: Instant) {
        if mode == self.mode {
            return;
        }
        log::debug!("mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
        self.enter_mode(now);
    }

    pub fn cycle_mode(&mut self, now: Instant) {
        self.set_mode(self.mode.next(), now);
    }

    pub fn set_orientation(&mut self, orientation: Orientation, now: Instant) {
        if orientation == self.orientation {
            return;
        }
        self.orientation = orientation;
        self.images = ImageMap::build(&self.catalog, &self.index, orientation);
        self.stops = ImageStops::new(self.images.image_indices(), self.catalog.len());
        log::debug!("orientation {} ({} image stops)", orientation, self.stops.len());
        self.enter_mode(now);
    }

    pub fn toggle_orientation(&mut self, now: Instant) {
        self.set_orientation(self.orientation.toggled(), now);
    }

    /// Reset gesture state and put the view where the mode wants it.
    fn enter_mode(&mut self, now: Instant) {
        self.clear_gestures();
        if self.mode.is_stepped() {
            self.coerce_to_image(now);
        } else {
            self.scroll.cancel_animation();
            self.settle_landed();
        }
    }

    fn clear_gestures(&mut self) {
        self.settle.clear();
        self.landing.clear();
        self.hold.clear();
        self.lock.clear();
        self.input.reset();
    }

    /// Snap to the nearest image-bearing record, if there is one.
    fn coerce_to_image(&mut self, now: Instant) {
        let active = self.scroll.active_index();
        if let Some(target) = self.stops.nearest(active as i64) {
            self.scroll.scroll_to_index(target as i64, Motion::Jump, now);
        } else {
            self.scroll.cancel_animation();
        }
        self.settle_landed();
    }

    fn settle_landed(&mut self) {
        self.landed = if self.images.has_image(self.scroll.active_index()) {
            Landed::Landed
        } else {
            Landed::Scrolling
        };
    }

    /// Continuous scroll by `delta` pixels (positive = forward).
    pub fn free_scroll(&mut self, delta: f64, now: Instant) {
        if self.catalog.is_empty() {
            return;
        }
        self.scroll.scroll_by(delta);
        self.landed = Landed::Scrolling;
        self.hold.clear();
        self.settle.start(now, SCROLL_SETTLE);
    }

    /// One discrete move to the next image-bearing record. Returns false when
    /// the gesture lock swallowed it or there is nowhere to go.
    pub fn step(&mut self, direction: Direction, now: Instant) -> bool {
        if self.catalog.is_empty() || self.lock.is_engaged(now) {
            return false;
        }
        let active = self.scroll.active_index();
        let Some(target) = self.stops.next(active as i64, direction) else {
            return false;
        };

        let rows = self.scroll.rows_to(self.scroll.directional_offset(target, direction));
        let (motion, settle) = match self.pointer {
            PointerKind::Desktop => {
                let duration = motion::snap_duration(rows);
                let anim = Motion::Animate {
                    duration,
                    easing: Easing::for_distance(rows),
                };
                (anim, duration)
            }
            PointerKind::Touch => (Motion::Jump, motion::touch_settle(rows)),
        };

        if self.mode != NavMode::ImagesOnly {
            let holding = self.hold.is_pending() && rows <= HOLD_MAX_ROWS;
            if !holding {
                self.landed = Landed::Scrolling;
            }
        }
        self.hold.clear();

        log::debug!("[step] {} -> {} ({:?}, {} rows)", active, target, direction, rows);
        self.scroll.scroll_to_directional(target as i64, direction, motion, now);
        self.lock.engage(now, settle);
        self.landing.start(now, settle);
        true
    }

    /// Jump straight to a record, or to its nearest image in stepped modes.
    pub fn seek(&mut self, idx: usize, now: Instant) {
        let target = if self.mode.is_stepped() {
            match self.stops.nearest(idx as i64) {
                Some(t) => t,
                None => idx,
            }
        } else {
            idx
        };
        self.clear_gestures();
        self.scroll.scroll_to_index(target as i64, Motion::Jump, now);
        if self.mode.is_stepped() {
            self.settle_landed();
            self.hold.start(now, HOLD_WINDOW);
        } else {
            self.landed = Landed::Scrolling;
            self.settle.start(now, SCROLL_SETTLE);
        }
    }

    /// Jump to the first record with `postcode`. Unknown postcodes are ignored.
    pub fn seek_postcode(&mut self, postcode: &str, now: Instant) -> bool {
        match self.catalog.index_of(postcode) {
            Some(idx) => {
                log::debug!("[seek] postcode {} -> index {}", postcode, idx);
                self.seek(idx, now);
                true
            }
            None => {
                log::debug!("[seek] postcode {} not in catalog", postcode);
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    /// Advance animation and fire due timers. Returns true while something
    /// is still moving and wants another frame soon.
    pub fn tick(&mut self, now: Instant) -> bool {
        let animating = self.scroll.tick(now);
        self.scroll.sync();

        if self.settle.fire(now) && !self.mode.is_stepped() {
            self.settle_landed();
        }
        if self.landing.fire(now) {
            self.settle_landed();
            if self.landed == Landed::Landed {
                self.hold.start(now, HOLD_WINDOW);
            }
        }
        self.hold.fire(now);
        self.lock.is_engaged(now);
        self.input.expire(now);
        animating
    }

    pub fn is_animating(&self) -> bool {
        self.scroll.is_animating()
    }

    /// Earliest pending deadline across all timers.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.settle.due(),
            self.landing.due(),
            self.hold.due(),
            self.lock.due(),
            self.input.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Drop every pending timer and any animation. Nothing fires after this.
    pub fn teardown(&mut self) {
        self.clear_gestures();
        self.scroll.cancel_animation();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::{SessionStore, SESSION_KEY, SESSION_OK};
    use crate::image_index::ImageAsset;
    use std::path::PathBuf;

    pub(crate) fn unlocked_gate() -> AuthGate {
        let mut store = SessionStore::default();
        store.set(SESSION_KEY, SESSION_OK);
        AuthGate::new("secret".into(), store)
    }

    /// Ten records 1000..=1009 with landscape images at 2, 5 and 7 and a
    /// portrait image at 9.
    pub(crate) fn gallery(mode: NavMode, pointer: PointerKind) -> GalleryState {
        let text: String = (0..10).map(|i| format!("{},Suburb{},NSW\n", 1000 + i, i)).collect();
        let catalog = PostcodeCatalog::parse(&text);
        let assets = ["landscape/1002.jpg", "landscape/1005.jpg", "landscape/1007.jpg", "portrait/1009.jpg"]
            .iter()
            .map(|r| ImageAsset::parse(Path::new(r), PathBuf::from(r)).unwrap())
            .collect();
        GalleryState::new(
            Arc::new(catalog),
            Arc::new(ImageIndex::from_assets(assets)),
            unlocked_gate(),
            ScrollConfig::default(),
            mode,
            Orientation::Landscape,
            pointer,
        )
    }

    #[test]
    fn free_scroll_lands_only_after_settle_on_image() {
        let mut g = gallery(NavMode::FreeScroll, PointerKind::Desktop);
        let t0 = Instant::now();
        g.free_scroll(2.0 * g.scroll.step(), t0);
        assert_eq!(g.active_index(), 2);
        assert!(!g.is_landed());
        g.tick(t0 + Duration::from_millis(50));
        assert!(!g.is_landed());
        g.tick(t0 + SCROLL_SETTLE);
        assert!(g.is_landed());
        assert_eq!(g.wanted_image(), Some(Path::new("landscape/1002.jpg")));

        g.free_scroll(g.scroll.step(), t0 + SCROLL_SETTLE);
        g.tick(t0 + SCROLL_SETTLE * 3);
        assert_eq!(g.active_index(), 3);
        assert!(!g.is_landed());
        assert_eq!(g.wanted_image(), None);
    }

    #[test]
    fn stepped_modes_start_on_an_image() {
        let g = gallery(NavMode::SnapToImage, PointerKind::Desktop);
        assert_eq!(g.active_index(), 2);
        assert!(g.is_landed());
    }

    #[test]
    fn desktop_step_animates_and_locks() {
        let mut g = gallery(NavMode::SnapToImage, PointerKind::Desktop);
        let t0 = Instant::now();
        assert!(g.step(Direction::Forward, t0));
        assert_eq!(g.active_index(), 5);
        assert!(g.is_animating());
        // Re-entrant gesture is swallowed.
        assert!(!g.step(Direction::Forward, t0 + Duration::from_millis(10)));

        let settle = motion::snap_duration(3);
        g.tick(t0 + settle);
        assert!(!g.is_animating());
        assert!(g.is_landed());
        assert!(g.step(Direction::Forward, t0 + settle));
        assert_eq!(g.active_index(), 7);
    }

    #[test]
    fn touch_step_jumps_immediately() {
        let mut g = gallery(NavMode::SnapToImage, PointerKind::Touch);
        let t0 = Instant::now();
        assert!(g.step(Direction::Backward, t0));
        assert_eq!(g.active_index(), 7);
        assert!(!g.is_animating());
        assert!(!g.step(Direction::Backward, t0 + Duration::from_millis(5)));
        let settle = motion::touch_settle(5);
        g.tick(t0 + settle);
        assert!(g.step(Direction::Backward, t0 + settle));
        assert_eq!(g.active_index(), 5);
    }

    #[test]
    fn hold_window_keeps_image_shell_for_near_jumps() {
        let mut g = gallery(NavMode::SnapToImage, PointerKind::Touch);
        let t0 = Instant::now();
        g.step(Direction::Forward, t0);
        let t1 = t0 + motion::touch_settle(3);
        g.tick(t1);
        assert!(g.is_landed());
        // Within the hold window, the next short jump keeps the shell up.
        assert!(g.step(Direction::Forward, t1));
        assert!(g.is_landed());

        // After the hold expires, a step drops back to typography.
        let t2 = t1 + motion::touch_settle(2);
        g.tick(t2);
        let t3 = t2 + HOLD_WINDOW + Duration::from_millis(1);
        g.tick(t3);
        assert!(g.step(Direction::Forward, t3));
        assert!(!g.is_landed());
    }

    #[test]
    fn images_only_is_always_landed() {
        let mut g = gallery(NavMode::ImagesOnly, PointerKind::Desktop);
        let t0 = Instant::now();
        assert!(g.is_landed());
        g.step(Direction::Forward, t0);
        assert!(g.is_landed());
        g.seek(0, t0 + Duration::from_secs(5));
        assert_eq!(g.active_index(), 2);
    }

    #[test]
    fn seek_uses_nearest_image_in_stepped_modes() {
        let mut g = gallery(NavMode::SnapToImage, PointerKind::Desktop);
        let t0 = Instant::now();
        assert!(g.seek_postcode("1009", t0));
        // From 9, record 7 is two away and record 2 is three (around the ring).
        assert_eq!(g.active_index(), 7);
        assert!(!g.seek_postcode("4000", t0));
        assert_eq!(g.active_index(), 7);

        let mut free = gallery(NavMode::FreeScroll, PointerKind::Desktop);
        free.seek_postcode("1009", t0);
        assert_eq!(free.active_index(), 9);
    }

    #[test]
    fn orientation_switch_rebuilds_stops() {
        let mut g = gallery(NavMode::SnapToImage, PointerKind::Desktop);
        let t0 = Instant::now();
        g.toggle_orientation(t0);
        assert_eq!(g.stops().as_slice(), &[9]);
        assert_eq!(g.active_index(), 9);
        assert_eq!(g.active_image(), Some(Path::new("portrait/1009.jpg")));
        // Rail still counts landscape-only records as having an image.
        assert!(g.images().has_any_image(2));
        assert!(!g.images().has_image(2));
    }

    #[test]
    fn switching_to_free_scroll_cancels_animation() {
        let mut g = gallery(NavMode::SnapToImage, PointerKind::Desktop);
        let t0 = Instant::now();
        g.step(Direction::Forward, t0);
        g.set_mode(NavMode::FreeScroll, t0 + Duration::from_millis(20));
        assert!(!g.is_animating());
        assert_eq!(g.next_deadline(), None);
    }

    #[test]
    fn teardown_leaves_no_deadlines() {
        let mut g = gallery(NavMode::SnapToImage, PointerKind::Desktop);
        let t0 = Instant::now();
        g.step(Direction::Forward, t0);
        assert!(g.next_deadline().is_some());
        g.teardown();
        assert_eq!(g.next_deadline(), None);
        assert!(!g.is_animating());
    }

    #[test]
    fn locked_gallery_shows_no_image() {
        let text = "1002,a,b\n";
        let assets = vec![ImageAsset::parse(Path::new("1002.jpg"), PathBuf::from("1002.jpg")).unwrap()];
        let g = GalleryState::new(
            Arc::new(PostcodeCatalog::parse(text)),
            Arc::new(ImageIndex::from_assets(assets)),
            AuthGate::new("pw".into(), SessionStore::default()),
            ScrollConfig::default(),
            NavMode::ImagesOnly,
            Orientation::Landscape,
            PointerKind::Desktop,
        );
        assert!(g.active_image().is_some());
        assert_eq!(g.wanted_image(), None);
    }

    #[test]
    fn empty_catalog_is_inert() {
        let mut g = GalleryState::new(
            Arc::new(PostcodeCatalog::parse("")),
            Arc::new(ImageIndex::default()),
            unlocked_gate(),
            ScrollConfig::default(),
            NavMode::SnapToImage,
            Orientation::Landscape,
            PointerKind::Desktop,
        );
        let t0 = Instant::now();
        assert!(!g.step(Direction::Forward, t0));
        g.free_scroll(100.0, t0);
        assert!(g.active_record().is_none());
        assert_eq!(g.wanted_image(), None);
    }
}

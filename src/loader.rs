use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use winit::event_loop::EventLoopProxy;

use crate::error::DecodeError;

/// Longest edge kept after decode. Photos are shown full-window, never 1:1.
const MAX_DECODE_DIM: u32 = 2560;

// ---------------------------------------------------------------------------
// Decoded image data
// ---------------------------------------------------------------------------

pub struct DecodedImage {
    pub rgba_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Quarter turns counter-clockwise needed to display upright.
    pub rotation: u8,
    pub file_size: u64,
    pub format_name: String,
}

impl DecodedImage {
    pub fn mem_size(&self) -> u64 {
        self.rgba_bytes.len() as u64
    }
}

/// Map the EXIF orientation tag to counter-clockwise quarter turns.
/// Mirrored variants are shown unmirrored.
fn exif_rotation(path: &Path) -> u8 {
    let Ok(file) = fs::File::open(path) else { return 0 };
    let mut reader = BufReader::new(file);
    let Ok(meta) = exif::Reader::new().read_from_container(&mut reader) else {
        return 0;
    };
    let orientation = meta
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0));
    match orientation {
        Some(3) | Some(4) => 2,
        Some(5) | Some(6) => 3,
        Some(7) | Some(8) => 1,
        _ => 0,
    }
}

pub fn decode_image(path: &Path) -> Result<DecodedImage, DecodeError> {
    let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let img = image::open(path).map_err(|source| DecodeError::Image {
        path: path.to_path_buf(),
        source,
    })?;

    let format_name = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("unknown")
        .to_uppercase();

    let img = if img.width() > MAX_DECODE_DIM || img.height() > MAX_DECODE_DIM {
        img.thumbnail(MAX_DECODE_DIM, MAX_DECODE_DIM)
    } else {
        img
    };
    let (width, height) = (img.width(), img.height());

    Ok(DecodedImage {
        rgba_bytes: img.to_rgba8().into_raw(),
        width,
        height,
        rotation: exif_rotation(path),
        file_size,
        format_name,
    })
}

// ---------------------------------------------------------------------------
// Cache state (shared between UI and worker threads via Mutex + Condvar)
// ---------------------------------------------------------------------------

/// A decode request. Display requests carry the ticket they were issued
/// under; prefetches carry none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub path: PathBuf,
    pub ticket: Option<u64>,
}

pub struct CacheState {
    pub images: HashMap<PathBuf, Arc<DecodedImage>>,
    /// Insertion order, oldest first, for eviction.
    order: VecDeque<PathBuf>,
    queue: VecDeque<Request>,
    pub in_progress: HashSet<PathBuf>,
    pub errors: HashMap<PathBuf, String>,
    /// Never evicted: the image the UI currently wants, with its ticket.
    pinned: Option<(PathBuf, u64)>,
    pub used_bytes: u64,
    pub budget: u64,
}

pub type SharedState = Arc<(Mutex<CacheState>, Condvar)>;

impl CacheState {
    pub fn new(budget: u64) -> Self {
        Self {
            images: HashMap::new(),
            order: VecDeque::new(),
            queue: VecDeque::new(),
            in_progress: HashSet::new(),
            errors: HashMap::new(),
            pinned: None,
            used_bytes: 0,
            budget,
        }
    }

    pub fn get(&self, path: &Path) -> Option<Arc<DecodedImage>> {
        self.images.get(path).cloned()
    }

    fn is_known(&self, path: &Path) -> bool {
        self.images.contains_key(path)
            || self.errors.contains_key(path)
            || self.in_progress.contains(path)
    }

    /// Queue the image the UI is waiting on, ahead of any prefetches. Older
    /// display requests are dropped: their tickets can no longer commit.
    pub fn request_display(&mut self, path: &Path, ticket: u64) {
        self.pin(path, ticket);
        self.queue.retain(|r| r.ticket.is_none() && r.path != path);
        if !self.is_known(path) {
            self.queue.push_front(Request {
                path: path.to_path_buf(),
                ticket: Some(ticket),
            });
        }
    }

    /// Replace pending prefetches with `paths`, skipping anything already
    /// cached, failed or in flight.
    pub fn request_prefetch(&mut self, paths: &[PathBuf]) {
        self.queue.retain(|r| r.ticket.is_some());
        for p in paths {
            if !self.is_known(p) && !self.queue.iter().any(|r| &r.path == p) {
                self.queue.push_back(Request {
                    path: p.clone(),
                    ticket: None,
                });
            }
        }
    }

    fn pin(&mut self, path: &Path, ticket: u64) {
        self.pinned = Some((path.to_path_buf(), ticket));
    }

    /// Ticket a finished decode should report. A decode already in flight
    /// when the UI asked for it answers the newer ticket.
    pub fn completion_ticket(&self, req: &Request) -> Option<u64> {
        match &self.pinned {
            Some((p, t)) if *p == req.path => Some(*t),
            _ => req.ticket,
        }
    }

    pub fn find_work(&mut self) -> Option<Request> {
        while let Some(req) = self.queue.pop_front() {
            if !self.is_known(&req.path) {
                return Some(req);
            }
        }
        None
    }

    pub fn insert(&mut self, path: PathBuf, decoded: DecodedImage) {
        if let Some(old) = self.images.remove(&path) {
            self.used_bytes -= old.mem_size();
            self.order.retain(|p| p != &path);
        }
        self.used_bytes += decoded.mem_size();
        self.images.insert(path.clone(), Arc::new(decoded));
        self.order.push_back(path);
        self.evict_oldest();
    }

    fn evict_oldest(&mut self) {
        while self.used_bytes > self.budget && self.images.len() > 1 {
            let pos = self
                .order
                .iter()
                .position(|p| self.pinned.as_ref().is_none_or(|(pinned, _)| pinned != p));
            let Some(pos) = pos else { break };
            let Some(evict) = self.order.remove(pos) else { break };
            if let Some(img) = self.images.remove(&evict) {
                self.used_bytes -= img.mem_size();
                log::debug!("evicted {:?}", evict);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Display gate: only the newest request may replace the shown image
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct DisplayGate {
    ticket: u64,
    wanted: Option<PathBuf>,
    shown: Option<(PathBuf, Arc<DecodedImage>)>,
}

impl DisplayGate {
    /// Record a new wanted image. Returns the ticket for it when it differs
    /// from the current one.
    pub fn begin(&mut self, path: Option<&Path>) -> Option<u64> {
        if self.wanted.as_deref() == path {
            return None;
        }
        self.ticket += 1;
        self.wanted = path.map(Path::to_path_buf);
        path.map(|_| self.ticket)
    }

    /// Show `image` if it answers the latest ticket. Stale completions are
    /// dropped.
    pub fn commit(&mut self, ticket: u64, path: &Path, image: Arc<DecodedImage>) -> bool {
        if ticket != self.ticket || self.wanted.as_deref() != Some(path) {
            log::trace!("stale image ticket {} for {:?}", ticket, path);
            return false;
        }
        self.shown = Some((path.to_path_buf(), image));
        true
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// The committed image, if it is the one currently wanted.
    pub fn current(&self) -> Option<&DecodedImage> {
        match (&self.shown, &self.wanted) {
            (Some((p, img)), Some(w)) if p == w => Some(img.as_ref()),
            _ => None,
        }
    }
}

/// Point the gate at `path`, committing straight from cache when possible
/// and otherwise queueing a display decode.
pub fn show_image(gate: &mut DisplayGate, shared: &SharedState, path: Option<&Path>) -> bool {
    let Some(path) = path else {
        gate.begin(None);
        return false;
    };
    let Some(ticket) = gate.begin(Some(path)) else { return false };

    let (lock, cvar) = &**shared;
    let Ok(mut state) = lock.lock() else { return false };
    if let Some(img) = state.get(path) {
        state.pin(path, ticket);
        drop(state);
        return gate.commit(ticket, path, img);
    }
    state.request_display(path, ticket);
    cvar.notify_all();
    false
}

/// Handle a worker completion. Returns true if the shown image changed.
pub fn on_image_ready(gate: &mut DisplayGate, shared: &SharedState, path: &Path, ticket: Option<u64>) -> bool {
    // Plain prefetches only warm the cache.
    let Some(ticket) = ticket else { return false };
    if ticket != gate.ticket() {
        return false;
    }
    let (lock, _) = &**shared;
    let Ok(state) = lock.lock() else { return false };
    if let Some(img) = state.get(path) {
        drop(state);
        gate.commit(ticket, path, img)
    } else {
        if let Some(err) = state.errors.get(path) {
            log::warn!("Could not load: {}", err);
        }
        false
    }
}

// ---------------------------------------------------------------------------
// User event for waking the UI from worker threads
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum UserEvent {
    ImageReady { path: PathBuf, ticket: Option<u64> },
}

// ---------------------------------------------------------------------------
// Background decode workers
// ---------------------------------------------------------------------------

pub fn spawn_decode_workers(shared: SharedState, proxy: EventLoopProxy<UserEvent>, num_threads: usize) {
    for _ in 0..num_threads {
        let shared = Arc::clone(&shared);
        let proxy = proxy.clone();
        thread::spawn(move || {
            loop {
                let req = {
                    let (lock, cvar) = &*shared;
                    let Ok(mut state) = lock.lock() else { return };
                    loop {
                        if let Some(req) = state.find_work() {
                            state.in_progress.insert(req.path.clone());
                            break req;
                        }
                        state = match cvar.wait(state) {
                            Ok(s) => s,
                            Err(_) => return,
                        };
                    }
                };

                let result = decode_image(&req.path);

                let ticket = {
                    let (lock, cvar) = &*shared;
                    let Ok(mut state) = lock.lock() else { return };
                    state.in_progress.remove(&req.path);
                    match result {
                        Ok(decoded) => state.insert(req.path.clone(), decoded),
                        Err(e) => {
                            log::warn!("{}", e);
                            state.errors.insert(req.path.clone(), e.to_string());
                        }
                    }
                    cvar.notify_all();
                    state.completion_ticket(&req)
                };

                if proxy
                    .send_event(UserEvent::ImageReady {
                        path: req.path,
                        ticket,
                    })
                    .is_err()
                {
                    // Event loop is gone.
                    return;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake(bytes: usize) -> DecodedImage {
        DecodedImage {
            rgba_bytes: vec![0; bytes],
            width: 1,
            height: 1,
            rotation: 0,
            file_size: 0,
            format_name: "PNG".into(),
        }
    }

    #[test]
    fn stale_ticket_cannot_commit() {
        let mut gate = DisplayGate::default();
        let a = PathBuf::from("a.jpg");
        let b = PathBuf::from("b.jpg");
        let t1 = gate.begin(Some(&a)).unwrap();
        let t2 = gate.begin(Some(&b)).unwrap();
        assert!(t2 > t1);
        assert!(!gate.commit(t1, &a, Arc::new(fake(4))));
        assert!(gate.current().is_none());
        assert!(gate.commit(t2, &b, Arc::new(fake(4))));
        assert!(gate.current().is_some());
    }

    #[test]
    fn same_path_does_not_reissue_ticket() {
        let mut gate = DisplayGate::default();
        let a = PathBuf::from("a.jpg");
        assert!(gate.begin(Some(&a)).is_some());
        assert!(gate.begin(Some(&a)).is_none());
        assert_eq!(gate.begin(None), None);
        assert!(gate.wanted.is_none());
    }

    #[test]
    fn current_hides_image_for_other_path() {
        let mut gate = DisplayGate::default();
        let a = PathBuf::from("a.jpg");
        let t = gate.begin(Some(&a)).unwrap();
        gate.commit(t, &a, Arc::new(fake(4)));
        gate.begin(Some(Path::new("b.jpg")));
        assert!(gate.current().is_none());
        assert!(gate.shown.is_some());
    }

    #[test]
    fn display_requests_jump_the_queue() {
        let mut cs = CacheState::new(1024);
        cs.request_prefetch(&[PathBuf::from("p1"), PathBuf::from("p2")]);
        cs.request_display(Path::new("d1"), 1);
        cs.request_display(Path::new("d2"), 2);
        let first = cs.find_work().unwrap();
        assert_eq!(first, Request { path: "d2".into(), ticket: Some(2) });
        assert_eq!(cs.find_work().unwrap().path, PathBuf::from("p1"));
        assert_eq!(cs.find_work().unwrap().path, PathBuf::from("p2"));
        assert!(cs.find_work().is_none());
    }

    #[test]
    fn prefetch_skips_known_paths() {
        let mut cs = CacheState::new(1024);
        cs.insert("cached".into(), fake(4));
        cs.in_progress.insert("busy".into());
        cs.request_prefetch(&["cached".into(), "busy".into(), "new".into(), "new".into()]);
        assert_eq!(cs.find_work().unwrap().path, PathBuf::from("new"));
        assert!(cs.find_work().is_none());
    }

    #[test]
    fn eviction_keeps_pinned_image() {
        let mut cs = CacheState::new(100);
        cs.request_display(Path::new("pinned"), 1);
        cs.find_work();
        cs.insert("pinned".into(), fake(60));
        cs.insert("old".into(), fake(30));
        cs.insert("new".into(), fake(30));
        assert!(cs.images.contains_key(Path::new("pinned")));
        assert!(!cs.images.contains_key(Path::new("old")));
        assert!(cs.images.contains_key(Path::new("new")));
        assert_eq!(cs.used_bytes, 90);
    }

    #[test]
    fn show_image_commits_from_cache() {
        let shared: SharedState = Arc::new((Mutex::new(CacheState::new(1024)), Condvar::new()));
        shared.0.lock().unwrap().insert("a.jpg".into(), fake(4));
        let mut gate = DisplayGate::default();
        assert!(show_image(&mut gate, &shared, Some(Path::new("a.jpg"))));
        assert!(gate.current().is_some());

        assert!(!show_image(&mut gate, &shared, Some(Path::new("b.jpg"))));
        assert_eq!(shared.0.lock().unwrap().find_work().unwrap().path, PathBuf::from("b.jpg"));
        shared.0.lock().unwrap().insert("b.jpg".into(), fake(4));
        let stale = gate.ticket() - 1;
        assert!(!on_image_ready(&mut gate, &shared, Path::new("b.jpg"), Some(stale)));
        assert!(!on_image_ready(&mut gate, &shared, Path::new("b.jpg"), None));
        let ticket = gate.ticket();
        assert!(on_image_ready(&mut gate, &shared, Path::new("b.jpg"), Some(ticket)));
    }

    #[test]
    fn in_flight_decode_answers_newest_ticket() {
        let mut cs = CacheState::new(1024);
        cs.request_prefetch(&["a.jpg".into()]);
        let req = cs.find_work().unwrap();
        cs.in_progress.insert(req.path.clone());
        cs.request_display(Path::new("a.jpg"), 7);
        // Already in flight, so nothing new is queued.
        assert!(cs.find_work().is_none());
        assert_eq!(cs.completion_ticket(&req), Some(7));
        cs.request_display(Path::new("b.jpg"), 8);
        assert_eq!(cs.completion_ticket(&req), None);
    }
}

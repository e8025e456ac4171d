mod auth;
mod catalog;
mod cli;
mod error;
mod files;
mod image_index;
mod loader;
mod resolver;
mod scroll;
mod timer;
mod ui;

use clap::Parser;
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};
use winit::event_loop::EventLoop;

use crate::auth::{AuthGate, SessionStore};
use crate::catalog::{load_catalog, PostcodeCatalog};
use crate::cli::{default_memory_budget, parse_memory_budget, Cli};
use crate::image_index::{ImageIndex, Orientation};
use crate::loader::{spawn_decode_workers, CacheState, SharedState, UserEvent};
use crate::resolver::resolve;
use crate::scroll::ScrollConfig;
use crate::ui::state::{GalleryState, PointerKind};
use crate::ui::App;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let catalog = match load_catalog(cli.catalog.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{}", e);
            PostcodeCatalog::default()
        }
    };
    let index = ImageIndex::build(&cli.assets, cli.follow_links);
    if index.is_empty() {
        log::warn!("no images indexed under {}, showing typography only", cli.assets.display());
    }

    if cli.list {
        print_listing(&catalog, &index);
        return;
    }

    let budget = match cli.memory.as_deref() {
        Some(s) => parse_memory_budget(s).unwrap_or_else(|| {
            log::warn!("could not parse memory budget {:?}, using default", s);
            default_memory_budget()
        }),
        None => default_memory_budget(),
    };
    log::info!("image cache budget {} MB", budget / (1024 * 1024));

    let shared: SharedState = Arc::new((Mutex::new(CacheState::new(budget)), Condvar::new()));

    let num_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .clamp(2, 4);

    let event_loop = match EventLoop::<UserEvent>::with_user_event().build() {
        Ok(el) => el,
        Err(e) => {
            log::error!("could not create event loop: {}", e);
            return;
        }
    };
    let proxy = event_loop.create_proxy();
    spawn_decode_workers(Arc::clone(&shared), proxy, num_threads);

    let pointer = if cli.touch { PointerKind::Touch } else { PointerKind::Desktop };
    let scroll_cfg = ScrollConfig {
        step: cli.step,
        ..ScrollConfig::default()
    };
    let state = GalleryState::new(
        Arc::new(catalog),
        Arc::new(index),
        AuthGate::new(cli.password, SessionStore::default()),
        scroll_cfg,
        cli.mode,
        cli.orientation,
        pointer,
    );

    let mut app = App::new(state, shared);
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("event loop failed: {}", e);
    }
}

fn print_listing(catalog: &PostcodeCatalog, index: &ImageIndex) {
    let show = |p: Option<&Path>| p.map_or_else(|| "-".to_string(), |p| p.display().to_string());
    for rec in catalog.records() {
        let landscape = resolve(index, &rec.postcode, &rec.suburb, Orientation::Landscape);
        let portrait = resolve(index, &rec.postcode, &rec.suburb, Orientation::Portrait);
        println!(
            "{}\t{}\t{}\t{}\t{}",
            rec.postcode,
            rec.suburb,
            rec.state,
            show(landscape),
            show(portrait)
        );
    }
}

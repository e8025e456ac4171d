use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, MouseScrollDelta, Touch, TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Fullscreen, Window, WindowId};
use softbuffer::Surface;

use crate::loader::{on_image_ready, show_image, DisplayGate, SharedState, UserEvent};
use crate::ui::input::{KeyInput, KeyOutcome, LINE_PX};
use crate::ui::state::GalleryState;

pub mod input;
pub mod render;
pub mod state;
pub mod view;

/// Frame interval while a scroll animation is running.
const FRAME: Duration = Duration::from_millis(16);

// ---------------------------------------------------------------------------
// Application handler (winit 0.30 style)
// ---------------------------------------------------------------------------

pub struct App {
    pub state: GalleryState,
    shared: SharedState,
    display: DisplayGate,
    window: Option<Arc<Window>>,
    _context: Option<softbuffer::Context<Arc<Window>>>,
    surface: Option<Surface<Arc<Window>, Arc<Window>>>,
    next_redraw: Option<Instant>,
}

impl App {
    pub fn new(state: GalleryState, shared: SharedState) -> Self {
        Self {
            state,
            shared,
            display: DisplayGate::default(),
            window: None,
            _context: None,
            surface: None,
            next_redraw: None,
        }
    }

    fn request_redraw(&self) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn toggle_fullscreen(&self) {
        if let Some(ref window) = self.window {
            let next = match window.fullscreen() {
                Some(_) => None,
                None => Some(Fullscreen::Borderless(None)),
            };
            window.set_fullscreen(next);
        }
    }

    /// Point the display at whatever the state wants and warm the cache with
    /// the neighbouring image stops.
    fn sync_images(&mut self) {
        show_image(&mut self.display, &self.shared, self.state.wanted_image());

        let ahead: Vec<PathBuf> = self.state.prefetch_images().into_iter().map(PathBuf::from).collect();
        if ahead.is_empty() {
            return;
        }
        let (lock, cvar) = &*self.shared;
        if let Ok(mut cache) = lock.lock() {
            cache.request_prefetch(&ahead);
            cvar.notify_all();
        }
    }

    fn on_key(&mut self, event_loop: &ActiveEventLoop, key: KeyInput) {
        match self.state.on_key(key, Instant::now()) {
            KeyOutcome::Quit => {
                self.state.teardown();
                event_loop.exit();
            }
            KeyOutcome::ToggleFullscreen => self.toggle_fullscreen(),
            KeyOutcome::Handled | KeyOutcome::Ignored => {}
        }
    }
}

fn translate_key(key: &Key) -> Option<KeyInput> {
    match key {
        Key::Named(NamedKey::ArrowUp) => Some(KeyInput::ArrowUp),
        Key::Named(NamedKey::ArrowDown) => Some(KeyInput::ArrowDown),
        Key::Named(NamedKey::Enter) => Some(KeyInput::Enter),
        Key::Named(NamedKey::Backspace) => Some(KeyInput::Backspace),
        Key::Named(NamedKey::Escape) => Some(KeyInput::Escape),
        Key::Named(NamedKey::Space) => Some(KeyInput::Char(' ')),
        Key::Character(s) => s.chars().next().map(KeyInput::Char),
        _ => None,
    }
}

impl ApplicationHandler<UserEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title("postcode gallery")
            .with_inner_size(LogicalSize::new(1280u32, 800u32));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("could not create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        let context = match softbuffer::Context::new(Arc::clone(&window)) {
            Ok(c) => c,
            Err(e) => {
                log::error!("could not create softbuffer context: {}", e);
                event_loop.exit();
                return;
            }
        };
        let surface = match Surface::new(&context, Arc::clone(&window)) {
            Ok(s) => s,
            Err(e) => {
                log::error!("could not create surface: {}", e);
                event_loop.exit();
                return;
            }
        };

        window.request_redraw();
        self.window = Some(window);
        self._context = Some(context);
        self.surface = Some(surface);
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::ImageReady { path, ticket } => {
                if on_image_ready(&mut self.display, &self.shared, &path, ticket) {
                    self.request_redraw();
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let now = Instant::now();
        match event {
            WindowEvent::CloseRequested => {
                self.state.teardown();
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let (Some(surface), Some(w), Some(h)) = (
                    self.surface.as_mut(),
                    NonZeroU32::new(size.width),
                    NonZeroU32::new(size.height),
                ) {
                    if let Err(e) = surface.resize(w, h) {
                        log::warn!("surface resize failed: {}", e);
                    }
                }
                self.request_redraw();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return;
                }
                if let Some(key) = translate_key(&event.logical_key) {
                    self.on_key(event_loop, key);
                }
                self.request_redraw();
            }

            WindowEvent::MouseWheel { delta, .. } => {
                // winit reports positive y for scrolling up; the gallery
                // treats positive as forward (down the list).
                let px = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -(y as f64) * LINE_PX,
                    MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => -y,
                };
                self.state.on_wheel(px, now);
                self.request_redraw();
            }

            WindowEvent::Touch(Touch { phase, location, .. }) => {
                match phase {
                    TouchPhase::Started => self.state.on_touch_start(location.y, now),
                    TouchPhase::Moved => self.state.on_touch_move(location.y, now),
                    TouchPhase::Ended | TouchPhase::Cancelled => self.state.on_touch_end(now),
                }
                self.request_redraw();
            }

            WindowEvent::CursorMoved { .. } | WindowEvent::MouseInput { .. } => {
                self.state.on_pointer_moved();
            }

            WindowEvent::RedrawRequested => {
                let Some(window) = self.window.clone() else { return };
                let animating = self.state.tick(now);
                self.sync_images();

                if let Some(ref mut surface) = self.surface {
                    let size = window.inner_size();
                    let fb_w = size.width.max(1);
                    let fb_h = size.height.max(1);
                    if let Ok(mut buffer) = surface.buffer_mut() {
                        self.state.render(&mut buffer, fb_w, fb_h, self.display.current());
                        if let Err(e) = buffer.present() {
                            log::warn!("present failed: {}", e);
                        }
                    }
                }

                self.next_redraw = if animating {
                    Some(now + FRAME)
                } else {
                    self.state.next_deadline()
                };
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(when) = self.next_redraw {
            if Instant::now() >= when {
                self.next_redraw = None;
                self.request_redraw();
            } else {
                event_loop.set_control_flow(ControlFlow::WaitUntil(when));
            }
        } else {
            event_loop.set_control_flow(ControlFlow::Wait);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_translate_without_folding_case() {
        assert_eq!(translate_key(&Key::Named(NamedKey::ArrowDown)), Some(KeyInput::ArrowDown));
        assert_eq!(translate_key(&Key::Character("Q".into())), Some(KeyInput::Char('Q')));
        assert_eq!(translate_key(&Key::Named(NamedKey::Tab)), None);
    }
}

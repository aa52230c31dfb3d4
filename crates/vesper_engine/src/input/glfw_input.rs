//! GLFW window as an input source

use super::{InputDispatcher, InputEvent, InputSource, ThreadAffinity};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Window and input errors
#[derive(Error, Debug)]
pub enum InputError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed: {0}")]
    InitializationFailed(String),

    /// The window could not be created
    #[error("Window creation failed")]
    CreationFailed,
}

struct GlfwState {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

/// Vulkan-ready GLFW window whose events feed an [`InputDispatcher`]
///
/// Create it on the main thread. On macOS, GLFW only processes events there,
/// so `poll_events` from any other thread logs an error and does nothing;
/// poll it from the main thread instead of attaching it to a scene bridge.
pub struct GlfwInput {
    state: Mutex<GlfwState>,
    dispatcher: Arc<InputDispatcher>,
    affinity: ThreadAffinity,
    wrong_thread_reported: AtomicBool,
}

// GLFW handles are only touched while holding `state`, and never off the
// creating thread on platforms that pin event processing to it.
unsafe impl Send for GlfwInput {}
unsafe impl Sync for GlfwInput {}

impl GlfwInput {
    /// Open a window without a client API
    pub fn new(
        title: &str,
        width: u32,
        height: u32,
        dispatcher: Arc<InputDispatcher>,
    ) -> Result<Self, InputError> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|e| InputError::InitializationFailed(format!("{e:?}")))?;

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(InputError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_cursor_pos_polling(true);
        window.set_mouse_button_polling(true);
        window.set_scroll_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        log::info!("Window '{title}' created ({width}x{height})");

        Ok(Self {
            state: Mutex::new(GlfwState {
                glfw,
                window,
                events,
            }),
            dispatcher,
            affinity: ThreadAffinity::current(cfg!(target_os = "macos")),
            wrong_thread_reported: AtomicBool::new(false),
        })
    }

    /// True once the user asked to close the window
    pub fn should_close(&self) -> bool {
        self.state.lock().window.should_close()
    }

    /// Vulkan instance extensions GLFW needs for surface creation
    pub fn required_instance_extensions(&self) -> Vec<String> {
        self.state
            .lock()
            .glfw
            .get_required_instance_extensions()
            .unwrap_or_default()
    }
}

impl InputSource for GlfwInput {
    fn poll_events(&self) {
        if !self.affinity.allows_current() {
            if !self.wrong_thread_reported.swap(true, Ordering::Relaxed) {
                log::error!(
                    "GLFW events must be polled on thread {:?}, skipping",
                    self.affinity.owner()
                );
            }
            return;
        }

        let translated: Vec<InputEvent> = {
            let mut state = self.state.lock();
            state.glfw.poll_events();
            glfw::flush_messages(&state.events)
                .filter_map(|(_, event)| translate(event))
                .collect()
        };

        for event in &translated {
            self.dispatcher.dispatch(event);
        }
    }
}

fn translate(event: glfw::WindowEvent) -> Option<InputEvent> {
    use glfw::{Action, WindowEvent};

    Some(match event {
        WindowEvent::Key(key, scancode, action, _) => InputEvent::Key {
            key: key as i32,
            scancode,
            pressed: action != Action::Release,
        },
        WindowEvent::CursorPos(x, y) => InputEvent::MouseMove { x, y },
        WindowEvent::MouseButton(button, action, _) => InputEvent::MouseButton {
            button: button as i32,
            pressed: action == Action::Press,
        },
        WindowEvent::Scroll(x, y) => InputEvent::Scroll { x, y },
        WindowEvent::Close => InputEvent::WindowClose,
        WindowEvent::FramebufferSize(width, height) => InputEvent::WindowResize { width, height },
        _ => return None,
    })
}

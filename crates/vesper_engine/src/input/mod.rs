//! Input collaborator
//!
//! The scene bridge polls an [`InputSource`] once per submit, outside its
//! locks. Sources translate platform events into [`InputEvent`]s and hand them
//! to an [`InputDispatcher`].

#[cfg(feature = "windowing")]
mod glfw_input;

#[cfg(feature = "windowing")]
pub use glfw_input::{GlfwInput, InputError};

use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Anything that can pump pending input events
///
/// The scene bridge calls `poll_events` from the simulation thread.
pub trait InputSource: Send + Sync {
    /// Process all pending events
    fn poll_events(&self);
}

/// Thread a source was created on, and whether polling is restricted to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAffinity {
    owner: ThreadId,
    pinned: bool,
}

impl ThreadAffinity {
    /// Record the calling thread; `pinned` restricts polling to it
    pub fn current(pinned: bool) -> Self {
        Self {
            owner: thread::current().id(),
            pinned,
        }
    }

    /// Thread the source was created on
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// True when the calling thread may poll
    pub fn allows_current(&self) -> bool {
        !self.pinned || thread::current().id() == self.owner
    }
}

/// Platform-independent input event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Keyboard key changed state
    Key {
        /// Platform key code
        key: i32,
        /// Platform scancode
        scancode: i32,
        /// Pressed or repeating, as opposed to released
        pressed: bool,
    },
    /// Cursor moved, in window coordinates
    MouseMove {
        /// Horizontal position
        x: f64,
        /// Vertical position
        y: f64,
    },
    /// Mouse button changed state
    MouseButton {
        /// Platform button index
        button: i32,
        /// Pressed, as opposed to released
        pressed: bool,
    },
    /// Scroll wheel or touchpad scroll
    Scroll {
        /// Horizontal offset
        x: f64,
        /// Vertical offset
        y: f64,
    },
    /// Window close requested
    WindowClose,
    /// Framebuffer resized
    WindowResize {
        /// New width in pixels
        width: i32,
        /// New height in pixels
        height: i32,
    },
}

/// Receives dispatched input events
pub trait InputHandler: Send + Sync {
    /// Handle an event; returning true stops it from reaching later handlers
    fn handle(&self, event: &InputEvent) -> bool;
}

/// Ordered list of input handlers
#[derive(Default)]
pub struct InputDispatcher {
    handlers: RwLock<Vec<Arc<dyn InputHandler>>>,
}

impl InputDispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler
    pub fn subscribe(&self, handler: Arc<dyn InputHandler>) {
        self.handlers.write().push(handler);
    }

    /// Remove a handler previously subscribed
    pub fn unsubscribe(&self, handler: &Arc<dyn InputHandler>) {
        self.handlers.write().retain(|h| !Arc::ptr_eq(h, handler));
    }

    /// Offer an event to each handler in order; true if one consumed it
    pub fn dispatch(&self, event: &InputEvent) -> bool {
        let handlers = self.handlers.read().clone();
        handlers.iter().any(|handler| handler.handle(event))
    }
}

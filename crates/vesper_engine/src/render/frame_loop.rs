use super::backend::{FrameBackend, RenderError};
use crate::config::RenderConfig;
use crate::foundation::sync::{RunFlag, StopHandle};
use crate::foundation::time::FrameRateMonitor;
use crate::scene::{DrawnState, SceneBridge};
use std::sync::Arc;

/// Render thread driver
///
/// Owns the drawn scene and the descriptor table; nothing else touches them.
pub struct FrameLoop<B: FrameBackend> {
    backend: B,
    bridge: Arc<SceneBridge<B::Descriptor>>,
    drawn: DrawnState<B::Descriptor>,
    frames_in_flight: usize,
    current_slot: usize,
    min_fps: u32,
    fps: FrameRateMonitor,
    run_flag: Arc<RunFlag>,
    frames_drawn: u64,
}

impl<B: FrameBackend> FrameLoop<B> {
    /// Create a frame loop drawing from `bridge`
    pub fn new(backend: B, bridge: Arc<SceneBridge<B::Descriptor>>, config: &RenderConfig) -> Self {
        Self {
            backend,
            bridge,
            drawn: DrawnState::new(),
            frames_in_flight: config.frames_in_flight.max(1),
            current_slot: 0,
            min_fps: config.min_fps_warning,
            fps: FrameRateMonitor::new(),
            run_flag: Arc::new(RunFlag::new()),
            frames_drawn: 0,
        }
    }

    /// The backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The render thread's scene and descriptor table
    pub fn drawn(&self) -> &DrawnState<B::Descriptor> {
        &self.drawn
    }

    /// Slot the next frame will use
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Frames drawn so far
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Handle that stops [`main_loop`](Self::main_loop) from another thread
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(Arc::clone(&self.run_flag))
    }

    /// Request the loop to return after the current frame
    pub fn stop(&self) {
        self.run_flag.request_stop();
    }

    /// Draw one frame
    pub fn draw_frame(&mut self) -> Result<(), RenderError> {
        let slot = self.current_slot;
        self.backend.begin_frame(slot)?;

        let backend = &mut self.backend;
        self.drawn.retire(slot, |descriptor| backend.destroy_descriptor(descriptor));

        self.bridge.load_to_drawn(&mut self.drawn);

        for &model in &self.drawn.scene().removed_models {
            self.backend.release_model(model);
        }
        for model in &self.drawn.scene().models {
            self.backend.update_model(slot, model);
        }

        self.backend.record_and_submit(slot, &self.drawn)?;

        self.current_slot = (slot + 1) % self.frames_in_flight;
        self.frames_drawn += 1;
        Ok(())
    }

    /// Draw frames until stopped, then wait for the GPU to go idle
    ///
    /// A stop requested before this is entered makes it return immediately.
    pub fn main_loop(&mut self) -> Result<(), RenderError> {
        if !self.run_flag.enter() {
            return Ok(());
        }
        log::info!("Frame loop started");

        let result = self.run_frames();
        self.run_flag.exit();

        let idle = self.backend.wait_idle();
        log::info!("Frame loop stopped after {} frames", self.frames_drawn);
        result.and(idle)
    }

    fn run_frames(&mut self) -> Result<(), RenderError> {
        while self.run_flag.is_running() {
            self.draw_frame()?;

            if let Some(frames) = self.fps.frame() {
                if frames < self.min_fps {
                    log::warn!("FPS {frames}");
                }
            }
        }
        Ok(())
    }

    /// Wait for the GPU and destroy every live and pending descriptor
    pub fn shutdown(&mut self) -> Result<(), RenderError> {
        self.backend.wait_idle()?;

        let descriptors = self.drawn.drain_all();
        if !descriptors.is_empty() {
            log::debug!("Destroying {} model descriptors", descriptors.len());
        }
        for descriptor in descriptors {
            self.backend.destroy_descriptor(descriptor);
        }
        Ok(())
    }
}

impl<B: FrameBackend> Drop for FrameLoop<B> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!("Frame loop shutdown failed: {err}");
        }
    }
}

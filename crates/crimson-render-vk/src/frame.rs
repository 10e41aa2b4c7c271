// SPDX-License-Identifier: CEPL-1.0
//! One iteration of acquire -> record -> submit -> present, and the decision
//! of when the swapchain gets rebuilt.
//!
//! There are no per-frame semaphores or fences: the device is idled after
//! every present, so recording never overlaps GPU execution of the previous
//! frame. Anyone adding frames-in-flight must replace that wait with a ring
//! of acquire/submit sync objects AND keep the idle-wait in recreation.

use ash::vk;
use crimson_render::{DrawableSize, ResizeSignal};
use tracing::{debug, warn};

use crate::error::{RenderError, Result};
use crate::overlay::{Overlay, OverlayTarget};
use crate::swapchain::{Acquire, Present, Recreate};

/// Per-frame state; lives for exactly one iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRequest {
    pub image_index: u32,
    pub command_buffer: vk::CommandBuffer,
}

/// What the Frame Driver needs from the device and the presentation set.
pub trait FrameBackend {
    fn image_count(&self) -> usize;
    fn extent(&self) -> vk::Extent2D;
    fn render_pass(&self) -> vk::RenderPass;

    fn recreate(&mut self, window: &dyn DrawableSize) -> Result<Recreate>;
    fn acquire(&mut self) -> Result<Acquire>;

    /// Allocates and begins a command buffer, then begins the render pass
    /// on framebuffer `image_index` with `clear`.
    fn begin_frame(&mut self, image_index: u32, clear: [f32; 4]) -> Result<FrameRequest>;
    /// Ends the render pass and the command buffer.
    fn end_frame(&mut self, frame: &FrameRequest) -> Result<()>;
    fn submit(&mut self, frame: &FrameRequest) -> Result<()>;
    fn present(&mut self, image_index: u32, stale_hint: bool) -> Result<Present>;

    fn wait_idle(&mut self) -> Result<()>;
    /// Frees the frame's command buffer. The device must be idle.
    fn release(&mut self, frame: FrameRequest);
    /// Destroys the swapchain-dependent set. The device must be idle.
    fn teardown(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// Presented, and the swapchain will be rebuilt before the next acquire.
    Stale,
    /// Acquire reported out-of-date; nothing was drawn.
    Skipped,
    /// The window has no drawable area; nothing was drawn.
    Deferred,
}

pub struct FrameDriver {
    clear_color: [f32; 4],
    recreate_pending: bool,
    recreations: u64,
    frames: u64,
}

impl FrameDriver {
    pub fn new(clear_color: [f32; 4]) -> Self {
        Self {
            clear_color,
            recreate_pending: false,
            recreations: 0,
            frames: 0,
        }
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    pub fn recreate_pending(&self) -> bool {
        self.recreate_pending
    }

    pub fn recreations(&self) -> u64 {
        self.recreations
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    pub fn run_frame<B>(
        &mut self,
        backend: &mut B,
        overlay: &mut dyn Overlay,
        window: &dyn DrawableSize,
        resize: &ResizeSignal,
    ) -> Result<FrameOutcome>
    where
        B: FrameBackend + ?Sized,
    {
        if self.recreate_pending {
            let outcome = self.recreate(backend, overlay, window, resize)?;
            if outcome == Recreate::Deferred {
                return Ok(FrameOutcome::Deferred);
            }
        }

        let (index, suboptimal) = match backend.acquire()? {
            Acquire::Acquired { index, suboptimal } => (index, suboptimal),
            Acquire::OutOfDate => {
                debug!("acquire out of date, dropping frame");
                self.recreate_pending = true;
                self.recreate(backend, overlay, window, resize)?;
                return Ok(FrameOutcome::Skipped);
            }
        };
        let count = backend.image_count();
        if index as usize >= count {
            return Err(RenderError::ImageIndexOutOfRange { index, count });
        }

        overlay.begin_frame_content();
        let frame = backend.begin_frame(index, self.clear_color)?;
        let presented = Self::record_submit_present(backend, overlay, &frame, suboptimal, resize);

        // idle before the command buffer goes back to the pool, success or not
        let idle = backend.wait_idle();
        backend.release(frame);

        let present = presented?;
        idle?;
        self.frames += 1;
        match present {
            Present::Done => Ok(FrameOutcome::Presented),
            Present::Stale => {
                self.recreate_pending = true;
                Ok(FrameOutcome::Stale)
            }
        }
    }

    fn record_submit_present<B>(
        backend: &mut B,
        overlay: &mut dyn Overlay,
        frame: &FrameRequest,
        suboptimal: bool,
        resize: &ResizeSignal,
    ) -> Result<Present>
    where
        B: FrameBackend + ?Sized,
    {
        overlay.record_into(&OverlayTarget {
            command_buffer: frame.command_buffer,
            extent: backend.extent(),
            image_index: frame.image_index,
        });
        backend.end_frame(frame)?;
        backend.submit(frame)?;
        // the resize flag is consumed here and nowhere else in the frame
        let resized = resize.take();
        backend.present(frame.image_index, suboptimal || resized)
    }

    fn recreate<B>(
        &mut self,
        backend: &mut B,
        overlay: &mut dyn Overlay,
        window: &dyn DrawableSize,
        resize: &ResizeSignal,
    ) -> Result<Recreate>
    where
        B: FrameBackend + ?Sized,
    {
        let outcome = backend.recreate(window)?;
        if outcome == Recreate::Rebuilt {
            self.recreate_pending = false;
            self.recreations += 1;
            // the rebuild already reflects the geometry that raised it
            resize.take();
            overlay.rebuild(backend.render_pass(), backend.image_count())?;
        }
        Ok(outcome)
    }

    /// Idle the device, then overlay, then the swapchain set. Device-scoped
    /// resources are released afterwards by their owner.
    pub fn shutdown<B>(&mut self, backend: &mut B, overlay: &mut dyn Overlay)
    where
        B: FrameBackend + ?Sized,
    {
        if let Err(e) = backend.wait_idle() {
            warn!("idle before shutdown failed: {e}");
        }
        overlay.shutdown();
        backend.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swapchain::{classify_acquire, classify_present, recreate_gate};
    use ash::prelude::VkResult;
    use crimson_render::RenderSize;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Recreate(RenderSize),
        Deferred,
        Acquire,
        BeginFrame(u32),
        OverlayBegin,
        OverlayRecord(u32),
        OverlayRebuild(usize),
        OverlayShutdown,
        EndFrame,
        Submit,
        Present { index: u32, hint: bool },
        WaitIdle,
        Release(u32),
        Teardown,
    }

    type Log = Rc<RefCell<Vec<Call>>>;

    struct MockBackend {
        log: Log,
        images: usize,
        // raw device results, mapped the same way the real swapchain maps them
        acquires: VecDeque<VkResult<(u32, bool)>>,
        presents: VecDeque<VkResult<bool>>,
        fail_submit: bool,
        fail_idle: bool,
        extent: vk::Extent2D,
    }

    impl MockBackend {
        fn new(log: &Log) -> Self {
            Self {
                log: log.clone(),
                images: 3,
                acquires: VecDeque::new(),
                presents: VecDeque::new(),
                fail_submit: false,
                fail_idle: false,
                extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
            }
        }

        fn push(&self, c: Call) {
            self.log.borrow_mut().push(c);
        }
    }

    impl FrameBackend for MockBackend {
        fn image_count(&self) -> usize {
            self.images
        }

        fn extent(&self) -> vk::Extent2D {
            self.extent
        }

        fn render_pass(&self) -> vk::RenderPass {
            vk::RenderPass::null()
        }

        fn recreate(&mut self, window: &dyn DrawableSize) -> Result<Recreate> {
            let Some(size) = recreate_gate(window.drawable_size()) else {
                self.push(Call::Deferred);
                return Ok(Recreate::Deferred);
            };
            self.extent = vk::Extent2D {
                width: size.width,
                height: size.height,
            };
            self.push(Call::Recreate(size));
            Ok(Recreate::Rebuilt)
        }

        fn acquire(&mut self) -> Result<Acquire> {
            self.push(Call::Acquire);
            classify_acquire(self.acquires.pop_front().unwrap_or(Ok((0, false))))
        }

        fn begin_frame(&mut self, image_index: u32, _clear: [f32; 4]) -> Result<FrameRequest> {
            self.push(Call::BeginFrame(image_index));
            Ok(FrameRequest {
                image_index,
                command_buffer: vk::CommandBuffer::null(),
            })
        }

        fn end_frame(&mut self, _frame: &FrameRequest) -> Result<()> {
            self.push(Call::EndFrame);
            Ok(())
        }

        fn submit(&mut self, _frame: &FrameRequest) -> Result<()> {
            self.push(Call::Submit);
            if self.fail_submit {
                return Err(RenderError::Submit(vk::Result::ERROR_DEVICE_LOST));
            }
            Ok(())
        }

        fn present(&mut self, index: u32, hint: bool) -> Result<Present> {
            self.push(Call::Present { index, hint });
            classify_present(self.presents.pop_front().unwrap_or(Ok(false)), hint)
        }

        fn wait_idle(&mut self) -> Result<()> {
            self.push(Call::WaitIdle);
            if self.fail_idle {
                return Err(RenderError::WaitIdle(vk::Result::ERROR_DEVICE_LOST));
            }
            Ok(())
        }

        fn release(&mut self, frame: FrameRequest) {
            self.push(Call::Release(frame.image_index));
        }

        fn teardown(&mut self) {
            self.push(Call::Teardown);
            self.images = 0;
        }
    }

    struct MockOverlay {
        log: Log,
    }

    impl Overlay for MockOverlay {
        fn initialize(&mut self, _init: &crate::overlay::OverlayInit<'_>) -> Result<()> {
            Ok(())
        }

        fn rebuild(&mut self, _render_pass: vk::RenderPass, image_count: usize) -> Result<()> {
            self.log.borrow_mut().push(Call::OverlayRebuild(image_count));
            Ok(())
        }

        fn begin_frame_content(&mut self) {
            self.log.borrow_mut().push(Call::OverlayBegin);
        }

        fn record_into(&mut self, target: &OverlayTarget) {
            self.log
                .borrow_mut()
                .push(Call::OverlayRecord(target.image_index));
        }

        fn shutdown(&mut self) {
            self.log.borrow_mut().push(Call::OverlayShutdown);
        }
    }

    struct Fixture {
        log: Log,
        backend: MockBackend,
        overlay: MockOverlay,
        driver: FrameDriver,
        resize: ResizeSignal,
        window: RenderSize,
    }

    impl Fixture {
        fn new() -> Self {
            let log: Log = Rc::default();
            Self {
                backend: MockBackend::new(&log),
                overlay: MockOverlay { log: log.clone() },
                log,
                driver: FrameDriver::new([0.1, 0.1, 0.15, 1.0]),
                resize: ResizeSignal::new(),
                window: RenderSize::new(800, 600),
            }
        }

        fn frame(&mut self) -> Result<FrameOutcome> {
            self.driver.run_frame(
                &mut self.backend,
                &mut self.overlay,
                &self.window,
                &self.resize,
            )
        }

        fn take_log(&self) -> Vec<Call> {
            std::mem::take(&mut *self.log.borrow_mut())
        }
    }

    fn index_of(log: &[Call], call: &Call) -> usize {
        log.iter()
            .position(|c| c == call)
            .unwrap_or_else(|| panic!("{call:?} not in {log:?}"))
    }

    #[test]
    fn healthy_frame_runs_the_full_cycle_in_order() {
        let mut fx = Fixture::new();
        fx.backend.acquires.push_back(Ok((2, false)));
        assert_eq!(fx.frame().unwrap(), FrameOutcome::Presented);
        assert_eq!(
            fx.take_log(),
            vec![
                Call::Acquire,
                Call::OverlayBegin,
                Call::BeginFrame(2),
                Call::OverlayRecord(2),
                Call::EndFrame,
                Call::Submit,
                Call::Present {
                    index: 2,
                    hint: false
                },
                Call::WaitIdle,
                Call::Release(2),
            ]
        );
        assert!(!fx.driver.recreate_pending());
        assert_eq!(fx.driver.frames_presented(), 1);
    }

    #[test]
    fn out_of_date_acquire_skips_submission_and_recreates() {
        let mut fx = Fixture::new();
        fx.backend.acquires.push_back(Err(vk::Result::ERROR_OUT_OF_DATE_KHR));
        assert_eq!(fx.frame().unwrap(), FrameOutcome::Skipped);

        let log = fx.take_log();
        assert!(!log.contains(&Call::Submit));
        assert!(!log.iter().any(|c| matches!(c, Call::BeginFrame(_))));
        assert_eq!(
            log,
            vec![
                Call::Acquire,
                Call::Recreate(RenderSize::new(800, 600)),
                Call::OverlayRebuild(3),
            ]
        );

        // the next iteration acquires against the fresh swapchain
        assert_eq!(fx.frame().unwrap(), FrameOutcome::Presented);
        assert_eq!(fx.take_log()[0], Call::Acquire);
    }

    #[test]
    fn resize_mid_loop_recreates_after_present_not_mid_frame() {
        let mut fx = Fixture::new();
        fx.frame().unwrap();
        fx.take_log();

        fx.resize.raise();
        fx.window = RenderSize::new(1024, 768);
        assert_eq!(fx.frame().unwrap(), FrameOutcome::Stale);
        let log = fx.take_log();
        assert!(!log.iter().any(|c| matches!(c, Call::Recreate(_))));
        assert!(log.contains(&Call::Present {
            index: 0,
            hint: true
        }));
        assert!(!fx.resize.is_raised());

        fx.frame().unwrap();
        let log = fx.take_log();
        assert_eq!(log[0], Call::Recreate(RenderSize::new(1024, 768)));
        let rebuilt = index_of(&log, &Call::Recreate(RenderSize::new(1024, 768)));
        assert!(rebuilt < index_of(&log, &Call::Acquire));
    }

    #[test]
    fn stale_present_forces_recreate_before_next_acquire() {
        let mut fx = Fixture::new();
        fx.backend.presents.push_back(Err(vk::Result::ERROR_OUT_OF_DATE_KHR));
        assert_eq!(fx.frame().unwrap(), FrameOutcome::Stale);
        assert!(fx.driver.recreate_pending());
        fx.take_log();

        assert_eq!(fx.frame().unwrap(), FrameOutcome::Presented);
        let log = fx.take_log();
        assert_eq!(log[0], Call::Recreate(RenderSize::new(800, 600)));
        assert_eq!(log[2], Call::Acquire);
        assert_eq!(fx.driver.recreations(), 1);
    }

    #[test]
    fn suboptimal_acquire_proceeds_and_schedules_recreate() {
        let mut fx = Fixture::new();
        fx.backend.acquires.push_back(Ok((1, true)));
        assert_eq!(fx.frame().unwrap(), FrameOutcome::Stale);
        let log = fx.take_log();
        assert!(log.contains(&Call::Submit));
        assert!(log.contains(&Call::Present {
            index: 1,
            hint: true
        }));
        assert!(fx.driver.recreate_pending());
    }

    #[test]
    fn out_of_range_index_is_never_drawn() {
        let mut fx = Fixture::new();
        fx.backend.acquires.push_back(Ok((3, false)));
        let err = fx.frame().unwrap_err();
        assert!(matches!(
            err,
            RenderError::ImageIndexOutOfRange { index: 3, count: 3 }
        ));
        let log = fx.take_log();
        assert!(!log.contains(&Call::Submit));
        assert!(!log.iter().any(|c| matches!(c, Call::Present { .. })));
    }

    #[test]
    fn minimized_window_defers_until_restored() {
        let mut fx = Fixture::new();
        fx.backend.acquires.push_back(Err(vk::Result::ERROR_OUT_OF_DATE_KHR));
        fx.window = RenderSize::new(0, 0);

        assert_eq!(fx.frame().unwrap(), FrameOutcome::Skipped);
        assert_eq!(fx.frame().unwrap(), FrameOutcome::Deferred);
        assert_eq!(fx.frame().unwrap(), FrameOutcome::Deferred);
        let log = fx.take_log();
        assert_eq!(log.iter().filter(|c| **c == Call::Acquire).count(), 1);
        assert!(!log.iter().any(|c| matches!(c, Call::Recreate(_))));

        fx.window = RenderSize::new(640, 480);
        assert_eq!(fx.frame().unwrap(), FrameOutcome::Presented);
        let log = fx.take_log();
        assert_eq!(log[0], Call::Recreate(RenderSize::new(640, 480)));
        assert_eq!(fx.backend.extent.width, 640);
    }

    #[test]
    fn recreate_on_stable_geometry_is_idempotent() {
        let mut fx = Fixture::new();
        for _ in 0..2 {
            // suboptimal present
            fx.backend.presents.push_back(Ok(true));
            fx.frame().unwrap();
            fx.frame().unwrap();
        }
        let recreates: Vec<_> = fx
            .take_log()
            .into_iter()
            .filter(|c| matches!(c, Call::Recreate(_) | Call::OverlayRebuild(_)))
            .collect();
        assert_eq!(
            recreates,
            vec![
                Call::Recreate(RenderSize::new(800, 600)),
                Call::OverlayRebuild(3),
                Call::Recreate(RenderSize::new(800, 600)),
                Call::OverlayRebuild(3),
            ]
        );
    }

    #[test]
    fn failed_submit_still_idles_and_releases() {
        let mut fx = Fixture::new();
        fx.backend.fail_submit = true;
        let err = fx.frame().unwrap_err();
        assert!(matches!(err, RenderError::Submit(_)));
        let log = fx.take_log();
        assert!(!log.iter().any(|c| matches!(c, Call::Present { .. })));
        assert!(index_of(&log, &Call::WaitIdle) < index_of(&log, &Call::Release(0)));
    }

    #[test]
    fn fatal_acquire_propagates() {
        let mut fx = Fixture::new();
        fx.backend.acquires.push_back(Err(vk::Result::ERROR_SURFACE_LOST_KHR));
        assert!(matches!(fx.frame(), Err(RenderError::Acquire(_))));
        assert!(!fx.driver.recreate_pending());
    }

    #[test]
    fn fatal_present_propagates_after_cleanup() {
        let mut fx = Fixture::new();
        fx.backend.presents.push_back(Err(vk::Result::ERROR_DEVICE_LOST));
        assert!(matches!(fx.frame(), Err(RenderError::Present(_))));
        let log = fx.take_log();
        assert_eq!(&log[log.len() - 2..], &[Call::WaitIdle, Call::Release(0)]);
        assert_eq!(fx.driver.frames_presented(), 0);
    }

    #[test]
    fn clean_present_with_pending_resize_is_stale() {
        let mut fx = Fixture::new();
        fx.resize.raise();
        fx.backend.presents.push_back(Ok(false));
        assert_eq!(fx.frame().unwrap(), FrameOutcome::Stale);
        assert!(fx.driver.recreate_pending());
    }

    #[test]
    fn shutdown_proceeds_when_idle_fails() {
        let mut fx = Fixture::new();
        fx.backend.fail_idle = true;
        fx.driver.shutdown(&mut fx.backend, &mut fx.overlay);
        assert_eq!(
            fx.take_log(),
            vec![Call::WaitIdle, Call::OverlayShutdown, Call::Teardown]
        );
    }

    #[test]
    fn shutdown_releases_overlay_before_swapchain() {
        let mut fx = Fixture::new();
        fx.frame().unwrap();
        fx.take_log();
        fx.driver.shutdown(&mut fx.backend, &mut fx.overlay);
        assert_eq!(
            fx.take_log(),
            vec![Call::WaitIdle, Call::OverlayShutdown, Call::Teardown]
        );
    }
}

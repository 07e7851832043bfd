//! Frame scheduling.
//!
//! The scheduler owns the frame cursor and the per-slot phase. Each call to
//! [`FrameScheduler::render_frame`] runs one slot through
//! wait → acquire → reset → record → submit → present and advances the
//! cursor only when the frame was presented.
//!
//! Stale surfaces and per-frame driver failures trigger a rebuild of every
//! slot instead of an error. Only a lost device or a failed wait, acquire or
//! rebuild is returned as an error. A rebuild that leaves no slots is
//! retried at the start of the next frame.

use crate::error::{RenderError, Result};
use tracing::{debug, trace, warn};
use trigon_core::Scene;
use trigon_gpu::{AcquireOutcome, GpuError, PresentOutcome};

/// GPU side of a frame, one operation per scheduling step.
///
/// `slot` is always the cursor slot. `image_index` is the swapchain image
/// returned by [`FrameBackend::acquire`] and selects the framebuffer.
pub trait FrameBackend {
    /// Number of frame slots, equal to the swapchain image count.
    fn slot_count(&self) -> usize;

    /// Block until the slot's last submission completed.
    fn wait_slot(&mut self, slot: usize) -> trigon_gpu::Result<()>;

    /// Acquire the next swapchain image using the slot's semaphore.
    fn acquire(&mut self, slot: usize) -> trigon_gpu::Result<AcquireOutcome>;

    /// Reset the slot's fence and command buffer.
    fn reset_slot(&mut self, slot: usize) -> trigon_gpu::Result<()>;

    /// Record the scene into the slot's command buffer.
    fn record(&mut self, slot: usize, image_index: u32, scene: &Scene) -> trigon_gpu::Result<()>;

    /// Submit the slot's command buffer.
    fn submit(&mut self, slot: usize) -> trigon_gpu::Result<()>;

    /// Present the image once the slot's rendering finished.
    fn present(&mut self, slot: usize, image_index: u32) -> trigon_gpu::Result<PresentOutcome>;

    /// Rebuild the swapchain and every slot.
    fn recreate(&mut self) -> trigon_gpu::Result<()>;

    /// Called whenever a slot moves to a new phase.
    fn phase_changed(&mut self, _slot: usize, _phase: SlotPhase) {}
}

/// Where a slot is in its frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotPhase {
    #[default]
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
}

/// Step at which a frame was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    Reset,
    Record,
    Submit,
    Present,
}

/// Outcome of one render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame reached the screen.
    Presented { slot: usize, image_index: u32 },
    /// The surface was stale; slots were rebuilt and nothing was shown.
    Recreated,
    /// A driver call failed mid-frame; slots were rebuilt and nothing was shown.
    Dropped { stage: FrameStage },
}

/// Counters over the scheduler's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub presented: u64,
    pub dropped: u64,
    pub recreations: u64,
}

/// Frame cursor and slot phases.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    cursor: usize,
    phases: Vec<SlotPhase>,
    stats: FrameStats,
}

impl FrameScheduler {
    pub fn new(slot_count: usize) -> Self {
        Self {
            cursor: 0,
            phases: vec![SlotPhase::Idle; slot_count],
            stats: FrameStats::default(),
        }
    }

    /// Slot the next frame will use.
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn slot_count(&self) -> usize {
        self.phases.len()
    }

    pub fn phase(&self, slot: usize) -> Option<SlotPhase> {
        self.phases.get(slot).copied()
    }

    pub const fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Render one frame.
    pub fn render_frame<B: FrameBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        scene: &Scene,
    ) -> Result<FrameStatus> {
        if backend.slot_count() == 0 {
            // An earlier rebuild failed after the old swapchain was gone.
            debug!("No frame slots, rebuilding before drawing");
            return self.rebuild(backend);
        }
        if self.phases.len() != backend.slot_count() {
            self.resync(backend.slot_count())?;
        }
        let slot = self.cursor;

        self.enter(backend, slot, SlotPhase::Acquiring);
        if let Err(err) = backend.wait_slot(slot) {
            self.enter(backend, slot, SlotPhase::Idle);
            return Err(err.into());
        }

        let image_index = match backend.acquire(slot) {
            Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal,
            }) => {
                if suboptimal {
                    trace!("Acquired suboptimal image {image_index}");
                }
                image_index
            }
            Ok(AcquireOutcome::OutOfDate) => {
                debug!("Swapchain out of date on acquire");
                return self.rebuild(backend);
            }
            Err(err) => {
                self.enter(backend, slot, SlotPhase::Idle);
                return Err(err.into());
            }
        };

        self.enter(backend, slot, SlotPhase::Recording);
        if let Err(err) = backend.reset_slot(slot) {
            return self.drop_frame(backend, FrameStage::Reset, err);
        }
        if let Err(err) = backend.record(slot, image_index, scene) {
            return self.drop_frame(backend, FrameStage::Record, err);
        }
        if let Err(err) = backend.submit(slot) {
            return self.drop_frame(backend, FrameStage::Submit, err);
        }
        self.enter(backend, slot, SlotPhase::Submitted);

        self.enter(backend, slot, SlotPhase::Presenting);
        match backend.present(slot, image_index) {
            Ok(PresentOutcome::Presented) => {
                self.enter(backend, slot, SlotPhase::Idle);
                self.cursor = (self.cursor + 1) % self.phases.len();
                self.stats.presented += 1;
                trace!("Presented image {image_index} from slot {slot}");
                Ok(FrameStatus::Presented { slot, image_index })
            }
            Ok(PresentOutcome::Stale) => {
                debug!("Swapchain stale on present");
                self.rebuild(backend)
            }
            Err(err) => self.drop_frame(backend, FrameStage::Present, err),
        }
    }

    /// Rebuild every slot and restart from slot 0.
    ///
    /// Safe to call repeatedly; each call leaves exactly one phase per slot.
    pub fn recreate<B: FrameBackend + ?Sized>(&mut self, backend: &mut B) -> Result<()> {
        backend.recreate()?;
        self.stats.recreations += 1;
        self.resync(backend.slot_count())
    }

    /// Recreate from inside a frame.
    ///
    /// A surface that went out of date again while rebuilding is not an
    /// error: the slots are cleared and the next frame retries.
    fn rebuild<B: FrameBackend + ?Sized>(&mut self, backend: &mut B) -> Result<FrameStatus> {
        match self.recreate(backend) {
            Ok(()) => Ok(FrameStatus::Recreated),
            Err(RenderError::Gpu(err)) if err.is_out_of_date() => {
                debug!("Surface changed during rebuild, retrying next frame: {err}");
                self.cursor = 0;
                self.phases.clear();
                Ok(FrameStatus::Recreated)
            }
            Err(err) => Err(err),
        }
    }

    fn enter<B: FrameBackend + ?Sized>(&mut self, backend: &mut B, slot: usize, phase: SlotPhase) {
        self.phases[slot] = phase;
        trace!("Slot {slot} -> {phase:?}");
        backend.phase_changed(slot, phase);
    }

    fn resync(&mut self, slot_count: usize) -> Result<()> {
        if slot_count == 0 {
            return Err(RenderError::Gpu(GpuError::InvalidState(
                "Swapchain has no images".to_string(),
            )));
        }
        self.cursor = 0;
        self.phases.clear();
        self.phases.resize(slot_count, SlotPhase::Idle);
        Ok(())
    }

    fn drop_frame<B: FrameBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        stage: FrameStage,
        err: GpuError,
    ) -> Result<FrameStatus> {
        if err.is_device_lost() {
            return Err(err.into());
        }

        // The slot's fence may be unsignaled with nothing pending; rebuilding
        // recreates it signaled.
        warn!("Dropped frame at {stage:?}: {err}");
        self.stats.dropped += 1;
        self.rebuild(backend)?;
        Ok(FrameStatus::Dropped { stage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Acquire(usize),
        Reset(usize),
        Record(usize, u32),
        Submit(usize),
        Present(usize, u32),
        Recreate,
    }

    /// Simulates swapchain images and fences.
    struct MockBackend {
        image_count: usize,
        next_image: u32,
        /// Signaled state per slot fence.
        fences: Vec<bool>,
        /// Slots whose submission has not been waited on yet.
        pending: Vec<bool>,
        calls: Vec<Call>,
        acquire_results: Vec<AcquireOutcome>,
        present_results: Vec<PresentOutcome>,
        fail_record: Option<vk::Result>,
        /// Next rebuild fails after the old swapchain is destroyed.
        fail_recreate: Option<vk::Result>,
        recreate_image_count: Option<usize>,
        phases: Vec<(usize, SlotPhase)>,
    }

    impl MockBackend {
        fn new(image_count: usize) -> Self {
            Self {
                image_count,
                next_image: 0,
                fences: vec![true; image_count],
                pending: vec![false; image_count],
                calls: Vec::new(),
                acquire_results: Vec::new(),
                present_results: Vec::new(),
                fail_record: None,
                fail_recreate: None,
                recreate_image_count: None,
                phases: Vec::new(),
            }
        }
    }

    impl FrameBackend for MockBackend {
        fn slot_count(&self) -> usize {
            self.image_count
        }

        fn wait_slot(&mut self, slot: usize) -> trigon_gpu::Result<()> {
            self.calls.push(Call::Wait(slot));
            // The GPU finishes whatever was submitted.
            self.fences[slot] = true;
            self.pending[slot] = false;
            Ok(())
        }

        fn acquire(&mut self, slot: usize) -> trigon_gpu::Result<AcquireOutcome> {
            self.calls.push(Call::Acquire(slot));
            if !self.acquire_results.is_empty() {
                return Ok(self.acquire_results.remove(0));
            }
            let image_index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count as u32;
            Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal: false,
            })
        }

        fn reset_slot(&mut self, slot: usize) -> trigon_gpu::Result<()> {
            self.calls.push(Call::Reset(slot));
            assert!(self.fences[slot], "fence reset before it signaled");
            assert!(!self.pending[slot], "slot reset while still in flight");
            self.fences[slot] = false;
            Ok(())
        }

        fn record(&mut self, slot: usize, image_index: u32, _scene: &Scene) -> trigon_gpu::Result<()> {
            self.calls.push(Call::Record(slot, image_index));
            assert!(!self.pending[slot], "command buffer re-recorded while in flight");
            match self.fail_record.take() {
                Some(result) => Err(GpuError::Vulkan(result)),
                None => Ok(()),
            }
        }

        fn submit(&mut self, slot: usize) -> trigon_gpu::Result<()> {
            self.calls.push(Call::Submit(slot));
            self.pending[slot] = true;
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> trigon_gpu::Result<PresentOutcome> {
            self.calls.push(Call::Present(slot, image_index));
            if self.present_results.is_empty() {
                Ok(PresentOutcome::Presented)
            } else {
                Ok(self.present_results.remove(0))
            }
        }

        fn recreate(&mut self) -> trigon_gpu::Result<()> {
            self.calls.push(Call::Recreate);
            if let Some(result) = self.fail_recreate.take() {
                self.image_count = 0;
                self.fences.clear();
                self.pending.clear();
                return Err(GpuError::SwapchainCreation(result));
            }
            if let Some(count) = self.recreate_image_count {
                self.image_count = count;
            }
            self.next_image = 0;
            self.fences = vec![true; self.image_count];
            self.pending = vec![false; self.image_count];
            Ok(())
        }

        fn phase_changed(&mut self, slot: usize, phase: SlotPhase) {
            self.phases.push((slot, phase));
        }
    }

    #[test]
    fn cursor_advances_modulo_slot_count() {
        let mut backend = MockBackend::new(3);
        let mut scheduler = FrameScheduler::new(3);
        let scene = Scene::demo();

        for k in 1..=10 {
            let status = scheduler.render_frame(&mut backend, &scene).unwrap();
            assert!(matches!(status, FrameStatus::Presented { .. }));
            assert_eq!(scheduler.cursor(), k % 3);
        }
        assert_eq!(scheduler.stats().presented, 10);
    }

    #[test]
    fn frame_runs_steps_in_order() {
        let mut backend = MockBackend::new(2);
        let mut scheduler = FrameScheduler::new(2);

        scheduler
            .render_frame(&mut backend, &Scene::default())
            .unwrap();

        assert_eq!(
            backend.calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Reset(0),
                Call::Record(0, 0),
                Call::Submit(0),
                Call::Present(0, 0),
            ]
        );
        assert_eq!(scheduler.phase(0), Some(SlotPhase::Idle));
    }

    #[test]
    fn fence_waited_before_every_reset() {
        // The mock asserts on reset or re-record of an unsignaled slot.
        let mut backend = MockBackend::new(2);
        let mut scheduler = FrameScheduler::new(2);
        let scene = Scene::demo();

        for _ in 0..7 {
            scheduler.render_frame(&mut backend, &scene).unwrap();
        }

        for (index, call) in backend.calls.iter().enumerate() {
            if let Call::Reset(slot) = call {
                let waited = backend.calls[..index]
                    .iter()
                    .rev()
                    .find(|c| matches!(c, Call::Wait(_)));
                assert_eq!(waited, Some(&Call::Wait(*slot)));
            }
        }
    }

    #[test]
    fn framebuffer_follows_acquired_image() {
        let mut backend = MockBackend::new(3);
        backend.acquire_results = vec![AcquireOutcome::Ready {
            image_index: 2,
            suboptimal: true,
        }];
        let mut scheduler = FrameScheduler::new(3);

        let status = scheduler
            .render_frame(&mut backend, &Scene::default())
            .unwrap();

        assert_eq!(
            status,
            FrameStatus::Presented {
                slot: 0,
                image_index: 2
            }
        );
        assert!(backend.calls.contains(&Call::Record(0, 2)));
        assert!(backend.calls.contains(&Call::Present(0, 2)));
    }

    #[test]
    fn out_of_date_acquire_recreates_without_drawing() {
        let mut backend = MockBackend::new(3);
        backend.acquire_results = vec![AcquireOutcome::OutOfDate];
        let mut scheduler = FrameScheduler::new(3);

        let status = scheduler
            .render_frame(&mut backend, &Scene::demo())
            .unwrap();

        assert_eq!(status, FrameStatus::Recreated);
        assert_eq!(
            backend.calls,
            vec![Call::Wait(0), Call::Acquire(0), Call::Recreate]
        );
        assert_eq!(scheduler.cursor(), 0);
        assert_eq!(scheduler.stats().recreations, 1);
    }

    #[test]
    fn stale_present_recreates_and_resets_cursor() {
        let mut backend = MockBackend::new(3);
        let mut scheduler = FrameScheduler::new(3);
        let scene = Scene::demo();

        scheduler.render_frame(&mut backend, &scene).unwrap();
        assert_eq!(scheduler.cursor(), 1);

        backend.present_results = vec![PresentOutcome::Stale];
        let status = scheduler.render_frame(&mut backend, &scene).unwrap();

        assert_eq!(status, FrameStatus::Recreated);
        assert_eq!(scheduler.cursor(), 0);
        assert_eq!(backend.calls.last(), Some(&Call::Recreate));
    }

    #[test]
    fn repeated_recreation_matches_image_count() {
        let mut backend = MockBackend::new(3);
        backend.recreate_image_count = Some(2);
        let mut scheduler = FrameScheduler::new(3);

        scheduler.recreate(&mut backend).unwrap();
        scheduler.recreate(&mut backend).unwrap();

        assert_eq!(scheduler.slot_count(), backend.slot_count());
        assert_eq!(scheduler.slot_count(), 2);
        assert_eq!(scheduler.stats().recreations, 2);

        let scene = Scene::demo();
        for k in 1..=5 {
            scheduler.render_frame(&mut backend, &scene).unwrap();
            assert_eq!(scheduler.cursor(), k % 2);
        }
    }

    #[test]
    fn record_failure_drops_frame_and_rebuilds() {
        let mut backend = MockBackend::new(2);
        backend.fail_record = Some(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        let mut scheduler = FrameScheduler::new(2);
        let scene = Scene::demo();

        let status = scheduler.render_frame(&mut backend, &scene).unwrap();
        assert_eq!(
            status,
            FrameStatus::Dropped {
                stage: FrameStage::Record
            }
        );
        assert_eq!(backend.calls.last(), Some(&Call::Recreate));
        assert_eq!(scheduler.stats().dropped, 1);

        // The rebuilt slot renders normally.
        let status = scheduler.render_frame(&mut backend, &scene).unwrap();
        assert!(matches!(status, FrameStatus::Presented { slot: 0, .. }));
    }

    #[test]
    fn device_lost_is_fatal() {
        let mut backend = MockBackend::new(2);
        backend.fail_record = Some(vk::Result::ERROR_DEVICE_LOST);
        let mut scheduler = FrameScheduler::new(2);

        let err = scheduler
            .render_frame(&mut backend, &Scene::demo())
            .unwrap_err();

        assert!(matches!(err, RenderError::Gpu(ref e) if e.is_device_lost()));
        assert!(!backend.calls.contains(&Call::Recreate));
    }

    #[test]
    fn mismatched_slot_count_resyncs() {
        let mut backend = MockBackend::new(3);
        let mut scheduler = FrameScheduler::default();

        scheduler
            .render_frame(&mut backend, &Scene::default())
            .unwrap();

        assert_eq!(scheduler.slot_count(), 3);
        assert_eq!(scheduler.cursor(), 1);
    }

    #[test]
    fn slot_passes_through_every_phase() {
        let mut backend = MockBackend::new(2);
        let mut scheduler = FrameScheduler::new(2);

        scheduler
            .render_frame(&mut backend, &Scene::default())
            .unwrap();

        assert_eq!(
            backend.phases,
            vec![
                (0, SlotPhase::Acquiring),
                (0, SlotPhase::Recording),
                (0, SlotPhase::Submitted),
                (0, SlotPhase::Presenting),
                (0, SlotPhase::Idle),
            ]
        );
    }

    #[test]
    fn out_of_date_during_rebuild_retries_next_frame() {
        let mut backend = MockBackend::new(2);
        backend.present_results = vec![PresentOutcome::Stale];
        backend.fail_recreate = Some(vk::Result::ERROR_OUT_OF_DATE_KHR);
        backend.recreate_image_count = Some(2);
        let mut scheduler = FrameScheduler::new(2);
        let scene = Scene::demo();

        let status = scheduler.render_frame(&mut backend, &scene).unwrap();
        assert_eq!(status, FrameStatus::Recreated);
        assert_eq!(backend.slot_count(), 0);

        // The next call rebuilds instead of drawing.
        let status = scheduler.render_frame(&mut backend, &scene).unwrap();
        assert_eq!(status, FrameStatus::Recreated);
        assert_eq!(scheduler.slot_count(), 2);

        let status = scheduler.render_frame(&mut backend, &scene).unwrap();
        assert!(matches!(status, FrameStatus::Presented { slot: 0, .. }));
        let rebuilds = backend.calls.iter().filter(|c| **c == Call::Recreate).count();
        assert_eq!(rebuilds, 2);
    }

    #[test]
    fn failed_rebuild_is_retried_instead_of_sticking() {
        let mut backend = MockBackend::new(2);
        backend.fail_recreate = Some(vk::Result::ERROR_INITIALIZATION_FAILED);
        backend.recreate_image_count = Some(2);
        let mut scheduler = FrameScheduler::new(2);
        let scene = Scene::demo();

        let err = scheduler.recreate(&mut backend).unwrap_err();
        assert!(matches!(err, RenderError::Gpu(GpuError::SwapchainCreation(_))));
        assert_eq!(backend.slot_count(), 0);

        let status = scheduler.render_frame(&mut backend, &scene).unwrap();
        assert_eq!(status, FrameStatus::Recreated);
        for _ in 0..3 {
            let status = scheduler.render_frame(&mut backend, &scene).unwrap();
            assert!(matches!(status, FrameStatus::Presented { .. }));
        }
    }

    #[test]
    fn zero_images_is_an_error() {
        let mut backend = MockBackend::new(0);
        let mut scheduler = FrameScheduler::new(0);
        assert!(scheduler
            .render_frame(&mut backend, &Scene::default())
            .is_err());
    }
}

//! Session state machine
//!
//! Single authority over the session state and the two rectangles. Input
//! callbacks never flip component state directly; every signal funnels
//! through `handle_event`, and the components are driven once per tick.

use crate::notify::Notifier;
use capture::{CaptureProducer, SharedFrameHandle};
use common::Rect;
use output::{OutputError, OutputResult};
use overlay::OverlayResult;

/// Selection rectangle shown before the first drag.
pub const DEFAULT_SELECTION: Rect = Rect::new(0, 0, 1, 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Selecting,
    Capturing,
}

/// Everything the outside world can tell the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    ToggleSelection,
    CancelSelection,
    PointerDown { x: i32, y: i32 },
    PointerMove { x: i32, y: i32 },
    PointerUp { x: i32, y: i32 },
    StartCapture,
    StopCapture,
    Exit,
}

/// In-progress drag; exists only while Selecting.
#[derive(Debug, Clone, Copy)]
struct SelectionDrag {
    anchor: (i32, i32),
    current: (i32, i32),
}

/// Selection overlay operations the session drives.
pub trait OverlayControl {
    fn set_enabled(&mut self, enabled: bool) -> OverlayResult<()>;
    fn set_selection_rect(&mut self, rect: Rect);
    fn update(&mut self);
    fn shutdown(&mut self);
}

/// Frame surface manager operations the session drives.
pub trait OutputControl {
    fn set_target_rect(&mut self, rect: Rect) -> OutputResult<()>;
    fn set_enabled(&mut self, enabled: bool);
    fn render(&mut self) -> OutputResult<()>;
    fn shared_handle(&self) -> Option<isize>;
}

pub struct Session<O, F, P, N> {
    overlay: O,
    output: F,
    producer: P,
    notifier: N,
    state: SessionState,
    target_rect: Rect,
    selection_rect: Rect,
    drag: Option<SelectionDrag>,
    /// Producer failures are reported once per capture run.
    failure_notified: bool,
    exit_requested: bool,
}

impl<O, F, P, N> Session<O, F, P, N>
where
    O: OverlayControl,
    F: OutputControl,
    P: CaptureProducer,
    N: Notifier,
{
    pub fn new(overlay: O, output: F, producer: P, notifier: N, initial_target: Rect) -> Self {
        Self {
            overlay,
            output,
            producer,
            notifier,
            state: SessionState::Idle,
            target_rect: initial_target,
            selection_rect: DEFAULT_SELECTION,
            drag: None,
            failure_notified: false,
            exit_requested: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn target_rect(&self) -> Rect {
        self.target_rect
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Apply one event. Events without a transition from the current state
    /// are no-ops. A returned error is fatal to the process.
    pub fn handle_event(&mut self, event: SessionEvent) -> anyhow::Result<()> {
        match event {
            SessionEvent::ToggleSelection => match self.state {
                // Re-entry while already selecting is ignored.
                SessionState::Selecting => {}
                SessionState::Idle | SessionState::Capturing => self.enter_selecting()?,
            },

            SessionEvent::PointerDown { x, y } => {
                if self.state == SessionState::Selecting && self.drag.is_none() {
                    self.drag = Some(SelectionDrag {
                        anchor: (x, y),
                        current: (x, y),
                    });
                }
            }

            SessionEvent::PointerMove { x, y } => {
                if self.state == SessionState::Selecting {
                    if let Some(drag) = self.drag.as_mut() {
                        drag.current = (x, y);
                        self.selection_rect = Rect::from_drag(drag.anchor, drag.current);
                        self.overlay.set_selection_rect(self.selection_rect);
                        self.overlay.update();
                    }
                }
            }

            SessionEvent::PointerUp { x, y } => self.finish_drag(x, y)?,

            SessionEvent::CancelSelection => {
                if self.state == SessionState::Selecting {
                    self.cancel_selection()?;
                }
            }

            SessionEvent::StartCapture => {
                if self.state == SessionState::Idle {
                    self.start_capturing()?;
                }
            }

            SessionEvent::StopCapture => {
                if self.state == SessionState::Capturing {
                    self.stop_capturing();
                }
            }

            SessionEvent::Exit => {
                if self.state == SessionState::Capturing {
                    self.stop_capturing();
                }
                self.exit_requested = true;
            }
        }

        Ok(())
    }

    /// One pass of the cooperative loop: while capturing, pull a frame from
    /// the producer and render it. Producer failures drop the session back
    /// to Idle; render failures are fatal.
    pub fn tick(&mut self) -> anyhow::Result<()> {
        if self.state != SessionState::Capturing {
            return Ok(());
        }

        let handle = match self.output.shared_handle() {
            Some(handle) => handle,
            None => {
                self.capture_failed("Capture stopped: no shared surface is available.");
                return Ok(());
            }
        };

        if let Err(e) = self
            .producer
            .write_frame(SharedFrameHandle(handle), self.target_rect)
        {
            self.capture_failed(&format!("Capture stopped: {e}"));
            return Ok(());
        }

        self.output.render()?;
        Ok(())
    }

    pub fn shutdown(&mut self) {
        if self.state == SessionState::Capturing {
            let _ = self.producer.stop_capture();
        }
        let _ = self.producer.shutdown();
        let _ = self.overlay.set_enabled(false);
        self.overlay.shutdown();
        self.output.set_enabled(false);
        self.state = SessionState::Idle;
    }

    fn enter_selecting(&mut self) -> anyhow::Result<()> {
        tracing::info!("entering selection");
        self.drag = None;
        self.selection_rect = DEFAULT_SELECTION;
        self.overlay.set_selection_rect(self.selection_rect);
        self.overlay.set_enabled(true)?;
        self.state = SessionState::Selecting;
        Ok(())
    }

    fn cancel_selection(&mut self) -> anyhow::Result<()> {
        tracing::info!("selection cancelled");
        self.drag = None;
        self.overlay.set_enabled(false)?;
        // Always falls back to Idle; a capture that was running before the
        // re-selection stops, the target rectangle stays untouched.
        let _ = self.producer.stop_capture();
        self.output.set_enabled(false);
        self.state = SessionState::Idle;
        Ok(())
    }

    fn finish_drag(&mut self, x: i32, y: i32) -> anyhow::Result<()> {
        if self.state != SessionState::Selecting {
            return Ok(());
        }
        let Some(drag) = self.drag.take() else {
            return Ok(());
        };

        let rect = Rect::from_drag(drag.anchor, (x, y));
        if !rect.has_extent() {
            // A click without a drag keeps selection mode alive.
            return Ok(());
        }

        self.overlay.set_enabled(false)?;

        match self.output.set_target_rect(rect) {
            Ok(()) => {}
            Err(OutputError::SurfaceTooLarge { width, height }) => {
                tracing::error!(width, height, "shared surface allocation failed");
                self.notifier.notify(&format!(
                    "The selected area ({width}x{height}) could not be allocated. \
                     Try a smaller region."
                ));
                let _ = self.producer.stop_capture();
                self.output.set_enabled(false);
                self.state = SessionState::Idle;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        self.target_rect = rect;
        self.start_capturing()
    }

    fn start_capturing(&mut self) -> anyhow::Result<()> {
        if let Err(e) = self.producer.start_capture() {
            tracing::error!(error = %e, "producer failed to start");
            self.notifier.notify(&format!("Capture failed to start: {e}"));
            self.output.set_enabled(false);
            self.state = SessionState::Idle;
            return Ok(());
        }

        self.output.set_enabled(true);
        self.failure_notified = false;
        self.state = SessionState::Capturing;
        tracing::info!(rect = ?self.target_rect, "capturing");
        Ok(())
    }

    fn stop_capturing(&mut self) {
        if let Err(e) = self.producer.stop_capture() {
            tracing::warn!(error = %e, "producer stop reported failure");
            self.notifier.notify(&format!("Capture stop failed: {e}"));
        }
        // Target rect and shared surface are retained so a later start
        // reuses them without renegotiation.
        self.output.set_enabled(false);
        self.state = SessionState::Idle;
        tracing::info!("capture stopped");
    }

    fn capture_failed(&mut self, message: &str) {
        tracing::error!(message, "capture failure, returning to idle");
        if !self.failure_notified {
            self.failure_notified = true;
            self.notifier.notify(message);
        }
        let _ = self.producer.stop_capture();
        self.output.set_enabled(false);
        self.state = SessionState::Idle;
    }
}

impl OverlayControl for overlay::OverlayManager {
    fn set_enabled(&mut self, enabled: bool) -> OverlayResult<()> {
        overlay::OverlayManager::set_enabled(self, enabled)
    }

    fn set_selection_rect(&mut self, rect: Rect) {
        overlay::OverlayManager::set_selection_rect(self, rect)
    }

    fn update(&mut self) {
        overlay::OverlayManager::update(self)
    }

    fn shutdown(&mut self) {
        overlay::OverlayManager::shutdown(self)
    }
}

impl OutputControl for output::OutputManager {
    fn set_target_rect(&mut self, rect: Rect) -> OutputResult<()> {
        output::OutputManager::set_target_rect(self, rect)
    }

    fn set_enabled(&mut self, enabled: bool) {
        output::OutputManager::set_enabled(self, enabled)
    }

    fn render(&mut self) -> OutputResult<()> {
        output::OutputManager::render(self)
    }

    fn shared_handle(&self) -> Option<isize> {
        output::OutputManager::shared_handle(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture::{CaptureError, CaptureResult};

    #[derive(Default)]
    struct MockOverlay {
        enabled: bool,
        snapshots: u32,
        selection: Rect,
        updates: u32,
        shutdowns: u32,
    }

    impl OverlayControl for MockOverlay {
        fn set_enabled(&mut self, enabled: bool) -> OverlayResult<()> {
            if enabled && !self.enabled {
                self.snapshots += 1;
            }
            self.enabled = enabled;
            Ok(())
        }

        fn set_selection_rect(&mut self, rect: Rect) {
            self.selection = rect;
        }

        fn update(&mut self) {
            self.updates += 1;
        }

        fn shutdown(&mut self) {
            self.shutdowns += 1;
        }
    }

    struct MockOutput {
        enabled: bool,
        target: Rect,
        allocations: u32,
        renders: u32,
        handle: isize,
        fail_too_large: bool,
    }

    impl MockOutput {
        fn new(initial: Rect) -> Self {
            Self {
                enabled: false,
                target: initial,
                allocations: 1,
                renders: 0,
                handle: 100,
                fail_too_large: false,
            }
        }
    }

    impl OutputControl for MockOutput {
        fn set_target_rect(&mut self, rect: Rect) -> OutputResult<()> {
            if rect == self.target {
                return Ok(());
            }
            if self.fail_too_large {
                return Err(OutputError::SurfaceTooLarge {
                    width: rect.width,
                    height: rect.height,
                });
            }
            self.target = rect;
            self.allocations += 1;
            // The handle changes identity on every recreation.
            self.handle += 1;
            Ok(())
        }

        fn set_enabled(&mut self, enabled: bool) {
            self.enabled = enabled;
        }

        fn render(&mut self) -> OutputResult<()> {
            self.renders += 1;
            Ok(())
        }

        fn shared_handle(&self) -> Option<isize> {
            Some(self.handle)
        }
    }

    #[derive(Default)]
    struct MockProducer {
        running: bool,
        starts: u32,
        stops: u32,
        shutdowns: u32,
        writes: Vec<(isize, Rect)>,
        fail_writes: bool,
    }

    impl CaptureProducer for MockProducer {
        fn initialize(&mut self) -> CaptureResult<()> {
            Ok(())
        }

        fn start_capture(&mut self) -> CaptureResult<()> {
            self.running = true;
            self.starts += 1;
            Ok(())
        }

        fn write_frame(&mut self, target: SharedFrameHandle, rect: Rect) -> CaptureResult<()> {
            if self.fail_writes {
                return Err(CaptureError::NotRunning);
            }
            self.writes.push((target.0, rect));
            Ok(())
        }

        fn stop_capture(&mut self) -> CaptureResult<()> {
            self.running = false;
            self.stops += 1;
            Ok(())
        }

        fn shutdown(&mut self) -> CaptureResult<()> {
            self.shutdowns += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockNotifier {
        messages: Vec<String>,
    }

    impl Notifier for MockNotifier {
        fn notify(&mut self, message: &str) {
            self.messages.push(message.to_string());
        }
    }

    type TestSession = Session<MockOverlay, MockOutput, MockProducer, MockNotifier>;

    const INITIAL: Rect = Rect::new(0, 0, 1920, 1080);

    fn make_session() -> TestSession {
        Session::new(
            MockOverlay::default(),
            MockOutput::new(INITIAL),
            MockProducer::default(),
            MockNotifier::default(),
            INITIAL,
        )
    }

    fn drag(session: &mut TestSession, from: (i32, i32), to: (i32, i32)) {
        session
            .handle_event(SessionEvent::PointerDown {
                x: from.0,
                y: from.1,
            })
            .unwrap();
        session
            .handle_event(SessionEvent::PointerMove { x: to.0, y: to.1 })
            .unwrap();
        session
            .handle_event(SessionEvent::PointerUp { x: to.0, y: to.1 })
            .unwrap();
    }

    #[test]
    fn hotkey_from_idle_enters_selecting_with_default_rect() {
        let mut session = make_session();

        session.handle_event(SessionEvent::ToggleSelection).unwrap();

        assert_eq!(session.state(), SessionState::Selecting);
        assert!(session.overlay.enabled);
        assert_eq!(session.overlay.selection, DEFAULT_SELECTION);
    }

    #[test]
    fn hotkey_while_selecting_is_idempotent() {
        let mut session = make_session();

        session.handle_event(SessionEvent::ToggleSelection).unwrap();
        session.handle_event(SessionEvent::ToggleSelection).unwrap();

        assert_eq!(session.state(), SessionState::Selecting);
        // No duplicate snapshot pass for the repeated hotkey.
        assert_eq!(session.overlay.snapshots, 1);
    }

    #[test]
    fn overlay_recaptures_after_disable_enable_round_trip() {
        let mut session = make_session();

        session.handle_event(SessionEvent::ToggleSelection).unwrap();
        session.handle_event(SessionEvent::CancelSelection).unwrap();
        session.handle_event(SessionEvent::ToggleSelection).unwrap();

        assert_eq!(session.overlay.snapshots, 2);
    }

    #[test]
    fn drag_and_release_commits_target_and_captures() {
        let mut session = make_session();
        session.handle_event(SessionEvent::ToggleSelection).unwrap();

        drag(&mut session, (100, 100), (400, 300));

        assert_eq!(session.state(), SessionState::Capturing);
        assert_eq!(session.target_rect(), Rect::new(100, 100, 300, 200));
        assert!(!session.overlay.enabled);
        assert!(session.output.enabled);
        assert_eq!(session.output.target, Rect::new(100, 100, 300, 200));
        assert_eq!(session.producer.starts, 1);
    }

    #[test]
    fn drag_updates_selection_rect_with_min_extent() {
        let mut session = make_session();
        session.handle_event(SessionEvent::ToggleSelection).unwrap();

        session
            .handle_event(SessionEvent::PointerDown { x: 50, y: 50 })
            .unwrap();
        session
            .handle_event(SessionEvent::PointerMove { x: 50, y: 50 })
            .unwrap();

        assert_eq!(session.overlay.selection, Rect::new(50, 50, 1, 1));
        assert!(session.overlay.updates >= 1);
    }

    #[test]
    fn click_without_extent_stays_selecting() {
        let mut session = make_session();
        session.handle_event(SessionEvent::ToggleSelection).unwrap();

        drag(&mut session, (200, 200), (200, 200));

        assert_eq!(session.state(), SessionState::Selecting);
        assert!(session.overlay.enabled);
        assert_eq!(session.target_rect(), INITIAL);
    }

    #[test]
    fn cancel_leaves_target_rect_unchanged() {
        let mut session = make_session();
        session.handle_event(SessionEvent::ToggleSelection).unwrap();
        session
            .handle_event(SessionEvent::PointerDown { x: 10, y: 10 })
            .unwrap();
        session
            .handle_event(SessionEvent::PointerMove { x: 500, y: 500 })
            .unwrap();

        session.handle_event(SessionEvent::CancelSelection).unwrap();

        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.overlay.enabled);
        assert_eq!(session.target_rect(), INITIAL);
        assert_eq!(session.output.allocations, 1);
    }

    #[test]
    fn producer_failure_notifies_once_and_returns_to_idle() {
        let mut session = make_session();
        session.handle_event(SessionEvent::ToggleSelection).unwrap();
        drag(&mut session, (0, 0), (300, 200));

        session.producer.fail_writes = true;
        session.tick().unwrap();

        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.output.enabled);
        assert_eq!(session.notifier.messages.len(), 1);
        assert_eq!(session.producer.stops, 1);

        // Further ticks in Idle neither render nor notify again.
        session.tick().unwrap();
        assert_eq!(session.notifier.messages.len(), 1);
        assert_eq!(session.output.renders, 0);
    }

    #[test]
    fn tray_stop_retains_surface_and_start_reuses_it() {
        let mut session = make_session();
        session.handle_event(SessionEvent::ToggleSelection).unwrap();
        drag(&mut session, (0, 0), (300, 200));
        let allocations = session.output.allocations;
        let handle = session.output.handle;

        session.handle_event(SessionEvent::StopCapture).unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.output.enabled);
        assert_eq!(session.target_rect(), Rect::new(0, 0, 300, 200));

        session.handle_event(SessionEvent::StartCapture).unwrap();
        assert_eq!(session.state(), SessionState::Capturing);
        assert_eq!(session.output.allocations, allocations);
        assert_eq!(session.output.handle, handle);
    }

    #[test]
    fn tick_passes_current_handle_and_rect_to_producer() {
        let mut session = make_session();
        session.handle_event(SessionEvent::ToggleSelection).unwrap();
        drag(&mut session, (100, 100), (400, 300));

        session.tick().unwrap();
        session.tick().unwrap();

        assert_eq!(session.output.renders, 2);
        assert_eq!(session.producer.writes.len(), 2);
        let (handle, rect) = session.producer.writes[0];
        assert_eq!(handle, session.output.handle);
        assert_eq!(rect, Rect::new(100, 100, 300, 200));
    }

    #[test]
    fn surface_too_large_notifies_and_falls_back_to_idle() {
        let mut session = make_session();
        session.handle_event(SessionEvent::ToggleSelection).unwrap();
        session.output.fail_too_large = true;

        drag(&mut session, (0, 0), (20000, 20000));

        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.output.enabled);
        assert_eq!(session.notifier.messages.len(), 1);
        assert_eq!(session.target_rect(), INITIAL);
    }

    #[test]
    fn unlisted_events_are_no_ops() {
        let mut session = make_session();

        // Pointer traffic and cancel outside Selecting.
        session
            .handle_event(SessionEvent::PointerDown { x: 1, y: 1 })
            .unwrap();
        session
            .handle_event(SessionEvent::PointerMove { x: 2, y: 2 })
            .unwrap();
        session
            .handle_event(SessionEvent::PointerUp { x: 3, y: 3 })
            .unwrap();
        session.handle_event(SessionEvent::CancelSelection).unwrap();
        session.handle_event(SessionEvent::StopCapture).unwrap();

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.overlay.snapshots, 0);
        assert_eq!(session.producer.starts, 0);

        // Start while already capturing does not restart the producer.
        session.handle_event(SessionEvent::StartCapture).unwrap();
        assert_eq!(session.state(), SessionState::Capturing);
        session.handle_event(SessionEvent::StartCapture).unwrap();
        assert_eq!(session.producer.starts, 1);
    }

    #[test]
    fn hotkey_while_capturing_reenters_selection() {
        let mut session = make_session();
        session.handle_event(SessionEvent::ToggleSelection).unwrap();
        drag(&mut session, (0, 0), (300, 200));
        assert_eq!(session.state(), SessionState::Capturing);

        session.handle_event(SessionEvent::ToggleSelection).unwrap();

        assert_eq!(session.state(), SessionState::Selecting);
        assert!(session.overlay.enabled);
        // The committed target stays until a new drag commits.
        assert_eq!(session.target_rect(), Rect::new(0, 0, 300, 200));
    }

    #[test]
    fn exit_stops_capture_and_requests_exit() {
        let mut session = make_session();
        session.handle_event(SessionEvent::ToggleSelection).unwrap();
        drag(&mut session, (0, 0), (300, 200));

        session.handle_event(SessionEvent::Exit).unwrap();

        assert!(session.exit_requested());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.producer.stops, 1);
    }

    #[test]
    fn shutdown_tears_down_components() {
        let mut session = make_session();
        session.handle_event(SessionEvent::ToggleSelection).unwrap();

        session.shutdown();

        assert_eq!(session.producer.shutdowns, 1);
        assert_eq!(session.overlay.shutdowns, 1);
        assert!(!session.overlay.enabled);
    }
}

//! RegionCast - share a screen region through an off-desktop output window

#![windows_subsystem = "windows"]

mod control;
mod notify;
mod session;
mod tray;

use capture::{CaptureProducer, MonitorProducer};
use common::{AppConfig, Rect};
use control::{ControlSignal, ControlWindow};
use crossbeam_channel::unbounded;
use notify::UserNotifier;
use output::OutputManager;
use overlay::{OverlayEvent, OverlayManager};
use session::{Session, SessionEvent, SessionState};
use std::time::Duration;
use tray::{SystemTray, TrayCommand};
use windows::Win32::System::WinRT::{RoInitialize, RO_INIT_MULTITHREADED};
use windows::Win32::UI::HiDpi::{
    SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE, WM_QUIT,
};

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load();
    common::logging::init_logging(&config.logging);

    if let Err(e) = run(&config) {
        tracing::error!(error = %e, "fatal error");
        notify::show_error(&format!("RegionCast quit: {e}"));
        return Err(e);
    }

    Ok(())
}

fn run(config: &AppConfig) -> anyhow::Result<()> {
    unsafe {
        let _ = SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2);
        RoInitialize(RO_INIT_MULTITHREADED)?;
    }

    let initial = Rect::new(
        0,
        0,
        config.output.initial_width.max(1),
        config.output.initial_height.max(1),
    );
    let retry_policy = config.sync.retry_policy();

    let output = OutputManager::new(initial, retry_policy)?;

    let (overlay_tx, overlay_rx) = unbounded::<OverlayEvent>();
    let overlay = OverlayManager::initialize(overlay_tx)?;

    let mut producer = MonitorProducer::new(retry_policy);
    producer.initialize()?;

    let mut session = Session::new(overlay, output, producer, UserNotifier, initial);

    let (control_tx, control_rx) = unbounded::<ControlSignal>();
    let control = ControlWindow::create(control_tx)?;
    let mut tray = SystemTray::new(control.hwnd());
    tray.show()?;

    let tick_interval = Duration::from_millis(config.output.tick_interval_ms.max(1));
    tracing::info!("ready, press Ctrl+Shift+R to select a region");

    loop {
        if !pump_messages() {
            session.handle_event(SessionEvent::Exit)?;
        }

        while let Ok(signal) = control_rx.try_recv() {
            match signal {
                ControlSignal::ToggleSelection => {
                    session.handle_event(SessionEvent::ToggleSelection)?;
                }
                ControlSignal::TrayMenu => {
                    let can_start = session.state() == SessionState::Idle;
                    let can_stop = session.state() == SessionState::Capturing;
                    if let Some(command) = tray.show_context_menu(can_start, can_stop)? {
                        session.handle_event(tray_command_to_event(command))?;
                    }
                }
            }
        }

        while let Ok(event) = overlay_rx.try_recv() {
            session.handle_event(overlay_event_to_session(event))?;
        }

        session.tick()?;

        if session.exit_requested() {
            break;
        }

        std::thread::sleep(tick_interval);
    }

    let _ = tray.hide();
    session.shutdown();
    tracing::info!("exiting");

    Ok(())
}

fn tray_command_to_event(command: TrayCommand) -> SessionEvent {
    match command {
        TrayCommand::Start => SessionEvent::StartCapture,
        TrayCommand::Stop => SessionEvent::StopCapture,
        TrayCommand::Exit => SessionEvent::Exit,
    }
}

fn overlay_event_to_session(event: OverlayEvent) -> SessionEvent {
    match event {
        OverlayEvent::PointerDown { x, y } => SessionEvent::PointerDown { x, y },
        OverlayEvent::PointerMove { x, y } => SessionEvent::PointerMove { x, y },
        OverlayEvent::PointerUp { x, y } => SessionEvent::PointerUp { x, y },
        OverlayEvent::Cancel => SessionEvent::CancelSelection,
    }
}

/// Drain the thread's message queue. Returns false once WM_QUIT arrives.
fn pump_messages() -> bool {
    unsafe {
        let mut msg = MSG::default();
        while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
            if msg.message == WM_QUIT {
                return false;
            }
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    true
}

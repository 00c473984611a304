//! macOS implementation of event collection using CGEvent taps.
//!
//! Each listener thread installs its own listen-only tap restricted to its
//! source's event types and runs a CFRunLoop until the run signal stops. It
//! requires Input Monitoring permission.

use crate::collector::listener::{CollectorError, EventSink};
use crate::collector::types::{InputSource, PointerButton};
use crate::signal::RunSignal;
use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
    CallbackResult,
};
use std::sync::Arc;
use std::time::Duration;

/// How long the run loop runs before re-checking the run signal.
const RUN_LOOP_SLICE: Duration = Duration::from_millis(100);

/// Event types a tap for `source` listens to.
fn event_types(source: InputSource) -> Vec<CGEventType> {
    match source {
        InputSource::Keyboard => vec![
            CGEventType::KeyDown,
            CGEventType::KeyUp,
            CGEventType::FlagsChanged,
        ],
        InputSource::Pointer => vec![
            CGEventType::MouseMoved,
            CGEventType::LeftMouseDragged,
            CGEventType::RightMouseDragged,
            CGEventType::OtherMouseDragged,
            CGEventType::LeftMouseDown,
            CGEventType::LeftMouseUp,
            CGEventType::RightMouseDown,
            CGEventType::RightMouseUp,
            CGEventType::OtherMouseDown,
            CGEventType::OtherMouseUp,
        ],
    }
}

/// Run the Core Graphics event loop for one source.
pub fn run_event_loop(sink: &Arc<EventSink>, signal: &RunSignal) -> Result<(), CollectorError> {
    let callback_sink = Arc::clone(sink);

    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        event_types(sink.source()),
        move |_proxy, event_type, _event: &CGEvent| {
            dispatch(&callback_sink, event_type);
            // Listen-only: pass the event through unchanged
            CallbackResult::Keep
        },
    )
    .map_err(|_| CollectorError::TapCreationFailed)?;

    let source = tap
        .mach_port()
        .create_runloop_source(0)
        .map_err(|_| CollectorError::RunLoopSourceFailed)?;

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }

    tap.enable();

    while signal.is_running() {
        run_slice();
    }

    // Dropping the tap closes the mach port
    unsafe {
        run_loop.remove_source(&source, kCFRunLoopCommonModes);
    }
    Ok(())
}

/// Service the current run loop for one slice.
///
/// Sources are registered under the common modes, which is a set and not a
/// mode in its own right; the loop itself has to run in a concrete member.
fn run_slice() {
    CFRunLoop::run_in_mode(unsafe { kCFRunLoopDefaultMode }, RUN_LOOP_SLICE, false);
}

/// Translate a CGEvent into a record on the sink.
///
/// Only the event type is inspected; key codes and locations are never read.
fn dispatch(sink: &EventSink, event_type: CGEventType) {
    use core_graphics::event::CGEventType::*;

    match event_type {
        KeyDown | FlagsChanged => sink.key(true),
        KeyUp => sink.key(false),

        MouseMoved | LeftMouseDragged | RightMouseDragged | OtherMouseDragged => {
            sink.pointer_move()
        }

        LeftMouseDown => sink.click(PointerButton::Left, true),
        LeftMouseUp => sink.click(PointerButton::Left, false),
        RightMouseDown => sink.click(PointerButton::Right, true),
        RightMouseUp => sink.click(PointerButton::Right, false),
        OtherMouseDown => sink.click(PointerButton::Other, true),
        OtherMouseUp => sink.click(PointerButton::Other, false),

        _ => {}
    }
}

/// Check if the application has Input Monitoring permission.
///
/// macOS has no direct query for this; creating a passive tap fails when the
/// permission is missing.
pub fn check_permission() -> bool {
    CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        |_proxy, _type, _event| CallbackResult::Keep,
    )
    .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_foundation::runloop::{CFRunLoopTimer, CFRunLoopTimerRef};
    use std::ffi::c_void;
    use std::sync::atomic::{AtomicBool, Ordering};

    static TIMER_FIRED: AtomicBool = AtomicBool::new(false);

    extern "C" fn on_timer(_timer: CFRunLoopTimerRef, _info: *mut c_void) {
        TIMER_FIRED.store(true, Ordering::SeqCst);
    }

    #[test]
    fn test_run_slice_services_common_mode_sources() {
        // Registered exactly like the tap source; a fire date of 0 is already due
        let timer = CFRunLoopTimer::new(0.0, 0.0, 0, 0, on_timer, std::ptr::null_mut());
        let run_loop = CFRunLoop::get_current();
        unsafe {
            run_loop.add_timer(&timer, kCFRunLoopCommonModes);
        }

        run_slice();

        unsafe {
            run_loop.remove_timer(&timer, kCFRunLoopCommonModes);
        }
        assert!(TIMER_FIRED.load(Ordering::SeqCst));
    }

    #[test]
    fn test_event_types_are_split_by_source() {
        let codes = |source| -> Vec<u32> {
            event_types(source).into_iter().map(|t| t as u32).collect()
        };
        let keyboard = codes(InputSource::Keyboard);
        let pointer = codes(InputSource::Pointer);

        assert!(keyboard.iter().all(|t| !pointer.contains(t)));
        assert!(keyboard.contains(&(CGEventType::KeyDown as u32)));
        assert!(pointer.contains(&(CGEventType::MouseMoved as u32)));
    }
}

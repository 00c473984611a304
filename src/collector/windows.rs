//! Windows implementation of event collection using low-level hooks.
//!
//! Each listener thread installs one hook (keyboard or mouse) and pumps its
//! message queue. A low-level hook only fires while its installing thread
//! pumps messages, so the thread blocks in `MsgWaitForMultipleObjects` and
//! drains with `PeekMessageW`, rechecking the run signal between waits.

use crate::collector::listener::{CollectorError, EventSink};
use crate::collector::types::{InputSource, PointerButton};
use crate::signal::RunSignal;
use std::cell::RefCell;
use std::sync::Arc;
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, MsgWaitForMultipleObjects, PeekMessageW, SetWindowsHookExW,
    UnhookWindowsHookEx, HHOOK, MSG, PM_REMOVE, QS_ALLINPUT, WH_KEYBOARD_LL, WH_MOUSE_LL, WM_KEYDOWN, WM_KEYUP, WM_LBUTTONDOWN, WM_LBUTTONUP,
    WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEMOVE, WM_QUIT, WM_RBUTTONDOWN, WM_RBUTTONUP,
    WM_SYSKEYDOWN, WM_SYSKEYUP, WM_XBUTTONDOWN, WM_XBUTTONUP,
};

/// Longest wait for queue input before the run signal is checked again.
const WAIT_SLICE_MS: u32 = 100;

thread_local! {
    // Hook procedures are plain functions; each listener thread parks its sink here.
    static SINK: RefCell<Option<Arc<EventSink>>> = const { RefCell::new(None) };
}

fn with_sink(f: impl FnOnce(&EventSink)) {
    SINK.with(|sink| {
        if let Some(ref sink) = *sink.borrow() {
            f(sink);
        }
    });
}

/// Low-level keyboard hook callback.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 {
        // Only the message type is read, never the key code
        match w_param.0 as u32 {
            WM_KEYDOWN | WM_SYSKEYDOWN => with_sink(|sink| sink.key(true)),
            WM_KEYUP | WM_SYSKEYUP => with_sink(|sink| sink.key(false)),
            _ => {}
        }
    }

    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

/// Low-level mouse hook callback.
unsafe extern "system" fn mouse_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 {
        // Coordinates in MSLLHOOKSTRUCT are deliberately never read
        match w_param.0 as u32 {
            WM_MOUSEMOVE => with_sink(|sink| sink.pointer_move()),
            WM_LBUTTONDOWN => with_sink(|sink| sink.click(PointerButton::Left, true)),
            WM_LBUTTONUP => with_sink(|sink| sink.click(PointerButton::Left, false)),
            WM_RBUTTONDOWN => with_sink(|sink| sink.click(PointerButton::Right, true)),
            WM_RBUTTONUP => with_sink(|sink| sink.click(PointerButton::Right, false)),
            WM_MBUTTONDOWN => with_sink(|sink| sink.click(PointerButton::Middle, true)),
            WM_MBUTTONUP => with_sink(|sink| sink.click(PointerButton::Middle, false)),
            WM_XBUTTONDOWN => with_sink(|sink| sink.click(PointerButton::Other, true)),
            WM_XBUTTONUP => with_sink(|sink| sink.click(PointerButton::Other, false)),
            _ => {}
        }
    }

    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

/// Run the hook message loop for one source.
pub fn run_event_loop(sink: &Arc<EventSink>, signal: &RunSignal) -> Result<(), CollectorError> {
    SINK.with(|s| *s.borrow_mut() = Some(Arc::clone(sink)));

    let hook = unsafe {
        match sink.source() {
            InputSource::Keyboard => {
                SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0)
            }
            InputSource::Pointer => SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), None, 0),
        }
    };

    let hook = match hook {
        Ok(hook) => hook,
        Err(_) => {
            SINK.with(|s| s.borrow_mut().take());
            return Err(CollectorError::HookInstallationFailed);
        }
    };

    pump(signal);

    unsafe {
        let _ = UnhookWindowsHookEx(hook);
    }
    SINK.with(|s| s.borrow_mut().take());
    Ok(())
}

/// Drain the thread's queue until the signal stops or `WM_QUIT` arrives.
///
/// Hook callbacks are delivered as sent messages, which only run inside
/// `PeekMessageW`; the wait wakes on them as soon as they are queued.
fn pump(signal: &RunSignal) {
    let mut msg = MSG::default();
    while signal.is_running() {
        while unsafe { PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE) }.as_bool() {
            if msg.message == WM_QUIT {
                return;
            }
        }
        unsafe {
            MsgWaitForMultipleObjects(None, false, WAIT_SLICE_MS, QS_ALLINPUT);
        }
    }
}

/// Low-level hooks generally work without an explicit grant; installing and
/// removing a temporary hook verifies it.
pub fn check_permission() -> bool {
    unsafe {
        match SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) {
            Ok(hook) => {
                let _ = UnhookWindowsHookEx(hook);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::WindowsAndMessaging::PostThreadMessageW;

    #[test]
    fn test_pump_wakes_on_posted_message() {
        let signal = Arc::new(RunSignal::new());
        let (tx, rx) = mpsc::channel();

        let handle = {
            let signal = Arc::clone(&signal);
            std::thread::spawn(move || {
                let mut msg = MSG::default();
                // Creates the thread's message queue before the id is handed out
                unsafe {
                    let _ = PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE);
                }
                tx.send(unsafe { GetCurrentThreadId() }).unwrap();
                pump(&signal);
            })
        };

        let thread_id = rx.recv().unwrap();
        let posted = Instant::now();
        unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) }.unwrap();

        while !handle.is_finished() {
            assert!(posted.elapsed() < Duration::from_secs(2), "pump ignored WM_QUIT");
            std::thread::sleep(Duration::from_millis(5));
        }
        handle.join().unwrap();
        assert!(signal.is_running());
    }

    #[test]
    fn test_pump_returns_after_stop() {
        let signal = Arc::new(RunSignal::new());
        let handle = {
            let signal = Arc::clone(&signal);
            std::thread::spawn(move || pump(&signal))
        };

        std::thread::sleep(Duration::from_millis(50));
        let stopped = Instant::now();
        signal.stop();
        handle.join().unwrap();

        assert!(stopped.elapsed() < Duration::from_millis(WAIT_SLICE_MS as u64 * 5));
    }
}

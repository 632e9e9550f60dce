//! Win32 backends: `SendInput` injection, low-level hooks for capture, and
//! `RegisterHotKey` for global hotkeys.

use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::*;
use windows::Win32::UI::WindowsAndMessaging::*;

use crate::backend::keys::{self, Button};
use crate::backend::{CaptureService, CaptureSink, Command, Hotkey, HotkeyBackend, InputInjector, RawInput};
use crate::error::{Error, Result};
use crate::models::EventKind;

const MOD_ALT: u32 = 0x0001;
const MOD_CONTROL: u32 = 0x0002;
const MOD_SHIFT: u32 = 0x0004;
const MOD_WIN: u32 = 0x0008;
const MOD_NOREPEAT: u32 = 0x4000;

// set on input synthesized by SendInput, including our own playback
const LLKHF_INJECTED_BIT: u32 = 0x0010;
const LLMHF_INJECTED_BIT: u32 = 0x0001;

const XBUTTON1: u32 = 0x0001;
const XBUTTON2: u32 = 0x0002;

// ---------------------------------------------------------------------------
// Injection
// ---------------------------------------------------------------------------

pub struct SendInputInjector;

impl SendInputInjector {
    fn key(&self, value: &str, up: bool) -> Result<()> {
        let vk = keys::key_code(value)
            .ok_or_else(|| Error::Injection(format!("unknown key '{value}'")))?;
        let input = INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(vk),
                    wScan: 0,
                    dwFlags: if up { KEYEVENTF_KEYUP } else { KEYBD_EVENT_FLAGS(0) },
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        };
        send(input)
    }

    fn button(&self, value: &str, up: bool) -> Result<()> {
        let button = Button::parse(value)
            .ok_or_else(|| Error::Injection(format!("unknown mouse button '{value}'")))?;
        let (flag, data) = match (button, up) {
            (Button::Left, false) => (MOUSEEVENTF_LEFTDOWN, 0),
            (Button::Left, true) => (MOUSEEVENTF_LEFTUP, 0),
            (Button::Right, false) => (MOUSEEVENTF_RIGHTDOWN, 0),
            (Button::Right, true) => (MOUSEEVENTF_RIGHTUP, 0),
            (Button::Middle, false) => (MOUSEEVENTF_MIDDLEDOWN, 0),
            (Button::Middle, true) => (MOUSEEVENTF_MIDDLEUP, 0),
            (Button::X1, false) => (MOUSEEVENTF_XDOWN, XBUTTON1),
            (Button::X1, true) => (MOUSEEVENTF_XUP, XBUTTON1),
            (Button::X2, false) => (MOUSEEVENTF_XDOWN, XBUTTON2),
            (Button::X2, true) => (MOUSEEVENTF_XUP, XBUTTON2),
        };
        let input = INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx: 0,
                    dy: 0,
                    mouseData: data,
                    dwFlags: flag,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        };
        send(input)
    }

    fn edge(&self, kind: EventKind, value: &str, up: bool) -> Result<()> {
        match kind {
            EventKind::Key => self.key(value, up),
            EventKind::MouseButton => self.button(value, up),
        }
    }
}

impl InputInjector for SendInputInjector {
    fn tap(&self, kind: EventKind, value: &str) -> Result<()> {
        self.edge(kind, value, false)?;
        self.edge(kind, value, true)
    }

    fn press(&self, kind: EventKind, value: &str) -> Result<()> {
        self.edge(kind, value, false)
    }

    fn release(&self, kind: EventKind, value: &str) -> Result<()> {
        self.edge(kind, value, true)
    }
}

fn send(input: INPUT) -> Result<()> {
    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if sent != 1 {
        return Err(Error::Injection("SendInput was blocked".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

// hook procedures are plain extern fns, so the active sink lives here
static SINK: Mutex<Option<CaptureSink>> = Mutex::new(None);

fn current_sink() -> Option<CaptureSink> {
    SINK.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

fn key_down(message: u32, kb: &KBDLLHOOKSTRUCT) -> Option<RawInput> {
    if message != WM_KEYDOWN && message != WM_SYSKEYDOWN {
        return None;
    }
    if kb.flags.0 & LLKHF_INJECTED_BIT != 0 {
        return None;
    }
    Some(RawInput::KeyDown {
        name: keys::key_name(kb.vkCode as u16),
    })
}

fn button_down(message: u32, ms: &MSLLHOOKSTRUCT) -> Option<RawInput> {
    if ms.flags & LLMHF_INJECTED_BIT != 0 {
        return None;
    }
    let button = match message {
        WM_LBUTTONDOWN => Button::Left,
        WM_RBUTTONDOWN => Button::Right,
        WM_MBUTTONDOWN => Button::Middle,
        WM_XBUTTONDOWN if (ms.mouseData >> 16) & 0xFFFF == XBUTTON2 => Button::X2,
        WM_XBUTTONDOWN => Button::X1,
        _ => return None,
    };
    Some(RawInput::ButtonDown {
        button: button.name().to_string(),
        x: ms.pt.x,
        y: ms.pt.y,
    })
}

extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    unsafe {
        if code >= HC_ACTION as i32 {
            let kb = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
            if let (Some(sink), Some(input)) = (current_sink(), key_down(wparam.0 as u32, kb)) {
                sink(input);
            }
        }
        CallNextHookEx(None, code, wparam, lparam)
    }
}

extern "system" fn mouse_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    unsafe {
        if code >= HC_ACTION as i32 {
            let ms = &*(lparam.0 as *const MSLLHOOKSTRUCT);
            if let (Some(sink), Some(input)) = (current_sink(), button_down(wparam.0 as u32, ms)) {
                sink(input);
            }
        }
        CallNextHookEx(None, code, wparam, lparam)
    }
}

/// Keyboard and mouse low-level hooks running on their own message-loop thread.
#[derive(Default)]
pub struct HookCapture {
    thread: Option<MessageThread>,
}

impl CaptureService for HookCapture {
    fn install(&mut self, sink: CaptureSink) -> Result<()> {
        self.remove();
        *SINK.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);

        let thread = MessageThread::spawn("keyloop-capture", || unsafe {
            let hmod = GetModuleHandleW(None).map_err(|e| Error::Capture(e.to_string()))?;
            let kb_hook = SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), hmod, 0)
                .map_err(|e| Error::Capture(format!("keyboard hook: {e}")))?;
            let ms_hook = match SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_proc), hmod, 0) {
                Ok(hook) => hook,
                Err(e) => {
                    let _ = UnhookWindowsHookEx(kb_hook);
                    return Err(Error::Capture(format!("mouse hook: {e}")));
                }
            };
            Ok(move || {
                let _ = UnhookWindowsHookEx(kb_hook);
                let _ = UnhookWindowsHookEx(ms_hook);
            })
        });

        match thread {
            Ok(thread) => {
                self.thread = Some(thread);
                Ok(())
            }
            Err(err) => {
                SINK.lock().unwrap_or_else(PoisonError::into_inner).take();
                Err(err)
            }
        }
    }

    fn remove(&mut self) {
        if let Some(thread) = self.thread.take() {
            thread.quit();
        }
        SINK.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

// ---------------------------------------------------------------------------
// Hotkeys
// ---------------------------------------------------------------------------

/// `RegisterHotKey` bindings serviced by a message-loop thread that forwards
/// `WM_HOTKEY` as [`Command`]s.
pub struct Win32Hotkeys {
    tx: Sender<Command>,
    thread: Option<MessageThread>,
}

impl Win32Hotkeys {
    pub fn new(tx: Sender<Command>) -> Self {
        Self { tx, thread: None }
    }
}

impl HotkeyBackend for Win32Hotkeys {
    fn bind(&mut self, bindings: &[(Hotkey, Command)]) -> Result<()> {
        self.unbind_all();

        let mut resolved = Vec::with_capacity(bindings.len());
        for (hotkey, command) in bindings {
            let vk = keys::key_code(&hotkey.key)
                .ok_or_else(|| Error::Registration(format!("unknown key '{}'", hotkey.key)))?;
            resolved.push((hotkey.to_string(), modifiers(hotkey), vk as u32, command.clone()));
        }

        let tx = self.tx.clone();
        let commands: Vec<Command> = resolved.iter().map(|(_, _, _, c)| c.clone()).collect();
        let thread = MessageThread::spawn_with_handler(
            "keyloop-hotkeys",
            move || unsafe {
                for (id, (label, mods, vk, _)) in resolved.iter().enumerate() {
                    if let Err(e) = RegisterHotKey(HWND(0), id as i32 + 1, HOT_KEY_MODIFIERS(*mods), *vk) {
                        for done in 0..id {
                            let _ = UnregisterHotKey(HWND(0), done as i32 + 1);
                        }
                        return Err(Error::Registration(format!("{label}: {e}")));
                    }
                }
                let count = resolved.len();
                Ok(move || {
                    for id in 0..count {
                        let _ = UnregisterHotKey(HWND(0), id as i32 + 1);
                    }
                })
            },
            move |msg: &MSG| {
                if msg.message == WM_HOTKEY {
                    let id = msg.wParam.0;
                    if let Some(command) = id.checked_sub(1).and_then(|i| commands.get(i)) {
                        let _ = tx.send(command.clone());
                    }
                }
            },
        )?;

        self.thread = Some(thread);
        Ok(())
    }

    fn unbind_all(&mut self) {
        if let Some(thread) = self.thread.take() {
            thread.quit();
        }
    }
}

impl Drop for Win32Hotkeys {
    fn drop(&mut self) {
        self.unbind_all();
    }
}

fn modifiers(hotkey: &Hotkey) -> u32 {
    let mut mods = MOD_NOREPEAT;
    if hotkey.alt {
        mods |= MOD_ALT;
    }
    if hotkey.ctrl {
        mods |= MOD_CONTROL;
    }
    if hotkey.shift {
        mods |= MOD_SHIFT;
    }
    if hotkey.win {
        mods |= MOD_WIN;
    }
    mods
}

// ---------------------------------------------------------------------------
// Message loop thread
// ---------------------------------------------------------------------------

/// A thread running `GetMessageW` until it receives `WM_QUIT`.
///
/// `setup` runs on the thread before the loop and returns a teardown closure
/// that runs after it; a setup error is returned from `spawn`.
struct MessageThread {
    thread_id: u32,
    handle: JoinHandle<()>,
}

impl MessageThread {
    fn spawn<S, T>(name: &str, setup: S) -> Result<Self>
    where
        S: FnOnce() -> Result<T> + Send + 'static,
        T: FnOnce(),
    {
        Self::spawn_with_handler(name, setup, |_msg: &MSG| {})
    }

    fn spawn_with_handler<S, T, H>(name: &str, setup: S, mut handler: H) -> Result<Self>
    where
        S: FnOnce() -> Result<T> + Send + 'static,
        T: FnOnce(),
        H: FnMut(&MSG) + Send + 'static,
    {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<u32>>(1);

        let handle = thread::Builder::new().name(name.into()).spawn(move || unsafe {
            // force the message queue into existence before anyone posts WM_QUIT
            let mut msg = MSG::default();
            let _ = PeekMessageW(&mut msg, HWND(0), WM_USER, WM_USER, PM_NOREMOVE);

            let teardown = match setup() {
                Ok(teardown) => teardown,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(GetCurrentThreadId()));

            while GetMessageW(&mut msg, HWND(0), 0, 0).0 > 0 {
                handler(&msg);
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }

            teardown();
        })?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => Ok(Self { thread_id, handle }),
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(_) => {
                let _ = handle.join();
                Err(Error::Capture(format!("{name} thread exited during setup")))
            }
        }
    }

    fn quit(self) {
        unsafe {
            if let Err(e) = PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) {
                warn!(error = %e, "failed to post WM_QUIT");
                return;
            }
        }
        if self.handle.join().is_err() {
            warn!("message loop thread panicked");
        }
        debug!("message loop thread joined");
    }
}

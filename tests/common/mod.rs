//! Fake OS backends shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use keyloop::backend::{
    CaptureService, CaptureSink, Command, Hotkey, HotkeyBackend, InputInjector, Pacer, RawInput,
};
use keyloop::{Backends, EventKind, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Tap(String),
    Press(String),
    Release(String),
    Sleep(u128),
}

/// Injector and pacer writing to one shared timeline.
#[derive(Clone, Default)]
pub struct Timeline {
    steps: Arc<Mutex<Vec<Step>>>,
}

impl Timeline {
    pub fn steps(&self) -> Vec<Step> {
        self.steps.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.steps.lock().unwrap().len()
    }

    /// Polls until at least `count` steps were recorded.
    pub fn wait_for(&self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.len() < count {
            assert!(Instant::now() < deadline, "timed out waiting for {count} steps");
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn push(&self, step: Step) {
        self.steps.lock().unwrap().push(step);
    }
}

impl InputInjector for Timeline {
    fn tap(&self, _kind: EventKind, value: &str) -> Result<()> {
        self.push(Step::Tap(value.to_string()));
        Ok(())
    }

    fn press(&self, _kind: EventKind, value: &str) -> Result<()> {
        self.push(Step::Press(value.to_string()));
        Ok(())
    }

    fn release(&self, _kind: EventKind, value: &str) -> Result<()> {
        self.push(Step::Release(value.to_string()));
        Ok(())
    }
}

impl Pacer for Timeline {
    // records the requested wait, then yields briefly so the loop does not spin
    fn sleep(&self, duration: Duration) {
        self.push(Step::Sleep(duration.as_millis()));
        thread::sleep(Duration::from_millis(1));
    }
}

#[derive(Clone, Default)]
pub struct FakeCapture {
    sink: Arc<Mutex<Option<CaptureSink>>>,
}

impl FakeCapture {
    pub fn is_installed(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    pub fn key(&self, name: &str) {
        self.emit(RawInput::KeyDown { name: name.into() });
    }

    pub fn click(&self, button: &str, x: i32, y: i32) {
        self.emit(RawInput::ButtonDown {
            button: button.into(),
            x,
            y,
        });
    }

    fn emit(&self, input: RawInput) {
        let sink = self.sink.lock().unwrap().clone();
        if let Some(sink) = sink {
            sink(input);
        }
    }
}

impl CaptureService for FakeCapture {
    fn install(&mut self, sink: CaptureSink) -> Result<()> {
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn remove(&mut self) {
        self.sink.lock().unwrap().take();
    }
}

#[derive(Clone, Default)]
pub struct FakeHotkeys {
    pub bound: Arc<Mutex<Vec<(String, Command)>>>,
    pub bind_calls: Arc<Mutex<usize>>,
    /// Hotkeys (as displayed) that the fake OS refuses.
    pub taken: Arc<Mutex<Vec<String>>>,
}

impl FakeHotkeys {
    pub fn bound_keys(&self) -> Vec<String> {
        self.bound.lock().unwrap().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn bind_calls(&self) -> usize {
        *self.bind_calls.lock().unwrap()
    }
}

impl HotkeyBackend for FakeHotkeys {
    fn bind(&mut self, bindings: &[(Hotkey, Command)]) -> Result<()> {
        *self.bind_calls.lock().unwrap() += 1;
        let taken = self.taken.lock().unwrap().clone();
        if let Some((key, _)) = bindings.iter().find(|(k, _)| taken.contains(&k.to_string())) {
            return Err(keyloop::Error::Registration(format!("{key} is already registered")));
        }
        self.bound
            .lock()
            .unwrap()
            .extend(bindings.iter().map(|(k, c)| (k.to_string(), c.clone())));
        Ok(())
    }

    fn unbind_all(&mut self) {
        self.bound.lock().unwrap().clear();
    }
}

pub struct Fakes {
    pub timeline: Timeline,
    pub capture: FakeCapture,
    pub hotkeys: FakeHotkeys,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            timeline: Timeline::default(),
            capture: FakeCapture::default(),
            hotkeys: FakeHotkeys::default(),
        }
    }

    pub fn backends(&self) -> Backends {
        let mut backends = Backends::new(
            Arc::new(self.timeline.clone()),
            Box::new(self.capture.clone()),
            Box::new(self.hotkeys.clone()),
        );
        backends.pacer = Arc::new(self.timeline.clone());
        backends
    }
}

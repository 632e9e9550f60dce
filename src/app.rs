use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::backend::{
    lock_sequence, CaptureService, Command, Hotkey, HotkeyBackend, HotkeyManager, InputInjector,
    Pacer, PlaybackState, Player, Recorder, SharedSequence, SurfaceFilter, ThreadPacer,
};
use crate::backend::recorder::NoOwnSurface;
use crate::backend::storage::ConfigStore;
use crate::config::Settings;
use crate::console;
use crate::error::{Error, Result};
use crate::models::{Event, EventSequence, Mode};

/// The OS capabilities the app drives.
pub struct Backends {
    pub injector: Arc<dyn InputInjector>,
    pub capture: Box<dyn CaptureService>,
    pub hotkeys: Box<dyn HotkeyBackend>,
    pub surface: Arc<dyn SurfaceFilter>,
    pub pacer: Arc<dyn Pacer>,
}

impl Backends {
    pub fn new(
        injector: Arc<dyn InputInjector>,
        capture: Box<dyn CaptureService>,
        hotkeys: Box<dyn HotkeyBackend>,
    ) -> Self {
        Self {
            injector,
            capture,
            hotkeys,
            surface: Arc::new(NoOwnSurface),
            pacer: Arc::new(ThreadPacer),
        }
    }
}

/// Whether the control loop keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Owns the live event list and every component that touches it. All
/// access to the list goes through here (or through the recorder and player
/// it hands the shared handle to), always under the list's lock.
pub struct KeyLoopApp {
    events: SharedSequence,
    recorder: Recorder,
    player: Player,
    hotkeys: HotkeyManager,
    store: ConfigStore,
    current: Option<String>,
    settings: Settings,
    settings_path: Option<PathBuf>,
    status: String,
}

impl KeyLoopApp {
    pub fn new(settings: Settings, store: ConfigStore, backends: Backends) -> Result<Self> {
        settings.validate()?;

        let events: SharedSequence = Arc::new(Mutex::new(EventSequence::new()));
        let recorder = Recorder::new(Arc::clone(&events), backends.capture)
            .with_surface_filter(backends.surface)
            .with_default_delay(settings.recorder.default_delay);
        let player = Player::new(backends.injector)
            .with_pacer(backends.pacer)
            .with_pass_pause(settings.pass_pause());
        let hotkeys = HotkeyManager::new(
            backends.hotkeys,
            &settings.hotkeys.start,
            &settings.hotkeys.stop,
        )?;

        Ok(Self {
            events,
            recorder,
            player,
            hotkeys,
            store,
            current: None,
            settings,
            settings_path: None,
            status: "Ready.".into(),
        })
    }

    /// Persist hotkey changes to this settings file.
    pub fn with_settings_path(mut self, path: PathBuf) -> Self {
        self.settings_path = Some(path);
        self
    }

    /// Registers the start/stop hotkeys.
    pub fn bind_hotkeys(&mut self) -> Result<()> {
        self.hotkeys.bind()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn current_config(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Handle to the live list, for views that render it.
    pub fn events(&self) -> SharedSequence {
        Arc::clone(&self.events)
    }

    pub fn snapshot(&self) -> EventSequence {
        lock_sequence(&self.events).clone()
    }

    pub fn len(&self) -> usize {
        lock_sequence(&self.events).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ---- recording ----

    pub fn is_recording(&self) -> bool {
        self.recorder.is_enabled()
    }

    /// Turns capture on or off. Switching it off re-binds the hotkeys, since
    /// removing the capture hook takes them down too.
    pub fn toggle_record(&mut self) -> Result<bool> {
        if self.recorder.is_enabled() {
            self.recorder.stop();
            self.hotkeys.restore();
            Ok(false)
        } else {
            self.recorder.start()?;
            Ok(true)
        }
    }

    // ---- editing ----

    pub fn remove_at(&mut self, index: usize) -> Result<Event> {
        lock_sequence(&self.events).remove_at(index)
    }

    pub fn swap(&mut self, i: usize, j: usize) -> Result<()> {
        lock_sequence(&self.events).swap(i, j)
    }

    pub fn set_params(&mut self, index: usize, delay: f64, mode: Mode) -> Result<()> {
        lock_sequence(&self.events).set_params(index, delay, mode)
    }

    pub fn clear(&mut self) {
        lock_sequence(&self.events).clear();
    }

    /// Starts a drag on `index` and returns the anchor to pass to [`Self::drag_to`].
    pub fn begin_drag(&self, index: usize) -> Result<usize> {
        let len = self.len();
        if index >= len {
            return Err(Error::Index { index, len });
        }
        Ok(index)
    }

    /// Moves the dragged event one swap at a time; returns the new anchor.
    pub fn drag_to(&mut self, anchor: usize, new_index: usize) -> Result<usize> {
        self.swap(anchor, new_index)?;
        Ok(new_index)
    }

    /// Drops the live list and forgets which config it came from.
    pub fn new_sequence(&mut self) {
        self.clear();
        self.current = None;
    }

    // ---- playback ----

    pub fn start_playback(&mut self) -> Result<bool> {
        self.player.start(&self.events)
    }

    pub fn stop_playback(&mut self) -> bool {
        self.player.stop()
    }

    /// Stops playback and waits for the worker to finish its current event.
    pub fn stop_playback_and_wait(&mut self) {
        self.player.stop_and_wait();
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.player.state()
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_running()
    }

    // ---- persistence ----

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn list_configs(&self) -> Result<Vec<String>> {
        self.store.list()
    }

    /// Replaces the live list with a stored config. On error the live list is kept.
    pub fn load_config(&mut self, name: &str) -> Result<usize> {
        let sequence = self.store.load(name)?;
        let len = sequence.len();
        *lock_sequence(&self.events) = sequence;
        self.current = Some(name.to_string());
        Ok(len)
    }

    pub fn save_config(&mut self, name: &str) -> Result<()> {
        let sequence = self.snapshot();
        self.store.save(name, &sequence)?;
        self.current = Some(name.to_string());
        Ok(())
    }

    /// Saves under the name of the config that was last loaded or saved.
    pub fn save_current(&mut self) -> Result<String> {
        let name = self
            .current
            .clone()
            .ok_or_else(|| Error::Validation("no config is loaded; give a name to save".into()))?;
        self.save_config(&name)?;
        Ok(name)
    }

    pub fn delete_config(&mut self, name: &str) -> Result<()> {
        self.store.delete(name)?;
        if self.current.as_deref() == Some(name) {
            self.current = None;
        }
        Ok(())
    }

    // ---- hotkeys ----

    pub fn hotkeys(&self) -> (&Hotkey, &Hotkey) {
        (self.hotkeys.start_key(), self.hotkeys.stop_key())
    }

    /// Switches hotkeys; the previous pair stays active on failure.
    pub fn rebind_hotkeys(&mut self, start: &str, stop: &str) -> Result<()> {
        self.hotkeys.rebind(start, stop)?;
        self.settings.hotkeys.start = self.hotkeys.start_key().to_string();
        self.settings.hotkeys.stop = self.hotkeys.stop_key().to_string();

        if let Some(path) = &self.settings_path {
            if let Err(err) = self.settings.save_to(path) {
                warn!(error = %err, "hotkeys changed but settings were not saved");
            }
        }
        Ok(())
    }

    // ---- control loop ----

    /// Applies one command from the hotkey thread or the console and updates
    /// the status line. Errors end up in the status line, not in the return value.
    pub fn handle(&mut self, command: Command) -> Flow {
        match command {
            Command::StartPlayback => {
                self.status = match self.start_playback() {
                    Ok(true) => "▶ Playing".into(),
                    Ok(false) => "▶ Already playing".into(),
                    Err(err) => format!("❌ {err}"),
                };
            }
            Command::StopPlayback => {
                self.status = if self.stop_playback() {
                    "🛑 Playback stopped".into()
                } else {
                    "Playback is not running".into()
                };
            }
            Command::Input(line) => match console::parse(&line) {
                Ok(Some(cmd)) => match console::execute(self, cmd) {
                    Ok(console::Outcome::Message(message)) => self.status = message,
                    Ok(console::Outcome::Quit) => return Flow::Exit,
                    Err(err) => self.status = format!("❌ {err}"),
                },
                Ok(None) => self.status.clear(),
                Err(err) => self.status = format!("❌ {err}"),
            },
            Command::Exit => {
                info!("exit requested");
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    /// Stops everything that runs in the background.
    pub fn shutdown(&mut self) {
        self.player.stop_and_wait();
        self.recorder.stop();
        self.hotkeys.unbind();
    }
}

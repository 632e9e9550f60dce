use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use crate::backend::{keys, Command};
use crate::error::{Error, Result};

/// Default hotkey that starts playback.
pub const DEFAULT_START: &str = "F7";
/// Default hotkey that stops playback.
pub const DEFAULT_STOP: &str = "F8";

/// A global hotkey: optional modifiers plus one key, written `ctrl+shift+f7`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hotkey {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub win: bool,
    pub key: String,
}

impl FromStr for Hotkey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(Error::Validation("hotkey cannot be empty".into()));
        }

        let mut hotkey = Hotkey {
            ctrl: false,
            alt: false,
            shift: false,
            win: false,
            key: String::new(),
        };

        for part in s.split('+') {
            let part = keys::normalize(part);
            match part.as_str() {
                "ctrl" => hotkey.ctrl = true,
                "alt" => hotkey.alt = true,
                "shift" => hotkey.shift = true,
                "windows" => hotkey.win = true,
                "" => return Err(Error::Validation(format!("malformed hotkey '{s}'"))),
                key => {
                    if !hotkey.key.is_empty() {
                        return Err(Error::Validation(format!(
                            "hotkey '{s}' names more than one key"
                        )));
                    }
                    if !keys::is_known_key(key) {
                        return Err(Error::Validation(format!("unknown key '{key}' in hotkey '{s}'")));
                    }
                    hotkey.key = key.to_string();
                }
            }
        }

        if hotkey.key.is_empty() {
            return Err(Error::Validation(format!("hotkey '{s}' has no key")));
        }
        Ok(hotkey)
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (on, name) in [
            (self.ctrl, "ctrl"),
            (self.alt, "alt"),
            (self.shift, "shift"),
            (self.win, "windows"),
        ] {
            if on {
                write!(f, "{name}+")?;
            }
        }
        write!(f, "{}", self.key)
    }
}

/// OS mechanism that turns hotkey presses into [`Command`]s.
pub trait HotkeyBackend: Send {
    /// Registers all bindings. On error nothing from this call stays registered.
    fn bind(&mut self, bindings: &[(Hotkey, Command)]) -> Result<()>;

    /// Best-effort; failures are logged, never returned.
    fn unbind_all(&mut self);
}

/// Owns the start/stop pair and keeps the backend in sync with it.
pub struct HotkeyManager {
    backend: Box<dyn HotkeyBackend>,
    start: Hotkey,
    stop: Hotkey,
}

impl HotkeyManager {
    pub fn new(backend: Box<dyn HotkeyBackend>, start: &str, stop: &str) -> Result<Self> {
        let (start, stop) = parse_pair(start, stop)?;
        Ok(Self {
            backend,
            start,
            stop,
        })
    }

    pub fn start_key(&self) -> &Hotkey {
        &self.start
    }

    pub fn stop_key(&self) -> &Hotkey {
        &self.stop
    }

    /// Registers the current pair.
    pub fn bind(&mut self) -> Result<()> {
        self.backend.unbind_all();
        self.backend.bind(&bindings(&self.start, &self.stop))?;
        info!(start = %self.start, stop = %self.stop, "hotkeys bound");
        Ok(())
    }

    /// Re-registers the current pair after something else (the capture hook)
    /// tore it down. Failure is logged only.
    pub fn restore(&mut self) {
        if let Err(err) = self.bind() {
            warn!(error = %err, "could not restore hotkeys");
        }
    }

    /// Switches to a new pair. If registration fails the previous pair is
    /// bound again before the error is returned.
    pub fn rebind(&mut self, start: &str, stop: &str) -> Result<()> {
        let (start, stop) = parse_pair(start, stop)?;

        self.backend.unbind_all();
        match self.backend.bind(&bindings(&start, &stop)) {
            Ok(()) => {
                info!(%start, %stop, "hotkeys rebound");
                self.start = start;
                self.stop = stop;
                Ok(())
            }
            Err(err) => {
                warn!(%start, %stop, error = %err, "hotkey rebind failed, reverting");
                self.restore();
                Err(match err {
                    Error::Registration(_) => err,
                    other => Error::Registration(other.to_string()),
                })
            }
        }
    }

    pub fn unbind(&mut self) {
        self.backend.unbind_all();
    }
}

impl Drop for HotkeyManager {
    fn drop(&mut self) {
        self.backend.unbind_all();
    }
}

fn parse_pair(start: &str, stop: &str) -> Result<(Hotkey, Hotkey)> {
    if start.trim().is_empty() || stop.trim().is_empty() {
        return Err(Error::Validation("hotkeys cannot be empty".into()));
    }
    let start: Hotkey = start.parse()?;
    let stop: Hotkey = stop.parse()?;
    if start == stop {
        return Err(Error::Validation(format!(
            "start and stop cannot share the hotkey '{start}'"
        )));
    }
    Ok((start, stop))
}

fn bindings(start: &Hotkey, stop: &Hotkey) -> [(Hotkey, Command); 2] {
    [
        (start.clone(), Command::StartPlayback),
        (stop.clone(), Command::StopPlayback),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct FakeBackend {
        bound: Arc<Mutex<Vec<(String, Command)>>>,
        refuse: Option<String>,
    }

    impl HotkeyBackend for FakeBackend {
        fn bind(&mut self, bindings: &[(Hotkey, Command)]) -> Result<()> {
            if let Some(taken) = &self.refuse {
                if bindings.iter().any(|(key, _)| key.to_string() == *taken) {
                    return Err(Error::Registration(format!("{taken} is taken")));
                }
            }
            let mut bound = self.bound.lock().unwrap();
            bound.extend(bindings.iter().map(|(k, c)| (k.to_string(), c.clone())));
            Ok(())
        }

        fn unbind_all(&mut self) {
            self.bound.lock().unwrap().clear();
        }
    }

    fn bound_keys(backend: &FakeBackend) -> Vec<String> {
        backend.bound.lock().unwrap().iter().map(|(k, _)| k.clone()).collect()
    }

    #[test]
    fn test_parse_hotkeys() {
        let hotkey: Hotkey = "F7".parse().unwrap();
        assert_eq!(hotkey.key, "f7");
        assert!(!hotkey.ctrl);

        let hotkey: Hotkey = "Ctrl+Shift+R".parse().unwrap();
        assert!(hotkey.ctrl && hotkey.shift && !hotkey.alt);
        assert_eq!(hotkey.to_string(), "ctrl+shift+r");

        let hotkey: Hotkey = "control + escape".parse().unwrap();
        assert_eq!(hotkey.to_string(), "ctrl+esc");
    }

    #[test]
    fn test_parse_rejects_bad_hotkeys() {
        for bad in ["", "   ", "ctrl+", "ctrl+alt", "a+b", "hyper+q", "ctrl++a"] {
            assert!(matches!(bad.parse::<Hotkey>(), Err(Error::Validation(_))), "{bad:?}");
        }
    }

    #[test]
    fn test_bind_registers_start_and_stop() {
        let backend = FakeBackend::default();
        let mut manager = HotkeyManager::new(Box::new(backend.clone()), "F7", "F8").unwrap();
        manager.bind().unwrap();

        let bound = backend.bound.lock().unwrap().clone();
        assert_eq!(
            bound,
            vec![
                ("f7".to_string(), Command::StartPlayback),
                ("f8".to_string(), Command::StopPlayback)
            ]
        );
    }

    #[test]
    fn test_rebind_success() {
        let backend = FakeBackend::default();
        let mut manager = HotkeyManager::new(Box::new(backend.clone()), "F7", "F8").unwrap();
        manager.bind().unwrap();

        manager.rebind("ctrl+f9", "f10").unwrap();
        assert_eq!(manager.start_key().to_string(), "ctrl+f9");
        assert_eq!(bound_keys(&backend), vec!["ctrl+f9", "f10"]);
    }

    #[test]
    fn test_rebind_failure_reverts() {
        let backend = FakeBackend {
            refuse: Some("f10".into()),
            ..Default::default()
        };
        let mut manager = HotkeyManager::new(Box::new(backend.clone()), "F7", "F8").unwrap();
        manager.bind().unwrap();

        let err = manager.rebind("f9", "f10").unwrap_err();
        assert!(matches!(err, Error::Registration(_)));
        assert_eq!(manager.start_key().key, "f7");
        assert_eq!(bound_keys(&backend), vec!["f7", "f8"]);
    }

    #[test]
    fn test_rebind_rejects_empty_without_touching_bindings() {
        let backend = FakeBackend::default();
        let mut manager = HotkeyManager::new(Box::new(backend.clone()), "F7", "F8").unwrap();
        manager.bind().unwrap();

        assert!(matches!(manager.rebind("", "f8"), Err(Error::Validation(_))));
        assert!(matches!(manager.rebind("f9", "f9"), Err(Error::Validation(_))));
        assert_eq!(bound_keys(&backend), vec!["f7", "f8"]);
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Delay given to freshly recorded events, in seconds.
pub const DEFAULT_DELAY: f64 = 0.1;

/// Smallest delay the editor accepts from a user, in seconds.
pub const MIN_DELAY: f64 = 0.01;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    #[serde(rename = "key")]
    Key,
    #[serde(rename = "mouse")]
    MouseButton,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Key => f.pad("key"),
            EventKind::MouseButton => f.pad("mouse"),
        }
    }
}

/// How an event is replayed.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Instantaneous tap.
    #[default]
    Press,
    /// Press, wait for the event delay, release.
    Hold,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Press => f.pad("press"),
            Mode::Hold => f.pad("hold"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "press" | "p" => Ok(Mode::Press),
            "hold" | "h" => Ok(Mode::Hold),
            other => Err(Error::Validation(format!(
                "unknown mode '{other}' (expected press or hold)"
            ))),
        }
    }
}

/// One recorded action.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub value: String,
    /// Seconds to wait after dispatch. Always > 0.
    pub delay: f64,
    pub mode: Mode,
}

impl Event {
    pub fn new(kind: EventKind, value: impl Into<String>, delay: f64, mode: Mode) -> Result<Self> {
        validate_delay(delay)?;
        Ok(Self {
            kind,
            value: value.into(),
            delay,
            mode,
        })
    }

    /// A freshly captured event: default delay, press mode.
    pub fn recorded(kind: EventKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            delay: DEFAULT_DELAY,
            mode: Mode::Press,
        }
    }

    pub fn key(value: impl Into<String>) -> Self {
        Self::recorded(EventKind::Key, value)
    }

    pub fn mouse(value: impl Into<String>) -> Self {
        Self::recorded(EventKind::MouseButton, value)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<5} {:<15} {:>6.2} s  {}",
            self.kind, self.value, self.delay, self.mode
        )
    }
}

pub(crate) fn validate_delay(delay: f64) -> Result<()> {
    if !delay.is_finite() || delay <= 0.0 {
        return Err(Error::Validation(format!(
            "delay must be a positive number of seconds, got {delay}"
        )));
    }
    Ok(())
}

/// Ordered list of events; index order is replay order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventSequence {
    events: Vec<Event>,
}

impl EventSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Event> {
        self.check_index(index)?;
        Ok(self.events.remove(index))
    }

    pub fn swap(&mut self, i: usize, j: usize) -> Result<()> {
        self.check_index(i)?;
        self.check_index(j)?;
        if i != j {
            self.events.swap(i, j);
        }
        Ok(())
    }

    pub fn set_params(&mut self, index: usize, delay: f64, mode: Mode) -> Result<()> {
        self.check_index(index)?;
        validate_delay(delay)?;
        let event = &mut self.events[index];
        event.delay = delay;
        event.mode = mode;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.events.len() {
            return Err(Error::Index {
                index,
                len: self.events.len(),
            });
        }
        Ok(())
    }
}

impl From<Vec<Event>> for EventSequence {
    fn from(events: Vec<Event>) -> Self {
        Self { events }
    }
}

impl FromIterator<Event> for EventSequence {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EventSequence {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

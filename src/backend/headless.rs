//! Stand-ins for platforms without an input backend, and for `--dry-run`.

use tracing::info;

use crate::backend::{CaptureService, CaptureSink, Command, Hotkey, HotkeyBackend, InputInjector};
use crate::error::{Error, Result};
use crate::models::EventKind;

/// Logs every dispatch instead of synthesizing input.
#[derive(Debug, Default)]
pub struct DryRunInjector;

impl InputInjector for DryRunInjector {
    fn tap(&self, kind: EventKind, value: &str) -> Result<()> {
        info!(%kind, value, "tap");
        Ok(())
    }

    fn press(&self, kind: EventKind, value: &str) -> Result<()> {
        info!(%kind, value, "press");
        Ok(())
    }

    fn release(&self, kind: EventKind, value: &str) -> Result<()> {
        info!(%kind, value, "release");
        Ok(())
    }
}

/// Capture service that refuses to install.
#[derive(Debug, Default)]
pub struct NoCapture;

impl CaptureService for NoCapture {
    fn install(&mut self, _sink: CaptureSink) -> Result<()> {
        Err(Error::Capture(
            "input capture is not supported on this platform".into(),
        ))
    }

    fn remove(&mut self) {}
}

/// Hotkey backend that refuses every binding.
#[derive(Debug, Default)]
pub struct NoHotkeys;

impl HotkeyBackend for NoHotkeys {
    fn bind(&mut self, bindings: &[(Hotkey, Command)]) -> Result<()> {
        if bindings.is_empty() {
            return Ok(());
        }
        Err(Error::Registration(
            "global hotkeys are not supported on this platform".into(),
        ))
    }

    fn unbind_all(&mut self) {}
}

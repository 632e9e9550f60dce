//! Named configs on disk.
//!
//! Each config is `<dir>/<name>.json`: a pretty-printed JSON array of
//! `[kind, value, delay, mode]` records. Files written before events had a
//! mode hold `[kind, value, delay]` records; those are migrated to
//! `mode = "press"` on load. Any other record shape rejects the whole file.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::{self, Deserializer, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{validate_delay, Event, EventKind, EventSequence, Mode};

const EXTENSION: &str = "json";

/// A record as found on disk; the array length identifies the schema version.
#[derive(Debug, Clone, PartialEq)]
enum StoredRecord {
    Legacy {
        kind: EventKind,
        value: String,
        delay: f64,
    },
    Current {
        kind: EventKind,
        value: String,
        delay: f64,
        mode: Mode,
    },
}

impl StoredRecord {
    /// Upgrades the record to the current event model.
    fn migrate(self) -> Result<Event> {
        let (kind, value, delay, mode) = match self {
            StoredRecord::Legacy { kind, value, delay } => (kind, value, delay, Mode::Press),
            StoredRecord::Current {
                kind,
                value,
                delay,
                mode,
            } => (kind, value, delay, mode),
        };
        validate_delay(delay).map_err(|err| Error::Format(err.to_string()))?;
        Ok(Event {
            kind,
            value,
            delay,
            mode,
        })
    }
}

impl<'de> Deserialize<'de> for StoredRecord {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = StoredRecord;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an array of 3 or 4 elements [kind, value, delay, mode]")
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<StoredRecord, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let kind = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let value = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let delay = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(2, &self))?;

                let Some(mode) = seq.next_element()? else {
                    return Ok(StoredRecord::Legacy { kind, value, delay });
                };

                let mut extra = 0;
                while seq.next_element::<IgnoredAny>()?.is_some() {
                    extra += 1;
                }
                if extra > 0 {
                    return Err(de::Error::invalid_length(4 + extra, &self));
                }

                Ok(StoredRecord::Current {
                    kind,
                    value,
                    delay,
                    mode,
                })
            }
        }

        deserializer.deserialize_seq(RecordVisitor)
    }
}

// Always written in the current 4-element shape.
#[derive(Serialize)]
struct RecordRef<'a>(EventKind, &'a str, f64, Mode);

/// Serializes a sequence to the pretty-printed on-disk format.
pub fn encode(sequence: &EventSequence) -> Result<String> {
    let records: Vec<RecordRef<'_>> = sequence
        .iter()
        .map(|e| RecordRef(e.kind, &e.value, e.delay, e.mode))
        .collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

/// Parses the on-disk format. Either every record loads or none does.
pub fn decode(text: &str) -> Result<EventSequence> {
    let records: Vec<StoredRecord> = serde_json::from_str(text)?;
    records.into_iter().map(StoredRecord::migrate).collect()
}

/// Directory of named configs.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every stored config name, sorted. A missing directory holds no configs.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut names = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_ok_and(|path| path.is_file())
    }

    pub fn load(&self, name: &str) -> Result<EventSequence> {
        let path = self.path_for(name)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(name.to_string()))
            }
            Err(err) => return Err(err.into()),
        };

        let sequence = decode(&text).map_err(|err| match err {
            Error::Format(msg) => Error::Format(format!("{}: {msg}", path.display())),
            other => other,
        })?;
        info!(config = name, events = sequence.len(), "config loaded");
        Ok(sequence)
    }

    /// Writes the config through a temp file and a rename, so a failed write
    /// never clobbers the previous version.
    pub fn save(&self, name: &str, sequence: &EventSequence) -> Result<()> {
        let path = self.path_for(name)?;
        let content = encode(sequence)?;

        fs::create_dir_all(&self.dir)?;

        let temp_path = path.with_extension("json.tmp");
        let written = fs::write(&temp_path, content).and_then(|()| fs::rename(&temp_path, &path));

        if let Err(err) = written {
            if temp_path.is_file() {
                if let Err(cleanup) = fs::remove_file(&temp_path) {
                    debug!(path = %temp_path.display(), error = %cleanup, "temp file cleanup failed");
                }
            }
            warn!(path = %path.display(), error = %err, "config save failed");
            return Err(err.into());
        }

        info!(config = name, events = sequence.len(), "config saved");
        Ok(())
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(config = name, "config deleted");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Err(Error::NotFound(name.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{name}.{EXTENSION}")))
    }
}

/// Config names become file names: no separators, no dot-only names.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation("config name cannot be empty".into()));
    }
    if name != name.trim() {
        return Err(Error::Validation(format!(
            "config name '{name}' has leading or trailing whitespace"
        )));
    }
    if name == "." || name == ".." || name.chars().any(|c| matches!(c, '/' | '\\') || c.is_control()) {
        return Err(Error::Validation(format!(
            "config name '{name}' is not a valid file name"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> EventSequence {
        EventSequence::from(vec![
            Event::new(EventKind::Key, "a", 0.1, Mode::Press).unwrap(),
            Event::new(EventKind::MouseButton, "left", 0.2, Mode::Hold).unwrap(),
            Event::new(EventKind::Key, "f7", 1.5, Mode::Press).unwrap(),
        ])
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path());

        store.save("farm", &sample()).unwrap();
        assert_eq!(store.load("farm").unwrap(), sample());
    }

    #[test]
    fn test_saved_file_uses_four_element_records() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path());
        store.save("farm", &sample()).unwrap();

        let text = fs::read_to_string(temp_dir.path().join("farm.json")).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(raw[1], serde_json::json!(["mouse", "left", 0.2, "hold"]));
        // pretty printed
        assert!(text.contains('\n'));
        assert!(!temp_dir.path().join("farm.json.tmp").exists());
    }

    #[test]
    fn test_legacy_records_default_to_press() {
        let seq = decode(r#"[["key","a",0.1],["mouse","right",0.5]]"#).unwrap();
        assert_eq!(seq.len(), 2);
        assert!(seq.iter().all(|e| e.mode == Mode::Press));
        assert_eq!(seq.get(1).unwrap().kind, EventKind::MouseButton);
    }

    #[test]
    fn test_mixed_record_versions() {
        let seq = decode(r#"[["key","a",0.1],["key","b",0.3,"hold"]]"#).unwrap();
        assert_eq!(seq.get(0).unwrap().mode, Mode::Press);
        assert_eq!(seq.get(1).unwrap().mode, Mode::Hold);
    }

    #[test]
    fn test_wrong_arity_is_format_error() {
        for text in [
            r#"[["key","a",0.1],["key","b"]]"#,
            r#"[["key","a",0.1,"press","extra"]]"#,
            r#"[[]]"#,
        ] {
            assert!(matches!(decode(text), Err(Error::Format(_))), "{text}");
        }
    }

    #[test]
    fn test_unknown_kind_or_mode_is_format_error() {
        assert!(matches!(decode(r#"[["pad","a",0.1]]"#), Err(Error::Format(_))));
        assert!(matches!(decode(r#"[["key","a",0.1,"tap"]]"#), Err(Error::Format(_))));
        assert!(matches!(decode(r#"{"key":"a"}"#), Err(Error::Format(_))));
    }

    #[test]
    fn test_non_positive_delay_is_format_error() {
        assert!(matches!(decode(r#"[["key","a",0]]"#), Err(Error::Format(_))));
        assert!(matches!(decode(r#"[["key","a",-0.5,"hold"]]"#), Err(Error::Format(_))));
    }

    #[test]
    fn test_compact_json_is_accepted() {
        let seq = decode(r#"[["key","space",2,"press"]]"#).unwrap();
        assert_eq!(seq.get(0).unwrap().delay, 2.0);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path());
        assert!(matches!(store.load("nope"), Err(Error::NotFound(name)) if name == "nope"));
    }

    #[test]
    fn test_list_only_json_configs() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path());
        store.save("b", &sample()).unwrap();
        store.save("a", &sample()).unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "x").unwrap();
        fs::write(temp_dir.path().join("c.json.tmp"), "x").unwrap();

        assert_eq!(store.list().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_list_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path().join("configs"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_failed_save_keeps_previous_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path());
        store.save("x", &sample()).unwrap();

        // a directory in the temp file's place makes the write fail
        fs::create_dir(temp_dir.path().join("x.json.tmp")).unwrap();
        let err = store.save("x", &EventSequence::new()).unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert_eq!(store.load("x").unwrap(), sample());
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path());
        let target = temp_dir.path().join("y.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "").unwrap();

        assert!(matches!(store.save("y", &sample()), Err(Error::Io(_))));
        assert!(!temp_dir.path().join("y.json.tmp").exists());
        assert!(target.join("keep").exists());
    }

    #[test]
    fn test_save_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path());
        store.save("x", &sample()).unwrap();
        store.save("x", &EventSequence::new()).unwrap();
        assert!(store.load("x").unwrap().is_empty());
    }

    #[test]
    fn test_delete_missing_keeps_listing() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path());
        store.save("keep", &sample()).unwrap();

        assert!(matches!(store.delete("gone"), Err(Error::NotFound(_))));
        assert_eq!(store.list().unwrap(), vec!["keep"]);

        store.delete("keep").unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_names_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path());
        for name in ["", "  ", "..", "a/b", "a\\b", " padded"] {
            assert!(
                matches!(store.save(name, &sample()), Err(Error::Validation(_))),
                "{name:?}"
            );
        }
    }
}

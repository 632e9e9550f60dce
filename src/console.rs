//! Line commands for the interactive control loop.

use std::fmt::Write as _;

use crate::app::KeyLoopApp;
use crate::error::{Error, Result};
use crate::models::{Mode, MIN_DELAY};

pub const HELP: &str = "\
commands:
  record                  toggle recording of keys and clicks
  start | stop            start or stop looping playback
  show                    list the recorded events
  remove <i>              delete event i
  swap <i> <j>            exchange events i and j
  move <from> <to>        drag event from one position to another
  edit <i> <delay> [mode] set delay (seconds) and mode (press|hold)
  clear                   delete every event
  new                     start an unsaved, empty list
  list                    list saved configs
  load <name>             load a saved config
  save [name]             save (under the loaded name if none given)
  delete <name>           delete a saved config
  hotkeys [start stop]    show or change the playback hotkeys
  status                  show recording/playback state
  help                    this text
  quit                    exit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Record,
    Start,
    Stop,
    Show,
    Remove(usize),
    Swap(usize, usize),
    Move { from: usize, to: usize },
    Edit { index: usize, delay: f64, mode: Option<Mode> },
    Clear,
    New,
    List,
    Load(String),
    Save(Option<String>),
    Delete(String),
    Hotkeys(Option<(String, String)>),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Message(String),
    Quit,
}

/// Parses one input line. Blank lines parse to `None`.
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>> {
    let line = line.trim();
    let Some((word, rest)) = split_word(line) else {
        return Ok(None);
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match word.to_ascii_lowercase().as_str() {
        "record" | "rec" => ConsoleCommand::Record,
        "start" | "play" => ConsoleCommand::Start,
        "stop" => ConsoleCommand::Stop,
        "show" | "ls" => ConsoleCommand::Show,
        "remove" | "rm" => {
            expect_args(word, &args, 1)?;
            ConsoleCommand::Remove(index(args[0])?)
        }
        "swap" => {
            expect_args(word, &args, 2)?;
            ConsoleCommand::Swap(index(args[0])?, index(args[1])?)
        }
        "move" | "mv" => {
            expect_args(word, &args, 2)?;
            ConsoleCommand::Move {
                from: index(args[0])?,
                to: index(args[1])?,
            }
        }
        "edit" => {
            if args.len() != 2 && args.len() != 3 {
                return Err(usage("edit <i> <delay> [press|hold]"));
            }
            let delay: f64 = args[1]
                .parse()
                .map_err(|_| Error::Validation(format!("'{}' is not a number of seconds", args[1])))?;
            let mode = args.get(2).map(|m| m.parse()).transpose()?;
            ConsoleCommand::Edit {
                index: index(args[0])?,
                delay,
                mode,
            }
        }
        "clear" => ConsoleCommand::Clear,
        "new" => ConsoleCommand::New,
        "list" | "configs" => ConsoleCommand::List,
        "load" => ConsoleCommand::Load(name(word, rest)?),
        "save" => ConsoleCommand::Save((!rest.is_empty()).then(|| rest.to_string())),
        "delete" => ConsoleCommand::Delete(name(word, rest)?),
        "hotkeys" => match args.as_slice() {
            [] => ConsoleCommand::Hotkeys(None),
            [start, stop] => ConsoleCommand::Hotkeys(Some((start.to_string(), stop.to_string()))),
            _ => return Err(usage("hotkeys [<start> <stop>]")),
        },
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => {
            return Err(Error::Validation(format!(
                "unknown command '{other}' (try 'help')"
            )))
        }
    };
    Ok(Some(command))
}

/// Runs a parsed command against the app.
pub fn execute(app: &mut KeyLoopApp, command: ConsoleCommand) -> Result<Outcome> {
    let message = match command {
        ConsoleCommand::Record => {
            if app.toggle_record()? {
                "⏺ Recording...".to_string()
            } else {
                format!("🛑 Recording stopped ({} events)", app.len())
            }
        }
        ConsoleCommand::Start => {
            if app.start_playback()? {
                "▶ Playing".to_string()
            } else {
                "▶ Already playing".to_string()
            }
        }
        ConsoleCommand::Stop => {
            if app.stop_playback() {
                "🛑 Playback stopped".to_string()
            } else {
                "Playback is not running".to_string()
            }
        }
        ConsoleCommand::Show => render_events(app),
        ConsoleCommand::Remove(i) => {
            let event = app.remove_at(i)?;
            format!("Removed {} {}", event.kind, event.value)
        }
        ConsoleCommand::Swap(i, j) => {
            app.swap(i, j)?;
            format!("Swapped {i} and {j}")
        }
        ConsoleCommand::Move { from, to } => {
            let len = app.len();
            if to >= len {
                return Err(Error::Index { index: to, len });
            }
            let mut anchor = app.begin_drag(from)?;
            while anchor != to {
                let next = if to > anchor { anchor + 1 } else { anchor - 1 };
                anchor = app.drag_to(anchor, next)?;
            }
            format!("Moved {from} to {to}")
        }
        ConsoleCommand::Edit { index, delay, mode } => {
            if delay > 0.0 && delay < MIN_DELAY {
                return Err(Error::Validation(format!(
                    "delay must be at least {MIN_DELAY} s"
                )));
            }
            let mode = match mode {
                Some(mode) => mode,
                None => app
                    .snapshot()
                    .get(index)
                    .map(|e| e.mode)
                    .ok_or(Error::Index {
                        index,
                        len: app.len(),
                    })?,
            };
            app.set_params(index, delay, mode)?;
            format!("Event {index}: {delay:.2} s, {mode}")
        }
        ConsoleCommand::Clear => {
            app.clear();
            "Cleared".to_string()
        }
        ConsoleCommand::New => {
            app.new_sequence();
            "New empty list".to_string()
        }
        ConsoleCommand::List => {
            let names = app.list_configs()?;
            if names.is_empty() {
                "No saved configs".to_string()
            } else {
                names.join("\n")
            }
        }
        ConsoleCommand::Load(name) => {
            let len = app.load_config(&name)?;
            format!("📂 Loaded {name} ({len} events)")
        }
        ConsoleCommand::Save(Some(name)) => {
            app.save_config(&name)?;
            format!("💾 Saved {name}")
        }
        ConsoleCommand::Save(None) => {
            let name = app.save_current()?;
            format!("💾 Saved {name}")
        }
        ConsoleCommand::Delete(name) => {
            app.delete_config(&name)?;
            format!("Deleted {name}")
        }
        ConsoleCommand::Hotkeys(Some((start, stop))) => {
            app.rebind_hotkeys(&start, &stop)?;
            let (start, stop) = app.hotkeys();
            format!("Hotkeys: start {start}, stop {stop}")
        }
        ConsoleCommand::Hotkeys(None) => {
            let (start, stop) = app.hotkeys();
            format!("Hotkeys: start {start}, stop {stop}")
        }
        ConsoleCommand::Status => render_status(app),
        ConsoleCommand::Help => HELP.to_string(),
        ConsoleCommand::Quit => return Ok(Outcome::Quit),
    };
    Ok(Outcome::Message(message))
}

pub fn render_events(app: &KeyLoopApp) -> String {
    let snapshot = app.snapshot();
    if snapshot.is_empty() {
        return "No events".to_string();
    }
    let mut out = String::new();
    for (i, event) in snapshot.iter().enumerate() {
        let _ = writeln!(out, "{i:>3}: {event}");
    }
    out.truncate(out.trim_end().len());
    out
}

fn render_status(app: &KeyLoopApp) -> String {
    let (start, stop) = app.hotkeys();
    format!(
        "config: {}\nevents: {}\nrecording: {}\nplayback: {:?}\nhotkeys: start {start}, stop {stop}",
        app.current_config().unwrap_or("(unsaved)"),
        app.len(),
        if app.is_recording() { "on" } else { "off" },
        app.playback_state(),
    )
}

fn split_word(line: &str) -> Option<(&str, &str)> {
    if line.is_empty() {
        return None;
    }
    Some(match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    })
}

fn index(arg: &str) -> Result<usize> {
    arg.parse()
        .map_err(|_| Error::Validation(format!("'{arg}' is not an event index")))
}

fn name(word: &str, rest: &str) -> Result<String> {
    if rest.is_empty() {
        return Err(usage(&format!("{word} <name>")));
    }
    Ok(rest.to_string())
}

fn expect_args(word: &str, args: &[&str], count: usize) -> Result<()> {
    if args.len() != count {
        let placeholders = match count {
            1 => "<i>",
            _ => "<i> <j>",
        };
        return Err(usage(&format!("{word} {placeholders}")));
    }
    Ok(())
}

fn usage(text: &str) -> Error {
    Error::Validation(format!("usage: {text}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_line() {
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_editing_commands() {
        assert_eq!(parse("remove 2").unwrap(), Some(ConsoleCommand::Remove(2)));
        assert_eq!(parse("swap 0 3").unwrap(), Some(ConsoleCommand::Swap(0, 3)));
        assert_eq!(
            parse("move 4 1").unwrap(),
            Some(ConsoleCommand::Move { from: 4, to: 1 })
        );
        assert_eq!(
            parse("edit 1 0.5 hold").unwrap(),
            Some(ConsoleCommand::Edit {
                index: 1,
                delay: 0.5,
                mode: Some(Mode::Hold)
            })
        );
        assert_eq!(
            parse("EDIT 1 2").unwrap(),
            Some(ConsoleCommand::Edit {
                index: 1,
                delay: 2.0,
                mode: None
            })
        );
    }

    #[test]
    fn test_parse_config_commands_keep_spaces_in_names() {
        assert_eq!(
            parse("load  fishing spot ").unwrap(),
            Some(ConsoleCommand::Load("fishing spot".into()))
        );
        assert_eq!(parse("save").unwrap(), Some(ConsoleCommand::Save(None)));
        assert_eq!(
            parse("save farm").unwrap(),
            Some(ConsoleCommand::Save(Some("farm".into())))
        );
    }

    #[test]
    fn test_parse_hotkeys() {
        assert_eq!(parse("hotkeys").unwrap(), Some(ConsoleCommand::Hotkeys(None)));
        assert_eq!(
            parse("hotkeys ctrl+f7 f8").unwrap(),
            Some(ConsoleCommand::Hotkeys(Some(("ctrl+f7".into(), "f8".into()))))
        );
        assert!(parse("hotkeys f7").is_err());
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["remove", "remove x", "swap 1", "edit 1", "edit 1 soon", "edit 1 1 tap", "load", "fly"] {
            assert!(matches!(parse(bad), Err(Error::Validation(_))), "{bad}");
        }
    }
}

//! Control commands accepted from the host process
//!
//! One command per line, e.g. `stop moves`, `screen_size [0,0,1920,1080]`,
//! `clear keys 2024-01-01 2024-01-31`, `session start Morning work`.

use crate::capture::flags::CaptureTarget;
use crate::capture::types::{Category, InputKind};
use crate::display::geometry::ScreenRect;
use crate::storage::DayRange;
use chrono::NaiveDate;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Missing {arg} for {command}")]
    MissingArgument {
        command: &'static str,
        arg: &'static str,
    },

    #[error("Unknown capture target: {0}")]
    InvalidTarget(String),

    #[error("Invalid screen size: {0}")]
    InvalidScreenSize(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),
}

pub type CommandResult<T> = Result<T, CommandError>;

/// What `clear` deletes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearTarget {
    All,
    Input(InputKind),
    Category(Category),
}

impl ClearTarget {
    pub fn categories(&self) -> Vec<Category> {
        match self {
            ClearTarget::All => Category::ALL.to_vec(),
            ClearTarget::Input(input) => input.categories().to_vec(),
            ClearTarget::Category(category) => vec![*category],
        }
    }
}

impl FromStr for ClearTarget {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(ClearTarget::All);
        }
        match s.parse::<CaptureTarget>() {
            Ok(CaptureTarget::Input(input)) => Ok(ClearTarget::Input(input)),
            Ok(CaptureTarget::Category(category)) => Ok(ClearTarget::Category(category)),
            Err(_) => Err(CommandError::InvalidTarget(s.to_string())),
        }
    }
}

/// Named session actions, `session ACTION ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Close the running session, if any, and open a new one
    Start(String),
    Stop,
    Rename { name: String, id: i64 },
    /// Delete the session's events of a category, input or `all`
    Clear { target: ClearTarget, id: i64 },
    /// Forget the session, its events stay
    Delete(i64),
}

impl FromStr for SessionCommand {
    type Err = CommandError;

    fn from_str(rest: &str) -> Result<Self, Self::Err> {
        let missing = |arg| CommandError::MissingArgument {
            command: "session",
            arg,
        };
        let args: Vec<&str> = rest.split_whitespace().collect();
        match args.split_first() {
            Some((&"start", name)) if !name.is_empty() => {
                Ok(SessionCommand::Start(name.join(" ")))
            }
            Some((&"start", _)) => Err(missing("name")),
            Some((&"stop", _)) => Ok(SessionCommand::Stop),
            Some((&"rename", [name @ .., id])) if !name.is_empty() => Ok(SessionCommand::Rename {
                name: name.join(" "),
                id: parse_session_id(id)?,
            }),
            Some((&"rename", _)) => Err(missing("name and id")),
            Some((&"clear", [target, id])) => Ok(SessionCommand::Clear {
                target: target.parse()?,
                id: parse_session_id(id)?,
            }),
            Some((&"clear", _)) => Err(missing("category and id")),
            Some((&"delete", [id, ..])) => Ok(SessionCommand::Delete(parse_session_id(id)?)),
            Some((&"delete", _)) => Err(missing("id")),
            Some((action, _)) => Err(CommandError::Unknown(format!("session {}", action))),
            None => Err(missing("action")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start(CaptureTarget),
    Stop(CaptureTarget),
    /// Accepted without effect, e.g. starting a category that does not exist
    Ignore(String),
    ScreenSize(Vec<ScreenRect>),
    Clear {
        target: ClearTarget,
        range: Option<DayRange>,
    },
    Configure {
        name: String,
        value: String,
    },
    Session(SessionCommand),
    Vacuum,
    Exit,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        match name {
            "" => Err(CommandError::Empty),
            "start" | "stop" => {
                let arg = first_arg(rest, "start/stop", "target")?;
                let Ok(target) = arg.parse::<CaptureTarget>() else {
                    return Ok(Command::Ignore(format!("unknown capture target {:?}", arg)));
                };
                Ok(if name == "start" {
                    Command::Start(target)
                } else {
                    Command::Stop(target)
                })
            }
            "screen_size" => parse_screen_sizes(rest).map(Command::ScreenSize),
            "clear" => {
                let mut args = rest.split_whitespace();
                let target = args
                    .next()
                    .ok_or(CommandError::MissingArgument {
                        command: "clear",
                        arg: "category",
                    })?
                    .parse::<ClearTarget>()?;
                let range = match (args.next(), args.next()) {
                    (None, _) => None,
                    (Some(_), None) => {
                        return Err(CommandError::MissingArgument {
                            command: "clear",
                            arg: "end date",
                        })
                    }
                    (Some(a), Some(b)) => Some(DayRange::new(parse_day(a)?, parse_day(b)?)),
                };
                Ok(Command::Clear { target, range })
            }
            "configure" => {
                let (option, value) = rest.split_once(char::is_whitespace).ok_or(
                    CommandError::MissingArgument {
                        command: "configure",
                        arg: "value",
                    },
                )?;
                Ok(Command::Configure {
                    name: option.to_string(),
                    value: value.trim().to_string(),
                })
            }
            "session" => rest.parse().map(Command::Session),
            "vacuum" => Ok(Command::Vacuum),
            "exit" => Ok(Command::Exit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn first_arg<'a>(rest: &'a str, command: &'static str, arg: &'static str) -> CommandResult<&'a str> {
    rest.split_whitespace()
        .next()
        .ok_or(CommandError::MissingArgument { command, arg })
}

fn parse_session_id(s: &str) -> CommandResult<i64> {
    s.parse()
        .map_err(|_| CommandError::InvalidSessionId(s.to_string()))
}

fn parse_day(s: &str) -> CommandResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| CommandError::InvalidDate(s.to_string()))
}

/// Accepts `[x, y, w, h] [x, y, w, h]` as well as a JSON list of lists
fn parse_screen_sizes(s: &str) -> CommandResult<Vec<ScreenRect>> {
    let mut sizes = Vec::new();
    for chunk in s.replace('[', " ").split(']') {
        let numbers: Vec<&str> = chunk
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .collect();
        if numbers.is_empty() {
            continue;
        }
        let values = numbers
            .iter()
            .map(|n| parse_coordinate(n))
            .collect::<CommandResult<Vec<i64>>>()?;
        let rect: [i64; 4] = values
            .try_into()
            .map_err(|_| CommandError::InvalidScreenSize(chunk.trim().to_string()))?;
        if rect[2] <= 0 || rect[3] <= 0 {
            return Err(CommandError::InvalidScreenSize(chunk.trim().to_string()));
        }
        sizes.push(ScreenRect::from(rect));
    }
    if sizes.is_empty() {
        return Err(CommandError::MissingArgument {
            command: "screen_size",
            arg: "sizes",
        });
    }
    Ok(sizes)
}

fn parse_coordinate(n: &str) -> CommandResult<i64> {
    if let Ok(v) = n.parse::<i64>() {
        return Ok(v);
    }
    match n.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v.round() as i64),
        _ => Err(CommandError::InvalidScreenSize(n.to_string())),
    }
}

//! Line commands typed into the shell's stdin, mapped onto core events.

use shared::ui_state::parse_entity_id;
use shared::{CardNumber, Event, Role, TaxiId};
use thiserror::Error;

pub const HELP: &str = "commands: refresh | role <admin|client|driver> | select <id> | deselect \
| me-client <id> | me-taxi <id> | create | delete <id> | sim <on|off> | interval <secs> \
| trip | name <text> | card <digits> | register | quit";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command {0:?}")]
    Unknown(String),

    #[error("{command} needs {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[error("{command}: invalid argument {value:?}")]
    InvalidArgument {
        command: &'static str,
        value: String,
    },
}

/// Parses one input line. Blank lines and `help` yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Event>, CommandError> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    let event = match command.to_ascii_lowercase().as_str() {
        "" | "help" | "?" => return Ok(None),
        "refresh" => Event::RefreshRequested,
        "role" => Event::RoleSelected {
            role: parse_role(require("role", "admin, client or driver", rest)?)?,
        },
        "select" => Event::TaxiSelected {
            taxi_id: parse_taxi_id("select", rest)?,
        },
        "deselect" => Event::TaxiDeselected,
        "me-client" => Event::MyClientIdEdited {
            text: rest.to_string(),
        },
        "me-taxi" => Event::MyTaxiIdEdited {
            text: rest.to_string(),
        },
        "create" => Event::CreateTaxiRequested,
        "delete" => Event::DeleteTaxiRequested {
            taxi_id: parse_taxi_id("delete", rest)?,
        },
        "sim" => {
            let active = match require("sim", "on or off", rest)?
                .to_ascii_lowercase()
                .as_str()
            {
                "on" | "true" | "start" => true,
                "off" | "false" | "stop" => false,
                _ => {
                    return Err(CommandError::InvalidArgument {
                        command: "sim",
                        value: rest.to_string(),
                    })
                }
            };
            Event::ConfigureSimulationRequested {
                active: Some(active),
                interval_secs: None,
            }
        }
        "interval" => {
            let raw = require("interval", "a number of seconds", rest)?;
            let secs: f64 = raw.parse().map_err(|_| CommandError::InvalidArgument {
                command: "interval",
                value: raw.to_string(),
            })?;
            // range checks happen in the core so the user sees its message
            Event::ConfigureSimulationRequested {
                active: None,
                interval_secs: Some(secs),
            }
        }
        "trip" => Event::TripRequested,
        "name" => Event::ClientNameEdited {
            text: rest.to_string(),
        },
        "card" => Event::CardNumberEdited {
            card: CardNumber::new(rest),
        },
        "register" => Event::RegisterClientRequested,
        "quit" | "exit" => Event::Unmounted,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(event))
}

fn require<'a>(
    command: &'static str,
    expected: &'static str,
    rest: &'a str,
) -> Result<&'a str, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument { command, expected })
    } else {
        Ok(rest)
    }
}

fn parse_role(raw: &str) -> Result<Role, CommandError> {
    Role::ALL
        .into_iter()
        .find(|role| role.as_str().eq_ignore_ascii_case(raw))
        .ok_or_else(|| CommandError::InvalidArgument {
            command: "role",
            value: raw.to_string(),
        })
}

fn parse_taxi_id(command: &'static str, rest: &str) -> Result<TaxiId, CommandError> {
    let raw = require(command, "a taxi id", rest)?;
    parse_entity_id(raw)
        .map(TaxiId)
        .ok_or_else(|| CommandError::InvalidArgument {
            command,
            value: raw.to_string(),
        })
}

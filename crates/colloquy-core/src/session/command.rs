//! Operator commands typed into a terminal session.
//!
//! ```text
//! @Alice how are you?      direct message to one persona
//! @Alice,Boris hello       direct message to several
//! @all what now?           direct message to everyone
//! a storm is coming        anything else is a world event
//! /add elf Lirael [stoic]  add a persona
//! /remove Lirael           remove a persona
//! /rename Lirael Lira      rename a persona
//! /speed 2.5               seconds between ticks
//! /pause  /resume  /agents  /stats  /help  /quit
//! ```

use std::str::FromStr;

use colloquy_types::persona::{Archetype, Species};

use crate::scheduler::MessageTarget;

const DEFAULT_ARCHETYPE: Archetype = Archetype::Individual;

/// One parsed line of operator input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Message { target: MessageTarget, text: String },
    Event(String),
    Add {
        species: Species,
        name: String,
        archetype: Archetype,
    },
    Remove(String),
    Rename { from: String, to: String },
    Speed(f64),
    Pause,
    Resume,
    Agents,
    Stats,
    Help,
    Quit,
}

/// Why a line could not be parsed. The message is shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CommandError(String);

fn usage(text: &str) -> CommandError {
    CommandError(format!("usage: {text}"))
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError("empty input".into()));
        }

        if let Some(rest) = line.strip_prefix('@') {
            return parse_message(rest);
        }

        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Command::Event(line.to_string()));
        };

        let mut words = rest.split_whitespace();
        let verb = words.next().unwrap_or_default().to_lowercase();
        let args: Vec<&str> = words.collect();

        match (verb.as_str(), args.as_slice()) {
            ("add", [species, name, rest @ ..]) if rest.len() <= 1 => {
                let species = species.parse::<Species>().map_err(CommandError)?;
                let archetype = match rest.first() {
                    Some(a) => a.parse::<Archetype>().map_err(CommandError)?,
                    None => DEFAULT_ARCHETYPE,
                };
                Ok(Command::Add {
                    species,
                    name: (*name).to_string(),
                    archetype,
                })
            }
            ("add", _) => Err(usage("/add <species> <name> [archetype]")),

            ("remove" | "kick", [name]) => Ok(Command::Remove((*name).to_string())),
            ("remove" | "kick", _) => Err(usage("/remove <name>")),

            ("rename", [from, to]) => Ok(Command::Rename {
                from: (*from).to_string(),
                to: (*to).to_string(),
            }),
            ("rename", _) => Err(usage("/rename <name> <new name>")),

            ("speed", [value]) => value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(Command::Speed)
                .ok_or_else(|| usage("/speed <seconds, 0 or more>")),
            ("speed", _) => Err(usage("/speed <seconds>")),

            ("pause", []) => Ok(Command::Pause),
            ("resume", []) => Ok(Command::Resume),
            ("agents" | "personas", []) => Ok(Command::Agents),
            ("stats", []) => Ok(Command::Stats),
            ("help" | "?", []) => Ok(Command::Help),
            ("quit" | "exit" | "q", []) => Ok(Command::Quit),

            (other, _) => Err(CommandError(format!("unknown command '/{other}', try /help"))),
        }
    }
}

fn parse_message(rest: &str) -> Result<Command, CommandError> {
    let (names, text) = rest
        .split_once(char::is_whitespace)
        .map(|(n, t)| (n, t.trim()))
        .unwrap_or((rest, ""));
    if names.is_empty() || text.is_empty() {
        return Err(usage("@<name>[,<name>..] <message>  or  @all <message>"));
    }

    let target = if names.eq_ignore_ascii_case("all") {
        MessageTarget::Everyone
    } else {
        MessageTarget::Named(
            names
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect(),
        )
    };
    Ok(Command::Message {
        target,
        text: text.to_string(),
    })
}

pub const HELP: &str = "\
  @Name message        talk to one persona (@A,B for several)
  @all message         talk to everyone
  <text>               inject a world event
  /add <species> <name> [archetype]
  /remove <name>
  /rename <name> <new name>
  /speed <seconds>     0 pauses
  /pause  /resume  /agents  /stats  /help  /quit";

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, CommandError> {
        line.parse()
    }

    #[test]
    fn direct_message_to_one_persona() {
        assert_eq!(
            parse("@Alice how are you?").unwrap(),
            Command::Message {
                target: MessageTarget::Named(vec!["Alice".into()]),
                text: "how are you?".into(),
            }
        );
    }

    #[test]
    fn direct_message_to_several_and_everyone() {
        assert_eq!(
            parse("@Alice,Boris  hello").unwrap(),
            Command::Message {
                target: MessageTarget::Named(vec!["Alice".into(), "Boris".into()]),
                text: "hello".into(),
            }
        );
        assert!(matches!(
            parse("@ALL what now").unwrap(),
            Command::Message { target: MessageTarget::Everyone, .. }
        ));
    }

    #[test]
    fn message_without_text_is_an_error() {
        assert!(parse("@Alice").is_err());
        assert!(parse("@ hi").is_err());
    }

    #[test]
    fn plain_text_is_an_event() {
        assert_eq!(
            parse("  a storm is coming ").unwrap(),
            Command::Event("a storm is coming".into())
        );
    }

    #[test]
    fn add_with_and_without_archetype() {
        assert_eq!(
            parse("/add elf Lirael stoic").unwrap(),
            Command::Add {
                species: Species::Elf,
                name: "Lirael".into(),
                archetype: Archetype::Stoic,
            }
        );
        assert_eq!(
            parse("/add Orc Grom").unwrap(),
            Command::Add {
                species: Species::Orc,
                name: "Grom".into(),
                archetype: Archetype::Individual,
            }
        );
        assert_eq!(
            parse("/add dragon Smaug").unwrap_err().to_string(),
            "invalid species: 'dragon'"
        );
        assert!(parse("/add elf").is_err());
    }

    #[test]
    fn speed_must_be_non_negative() {
        assert_eq!(parse("/speed 2.5").unwrap(), Command::Speed(2.5));
        assert_eq!(parse("/speed 0").unwrap(), Command::Speed(0.0));
        assert!(parse("/speed -1").is_err());
        assert!(parse("/speed fast").is_err());
    }

    #[test]
    fn simple_verbs() {
        assert_eq!(parse("/remove Boris").unwrap(), Command::Remove("Boris".into()));
        assert_eq!(
            parse("/rename Boris Bob").unwrap(),
            Command::Rename {
                from: "Boris".into(),
                to: "Bob".into()
            }
        );
        assert_eq!(parse("/pause").unwrap(), Command::Pause);
        assert_eq!(parse("/agents").unwrap(), Command::Agents);
        assert_eq!(parse("/QUIT").unwrap(), Command::Quit);
        assert!(parse("/dance").unwrap_err().to_string().contains("unknown command"));
    }
}

//! Parsing of the host's line-oriented commands.

use serde_json::Value as JsonValue;
use std::fmt;
use warden_identity::{Parameters, ResourceType};

/// A command read from stdin.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Auth {
        resource_id: String,
        parameters: Parameters,
    },
    Revoke {
        session_id: String,
        parameters: Parameters,
    },
    Callback {
        provider_id: String,
        parameters: Parameters,
    },
    Authorize {
        resource_id: String,
        roles: Vec<String>,
    },
    Resource {
        resource_type: ResourceType,
        resource_id: String,
        permissions: Vec<String>,
    },
    Reload,
    Profiles,
    Providers,
    Help,
    Quit,
}

/// Errors parsing a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The command name is not recognized.
    Unknown { name: String },
    /// A required argument is absent.
    MissingArgument { command: &'static str, argument: &'static str },
    /// A `key=value` parameter is malformed.
    InvalidParameter { parameter: String },
    /// The resource type is not one of `app`, `api` or `system`.
    InvalidResourceType { value: String },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown { name } => write!(f, "unknown command '{}' (try 'help')", name),
            Self::MissingArgument { command, argument } => {
                write!(f, "'{}' requires <{}>", command, argument)
            }
            Self::InvalidParameter { parameter } => {
                write!(f, "expected key=value, got '{}'", parameter)
            }
            Self::InvalidResourceType { value } => {
                write!(f, "unknown resource type '{}'", value)
            }
        }
    }
}

impl std::error::Error for CommandError {}

pub const HELP: &str = "\
commands:
  auth <resource> [key=value ...]
  revoke <session> [key=value ...]
  callback <provider> [key=value ...]
  authorize <resource> [role ...]
  resource <app|api|system> <id> [permission ...]
  reload
  profiles
  providers
  quit";

/// Parses one input line. Returns `None` for blank lines.
pub fn parse(line: &str) -> Option<Result<Command, CommandError>> {
    let mut words = line.split_whitespace();
    let name = words.next()?;
    Some(parse_words(name, words))
}

fn parse_words<'a>(
    name: &str,
    mut words: impl Iterator<Item = &'a str>,
) -> Result<Command, CommandError> {
    let command = match name {
        "auth" => Command::Auth {
            resource_id: required(&mut words, "auth", "resource")?,
            parameters: parameters(words)?,
        },
        "revoke" => Command::Revoke {
            session_id: required(&mut words, "revoke", "session")?,
            parameters: parameters(words)?,
        },
        "callback" => Command::Callback {
            provider_id: required(&mut words, "callback", "provider")?,
            parameters: parameters(words)?,
        },
        "authorize" => Command::Authorize {
            resource_id: required(&mut words, "authorize", "resource")?,
            roles: words.map(str::to_string).collect(),
        },
        "resource" => {
            let resource_type = required(&mut words, "resource", "type")?;
            Command::Resource {
                resource_type: resource_type_from(&resource_type)?,
                resource_id: required(&mut words, "resource", "id")?,
                permissions: words.map(str::to_string).collect(),
            }
        }
        "reload" => Command::Reload,
        "profiles" => Command::Profiles,
        "providers" => Command::Providers,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => {
            return Err(CommandError::Unknown {
                name: other.to_string(),
            });
        }
    };
    Ok(command)
}

fn required<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    command: &'static str,
    argument: &'static str,
) -> Result<String, CommandError> {
    words
        .next()
        .map(str::to_string)
        .ok_or(CommandError::MissingArgument { command, argument })
}

fn resource_type_from(value: &str) -> Result<ResourceType, CommandError> {
    match value {
        "app" => Ok(ResourceType::App),
        "api" => Ok(ResourceType::Api),
        "system" => Ok(ResourceType::System),
        _ => Err(CommandError::InvalidResourceType {
            value: value.to_string(),
        }),
    }
}

fn parameters<'a>(words: impl Iterator<Item = &'a str>) -> Result<Parameters, CommandError> {
    let mut parameters = Parameters::new();
    for word in words {
        let Some((key, value)) = word.split_once('=').filter(|(key, _)| !key.is_empty()) else {
            return Err(CommandError::InvalidParameter {
                parameter: word.to_string(),
            });
        };
        parameters.insert(key.to_string(), JsonValue::String(value.to_string()));
    }
    Ok(parameters)
}

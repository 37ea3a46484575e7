//! Line-oriented commands for the terminal front end.

use crate::error::CliError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Write,
    Read,
    Unlock(String),
    Name(String),
    Send(String),
    List,
    Status,
    Share,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  write            switch to the write view
  read             switch to the read view (needs unlock)
  unlock <phrase>  open the read view for this session
  name <name>      set the sender name (blank for anonymous)
  send <text>      send a message
  list             show the messages currently loaded
  status           show connection and session state
  share            how to invite others
  quit             exit";

impl Command {
    /// Parse one input line.  Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, CliError> {
        let line = line.trim_start();
        if line.trim().is_empty() {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest),
            None => (line.trim_end(), ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "write" | "w" => Self::Write,
            "read" | "r" => Self::Read,
            "unlock" => Self::Unlock(required(rest.trim(), "unlock", "a passphrase")?),
            // Kept verbatim: the composer decides what a blank name means.
            "name" => Self::Name(rest.trim_end_matches(['\r', '\n']).to_string()),
            "send" | "s" => Self::Send(required(rest, "send", "some text")?),
            "list" | "ls" => Self::List,
            "status" => Self::Status,
            "share" => Self::Share,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(CliError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn required(
    value: &str,
    command: &'static str,
    argument: &'static str,
) -> Result<String, CliError> {
    if value.trim().is_empty() {
        return Err(CliError::MissingArgument { command, argument });
    }
    Ok(value.to_string())
}

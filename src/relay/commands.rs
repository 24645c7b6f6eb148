//! `#`-prefixed directives typed at the operator console or the client.
//!
//! Parsing only splits the line; each side maps names to its own command set
//! and validates arguments in the order its checks require.

use crate::error::ChatError;

/// A `#name arg...` line split on whitespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive<'a> {
    pub name: &'a str,
    pub args: Vec<&'a str>,
}

impl<'a> Directive<'a> {
    /// Returns `None` for lines that do not start with `#`.
    pub fn parse(line: &'a str) -> Option<Self> {
        let trimmed = line.trim();
        if !trimmed.starts_with('#') {
            return None;
        }
        let mut parts = trimmed.split_whitespace();
        let name = parts.next()?;
        Some(Directive { name, args: parts.collect() })
    }

    pub fn arg(&self, index: usize) -> Option<&'a str> {
        self.args.get(index).copied()
    }
}

pub fn parse_port(raw: &str) -> Result<u16, ChatError> {
    raw.parse::<u16>().map_err(|_| ChatError::InvalidPort(raw.to_string()))
}

/// Operator console commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand<'a> {
    Quit,
    Stop,
    Close,
    SetPort(Option<&'a str>),
    Start,
    GetPort,
    Unknown,
}

impl<'a> ConsoleCommand<'a> {
    pub fn from_directive(d: &Directive<'a>) -> Self {
        match d.name {
            "#quit" => ConsoleCommand::Quit,
            "#stop" => ConsoleCommand::Stop,
            "#close" => ConsoleCommand::Close,
            "#setport" => ConsoleCommand::SetPort(d.arg(0)),
            "#start" => ConsoleCommand::Start,
            "#getport" => ConsoleCommand::GetPort,
            _ => ConsoleCommand::Unknown,
        }
    }
}

/// Client commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand<'a> {
    Quit,
    Logoff,
    SetHost(Option<&'a str>),
    SetPort(Option<&'a str>),
    Login,
    GetHost,
    GetPort,
    Unknown,
}

impl<'a> ClientCommand<'a> {
    pub fn from_directive(d: &Directive<'a>) -> Self {
        match d.name {
            "#quit" => ClientCommand::Quit,
            "#logoff" => ClientCommand::Logoff,
            "#sethost" => ClientCommand::SetHost(d.arg(0)),
            "#setport" => ClientCommand::SetPort(d.arg(0)),
            "#login" => ClientCommand::Login,
            "#gethost" => ClientCommand::GetHost,
            "#getport" => ClientCommand::GetPort,
            _ => ClientCommand::Unknown,
        }
    }
}

//! Command definitions
//!
//! A command is a name plus ordered arguments. It is immutable once built:
//! the builder methods consume and return it.

use super::Argument;

/// How a command's `ok` reply is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `set`, `del`: success is the result
    Write,

    /// `expire`, `setnx`, `auth`, `exists`, `hexists`: Field[1] == "1"
    Predicate,

    /// `hsize`: Field[1] as i64
    Counter,

    /// `hgetall`, `hscan`, `hrscan`, `multi_hget`, `scan`, `rscan`: key/value pairs
    Pairs,

    /// Everything else: remaining fields as a list
    List,
}

impl CommandKind {
    /// Classify a command by name (case-insensitive)
    pub fn of(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "set" | "del" => CommandKind::Write,
            "expire" | "setnx" | "auth" | "exists" | "hexists" => CommandKind::Predicate,
            "hsize" => CommandKind::Counter,
            "hgetall" | "hscan" | "hrscan" | "multi_hget" | "scan" | "rscan" => {
                CommandKind::Pairs
            }
            _ => CommandKind::List,
        }
    }
}

/// A command ready to be encoded
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    args: Vec<Argument>,
}

impl Command {
    /// Start a command with no arguments
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Build a command from a name and a prepared argument list
    pub fn with_args(name: impl Into<String>, args: Vec<Argument>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<Argument>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Argument>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.args
    }

    /// Reply interpretation category for this command
    pub fn kind(&self) -> CommandKind {
        CommandKind::of(&self.name)
    }
}

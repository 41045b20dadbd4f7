//! Shell command formatting
//!
//! A [`Command`] is a program, positional arguments and keyword-style
//! [`Options`]. Formatting it against the host [`Controls`] yields the token
//! sequence actually handed to the shell: the locale and environment prefix,
//! then the program with its flags placed before or after the arguments.

use std::borrow::Cow;
use std::fmt;

use crate::controls::{Controls, OptionsPlacement};

/// Shell-escape a single word
#[must_use]
pub fn escape(word: &str) -> String {
    shell_escape::unix::escape(Cow::Borrowed(word)).into_owned()
}

/// Convert an option name into its flag token
///
/// `p` becomes `-p`, `no_same_owner` becomes `--no-same-owner`.
#[must_use]
pub fn flag_name(name: &str) -> String {
    if name.chars().count() == 1 {
        format!("-{name}")
    } else {
        format!("--{}", name.replace('_', "-"))
    }
}

/// Value of a keyword option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// Bare flag, emitted only when true
    Flag(bool),
    /// One `flag value` token
    Value(String),
    /// One `flag value` token per element
    List(Vec<String>),
}

impl OptionValue {
    fn tokens(&self, flag: &str) -> Vec<String> {
        match self {
            OptionValue::Flag(true) => vec![flag.to_string()],
            OptionValue::Flag(false) => Vec::new(),
            OptionValue::Value(value) => vec![format!("{flag} {}", escape(value))],
            OptionValue::List(values) => values
                .iter()
                .map(|value| format!("{flag} {}", escape(value)))
                .collect(),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Flag(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Value(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Value(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(values: Vec<String>) -> Self {
        OptionValue::List(values)
    }
}

impl From<Vec<&str>> for OptionValue {
    fn from(values: Vec<&str>) -> Self {
        OptionValue::List(values.into_iter().map(str::to_string).collect())
    }
}

macro_rules! option_value_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for OptionValue {
                fn from(value: $ty) -> Self {
                    OptionValue::Value(value.to_string())
                }
            }
        )*
    };
}

option_value_from_int!(i32, i64, u32, u64);

/// Ordered option-name to value map
///
/// Setting an existing name replaces its value in place, so the flag keeps
/// its original position in the formatted command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    entries: Vec<(String, OptionValue)>,
}

impl Options {
    /// Create an empty option map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    /// Set an option only when absent; returns whether it was inserted
    pub fn set_default(&mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.entries.push((name, value.into()));
        true
    }

    /// Look up an option
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Whether an option is set
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Remove an option and return its value
    pub fn remove(&mut self, name: &str) -> Option<OptionValue> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Iterate over options in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expand every option into its flag tokens
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|(name, value)| value.tokens(&flag_name(name)))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Options
where
    K: Into<String>,
    V: Into<OptionValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = Options::new();
        for (name, value) in iter {
            options.set(name, value);
        }
        options
    }
}

/// Option names that configure the execution instead of becoming flags
pub const RESERVED_OPTIONS: [&str; 3] = ["interactive", "stdin", "pty"];

/// A command to run on a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    program: String,
    args: Vec<String>,
    options: Options,
    interactive: bool,
    stdin: Option<String>,
    pty: bool,
}

impl Command {
    /// Start a command; the program is inserted verbatim
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            options: Options::new(),
            interactive: false,
            stdin: None,
            pty: false,
        }
    }

    /// Append an escaped positional argument
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(escape(arg.as_ref()));
        self
    }

    /// Append several escaped positional arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|arg| escape(arg.as_ref())));
        self
    }

    /// Append a token verbatim (pipes, redirections, pre-escaped words)
    #[must_use]
    pub fn raw_arg(mut self, token: impl Into<String>) -> Self {
        self.args.push(token.into());
        self
    }

    /// Set a keyword option
    ///
    /// `interactive`, `stdin` and `pty` are routed to the execution settings
    /// and never become flags.
    #[must_use]
    pub fn opt(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        let name = name.into();
        let value = value.into();
        match name.as_str() {
            "interactive" => self.interactive = truthy(&value),
            "pty" => self.pty = truthy(&value),
            "stdin" => {
                self.stdin = match value {
                    OptionValue::Value(path) => Some(path),
                    OptionValue::List(paths) => paths.into_iter().next(),
                    OptionValue::Flag(_) => None,
                }
            }
            _ => {
                self.options.set(name, value);
            }
        }
        self
    }

    /// Merge a whole option map, routing reserved names
    #[must_use]
    pub fn opts(self, options: Options) -> Self {
        options
            .entries
            .into_iter()
            .fold(self, |cmd, (name, value)| cmd.opt(name, value))
    }

    /// Stream output to the caller's terminal instead of capturing it
    #[must_use]
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Redirect the command's stdin from a path
    #[must_use]
    pub fn stdin(mut self, path: impl Into<String>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    /// Request a pseudo-terminal (remote hosts only)
    #[must_use]
    pub fn pty(mut self, pty: bool) -> Self {
        self.pty = pty;
        self
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Build the token sequence for the given controls
    #[must_use]
    pub fn format(&self, controls: &Controls) -> FormattedCommand {
        let mut body = vec![self.program.clone()];
        let flags = self.options.tokens();
        match controls.options_placement {
            OptionsPlacement::Before => {
                body.extend(flags);
                body.extend(self.args.iter().cloned());
            }
            OptionsPlacement::After => {
                body.extend(self.args.iter().cloned());
                body.extend(flags);
            }
        }
        if let Some(path) = &self.stdin {
            body.push(format!("< {}", escape(path)));
        }

        let mut tokens = Vec::with_capacity(body.len() + controls.env.len() + 1);
        if !controls.locale.is_empty() {
            tokens.push(format!("LC_ALL={}", escape(&controls.locale)));
        }
        for (key, value) in &controls.env {
            tokens.push(format!("{key}={}", escape(value)));
        }
        if controls.shell {
            tokens.push("sh".to_string());
            tokens.push("-c".to_string());
            tokens.push(escape(&body.join(" ")));
        } else {
            tokens.extend(body);
        }

        FormattedCommand {
            tokens,
            interactive: self.interactive,
            pty: self.pty,
        }
    }
}

fn truthy(value: &OptionValue) -> bool {
    match value {
        OptionValue::Flag(flag) => *flag,
        OptionValue::Value(text) => !text.is_empty(),
        OptionValue::List(items) => !items.is_empty(),
    }
}

/// A command ready to hand to a shell or to a remote exec request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedCommand {
    /// Ordered shell tokens
    pub tokens: Vec<String>,
    /// Stream instead of capture
    pub interactive: bool,
    /// Request a pseudo-terminal
    pub pty: bool,
}

impl FormattedCommand {
    /// Render as a single shell string
    #[must_use]
    pub fn render(&self) -> String {
        self.tokens.join(" ")
    }

    /// Whether a token appears in the command
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    /// Position of a token in the command
    #[must_use]
    pub fn position(&self, token: &str) -> Option<usize> {
        self.tokens.iter().position(|t| t == token)
    }
}

impl fmt::Display for FormattedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

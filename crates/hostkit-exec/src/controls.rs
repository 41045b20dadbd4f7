//! Per-host controls and scoped overrides
//!
//! Every host carries a fully populated [`Controls`] value. Callers change it
//! for a bounded scope with [`HostState::scoped`], which returns a
//! [`ControlsGuard`] that puts the previous value back when dropped, whatever
//! the exit path (normal return, `?`, panic, or a cancelled future).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::result::UNKNOWN_STATUS;

/// Default locale forced on every command so that output is parseable
pub const DEFAULT_LOCALE: &str = "en_US.utf-8";

/// Charset used to decode command output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Charset {
    /// UTF-8, invalid sequences replaced
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    /// ISO-8859-1, one byte per char
    #[serde(rename = "latin-1", alias = "latin1", alias = "iso-8859-1")]
    Latin1,
}

impl Charset {
    /// Decode bytes into text
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Charset::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Charset::Utf8 => write!(f, "utf-8"),
            Charset::Latin1 => write!(f, "latin-1"),
        }
    }
}

impl FromStr for Charset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Charset::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Charset::Latin1),
            other => Err(format!("unsupported charset '{other}'")),
        }
    }
}

/// Where option flags go relative to positional arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionsPlacement {
    /// `cmd --flag arg`
    #[default]
    Before,
    /// `cmd arg --flag`
    After,
}

impl FromStr for OptionsPlacement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before" => Ok(OptionsPlacement::Before),
            "after" => Ok(OptionsPlacement::After),
            other => Err(format!("unknown options placement '{other}'")),
        }
    }
}

/// Per-host execution controls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controls {
    /// Value of `LC_ALL` for every command (empty disables the prefix)
    pub locale: String,
    /// Output charset
    pub decode: Charset,
    /// Option placement policy
    pub options_placement: OptionsPlacement,
    /// Extra environment assignments prefixed to every command
    pub env: BTreeMap<String, String>,
    /// Wall-clock deadline for a whole execution
    pub timeout: Option<Duration>,
    /// Wrap commands in `sh -c`
    pub shell: bool,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            decode: Charset::default(),
            options_placement: OptionsPlacement::default(),
            env: BTreeMap::new(),
            timeout: None,
            shell: false,
        }
    }
}

/// A partial set of controls applied on top of the current ones
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlsOverride {
    locale: Option<String>,
    decode: Option<Charset>,
    options_placement: Option<OptionsPlacement>,
    env: Vec<(String, String)>,
    timeout: Option<Option<Duration>>,
    shell: Option<bool>,
}

impl ControlsOverride {
    /// Create an empty override
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the locale
    #[must_use]
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Override the output charset
    #[must_use]
    pub fn decode(mut self, charset: Charset) -> Self {
        self.decode = Some(charset);
        self
    }

    /// Override the option placement policy
    #[must_use]
    pub fn options_placement(mut self, placement: OptionsPlacement) -> Self {
        self.options_placement = Some(placement);
        self
    }

    /// Add (or replace) one environment assignment
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Override the timeout (`None` disables it)
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override shell wrapping
    #[must_use]
    pub fn shell(mut self, shell: bool) -> Self {
        self.shell = Some(shell);
        self
    }

    /// Return `controls` with this override applied
    #[must_use]
    pub fn apply_to(&self, controls: &Controls) -> Controls {
        let mut next = controls.clone();
        if let Some(locale) = &self.locale {
            next.locale.clone_from(locale);
        }
        if let Some(decode) = self.decode {
            next.decode = decode;
        }
        if let Some(placement) = self.options_placement {
            next.options_placement = placement;
        }
        for (key, value) in &self.env {
            next.env.insert(key.clone(), value.clone());
        }
        if let Some(timeout) = self.timeout {
            next.timeout = timeout;
        }
        if let Some(shell) = self.shell {
            next.shell = shell;
        }
        next
    }

    /// Put back the fields this override touched, taking them from `saved`
    fn restore(&self, saved: &Controls, target: &mut Controls) {
        if self.locale.is_some() {
            target.locale.clone_from(&saved.locale);
        }
        if self.decode.is_some() {
            target.decode = saved.decode;
        }
        if self.options_placement.is_some() {
            target.options_placement = saved.options_placement;
        }
        for (key, _) in &self.env {
            match saved.env.get(key) {
                Some(value) => target.env.insert(key.clone(), value.clone()),
                None => target.env.remove(key),
            };
        }
        if self.timeout.is_some() {
            target.timeout = saved.timeout;
        }
        if self.shell.is_some() {
            target.shell = saved.shell;
        }
    }
}

/// Mutable state shared by every host implementation
#[derive(Debug)]
pub struct HostState {
    controls: Mutex<Controls>,
    return_code: AtomicI32,
}

impl HostState {
    /// Create state with the given controls
    #[must_use]
    pub fn new(controls: Controls) -> Self {
        Self {
            controls: Mutex::new(controls),
            return_code: AtomicI32::new(UNKNOWN_STATUS),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Controls> {
        self.controls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current controls
    #[must_use]
    pub fn controls(&self) -> Controls {
        self.lock().clone()
    }

    /// Apply an override until the returned guard is dropped
    ///
    /// Dropping the guard restores only the fields the override set, so
    /// guards over disjoint fields may be released in any order. Guards
    /// that override the same field must be released innermost first.
    pub fn scoped(&self, overrides: &ControlsOverride) -> ControlsGuard<'_> {
        let mut current = self.lock();
        let next = overrides.apply_to(&current);
        let saved = std::mem::replace(&mut *current, next);
        trace!(?overrides, "controls overridden");
        ControlsGuard {
            state: self,
            overrides: overrides.clone(),
            saved: Some(saved),
        }
    }

    /// Return code of the last command (-1 when unknown)
    #[must_use]
    pub fn return_code(&self) -> i32 {
        self.return_code.load(Ordering::SeqCst)
    }

    /// Record the return code of the last command
    pub fn set_return_code(&self, code: i32) {
        self.return_code.store(code, Ordering::SeqCst);
    }
}

impl Default for HostState {
    fn default() -> Self {
        Self::new(Controls::default())
    }
}

/// Restores the controls captured by [`HostState::scoped`] on drop
#[must_use = "controls are restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ControlsGuard<'a> {
    state: &'a HostState,
    overrides: ControlsOverride,
    saved: Option<Controls>,
}

impl ControlsGuard<'_> {
    /// Controls in effect while the guard lives
    #[must_use]
    pub fn current(&self) -> Controls {
        self.state.controls()
    }
}

impl Drop for ControlsGuard<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.overrides.restore(&saved, &mut self.state.lock());
            trace!("controls restored");
        }
    }
}

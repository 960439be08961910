//! Multi-call dispatch by argv prefix.
//!
//! `gokart _name args...` runs the routine registered as `name` with argv
//! `[name, args...]`, as if it were its own binary. Each extra leading
//! underscore is one more layer of impersonation: `__name` re-enters the
//! dispatcher as `_name`.

use std::collections::BTreeMap;
use std::fmt;

/// Reserved argv prefix.
pub const PREFIX: char = '_';

/// A program entry point: takes argv (program name first) and returns the
/// exit status.
pub type Routine = fn(&[String]) -> i32;

/// What a name dispatches to.
pub enum Entry {
    Routine(Routine),
    Nested(Dispatcher),
}

/// Name to entry manifest consulted at process start.
#[derive(Default)]
pub struct Dispatcher {
    entries: BTreeMap<String, Entry>,
    fallback: Option<Routine>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a routine under `name`.
    pub fn routine(mut self, name: &str, routine: Routine) -> Self {
        self.entries.insert(name.to_string(), Entry::Routine(routine));
        self
    }

    /// Register a nested dispatcher under `name`.
    pub fn nested(mut self, name: &str, dispatcher: Dispatcher) -> Self {
        self.entries.insert(name.to_string(), Entry::Nested(dispatcher));
        self
    }

    /// Routine run by a nested dispatcher when its arguments carry no
    /// prefix.
    pub fn fallback(mut self, routine: Routine) -> Self {
        self.fallback = Some(routine);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Dispatch `args` (argv without the executable path). Returns the exit
    /// status when a routine ran, `None` when control belongs to the caller.
    pub fn dispatch(&self, args: &[String]) -> Option<i32> {
        let first = args.first()?;
        let name = first.strip_prefix(PREFIX)?;
        let rest = &args[1..];

        if name.starts_with(PREFIX) {
            log::debug!("stripping one impersonation layer from {}", first);
            let mut inner = Vec::with_capacity(args.len());
            inner.push(name.to_string());
            inner.extend_from_slice(rest);
            return self.dispatch(&inner);
        }

        let mut argv = Vec::with_capacity(args.len());
        argv.push(name.to_string());
        argv.extend_from_slice(rest);

        match self.entries.get(name)? {
            Entry::Routine(routine) => {
                log::debug!("dispatching to {}", name);
                Some(routine(&argv))
            }
            Entry::Nested(inner) => inner
                .dispatch(rest)
                .or_else(|| inner.fallback.map(|routine| routine(&argv))),
        }
    }

    /// Dispatch the current process's arguments.
    pub fn run_from_env(&self) -> Option<i32> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        self.dispatch(&args)
    }
}

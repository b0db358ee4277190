//! CLI commands.

pub(crate) mod capabilities;
pub(crate) mod install;
pub(crate) mod log;
pub(crate) mod prefs;
pub(crate) mod run;
pub(crate) mod runtime;

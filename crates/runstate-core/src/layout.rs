//! Persisted store layout
//!
//! The coordinator depends on exact paths inside the variable store:
//!
//! ```text
//! /RunState/{State, Title, RunNumber, Recording, Timeout, ReadoutParentDir}
//! <ParentDir>/<program>/{State, enable, standalone, path, host, outring, inring}
//! ```

/// Directory holding the run-wide variables
pub const RUN_STATE_DIR: &str = "/RunState";

/// Global state variable
pub const GLOBAL_STATE_PATH: &str = "/RunState/State";

/// Run title variable
pub const TITLE_PATH: &str = "/RunState/Title";

/// Run number variable
pub const RUN_NUMBER_PATH: &str = "/RunState/RunNumber";

/// Event recording flag
pub const RECORDING_PATH: &str = "/RunState/Recording";

/// Transition timeout in seconds
pub const TIMEOUT_PATH: &str = "/RunState/Timeout";

/// Config variable naming the program-parent directory
pub const PARENT_DIR_PATH: &str = "/RunState/ReadoutParentDir";

/// Program-parent directory used when `ReadoutParentDir` is unset
pub const DEFAULT_PROGRAM_PARENT: &str = "/RunState";

/// Name of the global run-control state machine type
pub const RUN_STATE_MACHINE: &str = "RunStateMachine";

/// Builtin type names
pub const INTEGER_TYPE: &str = "integer";
pub const REAL_TYPE: &str = "real";
pub const STRING_TYPE: &str = "string";
pub const BOOL_TYPE: &str = "bool";

/// Per-program variables
pub mod program {
    pub const STATE: &str = "State";
    pub const ENABLE: &str = "enable";
    pub const STANDALONE: &str = "standalone";
    pub const PATH: &str = "path";
    pub const HOST: &str = "host";
    pub const OUTRING: &str = "outring";
    pub const INRING: &str = "inring";
}

/// Path separator
pub const SEPARATOR: char = '/';

/// Normalize an absolute path: collapse repeated separators and drop a trailing one.
///
/// Returns `None` for relative or empty paths.
pub fn normalize(path: &str) -> Option<String> {
    if !path.starts_with(SEPARATOR) {
        return None;
    }
    let parts: Vec<&str> = split(path).collect();
    let mut out = String::with_capacity(path.len());
    for part in parts {
        out.push(SEPARATOR);
        out.push_str(part);
    }
    if out.is_empty() {
        out.push(SEPARATOR);
    }
    Some(out)
}

/// Iterate over the non-empty components of a path
pub fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(|s| !s.is_empty())
}

/// Join a directory and a child name
pub fn join(dir: &str, child: &str) -> String {
    if dir.ends_with(SEPARATOR) {
        format!("{}{}", dir, child)
    } else {
        format!("{}{}{}", dir, SEPARATOR, child)
    }
}

/// Split a path into (parent, leaf). The root has no parent.
pub fn parent_and_leaf(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.trim_end_matches(SEPARATOR);
    let idx = trimmed.rfind(SEPARATOR)?;
    let leaf = &trimmed[idx + 1..];
    if leaf.is_empty() {
        return None;
    }
    let parent = if idx == 0 { "/" } else { &trimmed[..idx] };
    Some((parent, leaf))
}

/// Directory of a program under a parent directory
pub fn program_dir(parent: &str, name: &str) -> String {
    join(parent, name)
}

/// Path of one of a program's variables
pub fn program_var(parent: &str, name: &str, var: &str) -> String {
    join(&join(parent, name), var)
}

/// If `path` is exactly `<parent>/<program>/State`, return the program name
pub fn program_of_state_path<'a>(path: &'a str, parent: &str) -> Option<&'a str> {
    let parent = parent.trim_end_matches(SEPARATOR);
    let rest = path.strip_prefix(parent)?.strip_prefix(SEPARATOR)?;
    let (program, var) = rest.split_once(SEPARATOR)?;
    if program.is_empty() || var != program::STATE {
        return None;
    }
    Some(program)
}

/// A name is usable as a single path component
pub fn is_valid_component(name: &str) -> bool {
    !name.is_empty() && !name.contains(SEPARATOR) && name != "." && name != ".."
}

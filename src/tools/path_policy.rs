//! Path resolution and the write deny-list

use std::path::{Component, Path, PathBuf};

use super::{ToolContext, ToolError};

/// System locations no tool may write under
pub const DENIED_WRITE_PREFIXES: &[&str] = &[
    "/etc",
    "/sys",
    "/proc",
    "/boot",
    "/dev",
    r"C:\Windows",
    r"C:\System32",
];

/// Resolve a tool-supplied path against the working directory
///
/// `~` expands to the home directory; `.` and `..` are folded lexically.
pub fn resolve(working_dir: &Path, raw: &str) -> PathBuf {
    let expanded = match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(raw),
        },
        _ => PathBuf::from(raw),
    };

    if expanded.is_absolute() {
        normalize(&expanded)
    } else {
        normalize(&working_dir.join(expanded))
    }
}

/// Lexically normalize a path without touching the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` at the root stays at the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

/// Whether a path falls under one of the denied prefixes
///
/// Comparison is case-insensitive and treats `\` and `/` alike, so Windows
/// spellings are caught on any host.
pub fn is_denied(path: &str) -> bool {
    let candidate = fold(path);
    DENIED_WRITE_PREFIXES.iter().any(|prefix| {
        let prefix = fold(prefix);
        candidate == prefix
            || candidate
                .strip_prefix(&prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

fn fold(path: &str) -> String {
    let folded = path.replace('\\', "/").to_lowercase();
    match folded.trim_end_matches('/') {
        "" => "/".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Resolve a write target and refuse it if any spelling of it is denied
///
/// The raw argument, its lexical resolution and its symlink-resolved form are
/// each checked, so `..` tricks and links into system directories are refused.
pub async fn check_write_target(ctx: &ToolContext, raw: &str) -> Result<PathBuf, ToolError> {
    let denied = || ToolError::Denied { path: raw.to_string() };

    if is_denied(raw) {
        return Err(denied());
    }

    let resolved = resolve(&ctx.working_dir, raw);
    if is_denied(&resolved.to_string_lossy()) {
        return Err(denied());
    }

    let canonical = ctx.fs.canonicalize(&resolved).await;
    if is_denied(&canonical.to_string_lossy()) {
        return Err(denied());
    }

    Ok(resolved)
}

//! Session state snapshots and the script that carries them between runs.
//!
//! A snapshot is a JSON Lines file, one `{"name": .., "value": ..}` object
//! per top-level binding, where `value` is the binding's literal text. Every
//! execution runs a composed script:
//!
//! 1. a reload prelude that restores each snapshotted binding on its own,
//!    silently skipping any that fail to evaluate;
//! 2. the caller's code, verbatim;
//! 3. an epilogue that dumps the interpreter's globals to a staging file.
//!
//! Persistence is deliberately lossy: names with the reserved `_` prefix,
//! module objects, and any value whose text form is not a re-loadable
//! literal are dropped from the snapshot instead of failing the call.
//!
//! The interpreter never touches the live snapshot. The staging file is
//! promoted with [`commit`] only once the run is known to have finished
//! cleanly before its deadline; every other outcome calls [`discard`].

use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// File name of the snapshot inside a session's storage area.
pub const SNAPSHOT_FILE: &str = "state.jsonl";

/// File name the epilogue writes before the snapshot is committed.
pub const STAGING_FILE: &str = "state.jsonl.tmp";

/// Names starting with this prefix are never persisted.
pub const RESERVED_PREFIX: &str = "_";

/// One persisted top-level binding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Binding {
    /// Binding name.
    pub name: String,
    /// Literal source text of the bound value.
    pub value: String,
}

const PRELUDE_HEADER: &str = r"import ast as __session_exec_ast
import builtins as __session_exec_builtins

def __session_exec_restore(name, text):
    b = __session_exec_builtins
    try:
        b.globals()[name] = __session_exec_ast.literal_eval(text)
    except b.Exception:
        pass
";

const EPILOGUE_BODY: &str = r#"
def __session_exec_snapshot(path, scope):
    import ast, builtins as b, json, types
    with b.open(path, "w", encoding="utf-8") as out:
        for name, value in b.list(scope.items()):
            if name.startswith("_") or b.isinstance(value, types.ModuleType):
                continue
            try:
                text = b.repr(value)
                ast.literal_eval(text)
            except b.Exception:
                continue
            out.write(json.dumps({"name": name, "value": text}) + "\n")
"#;

/// Whether `name` can be restored as a top-level binding.
#[must_use]
pub fn is_restorable_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    !name.starts_with(RESERVED_PREFIX)
        && first.is_alphabetic()
        && chars.all(|c| c == '_' || c.is_alphanumeric())
}

/// Parse snapshot text, keeping every well-formed line.
///
/// Lines that are not valid JSON, or that name a reserved or malformed
/// identifier, are skipped individually.
#[must_use]
pub fn parse(raw: &str) -> Vec<Binding> {
    let mut skipped = 0usize;
    let bindings: Vec<Binding> = raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<Binding>(line) {
            Ok(binding) if is_restorable_name(&binding.name) => Some(binding),
            _ => {
                skipped += 1;
                None
            }
        })
        .collect();

    if skipped > 0 {
        debug!(skipped, kept = bindings.len(), "skipped unreadable snapshot lines");
    }
    bindings
}

/// Read the snapshot at `path`.
///
/// A missing or unreadable file yields no bindings; reload problems never
/// fail an execution.
pub async fn load(path: &Path) -> Vec<Binding> {
    match tokio::fs::read(path).await {
        Ok(bytes) => parse(&String::from_utf8_lossy(&bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to read snapshot; starting empty");
            Vec::new()
        }
    }
}

/// Render the script fragment that restores `bindings`.
#[must_use]
pub fn render_prelude(bindings: &[Binding]) -> String {
    let mut prelude = String::from(PRELUDE_HEADER);
    prelude.push('\n');
    for binding in bindings {
        let _ = writeln!(
            prelude,
            "__session_exec_restore({}, {})",
            py_string(&binding.name),
            py_string(&binding.value)
        );
    }
    prelude
}

/// Promote the staging file at `staging` to the live snapshot at `live`.
///
/// A missing staging file means the epilogue never ran (for example the
/// code called `sys.exit(0)`); the previous snapshot is kept.
pub async fn commit(staging: &Path, live: &Path) {
    match tokio::fs::rename(staging, live).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!("no staged snapshot; keeping previous state");
        }
        Err(err) => {
            warn!(path = %live.display(), %err, "failed to commit snapshot; keeping previous state");
            discard(staging).await;
        }
    }
}

/// Remove an uncommitted staging file, if any.
pub async fn discard(staging: &Path) {
    match tokio::fs::remove_file(staging).await {
        Ok(()) => debug!("discarded staged snapshot"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %staging.display(), %err, "failed to discard staged snapshot"),
    }
}

/// Render the script fragment that dumps the globals to `staging_path`.
#[must_use]
pub fn render_epilogue(staging_path: &Path) -> String {
    let path = staging_path.to_string_lossy();
    format!(
        "{EPILOGUE_BODY}\n__session_exec_snapshot({}, __session_exec_builtins.globals())\n",
        py_string(&path)
    )
}

/// Compose the full script for one execution.
#[must_use]
pub fn compose_script(bindings: &[Binding], code: &str, staging_path: &Path) -> String {
    let mut script = render_prelude(bindings);
    script.push('\n');
    script.push_str(code);
    if !code.ends_with('\n') {
        script.push('\n');
    }
    script.push_str(&render_epilogue(staging_path));
    script
}

/// Quote `text` as a string literal.
///
/// JSON string escapes (`\"`, `\\`, `\n`, `\uXXXX`, ...) are all valid in
/// Python string literals.
fn py_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".into())
}

//! Human-readable server names derived from launch parameters.

use super::config::{ServerDefinition, ServerKind};

/// Derive the display name for a server definition.
///
/// - stdio with arguments: the last argument's file name with every `.py`
///   removed,
///   underscores as spaces, title-cased (`/a/b/date_mcp_server.py` becomes
///   `Date Mcp Server`).
/// - stdio without arguments: `"<command> server"`.
/// - http: `"HTTP server (<url>)"`.
/// - anything else: `"<Kind> Server"`.
pub fn display_name(def: &ServerDefinition) -> String {
    match def.kind {
        ServerKind::Stdio => {
            if let Some(command) = &def.command {
                return match def.args.last() {
                    Some(script) => script_label(script),
                    None => format!("{command} server"),
                };
            }
        }
        ServerKind::Http => {
            if let Some(url) = &def.url {
                return format!("HTTP server ({url})");
            }
        }
    }
    format!("{} Server", title_case(def.kind.as_str()))
}

fn script_label(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    title_case(&file.replace(".py", "").replace('_', " "))
}

/// Title-case `input` the way Python's `str.title` does: a cased character
/// is upper-cased when it follows an uncased one and lower-cased otherwise.
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_cased = false;
    for c in input.chars() {
        let cased = c.is_uppercase() || c.is_lowercase();
        if cased && prev_cased {
            out.extend(c.to_lowercase());
        } else if cased {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev_cased = cased;
    }
    out
}

//! Dotted routing-path helpers
//!
//! A command path `a.b.leaf` crosses one worker boundary per segment before
//! the leaf. Resolution peels one hop at a time: the head names a direct
//! child, the rest travels onward as the payload of a `proxy` call.

use serde_json::Value;

use crate::messages::PROXY_KEYWORD;

/// Split a dotted path into its first hop and the remaining path
///
/// Returns `(leaf, None)` for a single-segment (local) path.
pub fn split_head(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

/// Build the argument list for one proxy hop: the remaining path followed
/// by the original arguments, unchanged
pub fn proxy_args(rest: &str, args: Vec<Value>) -> (&'static str, Vec<Value>) {
    let mut wrapped = Vec::with_capacity(args.len() + 1);
    wrapped.push(Value::String(rest.to_string()));
    wrapped.extend(args);
    (PROXY_KEYWORD, wrapped)
}

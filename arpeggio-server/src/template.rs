//! `$name` / `${name}` substitution against a string context
//!
//! Identifiers are restricted to `[_a-z][.\-_a-z0-9]*`; `$$` escapes a
//! literal dollar. A referenced key absent from the context fails the
//! whole substitution, never leaving a silent blank.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use arpeggio_utils::{ArpeggioError, Result};

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\$(?:(\$)|([_a-z][.\-_a-z0-9]*)|\{([_a-z][.\-_a-z0-9]*)\})")
            .expect("placeholder pattern is valid");
}

/// Substitute every placeholder in `template` from `context`
pub fn substitute(template: &str, context: &BTreeMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let matched = caps.get(0).expect("group 0 always matches");
        push_literal(&mut out, &template[last..matched.start()])?;

        if caps.get(1).is_some() {
            out.push('$');
        } else {
            let key = caps
                .get(2)
                .or_else(|| caps.get(3))
                .expect("one identifier group matches")
                .as_str();
            let value = context
                .get(key)
                .ok_or_else(|| ArpeggioError::MissingContextKey(key.to_string()))?;
            out.push_str(value);
        }

        last = matched.end();
    }

    push_literal(&mut out, &template[last..])?;
    Ok(out)
}

/// Append text that must not contain an unconsumed `$`
fn push_literal(out: &mut String, text: &str) -> Result<()> {
    if text.contains('$') {
        return Err(ArpeggioError::Template(format!(
            "invalid placeholder in {:?}",
            text
        )));
    }
    out.push_str(text);
    Ok(())
}

//! Rewriting of the child's CLI token sequence.
//!
//! Tokens are either flags (`-name`, `-name=value`) or the value that follows a
//! separated flag (`-name value`). Free-standing positional arguments are not
//! supported.

use crate::constants::FLAG_MARKER;

/// Returns `true` if the token is a flag rather than a flag value.
pub fn is_flag(token: &str) -> bool {
    token.starts_with(FLAG_MARKER)
}

/// Returns `true` if the flag token starts with `-<name>`.
///
/// This is a prefix match, so `-supervisor=true` matches `supervisor`.
pub fn flag_has_name(token: &str, name: &str) -> bool {
    token
        .strip_prefix(FLAG_MARKER)
        .is_some_and(|rest| rest.starts_with(name))
}

/// Removes flags satisfying `condition` (true to remove) from `flags`.
///
/// A removed flag takes its value token along when given as `-flag value`. A flag
/// given as `-flag=value` owns no separate token, so whatever follows it is kept.
/// The input must not contain the leading executable path.
pub fn remove_from_flags<F>(flags: &[String], condition: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    let mut kept = Vec::with_capacity(flags.len());
    let mut connect_next = false;
    let mut deleted = false;

    for token in flags {
        if is_flag(token) {
            connect_next = true;
            if condition(token) {
                if token.contains('=') {
                    connect_next = false;
                }
                deleted = true;
            } else {
                kept.push(token.clone());
                deleted = false;
            }
        } else if (!deleted && connect_next) || (deleted && !connect_next) {
            // Either the value of a kept "-flag value", or a token that follows a
            // removed "-flag=value" and therefore does not belong to it.
            kept.push(token.clone());
        }
    }

    kept
}

/// Finds the value of the first `-<name> value` or `-<name>=value` flag.
///
/// Unlike [`flag_has_name`] this requires the whole flag name to match. Like
/// [`flag_has_name`] it only recognises a single leading `-`.
pub fn flag_value(flags: &[String], name: &str) -> Option<String> {
    let mut tokens = flags.iter();
    while let Some(token) = tokens.next() {
        let Some(rest) = token.strip_prefix(FLAG_MARKER) else {
            continue;
        };

        if let Some((key, value)) = rest.split_once('=') {
            if key == name {
                return Some(value.to_string());
            }
        } else if rest == name {
            return tokens.next().filter(|value| !is_flag(value)).cloned();
        }
    }
    None
}

/// Splits a comma separated daemon list, dropping blanks.
pub fn split_daemon_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

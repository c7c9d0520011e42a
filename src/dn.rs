//! Distinguished name construction and comparison.
//!
//! The directory tree has a fixed shape:
//!
//! ```text
//! <base dn>                          root (dcObject)
//! ├── ou=<users ou>,<base dn>        organizational unit
//! │   └── <naming attr>=<value>,...  user entries
//! └── ou=<groups ou>,<base dn>       organizational unit
//!     └── <naming attr>=<value>,...  group entries
//! ```
//!
//! DNs are built with a lowercase attribute type and the value exactly as it
//! came from the row, escaped per RFC 4514. Comparison goes through
//! [`normalize`], which lowercases and strips insignificant whitespace so that
//! `CN=Alice, OU=Users,DC=Example,DC=Com` finds the same entry as the built DN.

use std::borrow::Cow;

/// Escape an attribute value for use inside a DN.
pub fn escape_value(value: &str) -> Cow<'_, str> {
    let needs_escape = |(i, c): (usize, char)| {
        matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' | '\0')
            || (i == 0 && (c == '#' || c == ' '))
            || (i + c.len_utf8() == value.len() && c == ' ')
    };

    if !value.char_indices().any(needs_escape) {
        return Cow::Borrowed(value);
    }

    let mut escaped = String::with_capacity(value.len() + 4);
    for (i, c) in value.char_indices() {
        if c == '\0' {
            escaped.push_str("\\00");
        } else {
            if needs_escape((i, c)) {
                escaped.push('\\');
            }
            escaped.push(c);
        }
    }
    Cow::Owned(escaped)
}

/// Strip an optional `ou=` prefix from a configured OU name.
pub fn ou_name(ou: &str) -> &str {
    let ou = ou.trim();
    match ou.split_once('=') {
        Some((kind, name)) if kind.trim().eq_ignore_ascii_case("ou") => name.trim(),
        _ => ou,
    }
}

/// DN of an organizational unit: `ou=<ou>,<base>`.
pub fn ou_dn(ou: &str, base_dn: &str) -> String {
    format!("ou={},{}", escape_value(ou_name(ou)), base_dn)
}

/// DN of a leaf entry: `<attr>=<value>,ou=<ou>,<base>`.
pub fn leaf_dn(naming_attribute: &str, naming_value: &str, ou: &str, base_dn: &str) -> String {
    format!(
        "{}={},{}",
        naming_attribute.trim().to_ascii_lowercase(),
        escape_value(naming_value),
        ou_dn(ou, base_dn)
    )
}

/// Split a DN into its RDN components, honoring backslash escapes.
pub fn split_rdns(dn: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (i, c) in dn.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            ',' => {
                parts.push(&dn[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&dn[start..]);
    parts
}

/// Canonical comparison form of a DN.
///
/// Attribute types and values are lowercased and whitespace around `,` and
/// `=` is dropped. Escapes are kept verbatim, so `\,` and `\2C` still compare
/// unequal.
pub fn normalize(dn: &str) -> String {
    if dn.trim().is_empty() {
        return String::new();
    }
    split_rdns(dn)
        .into_iter()
        .map(normalize_rdn)
        .collect::<Vec<_>>()
        .join(",")
}

fn normalize_rdn(rdn: &str) -> String {
    match rdn.split_once('=') {
        Some((kind, value)) => format!(
            "{}={}",
            kind.trim().to_ascii_lowercase(),
            trim_value(value).to_lowercase()
        ),
        None => rdn.trim().to_lowercase(),
    }
}

// Only ASCII spaces are insignificant, and a trailing one is kept when escaped.
fn trim_value(value: &str) -> &str {
    let value = value.trim_start_matches(' ');
    let trimmed = value.trim_end_matches(' ');
    if trimmed.len() < value.len() && ends_with_unescaped_backslash(trimmed) {
        &value[..trimmed.len() + 1]
    } else {
        trimmed
    }
}

fn ends_with_unescaped_backslash(s: &str) -> bool {
    s.bytes().rev().take_while(|b| *b == b'\\').count() % 2 == 1
}

/// Parent of a normalized DN, `None` for a single RDN.
pub fn parent(normalized: &str) -> Option<&str> {
    let rdns = split_rdns(normalized);
    if rdns.len() < 2 {
        return None;
    }
    Some(&normalized[rdns[0].len() + 1..])
}

/// Whether `dn` equals `base` or sits anywhere below it. Both normalized.
pub fn is_descendant_or_self(dn: &str, base: &str) -> bool {
    if dn == base || base.is_empty() {
        return true;
    }
    match dn.strip_suffix(base) {
        Some(prefix) => match prefix.strip_suffix(',') {
            Some(rest) => !ends_with_unescaped_backslash(rest),
            None => false,
        },
        None => false,
    }
}

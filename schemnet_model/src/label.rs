//! Label normalisation.
//!
//! Hierarchy paths, port lookup and label DRC all operate on *corrected*
//! labels so that user-entered strings with stray whitespace or mixed case
//! compare predictably and survive HDL emission downstream.

/// Normalise a user label: trim surrounding whitespace and replace inner
/// whitespace runs and dashes with underscores.
pub fn correct_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_sep = false;
    for ch in label.trim().chars() {
        if ch.is_whitespace() || ch == '-' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.push(ch);
    }
    out
}

/// True when `label` is usable as an HDL identifier: non-empty, starts
/// with a letter, and contains only letters, digits and underscores.
pub fn is_correct_label(label: &str) -> bool {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

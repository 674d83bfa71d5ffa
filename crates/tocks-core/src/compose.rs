//! Outgoing message composition.
//!
//! The network caps a single message at a fixed number of bytes. Longer text
//! is sent as several consecutive messages, cut on UTF-8 character
//! boundaries so no part carries half a character.

use crate::error::ComposeError;

/// Largest message body the network accepts, in bytes.
pub const MAX_MESSAGE_LEN: usize = 1372;

/// Split `text` into parts of at most `max_len` bytes.
///
/// A character wider than `max_len` still goes out whole, as a part of its
/// own.
///
/// # Errors
///
/// Returns [`ComposeError::Empty`] for empty text.
pub fn split_message(text: &str, max_len: usize) -> Result<Vec<String>, ComposeError> {
    if text.is_empty() {
        return Err(ComposeError::Empty);
    }

    let mut parts = Vec::with_capacity(text.len().div_ceil(max_len.max(1)));
    let mut rest = text;
    while !rest.is_empty() {
        let mut end = max_len.min(rest.len());
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }

        let (part, tail) = rest.split_at(end);
        parts.push(part.to_string());
        rest = tail;
    }

    Ok(parts)
}

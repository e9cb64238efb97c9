use std::borrow::Cow;

#[inline]
fn substitution(c: char) -> Option<&'static str> {
    match c {
        '|' => Some("||"),
        '\'' => Some("|'"),
        '\n' => Some("|n"),
        '\r' => Some("|r"),
        ']' => Some("|]"),
        _ => None,
    }
}

/// Makes `text` safe to place between the single quotes of an attribute value.
///
/// Only protocol-reserved characters are substituted; anything else, non-ASCII
/// included, passes through. Text without reserved characters is borrowed as is.
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|c| substitution(c).is_some()) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match substitution(c) {
            Some(replacement) => escaped.push_str(replacement),
            None => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Inverse of [`escape`], as the IDE side applies it when reading a value.
///
/// A dangling or unknown escape sequence is kept verbatim.
#[cfg(test)]
pub fn unescape(text: &str) -> Cow<'_, str> {
    const ESCAPE: char = '|';
    if !text.contains(ESCAPE) {
        return Cow::Borrowed(text);
    }
    let mut plain = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != ESCAPE {
            plain.push(c);
            continue;
        }
        match chars.next() {
            Some('|') => plain.push('|'),
            Some('\'') => plain.push('\''),
            Some('n') => plain.push('\n'),
            Some('r') => plain.push('\r'),
            Some(']') => plain.push(']'),
            Some('[') => plain.push('['),
            Some(other) => {
                plain.push(ESCAPE);
                plain.push(other);
            }
            None => plain.push(ESCAPE),
        }
    }
    Cow::Owned(plain)
}

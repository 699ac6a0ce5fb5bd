//! Dot-stuffing for payload lines
//!
//! A payload line that starts with `.` is sent with one extra leading dot,
//! so the lone-dot sentinel that ends every response stays unambiguous.

use std::borrow::Cow;

/// Sentinel line terminating every response.
pub const SENTINEL: &str = ".";

/// Remove exactly one leading dot from a line starting with `..`.
///
/// Must be applied once per received payload line; applying it twice
/// strips a dot that belongs to the content.
pub fn unstuff(line: &str) -> &str {
    if line.starts_with("..") {
        &line[1..]
    } else {
        line
    }
}

/// Escape a payload line before it goes on the wire.
pub fn stuff(line: &str) -> Cow<'_, str> {
    if line.starts_with('.') {
        Cow::Owned(format!(".{}", line))
    } else {
        Cow::Borrowed(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unstuff() {
        assert_eq!(unstuff("..hidden"), ".hidden");
        assert_eq!(unstuff("..."), "..");
        assert_eq!(unstuff(".."), ".");
        assert_eq!(unstuff(".single"), ".single");
        assert_eq!(unstuff("plain"), "plain");
        assert_eq!(unstuff(""), "");
    }

    #[test]
    fn test_stuff() {
        assert_eq!(stuff("."), "..");
        assert_eq!(stuff(".profile"), "..profile");
        assert!(matches!(stuff("S:Startup-Sequence"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_unstuff_inverts_stuff() {
        let lines = ["", ".", "..", "...", ".a", "..a", "a.", "a", " .", "DATA 5", "END"];
        for line in lines {
            assert_eq!(unstuff(&stuff(line)), line, "line {:?}", line);
        }
    }

    #[test]
    fn test_stuffed_line_is_never_the_sentinel() {
        assert_ne!(stuff(SENTINEL), SENTINEL);
    }
}

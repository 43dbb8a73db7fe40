//! Low-level character-stream primitives.
//!
//! The rewriter never builds a syntax tree. Everything above this module is
//! driven by two small string-aware scans: finding the close delimiter that
//! balances an already-consumed open delimiter, and splitting an argument
//! list on top-level commas. Both treat the three JavaScript string-literal
//! styles as opaque and honor backslash escapes.

/// String-literal style the scanner is currently inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringKind {
    /// `'...'`
    Single,
    /// `"..."`
    Double,
    /// `` `...` ``
    Backtick,
}

impl StringKind {
    fn from_quote(c: char) -> Option<Self> {
        match c {
            '\'' => Some(Self::Single),
            '"' => Some(Self::Double),
            '`' => Some(Self::Backtick),
            _ => None,
        }
    }

    const fn quote(self) -> char {
        match self {
            Self::Single => '\'',
            Self::Double => '"',
            Self::Backtick => '`',
        }
    }
}

/// Find the offset one past the close delimiter balancing an open delimiter
/// that the caller has already consumed.
///
/// `after_open` is the byte offset just past the opening `open` character,
/// i.e. scanning starts at nesting depth 1. Delimiters inside string
/// literals are inert, and a backslash escapes the following character.
///
/// Unterminated input is not an error: if the text ends before the depth
/// returns to zero, `text.len()` is returned and the caller's argument-shape
/// checks reject the occurrence.
pub fn match_closing_delimiter(text: &str, after_open: usize, open: char, close: char) -> usize {
    let mut depth = 1usize;
    let mut in_string: Option<StringKind> = None;
    let mut escaped = false;

    for (i, c) in text[after_open..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        match in_string {
            Some(kind) => {
                if c == kind.quote() {
                    in_string = None;
                }
            }
            None => {
                if let Some(kind) = StringKind::from_quote(c) {
                    in_string = Some(kind);
                } else if c == open {
                    depth += 1;
                } else if c == close {
                    depth -= 1;
                    if depth == 0 {
                        return after_open + i + c.len_utf8();
                    }
                }
            }
        }
    }
    text.len()
}

/// Split an argument list on commas at nesting depth zero.
///
/// Depth is tracked across `()`, `[]` and `{}` together; commas inside any
/// bracket pair or string literal belong to the current piece. Pieces are
/// trimmed; a trailing comma or an all-whitespace tail yields no extra
/// element.
pub fn split_top_level_arguments(args_text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut in_string: Option<StringKind> = None;
    let mut escaped = false;

    for c in args_text.chars() {
        if escaped {
            escaped = false;
            current.push(c);
            continue;
        }
        if c == '\\' {
            escaped = true;
            current.push(c);
            continue;
        }
        match in_string {
            Some(kind) => {
                current.push(c);
                if c == kind.quote() {
                    in_string = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    in_string = StringKind::from_quote(c);
                    current.push(c);
                }
                '(' | '[' | '{' => {
                    depth += 1;
                    current.push(c);
                }
                ')' | ']' | '}' => {
                    depth -= 1;
                    current.push(c);
                }
                ',' if depth == 0 => {
                    pieces.push(current.trim().to_string());
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    if !current.trim().is_empty() {
        pieces.push(current.trim().to_string());
    }
    pieces
}

/// Nesting depth of `{}` at `pos` within `body`, with string literals inert.
///
/// Used by the planner to restrict constructor discovery to a class's
/// immediate body (depth zero relative to the slice start).
pub fn brace_depth_at(body: &str, pos: usize) -> i32 {
    let mut depth: i32 = 0;
    let mut in_string: Option<StringKind> = None;
    let mut escaped = false;

    for (i, c) in body.char_indices() {
        if i >= pos {
            break;
        }
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        match in_string {
            Some(kind) => {
                if c == kind.quote() {
                    in_string = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => in_string = StringKind::from_quote(c),
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            },
        }
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_simple_call() {
        let text = "f(1, 2);";
        // After `f(` at offset 2; the close paren is at 6, so one past is 7.
        assert_eq!(match_closing_delimiter(text, 2, '(', ')'), 7);
    }

    #[test]
    fn match_nested_parens() {
        let text = "f(g(h(1)), 2) tail";
        assert_eq!(match_closing_delimiter(text, 2, '(', ')'), 13);
    }

    #[test]
    fn match_paren_inside_string_is_inert() {
        let text = "f(')', 1)!";
        assert_eq!(match_closing_delimiter(text, 2, '(', ')'), 9);
        let text = "f(') extra', 1) tail";
        assert_eq!(match_closing_delimiter(text, 2, '(', ')'), 15);
    }

    #[test]
    fn match_escaped_quote_does_not_end_string() {
        let text = r"f('it\'s)', 1) tail";
        assert_eq!(match_closing_delimiter(text, 2, '(', ')'), 14);
    }

    #[test]
    fn match_backtick_string() {
        let text = "f(`a)b`, 1)!";
        assert_eq!(match_closing_delimiter(text, 2, '(', ')'), 11);
    }

    #[test]
    fn match_unterminated_returns_len() {
        let text = "f(1, 2";
        assert_eq!(match_closing_delimiter(text, 2, '(', ')'), text.len());
    }

    #[test]
    fn split_plain_arguments() {
        assert_eq!(split_top_level_arguments("1, 'two', three"), vec!["1", "'two'", "three"]);
    }

    #[test]
    fn split_respects_nested_brackets() {
        assert_eq!(
            split_top_level_arguments("[1, 2], {a: 1, b: 2}, f(3, 4)"),
            vec!["[1, 2]", "{a: 1, b: 2}", "f(3, 4)"]
        );
    }

    #[test]
    fn split_respects_strings() {
        assert_eq!(
            split_top_level_arguments(r#"'a, b', "c, d", `e, f`"#),
            vec!["'a, b'", r#""c, d""#, "`e, f`"]
        );
    }

    #[test]
    fn split_escaped_quote_inside_string() {
        assert_eq!(
            split_top_level_arguments(r"'don\'t, stop', 1"),
            vec![r"'don\'t, stop'", "1"]
        );
    }

    #[test]
    fn split_trailing_comma_yields_no_empty_piece() {
        assert_eq!(split_top_level_arguments("1, 2,"), vec!["1", "2"]);
        assert_eq!(split_top_level_arguments(""), Vec::<String>::new());
        assert_eq!(split_top_level_arguments("   "), Vec::<String>::new());
    }

    #[test]
    fn split_arrow_function_argument() {
        assert_eq!(
            split_top_level_arguments("'John', 'name', {serialize: (v) => JSON.stringify(v)}"),
            vec!["'John'", "'name'", "{serialize: (v) => JSON.stringify(v)}"]
        );
    }

    #[test]
    fn brace_depth_counts_unclosed_braces() {
        let body = "a { b { c } d ";
        assert_eq!(brace_depth_at(body, 0), 0);
        assert_eq!(brace_depth_at(body, 4), 1);
        assert_eq!(brace_depth_at(body, 8), 2);
        assert_eq!(brace_depth_at(body, body.len()), 1);
    }

    #[test]
    fn brace_depth_ignores_braces_in_strings() {
        let body = "'{{{' x";
        assert_eq!(brace_depth_at(body, body.len()), 0);
    }
}

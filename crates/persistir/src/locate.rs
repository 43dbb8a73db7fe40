//! Locating `$persist` call sites in raw source text.
//!
//! The locator is a lexical scan, not a parse: every `$persist(` occurrence
//! is a candidate, its argument list is resolved with the delimiter scanner,
//! and the enclosing binding (plain variable vs. class field) is inferred by
//! looking backward from the occurrence. Candidates that do not resolve are
//! skipped silently; partial rewriting beats failing the whole file.
//!
//! Known limitation: occurrences of the marker inside comments or string
//! literals are not excluded and can misfire on pathological input.

use crate::scan::{match_closing_delimiter, split_top_level_arguments};
use regex::Regex;
use tracing::trace;

/// The call token this engine searches for and rewrites.
pub const MARKER: &str = "$persist";

/// Expression text carried when the third argument is omitted.
pub const ABSENT_OPTIONS: &str = "undefined";

/// One located `$persist` invocation.
///
/// `start..end` is the half-open byte span of the entire invocation in the
/// original text, `end` pointing just past the closing parenthesis. The
/// argument expressions are raw substrings of the input, re-emitted verbatim
/// and never re-parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Byte offset of the `$` of the marker token.
    pub start: usize,
    /// Byte offset one past the closing `)`.
    pub end: usize,
    /// Identifier the rewritten expression is assigned to.
    pub binding_name: String,
    /// Argument 1: the fallback value.
    pub initial_expr: String,
    /// Argument 2: the persistence key (an expression, not necessarily a literal).
    pub key_expr: String,
    /// Argument 3, or [`ABSENT_OPTIONS`] when omitted.
    pub options_expr: String,
    /// Whether the invocation initializes a class field.
    pub is_field_binding: bool,
}

/// Class header context owning a field binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassContext {
    /// Name from the `class <Name>` header.
    pub name: String,
    /// Base expression when the header declares `extends`. An arbitrary
    /// expression (`Ns.Base`, `mixin(X)`), not necessarily an identifier.
    pub extends: Option<String>,
}

/// Find every resolvable `$persist` call site, in order of appearance.
///
/// An occurrence is skipped (not an error) when it supplies fewer than two
/// top-level arguments or when no `[let|const|var] IDENT =` immediately
/// precedes it. Duplicate binding names or keys are legal here; collisions
/// are a caller concern.
pub fn find_call_sites(content: &str) -> Vec<CallSite> {
    let marker_call = Regex::new(r"\$persist\s*\(").unwrap();
    let mut sites = Vec::new();

    for m in marker_call.find_iter(content) {
        let call_start = m.start();
        let args_start = m.end();
        let args_end = match_closing_delimiter(content, args_start, '(', ')');
        let args_text = if args_end > args_start {
            content.get(args_start..args_end - 1).unwrap_or("")
        } else {
            ""
        };

        let args = split_top_level_arguments(args_text);
        if args.len() < 2 {
            trace!(offset = call_start, "skipping occurrence with fewer than two arguments");
            continue;
        }

        let prefix = &content[..call_start];
        let Some(binding_name) = resolve_binding_name(prefix) else {
            trace!(offset = call_start, "skipping occurrence with no preceding binding");
            continue;
        };
        let is_field_binding = enclosing_class(prefix).is_some();

        let mut args = args.into_iter();
        let initial_expr = args.next().unwrap_or_default();
        let key_expr = args.next().unwrap_or_default();
        let options_expr = args.next().unwrap_or_else(|| ABSENT_OPTIONS.to_string());

        sites.push(CallSite {
            start: call_start,
            end: args_end,
            binding_name,
            initial_expr,
            key_expr,
            options_expr,
            is_field_binding,
        });
    }
    sites
}

/// Resolve the identifier assigned by the text immediately preceding a call.
///
/// Matches `[let|const|var] IDENT =` with only whitespace between the `=`
/// and the invocation; anything else means the occurrence is not a
/// recognizable initializer and is skipped.
fn resolve_binding_name(prefix: &str) -> Option<String> {
    let binding_assign = Regex::new(r"(?:(?:let|const|var)\s+)?(\w+)\s*=\s*$").unwrap();
    binding_assign.captures(prefix).map(|c| c[1].to_string())
}

/// Resolve the innermost class whose body is still open at the end of
/// `prefix`, if any.
///
/// The prefix is scanned with the same string-aware state machine as the
/// delimiter scanner, keeping a stack of open braces annotated with whether
/// the brace opened a `class <Name> [extends <Base>] {` header. No unclosed
/// class frame means the call site is a plain variable initializer.
pub fn enclosing_class(prefix: &str) -> Option<ClassContext> {
    let header_tail = Regex::new(r"class\s+(\w+)\b([^{]*)$").unwrap();

    let mut stack: Vec<Option<ClassContext>> = Vec::new();
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for (i, c) in prefix.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        match in_string {
            Some(quote) => {
                if c == quote {
                    in_string = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => in_string = Some(c),
                '{' => stack.push(class_header_before(prefix, i, &header_tail)),
                '}' => {
                    stack.pop();
                }
                _ => {}
            },
        }
    }
    stack.into_iter().rev().flatten().next()
}

/// Match a class header ending just before the open brace at `brace_pos`.
///
/// The lookbehind window is bounded; class headers longer than the window
/// are not recognized, which degrades to "not a field binding".
fn class_header_before(text: &str, brace_pos: usize, header_tail: &Regex) -> Option<ClassContext> {
    const WINDOW: usize = 256;
    let mut window_start = brace_pos.saturating_sub(WINDOW);
    while !text.is_char_boundary(window_start) {
        window_start -= 1;
    }
    let caps = header_tail.captures(&text[window_start..brace_pos])?;
    Some(ClassContext {
        name: caps[1].to_string(),
        extends: extends_clause(&caps[2]),
    })
}

/// Parse the base expression out of a class-header tail (the text between
/// the class name and the body brace). Anything after the `extends` keyword
/// counts as the base; clauses without one (`<T>` generics and the like)
/// yield `None`.
pub(crate) fn extends_clause(tail: &str) -> Option<String> {
    let clause = Regex::new(r"\bextends\s+(\S.*?)\s*$").unwrap();
    clause.captures(tail).map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_variable_call_site() {
        let content = "let name = $persist('John', 'name');";
        let sites = find_call_sites(content);
        assert_eq!(sites.len(), 1);
        let site = &sites[0];
        assert_eq!(&content[site.start..site.end], "$persist('John', 'name')");
        assert_eq!(site.binding_name, "name");
        assert_eq!(site.initial_expr, "'John'");
        assert_eq!(site.key_expr, "'name'");
        assert_eq!(site.options_expr, ABSENT_OPTIONS);
        assert!(!site.is_field_binding);
    }

    #[test]
    fn locates_options_argument_verbatim() {
        let content = "const n = $persist(0, 'k', {serialize: (v) => JSON.stringify(v)});";
        let sites = find_call_sites(content);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].options_expr, "{serialize: (v) => JSON.stringify(v)}");
    }

    #[test]
    fn skips_single_argument_call() {
        let sites = find_call_sites("let x = $persist('only');");
        assert!(sites.is_empty());
    }

    #[test]
    fn skips_call_without_binding() {
        let sites = find_call_sites("doSomething($persist('a', 'b'));");
        assert!(sites.is_empty());
    }

    #[test]
    fn skips_unterminated_call() {
        let sites = find_call_sites("let x = $persist('a'");
        assert!(sites.is_empty());
    }

    #[test]
    fn marker_with_space_before_paren() {
        let sites = find_call_sites("let x = $persist ('a', 'b');");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].binding_name, "x");
    }

    #[test]
    fn classifies_field_binding() {
        let content = "class Test { name = $persist('John', 'name'); }";
        let sites = find_call_sites(content);
        assert_eq!(sites.len(), 1);
        assert!(sites[0].is_field_binding);
    }

    #[test]
    fn variable_after_closed_class_is_not_a_field() {
        let content = "class Done { x = 1; }\nlet name = $persist('John', 'name');";
        let sites = find_call_sites(content);
        assert_eq!(sites.len(), 1);
        assert!(!sites[0].is_field_binding);
    }

    #[test]
    fn enclosing_class_resolves_innermost_open_class() {
        let prefix = "class Outer { method() { ";
        let ctx = enclosing_class(prefix).unwrap();
        assert_eq!(ctx.name, "Outer");
        assert_eq!(ctx.extends, None);
    }

    #[test]
    fn enclosing_class_sees_extends() {
        let ctx = enclosing_class("class Test extends Base { name = ").unwrap();
        assert_eq!(ctx.name, "Test");
        assert_eq!(ctx.extends.as_deref(), Some("Base"));
    }

    #[test]
    fn enclosing_class_sees_dotted_base() {
        let ctx = enclosing_class("class Test extends Ns.Base { name = ").unwrap();
        assert_eq!(ctx.name, "Test");
        assert_eq!(ctx.extends.as_deref(), Some("Ns.Base"));
    }

    #[test]
    fn enclosing_class_sees_expression_base() {
        let ctx = enclosing_class("class Test extends mixin(X) { name = ").unwrap();
        assert_eq!(ctx.name, "Test");
        assert_eq!(ctx.extends.as_deref(), Some("mixin(X)"));
    }

    #[test]
    fn enclosing_class_generic_header_has_no_base() {
        let ctx = enclosing_class("class Box<T> { v = ").unwrap();
        assert_eq!(ctx.name, "Box");
        assert_eq!(ctx.extends, None);
    }

    #[test]
    fn dotted_base_field_is_classified_as_field() {
        let content = "class Test extends Ns.Base { name = $persist('John', 'name'); }";
        let sites = find_call_sites(content);
        assert_eq!(sites.len(), 1);
        assert!(sites[0].is_field_binding);
    }

    #[test]
    fn enclosing_class_none_for_plain_block() {
        assert_eq!(enclosing_class("function f() { let x = "), None);
        assert_eq!(enclosing_class("let x = "), None);
    }

    #[test]
    fn enclosing_class_ignores_brace_noise_in_strings() {
        let prefix = "class T { a = '}'; b = ";
        let ctx = enclosing_class(prefix).unwrap();
        assert_eq!(ctx.name, "T");
    }

    #[test]
    fn binding_name_with_declaration_keywords() {
        assert_eq!(resolve_binding_name("let a = ").as_deref(), Some("a"));
        assert_eq!(resolve_binding_name("const b = ").as_deref(), Some("b"));
        assert_eq!(resolve_binding_name("var c=").as_deref(), Some("c"));
        assert_eq!(resolve_binding_name("field = ").as_deref(), Some("field"));
        assert_eq!(resolve_binding_name("f(").as_deref(), None);
    }

    #[test]
    fn two_sites_in_order_of_appearance() {
        let content = "let a = $persist(1, 'a');\nlet b = $persist(2, 'b');";
        let sites = find_call_sites(content);
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].binding_name, "a");
        assert_eq!(sites[1].binding_name, "b");
        assert!(sites[0].end <= sites[1].start);
    }
}

//! The per-file transform: locate, plan, edit, emit.
//!
//! A `$persist(initial, key, options?)` initializer becomes
//!
//! ```text
//! $state(__persist.load(key, options) ?? initial)
//! ```
//!
//! with a namespace import of the persistence runtime prepended and, per
//! binding, an effect that re-saves the reactive value on change, wrapped in
//! an `$effect.root` scope. Variable effects are appended after the
//! document; field effects run in the owning class's constructor, which is
//! synthesized when missing. The engine only emits these call shapes; it
//! never executes or type-checks the runtime they name.

use crate::edit::SourceEditor;
use crate::error::Result;
use crate::locate::{find_call_sites, CallSite, MARKER};
use crate::plan::{plan_rewrite, ClassAnchor};
use crate::sourcemap::SourceMap;
use regex::Regex;
use tracing::debug;

/// Import line prepended to every rewritten file.
pub const IMPORT_STATEMENT: &str = "import * as __persist from \"svelte-persistent-runes\";\n";

/// Display name used for map attribution when the caller supplies none.
pub const DEFAULT_FILENAME: &str = "unknown.js";

/// A rewritten file: generated code plus its position map.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    /// The rewritten source text.
    pub code: String,
    /// Map from generated positions back to the original input.
    pub map: SourceMap,
}

/// Rewrite every resolvable `$persist` call site in `content`.
///
/// Returns `Ok(None)` when the marker token is absent or no occurrence
/// resolves to a valid call site; in that case nothing is touched, not even
/// the import.
///
/// # Errors
///
/// Fails only if the computed edit plan violates the editor's span
/// invariants, which would be a bug in this engine rather than bad input.
pub fn transform(content: &str, filename: &str) -> Result<Option<Transformed>> {
    if !content.contains(MARKER) {
        return Ok(None);
    }

    let sites = find_call_sites(content);
    if sites.is_empty() {
        return Ok(None);
    }
    debug!(file = filename, sites = sites.len(), "rewriting persist call sites");

    let plan = plan_rewrite(content, sites);
    let mut editor = SourceEditor::new(content);

    editor.prepend(IMPORT_STATEMENT);

    for site in &plan.sites {
        editor.overwrite(site.start, site.end, state_wrapper(site));
    }

    if !plan.var_sites.is_empty() {
        let effects: Vec<String> =
            plan.var_sites.iter().map(|site| save_effect(site, false)).collect();
        editor.append(&format!("\n{}\n", effect_root_block(&effects)));
    }

    for class_plan in &plan.class_plans {
        let effects: Vec<String> =
            class_plan.sites.iter().map(|site| save_effect(site, true)).collect();
        let block = effect_root_block(&effects);
        match class_plan.anchor {
            ClassAnchor::ExistingConstructor { insert_at } => {
                editor.append_left(insert_at, format!("\n{block}\n"));
            }
            ClassAnchor::Synthesize { insert_at, extends_base } => {
                editor.append_left(insert_at, synthesized_constructor(&block, extends_base));
            }
        }
    }

    let (code, map) = editor.render(filename)?;
    Ok(Some(Transformed { code, map }))
}

/// `$state(__persist.load(key, options) ?? initial)`
fn state_wrapper(site: &CallSite) -> String {
    format!(
        "$state(__persist.load({}, {}) ?? {})",
        site.key_expr, site.options_expr, site.initial_expr
    )
}

/// One save effect; field bindings snapshot through `this`.
fn save_effect(site: &CallSite, this_qualified: bool) -> String {
    let target = if this_qualified {
        format!("this.{}", site.binding_name)
    } else {
        site.binding_name.clone()
    };
    format!(
        "$effect(() => __persist.save({}, $state.snapshot({}), {}));",
        site.key_expr, target, site.options_expr
    )
}

/// Wrap save effects in one deterministically lifecycled root scope.
fn effect_root_block(effects: &[String]) -> String {
    format!("$effect.root(() => {{\n{}\n}});", effects.join("\n"))
}

/// A constructor holding `block`, forwarding to the base class when one is
/// declared.
fn synthesized_constructor(block: &str, extends_base: bool) -> String {
    let (params, super_call) = if extends_base {
        ("...args: any[]", "super(...args);\n")
    } else {
        ("", "")
    };
    format!("\nconstructor({params}) {{\n{super_call}{block}\n}}\n")
}

/// The script-preprocessor face of the engine.
///
/// Mirrors the host pipeline's per-file contract: hand in content and an
/// optional display name, get back code plus a map exactly when the code
/// changed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Preprocessor;

/// Output of [`Preprocessor::script`].
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    /// Rewritten code, or the input unchanged.
    pub code: String,
    /// Present exactly when `code` differs from the input.
    pub map: Option<SourceMap>,
}

impl Preprocessor {
    /// Create the preprocessor.
    pub fn new() -> Self {
        Self
    }

    /// Transform one script, defaulting the display name to
    /// [`DEFAULT_FILENAME`].
    ///
    /// # Errors
    ///
    /// Propagates editor invariant violations; see [`transform`].
    pub fn script(&self, content: &str, filename: Option<&str>) -> Result<Processed> {
        let filename = filename.unwrap_or(DEFAULT_FILENAME);
        match transform(content, filename)? {
            Some(t) => Ok(Processed { code: t.code, map: Some(t.map) }),
            None => Ok(Processed { code: content.to_string(), map: None }),
        }
    }
}

/// Whether a bundler module id names a Svelte module script
/// (`*.svelte.js`, `*.svelte.ts`, and their `c`/`m` variants).
pub fn is_persist_module_id(id: &str) -> bool {
    Regex::new(r"\.svelte\.(c|m)?[jt]s$").unwrap().is_match(id)
}

/// Bundler-plugin entry point: rewrite `src` when `id` qualifies.
///
/// Returns `Ok(None)` for non-qualifying ids or unchanged content, matching
/// the convention that a plugin returning nothing leaves the module alone.
///
/// # Errors
///
/// Propagates editor invariant violations; see [`transform`].
pub fn rewrite_module(src: &str, id: &str) -> Result<Option<Transformed>> {
    if !is_persist_module_id(id) {
        return Ok(None);
    }
    transform(src, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_marker_no_change() {
        assert_eq!(transform("let name = $state('John');", "t.js").unwrap(), None);
    }

    #[test]
    fn marker_without_valid_site_no_change() {
        // Single argument: unrecognized, so not even the import is added.
        assert_eq!(transform("let x = $persist('only');", "t.js").unwrap(), None);
    }

    #[test]
    fn state_wrapper_shape() {
        let site = CallSite {
            start: 0,
            end: 0,
            binding_name: "name".into(),
            initial_expr: "'John'".into(),
            key_expr: "'name'".into(),
            options_expr: "undefined".into(),
            is_field_binding: false,
        };
        assert_eq!(
            state_wrapper(&site),
            "$state(__persist.load('name', undefined) ?? 'John')"
        );
        assert_eq!(
            save_effect(&site, false),
            "$effect(() => __persist.save('name', $state.snapshot(name), undefined));"
        );
        assert_eq!(
            save_effect(&site, true),
            "$effect(() => __persist.save('name', $state.snapshot(this.name), undefined));"
        );
    }

    #[test]
    fn synthesized_constructor_shapes() {
        assert_eq!(synthesized_constructor("B", false), "\nconstructor() {\nB\n}\n");
        assert_eq!(
            synthesized_constructor("B", true),
            "\nconstructor(...args: any[]) {\nsuper(...args);\nB\n}\n"
        );
    }

    #[test]
    fn module_id_filter() {
        assert!(is_persist_module_id("store.svelte.js"));
        assert!(is_persist_module_id("store.svelte.ts"));
        assert!(is_persist_module_id("store.svelte.mjs"));
        assert!(is_persist_module_id("store.svelte.cts"));
        assert!(!is_persist_module_id("store.svelte"));
        assert!(!is_persist_module_id("store.js"));
        assert!(!is_persist_module_id("store.svelte.jsx"));
    }

    #[test]
    fn rewrite_module_skips_non_matching_id() {
        let src = "let name = $persist('John', 'name');";
        assert_eq!(rewrite_module(src, "plain.js").unwrap(), None);
        assert!(rewrite_module(src, "store.svelte.js").unwrap().is_some());
    }
}

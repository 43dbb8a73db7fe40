//! Grouping call sites and choosing where effect blocks anchor.
//!
//! Bare variable sites share one combined block appended after the document.
//! Field sites are grouped by owning class, and each group anchors its block
//! either inside an existing constructor or inside a constructor the emitter
//! will synthesize. Groups whose class header cannot be re-matched are
//! dropped from effect registration; their call-site replacements still
//! apply.

use crate::locate::{enclosing_class, CallSite};
use crate::scan::{brace_depth_at, match_closing_delimiter};
use regex::Regex;
use tracing::{debug, trace};

/// Where a class group's effect-registration block lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassAnchor {
    /// Insert as the first statement of an existing constructor;
    /// `insert_at` is the offset just past the constructor body's `{`.
    ExistingConstructor {
        /// Insertion offset in original coordinates.
        insert_at: usize,
    },
    /// Synthesize a constructor just past the class body's `{`.
    Synthesize {
        /// Insertion offset in original coordinates.
        insert_at: usize,
        /// Whether the synthesized constructor must forward to a base class.
        extends_base: bool,
    },
}

/// All field call sites owned by one class, plus their anchor.
#[derive(Debug, Clone)]
pub struct ClassPlan {
    /// Name from the class header.
    pub class_name: String,
    /// Field sites in order of appearance.
    pub sites: Vec<CallSite>,
    /// Where the effect block goes.
    pub anchor: ClassAnchor,
}

/// The complete plan for one transform pass.
#[derive(Debug, Clone)]
pub struct RewritePlan {
    /// Every located site, in appearance order; all get their span replaced.
    pub sites: Vec<CallSite>,
    /// The non-field subset, sharing one appended block.
    pub var_sites: Vec<CallSite>,
    /// Per-class groups with resolved anchors, in first-seen class order.
    pub class_plans: Vec<ClassPlan>,
}

/// Group located sites and resolve per-class anchors.
pub fn plan_rewrite(content: &str, sites: Vec<CallSite>) -> RewritePlan {
    let mut var_sites = Vec::new();
    let mut groups: Vec<(String, Vec<CallSite>)> = Vec::new();

    for site in &sites {
        if site.is_field_binding {
            match enclosing_class(&content[..site.start]) {
                Some(ctx) => {
                    if let Some((_, group)) = groups.iter_mut().find(|(name, _)| *name == ctx.name)
                    {
                        group.push(site.clone());
                    } else {
                        groups.push((ctx.name, vec![site.clone()]));
                    }
                }
                None => {
                    trace!(offset = site.start, "dropping field site with unresolvable class");
                }
            }
        } else {
            var_sites.push(site.clone());
        }
    }

    let class_plans = groups
        .into_iter()
        .filter_map(|(class_name, group_sites)| {
            let anchor = find_class_anchor(content, &class_name);
            if anchor.is_none() {
                trace!(class = %class_name, "dropping group whose class header did not re-match");
            }
            anchor.map(|anchor| ClassPlan { class_name, sites: group_sites, anchor })
        })
        .collect::<Vec<_>>();

    debug!(
        vars = var_sites.len(),
        classes = class_plans.len(),
        "planned rewrite"
    );
    RewritePlan { sites, var_sites, class_plans }
}

/// Re-match a class header by name and decide the group's anchor.
///
/// The class body is searched for a `constructor (...) {` signature at the
/// body's immediate depth only; a constructor of a nested class expression
/// does not count.
fn find_class_anchor(content: &str, class_name: &str) -> Option<ClassAnchor> {
    let header = Regex::new(&format!(
        r"class\s+{}\b([^{{]*)\{{",
        regex::escape(class_name)
    ))
    .unwrap();
    let caps = header.captures(content)?;
    let body_start = caps.get(0).unwrap().end();
    let extends_base = crate::locate::extends_clause(&caps[1]).is_some();

    let body_end = match_closing_delimiter(content, body_start, '{', '}');
    let body = content
        .get(body_start..body_end.saturating_sub(1).max(body_start))
        .unwrap_or("");

    let ctor = Regex::new(r"constructor\s*\([^)]*\)\s*\{").unwrap();
    for m in ctor.find_iter(body) {
        if brace_depth_at(body, m.start()) == 0 {
            return Some(ClassAnchor::ExistingConstructor { insert_at: body_start + m.end() });
        }
    }
    Some(ClassAnchor::Synthesize { insert_at: body_start, extends_base })
}

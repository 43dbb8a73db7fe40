//! Offset-addressed text editing over an immutable source buffer.
//!
//! [`SourceEditor`] is the magic-string half of the engine: all edits are
//! expressed in *original* byte offsets, collected first, and materialized
//! once by [`SourceEditor::render`]. Offsets therefore never shift as edits
//! accumulate, and replacements compose safely with point insertions.
//!
//! Rendering also produces the position map: retained original text gets one
//! mapping segment per character (high-resolution), and each replaced span
//! gets a single segment pointing at the span's original start. Inserted
//! text (import line, effect blocks, synthesized constructors) has no
//! original counterpart and maps to nothing.

use crate::error::{PersistirError, Result};
use crate::sourcemap::{MappingsBuilder, SourceMap};

/// A span replacement expressed in original coordinates.
#[derive(Debug, Clone)]
struct Replacement {
    start: usize,
    end: usize,
    content: String,
}

/// Collects edits against one immutable source buffer.
#[derive(Debug)]
pub struct SourceEditor<'a> {
    source: &'a str,
    intro: String,
    outro: String,
    inserts: Vec<(usize, String)>,
    replacements: Vec<Replacement>,
}

impl<'a> SourceEditor<'a> {
    /// Create an editor over `source` with no pending edits.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            intro: String::new(),
            outro: String::new(),
            inserts: Vec::new(),
            replacements: Vec::new(),
        }
    }

    /// Insert `content` before everything emitted so far at the document
    /// start. Repeated calls stack outermost-first.
    pub fn prepend(&mut self, content: &str) {
        self.intro.insert_str(0, content);
    }

    /// Insert `content` after the end of the document.
    pub fn append(&mut self, content: &str) {
        self.outro.push_str(content);
    }

    /// Replace the half-open span `[start, end)` with `content`.
    ///
    /// Spans are validated when the edits are materialized, not here.
    pub fn overwrite(&mut self, start: usize, end: usize, content: String) {
        self.replacements.push(Replacement { start, end, content });
    }

    /// Insert `content` at `pos`, attaching to the text on its left: the
    /// insertion lands after any replacement ending at `pos` and before one
    /// starting at `pos`. Repeated insertions at one point keep call order.
    pub fn append_left(&mut self, pos: usize, content: String) {
        self.inserts.push((pos, content));
    }

    /// Materialize all queued edits into the rewritten text and its map.
    ///
    /// # Errors
    ///
    /// Fails only on a broken edit plan: a span outside the buffer, an
    /// offset off a character boundary, partially overlapping replacements,
    /// or an insertion point strictly inside a replaced span.
    pub fn render(&self, file_name: &str) -> Result<(String, SourceMap)> {
        let replacements = self.validated_replacements()?;
        let inserts = self.validated_inserts(&replacements)?;

        let mut out = Emit::default();
        out.plain(&self.intro);

        let mut orig_line = 0usize;
        let mut orig_col = 0usize;
        let mut pos = 0usize;

        let mut inserts = inserts.into_iter().peekable();
        for rep in &replacements {
            // Verbatim text (and any point insertions) up to this span.
            while let Some((ipos, _)) = inserts.peek() {
                if *ipos > rep.start {
                    break;
                }
                let (ipos, content) = inserts.next().unwrap();
                out.original(&self.source[pos..ipos], &mut orig_line, &mut orig_col);
                pos = ipos;
                out.plain(content);
            }
            out.original(&self.source[pos..rep.start], &mut orig_line, &mut orig_col);

            // One segment for the edited chunk, at its original start.
            out.map.add_segment(out.gen_line, out.gen_col, orig_line, orig_col);
            out.plain(&rep.content);
            advance_over(&self.source[rep.start..rep.end], &mut orig_line, &mut orig_col);
            pos = rep.end;
        }
        for (ipos, content) in inserts {
            out.original(&self.source[pos..ipos], &mut orig_line, &mut orig_col);
            pos = ipos;
            out.plain(content);
        }
        out.original(&self.source[pos..], &mut orig_line, &mut orig_col);
        out.plain(&self.outro);

        let map = SourceMap {
            version: 3,
            file: file_name.to_string(),
            sources: vec![file_name.to_string()],
            sources_content: vec![self.source.to_string()],
            names: Vec::new(),
            mappings: out.map.encode(),
        };
        Ok((out.code, map))
    }

    fn validated_replacements(&self) -> Result<Vec<Replacement>> {
        let len = self.source.len();
        let mut replacements = self.replacements.clone();
        replacements.sort_by_key(|r| r.start);

        for rep in &replacements {
            if rep.start >= rep.end || rep.end > len {
                return Err(PersistirError::SpanOutOfBounds { start: rep.start, end: rep.end, len });
            }
            for offset in [rep.start, rep.end] {
                if !self.source.is_char_boundary(offset) {
                    return Err(PersistirError::NotCharBoundary { offset });
                }
            }
        }
        for pair in replacements.windows(2) {
            if pair[0].end > pair[1].start {
                return Err(PersistirError::OverlappingEdits {
                    first_start: pair[0].start,
                    first_end: pair[0].end,
                    second_start: pair[1].start,
                    second_end: pair[1].end,
                });
            }
        }
        Ok(replacements)
    }

    fn validated_inserts(&self, replacements: &[Replacement]) -> Result<Vec<(usize, &str)>> {
        let len = self.source.len();
        let mut inserts: Vec<(usize, &str)> = self
            .inserts
            .iter()
            .map(|(pos, content)| (*pos, content.as_str()))
            .collect();
        inserts.sort_by_key(|(pos, _)| *pos);

        for &(pos, _) in &inserts {
            if pos > len {
                return Err(PersistirError::SpanOutOfBounds { start: pos, end: pos, len });
            }
            if !self.source.is_char_boundary(pos) {
                return Err(PersistirError::NotCharBoundary { offset: pos });
            }
            if let Some(rep) = replacements.iter().find(|r| r.start < pos && pos < r.end) {
                return Err(PersistirError::OverlappingEdits {
                    first_start: rep.start,
                    first_end: rep.end,
                    second_start: pos,
                    second_end: pos,
                });
            }
        }
        Ok(inserts)
    }
}

/// Output accumulator: generated text plus generated-position tracking.
#[derive(Debug, Default)]
struct Emit {
    code: String,
    map: MappingsBuilder,
    gen_line: usize,
    gen_col: usize,
}

impl Emit {
    /// Emit text with no original counterpart; no segments are recorded.
    fn plain(&mut self, text: &str) {
        for c in text.chars() {
            self.code.push(c);
            if c == '\n' {
                self.gen_line += 1;
                self.gen_col = 0;
            } else {
                self.gen_col += 1;
            }
        }
    }

    /// Emit retained original text with one segment per character.
    fn original(&mut self, text: &str, orig_line: &mut usize, orig_col: &mut usize) {
        for c in text.chars() {
            self.map.add_segment(self.gen_line, self.gen_col, *orig_line, *orig_col);
            self.code.push(c);
            if c == '\n' {
                self.gen_line += 1;
                self.gen_col = 0;
                *orig_line += 1;
                *orig_col = 0;
            } else {
                self.gen_col += 1;
                *orig_col += 1;
            }
        }
    }
}

/// Advance original (line, col) counters across skipped (replaced) text.
fn advance_over(text: &str, orig_line: &mut usize, orig_col: &mut usize) {
    for c in text.chars() {
        if c == '\n' {
            *orig_line += 1;
            *orig_col = 0;
        } else {
            *orig_col += 1;
        }
    }
}

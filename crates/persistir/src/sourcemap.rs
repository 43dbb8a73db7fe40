//! Source map v3 rendering.
//!
//! The editor reports every edit as position correspondences between the
//! rewritten text and the original. This module holds the JSON shape
//! (version 3, camelCase field names) and the base64 VLQ `mappings`
//! encoding: segments within a line are comma-separated, lines are
//! semicolon-separated, and all fields after the first segment are deltas.
//!
//! `sources_content` always carries the full original text so the map is
//! reversible to the input, not just point-sampled.

use serde::{Deserialize, Serialize};

const BASE64_CHARS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// A standard source map (format version 3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    /// Always 3.
    pub version: u32,
    /// Display name of the generated file.
    pub file: String,
    /// Original source names; this engine emits exactly one.
    pub sources: Vec<String>,
    /// Full original text per source.
    pub sources_content: Vec<String>,
    /// Symbol names referenced by segments; unused here.
    pub names: Vec<String>,
    /// Base64 VLQ encoded position correspondences.
    pub mappings: String,
}

impl SourceMap {
    /// Serialize to the JSON form consumed by bundlers.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// One decoded mapping segment (absolute values, 0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Column in the generated line.
    pub gen_col: u32,
    /// Index into `sources`.
    pub source: u32,
    /// Line in the original source.
    pub orig_line: u32,
    /// Column in the original line.
    pub orig_col: u32,
}

/// Accumulates segments line by line and encodes them once at the end.
#[derive(Debug, Default)]
pub struct MappingsBuilder {
    lines: Vec<Vec<Segment>>,
}

impl MappingsBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a correspondence from generated (line, col) to original
    /// (line, col), all 0-based. Lines may be pushed in any column order but
    /// must be added in nondecreasing line order.
    pub fn add_segment(&mut self, gen_line: usize, gen_col: usize, orig_line: usize, orig_col: usize) {
        while self.lines.len() <= gen_line {
            self.lines.push(Vec::new());
        }
        self.lines[gen_line].push(Segment {
            gen_col: gen_col as u32,
            source: 0,
            orig_line: orig_line as u32,
            orig_col: orig_col as u32,
        });
    }

    /// Encode all recorded segments into the v3 `mappings` string.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        let mut prev_source: i64 = 0;
        let mut prev_orig_line: i64 = 0;
        let mut prev_orig_col: i64 = 0;

        for (line_idx, line) in self.lines.iter().enumerate() {
            if line_idx > 0 {
                out.push(';');
            }
            let mut prev_gen_col: i64 = 0;
            for (seg_idx, seg) in line.iter().enumerate() {
                if seg_idx > 0 {
                    out.push(',');
                }
                encode_vlq(i64::from(seg.gen_col) - prev_gen_col, &mut out);
                encode_vlq(i64::from(seg.source) - prev_source, &mut out);
                encode_vlq(i64::from(seg.orig_line) - prev_orig_line, &mut out);
                encode_vlq(i64::from(seg.orig_col) - prev_orig_col, &mut out);
                prev_gen_col = i64::from(seg.gen_col);
                prev_source = i64::from(seg.source);
                prev_orig_line = i64::from(seg.orig_line);
                prev_orig_col = i64::from(seg.orig_col);
            }
        }
        out
    }
}

/// Encode one signed value as base64 VLQ.
fn encode_vlq(value: i64, out: &mut String) {
    // Sign bit goes in the lowest bit of the first digit.
    let mut vlq: u64 = if value < 0 {
        (((-value) as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (vlq & 0b11111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64_CHARS[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Decode a v3 `mappings` string back into absolute segments per line.
///
/// Partial segments (fewer than four fields) are ignored; this engine never
/// emits them, but decoding stays lenient for round-trip testing against
/// maps produced elsewhere.
pub fn decode_mappings(mappings: &str) -> Vec<Vec<Segment>> {
    let mut lines = Vec::new();
    let mut source: i64 = 0;
    let mut orig_line: i64 = 0;
    let mut orig_col: i64 = 0;

    for line_text in mappings.split(';') {
        let mut line = Vec::new();
        let mut gen_col: i64 = 0;
        for seg_text in line_text.split(',') {
            if seg_text.is_empty() {
                continue;
            }
            let fields = decode_vlq_run(seg_text);
            if fields.len() < 4 {
                continue;
            }
            gen_col += fields[0];
            source += fields[1];
            orig_line += fields[2];
            orig_col += fields[3];
            line.push(Segment {
                gen_col: gen_col as u32,
                source: source as u32,
                orig_line: orig_line as u32,
                orig_col: orig_col as u32,
            });
        }
        lines.push(line);
    }
    lines
}

fn decode_vlq_run(text: &str) -> Vec<i64> {
    let mut values = Vec::new();
    let mut shift = 0u32;
    let mut acc: u64 = 0;
    for c in text.bytes() {
        let Some(digit) = BASE64_CHARS.iter().position(|&b| b == c) else {
            break;
        };
        let digit = digit as u64;
        acc |= (digit & 0b11111) << shift;
        if digit & 0b100000 != 0 {
            shift += 5;
        } else {
            let value = if acc & 1 == 1 {
                -((acc >> 1) as i64)
            } else {
                (acc >> 1) as i64
            };
            values.push(value);
            acc = 0;
            shift = 0;
        }
    }
    values
}

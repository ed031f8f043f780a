//! Run merging for word-processor markup.
//!
//! Editors split one logical run into several `<w:r>` elements whenever
//! formatting, spell-checking or revision state changes mid-word, so a
//! marker such as `{{name}}` can end up as `{{na` + `me}}` in separate runs.
//! Collapsing the boundary between adjacent text runs makes the marker
//! contiguous again. The second run's `<w:rPr>` is dropped; the merged text
//! takes the first run's formatting.

use regex::Regex;
use std::sync::OnceLock;

/// Safety net only; each pass strictly shortens the text, so it always terminates.
const MAX_PASSES: usize = 64;

fn run_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // `</w:t></w:r>` [proofing marks] `<w:r ...>` [<w:rPr>..</w:rPr>] `<w:t ...>`
        // rPr may only hold empty elements, so a match never reaches past the next run
        Regex::new(concat!(
            r"</w:t>\s*</w:r>\s*",
            r"(?:<w:proofErr\b[^>]*/>\s*)*",
            r"<w:r(?:\s[^>]*)?>\s*",
            r"(?:<w:rPr/>\s*|<w:rPr>\s*(?:<w:[A-Za-z]+\b[^>]*/>\s*)*</w:rPr>\s*)?",
            r"<w:t(?:\s[^>]*)?>",
        ))
        .expect("run boundary pattern is valid")
    })
}

fn stray_proofing() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // proofing marks sitting inside a run, between two text elements
        Regex::new(r"</w:t>\s*<w:proofErr\b[^>]*/>\s*<w:t(?:\s[^>]*)?>")
            .expect("proofing pattern is valid")
    })
}

/// Collapses adjacent text runs until the text stops changing.
pub fn normalize(xml: &str) -> String {
    let mut current = xml.to_string();
    for _ in 0..MAX_PASSES {
        let merged = run_boundary().replace_all(&current, "");
        let merged = stray_proofing().replace_all(&merged, "");
        if merged == current {
            break;
        }
        current = merged.into_owned();
    }
    current
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Beacon injection into HTML response bodies
//!
//! The snippet is inserted by string search rather than DOM parsing: it is
//! well-formed, self-contained and goes next to the closing body tag, so a
//! full HTML parser would buy nothing.

/// Query parameter value identifying proxy-injected beacons
pub const BEACON_SOURCE: &str = "proxy-inject";

/// Compose the beacon snippet for one injection id.
///
/// The embedded `<img>` fires a GET against the callback service when the
/// rewritten page renders in a browser.
pub fn beacon_snippet(callback_base: &str, injection_id: &str) -> String {
    format!(
        "<!-- injected id={id} --><img src=\"{base}?id={id}&source={source}\" style=\"display:none\">",
        id = injection_id,
        base = callback_base,
        source = BEACON_SOURCE,
    )
}

/// Insert `snippet` immediately before the last `</body>` (case-insensitive),
/// or append it at the end when the document has no closing body tag.
pub fn inject_into_html(body: &str, snippet: &str) -> String {
    match find_last_body_close(body) {
        Some(idx) => {
            let mut out = String::with_capacity(body.len() + snippet.len());
            out.push_str(&body[..idx]);
            out.push_str(snippet);
            out.push_str(&body[idx..]);
            out
        }
        None => {
            let mut out = String::with_capacity(body.len() + snippet.len());
            out.push_str(body);
            out.push_str(snippet);
            out
        }
    }
}

/// Byte offset of the last `</body>` occurrence, ignoring ASCII case.
/// Works on bytes so offsets stay valid for non-ASCII documents.
fn find_last_body_close(body: &str) -> Option<usize> {
    const TAG: &[u8] = b"</body>";
    body.as_bytes()
        .windows(TAG.len())
        .rposition(|window| window.eq_ignore_ascii_case(TAG))
}

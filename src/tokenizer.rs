//! Resumable single-pass tokenizer over one read buffer.
//!
//! The tokenizer never copies partial tokens. When a title, tag or link is cut
//! off by the end of the buffer it reports the position where that token
//! starts, and the caller re-presents the buffer from there after its next
//! read. The only state that outlives a call is [`ScanState`].

use crate::config::{TEXT_TAG, TITLE_TAG};
use crate::cursor::Cursor;
use crate::interner::Interner;
use crate::list::{Edge, GrowableList};
use tracing::trace;

/// Record id before any title has been seen.
pub const UNSET_RECORD: u32 = u32::MAX;

/// Outcome of scanning a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// Every byte was consumed.
    Complete,
    /// An incomplete token starts at this absolute buffer position.
    Pending(usize),
}

/// Tokenizer state carried across buffer reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanState {
    /// Interner id of the most recently closed title.
    pub current: u32,
    /// The previous buffer ended inside an open text body.
    pub in_body: bool,
    /// Titles seen so far.
    pub records: u64,
}

impl Default for ScanState {
    fn default() -> Self {
        Self {
            current: UNSET_RECORD,
            in_body: false,
            records: 0,
        }
    }
}

impl ScanState {
    pub fn record(&self) -> Option<u32> {
        (self.current != UNSET_RECORD).then_some(self.current)
    }
}

/// Scans `cursor` for title and text tags, interning titles and link targets
/// and pushing one edge per link.
pub fn parse_buffer(
    cursor: &mut Cursor<'_>,
    interner: &mut Interner,
    edges: &mut GrowableList<Edge>,
    state: &mut ScanState,
) -> Scan {
    loop {
        if state.in_body {
            match scan_body(cursor, interner, edges, state.current) {
                Some(scan) => return scan,
                None => state.in_body = false,
            }
        }

        let Some(open) = cursor.find(b'<') else {
            cursor.advance_to(cursor.end());
            return Scan::Complete;
        };
        cursor.advance_to(open);

        let after = &cursor.bytes()[1..];
        // "<" + the longer tag name + one delimiter byte
        if after.len() <= TITLE_TAG.len() {
            trace!(position = open, "Tag incomplete at buffer end");
            return Scan::Pending(open);
        }

        if tag_is(after, TITLE_TAG) {
            let Some(id) = parse_title(cursor, interner) else {
                trace!(position = open, "Title incomplete at buffer end");
                return Scan::Pending(open);
            };
            state.current = id;
            state.records += 1;
        } else if tag_is(after, TEXT_TAG) {
            let Some(tag_end) = cursor.find(b'>') else {
                trace!(position = open, "Text tag incomplete at buffer end");
                return Scan::Pending(open);
            };
            let self_closing = cursor.buffer()[tag_end - 1] == b'/';
            cursor.advance_to(tag_end + 1);
            state.in_body = !self_closing;
        } else {
            cursor.advance_to(open + 1);
        }
    }
}

fn tag_is(after_open: &[u8], name: &[u8]) -> bool {
    after_open.starts_with(name)
        && matches!(
            after_open[name.len()],
            b'>' | b'/' | b' ' | b'\t' | b'\n' | b'\r'
        )
}

/// Interns the title whose opening tag starts at the cursor and leaves the
/// cursor on the closing tag. `None` if the title is not fully buffered.
fn parse_title(cursor: &mut Cursor<'_>, interner: &mut Interner) -> Option<u32> {
    let open = cursor.start();
    let tag_end = cursor.find_from(open + 1, b'>')?;
    let close = cursor.find_from(tag_end + 1, b'<')?;

    let id = interner.intern(&cursor.buffer()[tag_end + 1..close]);
    cursor.advance_to(close);
    Some(id)
}

/// Scans body text up to its closing tag. Returns `None` once the closing
/// tag is reached, leaving the cursor on it; otherwise the body runs to the
/// end of the buffer and the scan result is returned.
fn scan_body(
    cursor: &mut Cursor<'_>,
    interner: &mut Interner,
    edges: &mut GrowableList<Edge>,
    from: u32,
) -> Option<Scan> {
    let close = cursor.find(b'<');
    let mut body = Cursor::segment(cursor.buffer(), cursor.start(), close.unwrap_or(cursor.end()));

    let scan = loop {
        match parse_links(&mut body, interner, edges, from) {
            Scan::Pending(at) if close.is_some() => {
                trace!(position = at, "Skipping link opener with no closer in body");
            }
            scan => break scan,
        }
    };

    match close {
        Some(close) => {
            cursor.advance_to(close);
            None
        }
        None => {
            if scan == Scan::Complete {
                cursor.advance_to(cursor.end());
            }
            Some(scan)
        }
    }
}

/// Extracts `[[Target]]` and `[[Target|Label]]` links from the text in
/// `cursor`, pushing an edge from `from` to each target.
///
/// Returns the position of the first `[` of a link whose closer is not in the
/// cursor. Links found before any title (`from` unset) are skipped.
pub fn parse_links(
    cursor: &mut Cursor<'_>,
    interner: &mut Interner,
    edges: &mut GrowableList<Edge>,
    from: u32,
) -> Scan {
    while let Some(found) = cursor.find(b'[') {
        match cursor.byte_at(found + 1) {
            Some(b'[') => {}
            Some(_) => {
                cursor.advance_to(found + 1);
                continue;
            }
            None => {
                // may be the first half of an opener
                cursor.advance_to(found + 1);
                return Scan::Pending(found);
            }
        }

        let target_start = found + 2;
        cursor.advance_to(target_start);

        let Some(close) = cursor.find(b']') else {
            trace!(position = found, "Link incomplete at buffer end");
            return Scan::Pending(found);
        };

        let inner = &cursor.buffer()[target_start..close];
        let target_end = memchr::memchr(b'|', inner).map_or(close, |i| target_start + i);

        if from == UNSET_RECORD {
            continue;
        }
        let to = interner.intern(&cursor.buffer()[target_start..target_end]);
        edges.push(Edge::new(from, to));
    }

    cursor.advance_to(cursor.end());
    Scan::Complete
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Interner, GrowableList<Edge>) {
        (Interner::with_capacity(1024, 16), GrowableList::with_capacity(16))
    }

    fn edge_targets(interner: &Interner, edges: &GrowableList<Edge>) -> Vec<String> {
        edges
            .iter()
            .map(|e| String::from_utf8_lossy(interner.get(e.to)).into_owned())
            .collect()
    }

    #[test]
    fn links_single_complete() {
        let (mut interner, mut edges) = setup();
        let content = b"Some text [[Link]] more text";
        let mut cursor = Cursor::new(content);

        let scan = parse_links(&mut cursor, &mut interner, &mut edges, 1);

        assert_eq!(scan, Scan::Complete);
        assert_eq!(edges.len(), 1);
        let link = interner.lookup(b"Link").unwrap();
        assert_eq!(edges[0], Edge::new(1, link));
    }

    #[test]
    fn links_multiple_complete() {
        let (mut interner, mut edges) = setup();
        let page = interner.intern(b"Page");
        let mut cursor = Cursor::new(b"[[Link1]] text [[Link2]]");

        let scan = parse_links(&mut cursor, &mut interner, &mut edges, page);

        assert_eq!(scan, Scan::Complete);
        assert_eq!(edges.len(), 2);
        let link1 = interner.intern(b"Link1");
        let link2 = interner.intern(b"Link2");
        assert_eq!(edges[0], Edge::new(page, link1));
        assert_eq!(edges[1], Edge::new(page, link2));
    }

    #[test]
    fn links_label_is_dropped() {
        let (mut interner, mut edges) = setup();
        let mut cursor = Cursor::new(b"see [[C++|C plus plus]] and [[Mozilla]]");
        parse_links(&mut cursor, &mut interner, &mut edges, 0);
        assert_eq!(edge_targets(&interner, &edges), vec!["C++", "Mozilla"]);
    }

    #[test]
    fn links_single_brackets_are_text() {
        let (mut interner, mut edges) = setup();
        let mut cursor = Cursor::new(b"[https://example.com Site] a[b] [x [[Real]]");
        let scan = parse_links(&mut cursor, &mut interner, &mut edges, 0);
        assert_eq!(scan, Scan::Complete);
        assert_eq!(edge_targets(&interner, &edges), vec!["Real"]);
    }

    #[test]
    fn links_duplicates_are_kept() {
        let (mut interner, mut edges) = setup();
        let mut cursor = Cursor::new(b"[[A]] [[A|again]] [[A]]");
        parse_links(&mut cursor, &mut interner, &mut edges, 0);
        assert_eq!(edges.len(), 3);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn links_nested_inside_file_link() {
        let (mut interner, mut edges) = setup();
        let mut cursor = Cursor::new(b"[[File:Logo.svg|thumb|The [[Rust]] logo]]");
        parse_links(&mut cursor, &mut interner, &mut edges, 0);
        assert_eq!(edge_targets(&interner, &edges), vec!["File:Logo.svg", "Rust"]);
    }

    #[test]
    fn links_empty_target() {
        let (mut interner, mut edges) = setup();
        let mut cursor = Cursor::new(b"[[]] [[|label]]");
        parse_links(&mut cursor, &mut interner, &mut edges, 0);
        assert_eq!(edges.len(), 2);
        assert_eq!(interner.len(), 1);
        assert_eq!(interner.get(edges[0].to), b"");
    }

    #[test]
    fn links_unclosed_reports_opener() {
        let (mut interner, mut edges) = setup();
        let content = b"pre [[first]] then [[unclosed";
        let mut cursor = Cursor::new(content);

        let scan = parse_links(&mut cursor, &mut interner, &mut edges, 0);

        let Scan::Pending(at) = scan else {
            panic!("expected pending, got {:?}", scan);
        };
        assert_eq!(&content[at..], b"[[unclosed");
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn links_trailing_single_bracket_is_pending() {
        let (mut interner, mut edges) = setup();
        let content = b"text [";
        let mut cursor = Cursor::new(content);
        let scan = parse_links(&mut cursor, &mut interner, &mut edges, 0);
        assert_eq!(scan, Scan::Pending(5));
    }

    #[test]
    fn links_before_any_title_are_skipped() {
        let (mut interner, mut edges) = setup();
        let mut cursor = Cursor::new(b"[[Orphan]]");
        let scan = parse_links(&mut cursor, &mut interner, &mut edges, UNSET_RECORD);
        assert_eq!(scan, Scan::Complete);
        assert!(edges.is_empty());
        assert!(interner.is_empty());
    }

    #[test]
    fn buffer_title_tag() {
        let (mut interner, mut edges) = setup();
        let mut state = ScanState::default();
        let mut cursor = Cursor::new(b"<title>PageName</title>");

        let scan = parse_buffer(&mut cursor, &mut interner, &mut edges, &mut state);

        assert_eq!(scan, Scan::Complete);
        assert_eq!(state.record(), interner.lookup(b"PageName"));
        assert_eq!(state.records, 1);
    }

    #[test]
    fn title_across_buffers_reports_tag_start() {
        let (mut interner, mut edges) = setup();
        let mut state = ScanState::default();
        let content = b"starting noise <title>Page";
        let mut cursor = Cursor::new(content);

        let scan = parse_buffer(&mut cursor, &mut interner, &mut edges, &mut state);

        assert_eq!(scan, Scan::Pending(15));
        assert_eq!(&content[15..], b"<title>Page");
        assert_eq!(state.record(), None);
        assert!(interner.is_empty());

        let mut refilled = content[15..].to_vec();
        refilled.extend_from_slice(b"</title>");
        let mut cursor = Cursor::new(&refilled);
        let scan = parse_buffer(&mut cursor, &mut interner, &mut edges, &mut state);

        assert_eq!(scan, Scan::Complete);
        assert_eq!(interner.get(state.current), b"Page");
    }

    #[test]
    fn title_missing_tag_close_reports_tag_start() {
        let (mut interner, mut edges) = setup();
        let mut state = ScanState::default();
        let content = b"noise <title";
        let mut cursor = Cursor::new(content);
        let scan = parse_buffer(&mut cursor, &mut interner, &mut edges, &mut state);
        assert_eq!(scan, Scan::Pending(6));

        let content = b"noise <title attr";
        let mut cursor = Cursor::new(content);
        let scan = parse_buffer(&mut cursor, &mut interner, &mut edges, &mut state);
        assert_eq!(scan, Scan::Pending(6));
    }

    #[test]
    fn link_across_buffers_reports_opener() {
        let (mut interner, mut edges) = setup();
        let mut state = ScanState::default();
        let content: &[u8] = b"starting noise <title>Page</title><text>pre-text \
            [[first link]] then [[unclosed";
        let mut cursor = Cursor::new(content);

        let scan = parse_buffer(&mut cursor, &mut interner, &mut edges, &mut state);

        let Scan::Pending(at) = scan else {
            panic!("expected pending, got {:?}", scan);
        };
        assert_eq!(&content[at..], b"[[unclosed");
        assert!(state.in_body);
        assert_eq!(edge_targets(&interner, &edges), vec!["first link"]);
    }

    #[test]
    fn body_resumes_after_reload() {
        let (mut interner, mut edges) = setup();
        let mut state = ScanState::default();

        let mut cursor = Cursor::new(b"<title>Page</title><text>pre [[a]] mid");
        let scan = parse_buffer(&mut cursor, &mut interner, &mut edges, &mut state);
        assert_eq!(scan, Scan::Complete);
        assert!(state.in_body);

        let mut cursor = Cursor::new(b"dle [[b]] end</text>");
        let scan = parse_buffer(&mut cursor, &mut interner, &mut edges, &mut state);
        assert_eq!(scan, Scan::Complete);
        assert!(!state.in_body);
        assert_eq!(edge_targets(&interner, &edges), vec!["a", "b"]);
    }

    #[test]
    fn text_tag_with_attributes() {
        let (mut interner, mut edges) = setup();
        let mut state = ScanState::default();
        let mut cursor = Cursor::new(
            b"<title>P</title><text bytes=\"12\" xml:space=\"preserve\">[[X]]</text>",
        );
        let scan = parse_buffer(&mut cursor, &mut interner, &mut edges, &mut state);
        assert_eq!(scan, Scan::Complete);
        assert_eq!(edge_targets(&interner, &edges), vec!["X"]);
    }

    #[test]
    fn self_closing_text_has_no_body() {
        let (mut interner, mut edges) = setup();
        let mut state = ScanState::default();
        let mut cursor = Cursor::new(b"<title>P</title><text bytes=\"0\" /><comment>[[Y]]</comment>");
        let scan = parse_buffer(&mut cursor, &mut interner, &mut edges, &mut state);
        assert_eq!(scan, Scan::Complete);
        assert!(!state.in_body);
        assert!(edges.is_empty());
    }

    #[test]
    fn links_outside_text_are_ignored() {
        let (mut interner, mut edges) = setup();
        let mut state = ScanState::default();
        let mut cursor =
            Cursor::new(b"<title>P</title><comment>revert [[Special:X]]</comment><text>[[Y]]</text>");
        parse_buffer(&mut cursor, &mut interner, &mut edges, &mut state);
        assert_eq!(edge_targets(&interner, &edges), vec!["Y"]);
    }

    #[test]
    fn unrecognized_tags_are_noise() {
        let (mut interner, mut edges) = setup();
        let mut state = ScanState::default();
        let mut cursor = Cursor::new(b"<mediawiki><page><titles>x</titles><ns>0</ns></page>");
        let scan = parse_buffer(&mut cursor, &mut interner, &mut edges, &mut state);
        assert_eq!(scan, Scan::Complete);
        assert!(interner.is_empty());
        assert_eq!(state.records, 0);
    }

    #[test]
    fn truncated_tag_is_pending() {
        let (mut interner, mut edges) = setup();
        let mut state = ScanState::default();
        let content = b"</page>\n<te";
        let mut cursor = Cursor::new(content);
        let scan = parse_buffer(&mut cursor, &mut interner, &mut edges, &mut state);
        assert_eq!(scan, Scan::Pending(8));
    }

    #[test]
    fn text_tag_without_close_is_pending() {
        let (mut interner, mut edges) = setup();
        let mut state = ScanState::default();
        let mut cursor = Cursor::new(b"<title>P</title><text bytes=\"1");
        let scan = parse_buffer(&mut cursor, &mut interner, &mut edges, &mut state);
        assert_eq!(scan, Scan::Pending(16));
        assert!(!state.in_body);
        assert_eq!(state.records, 1);
        assert!(edges.is_empty());
    }

    #[test]
    fn unclosed_link_in_closed_body_is_skipped() {
        let (mut interner, mut edges) = setup();
        let mut state = ScanState::default();
        let mut cursor = Cursor::new(b"<title>P</title><text>[[broken [[ok]] [[tail</text><title>Q</title>");
        let scan = parse_buffer(&mut cursor, &mut interner, &mut edges, &mut state);
        assert_eq!(scan, Scan::Complete);
        assert_eq!(edge_targets(&interner, &edges), vec!["broken [[ok", "ok"]);
        assert_eq!(interner.get(state.current), b"Q");
    }

    #[test]
    fn edges_follow_the_current_record() {
        let (mut interner, mut edges) = setup();
        let mut state = ScanState::default();
        let mut cursor = Cursor::new(
            b"<page><title>A</title><text>[[B]]</text></page>\
              <page><title>B</title><text>[[A]] [[C]]</text></page>",
        );
        parse_buffer(&mut cursor, &mut interner, &mut edges, &mut state);

        let a = interner.lookup(b"A").unwrap();
        let b = interner.lookup(b"B").unwrap();
        let c = interner.lookup(b"C").unwrap();
        assert_eq!(edges.as_slice(), &[Edge::new(a, b), Edge::new(b, a), Edge::new(b, c)]);
        assert_eq!(state.records, 2);
    }
}

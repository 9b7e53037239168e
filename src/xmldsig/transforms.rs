//! Enveloped-signature removal and whitespace canonicalization.
//!
//! Canonicalization here is the minimal form the signer and verifier agree on:
//! whitespace between a `>` and the next `<` is dropped. Attribute order,
//! namespace inheritance and comments are left untouched.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;
use tracing::debug;

use super::constants::SIGNATURE_ELEMENT;
use crate::crypto;

static INTER_TAG_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">[ \t\r\n\x0C]+<").expect("valid inter-tag whitespace pattern"));

/// Collapse all whitespace found strictly between a `>` and the next `<`.
pub fn canonicalize(xml: &str) -> String {
    INTER_TAG_WHITESPACE.replace_all(xml, "><").into_owned()
}

/// Flatten a document before signing: inter-tag whitespace is collapsed, every
/// line is trimmed and the lines are joined, then tabs and carriage returns are
/// dropped.
///
/// Lines are joined with nothing in between, so a tag broken across lines
/// loses the whitespace before its attributes: `<Body\n  Id="x1">` becomes
/// `<BodyId="x1">`. Documents must keep each tag on one line.
pub fn normalize_document(xml: &str) -> String {
    canonicalize(xml)
        .split('\n')
        .map(str::trim)
        .collect::<String>()
        .chars()
        .filter(|c| *c != '\t' && *c != '\r')
        .collect()
}

/// Remove every `Signature` subtree, prefixed or not, from the given XML.
pub fn remove_signatures(xml: &str) -> String {
    let spans = signature_spans(xml);
    if spans.is_empty() {
        return xml.to_string();
    }
    debug!("Removing {} signature element(s)", spans.len());

    let mut result = String::with_capacity(xml.len());
    let mut cursor = 0;
    for span in spans {
        result.push_str(&xml[cursor..span.start]);
        cursor = span.end;
    }
    result.push_str(&xml[cursor..]);
    result
}

/// Enveloped-signature transform followed by canonicalization.
pub fn apply_transforms(element: &str) -> String {
    canonicalize(&remove_signatures(element))
}

/// Base64 SHA-256 digest of the transformed element.
pub fn digest_value(element: &str) -> Result<String, crypto::Error> {
    crypto::sha256_base64(apply_transforms(element))
}

/// Byte ranges of the outermost `Signature` elements, in document order.
/// A signature without a matching end tag is left in place.
fn signature_spans(xml: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;

    for tag in Tags::new(xml).filter(|tag| is_signature_name(tag.name)) {
        match tag.kind {
            TagKind::Empty if depth == 0 => spans.push(tag.start..tag.end),
            TagKind::Open => {
                if depth == 0 {
                    start = tag.start;
                }
                depth += 1;
            }
            TagKind::Close if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(start..tag.end);
                }
            }
            _ => {}
        }
    }
    spans
}

/// Whether a qualified element name has the local name `Signature`.
pub(crate) fn is_signature_name(name: &str) -> bool {
    local_name(name) == SIGNATURE_ELEMENT
}

pub(crate) fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

/// Byte range of the whole element opened by `open`, up to its matching end tag.
pub(crate) fn element_span(xml: &str, open: &Tag<'_>) -> Option<Range<usize>> {
    match open.kind {
        TagKind::Empty => return Some(open.start..open.end),
        TagKind::Close => return None,
        TagKind::Open => {}
    }

    let mut depth = 0usize;
    for tag in Tags::new(xml).skip_to(open.end) {
        if tag.name != open.name {
            continue;
        }
        match tag.kind {
            TagKind::Open => depth += 1,
            TagKind::Close if depth == 0 => return Some(open.start..tag.end),
            TagKind::Close => depth -= 1,
            TagKind::Empty => {}
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagKind {
    Open,
    Close,
    Empty,
}

/// A start, end or empty-element tag found in a document.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tag<'a> {
    pub start: usize,
    /// Offset just past the closing `>`
    pub end: usize,
    pub name: &'a str,
    pub kind: TagKind,
    /// Full tag text including the angle brackets
    pub text: &'a str,
}

/// Iterator over element tags, skipping comments, CDATA sections,
/// processing instructions and declarations.
pub(crate) struct Tags<'a> {
    xml: &'a str,
    pos: usize,
}

impl<'a> Tags<'a> {
    pub fn new(xml: &'a str) -> Self {
        Self { xml, pos: 0 }
    }

    pub fn skip_to(mut self, pos: usize) -> Self {
        self.pos = pos;
        self
    }

    fn skip_past(&mut self, from: usize, terminator: &str) {
        self.pos = self.xml[from..]
            .find(terminator)
            .map_or(self.xml.len(), |idx| from + idx + terminator.len());
    }
}

impl<'a> Iterator for Tags<'a> {
    type Item = Tag<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let start = self.pos + self.xml.get(self.pos..)?.find('<')?;
            let rest = &self.xml[start..];

            if rest.starts_with("<!--") {
                self.skip_past(start, "-->");
                continue;
            }
            if rest.starts_with("<![CDATA[") {
                self.skip_past(start, "]]>");
                continue;
            }
            if rest.starts_with("<?") {
                self.skip_past(start, "?>");
                continue;
            }
            if rest.starts_with("<!") {
                self.skip_past(start, ">");
                continue;
            }

            let end = tag_end(self.xml, start)?;
            self.pos = end;

            let text = &self.xml[start..end];
            let (kind, body) = match text.strip_prefix("</") {
                Some(body) => (TagKind::Close, body),
                None if text.ends_with("/>") => (TagKind::Empty, &text[1..]),
                None => (TagKind::Open, &text[1..]),
            };
            let name_len = body
                .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
                .unwrap_or(body.len());
            let name = &body[..name_len];
            if name.is_empty() {
                continue;
            }

            return Some(Tag {
                start,
                end,
                name,
                kind,
                text,
            });
        }
    }
}

/// Offset just past the `>` closing the tag that starts at `start`, honouring quoted attribute values.
fn tag_end(xml: &str, start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (offset, byte) in xml.as_bytes()[start + 1..].iter().enumerate() {
        match (quote, *byte) {
            (Some(q), b) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b @ (b'"' | b'\'')) => quote = Some(b),
            (None, b'>') => return Some(start + 1 + offset + 1),
            (None, _) => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_collapses_inter_tag_whitespace() {
        let xml = "<a>\n  <b>text with  spaces</b>\t\r\n</a>";
        assert_eq!(canonicalize(xml), "<a><b>text with  spaces</b></a>");
    }

    #[test]
    fn test_canonicalize_keeps_text_whitespace() {
        assert_eq!(canonicalize("<a> x </a>"), "<a> x </a>");
    }

    #[test]
    fn test_normalize_document() {
        let xml = "<?xml version=\"1.0\"?>\r\n<Doc>\n\t<Body Id=\"x1\">\n   Value\n   </Body>\n</Doc>\n";
        assert_eq!(
            normalize_document(xml),
            "<?xml version=\"1.0\"?><Doc><Body Id=\"x1\">Value</Body></Doc>"
        );
    }

    #[test]
    fn test_normalize_document_joins_split_tags() {
        let xml = "<Doc>\n<Body\n  Id=\"x1\">V</Body>\n</Doc>";
        assert_eq!(normalize_document(xml), "<Doc><BodyId=\"x1\">V</Body></Doc>");
    }

    #[test]
    fn test_remove_signatures() {
        let xml = "<a><b>1</b><Signature xmlns=\"x\"><SignedInfo/></Signature><c/></a>";
        assert_eq!(remove_signatures(xml), "<a><b>1</b><c/></a>");
    }

    #[test]
    fn test_remove_prefixed_and_nested_signatures() {
        let xml = concat!(
            "<a>",
            "<ds:Signature><ds:SignatureValue>v</ds:SignatureValue>",
            "<Object><Signature><SignatureValue>w</SignatureValue></Signature></Object>",
            "</ds:Signature>",
            "<b/>",
            "<Signature/>",
            "</a>"
        );
        assert_eq!(remove_signatures(xml), "<a><b/></a>");
    }

    #[test]
    fn test_signature_value_is_not_a_signature() {
        let xml = "<a><SignatureValue>v</SignatureValue><SignatureMethod/></a>";
        assert_eq!(remove_signatures(xml), xml);
    }

    #[test]
    fn test_unclosed_signature_is_kept() {
        let xml = "<a><Signature><SignedInfo/></a>";
        assert_eq!(remove_signatures(xml), xml);
    }

    #[test]
    fn test_tags_skip_comments_and_cdata() {
        let xml = "<a><!-- <b> --><![CDATA[<c>]]><d attr=\"x>y\"/></a>";
        let names: Vec<_> = Tags::new(xml).map(|tag| (tag.name, tag.kind)).collect();
        assert_eq!(
            names,
            vec![
                ("a", TagKind::Open),
                ("d", TagKind::Empty),
                ("a", TagKind::Close)
            ]
        );
    }

    #[test]
    fn test_element_span_nested_same_name() {
        let xml = "<r><a><a>inner</a></a><a>second</a></r>";
        let open = Tags::new(xml).find(|tag| tag.name == "a").unwrap();
        let span = element_span(xml, &open).unwrap();
        assert_eq!(&xml[span], "<a><a>inner</a></a>");
    }

    #[test]
    fn test_digest_value_ignores_signature_and_layout() {
        let plain = digest_value("<Body Id=\"x1\">V</Body>").unwrap();
        let signed = digest_value("<Body Id=\"x1\">\n  V<Signature><X/></Signature>\n</Body>").unwrap();
        // text whitespace is significant, inter-tag whitespace is not
        assert_ne!(plain, signed);
        assert_eq!(
            digest_value("<Body Id=\"x1\"><V/>\n<Signature><X/></Signature>\n</Body>").unwrap(),
            digest_value("<Body Id=\"x1\"><V/></Body>").unwrap()
        );
    }
}

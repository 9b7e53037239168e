//! Lookup of the element to sign by its `Id`/`id` attribute.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use super::LocateError;
use super::constants::ID_ATTRIBUTES;
use super::transforms::{TagKind, Tags};

static FIRST_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[\s:])(?:Id|id)\s*=\s*(?:"([^"]+)"|'([^']+)')"#).expect("valid id pattern")
});

static DEFAULT_NAMESPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\sxmlns\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid namespace pattern")
});

/// An element found by id, serialized as it appears in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedElement {
    pub id: String,
    pub tag_name: String,
    /// Full subtree text, with the in-scope default namespace added to the
    /// opening tag when the element does not declare one itself
    pub xml: String,
}

/// Finds signable elements in a document.
pub trait ElementLocator {
    /// Value of the first `Id`/`id` attribute in document order, if any.
    fn first_id(&self, xml: &str) -> Result<Option<String>, LocateError>;

    /// The element whose `Id` or `id` attribute equals `id`.
    fn locate(&self, xml: &str, id: &str) -> Result<LocatedElement, LocateError>;
}

/// Regular-expression locator.
///
/// `Id` is tried before `id` and values must be quoted and match exactly.
/// The element ends at the first closing tag with its name, so the target must
/// not contain a nested element of the same name. Ids mentioned inside comments
/// or CDATA are not told apart from real attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternLocator;

impl ElementLocator for PatternLocator {
    fn first_id(&self, xml: &str) -> Result<Option<String>, LocateError> {
        let Some(captures) = FIRST_ID.captures(xml) else {
            return Ok(None);
        };
        Ok(captures
            .get(1)
            .or_else(|| captures.get(2))
            .map(|value| value.as_str().to_string()))
    }

    fn locate(&self, xml: &str, id: &str) -> Result<LocatedElement, LocateError> {
        let escaped = regex::escape(id);

        for attribute in ID_ATTRIBUTES {
            let pattern = Regex::new(&format!(
                r#"<([\w:.-]+)[^>]*?[\s:]{attribute}\s*=\s*(?:"{escaped}"|'{escaped}')[^>]*>"#
            ))?;
            let Some(captures) = pattern.captures(xml) else {
                continue;
            };
            let (Some(open), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let tag_name = name.as_str();
            debug!("Found element <{tag_name}> by {attribute}=\"{id}\"");

            let element = if open.as_str().ends_with("/>") {
                open.as_str()
            } else {
                let closing = Regex::new(&format!(r"</{}\s*>", regex::escape(tag_name)))?;
                let close = closing
                    .find_at(xml, open.end())
                    .ok_or_else(|| LocateError::IncompleteElement(tag_name.to_string()))?;
                &xml[open.start()..close.end()]
            };

            return Ok(LocatedElement {
                id: id.to_string(),
                tag_name: tag_name.to_string(),
                xml: inherit_default_namespace(&xml[..open.start()], tag_name, element),
            });
        }

        Err(LocateError::ElementNotFound(Some(id.to_string())))
    }
}

/// Streaming locator built on the quick-xml reader.
///
/// Any attribute whose local name is `Id` or `id` matches, so `wsu:Id` works
/// too. Nesting is tracked, so nested elements sharing the target's name are
/// handled. The document must be well-formed up to the end of the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventLocator;

impl ElementLocator for EventLocator {
    fn first_id(&self, xml: &str) -> Result<Option<String>, LocateError> {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event() {
                Ok(Event::Start(tag)) | Ok(Event::Empty(tag)) => {
                    if let Some(value) = id_attribute(&tag)? {
                        return Ok(Some(value));
                    }
                }
                Ok(Event::Eof) => return Ok(None),
                Err(err) => return Err(LocateError::Xml(err.to_string())),
                _ => {}
            }
        }
    }

    fn locate(&self, xml: &str, id: &str) -> Result<LocatedElement, LocateError> {
        let mut reader = Reader::from_str(xml);
        // start offset, tag name and depth of the target once seen
        let mut target: Option<(usize, String, usize)> = None;
        let mut depth = 0usize;

        loop {
            let event = reader.read_event();
            let end = reader.buffer_position() as usize;

            match event {
                Err(err) => {
                    return Err(match target {
                        Some((_, tag_name, _)) => LocateError::IncompleteElement(tag_name),
                        None => LocateError::Xml(err.to_string()),
                    });
                }
                Ok(Event::Eof) => {
                    return Err(match target {
                        Some((_, tag_name, _)) => LocateError::IncompleteElement(tag_name),
                        None => LocateError::ElementNotFound(Some(id.to_string())),
                    });
                }
                Ok(Event::Start(tag)) => {
                    depth += 1;
                    if target.is_none() && has_id(&tag, id)? {
                        target = Some((tag_start(xml, end), tag_name(&tag), depth));
                    }
                }
                Ok(Event::Empty(tag)) => {
                    if target.is_none() && has_id(&tag, id)? {
                        let start = tag_start(xml, end);
                        return Ok(located(xml, id, start, end, tag_name(&tag)));
                    }
                }
                Ok(Event::End(_)) => {
                    if let Some((start, tag_name, target_depth)) = &target {
                        if *target_depth == depth {
                            return Ok(located(xml, id, *start, end, tag_name.clone()));
                        }
                    }
                    depth = depth.saturating_sub(1);
                }
                _ => {}
            }
        }
    }
}

fn located(xml: &str, id: &str, start: usize, end: usize, tag_name: String) -> LocatedElement {
    debug!("Found element <{tag_name}> with id \"{id}\"");
    let element = inherit_default_namespace(&xml[..start], &tag_name, &xml[start..end]);
    LocatedElement {
        id: id.to_string(),
        tag_name,
        xml: element,
    }
}

fn tag_name(tag: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(tag.name().as_ref()).into_owned()
}

/// Offset of the `<` opening the tag that ends at `end`.
fn tag_start(xml: &str, end: usize) -> usize {
    xml[..end].rfind('<').unwrap_or(0)
}

fn id_attribute(tag: &BytesStart<'_>) -> Result<Option<String>, LocateError> {
    for attribute in tag.attributes().with_checks(false) {
        let attribute = attribute.map_err(|err| LocateError::Xml(err.to_string()))?;
        if attribute.key.as_namespace_binding().is_some() {
            continue;
        }
        let local = attribute.key.local_name();
        if ID_ATTRIBUTES.iter().any(|name| name.as_bytes() == local.as_ref()) {
            let value = attribute
                .unescape_value()
                .map_err(|err| LocateError::Xml(err.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn has_id(tag: &BytesStart<'_>, id: &str) -> Result<bool, LocateError> {
    for attribute in tag.attributes().with_checks(false) {
        let attribute = attribute.map_err(|err| LocateError::Xml(err.to_string()))?;
        if attribute.key.as_namespace_binding().is_some() {
            continue;
        }
        let local = attribute.key.local_name();
        if !ID_ATTRIBUTES.iter().any(|name| name.as_bytes() == local.as_ref()) {
            continue;
        }
        let value = attribute
            .unescape_value()
            .map_err(|err| LocateError::Xml(err.to_string()))?;
        if value == id {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Default namespace declared directly on the given tag text.
pub(crate) fn declared_default_namespace(tag: &str) -> Option<&str> {
    let captures = DEFAULT_NAMESPACE.captures(tag)?;
    captures.get(1).or_else(|| captures.get(2)).map(|value| value.as_str())
}

/// Default namespace in scope at the end of `preceding`, taken from the
/// innermost still-open ancestor that declares one.
fn inherited_default_namespace(preceding: &str) -> Option<&str> {
    let mut open: Vec<Option<&str>> = Vec::new();
    for tag in Tags::new(preceding) {
        match tag.kind {
            TagKind::Open => open.push(declared_default_namespace(tag.text)),
            TagKind::Close => {
                open.pop();
            }
            TagKind::Empty => {}
        }
    }
    open.into_iter().rev().flatten().next()
}

/// Add `xmlns="..."` right after the element name in the opening tag.
pub(crate) fn with_default_namespace(element: &str, tag_name: &str, namespace: &str) -> String {
    let name_end = 1 + tag_name.len();
    if element.len() < name_end {
        return element.to_string();
    }
    format!(
        "{} xmlns=\"{namespace}\"{}",
        &element[..name_end],
        &element[name_end..]
    )
}

/// Carry the default namespace the document declares around the element into
/// its opening tag, unless the opening tag already declares one.
fn inherit_default_namespace(preceding: &str, tag_name: &str, element: &str) -> String {
    let opening_end = element.find('>').map_or(element.len(), |idx| idx + 1);
    if declared_default_namespace(&element[..opening_end]).is_some() {
        return element.to_string();
    }

    match inherited_default_namespace(preceding) {
        Some(namespace) if !namespace.is_empty() => {
            debug!("Adding inherited namespace {namespace} to <{tag_name}>");
            with_default_namespace(element, tag_name, namespace)
        }
        _ => element.to_string(),
    }
}

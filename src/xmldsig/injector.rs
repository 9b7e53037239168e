use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use super::{Error, Result};

static TRAILING_CLOSE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</([^>]+)>\s*$").expect("valid closing tag pattern"));

/// Insert the signature element right before a closing tag.
///
/// With an explicit tag name the first `</tag>` is used. Without one, the
/// document's trailing closing tag is taken and the signature goes right
/// before that trailing occurrence. Exactly one insertion is made and no
/// separator text is added.
pub fn insert_signature(xml: &str, signature: &str, tag: Option<&str>) -> Result<String> {
    let position = match tag.map(str::trim).filter(|tag| !tag.is_empty()) {
        Some(tag) => {
            let closing = format!("</{tag}>");
            xml.find(&closing)
                .ok_or_else(|| Error::InsertionPointNotFound(format!("closing tag {closing} not found")))?
        }
        None => {
            let trailing = TRAILING_CLOSE_TAG
                .captures(xml)
                .and_then(|captures| captures.get(0))
                .ok_or_else(|| {
                    Error::InsertionPointNotFound("document has no trailing closing tag".to_string())
                })?;
            trailing.start()
        }
    };

    debug!("Inserting signature at offset {position}");

    let mut signed = String::with_capacity(xml.len() + signature.len());
    signed.push_str(&xml[..position]);
    signed.push_str(signature);
    signed.push_str(&xml[position..]);
    Ok(signed)
}

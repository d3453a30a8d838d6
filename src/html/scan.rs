//! Structural scan over raw markup
//!
//! Unlike the html5ever parse, this never repairs anything: it reports
//! tags exactly where they appear in the source text, with byte offsets,
//! so callers can validate nesting or splice attributes in without
//! reserializing the document.

/// Elements whose content is raw text; tags inside are not scanned
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// A start or end tag as written in the source
#[derive(Debug, Clone, PartialEq)]
pub struct RawTag {
    /// Lowercased tag name
    pub name: String,
    /// `</name>`
    pub closing: bool,
    /// `<name ... />`
    pub self_closing: bool,
    /// Byte offset of `<`
    pub start: usize,
    /// Byte offset just past the tag name
    pub name_end: usize,
    /// Byte offset just past `>`
    pub end: usize,
    /// Lowercased attribute names in source order
    pub attributes: Vec<String>,
}

impl RawTag {
    /// Whether the tag carries an attribute with this (lowercase) name
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
    }
}

/// Scan every start and end tag in `html`, skipping comments, doctypes,
/// processing instructions and raw-text element content.
pub fn scan_tags(html: &str) -> Vec<RawTag> {
    let bytes = html.as_bytes();
    let mut tags = Vec::new();
    let mut pos = 0;

    while let Some(offset) = html[pos..].find('<') {
        let start = pos + offset;
        let rest = &html[start..];

        if rest.starts_with("<!--") {
            pos = html[start + 4..]
                .find("-->")
                .map(|e| start + 4 + e + 3)
                .unwrap_or(html.len());
            continue;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            pos = html[start..]
                .find('>')
                .map(|e| start + e + 1)
                .unwrap_or(html.len());
            continue;
        }

        let closing = rest.starts_with("</");
        let name_start = start + if closing { 2 } else { 1 };
        let starts_alpha = bytes.get(name_start).is_some_and(|b| b.is_ascii_alphabetic());
        if !starts_alpha {
            pos = start + 1;
            continue;
        }

        let name_len = bytes[name_start..]
            .iter()
            .take_while(|b| b.is_ascii_alphanumeric() || **b == b'-' || **b == b':')
            .count();
        let name_end = name_start + name_len;

        let Some(tag_end) = find_tag_end(bytes, name_end) else {
            break;
        };
        let inner = &html[name_end..tag_end];
        let name = html[name_start..name_end].to_ascii_lowercase();

        tags.push(RawTag {
            name: name.clone(),
            closing,
            self_closing: !closing && inner.trim_end().ends_with('/'),
            start,
            name_end,
            end: tag_end + 1,
            attributes: if closing { Vec::new() } else { attribute_names(inner) },
        });
        pos = tag_end + 1;

        if !closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            let needle = format!("</{}", name);
            pos = html[pos..]
                .to_ascii_lowercase()
                .find(&needle)
                .map(|e| pos + e)
                .unwrap_or(html.len());
        }
    }

    tags
}

/// Index of the `>` closing a tag, ignoring any inside quoted values
fn find_tag_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, b) in bytes.iter().enumerate().skip(from) {
        match quote {
            Some(q) if *b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(*b),
                b'>' => return Some(i),
                _ => {}
            },
        }
    }
    None
}

/// Attribute names from the text between a tag name and its `>`
fn attribute_names(inner: &str) -> Vec<String> {
    let bytes = inner.as_bytes();
    let mut names = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        let start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'=' | b'/') {
            i += 1;
        }
        if i > start {
            names.push(inner[start..i].to_ascii_lowercase());
        }

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            match bytes.get(i) {
                Some(&q) if q == b'"' || q == b'\'' => {
                    i += 1;
                    while i < bytes.len() && bytes[i] != q {
                        i += 1;
                    }
                    i += 1;
                }
                _ => {
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                        i += 1;
                    }
                }
            }
        }
    }

    names
}

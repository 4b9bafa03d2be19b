//! Dublin Core attribute store backed by `metadata/dcterms.xml`.
//!
//! Terms are validated against [`TERMS`]; single-valued terms are replaced on
//! set, multiple-valued terms accumulate.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::error::{DipError, DipResult};
use crate::manifest::write_atomic;
use crate::package::Package;

pub const DC_NAMESPACE: &str = "http://purl.org/dc/terms/";
const ROOT_ELEMENT: &str = "metadata";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Multiple,
}

/// Whitelisted Dublin Core terms.
pub const TERMS: &[(&str, Cardinality)] = &[
    ("dc:creator", Cardinality::Multiple),
    ("dc:created", Cardinality::Single),
    ("dc:title", Cardinality::Single),
    ("dc:identifier", Cardinality::Single),
];

pub fn cardinality(term: &str) -> Option<Cardinality> {
    TERMS
        .iter()
        .find(|(name, _)| *name == term)
        .map(|(_, card)| *card)
}

/// One stored (term, value, language) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DcAttribute {
    pub term: String,
    pub value: String,
    pub lang: Option<String>,
}

impl DcAttribute {
    pub fn new(term: impl Into<String>, value: impl Into<String>) -> Self {
        DcAttribute {
            term: term.into(),
            value: value.into(),
            lang: None,
        }
    }
}

impl fmt::Display for DcAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=\"{}\"", self.term, self.value)
    }
}

fn assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\w+:\w+)\s*=\s*(.*?)\s*$").expect("valid regex"))
}

fn term_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\w+:\w+)\s*$").expect("valid regex"))
}

/// Parses `ns:term=value` (value optionally double-quoted) into a known term and its value.
pub fn parse_assignment(input: &str) -> DipResult<(String, String)> {
    let caps = assignment_re()
        .captures(input)
        .ok_or_else(|| DipError::InvalidAttributeFormat {
            input: input.to_string(),
        })?;
    let term = caps[1].to_string();
    let raw = &caps[2];
    let value = raw
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(raw)
        .to_string();
    ensure_known(&term)?;
    Ok((term, value))
}

/// Parses a bare `ns:term` reference into a known term.
pub fn parse_term(input: &str) -> DipResult<String> {
    let caps = term_re()
        .captures(input)
        .ok_or_else(|| DipError::InvalidAttributeFormat {
            input: input.to_string(),
        })?;
    let term = caps[1].to_string();
    ensure_known(&term)?;
    Ok(term)
}

fn ensure_known(term: &str) -> DipResult<Cardinality> {
    cardinality(term).ok_or_else(|| DipError::UnknownAttribute {
        term: term.to_string(),
    })
}

/// In-memory image of the `dcterms.xml` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DublinCore {
    attributes: Vec<DcAttribute>,
}

impl DublinCore {
    pub fn attributes(&self) -> &[DcAttribute] {
        &self.attributes
    }

    pub fn get(&self, term: &str) -> Vec<DcAttribute> {
        self.attributes
            .iter()
            .filter(|a| a.term == term)
            .cloned()
            .collect()
    }

    /// Inserts `attr`, first dropping prior values when the term is single-valued.
    pub fn set(&mut self, attr: DcAttribute) -> DipResult<()> {
        if ensure_known(&attr.term)? == Cardinality::Single {
            self.attributes.retain(|a| a.term != attr.term);
        }
        self.attributes.push(attr);
        Ok(())
    }

    pub fn remove(&mut self, term: &str) -> usize {
        let before = self.attributes.len();
        self.attributes.retain(|a| a.term != term);
        before - self.attributes.len()
    }

    pub fn load(path: &Path) -> DipResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| DipError::io(path, e))?;
        Self::parse(&text).map_err(|message| DipError::Xml {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn save(&self, path: &Path) -> DipResult<()> {
        let xml = self.to_xml().map_err(|message| DipError::Xml {
            path: path.to_path_buf(),
            message,
        })?;
        write_atomic(path, &xml)
    }

    fn parse(text: &str) -> Result<Self, String> {
        // No trimming: values keep their own whitespace. Indentation between
        // elements arrives while no term is open and is dropped below.
        let mut reader = Reader::from_str(text);

        let mut attributes = Vec::new();
        let mut current: Option<DcAttribute> = None;
        loop {
            match reader.read_event().map_err(|e| e.to_string())? {
                Event::Start(start) => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    if name == ROOT_ELEMENT {
                        continue;
                    }
                    let mut attr = DcAttribute::new(name, String::new());
                    for xml_attr in start.attributes() {
                        let xml_attr = xml_attr.map_err(|e| e.to_string())?;
                        if xml_attr.key.as_ref() == b"xml:lang" {
                            let lang = xml_attr.unescape_value().map_err(|e| e.to_string())?;
                            attr.lang = Some(lang.into_owned());
                        }
                    }
                    current = Some(attr);
                }
                Event::Text(text) => {
                    if let Some(attr) = current.as_mut() {
                        attr.value.push_str(&text.unescape().map_err(|e| e.to_string())?);
                    }
                }
                Event::End(_) => {
                    if let Some(attr) = current.take() {
                        attributes.push(attr);
                    }
                }
                Event::Empty(empty) => {
                    let name = String::from_utf8_lossy(empty.name().as_ref()).into_owned();
                    if name != ROOT_ELEMENT {
                        attributes.push(DcAttribute::new(name, String::new()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(DublinCore { attributes })
    }

    fn to_xml(&self) -> Result<Vec<u8>, String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| e.to_string())?;

        let mut root = BytesStart::new(ROOT_ELEMENT);
        root.push_attribute(("xmlns:dc", DC_NAMESPACE));
        writer
            .write_event(Event::Start(root))
            .map_err(|e| e.to_string())?;

        for attr in &self.attributes {
            let mut start = BytesStart::new(attr.term.as_str());
            if let Some(lang) = &attr.lang {
                start.push_attribute(("xml:lang", lang.as_str()));
            }
            writer
                .write_event(Event::Start(start))
                .map_err(|e| e.to_string())?;
            writer
                .write_event(Event::Text(BytesText::new(&attr.value)))
                .map_err(|e| e.to_string())?;
            writer
                .write_event(Event::End(BytesEnd::new(attr.term.as_str())))
                .map_err(|e| e.to_string())?;
        }

        writer
            .write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))
            .map_err(|e| e.to_string())?;
        let mut xml = writer.into_inner();
        xml.push(b'\n');
        Ok(xml)
    }
}

/// Stores `value` for `term` and persists the document immediately.
pub fn set_attribute(package: &Package, term: &str, value: &str) -> DipResult<DcAttribute> {
    let term = parse_term(term)?;
    let path = package.dcterms_path();
    let mut dc = DublinCore::load(&path)?;
    let attr = DcAttribute::new(term, value);
    dc.set(attr.clone())?;
    dc.save(&path)?;
    info!(term = %attr.term, dip = %package.path().display(), "Set attribute");
    Ok(attr)
}

/// Returns every stored value for `term`, in document order.
pub fn get_attribute(package: &Package, term: &str) -> DipResult<Vec<DcAttribute>> {
    let term = parse_term(term)?;
    let dc = DublinCore::load(&package.dcterms_path())?;
    let found = dc.get(&term);
    debug!(term = %term, count = found.len(), "Read attribute");
    Ok(found)
}

/// Removes every stored value for `term`; succeeds when none were present.
pub fn remove_attribute(package: &Package, term: &str) -> DipResult<usize> {
    let term = parse_term(term)?;
    let path = package.dcterms_path();
    let mut dc = DublinCore::load(&path)?;
    let removed = dc.remove(&term);
    if removed > 0 {
        dc.save(&path)?;
    }
    info!(term = %term, removed, dip = %package.path().display(), "Removed attribute");
    Ok(removed)
}

pub fn all_attributes(package: &Package) -> DipResult<Vec<DcAttribute>> {
    Ok(DublinCore::load(&package.dcterms_path())?.attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_quoted_values() {
        assert_eq!(
            parse_assignment("dc:creator=John Smith").unwrap(),
            ("dc:creator".to_string(), "John Smith".to_string())
        );
        assert_eq!(
            parse_assignment(r#"dc:title="Smith and Jones' package""#).unwrap(),
            (
                "dc:title".to_string(),
                "Smith and Jones' package".to_string()
            )
        );
        assert_eq!(
            parse_assignment("dc:identifier=testdip/123456789").unwrap().1,
            "testdip/123456789"
        );
    }

    #[test]
    fn rejects_malformed_and_unknown_terms() {
        assert!(matches!(
            parse_assignment("creator=John"),
            Err(DipError::InvalidAttributeFormat { .. })
        ));
        assert!(matches!(
            parse_assignment("dc:creator"),
            Err(DipError::InvalidAttributeFormat { .. })
        ));
        assert!(matches!(
            parse_assignment("dc:publisher=ACME"),
            Err(DipError::UnknownAttribute { .. })
        ));
        assert!(matches!(
            parse_term("dc:publisher"),
            Err(DipError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn single_valued_terms_replace_and_multiple_valued_terms_accumulate() {
        let mut dc = DublinCore::default();
        dc.set(DcAttribute::new("dc:title", "first")).unwrap();
        dc.set(DcAttribute::new("dc:title", "second")).unwrap();
        dc.set(DcAttribute::new("dc:creator", "John Smith")).unwrap();
        dc.set(DcAttribute::new("dc:creator", "Tom Jones")).unwrap();

        let titles: Vec<_> = dc.get("dc:title").into_iter().map(|a| a.value).collect();
        assert_eq!(titles, vec!["second"]);
        let creators: Vec<_> = dc.get("dc:creator").into_iter().map(|a| a.value).collect();
        assert_eq!(creators, vec!["John Smith", "Tom Jones"]);
    }

    #[test]
    fn document_round_trips_escaped_text_and_language() {
        let mut dc = DublinCore::default();
        let mut title = DcAttribute::new("dc:title", "Fish & <Chips>");
        title.lang = Some("en".into());
        dc.set(title).unwrap();
        dc.set(DcAttribute::new("dc:creator", "Tom Jones")).unwrap();

        let xml = dc.to_xml().unwrap();
        let text = String::from_utf8(xml).unwrap();
        assert!(text.contains("xmlns:dc=\"http://purl.org/dc/terms/\""));
        assert!(text.contains("&amp;"));

        let parsed = DublinCore::parse(&text).unwrap();
        assert_eq!(parsed, dc);
    }

    #[test]
    fn padded_values_keep_their_whitespace() {
        let mut dc = DublinCore::default();
        dc.set(DcAttribute::new("dc:title", "  padded title  ")).unwrap();
        dc.set(DcAttribute::new("dc:creator", "John Smith")).unwrap();

        let text = String::from_utf8(dc.to_xml().unwrap()).unwrap();
        let parsed = DublinCore::parse(&text).unwrap();
        assert_eq!(parsed.get("dc:title")[0].value, "  padded title  ");
        assert_eq!(parsed.get("dc:creator")[0].value, "John Smith");
        assert_eq!(parsed.attributes().len(), 2);
    }

    #[test]
    fn empty_document_parses_to_no_attributes() {
        let xml = DublinCore::default().to_xml().unwrap();
        let parsed = DublinCore::parse(&String::from_utf8(xml).unwrap()).unwrap();
        assert!(parsed.attributes().is_empty());
    }

    #[test]
    fn display_form_quotes_the_value() {
        let attr = DcAttribute::new("dc:created", "2014-01-01");
        assert_eq!(attr.to_string(), r#"dc:created="2014-01-01""#);
    }
}

//! Deposit receipts: the Atom entry a SWORD server returns for a deposit,
//! reduced to the fields the status tracker keeps.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::contract::DepositResponse;

/// `rel` value of the SWORD edit (add-to-container) link.
pub const SWORD_ADD_REL: &str = "http://purl.org/net/sword/terms/add";

/// Immutable record of one successful deposit exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepositReceipt {
    pub title: Option<String>,
    pub id: Option<String>,
    pub updated: Option<String>,
    pub summary: Option<String>,
    /// `Location` response header.
    pub location: Option<String>,
    /// `content/@src`.
    pub cont_iri: Option<String>,
    pub edit_iri: Option<String>,
    pub edit_media: Option<String>,
    pub se_iri: Option<String>,
    pub packaging: Vec<String>,
    /// Set when the server answered 202: the deposit is accepted but not finished.
    pub in_progress: bool,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
}

impl DepositReceipt {
    /// Builds a receipt from a 2xx response. A body that is empty or not an
    /// Atom entry yields a receipt carrying only the response metadata.
    pub fn from_response(response: &DepositResponse) -> Self {
        let mut receipt = DepositReceipt {
            location: response.header("location").map(str::to_string),
            in_progress: response.status == 202,
            status: response.status,
            headers: response.headers.clone(),
            ..Default::default()
        };
        if response.body.trim().is_empty() {
            debug!(status = response.status, "Deposit response has no body");
            return receipt;
        }
        if let Err(e) = receipt.read_entry(&response.body) {
            warn!(error = %e, "Deposit response body is not a readable Atom entry");
        }
        receipt
    }

    /// Where the deposited content can be found: the content IRI if the
    /// server gave one, else the `Location` header.
    pub fn content_location(&self) -> Option<&str> {
        self.cont_iri.as_deref().or(self.location.as_deref())
    }

    fn read_entry(&mut self, body: &str) -> Result<(), String> {
        let mut reader = Reader::from_str(body);
        reader.config_mut().trim_text(true);

        let mut depth = 0usize;
        let mut field: Option<String> = None;
        let mut text = String::new();
        loop {
            match reader.read_event().map_err(|e| e.to_string())? {
                Event::Start(start) => {
                    depth += 1;
                    if depth == 2 {
                        self.read_attributes(&start)?;
                        field = Some(local_name(&start));
                        text.clear();
                    }
                }
                Event::Empty(empty) => {
                    if depth == 1 {
                        self.read_attributes(&empty)?;
                    }
                }
                Event::Text(t) => {
                    if depth == 2 {
                        text.push_str(&t.unescape().map_err(|e| e.to_string())?);
                    }
                }
                Event::CData(c) => {
                    if depth == 2 {
                        text.push_str(&String::from_utf8_lossy(&c));
                    }
                }
                Event::End(_) => {
                    if depth == 2 {
                        if let Some(name) = field.take() {
                            self.store_text(&name, std::mem::take(&mut text));
                        }
                    }
                    depth = depth.saturating_sub(1);
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(())
    }

    fn store_text(&mut self, element: &str, value: String) {
        let slot = match element {
            "id" => &mut self.id,
            "title" => &mut self.title,
            "updated" => &mut self.updated,
            "summary" => &mut self.summary,
            "packaging" => {
                self.packaging.push(value);
                return;
            }
            _ => return,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    fn read_attributes(&mut self, element: &BytesStart<'_>) -> Result<(), String> {
        let name = local_name(element);
        let mut rel = None;
        let mut href = None;
        let mut src = None;
        for attr in element.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let value = attr
                .unescape_value()
                .map_err(|e| e.to_string())?
                .into_owned();
            match attr.key.local_name().as_ref() {
                b"rel" => rel = Some(value),
                b"href" => href = Some(value),
                b"src" => src = Some(value),
                _ => {}
            }
        }
        match name.as_str() {
            "content" => {
                if self.cont_iri.is_none() {
                    self.cont_iri = src;
                }
            }
            "link" => {
                let slot = match rel.as_deref() {
                    Some("edit") => &mut self.edit_iri,
                    Some("edit-media") => &mut self.edit_media,
                    Some(SWORD_ADD_REL) => &mut self.se_iri,
                    _ => return Ok(()),
                };
                if slot.is_none() {
                    *slot = href;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

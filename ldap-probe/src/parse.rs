//! Decoding of certified-complete response buffers.
//!
//! The frame layer guarantees every buffer handed here contains whole
//! LDAPMessage frames; truncation inside them is malformation.

use super::ber::{BerValue, Cursor};
use super::controls;
use super::error::Error;
use super::spec;

/// The LDAPResult fields common to every operation response.
#[derive(Debug, Clone, PartialEq)]
pub struct LdapResult {
    pub code: i64,
    pub matched_dn: String,
    pub diagnostic: String,
}

impl LdapResult {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Human-readable rendering: server diagnostic when present,
    /// else the well-known code label.
    pub fn message(&self) -> String {
        if self.diagnostic.is_empty() {
            spec::result_code_message(self.code)
        } else {
            self.diagnostic.clone()
        }
    }

    /// Convert a server-reported failure into the error form.
    pub fn require_success(&self) -> Result<(), Error> {
        if self.success() {
            Ok(())
        } else {
            Err(Error::OperationFailed {
                code: self.code,
                message: self.message(),
            })
        }
    }
}

/// One entry from a Search response.
///
/// Attribute value order is preserved as received; the SET semantics
/// make it meaningless, but round-tripping it intact aids debugging.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchEntry {
    pub dn: String,
    pub attributes: Vec<(String, Vec<String>)>,
}

/// Fully-parsed Search response: entries plus the terminal Done.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub entries: Vec<SearchEntry>,
    pub result: LdapResult,
    /// Paged-results cookie from the Done frame; empty = last page.
    pub cookie: Vec<u8>,
}

/// Parse a single-message response, asserting its protocolOp tag.
///
/// A mismatched tag is a ProtocolError, distinct from any I/O kind.
pub fn parse_result(buf: &[u8], expected_tag: u8) -> Result<LdapResult, Error> {
    let mut outer = Cursor::new(buf);
    let envelope = outer.expect(spec::TAG_SEQUENCE)?;

    let mut cursor = Cursor::new(envelope.content);
    cursor.expect(spec::TAG_INTEGER)?; // messageID

    let op = match cursor.read_tlv()? {
        Some(tlv) if tlv.tag == expected_tag => tlv,
        Some(tlv) => {
            return Err(Error::ProtocolError(format!(
                "expected protocolOp 0x{expected_tag:02X}, found 0x{:02X}",
                tlv.tag
            )))
        }
        None => {
            return Err(Error::ProtocolError(
                "LDAPMessage ends after messageID".to_string(),
            ))
        }
    };

    parse_result_fields(&mut Cursor::new(op.content))
}

/// resultCode, matchedDN, diagnosticMessage.
///
/// Servers always send all three, but the two strings are read
/// leniently: a missing trailing field reads as empty.
fn parse_result_fields(cursor: &mut Cursor) -> Result<LdapResult, Error> {
    let code_tlv = cursor.expect(spec::TAG_ENUMERATED)?;
    let code = super::ber::decode_integer_content(code_tlv.content)?;

    let matched_dn = read_optional_string(cursor)?;
    let diagnostic = read_optional_string(cursor)?;

    Ok(LdapResult {
        code,
        matched_dn,
        diagnostic,
    })
}

fn read_optional_string(cursor: &mut Cursor) -> Result<String, Error> {
    if cursor.peek_tag() != Some(spec::TAG_OCTET_STRING) {
        return Ok(String::new());
    }

    let tlv = cursor.expect(spec::TAG_OCTET_STRING)?;
    Ok(String::from_utf8_lossy(tlv.content).to_string())
}

/// Walk a complete Search response buffer: entries, references
/// (skipped), and the terminal Done with its optional paged cookie.
pub fn parse_search(buf: &[u8]) -> Result<SearchOutcome, Error> {
    let mut outer = Cursor::new(buf);
    let mut entries = Vec::new();

    loop {
        let envelope = match outer.read_tlv()? {
            Some(tlv) if tlv.tag == spec::TAG_SEQUENCE => tlv,
            Some(tlv) => {
                return Err(Error::ProtocolError(format!(
                    "LDAPMessage must open with SEQUENCE, found 0x{:02X}",
                    tlv.tag
                )))
            }
            None => {
                return Err(Error::ProtocolError(
                    "search response ended without SearchResultDone".to_string(),
                ))
            }
        };

        let mut cursor = Cursor::new(envelope.content);
        cursor.expect(spec::TAG_INTEGER)?; // messageID

        let op = match cursor.read_tlv()? {
            Some(tlv) => tlv,
            None => {
                return Err(Error::ProtocolError(
                    "LDAPMessage ends after messageID".to_string(),
                ))
            }
        };

        match op.tag {
            spec::TAG_SEARCH_ENTRY => entries.push(parse_entry(op.content)?),
            spec::TAG_SEARCH_REFERENCE => {
                log::debug!("Skipping SearchResultReference frame");
            }
            spec::TAG_SEARCH_DONE => {
                let result = parse_result_fields(&mut Cursor::new(op.content))?;

                // Controls follow the protocolOp inside the envelope.
                let cookie = match cursor.read_tlv()? {
                    Some(tlv) if tlv.tag == spec::TAG_CONTROLS => {
                        controls::decode_cookie(tlv.content)?
                    }
                    _ => Vec::new(),
                };

                return Ok(SearchOutcome {
                    entries,
                    result,
                    cookie,
                });
            }
            other => {
                return Err(Error::ProtocolError(format!(
                    "unexpected protocolOp 0x{other:02X} in search response"
                )))
            }
        }
    }
}

/// `SearchResultEntry ::= { objectName, attributes SEQUENCE OF
/// PartialAttribute }`
///
/// Values are treated as UTF-8 text; `;binary` transfer is not
/// supported and arrives lossy rather than special-cased.
fn parse_entry(content: &[u8]) -> Result<SearchEntry, Error> {
    let mut cursor = Cursor::new(content);

    let dn_tlv = cursor.expect(spec::TAG_OCTET_STRING)?;
    let dn = String::from_utf8_lossy(dn_tlv.content).to_string();

    let attr_list = cursor.expect(spec::TAG_SEQUENCE)?;
    let items = BerValue::decode_children(attr_list.content)?;

    let mut attributes = Vec::new();

    for item in items {
        match item {
            BerValue::Sequence(fields) => {
                let mut fields = fields.into_iter();

                let name = match fields.next().and_then(|f| f.as_text()) {
                    Some(n) => n,
                    None => {
                        return Err(Error::ProtocolError(
                            "attribute without a type".to_string(),
                        ))
                    }
                };

                let values = match fields.next() {
                    Some(BerValue::Set(vals)) => vals
                        .iter()
                        .map(|v| {
                            v.as_text().ok_or_else(|| {
                                Error::ProtocolError(format!(
                                    "non-string value for attribute {name}"
                                ))
                            })
                        })
                        .collect::<Result<Vec<String>, Error>>()?,
                    _ => {
                        return Err(Error::ProtocolError(format!(
                            "attribute {name} without a value SET"
                        )))
                    }
                };

                attributes.push((name, values));
            }
            _ => {
                return Err(Error::ProtocolError(
                    "attribute list holds a non-SEQUENCE".to_string(),
                ))
            }
        }
    }

    Ok(SearchEntry { dn, attributes })
}

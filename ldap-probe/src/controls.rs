//! RFC 2696 Simple Paged Results control.
//!
//! The server threads an opaque cookie through successive searches;
//! an empty cookie means first page on the way out and last page on
//! the way back.

use super::ber::{self, Cursor};
use super::error::Error;
use super::spec;

/// Build the `[0]` controls section carrying one paged-results
/// control.
///
/// ```text
/// Control ::= SEQUENCE {
///     controlType    LDAPOID,
///     controlValue   OCTET STRING  -- SEQUENCE { size, cookie }
/// }
/// ```
pub fn encode_paged_control(page_size: i64, cookie: &[u8]) -> Vec<u8> {
    let mut value = ber::encode_integer(page_size);
    value.extend_from_slice(&ber::encode_octet_bytes(cookie));
    let value = ber::encode_sequence(&value);

    let mut control = ber::encode_octet_string(spec::PAGED_RESULTS_OID);
    control.extend_from_slice(&ber::encode_octet_bytes(&value));
    let control = ber::encode_sequence(&control);

    ber::encode_tlv(spec::TAG_CONTROLS, &control)
}

/// Extract the paged-results cookie from a controls section body.
///
/// Absence of the control, an OID mismatch, or an empty value all
/// read as an empty cookie: no more pages.
pub fn decode_cookie(controls: &[u8]) -> Result<Vec<u8>, Error> {
    let mut cursor = Cursor::new(controls);

    while !cursor.is_empty() {
        let control = match cursor.read_tlv()? {
            Some(tlv) if tlv.tag == spec::TAG_SEQUENCE => tlv,
            Some(_) => continue,
            None => {
                return Err(Error::ProtocolError(
                    "truncated controls section".to_string(),
                ))
            }
        };

        let mut fields = Cursor::new(control.content);

        let oid = fields.expect(spec::TAG_OCTET_STRING)?;
        if oid.content != spec::PAGED_RESULTS_OID.as_bytes() {
            continue;
        }

        // Optional criticality BOOLEAN between type and value.
        if fields.peek_tag() == Some(spec::TAG_BOOLEAN) {
            fields.expect(spec::TAG_BOOLEAN)?;
        }

        let value = match fields.read_tlv()? {
            Some(tlv) if tlv.tag == spec::TAG_OCTET_STRING => tlv,
            _ => return Ok(Vec::new()),
        };

        // controlValue is itself BER: SEQUENCE { size, cookie }.
        let mut inner = Cursor::new(value.content);
        let body = inner.expect(spec::TAG_SEQUENCE)?;

        let mut body = Cursor::new(body.content);
        body.expect(spec::TAG_INTEGER)?; // estimated total count
        let cookie = body.expect(spec::TAG_OCTET_STRING)?;

        return Ok(cookie.content.to_vec());
    }

    Ok(Vec::new())
}

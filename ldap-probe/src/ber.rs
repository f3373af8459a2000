//! ASN.1 Basic Encoding Rules primitives.
//!
//! Everything on the LDAP wire is tag-length-value.  Encoders return
//! complete TLV byte strings.  Decoders distinguish "need more bytes"
//! (`Ok(None)`) from malformed data (`Err`); truncation is only an
//! error once a buffer has been certified complete by the frame layer.

use super::error::Error;
use super::spec;

/// Longest length-of-length we accept.  Four bytes already describes
/// payloads far beyond the response cap.
const MAX_LENGTH_BYTES: usize = 4;

/// Encode a BER length field.
///
/// Short form for lengths below 128, long form (`0x80 | n` followed by
/// n minimal big-endian bytes) otherwise.
///
/// ```
/// use ldap_probe::ber;
/// assert_eq!(ber::encode_length(5), vec![0x05]);
/// assert_eq!(ber::encode_length(127), vec![0x7F]);
/// assert_eq!(ber::encode_length(128), vec![0x81, 0x80]);
/// assert_eq!(ber::encode_length(256), vec![0x82, 0x01, 0x00]);
/// ```
pub fn encode_length(len: usize) -> Vec<u8> {
    if len < 128 {
        return vec![len as u8];
    }

    let mut bytes: Vec<u8> = len.to_be_bytes().to_vec();
    while bytes.len() > 1 && bytes[0] == 0 {
        bytes.remove(0);
    }

    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.push(0x80 | bytes.len() as u8);
    out.extend_from_slice(&bytes);
    out
}

/// Decode a BER length field starting at `offset`.
///
/// Returns `(length, bytes_consumed)`, or None when the length field
/// itself is not fully present yet.
pub fn decode_length(buf: &[u8], offset: usize) -> Result<Option<(usize, usize)>, Error> {
    let first = match buf.get(offset) {
        Some(b) => *b,
        None => return Ok(None),
    };

    if first & 0x80 == 0 {
        return Ok(Some((first as usize, 1)));
    }

    let count = (first & 0x7F) as usize;
    if count == 0 {
        // Indefinite lengths never appear in LDAP.
        return Err(Error::ProtocolError("indefinite BER length".to_string()));
    }
    if count > MAX_LENGTH_BYTES {
        return Err(Error::ProtocolError(format!(
            "unreasonable BER length-of-length: {count}"
        )));
    }

    if offset + 1 + count > buf.len() {
        return Ok(None);
    }

    let mut len: usize = 0;
    for b in &buf[offset + 1..offset + 1 + count] {
        len = (len << 8) | *b as usize;
    }

    Ok(Some((len, 1 + count)))
}

/// Wrap already-encoded content bytes under a tag.
pub fn encode_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(tag);
    out.extend_from_slice(&encode_length(content.len()));
    out.extend_from_slice(content);
    out
}

/// Minimal two's-complement content bytes for an INTEGER.
///
/// A leading 0x00 is kept when the first content byte would otherwise
/// flip the sign bit; real servers reject anything else.
fn integer_content(value: i64) -> Vec<u8> {
    let mut bytes: Vec<u8> = value.to_be_bytes().to_vec();

    while bytes.len() > 1
        && ((bytes[0] == 0x00 && bytes[1] & 0x80 == 0)
            || (bytes[0] == 0xFF && bytes[1] & 0x80 != 0))
    {
        bytes.remove(0);
    }

    bytes
}

/// Encode an INTEGER TLV.
///
/// ```
/// use ldap_probe::ber;
/// assert_eq!(ber::encode_integer(0), vec![0x02, 0x01, 0x00]);
/// assert_eq!(ber::encode_integer(128), vec![0x02, 0x02, 0x00, 0x80]);
/// assert_eq!(ber::encode_integer(-128), vec![0x02, 0x01, 0x80]);
/// ```
pub fn encode_integer(value: i64) -> Vec<u8> {
    encode_tlv(spec::TAG_INTEGER, &integer_content(value))
}

/// Encode an ENUMERATED TLV.  LDAP enumerations all fit in one byte.
pub fn encode_enumerated(value: i64) -> Vec<u8> {
    encode_tlv(spec::TAG_ENUMERATED, &integer_content(value))
}

/// Encode a BOOLEAN TLV (0xFF = true per BER).
pub fn encode_boolean(value: bool) -> Vec<u8> {
    encode_tlv(spec::TAG_BOOLEAN, &[if value { 0xFF } else { 0x00 }])
}

/// Encode an OCTET STRING TLV from UTF-8 text.
pub fn encode_octet_string(value: &str) -> Vec<u8> {
    encode_tlv(spec::TAG_OCTET_STRING, value.as_bytes())
}

/// Encode an OCTET STRING TLV from raw bytes (paging cookies).
pub fn encode_octet_bytes(value: &[u8]) -> Vec<u8> {
    encode_tlv(spec::TAG_OCTET_STRING, value)
}

/// Wrap already-encoded children in a SEQUENCE.
pub fn encode_sequence(children: &[u8]) -> Vec<u8> {
    encode_tlv(spec::TAG_SEQUENCE, children)
}

/// Wrap already-encoded children in a SET.
pub fn encode_set(children: &[u8]) -> Vec<u8> {
    encode_tlv(spec::TAG_SET, children)
}

/// Decode two's-complement INTEGER/ENUMERATED content bytes.
pub fn decode_integer_content(content: &[u8]) -> Result<i64, Error> {
    if content.is_empty() {
        return Err(Error::ProtocolError("empty INTEGER content".to_string()));
    }
    if content.len() > 8 {
        return Err(Error::ProtocolError(format!(
            "INTEGER too wide: {} bytes",
            content.len()
        )));
    }

    // Sign-extend into a full 8-byte buffer; no shifting, no
    // overflow on hostile max-width values.
    let fill = if content[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut bytes = [fill; 8];
    bytes[8 - content.len()..].copy_from_slice(content);

    Ok(i64::from_be_bytes(bytes))
}

/// One decoded tag-length-value unit, borrowing its content.
#[derive(Debug, PartialEq)]
pub struct Tlv<'a> {
    pub tag: u8,
    pub content: &'a [u8],
}

/// Bounds-checked view over a byte buffer.
///
/// Replaces manual offset arithmetic; every read either yields data,
/// reports "not fully present", or reports malformation.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Tag byte of the next TLV, if any bytes remain.
    pub fn peek_tag(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Read the next TLV, advancing past it.
    ///
    /// `Ok(None)` means the buffer ends before the TLV does.
    pub fn read_tlv(&mut self) -> Result<Option<Tlv<'a>>, Error> {
        if self.is_empty() {
            return Ok(None);
        }

        let tag = self.buf[self.pos];

        let (len, len_bytes) = match decode_length(self.buf, self.pos + 1)? {
            Some(v) => v,
            None => return Ok(None),
        };

        let start = self.pos + 1 + len_bytes;
        let end = start + len;
        if end > self.buf.len() {
            return Ok(None);
        }

        self.pos = end;

        Ok(Some(Tlv {
            tag,
            content: &self.buf[start..end],
        }))
    }

    /// Read the next TLV and require a specific tag.
    ///
    /// For use on buffers already certified complete: a missing TLV
    /// here is malformation, not "read more".
    pub fn expect(&mut self, tag: u8) -> Result<Tlv<'a>, Error> {
        match self.read_tlv()? {
            Some(tlv) if tlv.tag == tag => Ok(tlv),
            Some(tlv) => Err(Error::ProtocolError(format!(
                "expected tag 0x{tag:02X}, found 0x{:02X}",
                tlv.tag
            ))),
            None => Err(Error::ProtocolError(format!(
                "truncated data while expecting tag 0x{tag:02X}"
            ))),
        }
    }
}

/// A decoded BER value as a sum type.
///
/// LDAP only ever hands us a handful of shapes; making them explicit
/// keeps the parser's matching exhaustive.
#[derive(Debug, Clone, PartialEq)]
pub enum BerValue {
    Integer(i64),
    Text(String),
    Bytes(Vec<u8>),
    Sequence(Vec<BerValue>),
    Set(Vec<BerValue>),
}

impl BerValue {
    /// Decode one TLV (recursively for constructed types) from a
    /// complete buffer.
    pub fn decode(tlv: &Tlv) -> Result<BerValue, Error> {
        match tlv.tag {
            spec::TAG_INTEGER | spec::TAG_ENUMERATED => {
                Ok(BerValue::Integer(decode_integer_content(tlv.content)?))
            }
            spec::TAG_OCTET_STRING => match std::str::from_utf8(tlv.content) {
                Ok(s) => Ok(BerValue::Text(s.to_string())),
                Err(_) => Ok(BerValue::Bytes(tlv.content.to_vec())),
            },
            spec::TAG_SEQUENCE => Ok(BerValue::Sequence(Self::decode_children(tlv.content)?)),
            spec::TAG_SET => Ok(BerValue::Set(Self::decode_children(tlv.content)?)),
            other => Err(Error::ProtocolError(format!(
                "unexpected tag 0x{other:02X} in value position"
            ))),
        }
    }

    /// Decode every TLV in a complete constructed-type body.
    pub fn decode_children(content: &[u8]) -> Result<Vec<BerValue>, Error> {
        let mut cursor = Cursor::new(content);
        let mut children = Vec::new();

        while !cursor.is_empty() {
            match cursor.read_tlv()? {
                Some(tlv) => children.push(Self::decode(&tlv)?),
                None => {
                    return Err(Error::ProtocolError(
                        "truncated constructed value".to_string(),
                    ))
                }
            }
        }

        Ok(children)
    }

    /// The value as text, lossy for non-UTF-8 octet strings.
    pub fn as_text(&self) -> Option<String> {
        match self {
            BerValue::Text(s) => Some(s.clone()),
            BerValue::Bytes(b) => Some(String::from_utf8_lossy(b).to_string()),
            _ => None,
        }
    }
}

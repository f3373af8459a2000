//! Streaming reassembly of TLV-framed LDAP responses.
//!
//! LDAP has no transport-level length header; completion is decided
//! by decoding the outer SEQUENCE lengths of the accumulated bytes.
//! Reads may split a frame anywhere, including inside a long-form
//! length field or inside the controls of the final Search frame.

use super::ber;
use super::error::Error;
use super::spec;

/// How many LDAPMessage frames make up one response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameMode {
    /// Exactly one frame (Bind, Add, Modify, Delete responses).
    Single,

    /// Frames accumulate until a SearchResultDone frame is fully
    /// present, controls included.
    UntilSearchDone,
}

/// Accumulates raw socket reads and certifies response completion.
pub struct FrameAssembler {
    mode: FrameMode,
    buf: Vec<u8>,
    max_bytes: usize,
}

impl FrameAssembler {
    pub fn new(mode: FrameMode) -> Self {
        Self::with_cap(mode, spec::MAX_RESPONSE_BYTES)
    }

    /// Mostly for tests; production uses `spec::MAX_RESPONSE_BYTES`.
    pub fn with_cap(mode: FrameMode, max_bytes: usize) -> Self {
        FrameAssembler {
            mode,
            buf: Vec::new(),
            max_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Append one socket read.  Returns true once the response is
    /// complete; the buffer is then available via [`Self::into_bytes`].
    pub fn push(&mut self, chunk: &[u8]) -> Result<bool, Error> {
        self.buf.extend_from_slice(chunk);

        if self.buf.len() > self.max_bytes {
            return Err(Error::ResponseTooLarge);
        }

        self.complete()
    }

    /// Completion check against the current buffer.
    pub fn complete(&self) -> Result<bool, Error> {
        match self.mode {
            FrameMode::Single => Ok(frame_length(&self.buf, 0)?.is_some()),
            FrameMode::UntilSearchDone => scan_for_search_done(&self.buf),
        }
    }

    /// Certified-complete response bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Header and payload sizes of the frame starting at `offset`, or
/// None when the frame is not yet fully buffered.
///
/// The outer tag must be SEQUENCE; anything else is malformation, not
/// a short read.
fn frame_bounds(buf: &[u8], offset: usize) -> Result<Option<(usize, usize)>, Error> {
    let tag = match buf.get(offset) {
        Some(t) => *t,
        None => return Ok(None),
    };

    if tag != spec::TAG_SEQUENCE {
        return Err(Error::ProtocolError(format!(
            "LDAPMessage must open with SEQUENCE, found 0x{tag:02X}"
        )));
    }

    let (payload_len, len_bytes) = match ber::decode_length(buf, offset + 1)? {
        Some(v) => v,
        None => return Ok(None),
    };

    let header = 1 + len_bytes;
    if offset + header + payload_len > buf.len() {
        return Ok(None);
    }

    Ok(Some((header, payload_len)))
}

/// Total wire length of the frame starting at `offset` (tag + length
/// header + declared payload), or None when not yet fully buffered.
pub fn frame_length(buf: &[u8], offset: usize) -> Result<Option<usize>, Error> {
    Ok(frame_bounds(buf, offset)?.map(|(header, payload)| header + payload))
}

/// protocolOp tag of a fully-buffered frame: skip the messageID TLV,
/// the next tag byte is the operation.
fn frame_op_tag(frame: &[u8]) -> Result<u8, Error> {
    let mut cursor = ber::Cursor::new(frame);
    cursor.expect(spec::TAG_INTEGER)?;

    cursor.peek_tag().ok_or_else(|| {
        Error::ProtocolError("LDAPMessage ends after messageID".to_string())
    })
}

/// Walk consecutive complete frames looking for SearchResultDone.
///
/// A frame whose length header or payload (controls included) is
/// still short keeps the whole response incomplete.
fn scan_for_search_done(buf: &[u8]) -> Result<bool, Error> {
    let mut offset = 0;

    loop {
        let (header, payload) = match frame_bounds(buf, offset)? {
            Some(b) => b,
            None => return Ok(false),
        };

        let frame = &buf[offset + header..offset + header + payload];
        if frame_op_tag(frame)? == spec::TAG_SEARCH_DONE {
            return Ok(true);
        }

        offset += header + payload;
    }
}

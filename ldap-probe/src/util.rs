//! Small helpers shared across the crate.

use super::error::Error;

/// Lowercase hex rendering of opaque bytes (paging cookies).
///
/// ```
/// use ldap_probe::util;
/// assert_eq!(util::hex_encode(&[0x01, 0xAB]), "01ab");
/// assert_eq!(util::hex_encode(&[]), "");
/// ```
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Inverse of [`hex_encode`].
///
/// ```
/// use ldap_probe::util;
/// assert_eq!(util::hex_decode("01ab").unwrap(), vec![0x01, 0xAB]);
/// assert!(util::hex_decode("0").is_err());
/// assert!(util::hex_decode("zz").is_err());
/// ```
pub fn hex_decode(text: &str) -> Result<Vec<u8>, Error> {
    if text.len() % 2 != 0 {
        return Err(Error::RequestFormatError(format!(
            "odd-length hex cookie: {text}"
        )));
    }

    let mut out = Vec::with_capacity(text.len() / 2);
    let bytes = text.as_bytes();

    for pair in bytes.chunks(2) {
        let s = std::str::from_utf8(pair)
            .map_err(|_| Error::RequestFormatError("non-ascii hex cookie".to_string()))?;
        let b = u8::from_str_radix(s, 16)
            .map_err(|_| Error::RequestFormatError(format!("invalid hex cookie: {text}")))?;
        out.push(b);
    }

    Ok(out)
}

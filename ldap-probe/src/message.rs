//! LDAPMessage envelope and request builders.
//!
//! Every request is `SEQUENCE { messageID, protocolOp, controls? }`.
//! Builders return finished wire bytes; nothing here touches a socket.

use super::ber;
use super::error::Error;
use super::params::{ModifyChange, ModifyOp, Scope};
use super::spec;

/// Wrap a protocolOp (and optional controls section) in the outer
/// LDAPMessage SEQUENCE.
pub fn build_message(msg_id: i64, op: &[u8], controls: Option<&[u8]>) -> Vec<u8> {
    let mut body = ber::encode_integer(msg_id);
    body.extend_from_slice(op);
    if let Some(c) = controls {
        body.extend_from_slice(c);
    }
    ber::encode_sequence(&body)
}

/// BindRequest with simple (DN + password) authentication.
///
/// Empty DN and password produce an anonymous bind.
pub fn build_bind(msg_id: i64, bind_dn: &str, password: &str) -> Vec<u8> {
    let mut body = ber::encode_integer(spec::LDAP_VERSION);
    body.extend_from_slice(&ber::encode_octet_string(bind_dn));
    body.extend_from_slice(&ber::encode_tlv(spec::TAG_SIMPLE_AUTH, password.as_bytes()));

    build_message(msg_id, &ber::encode_tlv(spec::TAG_BIND_REQUEST, &body), None)
}

/// UnbindRequest.  APPLICATION 2, NULL body, no response defined.
pub fn build_unbind(msg_id: i64) -> Vec<u8> {
    build_message(msg_id, &ber::encode_tlv(spec::TAG_UNBIND_REQUEST, &[]), None)
}

/// SearchRequest.
///
/// `filter` must already be compiled via [`compile_filter`];
/// `controls` is the optional paged-results section.
pub fn build_search(
    msg_id: i64,
    base_dn: &str,
    scope: Scope,
    size_limit: i64,
    filter: &[u8],
    attributes: &[String],
    controls: Option<&[u8]>,
) -> Vec<u8> {
    let mut body = ber::encode_octet_string(base_dn);
    body.extend_from_slice(&ber::encode_enumerated(scope as i64));
    // derefAliases: neverDerefAliases
    body.extend_from_slice(&ber::encode_enumerated(0));
    body.extend_from_slice(&ber::encode_integer(size_limit));
    // timeLimit: unlimited; our own deadline governs the request
    body.extend_from_slice(&ber::encode_integer(0));
    body.extend_from_slice(&ber::encode_boolean(false));
    body.extend_from_slice(filter);

    let mut attrs = Vec::new();
    for attr in attributes {
        attrs.extend_from_slice(&ber::encode_octet_string(attr));
    }
    body.extend_from_slice(&ber::encode_sequence(&attrs));

    build_message(
        msg_id,
        &ber::encode_tlv(spec::TAG_SEARCH_REQUEST, &body),
        controls,
    )
}

/// AddRequest from an ordered attribute list.
pub fn build_add(msg_id: i64, dn: &str, attributes: &[(String, Vec<String>)]) -> Vec<u8> {
    let mut body = ber::encode_octet_string(dn);

    let mut attr_list = Vec::new();
    for (name, values) in attributes {
        attr_list.extend_from_slice(&encode_attribute(name, values));
    }
    body.extend_from_slice(&ber::encode_sequence(&attr_list));

    build_message(msg_id, &ber::encode_tlv(spec::TAG_ADD_REQUEST, &body), None)
}

/// ModifyRequest from a change list.
pub fn build_modify(msg_id: i64, dn: &str, changes: &[ModifyChange]) -> Vec<u8> {
    let mut body = ber::encode_octet_string(dn);

    let mut change_list = Vec::new();
    for change in changes {
        let op = match change.operation {
            ModifyOp::Add => spec::MOD_OP_ADD,
            ModifyOp::Delete => spec::MOD_OP_DELETE,
            ModifyOp::Replace => spec::MOD_OP_REPLACE,
        };

        let mut one = ber::encode_enumerated(op);
        one.extend_from_slice(&encode_attribute(&change.attribute, &change.values));
        change_list.extend_from_slice(&ber::encode_sequence(&one));
    }
    body.extend_from_slice(&ber::encode_sequence(&change_list));

    build_message(msg_id, &ber::encode_tlv(spec::TAG_MODIFY_REQUEST, &body), None)
}

/// DelRequest.  APPLICATION 10, primitive; the content *is* the DN.
pub fn build_delete(msg_id: i64, dn: &str) -> Vec<u8> {
    build_message(msg_id, &ber::encode_tlv(spec::TAG_DEL_REQUEST, dn.as_bytes()), None)
}

/// `PartialAttribute ::= SEQUENCE { type, vals SET OF value }`
fn encode_attribute(name: &str, values: &[String]) -> Vec<u8> {
    let mut vals = Vec::new();
    for v in values {
        vals.extend_from_slice(&ber::encode_octet_string(v));
    }

    let mut attr = ber::encode_octet_string(name);
    attr.extend_from_slice(&ber::encode_set(&vals));
    ber::encode_sequence(&attr)
}

/// Compile the supported filter subset to wire bytes.
///
/// Presence `(attr=*)` and equality `(attr=value)` only.  Anything
/// else fails fast before a socket ever opens; a silently-wrong
/// filter would be worse than no result at all.
///
/// ```
/// use ldap_probe::message::compile_filter;
/// assert_eq!(
///     compile_filter("(objectClass=*)").unwrap(),
///     vec![0x87, 0x0B, b'o', b'b', b'j', b'e', b'c', b't',
///          b'C', b'l', b'a', b's', b's']
/// );
/// assert!(compile_filter("(&(a=1)(b=2))").is_err());
/// ```
pub fn compile_filter(filter: &str) -> Result<Vec<u8>, Error> {
    let trimmed = filter.trim();

    let inner = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    if inner.is_empty() {
        return Err(Error::UnsupportedFilter("empty filter".to_string()));
    }

    if inner.starts_with('&') || inner.starts_with('|') || inner.starts_with('!') {
        return Err(Error::UnsupportedFilter(format!(
            "composite filters are not supported: {filter}"
        )));
    }

    let (attr, value) = match inner.split_once('=') {
        Some(pair) => pair,
        None => {
            return Err(Error::UnsupportedFilter(format!(
                "filter has no '=': {filter}"
            )))
        }
    };

    if attr.is_empty() || attr.contains('(') || attr.contains(')') {
        return Err(Error::UnsupportedFilter(format!(
            "malformed attribute description: {filter}"
        )));
    }

    // Approximate (>=, <=, ~=) matches land here with the marker
    // still attached to the attribute name.
    if attr.ends_with('>') || attr.ends_with('<') || attr.ends_with('~') {
        return Err(Error::UnsupportedFilter(format!(
            "only equality and presence matches are supported: {filter}"
        )));
    }

    if value == "*" {
        return Ok(ber::encode_tlv(spec::TAG_FILTER_PRESENT, attr.as_bytes()));
    }

    if value.contains('*') {
        return Err(Error::UnsupportedFilter(format!(
            "substring filters are not supported: {filter}"
        )));
    }

    let mut body = ber::encode_octet_string(attr);
    body.extend_from_slice(&ber::encode_octet_string(value));
    Ok(ber::encode_tlv(spec::TAG_FILTER_EQUALITY, &body))
}

//! LDAP v3 wire-level constants (RFC 4511) plus the RFC 2696 paged
//! results control, as a collection of static values.

/// Default LDAP port for plain TCP.
pub const DEFAULT_PORT: u16 = 389;

/// Protocol version sent in every BindRequest.
pub const LDAP_VERSION: i64 = 3;

/// controlType of the Simple Paged Results control.
pub const PAGED_RESULTS_OID: &str = "1.2.840.113556.1.4.319";

/// Default whole-request deadline when the caller supplies none.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Upper clamp for caller-supplied timeouts.
pub const MAX_TIMEOUT_SECS: u64 = 60;

/// Reassembly aborts with ResponseTooLarge past this many bytes.
pub const MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

// --- Universal tags ---

pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_ENUMERATED: u8 = 0x0A;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_SET: u8 = 0x31;

// --- Application tags (protocolOp) ---

pub const TAG_BIND_REQUEST: u8 = 0x60;
pub const TAG_BIND_RESPONSE: u8 = 0x61;
pub const TAG_UNBIND_REQUEST: u8 = 0x42;
pub const TAG_SEARCH_REQUEST: u8 = 0x63;
pub const TAG_SEARCH_ENTRY: u8 = 0x64;
pub const TAG_SEARCH_DONE: u8 = 0x65;
pub const TAG_MODIFY_REQUEST: u8 = 0x66;
pub const TAG_MODIFY_RESPONSE: u8 = 0x67;
pub const TAG_ADD_REQUEST: u8 = 0x68;
pub const TAG_ADD_RESPONSE: u8 = 0x69;
pub const TAG_DEL_REQUEST: u8 = 0x4A;
pub const TAG_DEL_RESPONSE: u8 = 0x6B;
pub const TAG_SEARCH_REFERENCE: u8 = 0x73;

// --- Context tags ---

/// `[0]` controls section of an LDAPMessage.
pub const TAG_CONTROLS: u8 = 0xA0;

/// `[0]` simple authentication choice of a BindRequest.
pub const TAG_SIMPLE_AUTH: u8 = 0x80;

/// `[3]` equalityMatch filter.
pub const TAG_FILTER_EQUALITY: u8 = 0xA3;

/// `[7]` present filter.
pub const TAG_FILTER_PRESENT: u8 = 0x87;

// --- Modify change operations ---

pub const MOD_OP_ADD: i64 = 0;
pub const MOD_OP_DELETE: i64 = 1;
pub const MOD_OP_REPLACE: i64 = 2;

/// Well-known resultCode labels per RFC 4511 Appendix A.
///
/// Returns None for codes we have no label for; see
/// [`result_code_message`] for the catch-all rendering.
pub fn result_code_label(code: i64) -> Option<&'static str> {
    let label = match code {
        0 => "success",
        1 => "operationsError",
        2 => "protocolError",
        3 => "timeLimitExceeded",
        4 => "sizeLimitExceeded",
        5 => "compareFalse",
        6 => "compareTrue",
        7 => "authMethodNotSupported",
        8 => "strongerAuthRequired",
        10 => "referral",
        11 => "adminLimitExceeded",
        12 => "unavailableCriticalExtension",
        13 => "confidentialityRequired",
        16 => "noSuchAttribute",
        17 => "undefinedAttributeType",
        18 => "inappropriateMatching",
        19 => "constraintViolation",
        20 => "attributeOrValueExists",
        21 => "invalidAttributeSyntax",
        32 => "noSuchObject",
        33 => "aliasProblem",
        34 => "invalidDNSyntax",
        36 => "aliasDereferencingProblem",
        48 => "inappropriateAuthentication",
        49 => "invalidCredentials",
        50 => "insufficientAccessRights",
        51 => "busy",
        52 => "unavailable",
        53 => "unwillingToPerform",
        54 => "loopDetect",
        64 => "namingViolation",
        65 => "objectClassViolation",
        66 => "notAllowedOnNonLeaf",
        67 => "notAllowedOnRDN",
        68 => "entryAlreadyExists",
        69 => "objectClassModsProhibited",
        71 => "affectsMultipleDSAs",
        80 => "other",
        _ => return None,
    };

    Some(label)
}

/// Human-readable rendering of a resultCode.
///
/// ```
/// use ldap_probe::spec;
/// assert_eq!(spec::result_code_message(49), "invalidCredentials");
/// assert_eq!(spec::result_code_message(123), "LDAP result code: 123");
/// ```
pub fn result_code_message(code: i64) -> String {
    match result_code_label(code) {
        Some(label) => label.to_string(),
        None => format!("LDAP result code: {code}"),
    }
}

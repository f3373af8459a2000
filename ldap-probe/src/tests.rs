use super::ber;
use super::ber::Cursor;
use super::client::{run_add, run_delete, run_modify, run_search, Session};
use super::connection::{Connection, Deadline, OriginGate};
use super::controls;
use super::error::Error;
use super::frame::{FrameAssembler, FrameMode};
use super::message;
use super::params::{
    AddParams, ConnectParams, DeleteParams, ModifyOp, ModifyParams, Scope, SearchParams,
};
use super::parse;
use super::spec;
use super::util;
use std::io::prelude::*;
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

// --- fixture builders ---

fn result_response(tag: u8, msg_id: i64, code: i64, diag: &str) -> Vec<u8> {
    let mut body = ber::encode_enumerated(code);
    body.extend_from_slice(&ber::encode_octet_string(""));
    body.extend_from_slice(&ber::encode_octet_string(diag));
    message::build_message(msg_id, &ber::encode_tlv(tag, &body), None)
}

fn entry_frame(msg_id: i64, dn: &str, attrs: &[(&str, &[&str])]) -> Vec<u8> {
    let mut list = Vec::new();
    for (name, values) in attrs {
        let mut vals = Vec::new();
        for v in *values {
            vals.extend_from_slice(&ber::encode_octet_string(v));
        }
        let mut one = ber::encode_octet_string(name);
        one.extend_from_slice(&ber::encode_set(&vals));
        list.extend_from_slice(&ber::encode_sequence(&one));
    }

    let mut body = ber::encode_octet_string(dn);
    body.extend_from_slice(&ber::encode_sequence(&list));

    message::build_message(msg_id, &ber::encode_tlv(spec::TAG_SEARCH_ENTRY, &body), None)
}

fn done_frame(msg_id: i64, code: i64, cookie: Option<&[u8]>) -> Vec<u8> {
    let mut body = ber::encode_enumerated(code);
    body.extend_from_slice(&ber::encode_octet_string(""));
    body.extend_from_slice(&ber::encode_octet_string(""));
    let op = ber::encode_tlv(spec::TAG_SEARCH_DONE, &body);

    let section = cookie.map(|c| controls::encode_paged_control(0, c));
    message::build_message(msg_id, &op, section.as_deref())
}

/// Read one request frame off a test server socket.  None on EOF.
fn read_frame(sock: &mut TcpStream) -> Option<Vec<u8>> {
    let mut assembler = FrameAssembler::new(FrameMode::Single);
    let mut buf = [0u8; 512];

    loop {
        let num_bytes = sock.read(&mut buf).unwrap();
        if num_bytes == 0 {
            return None;
        }
        if assembler.push(&buf[..num_bytes]).unwrap() {
            return Some(assembler.into_bytes());
        }
    }
}

/// Cookie echoed in a received SearchRequest's controls, if any.
fn request_cookie(request: &[u8]) -> Vec<u8> {
    let mut outer = Cursor::new(request);
    let envelope = outer.expect(spec::TAG_SEQUENCE).unwrap();

    let mut cursor = Cursor::new(envelope.content);
    cursor.expect(spec::TAG_INTEGER).unwrap();
    cursor.read_tlv().unwrap().unwrap(); // protocolOp

    match cursor.read_tlv().unwrap() {
        Some(tlv) if tlv.tag == spec::TAG_CONTROLS => {
            controls::decode_cookie(tlv.content).unwrap()
        }
        _ => Vec::new(),
    }
}

// --- BER primitives ---

#[test]
fn length_round_trips() {
    for n in [0usize, 1, 127, 128, 255, 256, 65535, 65536] {
        let encoded = ber::encode_length(n);
        let decoded = ber::decode_length(&encoded, 0).unwrap();
        assert_eq!(decoded, Some((n, encoded.len())), "length {n}");
    }
}

#[test]
fn length_forms() {
    assert_eq!(ber::encode_length(0), vec![0x00]);
    assert_eq!(ber::encode_length(127), vec![0x7F]);
    assert_eq!(ber::encode_length(128), vec![0x81, 0x80]);
    assert_eq!(ber::encode_length(255), vec![0x81, 0xFF]);
    assert_eq!(ber::encode_length(256), vec![0x82, 0x01, 0x00]);
    assert_eq!(ber::encode_length(65536), vec![0x83, 0x01, 0x00, 0x00]);
}

#[test]
fn length_incomplete_vs_malformed() {
    // Long-form header cut short: need more bytes, not an error.
    assert_eq!(ber::decode_length(&[0x82, 0x01], 0).unwrap(), None);
    assert_eq!(ber::decode_length(&[], 0).unwrap(), None);

    // Indefinite form never appears in LDAP.
    assert!(ber::decode_length(&[0x80], 0).is_err());
}

#[test]
fn integer_round_trips() {
    for v in [-128i64, -1, 0, 1, 127, 128, 255, 256, 65535, 65536] {
        let encoded = ber::encode_integer(v);
        let mut cursor = Cursor::new(&encoded);
        let tlv = cursor.read_tlv().unwrap().unwrap();
        assert_eq!(tlv.tag, spec::TAG_INTEGER);
        assert_eq!(ber::decode_integer_content(tlv.content).unwrap(), v, "value {v}");
    }
}

#[test]
fn integer_sign_disambiguation() {
    // Positive values with the high bit set need a 0x00 prefix.
    assert_eq!(ber::encode_integer(128), vec![0x02, 0x02, 0x00, 0x80]);
    assert_eq!(ber::encode_integer(255), vec![0x02, 0x02, 0x00, 0xFF]);
    assert_eq!(ber::encode_integer(127), vec![0x02, 0x01, 0x7F]);
    assert_eq!(ber::encode_integer(-1), vec![0x02, 0x01, 0xFF]);
    assert_eq!(ber::encode_integer(-128), vec![0x02, 0x01, 0x80]);
}

#[test]
fn octet_string_round_trips() {
    for len in [0usize, 1, 127, 128, 255, 256] {
        let text = "a".repeat(len);
        let encoded = ber::encode_octet_string(&text);
        let mut cursor = Cursor::new(&encoded);
        let tlv = cursor.read_tlv().unwrap().unwrap();
        assert_eq!(tlv.tag, spec::TAG_OCTET_STRING);
        assert_eq!(tlv.content, text.as_bytes(), "length {len}");
        assert!(cursor.is_empty());
    }
}

#[test]
fn boolean_encoding() {
    assert_eq!(ber::encode_boolean(true), vec![0x01, 0x01, 0xFF]);
    assert_eq!(ber::encode_boolean(false), vec![0x01, 0x01, 0x00]);
}

#[test]
fn cursor_expect_flags_wrong_tag() {
    let encoded = ber::encode_integer(5);
    let mut cursor = Cursor::new(&encoded);
    match cursor.expect(spec::TAG_OCTET_STRING) {
        Err(Error::ProtocolError(_)) => (),
        other => panic!("expected ProtocolError, got {other:?}"),
    }
}

// --- filters ---

#[test]
fn presence_filter() {
    let bytes = message::compile_filter("(objectClass=*)").unwrap();
    assert_eq!(bytes[0], spec::TAG_FILTER_PRESENT);
    assert_eq!(&bytes[2..], b"objectClass");
}

#[test]
fn equality_filter() {
    let bytes = message::compile_filter("(cn=alice)").unwrap();
    assert_eq!(bytes[0], spec::TAG_FILTER_EQUALITY);

    let mut cursor = Cursor::new(&bytes[2..]);
    assert_eq!(cursor.expect(spec::TAG_OCTET_STRING).unwrap().content, b"cn");
    assert_eq!(
        cursor.expect(spec::TAG_OCTET_STRING).unwrap().content,
        b"alice"
    );
}

#[test]
fn unsupported_filters_fail_fast() {
    for filter in [
        "(&(a=1)(b=2))",
        "(|(a=1)(b=2))",
        "(!(a=1))",
        "(cn=ali*e)",
        "(cn>=5)",
        "(cn<=5)",
        "(cn~=alice)",
        "(nonsense)",
        "",
    ] {
        match message::compile_filter(filter) {
            Err(Error::UnsupportedFilter(_)) => (),
            other => panic!("filter {filter:?} yielded {other:?}"),
        }
    }
}

// --- frame reassembly ---

#[test]
fn single_frame_length_boundaries() {
    // Payload sizes straddling both length forms.
    for payload_len in [0usize, 1, 127, 128, 255, 256] {
        let frame = ber::encode_tlv(spec::TAG_SEQUENCE, &vec![0u8; payload_len]);

        for split in 0..=frame.len() {
            let mut assembler = FrameAssembler::new(FrameMode::Single);

            let done = assembler.push(&frame[..split]).unwrap();
            assert_eq!(done, split == frame.len(), "payload {payload_len} split {split}");

            if !done {
                assert!(assembler.push(&frame[split..]).unwrap());
            }
        }
    }
}

#[test]
fn single_frame_ignores_trailing_bytes_requirement() {
    // A complete frame followed by garbage is still complete; the
    // parser only reads the first frame.
    let mut bytes = result_response(spec::TAG_BIND_RESPONSE, 1, 0, "");
    let frame_len = bytes.len();
    bytes.push(0xAA);

    let mut assembler = FrameAssembler::new(FrameMode::Single);
    assert!(assembler.push(&bytes).unwrap());
    assert_eq!(assembler.len(), frame_len + 1);
}

#[test]
fn search_split_invariance() {
    // Entries plus a Done carrying a paged cookie in its controls;
    // every possible two-chunk split must behave identically,
    // including splits inside the controls length fields.
    let mut fixture = entry_frame(
        2,
        "cn=alice,dc=example,dc=com",
        &[("cn", &["alice"]), ("mail", &["alice@example.com"])],
    );
    fixture.extend_from_slice(&entry_frame(
        2,
        "cn=bob,dc=example,dc=com",
        &[("cn", &["bob"])],
    ));
    fixture.extend_from_slice(&done_frame(2, 0, Some(b"opaque-cookie-1234")));

    let whole = parse::parse_search(&fixture).unwrap();
    assert_eq!(whole.entries.len(), 2);
    assert_eq!(whole.cookie, b"opaque-cookie-1234");

    for split in 0..=fixture.len() {
        let mut assembler = FrameAssembler::new(FrameMode::UntilSearchDone);

        let done = assembler.push(&fixture[..split]).unwrap();
        assert_eq!(done, split == fixture.len(), "split {split}");

        if !done {
            assert!(assembler.push(&fixture[split..]).unwrap(), "split {split}");
        }

        assert_eq!(parse::parse_search(&assembler.into_bytes()).unwrap(), whole);
    }
}

#[test]
fn search_stream_waits_for_done() {
    // Entries alone never complete the response.
    let entries = entry_frame(2, "cn=alice,dc=example,dc=com", &[("cn", &["alice"])]);

    let mut assembler = FrameAssembler::new(FrameMode::UntilSearchDone);
    assert!(!assembler.push(&entries).unwrap());
}

#[test]
fn assembler_rejects_oversized_responses() {
    let mut assembler = FrameAssembler::with_cap(FrameMode::Single, 16);
    match assembler.push(&[0u8; 32]) {
        Err(Error::ResponseTooLarge) => (),
        other => panic!("expected ResponseTooLarge, got {other:?}"),
    }
}

#[test]
fn assembler_rejects_non_sequence_frames() {
    let mut assembler = FrameAssembler::new(FrameMode::Single);
    match assembler.push(&[0x04, 0x01, 0x00]) {
        Err(Error::ProtocolError(_)) => (),
        other => panic!("expected ProtocolError, got {other:?}"),
    }
}

// --- parsing ---

#[test]
fn parse_result_fields() {
    let bytes = result_response(spec::TAG_ADD_RESPONSE, 2, 68, "entry exists");
    let result = parse::parse_result(&bytes, spec::TAG_ADD_RESPONSE).unwrap();

    assert!(!result.success());
    assert_eq!(result.code, 68);
    assert_eq!(result.message(), "entry exists");
    assert!(result.require_success().is_err());
}

#[test]
fn parse_result_tag_mismatch() {
    let bytes = result_response(spec::TAG_BIND_RESPONSE, 1, 0, "");
    match parse::parse_result(&bytes, spec::TAG_MODIFY_RESPONSE) {
        Err(Error::ProtocolError(_)) => (),
        other => panic!("expected ProtocolError, got {other:?}"),
    }
}

#[test]
fn result_code_table() {
    let ok = parse::parse_result(
        &result_response(spec::TAG_BIND_RESPONSE, 1, 0, ""),
        spec::TAG_BIND_RESPONSE,
    )
    .unwrap();
    assert_eq!(ok.message(), "success");

    let unknown = parse::parse_result(
        &result_response(spec::TAG_BIND_RESPONSE, 1, 117, ""),
        spec::TAG_BIND_RESPONSE,
    )
    .unwrap();
    assert_eq!(unknown.message(), "LDAP result code: 117");
}

#[test]
fn entry_value_order_preserved() {
    let bytes = entry_frame(
        2,
        "cn=x",
        &[("memberOf", &["cn=z,dc=a", "cn=a,dc=a", "cn=m,dc=a"])],
    );
    let mut fixture = bytes;
    fixture.extend_from_slice(&done_frame(2, 0, None));

    let outcome = parse::parse_search(&fixture).unwrap();
    assert_eq!(
        outcome.entries[0].attributes[0].1,
        vec!["cn=z,dc=a", "cn=a,dc=a", "cn=m,dc=a"]
    );
}

// --- paged results control ---

#[test]
fn paged_control_round_trip() {
    let section = controls::encode_paged_control(50, b"abc123");

    let mut cursor = Cursor::new(&section);
    let tlv = cursor.expect(spec::TAG_CONTROLS).unwrap();
    assert_eq!(controls::decode_cookie(tlv.content).unwrap(), b"abc123");
}

#[test]
fn missing_or_foreign_controls_mean_no_more_pages() {
    assert!(controls::decode_cookie(&[]).unwrap().is_empty());

    // A control with a different OID is ignored.
    let mut foreign = ber::encode_octet_string("1.2.3.4");
    foreign.extend_from_slice(&ber::encode_octet_bytes(b"junk"));
    let foreign = ber::encode_sequence(&foreign);
    assert!(controls::decode_cookie(&foreign).unwrap().is_empty());
}

#[test]
fn paged_control_with_criticality() {
    // Some servers insert the optional criticality BOOLEAN.
    let mut value = ber::encode_integer(0);
    value.extend_from_slice(&ber::encode_octet_bytes(b"ck"));
    let value = ber::encode_sequence(&value);

    let mut control = ber::encode_octet_string(spec::PAGED_RESULTS_OID);
    control.extend_from_slice(&ber::encode_boolean(true));
    control.extend_from_slice(&ber::encode_octet_bytes(&value));
    let control = ber::encode_sequence(&control);

    assert_eq!(controls::decode_cookie(&control).unwrap(), b"ck");
}

#[test]
fn two_page_has_more_sequence() {
    let mut page1 = entry_frame(2, "cn=a,dc=x", &[("cn", &["a"])]);
    page1.extend_from_slice(&entry_frame(2, "cn=b,dc=x", &[("cn", &["b"])]));
    page1.extend_from_slice(&done_frame(2, 0, Some(b"more")));

    let mut page2 = entry_frame(2, "cn=c,dc=x", &[("cn", &["c"])]);
    page2.extend_from_slice(&done_frame(2, 0, Some(b"")));

    let first = parse::parse_search(&page1).unwrap();
    let second = parse::parse_search(&page2).unwrap();

    assert!(!first.cookie.is_empty());
    assert!(second.cookie.is_empty());
    assert_eq!(first.entries.len() + second.entries.len(), 3);
}

// --- hex cookies ---

#[test]
fn hex_round_trip() {
    let cookie = vec![0x00, 0x01, 0xAB, 0xFF];
    let text = util::hex_encode(&cookie);
    assert_eq!(text, "0001abff");
    assert_eq!(util::hex_decode(&text).unwrap(), cookie);
    assert_eq!(util::hex_decode("").unwrap(), Vec::<u8>::new());
}

#[test]
fn malformed_cookie_is_a_request_format_error() {
    // Caller mistakes are not ProtocolError; that kind is reserved
    // for malformed server data.
    for text in ["0", "zz", "01ag"] {
        match util::hex_decode(text) {
            Err(Error::RequestFormatError(_)) => (),
            other => panic!("cookie {text:?} yielded {other:?}"),
        }
    }
}

// --- scripted-server sessions ---

fn listen() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").unwrap()
}

fn connect_params(listener: &TcpListener) -> ConnectParams {
    let port = listener.local_addr().unwrap().port();
    let mut params = ConnectParams::new("127.0.0.1");
    params.set_port(port);
    params.set_timeout(Duration::from_secs(5));
    params
}

#[test]
fn anonymous_bind_and_search() {
    let listener = listen();
    let params = connect_params(&listener);

    let server = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();

        read_frame(&mut sock).unwrap(); // BindRequest
        sock.write_all(&result_response(spec::TAG_BIND_RESPONSE, 1, 0, ""))
            .unwrap();

        read_frame(&mut sock).unwrap(); // SearchRequest

        let mut resp = entry_frame(2, "cn=alice,dc=example,dc=com", &[("cn", &["alice"])]);
        resp.extend_from_slice(&entry_frame(
            2,
            "cn=bob,dc=example,dc=com",
            &[("cn", &["bob"])],
        ));
        resp.extend_from_slice(&done_frame(2, 0, None));
        sock.write_all(&resp).unwrap();

        // Peer hangs up before Unbind arrives; the client must still
        // report success.
    });

    let mut search = SearchParams::new("dc=example,dc=com", "(objectClass=*)");
    search.set_scope(Scope::Sub);

    let resp = run_search(&params, &search, None).unwrap();
    server.join().unwrap();

    assert!(resp.success());
    assert_eq!(resp.result.code, 0);
    assert_eq!(resp.entries.len(), 2);
    assert_eq!(resp.entries[0].dn, "cn=alice,dc=example,dc=com");
    assert!(!resp.has_more);
    assert!(resp.cookie.is_empty());
}

#[test]
fn bind_failure_short_circuits_the_operation() {
    let listener = listen();
    let mut params = connect_params(&listener);
    params.set_bind_dn("cn=admin,dc=example,dc=com");
    params.set_password("wrong");

    let server = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();

        read_frame(&mut sock).unwrap(); // BindRequest
        sock.write_all(&result_response(spec::TAG_BIND_RESPONSE, 1, 49, ""))
            .unwrap();

        // The client must close without sending anything further.
        let mut rest = Vec::new();
        sock.read_to_end(&mut rest).unwrap();
        rest
    });

    let search = SearchParams::new("dc=example,dc=com", "(objectClass=*)");
    let err = run_search(&params, &search, None).unwrap_err();

    assert_eq!(
        err,
        Error::BindFailed {
            code: 49,
            message: "invalidCredentials".to_string()
        }
    );
    assert!(server.join().unwrap().is_empty());
}

#[test]
fn add_failure_is_a_structured_result() {
    let listener = listen();
    let params = connect_params(&listener);

    let server = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();

        read_frame(&mut sock).unwrap(); // BindRequest
        sock.write_all(&result_response(spec::TAG_BIND_RESPONSE, 1, 0, ""))
            .unwrap();

        read_frame(&mut sock).unwrap(); // AddRequest
        sock.write_all(&result_response(spec::TAG_ADD_RESPONSE, 2, 68, ""))
            .unwrap();
    });

    let mut add = AddParams::new("cn=Carol,dc=example,dc=com");
    add.add_value("objectClass", "inetOrgPerson");
    add.add_value("objectClass", "top");
    add.add_value("cn", "Carol");
    add.add_value("sn", "Smith");

    let resp = run_add(&params, &add, None).unwrap();
    server.join().unwrap();

    assert!(!resp.success());
    assert_eq!(resp.result.code, 68);
    assert_eq!(resp.result.message(), "entryAlreadyExists");
    assert_eq!(resp.dn, "cn=Carol,dc=example,dc=com");
}

#[test]
fn modify_request_wire_format_and_result() {
    let listener = listen();
    let params = connect_params(&listener);

    let server = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();

        read_frame(&mut sock).unwrap(); // BindRequest
        sock.write_all(&result_response(spec::TAG_BIND_RESPONSE, 1, 0, ""))
            .unwrap();

        let request = read_frame(&mut sock).unwrap(); // ModifyRequest
        sock.write_all(&result_response(spec::TAG_MODIFY_RESPONSE, 2, 0, ""))
            .unwrap();

        read_frame(&mut sock); // Unbind
        request
    });

    let mut modify = ModifyParams::new("cn=alice,dc=example,dc=com");
    modify.add_change(ModifyOp::Replace, "mail", &["alice@example.org"]);
    modify.add_change(ModifyOp::Delete, "photo", &[]);

    let resp = run_modify(&params, &modify, None).unwrap();
    let request = server.join().unwrap();

    assert!(resp.success());
    assert_eq!(resp.dn, "cn=alice,dc=example,dc=com");

    // ModifyRequest ::= [APPLICATION 6] SEQUENCE {
    //     object, changes SEQUENCE OF SEQUENCE { op, PartialAttribute } }
    let mut outer = Cursor::new(&request);
    let envelope = outer.expect(spec::TAG_SEQUENCE).unwrap();

    let mut cursor = Cursor::new(envelope.content);
    cursor.expect(spec::TAG_INTEGER).unwrap();
    let op = cursor.expect(spec::TAG_MODIFY_REQUEST).unwrap();

    let mut body = Cursor::new(op.content);
    assert_eq!(
        body.expect(spec::TAG_OCTET_STRING).unwrap().content,
        b"cn=alice,dc=example,dc=com"
    );

    let changes = body.expect(spec::TAG_SEQUENCE).unwrap();
    let mut changes = Cursor::new(changes.content);

    let first = changes.expect(spec::TAG_SEQUENCE).unwrap();
    let mut first = Cursor::new(first.content);
    let op_code = first.expect(spec::TAG_ENUMERATED).unwrap();
    assert_eq!(
        ber::decode_integer_content(op_code.content).unwrap(),
        spec::MOD_OP_REPLACE
    );
    let attr = first.expect(spec::TAG_SEQUENCE).unwrap();
    let mut attr = Cursor::new(attr.content);
    assert_eq!(attr.expect(spec::TAG_OCTET_STRING).unwrap().content, b"mail");
    let vals = attr.expect(spec::TAG_SET).unwrap();
    let mut vals = Cursor::new(vals.content);
    assert_eq!(
        vals.expect(spec::TAG_OCTET_STRING).unwrap().content,
        b"alice@example.org"
    );
    assert!(vals.is_empty());

    // A value-less delete change carries an empty SET.
    let second = changes.expect(spec::TAG_SEQUENCE).unwrap();
    let mut second = Cursor::new(second.content);
    let op_code = second.expect(spec::TAG_ENUMERATED).unwrap();
    assert_eq!(
        ber::decode_integer_content(op_code.content).unwrap(),
        spec::MOD_OP_DELETE
    );
    let attr = second.expect(spec::TAG_SEQUENCE).unwrap();
    let mut attr = Cursor::new(attr.content);
    assert_eq!(attr.expect(spec::TAG_OCTET_STRING).unwrap().content, b"photo");
    assert!(attr.expect(spec::TAG_SET).unwrap().content.is_empty());

    assert!(changes.is_empty());
}

#[test]
fn delete_request_content_is_the_dn() {
    let listener = listen();
    let params = connect_params(&listener);

    let server = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();

        read_frame(&mut sock).unwrap(); // BindRequest
        sock.write_all(&result_response(spec::TAG_BIND_RESPONSE, 1, 0, ""))
            .unwrap();

        let request = read_frame(&mut sock).unwrap(); // DelRequest
        sock.write_all(&result_response(spec::TAG_DEL_RESPONSE, 2, 0, ""))
            .unwrap();

        read_frame(&mut sock); // Unbind
        request
    });

    let delete = DeleteParams::new("cn=bob,dc=example,dc=com");
    let resp = run_delete(&params, &delete, None).unwrap();
    let request = server.join().unwrap();

    assert!(resp.success());
    assert_eq!(resp.dn, "cn=bob,dc=example,dc=com");

    // DelRequest is primitive; the op content is the DN itself.
    let mut outer = Cursor::new(&request);
    let envelope = outer.expect(spec::TAG_SEQUENCE).unwrap();

    let mut cursor = Cursor::new(envelope.content);
    let msg_id = cursor.expect(spec::TAG_INTEGER).unwrap();
    assert_eq!(ber::decode_integer_content(msg_id.content).unwrap(), 2);

    let op = cursor.expect(spec::TAG_DEL_REQUEST).unwrap();
    assert_eq!(op.content, b"cn=bob,dc=example,dc=com");
}

#[test]
fn paged_search_runs_three_round_trips() {
    let listener = listen();
    let params = connect_params(&listener);

    // Five entries, two per page: three connections, cookies threaded
    // through the middle two responses.
    let server = thread::spawn(move || {
        let dns: Vec<String> = (0..5).map(|i| format!("cn=u{i},dc=x")).collect();
        let pages: [(std::ops::Range<usize>, &[u8]); 3] =
            [(0..2, b"pg1"), (2..4, b"pg2"), (4..5, b"")];
        let mut expected_cookie: Vec<u8> = Vec::new();

        for (range, next_cookie) in pages {
            let (mut sock, _) = listener.accept().unwrap();

            read_frame(&mut sock).unwrap(); // BindRequest
            sock.write_all(&result_response(spec::TAG_BIND_RESPONSE, 1, 0, ""))
                .unwrap();

            let request = read_frame(&mut sock).unwrap(); // SearchRequest
            assert_eq!(request_cookie(&request), expected_cookie);

            let mut resp = Vec::new();
            for dn in &dns[range] {
                resp.extend_from_slice(&entry_frame(2, dn, &[("cn", &[dn.as_str()])]));
            }
            resp.extend_from_slice(&done_frame(2, 0, Some(next_cookie)));
            sock.write_all(&resp).unwrap();

            expected_cookie = next_cookie.to_vec();

            // Drain the Unbind before the next accept.
            read_frame(&mut sock);
        }
    });

    let mut collected = Vec::new();
    let mut has_more_seen = Vec::new();
    let mut cookie = String::new();
    let mut round_trips = 0;

    loop {
        let mut search = SearchParams::new("dc=x", "(objectClass=*)");
        search.set_page_size(2);
        search.set_cookie(&cookie);

        let resp = run_search(&params, &search, None).unwrap();
        round_trips += 1;

        assert!(resp.success());
        collected.extend(resp.entries.iter().map(|e| e.dn.clone()));
        has_more_seen.push(resp.has_more);

        if !resp.has_more {
            break;
        }
        cookie = resp.cookie.clone();

        assert!(round_trips < 10, "pagination never terminated");
    }

    server.join().unwrap();

    assert_eq!(round_trips, 3);
    assert_eq!(has_more_seen, vec![true, true, false]);
    assert_eq!(
        collected,
        (0..5).map(|i| format!("cn=u{i},dc=x")).collect::<Vec<String>>()
    );
}

#[test]
fn unresponsive_server_times_out() {
    let listener = listen();
    let mut params = connect_params(&listener);
    params.set_timeout(Duration::from_millis(300));

    let server = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        // Swallow the bind, never answer, and hold the socket open
        // past the client deadline.
        read_frame(&mut sock);
        thread::sleep(Duration::from_millis(1000));
    });

    let err = Session::start(&params).unwrap_err();
    assert_eq!(err, Error::Timeout);

    server.join().unwrap();
}

#[test]
fn connect_refused_is_a_connect_error() {
    // Bind then drop the listener so the port is closed.
    let listener = listen();
    let mut params = connect_params(&listener);
    params.set_timeout(Duration::from_secs(2));
    drop(listener);

    match Session::start(&params) {
        Err(Error::ConnectError(_)) => (),
        other => panic!("expected ConnectError, got {other:?}"),
    }
}

#[test]
fn spent_deadline_fails_before_any_network_step() {
    // No resolution, no connect attempt; just Timeout.
    let deadline = Deadline::new(Duration::from_secs(0));
    match Connection::connect("127.0.0.1", spec::DEFAULT_PORT, deadline) {
        Err(Error::Timeout) => (),
        other => panic!("expected Timeout, got {other:?}"),
    }
}

struct DenyAll;

impl OriginGate for DenyAll {
    fn refuse_reason(&self, host: &str, port: u16) -> Option<String> {
        Some(format!("{host}:{port} is not an allowed origin"))
    }
}

#[test]
fn origin_gate_refusal_short_circuits() {
    let params = ConnectParams::new("203.0.113.1");
    let search = SearchParams::new("dc=x", "(objectClass=*)");

    match run_search(&params, &search, Some(&DenyAll)) {
        Err(Error::OriginRefused(_)) => (),
        other => panic!("expected OriginRefused, got {other:?}"),
    }
}

#[test]
fn unsupported_filter_never_touches_the_wire() {
    let listener = listen();
    let params = connect_params(&listener);

    let server = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();

        read_frame(&mut sock).unwrap(); // BindRequest
        sock.write_all(&result_response(spec::TAG_BIND_RESPONSE, 1, 0, ""))
            .unwrap();

        // Nothing but EOF may follow.
        let mut rest = Vec::new();
        sock.read_to_end(&mut rest).unwrap();
        rest
    });

    let search = SearchParams::new("dc=x", "(&(a=1)(b=2))");
    let err = run_search(&params, &search, None).unwrap_err();

    assert!(matches!(err, Error::UnsupportedFilter(_)));
    assert!(server.join().unwrap().is_empty());
}

//! Codec Tests
//!
//! Tests for request encoding and incremental response decoding.

use bytes::{Bytes, BytesMut};
use ssdbc::protocol::{
    decode, encode_command, encode_fields, encode_response, Argument, Command, Response,
};
use ssdbc::SsdbError;

fn buf(bytes: &[u8]) -> BytesMut {
    BytesMut::from(bytes)
}

fn field_strings(response: &Response) -> Vec<String> {
    response
        .fields()
        .iter()
        .map(|f| String::from_utf8_lossy(f).into_owned())
        .collect()
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_encode_set_command() {
    let cmd = Command::new("set").arg("foo").arg("bar");
    let encoded = encode_command(&cmd).unwrap();
    assert_eq!(encoded, b"3\nset\n3\nfoo\n3\nbar\n\n");
}

#[test]
fn test_encode_command_without_arguments() {
    let encoded = encode_command(&Command::new("info")).unwrap();
    assert_eq!(encoded, b"4\ninfo\n\n");
}

#[test]
fn test_encode_scalar_arguments() {
    let cmd = Command::new("x")
        .arg(42i64)
        .arg(-7i32)
        .arg(1.5f64)
        .arg(true)
        .arg(false)
        .arg(Argument::Null);
    let encoded = encode_command(&cmd).unwrap();
    assert_eq!(
        encoded,
        b"1\nx\n2\n42\n2\n-7\n8\n1.500000\n1\n1\n1\n0\n0\n\n\n".to_vec()
    );
}

#[test]
fn test_encode_float_is_fixed_six_decimals() {
    let cmd = Command::new("f").arg(0.1f64 + 0.2f64).arg(-3.0f64);
    let encoded = encode_command(&cmd).unwrap();
    assert_eq!(encoded, b"1\nf\n8\n0.300000\n9\n-3.000000\n\n".to_vec());
}

#[test]
fn test_encode_text_list_expands_to_frames() {
    let list = vec!["a".to_string(), "bc".to_string()];
    let as_list = encode_command(&Command::new("multi_hget").arg("h").arg(list)).unwrap();
    let as_args = encode_command(&Command::new("multi_hget").arg("h").arg("a").arg("bc")).unwrap();
    assert_eq!(as_list, as_args);
    assert_eq!(as_list, b"10\nmulti_hget\n1\nh\n1\na\n2\nbc\n\n".to_vec());
}

#[test]
fn test_encode_empty_text_list_emits_nothing() {
    let encoded = encode_command(&Command::new("k").arg(Vec::<String>::new())).unwrap();
    assert_eq!(encoded, b"1\nk\n\n");
}

#[test]
fn test_encode_binary_payload() {
    let payload: Vec<u8> = vec![0x00, b'\n', 0xFF, b'\n'];
    let encoded = encode_command(&Command::new("set").arg("k").arg(payload.clone())).unwrap();

    let mut expected = b"3\nset\n1\nk\n4\n".to_vec();
    expected.extend_from_slice(&payload);
    expected.extend_from_slice(b"\n\n");
    assert_eq!(encoded, expected);
}

#[test]
fn test_encode_length_counts_bytes_not_chars() {
    let encoded = encode_command(&Command::new("set").arg("k").arg("héllo")).unwrap();
    assert!(encoded.starts_with(b"3\nset\n1\nk\n6\n"));
}

#[test]
fn test_encode_rejects_non_finite_float() {
    for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let err = encode_command(&Command::new("zset").arg(value)).unwrap_err();
        assert!(matches!(err, SsdbError::Encoding(_)), "got {:?}", err);
    }
}

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_decode_ok_response() {
    let mut b = buf(b"2\nok\n1\n1\n\n");
    let response = decode(&mut b).unwrap().unwrap();
    assert_eq!(field_strings(&response), vec!["ok", "1"]);
    assert!(b.is_empty());
}

#[test]
fn test_decode_not_found() {
    let mut b = buf(b"9\nnot_found\n\n");
    let response = decode(&mut b).unwrap().unwrap();
    assert!(response.is_not_found());
    assert!(b.is_empty());
}

#[test]
fn test_decode_empty_payload_field() {
    let mut b = buf(b"2\nok\n0\n\n\n");
    let response = decode(&mut b).unwrap().unwrap();
    assert_eq!(response.fields().len(), 2);
    assert!(response.fields()[1].is_empty());
}

#[test]
fn test_decode_keeps_following_response() {
    let mut b = buf(b"2\nok\n1\na\n\n2\nok\n1\nb\n\n9\nnot_");
    let first = decode(&mut b).unwrap().unwrap();
    assert_eq!(field_strings(&first), vec!["ok", "a"]);
    assert_eq!(&b[..], b"2\nok\n1\nb\n\n9\nnot_");

    let second = decode(&mut b).unwrap().unwrap();
    assert_eq!(field_strings(&second), vec!["ok", "b"]);
    assert_eq!(&b[..], b"9\nnot_");

    assert!(decode(&mut b).unwrap().is_none());
    assert_eq!(&b[..], b"9\nnot_");
}

#[test]
fn test_decode_skips_leading_blank_lines() {
    let mut b = buf(b"\n\r\n\n2\nok\n\n");
    let response = decode(&mut b).unwrap().unwrap();
    assert_eq!(field_strings(&response), vec!["ok"]);
    assert!(b.is_empty());
}

#[test]
fn test_decode_only_blank_lines_needs_more() {
    let mut b = buf(b"\n\n\n");
    assert!(decode(&mut b).unwrap().is_none());
    // Nothing is consumed until a whole response is present.
    assert_eq!(b.len(), 3);
}

#[test]
fn test_decode_carriage_return_terminator() {
    let mut b = buf(b"2\nok\n3\nval\n\r\n");
    let response = decode(&mut b).unwrap().unwrap();
    assert_eq!(field_strings(&response), vec!["ok", "val"]);
    assert!(b.is_empty());
}

#[test]
fn test_decode_payload_may_contain_newlines() {
    let mut b = buf(b"2\nok\n5\na\n\nb\n\n\n");
    let response = decode(&mut b).unwrap().unwrap();
    assert_eq!(response.fields()[1], Bytes::from_static(b"a\n\nb\n"));
    assert!(b.is_empty());
}

#[test]
fn test_decode_partial_payload_consumes_nothing() {
    let mut b = buf(b"2\nok\n5\nhel");
    assert!(decode(&mut b).unwrap().is_none());
    assert_eq!(&b[..], b"2\nok\n5\nhel");

    b.extend_from_slice(b"lo\n\n");
    let response = decode(&mut b).unwrap().unwrap();
    assert_eq!(field_strings(&response), vec!["ok", "hello"]);
}

#[test]
fn test_decode_byte_at_a_time_matches_whole() {
    let wire = b"2\nok\n3\nfoo\n0\n\n6\nbar\nbz\n\n";

    let mut whole = buf(wire);
    let expected = decode(&mut whole).unwrap().unwrap();

    let mut b = BytesMut::new();
    for (i, byte) in wire.iter().enumerate() {
        b.extend_from_slice(&[*byte]);
        let decoded = decode(&mut b).unwrap();
        if i + 1 < wire.len() {
            assert!(decoded.is_none(), "complete too early at byte {}", i);
        } else {
            assert_eq!(decoded.unwrap(), expected);
            assert!(b.is_empty());
        }
    }
}

#[test]
fn test_decode_rejects_non_numeric_length() {
    let mut b = buf(b"2\nok\nxy\nfoo\n\n");
    assert!(matches!(decode(&mut b), Err(SsdbError::Protocol(_))));
}

#[test]
fn test_decode_rejects_negative_length() {
    let mut b = buf(b"-1\n\n\n");
    assert!(matches!(decode(&mut b), Err(SsdbError::Protocol(_))));
}

#[test]
fn test_decode_rejects_signed_and_spaced_lengths() {
    for wire in [&b"+2\nok\n\n"[..], b" 2\nok\n\n", b"2 \nok\n\n", b"0x2\nok\n\n"] {
        let mut b = buf(wire);
        assert!(
            matches!(decode(&mut b), Err(SsdbError::Protocol(_))),
            "accepted {:?}",
            String::from_utf8_lossy(wire)
        );
    }
}

#[test]
fn test_decode_rejects_overflowing_length() {
    let mut b = buf(b"99999999999999999999999\nx\n\n");
    assert!(matches!(decode(&mut b), Err(SsdbError::Protocol(_))));
}

#[test]
fn test_decode_rejects_oversized_frame() {
    let wire = format!("{}\n", ssdbc::protocol::MAX_FRAME_LEN + 1);
    let mut b = buf(wire.as_bytes());
    assert!(matches!(decode(&mut b), Err(SsdbError::Protocol(_))));
}

#[test]
fn test_decode_rejects_missing_payload_terminator() {
    let mut b = buf(b"2\nokX1\n1\n\n");
    assert!(matches!(decode(&mut b), Err(SsdbError::Protocol(_))));
}

#[test]
fn test_decode_tolerates_crlf_length_token() {
    let mut b = buf(b"2\r\nok\n\n");
    let response = decode(&mut b).unwrap().unwrap();
    assert_eq!(field_strings(&response), vec!["ok"]);
}

// =============================================================================
// Round Trip
// =============================================================================

#[test]
fn test_request_decodes_back_to_its_fields() {
    let commands = vec![
        Command::new("set").arg("foo").arg("bar"),
        Command::new("setx").arg("k").arg("v").arg(60i64),
        Command::new("zset").arg("z").arg("m").arg(2.25f64),
        Command::new("flag").arg(true).arg(Argument::Null),
        Command::new("multi_hdel")
            .arg("h")
            .arg(vec!["a".to_string(), "b".to_string()]),
        Command::new("set").arg("bin").arg(vec![0u8, 10, 255]),
    ];

    for cmd in commands {
        let mut expected: Vec<Bytes> = vec![Bytes::copy_from_slice(cmd.name().as_bytes())];
        for arg in cmd.arguments() {
            expected.extend(arg.to_payloads().unwrap());
        }

        let mut b = BytesMut::from(&encode_command(&cmd).unwrap()[..]);
        let decoded = decode(&mut b).unwrap().unwrap();
        assert_eq!(decoded.fields(), &expected[..], "command {}", cmd.name());
        assert!(b.is_empty());
    }
}

#[test]
fn test_encode_fields_matches_response_shape() {
    let encoded = encode_fields(["ok", "1"]);
    assert_eq!(encoded, b"2\nok\n1\n1\n\n");

    let mut b = BytesMut::from(&encoded[..]);
    let response = decode(&mut b).unwrap().unwrap();
    assert_eq!(encode_response(&response), encoded);
    assert_eq!(encode_response(&Response::not_found()), b"9\nnot_found\n\n");
}

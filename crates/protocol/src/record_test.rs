//! Tests for record encoding and scanning

use bytes::BytesMut;

use super::{encode_record, encoded_len, validate_record_sizes, RecordIter, HEADER_LEN};
use crate::ProtocolError;

fn region(payloads: &[&[u8]]) -> BytesMut {
    let mut buf = BytesMut::new();
    for p in payloads {
        encode_record(&mut buf, p);
    }
    buf
}

#[test]
fn test_encoded_len() {
    assert_eq!(encoded_len(0), HEADER_LEN);
    assert_eq!(encoded_len(16), 20);
}

#[test]
fn test_encode_single_record() {
    let mut buf = BytesMut::new();
    encode_record(&mut buf, b"hello");

    assert_eq!(buf.len(), HEADER_LEN + 5);
    assert_eq!(&buf[..HEADER_LEN], &5u32.to_le_bytes());
    assert_eq!(&buf[HEADER_LEN..], b"hello");
}

#[test]
fn test_iterate_round_trip() {
    let payloads: Vec<&[u8]> = vec![b"alpha", b"", b"gamma-gamma"];
    let buf = region(&payloads);

    let records: Vec<_> = RecordIter::new(&buf)
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].payload, b"alpha");
    assert_eq!(records[1].payload, b"");
    assert_eq!(records[2].payload, b"gamma-gamma");

    // Offsets are in order and match the encoding
    assert_eq!(records[0].offset, 0);
    assert_eq!(records[1].offset, encoded_len(5));
    assert_eq!(records[2].offset, encoded_len(5) + encoded_len(0));
}

#[test]
fn test_empty_region() {
    assert!(RecordIter::new(&[]).next().is_none());
}

#[test]
fn test_truncated_header() {
    // Two bytes cannot hold a header
    let mut iter = RecordIter::new(&[0x05, 0x00]);
    match iter.next() {
        Some(Err(ProtocolError::Truncated {
            offset, remaining, ..
        })) => {
            assert_eq!(offset, 0);
            assert_eq!(remaining, 2);
        }
        other => panic!("expected truncation error, got {:?}", other),
    }
    // Iterator terminates after the error
    assert!(iter.next().is_none());
}

#[test]
fn test_truncated_payload() {
    let mut buf = region(&[b"first"]);
    // Header declares 100 bytes, only 3 follow
    buf.extend_from_slice(&100u32.to_le_bytes());
    buf.extend_from_slice(b"abc");

    let mut iter = RecordIter::new(&buf);
    assert_eq!(iter.next().unwrap().unwrap().payload, b"first");

    match iter.next() {
        Some(Err(ProtocolError::Truncated { declared, .. })) => assert_eq!(declared, 100),
        other => panic!("expected truncation error, got {:?}", other),
    }
    assert!(iter.next().is_none());
}

#[test]
fn test_validate_record_sizes_ok() {
    assert!(validate_record_sizes(&[10, 20, 64], 64).is_ok());
    assert!(validate_record_sizes(&[], 64).is_ok());
}

#[test]
fn test_validate_record_sizes_rejects_oversized() {
    let err = validate_record_sizes(&[10, 100, 20], 64).unwrap_err();
    match err {
        ProtocolError::RecordExceedsBound { size, bound } => {
            assert_eq!(size, 100);
            assert_eq!(bound, 64);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

//! Protocol-level integration tests
//!
//! These exercise the codec laws end to end: encode/parse round-trips for
//! every sequence kind, forward compatibility with newer senders, payload
//! fidelity through the escape encoding, and OSC parsing over the shared
//! byte stream.

use tpp_protocol::{
    emit, find_sequence_start, Ack, Capabilities, Data, Demuxer, GetTransferStatus, InputEvent,
    Nack, OpenFileTransfer, OscParse, OscSequence, Sequence, SequenceParse, TransferStatus,
    ViewRemoteFile, BEL,
};

fn parse_one(bytes: &[u8]) -> Sequence {
    match Sequence::parse(bytes) {
        SequenceParse::Complete { sequence, consumed } => {
            assert_eq!(consumed, bytes.len(), "frame not fully consumed");
            sequence
        }
        SequenceParse::Incomplete => panic!("unexpected incomplete"),
    }
}

fn all_kinds() -> Vec<Sequence> {
    vec![
        Sequence::Ack(Ack {
            request: "2".to_string(),
            id: 42,
        }),
        Sequence::Nack(Nack {
            request: "6;1".to_string(),
            reason: "no such transfer".to_string(),
        }),
        Sequence::GetCapabilities,
        Sequence::Capabilities(Capabilities { version: 1 }),
        Sequence::Data(Data {
            stream_id: 3,
            packet: 17,
            payload: b"payload bytes".to_vec(),
        }),
        Sequence::OpenFileTransfer(OpenFileTransfer {
            remote_host: "build-box".to_string(),
            remote_path: "/var/log/syslog".to_string(),
            size: 123456,
        }),
        Sequence::GetTransferStatus(GetTransferStatus { id: 9 }),
        Sequence::TransferStatus(TransferStatus {
            id: 9,
            size: 123456,
            received: 4096,
        }),
        Sequence::ViewRemoteFile(ViewRemoteFile { id: 9 }),
    ]
}

#[test]
fn test_round_trip_every_kind() {
    for sequence in all_kinds() {
        let bytes = emit(&sequence);
        assert_eq!(parse_one(&bytes), sequence, "round trip of {sequence:?}");
    }
}

#[test]
fn test_forward_compatibility_splice() {
    // a newer sender may append fields before the terminator; older
    // receivers must ignore them
    for sequence in all_kinds() {
        if matches!(sequence, Sequence::Data(_)) {
            // Data consumes the rest of its payload by definition
            continue;
        }
        let mut bytes = emit(&sequence);
        bytes.pop();
        bytes.extend_from_slice(b";7;extra`data\x07");
        assert_eq!(parse_one(&bytes), sequence, "spliced {sequence:?}");
    }
}

#[test]
fn test_data_payload_fidelity() {
    // every byte value survives the escape encoding, including the frame
    // terminator and the quote byte
    let payload: Vec<u8> = (0u8..=255).collect();
    let data = Data {
        stream_id: 1,
        packet: 2,
        payload: payload.clone(),
    };
    let bytes = emit(&data);
    // no raw BEL may appear before the terminator
    assert_eq!(
        bytes.iter().filter(|&&b| b == BEL).count(),
        1,
        "payload leaked a raw BEL"
    );
    match parse_one(&bytes) {
        Sequence::Data(parsed) => assert_eq!(parsed.payload, payload),
        other => panic!("expected Data, got {other:?}"),
    }
}

#[test]
fn test_scenario_ack_wire_form() {
    let bytes = emit(&Ack {
        request: "foo".to_string(),
        id: 42,
    });
    assert_eq!(bytes, b"\x1bP+0;3;foo;42\x07");
    match parse_one(&bytes) {
        Sequence::Ack(ack) => {
            assert_eq!(ack.request, "foo");
            assert_eq!(ack.id, 42);
        }
        other => panic!("expected Ack, got {other:?}"),
    }
}

#[test]
fn test_scenario_capabilities_with_extra_fields() {
    let mut bytes = emit(&Capabilities { version: 3 });
    bytes.pop();
    bytes.extend_from_slice(b";99;99\x07");
    assert_eq!(
        parse_one(&bytes),
        Sequence::Capabilities(Capabilities { version: 3 })
    );
}

#[test]
fn test_scenario_truncated_sequence() {
    assert_eq!(Sequence::parse(b"\x1bP+1"), SequenceParse::Incomplete);
}

#[test]
fn test_find_sequence_start_idempotent() {
    let mut stream = b"noise \x1b[31m more noise ".to_vec();
    stream.extend_from_slice(&emit(&Sequence::GetCapabilities));
    let first = find_sequence_start(&stream);
    assert_eq!(find_sequence_start(&stream[first..]), 0);
    assert_eq!(find_sequence_start(b""), 0);
}

#[test]
fn test_osc_round_trip_simple_inputs() {
    for number in [0u32, 2, 52, 777, 104] {
        for values in [vec!["a"], vec!["a", "b"], vec!["x", "", "z"]] {
            let mut wire = format!("\x1b]{number};{}", values.join(";")).into_bytes();
            wire.push(BEL);
            match OscSequence::parse(&wire) {
                OscParse::Complete { sequence, consumed } => {
                    assert_eq!(consumed, wire.len());
                    assert_eq!(sequence.number, Some(number));
                    assert_eq!(sequence.values, values);
                }
                OscParse::Incomplete => panic!("unexpected incomplete"),
            }
        }
    }
}

#[test]
fn test_demux_interleaved_conversation() {
    // a remote side greets, negotiates capabilities, then streams a file
    // packet, with terminal output in between
    let mut stream = Vec::new();
    stream.extend_from_slice(b"login: ok\r\n");
    stream.extend_from_slice(&emit(&Sequence::GetCapabilities));
    stream.extend_from_slice(b"\x1b]7;file:///home\x07");
    stream.extend_from_slice(&emit(&Data {
        stream_id: 1,
        packet: 0,
        payload: b"chunk`one\x07".to_vec(),
    }));
    stream.extend_from_slice(b"$ ");

    let mut demux = Demuxer::new();
    // feed in awkward chunks to exercise resumption
    let mut events = Vec::new();
    for chunk in stream.chunks(7) {
        events.extend(demux.feed(chunk));
    }

    let tpp: Vec<&Sequence> = events
        .iter()
        .filter_map(|e| match e {
            InputEvent::Tpp(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(tpp.len(), 2);
    assert_eq!(*tpp[0], Sequence::GetCapabilities);
    match tpp[1] {
        Sequence::Data(data) => assert_eq!(data.payload, b"chunk`one\x07"),
        other => panic!("expected Data, got {other:?}"),
    }

    let osc_count = events
        .iter()
        .filter(|e| matches!(e, InputEvent::Osc(_)))
        .count();
    assert_eq!(osc_count, 1);

    let raw: Vec<u8> = events
        .into_iter()
        .filter_map(|e| match e {
            InputEvent::Raw(bytes) => Some(bytes),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(raw, b"login: ok\r\n$ ");
}

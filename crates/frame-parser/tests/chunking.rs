use frame_parser::{parse_all, Frame, FrameParser, Utf8StreamDecoder};

const STREAM: &str = concat!(
    ": opening comment\n\n",
    "event: status\ndata: {\"phase\":\"start\"}\n\n",
    "data: first line\ndata: second line\n\n",
    "id: 17\nevent: delta\ndata:  leading space kept once\n\n",
    "data:\n\n",
    "event: heartbeat\n\n",
    "data: unicode — ünïcødé ✓\r\n\r\n",
    "event: a\nevent: b\ndata: last wins\n\n",
    "data: tail without terminator",
);

fn expected() -> Vec<Frame> {
    vec![
        Frame::new("status", "{\"phase\":\"start\"}"),
        Frame::new("message", "first line\nsecond line"),
        Frame::new("delta", " leading space kept once"),
        Frame::new("heartbeat", ""),
        Frame::new("message", "unicode — ünïcødé ✓"),
        Frame::new("b", "last wins"),
    ]
}

fn parse_in_byte_chunks(bytes: &[u8], size: usize) -> Vec<Frame> {
    let mut decoder = Utf8StreamDecoder::new();
    let mut parser = FrameParser::new();
    let mut frames = Vec::new();
    for chunk in bytes.chunks(size) {
        let text = decoder.decode(chunk);
        frames.extend(parser.push(&text));
    }
    let tail = decoder.finish();
    frames.extend(parser.push(&tail));
    frames
}

#[test]
fn whole_stream_matches_expected_frames() {
    assert_eq!(parse_all(STREAM), expected());
}

#[test]
fn every_fixed_chunk_size_yields_identical_frames() {
    let bytes = STREAM.as_bytes();
    for size in 1..=bytes.len() {
        assert_eq!(
            parse_in_byte_chunks(bytes, size),
            expected(),
            "chunk size {size}"
        );
    }
}

#[test]
fn every_single_split_point_yields_identical_frames() {
    let bytes = STREAM.as_bytes();
    for split in 0..=bytes.len() {
        let (head, tail) = bytes.split_at(split);
        let mut decoder = Utf8StreamDecoder::new();
        let mut parser = FrameParser::new();
        let mut frames: Vec<Frame> = parser.push(&decoder.decode(head)).collect();
        frames.extend(parser.push(&decoder.decode(tail)));
        assert_eq!(frames, expected(), "split at {split}");
        assert_eq!(parser.residual(), "data: tail without terminator");
    }
}

#[test]
fn irregular_segmentation_yields_identical_frames() {
    let bytes = STREAM.as_bytes();
    let pattern = [3usize, 1, 7, 2, 11, 1, 1, 5, 13];
    let mut decoder = Utf8StreamDecoder::new();
    let mut parser = FrameParser::new();
    let mut frames = Vec::new();
    let mut offset = 0;
    let mut step = 0;
    while offset < bytes.len() {
        let len = pattern[step % pattern.len()].min(bytes.len() - offset);
        frames.extend(parser.push(&decoder.decode(&bytes[offset..offset + len])));
        offset += len;
        step += 1;
    }
    assert_eq!(frames, expected());

    let residue = parser.finish().expect("unterminated tail");
    assert_eq!(residue.partial_line, "data: tail without terminator");
}

#[test]
fn frames_serialize_with_camel_case_fields() {
    let value = serde_json::to_value(Frame::new("foo", "1")).unwrap();
    assert_eq!(value, serde_json::json!({"eventType": "foo", "data": "1"}));
}

// tests/property/framing_test.rs

//! Properties of command framing: however the bytes of a command stream are
//! split across reads, the decoder yields the same commands.

use audiomux::core::{Command, CommandCodec};
use bytes::BytesMut;
use proptest::prelude::*;
use tokio_util::codec::{Decoder, Encoder};

fn command_strategy() -> impl Strategy<Value = Command> {
    prop_oneof![
        Just(Command::Play),
        Just(Command::Stop),
        Just(Command::Close),
        any::<u64>().prop_map(Command::Seek),
        "[A-Z]{1,12}"
            .prop_filter("must not be a known command", |s| {
                !matches!(s.as_str(), "PLAY" | "STOP" | "SEEK" | "CLOSE")
            })
            .prop_map(Command::Unknown),
    ]
}

fn encode_all(commands: &[Command]) -> Vec<u8> {
    let mut codec = CommandCodec::default();
    let mut buf = BytesMut::new();
    for command in commands {
        codec.encode(command.clone(), &mut buf).unwrap();
    }
    buf.to_vec()
}

/// Feeds `wire` to a fresh decoder in pieces cut at `cuts`.
fn decode_in_pieces(wire: &[u8], cuts: &[usize]) -> Vec<Command> {
    let mut codec = CommandCodec::default();
    let mut buf = BytesMut::new();
    let mut decoded = Vec::new();
    let mut start = 0;
    let mut boundaries: Vec<usize> = cuts.iter().map(|c| c % (wire.len() + 1)).collect();
    boundaries.push(wire.len());
    boundaries.sort_unstable();

    for end in boundaries {
        buf.extend_from_slice(&wire[start..end]);
        start = end;
        while let Some(command) = codec.decode(&mut buf).unwrap() {
            decoded.push(command);
        }
    }
    assert!(buf.is_empty(), "bytes left over after a complete stream");
    decoded
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_split_reads_decode_identically(
        commands in prop::collection::vec(command_strategy(), 1..20),
        cuts in prop::collection::vec(any::<usize>(), 0..16)
    ) {
        let wire = encode_all(&commands);
        prop_assert_eq!(decode_in_pieces(&wire, &cuts), commands);
    }

    #[test]
    fn test_byte_at_a_time_decodes_identically(
        commands in prop::collection::vec(command_strategy(), 1..10)
    ) {
        let wire = encode_all(&commands);
        let cuts: Vec<usize> = (0..wire.len()).collect();
        prop_assert_eq!(decode_in_pieces(&wire, &cuts), commands);
    }

    #[test]
    fn test_garbage_never_panics(input in prop::collection::vec(any::<u8>(), 0..2048)) {
        let mut codec = CommandCodec::new(32);
        let mut buf = BytesMut::from(&input[..]);
        // Every call consumes input or reports that more is needed.
        for _ in 0..=input.len() {
            match codec.decode(&mut buf) {
                Ok(None) => break,
                Ok(Some(_)) | Err(_) => {}
            }
        }
        prop_assert!(buf.len() <= 32 + 1 + 32);
    }
}

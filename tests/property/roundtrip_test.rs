// tests/property/roundtrip_test.rs

//! Property-based tests for streaming
//! Whatever the payload, chunk size and offset, a client receives exactly the
//! bytes of the source from that offset on.

use crate::test_helpers::{TestServer, fetch, test_config};
use audiomux::config::Config;
use audiomux::core::{Command, MediaSource, PlaybackCursor};
use bytes::Bytes;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 24,
        max_shrink_iters: 100,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_seek_streams_suffix(
        payload in prop::collection::vec(any::<u8>(), 0..20_000),
        chunk_size in 1usize..4096,
        max_chunks_per_tick in 1usize..8,
        offset_seed in any::<usize>()
    ) {
        let offset = offset_seed % (payload.len() + 1);
        let config = Config {
            chunk_size,
            max_chunks_per_tick,
            ..test_config()
        };
        let payload = Bytes::from(payload);

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let server = TestServer::with_config(config, payload.clone());
            let received = fetch(server.addr, Command::Seek(offset as u64)).await;
            assert_eq!(received.len(), payload.len() - offset);
            assert_eq!(received, payload[offset..]);
        });
    }

    #[test]
    fn test_cursor_chunks_concatenate_to_suffix(
        payload in prop::collection::vec(any::<u8>(), 0..10_000),
        chunk_size in 1usize..512,
        offset_seed in any::<usize>()
    ) {
        let source = Bytes::from(payload);
        let offset = (offset_seed % (source.len() + 1)) as u64;
        let mut cursor = PlaybackCursor::new();
        cursor.seek(offset, &source).unwrap();

        let mut chunk = vec![0u8; chunk_size];
        let mut collected = Vec::new();
        loop {
            let n = cursor.read_chunk(&source, &mut chunk).unwrap();
            if n == 0 {
                break;
            }
            prop_assert!(n <= chunk_size);
            collected.extend_from_slice(&chunk[..n]);
        }
        prop_assert_eq!(cursor.position(), MediaSource::len(&source));
        prop_assert_eq!(&collected[..], &source[offset as usize..]);
    }
}

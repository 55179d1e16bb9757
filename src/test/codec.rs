use pretty_assertions::assert_eq;

use crate::{
    error::{ErrorKind, GridFsErrorKind},
    gridfs::codec,
};

#[test]
fn split_small_buffer_is_a_single_chunk() {
    let slices = codec::split(b"abc", 4, 0).unwrap();
    assert_eq!(slices.len(), 1);
    assert_eq!(slices[0].n, 0);
    assert_eq!(slices[0].bytes, b"abc");
}

#[test]
fn split_exact_multiple_has_no_remainder_chunk() {
    let slices = codec::split(&[7u8; 8], 4, 0).unwrap();
    assert_eq!(slices.len(), 2);
    assert!(slices.iter().all(|slice| slice.bytes.len() == 4));
}

#[test]
fn split_keeps_the_remainder_unpadded() {
    let data: Vec<u8> = (0..10).collect();
    let slices = codec::split(&data, 4, 0).unwrap();
    let sizes: Vec<usize> = slices.iter().map(|slice| slice.bytes.len()).collect();
    assert_eq!(sizes, vec![4, 4, 2]);
    assert_eq!(slices[2].bytes, &data[8..]);
}

#[test]
fn split_assigns_increasing_indices_from_the_starting_index() {
    let slices = codec::split(&[0u8; 9], 4, 5).unwrap();
    let indices: Vec<u32> = slices.iter().map(|slice| slice.n).collect();
    assert_eq!(indices, vec![5, 6, 7]);
}

#[test]
fn split_empty_buffer_yields_no_chunks() {
    assert!(codec::split(b"", 4, 0).unwrap().is_empty());
}

#[test]
fn split_rejects_a_zero_chunk_size() {
    let error = codec::split(b"abc", 0, 0).unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::InvalidArgument { .. }));
}

#[test]
fn split_default_chunk_size_boundaries() {
    let default_chunk_size = 256 * 1024;

    let slices = codec::split(&[1u8; 128], default_chunk_size, 0).unwrap();
    assert_eq!(slices.len(), 1);
    assert_eq!(slices[0].bytes.len(), 128);

    let slices = codec::split(&[1u8; 1024], default_chunk_size, 0).unwrap();
    assert_eq!(slices.len(), 1);

    let slices = codec::split(&[1u8; 257 * 1024], default_chunk_size, 0).unwrap();
    let sizes: Vec<usize> = slices.iter().map(|slice| slice.bytes.len()).collect();
    assert_eq!(sizes, vec![262144, 1024]);
}

#[test]
fn reassemble_inverts_split() {
    for len in [0usize, 1, 3, 4, 5, 8, 9, 17] {
        let data: Vec<u8> = (0..len).map(|i| i as u8).collect();
        let chunks: Vec<(u32, Vec<u8>)> = codec::split(&data, 4, 0)
            .unwrap()
            .into_iter()
            .map(|slice| (slice.n, slice.bytes.to_vec()))
            .collect();
        assert_eq!(codec::reassemble(0, chunks).unwrap(), data);
    }
}

#[test]
fn reassemble_detects_a_gap() {
    let chunks = vec![(0u32, vec![1u8; 4]), (2u32, vec![2u8; 4])];
    let error = codec::reassemble(0, chunks).unwrap_err();
    match *error.kind {
        ErrorKind::GridFs(GridFsErrorKind::MissingChunk { n }) => assert_eq!(n, 1),
        ref other => panic!("expected a missing chunk error, got {other:?}"),
    }
}

#[test]
fn reassemble_detects_a_duplicate() {
    let chunks = vec![(0u32, vec![1u8; 4]), (1u32, vec![2u8; 4]), (1u32, vec![3u8; 4])];
    let error = codec::reassemble(0, chunks).unwrap_err();
    match *error.kind {
        ErrorKind::GridFs(GridFsErrorKind::DuplicateChunk { n }) => assert_eq!(n, 1),
        ref other => panic!("expected a duplicate chunk error, got {other:?}"),
    }
}

#[test]
fn reassemble_respects_the_starting_index() {
    let chunks = vec![(3u32, vec![1u8; 4]), (4u32, vec![2u8; 2])];
    let bytes = codec::reassemble(3, chunks).unwrap();
    assert_eq!(bytes.len(), 6);
}

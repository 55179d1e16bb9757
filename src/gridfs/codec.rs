//! Pure chunk-shaping logic: cutting a byte buffer into ordered chunk payloads and
//! reassembling ordered payloads into a contiguous buffer. No I/O happens here.

use crate::{
    checked::Checked,
    error::{Error, ErrorKind, GridFsErrorKind, Result},
};

/// A borrowed chunk payload produced by [`split`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct ChunkSlice<'a> {
    /// The index of the chunk within its file.
    pub(crate) n: u32,

    /// The payload, `chunk_size_bytes` long for every chunk except possibly the last.
    pub(crate) bytes: &'a [u8],
}

/// Cuts `buffer` into ordered chunk payloads of `chunk_size_bytes`, starting at index
/// `starting_n`.
///
/// Every produced chunk is exactly `chunk_size_bytes` long except the last, which holds the
/// remainder and is never padded. An empty buffer produces no chunks. Fails if
/// `chunk_size_bytes` is zero.
pub(crate) fn split(
    buffer: &[u8],
    chunk_size_bytes: u32,
    starting_n: u32,
) -> Result<Vec<ChunkSlice<'_>>> {
    if chunk_size_bytes == 0 {
        return Err(Error::invalid_argument(
            "chunk size must be a positive number of bytes",
        ));
    }
    let chunk_size: usize = Checked::new(chunk_size_bytes).try_into()?;
    let mut slices = Vec::with_capacity(buffer.len() / chunk_size + 1);
    for (i, bytes) in buffer.chunks(chunk_size).enumerate() {
        let n = (Checked::new(starting_n) + Checked::try_from(i)?).get()?;
        slices.push(ChunkSlice { n, bytes });
    }
    Ok(slices)
}

/// Concatenates ordered `(index, payload)` pairs into a contiguous buffer.
///
/// The indices must form the contiguous range starting at `starting_n`; a gap fails with
/// [`GridFsErrorKind::MissingChunk`] and a repeated or out-of-order index with
/// [`GridFsErrorKind::DuplicateChunk`].
pub(crate) fn reassemble<I>(starting_n: u32, chunks: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (u32, Vec<u8>)>,
{
    let mut next_n = starting_n;
    let mut buffer = Vec::new();
    for (n, bytes) in chunks {
        if n < next_n {
            return Err(ErrorKind::GridFs(GridFsErrorKind::DuplicateChunk { n }).into());
        }
        if n > next_n {
            return Err(ErrorKind::GridFs(GridFsErrorKind::MissingChunk { n: next_n }).into());
        }
        buffer.extend_from_slice(&bytes);
        next_n = (Checked::new(next_n) + 1u32).get()?;
    }
    Ok(buffer)
}

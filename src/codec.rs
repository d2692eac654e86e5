//! Whole-buffer zlib (DEFLATE) compression.
//!
//! Both directions drive a raw [`flate2`] stream by hand, pumping output in
//! fixed-size blocks and appending each block to a growable buffer until the
//! stream reports its end. Archives pass through here on load and save when
//! the caller asks for compression.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use tracing::debug;

use crate::error::{CodecOperation, Error, Result};

/// Size of each output block requested from the stream.
const BLOCK_SIZE: usize = 32 * 1024;

/// Compress `input` at the best compression level.
///
/// Never fails for well-formed input in practice; an error means the
/// underlying engine refused to finish the stream.
pub fn compress(input: &[u8]) -> Result<Vec<u8>> {
    let mut stream = Compress::new(Compression::best(), true);
    let mut block = vec![0u8; BLOCK_SIZE];
    let mut output = Vec::with_capacity(input.len() / 2 + 64);

    loop {
        let consumed = stream.total_in() as usize;
        let before_out = stream.total_out();

        let status = stream
            .compress(&input[consumed..], &mut block, FlushCompress::Finish)
            .map_err(|e| stream_error(CodecOperation::Compress, e))?;

        let produced = (stream.total_out() - before_out) as usize;
        output.extend_from_slice(&block[..produced]);

        match status {
            Status::StreamEnd => break,
            Status::Ok => {}
            Status::BufError if produced == 0 => {
                return Err(stream_error(
                    CodecOperation::Compress,
                    "stream made no progress",
                ));
            }
            Status::BufError => {}
        }
    }

    debug!(input = input.len(), output = output.len(), "compressed buffer");
    Ok(output)
}

/// Decompress a buffer produced by [`compress`].
///
/// Input that is not a complete zlib stream (garbage, a truncated stream,
/// an empty buffer) fails with [`Error::CodecStream`]; partial output is
/// never returned. Bytes after the end of the stream are ignored.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut stream = Decompress::new(true);
    let mut block = vec![0u8; BLOCK_SIZE];
    let mut output = Vec::with_capacity(input.len().saturating_mul(2));

    loop {
        let before_in = stream.total_in();
        let before_out = stream.total_out();

        let status = stream
            .decompress(&input[before_in as usize..], &mut block, FlushDecompress::None)
            .map_err(|e| stream_error(CodecOperation::Decompress, e))?;

        let produced = (stream.total_out() - before_out) as usize;
        output.extend_from_slice(&block[..produced]);

        match status {
            Status::StreamEnd => break,
            Status::Ok | Status::BufError => {
                if produced == 0 && stream.total_in() == before_in {
                    return Err(stream_error(
                        CodecOperation::Decompress,
                        "unexpected end of compressed stream",
                    ));
                }
            }
        }
    }

    let trailing = input.len() - stream.total_in() as usize;
    if trailing > 0 {
        debug!(trailing, "ignoring bytes after end of compressed stream");
    }
    debug!(input = input.len(), output = output.len(), "decompressed buffer");
    Ok(output)
}

fn stream_error(operation: CodecOperation, message: impl ToString) -> Error {
    Error::CodecStream {
        operation,
        message: message.to_string(),
    }
}

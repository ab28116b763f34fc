//! Chunked inflate engine: decodes a region holding one or more zlib streams
//! concatenated back-to-back.
//!
//! # Stream boundaries
//! A BLS compressed region does not announce where one zlib stream ends and
//! the next begins.  The engine drives a single [`Inflater`] over the region:
//! each sub-stream is decoded until the decoder stops producing output, then
//! the decoder is reset and pointed at the remaining input.
//!
//! # Faults
//! A decode fault (corrupt data, preset dictionary required) is fatal for the
//! rest of the region but never for the run.  Everything decoded up to that
//! point is kept and returned alongside the fault in [`Inflated`].

use flate2::{Decompress, DecompressError, FlushDecompress, Status};
use std::collections::TryReserveError;
use thiserror::Error;
use tracing::{debug, warn};

/// Scratch buffer handed to the decoder on every call: 1 MiB.
pub const SCRATCH_SIZE: usize = 1024 * 1024;
/// Initial reservation for the decompressed buffer: 4 MiB.
pub const OUTPUT_RESERVE: usize = 4 * 1024 * 1024;

// ── Error types ──────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum InflateError {
    /// The decoder context could not be set up.
    #[error("Error init zlib: {0}")]
    Init(#[from] TryReserveError),
}

/// Why decoding of a sub-stream stopped early.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeFault {
    #[error("stream requires a preset dictionary (adler32 {0:#010x})")]
    NeedDictionary(u32),
    #[error("corrupt deflate data: {0}")]
    DataCorruption(String),
}

impl From<DecompressError> for DecodeFault {
    fn from(e: DecompressError) -> Self {
        match e.needs_dictionary() {
            Some(adler) => DecodeFault::NeedDictionary(adler),
            None        => DecodeFault::DataCorruption(e.to_string()),
        }
    }
}

// ── Inflater ─────────────────────────────────────────────────────────────────

/// How one sub-stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubStream {
    /// The zlib end-of-stream marker was reached.
    Finished { consumed: usize },
    /// The decoder stopped with output to spare and no end marker: the input
    /// ran out mid-stream, or no further progress was possible.
    Drained { consumed: usize },
    /// The decoder rejected the input.  Output from earlier, successful calls
    /// is kept; whatever the failing call produced is discarded.
    Fault { consumed: usize, fault: DecodeFault },
}

impl SubStream {
    /// Input bytes taken by this sub-stream.
    pub fn consumed(&self) -> usize {
        match *self {
            SubStream::Finished { consumed }
            | SubStream::Drained { consumed }
            | SubStream::Fault { consumed, .. } => consumed,
        }
    }
}

/// Owned zlib decoder context plus its scratch buffer.
///
/// Decoder state is released when the value is dropped, whichever way the
/// caller leaves its loop.
pub struct Inflater {
    stream:  Decompress,
    scratch: Vec<u8>,
}

impl Inflater {
    pub fn new() -> Result<Self, InflateError> {
        Self::with_scratch_size(SCRATCH_SIZE)
    }

    pub fn with_scratch_size(size: usize) -> Result<Self, InflateError> {
        let mut scratch = Vec::new();
        scratch.try_reserve_exact(size.max(1))?;
        scratch.resize(size.max(1), 0);
        Ok(Self {
            stream: Decompress::new(true),
            scratch,
        })
    }

    /// Decode one sub-stream from the front of `input`, appending the output
    /// to `out`.
    ///
    /// Keeps calling the decoder while it fills the scratch buffer completely;
    /// a short fill means the current sub-stream has nothing more pending.
    pub fn run(&mut self, input: &[u8], out: &mut Vec<u8>) -> SubStream {
        let mut consumed = 0usize;
        loop {
            let in_before  = self.stream.total_in();
            let out_before = self.stream.total_out();
            let result = self.stream.decompress(
                &input[consumed..],
                &mut self.scratch,
                FlushDecompress::None,
            );
            let read     = (self.stream.total_in() - in_before) as usize;
            let produced = (self.stream.total_out() - out_before) as usize;
            debug_assert!(consumed + read <= input.len());
            debug_assert!(produced <= self.scratch.len());

            consumed += read;

            // Output of a call that ends in an error is not trusted.
            let status = match result {
                Ok(status) => status,
                Err(e) => {
                    return SubStream::Fault { consumed, fault: DecodeFault::from(e) }
                }
            };
            out.extend_from_slice(&self.scratch[..produced]);

            match status {
                Status::StreamEnd => return SubStream::Finished { consumed },
                Status::Ok if produced == self.scratch.len() => continue,
                Status::Ok | Status::BufError => return SubStream::Drained { consumed },
            }
        }
    }

    /// Start a fresh zlib stream.
    pub fn reset(&mut self) {
        self.stream.reset(true);
    }
}

// ── Chunked decoding ─────────────────────────────────────────────────────────

/// Result of [`inflate_chunked`].
#[derive(Debug, Clone, Default)]
pub struct Inflated {
    /// Concatenated output of every sub-stream, in input order.
    pub data:     Vec<u8>,
    /// Sub-streams that reached their end marker.
    pub streams:  usize,
    /// Input bytes consumed before decoding stopped.
    pub consumed: usize,
    /// Set when decoding stopped on a corrupt sub-stream.
    pub fault:    Option<DecodeFault>,
}

impl Inflated {
    pub fn is_complete(&self) -> bool {
        self.fault.is_none()
    }
}

/// Decode every zlib stream in `input`, resetting the decoder between them.
///
/// Stops at the end of input, at the first decode fault, or when a sub-stream
/// makes no progress.  Only failing to set up the decoder is an error.
pub fn inflate_chunked(input: &[u8]) -> Result<Inflated, InflateError> {
    Ok(inflate_chunked_with(Inflater::new()?, input))
}

/// [`inflate_chunked`] over a caller-supplied decoder context.
pub fn inflate_chunked_with(mut inflater: Inflater, input: &[u8]) -> Inflated {
    let mut result = Inflated {
        data: Vec::with_capacity(OUTPUT_RESERVE),
        ..Inflated::default()
    };

    while result.consumed < input.len() {
        let start  = result.consumed;
        let before = result.data.len();
        let outcome = inflater.run(&input[start..], &mut result.data);
        result.consumed += outcome.consumed();

        match outcome {
            SubStream::Finished { consumed } => {
                result.streams += 1;
                debug!(
                    offset = start,
                    consumed,
                    produced = result.data.len() - before,
                    "sub-stream finished"
                );
            }
            SubStream::Drained { consumed } => {
                debug!(offset = start, consumed, "sub-stream drained without end marker");
                if consumed == 0 {
                    warn!(offset = start, "decoder made no progress; stopping");
                    break;
                }
            }
            SubStream::Fault { fault, .. } => {
                warn!(offset = start, streams = result.streams, %fault, "decoding stopped");
                result.fault = Some(fault);
                break;
            }
        }

        inflater.reset();
    }

    debug!(
        streams  = result.streams,
        consumed = result.consumed,
        produced = result.data.len(),
        "inflate finished"
    );
    result
}

//! Shader-source extractor: finds GLSL fragments inside decompressed BLS
//! payloads.
//!
//! # What counts as a fragment
//!
//! A fragment starts at a `#version` token and ends at the `}` that closes
//! the body of the first `void main()` that follows it.  Braces before the
//! entry point (struct bodies, helper functions) are not counted.  Bytes
//! between fragments are binary noise and are dropped.
//!
//! # Scanning rules
//!
//! | State        | Byte                          | Effect |
//! |--------------|-------------------------------|--------|
//! | `Idle`       | `#` followed by `version`     | fragment starts here |
//! | `InFragment` | `v` followed by `oid main()`  | entry point seen (once) |
//! | `InFragment` | `{` after entry point         | depth + 1 |
//! | `InFragment` | `}` after entry point         | depth - 1; at 0 the fragment closes |
//!
//! A `#version` met inside a fragment is ordinary content: it neither starts
//! a new fragment nor clears the entry-point flag or the brace depth.
//!
//! A fragment still open at end of buffer is yielded as-is with
//! `closed == false`; [`extract`] writes it without a trailing newline.

use std::io::{self, Write};
use tracing::trace;

pub const VERSION_TOKEN: &[u8] = b"#version";
pub const ENTRY_POINT:   &[u8] = b"void main()";

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    InFragment {
        /// Offset of the `#version` token that opened the fragment.
        start:            usize,
        entry_point_seen: bool,
        depth:            i64,
    },
}

/// One shader-source excerpt, borrowed from the scanned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub offset: usize,
    pub bytes:  &'a [u8],
    /// `false` when the buffer ended before the entry-point body closed.
    pub closed: bool,
}

impl Fragment<'_> {
    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.bytes)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Fragments whose entry-point body closed.
    pub fragments:     usize,
    /// The buffer ended inside a fragment.
    pub truncated:     bool,
    /// Bytes written, newlines included.
    pub bytes_written: usize,
}

// ── Scanner ───────────────────────────────────────────────────────────────────

/// Single forward pass over a buffer, yielding fragments in discovery order.
#[derive(Debug, Clone)]
pub struct FragmentScanner<'a> {
    buf:   &'a [u8],
    pos:   usize,
    state: ScanState,
}

impl<'a> FragmentScanner<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, state: ScanState::Idle }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Advance over the byte at `i`.  Returns a fragment when this byte
    /// closes one.
    fn step(&mut self, i: usize) -> Option<Fragment<'a>> {
        let buf  = self.buf;
        let byte = buf[i];
        let rest = &buf[i..];

        match &mut self.state {
            ScanState::Idle => {
                if byte == b'#' && rest.starts_with(VERSION_TOKEN) {
                    trace!(offset = i, "fragment start");
                    self.state = ScanState::InFragment {
                        start:            i,
                        entry_point_seen: false,
                        depth:            0,
                    };
                }
                None
            }
            ScanState::InFragment { start, entry_point_seen, depth } => {
                if !*entry_point_seen && byte == b'v' && rest.starts_with(ENTRY_POINT) {
                    *entry_point_seen = true;
                }
                if !*entry_point_seen {
                    return None;
                }
                match byte {
                    b'{' => *depth += 1,
                    b'}' => {
                        *depth -= 1;
                        if *depth == 0 {
                            let start = *start;
                            self.state = ScanState::Idle;
                            return Some(Fragment {
                                offset: start,
                                bytes:  &buf[start..=i],
                                closed: true,
                            });
                        }
                    }
                    _ => {}
                }
                None
            }
        }
    }
}

impl<'a> Iterator for FragmentScanner<'a> {
    type Item = Fragment<'a>;

    fn next(&mut self) -> Option<Fragment<'a>> {
        while self.pos < self.buf.len() {
            let i = self.pos;
            self.pos += 1;
            if let Some(fragment) = self.step(i) {
                return Some(fragment);
            }
        }

        if let ScanState::InFragment { start, .. } = self.state {
            self.state = ScanState::Idle;
            return Some(Fragment {
                offset: start,
                bytes:  &self.buf[start..],
                closed: false,
            });
        }
        None
    }
}

/// Iterate over the shader fragments in `buf`.
pub fn fragments(buf: &[u8]) -> FragmentScanner<'_> {
    FragmentScanner::new(buf)
}

/// Write every fragment in `buf` to `out`, each closed fragment followed by
/// a single `\n`.
///
/// Scanning itself cannot fail; only writes to `out` can.
pub fn extract<W: Write>(buf: &[u8], mut out: W) -> io::Result<ExtractSummary> {
    let mut summary = ExtractSummary::default();

    for fragment in fragments(buf) {
        trace!(
            offset = fragment.offset,
            len    = fragment.bytes.len(),
            closed = fragment.closed,
            "fragment"
        );
        out.write_all(fragment.bytes)?;
        summary.bytes_written += fragment.bytes.len();

        if fragment.closed {
            out.write_all(b"\n")?;
            summary.bytes_written += 1;
            summary.fragments += 1;
        } else {
            summary.truncated = true;
        }
    }

    Ok(summary)
}

//! End-to-end pipeline: header → compressed region → inflate → extract.
//!
//! ```no_run
//! use blsd::dump::dump_file;
//!
//! let stdout = std::io::stdout();
//! let report = dump_file("shader.bls", stdout.lock())?;
//! eprintln!("{} shader(s)", report.summary.fragments);
//! # Ok::<(), blsd::BlsError>(())
//! ```

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::extract::{extract, ExtractSummary};
use crate::header::{BlsHeader, HeaderError};
use crate::inflate::{inflate_chunked, DecodeFault, InflateError, Inflated};

// ── Error type ───────────────────────────────────────────────────────────────

/// Setup-phase failures.  Decode faults are not errors; they are reported in
/// [`DumpReport::fault`].
#[derive(Error, Debug)]
pub enum BlsError {
    #[error("Error open '{}' file: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("BLSHeader: {0}")]
    Header(#[from] HeaderError),
    #[error(transparent)]
    Inflate(#[from] InflateError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── BlsFile ──────────────────────────────────────────────────────────────────

/// A validated header plus the raw compressed region that follows it.
#[derive(Debug, Clone)]
pub struct BlsFile {
    header:     BlsHeader,
    compressed: Vec<u8>,
}

impl BlsFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BlsError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| BlsError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    /// Read the header, then everything from `ofs_compressed_data` to the end
    /// of the stream.
    ///
    /// An invalid magic fails here, before any decompression is attempted.
    pub fn from_reader<R: Read + Seek>(mut reader: R) -> Result<Self, BlsError> {
        let header = BlsHeader::read(&mut reader)?;
        debug!(
            version     = %header.format_version(),
            permutations = header.permutation_count,
            shaders     = header.n_shaders,
            chunks      = header.n_compressed_chunks,
            data_offset = header.ofs_compressed_data,
            "header"
        );

        let file_len = reader.seek(SeekFrom::End(0))?;
        let region   = header.compressed_len(file_len);
        let mut compressed = Vec::new();
        if region > 0 {
            reader.seek(SeekFrom::Start(header.ofs_compressed_data as u64))?;
            reader.read_to_end(&mut compressed)?;
        }
        debug!(file_len, compressed = compressed.len(), "compressed region loaded");

        Ok(Self { header, compressed })
    }

    pub fn header(&self) -> &BlsHeader {
        &self.header
    }

    pub fn compressed(&self) -> &[u8] {
        &self.compressed
    }

    pub fn decompress(&self) -> Result<Inflated, BlsError> {
        Ok(inflate_chunked(&self.compressed)?)
    }
}

// ── DumpReport ───────────────────────────────────────────────────────────────

/// What one run of the pipeline did.
#[derive(Debug, Clone)]
pub struct DumpReport {
    pub header:          BlsHeader,
    pub compressed_len:  usize,
    pub inflated_len:    usize,
    /// zlib streams that decoded to their end marker.
    pub streams:         usize,
    pub fault:           Option<DecodeFault>,
    pub summary:         ExtractSummary,
}

/// Run the whole pipeline on an opened [`BlsFile`], writing shader text to
/// `out`.
pub fn dump<W: Write>(bls: &BlsFile, out: W) -> Result<DumpReport, BlsError> {
    let inflated = bls.decompress()?;
    let summary  = extract(&inflated.data, out)?;

    let header = *bls.header();
    if summary.fragments != header.n_shaders as usize {
        debug!(
            declared = header.n_shaders,
            found    = summary.fragments,
            "shader count differs from header"
        );
    }

    Ok(DumpReport {
        header,
        compressed_len: bls.compressed().len(),
        inflated_len:   inflated.data.len(),
        streams:        inflated.streams,
        fault:          inflated.fault,
        summary,
    })
}

/// Convenience: open `path` and dump its shaders to `out`.
pub fn dump_file<P: AsRef<Path>, W: Write>(path: P, out: W) -> Result<DumpReport, BlsError> {
    dump(&BlsFile::open(path)?, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{HEADER_SIZE, MAGIC_GXSH};
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Cursor;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut c = ZlibEncoder::new(Vec::new(), Compression::best());
        c.write_all(data).unwrap();
        c.finish().unwrap()
    }

    fn container(magic: u32, gap: usize, streams: &[&[u8]]) -> Vec<u8> {
        let ofs_data = (HEADER_SIZE + gap) as u32;
        let mut buf = Vec::new();
        for field in [magic, 0x10004, 1, streams.len() as u32, 0, streams.len() as u32, ofs_data] {
            buf.extend_from_slice(&field.to_le_bytes());
        }
        buf.resize(ofs_data as usize, 0xEE);
        for s in streams {
            buf.extend(zlib(s));
        }
        buf
    }

    #[test]
    fn dumps_all_streams() {
        let a: &[u8] = b"\x01\x02#version 450\nvoid main() { }\x00";
        let b: &[u8] = b"#version 450\nvoid main() { { } }";
        let bls = BlsFile::from_reader(Cursor::new(container(MAGIC_GXSH, 12, &[a, b]))).unwrap();
        assert_eq!(bls.header().n_shaders, 2);

        let mut out = Vec::new();
        let report = dump(&bls, &mut out).unwrap();
        assert_eq!(out, b"#version 450\nvoid main() { }\n#version 450\nvoid main() { { } }\n");
        assert_eq!(report.streams, 2);
        assert_eq!(report.summary.fragments, 2);
        assert_eq!(report.inflated_len, a.len() + b.len());
        assert!(report.fault.is_none());
    }

    #[test]
    fn gap_before_data_is_skipped() {
        let bls = BlsFile::from_reader(Cursor::new(container(MAGIC_GXSH, 100, &[&b"abc"[..]]))).unwrap();
        assert_eq!(bls.compressed(), &zlib(b"abc")[..]);
    }

    #[test]
    fn invalid_magic_stops_before_decompression() {
        let bytes = container(MAGIC_GXSH.swap_bytes(), 0, &[&b"#version 1\nvoid main() {}"[..]]);
        match BlsFile::from_reader(Cursor::new(bytes)) {
            Err(BlsError::Header(HeaderError::InvalidMagic { .. })) => {}
            other => panic!("expected InvalidMagic, got {other:?}"),
        }
    }

    #[test]
    fn data_offset_past_end_gives_empty_region() {
        let mut bytes = container(MAGIC_GXSH, 0, &[]);
        bytes[24..28].copy_from_slice(&1000u32.to_le_bytes());
        let bls = BlsFile::from_reader(Cursor::new(bytes)).unwrap();
        assert!(bls.compressed().is_empty());

        let mut out = Vec::new();
        let report = dump(&bls, &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(report.streams, 0);
    }

    #[test]
    fn open_missing_file() {
        match dump_file("/nonexistent/dir/shader.bls", Vec::new()) {
            Err(BlsError::Open { path, source }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/dir/shader.bls"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected Open error, got {other:?}"),
        }
    }
}

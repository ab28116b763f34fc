//! BLS container header: the fixed 28-byte record at offset 0.
//!
//! # Layout
//!
//! | Offset | Field                   | Type |
//! |--------|-------------------------|------|
//! | 0      | magic                   | u32  |
//! | 4      | version                 | u32  |
//! | 8      | permutation_count       | u32  |
//! | 12     | n_shaders               | u32  |
//! | 16     | ofs_compressed_chunks   | u32  |
//! | 20     | n_compressed_chunks     | u32  |
//! | 24     | ofs_compressed_data     | u32  |
//!
//! All fields are little-endian.  The magic is a FourCC composed big-endian
//! from its mnemonic, so on disk the bytes read `HSXG`.
//!
//! Only the magic is validated.  The remaining fields are informational;
//! the extractor never branches on them.

use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt;
use std::io::{self, Read};
use thiserror::Error;

/// Size of the on-disk header record in bytes.
pub const HEADER_SIZE: usize = 28;

/// `"GXSH"` composed as `('G' << 24) | ('X' << 16) | ('S' << 8) | 'H'`.
pub const MAGIC_GXSH: u32 =
    (b'G' as u32) << 24 | (b'X' as u32) << 16 | (b'S' as u32) << 8 | b'H' as u32;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Invalid magic value {found:#010x} (expected 0x47585348, \"GXSH\")")]
    InvalidMagic { found: u32 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── FormatVersion ────────────────────────────────────────────────────────────

/// Known historical values of the `version` field.  Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    WrathOfTheLichKing,
    /// Shared by Cataclysm, Mists of Pandaria and Warlords of Draenor.
    Cataclysm,
    BattleForAzerothEarly,
    BattleForAzeroth,
    Shadowlands,
    Unknown(u32),
}

impl FormatVersion {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0x10003 => FormatVersion::WrathOfTheLichKing,
            0x10004 => FormatVersion::Cataclysm,
            0x10005 => FormatVersion::BattleForAzerothEarly,
            0x10006 => FormatVersion::BattleForAzeroth,
            0x1000B => FormatVersion::Shadowlands,
            other   => FormatVersion::Unknown(other),
        }
    }

    /// Short era label for diagnostics.
    pub fn era(self) -> &'static str {
        match self {
            FormatVersion::WrathOfTheLichKing    => "WotLK",
            FormatVersion::Cataclysm             => "Cata/MoP/WoD",
            FormatVersion::BattleForAzerothEarly => "BfA (early)",
            FormatVersion::BattleForAzeroth      => "BfA",
            FormatVersion::Shadowlands           => "SL",
            FormatVersion::Unknown(_)            => "unknown",
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatVersion::Unknown(raw) => write!(f, "{raw:#x} (unknown)"),
            known => f.write_str(known.era()),
        }
    }
}

// ── BlsHeader ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlsHeader {
    pub magic:                 u32,
    pub version:               u32,
    pub permutation_count:     u32,
    /// Shader count the file claims to hold.  Not checked against what the
    /// extractor actually finds.
    pub n_shaders:             u32,
    /// Offset of the chunk-offset array, relative to `ofs_compressed_data`.
    pub ofs_compressed_chunks: u32,
    pub n_compressed_chunks:   u32,
    /// Absolute file offset of the first zlib stream.
    pub ofs_compressed_data:   u32,
}

impl BlsHeader {
    /// Read the header record and validate its magic.
    ///
    /// On success the reader is positioned exactly `HEADER_SIZE` bytes past
    /// where it started.
    pub fn read<R: Read>(mut reader: R) -> Result<Self, HeaderError> {
        let header = Self::read_unchecked(&mut reader)?;
        if !header.is_magic_valid() {
            return Err(HeaderError::InvalidMagic { found: header.magic });
        }
        Ok(header)
    }

    /// Read the header record without looking at the magic.
    pub fn read_unchecked<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            magic:                 reader.read_u32::<LittleEndian>()?,
            version:               reader.read_u32::<LittleEndian>()?,
            permutation_count:     reader.read_u32::<LittleEndian>()?,
            n_shaders:             reader.read_u32::<LittleEndian>()?,
            ofs_compressed_chunks: reader.read_u32::<LittleEndian>()?,
            n_compressed_chunks:   reader.read_u32::<LittleEndian>()?,
            ofs_compressed_data:   reader.read_u32::<LittleEndian>()?,
        })
    }

    #[inline]
    pub fn is_magic_valid(&self) -> bool {
        self.magic == MAGIC_GXSH
    }

    pub fn format_version(&self) -> FormatVersion {
        FormatVersion::from_raw(self.version)
    }

    /// The magic as its four-character mnemonic (`"GXSH"` for valid files).
    /// Non-printable bytes render as `.`.
    pub fn magic_fourcc(&self) -> String {
        self.magic
            .to_be_bytes()
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect()
    }

    /// Length of the compressed region `[ofs_compressed_data, file_len)`.
    pub fn compressed_len(&self, file_len: u64) -> u64 {
        file_len.saturating_sub(self.ofs_compressed_data as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn raw_header(magic: &[u8; 4], version: u32, ofs_data: u32) -> Vec<u8> {
        let mut buf = magic.to_vec();
        for field in [version, 7, 3, 0, 1, ofs_data] {
            buf.extend_from_slice(&field.to_le_bytes());
        }
        buf
    }

    #[test]
    fn magic_constant_matches_mnemonic() {
        assert_eq!(MAGIC_GXSH, u32::from_be_bytes(*b"GXSH"));
        assert_eq!(MAGIC_GXSH.to_le_bytes(), *b"HSXG");
    }

    #[test]
    fn reads_all_fields_in_order() {
        let bytes = raw_header(b"HSXG", 0x10004, 0x40);
        assert_eq!(bytes.len(), HEADER_SIZE);
        let mut cur = Cursor::new(&bytes);
        let h = BlsHeader::read(&mut cur).unwrap();
        assert_eq!(cur.position(), HEADER_SIZE as u64);
        assert_eq!(h.magic, MAGIC_GXSH);
        assert_eq!(h.version, 0x10004);
        assert_eq!(h.permutation_count, 7);
        assert_eq!(h.n_shaders, 3);
        assert_eq!(h.ofs_compressed_chunks, 0);
        assert_eq!(h.n_compressed_chunks, 1);
        assert_eq!(h.ofs_compressed_data, 0x40);
        assert_eq!(h.format_version(), FormatVersion::Cataclysm);
        assert_eq!(h.magic_fourcc(), "GXSH");
    }

    #[test]
    fn byte_swapped_magic_is_rejected() {
        // Mnemonic written in reading order instead of reversed.
        let bytes = raw_header(b"GXSH", 0x10006, 28);
        match BlsHeader::read(Cursor::new(&bytes)) {
            Err(HeaderError::InvalidMagic { found }) => {
                assert_eq!(found, MAGIC_GXSH.swap_bytes());
            }
            other => panic!("expected InvalidMagic, got {other:?}"),
        }
    }

    #[test]
    fn near_miss_magic_is_rejected() {
        for magic in [b"HSXF", b"ISXG", b"HSVG", b"HPXG"] {
            let h = BlsHeader::read_unchecked(Cursor::new(raw_header(magic, 0, 28))).unwrap();
            assert!(!h.is_magic_valid(), "{} accepted", h.magic_fourcc());
        }
    }

    #[test]
    fn short_header_is_io_error() {
        let bytes = raw_header(b"HSXG", 0x10003, 28);
        match BlsHeader::read(Cursor::new(&bytes[..HEADER_SIZE - 1])) {
            Err(HeaderError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn unknown_version_is_kept() {
        assert_eq!(FormatVersion::from_raw(0x2_0000), FormatVersion::Unknown(0x2_0000));
        assert_eq!(FormatVersion::from_raw(0x1000B).to_string(), "SL");
        assert_eq!(FormatVersion::from_raw(0x2_0000).to_string(), "0x20000 (unknown)");
    }

    #[test]
    fn compressed_len_saturates() {
        let h = BlsHeader::read(Cursor::new(raw_header(b"HSXG", 0, 100))).unwrap();
        assert_eq!(h.compressed_len(160), 60);
        assert_eq!(h.compressed_len(100), 0);
        assert_eq!(h.compressed_len(50), 0);
    }

    #[test]
    fn non_printable_fourcc() {
        let h = BlsHeader::read_unchecked(Cursor::new(raw_header(&[0, b'A', 0x7f, b'B'], 0, 0))).unwrap();
        assert_eq!(h.magic_fourcc(), "B.A.");
    }

    proptest! {
        #[test]
        fn magic_valid_iff_constant(magic in any::<u32>()) {
            let bytes = raw_header(&magic.to_le_bytes(), 0x10005, 28);
            let h = BlsHeader::read_unchecked(Cursor::new(&bytes)).unwrap();
            prop_assert_eq!(h.is_magic_valid(), magic == MAGIC_GXSH);
            prop_assert_eq!(BlsHeader::read(Cursor::new(&bytes)).is_ok(), magic == MAGIC_GXSH);
        }
    }
}

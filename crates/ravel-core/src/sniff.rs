//! Binary content detection for response bodies with no declared type.
//!
//! A fixed magic-number table covers the common image, audio, video,
//! archive, and executable formats; a byte-distribution heuristic catches
//! everything else that is clearly not text.

/// Magic-number prefixes checked at offset zero.
const PREFIX_MAGICS: &[&[u8]] = &[
    b"\xFF\xD8\xFF",              // JPEG
    b"\x89PNG",                   // PNG
    b"GIF87a",                    // GIF
    b"GIF89a",
    b"BM",                        // BMP
    b"II\x2A\x00",                // TIFF little-endian
    b"MM\x00\x2A",                // TIFF big-endian
    b"fLaC",                      // FLAC
    b"OggS",                      // OGG
    b"ID3",                       // MP3 with ID3 tag
    b"\x1A\x45\xDF\xA3",          // WebM / Matroska
    b"%PDF",                      // PDF
    b"PK\x03\x04",                // ZIP
    b"PK\x05\x06",                // ZIP (empty archive)
    b"PK\x07\x08",                // ZIP (spanned)
    b"Rar!\x1A\x07\x00",          // RAR v4
    b"Rar!\x1A\x07\x01\x00",      // RAR v5
    b"7z\xBC\xAF\x27\x1C",        // 7-Zip
    b"\x1F\x8B",                  // gzip
    b"MZ",                        // DOS/PE executable
    b"\x7FELF",                   // ELF
    b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1", // legacy MS Office
];

/// Returns true when the buffer looks like a known binary file format or
/// has a byte distribution inconsistent with text.
pub fn is_binary(buf: &[u8]) -> bool {
    if buf.is_empty() {
        return false;
    }

    for magic in PREFIX_MAGICS {
        if buf.starts_with(magic) {
            return true;
        }
    }

    // RIFF containers carry their subtype at offset 8.
    if buf.starts_with(b"RIFF") && buf.len() >= 12 {
        let subtype = &buf[8..12];
        if subtype == b"WEBP" || subtype == b"WAVE" || subtype == b"AVI " {
            return true;
        }
    }

    // MP4: the ftyp box sits after a 4-byte size field.
    if buf.len() >= 12 && &buf[4..8] == b"ftyp" {
        let brand = &buf[8..12];
        if brand.starts_with(b"isom") || brand.starts_with(b"mp4") || brand.starts_with(b"M4") {
            return true;
        }
    }

    // MP3 without an ID3 tag: MPEG audio frame sync (11 set bits).
    if buf.len() >= 2 && buf[0] == 0xFF && (buf[1] & 0xE0) == 0xE0 {
        return true;
    }

    byte_distribution_looks_binary(buf)
}

/// >10% null bytes, or >30% control bytes other than tab, LF, and CR.
fn byte_distribution_looks_binary(buf: &[u8]) -> bool {
    let mut nulls = 0usize;
    let mut control = 0usize;
    for &b in buf {
        if b == 0 {
            nulls += 1;
        }
        if (b < 0x20 || b == 0x7F) && b != b'\t' && b != b'\n' && b != b'\r' {
            control += 1;
        }
    }
    nulls * 10 > buf.len() || control * 10 > buf.len() * 3
}

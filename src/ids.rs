pub type ChunkID = [u8; 4];

// IFF (AIFF / AIFF-C)
pub const FORM: &ChunkID = b"FORM";
pub const AIFF: &ChunkID = b"AIFF";
pub const AIFF_C: &ChunkID = b"AIFC";
pub const FVER: &ChunkID = b"FVER"; // 'Format version' - for AIFF C
pub const COMMON: &ChunkID = b"COMM";
pub const SOUND: &ChunkID = b"SSND";
pub const APPLICATION: &ChunkID = b"APPL";
pub const NAME: &ChunkID = b"NAME";
pub const AUTHOR: &ChunkID = b"AUTH";
pub const COPYRIGHT: &ChunkID = b"(c) ";
pub const ANNOTATION: &ChunkID = b"ANNO";
pub const ID3: &ChunkID = b"ID3 ";
pub const AFSP: &ChunkID = b"AFsp"; // APPL signature for info records

// AIFF-C compression types
pub const NONE: &ChunkID = b"NONE";
pub const TWOS: &ChunkID = b"twos";
pub const SOWT: &ChunkID = b"sowt";
pub const RAW: &ChunkID = b"raw ";
pub const FL32: &ChunkID = b"fl32";
pub const FL32_UPPER: &ChunkID = b"FL32";
pub const FL64: &ChunkID = b"fl64";
pub const FL64_UPPER: &ChunkID = b"FL64";
pub const ULAW: &ChunkID = b"ulaw";
pub const ULAW_UPPER: &ChunkID = b"ULAW";
pub const ALAW: &ChunkID = b"alaw";
pub const ALAW_UPPER: &ChunkID = b"ALAW";

// RIFF (WAVE)
pub const RIFF: &ChunkID = b"RIFF";
pub const WAVE: &ChunkID = b"WAVE";
pub const FMT: &ChunkID = b"fmt ";
pub const FACT: &ChunkID = b"fact";
pub const DATA: &ChunkID = b"data";
pub const LIST: &ChunkID = b"LIST";
pub const INFO: &ChunkID = b"INFO";
pub const AFSP_LOWER: &ChunkID = b"afsp";

// AU and pseudo-chunks for headers without chunk structure
pub const AU_MAGIC: &ChunkID = b".snd";
pub const HEADER: &ChunkID = b"hdr ";
pub const TEXT_INFO: &ChunkID = b"info";
pub const SAMPLES: &ChunkID = b"data";

/// Blank-pad (or truncate) an identifier to four bytes.
pub fn padded(id: &[u8]) -> ChunkID {
    let mut out = *b"    ";
    for (o, b) in out.iter_mut().zip(id) {
        *o = *b;
    }
    out
}

pub fn display(id: &ChunkID) -> String {
    id.iter()
        .map(|b| match b {
            0x20..=0x7e => *b as char,
            _ => '?',
        })
        .collect()
}

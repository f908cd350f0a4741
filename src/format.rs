use std::fmt;

/// On-disk sample representation.
///
/// The discriminants index the per-container compatibility tables, so the
/// order here is load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFormat {
    Undefined = 0,
    /// 8-bit mu-law (G.711).
    Mulaw8,
    /// 8-bit mu-law with the bit order of each byte reversed.
    Mulawr8,
    /// 8-bit A-law (G.711).
    Alaw8,
    /// 8-bit offset-binary integer.
    Uint8,
    Int8,
    Int16,
    Int24,
    Int32,
    Float32,
    Float64,
    /// One decimal value per whitespace-separated token.
    Text,
}

pub const NUM_FORMATS: usize = 12;

impl DataFormat {
    pub const ALL: [DataFormat; NUM_FORMATS] = [
        DataFormat::Undefined,
        DataFormat::Mulaw8,
        DataFormat::Mulawr8,
        DataFormat::Alaw8,
        DataFormat::Uint8,
        DataFormat::Int8,
        DataFormat::Int16,
        DataFormat::Int24,
        DataFormat::Int32,
        DataFormat::Float32,
        DataFormat::Float64,
        DataFormat::Text,
    ];

    /// Bytes per sample on disk. Zero for text (variable width) and
    /// undefined data.
    pub fn width(self) -> usize {
        match self {
            DataFormat::Undefined | DataFormat::Text => 0,
            DataFormat::Mulaw8
            | DataFormat::Mulawr8
            | DataFormat::Alaw8
            | DataFormat::Uint8
            | DataFormat::Int8 => 1,
            DataFormat::Int16 => 2,
            DataFormat::Int24 => 3,
            DataFormat::Int32 | DataFormat::Float32 => 4,
            DataFormat::Float64 => 8,
        }
    }

    pub fn is_fixed_width(self) -> bool {
        self.width() > 0
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataFormat::Float32 | DataFormat::Float64)
    }

    pub fn is_companded(self) -> bool {
        matches!(
            self,
            DataFormat::Mulaw8 | DataFormat::Mulawr8 | DataFormat::Alaw8
        )
    }

    /// File amplitude that maps to the nominal canonical amplitude.
    pub fn default_full_scale(self) -> f64 {
        match self {
            DataFormat::Uint8 | DataFormat::Int8 => 128.0,
            DataFormat::Mulaw8
            | DataFormat::Mulawr8
            | DataFormat::Alaw8
            | DataFormat::Int16 => 32768.0,
            DataFormat::Int24 => 8_388_608.0,
            DataFormat::Int32 => 2_147_483_648.0,
            DataFormat::Undefined
            | DataFormat::Float32
            | DataFormat::Float64
            | DataFormat::Text => 1.0,
        }
    }

    /// Bits of resolution in the container; floats report their width.
    pub fn bits(self) -> u32 {
        match self {
            DataFormat::Mulaw8 | DataFormat::Mulawr8 | DataFormat::Alaw8 => 16,
            DataFormat::Text => 64,
            f => 8 * f.width() as u32,
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DataFormat::Undefined => "undefined",
            DataFormat::Mulaw8 => "8-bit mu-law",
            DataFormat::Mulawr8 => "8-bit bit-reversed mu-law",
            DataFormat::Alaw8 => "8-bit A-law",
            DataFormat::Uint8 => "offset-binary 8-bit integer",
            DataFormat::Int8 => "8-bit integer",
            DataFormat::Int16 => "16-bit integer",
            DataFormat::Int24 => "24-bit integer",
            DataFormat::Int32 => "32-bit integer",
            DataFormat::Float32 => "32-bit float",
            DataFormat::Float64 => "64-bit float",
            DataFormat::Text => "text",
        };
        f.write_str(name)
    }
}

/// Container type, for reading (as a hint) and writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Au = 0,
    Wave,
    /// WAVE that never uses the extensible format header.
    WaveNoEx,
    Aiff,
    Aifc,
    /// AIFF-C holding little-endian integers ("sowt").
    AifcSowt,
    Sphere,
    Esps,
    Ircam,
    Sppack,
    Inrs,
    Spw,
    Nsp,
    Text,
    Raw,
}

pub const NUM_FILE_TYPES: usize = 15;

impl FileType {
    /// Identify a container from the first bytes of a stream. Unknown data
    /// is `None`; the caller decides whether to fall back to raw.
    pub fn sniff(magic: &[u8]) -> Option<FileType> {
        let has = |at: usize, tag: &[u8]| {
            magic.len() >= at + tag.len() && &magic[at..at + tag.len()] == tag
        };
        if has(0, b".snd") {
            Some(FileType::Au)
        } else if has(0, b"RIFF") && has(8, b"WAVE") {
            Some(FileType::Wave)
        } else if has(0, b"FORM") && has(8, b"AIFF") {
            Some(FileType::Aiff)
        } else if has(0, b"FORM") && has(8, b"AIFC") {
            Some(FileType::Aifc)
        } else if has(0, b"NIST_1A") {
            Some(FileType::Sphere)
        } else if has(0, b"%//") {
            Some(FileType::Text)
        } else if has(16, &[0x00, 0x00, 0x6a, 0x1a])
            || has(16, &[0x1a, 0x6a, 0x00, 0x00])
        {
            Some(FileType::Esps)
        } else if has(0, &[0x64, 0xa3, 0x01, 0x00])
            || has(0, &[0x00, 0x01, 0xa3, 0x64])
            || has(0, &[0x64, 0xa3, 0x02, 0x00])
            || has(0, &[0x64, 0xa3, 0x03, 0x00])
            || has(0, &[0x64, 0xa3, 0x04, 0x00])
        {
            Some(FileType::Ircam)
        } else {
            None
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            FileType::Au => "AU",
            FileType::Wave => "WAVE",
            FileType::WaveNoEx => "WAVE-NOEX",
            FileType::Aiff => "AIFF",
            FileType::Aifc => "AIFF-C",
            FileType::AifcSowt => "AIFF-C/sowt",
            FileType::Sphere => "NIST SPHERE",
            FileType::Esps => "ESPS",
            FileType::Ircam => "IRCAM",
            FileType::Sppack => "SPPACK",
            FileType::Inrs => "INRS-Telecom",
            FileType::Spw => "Comdisco SPW",
            FileType::Nsp => "CSL NSP",
            FileType::Text => "text audio",
            FileType::Raw => "headerless",
        };
        f.write_str(name)
    }
}

/// Byte order as requested by a header or a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Native,
    Swap,
    Little,
    Big,
}

impl ByteOrder {
    /// Resolve against the host: `true` when bytes must be swapped.
    pub fn needs_swap(self) -> bool {
        match self {
            ByteOrder::Native => false,
            ByteOrder::Swap => true,
            ByteOrder::Little => cfg!(target_endian = "big"),
            ByteOrder::Big => cfg!(target_endian = "little"),
        }
    }

    /// Resolve to a concrete endianness: `true` for big-endian.
    pub fn is_big(self) -> bool {
        self.needs_swap() ^ cfg!(target_endian = "big")
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        ByteOrder::Native
    }
}

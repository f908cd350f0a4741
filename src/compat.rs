//! Per-container tables of storable data formats, and the precision ranking
//! used to choose an output format from several inputs.

use super::error::{Error, Result};
use super::format::{DataFormat, FileType, NUM_FILE_TYPES, NUM_FORMATS};

use super::format::DataFormat::{
    Alaw8 as AL, Float32 as F4, Float64 as F8, Int16 as I2, Int24 as I3,
    Int32 as I4, Int8 as I1, Mulaw8 as MU, Mulawr8 as MR, Text as TX,
    Uint8 as U1, Undefined as UN,
};

type Row = [DataFormat; NUM_FORMATS];

// Columns follow DataFormat discriminant order:
//   UN  MU  MR  AL  U1  I1  I2  I3  I4  F4  F8  TX
const NEAREST: [Row; NUM_FILE_TYPES] = [
    // AU
    [UN, MU, MU, AL, I1, I1, I2, I3, I4, F4, F8, UN],
    // WAVE
    [UN, MU, MU, AL, U1, U1, I2, I3, I4, F4, F8, UN],
    // WAVE-NOEX
    [UN, MU, MU, AL, U1, U1, I2, I3, I4, F4, F8, UN],
    // AIFF
    [UN, I2, I2, I2, I1, I1, I2, I3, I4, UN, UN, UN],
    // AIFF-C
    [UN, MU, MU, AL, I1, I1, I2, I3, I4, F4, F8, UN],
    // AIFF-C/sowt
    [UN, I2, I2, I2, I2, I2, I2, I3, I4, UN, UN, UN],
    // NIST SPHERE
    [UN, MU, MU, AL, I1, I1, I2, I3, I4, UN, UN, UN],
    // ESPS
    [UN, I2, I2, I2, I1, I1, I2, I4, I4, F4, F8, UN],
    // IRCAM
    [UN, MU, MU, AL, I1, I1, I2, I4, I4, F4, F4, UN],
    // SPPACK
    [UN, MU, MU, AL, I2, I2, I2, UN, UN, UN, UN, UN],
    // INRS
    [UN, I2, I2, I2, I2, I2, I2, UN, UN, UN, UN, UN],
    // SPW
    [UN, I2, I2, I2, I2, I2, I2, UN, UN, UN, UN, UN],
    // NSP
    [UN, I2, I2, I2, I2, I2, I2, UN, UN, UN, UN, UN],
    // text
    [UN, TX, TX, TX, TX, TX, TX, TX, TX, TX, TX, TX],
    // headerless
    [UN, MU, MR, AL, U1, I1, I2, I3, I4, F4, F8, TX],
];

const RANK_FORMAT: [DataFormat; 8] = [UN, MU, I1, I2, I3, I4, F4, F8];

const RANK_16BIT: usize = 3;

/// Nearest format `file_type` can hold for a requested `format`.
/// `Undefined` means the container has no sensible substitute.
pub fn nearest_allowed(file_type: FileType, format: DataFormat) -> DataFormat {
    NEAREST[file_type as usize][format as usize]
}

pub fn is_allowed(file_type: FileType, format: DataFormat) -> bool {
    format != DataFormat::Undefined && nearest_allowed(file_type, format) == format
}

pub fn rank_precision(format: DataFormat) -> usize {
    match format {
        DataFormat::Undefined => 0,
        DataFormat::Mulaw8 | DataFormat::Mulawr8 | DataFormat::Alaw8 => 1,
        DataFormat::Uint8 | DataFormat::Int8 => 2,
        DataFormat::Int16 => 3,
        DataFormat::Int24 => 4,
        DataFormat::Int32 => 5,
        DataFormat::Float32 | DataFormat::Text => 6,
        DataFormat::Float64 => 7,
    }
}

/// Least-surprising common format for a set of inputs: the highest
/// precision seen, never below 16-bit.
pub fn merge_formats<I>(formats: I) -> DataFormat
where
    I: IntoIterator<Item = DataFormat>,
{
    let rank = formats
        .into_iter()
        .map(rank_precision)
        .fold(RANK_16BIT, usize::max);
    RANK_FORMAT[rank]
}

/// Output format for `file_type` given the input formats, validated
/// against what the container can hold.
pub fn output_format<I>(file_type: FileType, formats: I) -> Result<DataFormat>
where
    I: IntoIterator<Item = DataFormat>,
{
    let format = merge_formats(formats);
    if !is_allowed(file_type, format) {
        return Err(Error::config(format!(
            "{} data is not supported in {} files",
            format, file_type
        )));
    }
    Ok(format)
}

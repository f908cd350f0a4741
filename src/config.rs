//! Caller-supplied options. Nothing here is global: every open and close
//! call takes the options it should honour.

use super::format::{ByteOrder, DataFormat};
use super::info::InfoStore;
use super::speaker::Speaker;

/// What to do when a handle operation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Return the error to the caller.
    Return,
    /// Log the error and exit the process with status 1, the way batch
    /// audio tools traditionally behave.
    Halt,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        ErrorPolicy::Return
    }
}

/// Parameters for data without a header (or with a header that does not
/// carry them, such as text audio).
#[derive(Debug, Clone, PartialEq)]
pub struct InputDefaults {
    pub format: DataFormat,
    pub byte_order: ByteOrder,
    /// Bytes to skip before the first sample.
    pub start: u64,
    pub channels: usize,
    /// `None` uses the data format's own full scale.
    pub full_scale: Option<f64>,
    pub sample_rate: f64,
}

impl Default for InputDefaults {
    fn default() -> Self {
        InputDefaults {
            format: DataFormat::Int16,
            byte_order: ByteOrder::Native,
            start: 0,
            channels: 1,
            full_scale: None,
            sample_rate: 8000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Canonical amplitude that corresponds to a file's full scale.
    pub scale_v: f64,
    pub error_policy: ErrorPolicy,
    /// Clamp a declared data length that runs past the end of the file
    /// instead of rejecting the header.
    pub fix_length: bool,
    pub input: InputDefaults,
    /// Values per line when writing text audio; `None` picks one line per
    /// frame, or one value per line for more than five channels.
    pub text_per_line: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            scale_v: 1.0,
            error_policy: ErrorPolicy::Return,
            fix_length: true,
            input: InputDefaults::default(),
            text_per_line: None,
        }
    }
}

impl Options {
    pub fn with_scale(mut self, scale_v: f64) -> Self {
        self.scale_v = scale_v;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_fix_length(mut self, fix: bool) -> Self {
        self.fix_length = fix;
        self
    }

    pub fn with_input(mut self, input: InputDefaults) -> Self {
        self.input = input;
        self
    }

    pub fn with_text_per_line(mut self, n: usize) -> Self {
        self.text_per_line = Some(n);
        self
    }
}

/// Output choices beyond format, channels and rate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteParams {
    /// Frame count known ahead of time. Lets sequential outputs carry
    /// correct length fields.
    pub frames: Option<u64>,
    /// Significant bits per sample; defaults to the container width.
    pub bits: Option<u32>,
    pub speakers: Vec<Speaker>,
    pub info: InfoStore,
    /// Byte order for headerless output.
    pub byte_order: ByteOrder,
    /// `None` uses the data format's own full scale.
    pub full_scale: Option<f64>,
}

impl WriteParams {
    pub fn new() -> WriteParams {
        WriteParams::default()
    }

    pub fn with_frames(mut self, frames: u64) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn with_bits(mut self, bits: u32) -> Self {
        self.bits = Some(bits);
        self
    }

    pub fn with_speakers(mut self, speakers: Vec<Speaker>) -> Self {
        self.speakers = speakers;
        self
    }

    pub fn with_info(mut self, id: &str, text: &str) -> Self {
        self.info.append(id, text);
        self
    }

    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    pub fn with_full_scale(mut self, full_scale: f64) -> Self {
        self.full_scale = Some(full_scale);
        self
    }
}

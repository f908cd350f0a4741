//! Audio file I/O through a single handle.
//!
//! Samples cross the API as `f64` in a canonical amplitude range: a file's
//! full scale maps to [`Options::scale_v`]. Containers (AU, WAVE, AIFF,
//! AIFF-C, text, headerless) are chosen by [`FileType`]; the data format is
//! one of [`DataFormat`].
//!
//! ```no_run
//! use afio::{AudioFile, DataFormat, FileType, Options, WriteParams};
//!
//! let opts = Options::default();
//! let mut out = AudioFile::create(
//!     "tone.wav",
//!     FileType::Wave,
//!     DataFormat::Int16,
//!     1,
//!     8000.0,
//!     &WriteParams::new(),
//!     &opts,
//! )?;
//! out.write_samples(&[0.0, 0.5, -0.5])?;
//! out.close()?;
//!
//! let mut input = AudioFile::open("tone.wav", &opts)?;
//! let mut buf = [0.0; 3];
//! input.read_samples(0, &mut buf)?;
//! # Ok::<(), afio::Error>(())
//! ```

extern crate audio_codec_algorithms;
extern crate bytes;
extern crate id3;
extern crate log;
extern crate seek_bufread;

pub mod chunks;
pub mod compat;
pub mod config;
pub mod error;
mod extended;
pub mod format;
pub mod formats;
mod handle;
pub mod ids;
pub mod info;
pub mod samples;
pub mod speaker;
pub mod stream;

pub use crate::config::{ErrorPolicy, InputDefaults, Options, WriteParams};
pub use crate::error::{Error, Result};
pub use crate::format::{ByteOrder, DataFormat, FileType};
pub use crate::handle::{close, AudioFile};
pub use crate::info::InfoStore;
pub use crate::speaker::Speaker;
pub use crate::stream::{Sink, Source};

use afio::{
    AudioFile, ByteOrder, DataFormat, Error, FileType, InputDefaults, Options, Sink, Source,
    Speaker, WriteParams,
};
use std::cell::RefCell;
use std::f64::consts::PI;
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::rc::Rc;

/// In-memory stream that stays readable after the handle owning it closes.
#[derive(Clone, Default)]
struct Shared(Rc<RefCell<Cursor<Vec<u8>>>>);

impl Shared {
    fn bytes(&self) -> Vec<u8> {
        self.0.borrow().get_ref().clone()
    }
}

impl Write for Shared {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for Shared {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.borrow_mut().seek(pos)
    }
}

fn sine(frames: usize, channels: usize, amplitude: f64) -> Vec<f64> {
    (0..frames * channels)
        .map(|i| {
            let (n, c) = (i / channels, i % channels);
            amplitude * (2.0 * PI * 440.0 * n as f64 / 8000.0 + c as f64).sin()
        })
        .collect()
}

fn write_seekable(
    file_type: FileType,
    format: DataFormat,
    channels: usize,
    samples: &[f64],
    params: &WriteParams,
) -> Vec<u8> {
    let buf = Shared::default();
    let sink = Sink::seekable(buf.clone());
    let mut af = AudioFile::open_write(
        sink,
        file_type,
        format,
        channels,
        8000.0,
        params,
        &Options::default(),
    )
    .unwrap();
    assert_eq!(af.write_samples(samples).unwrap(), samples.len());
    af.close().unwrap();
    buf.bytes()
}

fn read_all(bytes: Vec<u8>) -> (AudioFile, Vec<f64>) {
    let mut af =
        AudioFile::open_read(Source::seekable(Cursor::new(bytes)), None, &Options::default())
            .unwrap();
    let n = af.samples().unwrap() as usize;
    let mut out = vec![0.0; n];
    assert_eq!(af.read_samples(0, &mut out).unwrap(), n);
    (af, out)
}

fn assert_close(a: &[f64], b: &[f64], tol: f64) {
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        assert!((x - y).abs() <= tol, "sample {}: {} vs {}", i, x, y);
    }
}

#[test]
fn stereo_sine_through_a_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sine.wav");
    let opts = Options::default();
    let input = sine(100, 2, 0.8);
    let left: Vec<f64> = input.iter().step_by(2).copied().collect();
    let right: Vec<f64> = input.iter().skip(1).step_by(2).copied().collect();

    let mut out = AudioFile::create(
        &path,
        FileType::Wave,
        DataFormat::Int16,
        2,
        8000.0,
        &WriteParams::new(),
        &opts,
    )
    .unwrap();
    assert_eq!(out.write_frames(&[&left[..], &right[..]], 100).unwrap(), 100);
    out.close().unwrap();

    let mut af = AudioFile::open(&path, &opts).unwrap();
    assert_eq!(af.file_type(), FileType::Wave);
    assert_eq!(af.channels(), 2);
    assert_eq!(af.samples(), Some(200));
    assert_eq!(af.sample_rate(), 8000.0);

    let mut back = vec![0.0; 200];
    assert_eq!(af.read_samples(0, &mut back).unwrap(), 200);
    assert_close(&back, &input, 1.0 / 32768.0);
}

#[test]
fn every_writable_container() {
    let cases = [
        (FileType::Au, DataFormat::Int24, 1.0 / 8_388_608.0),
        (FileType::Au, DataFormat::Float32, 1e-6),
        (FileType::Au, DataFormat::Mulaw8, 0.04),
        (FileType::Wave, DataFormat::Uint8, 1.0 / 128.0),
        (FileType::Wave, DataFormat::Float64, 0.0),
        (FileType::WaveNoEx, DataFormat::Int32, 1e-9),
        (FileType::Aiff, DataFormat::Int8, 1.0 / 128.0),
        (FileType::Aifc, DataFormat::Float32, 1e-6),
        (FileType::Aifc, DataFormat::Alaw8, 0.04),
        (FileType::AifcSowt, DataFormat::Int16, 1.0 / 32768.0),
    ];
    // odd length exercises RIFF/IFF padding
    let input = sine(101, 1, 0.9);
    for (file_type, format, tol) in cases {
        let bytes = write_seekable(file_type, format, 1, &input, &WriteParams::new());
        let (af, back) = read_all(bytes);
        // readers do not distinguish the WAVE variants
        let read_as = match file_type {
            FileType::WaveNoEx => FileType::Wave,
            t => t,
        };
        assert_eq!(af.file_type(), read_as, "{}", file_type);
        assert_eq!(af.format(), format, "{}", file_type);
        assert_eq!(back.len(), 101, "{}", file_type);
        assert_close(&back, &input, tol);
    }
}

#[test]
fn text_audio_round_trip_and_rewind() {
    let input = vec![0.5, -0.25, 1.0, 0.125, 0.0, -1.0, 0.75, 0.3, -0.6];
    let bytes = write_seekable(FileType::Text, DataFormat::Text, 3, &input, &WriteParams::new());
    let text = String::from_utf8(bytes.clone()).unwrap();
    assert!(text.starts_with("%//\n"));
    assert!(text.contains("\n0.5 -0.25 1\n"));

    let mut af =
        AudioFile::open_read(Source::seekable(Cursor::new(bytes)), None, &Options::default())
            .unwrap();
    assert_eq!(af.file_type(), FileType::Text);
    assert_eq!(af.channels(), 3);
    assert_eq!(af.samples(), None);

    let mut buf = vec![0.0; 12];
    assert_eq!(af.read_samples(0, &mut buf).unwrap(), 9);
    assert_eq!(&buf[..9], &input[..]);
    assert_eq!(af.samples(), Some(9));

    let mut two = [0.0; 2];
    assert_eq!(af.read_samples(4, &mut two).unwrap(), 2);
    assert_eq!(two, [0.0, -1.0]);
    assert_eq!(af.read_samples(1, &mut two).unwrap(), 2);
    assert_eq!(two, [-0.25, 1.0]);
}

#[test]
fn header_metadata_survives() {
    let params = WriteParams::new()
        .with_bits(20)
        .with_speakers(vec![Speaker::FrontLeft, Speaker::FrontRight, Speaker::LowFrequency])
        .with_info("title:", "Tone");
    let input = sine(10, 3, 0.5);
    let bytes = write_seekable(FileType::Wave, DataFormat::Int24, 3, &input, &params);

    let (af, _) = read_all(bytes);
    assert_eq!(af.bits(), 20);
    assert_eq!(
        af.speakers(),
        &[Speaker::FrontLeft, Speaker::FrontRight, Speaker::LowFrequency]
    );
    assert_eq!(af.info().find(&["title:"]), Some("Tone"));
    assert_eq!(af.frames(), Some(10));
}

#[test]
fn fractional_rate_in_an_au_header() {
    let buf = Shared::default();
    let mut af = AudioFile::open_write(
        Sink::seekable(buf.clone()),
        FileType::Au,
        DataFormat::Int16,
        1,
        11025.5,
        &WriteParams::new(),
        &Options::default(),
    )
    .unwrap();
    af.write_samples(&[0.0; 4]).unwrap();
    af.close().unwrap();

    let (af, _) = read_all(buf.bytes());
    assert_eq!(af.sample_rate(), 11025.5);
}

#[test]
fn clipping_is_counted_once_per_sample() {
    let buf = Shared::default();
    let mut af = AudioFile::open_write(
        Sink::seekable(buf.clone()),
        FileType::Au,
        DataFormat::Int16,
        1,
        8000.0,
        &WriteParams::new(),
        &Options::default(),
    )
    .unwrap();
    af.write_samples(&[1.1, 0.5]).unwrap();
    assert_eq!(af.overloads(), 1);
    af.close().unwrap();

    let (_, back) = read_all(buf.bytes());
    assert_eq!(back, vec![32767.0 / 32768.0, 0.5]);
}

#[test]
fn sequential_au_with_open_length() {
    let buf = Shared::default();
    let mut af = AudioFile::open_write(
        Sink::sequential(buf.clone()),
        FileType::Au,
        DataFormat::Int16,
        1,
        8000.0,
        &WriteParams::new(),
        &Options::default(),
    )
    .unwrap();
    af.write_samples(&[0.25, 0.5, -0.5, -0.25]).unwrap();
    af.close().unwrap();

    let bytes = buf.bytes();
    assert_eq!(&bytes[8..12], &[0xff; 4]);
    let mut af =
        AudioFile::open_read(Source::sequential(Cursor::new(bytes)), None, &Options::default())
            .unwrap();
    assert_eq!(af.samples(), None);
    let mut out = [1.0; 10];
    assert_eq!(af.read_samples(0, &mut out).unwrap(), 4);
    assert_eq!(out[..5], [0.25, 0.5, -0.5, -0.25, 0.0]);
    assert_eq!(af.samples(), Some(4));
}

#[test]
fn sequential_wave_with_declared_frames() {
    let buf = Shared::default();
    let params = WriteParams::new().with_frames(3);
    let mut af = AudioFile::open_write(
        Sink::sequential(buf.clone()),
        FileType::Wave,
        DataFormat::Int16,
        2,
        8000.0,
        &params,
        &Options::default(),
    )
    .unwrap();
    af.write_samples(&[0.0; 6]).unwrap();
    af.close().unwrap();

    let (af, _) = read_all(buf.bytes());
    assert_eq!(af.samples(), Some(6));
}

#[test]
fn read_frames_with_a_negative_offset() {
    let input = [0.125, 0.25, 0.375, 0.5, 0.625, 0.75];
    let bytes = write_seekable(FileType::Au, DataFormat::Int16, 2, &input, &WriteParams::new());
    let mut af =
        AudioFile::open_read(Source::seekable(Cursor::new(bytes)), None, &Options::default())
            .unwrap();

    let (mut left, mut right) = (vec![9.0; 6], vec![9.0; 6]);
    let got = af.read_frames(-2, &mut [&mut left[..], &mut right[..]], 6).unwrap();
    assert_eq!(got, 5);
    assert_eq!(left, vec![0.0, 0.0, 0.125, 0.375, 0.625, 0.0]);
    assert_eq!(right, vec![0.0, 0.0, 0.25, 0.5, 0.75, 0.0]);
}

#[test]
fn headerless_data_uses_input_defaults() {
    let input = [0.5, -0.5, 0.25, -0.25];
    let params = WriteParams::new().with_byte_order(ByteOrder::Big);
    let bytes = write_seekable(FileType::Raw, DataFormat::Int16, 2, &input, &params);
    assert_eq!(bytes, vec![0x40, 0x00, 0xc0, 0x00, 0x20, 0x00, 0xe0, 0x00]);

    let opts = Options::default().with_input(InputDefaults {
        format: DataFormat::Int16,
        byte_order: ByteOrder::Big,
        channels: 2,
        sample_rate: 16000.0,
        ..InputDefaults::default()
    });
    let mut af =
        AudioFile::open_read(Source::seekable(Cursor::new(bytes)), Some(FileType::Raw), &opts)
            .unwrap();
    assert_eq!(af.channels(), 2);
    assert_eq!(af.sample_rate(), 16000.0);
    let mut out = [0.0; 4];
    af.read_samples(0, &mut out).unwrap();
    assert_eq!(out, input);
}

#[test]
fn scale_maps_full_scale_to_the_nominal_amplitude() {
    let opts = Options::default().with_scale(32768.0);
    let buf = Shared::default();
    let mut af = AudioFile::open_write(
        Sink::seekable(buf.clone()),
        FileType::Wave,
        DataFormat::Int16,
        1,
        8000.0,
        &WriteParams::new(),
        &opts,
    )
    .unwrap();
    af.write_samples(&[1000.0, -32768.0]).unwrap();
    af.close().unwrap();

    let mut af =
        AudioFile::open_read(Source::seekable(Cursor::new(buf.bytes())), None, &opts).unwrap();
    let mut out = [0.0; 2];
    af.read_samples(0, &mut out).unwrap();
    assert_eq!(out, [1000.0, -32768.0]);
}

#[test]
fn unsupported_containers_are_rejected() {
    let sphere = b"NIST_1A\n   1024\n".to_vec();
    assert!(matches!(
        AudioFile::open_read(Source::seekable(Cursor::new(sphere)), None, &Options::default()),
        Err(Error::UnsupportedFormat(_))
    ));
}

#[test]
fn full_scale_survives_binary_headers() {
    let params = WriteParams::new().with_full_scale(1000.0);
    for file_type in [FileType::Au, FileType::Wave, FileType::Aiff] {
        let bytes = write_seekable(file_type, DataFormat::Int16, 1, &[0.5, -0.25], &params);
        let (af, back) = read_all(bytes);
        assert_eq!(af.full_scale(), 1000.0, "{}", file_type);
        assert_eq!(back, vec![0.5, -0.25], "{}", file_type);
    }
}

#[test]
fn channel_counts_beyond_the_header_field_are_refused() {
    for (file_type, channels) in [(FileType::WaveNoEx, 70_000), (FileType::Aiff, 40_000)] {
        let result = AudioFile::open_write(
            Sink::sequential(Vec::new()),
            file_type,
            DataFormat::Int16,
            channels,
            8000.0,
            &WriteParams::new(),
            &Options::default(),
        );
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))), "{}", file_type);
    }
}

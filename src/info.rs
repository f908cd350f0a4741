//! Named free-text metadata records.
//!
//! A record is stored as `identifier ++ text` and serialised with a NUL
//! terminator. Identifiers conventionally end in `:` (`"title:"`,
//! `"sample_rate:"`). Lookups are first-match-wins over insertion order.

use super::format::ByteOrder;
use super::speaker::{self, Speaker};
use log::warn;

pub const SAMPLE_RATE: &[&str] = &["sample_rate:"];
pub const FULL_SCALE: &[&str] = &["full_scale:"];
pub const BITS_PER_SAMPLE: &[&str] = &["bits_per_sample:"];
pub const LOUDSPEAKERS: &[&str] = &["loudspeakers:", "speakers:"];
pub const CHANNELS: &[&str] = &["channels:", "number_of_channels:"];
pub const FRAMES: &[&str] = &["frames:", "sample_frames:"];
pub const DATA_BYTES: &[&str] = &["data_length:", "data_bytes:"];
pub const BYTE_ORDER: &[&str] = &["byte_order:"];
pub const TITLE: &[&str] = &["title:", "display_text:"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoStore {
    records: Vec<String>,
}

/// Significant bits and container resolution decoded from `"NbS/Res"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitDepth {
    pub nbs: u32,
    pub res: u32,
}

impl InfoStore {
    pub fn new() -> InfoStore {
        InfoStore::default()
    }

    /// Parse a block of NUL-terminated records. Empty records are dropped
    /// and a missing final terminator is tolerated.
    pub fn from_block(block: &[u8]) -> InfoStore {
        let records = block
            .split(|b| *b == 0)
            .map(|r| String::from_utf8_lossy(r).trim_end().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        InfoStore { records }
    }

    /// Serialise as `record NUL record NUL ...`.
    pub fn to_block(&self) -> Vec<u8> {
        let mut block = Vec::new();
        for rec in &self.records {
            block.extend_from_slice(rec.as_bytes());
            block.push(0);
        }
        block
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Full records (identifier and text) in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.as_str())
    }

    pub fn append(&mut self, id: &str, text: &str) {
        let text = sanitize(text);
        let mut rec = String::with_capacity(id.len() + text.len() + 1);
        rec.push_str(id);
        let id_ws = id.chars().last().map_or(true, char::is_whitespace);
        let text_ws = text.chars().next().map_or(true, char::is_whitespace);
        if !id_ws && !text_ws {
            rec.push(' ');
        }
        rec.push_str(&text);
        if rec.is_empty() {
            return;
        }
        self.records.push(rec);
    }

    /// Append every record of `other`, keeping its order.
    pub fn extend(&mut self, other: &InfoStore) {
        self.records.extend(other.records.iter().cloned());
    }

    /// Remove the first record matching `id`. Returns whether one was found.
    pub fn delete(&mut self, id: &str) -> bool {
        match self.records.iter().position(|r| r.starts_with(id)) {
            Some(i) => {
                self.records.remove(i);
                true
            }
            None => false,
        }
    }

    /// Text of the first record whose identifier is any of `ids`, with the
    /// separating whitespace removed. An empty identifier matches the first
    /// record.
    pub fn find(&self, ids: &[&str]) -> Option<&str> {
        self.records.iter().find_map(|rec| {
            ids.iter()
                .find(|id| rec.starts_with(*id))
                .map(|id| rec[id.len()..].trim_start())
        })
    }

    pub fn contains(&self, ids: &[&str]) -> bool {
        self.find(ids).is_some()
    }

    fn decoded<T, F>(&self, ids: &[&str], what: &str, decode: F) -> Option<T>
    where
        F: Fn(&str) -> Option<T>,
    {
        let text = self.find(ids)?;
        let val = decode(text);
        if val.is_none() {
            warn!("invalid {} information {:?} ignored", what, text);
        }
        val
    }

    pub fn byte_count(&self, ids: &[&str]) -> Option<u64> {
        self.decoded(ids, "byte count", parse_count)
    }

    pub fn channel_count(&self) -> Option<usize> {
        self.decoded(CHANNELS, "channel count", |t| {
            parse_count(t).filter(|n| *n > 0).map(|n| n as usize)
        })
    }

    pub fn frame_count(&self) -> Option<u64> {
        self.decoded(FRAMES, "frame count", parse_count)
    }

    pub fn full_scale(&self) -> Option<f64> {
        self.decoded(FULL_SCALE, "full scale", |t| {
            parse_ratio(t).filter(|v| *v > 0.0)
        })
    }

    pub fn sample_rate(&self) -> Option<f64> {
        self.decoded(SAMPLE_RATE, "sample rate", parse_rate)
    }

    pub fn bit_depth(&self) -> Option<BitDepth> {
        self.decoded(BITS_PER_SAMPLE, "bits per sample", parse_bit_depth)
    }

    pub fn byte_order(&self) -> Option<ByteOrder> {
        self.decoded(BYTE_ORDER, "byte order", parse_byte_order)
    }

    pub fn speakers(&self) -> Option<Vec<Speaker>> {
        let text = self.find(LOUDSPEAKERS)?;
        match speaker::parse_list(text) {
            Ok(list) => Some(list),
            Err(e) => {
                warn!("loudspeaker information ignored: {}", e);
                None
            }
        }
    }
}

// Trailing NULs and whitespace go, CR and CRLF become LF.
fn sanitize(text: &str) -> String {
    let text = text.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            '\0' => out.push(' '),
            c => out.push(c),
        }
    }
    out
}

pub fn parse_count(text: &str) -> Option<u64> {
    text.trim().parse::<u64>().ok()
}

/// `"value"` or `"num/den"`.
pub fn parse_ratio(text: &str) -> Option<f64> {
    let text = text.trim();
    let val = match text.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => text.parse().ok()?,
    };
    if val.is_finite() {
        Some(val)
    } else {
        None
    }
}

/// A ratio with an optional `Hz` or `kHz` unit.
pub fn parse_rate(text: &str) -> Option<f64> {
    let text = text.trim();
    let lower = text.to_ascii_lowercase();
    let (num, mult) = if lower.ends_with("khz") {
        (&text[..text.len() - 3], 1000.0)
    } else if lower.ends_with("hz") {
        (&text[..text.len() - 2], 1.0)
    } else {
        (text, 1.0)
    };
    parse_ratio(num).map(|v| v * mult).filter(|v| *v > 0.0)
}

/// `"NbS/Res"` or `"NbS"`; `Res` defaults to the next multiple of 8.
pub fn parse_bit_depth(text: &str) -> Option<BitDepth> {
    let text = text.trim();
    let (nbs, res) = match text.split_once('/') {
        Some((n, r)) => (n.trim().parse().ok()?, r.trim().parse().ok()?),
        None => {
            let n: u32 = text.parse().ok()?;
            (n, n.checked_add(7)? / 8 * 8)
        }
    };
    if nbs == 0 || nbs > res || res > 64 {
        return None;
    }
    Some(BitDepth { nbs, res })
}

const BYTE_ORDER_KEYS: [(&str, ByteOrder); 4] = [
    ("native", ByteOrder::Native),
    ("swap", ByteOrder::Swap),
    ("little-endian", ByteOrder::Little),
    ("big-endian", ByteOrder::Big),
];

/// Keywords may be shortened to any unambiguous prefix.
pub fn parse_byte_order(text: &str) -> Option<ByteOrder> {
    let word = text.trim().to_ascii_lowercase();
    if word.is_empty() {
        return None;
    }
    let mut hits = BYTE_ORDER_KEYS
        .iter()
        .filter(|(key, _)| key.starts_with(word.as_str()));
    match (hits.next(), hits.next()) {
        (Some((_, order)), None) => Some(*order),
        _ => None,
    }
}

use std::fmt;

/// Loudspeaker location. Codes follow the WAVE channel-mask bit order, so
/// `code - 1` is the mask bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Speaker {
    FrontLeft = 1,
    FrontRight,
    FrontCenter,
    LowFrequency,
    BackLeft,
    BackRight,
    FrontLeftOfCenter,
    FrontRightOfCenter,
    BackCenter,
    SideLeft,
    SideRight,
    TopCenter,
    TopFrontLeft,
    TopFrontCenter,
    TopFrontRight,
    TopBackLeft,
    TopBackCenter,
    TopBackRight,
}

const ALL: [Speaker; 18] = [
    Speaker::FrontLeft,
    Speaker::FrontRight,
    Speaker::FrontCenter,
    Speaker::LowFrequency,
    Speaker::BackLeft,
    Speaker::BackRight,
    Speaker::FrontLeftOfCenter,
    Speaker::FrontRightOfCenter,
    Speaker::BackCenter,
    Speaker::SideLeft,
    Speaker::SideRight,
    Speaker::TopCenter,
    Speaker::TopFrontLeft,
    Speaker::TopFrontCenter,
    Speaker::TopFrontRight,
    Speaker::TopBackLeft,
    Speaker::TopBackCenter,
    Speaker::TopBackRight,
];

const KEYWORDS: [&str; 18] = [
    "FL", "FR", "FC", "LF", "BL", "BR", "FLC", "FRC", "BC", "SL", "SR", "TC",
    "TFL", "TFC", "TFR", "TBL", "TBC", "TBR",
];

impl Speaker {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn keyword(self) -> &'static str {
        KEYWORDS[self as usize - 1]
    }

    pub fn from_keyword(word: &str) -> Option<Speaker> {
        KEYWORDS
            .iter()
            .position(|k| k.eq_ignore_ascii_case(word))
            .map(|i| ALL[i])
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Parse a comma and/or space separated list such as `"FL FR, LF"`.
/// Unknown keywords and repeated locations are rejected.
pub fn parse_list(text: &str) -> Result<Vec<Speaker>, String> {
    let mut list = Vec::new();
    for word in text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|w| !w.is_empty())
    {
        let spkr = Speaker::from_keyword(word)
            .ok_or_else(|| format!("unknown loudspeaker location {:?}", word))?;
        if list.contains(&spkr) {
            return Err(format!("duplicate loudspeaker location {}", spkr));
        }
        list.push(spkr);
    }
    Ok(list)
}

pub fn format_list(list: &[Speaker]) -> String {
    list.iter()
        .map(|s| s.keyword())
        .collect::<Vec<_>>()
        .join(" ")
}

/// WAVE_FORMAT_EXTENSIBLE channel mask. Only meaningful when the list is in
/// mask order, which `from_mask` guarantees.
pub fn to_mask(list: &[Speaker]) -> u32 {
    list.iter().fold(0, |m, s| m | 1 << (s.code() - 1))
}

pub fn from_mask(mask: u32) -> Vec<Speaker> {
    ALL.iter()
        .filter(|s| mask & (1 << (s.code() - 1)) != 0)
        .copied()
        .collect()
}

/// Locations must be listed in ascending mask order to round-trip through a
/// channel mask.
pub fn is_mask_order(list: &[Speaker]) -> bool {
    list.windows(2).all(|w| w[0].code() < w[1].code())
}

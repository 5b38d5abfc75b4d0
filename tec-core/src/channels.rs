use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of physical inputs on the scanner card.
pub const CHANNEL_COUNT: usize = 10;

/// One of the fixed thermal inputs `ch1..ch10`.
///
/// The scanner returns one reading per physical input in ascending order, so
/// `chN` is found at index `N - 1` of a scan buffer. See [`ChannelId::scan_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(u8);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown channel '{0}' (expected ch1..ch{CHANNEL_COUNT})")]
pub struct ParseChannelError(pub String);

impl ChannelId {
    pub fn new(number: u8) -> Option<Self> {
        if (1..=CHANNEL_COUNT as u8).contains(&number) {
            Some(Self(number))
        } else {
            None
        }
    }

    pub fn all() -> impl Iterator<Item = ChannelId> {
        (1..=CHANNEL_COUNT as u8).map(ChannelId)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Position of this channel inside a full scan buffer.
    pub fn scan_index(self) -> usize {
        usize::from(self.0) - 1
    }

    pub fn default_display_name(self) -> String {
        format!("Temp of {self}")
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

impl FromStr for ChannelId {
    type Err = ParseChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        lower
            .strip_prefix("ch")
            .and_then(|digits| digits.parse::<u8>().ok())
            .and_then(ChannelId::new)
            .ok_or_else(|| ParseChannelError(trimmed.to_string()))
    }
}

impl TryFrom<String> for ChannelId {
    type Error = ParseChannelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChannelId> for String {
    fn from(value: ChannelId) -> Self {
        value.to_string()
    }
}

/// Splits an operator selection such as `"ch1, ch3"` into channel ids,
/// keeping the first occurrence of duplicates.
pub fn parse_selection(text: &str) -> Result<Vec<ChannelId>, ParseChannelError> {
    let mut channels = Vec::new();
    for part in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let channel: ChannelId = part.parse()?;
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }
    Ok(channels)
}

//! Core price-series types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One daily OHLC bar. CSV column order is part of the store contract:
/// `date, open, high, low, close`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// One daily delta bar, derived from an OHLC bar and its chronological
/// predecessor. CSV column order: `date, opend, highd, lowd, closed`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeltaBar {
    pub date: NaiveDate,
    /// open minus previous close
    pub opend: f64,
    /// high minus open
    pub highd: f64,
    /// low minus open
    pub lowd: f64,
    /// close minus open
    pub closed: f64,
}

impl DeltaBar {
    /// Value for one channel of this bar.
    pub fn channel(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Opend => self.opend,
            Channel::Highd => self.highd,
            Channel::Lowd => self.lowd,
            Channel::Closed => self.closed,
        }
    }
}

/// The four predicted quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Opend,
    Highd,
    Lowd,
    Closed,
}

impl Channel {
    /// All channels in the fixed training/serving order.
    pub const ALL: [Channel; 4] = [
        Channel::Opend,
        Channel::Highd,
        Channel::Lowd,
        Channel::Closed,
    ];

    /// Stable name used for artifact keys and CSV columns.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Opend => "opend",
            Channel::Highd => "highd",
            Channel::Lowd => "lowd",
            Channel::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "opend" => Some(Channel::Opend),
            "highd" => Some(Channel::Highd),
            "lowd" => Some(Channel::Lowd),
            "closed" => Some(Channel::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicted deltas for all four channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelDeltas {
    pub opend: f64,
    pub highd: f64,
    pub lowd: f64,
    pub closed: f64,
}

impl ChannelDeltas {
    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Opend => self.opend,
            Channel::Highd => self.highd,
            Channel::Lowd => self.lowd,
            Channel::Closed => self.closed,
        }
    }
}

/// Midnight-UTC epoch milliseconds for a calendar day, the ordinal the
/// original dataset carries alongside the lag features.
pub fn date_ordinal_ms(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names_round_trip() {
        for ch in Channel::ALL {
            assert_eq!(Channel::parse(ch.as_str()), Some(ch));
        }
        assert_eq!(Channel::parse("volume"), None);
    }

    #[test]
    fn test_date_ordinal_is_epoch_millis() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 2).unwrap();
        assert_eq!(date_ordinal_ms(date), 86_400_000);
    }
}

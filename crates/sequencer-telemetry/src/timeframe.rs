/// Query window for historical/analysis lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
}

impl Timeframe {
    /// The lookback window in milliseconds.
    pub fn window_ms(&self) -> i64 {
        match self {
            Timeframe::OneMinute => 60_000,
            Timeframe::FiveMinutes => 5 * 60_000,
            Timeframe::OneHour => 60 * 60_000,
            Timeframe::OneDay => 24 * 60 * 60_000,
            Timeframe::OneWeek => 7 * 24 * 60 * 60_000,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Timeframe::OneMinute),
            "5m" => Some(Timeframe::FiveMinutes),
            "1h" => Some(Timeframe::OneHour),
            "1d" => Some(Timeframe::OneDay),
            "1w" => Some(Timeframe::OneWeek),
            _ => None,
        }
    }
}

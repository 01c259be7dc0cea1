use super::{FetchError, StateSource};
use crate::state::DisplayState;
use chrono::{
    format::{Item, StrftimeItems},
    Local, NaiveDateTime, Timelike,
};
use serde::{Deserialize, Serialize};

/// Named strftime presets for the clock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FormatProfile {
    /// Tuesday / March 05, 2024 / 01:02:03 PM
    #[default]
    TwelveHour,
    /// Tuesday / March 05, 2024 / 13:02:03
    TwentyFourHour,
    /// Tuesday / 2024-03-05 / 13:02:03
    Iso,
}

/// strftime strings for each of the three clock fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockFormats {
    pub day: String,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid clock format string {0:?}")]
pub struct InvalidFormat(pub String);

impl FormatProfile {
    pub fn formats(self) -> ClockFormats {
        let (date, time) = match self {
            FormatProfile::TwelveHour => ("%B %d, %Y", "%I:%M:%S %p"),
            FormatProfile::TwentyFourHour => ("%B %d, %Y", "%H:%M:%S"),
            FormatProfile::Iso => ("%Y-%m-%d", "%H:%M:%S"),
        };
        ClockFormats {
            day: "%A".to_string(),
            date: date.to_string(),
            time: time.to_string(),
        }
    }
}

impl ClockFormats {
    /// Checks every format string up front so formatting can never fail mid-loop.
    pub fn validate(&self) -> Result<(), InvalidFormat> {
        for format in [&self.day, &self.date, &self.time] {
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(InvalidFormat(format.clone()));
            }
        }
        Ok(())
    }

    /// Formats `now` into a display state. Sub-second precision is dropped, so any two instants
    /// within the same second produce the same state.
    pub fn format(&self, now: NaiveDateTime) -> DisplayState {
        let now = now.with_nanosecond(0).unwrap_or(now);
        DisplayState::new(
            now.format(&self.time).to_string(),
            now.format(&self.date).to_string(),
        )
        .with_heading(now.format(&self.day).to_string())
    }
}

/// Reads the local wall clock on every fetch
pub struct ClockSource {
    formats: ClockFormats,
    now: fn() -> NaiveDateTime,
}

impl ClockSource {
    pub fn new(formats: ClockFormats) -> Result<ClockSource, InvalidFormat> {
        Self::with_clock(formats, || Local::now().naive_local())
    }

    /// Same as [`ClockSource::new`] but reading time from `now` instead of the system clock
    pub fn with_clock(
        formats: ClockFormats,
        now: fn() -> NaiveDateTime,
    ) -> Result<ClockSource, InvalidFormat> {
        formats.validate()?;
        Ok(ClockSource { formats, now })
    }
}

impl StateSource for ClockSource {
    fn fetch(&mut self) -> Result<DisplayState, FetchError> {
        Ok(self.formats.format((self.now)()))
    }
}

#[cfg(test)]
mod test {
    use super::{ClockFormats, ClockSource, FormatProfile};
    use crate::source::StateSource;
    use chrono::{NaiveDate, NaiveDateTime};
    use test_case::test_case;

    fn afternoon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_milli_opt(13, 2, 3, 120)
            .unwrap()
    }

    #[test_case(FormatProfile::TwelveHour => ("Tuesday".to_string(), "March 05, 2024".to_string(), "01:02:03 PM".to_string()) ; "twelve hour")]
    #[test_case(FormatProfile::TwentyFourHour => ("Tuesday".to_string(), "March 05, 2024".to_string(), "13:02:03".to_string()) ; "twenty four hour")]
    #[test_case(FormatProfile::Iso => ("Tuesday".to_string(), "2024-03-05".to_string(), "13:02:03".to_string()) ; "iso")]
    fn test_profiles(profile: FormatProfile) -> (String, String, String) {
        let state = profile.formats().format(afternoon());
        (
            state.heading.unwrap(),
            state.secondary_text,
            state.primary_text,
        )
    }

    #[test]
    fn test_same_second_is_identical() {
        let formats = ClockFormats {
            time: "%H:%M:%S%.3f".to_string(),
            ..FormatProfile::TwentyFourHour.formats()
        };
        let early = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_milli_opt(23, 59, 59, 1)
            .unwrap();
        let late = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_milli_opt(23, 59, 59, 999)
            .unwrap();
        assert_eq!(formats.format(early), formats.format(late));
    }

    #[test]
    fn test_invalid_format_rejected() {
        let formats = ClockFormats {
            time: "%H:%Q".to_string(),
            ..FormatProfile::Iso.formats()
        };
        assert!(ClockSource::new(formats).is_err());
    }

    #[test]
    fn test_fetch_uses_injected_clock() {
        let mut source = ClockSource::with_clock(FormatProfile::Iso.formats(), afternoon).unwrap();
        let state = source.fetch().unwrap();
        assert_eq!(state.primary_text, "13:02:03");
        assert_eq!(state.secondary_text, "2024-03-05");
        assert_eq!(state.image_reference, None);
    }
}

//! Wall-clock time requests
//!
//! Schedulers accept wall time as colon-separated fields. Users write
//! anything from plain seconds to `D:H:M:S`; scripts always get the
//! canonical `H:MM:SS` form back. Parsing and formatting are exact
//! inverses for canonical inputs.

use std::fmt;
use std::str::FromStr;

/// A wall-time request, stored as total seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Walltime(i64);

impl Walltime {
    pub const fn from_secs(secs: i64) -> Walltime {
        Walltime(secs)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }
}

/// Accepts `S`, `M:S`, `H:M:S` or `D:H:M:S`. A trailing colon stands for
/// `:00`, so `1:00:` reads as `1:00:00`.
impl FromStr for Walltime {
    type Err = String;

    fn from_str(s: &str) -> Result<Walltime, String> {
        let mut text = s.to_string();
        if text.ends_with(':') {
            text.push_str("00");
        }

        let fields: Vec<&str> = text.split(':').collect();
        if fields.is_empty() || fields.len() > 4 {
            return Err(s.to_string());
        }

        // Fields are least-significant last: seconds, minutes, hours, days.
        let mut seconds: i64 = 0;
        for (i, field) in fields.iter().rev().enumerate() {
            let n: i64 = field.trim().parse().map_err(|_| s.to_string())?;
            if n < 0 {
                return Err(s.to_string());
            }
            seconds += match i {
                0 => n,
                1 => n * 60,
                2 => n * 3600,
                _ => n * 86400,
            };
        }

        Ok(Walltime(seconds))
    }
}

impl fmt::Display for Walltime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let hours = self.0 / 3600;
        let minutes = (self.0 % 3600) / 60;
        let seconds = self.0 % 60;
        write!(f, "{}:{:02}:{:02}", hours, minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_field_counts() {
        assert_eq!("90".parse::<Walltime>().unwrap().as_secs(), 90);
        assert_eq!("2:30".parse::<Walltime>().unwrap().as_secs(), 150);
        assert_eq!("1:00:00".parse::<Walltime>().unwrap().as_secs(), 3600);
        assert_eq!(
            "2:1:00:00".parse::<Walltime>().unwrap().as_secs(),
            2 * 86400 + 3600
        );
    }

    #[test]
    fn trailing_colon_is_shorthand_for_zero_seconds() {
        assert_eq!(
            "1:00:".parse::<Walltime>().unwrap(),
            "1:00:00".parse::<Walltime>().unwrap()
        );
    }

    #[test]
    fn formats_unbounded_hours_with_padded_minutes_and_seconds() {
        assert_eq!(Walltime::from_secs(192 * 3600).to_string(), "192:00:00");
        assert_eq!(Walltime::from_secs(61).to_string(), "0:01:01");
    }

    #[test]
    fn round_trips_canonical_forms() {
        for s in ["24:00:00", "192:00:00", "0:05:30", "1:1:00:00"] {
            let wt: Walltime = s.parse().unwrap();
            let canonical = wt.to_string();
            let again: Walltime = canonical.parse().unwrap();
            assert_eq!(wt, again);
            assert_eq!(canonical, again.to_string());
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<Walltime>().is_err());
        assert!("one:00:00".parse::<Walltime>().is_err());
        assert!("1:2:3:4:5".parse::<Walltime>().is_err());
        assert!("-5".parse::<Walltime>().is_err());
    }
}

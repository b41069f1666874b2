use std::{fmt, str::FromStr, time::Duration};

/// A positive duration written in Go's `time.Duration` format, e.g. `6h`,
/// `1h30m` or `90s`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Interval(Duration);

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum ParseError {
    #[error("invalid unit: {}", EXPECTED_UNITS)]
    InvalidUnit,

    #[error("missing a unit: {}", EXPECTED_UNITS)]
    NoUnit,

    #[error("invalid number: {0}")]
    NotANumber(#[from] std::num::ParseFloatError),

    #[error("interval must be positive")]
    NotPositive,

    #[error("interval is too large")]
    Overflow,
}

const EXPECTED_UNITS: &str = "expected one of 'ms', 's', 'm', or 'h'";

impl Interval {
    pub fn into_inner(self) -> Duration {
        self.0
    }
}

impl From<Interval> for Duration {
    fn from(Interval(d): Interval) -> Self {
        d
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl FromStr for Interval {
    type Err = ParseError;

    fn from_str(mut s: &str) -> Result<Self, Self::Err> {
        fn unit(unit: &str) -> Result<Duration, ParseError> {
            const MINUTE: Duration = Duration::from_secs(60);
            match unit {
                "ms" => Ok(Duration::from_millis(1)),
                "s" => Ok(Duration::from_secs(1)),
                "m" => Ok(MINUTE),
                "h" => Ok(MINUTE * 60),
                _ => Err(ParseError::InvalidUnit),
            }
        }

        if s.starts_with('-') {
            return Err(ParseError::NotPositive);
        }
        s = s.trim_start_matches('+');

        let mut total = Duration::ZERO;
        while !s.is_empty() {
            let Some(unit_start) = s.find(|c: char| c.is_alphabetic()) else {
                return Err(ParseError::NoUnit);
            };
            let (val, rest) = s.split_at(unit_start);
            let val = val.parse::<f64>()?;
            if val.is_sign_negative() || val.is_nan() {
                return Err(ParseError::NotPositive);
            }
            let unit_end = rest
                .find(|c: char| !c.is_alphabetic())
                .unwrap_or(rest.len());
            let (u, rest) = rest.split_at(unit_end);
            let component = Duration::try_from_secs_f64(unit(u)?.as_secs_f64() * val)
                .map_err(|_| ParseError::Overflow)?;
            total = total
                .checked_add(component)
                .ok_or(ParseError::Overflow)?;
            s = rest;
        }

        if total.is_zero() {
            return Err(ParseError::NotPositive);
        }
        Ok(Self(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("6h", Duration::from_secs(6 * 60 * 60))]
    #[case("90s", Duration::from_secs(90))]
    #[case("1h30m", Duration::from_secs(90 * 60))]
    #[case("1.5h", Duration::from_secs(90 * 60))]
    #[case("+250ms", Duration::from_millis(250))]
    fn parses(#[case] input: &str, #[case] expected: Duration) {
        assert_eq!(input.parse::<Interval>(), Ok(Interval(expected)), "{input}");
    }

    #[rstest]
    #[case("", ParseError::NotPositive)]
    #[case("0s", ParseError::NotPositive)]
    #[case("-1h", ParseError::NotPositive)]
    #[case("10", ParseError::NoUnit)]
    #[case("3d", ParseError::InvalidUnit)]
    #[case("1h-5m", ParseError::NotPositive)]
    #[case("99999999999999999999h", ParseError::Overflow)]
    #[case("10000000000000000000s10000000000000000000s", ParseError::Overflow)]
    fn rejects(#[case] input: &str, #[case] expected: ParseError) {
        assert_eq!(input.parse::<Interval>(), Err(expected), "{input}");
    }
}

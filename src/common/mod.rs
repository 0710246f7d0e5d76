//! Common functionality.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use regex::Regex;

pub mod io;

pub use io::{open_read_maybe_gz, open_write_maybe_gz};

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Expand `~` in a path given on the command line.
pub fn expand_path(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}

/// Ask on the terminal whether to go ahead with `action`.
///
/// Only an answer starting with `y` confirms.
pub fn confirm(action: &str) -> Result<bool, anyhow::Error> {
    let term = console::Term::stderr();
    term.write_str(&format!("{}. Type y to continue: ", action))?;
    let answer = term
        .read_line()
        .map_err(|e| anyhow::anyhow!("could not read confirmation: {}", e))?;
    Ok(answer.trim_start().starts_with('y'))
}

/// Split a multi-valued field on `sep`, dropping empty items.
pub fn split_list<'a>(value: &'a str, sep: char) -> impl Iterator<Item = &'a str> + 'a {
    value.split(sep).filter(|item| !item.is_empty())
}

/// Date formats accepted by [`parse_date`], tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%Y%m%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%m-%d-%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Dates before this year only come from misreading a short year.
const MIN_YEAR: i32 = 1000;

/// Trailing time of day, optionally with seconds, AM/PM and time zone.
fn trailing_time() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<date>.+?)(?:[T ]+|,\s*)\d{1,2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:\s*[AaPp][Mm])?(?:\s*(?:Z|[+-]\d{2}:?\d{2}))?$",
        )
        .expect("invalid regex in source code")
    })
}

/// Parse a free-text date.
///
/// A trailing time of day is ignored.  Returns `None` if no known format
/// matches with a four-digit year (two-digit years only in `m/d/yy`).
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let without_time = trailing_time()
        .captures(value)
        .and_then(|caps| caps.name("date"))
        .map(|date| date.as_str().trim());
    [Some(value), without_time]
        .into_iter()
        .flatten()
        .find_map(|candidate| {
            DATE_FORMATS.iter().find_map(|fmt| {
                NaiveDate::parse_from_str(candidate, fmt)
                    .ok()
                    .filter(|date| date.year() >= MIN_YEAR)
            })
        })
}

/// The sentinel written when no date could be determined (`0001-01-01`).
pub fn min_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("2016-03-07", Some((2016, 3, 7)))]
    #[case(" 2016/03/07 ", Some((2016, 3, 7)))]
    #[case("03/07/2016", Some((2016, 3, 7)))]
    #[case("20160307", Some((2016, 3, 7)))]
    #[case("2016-03-07T12:30:00", Some((2016, 3, 7)))]
    #[case("2016-03-07 12:30:00", Some((2016, 3, 7)))]
    #[case("March 7, 2016", Some((2016, 3, 7)))]
    #[case("7 Mar 2016", Some((2016, 3, 7)))]
    #[case("3/7/16", Some((2016, 3, 7)))]
    #[case("07-Mar-2016", Some((2016, 3, 7)))]
    #[case("Mar 7 2016 10:00", Some((2016, 3, 7)))]
    #[case("7 March 2016 10:00", Some((2016, 3, 7)))]
    #[case("March 7, 2016, 10:00 PM", Some((2016, 3, 7)))]
    #[case("2016-03-07T12:30:00Z", Some((2016, 3, 7)))]
    #[case("March 2016", None)]
    #[case("16/3/7", None)]
    #[case("", None)]
    #[case("sometime last year", None)]
    #[case("2016-13-45", None)]
    fn parse_date(#[case] value: &str, #[case] expected: Option<(i32, u32, u32)>) {
        let expected = expected.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap());
        assert_eq!(super::parse_date(value), expected);
    }

    #[test]
    fn min_date_renders_as_year_one() {
        assert_eq!(super::min_date().format("%Y-%m-%d").to_string(), "0001-01-01");
    }

    #[test]
    fn split_list_drops_empty_items() {
        let items = super::split_list("BRCA1;;BRCA2;", ';').collect::<Vec<_>>();
        assert_eq!(items, vec!["BRCA1", "BRCA2"]);
    }
}

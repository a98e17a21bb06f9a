//! Date helper functions
//!
//! Publication dates are rendered with date-fns style patterns
//! (`dd MMM yyyy`) in a fixed locale, always in UTC so that a build produces
//! the same text regardless of the machine it runs on.

use chrono::{DateTime, Utc};

/// Locale used for month names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    PtBr,
    En,
}

impl Locale {
    /// Resolve a language tag such as `pt-BR` or `en-US`; unknown tags fall
    /// back to Brazilian Portuguese
    pub fn from_tag(tag: &str) -> Self {
        let lang = tag.split(['-', '_']).next().unwrap_or("").to_ascii_lowercase();
        match lang.as_str() {
            "en" => Locale::En,
            _ => Locale::PtBr,
        }
    }

    fn chrono(self) -> chrono::Locale {
        match self {
            Locale::PtBr => chrono::Locale::pt_BR,
            Locale::En => chrono::Locale::en_US,
        }
    }
}

/// Formats publication dates with one pattern and locale
#[derive(Debug, Clone)]
pub struct DateFormatter {
    /// Pattern converted to chrono's strftime syntax
    format: String,
    locale: Locale,
}

impl DateFormatter {
    pub fn new(pattern: &str, locale: Locale) -> Self {
        Self {
            format: to_chrono_format(pattern),
            locale,
        }
    }

    /// Format a possibly missing publication date.
    ///
    /// A missing date renders as the empty string; templates leave the date
    /// element out in that case.
    pub fn format(&self, date: Option<&DateTime<Utc>>) -> String {
        match date {
            Some(date) => date
                .format_localized(&self.format, self.locale.chrono())
                .to_string(),
            None => String::new(),
        }
    }
}

impl Default for DateFormatter {
    fn default() -> Self {
        Self::new("dd MMM yyyy", Locale::PtBr)
    }
}

/// Format a date using a date-fns compatible pattern
///
/// # Examples
/// ```ignore
/// format_date(&date, "dd MMM yyyy", Locale::PtBr) // -> "25 mar 2021"
/// ```
pub fn format_date(date: &DateTime<Utc>, pattern: &str, locale: Locale) -> String {
    DateFormatter::new(pattern, locale).format(Some(date))
}

/// Convert a date-fns pattern to a chrono format string
///
/// Supported tokens: `yyyy`, `yy`, `MMMM`, `MMM`, `MM`, `M`, `dd`, `d`,
/// `HH`, `H`, `mm`, `ss`. Any other character is kept as literal text.
fn to_chrono_format(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut format = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }

        let chrono_token = match (c, run) {
            ('y', 2) => Some("%y"),
            ('y', _) => Some("%Y"),
            ('M', 1) => Some("%-m"),
            ('M', 2) => Some("%m"),
            ('M', 3) => Some("%b"),
            ('M', _) => Some("%B"),
            ('d', 1) => Some("%-d"),
            ('d', _) => Some("%d"),
            ('H', 1) => Some("%-H"),
            ('H', _) => Some("%H"),
            ('m', _) => Some("%M"),
            ('s', _) => Some("%S"),
            _ => None,
        };

        match chrono_token {
            Some(token) => format.push_str(token),
            None => {
                for _ in 0..run {
                    match c {
                        '%' => format.push_str("%%"),
                        _ => format.push(c),
                    }
                }
            }
        }
        i += run;
    }

    format
}

/// Parse a provider timestamp.
///
/// Accepts RFC 3339 as well as the `+0000` offset form the content API
/// emits (`2021-03-25T19:25:28+0000`).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z"))
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// Format in ISO 8601 for `<time datetime>` attributes
pub fn date_xml(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn march_25() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 3, 25, 19, 25, 28).unwrap()
    }

    #[test]
    fn test_format_date_pt_br() {
        assert_eq!(
            format_date(&march_25(), "dd MMM yyyy", Locale::PtBr),
            "25 mar 2021"
        );
    }

    #[test]
    fn test_format_date_is_idempotent() {
        let formatter = DateFormatter::default();
        let date = march_25();
        let first = formatter.format(Some(&date));
        for _ in 0..10 {
            assert_eq!(formatter.format(Some(&date)), first);
        }
    }

    #[test]
    fn test_format_date_other_tokens() {
        let date = Utc.with_ymd_and_hms(2021, 2, 5, 7, 3, 9).unwrap();
        assert_eq!(format_date(&date, "d/M/yy", Locale::PtBr), "5/2/21");
        assert_eq!(format_date(&date, "dd MMMM yyyy", Locale::PtBr), "05 fevereiro 2021");
        assert_eq!(format_date(&date, "MMM dd, yyyy", Locale::En), "Feb 05, 2021");
        assert_eq!(format_date(&date, "HH:mm:ss", Locale::En), "07:03:09");
    }

    #[test]
    fn test_to_chrono_format() {
        assert_eq!(to_chrono_format("dd MMM yyyy"), "%d %b %Y");
        assert_eq!(to_chrono_format("d/M/yy HH:mm"), "%-d/%-m/%y %H:%M");
        assert_eq!(to_chrono_format("100% dd"), "100%% %d");
    }

    #[test]
    fn test_missing_date_is_empty() {
        assert_eq!(DateFormatter::default().format(None), "");
    }

    #[test]
    fn test_locale_from_tag() {
        assert_eq!(Locale::from_tag("pt-BR"), Locale::PtBr);
        assert_eq!(Locale::from_tag("en-US"), Locale::En);
        assert_eq!(Locale::from_tag("en"), Locale::En);
        assert_eq!(Locale::from_tag("xx"), Locale::PtBr);
    }

    #[test]
    fn test_parse_timestamp() {
        let expected = march_25();
        assert_eq!(parse_timestamp("2021-03-25T19:25:28+0000"), Some(expected));
        assert_eq!(parse_timestamp("2021-03-25T19:25:28+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2021-03-25T16:25:28-0300"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}

//! Find Queries
//!
//! A find criterion is built from typed fragments and rendered to the single
//! string the host expects for each field. Date, time and timestamp
//! fragments are converted to the host timezone and formatted locally with
//! the configured per-kind format, since the client may run anywhere.

use crate::config::{ConfigError, HostSettings};
use crate::core::error::BridgeResult;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Find operators understood by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FindOperator {
    /// `=` whole word match
    Equals,
    /// `==` exact field content
    ExactMatch,
    /// `!` duplicate values
    Duplicates,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    /// `...` range between two values
    Range,
    /// `*` zero or more characters
    AnyChars,
    /// `@` one character
    OneChar,
    /// `#` one digit
    OneDigit,
    /// `//` today's date
    Today,
    /// `?` invalid date or time
    Invalid,
}

impl FindOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::ExactMatch => "==",
            Self::Duplicates => "!",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
            Self::Range => "...",
            Self::AnyChars => "*",
            Self::OneChar => "@",
            Self::OneDigit => "#",
            Self::Today => "//",
            Self::Invalid => "?",
        }
    }
}

/// Which host format a temporal fragment uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalKind {
    Date,
    Time,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPart {
    Text(String),
    Op(FindOperator),
    Temporal {
        at: DateTime<Utc>,
        kind: TemporalKind,
    },
}

/// Criterion for one field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    parts: Vec<QueryPart>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// `==value`
    pub fn equals(value: impl Into<String>) -> Self {
        Self::new().op(FindOperator::ExactMatch).text(value)
    }

    /// `value*`
    pub fn starts_with(value: impl Into<String>) -> Self {
        Self::new().text(value).op(FindOperator::AnyChars)
    }

    /// `*value*`
    pub fn contains(value: impl Into<String>) -> Self {
        Self::new()
            .op(FindOperator::AnyChars)
            .text(value)
            .op(FindOperator::AnyChars)
    }

    /// `=` on its own matches empty fields
    pub fn empty() -> Self {
        Self::new().op(FindOperator::Equals)
    }

    /// `*` on its own matches any non-empty field
    pub fn not_empty() -> Self {
        Self::new().op(FindOperator::AnyChars)
    }

    /// Dates between `from` and `to`, inclusive
    pub fn date_range<A: TimeZone, B: TimeZone>(from: &DateTime<A>, to: &DateTime<B>) -> Self {
        Self::new().date(from).op(FindOperator::Range).date(to)
    }

    /// Timestamps between `from` and `to`, inclusive
    pub fn timestamp_range<A: TimeZone, B: TimeZone>(from: &DateTime<A>, to: &DateTime<B>) -> Self {
        Self::new()
            .timestamp(from)
            .op(FindOperator::Range)
            .timestamp(to)
    }

    pub fn text(mut self, value: impl Into<String>) -> Self {
        self.parts.push(QueryPart::Text(value.into()));
        self
    }

    pub fn op(mut self, op: FindOperator) -> Self {
        self.parts.push(QueryPart::Op(op));
        self
    }

    pub fn date<T: TimeZone>(self, at: &DateTime<T>) -> Self {
        self.temporal(at, TemporalKind::Date)
    }

    pub fn time<T: TimeZone>(self, at: &DateTime<T>) -> Self {
        self.temporal(at, TemporalKind::Time)
    }

    pub fn timestamp<T: TimeZone>(self, at: &DateTime<T>) -> Self {
        self.temporal(at, TemporalKind::Timestamp)
    }

    fn temporal<T: TimeZone>(mut self, at: &DateTime<T>, kind: TemporalKind) -> Self {
        self.parts.push(QueryPart::Temporal {
            at: at.with_timezone(&Utc),
            kind,
        });
        self
    }

    pub fn parts(&self) -> &[QueryPart] {
        &self.parts
    }

    /// Render to the host's string form
    pub fn render(&self, settings: &HostSettings) -> BridgeResult<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                QueryPart::Text(text) => out.push_str(text),
                QueryPart::Op(op) => out.push_str(op.as_str()),
                QueryPart::Temporal { at, kind } => {
                    let format = match kind {
                        TemporalKind::Date => &settings.date_format,
                        TemporalKind::Time => &settings.time_format,
                        TemporalKind::Timestamp => &settings.timestamp_format,
                    };
                    let local = at.with_timezone(&settings.timezone);
                    write!(out, "{}", local.format(format)).map_err(|_| {
                        ConfigError::ValidationError(format!("Cannot render with format '{}'", format))
                    })?;
                }
            }
        }
        Ok(out)
    }
}

impl From<&str> for Query {
    fn from(value: &str) -> Self {
        Self::new().text(value)
    }
}

impl From<String> for Query {
    fn from(value: String) -> Self {
        Self::new().text(value)
    }
}

/// One find request: field criteria combined with AND, optionally omitting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindRequest {
    fields: Vec<(String, Query)>,
    omit: bool,
}

impl FindRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, query: impl Into<Query>) -> Self {
        self.fields.push((name.into(), query.into()));
        self
    }

    /// Exclude matching records instead of including them
    pub fn omit(mut self) -> Self {
        self.omit = true;
        self
    }

    pub fn is_omit(&self) -> bool {
        self.omit
    }

    pub fn render(&self, settings: &HostSettings) -> BridgeResult<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        for (name, query) in &self.fields {
            out.insert(name.clone(), query.render(settings)?);
        }
        if self.omit {
            out.insert("omit".to_string(), "true".to_string());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostConfig;
    use chrono::FixedOffset;

    fn new_york() -> HostSettings {
        HostSettings::from_config(&HostConfig {
            timezone: "America/New_York".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_text_and_operators() {
        let settings = HostSettings::default();
        assert_eq!(Query::equals("Ada").render(&settings).unwrap(), "==Ada");
        assert_eq!(Query::contains("da").render(&settings).unwrap(), "*da*");
        assert_eq!(Query::starts_with("A").render(&settings).unwrap(), "A*");
        assert_eq!(Query::empty().render(&settings).unwrap(), "=");
        assert_eq!(
            Query::new()
                .op(FindOperator::GreaterOrEqual)
                .text("10")
                .render(&settings)
                .unwrap(),
            ">=10"
        );
    }

    #[test]
    fn test_timestamp_converted_to_host_timezone() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 3, 30, 0).unwrap();
        let rendered = Query::new().timestamp(&at).render(&new_york()).unwrap();
        assert_eq!(rendered, "01/14/2024 22:30:00");
    }

    #[test]
    fn test_date_uses_date_format() {
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();
        let at = offset.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        // 08:00 +09:00 is 23:00 UTC on the previous day
        let rendered = Query::new()
            .op(FindOperator::LessThan)
            .date(&at)
            .render(&HostSettings::default())
            .unwrap();
        assert_eq!(rendered, "<02/29/2024");
    }

    #[test]
    fn test_date_range_and_time() {
        let from = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap();
        let settings = HostSettings::default();
        assert_eq!(
            Query::date_range(&from, &to).render(&settings).unwrap(),
            "06/01/2024...06/30/2024"
        );
        assert_eq!(Query::new().time(&from).render(&settings).unwrap(), "12:00:00");
    }

    #[test]
    fn test_find_request_render_with_omit() {
        let request = FindRequest::new()
            .field("Name", Query::equals("Ada"))
            .field("City", "Paris")
            .omit();
        let rendered = request.render(&HostSettings::default()).unwrap();
        assert_eq!(rendered.get("Name").map(String::as_str), Some("==Ada"));
        assert_eq!(rendered.get("City").map(String::as_str), Some("Paris"));
        assert_eq!(rendered.get("omit").map(String::as_str), Some("true"));
        assert!(request.is_omit());
    }
}

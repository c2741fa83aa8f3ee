use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

pub const DUE_DATE_FORMAT: &str = "%d-%m-%Y";

#[derive(Debug, Error)]
pub enum DueDateError {
    #[error("Invalid due date format: {0}. Expected DD-MM-YYYY")]
    InvalidFormat(String),
    #[error("Due date cannot be in the past: {0}")]
    InPast(String),
}

/// Parses a due date and re-renders it in the canonical DD-MM-YYYY layout,
/// so the stored text does not depend on the input spelling.
pub fn parse(input: &str) -> Result<String, DueDateError> {
    parse_with_today(input, Utc::now().date_naive())
}

pub fn parse_with_today(input: &str, today: NaiveDate) -> Result<String, DueDateError> {
    let date = parse_any(input).ok_or_else(|| DueDateError::InvalidFormat(input.to_string()))?;
    if date < today {
        return Err(DueDateError::InPast(input.to_string()));
    }
    Ok(date.format(DUE_DATE_FORMAT).to_string())
}

/// Canonical rendering without the past-date check, for read-path filters.
pub fn canonicalize(input: &str) -> Option<String> {
    parse_any(input).map(|date| date.format(DUE_DATE_FORMAT).to_string())
}

/// Strict-layout parse used to vet extractor guesses: anything that is not
/// already DD-MM-YYYY and current is discarded rather than repaired.
pub fn parse_strict_with_today(input: &str, today: NaiveDate) -> Option<String> {
    let date = NaiveDate::parse_from_str(input, DUE_DATE_FORMAT).ok()?;
    (date >= today).then(|| date.format(DUE_DATE_FORMAT).to_string())
}

fn parse_any(input: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(input, DUE_DATE_FORMAT) {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(input) {
        return Some(datetime.date_naive());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
    }

    #[test]
    fn canonical_input_is_stored_verbatim() {
        assert_eq!(
            parse_with_today("31-12-2099", today()).unwrap(),
            "31-12-2099"
        );
    }

    #[test]
    fn iso_input_is_re_rendered() {
        assert_eq!(
            parse_with_today("2099-12-31", today()).unwrap(),
            "31-12-2099"
        );
    }

    #[test]
    fn unpadded_day_and_month_are_normalized() {
        assert_eq!(parse_with_today("1-9-2099", today()).unwrap(), "01-09-2099");
    }

    #[test]
    fn invalid_month_is_rejected() {
        assert!(matches!(
            parse_with_today("15-13-2099", today()),
            Err(DueDateError::InvalidFormat(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            parse_with_today("next tuesday", today()),
            Err(DueDateError::InvalidFormat(_))
        ));
    }

    #[test]
    fn past_date_is_rejected() {
        assert!(matches!(
            parse_with_today("01-01-2000", today()),
            Err(DueDateError::InPast(_))
        ));
    }

    #[test]
    fn today_is_not_past() {
        assert_eq!(parse_with_today("07-08-2026", today()).unwrap(), "07-08-2026");
    }

    #[test]
    fn strict_parse_rejects_iso_layout() {
        assert!(parse_strict_with_today("2099-12-31", today()).is_none());
        assert_eq!(
            parse_strict_with_today("31-12-2099", today()).as_deref(),
            Some("31-12-2099")
        );
    }

    #[test]
    fn strict_parse_rejects_past_dates() {
        assert!(parse_strict_with_today("01-01-2000", today()).is_none());
    }
}

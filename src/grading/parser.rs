/// Text the grading portal shows for a score that was never entered.
pub const MISSING_VALUE: &str = "-";

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 20.0;

/// Parse a score cell. Returns `None` for blank cells, the missing-value
/// marker and anything that is not a finite number.
///
/// Accepts `,` as decimal separator. No range check here, see [`in_range`].
pub fn parse_grade(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() || text == MISSING_VALUE {
        return None;
    }
    let normalized = text.replacen(',', ".", 1);
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn in_range(score: f64) -> bool {
    (MIN_SCORE..=MAX_SCORE).contains(&score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dot_and_comma() {
        assert_eq!(parse_grade("12.5"), Some(12.5));
        assert_eq!(parse_grade("12,5"), Some(12.5));
        assert_eq!(parse_grade(" 7 "), Some(7.0));
    }

    #[test]
    fn test_parse_missing() {
        assert_eq!(parse_grade(""), None);
        assert_eq!(parse_grade("   "), None);
        assert_eq!(parse_grade("-"), None);
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_grade("abs"), None);
        assert_eq!(parse_grade("1,2,3"), None);
        assert_eq!(parse_grade("NaN"), None);
        assert_eq!(parse_grade("inf"), None);
    }

    #[test]
    fn test_no_clamping_at_parse_time() {
        assert_eq!(parse_grade("25"), Some(25.0));
        assert_eq!(parse_grade("-3"), Some(-3.0));
        assert!(!in_range(25.0));
        assert!(!in_range(-3.0));
        assert!(in_range(0.0));
        assert!(in_range(20.0));
    }
}

//! Validation helpers for DTOs.

use std::collections::HashSet;

use validator::ValidationError;

use crate::state::game::OPTION_COUNT;

/// Shortest accepted question text, in characters after trimming.
pub const MIN_QUESTION_CHARS: usize = 8;
/// Longest accepted category name, in characters after trimming.
pub const MAX_CATEGORY_CHARS: usize = 40;

/// Lowercase `value` and collapse whitespace runs, for duplicate detection.
///
/// ```ignore
/// assert_eq!(normalized("  Capital  of FRANCE? "), "capital of france?");
/// ```
pub fn normalized(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Validates that a question text carries at least [`MIN_QUESTION_CHARS`] characters.
pub fn validate_question_text(text: &str) -> Result<(), ValidationError> {
    let count = text.trim().chars().count();
    if count < MIN_QUESTION_CHARS {
        return Err(error(
            "question_text_length",
            format!("Question text must have at least {MIN_QUESTION_CHARS} characters (got {count})"),
        ));
    }
    Ok(())
}

/// Validates four non-empty options that differ ignoring case and spacing.
pub fn validate_options(options: &[String]) -> Result<(), ValidationError> {
    if options.len() != OPTION_COUNT {
        return Err(error(
            "option_count",
            format!("Exactly {OPTION_COUNT} options are required (got {})", options.len()),
        ));
    }

    if options.iter().any(|option| option.trim().is_empty()) {
        return Err(error("option_empty", "Options must not be empty".into()));
    }

    let distinct: HashSet<String> = options.iter().map(|option| normalized(option)).collect();
    if distinct.len() != options.len() {
        return Err(error("option_duplicate", "Options must be distinct".into()));
    }

    Ok(())
}

/// Validates the correct option index.
pub fn validate_correct_index(index: i64) -> Result<(), ValidationError> {
    if !(0..OPTION_COUNT as i64).contains(&index) {
        return Err(error(
            "correct_index_range",
            format!("Correct index must be between 0 and {} (got {index})", OPTION_COUNT - 1),
        ));
    }
    Ok(())
}

/// Validates a category label: non-blank, at most [`MAX_CATEGORY_CHARS`] characters.
pub fn validate_category_name(name: &str) -> Result<(), ValidationError> {
    let count = name.trim().chars().count();
    if count == 0 {
        return Err(error("category_empty", "Category must not be empty".into()));
    }
    if count > MAX_CATEGORY_CHARS {
        return Err(error(
            "category_length",
            format!("Category must have at most {MAX_CATEGORY_CHARS} characters (got {count})"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(values: [&str; 4]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_normalized_collapses_case_and_spacing() {
        assert_eq!(normalized("  Capital  of\tFRANCE? "), "capital of france?");
    }

    #[test]
    fn test_validate_question_text() {
        assert!(validate_question_text("Who wrote Hamlet?").is_ok());
        assert!(validate_question_text("  short  ").is_err());
    }

    #[test]
    fn test_validate_options_valid() {
        assert!(validate_options(&options(["Paris", "Rome", "Madrid", "Lisbon"])).is_ok());
    }

    #[test]
    fn test_validate_options_invalid() {
        assert!(validate_options(&options(["Paris", "Rome", "Madrid", " "])).is_err()); // blank
        assert!(validate_options(&options(["Paris", "paris ", "Madrid", "Lisbon"])).is_err()); // duplicate
        assert!(validate_options(&["a".to_string(), "b".to_string()]).is_err()); // count
    }

    #[test]
    fn test_validate_correct_index() {
        assert!(validate_correct_index(0).is_ok());
        assert!(validate_correct_index(3).is_ok());
        assert!(validate_correct_index(4).is_err());
        assert!(validate_correct_index(-1).is_err());
    }

    #[test]
    fn test_validate_category_name() {
        assert!(validate_category_name("History").is_ok());
        assert!(validate_category_name("   ").is_err());
        assert!(validate_category_name(&"x".repeat(41)).is_err());
    }
}

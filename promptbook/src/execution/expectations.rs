//! Text measurement and expectation checking.
//!
//! Lines and pages are "standard" units: a line holds at most
//! [`CHARACTERS_PER_STANDARD_LINE`] characters and a page holds
//! [`LINES_PER_STANDARD_PAGE`] lines.

use crate::errors::{ExpectError, PromptbookError};
use crate::pipeline::{ExpectFormat, ExpectationUnit, Expectations, TemplateJson};
use regex::Regex;
use std::sync::LazyLock;

/// Characters that fit on one standard line.
pub const CHARACTERS_PER_STANDARD_LINE: usize = 63;

/// Standard lines that fit on one page.
pub const LINES_PER_STANDARD_PAGE: usize = 44;

#[allow(clippy::expect_used)]
static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("static regex"));

#[allow(clippy::expect_used)]
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("static regex"));

/// Counts unicode characters.
#[must_use]
pub fn count_characters(text: &str) -> usize {
    text.chars().count()
}

/// Counts runs of alphanumeric characters.
#[must_use]
pub fn count_words(text: &str) -> usize {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .count()
}

/// Counts non-blank sentences.
#[must_use]
pub fn count_sentences(text: &str) -> usize {
    SENTENCE_BREAK
        .split(text)
        .filter(|sentence| !sentence.trim().is_empty())
        .count()
}

/// Counts standard lines, wrapping long lines.
#[must_use]
pub fn count_lines(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    text.split('\n')
        .map(|line| count_characters(line).div_ceil(CHARACTERS_PER_STANDARD_LINE).max(1))
        .sum()
}

/// Counts non-blank paragraphs.
#[must_use]
pub fn count_paragraphs(text: &str) -> usize {
    PARAGRAPH_BREAK
        .split(text)
        .filter(|paragraph| !paragraph.trim().is_empty())
        .count()
}

/// Counts standard pages.
#[must_use]
pub fn count_pages(text: &str) -> usize {
    count_lines(text).div_ceil(LINES_PER_STANDARD_PAGE)
}

/// Measures a text in the given unit.
#[must_use]
pub fn count_unit(unit: ExpectationUnit, text: &str) -> usize {
    match unit {
        ExpectationUnit::Characters => count_characters(text),
        ExpectationUnit::Words => count_words(text),
        ExpectationUnit::Sentences => count_sentences(text),
        ExpectationUnit::Lines => count_lines(text),
        ExpectationUnit::Paragraphs => count_paragraphs(text),
        ExpectationUnit::Pages => count_pages(text),
    }
}

/// Checks a text against amount expectations.
///
/// # Errors
///
/// Returns an [`ExpectError`] naming the first bound that is not met.
pub fn check_expectations(expectations: &Expectations, text: &str) -> Result<(), ExpectError> {
    for (&unit, amounts) in expectations {
        let amount = count_unit(unit, text) as u64;

        if let Some(min) = amounts.min {
            if amount < min {
                return Err(ExpectError::new(format!(
                    "Expected at least {min} {unit} but got {amount}"
                )));
            }
        }

        if let Some(max) = amounts.max {
            if amount > max {
                return Err(ExpectError::new(format!(
                    "Expected at most {max} {unit} but got {amount}"
                )));
            }
        }
    }

    Ok(())
}

/// Returns true if the text meets every expectation.
#[must_use]
pub fn is_passing_expectations(expectations: &Expectations, text: &str) -> bool {
    check_expectations(expectations, text).is_ok()
}

/// Checks a text against a result format.
///
/// # Errors
///
/// Returns an [`ExpectError`] if the text does not parse as the format.
pub fn check_format(format: ExpectFormat, text: &str) -> Result<(), ExpectError> {
    match format {
        ExpectFormat::Json => serde_json::from_str::<serde_json::Value>(text)
            .map(|_| ())
            .map_err(|e| ExpectError::new(format!("Expected valid JSON string: {e}"))),
    }
}

/// Checks a candidate result against all constraints of a template.
///
/// # Errors
///
/// Returns [`PromptbookError::Expect`] for the first unmet constraint.
pub fn check_template_constraints(template: &TemplateJson, text: &str) -> Result<(), PromptbookError> {
    if let Some(format) = template.format {
        check_format(format, text)?;
    }
    if let Some(expectations) = &template.expectations {
        check_expectations(expectations, text)?;
    }
    Ok(())
}

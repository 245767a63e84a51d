//! Usage accounting for units of work.
//!
//! A [`Usage`] is additive: [`Usage::zero`] is the identity, so summing an
//! empty list of usages yields the zero record.

use super::expectations::{
    count_characters, count_lines, count_pages, count_paragraphs, count_sentences, count_words,
};
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// A number that may be an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UncertainNumber {
    /// The value.
    pub value: f64,
    /// Whether the value is an estimate.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_uncertain: bool,
}

impl UncertainNumber {
    /// Zero, known exactly.
    pub const ZERO: Self = Self {
        value: 0.0,
        is_uncertain: false,
    };

    /// A value known exactly.
    #[must_use]
    pub const fn exact(value: f64) -> Self {
        Self {
            value,
            is_uncertain: false,
        }
    }

    /// An estimated value.
    #[must_use]
    pub const fn uncertain(value: f64) -> Self {
        Self {
            value,
            is_uncertain: true,
        }
    }
}

impl Add for UncertainNumber {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.value,
            is_uncertain: self.is_uncertain || rhs.is_uncertain,
        }
    }
}

/// Amounts of text consumed or produced.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounts {
    /// Model tokens.
    pub tokens_count: UncertainNumber,
    /// Characters.
    pub characters_count: UncertainNumber,
    /// Words.
    pub words_count: UncertainNumber,
    /// Sentences.
    pub sentences_count: UncertainNumber,
    /// Standard lines.
    pub lines_count: UncertainNumber,
    /// Paragraphs.
    pub paragraphs_count: UncertainNumber,
    /// Standard pages.
    pub pages_count: UncertainNumber,
}

impl UsageCounts {
    /// All counts zero.
    pub const ZERO: Self = Self {
        tokens_count: UncertainNumber::ZERO,
        characters_count: UncertainNumber::ZERO,
        words_count: UncertainNumber::ZERO,
        sentences_count: UncertainNumber::ZERO,
        lines_count: UncertainNumber::ZERO,
        paragraphs_count: UncertainNumber::ZERO,
        pages_count: UncertainNumber::ZERO,
    };

    /// Measures a text. Token count is left at zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_text(text: &str) -> Self {
        Self {
            tokens_count: UncertainNumber::ZERO,
            characters_count: UncertainNumber::exact(count_characters(text) as f64),
            words_count: UncertainNumber::exact(count_words(text) as f64),
            sentences_count: UncertainNumber::exact(count_sentences(text) as f64),
            lines_count: UncertainNumber::exact(count_lines(text) as f64),
            paragraphs_count: UncertainNumber::exact(count_paragraphs(text) as f64),
            pages_count: UncertainNumber::exact(count_pages(text) as f64),
        }
    }

    /// Sets the token count.
    #[must_use]
    pub fn with_tokens(mut self, tokens: UncertainNumber) -> Self {
        self.tokens_count = tokens;
        self
    }
}

impl Add for UsageCounts {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            tokens_count: self.tokens_count + rhs.tokens_count,
            characters_count: self.characters_count + rhs.characters_count,
            words_count: self.words_count + rhs.words_count,
            sentences_count: self.sentences_count + rhs.sentences_count,
            lines_count: self.lines_count + rhs.lines_count,
            paragraphs_count: self.paragraphs_count + rhs.paragraphs_count,
            pages_count: self.pages_count + rhs.pages_count,
        }
    }
}

/// Cost and volume of one or more units of work.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Price in USD.
    pub price: UncertainNumber,
    /// What was sent.
    pub input: UsageCounts,
    /// What came back.
    pub output: UsageCounts,
}

impl Usage {
    /// The additive identity.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            price: UncertainNumber::ZERO,
            input: UsageCounts::ZERO,
            output: UsageCounts::ZERO,
        }
    }

    /// Measures input and output text at no cost.
    #[must_use]
    pub fn from_texts(input: &str, output: &str) -> Self {
        Self {
            price: UncertainNumber::ZERO,
            input: UsageCounts::from_text(input),
            output: UsageCounts::from_text(output),
        }
    }

    /// Sets the price.
    #[must_use]
    pub fn with_price(mut self, price: UncertainNumber) -> Self {
        self.price = price;
        self
    }

    /// Returns true if this is the zero record.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            price: self.price + rhs.price,
            input: self.input + rhs.input,
            output: self.output + rhs.output,
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for Usage {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Usage> for Usage {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Sums any number of usages.
pub fn add_usage<'a>(usages: impl IntoIterator<Item = &'a Usage>) -> Usage {
    usages.into_iter().sum()
}

//! Composable value validators.
//!
//! `flowright-schema` checks that a config map has the right *shape*
//! (string vs number vs enum); this crate checks that a field's *value*
//! satisfies finer constraints a handler's `validateConfig` wants to
//! enforce -- a URL-shaped string, a number within range, one of a fixed
//! set of strings. Validators compose with [`Validate::and`].

use std::borrow::Cow;

use regex::Regex;

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Human-readable explanation of the failure.
    pub message: String,
}

impl ValidationError {
    /// Construct a new validation error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A validator over a single input type.
pub trait Validate {
    /// The type being validated.
    type Input;

    /// Check `input`, returning `Err` with the first failure found.
    fn validate(&self, input: &Self::Input) -> Result<(), ValidationError>;

    /// A short, human-readable name, used when composing error messages.
    fn name(&self) -> Cow<'static, str>;

    /// Combine with another validator over the same input type: both must pass.
    fn and<R>(self, other: R) -> And<Self, R>
    where
        Self: Sized,
        R: Validate<Input = Self::Input>,
    {
        And {
            left: self,
            right: other,
        }
    }
}

/// Logical AND of two validators (see [`Validate::and`]).
#[derive(Debug, Clone, Copy)]
pub struct And<L, R> {
    left: L,
    right: R,
}

impl<L, R> Validate for And<L, R>
where
    L: Validate,
    R: Validate<Input = L::Input>,
{
    type Input = L::Input;

    fn validate(&self, input: &Self::Input) -> Result<(), ValidationError> {
        self.left.validate(input)?;
        self.right.validate(input)
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("{} && {}", self.left.name(), self.right.name()))
    }
}

/// Value must be non-empty (after trimming whitespace).
#[derive(Debug, Clone, Copy, Default)]
pub struct NotBlank;

impl Validate for NotBlank {
    type Input = str;

    fn validate(&self, input: &str) -> Result<(), ValidationError> {
        if input.trim().is_empty() {
            Err(ValidationError::new("must not be blank"))
        } else {
            Ok(())
        }
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("NotBlank")
    }
}

/// String length must fall within `[min, max]` (inclusive).
#[derive(Debug, Clone, Copy)]
pub struct Length {
    /// Minimum allowed length, in characters.
    pub min: usize,
    /// Maximum allowed length, in characters.
    pub max: usize,
}

impl Validate for Length {
    type Input = str;

    fn validate(&self, input: &str) -> Result<(), ValidationError> {
        let len = input.chars().count();
        if len < self.min || len > self.max {
            Err(ValidationError::new(format!(
                "length {len} not in [{}, {}]",
                self.min, self.max
            )))
        } else {
            Ok(())
        }
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("Length")
    }
}

/// String must match a compiled regular expression.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    label: String,
}

impl Pattern {
    /// Compile a new pattern validator. Returns an error if `pattern` is not
    /// a valid regular expression.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            label: pattern.to_owned(),
        })
    }
}

impl Validate for Pattern {
    type Input = str;

    fn validate(&self, input: &str) -> Result<(), ValidationError> {
        if self.regex.is_match(input) {
            Ok(())
        } else {
            Err(ValidationError::new(format!(
                "does not match /{}/",
                self.label
            )))
        }
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("Pattern(/{}/)", self.label))
    }
}

/// Numeric value must fall within `[min, max]` (inclusive).
#[derive(Debug, Clone, Copy)]
pub struct Range {
    /// Minimum allowed value.
    pub min: f64,
    /// Maximum allowed value.
    pub max: f64,
}

impl Validate for Range {
    type Input = f64;

    fn validate(&self, input: &f64) -> Result<(), ValidationError> {
        if *input < self.min || *input > self.max {
            Err(ValidationError::new(format!(
                "{input} not in [{}, {}]",
                self.min, self.max
            )))
        } else {
            Ok(())
        }
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("Range")
    }
}

/// String must be one of a fixed set of options.
#[derive(Debug, Clone)]
pub struct OneOf {
    /// The allowed values.
    pub options: Vec<String>,
}

impl Validate for OneOf {
    type Input = str;

    fn validate(&self, input: &str) -> Result<(), ValidationError> {
        if self.options.iter().any(|o| o == input) {
            Ok(())
        } else {
            Err(ValidationError::new(format!(
                "{input:?} is not one of {:?}",
                self.options
            )))
        }
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("OneOf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_blank_rejects_whitespace() {
        assert!(NotBlank.validate("  ").is_err());
        assert!(NotBlank.validate("ok").is_ok());
    }

    #[test]
    fn length_bounds() {
        let v = Length { min: 2, max: 4 };
        assert!(v.validate("a").is_err());
        assert!(v.validate("ab").is_ok());
        assert!(v.validate("abcd").is_ok());
        assert!(v.validate("abcde").is_err());
    }

    #[test]
    fn pattern_matches() {
        let v = Pattern::new(r"^\d+$").unwrap();
        assert!(v.validate("123").is_ok());
        assert!(v.validate("12a").is_err());
    }

    #[test]
    fn range_bounds() {
        let v = Range { min: 0.0, max: 10.0 };
        assert!(v.validate(&5.0).is_ok());
        assert!(v.validate(&-1.0).is_err());
        assert!(v.validate(&11.0).is_err());
    }

    #[test]
    fn one_of_membership() {
        let v = OneOf {
            options: vec!["GET".into(), "POST".into()],
        };
        assert!(v.validate("GET").is_ok());
        assert!(v.validate("DELETE").is_err());
    }

    #[test]
    fn and_requires_both() {
        let v = NotBlank.and(Length { min: 3, max: 10 });
        assert!(v.validate("ab").is_err()); // fails length
        assert!(v.validate("   ").is_err()); // fails not-blank (and length, but short-circuits)
        assert!(v.validate("abcd").is_ok());
    }

    #[test]
    fn and_short_circuits_on_left_failure() {
        let v = NotBlank.and(Length { min: 0, max: 1 });
        let err = v.validate("").unwrap_err();
        assert_eq!(err.message, "must not be blank");
    }

    #[test]
    fn composite_name_reflects_both_validators() {
        let v = NotBlank.and(Length { min: 1, max: 5 });
        assert_eq!(v.name(), "NotBlank && Length");
    }
}

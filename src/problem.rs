//! Non-fatal findings collected while resolving layouts.
//!
//! Resolution never stops at the first issue: every problem found in one pass is recorded
//! with the type and element it concerns, so tooling can report all of them at once.

/// How bad a problem is for the layout it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// The layout cannot be used.
    Invalid,
    /// Something was ignored or defaulted; the layout is still usable.
    GoodEnough,
}

/// A single problem with location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub type_name: String,
    pub element_name: Option<String>,
    pub severity: Severity,
    pub message: String,
}

impl Problem {
    pub fn invalid(type_name: &str, element_name: Option<&str>, message: impl Into<String>) -> Self {
        Problem {
            type_name: type_name.to_string(),
            element_name: element_name.map(str::to_string),
            severity: Severity::Invalid,
            message: message.into(),
        }
    }

    pub fn good_enough(type_name: &str, element_name: Option<&str>, message: impl Into<String>) -> Self {
        Problem {
            severity: Severity::GoodEnough,
            ..Problem::invalid(type_name, element_name, message)
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.severity == Severity::Invalid
    }
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Invalid => "invalid",
            Severity::GoodEnough => "good enough",
        };
        match &self.element_name {
            Some(e) => write!(f, "{}.{}: {}: {}", self.type_name, e, severity, self.message),
            None => write!(f, "{}: {}: {}", self.type_name, severity, self.message),
        }
    }
}

/// True when no problem in the list makes the layout unusable.
pub fn all_usable(problems: &[Problem]) -> bool {
    !problems.iter().any(Problem::is_invalid)
}

/// Render a problem list on one line, for error messages.
pub fn join(problems: &[Problem]) -> String {
    problems.iter().map(|p| p.to_string()).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location() {
        let p = Problem::invalid("tStruct", Some("value"), "unknown type 'tFoo'");
        assert_eq!(p.to_string(), "tStruct.value: invalid: unknown type 'tFoo'");
        let p = Problem::good_enough("tStruct", None, "bit_pos ignored");
        assert_eq!(p.to_string(), "tStruct: good enough: bit_pos ignored");
    }

    #[test]
    fn usable_only_without_invalid() {
        let mut problems = vec![Problem::good_enough("t", None, "x")];
        assert!(all_usable(&problems));
        problems.push(Problem::invalid("t", None, "y"));
        assert!(!all_usable(&problems));
        assert_eq!(join(&problems), "t: good enough: x; t: invalid: y");
    }
}

//! Maps raw execution error text onto a small set of recoverable categories.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    ColumnNotFound,
    TableNotFound,
    SyntaxError,
    Timeout,
    Other,
}

impl ErrorCategory {
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorCategory::Other)
    }

    fn message(self) -> &'static str {
        match self {
            ErrorCategory::ColumnNotFound => "The query referenced a column that does not exist.",
            ErrorCategory::TableNotFound => "The query referenced a table or view that does not exist.",
            ErrorCategory::SyntaxError => "The generated query has a syntax error.",
            ErrorCategory::Timeout => "The query took too long to run.",
            ErrorCategory::Other => "The query could not be executed.",
        }
    }

    fn suggestion(self) -> &'static str {
        match self {
            ErrorCategory::ColumnNotFound => {
                "Check the column names against the schema, or ask about a field that exists."
            }
            ErrorCategory::TableNotFound => {
                "Use one of the listed tables or views, such as project_financial_summary."
            }
            ErrorCategory::SyntaxError => "Try rephrasing the question more simply.",
            ErrorCategory::Timeout => "Narrow the question with a date range or a single project.",
            ErrorCategory::Other => "Try rephrasing the question or contact an administrator.",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::ColumnNotFound => "ColumnNotFound",
            ErrorCategory::TableNotFound => "TableNotFound",
            ErrorCategory::SyntaxError => "SyntaxError",
            ErrorCategory::Timeout => "Timeout",
            ErrorCategory::Other => "Other",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassification {
    pub category: ErrorCategory,
    pub message: String,
    pub suggestion: String,
    pub retryable: bool,
}

// Ordered: the first pattern found in the error text decides the category.
const RULES: &[(&str, ErrorCategory)] = &[
    (
        r"\bcolumn\s+\S+(\s+of\s+relation\s+\S+)?\s+(does not exist|not found)",
        ErrorCategory::ColumnNotFound,
    ),
    (r"does not have a column", ErrorCategory::ColumnNotFound),
    (
        r"\b(relation|table|view)(\s+with\s+name)?\s+\S+\s+(does not exist|not found)",
        ErrorCategory::TableNotFound,
    ),
    (r"syntax error|parser error", ErrorCategory::SyntaxError),
    (r"timeout|timed out|canceling statement", ErrorCategory::Timeout),
];

static COMPILED_RULES: LazyLock<Vec<(Regex, ErrorCategory)>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|(pattern, category)| (Regex::new(&format!("(?i){}", pattern)).unwrap(), *category))
        .collect()
});

impl ErrorClassification {
    pub fn of(category: ErrorCategory) -> Self {
        Self {
            category,
            message: category.message().to_string(),
            suggestion: category.suggestion().to_string(),
            retryable: category.is_retryable(),
        }
    }
}

pub fn classify(error_text: &str) -> ErrorClassification {
    let category = COMPILED_RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(error_text))
        .map(|(_, category)| *category)
        .unwrap_or(ErrorCategory::Other);

    ErrorClassification::of(category)
}

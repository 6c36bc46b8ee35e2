use serde::Serialize;

/// Split `text` into tokens: maximal runs of non-whitespace characters.
pub fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
}

/// Whether `actual` and `expected` hold the same tokens in the same order.
///
/// Strictly boolean: a single extra, missing or different token fails.
/// Two inputs without any tokens are equivalent.
pub fn check(actual: &str, expected: &str) -> bool {
    first_difference(actual, expected).is_none()
}

/// The first position at which the token sequences disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    /// Zero-based token index.
    pub index: usize,
    /// `None` when the output ran out of tokens first.
    pub actual: Option<String>,
    /// `None` when the output has tokens beyond the expected answer.
    pub expected: Option<String>,
}

/// Locate the first disagreement between the two token sequences, if any.
pub fn first_difference(actual: &str, expected: &str) -> Option<Mismatch> {
    let mut actual_tokens = tokens(actual);
    let mut expected_tokens = tokens(expected);
    let mut index = 0;

    loop {
        match (actual_tokens.next(), expected_tokens.next()) {
            (None, None) => return None,
            (Some(a), Some(e)) if a == e => index += 1,
            (a, e) => {
                return Some(Mismatch {
                    index,
                    actual: a.map(str::to_string),
                    expected: e.map(str::to_string),
                })
            }
        }
    }
}

/// Outcome of judging a run's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    WrongAnswer(Mismatch),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    /// Two-letter code shown to the user.
    pub fn code(&self) -> &'static str {
        match self {
            Verdict::Accepted => "AC",
            Verdict::WrongAnswer(_) => "WA",
        }
    }
}

pub fn judge(actual: &str, expected: &str) -> Verdict {
    match first_difference(actual, expected) {
        None => Verdict::Accepted,
        Some(mismatch) => Verdict::WrongAnswer(mismatch),
    }
}

//! sparring-check: token-based comparison of program output against an
//! expected answer.
//!
//! Whitespace only separates tokens and is never compared itself, so
//! `"1 2\n3"` and `"1\n2 3"` are equivalent while `"1 2"` and `"1 2 3"` are not.

pub mod tokens;

pub use tokens::{check, first_difference, judge, tokens, Mismatch, Verdict};

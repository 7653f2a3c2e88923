use lazy_static::lazy_static;
use regex::Regex;

/// Character classes recognized by the string primitives.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Token {
    Alphanumeric,
    Digits,
}

use Token::*;

impl Token {
    /// Returns every non-overlapping match of this token in `s`, left to right.
    pub fn all_matches<'s>(&self, s: &'s str) -> Vec<&'s str> {
        self.to_regex().find_iter(s).map(|m| m.as_str()).collect()
    }

    fn to_regex(&self) -> &Regex {
        match self {
            Alphanumeric => {
                lazy_static! {
                    static ref RE: Regex = Regex::new(r"[\p{L}\d]+").unwrap();
                }
                &RE
            }
            Digits => {
                lazy_static! {
                    static ref RE: Regex = Regex::new(r"\d+").unwrap();
                }
                &RE
            }
        }
    }
}

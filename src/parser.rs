//! Slot parser for free-form expense entries.
//!
//! An entry is a whitespace-separated line where the words may come in any
//! order: a category token, an amount (digits), an optional flag token and
//! a description made of everything else. Segmentation walks a cursor over
//! the line and at each position tries, in priority order:
//!
//! 1. category token (the last one in the line wins)
//! 2. amount (first digit run only; later digit runs join the description)
//! 3. flag token
//! 4. description fragment
//!
//! Every slot must be followed by whitespace or the end of the line, and the
//! whole line has to be covered. A description fragment stops wherever a
//! category, the flag or a digit run would start, so "обед" is only a
//! description if it does not contain any of those.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::config::Vocabulary;

static AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+").expect("amount pattern is valid"));

/// Kinds of slot an entry is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Category,
    Amount,
    Flag,
    Description,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Category => write!(f, "category"),
            Slot::Amount => write!(f, "amount"),
            Slot::Flag => write!(f, "flag"),
            Slot::Description => write!(f, "description"),
        }
    }
}

/// Values recovered from one successfully segmented line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slots {
    pub category: Option<String>,
    /// Raw digit run; converted when the record is built.
    pub amount: Option<String>,
    /// Empty when no description words were present.
    pub description: String,
    pub flag: bool,
}

/// Why a line could not be segmented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// Nothing but whitespace.
    Empty,
    /// No slot matches at `offset` (byte offset into the trimmed line).
    Unmatched { offset: usize, rest: String },
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty input"),
            Self::Unmatched { offset, rest } => {
                write!(f, "no slot matches at byte {}: {:?}", offset, rest)
            }
        }
    }
}

impl std::error::Error for ParseFailure {}

/// Outcome of parsing one line. Lives only for the duration of a request.
pub type ParseResult = Result<Slots, ParseFailure>;

/// One matched unit at the cursor.
enum Piece<'t> {
    Category(&'t str),
    Amount(&'t str),
    Flag,
    Description(&'t str),
}

impl Piece<'_> {
    fn len(&self, flag_token: &str) -> usize {
        match self {
            Piece::Category(s) | Piece::Amount(s) | Piece::Description(s) => s.len(),
            Piece::Flag => flag_token.len(),
        }
    }
}

/// Segments entry lines against a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct SlotParser {
    /// Longest first, so "еда вне дома" wins over "еда".
    categories: Vec<String>,
    flag_token: String,
}

impl SlotParser {
    pub fn new(vocabulary: &Vocabulary) -> Self {
        let mut categories = vocabulary.categories.clone();
        categories.sort_by(|a, b| b.len().cmp(&a.len()));
        Self {
            categories,
            flag_token: vocabulary.flag_token.clone(),
        }
    }

    /// Parse a lowercased line. Leading and trailing whitespace is ignored.
    pub fn parse(&self, text: &str) -> ParseResult {
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseFailure::Empty);
        }

        let mut slots = Slots::default();
        let mut pos = 0;
        // Separator that followed the previous piece, and whether that piece
        // was description text. Adjacent fragments keep their separator.
        let mut prev_sep = "";
        let mut prev_was_description = false;

        while pos < text.len() {
            let rest = &text[pos..];
            let piece = self
                .next_piece(rest, slots.amount.is_some())
                .ok_or_else(|| ParseFailure::Unmatched {
                    offset: pos,
                    rest: rest.to_string(),
                })?;

            let len = piece.len(&self.flag_token);
            prev_was_description = match piece {
                Piece::Category(token) => {
                    // A later category word replaces an earlier one.
                    slots.category = Some(token.to_string());
                    false
                }
                Piece::Amount(digits) => {
                    slots.amount = Some(digits.to_string());
                    false
                }
                Piece::Flag => {
                    slots.flag = true;
                    false
                }
                Piece::Description(fragment) => {
                    if !slots.description.is_empty() {
                        slots.description.push_str(if prev_was_description { prev_sep } else { " " });
                    }
                    slots.description.push_str(fragment);
                    true
                }
            };

            let after = &rest[len..];
            let sep_len = after.len() - after.trim_start().len();
            prev_sep = &after[..sep_len];
            pos += len + sep_len;
        }

        Ok(slots)
    }

    fn next_piece<'t>(&self, rest: &'t str, have_amount: bool) -> Option<Piece<'t>> {
        if let Some(token) = self.category_at(rest) {
            return Some(Piece::Category(&rest[..token.len()]));
        }
        if let Some(m) = AMOUNT.find(rest)
            && at_boundary(&rest[m.end()..])
        {
            let digits = &rest[..m.end()];
            return Some(if have_amount {
                Piece::Description(digits)
            } else {
                Piece::Amount(digits)
            });
        }
        if rest.starts_with(self.flag_token.as_str()) && at_boundary(&rest[self.flag_token.len()..]) {
            return Some(Piece::Flag);
        }
        self.description_at(rest).map(Piece::Description)
    }

    /// Category token at the start of `rest`, followed by a separator.
    fn category_at(&self, rest: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|token| rest.starts_with(token.as_str()) && at_boundary(&rest[token.len()..]))
            .map(String::as_str)
    }

    /// A word of description text: non-whitespace characters up to the first
    /// place another slot could start. The word must end at a separator.
    fn description_at<'t>(&self, rest: &'t str) -> Option<&'t str> {
        let mut end = 0;
        for (i, c) in rest.char_indices() {
            if c.is_whitespace() || self.starts_reserved(&rest[i..]) {
                break;
            }
            end = i + c.len_utf8();
        }
        if end == 0 || !at_boundary(&rest[end..]) {
            return None;
        }
        Some(&rest[..end])
    }

    fn starts_reserved(&self, s: &str) -> bool {
        s.starts_with(|c: char| c.is_ascii_digit())
            || s.starts_with(self.flag_token.as_str())
            || self.categories.iter().any(|token| s.starts_with(token.as_str()))
    }
}

fn at_boundary(s: &str) -> bool {
    s.chars().next().is_none_or(char::is_whitespace)
}

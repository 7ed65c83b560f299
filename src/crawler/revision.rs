//! Revision row parser
//!
//! A rendered history row reads, in fixed column order:
//!
//! ```text
//! 12. S V S R Jane Doe 15 Mar 2019 fixed typo
//! ^   ^ ^     ^        ^           ^
//! |   | |     |        |           optional comment
//! |   | |     |        date, D Mon YYYY in the 2000s
//! |   | |     editor name
//! |   | button labels (" V S R " or " V S ")
//! |   change type flag
//! revision number
//! ```
//!
//! Parsing happens in two stages. The tokenizer captures the editor name greedily,
//! which on two-digit days swallows the first digit of the date into the name
//! ("Jane Doe 1" / "5 Mar 2019"). The disambiguation pass then moves a lone trailing
//! digit back onto the date. No other correction is attempted.

use crate::{MirrorError, Result};
use chrono::NaiveDate;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static ROW_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(\d+)\. ",                 // revision number
        r"([A-Z])",                   // change type flag
        r"( V S R | V S )",           // button labels
        r"(.*)",                      // editor name (greedy)
        r"(\d+ [A-Za-z]{3} 2\d{3})", // date
        r"(?s:(.*))$",                // comment
    ))
    .expect("revision row pattern is valid")
});

const DATE_FORMAT: &str = "%d %b %Y";

/// The kind of change a revision made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    New,
    Edit,
    ChangeTags,
    NewFile,
    RemoveFile,
    DeletePage,
    /// A flag letter outside the known set, kept verbatim
    Other(char),
}

impl ChangeType {
    /// Maps a history flag letter to a change type
    pub fn from_token(token: char) -> Self {
        match token {
            'N' => Self::New,
            'S' => Self::Edit,
            'A' => Self::ChangeTags,
            'F' => Self::NewFile,
            'R' => Self::RemoveFile,
            'D' => Self::DeletePage,
            other => Self::Other(other),
        }
    }

    /// The single-letter token stored in metadata
    pub fn token(&self) -> char {
        match self {
            Self::New => 'N',
            Self::Edit => 'S',
            Self::ChangeTags => 'A',
            Self::NewFile => 'F',
            Self::RemoveFile => 'R',
            Self::DeletePage => 'D',
            Self::Other(c) => *c,
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// One entry of a page's edit history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionRecord {
    /// Revision number assigned by the wiki, unique per page
    pub sequence_number: u32,

    /// Opaque identifier of the history row the record was read from
    pub row_id: String,

    pub change_type: ChangeType,

    pub editor_name: String,

    /// Day the revision was made
    pub date: NaiveDate,

    pub comment: Option<String>,
}

impl RevisionRecord {
    /// The date in the wiki's own `D Mon YYYY` rendering
    pub fn date_string(&self) -> String {
        self.date.format("%-d %b %Y").to_string()
    }
}

/// Stage one output: the raw column captures of a row
#[derive(Debug, Clone, PartialEq, Eq)]
struct RowTokens {
    number: String,
    flag: char,
    name: String,
    date: String,
    comment: String,
}

/// Reads only the revision number at the start of a row
///
/// This is enough to decide whether a version is already archived, without paying
/// for the full parse or for fetching the revision's source.
pub fn sequence_number(text: &str) -> Result<u32> {
    let text = text.trim_start();
    let digits: &str = text
        .split_once(". ")
        .map(|(number, _)| number)
        .ok_or_else(|| malformed(text, "missing revision number"))?;

    parse_sequence(text, digits)
}

/// Parses the visible text of one history row into a revision record
///
/// # Arguments
///
/// * `text` - The row's rendered text
/// * `row_id` - The row's remote identifier
///
/// # Returns
///
/// * `Ok(RevisionRecord)` - The parsed record, after disambiguation
/// * `Err(MirrorError::MalformedRow)` - The row does not match the column layout
pub fn parse_row(text: &str, row_id: &str) -> Result<RevisionRecord> {
    let tokens = disambiguate(tokenize(text)?);

    let sequence_number = parse_sequence(text, &tokens.number)?;

    let editor_name = tokens.name.trim().to_string();
    if editor_name.is_empty() {
        return Err(malformed(text, "empty editor name"));
    }

    let date = NaiveDate::parse_from_str(&tokens.date, DATE_FORMAT)
        .map_err(|e| malformed(text, &format!("bad date '{}': {}", tokens.date, e)))?;

    let comment = Some(tokens.comment.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    Ok(RevisionRecord {
        sequence_number,
        row_id: row_id.to_string(),
        change_type: ChangeType::from_token(tokens.flag),
        editor_name,
        date,
        comment,
    })
}

fn tokenize(text: &str) -> Result<RowTokens> {
    let text = text.trim();
    let caps = ROW_PATTERN
        .captures(text)
        .ok_or_else(|| malformed(text, "row does not match history layout"))?;

    let flag = caps[2]
        .chars()
        .next()
        .ok_or_else(|| malformed(text, "missing change type"))?;

    Ok(RowTokens {
        number: caps[1].to_string(),
        flag,
        name: caps[4].to_string(),
        date: caps[5].to_string(),
        comment: caps[6].to_string(),
    })
}

/// Returns the row with a swallowed date digit moved back from the name
fn disambiguate(mut tokens: RowTokens) -> RowTokens {
    if let Some(digit) = swallowed_digit(&tokens.name) {
        // The trailing " d" is two ASCII bytes
        tokens.name.truncate(tokens.name.len() - 2);
        tokens.date.insert(0, digit);
    }
    tokens
}

/// A name ending in a space and exactly one digit has eaten part of the date
fn swallowed_digit(name: &str) -> Option<char> {
    let mut tail = name.chars().rev();
    let last = tail.next()?;
    let before = tail.next()?;
    (before == ' ' && last.is_ascii_digit()).then_some(last)
}

fn parse_sequence(text: &str, digits: &str) -> Result<u32> {
    match digits.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(malformed(text, "revision number is not a positive integer")),
    }
}

fn malformed(row: &str, reason: &str) -> MirrorError {
    MirrorError::MalformedRow {
        row: row.to_string(),
        reason: reason.to_string(),
    }
}

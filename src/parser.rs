// 🔎 Line Parser - OCR lines → (name, damage) records
// Two-state scan: a bracketed name line arms the parser, the next "Damage" line fires it
//
// Transition table (every line is trimmed first):
//
// | state              | line                                  | effect                               |
// |--------------------|---------------------------------------|--------------------------------------|
// | any                | starts with '[' and no "Damage"       | hold line as name → AwaitingDamage   |
// | AwaitingDamage(n)  | contains "Damage"                     | emit (n, value) if numeric → AwaitingName |
// | AwaitingName       | contains "Damage"                     | ignore                               |
// | any                | anything else                         | ignore, state unchanged              |
//
// A name replaced by another name, a name still held at end of input, a
// damage line with no name, and a non-numeric damage value are all dropped
// without error. Each drop is counted in `SkipCounts`.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

const NAME_PREFIX: char = '[';
const DAMAGE_MARKER: &str = "Damage";

/// Largest damage value the ledger column can hold (SQLite INTEGER).
pub const MAX_DAMAGE: u64 = i64::MAX as u64;

// ============================================================================
// CORE TYPES
// ============================================================================

/// One (name, damage) pair read off a screenshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRecord {
    /// Full name line, brackets included
    pub name: String,
    pub damage: u64,
}

impl DamageRecord {
    pub fn new(name: impl Into<String>, damage: u64) -> Self {
        DamageRecord {
            name: name.into(),
            damage,
        }
    }
}

/// Lines the parser threw away, by cause
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    /// Name lines overwritten by a later name or left pending at end of input
    pub unmatched_names: usize,

    /// Damage lines whose value was not a plain number
    pub malformed_damage: usize,

    /// Damage lines with no name waiting for them
    pub orphan_damage: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.unmatched_names + self.malformed_damage + self.orphan_damage
    }

    pub fn absorb(&mut self, other: SkipCounts) {
        self.unmatched_names += other.unmatched_names;
        self.malformed_damage += other.malformed_damage;
        self.orphan_damage += other.orphan_damage;
    }
}

/// Result of parsing one image's lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    pub records: Vec<DamageRecord>,
    pub skipped: SkipCounts,
}

/// What a trimmed line looks like to the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Name(&'a str),
    Damage(&'a str),
    Other,
}

/// Classify an already-trimmed line
pub fn classify(line: &str) -> LineKind<'_> {
    let has_marker = line.contains(DAMAGE_MARKER);

    if line.starts_with(NAME_PREFIX) && !has_marker {
        LineKind::Name(line)
    } else if has_marker {
        LineKind::Damage(line)
    } else {
        LineKind::Other
    }
}

/// Extract the number from a damage line.
///
/// Takes the text after the last `:` (or the whole line when there is no
/// colon), strips thousands separators and surrounding whitespace, and
/// accepts it only if every remaining character is an ASCII digit.
pub fn parse_damage_value(line: &str) -> Option<u64> {
    let tail = line.rsplit(':').next().unwrap_or(line);
    let cleaned: String = tail.chars().filter(|c| *c != ',').collect();
    let digits = cleaned.trim();

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    digits.parse::<u64>().ok().filter(|value| *value <= MAX_DAMAGE)
}

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParserState {
    #[default]
    AwaitingName,
    AwaitingDamage(String),
}

/// Incremental parser; feed lines in engine order, then `finish`
#[derive(Debug, Default)]
pub struct LineParser {
    state: ParserState,
    outcome: ParseOutcome,
}

impl LineParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    pub fn feed(&mut self, raw: &str) {
        let line = raw.trim();

        match classify(line) {
            LineKind::Name(name) => {
                if let ParserState::AwaitingDamage(lost) = &self.state {
                    trace!(lost = %lost, replaced_by = %name, "name line had no damage line");
                    self.outcome.skipped.unmatched_names += 1;
                }
                self.state = ParserState::AwaitingDamage(name.to_string());
            }
            LineKind::Damage(text) => match std::mem::take(&mut self.state) {
                ParserState::AwaitingDamage(name) => match parse_damage_value(text) {
                    Some(damage) => self.outcome.records.push(DamageRecord { name, damage }),
                    None => {
                        trace!(name = %name, line = %text, "dropping malformed damage value");
                        self.outcome.skipped.malformed_damage += 1;
                    }
                },
                ParserState::AwaitingName => {
                    trace!(line = %text, "damage line without a name");
                    self.outcome.skipped.orphan_damage += 1;
                }
            },
            LineKind::Other => {}
        }
    }

    pub fn finish(mut self) -> ParseOutcome {
        if let ParserState::AwaitingDamage(name) = &self.state {
            trace!(name = %name, "input ended before a damage line");
            self.outcome.skipped.unmatched_names += 1;
        }

        if self.outcome.skipped.total() > 0 {
            debug!(
                records = self.outcome.records.len(),
                skipped = self.outcome.skipped.total(),
                "parsed OCR lines with drops"
            );
        }

        self.outcome
    }
}

/// Parse a full line sequence, keeping the skip counts
pub fn parse_lines<I, S>(lines: I) -> ParseOutcome
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parser = LineParser::new();
    for line in lines {
        parser.feed(line.as_ref());
    }
    parser.finish()
}

/// Parse a full line sequence into records only
pub fn parse<I, S>(lines: I) -> Vec<DamageRecord>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parse_lines(lines).records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(name: &str, damage: u64) -> DamageRecord {
        DamageRecord::new(name, damage)
    }

    #[test]
    fn test_parse_two_players() {
        let records = parse(["[Player1]", "Damage: 1,234", "[Player2]", "Damage: 500"]);

        assert_eq!(records, vec![rec("[Player1]", 1234), rec("[Player2]", 500)]);
    }

    #[test]
    fn test_second_name_overwrites_first() {
        let outcome = parse_lines(["[Player1]", "[Player2]", "Damage: 500"]);

        assert_eq!(outcome.records, vec![rec("[Player2]", 500)]);
        assert_eq!(outcome.skipped.unmatched_names, 1);
    }

    #[test]
    fn test_malformed_damage_dropped() {
        let outcome = parse_lines(["[Player1]", "Damage: abc"]);

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.skipped.malformed_damage, 1);
    }

    #[test]
    fn test_malformed_damage_still_consumes_name() {
        // The bad value eats the name; the second damage line has nothing to pair with
        let outcome = parse_lines(["[Player1]", "Damage: 12a", "Damage: 900"]);

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.skipped.malformed_damage, 1);
        assert_eq!(outcome.skipped.orphan_damage, 1);
    }

    #[test]
    fn test_trailing_name_discarded() {
        let outcome = parse_lines(["[Player1]", "Damage: 10", "[Player2]"]);

        assert_eq!(outcome.records, vec![rec("[Player1]", 10)]);
        assert_eq!(outcome.skipped.unmatched_names, 1);
    }

    #[test]
    fn test_orphan_damage_ignored() {
        let outcome = parse_lines(["Damage: 77", "[Player1]", "Damage: 88"]);

        assert_eq!(outcome.records, vec![rec("[Player1]", 88)]);
        assert_eq!(outcome.skipped.orphan_damage, 1);
    }

    #[test]
    fn test_lines_are_trimmed_and_brackets_kept() {
        let records = parse(["   [Guild] Alice  ", "\tDamage:  2,000,000 \n"]);

        assert_eq!(records, vec![rec("[Guild] Alice", 2_000_000)]);
    }

    #[test]
    fn test_unrelated_lines_do_not_reset_pending_name() {
        let records = parse(["[Player1]", "Rank 3", "Bear Hunt", "Damage: 42"]);

        assert_eq!(records, vec![rec("[Player1]", 42)]);
    }

    #[test]
    fn test_bracketed_damage_line_is_a_damage_line() {
        // Starts with '[' but contains "Damage" → not a name
        let records = parse(["[Player1]", "[Damage]: 300"]);

        assert_eq!(records, vec![rec("[Player1]", 300)]);
    }

    #[test]
    fn test_value_after_last_colon() {
        assert_eq!(parse_damage_value("Total Damage: 1:250"), Some(250));
        assert_eq!(parse_damage_value("Damage: 1,234"), Some(1234));
        assert_eq!(parse_damage_value("Damage 1234"), None);
        assert_eq!(parse_damage_value("Damage:"), None);
        assert_eq!(parse_damage_value("Damage: -5"), None);
        assert_eq!(parse_damage_value("Damage: 1 234"), None);
    }

    #[test]
    fn test_value_beyond_column_range_is_malformed() {
        assert_eq!(parse_damage_value("Damage: 9223372036854775807"), Some(MAX_DAMAGE));
        assert_eq!(parse_damage_value("Damage: 9223372036854775808"), None);
    }

    #[test]
    fn test_state_transitions() {
        let mut parser = LineParser::new();
        assert_eq!(parser.state(), &ParserState::AwaitingName);

        parser.feed("[Player1]");
        assert_eq!(parser.state(), &ParserState::AwaitingDamage("[Player1]".to_string()));

        parser.feed("something else");
        assert_eq!(parser.state(), &ParserState::AwaitingDamage("[Player1]".to_string()));

        parser.feed("Damage: x");
        assert_eq!(parser.state(), &ParserState::AwaitingName);
    }

    #[test]
    fn test_one_record_per_valid_pair() {
        let lines = [
            "[A]", "Damage: 1",
            "[B]",
            "[C]", "Damage: 3",
            "noise",
            "[D]", "Damage: ?",
            "[E]", "Damage: 5",
        ];
        let outcome = parse_lines(lines);

        let names: Vec<&str> = outcome.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["[A]", "[C]", "[E]"]);
        assert_eq!(outcome.skipped.total(), 2);
    }

    #[test]
    fn test_concatenation_matches_separate_parses() {
        let first = vec!["[A]", "Damage: 10", "[B]", "Damage: 20"];
        let second = vec!["junk", "[C]", "Damage: 1,000"];

        let mut joined = first.clone();
        joined.extend(second.iter().copied());

        let mut expected = parse(&first);
        expected.extend(parse(&second));

        assert_eq!(parse(&joined), expected);
    }

    #[test]
    fn test_empty_input() {
        let outcome = parse_lines(Vec::<String>::new());

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.skipped, SkipCounts::default());
    }
}

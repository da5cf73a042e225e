//! Statement parser for migration source text.
//!
//! A migration file is split into an Up block and an optional Down block by
//! SQL comment markers:
//!
//! ```sql
//! -- +migrate Up
//! CREATE TABLE users (id INTEGER PRIMARY KEY);
//!
//! -- +migrate StatementBegin
//! CREATE MACRO add(a, b) AS a + b;
//! -- +migrate StatementEnd
//!
//! -- +migrate Down notransaction
//! DROP MACRO add;
//! DROP TABLE users;
//! ```
//!
//! Statements end at a line terminated by `;`, except between
//! `StatementBegin` and `StatementEnd`, where the whole region is one
//! statement. Blocks are transactional unless marked `notransaction`.

use crate::error::{CoreError, CoreResult};
use crate::migration::{Direction, Migration, ParsedMigration};
use crate::migration_id::MigrationId;

const MARKER_PREFIX: &str = "-- +migrate";

/// Parse migration source text into a [`Migration`].
pub fn parse_migration(id: MigrationId, source: &str) -> CoreResult<Migration> {
    let mut parser = MigrationParser::new(&id);
    for (index, line) in source.lines().enumerate() {
        parser.feed(index + 1, line)?;
    }
    let (up, down) = parser.finish(source.lines().count())?;
    Ok(Migration::new(id, up, down))
}

/// A marker line, split into command and options.
enum Marker<'a> {
    Block(Direction, Vec<&'a str>),
    StatementBegin,
    StatementEnd,
}

fn parse_marker(line: &str) -> Option<Result<Marker<'_>, String>> {
    let rest = line.trim().strip_prefix(MARKER_PREFIX)?;
    // `-- +migrateX` is an ordinary comment, not a marker
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let mut words = rest.split_whitespace();
    let marker = match words.next() {
        Some("Up") => Marker::Block(Direction::Up, words.collect()),
        Some("Down") => Marker::Block(Direction::Down, words.collect()),
        Some("StatementBegin") => Marker::StatementBegin,
        Some("StatementEnd") => Marker::StatementEnd,
        Some(other) => return Some(Err(format!("unknown command '{other}'"))),
        None => return Some(Err("marker without a command".to_string())),
    };
    Some(Ok(marker))
}

/// True when the line, ignoring any trailing `--` comment, ends with `;`.
///
/// `--` inside a single-quoted literal does not start a comment.
fn ends_with_semicolon(line: &str) -> bool {
    let mut in_literal = false;
    let mut prev_dash = false;
    for (pos, c) in line.char_indices() {
        match c {
            '\'' => in_literal = !in_literal,
            '-' if prev_dash => return line[..pos - 1].trim_end().ends_with(';'),
            _ => {}
        }
        prev_dash = c == '-' && !in_literal;
    }
    line.trim_end().ends_with(';')
}

fn is_comment_or_blank(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with("--")
}

struct MigrationParser<'a> {
    id: &'a MigrationId,
    current: Option<Direction>,
    up: Option<ParsedMigration>,
    down: Option<ParsedMigration>,
    buffer: String,
    buffer_start: usize,
    in_statement_block: bool,
}

impl<'a> MigrationParser<'a> {
    fn new(id: &'a MigrationId) -> Self {
        Self {
            id,
            current: None,
            up: None,
            down: None,
            buffer: String::new(),
            buffer_start: 0,
            in_statement_block: false,
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> CoreError {
        CoreError::ParseError {
            id: self.id.clone(),
            direction: self.current.unwrap_or(Direction::Up),
            line,
            message: message.into(),
        }
    }

    fn block_mut(&mut self, direction: Direction) -> &mut Option<ParsedMigration> {
        match direction {
            Direction::Up => &mut self.up,
            Direction::Down => &mut self.down,
        }
    }

    fn push_line(&mut self, line_no: usize, line: &str) {
        if self.buffer.is_empty() {
            self.buffer_start = line_no;
        }
        self.buffer.push_str(line);
        self.buffer.push('\n');
    }

    fn push_statement(&mut self) {
        let statement = self.buffer.trim().to_string();
        self.buffer.clear();
        if statement.is_empty() {
            return;
        }
        if let Some(direction) = self.current {
            if let Some(block) = self.block_mut(direction) {
                block.statements.push(statement);
            }
        }
    }

    /// Reject a statement left open when its block ends.
    fn ensure_no_pending(&self) -> CoreResult<()> {
        if self.buffer.lines().all(is_comment_or_blank) {
            return Ok(());
        }
        Err(self.error(
            self.buffer_start,
            "statement is not terminated by ';' or a '-- +migrate StatementEnd' marker",
        ))
    }

    fn feed(&mut self, line_no: usize, line: &str) -> CoreResult<()> {
        match parse_marker(line) {
            Some(Err(message)) => Err(self.error(line_no, message)),
            Some(Ok(marker)) => self.apply_marker(line_no, marker),
            None => self.feed_sql(line_no, line),
        }
    }

    fn apply_marker(&mut self, line_no: usize, marker: Marker<'_>) -> CoreResult<()> {
        match marker {
            Marker::Block(direction, options) => {
                if self.in_statement_block {
                    return Err(self.error(
                        line_no,
                        format!("'{direction}' marker inside a StatementBegin/StatementEnd pair"),
                    ));
                }
                self.ensure_no_pending()?;
                self.buffer.clear();
                if self.block_mut(direction).is_some() {
                    self.current = Some(direction);
                    return Err(self.error(line_no, format!("duplicate '{direction}' marker")));
                }
                let mut use_transaction = true;
                for option in options {
                    if option.eq_ignore_ascii_case("notransaction") {
                        use_transaction = false;
                    } else {
                        self.current = Some(direction);
                        return Err(self.error(line_no, format!("unknown option '{option}'")));
                    }
                }
                *self.block_mut(direction) = Some(ParsedMigration {
                    statements: Vec::new(),
                    use_transaction,
                });
                self.current = Some(direction);
                Ok(())
            }
            Marker::StatementBegin => {
                if self.current.is_none() {
                    return Err(self.error(
                        line_no,
                        "StatementBegin outside of an Up or Down block",
                    ));
                }
                if self.in_statement_block {
                    return Err(self.error(line_no, "nested StatementBegin"));
                }
                self.ensure_no_pending()?;
                self.buffer.clear();
                self.in_statement_block = true;
                Ok(())
            }
            Marker::StatementEnd => {
                if !self.in_statement_block {
                    return Err(self.error(
                        line_no,
                        "StatementEnd without a matching StatementBegin",
                    ));
                }
                if self.buffer.trim().is_empty() {
                    return Err(self.error(line_no, "empty StatementBegin/StatementEnd pair"));
                }
                self.in_statement_block = false;
                self.push_statement();
                Ok(())
            }
        }
    }

    fn feed_sql(&mut self, line_no: usize, line: &str) -> CoreResult<()> {
        if self.in_statement_block {
            self.push_line(line_no, line);
            return Ok(());
        }
        if is_comment_or_blank(line) {
            // Comments only belong to a statement once it has started
            if !self.buffer.is_empty() {
                self.push_line(line_no, line);
            }
            return Ok(());
        }
        if self.current.is_none() {
            return Err(self.error(
                line_no,
                "SQL found before the first '-- +migrate Up' or '-- +migrate Down' marker",
            ));
        }
        self.push_line(line_no, line);
        if ends_with_semicolon(line) {
            self.push_statement();
        }
        Ok(())
    }

    fn finish(self, last_line: usize) -> CoreResult<(ParsedMigration, Option<ParsedMigration>)> {
        if self.in_statement_block {
            return Err(self.error(last_line, "StatementBegin is never closed by StatementEnd"));
        }
        self.ensure_no_pending()?;
        match self.up {
            Some(up) => Ok((up, self.down)),
            None => Err(CoreError::ParseError {
                id: self.id.clone(),
                direction: Direction::Up,
                line: last_line,
                message: "missing '-- +migrate Up' marker".to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[path = "parser_test.rs"]
mod tests;

/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! hdbsql output parsing functions

use crate::domain::ruleengine::Row;
use lazy_static::lazy_static;
use regex::Regex;
use std::iter::Peekable;
use std::str::Chars;

lazy_static! {
    static ref HDBSQL_ERROR_RE: Regex = Regex::new(r"^\*\s*(-?\d+):\s*(.+)$").unwrap();
}

/// Marker hdbsql prints for SQL NULL
const NULL_MARKER: &str = "?";

enum Terminator {
    Field,
    Record,
    End,
}

/// Parse result rows from `hdbsql -j -a -x` output
///
/// Fields are comma separated. Strings are double-quoted with `""` as the
/// escape for a quote and may span lines. An unquoted `?` is NULL.
///
/// # Arguments
/// * `output` - Raw stdout from hdbsql
///
/// # Returns
/// * `Ok(Vec<Row>)` - One entry per result row
/// * `Err(String)` - Parse error description
pub fn parse_hdbsql_output(output: &str) -> Result<Vec<Row>, String> {
    let mut chars = output.chars().peekable();
    let mut line = 1usize;
    let mut rows = Vec::new();
    let mut row: Row = Vec::new();

    loop {
        if row.is_empty() {
            // Blank lines between records
            while let Some(&c) = chars.peek() {
                if c != '\n' && c != '\r' {
                    break;
                }
                if c == '\n' {
                    line += 1;
                }
                chars.next();
            }
            if chars.peek().is_none() {
                break;
            }
        }

        let (value, terminator) = next_field(&mut chars, &mut line)?;
        row.push(value);
        match terminator {
            Terminator::Field => {}
            Terminator::Record => rows.push(std::mem::take(&mut row)),
            Terminator::End => {
                rows.push(std::mem::take(&mut row));
                break;
            }
        }
    }

    Ok(rows)
}

fn next_field(
    chars: &mut Peekable<Chars<'_>>,
    line: &mut usize,
) -> Result<(Option<String>, Terminator), String> {
    if chars.peek() == Some(&'"') {
        let start = *line;
        chars.next();
        let mut value = String::new();
        loop {
            match chars.next() {
                Some('"') if chars.peek() == Some(&'"') => {
                    chars.next();
                    value.push('"');
                }
                Some('"') => break,
                Some(c) => {
                    if c == '\n' {
                        *line += 1;
                    }
                    value.push(c);
                }
                None => return Err(format!("Unterminated quoted field starting on line {start}")),
            }
        }
        if chars.peek() == Some(&'\r') {
            chars.next();
        }
        let terminator = match chars.next() {
            Some(',') => Terminator::Field,
            Some('\n') => {
                *line += 1;
                Terminator::Record
            }
            None => Terminator::End,
            Some(c) => {
                return Err(format!(
                    "Unexpected character '{c}' after quoted field on line {line}"
                ))
            }
        };
        return Ok((Some(value), terminator));
    }

    let mut raw = String::new();
    let terminator = loop {
        match chars.next() {
            Some(',') => break Terminator::Field,
            Some('\n') => {
                *line += 1;
                break Terminator::Record;
            }
            Some(c) => raw.push(c),
            None => break Terminator::End,
        }
    };
    let raw = raw.trim_end_matches('\r');
    let value = (raw != NULL_MARKER).then(|| raw.to_string());
    Ok((value, terminator))
}

/// Extract the SQL error from hdbsql stderr
///
/// hdbsql reports failures as `* <code>: <message>`.
///
/// # Returns
/// * `Some((code, message))` - First error line found
/// * `None` - No error line present
pub fn parse_hdbsql_error(stderr: &str) -> Option<(i32, String)> {
    stderr.lines().find_map(|line| {
        HDBSQL_ERROR_RE.captures(line.trim()).and_then(|captures| {
            let code = captures[1].parse::<i32>().ok()?;
            Some((code, captures[2].trim().to_string()))
        })
    })
}

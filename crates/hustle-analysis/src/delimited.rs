//! Minimal reader for delimited text with a header row.
//!
//! Blank lines and lines starting with `#` are skipped; the `#` lines are
//! kept as metadata so callers can recover generator parameters.

use std::io::{self, BufRead};

/// Errors raised while reading the delimited structure itself.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum DelimitedError {
    #[display("failed to read line {line}")]
    Io { line: usize, source: io::Error },
    #[display("input has no header row")]
    MissingHeader,
    #[display("required column '{name}' not found in header")]
    MissingColumn { name: String },
    #[display("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },
}

/// A data row with its 1-based line number.
#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub line: usize,
    fields: Vec<String>,
}

impl Row {
    /// Trimmed field at `index`; empty fields are treated as missing.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields
            .get(index)
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DelimitedTable {
    pub comments: Vec<String>,
    header: Vec<String>,
    pub rows: Vec<Row>,
}

impl DelimitedTable {
    pub fn read<R>(reader: R, delimiter: char) -> Result<Self, DelimitedError>
    where
        R: BufRead,
    {
        let mut comments = vec![];
        let mut header = None;
        let mut rows = vec![];

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|source| DelimitedError::Io {
                line: line_no,
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            if let Some(comment) = line.trim_start().strip_prefix('#') {
                comments.push(comment.trim().to_owned());
                continue;
            }

            // split the untrimmed line: with a whitespace delimiter, trimming
            // would swallow empty leading or trailing fields
            let fields = line
                .trim_end_matches('\r')
                .split(delimiter)
                .map(str::to_owned)
                .collect::<Vec<_>>();
            let Some(expected) = header.as_ref().map(Vec::len) else {
                header = Some(fields.iter().map(|f| f.trim().to_owned()).collect());
                continue;
            };
            if fields.len() != expected {
                return Err(DelimitedError::FieldCount {
                    line: line_no,
                    expected,
                    found: fields.len(),
                });
            }
            rows.push(Row {
                line: line_no,
                fields,
            });
        }

        Ok(Self {
            comments,
            header: header.ok_or(DelimitedError::MissingHeader)?,
            rows,
        })
    }

    pub fn column(&self, name: &str) -> Result<usize, DelimitedError> {
        self.header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| DelimitedError::MissingColumn {
                name: name.to_owned(),
            })
    }

    /// Value of a `# key: value` metadata comment.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.comments.iter().find_map(|c| {
            let (k, v) = c.split_once(':')?;
            (k.trim() == key).then_some(v.trim())
        })
    }
}

/// Parses a non-negative integer, accepting integral floats such as `12.0`.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub(crate) fn parse_count(value: &str) -> Option<usize> {
    if let Ok(n) = value.parse::<usize>() {
        return Some(n);
    }
    let f = value.parse::<f64>().ok()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64).then_some(f as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = "\
# kind: lgen
# step: 4

alen, lb
1,3
# trailing note
5,4
";

    #[test]
    fn test_reads_header_rows_and_comments() {
        let table = DelimitedTable::read(INPUT.as_bytes(), ',').unwrap();
        assert_eq!(table.column("alen").unwrap(), 0);
        assert_eq!(table.column("lb").unwrap(), 1);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].line, 5);
        assert_eq!(table.rows[1].field(1), Some("4"));
        assert_eq!(table.metadata("step"), Some("4"));
        assert_eq!(table.metadata("kind"), Some("lgen"));
        assert_eq!(table.comments.len(), 3);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            DelimitedTable::read("# only comments\n".as_bytes(), ','),
            Err(DelimitedError::MissingHeader)
        ));
        assert!(matches!(
            DelimitedTable::read("a,b\n1,2,3\n".as_bytes(), ','),
            Err(DelimitedError::FieldCount {
                line: 2,
                expected: 2,
                found: 3
            })
        ));
        let table = DelimitedTable::read("a,b\n".as_bytes(), ',').unwrap();
        assert!(matches!(
            table.column("c"),
            Err(DelimitedError::MissingColumn { name }) if name == "c"
        ));
    }

    #[test]
    fn test_empty_field_is_missing() {
        let table = DelimitedTable::read("a,b\n1, \n".as_bytes(), ',').unwrap();
        assert_eq!(table.rows[0].field(0), Some("1"));
        assert_eq!(table.rows[0].field(1), None);
    }

    #[test]
    fn test_tab_delimited_keeps_empty_edge_fields() {
        let table = DelimitedTable::read("a\tb\tc\n\t2\t\n".as_bytes(), '\t').unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].field(0), None);
        assert_eq!(table.rows[0].field(1), Some("2"));
        assert_eq!(table.rows[0].field(2), None);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("12"), Some(12));
        assert_eq!(parse_count("12.0"), Some(12));
        assert_eq!(parse_count("12.5"), None);
        assert_eq!(parse_count("-1"), None);
        assert_eq!(parse_count("nan"), None);
    }
}

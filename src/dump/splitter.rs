// ABOUTME: Splits SQL dump text into individual executable statements
// ABOUTME: Tracks quoted literals so semicolons inside strings never end a statement

/// Lazy, single-pass iterator over the statements of a SQL dump.
///
/// The dump is scanned line by line. Lines whose trimmed text starts with `--`
/// are dropped entirely, and a statement is closed when a line (after trimming)
/// ends with `;` while no quoted literal is open.
///
/// A `--` line inside a multi-line literal is dropped as well. Existing dumps
/// rely on this, so it is kept.
///
/// # Examples
///
/// ```
/// # use postgres_mirror::dump::StatementSplitter;
/// let dump = "-- header\nCREATE TABLE t (a text);\nINSERT INTO t VALUES ('a;b');\n";
/// let statements: Vec<String> = StatementSplitter::new(dump).collect();
/// assert_eq!(
///     statements,
///     vec!["CREATE TABLE t (a text);", "INSERT INTO t VALUES ('a;b');"]
/// );
/// ```
pub struct StatementSplitter<'a> {
    lines: std::str::Lines<'a>,
    current: String,
    open_quote: Option<char>,
    exhausted: bool,
}

impl<'a> StatementSplitter<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            current: String::new(),
            open_quote: None,
            exhausted: false,
        }
    }

    fn scan_line(&mut self, line: &str) {
        for ch in line.chars() {
            if ch == '\'' || ch == '"' {
                match self.open_quote {
                    None => self.open_quote = Some(ch),
                    Some(open) if open == ch => self.open_quote = None,
                    Some(_) => {}
                }
            }
            self.current.push(ch);
        }
        self.current.push('\n');
    }

    fn take_current(&mut self) -> Option<String> {
        let statement = self.current.trim().to_string();
        self.current.clear();
        if statement.is_empty() || statement.starts_with("--") {
            None
        } else {
            Some(statement)
        }
    }
}

impl Iterator for StatementSplitter<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.exhausted {
            return None;
        }

        while let Some(line) = self.lines.next() {
            let trimmed = line.trim();
            if trimmed.starts_with("--") {
                continue;
            }

            self.scan_line(line);

            if trimmed.ends_with(';') && self.open_quote.is_none() {
                if let Some(statement) = self.take_current() {
                    return Some(statement);
                }
            }
        }

        // Unterminated tail after the last `;`
        self.exhausted = true;
        self.take_current()
    }
}

/// Split a whole dump into statements
pub fn split_statements(text: &str) -> Vec<String> {
    StatementSplitter::new(text).collect()
}

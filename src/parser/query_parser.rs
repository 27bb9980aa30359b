use crate::parser::{Phase, QueryComparers, WordComparer};

/// Character cursor over one SQL statement.
///
/// Tracks the clause being read (`phase`) and the parenthesis nesting depth so
/// keywords and separators are only honoured at the top level. Quoted literals
/// and comments are stepped over as a whole by [`QueryParser::advance`].
#[derive(Debug, Default)]
pub struct QueryParser {
    pub position: usize,
    pub length: usize,
    pub text_v: Vec<char>,
    pub phase: Phase,
    pub parentheses_depth: usize,

    pub comparers: QueryComparers,
}

impl QueryParser {
    pub fn new(query: &str) -> Self {
        let text_v: Vec<char> = query.chars().collect();
        Self {
            position: 0,
            length: text_v.len(),
            text_v,
            comparers: QueryComparers::new(),
            ..Default::default()
        }
    }

    pub fn eof(&self) -> bool {
        self.position >= self.length
    }

    pub fn current(&self) -> char {
        self.peek(0)
    }

    pub fn peek(&self, ahead: usize) -> char {
        self.text_v.get(self.position + ahead).copied().unwrap_or('\0')
    }

    pub fn next(&mut self) {
        if self.position < self.length {
            self.position += 1;
        }
    }

    pub fn next_non_whitespace(&mut self) {
        while !self.eof() && self.current().is_whitespace() {
            self.next();
        }
    }

    pub fn jump(&mut self, ahead: usize) {
        self.position = (self.position + ahead).min(self.length);
    }

    pub fn is_top_level(&self) -> bool {
        self.parentheses_depth == 0
    }

    pub fn text_from_range(&self, start: usize, end: usize) -> String {
        let end = end.min(self.length);
        let start = start.min(end);
        self.text_v[start..end].iter().collect()
    }

    pub fn text_from_pivot(&self, pivot: usize) -> String {
        self.text_from_range(pivot, self.position)
    }

    pub fn rest(&self) -> String {
        self.text_from_range(self.position, self.length)
    }

    /// The identifier-like word that ends right before the cursor.
    pub fn previous_word(&self) -> String {
        let mut end = self.position;
        while end > 0 && self.text_v[end - 1].is_whitespace() {
            end -= 1;
        }
        let mut start = end;
        while start > 0 && WordComparer::is_identifier_char(self.text_v[start - 1]) {
            start -= 1;
        }
        self.text_from_range(start, end)
    }

    pub fn is_quote(ch: char) -> bool {
        ch == '\'' || ch == '"' || ch == '`'
    }

    /// Steps over a quoted literal or identifier. Doubled quotes are escapes.
    /// Returns `false` when the text ends before the closing quote.
    pub fn skip_quoted(&mut self) -> bool {
        let quote = self.current();
        self.next();
        while !self.eof() {
            if self.current() == quote {
                if self.peek(1) == quote {
                    self.jump(2);
                    continue;
                }
                self.next();
                return true;
            }
            self.next();
        }
        false
    }

    pub fn skip_line_comment(&mut self) {
        while !self.eof() && self.current() != '\n' {
            self.next();
        }
    }

    pub fn is_block_comment_start(&self) -> bool {
        self.current() == '/' && self.peek(1) == '*'
    }

    /// Steps over `/* … */`. Returns `false` when the comment is never closed.
    pub fn skip_block_comment(&mut self) -> bool {
        self.jump(2);
        while !self.eof() {
            if self.current() == '*' && self.peek(1) == '/' {
                self.jump(2);
                return true;
            }
            self.next();
        }
        false
    }

    /// Moves one token-ish step forward, keeping `parentheses_depth` current.
    pub fn advance(&mut self) {
        match self.current() {
            ch if Self::is_quote(ch) => {
                self.skip_quoted();
            }
            '(' => {
                self.parentheses_depth += 1;
                self.next();
            }
            ')' => {
                self.parentheses_depth = self.parentheses_depth.saturating_sub(1);
                self.next();
            }
            '-' if self.peek(1) == '-' => self.skip_line_comment(),
            '/' if self.peek(1) == '*' => {
                self.skip_block_comment();
            }
            _ => self.next(),
        }
    }

    /// Index of the `)` closing the `(` at `open`, ignoring quoted text and comments.
    pub fn find_closing(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut position = open;
        let mut quote: Option<char> = None;
        while position < self.length {
            let ch = self.text_v[position];
            let next = self.text_v.get(position + 1).copied();
            if quote.is_none() && ch == '-' && next == Some('-') {
                while position < self.length && self.text_v[position] != '\n' {
                    position += 1;
                }
                continue;
            }
            if quote.is_none() && ch == '/' && next == Some('*') {
                position += 2;
                while position < self.length && !(self.text_v[position] == '*' && self.text_v.get(position + 1) == Some(&'/')) {
                    position += 1;
                }
                position += 2;
                continue;
            }
            match quote {
                Some(q) if ch == q => {
                    if self.text_v.get(position + 1) == Some(&q) {
                        position += 1;
                    } else {
                        quote = None;
                    }
                }
                Some(_) => {}
                None if Self::is_quote(ch) => quote = Some(ch),
                None if ch == '(' => depth += 1,
                None if ch == ')' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(position);
                    }
                }
                None => {}
            }
            position += 1;
        }
        None
    }

    /// Skips whitespace and, when a clause keyword valid after the current
    /// phase sits at the cursor, switches to that phase without consuming it.
    pub fn check_next_phase(&mut self) -> bool {
        self.next_non_whitespace();
        while self.current() == ';' {
            self.next();
            self.next_non_whitespace();
        }

        if self.eof() {
            self.phase = Phase::EOF;
            return true;
        }

        if !self.is_top_level() {
            return false;
        }

        match self.comparers.clause_at(self) {
            Some(phase) if self.phase.accepts(phase) => {
                self.phase = phase;
                true
            }
            _ => false,
        }
    }
}

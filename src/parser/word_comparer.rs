use crate::parser::QueryParser;

/// Case-insensitive keyword matcher anchored at the parser cursor.
///
/// Multi-word keywords (`GROUP BY`, `LEFT OUTER JOIN`) accept any run of
/// whitespace between their words. A match never starts in the middle of an
/// identifier.
#[derive(Debug, Default)]
pub struct WordComparer {
    pub length: usize,
    pub words: Vec<Vec<char>>,
    whitespace_postfix: bool,
    full_block_delimiter_postfix: bool,
    eof: bool,
    delimiter: Option<char>,
}

impl WordComparer {
    pub fn new(word: &str) -> Self {
        Self {
            length: word.chars().count(),
            words: word
                .split_whitespace()
                .map(|w| w.to_uppercase().chars().collect())
                .collect(),
            whitespace_postfix: false,
            full_block_delimiter_postfix: false,
            eof: false,
            delimiter: None,
        }
    }

    pub fn is_identifier_char(ch: char) -> bool {
        ch.is_alphanumeric() || ch == '_' || ch == '$'
    }

    pub fn is_block_delimiter(ch: char) -> bool {
        ch.is_whitespace()
    }

    pub fn is_any_delimiter(ch: char) -> bool {
        ch == ',' || ch == '(' || ch == ')' || ch == ';' || Self::is_block_delimiter(ch)
    }

    /// Number of characters the keyword spans at the cursor, if it matches there.
    pub fn matches(&self, parser: &QueryParser) -> Option<usize> {
        let start = parser.position;
        if start > 0 && Self::is_identifier_char(parser.text_v[start - 1]) {
            return None;
        }

        let mut position = start;
        for (index, word) in self.words.iter().enumerate() {
            if index > 0 {
                let gap = position;
                while position < parser.length && parser.text_v[position].is_whitespace() {
                    position += 1;
                }
                if position == gap {
                    return None;
                }
            }
            for expected in word {
                if position >= parser.length
                    || *expected != parser.text_v[position].to_ascii_uppercase() {
                    return None;
                }
                position += 1;
            }
        }

        if position >= parser.length {
            return if self.eof { Some(position - start) } else { None };
        }

        if self.delimiter.is_none() && !self.full_block_delimiter_postfix && !self.whitespace_postfix {
            return Some(position - start);
        }

        let next = parser.text_v[position];

        if self.delimiter == Some(next)
            || (self.full_block_delimiter_postfix && Self::is_any_delimiter(next))
            || (self.whitespace_postfix && Self::is_block_delimiter(next)) {
            return Some(position - start);
        }

        None
    }

    pub fn compare(&self, parser: &QueryParser) -> bool {
        self.matches(parser).is_some()
    }

    pub fn with_eof(mut self) -> Self { self.eof = true; self }
    pub fn with_whitespace_postfix(mut self) -> Self { self.whitespace_postfix = true; self }
    pub fn with_any_delimiter_postfix(mut self) -> Self { self.full_block_delimiter_postfix = true; self }
    pub fn with_delimiter(mut self, delimiter: char) -> Self { self.delimiter = Some(delimiter); self }
}

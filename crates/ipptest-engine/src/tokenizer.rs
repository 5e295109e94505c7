// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test-script tokenizer.
//
// Scripts are sequences of bare words, quoted strings and the structural
// characters `{`, `}` and `,`. A `#` outside quotes comments out the rest
// of the line. A backslash escapes the next character both inside and
// outside quotes.

use ipptest_core::error::{IppTestError, Result};

/// One lexical unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// 1-based line the token started on.
    pub line: usize,
    /// Whether any part of the token was quoted. A quoted `}` is data.
    pub quoted: bool,
}

impl Token {
    /// Whether this is the unquoted structural character `c`.
    pub fn is(&self, c: char) -> bool {
        !self.quoted && self.text.len() == 1 && self.text.starts_with(c)
    }
}

/// Pull tokenizer over an in-memory script with one-token push back.
#[derive(Debug)]
pub struct Tokenizer {
    filename: String,
    chars: Vec<char>,
    pos: usize,
    line: usize,
    pushed: Vec<Token>,
}

impl Tokenizer {
    pub fn new(filename: impl Into<String>, source: &str) -> Self {
        Self {
            filename: filename.into(),
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            pushed: Vec::new(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Current line number.
    pub fn line(&self) -> usize {
        self.pushed.last().map_or(self.line, |t| t.line)
    }

    /// A script error at the current line.
    pub fn error(&self, message: impl Into<String>) -> IppTestError {
        IppTestError::script(message, &self.filename, self.line())
    }

    /// Return a token so that the next call to `next_token` yields it again.
    pub fn push_back(&mut self, token: Token) {
        self.pushed.push(token);
    }

    pub fn peek(&mut self) -> Result<Option<&Token>> {
        if self.pushed.is_empty() {
            match self.read()? {
                Some(token) => self.pushed.push(token),
                None => return Ok(None),
            }
        }
        Ok(self.pushed.last())
    }

    /// Next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        if let Some(token) = self.pushed.pop() {
            return Ok(Some(token));
        }
        self.read()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_blanks_and_comments(&mut self) {
        while let Some(&c) = self.chars.get(self.pos) {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read(&mut self) -> Result<Option<Token>> {
        self.skip_blanks_and_comments();
        let Some(&first) = self.chars.get(self.pos) else {
            return Ok(None);
        };

        let line = self.line;
        if matches!(first, '{' | '}' | ',') {
            self.pos += 1;
            return Ok(Some(Token {
                text: first.to_string(),
                line,
                quoted: false,
            }));
        }

        let mut text = String::new();
        let mut quote: Option<char> = None;
        let mut quoted = false;

        while let Some(&c) = self.chars.get(self.pos) {
            match quote {
                Some(q) if c == q => {
                    self.bump();
                    return Ok(Some(Token { text, line, quoted }));
                }
                None if c.is_whitespace() => {
                    self.bump();
                    return Ok(Some(Token { text, line, quoted }));
                }
                None if matches!(c, '{' | '}' | ',' | '#') => {
                    return Ok(Some(Token { text, line, quoted }));
                }
                None if matches!(c, '"' | '\'') => {
                    self.bump();
                    quote = Some(c);
                    quoted = true;
                }
                _ if c == '\\' => {
                    self.bump();
                    match self.bump() {
                        Some(escaped) => text.push(escaped),
                        None => return Err(self.error("Unexpected end of file")),
                    }
                }
                _ => {
                    self.bump();
                    text.push(c);
                }
            }
        }

        if quote.is_some() {
            return Err(IppTestError::script(
                "Unterminated quoted string",
                &self.filename,
                line,
            ));
        }
        Ok(Some(Token { text, line, quoted }))
    }
}

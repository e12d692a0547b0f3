//! Reader for the [scfg](https://git.sr.ht/~emersion/scfg) configuration
//! format.
//!
//! A file is a list of directives, one per line. Each directive has a name,
//! zero or more parameters and an optional `{ ... }` block of child
//! directives. Words may be bare, double quoted (with backslash escapes) or
//! single quoted (taken literally). Lines starting with `#` are comments.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub params: Vec<String>,
    pub children: Vec<Directive>,
    /// Zero-based line the directive's name starts on.
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Expected(char),
    Unexpected(char),
    UnexpectedEnd,
}

/// Where and why reading stopped. Lines and columns start at zero, columns
/// count bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}: ", self.line, self.column)?;
        match self.kind {
            ErrorKind::Expected(c) => write!(f, "expected {c:?}"),
            ErrorKind::Unexpected(c) => write!(f, "unexpected {c:?}"),
            ErrorKind::UnexpectedEnd => write!(f, "unexpected end of input"),
        }
    }
}

impl std::error::Error for Error {}

pub fn parse(text: &str) -> Result<Vec<Directive>, Error> {
    let mut cursor = Cursor::new(text);
    cursor.directives(false)
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r')
}

fn is_bare(c: char) -> bool {
    !c.is_ascii_control() && !matches!(c, ' ' | '"' | '\'' | '\\' | '{' | '}')
}

fn in_double_quotes(c: char) -> bool {
    (c == '\t' || !c.is_ascii_control()) && !matches!(c, '"' | '\\')
}

fn in_single_quotes(c: char) -> bool {
    (c == '\t' || !c.is_ascii_control()) && c != '\''
}

struct Cursor<'a> {
    rest: &'a str,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Cursor<'a> {
        Cursor {
            rest: text,
            line: 0,
            column: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.rest = &self.rest[c.len_utf8()..];
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += c.len_utf8();
        }
        Some(c)
    }

    fn error(&self, kind: ErrorKind) -> Error {
        Error {
            kind,
            line: self.line,
            column: self.column,
        }
    }

    fn unexpected(&self) -> Error {
        match self.peek() {
            Some(c) => self.error(ErrorKind::Unexpected(c)),
            None => self.error(ErrorKind::UnexpectedEnd),
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), Error> {
        if self.peek() != Some(expected) {
            return Err(self.error(ErrorKind::Expected(expected)));
        }
        self.bump();
        Ok(())
    }

    fn skip_blanks(&mut self) {
        while self.peek().is_some_and(is_blank) {
            self.bump();
        }
    }

    /// Skips blank lines and comment lines.
    fn skip_lines(&mut self) {
        loop {
            self.skip_blanks();
            match self.peek() {
                Some('\n') => {
                    self.bump();
                }
                Some('#') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                _ => return,
            }
        }
    }

    /// Reads directives until the end of input, or until the `}` closing the
    /// enclosing block, which is left unconsumed.
    fn directives(&mut self, nested: bool) -> Result<Vec<Directive>, Error> {
        let mut directives = Vec::new();
        loop {
            self.skip_lines();
            match self.peek() {
                None if nested => return Err(self.error(ErrorKind::Expected('}'))),
                None => return Ok(directives),
                Some('}') if nested => return Ok(directives),
                Some('}') => return Err(self.unexpected()),
                Some(_) => directives.push(self.directive()?),
            }
        }
    }

    fn directive(&mut self) -> Result<Directive, Error> {
        let line = self.line;
        let name = self.word()?;
        self.skip_blanks();

        let mut params = Vec::new();
        while self.peek().is_some_and(|c| !matches!(c, '\n' | '{' | '}')) {
            params.push(self.word()?);
            self.skip_blanks();
        }

        let mut children = Vec::new();
        if self.peek() == Some('{') {
            self.bump();
            children = self.directives(true)?;
            self.expect('}')?;
            self.skip_blanks();
        }

        match self.peek() {
            None | Some('\n') | Some('}') => Ok(Directive {
                name,
                params,
                children,
                line,
            }),
            Some(_) => Err(self.unexpected()),
        }
    }

    fn word(&mut self) -> Result<String, Error> {
        match self.peek() {
            Some('"') => {
                self.bump();
                let word = self.chars_while(in_double_quotes, true);
                self.expect('"')?;
                Ok(word)
            }
            Some('\'') => {
                self.bump();
                let word = self.chars_while(in_single_quotes, false);
                self.expect('\'')?;
                Ok(word)
            }
            Some(c) if is_bare(c) || c == '\\' => Ok(self.chars_while(is_bare, true)),
            _ => Err(self.unexpected()),
        }
    }

    /// Collects characters accepted by `accept`. With `escapes`, a backslash
    /// makes the following printable character literal.
    fn chars_while(&mut self, accept: fn(char) -> bool, escapes: bool) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if escapes && c == '\\' {
                self.bump();
                match self.peek() {
                    Some(escaped) if !escaped.is_ascii_control() => {
                        self.bump();
                        word.push(escaped);
                    }
                    _ => break,
                }
            } else if accept(c) {
                self.bump();
                word.push(c);
            } else {
                break;
            }
        }
        word
    }
}

//! Tokenizer for the strategy language.
//!
//! Indentation is significant: the lexer tracks an indent stack and emits
//! `Indent` / `Dedent` around nested blocks. Newlines inside brackets are
//! ignored, as are blank and comment-only lines.

use super::StrategyFault;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Keyword {
    Def,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Not,
    And,
    Or,
    Is,
    Return,
    Break,
    Continue,
    Pass,
    True,
    False,
    None,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Keyword> {
        Some(match word {
            "def" => Keyword::Def,
            "if" => Keyword::If,
            "elif" => Keyword::Elif,
            "else" => Keyword::Else,
            "while" => Keyword::While,
            "for" => Keyword::For,
            "in" => Keyword::In,
            "not" => Keyword::Not,
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "is" => Keyword::Is,
            "return" => Keyword::Return,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            "pass" => Keyword::Pass,
            "True" => Keyword::True,
            "False" => Keyword::False,
            "None" => Keyword::None,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Punct {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Debug, PartialEq)]
pub(super) enum Token {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Keyword(Keyword),
    Punct(Punct),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub(super) struct Spanned {
    pub token: Token,
    pub line: usize,
}

fn syntax(line: usize, message: impl Into<String>) -> StrategyFault {
    StrategyFault::Syntax {
        line,
        message: message.into(),
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    depth: usize,
    indents: Vec<usize>,
    at_line_start: bool,
    tokens: Vec<Spanned>,
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, token: Token) {
        self.tokens.push(Spanned {
            token,
            line: self.line,
        });
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    /// Measure indentation at the start of a logical line and emit
    /// `Indent`/`Dedent`. Returns false when the line is blank.
    fn indentation(&mut self) -> Result<bool, StrategyFault> {
        let mut column = 0usize;
        while let Some(c) = self.peek() {
            match c {
                ' ' => column += 1,
                '\t' => column = (column / 8 + 1) * 8,
                '\x0c' => column = 0,
                _ => break,
            }
            self.pos += 1;
        }

        match self.peek() {
            None => return Ok(false),
            Some('#') => {
                self.skip_comment();
                return Ok(false);
            }
            Some('\r') | Some('\n') => {
                if self.peek() == Some('\r') {
                    self.pos += 1;
                }
                if self.peek() == Some('\n') {
                    self.pos += 1;
                }
                self.line += 1;
                return Ok(false);
            }
            _ => {}
        }

        let current = *self.indents.last().unwrap_or(&0);
        if column > current {
            self.indents.push(column);
            self.push(Token::Indent);
        } else if column < current {
            while column < *self.indents.last().unwrap_or(&0) {
                self.indents.pop();
                self.push(Token::Dedent);
            }
            if column != *self.indents.last().unwrap_or(&0) {
                return Err(syntax(self.line, "unindent does not match any outer indentation level"));
            }
        }
        Ok(true)
    }

    fn number(&mut self) -> Result<(), StrategyFault> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        if is_float {
            let value = text
                .parse::<f64>()
                .map_err(|_| syntax(self.line, format!("invalid number `{}`", text)))?;
            self.push(Token::Float(value));
        } else {
            let value = text
                .parse::<i64>()
                .map_err(|_| syntax(self.line, format!("integer `{}` out of range", text)))?;
            self.push(Token::Int(value));
        }
        Ok(())
    }

    fn word(&mut self) {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match Keyword::from_word(&word) {
            Some(kw) => self.push(Token::Keyword(kw)),
            None => self.push(Token::Name(word)),
        }
    }

    fn string(&mut self, quote: char) -> Result<(), StrategyFault> {
        let start_line = self.line;
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut value = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(syntax(start_line, "unterminated string literal"));
            };
            if c == quote {
                if !triple {
                    self.pos += 1;
                    break;
                }
                if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    self.pos += 3;
                    break;
                }
            }
            if c == '\n' {
                if !triple {
                    return Err(syntax(start_line, "unterminated string literal"));
                }
                self.line += 1;
            }
            if c == '\\' {
                let escaped = self
                    .peek_at(1)
                    .ok_or_else(|| syntax(self.line, "unterminated string literal"))?;
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    '\\' => value.push('\\'),
                    '\'' => value.push('\''),
                    '"' => value.push('"'),
                    '\n' => self.line += 1,
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
                self.pos += 2;
                continue;
            }
            value.push(c);
            self.pos += 1;
        }
        self.push(Token::Str(value));
        Ok(())
    }

    fn punct(&mut self, c: char) -> Result<(), StrategyFault> {
        let next = self.peek_at(1);
        let (punct, width) = match (c, next) {
            ('(', _) => (Punct::LParen, 1),
            (')', _) => (Punct::RParen, 1),
            ('[', _) => (Punct::LBracket, 1),
            (']', _) => (Punct::RBracket, 1),
            (',', _) => (Punct::Comma, 1),
            (':', _) => (Punct::Colon, 1),
            ('.', _) => (Punct::Dot, 1),
            ('+', Some('=')) => (Punct::PlusAssign, 2),
            ('+', _) => (Punct::Plus, 1),
            ('-', Some('=')) => (Punct::MinusAssign, 2),
            ('-', _) => (Punct::Minus, 1),
            ('*', Some('=')) => (Punct::StarAssign, 2),
            ('*', _) => (Punct::Star, 1),
            ('/', Some('/')) => (Punct::DoubleSlash, 2),
            ('/', _) => (Punct::Slash, 1),
            ('%', _) => (Punct::Percent, 1),
            ('=', Some('=')) => (Punct::Eq, 2),
            ('=', _) => (Punct::Assign, 1),
            ('!', Some('=')) => (Punct::NotEq, 2),
            ('<', Some('=')) => (Punct::Le, 2),
            ('<', _) => (Punct::Lt, 1),
            ('>', Some('=')) => (Punct::Ge, 2),
            ('>', _) => (Punct::Gt, 1),
            _ => return Err(syntax(self.line, format!("unexpected character `{}`", c))),
        };
        match punct {
            Punct::LParen | Punct::LBracket => self.depth += 1,
            Punct::RParen | Punct::RBracket => {
                self.depth = self
                    .depth
                    .checked_sub(1)
                    .ok_or_else(|| syntax(self.line, format!("unmatched `{}`", c)))?;
            }
            _ => {}
        }
        self.pos += width;
        self.push(Token::Punct(punct));
        Ok(())
    }

    fn run(mut self) -> Result<Vec<Spanned>, StrategyFault> {
        loop {
            if self.at_line_start && self.depth == 0 {
                if !self.indentation()? {
                    if self.peek().is_none() {
                        break;
                    }
                    continue;
                }
                self.at_line_start = false;
            }

            let Some(c) = self.peek() else { break };
            match c {
                ' ' | '\t' | '\r' | '\x0c' => self.pos += 1,
                '\n' => {
                    self.pos += 1;
                    if self.depth == 0 {
                        self.push(Token::Newline);
                        self.at_line_start = true;
                    }
                    self.line += 1;
                }
                '#' => self.skip_comment(),
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.pos += 2;
                    self.line += 1;
                }
                '0'..='9' => self.number()?,
                '\'' | '"' => self.string(c)?,
                c if c.is_alphabetic() || c == '_' => self.word(),
                c => self.punct(c)?,
            }
        }

        if self.depth > 0 {
            return Err(syntax(self.line, "unexpected end of input inside brackets"));
        }
        if !matches!(
            self.tokens.last().map(|t| &t.token),
            None | Some(Token::Newline)
        ) {
            self.push(Token::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Token::Dedent);
        }
        self.push(Token::Eof);
        Ok(self.tokens)
    }
}

pub(super) fn tokenize(source: &str) -> Result<Vec<Spanned>, StrategyFault> {
    Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        depth: 0,
        indents: vec![0],
        at_line_start: true,
        tokens: Vec::new(),
    }
    .run()
}

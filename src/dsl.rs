// Copyright 2026 Quire Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

use crate::error::ParseErrorKind;
use crate::error::SearchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
}

impl Operator {
    pub fn symbol(self) -> char {
        match self {
            Operator::And => '&',
            Operator::Or => '|',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Leaf { field: String, value: String },
    Group { op: Operator, children: Vec<Query> },
}

impl Query {
    pub fn leaf(field: &str, value: &str) -> Self {
        Query::Leaf {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Leaf { field, value } => write!(f, "{field}:'{}'", escape_value(value)),
            Query::Group { op, children } => {
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", op.symbol())?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryTerm {
    pub field: String,
    pub value: String,
}

impl fmt::Display for QueryTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:'{}'", self.field, escape_value(&self.value))
    }
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == '\\' || ch == '\'' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(String),
    Value(String),
    Colon,
    Open,
    Close,
    Op(Operator),
}

pub fn parse_query(input: &str) -> Result<Query, SearchError> {
    let tokens = lex(input)?;
    if tokens.is_empty() {
        return Err(SearchError::parse(ParseErrorKind::EmptyInput, 0));
    }
    let mut p = Parser::new(tokens, input.len());
    let query = p.parse_node()?;
    if let Some((pos, _)) = p.peek() {
        return Err(SearchError::parse(ParseErrorKind::TrailingInput, pos));
    }
    Ok(query)
}

pub fn parse_terms(input: &str) -> Result<Vec<QueryTerm>, SearchError> {
    let tokens = lex(input)?;
    let mut p = Parser::new(tokens, input.len());
    let mut terms = Vec::new();
    while p.peek().is_some() {
        let (field, value) = p.parse_term()?;
        terms.push(QueryTerm { field, value });
    }
    Ok(terms)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn new(tokens: Vec<(usize, Token)>, end: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
        }
    }

    fn parse_node(&mut self) -> Result<Query, SearchError> {
        match self.peek() {
            Some((_, Token::Open)) => {
                self.next();
                self.parse_group()
            }
            Some((_, Token::Field(_))) => {
                let (field, value) = self.parse_term()?;
                Ok(Query::Leaf { field, value })
            }
            Some((pos, _)) => Err(SearchError::parse(ParseErrorKind::ExpectedTerm, pos)),
            None => Err(SearchError::parse(ParseErrorKind::ExpectedTerm, self.end)),
        }
    }

    fn parse_term(&mut self) -> Result<(String, String), SearchError> {
        let field = match self.next() {
            Some((_, Token::Field(name))) => name,
            Some((pos, _)) => return Err(SearchError::parse(ParseErrorKind::ExpectedTerm, pos)),
            None => return Err(SearchError::parse(ParseErrorKind::ExpectedTerm, self.end)),
        };
        match self.next() {
            Some((_, Token::Colon)) => {}
            Some((pos, _)) => return Err(SearchError::parse(ParseErrorKind::ExpectedColon, pos)),
            None => return Err(SearchError::parse(ParseErrorKind::ExpectedColon, self.end)),
        }
        match self.next() {
            Some((_, Token::Value(value))) => Ok((field, value)),
            Some((pos, Token::Field(_))) => {
                Err(SearchError::parse(ParseErrorKind::UnquotedValue, pos))
            }
            Some((pos, _)) => Err(SearchError::parse(ParseErrorKind::ExpectedValue, pos)),
            None => Err(SearchError::parse(ParseErrorKind::ExpectedValue, self.end)),
        }
    }

    fn parse_group(&mut self) -> Result<Query, SearchError> {
        let mut children = vec![self.parse_node()?];
        let op = match self.next() {
            Some((_, Token::Op(op))) => op,
            Some((pos, _)) => {
                return Err(SearchError::parse(ParseErrorKind::ExpectedOperator, pos));
            }
            None => {
                return Err(SearchError::parse(
                    ParseErrorKind::UnterminatedGroup,
                    self.end,
                ));
            }
        };
        children.push(self.parse_node()?);
        loop {
            match self.next() {
                Some((_, Token::Close)) => return Ok(Query::Group { op, children }),
                Some((pos, Token::Op(next))) => {
                    if next != op {
                        return Err(SearchError::parse(ParseErrorKind::MixedOperators, pos));
                    }
                    children.push(self.parse_node()?);
                }
                Some((pos, _)) => {
                    return Err(SearchError::parse(ParseErrorKind::ExpectedOperator, pos));
                }
                None => {
                    return Err(SearchError::parse(
                        ParseErrorKind::UnterminatedGroup,
                        self.end,
                    ));
                }
            }
        }
    }

    fn peek(&self) -> Option<(usize, Token)> {
        self.tokens.get(self.pos).cloned()
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }
}

fn lex(input: &str) -> Result<Vec<(usize, Token)>, SearchError> {
    let mut chars = input.char_indices().peekable();
    let mut tokens = Vec::new();
    while let Some((pos, ch)) = chars.peek().copied() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        if ch == '(' {
            chars.next();
            tokens.push((pos, Token::Open));
            continue;
        }
        if ch == ')' {
            chars.next();
            tokens.push((pos, Token::Close));
            continue;
        }
        if ch == '&' {
            chars.next();
            tokens.push((pos, Token::Op(Operator::And)));
            continue;
        }
        if ch == '|' {
            chars.next();
            tokens.push((pos, Token::Op(Operator::Or)));
            continue;
        }
        if ch == ':' {
            chars.next();
            tokens.push((pos, Token::Colon));
            continue;
        }
        if ch == '\'' {
            chars.next();
            let mut buf = String::new();
            loop {
                match chars.next() {
                    Some((_, '\'')) => break,
                    Some((esc_pos, '\\')) => match chars.next() {
                        Some((_, c)) if c == '\\' || c == '\'' => buf.push(c),
                        Some(_) => {
                            return Err(SearchError::parse(ParseErrorKind::BadEscape, esc_pos));
                        }
                        None => {
                            return Err(SearchError::parse(
                                ParseErrorKind::UnterminatedValue,
                                pos,
                            ));
                        }
                    },
                    Some((_, c)) => buf.push(c),
                    None => {
                        return Err(SearchError::parse(ParseErrorKind::UnterminatedValue, pos));
                    }
                }
            }
            tokens.push((pos, Token::Value(buf)));
            continue;
        }
        if ch.is_ascii_alphabetic() || ch == '_' {
            let mut buf = String::new();
            while let Some((_, c)) = chars.peek().copied() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    buf.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push((pos, Token::Field(buf)));
            continue;
        }
        return Err(SearchError::parse(ParseErrorKind::UnexpectedChar, pos));
    }
    Ok(tokens)
}

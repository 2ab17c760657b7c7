use crate::{
    query::{CompareOp, Predicate, QueryError},
    value::Value,
};
use std::{iter::Peekable, str::CharIndices};

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(Value),
    Op(CompareOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("'{name}'"),
            Self::Str(s) => format!("string {s:?}"),
            Self::Num(v) => format!("number {v:?}"),
            Self::Op(op) => format!("'{}'", op.symbol()),
            Self::And => "'&&'".to_string(),
            Self::Or => "'||'".to_string(),
            Self::Not => "'!'".to_string(),
            Self::LParen => "'('".to_string(),
            Self::RParen => "')'".to_string(),
        }
    }
}

///
/// Lexer
///

struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    fn tokens(mut self) -> Result<Vec<(usize, Token)>, QueryError> {
        let mut out = Vec::new();
        while let Some(&(pos, ch)) = self.chars.peek() {
            if ch.is_whitespace() {
                self.chars.next();
                continue;
            }
            out.push((pos, self.token(pos, ch)?));
        }

        Ok(out)
    }

    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|&(_, c)| c == expected).is_some()
    }

    fn token(&mut self, pos: usize, ch: char) -> Result<Token, QueryError> {
        self.chars.next();
        let token = match ch {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '&' if self.eat('&') => Token::And,
            '|' if self.eat('|') => Token::Or,
            '=' if self.eat('=') => Token::Op(CompareOp::Eq),
            '!' if self.eat('=') => Token::Op(CompareOp::Ne),
            '!' => Token::Not,
            '<' if self.eat('=') => Token::Op(CompareOp::Lte),
            '<' => Token::Op(CompareOp::Lt),
            '>' if self.eat('=') => Token::Op(CompareOp::Gte),
            '>' => Token::Op(CompareOp::Gt),
            '"' | '\'' => Token::Str(self.string(pos, ch)?),
            c if c.is_ascii_digit() || c == '-' => Token::Num(self.number(pos)?),
            c if c.is_alphabetic() || c == '_' => Token::Ident(self.ident(pos)),
            c => return Err(QueryError::UnexpectedChar { pos, ch: c }),
        };

        Ok(token)
    }

    fn string(&mut self, pos: usize, quote: char) -> Result<String, QueryError> {
        let mut out = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                },
                c if c == quote => return Ok(out),
                c => out.push(c),
            }
        }

        Err(QueryError::UnterminatedString { pos })
    }

    fn end_of(&mut self, accept: impl Fn(char) -> bool) -> usize {
        while self.chars.next_if(|&(_, c)| accept(c)).is_some() {}
        self.chars.peek().map_or(self.source.len(), |&(i, _)| i)
    }

    fn ident(&mut self, pos: usize) -> String {
        let end = self.end_of(|c| c.is_alphanumeric() || c == '_' || c == '.');
        self.source[pos..end].to_string()
    }

    fn number(&mut self, pos: usize) -> Result<Value, QueryError> {
        let end = self.end_of(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-'));
        let text = &self.source[pos..end];
        let invalid = || QueryError::InvalidNumber(text.to_string());

        if text.contains(['.', 'e', 'E']) {
            return text.parse().map(Value::Float64).map_err(|_| invalid());
        }

        text.parse()
            .map(Value::Int)
            .or_else(|_| text.parse().map(Value::Uint))
            .map_err(|_| invalid())
    }
}

///
/// Parser
///
/// or    := and ('||' and)*
/// and   := unary ('&&' unary)*
/// unary := '!' unary | '(' or ')' | path op literal
///

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn unexpected(&self, expected: &'static str) -> QueryError {
        match self.tokens.get(self.pos) {
            Some((pos, token)) => QueryError::Unexpected {
                pos: *pos,
                expected,
                found: token.describe(),
            },
            None => QueryError::Unexpected {
                pos: self.end,
                expected,
                found: "end of input".to_string(),
            },
        }
    }

    fn expect(&mut self, token: &Token, expected: &'static str) -> Result<(), QueryError> {
        if self.peek() == Some(token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn or(&mut self) -> Result<Predicate, QueryError> {
        let mut terms = vec![self.and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.and()?);
        }

        Ok(collapse(terms, Predicate::Or))
    }

    fn and(&mut self) -> Result<Predicate, QueryError> {
        let mut terms = vec![self.unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.unary()?);
        }

        Ok(collapse(terms, Predicate::And))
    }

    fn unary(&mut self) -> Result<Predicate, QueryError> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                Ok(Predicate::Not(Box::new(self.unary()?)))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.or()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            _ => self.compare(),
        }
    }

    fn compare(&mut self) -> Result<Predicate, QueryError> {
        let Some(Token::Ident(path)) = self.peek().cloned() else {
            return Err(self.unexpected("field path"));
        };
        self.pos += 1;

        let Some(Token::Op(op)) = self.peek().cloned() else {
            return Err(self.unexpected("comparison operator"));
        };
        self.pos += 1;

        let value = match self.peek().cloned() {
            Some(Token::Str(s)) => Value::Text(s),
            Some(Token::Num(n)) => n,
            Some(Token::Ident(word)) => match word.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                "null" => Value::Null,
                _ => return Err(self.unexpected("literal")),
            },
            _ => return Err(self.unexpected("literal")),
        };
        self.pos += 1;

        Ok(Predicate::compare(path, op, value))
    }
}

fn collapse(mut terms: Vec<Predicate>, join: fn(Vec<Predicate>) -> Predicate) -> Predicate {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        join(terms)
    }
}

pub(super) fn parse(source: &str) -> Result<Predicate, QueryError> {
    let tokens = Lexer::new(source).tokens()?;
    if tokens.is_empty() {
        return Err(QueryError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source.len(),
    };
    let predicate = parser.or()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.unexpected("end of input"));
    }

    Ok(predicate)
}

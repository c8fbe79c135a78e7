//! Tokenizer for the single-line expression language.

use super::error::CompileError;

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Question,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    AndAnd,
    OrOr,
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character.
    pub position: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let start = i;

        if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            i = scan_number(bytes, i);
            let text = &source[start..i];
            let value = text.parse::<f64>().map_err(|_| CompileError::Syntax {
                position: start,
                message: format!("invalid number literal `{text}`"),
            })?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                position: start,
            });
            continue;
        }

        if c == b'_' || c == b'$' || c.is_ascii_alphabetic() || !c.is_ascii() {
            let rest = &source[start..];
            let len = rest
                .char_indices()
                .find(|(_, ch)| !(ch.is_alphanumeric() || *ch == '_' || *ch == '$'))
                .map(|(idx, _)| idx)
                .unwrap_or(rest.len());
            if len == 0 {
                return Err(unexpected(source, start));
            }
            i = start + len;
            tokens.push(Token {
                kind: TokenKind::Ident(source[start..i].to_string()),
                position: start,
            });
            continue;
        }

        if c == b'\'' || c == b'"' {
            let (value, end) = scan_string(source, start, c)?;
            i = end;
            tokens.push(Token {
                kind: TokenKind::Str(value),
                position: start,
            });
            continue;
        }

        let three = source.get(i..i + 3);
        let two = source.get(i..i + 2);
        let (kind, len) = match (three, two, c) {
            (Some("==="), _, _) => (TokenKind::EqEqEq, 3),
            (Some("!=="), _, _) => (TokenKind::NotEqEq, 3),
            (_, Some("=="), _) => (TokenKind::EqEq, 2),
            (_, Some("!="), _) => (TokenKind::NotEq, 2),
            (_, Some("<="), _) => (TokenKind::Le, 2),
            (_, Some(">="), _) => (TokenKind::Ge, 2),
            (_, Some("&&"), _) => (TokenKind::AndAnd, 2),
            (_, Some("||"), _) => (TokenKind::OrOr, 2),
            (_, _, b'(') => (TokenKind::LParen, 1),
            (_, _, b')') => (TokenKind::RParen, 1),
            (_, _, b'[') => (TokenKind::LBracket, 1),
            (_, _, b']') => (TokenKind::RBracket, 1),
            (_, _, b'.') => (TokenKind::Dot, 1),
            (_, _, b',') => (TokenKind::Comma, 1),
            (_, _, b'?') => (TokenKind::Question, 1),
            (_, _, b':') => (TokenKind::Colon, 1),
            (_, _, b'+') => (TokenKind::Plus, 1),
            (_, _, b'-') => (TokenKind::Minus, 1),
            (_, _, b'*') => (TokenKind::Star, 1),
            (_, _, b'/') => (TokenKind::Slash, 1),
            (_, _, b'%') => (TokenKind::Percent, 1),
            (_, _, b'!') => (TokenKind::Bang, 1),
            (_, _, b'<') => (TokenKind::Lt, 1),
            (_, _, b'>') => (TokenKind::Gt, 1),
            _ => return Err(unexpected(source, start)),
        };
        tokens.push(Token {
            kind,
            position: start,
        });
        i += len;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        position: source.len(),
    });
    Ok(tokens)
}

fn unexpected(source: &str, position: usize) -> CompileError {
    let ch = source[position..].chars().next().unwrap_or(' ');
    CompileError::Syntax {
        position,
        message: format!("unexpected character `{ch}`"),
    }
}

fn scan_number(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    i
}

fn scan_string(source: &str, start: usize, quote: u8) -> Result<(String, usize), CompileError> {
    let mut out = String::new();
    let mut chars = source[start + 1..].char_indices();
    while let Some((offset, ch)) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, other)) => out.push(other),
                None => break,
            },
            c if c as u32 == u32::from(quote) => {
                return Ok((out, start + 1 + offset + 1));
            }
            c => out.push(c),
        }
    }
    Err(CompileError::Syntax {
        position: start,
        message: "unterminated string literal".to_string(),
    })
}

//! Lexer for the snippet language.

use crate::error::BuildError;

/// One lexical token. Spans are byte offsets into the source snippet and
/// feed error positions.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
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
    AndAnd,
    OrOr,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    LParen,
    RParen,
    Comma,
    Semi,
}

fn err(src: &str, position: usize, reason: impl Into<String>) -> BuildError {
    BuildError::Compile {
        snippet: src.to_string(),
        position,
        reason: reason.into(),
    }
}

/// Tokenizes a snippet. Returns each token with its starting byte offset.
pub(crate) fn lex(src: &str) -> Result<Vec<(Token, usize)>, BuildError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
            }
            b'0'..=b'9' => {
                let mut end = i;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                let mut is_float = false;
                if end < bytes.len()
                    && bytes[end] == b'.'
                    && end + 1 < bytes.len()
                    && bytes[end + 1].is_ascii_digit()
                {
                    is_float = true;
                    end += 1;
                    while end < bytes.len() && bytes[end].is_ascii_digit() {
                        end += 1;
                    }
                }
                let text = &src[start..end];
                let token = if is_float {
                    Token::Float(
                        text.parse()
                            .map_err(|_| err(src, start, "invalid float literal"))?,
                    )
                } else {
                    Token::Int(
                        text.parse()
                            .map_err(|_| err(src, start, "integer literal out of range"))?,
                    )
                };
                tokens.push((token, start));
                i = end;
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let mut end = i;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                let token = match &src[start..end] {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    ident => Token::Ident(ident.to_string()),
                };
                tokens.push((token, start));
                i = end;
            }
            b'\'' | b'"' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    if i >= bytes.len() {
                        return Err(err(src, start, "unterminated string literal"));
                    }
                    match bytes[i] {
                        b'\\' => {
                            i += 1;
                            let escaped = bytes
                                .get(i)
                                .ok_or_else(|| err(src, start, "unterminated string literal"))?;
                            match escaped {
                                b'\\' => text.push('\\'),
                                b'\'' => text.push('\''),
                                b'"' => text.push('"'),
                                b'n' => text.push('\n'),
                                b't' => text.push('\t'),
                                _ => return Err(err(src, i, "unknown escape sequence")),
                            }
                            i += 1;
                        }
                        b if b == quote => {
                            i += 1;
                            break;
                        }
                        _ => {
                            // Strings are UTF-8; copy whole chars, not bytes.
                            let ch = src[i..]
                                .chars()
                                .next()
                                .ok_or_else(|| err(src, i, "invalid UTF-8 in string"))?;
                            text.push(ch);
                            i += ch.len_utf8();
                        }
                    }
                }
                tokens.push((Token::Str(text), start));
            }
            b'+' => i = two_char(bytes, i, b'=', Token::PlusAssign, Token::Plus, &mut tokens),
            b'-' => i = two_char(bytes, i, b'=', Token::MinusAssign, Token::Minus, &mut tokens),
            b'*' => i = two_char(bytes, i, b'=', Token::StarAssign, Token::Star, &mut tokens),
            b'/' => i = two_char(bytes, i, b'=', Token::SlashAssign, Token::Slash, &mut tokens),
            b'%' => {
                tokens.push((Token::Percent, i));
                i += 1;
            }
            b'<' => i = two_char(bytes, i, b'=', Token::Le, Token::Lt, &mut tokens),
            b'>' => i = two_char(bytes, i, b'=', Token::Ge, Token::Gt, &mut tokens),
            b'=' => i = two_char(bytes, i, b'=', Token::EqEq, Token::Assign, &mut tokens),
            b'!' => i = two_char(bytes, i, b'=', Token::NotEq, Token::Bang, &mut tokens),
            b'&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    tokens.push((Token::AndAnd, i));
                    i += 2;
                } else {
                    return Err(err(src, i, "unexpected character '&' (did you mean '&&'?)"));
                }
            }
            b'|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    tokens.push((Token::OrOr, i));
                    i += 2;
                } else {
                    return Err(err(src, i, "unexpected character '|' (did you mean '||'?)"));
                }
            }
            b'(' => {
                tokens.push((Token::LParen, i));
                i += 1;
            }
            b')' => {
                tokens.push((Token::RParen, i));
                i += 1;
            }
            b',' => {
                tokens.push((Token::Comma, i));
                i += 1;
            }
            b';' => {
                tokens.push((Token::Semi, i));
                i += 1;
            }
            _ => {
                let ch = src[i..].chars().next().unwrap_or('?');
                return Err(err(src, i, format!("unexpected character '{ch}'")));
            }
        }
    }

    Ok(tokens)
}

fn two_char(
    bytes: &[u8],
    i: usize,
    second: u8,
    matched: Token,
    single: Token,
    tokens: &mut Vec<(Token, usize)>,
) -> usize {
    if bytes.get(i + 1) == Some(&second) {
        tokens.push((matched, i));
        i + 2
    } else {
        tokens.push((single, i));
        i + 1
    }
}

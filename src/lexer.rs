//! Line-oriented lexer.
//!
//! Each logical line is split into its indentation width and its content. The
//! indentation is checked against a stack of open block levels to synthesize
//! `Indent`/`Dedent`, then the content is scanned into a flat token list
//! terminated by `Newline`. Blank lines and full-line `#` comments produce no
//! tokens at all.

use std::iter::Peekable;
use std::str::CharIndices;

pub mod error;

pub use error::{LexError, LexResult};

use crate::token::{Span, Token, TokenKind, keyword};

pub struct Lexer<'a> {
    indent_stack: Vec<usize>,
    tokens: Vec<Token<'a>>,
    last_line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new() -> Self {
        Self {
            indent_stack: vec![0],
            tokens: Vec::new(),
            last_line: 0,
        }
    }

    /// Lexes one raw source line, appending its tokens.
    pub fn push_line(&mut self, raw: &'a str, line: usize) -> LexResult<()> {
        self.last_line = line;
        let raw = raw.trim_end();
        let content = raw.trim_start_matches(' ');
        if content.is_empty() || content.starts_with('#') {
            return Ok(());
        }
        if content.starts_with('\t') {
            return Err(LexError::TabIndentation { line });
        }
        let width = raw.len() - content.len();
        let indentation = self.indentation(width, line)?;
        self.tokens.extend(indentation);
        let line_tokens = scan_line(content, line, width)?;
        self.tokens.extend(line_tokens);
        Ok(())
    }

    /// Compares `width` against the open indentation levels and returns the
    /// structural tokens for the change, if any.
    pub fn indentation(&mut self, width: usize, line: usize) -> LexResult<Vec<Token<'a>>> {
        let span = Span { line, column: 0 };
        let current = self.current_indent();
        if width > current {
            self.indent_stack.push(width);
            return Ok(vec![Token::new(TokenKind::Indent, span)]);
        }

        let mut dedents = Vec::new();
        while self.current_indent() > width {
            self.indent_stack.pop();
            dedents.push(Token::new(TokenKind::Dedent, span));
        }
        if self.current_indent() != width {
            return Err(LexError::InvalidDedent {
                indent_level: width,
                line,
            });
        }
        Ok(dedents)
    }

    /// Closes every open block and terminates the stream.
    pub fn finish(mut self) -> Vec<Token<'a>> {
        let span = Span {
            line: self.last_line + 1,
            column: 0,
        };
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.tokens.push(Token::new(TokenKind::Dedent, span));
        }
        self.tokens.push(Token::new(TokenKind::EOF, span));
        self.tokens
    }

    fn current_indent(&self) -> usize {
        self.indent_stack.last().copied().unwrap_or(0)
    }
}

impl Default for Lexer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scans the content of one line (indentation already stripped).
///
/// `offset` is the stripped indentation width, used only for column numbers.
pub fn scan_line<'a>(content: &'a str, line: usize, offset: usize) -> LexResult<Vec<Token<'a>>> {
    LineScanner {
        input: content,
        chars: content.char_indices().peekable(),
        line,
        offset,
    }
    .scan()
}

struct LineScanner<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    offset: usize,
}

impl<'a> LineScanner<'a> {
    fn scan(mut self) -> LexResult<Vec<Token<'a>>> {
        let mut tokens = Vec::new();
        while let Some(&(start, ch)) = self.chars.peek() {
            let span = Span {
                line: self.line,
                column: self.offset + start,
            };
            if ch == ' ' || ch == '\t' {
                self.chars.next();
                continue;
            }
            let kind = match ch {
                '"' => self.read_string(start, span)?,
                c if c.is_ascii_digit() => self.read_integer(start, span)?,
                c if c.is_alphabetic() || c == '_' => self.read_identifier(start),
                '=' | '!' | '<' | '>' => self.read_comparison(ch, span)?,
                _ => {
                    self.chars.next();
                    single_char_token(ch).ok_or(LexError::UnexpectedCharacter {
                        character: ch,
                        line: span.line,
                        column: span.column,
                    })?
                }
            };
            tokens.push(Token::new(kind, span));
        }
        tokens.push(Token::new(
            TokenKind::Newline,
            Span {
                line: self.line,
                column: self.offset + self.input.len(),
            },
        ));
        Ok(tokens)
    }

    fn end_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }

    fn read_identifier(&mut self, start: usize) -> TokenKind<'a> {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.chars.next();
            } else {
                break;
            }
        }
        let end = self.end_index();
        let ident = &self.input[start..end];
        keyword(ident).unwrap_or(TokenKind::Identifier(ident))
    }

    fn read_integer(&mut self, start: usize, span: Span) -> LexResult<TokenKind<'a>> {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.chars.next();
            } else {
                break;
            }
        }
        let end = self.end_index();
        let literal = &self.input[start..end];
        let value = literal
            .parse::<i64>()
            .map_err(|_| LexError::InvalidIntegerLiteral {
                literal: literal.to_string(),
                line: span.line,
                column: span.column,
            })?;
        Ok(TokenKind::Integer(value))
    }

    fn read_string(&mut self, start: usize, span: Span) -> LexResult<TokenKind<'a>> {
        self.chars.next(); // opening quote
        let content_start = start + 1;
        while let Some((idx, c)) = self.chars.next() {
            match c {
                '"' => return Ok(TokenKind::String(&self.input[content_start..idx])),
                // A backslash keeps the next character verbatim, so `\"` does
                // not close the literal. No escape is translated.
                '\\' => {
                    self.chars.next();
                }
                _ => {}
            }
        }
        Err(LexError::UnterminatedString {
            line: span.line,
            column: span.column,
        })
    }

    fn read_comparison(&mut self, first: char, span: Span) -> LexResult<TokenKind<'a>> {
        self.chars.next();
        if matches!(self.chars.peek(), Some(&(_, '='))) {
            self.chars.next();
            return Ok(match first {
                '=' => TokenKind::EqualEqual,
                '!' => TokenKind::NotEqual,
                '<' => TokenKind::LessEqual,
                _ => TokenKind::GreaterEqual,
            });
        }
        match first {
            '=' => Ok(TokenKind::Equal),
            '<' => Ok(TokenKind::Less),
            '>' => Ok(TokenKind::Greater),
            _ => Err(LexError::UnexpectedCharacter {
                character: first,
                line: span.line,
                column: span.column,
            }),
        }
    }
}

fn single_char_token<'k>(ch: char) -> Option<TokenKind<'k>> {
    let kind = match ch {
        '+' => TokenKind::Plus,
        '-' => TokenKind::Minus,
        '*' => TokenKind::Star,
        '/' => TokenKind::Slash,
        ':' => TokenKind::Colon,
        ',' => TokenKind::Comma,
        '.' => TokenKind::Dot,
        '(' => TokenKind::LParen,
        ')' => TokenKind::RParen,
        '[' => TokenKind::LBracket,
        ']' => TokenKind::RBracket,
        '{' => TokenKind::LBrace,
        '}' => TokenKind::RBrace,
        _ => return None,
    };
    Some(kind)
}

pub fn tokenize(input: &str) -> LexResult<Vec<Token<'_>>> {
    let mut lexer = Lexer::new();
    for (index, raw) in input.lines().enumerate() {
        lexer.push_line(raw, index + 1)?;
    }
    Ok(lexer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        tokenize(input)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_simple_program() {
        let input = indoc! {"
            def fn(n: int):
                n = n + 4
                print(n)
            fn(1)
        "};
        let expected_tokens = vec![
            TokenKind::Def,
            TokenKind::Identifier("fn"),
            TokenKind::LParen,
            TokenKind::Identifier("n"),
            TokenKind::Colon,
            TokenKind::Identifier("int"),
            TokenKind::RParen,
            TokenKind::Colon,
            TokenKind::Newline,
            TokenKind::Indent,
            TokenKind::Identifier("n"),
            TokenKind::Equal,
            TokenKind::Identifier("n"),
            TokenKind::Plus,
            TokenKind::Integer(4),
            TokenKind::Newline,
            TokenKind::Print,
            TokenKind::LParen,
            TokenKind::Identifier("n"),
            TokenKind::RParen,
            TokenKind::Newline,
            TokenKind::Dedent,
            TokenKind::Identifier("fn"),
            TokenKind::LParen,
            TokenKind::Integer(1),
            TokenKind::RParen,
            TokenKind::Newline,
            TokenKind::EOF,
        ];
        assert_eq!(kinds(input), expected_tokens);
    }

    #[test]
    fn two_char_operators_win_over_prefixes() {
        assert_eq!(
            kinds("a <= b == c != d >= e < f > g = h"),
            vec![
                TokenKind::Identifier("a"),
                TokenKind::LessEqual,
                TokenKind::Identifier("b"),
                TokenKind::EqualEqual,
                TokenKind::Identifier("c"),
                TokenKind::NotEqual,
                TokenKind::Identifier("d"),
                TokenKind::GreaterEqual,
                TokenKind::Identifier("e"),
                TokenKind::Less,
                TokenKind::Identifier("f"),
                TokenKind::Greater,
                TokenKind::Identifier("g"),
                TokenKind::Equal,
                TokenKind::Identifier("h"),
                TokenKind::Newline,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn strings_keep_backslashes_verbatim() {
        assert_eq!(
            kinds(r#"print("a\"b\n")"#),
            vec![
                TokenKind::Print,
                TokenKind::LParen,
                TokenKind::String(r#"a\"b\n"#),
                TokenKind::RParen,
                TokenKind::Newline,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn emits_one_dedent_per_closed_level_and_closes_at_eof() {
        let input = indoc! {"
            if a:
                if b:
                    x = 1
            y = 2
            while c:
                z = 3
        "};
        let structural = kinds(input)
            .into_iter()
            .filter(|kind| matches!(kind, TokenKind::Indent | TokenKind::Dedent))
            .collect::<Vec<_>>();
        assert_eq!(
            structural,
            vec![
                TokenKind::Indent,
                TokenKind::Indent,
                TokenKind::Dedent,
                TokenKind::Dedent,
                TokenKind::Indent,
                TokenKind::Dedent,
            ]
        );
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        let input = "# header\n\nx = 1\n    # indented comment\n\n";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Identifier("x"),
                TokenKind::Equal,
                TokenKind::Integer(1),
                TokenKind::Newline,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn errors_on_partial_dedent() {
        let input = "if a:\n    x = 1\n  y = 2\n";
        let err = tokenize(input).expect_err("expected dedent failure");
        assert_eq!(
            err,
            LexError::InvalidDedent {
                indent_level: 2,
                line: 3
            }
        );
    }

    #[test]
    fn errors_on_invalid_character() {
        let err = tokenize("x = 1 @ 2\n").expect_err("expected lexing failure");
        assert!(err.to_string().contains("Unexpected character '@'"));
        let err = tokenize("x = !y\n").expect_err("expected lexing failure");
        assert!(err.to_string().contains("Unexpected character '!'"));
    }

    #[test]
    fn errors_on_unterminated_string() {
        let err = tokenize("print(\"abc)\n").expect_err("expected unterminated string");
        assert_eq!(err, LexError::UnterminatedString { line: 1, column: 6 });
    }

    #[test]
    fn errors_on_integer_overflow() {
        let err = tokenize("n = 99999999999999999999999999\n").expect_err("expected overflow");
        assert!(err.to_string().contains("Invalid integer literal"));
    }

    #[test]
    fn errors_on_tab_indentation() {
        let err = tokenize("if a:\n\tx = 1\n").expect_err("expected tab failure");
        assert_eq!(err, LexError::TabIndentation { line: 2 });
    }
}

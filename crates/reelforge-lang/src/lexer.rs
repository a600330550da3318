use std::fmt;

use reelforge_core::ForgeError;

/// Source location for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Token kinds of the scene-module language.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Scene,
    Layer,
    Text,
    Image,
    Video,
    Solid,
    Shape,
    Animate,

    // Literals
    Identifier(String),
    StringLiteral(String),
    NumberLiteral(f64),
    ColorLiteral(String), // hex digits without the '#'
    FrameLiteral(u32),    // 150f
    SecondLiteral(f64),   // 5s / 2.5s

    // Punctuation
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    Comma,
    Colon,
    Minus,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Scene => write!(f, "scene"),
            TokenKind::Layer => write!(f, "layer"),
            TokenKind::Text => write!(f, "text"),
            TokenKind::Image => write!(f, "image"),
            TokenKind::Video => write!(f, "video"),
            TokenKind::Solid => write!(f, "solid"),
            TokenKind::Shape => write!(f, "shape"),
            TokenKind::Animate => write!(f, "animate"),
            TokenKind::Identifier(s) => write!(f, "{}", s),
            TokenKind::StringLiteral(s) => write!(f, "\"{}\"", s),
            TokenKind::NumberLiteral(n) => write!(f, "{}", n),
            TokenKind::ColorLiteral(c) => write!(f, "#{}", c),
            TokenKind::FrameLiteral(n) => write!(f, "{}f", n),
            TokenKind::SecondLiteral(s) => write!(f, "{}s", s),
            TokenKind::LeftBrace => write!(f, "{{"),
            TokenKind::RightBrace => write!(f, "}}"),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Eof => write!(f, "EOF"),
        }
    }
}

/// A token with its kind and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The scene-module tokenizer.
pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire source.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, ForgeError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if pred(c) {
                self.advance();
                s.push(c);
            } else {
                break;
            }
        }
        s
    }

    fn err(&self, message: impl Into<String>, span: Span) -> ForgeError {
        ForgeError::Compilation(format!("{} at {}", message.into(), span))
    }

    fn next_token(&mut self) -> Result<Token, ForgeError> {
        self.skip_whitespace_and_comments();

        let span = Span::new(self.line, self.column);

        let ch = match self.peek() {
            Some(ch) => ch,
            None => return Ok(Token::new(TokenKind::Eof, span)),
        };

        let kind = match ch {
            '{' => {
                self.advance();
                TokenKind::LeftBrace
            }
            '}' => {
                self.advance();
                TokenKind::RightBrace
            }
            '(' => {
                self.advance();
                TokenKind::LeftParen
            }
            ')' => {
                self.advance();
                TokenKind::RightParen
            }
            ',' => {
                self.advance();
                TokenKind::Comma
            }
            ':' => {
                self.advance();
                TokenKind::Colon
            }
            '-' => {
                self.advance();
                TokenKind::Minus
            }
            '#' => {
                self.advance();
                let hex = self.read_while(|c| c.is_ascii_hexdigit());
                if hex.len() != 6 && hex.len() != 8 {
                    return Err(self.err(format!("invalid hex color: #{hex}"), span));
                }
                TokenKind::ColorLiteral(hex)
            }
            '"' => {
                self.advance();
                let mut s = String::new();
                loop {
                    match self.peek() {
                        Some('"') => {
                            self.advance();
                            break;
                        }
                        Some('\\') => {
                            self.advance();
                            match self.advance() {
                                Some('n') => s.push('\n'),
                                Some('t') => s.push('\t'),
                                Some('"') => s.push('"'),
                                Some('\\') => s.push('\\'),
                                Some(c) => s.push(c),
                                None => {
                                    return Err(self.err("unterminated string literal", span))
                                }
                            }
                        }
                        Some(c) => {
                            self.advance();
                            s.push(c);
                        }
                        None => return Err(self.err("unterminated string literal", span)),
                    }
                }
                TokenKind::StringLiteral(s)
            }
            c if c.is_ascii_digit() => {
                let num_str = self.read_while(|c| c.is_ascii_digit() || c == '.');
                let value: f64 = num_str
                    .parse()
                    .map_err(|_| self.err(format!("invalid number: {num_str}"), span))?;

                // A unit suffix must not swallow the start of an identifier:
                // `20f,` is a frame literal, `20fade` is a lex error upstream.
                let next_after = |l: &Lexer| {
                    l.peek_at(1)
                        .map(|c| !(c.is_alphanumeric() || c == '_'))
                        .unwrap_or(true)
                };
                match self.peek() {
                    Some('f') if next_after(self) => {
                        self.advance();
                        if num_str.contains('.') {
                            return Err(
                                self.err(format!("frame count must be an integer: {num_str}f"), span)
                            );
                        }
                        TokenKind::FrameLiteral(value as u32)
                    }
                    Some('s') if next_after(self) => {
                        self.advance();
                        TokenKind::SecondLiteral(value)
                    }
                    _ => TokenKind::NumberLiteral(value),
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let ident = self.read_while(|c| c.is_alphanumeric() || c == '_');
                match ident.as_str() {
                    "scene" => TokenKind::Scene,
                    "layer" => TokenKind::Layer,
                    "text" => TokenKind::Text,
                    "image" => TokenKind::Image,
                    "video" => TokenKind::Video,
                    "solid" => TokenKind::Solid,
                    "shape" => TokenKind::Shape,
                    "animate" => TokenKind::Animate,
                    _ => TokenKind::Identifier(ident),
                }
            }
            other => return Err(self.err(format!("unexpected character '{other}'"), span)),
        };

        Ok(Token::new(kind, span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_scene_header() {
        let toks = kinds("scene(\"Intro\", 150f) {}");
        assert_eq!(
            toks,
            vec![
                TokenKind::Scene,
                TokenKind::LeftParen,
                TokenKind::StringLiteral("Intro".into()),
                TokenKind::Comma,
                TokenKind::FrameLiteral(150),
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_second_literal() {
        assert!(kinds("5s").contains(&TokenKind::SecondLiteral(5.0)));
        assert!(kinds("2.5s").contains(&TokenKind::SecondLiteral(2.5)));
    }

    #[test]
    fn test_fractional_frame_literal_is_error() {
        assert!(Lexer::new("2.5f").tokenize().is_err());
    }

    #[test]
    fn test_color_literal() {
        assert!(kinds("#FF8800").contains(&TokenKind::ColorLiteral("FF8800".into())));
        assert!(Lexer::new("#FF88").tokenize().is_err());
    }

    #[test]
    fn test_comments_skipped() {
        let toks = kinds("// header\nlayer // trailing\n");
        assert_eq!(toks, vec![TokenKind::Layer, TokenKind::Eof]);
    }

    #[test]
    fn test_string_escapes() {
        let toks = kinds(r#""a\"b\nc""#);
        assert_eq!(toks[0], TokenKind::StringLiteral("a\"b\nc".into()));
    }

    #[test]
    fn test_suffix_does_not_eat_identifier() {
        // "0fade" style input: digit followed by a word is not a frame literal.
        let toks = kinds("animate(opacity, from: 0, to: 1)");
        assert!(toks.contains(&TokenKind::NumberLiteral(0.0)));
        assert!(toks.contains(&TokenKind::NumberLiteral(1.0)));
    }

    #[test]
    fn test_unexpected_character() {
        assert!(Lexer::new("scene $").tokenize().is_err());
    }

    #[test]
    fn test_spans_track_lines() {
        let tokens = Lexer::new("scene\n  layer").tokenize().unwrap();
        assert_eq!(tokens[0].span, Span::new(1, 1));
        assert_eq!(tokens[1].span, Span::new(2, 3));
    }
}

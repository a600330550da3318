//! Recursive-descent parser: tokens → [`SceneNode`].

use reelforge_core::ForgeError;

use crate::ast::*;
use crate::lexer::{Lexer, Span, Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Lex and parse a complete scene module.
    pub fn parse_source(source: &str) -> Result<SceneNode, ForgeError> {
        let tokens = Lexer::new(source).tokenize()?;
        Parser::new(tokens).parse_scene_module()
    }

    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|t| t.span)
            .unwrap_or(Span::new(0, 0))
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn expect(&mut self, expected: TokenKind) -> Result<(), ForgeError> {
        let span = self.span();
        let got = self.advance();
        if got == expected {
            Ok(())
        } else {
            Err(self.err(format!("expected '{expected}', found '{got}'"), span))
        }
    }

    fn err(&self, message: impl Into<String>, span: Span) -> ForgeError {
        ForgeError::Compilation(format!("{} at {}", message.into(), span))
    }

    /// `scene("Name", <duration>) { layer... }` and nothing after it.
    pub fn parse_scene_module(&mut self) -> Result<SceneNode, ForgeError> {
        let span = self.span();
        self.expect(TokenKind::Scene)?;
        self.expect(TokenKind::LeftParen)?;

        let name = self.parse_string("scene name")?;
        self.expect(TokenKind::Comma)?;
        let duration = self.parse_duration()?;
        self.expect(TokenKind::RightParen)?;
        self.expect(TokenKind::LeftBrace)?;

        let mut layers = Vec::new();
        while *self.peek() != TokenKind::RightBrace {
            if *self.peek() == TokenKind::Eof {
                return Err(self.err("unclosed scene block", span));
            }
            layers.push(self.parse_layer()?);
        }
        self.expect(TokenKind::RightBrace)?;

        let trailing_span = self.span();
        if *self.peek() != TokenKind::Eof {
            return Err(self.err(
                format!("unexpected '{}' after scene block", self.peek()),
                trailing_span,
            ));
        }

        Ok(SceneNode {
            name,
            duration,
            layers,
            span,
        })
    }

    fn parse_duration(&mut self) -> Result<DurationNode, ForgeError> {
        let span = self.span();
        match self.advance() {
            TokenKind::FrameLiteral(n) => Ok(DurationNode::Frames(n)),
            TokenKind::SecondLiteral(s) => Ok(DurationNode::Seconds(s)),
            other => Err(self.err(
                format!("expected a duration like '150f' or '5s', found '{other}'"),
                span,
            )),
        }
    }

    fn parse_string(&mut self, what: &str) -> Result<String, ForgeError> {
        let span = self.span();
        match self.advance() {
            TokenKind::StringLiteral(s) => Ok(s),
            other => Err(self.err(format!("expected {what} string, found '{other}'"), span)),
        }
    }

    fn parse_layer(&mut self) -> Result<LayerNode, ForgeError> {
        let span = self.span();
        self.expect(TokenKind::Layer)?;
        self.expect(TokenKind::LeftParen)?;
        let name = self.parse_string("layer name")?;
        self.expect(TokenKind::RightParen)?;
        self.expect(TokenKind::LeftBrace)?;

        let mut items = Vec::new();
        loop {
            let item_span = self.span();
            match self.peek().clone() {
                TokenKind::RightBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => return Err(self.err("unclosed layer block", span)),
                TokenKind::Text => items.push(LayerItem::Content(self.parse_text()?)),
                TokenKind::Image => {
                    items.push(LayerItem::Content(self.parse_url_content(false)?))
                }
                TokenKind::Video => {
                    items.push(LayerItem::Content(self.parse_url_content(true)?))
                }
                TokenKind::Solid => items.push(LayerItem::Content(self.parse_solid()?)),
                TokenKind::Shape => items.push(LayerItem::Content(self.parse_shape()?)),
                TokenKind::Animate => items.push(LayerItem::Animate(self.parse_animate()?)),
                TokenKind::Identifier(_) => items.push(LayerItem::Property(self.parse_property()?)),
                other => {
                    return Err(
                        self.err(format!("unexpected '{other}' in layer block"), item_span)
                    )
                }
            }
        }

        Ok(LayerNode { name, items, span })
    }

    fn parse_text(&mut self) -> Result<ContentNode, ForgeError> {
        self.expect(TokenKind::Text)?;
        self.expect(TokenKind::LeftParen)?;
        let text = self.parse_string("text content")?;
        let args = self.parse_trailing_named_args()?;
        Ok(ContentNode::Text { text, args })
    }

    fn parse_url_content(&mut self, video: bool) -> Result<ContentNode, ForgeError> {
        self.expect(if video { TokenKind::Video } else { TokenKind::Image })?;
        self.expect(TokenKind::LeftParen)?;
        let url = self.parse_string("media url")?;
        self.expect(TokenKind::RightParen)?;
        if video {
            Ok(ContentNode::Video { url })
        } else {
            Ok(ContentNode::Image { url })
        }
    }

    fn parse_solid(&mut self) -> Result<ContentNode, ForgeError> {
        self.expect(TokenKind::Solid)?;
        self.expect(TokenKind::LeftParen)?;
        let span = self.span();
        let color = match self.advance() {
            TokenKind::ColorLiteral(c) => c,
            other => return Err(self.err(format!("expected color, found '{other}'"), span)),
        };
        self.expect(TokenKind::RightParen)?;
        Ok(ContentNode::Solid { color })
    }

    fn parse_shape(&mut self) -> Result<ContentNode, ForgeError> {
        self.expect(TokenKind::Shape)?;
        self.expect(TokenKind::LeftParen)?;
        let span = self.span();
        let kind = match self.advance() {
            TokenKind::Identifier(k) => k,
            other => {
                return Err(self.err(format!("expected shape kind, found '{other}'"), span))
            }
        };
        let args = self.parse_trailing_named_args()?;
        Ok(ContentNode::Shape { kind, args })
    }

    /// `, name: value, name: value)` — the caller already consumed the
    /// first positional argument.
    fn parse_trailing_named_args(&mut self) -> Result<Vec<NamedArg>, ForgeError> {
        let mut args = Vec::new();
        loop {
            let span = self.span();
            match self.advance() {
                TokenKind::RightParen => break,
                TokenKind::Comma => {
                    args.push(self.parse_named_arg()?);
                }
                other => {
                    return Err(self.err(format!("expected ',' or ')', found '{other}'"), span))
                }
            }
        }
        Ok(args)
    }

    fn parse_named_arg(&mut self) -> Result<NamedArg, ForgeError> {
        let span = self.span();
        let name = match self.advance() {
            TokenKind::Identifier(n) => n,
            other => {
                return Err(self.err(format!("expected argument name, found '{other}'"), span))
            }
        };
        self.expect(TokenKind::Colon)?;
        let value = self.parse_value()?;
        Ok(NamedArg { name, value })
    }

    fn parse_property(&mut self) -> Result<PropertyNode, ForgeError> {
        let span = self.span();
        let name = match self.advance() {
            TokenKind::Identifier(n) => n,
            other => {
                return Err(self.err(format!("expected property name, found '{other}'"), span))
            }
        };
        self.expect(TokenKind::LeftParen)?;

        let mut values = Vec::new();
        if *self.peek() != TokenKind::RightParen {
            values.push(self.parse_value()?);
            while *self.peek() == TokenKind::Comma {
                self.advance();
                values.push(self.parse_value()?);
            }
        }
        self.expect(TokenKind::RightParen)?;

        Ok(PropertyNode { name, values, span })
    }

    fn parse_animate(&mut self) -> Result<AnimateNode, ForgeError> {
        let span = self.span();
        self.expect(TokenKind::Animate)?;
        self.expect(TokenKind::LeftParen)?;
        let prop_span = self.span();
        let property = match self.advance() {
            TokenKind::Identifier(p) => p,
            other => {
                return Err(self.err(
                    format!("expected animated property name, found '{other}'"),
                    prop_span,
                ))
            }
        };
        let args = self.parse_trailing_named_args()?;
        Ok(AnimateNode {
            property,
            args,
            span,
        })
    }

    fn parse_value(&mut self) -> Result<ValueNode, ForgeError> {
        let span = self.span();
        match self.advance() {
            TokenKind::NumberLiteral(n) => Ok(ValueNode::Number(n)),
            TokenKind::Minus => match self.advance() {
                TokenKind::NumberLiteral(n) => Ok(ValueNode::Number(-n)),
                other => Err(self.err(format!("expected number after '-', found '{other}'"), span)),
            },
            TokenKind::StringLiteral(s) => Ok(ValueNode::Str(s)),
            TokenKind::ColorLiteral(c) => Ok(ValueNode::Color(c)),
            TokenKind::Identifier(i) => Ok(ValueNode::Ident(i)),
            TokenKind::FrameLiteral(n) => Ok(ValueNode::Frames(n)),
            TokenKind::SecondLiteral(s) => Ok(ValueNode::Seconds(s)),
            other => Err(self.err(format!("expected a value, found '{other}'"), span)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
// generated module
scene("Intro", 150f) {
    layer("bg") {
        solid(#101020)
    }
    layer("title") {
        text("Launch day", font: "Inter", size: 96, color: #FFFFFF)
        position(540, 960)
        animate(opacity, from: 0, to: 1, start: 0f, end: 20f, easing: ease_out)
    }
    layer("logo") {
        image("https://cdn.example.com/logo.png")
        position(540, 400)
        scale(0.5)
    }
}
"#;

    #[test]
    fn test_parse_full_module() {
        let scene = Parser::parse_source(SOURCE).unwrap();
        assert_eq!(scene.name, "Intro");
        assert_eq!(scene.duration.frames(), 150);
        assert_eq!(scene.layers.len(), 3);

        let title = &scene.layers[1];
        assert_eq!(title.name, "title");
        assert_eq!(title.content_items().count(), 1);
        assert_eq!(title.items.len(), 3);
    }

    #[test]
    fn test_parse_seconds_duration() {
        let scene = Parser::parse_source("scene(\"s\", 5s) {}").unwrap();
        assert_eq!(scene.duration, DurationNode::Seconds(5.0));
        assert_eq!(scene.duration.frames(), 150);
    }

    #[test]
    fn test_animate_args() {
        let scene = Parser::parse_source(SOURCE).unwrap();
        let animate = scene.layers[1]
            .items
            .iter()
            .find_map(|i| match i {
                LayerItem::Animate(a) => Some(a),
                _ => None,
            })
            .unwrap();
        assert_eq!(animate.property, "opacity");
        assert_eq!(animate.arg("from"), Some(&ValueNode::Number(0.0)));
        assert_eq!(animate.arg("end"), Some(&ValueNode::Frames(20)));
        assert_eq!(
            animate.arg("easing"),
            Some(&ValueNode::Ident("ease_out".into()))
        );
    }

    #[test]
    fn test_negative_value() {
        let scene =
            Parser::parse_source("scene(\"s\", 30f) { layer(\"l\") { solid(#000000) position(-20, 40) } }")
                .unwrap();
        let prop = scene.layers[0]
            .items
            .iter()
            .find_map(|i| match i {
                LayerItem::Property(p) => Some(p),
                _ => None,
            })
            .unwrap();
        assert_eq!(prop.values[0], ValueNode::Number(-20.0));
    }

    #[test]
    fn test_missing_duration_fails() {
        assert!(Parser::parse_source("scene(\"s\") {}").is_err());
    }

    #[test]
    fn test_unclosed_block_fails() {
        assert!(Parser::parse_source("scene(\"s\", 30f) { layer(\"l\") {").is_err());
    }

    #[test]
    fn test_trailing_tokens_fail() {
        assert!(Parser::parse_source("scene(\"s\", 30f) {} scene(\"t\", 30f) {}").is_err());
    }

    #[test]
    fn test_unknown_top_level_item_fails() {
        assert!(Parser::parse_source("scene(\"s\", 30f) { text(\"loose\") }").is_err());
    }
}

//! AST for the scene-module language.

use crate::lexer::Span;
use reelforge_core::{frames::seconds_to_frames, PROJECT_FPS};

/// Declared scene duration, as written in the header.
#[derive(Debug, Clone, PartialEq)]
pub enum DurationNode {
    Frames(u32),
    Seconds(f64),
}

impl DurationNode {
    /// Duration in frames at the project frame rate.
    pub fn frames(&self) -> u32 {
        match self {
            DurationNode::Frames(n) => (*n).max(1),
            DurationNode::Seconds(s) => seconds_to_frames(*s),
        }
    }

    pub fn fps(&self) -> u32 {
        PROJECT_FPS
    }
}

/// Root of a parsed scene module. One module declares exactly one scene.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub duration: DurationNode,
    pub layers: Vec<LayerNode>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct LayerNode {
    pub name: String,
    pub items: Vec<LayerItem>,
    pub span: Span,
}

impl LayerNode {
    pub fn content_items(&self) -> impl Iterator<Item = &ContentNode> {
        self.items.iter().filter_map(|i| match i {
            LayerItem::Content(c) => Some(c),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub enum LayerItem {
    Content(ContentNode),
    Property(PropertyNode),
    Animate(AnimateNode),
}

/// The visual content of a layer. Exactly one per layer.
#[derive(Debug, Clone)]
pub enum ContentNode {
    Text { text: String, args: Vec<NamedArg> },
    Image { url: String },
    Video { url: String },
    Solid { color: String },
    Shape { kind: String, args: Vec<NamedArg> },
}

/// A static property call such as `position(540, 960)` or `fit(contain)`.
#[derive(Debug, Clone)]
pub struct PropertyNode {
    pub name: String,
    pub values: Vec<ValueNode>,
    pub span: Span,
}

/// `animate(opacity, from: 0, to: 1, start: 0f, end: 20f, easing: ease_out)`
#[derive(Debug, Clone)]
pub struct AnimateNode {
    pub property: String,
    pub args: Vec<NamedArg>,
    pub span: Span,
}

impl AnimateNode {
    pub fn arg(&self, name: &str) -> Option<&ValueNode> {
        self.args.iter().find(|a| a.name == name).map(|a| &a.value)
    }
}

#[derive(Debug, Clone)]
pub struct NamedArg {
    pub name: String,
    pub value: ValueNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueNode {
    Number(f64),
    Str(String),
    Color(String),
    Ident(String),
    Frames(u32),
    Seconds(f64),
}

impl ValueNode {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ValueNode::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Frame value for animation timing args; a bare number reads as frames.
    pub fn as_frames(&self) -> Option<u32> {
        match self {
            ValueNode::Frames(n) => Some(*n),
            ValueNode::Seconds(s) => Some(seconds_to_frames(*s)),
            ValueNode::Number(n) if *n >= 0.0 => Some(n.round() as u32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ValueNode::Str(s) => Some(s),
            ValueNode::Ident(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_node_frames() {
        assert_eq!(DurationNode::Frames(150).frames(), 150);
        assert_eq!(DurationNode::Seconds(5.0).frames(), 150);
        assert_eq!(DurationNode::Frames(0).frames(), 1);
    }

    #[test]
    fn test_value_as_frames() {
        assert_eq!(ValueNode::Frames(20).as_frames(), Some(20));
        assert_eq!(ValueNode::Seconds(1.0).as_frames(), Some(30));
        assert_eq!(ValueNode::Number(12.0).as_frames(), Some(12));
        assert_eq!(ValueNode::Str("x".into()).as_frames(), None);
    }
}

//! Scene-module compiler — source → executable artifact.
//!
//! The artifact is the canonical JSON encoding of the compiled scene IR.
//! Compilation is a pure function of one module's source: identical source
//! always yields a byte-identical artifact, and nothing about any other
//! scene is consulted, so one scene's failure can never poison a sibling.

use serde::{Deserialize, Serialize};

use reelforge_core::{ForgeError, ForgeResult};

use crate::ast::*;
use crate::parser::Parser;

/// Compiled scene IR — the shape serialized into the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledScene {
    pub name: String,
    pub duration_frames: u32,
    pub fps: u32,
    pub layers: Vec<CompiledLayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledLayer {
    pub id: String,
    pub content: CompiledContent,
    pub transform: CompiledTransform,
    pub animations: Vec<CompiledAnimation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompiledContent {
    Text {
        text: String,
        font: String,
        size: f64,
        color: String,
    },
    Image {
        url: String,
        fit: String,
    },
    Video {
        url: String,
        fit: String,
    },
    Solid {
        color: String,
    },
    Shape {
        kind: String,
        color: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledTransform {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub rotation: f64,
    pub opacity: f64,
}

impl Default for CompiledTransform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            rotation: 0.0,
            opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledAnimation {
    pub property: String,
    pub from: f64,
    pub to: f64,
    pub start_frame: u32,
    pub end_frame: u32,
    pub easing: String,
}

/// Non-fatal findings from a compile pass.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileWarning {
    /// An animation runs past the scene's declared end.
    AnimationPastEnd {
        layer: String,
        end_frame: u32,
        duration_frames: u32,
    },
    /// No exit headroom: motion is still running in the final frames.
    NoExitHeadroom { last_animated_frame: u32 },
}

impl std::fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileWarning::AnimationPastEnd {
                layer,
                end_frame,
                duration_frames,
            } => write!(
                f,
                "layer '{layer}': animation ends at frame {end_frame}, past scene end ({duration_frames})"
            ),
            CompileWarning::NoExitHeadroom {
                last_animated_frame,
            } => write!(
                f,
                "motion still running at frame {last_animated_frame}, near the scene cut"
            ),
        }
    }
}

/// Result of compiling one scene module.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub scene: CompiledScene,
    /// Canonical JSON artifact; byte-identical for identical source.
    pub artifact: String,
    /// The duration the module itself declares. May disagree with the
    /// stored scene record; the caller decides what to do with that.
    pub declared_duration_frames: u32,
    pub warnings: Vec<CompileWarning>,
}

const SUPPORTED_PROPERTIES: &[&str] = &["position", "scale", "rotation", "opacity", "fit"];
const ANIMATABLE_PROPERTIES: &[&str] = &["opacity", "scale", "rotation", "x", "y"];

/// Compile a scene module from source.
pub fn compile_scene(source: &str) -> ForgeResult<CompileOutput> {
    let ast = Parser::parse_source(source)?;
    let duration_frames = ast.duration.frames();
    let mut warnings = Vec::new();

    let mut layers = Vec::new();
    let mut seen_names = std::collections::HashSet::new();
    for layer in &ast.layers {
        if !seen_names.insert(layer.name.clone()) {
            return Err(ForgeError::Compilation(format!(
                "duplicate layer name '{}' at {}",
                layer.name, layer.span
            )));
        }
        layers.push(compile_layer(layer, duration_frames, &mut warnings)?);
    }

    let mut last_animated = 0u32;
    for layer in &layers {
        for anim in &layer.animations {
            last_animated = last_animated.max(anim.end_frame);
        }
    }
    if last_animated > 0 && duration_frames.saturating_sub(last_animated) < 2 {
        warnings.push(CompileWarning::NoExitHeadroom {
            last_animated_frame: last_animated,
        });
    }

    let scene = CompiledScene {
        name: ast.name,
        duration_frames,
        fps: ast.duration.fps(),
        layers,
    };
    let artifact = serde_json::to_string(&scene)?;

    Ok(CompileOutput {
        scene,
        artifact,
        declared_duration_frames: duration_frames,
        warnings,
    })
}

fn compile_layer(
    layer: &LayerNode,
    duration_frames: u32,
    warnings: &mut Vec<CompileWarning>,
) -> ForgeResult<CompiledLayer> {
    let mut contents = layer.content_items();
    let content_node = contents.next().ok_or_else(|| {
        ForgeError::Compilation(format!(
            "layer '{}' has no content (expected text/image/video/solid/shape) at {}",
            layer.name, layer.span
        ))
    })?;
    if contents.next().is_some() {
        return Err(ForgeError::Compilation(format!(
            "layer '{}' has more than one content item at {}",
            layer.name, layer.span
        )));
    }

    let mut transform = CompiledTransform::default();
    let mut fit = "contain".to_string();
    let mut animations = Vec::new();

    for item in &layer.items {
        match item {
            LayerItem::Content(_) => {}
            LayerItem::Property(prop) => {
                apply_property(&layer.name, prop, &mut transform, &mut fit)?
            }
            LayerItem::Animate(anim) => {
                animations.push(compile_animation(&layer.name, anim, duration_frames, warnings)?)
            }
        }
    }

    let content = compile_content(content_node, &fit);

    Ok(CompiledLayer {
        id: layer.name.clone(),
        content,
        transform,
        animations,
    })
}

fn compile_content(node: &ContentNode, fit: &str) -> CompiledContent {
    match node {
        ContentNode::Text { text, args } => {
            let font = named_str(args, "font").unwrap_or("Inter").to_string();
            let size = named_number(args, "size").unwrap_or(64.0);
            let color = named_color(args, "color").unwrap_or_else(|| "FFFFFF".to_string());
            CompiledContent::Text {
                text: text.clone(),
                font,
                size,
                color,
            }
        }
        ContentNode::Image { url } => CompiledContent::Image {
            url: url.clone(),
            fit: fit.to_string(),
        },
        ContentNode::Video { url } => CompiledContent::Video {
            url: url.clone(),
            fit: fit.to_string(),
        },
        ContentNode::Solid { color } => CompiledContent::Solid {
            color: color.clone(),
        },
        ContentNode::Shape { kind, args } => {
            let color = named_color(args, "color").unwrap_or_else(|| "FFFFFF".to_string());
            CompiledContent::Shape {
                kind: kind.clone(),
                color,
            }
        }
    }
}

fn apply_property(
    layer: &str,
    prop: &PropertyNode,
    transform: &mut CompiledTransform,
    fit: &mut String,
) -> ForgeResult<()> {
    let bad_args = || {
        ForgeError::Compilation(format!(
            "invalid arguments to {}() on layer '{}' at {}",
            prop.name, layer, prop.span
        ))
    };

    match prop.name.as_str() {
        "position" => {
            if prop.values.len() != 2 {
                return Err(bad_args());
            }
            transform.x = prop.values[0].as_number().ok_or_else(bad_args)?;
            transform.y = prop.values[1].as_number().ok_or_else(bad_args)?;
        }
        "scale" => {
            transform.scale = prop
                .values
                .first()
                .and_then(|v| v.as_number())
                .ok_or_else(bad_args)?;
        }
        "rotation" => {
            transform.rotation = prop
                .values
                .first()
                .and_then(|v| v.as_number())
                .ok_or_else(bad_args)?;
        }
        "opacity" => {
            transform.opacity = prop
                .values
                .first()
                .and_then(|v| v.as_number())
                .ok_or_else(bad_args)?
                .clamp(0.0, 1.0);
        }
        "fit" => {
            let value = prop
                .values
                .first()
                .and_then(|v| v.as_str())
                .ok_or_else(bad_args)?;
            if !matches!(value, "contain" | "cover" | "fill") {
                return Err(ForgeError::Compilation(format!(
                    "unknown fit mode '{}' on layer '{}' at {}",
                    value, layer, prop.span
                )));
            }
            *fit = value.to_string();
        }
        other => {
            return Err(ForgeError::Compilation(format!(
                "unknown property '{}' on layer '{}' at {} (supported: {})",
                other,
                layer,
                prop.span,
                SUPPORTED_PROPERTIES.join(", ")
            )))
        }
    }
    Ok(())
}

fn compile_animation(
    layer: &str,
    anim: &AnimateNode,
    duration_frames: u32,
    warnings: &mut Vec<CompileWarning>,
) -> ForgeResult<CompiledAnimation> {
    if !ANIMATABLE_PROPERTIES.contains(&anim.property.as_str()) {
        return Err(ForgeError::Compilation(format!(
            "property '{}' is not animatable on layer '{}' at {} (supported: {})",
            anim.property,
            layer,
            anim.span,
            ANIMATABLE_PROPERTIES.join(", ")
        )));
    }

    let missing = |what: &str| {
        ForgeError::Compilation(format!(
            "animate({}) on layer '{}' is missing '{}' at {}",
            anim.property, layer, what, anim.span
        ))
    };

    let from = anim
        .arg("from")
        .and_then(|v| v.as_number())
        .ok_or_else(|| missing("from"))?;
    let to = anim
        .arg("to")
        .and_then(|v| v.as_number())
        .ok_or_else(|| missing("to"))?;
    let start_frame = anim
        .arg("start")
        .and_then(|v| v.as_frames())
        .unwrap_or(0);
    let end_frame = anim
        .arg("end")
        .and_then(|v| v.as_frames())
        .ok_or_else(|| missing("end"))?;

    if end_frame < start_frame {
        return Err(ForgeError::Compilation(format!(
            "animate({}) on layer '{}' ends before it starts at {}",
            anim.property, layer, anim.span
        )));
    }
    if end_frame > duration_frames {
        warnings.push(CompileWarning::AnimationPastEnd {
            layer: layer.to_string(),
            end_frame,
            duration_frames,
        });
    }

    let easing = anim
        .arg("easing")
        .and_then(|v| v.as_str())
        .unwrap_or("linear")
        .to_string();

    Ok(CompiledAnimation {
        property: anim.property.clone(),
        from,
        to,
        start_frame,
        end_frame,
        easing,
    })
}

fn named_str<'a>(args: &'a [NamedArg], name: &str) -> Option<&'a str> {
    args.iter().find(|a| a.name == name)?.value.as_str()
}

fn named_number(args: &[NamedArg], name: &str) -> Option<f64> {
    args.iter().find(|a| a.name == name)?.value.as_number()
}

fn named_color(args: &[NamedArg], name: &str) -> Option<String> {
    match &args.iter().find(|a| a.name == name)?.value {
        ValueNode::Color(c) => Some(c.clone()),
        _ => None,
    }
}

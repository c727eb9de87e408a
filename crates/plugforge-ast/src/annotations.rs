//! Annotation value model
//!
//! Annotation arguments are decoded from the syntax tree into a small typed
//! tree so the descriptor parser never has to look at source text.

use ast_grep_core::{Doc, Node};
use plugforge_manifest::errors::SourceLocation;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationValue {
    Str(String),
    Bool(bool),
    Int(i64),
    /// Constant reference such as `Platform.BUKKIT` or `PermissionDefault.OP`
    Symbol(String),
    Array(Vec<AnnotationValue>),
    Annotation(Annotation),
    /// Anything else, kept verbatim for diagnostics
    Other(String),
}

impl AnnotationValue {
    /// Type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            AnnotationValue::Str(_) => "a string",
            AnnotationValue::Bool(_) => "a boolean",
            AnnotationValue::Int(_) => "an integer",
            AnnotationValue::Symbol(_) => "a constant",
            AnnotationValue::Array(_) => "an array",
            AnnotationValue::Annotation(_) => "an annotation",
            AnnotationValue::Other(_) => "an expression",
        }
    }

    /// Last segment of a symbol, e.g. `BUKKIT` for `Platform.BUKKIT`
    pub fn symbol_name(&self) -> Option<&str> {
        match self {
            AnnotationValue::Symbol(path) => path.rsplit('.').next(),
            _ => None,
        }
    }
}

impl fmt::Display for AnnotationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationValue::Str(s) => write!(f, "\"{s}\""),
            AnnotationValue::Bool(b) => write!(f, "{b}"),
            AnnotationValue::Int(i) => write!(f, "{i}"),
            AnnotationValue::Symbol(s) | AnnotationValue::Other(s) => f.write_str(s),
            AnnotationValue::Array(items) => {
                let inner: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "{{{}}}", inner.join(", "))
            }
            AnnotationValue::Annotation(a) => write!(f, "@{}(..)", a.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Simple name (`Plugin` for `@dev.plugforge.Plugin`)
    pub name: String,
    /// Name as written
    pub written_name: String,
    /// Arguments in source order; a lone value is stored under `value`
    pub arguments: Vec<(String, AnnotationValue)>,
    pub line: usize,
}

impl Annotation {
    pub fn get(&self, key: &str) -> Option<&AnnotationValue> {
        self.arguments
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Record,
    AnnotationType,
}

impl TypeKind {
    pub fn from_node_kind(kind: &str) -> Option<Self> {
        match kind {
            "class_declaration" => Some(TypeKind::Class),
            "interface_declaration" => Some(TypeKind::Interface),
            "enum_declaration" => Some(TypeKind::Enum),
            "record_declaration" => Some(TypeKind::Record),
            "annotation_type_declaration" => Some(TypeKind::AnnotationType),
            _ => None,
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TypeKind::Class => "class",
            TypeKind::Interface => "interface",
            TypeKind::Enum => "enum",
            TypeKind::Record => "record",
            TypeKind::AnnotationType => "annotation type",
        })
    }
}

/// A type declaration carrying at least one annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedType {
    pub qualified_name: String,
    pub kind: TypeKind,
    pub is_abstract: bool,
    /// Path relative to the scanned source root
    pub source_file: PathBuf,
    pub line: usize,
    pub annotations: Vec<Annotation>,
}

impl AnnotatedType {
    pub fn annotations_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Annotation> + 'a {
        self.annotations.iter().filter(move |a| a.name == name)
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        self.annotations_named(name).next().is_some()
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.source_file.clone(), self.line)
    }

    pub fn location_of(&self, annotation: &Annotation) -> SourceLocation {
        SourceLocation::new(self.source_file.clone(), annotation.line)
    }
}

// =============================================================================
// DECODING
// =============================================================================

const PUNCTUATION: &[&str] = &["(", ")", "{", "}", ",", "=", "line_comment", "block_comment"];

fn is_punctuation(kind: &str) -> bool {
    PUNCTUATION.contains(&kind)
}

/// 1-based line of a byte offset
pub(crate) fn line_of(content: &str, offset: usize) -> usize {
    content
        .get(..offset)
        .map_or(0, |prefix| prefix.matches('\n').count())
        + 1
}

/// Decode an `annotation` or `marker_annotation` node
pub(crate) fn decode_annotation<D: Doc>(node: &Node<'_, D>, content: &str) -> Option<Annotation> {
    let written_name = node.field("name")?.text().to_string();
    let name = written_name
        .rsplit('.')
        .next()
        .unwrap_or(&written_name)
        .to_string();

    let mut arguments = Vec::new();
    if let Some(list) = node.field("arguments") {
        for child in list.children() {
            let kind = child.kind();
            if is_punctuation(&kind) {
                continue;
            }
            if kind == "element_value_pair" {
                let (Some(key), Some(value)) = (child.field("key"), child.field("value")) else {
                    continue;
                };
                arguments.push((key.text().to_string(), decode_value(&value, content)));
            } else {
                arguments.push(("value".to_string(), decode_value(&child, content)));
            }
        }
    }

    Some(Annotation {
        name,
        written_name,
        arguments,
        line: line_of(content, node.range().start),
    })
}

fn decode_value<D: Doc>(node: &Node<'_, D>, content: &str) -> AnnotationValue {
    let text = node.text();
    match &*node.kind() {
        "string_literal" => AnnotationValue::Str(unquote(&text)),
        "true" => AnnotationValue::Bool(true),
        "false" => AnnotationValue::Bool(false),
        "decimal_integer_literal" | "hex_integer_literal" | "octal_integer_literal"
        | "binary_integer_literal" => parse_int(&text)
            .map(AnnotationValue::Int)
            .unwrap_or_else(|| AnnotationValue::Other(text.to_string())),
        "unary_expression" => {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            parse_int(&compact)
                .map(AnnotationValue::Int)
                .unwrap_or(AnnotationValue::Other(compact))
        }
        "identifier" | "field_access" | "scoped_identifier" => {
            AnnotationValue::Symbol(text.to_string())
        }
        "class_literal" => AnnotationValue::Symbol(text.trim_end_matches(".class").trim().to_string()),
        "element_value_array_initializer" => AnnotationValue::Array(
            node.children()
                .filter(|c| !is_punctuation(&c.kind()))
                .map(|c| decode_value(&c, content))
                .collect(),
        ),
        "annotation" | "marker_annotation" => match decode_annotation(node, content) {
            Some(annotation) => AnnotationValue::Annotation(annotation),
            None => AnnotationValue::Other(text.to_string()),
        },
        "parenthesized_expression" => node
            .children()
            .find(|c| !is_punctuation(&c.kind()))
            .map_or_else(|| AnnotationValue::Other(text.to_string()), |inner| {
                decode_value(&inner, content)
            }),
        // Compile-time string concatenation: "a" + "b"
        "binary_expression" => {
            match (node.field("left"), node.field("right")) {
                (Some(left), Some(right)) => match (decode_value(&left, content), decode_value(&right, content)) {
                    (AnnotationValue::Str(l), AnnotationValue::Str(r)) => AnnotationValue::Str(l + &r),
                    _ => AnnotationValue::Other(text.to_string()),
                },
                _ => AnnotationValue::Other(text.to_string()),
            }
        }
        _ => AnnotationValue::Other(text.to_string()),
    }
}

fn parse_int(text: &str) -> Option<i64> {
    let cleaned: String = text
        .trim_end_matches(['l', 'L'])
        .chars()
        .filter(|c| *c != '_')
        .collect();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse().ok()?
    };
    Some(if negative { -value } else { value })
}

/// Strip quotes from a string literal or text block and resolve escapes
fn unquote(literal: &str) -> String {
    if let Some(inner) = literal
        .strip_prefix("\"\"\"")
        .and_then(|s| s.strip_suffix("\"\"\""))
    {
        let lines: Vec<&str> = inner.lines().map(str::trim).collect();
        return unescape(lines.join("\n").trim());
    }
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal);
    unescape(inner)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('s') => out.push(' '),
            Some('u') => {
                while chars.peek() == Some(&'u') {
                    chars.next();
                }
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(digit @ '0'..='7') => {
                let mut value = digit.to_digit(8).unwrap_or(0);
                while let Some(next) = chars.peek().and_then(|c| c.to_digit(8)) {
                    if value * 8 + next > 0o377 {
                        break;
                    }
                    value = value * 8 + next;
                    chars.next();
                }
                out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

//! Minimal `{{name}}` placeholder engine
//!
//! Templates are parsed once and rendered against a variable map. Unknown
//! placeholders are an error rather than an empty substitution.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated placeholder at byte {offset}")]
    Unterminated { offset: usize },

    #[error("empty placeholder at byte {offset}")]
    Empty { offset: usize },

    #[error("unknown placeholder `{{{{{name}}}}}`")]
    Unknown { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or(TemplateError::Unterminated {
                offset: offset + start,
            })?;
            let name = after[..end].trim();
            if name.is_empty() {
                return Err(TemplateError::Empty {
                    offset: offset + start,
                });
            }
            segments.push(Segment::Placeholder(name.to_string()));

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, vars: &TemplateVars) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = vars.get(name).ok_or_else(|| TemplateError::Unknown {
                        name: name.clone(),
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars(BTreeMap<String, String>);

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Parse and render in one step
pub fn render_str(source: &str, vars: &TemplateVars) -> Result<String, TemplateError> {
    Template::parse(source)?.render(vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_placeholders() {
        let vars = TemplateVars::new()
            .with("plugin_id", "demo")
            .with("class_name", "DemoBukkit");
        assert_eq!(
            render_str("@Plugin(\"{{plugin_id}}\") class {{ class_name }} {}", &vars),
            Ok("@Plugin(\"demo\") class DemoBukkit {}".to_string())
        );
    }

    #[test]
    fn test_single_braces_are_literal() {
        let vars = TemplateVars::new();
        assert_eq!(
            render_str("if (x) { return; }", &vars),
            Ok("if (x) { return; }".to_string())
        );
    }

    #[test]
    fn test_errors() {
        let vars = TemplateVars::new().with("a", "1");
        assert_eq!(
            render_str("x {{a", &vars),
            Err(TemplateError::Unterminated { offset: 2 })
        );
        assert_eq!(
            render_str("{{ }}", &vars),
            Err(TemplateError::Empty { offset: 0 })
        );
        assert_eq!(
            render_str("{{a}}{{b}}", &vars),
            Err(TemplateError::Unknown {
                name: "b".to_string()
            })
        );
    }

    #[test]
    fn test_placeholders_listed_in_order() {
        let Ok(template) = Template::parse("{{b}} and {{a}}") else {
            panic!("template should parse");
        };
        let names: Vec<_> = template.placeholders().collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}

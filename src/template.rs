//! Parsed template set - the compiled artifact.
//!
//! A [`TemplateSet`] is the wholesale-replaced artifact the reload loop
//! publishes: a map from file stem to parsed [`Template`]. Templates are
//! literal text with `{{ name }}` substitution slots.
//!
//! Parsing is strict: an unclosed `{{` or a malformed slot name fails the
//! whole compile. A stray `}}` outside a slot is literal text.

use std::collections::HashMap;
use std::fs;
use std::hash::BuildHasher;
use std::path::Path;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::compiler::CompileError;

/// Substitution failure when rendering a template
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no template named `{0}`")]
    UnknownTemplate(String),

    #[error("template `{template}` references undefined variable `{variable}`")]
    UndefinedVariable { template: String, variable: String },
}

/// One parsed piece of a template
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `{{ name }}` substitution slot
    Slot(String),
}

/// A single parsed template file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse template source text.
    ///
    /// `path` is only used for error reporting.
    pub fn parse(path: &Path, source: &str) -> Result<Self, CompileError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after_open = &rest[open + 2..];
            let Some(close) = after_open.find("}}") else {
                return Err(CompileError::Parse {
                    path: path.to_path_buf(),
                    line: line_of(source, offset + open),
                    message: "unclosed `{{` slot".to_string(),
                });
            };
            let name = after_open[..close].trim();
            if !is_slot_name(name) {
                return Err(CompileError::Parse {
                    path: path.to_path_buf(),
                    line: line_of(source, offset + open),
                    message: format!("invalid slot name `{name}`"),
                });
            }
            segments.push(Segment::Slot(name.to_string()));

            let consumed = open + 2 + close + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Substitute every slot from `vars`.
    fn render<S: BuildHasher>(
        &self,
        name: &str,
        vars: &HashMap<String, String, S>,
    ) -> Result<String, RenderError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(slot) => match vars.get(slot) {
                    Some(value) => out.push_str(value),
                    None => {
                        return Err(RenderError::UndefinedVariable {
                            template: name.to_string(),
                            variable: slot.clone(),
                        });
                    }
                },
            }
        }
        Ok(out)
    }

    /// Slot names referenced by this template, in order of appearance.
    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Slot(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }
}

/// The compiled artifact: every template in the watched directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateSet {
    templates: FxHashMap<String, Template>,
}

impl TemplateSet {
    /// An empty set, the usual placeholder before the first compile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Full recompile of every regular file directly under `dir`.
    ///
    /// Single flat directory: subdirectories are ignored, editor temp and
    /// backup files are skipped. Any file that fails to read or parse fails
    /// the whole compile.
    pub fn compile_dir(dir: &Path) -> Result<Self, CompileError> {
        let entries = fs::read_dir(dir).map_err(|source| CompileError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut templates = FxHashMap::default();
        for entry in entries {
            let entry = entry.map_err(|source| CompileError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() || is_temp_file(&path) {
                continue;
            }

            let source = fs::read_to_string(&path).map_err(|source| CompileError::Io {
                path: path.clone(),
                source,
            })?;
            let template = Template::parse(&path, &source)?;
            templates.insert(template_name(&path), template);
        }

        Ok(Self { templates })
    }

    /// Render the named template against `vars`. Any hasher works, so both
    /// `std::collections::HashMap` and `FxHashMap` variable maps are fine.
    pub fn render<S: BuildHasher>(
        &self,
        name: &str,
        vars: &HashMap<String, String, S>,
    ) -> Result<String, RenderError> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| RenderError::UnknownTemplate(name.to_string()))?;
        template.render(name, vars)
    }

    /// Look up a template by name.
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// Template names in the set (unordered).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Template name: file stem, falling back to the full file name.
fn template_name(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Check if path is a temp/backup file (editor artifacts)
pub(crate) fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// `[A-Za-z_][A-Za-z0-9_.]*`
fn is_slot_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// 1-based line number of byte `offset` in `source`
fn line_of(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count() + 1
}

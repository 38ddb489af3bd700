//! Compiler collaborator contract.
//!
//! Pure full-directory compilation, no loop machinery and no side effects on
//! the directory. The coordinator only sees this seam, so any artifact type
//! can ride the reload loop; [`TemplateCompiler`] is the built-in
//! implementation producing a [`TemplateSet`].

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::template::TemplateSet;

/// Compilation failure for a directory of sources
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("IO error when reading `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in `{path}` (line {line}): {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// Turn the full current contents of a directory into a fresh artifact.
///
/// Contract: synchronous, pure (no side effects on the directory), and
/// always a whole-directory compile - the output is consistent with on-disk
/// state at invocation time, never a partial patch of a previous artifact.
pub trait Compile {
    type Artifact;

    fn compile(&self, dir: &Path) -> Result<Self::Artifact, CompileError>;
}

/// Built-in compiler: the watched directory is a flat set of template files.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateCompiler;

impl Compile for TemplateCompiler {
    type Artifact = TemplateSet;

    fn compile(&self, dir: &Path) -> Result<TemplateSet, CompileError> {
        TemplateSet::compile_dir(dir)
    }
}

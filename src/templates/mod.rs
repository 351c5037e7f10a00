//! Template-backed document source.
//!
//! Every `*.template` file in a directory is registered under its file name
//! and rendered with Jinja syntax. Helper functions for fake data live in
//! [`functions`].

use minijinja::{context, Environment, UndefinedBehavior};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub mod functions;

pub const TEMPLATE_EXTENSION: &str = "template";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("cannot read templates from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no *.template files found in {0}")]
    NoTemplates(PathBuf),
    #[error("failed to parse template '{name}': {source}")]
    Parse {
        name: String,
        #[source]
        source: minijinja::Error,
    },
    #[error("failed to render template '{name}': {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },
    #[error("render of template '{name}' did not complete: {reason}")]
    RenderAborted { name: String, reason: String },
}

/// Turns a template name into a rendered payload.
pub trait DocumentSource: Send + Sync {
    fn render(&self, name: &str) -> Result<String, TemplateError>;
}

pub struct TemplateRenderer {
    env: Environment<'static>,
    names: Vec<String>,
}

impl TemplateRenderer {
    /// Load every `*.template` file in `directory`.
    pub fn load(directory: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let directory = directory.as_ref();
        let io_err = |source| TemplateError::Io {
            path: directory.to_path_buf(),
            source,
        };

        let mut sources = Vec::new();
        for entry in std::fs::read_dir(directory).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let source = std::fs::read_to_string(&path).map_err(|source| TemplateError::Io {
                path: path.clone(),
                source,
            })?;
            sources.push((name, source));
        }

        if sources.is_empty() {
            return Err(TemplateError::NoTemplates(directory.to_path_buf()));
        }

        let renderer = Self::from_sources(sources)?;
        info!(directory = %directory.display(), templates = ?renderer.names, "templates loaded");
        Ok(renderer)
    }

    /// Build a renderer from in-memory `(name, source)` pairs.
    pub fn from_sources<N, S>(sources: impl IntoIterator<Item = (N, S)>) -> Result<Self, TemplateError>
    where
        N: Into<String>,
        S: Into<String>,
    {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        functions::register(&mut env);

        let mut names = Vec::new();
        for (name, source) in sources {
            let name = name.into();
            env.add_template_owned(name.clone(), source.into())
                .map_err(|source| TemplateError::Parse {
                    name: name.clone(),
                    source,
                })?;
            names.push(name);
        }
        names.sort();
        Ok(Self { env, names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl DocumentSource for TemplateRenderer {
    fn render(&self, name: &str) -> Result<String, TemplateError> {
        let render_err = |source| TemplateError::Render {
            name: name.to_string(),
            source,
        };
        self.env
            .get_template(name)
            .map_err(render_err)?
            .render(context! { template => name })
            .map_err(render_err)
    }
}

//! Script detection and dispatch of queries to per-script language spaces

use crate::error::{Result, RetrieverError};
use crate::retrieval::pipeline::RetrievalPipeline;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const UNSUPPORTED_LANGUAGE_MESSAGE: &str = "Language not supported or could not be determined.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    Devanagari,
    Latin,
    Unknown,
}

impl std::fmt::Display for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Script::Devanagari => "devanagari",
            Script::Latin => "latin",
            Script::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

fn is_devanagari(c: char) -> bool {
    ('\u{0900}'..='\u{097F}').contains(&c)
}

/// Detect the script of `text`.
///
/// Any Devanagari character makes the text Devanagari, regardless of how many
/// Latin letters it also contains. Otherwise any ASCII letter makes it Latin.
pub fn detect_script(text: &str) -> Script {
    let (devanagari, latin) = text.chars().fold((0usize, 0usize), |(d, l), c| {
        if is_devanagari(c) {
            (d + 1, l)
        } else if c.is_ascii_alphabetic() {
            (d, l + 1)
        } else {
            (d, l)
        }
    });

    if devanagari > 0 {
        Script::Devanagari
    } else if latin > 0 {
        Script::Latin
    } else {
        Script::Unknown
    }
}

/// One script's embedding space: its pipeline and where its artifact lives
#[derive(Debug)]
pub struct LanguageSpace {
    pub name: String,
    pub script: Script,
    pub pipeline: RetrievalPipeline,
    pub index_path: PathBuf,
    pub chunks_path: PathBuf,
}

impl LanguageSpace {
    pub fn new(
        name: impl Into<String>,
        script: Script,
        pipeline: RetrievalPipeline,
        index_path: impl Into<PathBuf>,
        chunks_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            script,
            pipeline,
            index_path: index_path.into(),
            chunks_path: chunks_path.into(),
        }
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn chunks_path(&self) -> &Path {
        &self.chunks_path
    }
}

/// Result of routing a query
#[derive(Debug)]
pub enum Route<'a> {
    Space(&'a LanguageSpace),
    Unsupported,
}

impl Route<'_> {
    /// The space, or [`RetrieverError::UnsupportedLanguage`].
    pub fn space(&self) -> Result<&LanguageSpace> {
        match self {
            Route::Space(space) => Ok(space),
            Route::Unsupported => Err(RetrieverError::UnsupportedLanguage),
        }
    }
}

/// Fixed mapping from script to language space, set up once at startup
#[derive(Debug, Default)]
pub struct LanguageRouter {
    spaces: Vec<LanguageSpace>,
}

impl LanguageRouter {
    /// # Errors
    /// [`RetrieverError::Config`] if a space is bound to [`Script::Unknown`] or
    /// two spaces share a script.
    pub fn new(spaces: Vec<LanguageSpace>) -> Result<Self> {
        for (i, space) in spaces.iter().enumerate() {
            if space.script == Script::Unknown {
                return Err(RetrieverError::Config(format!(
                    "space '{}' cannot be bound to the unknown script",
                    space.name
                )));
            }
            if let Some(other) = spaces[..i].iter().find(|s| s.script == space.script) {
                return Err(RetrieverError::Config(format!(
                    "spaces '{}' and '{}' are both bound to {}",
                    other.name, space.name, space.script
                )));
            }
        }
        Ok(Self { spaces })
    }

    pub fn route(&self, text: &str) -> Route<'_> {
        let script = detect_script(text);
        match self.space_for(script) {
            Some(space) => Route::Space(space),
            None => {
                tracing::debug!("No language space for script {}", script);
                Route::Unsupported
            }
        }
    }

    pub fn space_for(&self, script: Script) -> Option<&LanguageSpace> {
        self.spaces.iter().find(|s| s.script == script)
    }

    pub fn spaces(&self) -> &[LanguageSpace] {
        &self.spaces
    }

    pub fn spaces_mut(&mut self) -> &mut [LanguageSpace] {
        &mut self.spaces
    }
}

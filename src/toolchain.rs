//! Language toolchains: which image, which file, which commands.
//!
//! The pipeline never branches on language. Everything language-specific lives
//! in the rows built by [`Registry::with_defaults`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Cpp,
    Java,
    Python,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Cpp, Language::Java, Language::Python];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::Python => "python",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpp" => Ok(Language::Cpp),
            "java" => Ok(Language::Java),
            "python" => Ok(Language::Python),
            other => Err(Error::UnsupportedLanguage(other.to_string())),
        }
    }
}

/// Shell command lines run inside the container's `/app` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Steps {
    Compiled { compile: String, run: String },
    Interpreted { run: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainSpec {
    pub language: Language,
    pub image: String,
    pub source_filename: String,
    pub steps: Steps,
}

impl ToolchainSpec {
    pub fn compile_command(&self) -> Option<&str> {
        match &self.steps {
            Steps::Compiled { compile, .. } => Some(compile),
            Steps::Interpreted { .. } => None,
        }
    }

    pub fn run_command(&self) -> &str {
        match &self.steps {
            Steps::Compiled { run, .. } | Steps::Interpreted { run } => run,
        }
    }
}

/// Read-only after startup.
#[derive(Debug, Clone)]
pub struct Registry {
    specs: HashMap<Language, ToolchainSpec>,
}

impl Registry {
    pub fn with_defaults() -> Self {
        let rows = [
            ToolchainSpec {
                language: Language::Cpp,
                image: "cpp-toolbox".to_string(),
                source_filename: "main.cpp".to_string(),
                steps: Steps::Compiled {
                    compile: "g++ main.cpp -o main".to_string(),
                    run: "./main".to_string(),
                },
            },
            ToolchainSpec {
                language: Language::Java,
                image: "java-toolbox".to_string(),
                source_filename: "Main.java".to_string(),
                steps: Steps::Compiled {
                    compile: "javac Main.java".to_string(),
                    run: "java Main".to_string(),
                },
            },
            ToolchainSpec {
                language: Language::Python,
                image: "python-toolbox".to_string(),
                source_filename: "main.py".to_string(),
                steps: Steps::Interpreted {
                    run: "python3 main.py".to_string(),
                },
            },
        ];

        Self {
            specs: rows.into_iter().map(|s| (s.language, s)).collect(),
        }
    }

    /// Replace the container image of one language. Commands stay fixed.
    pub fn with_image(mut self, language: Language, image: impl Into<String>) -> Self {
        if let Some(spec) = self.specs.get_mut(&language) {
            spec.image = image.into();
        }
        self
    }

    pub fn get(&self, language: Language) -> Option<&ToolchainSpec> {
        self.specs.get(&language)
    }

    /// Look up a toolchain by its wire tag.
    pub fn resolve(&self, tag: &str) -> Result<&ToolchainSpec, Error> {
        let language: Language = tag.parse()?;
        self.get(language)
            .ok_or_else(|| Error::UnsupportedLanguage(tag.to_string()))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

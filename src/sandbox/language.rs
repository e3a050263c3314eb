//! Supported sandbox languages

use std::fmt;

use serde::{Deserialize, Serialize};

/// A language the sandbox knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    Shell,
    Ruby,
    Go,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Python,
        Language::JavaScript,
        Language::Shell,
        Language::Ruby,
        Language::Go,
    ];

    /// The language used when a tool call does not name one
    pub const DEFAULT: Language = Language::Python;

    /// Parse a language tag, accepting common aliases
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "python" | "python3" | "py" => Some(Language::Python),
            "javascript" | "js" | "node" => Some(Language::JavaScript),
            "shell" | "bash" | "sh" => Some(Language::Shell),
            "ruby" | "rb" => Some(Language::Ruby),
            "go" | "golang" => Some(Language::Go),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Shell => "shell",
            Language::Ruby => "ruby",
            Language::Go => "go",
        }
    }

    /// File name the source is written to before execution
    pub fn file_name(&self) -> &'static str {
        match self {
            Language::Python => "main.py",
            Language::JavaScript => "main.js",
            Language::Shell => "main.sh",
            Language::Ruby => "main.rb",
            Language::Go => "main.go",
        }
    }

    /// Program and leading arguments; the source file path is appended
    pub fn interpreter(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["python3", "-u"],
            Language::JavaScript => &["node"],
            Language::Shell => &["sh"],
            Language::Ruby => &["ruby"],
            Language::Go => &["go", "run"],
        }
    }

    /// Program reading its source from stdin, for persistent isolates
    pub fn stdin_interpreter(&self) -> Option<&'static [&'static str]> {
        match self {
            Language::Python => Some(&["python3", "-u", "-"]),
            Language::Shell => Some(&["sh", "-s"]),
            _ => None,
        }
    }

    /// Whether this language runs in the long-lived persistent isolate
    ///
    /// Only the default language does; shell commands run ephemerally in
    /// the agent's own working directory.
    pub fn uses_persistent(&self) -> bool {
        *self == Language::DEFAULT
    }

    /// Comma separated list for error messages
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        assert_eq!(Language::parse("Python3"), Some(Language::Python));
        assert_eq!(Language::parse("node"), Some(Language::JavaScript));
        assert_eq!(Language::parse(" bash "), Some(Language::Shell));
        assert_eq!(Language::parse("golang"), Some(Language::Go));
        assert_eq!(Language::parse("cobol"), None);
    }

    #[test]
    fn test_persistent_languages() {
        assert!(Language::Python.uses_persistent());
        assert!(!Language::Shell.uses_persistent());
        assert!(!Language::Go.uses_persistent());
        assert!(!Language::JavaScript.uses_persistent());
    }

    #[test]
    fn test_supported_list() {
        assert_eq!(Language::supported_list(), "python, javascript, shell, ruby, go");
    }
}

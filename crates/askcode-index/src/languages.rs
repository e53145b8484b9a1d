//! Language tags derived from file extensions.

use std::path::Path;

/// Language tag attached to each chunk and used as the snippet fence label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    Python,
    JavaScript,
    TypeScript,
    Go,
    Rust,
    Java,
    Kotlin,
    C,
    Cpp,
    ObjectiveC,
    ObjectiveCpp,
    CSharp,
    Php,
    Ruby,
    Swift,
    Scala,
    Sql,
    Bash,
    PowerShell,
    Yaml,
    Toml,
    Ini,
    Json,
    Markdown,
    Text,
    Vue,
    Css,
    Scss,
    Html,
}

impl Lang {
    pub const ALL: [Self; 29] = [
        Self::Python,
        Self::JavaScript,
        Self::TypeScript,
        Self::Go,
        Self::Rust,
        Self::Java,
        Self::Kotlin,
        Self::C,
        Self::Cpp,
        Self::ObjectiveC,
        Self::ObjectiveCpp,
        Self::CSharp,
        Self::Php,
        Self::Ruby,
        Self::Swift,
        Self::Scala,
        Self::Sql,
        Self::Bash,
        Self::PowerShell,
        Self::Yaml,
        Self::Toml,
        Self::Ini,
        Self::Json,
        Self::Markdown,
        Self::Text,
        Self::Vue,
        Self::Css,
        Self::Scss,
        Self::Html,
    ];

    /// Identifier stored in the metadata table.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Java => "java",
            Self::Kotlin => "kotlin",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::ObjectiveC => "objective-c",
            Self::ObjectiveCpp => "objective-cpp",
            Self::CSharp => "csharp",
            Self::Php => "php",
            Self::Ruby => "ruby",
            Self::Swift => "swift",
            Self::Scala => "scala",
            Self::Sql => "sql",
            Self::Bash => "bash",
            Self::PowerShell => "powershell",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Ini => "ini",
            Self::Json => "json",
            Self::Markdown => "markdown",
            Self::Text => "text",
            Self::Vue => "vue",
            Self::Css => "css",
            Self::Scss => "scss",
            Self::Html => "html",
        }
    }

    /// Inverse of [`Lang::id`]. Unknown identifiers yield `None`.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|lang| lang.id() == id)
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Detect language from file extension (case-insensitive).
#[must_use]
pub fn detect_language(path: &Path) -> Option<Lang> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "py" => Some(Lang::Python),
        "js" | "jsx" => Some(Lang::JavaScript),
        "ts" | "tsx" => Some(Lang::TypeScript),
        "go" => Some(Lang::Go),
        "rs" => Some(Lang::Rust),
        "java" => Some(Lang::Java),
        "kt" => Some(Lang::Kotlin),
        "c" | "h" => Some(Lang::C),
        "cpp" | "cc" | "hpp" => Some(Lang::Cpp),
        "m" => Some(Lang::ObjectiveC),
        "mm" => Some(Lang::ObjectiveCpp),
        "cs" => Some(Lang::CSharp),
        "php" => Some(Lang::Php),
        "rb" => Some(Lang::Ruby),
        "swift" => Some(Lang::Swift),
        "scala" => Some(Lang::Scala),
        "sql" => Some(Lang::Sql),
        "sh" | "bash" | "zsh" => Some(Lang::Bash),
        "ps1" => Some(Lang::PowerShell),
        "yml" | "yaml" => Some(Lang::Yaml),
        "toml" => Some(Lang::Toml),
        "ini" | "cfg" => Some(Lang::Ini),
        "json" | "ipynb" => Some(Lang::Json),
        "md" => Some(Lang::Markdown),
        "txt" => Some(Lang::Text),
        "vue" => Some(Lang::Vue),
        "css" => Some(Lang::Css),
        "scss" => Some(Lang::Scss),
        "html" => Some(Lang::Html),
        _ => None,
    }
}

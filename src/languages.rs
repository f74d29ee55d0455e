//! File-extension to language mapping.
//!
//! Used by the push enrichment path (language hint for the code-insight
//! collaborator) and by the read aggregator's language histogram. The table
//! covers the source languages students submit on the platform; anything else
//! returns `None` and is skipped by both consumers.

/// Returns the language for a file path based on its extension, or `None`
/// for paths that are not recognized source code.
pub fn language_for_path(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.').map(|(_, e)| e)?;
    let language = match ext {
        "java" => "Java",
        "rs" => "Rust",
        "py" => "Python",
        "js" | "jsx" => "JavaScript",
        "ts" | "tsx" => "TypeScript",
        "c" | "h" => "C",
        "cpp" | "cc" | "cxx" | "hpp" => "C++",
        "cs" => "C#",
        "go" => "Go",
        "rb" => "Ruby",
        "php" => "PHP",
        "swift" => "Swift",
        "kt" | "kts" => "Kotlin",
        "scala" => "Scala",
        "sql" => "SQL",
        "html" => "HTML",
        "css" => "CSS",
        "sh" => "Shell",
        _ => return None,
    };
    Some(language)
}

/// Returns true if the path has a recognized source-code extension.
pub fn is_source_file(path: &str) -> bool {
    language_for_path(path).is_some()
}

//! Markdown document loading.
//!
//! Walks a docs tree for Markdown files and turns each into a [`Document`]:
//! YAML front-matter is parsed for `title` and `tag`/`tags` and stripped from
//! the body, HTML comments and self-closing components are removed, and the
//! language/category facets are derived from the path relative to the root.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::chunker::parse_headers;
use crate::error::{Error, Result};
use crate::types::Document;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// File extensions treated as documents, without the dot.
    pub extensions: Vec<String>,
    /// Directory names that mark a translated subtree (e.g. `docs/zh/...`).
    pub language_dirs: Vec<String>,
    /// Recognized category directories, matched at any depth. Empty accepts
    /// the first non-language directory.
    pub categories: Vec<String>,
    pub default_language: String,
    pub default_category: String,
    /// Skip `README.md` at the root or directly under a language directory.
    pub skip_root_readme: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["md".to_string()],
            language_dirs: vec!["zh".to_string()],
            categories: ["grammar", "blueprints", "libs", "guide", "toolchain", "others"].map(String::from).to_vec(),
            default_language: "en".to_string(),
            default_category: "general".to_string(),
            skip_root_readme: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    title: Option<String>,
    #[serde(alias = "tags")]
    tag: Option<Tags>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Tags {
    One(String),
    Many(Vec<String>),
}

impl Tags {
    fn into_vec(self) -> Vec<String> {
        match self {
            Tags::One(tag) => vec![tag],
            Tags::Many(tags) => tags,
        }
    }
}

/// Split leading `---` delimited front-matter from the body.
fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content.strip_prefix("---") else { return (None, content) };
    match rest.find("\n---") {
        Some(end) => {
            let body = &rest[end + 4..];
            let body = body.split_once('\n').map_or("", |(_, tail)| tail);
            (Some(rest[..end].trim()), body)
        }
        None => (None, content),
    }
}

fn parse_frontmatter(yaml: &str, path: &Path) -> FrontMatter {
    if yaml.is_empty() {
        return FrontMatter::default();
    }
    match serde_norway::from_str::<FrontMatter>(yaml) {
        Ok(fm) => fm,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed front-matter");
            FrontMatter::default()
        }
    }
}

fn cleanup_patterns() -> &'static [(Regex, &'static str); 3] {
    static PATTERNS: OnceLock<[(Regex, &'static str); 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (Regex::new(r"(?s)<!--.*?-->").expect("comment pattern"), ""),
            (Regex::new(r"<[^<>\n]*?/>").expect("component pattern"), ""),
            (Regex::new(r"\n\s*\n\s*\n").expect("blank-run pattern"), "\n\n"),
        ]
    })
}

/// Remove HTML comments and self-closing components, collapse blank-line runs.
pub fn clean_content(content: &str) -> String {
    let mut out = content.to_string();
    for (pattern, replacement) in cleanup_patterns() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out.trim().to_string()
}

/// Stable document id for a path relative to the docs root.
pub fn document_id(relative: &Path) -> String {
    let key = relative.to_string_lossy().replace('\\', "/");
    blake3::hash(key.as_bytes()).to_hex()[..16].to_string()
}

/// Corpus summary: per-facet document counts and content length in characters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentStats {
    pub total_documents: usize,
    pub languages: BTreeMap<String, usize>,
    pub categories: BTreeMap<String, usize>,
    pub total_content_length: usize,
    pub average_content_length: f64,
}

impl DocumentStats {
    pub fn from_documents(documents: &[Document]) -> Self {
        let mut stats = Self { total_documents: documents.len(), ..Self::default() };
        for doc in documents {
            *stats.languages.entry(doc.language.clone()).or_default() += 1;
            *stats.categories.entry(doc.category.clone()).or_default() += 1;
            stats.total_content_length += doc.content.chars().count();
        }
        if !documents.is_empty() {
            stats.average_content_length = stats.total_content_length as f64 / documents.len() as f64;
        }
        stats
    }
}

#[derive(Debug, Clone)]
pub struct DocumentLoader {
    root: PathBuf,
    config: LoaderConfig,
}

/// Outcome of loading a tree: parsed documents plus per-file failures.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub failures: Vec<(PathBuf, String)>,
}

impl DocumentLoader {
    pub fn new(root: impl Into<PathBuf>, config: LoaderConfig) -> Self {
        Self { root: root.into(), config }
    }

    pub fn root(&self) -> &Path { &self.root }

    /// Sorted list of document files under the root.
    pub fn find_files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(Error::NotFound(format!("docs directory {}", self.root.display())));
        }
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            let matches_ext = path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| self.config.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
            if !matches_ext {
                continue;
            }
            if self.config.skip_root_readme && self.is_root_readme(path) {
                debug!(path = %path.display(), "skipping root README");
                continue;
            }
            files.push(path.to_path_buf());
        }
        files.sort();
        Ok(files)
    }

    /// Load every document, collecting unreadable files instead of aborting.
    pub fn load_all(&self) -> Result<LoadReport> {
        let files = self.find_files()?;
        info!(root = %self.root.display(), files = files.len(), "loading documents");
        let mut report = LoadReport::default();
        for path in files {
            match self.load_file(&path) {
                Ok(doc) => report.documents.push(doc),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load document");
                    report.failures.push((path, e.to_string()));
                }
            }
        }
        info!(loaded = report.documents.len(), failed = report.failures.len(), "document loading finished");
        Ok(report)
    }

    pub fn load_file(&self, path: &Path) -> Result<Document> {
        let raw = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => String::from_utf8_lossy(&fs::read(path)?).to_string(),
        };
        Ok(self.parse(&raw, path))
    }

    /// Build a document from raw file content.
    pub fn parse(&self, raw: &str, path: &Path) -> Document {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let (yaml, body) = split_frontmatter(raw);
        let frontmatter = yaml.map(|y| parse_frontmatter(y, path)).unwrap_or_default();
        let content = clean_content(body);

        let title = frontmatter
            .title
            .filter(|t| !t.trim().is_empty())
            .or_else(|| parse_headers(&content).into_iter().next().map(|h| h.text))
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().to_string()))
            .unwrap_or_else(|| "Untitled".to_string());
        let tags = frontmatter.tag.map(Tags::into_vec).unwrap_or_default();

        Document::new(document_id(relative), title, content)
            .with_language(self.language_of(relative))
            .with_category(self.category_of(relative))
            .with_tags(tags)
            .with_source_path(path.to_string_lossy())
    }

    fn dir_names(relative: &Path) -> Vec<String> {
        let parent = relative.parent().unwrap_or_else(|| Path::new(""));
        parent
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().to_string()),
                _ => None,
            })
            .collect()
    }

    fn language_of(&self, relative: &Path) -> String {
        Self::dir_names(relative)
            .into_iter()
            .find(|d| self.config.language_dirs.contains(d))
            .unwrap_or_else(|| self.config.default_language.clone())
    }

    fn category_of(&self, relative: &Path) -> String {
        Self::dir_names(relative)
            .into_iter()
            .find(|d| {
                if self.config.categories.is_empty() {
                    !self.config.language_dirs.contains(d)
                } else {
                    self.config.categories.contains(d)
                }
            })
            .unwrap_or_else(|| self.config.default_category.clone())
    }

    fn is_root_readme(&self, path: &Path) -> bool {
        let is_readme = path.file_name().is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case("readme.md"));
        if !is_readme {
            return false;
        }
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let dirs = Self::dir_names(relative);
        dirs.is_empty() || (dirs.len() == 1 && self.config.language_dirs.contains(&dirs[0]))
    }
}

//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the path given with `-f`), then applies `IMAGE_CATE_LOG_LEVEL`,
//! `IMAGE_CATE_IMAGE_FOLDER` and `IMAGE_CATE_MANIFEST_URL` overrides.
//! Secrets (`LLM_API_KEY`, `GITHUB_TOKEN`, `MANIFEST_TOKEN`) are only ever
//! read from the environment.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Classification run settings (`[classify]`).
#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    /// Folder scanned for images (already expanded, no `~`).
    pub image_folder: Option<PathBuf>,
    /// Allowed category names, in configured order.
    pub categories: Vec<String>,
    /// Starting sequence numbers, positionally aligned with `categories`.
    pub start_offsets: Vec<u64>,
    /// Lower-case extensions (no dot) treated as images.
    pub extensions: Vec<String>,
    /// Instruction template; built-in template is used when the file is missing.
    pub prompt_file: PathBuf,
}

/// Gemini `generateContent` provider configuration (`[llm.gemini]`).
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_base_url: String,
    /// Replaces `api_base_url`; the key is then also sent as a bearer token.
    pub custom_base_url: Option<String>,
    pub model: String,
    pub timeout_seconds: u64,
    pub proxy_url: Option<String>,
}

/// OpenAI / OpenAI-compatible provider configuration (`[llm.openai]`).
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    pub proxy_url: Option<String>,
}

/// LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"gemini"`, `"openai"`, `"dummy"`).
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
    pub gemini: GeminiConfig,
    pub openai: OpenAiConfig,
}

/// Remote content store configuration (`[github]`).
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// `owner/repo`, or `dummy` for an in-memory store.
    pub repo: Option<String>,
    /// Directory inside the repository that receives category folders.
    pub upload_dir: String,
    pub api_base_url: String,
    pub timeout_seconds: u64,
}

/// Retrieval service configuration (`[retrieval]`).
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// http(s) URL or local path of the category → URL-list manifest.
    pub manifest_url: Option<String>,
    pub timeout_seconds: u64,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub classify: ClassifyConfig,
    pub llm: LlmConfig,
    pub github: GitHubConfig,
    pub retrieval: RetrievalConfig,
    /// From `LLM_API_KEY`. Never sourced from TOML.
    pub llm_api_key: Option<String>,
    /// From `GITHUB_TOKEN`. Never sourced from TOML.
    pub github_token: Option<String>,
    /// From `MANIFEST_TOKEN`. Never sourced from TOML.
    pub manifest_token: Option<String>,
}

/// Env-derived values applied on top of the TOML file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub log_level: Option<String>,
    pub image_folder: Option<String>,
    pub manifest_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub github_token: Option<String>,
    pub manifest_token: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            log_level: non_empty_env("IMAGE_CATE_LOG_LEVEL"),
            image_folder: non_empty_env("IMAGE_CATE_IMAGE_FOLDER"),
            manifest_url: non_empty_env("IMAGE_CATE_MANIFEST_URL"),
            llm_api_key: non_empty_env("LLM_API_KEY"),
            github_token: non_empty_env("GITHUB_TOKEN"),
            manifest_token: non_empty_env("MANIFEST_TOKEN"),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Raw TOML shape, deserialized before resolution.
#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    general: RawGeneral,
    #[serde(default)]
    classify: RawClassify,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    github: RawGitHub,
    #[serde(default)]
    retrieval: RawRetrieval,
}

#[derive(Deserialize)]
struct RawGeneral {
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawGeneral {
    fn default() -> Self {
        Self { log_level: default_log_level() }
    }
}

/// A list written either as a TOML array or as one comma-separated string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawList<T> {
    Items(Vec<T>),
    Csv(String),
}

impl<T> Default for RawList<T> {
    fn default() -> Self {
        RawList::Items(Vec::new())
    }
}

#[derive(Deserialize)]
struct RawClassify {
    #[serde(default)]
    image_folder: Option<String>,
    #[serde(default)]
    categories: RawList<String>,
    #[serde(default)]
    start_offsets: RawList<u64>,
    #[serde(default = "default_extensions")]
    extensions: Vec<String>,
    #[serde(default = "default_prompt_file")]
    prompt_file: String,
}

impl Default for RawClassify {
    fn default() -> Self {
        Self {
            image_folder: None,
            categories: RawList::default(),
            start_offsets: RawList::default(),
            extensions: default_extensions(),
            prompt_file: default_prompt_file(),
        }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    gemini: RawGeminiConfig,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            gemini: RawGeminiConfig::default(),
            openai: RawOpenAiConfig::default(),
        }
    }
}

#[derive(Deserialize)]
struct RawGeminiConfig {
    #[serde(default = "default_gemini_api_base_url")]
    api_base_url: String,
    #[serde(default)]
    custom_base_url: Option<String>,
    #[serde(default = "default_gemini_model")]
    model: String,
    #[serde(default = "default_llm_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default)]
    proxy_url: Option<String>,
}

impl Default for RawGeminiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_gemini_api_base_url(),
            custom_base_url: None,
            model: default_gemini_model(),
            timeout_seconds: default_llm_timeout_seconds(),
            proxy_url: None,
        }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_llm_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default)]
    proxy_url: Option<String>,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_llm_timeout_seconds(),
            proxy_url: None,
        }
    }
}

#[derive(Deserialize)]
struct RawGitHub {
    #[serde(default)]
    repo: Option<String>,
    #[serde(default)]
    upload_dir: String,
    #[serde(default = "default_github_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_http_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawGitHub {
    fn default() -> Self {
        Self {
            repo: None,
            upload_dir: String::new(),
            api_base_url: default_github_api_base_url(),
            timeout_seconds: default_http_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawRetrieval {
    #[serde(default)]
    manifest_url: Option<String>,
    #[serde(default = "default_http_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawRetrieval {
    fn default() -> Self {
        Self { manifest_url: None, timeout_seconds: default_http_timeout_seconds() }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_extensions() -> Vec<String> { vec!["jpg".into(), "jpeg".into(), "png".into()] }
fn default_prompt_file() -> String { "config/prompts/classify.txt".to_string() }
fn default_llm_provider() -> String { "gemini".to_string() }
fn default_gemini_api_base_url() -> String { "https://generativelanguage.googleapis.com".to_string() }
fn default_gemini_model() -> String { "gemini-2.5-flash".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_temperature() -> f32 { 0.0 }
fn default_llm_timeout_seconds() -> u64 { 300 }
fn default_github_api_base_url() -> String { "https://api.github.com".to_string() }
fn default_http_timeout_seconds() -> u64 { 60 }

/// Load config from `path` (or `config/default.toml`), then apply env overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let path = Path::new(path.unwrap_or(DEFAULT_CONFIG_PATH));
    load_from(path, Overrides::from_env())
}

/// Loader with an explicit path and overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(path: &Path, overrides: Overrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
    parse(&raw, overrides)
        .map_err(|e| match e {
            AppError::Config(msg) => AppError::Config(format!("{msg} in {}", path.display())),
            other => other,
        })
}

/// Resolve a TOML document into a [`Config`].
pub fn parse(toml_text: &str, overrides: Overrides) -> Result<Config, AppError> {
    let parsed: RawConfig = toml::from_str(toml_text)
        .map_err(|e| AppError::Config(format!("parse error: {e}")))?;

    let log_level = overrides.log_level.unwrap_or(parsed.general.log_level);

    let c = parsed.classify;
    let image_folder = overrides
        .image_folder
        .or(c.image_folder)
        .filter(|s| !s.trim().is_empty())
        .map(|s| expand_home(&s));
    let categories: Vec<String> = match c.categories {
        RawList::Items(items) => items.into_iter().map(|s| s.trim().to_string()).collect(),
        RawList::Csv(s) => split_csv(&s),
    }
    .into_iter()
    .filter(|s| !s.is_empty())
    .collect();
    let start_offsets = match c.start_offsets {
        RawList::Items(items) => items,
        // Unparsable entries count as 0, keeping positions aligned.
        RawList::Csv(s) => split_csv(&s).iter().map(|v| v.parse::<u64>().unwrap_or(0)).collect(),
    };
    let extensions = c
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    let g = parsed.llm.gemini;
    let o = parsed.llm.openai;

    Ok(Config {
        log_level,
        classify: ClassifyConfig {
            image_folder,
            categories,
            start_offsets,
            extensions,
            prompt_file: expand_home(&c.prompt_file),
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            gemini: GeminiConfig {
                api_base_url: g.api_base_url,
                custom_base_url: g.custom_base_url.filter(|s| !s.trim().is_empty()),
                model: g.model,
                timeout_seconds: g.timeout_seconds,
                proxy_url: g.proxy_url.filter(|s| !s.trim().is_empty()),
            },
            openai: OpenAiConfig {
                api_base_url: o.api_base_url,
                model: o.model,
                temperature: o.temperature,
                timeout_seconds: o.timeout_seconds,
                proxy_url: o.proxy_url.filter(|s| !s.trim().is_empty()),
            },
        },
        github: GitHubConfig {
            repo: parsed.github.repo.filter(|s| !s.trim().is_empty()),
            upload_dir: parsed.github.upload_dir,
            api_base_url: parsed.github.api_base_url,
            timeout_seconds: parsed.github.timeout_seconds,
        },
        retrieval: RetrievalConfig {
            manifest_url: overrides
                .manifest_url
                .or(parsed.retrieval.manifest_url)
                .filter(|s| !s.trim().is_empty()),
            timeout_seconds: parsed.retrieval.timeout_seconds,
        },
        llm_api_key: overrides.llm_api_key,
        github_token: overrides.github_token,
        manifest_token: overrides.manifest_token,
    })
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',').map(|p| p.trim().to_string()).collect()
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

#[cfg(test)]
impl Config {
    /// Safe `Config` for unit tests: dummy LLM, dummy store.
    pub fn test_default(image_folder: &Path) -> Self {
        Self {
            log_level: "info".into(),
            classify: ClassifyConfig {
                image_folder: Some(image_folder.to_path_buf()),
                categories: vec!["风景".into(), "美食".into()],
                start_offsets: vec![0, 0],
                extensions: default_extensions(),
                prompt_file: PathBuf::from("/nonexistent/classify.txt"),
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                gemini: GeminiConfig {
                    api_base_url: "http://localhost:0".into(),
                    custom_base_url: None,
                    model: "test-model".into(),
                    timeout_seconds: 1,
                    proxy_url: None,
                },
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                    proxy_url: None,
                },
            },
            github: GitHubConfig {
                repo: Some("dummy".into()),
                upload_dir: "classified".into(),
                api_base_url: "http://localhost:0".into(),
                timeout_seconds: 1,
            },
            retrieval: RetrievalConfig { manifest_url: None, timeout_seconds: 1 },
            llm_api_key: None,
            github_token: Some("test-token".into()),
            manifest_token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[classify]
image_folder = "~/Pictures/inbox"
categories = ["风景", "美食", "生活"]
start_offsets = [5]

[github]
repo = "owner/repo"
upload_dir = "classified/images"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_basic_config() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Overrides::default()).unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.classify.categories, vec!["风景", "美食", "生活"]);
        assert_eq!(cfg.classify.start_offsets, vec![5]);
        assert_eq!(cfg.classify.extensions, vec!["jpg", "jpeg", "png"]);
        assert_eq!(cfg.llm.provider, "gemini");
        assert_eq!(cfg.llm.gemini.timeout_seconds, 300);
        assert_eq!(cfg.github.repo.as_deref(), Some("owner/repo"));
        assert!(cfg.retrieval.manifest_url.is_none());
    }

    #[test]
    fn comma_separated_lists() {
        let cfg = parse(
            r#"
[classify]
categories = "风景, 美食,生活"
start_offsets = "3,x"
"#,
            Overrides::default(),
        )
        .unwrap();
        assert_eq!(cfg.classify.categories, vec!["风景", "美食", "生活"]);
        assert_eq!(cfg.classify.start_offsets, vec![3, 0]);
    }

    #[test]
    fn extensions_are_normalised() {
        let cfg = parse("[classify]\nextensions = [\".JPG\", \"webp\"]\n", Overrides::default()).unwrap();
        assert_eq!(cfg.classify.extensions, vec!["jpg", "webp"]);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse("", Overrides::default()).unwrap();
        assert!(cfg.classify.image_folder.is_none());
        assert!(cfg.classify.categories.is_empty());
        assert_eq!(cfg.github.api_base_url, "https://api.github.com");
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.image-cate");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".image-cate"));
    }

    #[test]
    fn absolute_path_unchanged() {
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), Overrides::default());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn invalid_toml_errors() {
        let f = write_toml("[classify\n");
        let msg = load_from(f.path(), Overrides::default()).unwrap_err().to_string();
        assert!(msg.contains("parse error"));
    }

    #[test]
    fn overrides_win_over_file() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(
            f.path(),
            Overrides {
                log_level: Some("debug".into()),
                image_folder: Some("/tmp/override".into()),
                manifest_url: Some("https://example.com/m.json".into()),
                github_token: Some("ghp_x".into()),
                ..Overrides::default()
            },
        )
        .unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.classify.image_folder, Some(PathBuf::from("/tmp/override")));
        assert_eq!(cfg.retrieval.manifest_url.as_deref(), Some("https://example.com/m.json"));
        assert_eq!(cfg.github_token.as_deref(), Some("ghp_x"));
        assert!(cfg.llm_api_key.is_none());
    }

    #[test]
    fn blank_proxy_is_none() {
        let cfg = parse("[llm.gemini]\nproxy_url = \"\"\n", Overrides::default()).unwrap();
        assert!(cfg.llm.gemini.proxy_url.is_none());
    }
}

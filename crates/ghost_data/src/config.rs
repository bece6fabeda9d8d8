use std::env;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::error::GhostDataError;

/// Number of posts shown on one author or tag listing page unless overridden.
pub const DEFAULT_POSTS_PER_PAGE: usize = 25;

/// Identifier of the code-injection constant that marks a syndicated post.
pub const ORIGINAL_POST_IDENTIFIER: &str = "fccOriginalPost";

/// CLI surface for the data builder.
#[derive(Debug, Parser, Clone)]
#[command(author, version, about = "Fetch and reshape Ghost content for the site templates")]
pub struct CliArgs {
    /// Output path for the assembled site data JSON.
    #[arg(long = "out", value_name = "FILE", default_value = "_data/ghost.json")]
    pub out: PathBuf,

    /// Directory that receives the JSON build log. Logs go to stderr only when omitted.
    #[arg(long = "log-dir", value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// How pages of a Content API listing are requested.
    #[arg(long = "fetch-mode", value_enum)]
    pub fetch_mode: Option<FetchMode>,

    /// Posts per author/tag listing page (overrides POSTS_PER_PAGE).
    #[arg(long = "posts-per-page", value_name = "N")]
    pub posts_per_page: Option<NonZeroUsize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FetchMode {
    /// Follow `next` one page at a time with a fixed pause in between.
    Sequential,
    /// Request every remaining page at once after the first page reports the total.
    Concurrent,
}

/// Connection details for one Ghost Content API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoint {
    pub url: String,
    pub key: String,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct Tunables {
    pub api: ApiEndpoint,
    pub backlink_api: ApiEndpoint,
    pub site_url: Option<String>,
    pub posts_per_page: NonZeroUsize,
    pub fetch_mode: FetchMode,
    pub fetch_delay: Duration,
    pub fetch_limit: u32,
    pub rss_feed_size: usize,
    pub http_timeout: Duration,
    pub original_post_identifier: String,
}

#[derive(Debug, Clone)]
pub struct Paths {
    pub out: PathBuf,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub paths: Paths,
    pub tunables: Tunables,
}

impl CliArgs {
    pub fn resolve(self) -> Result<AppConfig, GhostDataError> {
        let out = expand_path(&self.out);
        ensure_parent_directory(&out)?;
        let log_dir = self.log_dir.as_deref().map(expand_path);

        let mut tunables = Tunables::from_env()?;
        if let Some(mode) = self.fetch_mode {
            tunables.fetch_mode = mode;
        }
        if let Some(size) = self.posts_per_page {
            tunables.posts_per_page = size;
        }

        Ok(AppConfig {
            paths: Paths { out, log_dir },
            tunables,
        })
    }
}

impl Tunables {
    pub fn from_env() -> Result<Self, GhostDataError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build tunables from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, GhostDataError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api = ApiEndpoint {
            url: trim_origin(&require(&get, "GHOST_API_URL")?),
            key: require(&get, "GHOST_CONTENT_API_KEY")?,
            version: get("GHOST_API_VERSION").unwrap_or_else(|| "v3".to_string()),
        };
        let backlink_api = ApiEndpoint {
            url: get("ORIGINAL_POST_API_URL")
                .map(|url| trim_origin(&url))
                .unwrap_or_else(|| api.url.clone()),
            key: get("ORIGINAL_POST_API_KEY").unwrap_or_else(|| api.key.clone()),
            version: api.version.clone(),
        };

        let posts_per_page = parse_var(&get, "POSTS_PER_PAGE", DEFAULT_POSTS_PER_PAGE)?;
        let posts_per_page = NonZeroUsize::new(posts_per_page).ok_or_else(|| {
            GhostDataError::Config("invalid value for POSTS_PER_PAGE: must be at least 1".into())
        })?;

        let fetch_mode = match get("GHOST_FETCH_MODE") {
            Some(raw) => <FetchMode as ValueEnum>::from_str(&raw, true).map_err(|_| {
                GhostDataError::Config(format!(
                    "invalid value for GHOST_FETCH_MODE: {raw} (expected sequential or concurrent)"
                ))
            })?,
            None => FetchMode::Sequential,
        };

        let fetch_delay = Duration::from_millis(parse_var(&get, "GHOST_FETCH_DELAY_MS", 250u64)?);
        let fetch_limit = parse_var(&get, "GHOST_FETCH_LIMIT", 15u32)?;
        if fetch_limit == 0 {
            return Err(GhostDataError::Config(
                "invalid value for GHOST_FETCH_LIMIT: must be at least 1".into(),
            ));
        }
        let rss_feed_size = parse_var(&get, "RSS_FEED_SIZE", 10usize)?;
        let http_timeout = Duration::from_secs(parse_var(&get, "GHOST_HTTP_TIMEOUT_SECS", 30u64)?);

        Ok(Self {
            api,
            backlink_api,
            site_url: get("SITE_URL"),
            posts_per_page,
            fetch_mode,
            fetch_delay,
            fetch_limit,
            rss_feed_size,
            http_timeout,
            original_post_identifier: ORIGINAL_POST_IDENTIFIER.to_string(),
        })
    }
}

fn require<G>(get: &G, var: &str) -> Result<String, GhostDataError>
where
    G: Fn(&str) -> Option<String>,
{
    get(var).ok_or_else(|| GhostDataError::Config(format!("{var} must be set")))
}

fn parse_var<G, T>(get: &G, var: &str, default: T) -> Result<T, GhostDataError>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(var) {
        Some(value) => value.parse::<T>().map_err(|err| {
            GhostDataError::Config(format!("invalid value for {}: {}", var, err))
        }),
        None => Ok(default),
    }
}

// Ghost reports entity URLs without a trailing slash on the origin.
fn trim_origin(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).into_owned())
}

fn ensure_parent_directory(path: &Path) -> Result<(), GhostDataError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_apply_when_only_credentials_are_set() {
        let tunables = Tunables::from_lookup(lookup(&[
            ("GHOST_API_URL", "https://cms.example.com/"),
            ("GHOST_CONTENT_API_KEY", "abc123"),
        ]))
        .unwrap();

        assert_eq!(tunables.api.url, "https://cms.example.com");
        assert_eq!(tunables.api.version, "v3");
        assert_eq!(tunables.backlink_api, tunables.api);
        assert_eq!(tunables.posts_per_page.get(), DEFAULT_POSTS_PER_PAGE);
        assert_eq!(tunables.fetch_mode, FetchMode::Sequential);
        assert_eq!(tunables.fetch_delay, Duration::from_millis(250));
        assert_eq!(tunables.fetch_limit, 15);
        assert_eq!(tunables.rss_feed_size, 10);
        assert!(tunables.site_url.is_none());
    }

    #[test]
    fn missing_api_url_is_a_config_error() {
        let err = Tunables::from_lookup(lookup(&[("GHOST_CONTENT_API_KEY", "abc123")])).unwrap_err();
        assert!(matches!(err, GhostDataError::Config(message) if message.contains("GHOST_API_URL")));
    }

    #[test]
    fn zero_posts_per_page_is_rejected() {
        let err = Tunables::from_lookup(lookup(&[
            ("GHOST_API_URL", "https://cms.example.com"),
            ("GHOST_CONTENT_API_KEY", "abc123"),
            ("POSTS_PER_PAGE", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, GhostDataError::Config(_)));
    }

    #[test]
    fn non_numeric_posts_per_page_is_rejected() {
        let err = Tunables::from_lookup(lookup(&[
            ("GHOST_API_URL", "https://cms.example.com"),
            ("GHOST_CONTENT_API_KEY", "abc123"),
            ("POSTS_PER_PAGE", "2.5"),
        ]))
        .unwrap_err();
        assert!(matches!(err, GhostDataError::Config(_)));
    }

    #[test]
    fn backlink_api_and_fetch_mode_overrides() {
        let tunables = Tunables::from_lookup(lookup(&[
            ("GHOST_API_URL", "https://cms.example.com"),
            ("GHOST_CONTENT_API_KEY", "abc123"),
            ("ORIGINAL_POST_API_URL", "https://en.example.com/"),
            ("ORIGINAL_POST_API_KEY", "def456"),
            ("GHOST_FETCH_MODE", "Concurrent"),
            ("SITE_URL", "https://www.example.org"),
        ]))
        .unwrap();

        assert_eq!(tunables.backlink_api.url, "https://en.example.com");
        assert_eq!(tunables.backlink_api.key, "def456");
        assert_eq!(tunables.fetch_mode, FetchMode::Concurrent);
        assert_eq!(tunables.site_url.as_deref(), Some("https://www.example.org"));
    }

    #[test]
    fn unknown_fetch_mode_is_rejected() {
        let err = Tunables::from_lookup(lookup(&[
            ("GHOST_API_URL", "https://cms.example.com"),
            ("GHOST_CONTENT_API_KEY", "abc123"),
            ("GHOST_FETCH_MODE", "parallel"),
        ]))
        .unwrap_err();
        assert!(matches!(err, GhostDataError::Config(_)));
    }

    #[test]
    fn fetch_mode_env_value_is_case_insensitive() {
        for raw in ["SEQUENTIAL", "sequential", " Sequential "] {
            let tunables = Tunables::from_lookup(lookup(&[
                ("GHOST_API_URL", "https://cms.example.com"),
                ("GHOST_CONTENT_API_KEY", "abc123"),
                ("GHOST_FETCH_MODE", raw),
            ]))
            .unwrap();
            assert_eq!(tunables.fetch_mode, FetchMode::Sequential, "{raw:?}");
        }
    }
}

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Folders seeded onto the work queue at startup and on every refresh cycle.
    pub roots: Vec<String>,
    /// Crawl worker count, 0 picks one from the number of CPUs.
    pub workers: usize,
    /// Pause between two dequeued tasks, throttles the downstream event queue.
    pub crawl_delay_ms: u64,
    pub refresh_interval_secs: u64,
    /// How long an idle worker waits before polling an empty work queue again.
    pub poll_interval_ms: u64,
    /// Set while a recovery run owns the work queue; roots are never seeded.
    pub recovery_mode: bool,
    pub source_tag: String,
    pub max_delivery_attempts: u32,
    /// Access-control identifiers attached to every insert/update event.
    pub acl_tokens: Vec<String>,
}

impl CrawlerConfig {
    pub fn worker_count(&self) -> usize {
        match self.workers {
            0 => num_cpus::get().max(2) / 2 + 1,
            n => n,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RulesConfig {
    /// Accepted file extensions; empty accepts every extension.
    pub include_types: Vec<String>,
    pub exclude_types: Vec<String>,
    /// Regular expressions matched against the whole path.
    pub exclude_files: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub max_file_size: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ShareConfig {
    pub server: Option<String>,
    pub domain: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Where shares are mounted on hosts without native UNC access.
    pub mount_root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub flush_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecoveryConfig {
    pub index_url: String,
    pub collection: String,
    pub page_size: usize,
    pub audit_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub crawler: CrawlerConfig,
    pub rules: RulesConfig,
    pub share: ShareConfig,
    pub store: StoreConfig,
    pub recovery: RecoveryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        let defaults: &str = include_str!("../config/default.toml");
        match ::config::Config::builder()
            .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let defaults: &str = include_str!("../config/default.toml");
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
        // Optional local file: edgecrawl.toml (in CWD)
        .add_source(::config::File::with_name("edgecrawl").required(false));

    if let Ok(custom_path) = std::env::var("EDGECRAWL_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(
        ::config::Environment::with_prefix("EDGECRAWL")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("crawler.roots")
            .with_list_parse_key("crawler.acl_tokens")
            .with_list_parse_key("rules.include_types")
            .with_list_parse_key("rules.exclude_types")
            .with_list_parse_key("rules.exclude_files")
            .with_list_parse_key("rules.exclude_globs")
            .try_parsing(true),
    );

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    // Crawler
    if cfg.crawler.workers > 256 {
        return Err(anyhow::anyhow!("crawler.workers must be <= 256"));
    }
    if cfg.crawler.refresh_interval_secs == 0 {
        return Err(anyhow::anyhow!("crawler.refresh_interval_secs must be > 0"));
    }
    if cfg.crawler.poll_interval_ms == 0 {
        return Err(anyhow::anyhow!("crawler.poll_interval_ms must be > 0"));
    }
    if cfg.crawler.max_delivery_attempts == 0 {
        return Err(anyhow::anyhow!("crawler.max_delivery_attempts must be > 0"));
    }
    for root in &cfg.crawler.roots {
        crate::path::CrawlPath::parse(root)
            .map_err(|e| anyhow::anyhow!("crawler.roots entry {:?} is invalid: {}", root, e))?;
    }

    // Rules
    crate::rules::CrawlRules::from_config(&cfg.rules)
        .map_err(|e| anyhow::anyhow!("rules: {}", e))?;
    if cfg.rules.max_file_size == 0 {
        return Err(anyhow::anyhow!("rules.max_file_size must be > 0"));
    }

    // Store
    if cfg.store.flush_interval_secs == 0 {
        return Err(anyhow::anyhow!("store.flush_interval_secs must be > 0"));
    }
    if cfg.store.path.as_os_str().is_empty() {
        return Err(anyhow::anyhow!("store.path must not be empty"));
    }

    // Recovery
    if cfg.recovery.page_size == 0 {
        return Err(anyhow::anyhow!("recovery.page_size must be > 0"));
    }

    // Share credentials travel together; the domain is optional
    if cfg.share.username.is_some() != cfg.share.password.is_some() {
        return Err(anyhow::anyhow!("share.username and share.password must be set together"));
    }
    if cfg.share.domain.is_some() && cfg.share.username.is_none() {
        return Err(anyhow::anyhow!("share.domain requires share.username and share.password"));
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        // On Windows, handle URLs like sqlite:///C:/... by stripping the leading '/'
        #[cfg(windows)]
        let path = {
            let bytes = path.as_bytes();
            if bytes.len() >= 3 && bytes[0] == b'/' && bytes[2] == b':' && bytes[1].is_ascii_alphabetic() {
                &path[1..]
            } else {
                path
            }
        };
        ensure_parent_dir(Path::new(path))?;
    }
    Ok(())
}

pub fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

use std::env;
use std::fmt;

/// Default worker threads per process when nothing else is configured.
const DEFAULT_THREADS_PER_WORKER: usize = 4;
const MAX_WORKER_THREADS: usize = 256;
const DEV_SECRET_KEY: &str = "insecure-dev-secret";
const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:8080"];

/// S3-compatible object storage for book covers
#[derive(Clone)]
pub struct ObjectStorage {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: String,
}

impl fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("access_key_id", &"***")
            .field("secret_access_key", &"***")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub secret_key: String,
    pub debug: bool,
    pub bind: String,
    pub port: u16,
    /// Number of worker processes the deployment would run
    pub web_concurrency: usize,
    pub threads_per_worker: usize,
    pub request_timeout_secs: u64,
    /// In-flight request cap
    pub max_connections: usize,
    pub redis_url: Option<String>,
    pub cors_allowed_origins: Vec<String>,
    pub media_url: String,
    pub storage: Option<ObjectStorage>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &redact_url(&self.database_url))
            .field("secret_key", &"***")
            .field("debug", &self.debug)
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("web_concurrency", &self.web_concurrency)
            .field("threads_per_worker", &self.threads_per_worker)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_connections", &self.max_connections)
            .field("redis_url", &self.redis_url.as_deref().map(redact_url))
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("media_url", &self.media_url)
            .field("storage", &self.storage)
            .finish()
    }
}

/// Hide the password of a connection URL
fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("***")).is_err() {
                return "***".to_string();
            }
            parsed.to_string()
        }
        Ok(_) => raw.to_string(),
        Err(_) => "***".to_string(),
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn default_web_concurrency() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus * 2 + 1
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parse_or = |key: &str, default: usize| {
            get(key)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(default)
        };

        let debug = get("DEBUG").map(|v| parse_bool(&v)).unwrap_or(false);

        let secret_key = get("SECRET_KEY").unwrap_or_else(|| {
            if !debug {
                tracing::warn!("SECRET_KEY is not set, using an insecure development key");
            }
            DEV_SECRET_KEY.to_string()
        });

        let storage = match (
            get("AWS_ACCESS_KEY_ID"),
            get("AWS_SECRET_ACCESS_KEY"),
            get("AWS_STORAGE_BUCKET_NAME"),
        ) {
            (Some(access_key_id), Some(secret_access_key), Some(bucket)) => Some(ObjectStorage {
                access_key_id,
                secret_access_key,
                bucket,
                region: get("AWS_S3_REGION_NAME").unwrap_or_else(|| "us-east-1".to_string()),
            }),
            _ => None,
        };

        let mut media_url = get("MEDIA_URL").unwrap_or_else(|| "/media/".to_string());
        if !media_url.ends_with('/') {
            media_url.push('/');
        }

        Self {
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://bookstore.db?mode=rwc".to_string()),
            secret_key,
            debug,
            bind: get("BIND").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: get("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(8000),
            web_concurrency: parse_or("WEB_CONCURRENCY", default_web_concurrency()).max(1),
            threads_per_worker: parse_or("THREADS_PER_WORKER", DEFAULT_THREADS_PER_WORKER).max(1),
            request_timeout_secs: get("REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(30),
            max_connections: parse_or("MAX_CONNECTIONS", 1000).max(1),
            redis_url: get("REDIS_URL"),
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_else(|| {
                    DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect()
                }),
            media_url,
            storage,
        }
    }

    /// Tokio worker threads: `WEB_CONCURRENCY` x `THREADS_PER_WORKER`, clamped
    pub fn worker_threads(&self) -> usize {
        (self.web_concurrency * self.threads_per_worker).clamp(1, MAX_WORKER_THREADS)
    }

    /// Public URL of a stored cover image. Absolute references pass through.
    pub fn cover_url(&self, reference: &str) -> String {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return reference.to_string();
        }
        let path = reference.trim_start_matches('/');
        let path = if path.starts_with("book_covers/") {
            path.to_string()
        } else {
            format!("book_covers/{}", path)
        };
        match &self.storage {
            Some(storage) => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                storage.bucket, storage.region, path
            ),
            None => format!("{}{}", self.media_url, path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]);
        assert_eq!(config.database_url, "sqlite://bookstore.db?mode=rwc");
        assert_eq!(config.port, 8000);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.threads_per_worker, 4);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.max_connections, 1000);
        assert!(!config.debug);
        assert!(config.storage.is_none());
        assert!(config.redis_url.is_none());
        assert_eq!(config.secret_key, "insecure-dev-secret");
        assert_eq!(config.cors_allowed_origins.len(), 2);
    }

    #[test]
    fn debug_output_hides_credentials() {
        let config = config(&[
            ("DATABASE_URL", "postgres://bookstore:hunter2@db:5432/bookstore"),
            ("REDIS_URL", "redis://:cachepass@redis:6379/0"),
            ("SECRET_KEY", "very-secret"),
        ]);
        let printed = format!("{:?}", config);
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("cachepass"));
        assert!(!printed.contains("very-secret"));
        assert!(printed.contains("postgres://bookstore:***@db:5432/bookstore"));
    }

    #[test]
    fn worker_threads_follow_process_settings() {
        let small = config(&[("WEB_CONCURRENCY", "3"), ("THREADS_PER_WORKER", "2")]);
        assert_eq!(small.worker_threads(), 6);

        let huge = config(&[("WEB_CONCURRENCY", "100"), ("THREADS_PER_WORKER", "100")]);
        assert_eq!(huge.worker_threads(), 256);
    }

    #[test]
    fn storage_requires_all_credentials() {
        let partial = config(&[("AWS_ACCESS_KEY_ID", "id"), ("AWS_STORAGE_BUCKET_NAME", "b")]);
        assert!(partial.storage.is_none());

        let full = config(&[
            ("AWS_ACCESS_KEY_ID", "id"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_STORAGE_BUCKET_NAME", "covers"),
        ]);
        let storage = full.storage.as_ref().unwrap();
        assert_eq!(storage.region, "us-east-1");
        assert!(!format!("{:?}", full).contains("\"secret\""));
    }

    #[test]
    fn cover_urls() {
        let local = config(&[("MEDIA_URL", "/files")]);
        assert_eq!(local.cover_url("dune.jpg"), "/files/book_covers/dune.jpg");
        assert_eq!(
            local.cover_url("https://cdn.example.com/a.jpg"),
            "https://cdn.example.com/a.jpg"
        );

        let s3 = config(&[
            ("AWS_ACCESS_KEY_ID", "id"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_STORAGE_BUCKET_NAME", "covers"),
            ("AWS_S3_REGION_NAME", "eu-west-1"),
        ]);
        assert_eq!(
            s3.cover_url("book_covers/dune.jpg"),
            "https://covers.s3.eu-west-1.amazonaws.com/book_covers/dune.jpg"
        );
    }

    #[test]
    fn cors_origins_are_split() {
        let config = config(&[("CORS_ALLOWED_ORIGINS", "http://a.test, http://b.test,")]);
        assert_eq!(config.cors_allowed_origins, vec!["http://a.test", "http://b.test"]);
    }
}

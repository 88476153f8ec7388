use std::{env, net::SocketAddr, num::NonZeroUsize, str::FromStr, time::Duration};

use thiserror::Error;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
pub(crate) static ENV_MUTEX: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

/// 学習データのラベル付け方法。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrainingMode {
    /// トピックごとに固定ラベルを与える。
    #[default]
    Bootstrap,
    /// 同じトピックを取得し、ヒューリスティックでラベルを付ける。
    Heuristic,
}

impl TrainingMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bootstrap => "bootstrap",
            Self::Heuristic => "heuristic",
        }
    }
}

impl FromStr for TrainingMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "bootstrap" => Ok(Self::Bootstrap),
            "heuristic" => Ok(Self::Heuristic),
            other => Err(anyhow::anyhow!(
                "unknown training mode '{other}' (expected bootstrap or heuristic)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    http_bind: SocketAddr,
    reddit_base_url: String,
    user_agent: String,
    http_connect_timeout: Duration,
    http_total_timeout: Duration,
    query_max_results: NonZeroUsize,
    bootstrap_per_topic: NonZeroUsize,
    training_mode: TrainingMode,
    cache_ttl: Duration,
    max_iter: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数から設定値を読み込み、検証する。未設定の値は既定値を使う。
    ///
    /// # Errors
    /// 数値／アドレス／URL のパースに失敗した場合は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_bind = parse_socket_addr("CLIPCHECK_HTTP_BIND", "0.0.0.0:5001")?;
        let reddit_base_url =
            parse_base_url("CLIPCHECK_REDDIT_BASE_URL", "https://www.reddit.com/")?;
        let user_agent = env::var("CLIPCHECK_USER_AGENT")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(default_user_agent);
        let http_connect_timeout = parse_duration_ms("CLIPCHECK_HTTP_CONNECT_TIMEOUT_MS", 3000)?;
        let http_total_timeout = parse_duration_ms("CLIPCHECK_HTTP_TOTAL_TIMEOUT_MS", 15_000)?;
        let query_max_results = parse_non_zero_usize("CLIPCHECK_QUERY_MAX_RESULTS", 10)?;
        let bootstrap_per_topic = parse_non_zero_usize("CLIPCHECK_BOOTSTRAP_PER_TOPIC", 3)?;
        let training_mode = parse_from_str("CLIPCHECK_TRAINING_MODE", TrainingMode::Bootstrap)?;
        let cache_ttl = Duration::from_secs(parse_u64("CLIPCHECK_CACHE_TTL_SECS", 600)?);
        let max_iter = parse_non_zero_usize("CLIPCHECK_MAX_ITER", 1000)?;

        Ok(Self {
            http_bind,
            reddit_base_url,
            user_agent,
            http_connect_timeout,
            http_total_timeout,
            query_max_results,
            bootstrap_per_topic,
            training_mode,
            cache_ttl,
            max_iter,
        })
    }

    #[must_use]
    pub fn http_bind(&self) -> SocketAddr {
        self.http_bind
    }

    #[must_use]
    pub fn reddit_base_url(&self) -> &str {
        &self.reddit_base_url
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn http_connect_timeout(&self) -> Duration {
        self.http_connect_timeout
    }

    #[must_use]
    pub fn http_total_timeout(&self) -> Duration {
        self.http_total_timeout
    }

    /// ハッシュタグ 1 件あたりにスコアリングする投稿数の上限。
    #[must_use]
    pub fn query_max_results(&self) -> usize {
        self.query_max_results.get()
    }

    #[must_use]
    pub fn bootstrap_per_topic(&self) -> usize {
        self.bootstrap_per_topic.get()
    }

    #[must_use]
    pub fn training_mode(&self) -> TrainingMode {
        self.training_mode
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    #[must_use]
    pub fn max_iter(&self) -> usize {
        self.max_iter.get()
    }
}

fn default_user_agent() -> String {
    format!("clipcheck/{}", env!("CARGO_PKG_VERSION"))
}

fn parse_socket_addr(name: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());

    raw.parse().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

/// URL として検証し、`join` が期待通りに動くよう末尾を `/` に揃える。
fn parse_base_url(name: &'static str, default: &str) -> Result<String, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = reqwest::Url::parse(raw.trim()).map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    let mut normalized = parsed.to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Ok(normalized)
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_duration_ms(name: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    let ms = parse_u64(name, default_ms)?;
    if ms == 0 {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("timeout must be greater than zero"),
        });
    }
    Ok(Duration::from_millis(ms))
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_from_str<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr<Err = anyhow::Error>,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|source| ConfigError::Invalid { name, source }),
        Err(_) => Ok(default),
    }
}

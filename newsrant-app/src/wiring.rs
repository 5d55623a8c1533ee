use anyhow::{Context, Result, anyhow};
use newsrant_common::NewsrantError;
use newsrant_common::observability::{LogConfig, LogFormat};
use newsrant_config::{LlmConfig, LoggingSettings, NewsrantConfig};
use newsrant_llm::{ollama::OllamaClient, summarizer::Summarizer};
use newsrant_monitor::monitor::run_once;
use newsrant_monitor::{Monitor, MonitorOptions, PostFormat, SeenStore};
use newsrant_social::twitter::{OAuth1Credentials, TwitterApi};
use newsrant_social::{DryRunSink, PostId, PostSink, Publisher, RetryPolicy};
use newsrant_web::NewsSource;
use std::sync::Arc;
use std::time::Duration;

/// Every component of the pipeline, built from config and ready to hand to the loop.
pub struct Wiring {
    source: Arc<NewsSource>,
    ollama: Arc<OllamaClient>,
    summarizer: Arc<Summarizer>,
    publisher: Arc<Publisher>,
    store: SeenStore,
    options: MonitorOptions,
}

pub fn log_config(settings: &LoggingSettings) -> Result<LogConfig> {
    let format: LogFormat = settings
        .format
        .parse()
        .map_err(|e: String| anyhow!("logging.format: {e}"))?;
    Ok(LogConfig {
        app_name: "newsrant",
        log_dir: settings.dir.clone(),
        emit_stderr: settings.stderr,
        format,
        default_filter: settings.filter.clone(),
    })
}

impl Wiring {
    pub fn from_config(cfg: &NewsrantConfig, dry_run: bool) -> Result<Self> {
        let source = NewsSource::new(&cfg.source.homepage, &cfg.source.user_agent)
            .context("building news source")?
            .with_timeout(Duration::from_secs(cfg.source.timeout_secs))
            .with_limits(cfg.source.max_articles, cfg.source.max_content_chars);

        let (ollama, summarizer) = match &cfg.llm {
            LlmConfig::Ollama {
                model,
                endpoint,
                temperature,
                max_tokens,
                timeout_secs,
            } => {
                let client = Arc::new(
                    OllamaClient::new(endpoint, model.clone())
                        .context("building Ollama client")?
                        .with_timeout(Duration::from_secs(*timeout_secs)),
                );
                let summarizer =
                    Summarizer::new(client.clone()).with_sampling(*max_tokens, *temperature);
                (client, summarizer)
            }
        };

        let sink: Arc<dyn PostSink> = if dry_run {
            tracing::warn!("wiring.dry_run: posts will only be logged");
            Arc::new(DryRunSink)
        } else {
            let creds = cfg.twitter.credentials().ok_or_else(|| {
                NewsrantError::Config(format!(
                    "missing {}; export NEWSRANT__TWITTER__<FIELD> or pass --dry-run",
                    cfg.twitter.missing_credentials().join(", ")
                ))
            })?;
            let creds = OAuth1Credentials {
                consumer_key: creds.api_key.to_string(),
                consumer_secret: creds.api_secret.to_string(),
                access_token: creds.access_token.to_string(),
                access_token_secret: creds.access_token_secret.to_string(),
            };
            Arc::new(TwitterApi::new(creds).context("building X client")?)
        };
        let publisher = Publisher::new(sink).with_policy(RetryPolicy {
            max_rate_limit_retries: cfg.twitter.max_rate_limit_retries,
            reset_buffer: Duration::from_secs(cfg.twitter.reset_buffer_secs),
            fallback_wait: Duration::from_secs(cfg.twitter.fallback_wait_secs),
        });

        let options = MonitorOptions {
            poll_interval: cfg.monitor.poll_interval(),
            error_pause: cfg.monitor.error_pause(),
            seen_ttl: cfg.monitor.seen_ttl(),
            post: PostFormat {
                prefix: cfg.post.prefix.clone(),
                suffix: cfg.post.suffix.clone(),
                max_chars: cfg.post.max_chars,
            },
        };

        tracing::info!(
            homepage = %source.homepage(),
            model = %summarizer.model_name(),
            store = %cfg.monitor.store_path.display(),
            "wiring.ready"
        );

        Ok(Self {
            source: Arc::new(source),
            ollama,
            summarizer: Arc::new(summarizer),
            publisher: Arc::new(publisher),
            store: SeenStore::new(cfg.monitor.store_path.clone()),
            options,
        })
    }

    /// Make sure the model is available locally. Failure is only a warning: cycles
    /// skip generation until the server comes up.
    pub async fn prepare_llm(&self) {
        if let Err(e) = self.ollama.ensure_ready().await {
            tracing::warn!(error = %e, "wiring.llm.not_ready");
        }
    }

    pub fn into_monitor(self) -> Monitor {
        Monitor::new(
            self.source,
            self.summarizer,
            self.publisher,
            self.store,
            self.options,
        )
    }

    pub async fn run_once(&self) -> Result<PostId> {
        run_once(
            self.source.as_ref(),
            self.summarizer.as_ref(),
            self.publisher.as_ref(),
            &self.options.post,
        )
        .await
    }

    pub async fn test_post(&self) -> Result<PostId> {
        let text = format!(
            "Test post from newsrant at {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        Ok(self.publisher.post(&text).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_needs_no_credentials() {
        let cfg = NewsrantConfig::default();
        assert!(Wiring::from_config(&cfg, true).is_ok());
    }

    fn full_credentials(cfg: &mut NewsrantConfig) {
        cfg.twitter.api_key = Some("consumer-key".into());
        cfg.twitter.api_secret = Some("consumer-secret".into());
        cfg.twitter.access_token = Some("user-token".into());
        cfg.twitter.access_token_secret = Some("user-secret".into());
    }

    #[test]
    fn missing_credentials_are_reported_as_config_error() {
        let cfg = NewsrantConfig::default();
        let err = Wiring::from_config(&cfg, false).err().unwrap();
        match err.downcast_ref::<NewsrantError>() {
            Some(NewsrantError::Config(msg)) => {
                assert!(msg.contains("twitter.api_key"));
                assert!(msg.contains("twitter.access_token_secret"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn unexpanded_credential_is_reported() {
        let mut cfg = NewsrantConfig::default();
        full_credentials(&mut cfg);
        cfg.twitter.access_token_secret = Some("${X_ACCESS_TOKEN_SECRET}".into());
        let err = Wiring::from_config(&cfg, false).err().unwrap();
        let msg = err.to_string();
        assert!(msg.contains("twitter.access_token_secret"));
        assert!(!msg.contains("twitter.api_key"));
    }

    #[test]
    fn credentials_build_live_publisher() {
        let mut cfg = NewsrantConfig::default();
        full_credentials(&mut cfg);
        let wiring = Wiring::from_config(&cfg, false).unwrap();
        assert_eq!(wiring.publisher.policy().max_rate_limit_retries, 3);
        assert_eq!(wiring.options.poll_interval, Duration::from_secs(600));
    }

    #[test]
    fn log_format_is_validated() {
        let mut settings = NewsrantConfig::default().logging;
        settings.format = "json".into();
        assert_eq!(log_config(&settings).unwrap().format, LogFormat::Json);
        settings.format = "xml".into();
        assert!(log_config(&settings).is_err());
    }

    #[tokio::test]
    async fn test_post_in_dry_run_returns_synthetic_id() {
        let wiring = Wiring::from_config(&NewsrantConfig::default(), true).unwrap();
        let id = wiring.test_post().await.unwrap();
        assert!(id.0.starts_with("dry-run-"));
    }
}

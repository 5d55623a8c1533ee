//! Polling loop: list, select one unseen article, summarize, publish, prune, sleep.
use crate::store::{SeenArticles, SeenStore};
use crate::supervise::contain;
use crate::{ArticleSource, Publish, Summarize};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use newsrant_common::Article;
use newsrant_social::PostId;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Where the loop is within a cycle. Every change is logged as `monitor.transition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    FetchingList,
    Selecting,
    FetchingContent,
    Generating,
    Publishing,
    Pruning,
    Sleeping,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleState::Idle => "idle",
            CycleState::FetchingList => "fetching_list",
            CycleState::Selecting => "selecting",
            CycleState::FetchingContent => "fetching_content",
            CycleState::Generating => "generating",
            CycleState::Publishing => "publishing",
            CycleState::Pruning => "pruning",
            CycleState::Sleeping => "sleeping",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    EmptyContent,
    GenerationFailed(String),
}

/// What a single cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    ListFailed,
    NoNewArticle,
    Skipped { url: String, reason: SkipReason },
    Posted { url: String, post_id: PostId },
    PublishFailed { url: String, error: String },
}

/// Wrapping applied to generated text before it is published.
#[derive(Debug, Clone)]
pub struct PostFormat {
    pub prefix: String,
    pub suffix: String,
    /// Platform limit, in characters, for the whole post.
    pub max_chars: usize,
}

impl Default for PostFormat {
    fn default() -> Self {
        Self {
            prefix: "👀 BREAKING: \n\n".to_string(),
            suffix: "\n\nWhat do you think?".to_string(),
            max_chars: 280,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub poll_interval: Duration,
    /// Pause after a cycle that failed unexpectedly.
    pub error_pause: Duration,
    pub seen_ttl: Duration,
    pub post: PostFormat,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(600),
            error_pause: Duration::from_secs(60),
            seen_ttl: Duration::from_secs(24 * 60 * 60),
            post: PostFormat::default(),
        }
    }
}

/// `prefix + text + suffix`, shortening `text` (with a trailing `…`) so the whole post
/// stays within `format.max_chars` characters.
pub fn compose_post(text: &str, format: &PostFormat) -> String {
    let frame = format.prefix.chars().count() + format.suffix.chars().count();
    let budget = format.max_chars.saturating_sub(frame);
    let text = text.trim();

    let body = if text.chars().count() <= budget {
        text.to_string()
    } else if budget == 0 {
        String::new()
    } else {
        let mut cut: String = text.chars().take(budget - 1).collect();
        cut.truncate(cut.trim_end().len());
        cut.push('…');
        cut
    };

    format!("{}{}{}", format.prefix, body, format.suffix)
}

pub struct Monitor {
    source: Arc<dyn ArticleSource>,
    summarizer: Arc<dyn Summarize>,
    publisher: Arc<dyn Publish>,
    store: SeenStore,
    seen: SeenArticles,
    options: MonitorOptions,
    state: CycleState,
}

impl Monitor {
    /// Build the loop and load the ledger. An unreadable ledger is logged and replaced
    /// by an empty one.
    pub fn new(
        source: Arc<dyn ArticleSource>,
        summarizer: Arc<dyn Summarize>,
        publisher: Arc<dyn Publish>,
        store: SeenStore,
        options: MonitorOptions,
    ) -> Self {
        let seen = store.load().unwrap_or_else(|e| {
            error!(path = %store.path().display(), error = %e, "monitor.store.load_failed");
            SeenArticles::new()
        });
        info!(
            path = %store.path().display(),
            tracked = seen.len(),
            "monitor.init"
        );
        Self {
            source,
            summarizer,
            publisher,
            store,
            seen,
            options,
            state: CycleState::Idle,
        }
    }

    pub fn seen(&self) -> &SeenArticles {
        &self.seen
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    fn transition(&mut self, next: CycleState) {
        info!(from = %self.state, to = %next, "monitor.transition");
        self.state = next;
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.seen) {
            error!(path = %self.store.path().display(), error = %e, "monitor.store.save_failed");
        }
    }

    /// Run forever. Each cycle is followed by the poll interval, or by the error
    /// pause if the cycle panicked.
    pub async fn run(&mut self) {
        info!(
            poll_secs = self.options.poll_interval.as_secs(),
            ttl_secs = self.options.seen_ttl.as_secs(),
            "monitor.start"
        );
        loop {
            let cycle = async { Ok::<_, anyhow::Error>(self.run_cycle().await) };
            let pause = match contain(cycle).await {
                Ok(outcome) => {
                    info!(outcome = ?outcome, "monitor.cycle.done");
                    self.options.poll_interval
                }
                Err(e) => {
                    error!(
                        error = %e,
                        pause_secs = self.options.error_pause.as_secs(),
                        "monitor.cycle.failed"
                    );
                    self.options.error_pause
                }
            };
            self.transition(CycleState::Sleeping);
            tokio::time::sleep(pause).await;
            self.transition(CycleState::Idle);
        }
    }

    /// One pass through the pipeline, ending after pruning.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.transition(CycleState::FetchingList);
        let outcome = match self.source.list_latest().await {
            Ok(articles) => {
                self.transition(CycleState::Selecting);
                match self.select(&articles) {
                    Some(article) => self.process(article).await,
                    None => {
                        info!(listed = articles.len(), "monitor.no_new_article");
                        CycleOutcome::NoNewArticle
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "monitor.list_failed");
                CycleOutcome::ListFailed
            }
        };

        self.transition(CycleState::Pruning);
        let removed = self.seen.prune(Utc::now(), self.options.seen_ttl);
        self.persist();
        info!(removed, tracked = self.seen.len(), "monitor.pruned");

        outcome
    }

    /// First unseen article, marked seen and persisted before anything else happens.
    fn select(&mut self, articles: &[Article]) -> Option<Article> {
        let article = articles
            .iter()
            .find(|a| !self.seen.contains(&a.url))?
            .clone();
        self.seen.mark_seen(&article, Utc::now());
        self.persist();
        info!(url = %article.url, title = %article.title, "monitor.selected");
        Some(article)
    }

    async fn process(&mut self, article: Article) -> CycleOutcome {
        self.transition(CycleState::FetchingContent);
        let content = self.source.fetch_content(&article.url).await;
        if content.is_empty() {
            warn!(url = %article.url, "monitor.content.empty");
            return CycleOutcome::Skipped {
                url: article.url,
                reason: SkipReason::EmptyContent,
            };
        }

        self.transition(CycleState::Generating);
        let text = match self.summarizer.generate(&article.title, &content).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(url = %article.url, "monitor.generate.empty");
                return CycleOutcome::Skipped {
                    url: article.url,
                    reason: SkipReason::GenerationFailed("empty generation".into()),
                };
            }
            Err(e) => {
                warn!(url = %article.url, error = %e, "monitor.generate.failed");
                return CycleOutcome::Skipped {
                    url: article.url,
                    reason: SkipReason::GenerationFailed(e.to_string()),
                };
            }
        };

        self.transition(CycleState::Publishing);
        let post = compose_post(&text, &self.options.post);
        match self.publisher.post(&post).await {
            Ok(post_id) => {
                info!(url = %article.url, post_id = %post_id, "monitor.published");
                CycleOutcome::Posted {
                    url: article.url,
                    post_id,
                }
            }
            Err(e) => {
                error!(url = %article.url, error = %e, "monitor.publish.failed");
                CycleOutcome::PublishFailed {
                    url: article.url,
                    error: e.to_string(),
                }
            }
        }
    }
}

/// One-shot smoke run: take the first listed article regardless of history and push
/// it through the pipeline. Never touches the ledger.
pub async fn run_once(
    source: &dyn ArticleSource,
    summarizer: &dyn Summarize,
    publisher: &dyn Publish,
    format: &PostFormat,
) -> Result<PostId> {
    let articles = source.list_latest().await.context("listing articles")?;
    let article = articles
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("homepage listed no articles"))?;
    info!(url = %article.url, title = %article.title, "once.selected");

    let content = source.fetch_content(&article.url).await;
    if content.is_empty() {
        return Err(anyhow!("no content extracted from {}", article.url));
    }

    let text = summarizer
        .generate(&article.title, &content)
        .await
        .context("generating post text")?;
    let post = compose_post(&text, format);
    let id = publisher.post(&post).await.context("publishing post")?;
    info!(post_id = %id, "once.published");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use newsrant_common::NewsrantError;
    use newsrant_social::PostError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSource {
        articles: Mutex<Vec<Article>>,
        fail_list: Mutex<bool>,
        content: String,
        fetched: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn with(articles: Vec<Article>) -> Arc<Self> {
            Arc::new(Self {
                articles: Mutex::new(articles),
                content: "Body text of the story.".into(),
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl ArticleSource for FakeSource {
        async fn list_latest(&self) -> newsrant_common::Result<Vec<Article>> {
            if *self.fail_list.lock().unwrap() {
                return Err(NewsrantError::Source("homepage down".into()));
            }
            Ok(self.articles.lock().unwrap().clone())
        }

        async fn fetch_content(&self, url: &str) -> String {
            self.fetched.lock().unwrap().push(url.to_string());
            self.content.clone()
        }
    }

    struct FakeSummarizer {
        reply: Option<String>,
    }

    #[async_trait]
    impl Summarize for FakeSummarizer {
        async fn generate(&self, title: &str, _content: &str) -> newsrant_common::Result<String> {
            match &self.reply {
                Some(r) => Ok(format!("{r}: {title}")),
                None => Err(NewsrantError::Llm("connection refused".into())),
            }
        }
    }

    #[derive(Default)]
    struct FakePublisher {
        posts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Publish for FakePublisher {
        async fn post(&self, text: &str) -> std::result::Result<PostId, PostError> {
            self.posts.lock().unwrap().push(text.to_string());
            if self.fail {
                Err(PostError::Other("403 forbidden".into()))
            } else {
                Ok(PostId(format!("id-{}", self.posts.lock().unwrap().len())))
            }
        }
    }

    fn art(n: u32) -> Article {
        Article::new(format!("Story {n}"), format!("https://news.example/{n}"))
    }

    fn summarizer() -> Arc<FakeSummarizer> {
        Arc::new(FakeSummarizer {
            reply: Some("Unbelievable".into()),
        })
    }

    fn monitor(
        dir: &tempfile::TempDir,
        source: Arc<FakeSource>,
        summarizer: Arc<FakeSummarizer>,
        publisher: Arc<FakePublisher>,
    ) -> Monitor {
        Monitor::new(
            source,
            summarizer,
            publisher,
            SeenStore::new(dir.path().join("seen.json")),
            MonitorOptions::default(),
        )
    }

    #[tokio::test]
    async fn one_article_per_cycle_and_never_twice() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::with(vec![art(1), art(2)]);
        let publisher = Arc::new(FakePublisher::default());
        let mut m = monitor(&dir, source.clone(), summarizer(), publisher.clone());

        let first = m.run_cycle().await;
        assert!(matches!(first, CycleOutcome::Posted { ref url, .. } if url == &art(1).url));
        let second = m.run_cycle().await;
        assert!(matches!(second, CycleOutcome::Posted { ref url, .. } if url == &art(2).url));
        assert_eq!(m.run_cycle().await, CycleOutcome::NoNewArticle);

        assert_eq!(*source.fetched.lock().unwrap(), vec![art(1).url, art(2).url]);
        assert_eq!(publisher.posts.lock().unwrap().len(), 2);
        assert_eq!(m.state(), CycleState::Pruning);
    }

    #[tokio::test]
    async fn posts_are_wrapped_with_prefix_and_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Arc::new(FakePublisher::default());
        let mut m = monitor(&dir, FakeSource::with(vec![art(1)]), summarizer(), publisher.clone());

        m.run_cycle().await;
        assert_eq!(
            publisher.posts.lock().unwrap()[0],
            "👀 BREAKING: \n\nUnbelievable: Story 1\n\nWhat do you think?"
        );
    }

    #[tokio::test]
    async fn seen_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Arc::new(FakePublisher::default());
        let mut m = monitor(&dir, FakeSource::with(vec![art(1)]), summarizer(), publisher.clone());
        m.run_cycle().await;
        drop(m);

        let mut restarted = monitor(&dir, FakeSource::with(vec![art(1)]), summarizer(), publisher.clone());
        assert!(restarted.seen().contains(&art(1).url));
        assert_eq!(restarted.run_cycle().await, CycleOutcome::NoNewArticle);
        assert_eq!(publisher.posts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn generation_failure_keeps_article_seen() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Arc::new(FakePublisher::default());
        let mut m = monitor(
            &dir,
            FakeSource::with(vec![art(1)]),
            Arc::new(FakeSummarizer { reply: None }),
            publisher.clone(),
        );

        let outcome = m.run_cycle().await;
        assert!(matches!(
            outcome,
            CycleOutcome::Skipped { reason: SkipReason::GenerationFailed(_), .. }
        ));
        assert!(m.seen().contains(&art(1).url));
        assert!(publisher.posts.lock().unwrap().is_empty());
        assert_eq!(m.run_cycle().await, CycleOutcome::NoNewArticle);
    }

    #[tokio::test]
    async fn empty_content_skips_generation() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeSource {
            articles: Mutex::new(vec![art(1)]),
            ..Default::default()
        });
        let publisher = Arc::new(FakePublisher::default());
        let mut m = monitor(&dir, source, summarizer(), publisher.clone());

        assert_eq!(
            m.run_cycle().await,
            CycleOutcome::Skipped {
                url: art(1).url,
                reason: SkipReason::EmptyContent
            }
        );
        assert!(publisher.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_failure_is_logged_and_article_stays_seen() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Arc::new(FakePublisher {
            fail: true,
            ..Default::default()
        });
        let mut m = monitor(&dir, FakeSource::with(vec![art(1)]), summarizer(), publisher);

        assert!(matches!(m.run_cycle().await, CycleOutcome::PublishFailed { .. }));
        assert!(m.seen().contains(&art(1).url));
    }

    #[tokio::test]
    async fn list_failure_still_prunes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        let old = (Utc::now() - chrono::Duration::hours(25)).to_rfc3339();
        let fresh = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
        std::fs::write(
            &path,
            format!(
                r#"{{"https://news.example/old": {{"title": "Old", "timestamp": "{old}"}},
                    "https://news.example/new": {{"title": "New", "timestamp": "{fresh}"}}}}"#
            ),
        )
        .unwrap();

        let source = FakeSource::with(vec![]);
        *source.fail_list.lock().unwrap() = true;
        let mut m = monitor(&dir, source, summarizer(), Arc::new(FakePublisher::default()));

        assert_eq!(m.run_cycle().await, CycleOutcome::ListFailed);
        assert!(!m.seen().contains("https://news.example/old"));
        assert!(m.seen().contains("https://news.example/new"));

        let on_disk = SeenStore::new(&path).load().unwrap();
        assert_eq!(on_disk.len(), 1);
    }

    #[tokio::test]
    async fn save_failure_keeps_in_memory_mark() {
        let dir = tempfile::tempdir().unwrap();
        // The ledger path is a directory, so every save fails.
        let store_path = dir.path().join("ledger");
        std::fs::create_dir(&store_path).unwrap();

        let publisher = Arc::new(FakePublisher::default());
        let mut m = Monitor::new(
            FakeSource::with(vec![art(1)]),
            summarizer(),
            publisher.clone(),
            SeenStore::new(&store_path),
            MonitorOptions::default(),
        );

        assert!(matches!(m.run_cycle().await, CycleOutcome::Posted { .. }));
        assert_eq!(m.run_cycle().await, CycleOutcome::NoNewArticle);
        assert_eq!(publisher.posts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_ledger_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("seen.json"), "not json").unwrap();
        let m = monitor(
            &dir,
            FakeSource::with(vec![]),
            summarizer(),
            Arc::new(FakePublisher::default()),
        );
        assert!(m.seen().is_empty());
    }

    #[tokio::test]
    async fn run_once_ignores_history() {
        let source = FakeSource::with(vec![art(1), art(2)]);
        let publisher = FakePublisher::default();
        let id = run_once(
            source.as_ref(),
            summarizer().as_ref(),
            &publisher,
            &PostFormat::default(),
        )
        .await
        .unwrap();
        assert_eq!(id, PostId("id-1".into()));
        assert_eq!(*source.fetched.lock().unwrap(), vec![art(1).url]);
    }

    #[tokio::test]
    async fn run_once_with_empty_list_errors() {
        let err = run_once(
            FakeSource::with(vec![]).as_ref(),
            summarizer().as_ref(),
            &FakePublisher::default(),
            &PostFormat::default(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("no articles"));
    }

    #[test]
    fn compose_fits_limit_with_ellipsis() {
        let format = PostFormat {
            prefix: "P:".into(),
            suffix: ":S".into(),
            max_chars: 14,
        };
        assert_eq!(compose_post("short", &format), "P:short:S");
        let long = compose_post("abcdefghijklmnop", &format);
        assert_eq!(long, "P:abcdefghi…:S");
        assert_eq!(long.chars().count(), 14);
    }

    #[test]
    fn compose_default_frame() {
        let post = compose_post("  Wow  ", &PostFormat::default());
        assert_eq!(post, "👀 BREAKING: \n\nWow\n\nWhat do you think?");
    }

    struct PanickySource {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl ArticleSource for PanickySource {
        async fn list_latest(&self) -> newsrant_common::Result<Vec<Article>> {
            *self.calls.lock().unwrap() += 1;
            panic!("parser blew up");
        }

        async fn fetch_content(&self, _url: &str) -> String {
            String::new()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_cycle_pauses_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(PanickySource {
            calls: Mutex::new(0),
        });
        let mut m = Monitor::new(
            source.clone(),
            summarizer(),
            Arc::new(FakePublisher::default()),
            SeenStore::new(dir.path().join("seen.json")),
            MonitorOptions::default(),
        );

        let _ = tokio::time::timeout(Duration::from_secs(130), m.run()).await;
        // error pause of 60s between attempts: t=0, 60, 120
        assert_eq!(*source.calls.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_keeps_polling_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::with(vec![art(1)]);
        let publisher = Arc::new(FakePublisher::default());
        let mut m = monitor(&dir, source.clone(), summarizer(), publisher.clone());

        let _ = tokio::time::timeout(Duration::from_secs(1250), m.run()).await;
        // cycles at t=0, 600, 1200
        assert_eq!(publisher.posts.lock().unwrap().len(), 1);
        assert_eq!(source.fetched.lock().unwrap().len(), 1);
        assert!(m.seen().contains(&art(1).url));
    }
}

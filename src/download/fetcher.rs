//! Sequential, retried, politeness-paced fetching of planned items.
//!
//! The [`Fetcher`] walks the to-fetch list one item at a time. For every item
//! it waits out the politeness delay, fetches through the authenticated
//! session with retry, sanitizes the markup, and hands it to the
//! [`ItemWriter`]. Per-item failures become [`FetchResult`]s; only an
//! unrecoverable authentication failure stops the loop.

use std::path::PathBuf;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::client::get_page;
use super::error::FetchError;
use super::pacer::{PolitenessPacer, parse_retry_after};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use crate::auth::{AuthError, AuthSession};
use crate::catalogue::AvailabilityItem;
use crate::config::SyncConfig;
use crate::sanitize::sanitize;
use crate::storage::ItemWriter;

/// Outcome of one planned item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Content fetched and persisted.
    Success,
    /// Retries exhausted, permanent HTTP failure, or write failure.
    Failed,
}

/// Result recorded for one planned item.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Catalogue date of the item.
    pub date: NaiveDate,
    /// Whether the item ended up on disk.
    pub outcome: FetchOutcome,
    /// HTTP requests issued for the item, including a re-authenticated retry.
    pub attempts: u32,
    /// Last error message for failed items.
    pub last_error: Option<String>,
    /// Final path for persisted items.
    pub path: Option<PathBuf>,
}

impl FetchResult {
    fn success(date: NaiveDate, attempts: u32, path: PathBuf) -> Self {
        Self {
            date,
            outcome: FetchOutcome::Success,
            attempts,
            last_error: None,
            path: Some(path),
        }
    }

    fn failed(date: NaiveDate, attempts: u32, error: impl ToString) -> Self {
        Self {
            date,
            outcome: FetchOutcome::Failed,
            attempts,
            last_error: Some(error.to_string()),
            path: None,
        }
    }

    /// Returns true when the item was persisted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == FetchOutcome::Success
    }
}

/// Results of a fetch loop.
#[derive(Debug, Default)]
pub struct FetchRun {
    /// One result per item that was started, in processing order.
    pub results: Vec<FetchResult>,
    /// True when the loop stopped early because of cancellation.
    pub cancelled: bool,
}

/// Body (or final error) of one URL after retries.
#[derive(Debug)]
pub struct FetchAttempt {
    /// HTTP requests issued.
    pub attempts: u32,
    /// The page body, or the error that ended the retry loop.
    pub content: Result<String, FetchError>,
}

/// Retried, paced fetcher for one run.
#[derive(Debug)]
pub struct Fetcher {
    policy: RetryPolicy,
    pacer: PolitenessPacer,
}

impl Fetcher {
    /// Creates a fetcher from an explicit retry policy and pacer.
    #[must_use]
    pub fn new(policy: RetryPolicy, pacer: PolitenessPacer) -> Self {
        Self { policy, pacer }
    }

    /// Creates a fetcher from the run configuration.
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            RetryPolicy::from(&config.retry),
            PolitenessPacer::from(&config.politeness),
        )
    }

    /// Returns the retry policy in use.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches every item in order, persisting successful bodies.
    ///
    /// Cancellation is honoured between items and during politeness pauses;
    /// an item already in flight is finished first.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the session cannot be re-established or is
    /// challenged again right after re-authentication. Results gathered before
    /// the failure are dropped with the error, but their files stay on disk.
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn fetch_all(
        &mut self,
        items: &[AvailabilityItem],
        session: &mut AuthSession,
        writer: &ItemWriter,
        cancel: &CancellationToken,
    ) -> Result<FetchRun, AuthError> {
        let mut run = FetchRun::default();

        for item in items {
            if !self.pacer.wait(cancel).await {
                info!(
                    completed = run.results.len(),
                    remaining = items.len() - run.results.len(),
                    "fetch loop cancelled"
                );
                run.cancelled = true;
                break;
            }

            let result = self.process_item(item, session, writer).await;
            self.pacer.record_request();
            run.results.push(result?);
        }

        Ok(run)
    }

    async fn process_item(
        &self,
        item: &AvailabilityItem,
        session: &mut AuthSession,
        writer: &ItemWriter,
    ) -> Result<FetchResult, AuthError> {
        let attempt = self.attempt_fetch(item, session).await?;
        let body = match attempt.content {
            Ok(body) => body,
            Err(error) => {
                warn!(date = %item.date, attempts = attempt.attempts, error = %error, "item failed");
                return Ok(FetchResult::failed(item.date, attempt.attempts, error));
            }
        };

        let cleaned = sanitize(&body);
        match writer.persist(item.date, &cleaned).await {
            Ok(path) => {
                info!(
                    date = %item.date,
                    attempts = attempt.attempts,
                    bytes = cleaned.len(),
                    path = %path.display(),
                    "item stored"
                );
                Ok(FetchResult::success(item.date, attempt.attempts, path))
            }
            Err(error) => {
                warn!(date = %item.date, error = %error, "item fetched but not stored");
                Ok(FetchResult::failed(item.date, attempt.attempts, error))
            }
        }
    }

    /// Fetches one catalogue item's content through the session.
    ///
    /// # Errors
    ///
    /// See [`fetch_with_retry`](Self::fetch_with_retry).
    #[instrument(skip_all, fields(date = %item.date))]
    pub async fn attempt_fetch(
        &self,
        item: &AvailabilityItem,
        session: &mut AuthSession,
    ) -> Result<FetchAttempt, AuthError> {
        self.fetch_with_retry(&item.source_url, session).await
    }

    /// Fetches a URL with the retry policy and a single transparent re-login.
    ///
    /// Transient and rate-limited failures are retried until the policy gives
    /// up; the final error is returned in [`FetchAttempt::content`]. An auth
    /// challenge marks the session expired, re-authenticates, and repeats the
    /// request once without consuming a retry.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when re-authentication fails, or when the
    /// refreshed session is challenged again.
    #[instrument(skip(self, session), fields(url = %url))]
    pub async fn fetch_with_retry(
        &self,
        url: &str,
        session: &mut AuthSession,
    ) -> Result<FetchAttempt, AuthError> {
        session.ensure_valid().await?;

        let mut requests: u32 = 0;
        let mut attempt: u32 = 1;
        let mut reauthenticated = false;

        loop {
            requests += 1;
            let error = match get_page(session.http(), url).await {
                Ok(body) => {
                    return Ok(FetchAttempt {
                        attempts: requests,
                        content: Ok(body),
                    });
                }
                Err(error) => error,
            };

            let failure_type = classify_error(&error);
            if failure_type == FailureType::AuthChallenge {
                if reauthenticated {
                    warn!(error = %error, "challenged again after re-authentication");
                    session.mark_expired();
                    return Err(AuthError::remote_rejected(format!(
                        "session rejected again after re-authentication: {error}"
                    )));
                }
                info!(error = %error, "session challenged, re-authenticating");
                session.mark_expired();
                session.ensure_valid().await?;
                reauthenticated = true;
                continue;
            }

            let hint = error.retry_after().and_then(parse_retry_after);
            match self
                .policy
                .should_retry_with_hint(failure_type, attempt, hint)
            {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next_attempt;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(attempt, reason = %reason, "giving up");
                    return Ok(FetchAttempt {
                        attempts: requests,
                        content: Err(error),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::catalogue::AccessLevel;
    use crate::config::Credentials;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    fn fast_config(base_url: &str, storage: &std::path::Path) -> SyncConfig {
        let mut config = SyncConfig::new(base_url, storage);
        config.retry.min_backoff = Duration::from_millis(1);
        config.retry.max_backoff = Duration::from_millis(5);
        config.retry.max_jitter = Duration::ZERO;
        config.politeness.min_delay = Duration::ZERO;
        config.politeness.max_delay = Duration::ZERO;
        config.session.login_delay = Duration::ZERO;
        config
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>home</html>"))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ajax/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"success": true, "alert": ""}"#)
                    .insert_header("Set-Cookie", "sid=abc; Path=/"),
            )
            .mount(server)
            .await;
    }

    fn item(server: &MockServer, day: u32) -> AvailabilityItem {
        AvailabilityItem {
            date: NaiveDate::from_ymd_opt(2025, 8, day).unwrap(),
            access: AccessLevel::Fetchable,
            source_url: format!("{}/content/{day}", server.uri()),
        }
    }

    struct ChallengeOnce {
        calls: Arc<AtomicU32>,
    }

    impl Respond for ChallengeOnce {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(401)
            } else {
                ResponseTemplate::new(200).set_body_string("<p>item</p>")
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_all_success_persists_sanitized_content() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/content/12"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<p>hola</p><script>x()</script><img src=a.png>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = fast_config(&server.uri(), dir.path());
        let mut session =
            AuthSession::from_config(&config, Credentials::new("user@example.com", "pw")).unwrap();
        session.authenticate().await.unwrap();

        let writer = ItemWriter::new(dir.path(), "html");
        let mut fetcher = Fetcher::from_config(&config);
        let run = fetcher
            .fetch_all(&[item(&server, 12)], &mut session, &writer, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.results.len(), 1);
        assert!(run.results[0].is_success());
        assert_eq!(run.results[0].attempts, 1);
        let stored = std::fs::read_to_string(dir.path().join("item_2025-08-12.html")).unwrap();
        assert_eq!(stored, "<p>hola</p>");
    }

    #[tokio::test]
    async fn test_transient_failures_exhaust_exactly_max_attempts() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/content/12"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = fast_config(&server.uri(), dir.path());
        let mut session =
            AuthSession::from_config(&config, Credentials::new("user@example.com", "pw")).unwrap();
        session.authenticate().await.unwrap();

        let fetcher = Fetcher::from_config(&config);
        let attempt = fetcher
            .attempt_fetch(&item(&server, 12), &mut session)
            .await
            .unwrap();
        assert_eq!(attempt.attempts, 3);
        assert!(matches!(
            attempt.content,
            Err(FetchError::HttpStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/content/12"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = fast_config(&server.uri(), dir.path());
        let mut session =
            AuthSession::from_config(&config, Credentials::new("user@example.com", "pw")).unwrap();
        session.authenticate().await.unwrap();

        let attempt = Fetcher::from_config(&config)
            .attempt_fetch(&item(&server, 12), &mut session)
            .await
            .unwrap();
        assert_eq!(attempt.attempts, 1);
        assert!(attempt.content.is_err());
    }

    #[tokio::test]
    async fn test_auth_challenge_reauthenticates_once_and_retries() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/content/12"))
            .respond_with(ChallengeOnce {
                calls: Arc::new(AtomicU32::new(0)),
            })
            .expect(2)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = fast_config(&server.uri(), dir.path());
        let mut session =
            AuthSession::from_config(&config, Credentials::new("user@example.com", "pw")).unwrap();
        session.authenticate().await.unwrap();

        let attempt = Fetcher::from_config(&config)
            .attempt_fetch(&item(&server, 12), &mut session)
            .await
            .unwrap();
        assert_eq!(attempt.attempts, 2);
        assert_eq!(attempt.content.unwrap(), "<p>item</p>");
        assert!(session.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_second_auth_challenge_aborts_run() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/content/12"))
            .respond_with(ResponseTemplate::new(403))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/content/13"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>never</p>"))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = fast_config(&server.uri(), dir.path());
        let mut session =
            AuthSession::from_config(&config, Credentials::new("user@example.com", "pw")).unwrap();
        session.authenticate().await.unwrap();

        let writer = ItemWriter::new(dir.path(), "html");
        let err = Fetcher::from_config(&config)
            .fetch_all(
                &[item(&server, 12), item(&server, 13)],
                &mut session,
                &writer,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::RemoteRejected { .. }));
    }

    #[tokio::test]
    async fn test_write_failure_is_recorded_and_next_item_still_stored() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        mount_login(&server).await;
        for day in [12, 13] {
            Mock::given(method("GET"))
                .and(path(format!("/content/{day}")))
                .respond_with(ResponseTemplate::new(200).set_body_string(format!("<p>{day}</p>")))
                .expect(1)
                .mount(&server)
                .await;
        }

        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory squatting on the canonical name makes the rename fail.
        let blocker = dir.path().join("item_2025-08-12.html");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), "x").unwrap();

        let config = fast_config(&server.uri(), dir.path());
        let mut session =
            AuthSession::from_config(&config, Credentials::new("user@example.com", "pw")).unwrap();
        session.authenticate().await.unwrap();

        let writer = ItemWriter::new(dir.path(), "html");
        let run = Fetcher::from_config(&config)
            .fetch_all(
                &[item(&server, 12), item(&server, 13)],
                &mut session,
                &writer,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(run.results.len(), 2);
        let failed = &run.results[0];
        assert_eq!(failed.outcome, FetchOutcome::Failed);
        assert_eq!(failed.attempts, 1);
        assert!(failed.path.is_none());
        let message = failed.last_error.as_deref().unwrap();
        assert!(message.contains("item_2025-08-12.html"), "{message}");

        assert!(run.results[1].is_success());
        let stored = std::fs::read_to_string(dir.path().join("item_2025-08-13.html")).unwrap();
        assert_eq!(stored, "<p>13</p>");
        assert!(blocker.is_dir());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_fetches_nothing() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/content/12"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>x</p>"))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = fast_config(&server.uri(), dir.path());
        let mut session =
            AuthSession::from_config(&config, Credentials::new("user@example.com", "pw")).unwrap();
        session.authenticate().await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let writer = ItemWriter::new(dir.path(), "html");
        let run = Fetcher::from_config(&config)
            .fetch_all(&[item(&server, 12)], &mut session, &writer, &cancel)
            .await
            .unwrap();
        assert!(run.cancelled);
        assert!(run.results.is_empty());
    }
}

/// Background e-mail notifications
///
/// Verification e-mails are sent off the request path. Requests submit an
/// [`Email`] through a cloneable [`Notifier`]; a fixed set of worker tasks
/// drains a bounded queue and hands each message to an [`EmailSender`].
///
/// Delivery is fire-and-forget: a full queue, a closed pool or a failed
/// send is logged and the message is dropped. Nothing is retried.
///
/// # Architecture
///
/// ```text
/// handler ── Notifier::submit ──> mpsc (bounded) ──> worker 1..N ──> EmailSender
///                                                      ^
///                                     CancellationToken (shutdown)
/// ```
///
/// # Example
///
/// ```no_run
/// use managify_shared::notify::{LogEmailSender, NotificationPool, NotifierConfig};
/// use std::sync::Arc;
///
/// # async fn example() {
/// let pool = NotificationPool::start(Arc::new(LogEmailSender), NotifierConfig::default());
/// let notifier = pool.notifier();
///
/// notifier.send_verification("ada@example.com", "5f0c6d2a");
///
/// pool.shutdown().await;
/// # }
/// ```

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Error type for e-mail delivery
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("E-mail relay request failed: {0}")]
    Relay(#[from] reqwest::Error),

    #[error("E-mail relay rejected message with status {0}")]
    Rejected(u16),
}

/// An outgoing e-mail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    /// Verification message pointing at `{base_url}/v1/auth/verify-email`
    pub fn verification(to: &str, token: &str, base_url: &str) -> Self {
        let link = format!(
            "{}/v1/auth/verify-email?token={}",
            base_url.trim_end_matches('/'),
            token
        );

        Self {
            to: to.to_string(),
            subject: "Verify your Managify account".to_string(),
            body: format!("Welcome to Managify! Confirm your e-mail address by opening {}", link),
        }
    }
}

/// Delivers one e-mail
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), NotifyError>;
}

/// Sender that only writes the message to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        tracing::info!(to = %email.to, subject = %email.subject, "E-mail (log sender)");
        tracing::debug!(body = %email.body, "E-mail body");
        Ok(())
    }
}

/// Sender that POSTs the message as JSON to an HTTP relay
#[derive(Debug, Clone)]
pub struct RelayEmailSender {
    client: reqwest::Client,
    url: String,
}

impl RelayEmailSender {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl EmailSender for RelayEmailSender {
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(email).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }

        Ok(())
    }
}

/// Notification pool configuration
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Number of worker tasks
    pub workers: usize,

    /// Queue capacity; submissions beyond it are dropped
    pub queue_size: usize,

    /// Base URL used in verification links
    pub base_url: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        NotifierConfig {
            workers: 2,
            queue_size: 256,
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

/// Cloneable submission handle
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Email>,
    base_url: Arc<str>,
}

impl Notifier {
    /// Queues an e-mail without waiting
    ///
    /// Returns whether the message was accepted by the queue.
    pub fn submit(&self, email: Email) -> bool {
        match self.tx.try_send(email) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(email)) => {
                tracing::warn!(to = %email.to, "Notification queue full, dropping e-mail");
                false
            }
            Err(mpsc::error::TrySendError::Closed(email)) => {
                tracing::warn!(to = %email.to, "Notification pool stopped, dropping e-mail");
                false
            }
        }
    }

    /// Queues the verification e-mail for `to`
    pub fn send_verification(&self, to: &str, token: &str) -> bool {
        self.submit(Email::verification(to, token, &self.base_url))
    }
}

/// Worker pool draining the notification queue
pub struct NotificationPool {
    notifier: Notifier,
    shutdown_token: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl NotificationPool {
    /// Spawns the workers on the current Tokio runtime
    pub fn start(sender: Arc<dyn EmailSender>, config: NotifierConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_size.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let shutdown_token = CancellationToken::new();

        let workers = (0..config.workers.max(1))
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    rx.clone(),
                    sender.clone(),
                    shutdown_token.clone(),
                ))
            })
            .collect();

        tracing::info!(
            workers = config.workers.max(1),
            queue_size = config.queue_size.max(1),
            "Notification pool started"
        );

        Self {
            notifier: Notifier {
                tx,
                base_url: Arc::from(config.base_url.as_str()),
            },
            shutdown_token,
            workers,
        }
    }

    /// Submission handle for services
    pub fn notifier(&self) -> Notifier {
        self.notifier.clone()
    }

    /// Stops the workers; queued messages that were not picked up are dropped
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();

        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Notification worker panicked");
            }
        }

        tracing::info!("Notification pool stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<Email>>>,
    sender: Arc<dyn EmailSender>,
    shutdown_token: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = shutdown_token.cancelled() => break,
            email = async { rx.lock().await.recv().await } => email,
        };

        let Some(email) = next else {
            break;
        };

        let result = tokio::select! {
            _ = shutdown_token.cancelled() => break,
            result = sender.send(&email) => result,
        };

        match result {
            Ok(()) => tracing::debug!(worker_id, to = %email.to, "E-mail sent"),
            Err(e) => tracing::warn!(worker_id, to = %email.to, error = %e, "E-mail dropped"),
        }
    }
}

//! NATS client implementation with JetStream support.

use anyhow::Result;
use async_nats::jetstream::consumer::pull::Config as PullConfig;
use async_nats::jetstream::consumer::{AckPolicy, PullConsumer};
use async_nats::jetstream::{self, stream::Stream};
use async_nats::{Client, HeaderMap, Subscriber};
use std::time::Duration;
use tracing::info;

/// Maximum delivery attempts for a job before the server stops redelivering.
pub const DEFAULT_JOB_MAX_DELIVER: i64 = 3;

/// How long a pulled job may stay unacknowledged before redelivery.
pub const DEFAULT_JOB_ACK_WAIT_SECS: u64 = 120;

/// Window in which a re-published job with the same message id is dropped.
const DEFAULT_DEDUP_WINDOW_SECS: u64 = 600;

/// Configuration for the durable job queue stream and its worker consumer.
#[derive(Debug, Clone)]
pub struct JobQueueConfig {
    /// Stream name.
    pub stream: String,
    /// Subject the stream captures.
    pub subject: String,
    /// Durable consumer name shared by all workers.
    pub consumer: String,
    /// Maximum delivery attempts per job.
    pub max_deliver: i64,
    /// Ack wait before a job is considered lost and redelivered.
    pub ack_wait: Duration,
    /// Redelivery backoff schedule (exponential by default).
    pub backoff: Vec<Duration>,
    /// Server-side duplicate-suppression window.
    pub dedup_window: Duration,
}

impl JobQueueConfig {
    /// Queue config for a stream/subject/consumer triple with the default
    /// retry policy: 3 attempts, 2s then 8s backoff, 10 minute dedup window.
    /// The server requires the backoff list to stay shorter than
    /// `max_deliver`.
    pub fn new(
        stream: impl Into<String>,
        subject: impl Into<String>,
        consumer: impl Into<String>,
    ) -> Self {
        Self {
            stream: stream.into(),
            subject: subject.into(),
            consumer: consumer.into(),
            max_deliver: DEFAULT_JOB_MAX_DELIVER,
            ack_wait: Duration::from_secs(DEFAULT_JOB_ACK_WAIT_SECS),
            backoff: vec![Duration::from_secs(2), Duration::from_secs(8)],
            dedup_window: Duration::from_secs(DEFAULT_DEDUP_WINDOW_SECS),
        }
    }

    /// Set the maximum delivery attempts.
    pub fn with_max_deliver(mut self, attempts: i64) -> Self {
        self.max_deliver = attempts;
        self
    }
}

/// Wrapper around the NATS client with JetStream context.
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
    jetstream: jetstream::Context,
}

impl NatsClient {
    /// Connect to a NATS server and create a JetStream context.
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);
        let client = async_nats::connect(url).await?;
        let jetstream = jetstream::new(client.clone());

        Ok(Self { client, jetstream })
    }

    /// Subscribe to a subject pattern using NATS Core (low-latency push).
    /// Messages are delivered immediately as they arrive - no polling.
    pub async fn subscribe(&self, subject: &str) -> Result<Subscriber> {
        info!("Subscribing to subject pattern: {}", subject);
        let subscriber = self.client.subscribe(subject.to_string()).await?;
        Ok(subscriber)
    }

    /// Create or get the work-queue stream for order jobs.
    ///
    /// Work-queue retention removes a message once a consumer acknowledges
    /// it; the duplicate window enforces the queue's uniqueness key at the
    /// server (a re-enqueue of the same order id inside the window is
    /// silently dropped).
    pub async fn ensure_job_stream(&self, config: &JobQueueConfig) -> Result<Stream> {
        info!(
            "Ensuring job stream '{}' exists (subject: {}, dedup window: {}s)",
            config.stream,
            config.subject,
            config.dedup_window.as_secs()
        );

        let stream = self
            .jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: config.stream.clone(),
                subjects: vec![config.subject.clone()],
                retention: jetstream::stream::RetentionPolicy::WorkQueue,
                duplicate_window: config.dedup_window,
                storage: jetstream::stream::StorageType::File,
                ..Default::default()
            })
            .await?;

        info!("Job stream '{}' ready", config.stream);
        Ok(stream)
    }

    /// Create or get the durable pull consumer the worker pool shares.
    ///
    /// Explicit acks; `max_deliver` bounds attempts and `backoff` spaces
    /// redeliveries, so a crashing job is retried a fixed number of times
    /// with exponential delay and then dropped by the server.
    pub async fn job_consumer(&self, config: &JobQueueConfig) -> Result<PullConsumer> {
        let stream = self.ensure_job_stream(config).await?;

        let consumer = stream
            .get_or_create_consumer(
                &config.consumer,
                PullConfig {
                    durable_name: Some(config.consumer.clone()),
                    ack_policy: AckPolicy::Explicit,
                    ack_wait: config.ack_wait,
                    max_deliver: config.max_deliver,
                    backoff: config.backoff.clone(),
                    ..Default::default()
                },
            )
            .await?;

        info!(
            "Job consumer '{}' ready (max {} deliveries)",
            config.consumer, config.max_deliver
        );
        Ok(consumer)
    }

    /// Enqueue a job with a deduplication id (with acknowledgment).
    ///
    /// The server drops the publish if a message with the same id was seen
    /// inside the stream's duplicate window.
    pub async fn publish_job(
        &self,
        subject: impl Into<String>,
        dedup_id: &str,
        payload: bytes::Bytes,
    ) -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert("Nats-Msg-Id", dedup_id);

        self.jetstream
            .publish_with_headers(subject.into(), headers, payload)
            .await?
            .await?;
        Ok(())
    }

    /// Publish a message using NATS Core (fire-and-forget, lowest latency).
    ///
    /// Status updates use this path: at-most-once by design, no delivery
    /// guarantee - the order store stays the source of truth.
    pub async fn publish_fast(&self, subject: &str, payload: bytes::Bytes) -> Result<()> {
        self.client.publish(subject.to_string(), payload).await?;
        Ok(())
    }

    /// Get the underlying JetStream context.
    pub fn context(&self) -> &jetstream::Context {
        &self.jetstream
    }
}

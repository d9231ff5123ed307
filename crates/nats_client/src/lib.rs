//! NATS client wrapper: core pub/sub for the status channel and JetStream
//! for the durable order job queue.

mod client;

pub use client::{JobQueueConfig, NatsClient, DEFAULT_JOB_ACK_WAIT_SECS, DEFAULT_JOB_MAX_DELIVER};

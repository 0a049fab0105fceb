//! The "Generate" action and the request contract of the image service.
//!
//! No service is called. [`Generator`] waits a fixed delay and then hands back
//! a placeholder URL. [`GenerateRequest`] and [`LoraConfig`] describe what a
//! real request would carry and are not built by the session.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::GenerateError;

/// One style adapter applied during generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoraConfig {
    pub name: String,
    pub model_weight: f64,
    pub clip_weight: f64,
}

/// Body of a generation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub loras: Vec<LoraConfig>,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
}

/// Stubbed request/response cycle.
pub struct Generator {
    delay: Duration,
    timeout: Duration,
    placeholder_url: String,
    started: Option<Instant>,
}

impl Generator {
    pub fn new(delay: Duration, timeout: Duration, placeholder_url: impl Into<String>) -> Self {
        Self {
            delay,
            timeout,
            placeholder_url: placeholder_url.into(),
            started: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.started.is_some()
    }

    /// Start a generation. Returns `false` if one is already running.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.started.is_some() {
            return false;
        }
        log::info!("generation started");
        self.started = Some(now);
        true
    }

    /// Check the pending generation. Yields the new image URL once the delay
    /// has passed, or a timeout error if the timeout is shorter than the delay.
    pub fn poll(&mut self, now: Instant) -> Option<Result<String, GenerateError>> {
        let started = self.started?;
        let elapsed = now.saturating_duration_since(started);
        if self.timeout < self.delay && elapsed >= self.timeout {
            self.started = None;
            log::warn!("generation timed out after {:?}", self.timeout);
            return Some(Err(GenerateError::TimedOut(self.timeout.as_millis())));
        }
        if elapsed >= self.delay {
            self.started = None;
            log::info!("generation finished: {}", self.placeholder_url);
            return Some(Ok(self.placeholder_url.clone()));
        }
        None
    }

    /// Time left until [`Generator::poll`] has something to say.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let started = self.started?;
        let due = self.delay.min(self.timeout);
        Some(due.saturating_sub(now.saturating_duration_since(started)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finishes_after_delay() {
        let mut g = Generator::new(Duration::from_millis(1000), Duration::from_secs(30), "/api/placeholder/512/512");
        let t0 = Instant::now();
        assert!(g.poll(t0).is_none());
        assert!(g.start(t0));
        assert!(g.is_loading());
        assert!(!g.start(t0), "second start while loading is ignored");
        assert!(g.poll(t0 + Duration::from_millis(999)).is_none());
        assert_eq!(g.remaining(t0 + Duration::from_millis(400)), Some(Duration::from_millis(600)));
        assert_eq!(
            g.poll(t0 + Duration::from_millis(1000)),
            Some(Ok("/api/placeholder/512/512".to_string()))
        );
        assert!(!g.is_loading());
        assert!(g.poll(t0 + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn times_out_when_delay_exceeds_timeout() {
        let mut g = Generator::new(Duration::from_secs(10), Duration::from_millis(300), "/x.png");
        let t0 = Instant::now();
        g.start(t0);
        assert_eq!(
            g.poll(t0 + Duration::from_millis(300)),
            Some(Err(GenerateError::TimedOut(300)))
        );
        assert!(!g.is_loading());
    }

    #[test]
    fn request_json_shape() {
        let req = GenerateRequest {
            prompt: "a cat".into(),
            loras: vec![LoraConfig {
                name: "ink".into(),
                model_weight: 0.8,
                clip_weight: 0.5,
            }],
            width: 512,
            height: 512,
            steps: 20,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["loras"][0]["model_weight"], 0.8);
        assert_eq!(value["loras"][0]["clip_weight"], 0.5);
        assert_eq!(value["steps"], 20);
        let back: GenerateRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back, req);
    }
}

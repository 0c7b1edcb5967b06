// [crates/consultease-router/src/router.rs]
/*!
 * Declarative message dispatch (spec §4.4 "Message Router"). Routes
 * are tried in insertion order; a topic may match more than one route,
 * in which case every matching route's handler runs (spec: "a matched
 * rule may duplicate the message to additional subscribers"). Each
 * route carries its own optional rate limiter.
 */

use crate::errors::RouterError;
use crate::pattern::TopicPattern;
use crate::ratelimit::{RateLimitConfig, TokenBucket};
use crate::topics::TopicKind;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{instrument, warn};

/// Maximum payload size accepted on any route (spec §4.4, §8).
pub const MAX_PAYLOAD_BYTES: usize = 4096;

/// A message that matched a route, with its captured path parameters.
#[derive(Debug, Clone)]
pub struct MatchedMessage {
    pub topic: String,
    pub kind: TopicKind,
    pub params: HashMap<String, String>,
    pub payload: Vec<u8>,
    /// Populated when the route declares `parse_json: true`.
    pub json: Option<serde_json::Value>,
}

impl MatchedMessage {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, message: MatchedMessage) -> Result<(), RouterError>;
}

pub struct Route {
    pub name: &'static str,
    pub kind: TopicKind,
    pub parse_json: bool,
    pattern: TopicPattern,
    handler: Box<dyn RouteHandler>,
    bucket: Option<TokenBucket>,
}

impl Route {
    pub fn new(name: &'static str, pattern: &str, kind: TopicKind, handler: Box<dyn RouteHandler>) -> Self {
        Self { name, kind, parse_json: true, pattern: TopicPattern::new(pattern), handler, bucket: None }
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.bucket = Some(TokenBucket::new(config));
        self
    }

    pub fn without_json(mut self) -> Self {
        self.parse_json = false;
        self
    }

    pub fn dropped_count(&self) -> u64 {
        self.bucket.as_ref().map(TokenBucket::dropped_count).unwrap_or(0)
    }
}

/// Prefixes the router accepts; anything else is rejected before a
/// route table lookup even happens (spec §4.4 "validates the topic
/// against an allow-list of prefixes").
const ALLOWED_PREFIXES: &[&str] = &["consultease/", "professor/"];

pub struct MessageRouter {
    routes: Vec<Route>,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageRouter {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn register(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Validates and dispatches `payload` on `topic` to every route
    /// whose pattern matches, in insertion order. Returns the number of
    /// routes that ran a handler.
    #[instrument(skip(self, payload), fields(topic, payload_len = payload.len()))]
    pub async fn dispatch(&self, topic: &str, payload: &[u8]) -> Result<usize, RouterError> {
        validate_topic(topic)?;
        validate_payload_size(payload)?;

        let mut dispatched = 0usize;
        for route in &self.routes {
            let Some(params) = route.pattern.matches(topic) else { continue };

            if let Some(bucket) = &route.bucket {
                if !bucket.try_acquire() {
                    warn!("route '{}' rate-limited, dropping message on '{topic}'", route.name);
                    continue;
                }
            }

            let json = if route.parse_json {
                match serde_json::from_slice(payload) {
                    Ok(value) => Some(value),
                    Err(source) => return Err(RouterError::MalformedJson { topic: topic.to_string(), source }),
                }
            } else {
                None
            };

            let message = MatchedMessage {
                topic: topic.to_string(),
                kind: route.kind,
                params,
                payload: payload.to_vec(),
                json,
            };

            route
                .handler
                .handle(message)
                .await
                .map_err(|e| RouterError::HandlerFailed(route.name.to_string(), e.to_string()))?;
            dispatched += 1;
        }

        Ok(dispatched)
    }
}

fn validate_topic(topic: &str) -> Result<(), RouterError> {
    if topic.contains("..") || topic.chars().any(|c| c.is_control()) {
        return Err(RouterError::TopicNotAllowed(topic.to_string()));
    }
    if ALLOWED_PREFIXES.iter().any(|prefix| topic.starts_with(prefix)) {
        Ok(())
    } else {
        Err(RouterError::TopicNotAllowed(topic.to_string()))
    }
}

fn validate_payload_size(payload: &[u8]) -> Result<(), RouterError> {
    if payload.len() > MAX_PAYLOAD_BYTES {
        Err(RouterError::PayloadTooLarge { actual: payload.len(), limit: MAX_PAYLOAD_BYTES })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl RouteHandler for CountingHandler {
        async fn handle(&self, _message: MatchedMessage) -> Result<(), RouterError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn rejects_disallowed_prefix() {
        let router = MessageRouter::new();
        let result = router.dispatch("evil/../topic", b"{}").await;
        assert!(matches!(result, Err(RouterError::TopicNotAllowed(_))));
    }

    #[tokio::test]
    async fn rejects_oversize_payload() {
        let router = MessageRouter::new();
        let oversize = vec![0u8; MAX_PAYLOAD_BYTES + 1];
        let result = router.dispatch("consultease/system/notifications", &oversize).await;
        assert!(matches!(result, Err(RouterError::PayloadTooLarge { .. })));
    }

    #[tokio::test]
    async fn accepts_payload_at_exact_limit() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut router = MessageRouter::new();
        router.register(Route::new(
            "status",
            "consultease/faculty/{id}/status",
            TopicKind::FacultyStatus,
            Box::new(CountingHandler(counter.clone())),
        ));

        let mut payload = vec![b' '; MAX_PAYLOAD_BYTES - 2];
        payload.insert(0, b'{');
        payload.push(b'}');
        let dispatched = router.dispatch("consultease/faculty/1/status", &payload).await.unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_routes_on_same_topic_both_fire() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut router = MessageRouter::new();
        router.register(Route::new(
            "status-primary",
            "consultease/faculty/{id}/status",
            TopicKind::FacultyStatus,
            Box::new(CountingHandler(counter.clone())),
        ));
        router.register(Route::new(
            "status-mirror",
            "consultease/faculty/{id}/status",
            TopicKind::FacultyStatus,
            Box::new(CountingHandler(counter.clone())),
        ));

        let dispatched = router.dispatch("consultease/faculty/1/status", b"{}").await.unwrap();
        assert_eq!(dispatched, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rate_limited_route_drops_excess() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut router = MessageRouter::new();
        router.register(
            Route::new(
                "status",
                "consultease/faculty/{id}/status",
                TopicKind::FacultyStatus,
                Box::new(CountingHandler(counter.clone())),
            )
            .with_rate_limit(RateLimitConfig::new(1.0, 0.0)),
        );

        router.dispatch("consultease/faculty/1/status", b"{}").await.unwrap();
        router.dispatch("consultease/faculty/1/status", b"{}").await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_matching_route_does_not_run() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut router = MessageRouter::new();
        router.register(Route::new(
            "heartbeat",
            "consultease/faculty/{id}/heartbeat",
            TopicKind::FacultyHeartbeat,
            Box::new(CountingHandler(counter.clone())),
        ));

        let dispatched = router.dispatch("consultease/faculty/1/status", b"{}").await.unwrap();
        assert_eq!(dispatched, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}

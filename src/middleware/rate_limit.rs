use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::utils::ApiResponse;

/// Fixed-window limiter fronting the webhook scope. The chat platform
/// retries undelivered webhooks aggressively; the limit caps what a
/// misbehaving or replayed delivery storm can reach the router with.
#[derive(Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 300,
            window_duration: Duration::from_secs(60),
        }
    }
}

struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    entries: Arc<RwLock<HashMap<String, RateLimitEntry>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let entry = entries.entry(key.to_string()).or_insert(RateLimitEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.config.window_duration {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.config.requests_per_window {
            return false;
        }

        entry.count += 1;
        true
    }

    pub async fn cleanup_old_entries(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| {
            now.duration_since(entry.window_start) < self.config.window_duration * 2
        });
    }
}

pub struct RateLimitMiddleware {
    limiter: Arc<RateLimiter>,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        })
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<RateLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let client_ip = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();

        let limiter = self.limiter.clone();
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            if !limiter.check(&client_ip).await {
                let (req, _payload) = req.into_parts();
                let response = HttpResponse::TooManyRequests().json(ApiResponse::<()>::error(
                    "Rate limit exceeded. Please try again later.",
                ));
                return Ok(ServiceResponse::new(req, response).map_into_right_body());
            }

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

/// Periodic cleanup so idle windows do not accumulate.
pub fn spawn_cleanup_task(limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            limiter.cleanup_old_entries().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn limiter_blocks_after_the_window_budget() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_window: 3,
            window_duration: Duration::from_secs(60),
        });
        for _ in 0..3 {
            assert!(limiter.check("1.2.3.4").await);
        }
        assert!(!limiter.check("1.2.3.4").await);
        // a different key has its own window
        assert!(limiter.check("5.6.7.8").await);
    }

    #[tokio::test]
    async fn window_resets_after_the_duration() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_window: 1,
            window_duration: Duration::from_millis(20),
        });
        assert!(limiter.check("k").await);
        assert!(!limiter.check("k").await);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(limiter.check("k").await);
    }
}

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Process-wide limiter for the admin surface. Manual settlement is a
/// human-paced operation; anything beyond a small burst is a client bug
/// or abuse.
#[derive(Clone)]
pub struct AdminRateLimit {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, governor::clock::DefaultClock>>,
}

impl AdminRateLimit {
    pub fn new(requests: u32, per_seconds: u64) -> Self {
        let quota = Quota::with_period(Duration::from_secs(per_seconds))
            .unwrap()
            .allow_burst(NonZeroU32::new(requests).unwrap());

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for AdminRateLimit {
    fn default() -> Self {
        // 30 admin calls per minute
        Self::new(30, 60)
    }
}

pub async fn admin_rate_limit(req: Request, next: Next) -> Result<impl IntoResponse, Response> {
    let limit = req
        .extensions()
        .get::<Arc<AdminRateLimit>>()
        .cloned()
        .unwrap_or_default();

    if !limit.check() {
        let response = (
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again later.",
        );
        return Err(response.into_response());
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_refusal() {
        let limit = AdminRateLimit::new(2, 60);
        assert!(limit.check());
        assert!(limit.check());
        assert!(!limit.check());
    }
}

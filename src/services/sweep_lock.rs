use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

/// Best-effort, in-process exclusion of concurrent sweeps per studio.
///
/// A lease expires on its own after `ttl`, so a sweep that hangs or panics
/// cannot block delivery forever. Separate processes do not see each other's
/// leases; the `pending -> processing` claim covers that case.
#[derive(Clone)]
pub struct SweepLease {
    ttl: Duration,
    held: Arc<Mutex<HashMap<String, Instant>>>,
}

/// Releases the lease when dropped.
pub struct LeaseGuard {
    tenant: String,
    acquired_at: Instant,
    held: Arc<Mutex<HashMap<String, Instant>>>,
}

impl SweepLease {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, held: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn try_acquire(&self, tenant: &str) -> Option<LeaseGuard> {
        let now = Instant::now();
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(since) = held.get(tenant) {
            if now.duration_since(*since) < self.ttl {
                return None;
            }
            tracing::warn!("Sweep lease for '{tenant}' expired, taking it over");
        }
        held.insert(tenant.to_string(), now);
        Some(LeaseGuard { tenant: tenant.to_string(), acquired_at: now, held: self.held.clone() })
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        // Only release our own lease, not one that took over after expiry.
        if held.get(&self.tenant) == Some(&self.acquired_at) {
            held.remove(&self.tenant);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn second_acquire_waits_for_release() {
        let lease = SweepLease::new(Duration::from_secs(300));
        let guard = lease.try_acquire("acme").unwrap();
        assert!(lease.try_acquire("acme").is_none());
        assert!(lease.try_acquire("other").is_some());

        drop(guard);
        assert!(lease.try_acquire("acme").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_lease_can_be_taken_over() {
        let lease = SweepLease::new(Duration::from_secs(300));
        let stale = lease.try_acquire("acme").unwrap();

        tokio::time::advance(Duration::from_secs(301)).await;
        let fresh = lease.try_acquire("acme").unwrap();

        drop(stale);
        assert!(lease.try_acquire("acme").is_none());
        drop(fresh);
        assert!(lease.try_acquire("acme").is_some());
    }
}

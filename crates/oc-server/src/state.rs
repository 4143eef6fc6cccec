//! Shared application state (spec.md §5 "Shared resources").
//!
//! Grounded on the teacher's `state.rs`: the same `AppState`-as-cheaply-
//! cloneable-bundle-of-Arcs shape, and the same RAII connection-count guards
//! verbatim (they are generic infrastructure with no game-specific coupling).

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::auth::SessionStore;
use crate::config::ServerConfig;
use crate::engine::GameEngine;
use crate::rate_limit::IpRateLimiter;
use crate::room_manager::RoomRegistry;

pub type SharedRoomRegistry = Arc<Mutex<RoomRegistry>>;

#[derive(Clone)]
pub struct AppState {
    pub rooms: SharedRoomRegistry,
    pub engine: Arc<GameEngine>,
    pub sessions: Arc<SessionStore>,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub api_rate_limiter: Arc<IpRateLimiter>,
    pub ws_per_ip: Arc<std::sync::Mutex<HashMap<IpAddr, usize>>>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: ServerConfig, engine: GameEngine) -> Self {
        let api_rate_limiter = Arc::new(IpRateLimiter::new(
            config.limits.api_rate_limit_burst as f64,
            config.limits.api_rate_limit_per_sec,
        ));
        AppState {
            rooms: Arc::new(Mutex::new(RoomRegistry::new(config.rooms.clone()))),
            engine: Arc::new(engine),
            sessions: Arc::new(SessionStore::new()),
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            api_rate_limiter,
            ws_per_ip: Arc::new(std::sync::Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        }
    }
}

/// RAII guard that decrements a counter on drop.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard { counter }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}

/// RAII guard tracking per-IP WebSocket connection count (spec.md §4.D
/// limits). A synchronous `std::sync::Mutex` lets `Drop` decrement without
/// spawning an async task, which could otherwise be skipped during shutdown
/// and leak the count.
pub struct IpConnectionGuard {
    ip: IpAddr,
    ws_per_ip: Arc<std::sync::Mutex<HashMap<IpAddr, usize>>>,
}

impl IpConnectionGuard {
    pub fn try_acquire(
        ip: IpAddr,
        ws_per_ip: Arc<std::sync::Mutex<HashMap<IpAddr, usize>>>,
        max_per_ip: usize,
    ) -> Option<Self> {
        let mut map = ws_per_ip.lock().ok()?;
        let count = map.entry(ip).or_insert(0);
        if *count >= max_per_ip {
            return None;
        }
        *count += 1;
        drop(map);
        Some(IpConnectionGuard { ip, ws_per_ip })
    }
}

impl Drop for IpConnectionGuard {
    fn drop(&mut self) {
        if let Ok(mut map) = self.ws_per_ip.lock() {
            if let Some(count) = map.get_mut(&self.ip) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    map.remove(&self.ip);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn connection_guard_increments_and_decrements() {
        let counter = Arc::new(AtomicUsize::new(0));
        let guard = ConnectionGuard::new(Arc::clone(&counter));
        assert_eq!(counter.load(Ordering::Relaxed), 1);
        drop(guard);
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn ip_guard_rejects_at_limit() {
        let ws_per_ip: Arc<std::sync::Mutex<HashMap<IpAddr, usize>>> = Arc::new(std::sync::Mutex::new(HashMap::new()));
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let g1 = IpConnectionGuard::try_acquire(ip, Arc::clone(&ws_per_ip), 1);
        assert!(g1.is_some());
        let g2 = IpConnectionGuard::try_acquire(ip, Arc::clone(&ws_per_ip), 1);
        assert!(g2.is_none());
    }
}

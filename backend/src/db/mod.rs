pub mod bookmarks;
pub mod models;
pub mod users;

pub use models::*;

use sqlx::PgPool;

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

/// Point-in-time connection counts for one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: u32,
    pub idle: u32,
    pub active: u32,
}

impl PoolStats {
    pub fn of(pool: &PgPool) -> Self {
        let size = pool.size();
        let idle = u32::try_from(pool.num_idle()).unwrap_or(u32::MAX).min(size);
        Self {
            size,
            idle,
            active: size - idle,
        }
    }

    /// `name` tells the API pool apart from the change listener's pool
    pub fn log(&self, name: &str) {
        tracing::info!(
            pool = name,
            pool_size = self.size,
            idle_connections = self.idle,
            active_connections = self.active,
            "Connection pool metrics"
        );
    }
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool_stats(&self) -> PoolStats {
        PoolStats::of(&self.pool)
    }
}

//! # Pooling
//!
//! Keyed pools of reusable instances with blocking acquisition, explicit
//! release, ownership checks and a background reaper for idle pools.
//!
//! A type opts in by implementing [`Poolable`]. A [`Pooling`] registry hands
//! out one [`Pool`] per `(type, construction arguments)` pair:
//!
//! ```no_run
//! use pooling::{Poolable, Pooling, PoolingConfig, Result};
//!
//! struct Connection {
//!     addr: String,
//! }
//!
//! impl Poolable for Connection {
//!     type Args = String;
//!
//!     async fn create(addr: &String) -> Result<Self> {
//!         Ok(Self { addr: addr.clone() })
//!     }
//!
//!     fn pool_size() -> usize {
//!         4
//!     }
//! }
//!
//! # async fn demo() -> Result<()> {
//! let pooling = Pooling::new(PoolingConfig::default())?;
//! let pool = pooling.pool::<Connection>("db:5432".to_string())?;
//!
//! let conn = pool.acquire().await?;
//! assert_eq!(conn.addr, "db:5432");
//! pool.release(conn)?;
//!
//! pooling.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod hooks;
pub mod pool;
pub mod reaper;
pub mod registry;
pub mod resource;

pub use config::{PoolingConfig, ReapPolicy};
pub use error::{Error, Result};
pub use hooks::{HookEvent, HookRegistry, HookResult, HookTarget, LoggingHook, PoolHook};
pub use pool::{Pool, PoolId, PoolState, PoolStats, Pooled};
pub use reaper::SweepReport;
pub use registry::Pooling;
pub use resource::{DEFAULT_POOL_SIZE, DEFAULT_SCAVENGE_INTERVAL, Poolable};

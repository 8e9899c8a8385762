//! Runtime integration layer.
//!
//! Owns the worker pool boundary so that every hop off a foreign completion
//! thread goes through one place.
//!
//! ```
//! use exchange_streams::{BridgeConfig, WorkerPool};
//!
//! let pool = WorkerPool::new(&BridgeConfig::default()).unwrap();
//! pool.dispatch(|| println!("on a pool thread"), |err| eprintln!("not run: {err}"));
//! pool.shutdown();
//! ```

pub(crate) mod worker_runtime;

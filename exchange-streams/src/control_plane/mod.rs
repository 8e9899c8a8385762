//! Control-plane layer.
//!
//! Owns stream identity: the registry that creates one adapter pair per stream
//! name, the locator binder that memoizes generated stream names, and the
//! boundary to the pipeline engine that installs routes for those bindings.
//! A failed installation leaves no binding behind, so the next call retries.

pub(crate) mod pipeline;
pub(crate) mod stream_registry;
pub(crate) mod uri_binder;

//! Hosting for an embedded Mono runtime.
//!
//! ```no_run
//! use rustmono::{DomainRequest, Mono};
//!
//! let mut mono = Mono::new(DomainRequest::Root)?;
//! let entry = mono.get_callable("Plugin.dll", "Plugin.Entry", "Run")?;
//! let mut payload = *b"ping";
//! let status = entry.call_with(&mut payload)?;
//! # Ok::<(), rustmono::MonoError>(())
//! ```

pub mod api;
mod config;
mod context;
mod error;
mod method;
pub mod native;
mod runtime;

#[cfg(test)]
mod testing;

pub use config::MonoConfig;
pub use context::{Assembly, DomainRequest, Image, Mono};
pub use error::{MonoError, Result};
pub use method::ManagedMethod;
pub use runtime::MonoRuntime;

/// Starts the process-wide runtime. Repeated calls are no-ops until
/// [`release`] is called.
pub fn initialize(config: &MonoConfig) -> Result<()> {
    MonoRuntime::global().initialize(config)
}

/// Shuts the process-wide runtime down. Also runs automatically at process
/// exit if the runtime is still live.
pub fn release() {
    MonoRuntime::global().release()
}

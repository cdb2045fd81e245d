//! # DOMWire
//!
//! Event wiring for document-driven UI components:
//! - A named publish/subscribe event bus with a logging toggle
//! - Declarative `on:<event>[.<modifier>]="<name>[(<data>)]"` attributes,
//!   delegated from the document root
//! - A frame throttler that coalesces noisy native events into at most one
//!   callback per animation frame
//!
//! ## Architecture
//!
//! DOMWire is organized as a workspace with multiple crates:
//!
//! 1. **domwire-core** - Arena document, native dispatch, event bus, binder
//! 2. **domwire-frames** - Animation-frame host and frame throttler
//! 3. **domwire-settings** - Configuration files and validation
//! 4. **domwire** - Runtime wiring and the demo binary

use std::path::Path;
use std::sync::Arc;

pub use domwire_core::{
    Binder, BindingSpec, BusEvent, Detail, Document, DomError, EventBus, EventBusConfig,
    EventName, EventTarget, ListenerOptions, Modifier, NativeEvent, NodeId, SubscriptionId,
};
pub use domwire_frames::{
    FrameHost, FrameThrottler, Registration, ThrottleError, ThrottleGuard, ThrottleKey,
};
pub use domwire_settings::{Config, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// One document wired to one bus, binder, frame host and throttler.
///
/// Every part is injected into the next; nothing is global, so several
/// runtimes can live side by side in one process.
pub struct Runtime {
    /// The document every listener attaches to
    pub document: Document,
    /// Named event bus shared with the binder
    pub bus: Arc<EventBus>,
    /// Declarative `on:` bindings for `document`
    pub binder: Binder,
    /// Clock driving animation frames and timers
    pub host: FrameHost,
    /// Frame throttler scheduling on `host`
    pub throttler: FrameThrottler,
}

impl Runtime {
    /// Build a runtime from an already validated configuration.
    pub fn new(config: &Config) -> Self {
        let document = Document::new();
        let bus = Arc::new(EventBus::with_config(config.bus.to_bus_config()));
        let binder =
            Binder::with_prefix(document.clone(), bus.clone(), &config.bus.attribute_prefix);
        let host = FrameHost::with_frame_interval(config.frames.frame_interval());
        let throttler = FrameThrottler::new(document.clone(), host.clone());

        tracing::debug!(
            prefix = %config.bus.attribute_prefix,
            frame_interval_ms = config.frames.frame_interval_ms,
            "Runtime created"
        );

        Self {
            document,
            bus,
            binder,
            host,
            throttler,
        }
    }

    /// Load a JSON or TOML configuration file and build a runtime from it.
    pub fn from_config_file(path: &Path) -> Result<Self, SettingsError> {
        let config = Config::load_from_file(path)?;
        Ok(Self::new(&config))
    }

    /// Bind every `on:` attribute below the document root.
    pub fn scan(&self) -> domwire_core::Result<usize> {
        Ok(self.binder.scan(self.document.root())?)
    }

    /// Append an element under a connected `parent` and bind its attributes.
    pub fn mount(
        &self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> domwire_core::Result<NodeId> {
        if !self.document.contains(parent) {
            return Err(DomError::UnknownNode { node: parent }.into());
        }
        if !self.document.is_connected(parent) {
            return Err(domwire_core::Error::other(format!(
                "cannot mount <{}> under detached node {}",
                tag, parent
            )));
        }
        let node = self.document.append_element(parent, tag, attributes)?;
        let bound = self.binder.scan(node)?;
        tracing::debug!(node = %node, bound, "Mounted element");
        Ok(node)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("bindings", &self.binder.len())
            .field("throttled", &self.throttler.len())
            .field("frame_interval", &self.host.frame_interval())
            .finish()
    }
}

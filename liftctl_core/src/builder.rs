//! Type-state builder for [`SessionEngine`].
//!
//! The builder enforces at compile time that a machine link and a session
//! store are provided before `build()` is available. `try_build()` is always
//! available for dynamic checks. Every other collaborator has a sensible
//! default (stub packet factory, static preferences, silent notifier, no-op
//! PR tracker, real monotonic clock).

use std::marker::PhantomData;
use std::sync::Arc;

use liftctl_config::Config;
use liftctl_traits::clock::{Clock, MonotonicClock};
use liftctl_traits::{MachineLink, Notifier, PacketFactory, Preferences, PrTracker, SessionStore};

use crate::error::{BuildError, Result};
use crate::mocks::{NoopPrTracker, NullNotifier, StaticPreferences, StubPacketFactory};
use crate::session::SessionEngine;

// Type-state markers.
pub struct Missing;
pub struct Set;

/// Builder for [`SessionEngine`]. The config is validated on build.
pub struct SessionEngineBuilder<L, S> {
    link: Option<Box<dyn MachineLink>>,
    store: Option<Box<dyn SessionStore>>,
    config: Option<Config>,
    packets: Option<Box<dyn PacketFactory>>,
    prefs: Option<Box<dyn Preferences>>,
    notifier: Option<Box<dyn Notifier>>,
    prs: Option<Box<dyn PrTracker>>,
    clock: Option<Arc<dyn Clock>>,
    _l: PhantomData<L>,
    _s: PhantomData<S>,
}

impl SessionEngine {
    /// Start building a session engine.
    pub fn builder() -> SessionEngineBuilder<Missing, Missing> {
        SessionEngineBuilder::default()
    }
}

impl Default for SessionEngineBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            link: None,
            store: None,
            config: None,
            packets: None,
            prefs: None,
            notifier: None,
            prs: None,
            clock: None,
            _l: PhantomData,
            _s: PhantomData,
        }
    }
}

/// Chainable setters that do not affect type-state.
impl<L, S> SessionEngineBuilder<L, S> {
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_packet_factory(mut self, packets: impl PacketFactory + 'static) -> Self {
        self.packets = Some(Box::new(packets));
        self
    }

    pub fn with_preferences(mut self, prefs: impl Preferences + 'static) -> Self {
        self.prefs = Some(Box::new(prefs));
        self
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    pub fn with_pr_tracker(mut self, prs: impl PrTracker + 'static) -> Self {
        self.prs = Some(Box::new(prs));
        self
    }

    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Fallible build available in any type-state; returns a detailed error
    /// for missing pieces.
    pub fn try_build(self) -> Result<SessionEngine> {
        let link = self
            .link
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLink))?;
        let store = self
            .store
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStore))?;
        let config = self.config.unwrap_or_default();
        config.validate().map_err(|e| {
            tracing::error!(error = %e, "engine config rejected");
            e
        })?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        Ok(SessionEngine::new(
            config,
            clock,
            link,
            self.packets.unwrap_or_else(|| Box::new(StubPacketFactory)),
            store,
            self.prefs
                .unwrap_or_else(|| Box::new(StaticPreferences::default())),
            self.notifier.unwrap_or_else(|| Box::new(NullNotifier)),
            self.prs.unwrap_or_else(|| Box::new(NoopPrTracker)),
        ))
    }
}

// Setters that advance type-state.
impl<S> SessionEngineBuilder<Missing, S> {
    pub fn with_link(self, link: impl MachineLink + 'static) -> SessionEngineBuilder<Set, S> {
        SessionEngineBuilder {
            link: Some(Box::new(link)),
            store: self.store,
            config: self.config,
            packets: self.packets,
            prefs: self.prefs,
            notifier: self.notifier,
            prs: self.prs,
            clock: self.clock,
            _l: PhantomData,
            _s: PhantomData,
        }
    }
}

impl<L> SessionEngineBuilder<L, Missing> {
    pub fn with_store(self, store: impl SessionStore + 'static) -> SessionEngineBuilder<L, Set> {
        SessionEngineBuilder {
            link: self.link,
            store: Some(Box::new(store)),
            config: self.config,
            packets: self.packets,
            prefs: self.prefs,
            notifier: self.notifier,
            prs: self.prs,
            clock: self.clock,
            _l: PhantomData,
            _s: PhantomData,
        }
    }
}

impl SessionEngineBuilder<Set, Set> {
    /// Infallible-by-construction build; config validation can still fail.
    pub fn build(self) -> Result<SessionEngine> {
        self.try_build()
    }
}

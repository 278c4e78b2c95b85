//! Credential selection and fallback
//!
//! A client can learn its API credential from three places: an explicit
//! parameter, the environment, or the persisted config store. Exactly one
//! credential is active at a time; the others are kept as candidates so
//! that a rejected credential can be swapped for an untried one exactly
//! once per request plan.
//!
//! The active credential lives behind an `RwLock`: a swap performed while
//! one plan recovers from a 401 is immediately visible to plans started
//! afterwards. Plans never coordinate; last writer wins.

use std::env;
use std::fmt;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::{ConfigError, ConfigStore};

/// Environment variable consulted for the credential.
pub const ENV_TOKEN_VAR: &str = "TASKLANE_API_TOKEN";

/// Key under which the config store persists the credential.
pub const STORE_TOKEN_KEY: &str = "api_token";

/// Where a credential came from; determines fallback order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialSource {
    /// Passed explicitly by the caller
    Explicit,
    /// Read from [`ENV_TOKEN_VAR`]
    Environment,
    /// Read from the persisted config store
    ConfigStore,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit parameter"),
            Self::Environment => write!(f, "environment"),
            Self::ConfigStore => write!(f, "config store"),
        }
    }
}

/// An opaque bearer token tagged with its source
#[derive(Clone)]
pub struct Credential {
    token: String,
    source: CredentialSource,
}

impl Credential {
    fn new(token: String, source: CredentialSource) -> Self {
        Self { token, source }
    }

    /// The raw bearer token
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Which source supplied this credential
    #[must_use]
    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

// The token is a secret; keep it out of logs and panic messages.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Per-plan record of which sources have secured an attempt
///
/// Seeded with the active source when a plan starts, so a fallback never
/// hands back the credential that was just rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriedSources {
    explicit: bool,
    environment: bool,
    config_store: bool,
}

impl TriedSources {
    /// Create a set containing only `source`
    #[must_use]
    pub fn seeded(source: CredentialSource) -> Self {
        let mut tried = Self::default();
        tried.mark(source);
        tried
    }

    /// Record that `source` has been used for this plan
    pub fn mark(&mut self, source: CredentialSource) {
        match source {
            CredentialSource::Explicit => self.explicit = true,
            CredentialSource::Environment => self.environment = true,
            CredentialSource::ConfigStore => self.config_store = true,
        }
    }

    /// Whether `source` has already secured an attempt of this plan
    #[must_use]
    pub fn contains(&self, source: CredentialSource) -> bool {
        match source {
            CredentialSource::Explicit => self.explicit,
            CredentialSource::Environment => self.environment,
            CredentialSource::ConfigStore => self.config_store,
        }
    }
}

/// Selects the active credential and produces fallbacks on rejection
///
/// Initial selection precedence: explicit parameter > environment >
/// config store; the first non-empty candidate wins. Construction fails
/// when no source has a credential, since without one there is no pipeline.
pub struct CredentialResolver {
    explicit: Option<String>,
    environment: Option<String>,
    stored: Option<String>,
    active: RwLock<Credential>,
}

impl CredentialResolver {
    /// Build a resolver from already-gathered candidate tokens
    ///
    /// Empty or whitespace-only candidates are treated as absent.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingCredential`] when every source is
    /// empty.
    pub fn new(
        explicit: Option<String>,
        environment: Option<String>,
        stored: Option<String>,
    ) -> Result<Self, ConfigError> {
        let explicit = normalize(explicit);
        let environment = normalize(environment);
        let stored = normalize(stored);

        let active = if let Some(token) = &explicit {
            Credential::new(token.clone(), CredentialSource::Explicit)
        } else if let Some(token) = &environment {
            Credential::new(token.clone(), CredentialSource::Environment)
        } else if let Some(token) = &stored {
            Credential::new(token.clone(), CredentialSource::ConfigStore)
        } else {
            return Err(ConfigError::MissingCredential);
        };

        debug!("Using credential from {}", active.source());
        Ok(Self { explicit, environment, stored, active: RwLock::new(active) })
    }

    /// Build a resolver from the standard sources: an optional explicit
    /// token, [`ENV_TOKEN_VAR`], and [`STORE_TOKEN_KEY`] in `store`
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingCredential`] when every source is
    /// empty.
    pub fn from_sources(
        explicit: Option<String>,
        store: &ConfigStore,
    ) -> Result<Self, ConfigError> {
        Self::new(explicit, env::var(ENV_TOKEN_VAR).ok(), store.get(STORE_TOKEN_KEY))
    }

    /// The credential currently securing requests
    #[must_use]
    pub fn active(&self) -> Credential {
        self.active.read().clone()
    }

    /// Swap in a fallback credential after the active one was rejected
    ///
    /// The fallback order depends on the rejected credential's source:
    /// an environment credential falls back to the config store, a stored
    /// credential to the environment, and an explicit credential to the
    /// environment first and the store second. A candidate is only
    /// eligible when it exists, differs from the rejected token, and its
    /// source is not in `tried`.
    ///
    /// On success the active credential is replaced, the source is added
    /// to `tried`, and the new credential is returned. `None` means the
    /// plan has exhausted its options and the rejection stands.
    pub fn fallback(&self, tried: &mut TriedSources) -> Option<Credential> {
        let current = self.active();

        let order: &[CredentialSource] = match current.source() {
            CredentialSource::Environment => &[CredentialSource::ConfigStore],
            CredentialSource::ConfigStore => &[CredentialSource::Environment],
            CredentialSource::Explicit => {
                &[CredentialSource::Environment, CredentialSource::ConfigStore]
            }
        };

        for &source in order {
            if tried.contains(source) {
                continue;
            }
            let Some(token) = self.candidate(source) else { continue };
            if token == current.token() {
                continue;
            }

            tried.mark(source);
            let credential = Credential::new(token.to_string(), source);
            *self.active.write() = credential.clone();
            warn!(
                "Credential from {} was rejected, switching to {}",
                current.source(),
                source
            );
            return Some(credential);
        }

        debug!("No fallback credential available after {}", current.source());
        None
    }

    fn candidate(&self, source: CredentialSource) -> Option<&str> {
        match source {
            CredentialSource::Explicit => self.explicit.as_deref(),
            CredentialSource::Environment => self.environment.as_deref(),
            CredentialSource::ConfigStore => self.stored.as_deref(),
        }
    }
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("explicit", &self.explicit.is_some())
            .field("environment", &self.environment.is_some())
            .field("stored", &self.stored.is_some())
            .field("active", &self.active.read().source())
            .finish()
    }
}

fn normalize(candidate: Option<String>) -> Option<String> {
    candidate.map(|token| token.trim().to_string()).filter(|token| !token.is_empty())
}

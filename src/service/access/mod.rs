//! Privilege and location gates for the pin commands.

use std::{ops::Deref, sync::Arc};

use crate::base::config::Config;

// Traits.

/// Generic access gate trait that gates must implement.
///
/// Both checks are consulted once, before a pin or unpin flow creates any state.
pub trait GenericAccessGate: Send + Sync + 'static {
    /// Whether pin commands may be used in this channel.
    fn may_pin_in(&self, guild_id: &str, channel_id: &str) -> bool;

    /// Whether the actor holds the named privilege.
    fn holds_privilege(&self, actor_id: &str, privilege: &str) -> bool;
}

// Structs.

/// Access gate for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct AccessGate {
    inner: Arc<dyn GenericAccessGate>,
}

impl Deref for AccessGate {
    type Target = dyn GenericAccessGate;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl AccessGate {
    pub fn new(inner: Arc<dyn GenericAccessGate>) -> Self {
        Self { inner }
    }

    /// A gate backed by the configured allow-lists.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(ConfigAccessGate {
            channels: config.pin_channels.clone(),
            users: config.pin_users.clone(),
        }))
    }

    /// A gate that lets everyone pin everywhere.
    pub fn allow_all() -> Self {
        Self::new(Arc::new(ConfigAccessGate::default()))
    }
}

/// Allow-list gate; an empty list allows everything.
///
/// Privileges are not distinguished: holding any privilege means being on the user list.
#[derive(Debug, Clone, Default)]
pub struct ConfigAccessGate {
    pub channels: Vec<String>,
    pub users: Vec<String>,
}

impl GenericAccessGate for ConfigAccessGate {
    fn may_pin_in(&self, _guild_id: &str, channel_id: &str) -> bool {
        self.channels.is_empty() || self.channels.iter().any(|c| c == channel_id)
    }

    fn holds_privilege(&self, actor_id: &str, _privilege: &str) -> bool {
        self.users.is_empty() || self.users.iter().any(|u| u == actor_id)
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_lists_allow_everything() {
        let gate = AccessGate::allow_all();

        assert!(gate.may_pin_in("T1", "C1"));
        assert!(gate.holds_privilege("U1", "pin"));
    }

    #[test]
    fn lists_restrict_channels_and_users() {
        let gate = ConfigAccessGate {
            channels: vec!["C1".to_string()],
            users: vec!["U1".to_string()],
        };

        assert!(gate.may_pin_in("T1", "C1"));
        assert!(!gate.may_pin_in("T1", "C2"));
        assert!(gate.holds_privilege("U1", "pin"));
        assert!(!gate.holds_privilege("U2", "pin"));
    }
}

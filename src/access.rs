// 🔐 Access Policy - who may run ledger commands, and where
// Injected from settings; a missing list means that check is not enforced

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Role the bot has always required
pub const DEFAULT_ROLE: &str = "OCR Access";

/// Whoever issued a command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Requester {
    pub actor_id: u64,
    /// Display name written to the audit log
    pub display_name: String,
    pub channel_id: u64,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: String,
}

impl AccessDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    fn deny(reason: String) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

/// Omitted fields take the defaults; an explicit `null` turns a check off
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessPolicy {
    pub allowed_channels: Option<Vec<u64>>,
    pub allowed_users: Option<Vec<u64>>,
    pub required_role: Option<String>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            allowed_channels: None,
            allowed_users: None,
            required_role: Some(DEFAULT_ROLE.to_string()),
        }
    }
}

impl AccessPolicy {
    /// Policy that lets everyone through
    pub fn open() -> Self {
        Self {
            allowed_channels: None,
            allowed_users: None,
            required_role: None,
        }
    }

    /// Checks run in order: channel, user, role. First failure wins.
    pub fn authorize(&self, actor_id: u64, channel_id: u64, roles: &[String]) -> AccessDecision {
        if let Some(channels) = &self.allowed_channels {
            if !channels.contains(&channel_id) {
                return AccessDecision::deny(
                    "⛔ This command is not allowed in this channel.".to_string(),
                );
            }
        }

        if let Some(users) = &self.allowed_users {
            if !users.contains(&actor_id) {
                return AccessDecision::deny(
                    "⛔ You are not authorized to use this bot.".to_string(),
                );
            }
        }

        if let Some(role) = &self.required_role {
            if !roles.iter().any(|r| r == role) {
                return AccessDecision::deny(format!(
                    "⛔ You must have the **{}** role to use this command.",
                    role
                ));
            }
        }

        AccessDecision::allow()
    }

    /// `authorize` for a requester, as a `Result`
    pub fn check(&self, requester: &Requester) -> Result<()> {
        let decision = self.authorize(requester.actor_id, requester.channel_id, &requester.roles);
        if decision.allowed {
            Ok(())
        } else {
            Err(LedgerError::AuthorizationDenied {
                reason: decision.reason,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict() -> AccessPolicy {
        AccessPolicy {
            allowed_channels: Some(vec![112233]),
            allowed_users: Some(vec![42, 43]),
            required_role: Some(DEFAULT_ROLE.to_string()),
        }
    }

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_all_checks_pass() {
        let decision = strict().authorize(42, 112233, &roles(&["Member", "OCR Access"]));

        assert!(decision.allowed);
        assert!(decision.reason.is_empty());
    }

    #[test]
    fn test_channel_checked_first() {
        // Wrong channel AND unknown user → channel reason
        let decision = strict().authorize(7, 999, &roles(&[]));

        assert!(!decision.allowed);
        assert!(decision.reason.contains("channel"));
    }

    #[test]
    fn test_unknown_user_denied() {
        let decision = strict().authorize(7, 112233, &roles(&["OCR Access"]));

        assert!(!decision.allowed);
        assert!(decision.reason.contains("not authorized"));
    }

    #[test]
    fn test_missing_role_denied() {
        let decision = strict().authorize(42, 112233, &roles(&["Member"]));

        assert!(!decision.allowed);
        assert!(decision.reason.contains("**OCR Access**"));
    }

    #[test]
    fn test_open_policy_allows_everyone() {
        assert!(AccessPolicy::open().authorize(0, 0, &[]).allowed);
    }

    #[test]
    fn test_check_maps_to_error() {
        let requester = Requester {
            actor_id: 1,
            display_name: "stranger".to_string(),
            channel_id: 112233,
            roles: vec![],
        };

        assert!(matches!(
            strict().check(&requester),
            Err(LedgerError::AuthorizationDenied { .. })
        ));
    }
}

//! Principal resolution: inbound credential → key / user / team identity.

use std::collections::HashSet;
use std::sync::Arc;

use fleetgate_core::SharedStore;

use crate::error::GatewayError;

/// A human identity a key may be attached to.
#[derive(Debug, Clone, PartialEq)]
pub struct UserPrincipal {
    pub id: String,
    pub allowed_models: HashSet<String>,
    pub blocked_models: HashSet<String>,
}

/// A team aggregating keys and users; team budget/allow-lists take
/// precedence over user and key in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamPrincipal {
    pub id: String,
    pub allowed_models: HashSet<String>,
    pub blocked_models: HashSet<String>,
}

/// A validated API key record. `enabled = false` or a past `expires_at_ms`
/// both fail resolution with [`GatewayError::Authentication`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApiKeyRecord {
    pub id: String,
    pub prefix: String,
    pub user: Option<UserPrincipal>,
    pub team: Option<TeamPrincipal>,
    pub allowed_models: HashSet<String>,
    pub blocked_models: HashSet<String>,
    pub enabled: bool,
    pub expires_at_ms: Option<u64>,
}

/// The resolved identity for one inbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub key: ApiKeyRecord,
}

impl Principal {
    /// Scope string used as part of the cache fingerprint and as the
    /// rate-limit/budget key prefix: the tightest identifying id available.
    pub fn scope(&self) -> &str {
        &self.key.id
    }

    pub fn team_id(&self) -> Option<&str> {
        self.key.team.as_ref().map(|t| t.id.as_str())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.key.user.as_ref().map(|u| u.id.as_str())
    }

    pub fn key_id(&self) -> &str {
        &self.key.id
    }

    /// Team allow/deny lists take precedence over user, which take
    /// precedence over key, matching the precedence spec.md §3 defines
    /// for denial decisions.
    pub fn is_model_allowed(&self, model: &str) -> bool {
        if let Some(team) = &self.key.team {
            if team.blocked_models.contains(model) {
                return false;
            }
            if !team.allowed_models.is_empty() && !team.allowed_models.contains(model) {
                return false;
            }
        }
        if let Some(user) = &self.key.user {
            if user.blocked_models.contains(model) {
                return false;
            }
            if !user.allowed_models.is_empty() && !user.allowed_models.contains(model) {
                return false;
            }
        }
        if self.key.blocked_models.contains(model) {
            return false;
        }
        if !self.key.allowed_models.is_empty() && !self.key.allowed_models.contains(model) {
            return false;
        }
        true
    }
}

/// Resolves an inbound `Authorization: Bearer <key>` / `X-API-Key: <key>`
/// credential to a [`Principal`] by hashing it and looking up the hashed
/// record in the shared store.
///
/// Keys follow the shape `sk-<prefix>-<opaque>`; the prefix is kept in the
/// clear (useful for audit logs), the opaque suffix is never stored raw.
pub struct PrincipalResolver {
    store: Arc<dyn SharedStore>,
}

/// Hashes a raw credential the same way [`PrincipalResolver::resolve`] does,
/// for callers that seed `principal:key:<hash>` records into the shared
/// store ahead of time (standalone/dev bootstrap; see `fleetgate-bin`).
pub fn credential_hash(raw: &str) -> String {
    blake3::hash(raw.as_bytes()).to_hex().to_string()
}

impl PrincipalResolver {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    /// Parse and validate the shape of a raw credential: `sk-<prefix>-<opaque>`.
    /// Returns the prefix on success.
    pub fn parse_credential(raw: &str) -> Result<(&str, &str), GatewayError> {
        let rest = raw
            .strip_prefix("sk-")
            .ok_or_else(|| GatewayError::Authentication("malformed credential".into()))?;
        let (prefix, opaque) = rest
            .split_once('-')
            .ok_or_else(|| GatewayError::Authentication("malformed credential".into()))?;
        if prefix.is_empty() || opaque.is_empty() {
            return Err(GatewayError::Authentication("malformed credential".into()));
        }
        Ok((prefix, opaque))
    }

    /// Resolve a raw credential to its [`Principal`], fetching the key
    /// record (and any attached user/team) from the shared store.
    ///
    /// Principal resolution errors fail-closed: any ambiguity, missing
    /// record, or store failure is an [`GatewayError::Authentication`].
    pub async fn resolve(&self, raw_credential: &str) -> Result<Principal, GatewayError> {
        let (prefix, _opaque) = Self::parse_credential(raw_credential)?;
        let hash = credential_hash(raw_credential);
        let key_key = format!("principal:key:{hash}");
        let fields = self
            .store
            .hgetall(&key_key)
            .await
            .map_err(|_| GatewayError::Authentication("credential lookup failed".into()))?
            .ok_or_else(|| GatewayError::Authentication("unknown credential".into()))?;
        let key = decode_key_record(prefix, &fields)?;
        if !key.enabled {
            return Err(GatewayError::Authentication("key revoked".into()));
        }
        if let Some(expires_at_ms) = key.expires_at_ms {
            let now_ms = current_millis();
            if now_ms >= expires_at_ms {
                return Err(GatewayError::Authentication("key expired".into()));
            }
        }
        Ok(Principal { key })
    }
}

fn current_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn decode_key_record(
    prefix: &str,
    fields: &std::collections::HashMap<String, String>,
) -> Result<ApiKeyRecord, GatewayError> {
    let id = fields
        .get("id")
        .cloned()
        .ok_or_else(|| GatewayError::Authentication("key record missing id".into()))?;
    let enabled = fields
        .get("enabled")
        .map(|v| v == "true")
        .unwrap_or(true);
    let expires_at_ms = fields.get("expires_at_ms").and_then(|v| v.parse().ok());
    let allowed_models = parse_model_set(fields.get("allowed_models"));
    let blocked_models = parse_model_set(fields.get("blocked_models"));
    let user = fields.get("user_id").map(|user_id| UserPrincipal {
        id: user_id.clone(),
        allowed_models: parse_model_set(fields.get("user_allowed_models")),
        blocked_models: parse_model_set(fields.get("user_blocked_models")),
    });
    let team = fields.get("team_id").map(|team_id| TeamPrincipal {
        id: team_id.clone(),
        allowed_models: parse_model_set(fields.get("team_allowed_models")),
        blocked_models: parse_model_set(fields.get("team_blocked_models")),
    });
    Ok(ApiKeyRecord {
        id,
        prefix: prefix.to_string(),
        user,
        team,
        allowed_models,
        blocked_models,
        enabled,
        expires_at_ms,
    })
}

fn parse_model_set(raw: Option<&String>) -> HashSet<String> {
    raw.map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_with(team: Option<TeamPrincipal>, user: Option<UserPrincipal>) -> ApiKeyRecord {
        ApiKeyRecord {
            id: "key_1".into(),
            prefix: "live".into(),
            user,
            team,
            allowed_models: HashSet::new(),
            blocked_models: HashSet::new(),
            enabled: true,
            expires_at_ms: None,
        }
    }

    #[test]
    fn parses_well_formed_credential() {
        let (prefix, opaque) = PrincipalResolver::parse_credential("sk-live-abc123").unwrap();
        assert_eq!(prefix, "live");
        assert_eq!(opaque, "abc123");
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(PrincipalResolver::parse_credential("not-a-key").is_err());
    }

    #[test]
    fn rejects_empty_opaque() {
        assert!(PrincipalResolver::parse_credential("sk-live-").is_err());
    }

    #[test]
    fn team_block_list_overrides_key_allow() {
        let team = TeamPrincipal {
            id: "team_1".into(),
            allowed_models: HashSet::new(),
            blocked_models: ["gpt-4".into()].into_iter().collect(),
        };
        let mut key = key_with(Some(team), None);
        key.allowed_models.insert("gpt-4".into());
        let principal = Principal { key };
        assert!(!principal.is_model_allowed("gpt-4"));
    }

    #[test]
    fn key_allow_list_restricts_when_no_team_or_user() {
        let mut key = key_with(None, None);
        key.allowed_models.insert("gpt-4".into());
        let principal = Principal { key };
        assert!(principal.is_model_allowed("gpt-4"));
        assert!(!principal.is_model_allowed("claude-3"));
    }

    #[test]
    fn empty_allow_lists_permit_everything() {
        let principal = Principal {
            key: key_with(None, None),
        };
        assert!(principal.is_model_allowed("anything"));
    }
}

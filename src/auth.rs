//! Access tokens and what to do when there is none.
//!
//! Token refresh is someone else's job: this crate only asks a
//! [`TokenProvider`] for a bearer token. When that fails, the configured
//! [`AuthFailAction`] decides whether the run falls back to the public daily
//! ranking or gives up.

use crate::source::UpdateMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessTokenError {
    #[error("no access token configured (set auth.token or the {0} environment variable)")]
    Missing(String),
    #[error("access token rejected: {0}")]
    Rejected(String),
}

pub trait TokenProvider {
    fn acquire_token(&self) -> Result<String, AccessTokenError>;
}

/// Token from the config file, or from an environment variable when the
/// file leaves it empty.
#[derive(Debug, Clone)]
pub struct StaticToken {
    token: Option<String>,
    env_var: String,
}

impl StaticToken {
    pub fn new(token: Option<String>, env_var: impl Into<String>) -> Self {
        Self {
            token,
            env_var: env_var.into(),
        }
    }
}

impl TokenProvider for StaticToken {
    fn acquire_token(&self) -> Result<String, AccessTokenError> {
        self.token
            .clone()
            .or_else(|| std::env::var(&self.env_var).ok())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AccessTokenError::Missing(self.env_var.clone()))
    }
}

/// Reaction to a failed token acquisition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailAction {
    /// Switch the configured mode to the daily ranking for good.
    #[default]
    #[serde(alias = "changeDaily")]
    ChangeToRanking,
    /// Fetch a single daily-ranking item this run; keep the configured mode.
    #[serde(alias = "doNotChange_downDaily")]
    RankingOnce,
    /// Fail the run so the scheduler retries later.
    #[serde(alias = "doNotChange_doNotDown")]
    Abort,
}

/// Mode the run should actually use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveMode {
    pub mode: UpdateMode,
    /// Bearer token for authenticated feeds.
    pub token: Option<String>,
    /// Item count to use instead of the configured one.
    pub count_override: Option<u32>,
    /// Set when the configured mode must be rewritten.
    pub persist_mode: Option<UpdateMode>,
}

impl EffectiveMode {
    fn unchanged(mode: UpdateMode, token: Option<String>) -> Self {
        Self {
            mode,
            token,
            count_override: None,
            persist_mode: None,
        }
    }
}

/// Pick the mode for this run, acquiring a token if the requested mode
/// needs one.
pub fn resolve_effective_mode(
    requested: UpdateMode,
    provider: &dyn TokenProvider,
    on_failure: AuthFailAction,
) -> Result<EffectiveMode, AccessTokenError> {
    if !requested.requires_auth() {
        return Ok(EffectiveMode::unchanged(requested, None));
    }
    let error = match provider.acquire_token() {
        Ok(token) => return Ok(EffectiveMode::unchanged(requested, Some(token))),
        Err(e) => e,
    };

    match on_failure {
        AuthFailAction::ChangeToRanking => {
            log::warn!("{error}; switching to the daily ranking");
            Ok(EffectiveMode {
                mode: UpdateMode::Daily,
                token: None,
                count_override: None,
                persist_mode: Some(UpdateMode::Daily),
            })
        }
        AuthFailAction::RankingOnce => {
            log::warn!("{error}; fetching one daily ranking item instead");
            Ok(EffectiveMode {
                mode: UpdateMode::Daily,
                token: None,
                count_override: Some(1),
                persist_mode: None,
            })
        }
        AuthFailAction::Abort => Err(error),
    }
}

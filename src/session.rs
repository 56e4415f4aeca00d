use crate::{error::BotError, utils};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    path::{Path, PathBuf},
};

const FILENAME: &str = "sessions.yaml";

/// Which GeoGuessr account a session belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Creates challenges for commands.
    Main,
    /// Plays the daily challenges so the leaderboard can be read.
    Auto,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Main => "main",
                Self::Auto => "auto",
            }
        )
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AccountSession {
    pub role: Role,
    token: String,
    pub last_verified: DateTime<Utc>,
}

impl fmt::Debug for AccountSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountSession")
            .field("role", &self.role)
            .field("token", &"<redacted>")
            .field("last_verified", &self.last_verified)
            .finish()
    }
}

/// A token handed out for a single request.
#[derive(Clone)]
pub struct SessionToken {
    role: Role,
    value: String,
}

impl SessionToken {
    pub fn new(role: Role, value: impl Into<String>) -> Self {
        Self {
            role,
            value: value.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The raw cookie value. Only meant for building requests.
    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({}, <redacted>)", self.role)
    }
}

/// Owns the GeoGuessr sessions, at most one per [`Role`].
pub struct SessionManager {
    owner: u64,
    path: PathBuf,
    sessions: BTreeMap<Role, AccountSession>,
}

impl SessionManager {
    pub async fn load(data_dir: &Path, owner: u64) -> Result<Self> {
        let path = data_dir.join(FILENAME);
        let stored: Vec<AccountSession> = utils::read_yaml(&path)
            .await
            .context("Failed to load sessions")?
            .unwrap_or_default();

        Ok(Self {
            owner,
            path,
            sessions: stored.into_iter().map(|s| (s.role, s)).collect(),
        })
    }

    pub fn is_owner(&self, caller: u64) -> bool {
        caller == self.owner
    }

    /// Replaces the session of `role`. Only the bot owner may do so.
    pub async fn set_token(&mut self, caller: u64, role: Role, token: &str) -> Result<()> {
        if !self.is_owner(caller) {
            log::warn!("User {} tried to replace the {} token.", caller, role);
            return Err(BotError::Unauthorized.into());
        }

        let token = token.trim();
        if token.is_empty() {
            return Err(BotError::EmptyToken.into());
        }

        self.sessions.insert(
            role,
            AccountSession {
                role,
                token: token.to_string(),
                last_verified: Utc::now(),
            },
        );
        self.save().await
    }

    pub fn get_token(&self, role: Role) -> Result<SessionToken, BotError> {
        self.sessions
            .get(&role)
            .map(|session| SessionToken::new(role, session.token.clone()))
            .ok_or(BotError::MissingToken(role))
    }

    pub fn session(&self, role: Role) -> Option<&AccountSession> {
        self.sessions.get(&role)
    }

    /// Records that GeoGuessr accepted the session just now.
    pub fn mark_verified(&mut self, role: Role) {
        if let Some(session) = self.sessions.get_mut(&role) {
            session.last_verified = Utc::now();
        }
    }

    /// Roles without a session.
    pub fn missing(&self) -> Vec<Role> {
        [Role::Main, Role::Auto]
            .into_iter()
            .filter(|role| !self.sessions.contains_key(role))
            .collect()
    }

    async fn save(&self) -> Result<()> {
        let sessions: Vec<&AccountSession> = self.sessions.values().collect();
        utils::write_yaml(&self.path, &sessions)
            .await
            .context("Failed to save sessions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: u64 = 1;
    const STRANGER: u64 = 2;

    fn kind(err: &anyhow::Error) -> &BotError {
        err.downcast_ref::<BotError>().expect("expected a BotError")
    }

    #[tokio::test]
    async fn owner_can_store_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = SessionManager::load(dir.path(), OWNER).await.unwrap();
        assert_eq!(sessions.missing(), vec![Role::Main, Role::Auto]);

        sessions.set_token(OWNER, Role::Main, "  abc  ").await.unwrap();

        let token = sessions.get_token(Role::Main).unwrap();
        assert_eq!(token.expose(), "abc");
        assert_eq!(token.role(), Role::Main);
        assert_eq!(sessions.missing(), vec![Role::Auto]);
    }

    #[tokio::test]
    async fn stranger_cannot_replace_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = SessionManager::load(dir.path(), OWNER).await.unwrap();
        sessions.set_token(OWNER, Role::Auto, "original").await.unwrap();

        let err = sessions
            .set_token(STRANGER, Role::Auto, "hijacked")
            .await
            .unwrap_err();
        assert!(matches!(kind(&err), BotError::Unauthorized));

        let err = sessions
            .set_token(STRANGER, Role::Main, "hijacked")
            .await
            .unwrap_err();
        assert!(matches!(kind(&err), BotError::Unauthorized));

        assert_eq!(sessions.get_token(Role::Auto).unwrap().expose(), "original");
        assert!(matches!(
            sessions.get_token(Role::Main),
            Err(BotError::MissingToken(Role::Main))
        ));

        let reloaded = SessionManager::load(dir.path(), OWNER).await.unwrap();
        assert_eq!(reloaded.get_token(Role::Auto).unwrap().expose(), "original");
    }

    #[tokio::test]
    async fn empty_tokens_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = SessionManager::load(dir.path(), OWNER).await.unwrap();

        let err = sessions.set_token(OWNER, Role::Main, "   ").await.unwrap_err();
        assert!(matches!(kind(&err), BotError::EmptyToken));
        assert!(sessions.session(Role::Main).is_none());
    }

    #[tokio::test]
    async fn tokens_survive_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = SessionManager::load(dir.path(), OWNER).await.unwrap();
        sessions.set_token(OWNER, Role::Main, "first").await.unwrap();
        sessions.set_token(OWNER, Role::Main, "second").await.unwrap();
        sessions.set_token(OWNER, Role::Auto, "bot").await.unwrap();

        let reloaded = SessionManager::load(dir.path(), OWNER).await.unwrap();
        assert_eq!(reloaded.get_token(Role::Main).unwrap().expose(), "second");
        assert_eq!(reloaded.get_token(Role::Auto).unwrap().expose(), "bot");
        assert!(reloaded.missing().is_empty());
    }

    #[tokio::test]
    async fn verification_advances_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = SessionManager::load(dir.path(), OWNER).await.unwrap();
        sessions.set_token(OWNER, Role::Main, "abc").await.unwrap();
        let before = sessions.session(Role::Main).unwrap().last_verified;

        sessions.mark_verified(Role::Main);
        assert!(sessions.session(Role::Main).unwrap().last_verified >= before);

        // No session, nothing to verify.
        sessions.mark_verified(Role::Auto);
        assert!(sessions.session(Role::Auto).is_none());
    }

    #[tokio::test]
    async fn debug_output_hides_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = SessionManager::load(dir.path(), OWNER).await.unwrap();
        sessions.set_token(OWNER, Role::Main, "supersecret").await.unwrap();

        let session = format!("{:?}", sessions.session(Role::Main).unwrap());
        let token = format!("{:?}", sessions.get_token(Role::Main).unwrap());
        assert!(!session.contains("supersecret"));
        assert!(!token.contains("supersecret"));
    }
}

//! Who is acting: the authenticated identity and its token.
//!
//! The store is an explicit context object. Surfaces that must react to
//! login/logout subscribe to it instead of polling shared globals.

use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{HelpdeskError, Result};
use crate::types::{classify_role, Role, User};

/// A user record together with its derived role.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthUser {
    #[serde(flatten)]
    pub user: User,
    pub role: Role,
}

impl AuthUser {
    pub fn new(user: User) -> Self {
        let role = classify_role(&user);
        Self { user, role }
    }

    pub fn id(&self) -> u64 {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn display_name(&self) -> String {
        self.user
            .display_name()
            .map(String::from)
            .unwrap_or_else(|| format!("User #{}", self.user.id))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub token: Option<String>,
    pub user: Option<AuthUser>,
    pub authenticated: bool,
}

/// Where the session outlives the process. Only get/set of the token and the
/// user are required.
pub trait SessionStorage: Send + Sync {
    fn token(&self) -> Result<Option<String>>;
    fn set_token(&self, token: Option<&str>) -> Result<()>;
    fn user(&self) -> Result<Option<AuthUser>>;
    fn set_user(&self, user: Option<&AuthUser>) -> Result<()>;
}

pub struct SessionStore {
    storage: Box<dyn SessionStorage>,
    state: watch::Sender<SessionState>,
}

impl SessionStore {
    /// Rebuild the session from storage. The role is re-derived from the stored
    /// profile data rather than trusted from disk.
    pub fn restore(storage: Box<dyn SessionStorage>) -> Self {
        let restored = match (storage.token(), storage.user()) {
            (Ok(Some(token)), Ok(Some(user))) => SessionState {
                token: Some(token),
                user: Some(AuthUser::new(user.user)),
                authenticated: true,
            },
            (Err(e), _) | (_, Err(e)) => {
                warn!("ignoring unreadable session: {e}");
                SessionState::default()
            }
            _ => SessionState::default(),
        };

        let (state, _) = watch::channel(restored);
        Self { storage, state }
    }

    pub fn in_memory() -> Self {
        Self::restore(Box::new(MemoryStorage::default()))
    }

    /// Classify the raw user, persist token and user, and notify subscribers.
    pub fn establish(&self, token: String, raw_user: User) -> Result<AuthUser> {
        let user = AuthUser::new(raw_user);

        self.storage.set_token(Some(&token))?;
        self.storage.set_user(Some(&user))?;

        info!(user_id = user.id(), role = %user.role, "session established");
        self.state.send_replace(SessionState {
            token: Some(token),
            user: Some(user.clone()),
            authenticated: true,
        });
        Ok(user)
    }

    pub fn clear(&self) {
        if let Err(e) = self
            .storage
            .set_token(None)
            .and_then(|_| self.storage.set_user(None))
        {
            warn!("failed to wipe persisted session: {e}");
        }

        let was_authenticated = self.state.borrow().authenticated;
        self.state.send_replace(SessionState::default());
        if was_authenticated {
            info!("session cleared");
        }
    }

    pub fn current(&self) -> Option<AuthUser> {
        self.state.borrow().user.clone()
    }

    /// The acting user, or `NotAuthenticated`.
    pub fn require(&self) -> Result<AuthUser> {
        self.current().ok_or(HelpdeskError::NotAuthenticated)
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().authenticated
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<(Option<String>, Option<AuthUser>)>,
}

impl SessionStorage for MemoryStorage {
    fn token(&self) -> Result<Option<String>> {
        Ok(lock(&self.inner).0.clone())
    }

    fn set_token(&self, token: Option<&str>) -> Result<()> {
        lock(&self.inner).0 = token.map(String::from);
        Ok(())
    }

    fn user(&self) -> Result<Option<AuthUser>> {
        Ok(lock(&self.inner).1.clone())
    }

    fn set_user(&self, user: Option<&AuthUser>) -> Result<()> {
        lock(&self.inner).1 = user.cloned();
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Serialize, Deserialize, Default)]
struct PersistedSession {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<AuthUser>,
}

/// JSON file next to the config.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read(&self) -> Result<PersistedSession> {
        if !self.path.exists() {
            return Ok(PersistedSession::default());
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|e| self.error(e))?;
        serde_json::from_str(&contents).map_err(|e| self.error(e))
    }

    fn write(&self, session: &PersistedSession) -> Result<()> {
        if session.token.is_none() && session.user.is_none() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).map_err(|e| self.error(e))?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.error(e))?;
        }

        let contents = serde_json::to_string_pretty(session).map_err(|e| self.error(e))?;
        std::fs::write(&self.path, contents).map_err(|e| self.error(e))
    }

    fn error(&self, err: impl std::fmt::Display) -> HelpdeskError {
        HelpdeskError::Session {
            path: self.path.clone(),
            message: err.to_string(),
        }
    }
}

impl SessionStorage for FileStorage {
    fn token(&self) -> Result<Option<String>> {
        Ok(self.read()?.token)
    }

    fn set_token(&self, token: Option<&str>) -> Result<()> {
        let mut session = self.read().unwrap_or_default();
        session.token = token.map(String::from);
        self.write(&session)
    }

    fn user(&self) -> Result<Option<AuthUser>> {
        Ok(self.read()?.user)
    }

    fn set_user(&self, user: Option<&AuthUser>) -> Result<()> {
        let mut session = self.read().unwrap_or_default();
        session.user = user.cloned();
        self.write(&session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_user(profile: &str) -> User {
        serde_json::from_value(json!({
            "id": 7,
            "name": "Ana",
            "email": "ana@example.com",
            "my_profile": { "id": 1, "name": profile }
        }))
        .unwrap()
    }

    #[test]
    fn test_establish_classifies_and_notifies() {
        let store = SessionStore::in_memory();
        let mut rx = store.subscribe();
        assert!(!store.is_authenticated());

        let user = store.establish("tok".into(), raw_user("Administrador")).unwrap();

        assert_eq!(user.role, Role::Admin);
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert!(state.authenticated);
        assert_eq!(state.token.as_deref(), Some("tok"));
        assert_eq!(store.current().map(|u| u.role), Some(Role::Admin));
    }

    #[test]
    fn test_clear_wipes_everything() {
        let store = SessionStore::in_memory();
        store.establish("tok".into(), raw_user("SuperUser")).unwrap();
        let mut rx = store.subscribe();

        store.clear();

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SessionState::default());
        assert!(store.current().is_none());
        assert!(store.token().is_none());
        assert!(matches!(store.require(), Err(HelpdeskError::NotAuthenticated)));
    }

    #[test]
    fn test_restore_rederives_role() {
        let storage = MemoryStorage::default();
        let mut stale = AuthUser::new(raw_user("Usuario"));
        // A tampered or outdated role on disk is not trusted.
        stale.role = Role::Superuser;
        storage.set_token(Some("tok")).unwrap();
        storage.set_user(Some(&stale)).unwrap();

        let store = SessionStore::restore(Box::new(storage));

        assert!(store.is_authenticated());
        assert_eq!(store.current().map(|u| u.role), Some(Role::User));
    }

    #[test]
    fn test_restore_requires_token_and_user() {
        let storage = MemoryStorage::default();
        storage.set_token(Some("tok")).unwrap();

        let store = SessionStore::restore(Box::new(storage));
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = std::env::temp_dir().join(format!("helpdesk-session-{}", std::process::id()));
        let path = dir.join("session.json");
        let storage = FileStorage::new(path.clone());

        let user = AuthUser::new(raw_user("Admin"));
        storage.set_token(Some("tok")).unwrap();
        storage.set_user(Some(&user)).unwrap();
        assert_eq!(storage.token().unwrap().as_deref(), Some("tok"));
        assert_eq!(storage.user().unwrap(), Some(user));

        storage.set_token(None).unwrap();
        storage.set_user(None).unwrap();
        assert!(!path.exists());

        let _ = std::fs::remove_dir_all(dir);
    }
}

//! Login, verified restore, and logout.
//!
//! The session manager owns the in-memory identity slot and keeps it in
//! step with the persisted session (token + user id + cached profile).
//! The socket lifecycle is tied to it: auto-reconnect goes on with a
//! session and off at logout.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use dobro_net::{ActionBus, ConnectionHandle, NetError};
use dobro_shared::models::User;
use dobro_shared::protocol::{Action, Request, Topic, UserListPayload};
use dobro_shared::types::UserId;
use dobro_store::Database;

use crate::commands::{await_connected, request_reply};
use crate::error::{ClientError, Result};
use crate::http::HttpApi;

#[derive(Clone)]
pub struct SessionManager {
    db: Arc<Mutex<Database>>,
    http: HttpApi,
    conn: ConnectionHandle,
    bus: Arc<ActionBus>,
    request_timeout: Duration,
    current: Arc<RwLock<Option<User>>>,
}

impl SessionManager {
    pub(crate) fn new(
        db: Arc<Mutex<Database>>,
        http: HttpApi,
        conn: ConnectionHandle,
        bus: Arc<ActionBus>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            db,
            http,
            conn,
            bus,
            request_timeout,
            current: Arc::new(RwLock::new(None)),
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.current.read().clone()
    }

    pub fn current_user_id(&self) -> Option<UserId> {
        self.current.read().as_ref().map(|u| u.id.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_some()
    }

    /// Authenticate against the HTTP API, persist the session, bring the
    /// socket up, and resolve the full user record over it.
    ///
    /// Auth is decided by the HTTP API alone.  If the directory lookup
    /// cannot complete (socket down, reply timed out) or does not list the
    /// account yet, login still succeeds with a minimal profile; the next
    /// directory reply fills in the rest.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let reply = self.http.login(email, password).await?;
        {
            let mut db = self.db.lock();
            db.save_session(&reply.token, &reply.user_id)?;
        }
        self.conn.set_auto_reconnect(true).await?;

        let user = match self.fetch_user(&reply.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(user_id = %reply.user_id, "logged-in user missing from directory");
                minimal_user(&reply.user_id, email)
            }
            Err(ClientError::Timeout { .. }) | Err(ClientError::Net(NetError::NotConnected)) => {
                warn!(user_id = %reply.user_id, "directory unreachable, starting with a minimal profile");
                minimal_user(&reply.user_id, email)
            }
            Err(e) => return Err(e),
        };
        self.install(user.clone())?;
        info!(user_id = %user.id, "login complete");
        Ok(user)
    }

    /// Resume a saved session, verifying it against the user directory.
    ///
    /// Returns the restored user, or `None` when there is nothing to
    /// restore.  A stale session (saved id no longer in the directory) is
    /// cleared; an unverifiable one (timeout, socket down) keeps its
    /// credentials so the next boot can try again.
    pub async fn restore(&self) -> Result<Option<User>> {
        let saved = {
            let db = self.db.lock();
            db.load_session()?
        };
        let Some((_token, user_id)) = saved else {
            debug!("no saved session");
            return Ok(None);
        };

        info!(user_id = %user_id, "restoring saved session");
        self.conn.set_auto_reconnect(true).await?;

        match self.fetch_user(&user_id).await {
            Ok(Some(user)) => {
                self.install(user.clone())?;
                info!(user_id = %user.id, "session restored");
                Ok(Some(user))
            }
            Ok(None) => {
                warn!(user_id = %user_id, "saved session is stale, clearing");
                {
                    let mut db = self.db.lock();
                    db.clear_session()?;
                }
                self.conn.disconnect().await?;
                Ok(None)
            }
            Err(ClientError::Timeout { .. }) | Err(ClientError::Net(NetError::NotConnected)) => {
                warn!("could not verify saved session, keeping credentials");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Drop the session: wipe the persisted state, clear the identity
    /// slot, and take the socket down.
    pub async fn logout(&self) -> Result<()> {
        self.conn.disconnect().await?;
        {
            let mut db = self.db.lock();
            db.clear_session()?;
        }
        *self.current.write() = None;
        info!("logged out");
        Ok(())
    }

    /// Remember where to send the user after the next successful login.
    pub fn set_redirect_after_login(&self, path: &str) -> Result<()> {
        let db = self.db.lock();
        Ok(db.set_redirect_after_login(path)?)
    }

    /// Read and clear the post-login destination.
    pub fn take_redirect_after_login(&self) -> Result<Option<String>> {
        let db = self.db.lock();
        Ok(db.take_redirect_after_login()?)
    }

    /// Make `user` the current identity, in memory and on disk.
    pub(crate) fn install(&self, user: User) -> Result<()> {
        {
            let db = self.db.lock();
            db.cache_profile(&user)?;
        }
        *self.current.write() = Some(user);
        Ok(())
    }

    /// The user id persisted by the last login, if any.
    pub(crate) fn saved_user_id(&self) -> Result<Option<UserId>> {
        let db = self.db.lock();
        Ok(db.user_id()?)
    }

    /// Look `user_id` up in the backend's user directory over the socket.
    async fn fetch_user(&self, user_id: &UserId) -> Result<Option<User>> {
        await_connected(&self.conn, self.request_timeout).await?;
        let reply = request_reply(
            &self.bus,
            &self.conn,
            self.request_timeout,
            Request::new(Topic::UserRequests, Action::GetAllUsers),
        )
        .await?;
        let payload: UserListPayload = reply.decode()?;
        Ok(payload.users.into_iter().find(|u| &u.id == user_id))
    }
}

/// The profile a login falls back to when the directory cannot answer:
/// just the authenticated id and email.
fn minimal_user(user_id: &UserId, email: &str) -> User {
    User {
        id: user_id.clone(),
        email: email.to_string(),
        full_name: None,
        role: None,
        phone: None,
        address: None,
        telegram_id: None,
        vk_id: None,
        created_at: None,
    }
}

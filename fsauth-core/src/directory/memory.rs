use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Directory, DirectoryError, Email, NewUser, User};

/// Process-local [`Directory`].
///
/// Writes are staged and only become visible once the whole create has
/// succeeded, all under a single write lock.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    state: RwLock<State>,
    #[cfg(test)]
    fail_on_email_write: std::sync::Mutex<Option<usize>>,
}

#[derive(Debug, Default)]
struct State {
    last_user_id: i64,
    last_email_id: i64,
    users: BTreeMap<i64, User>,
    names: HashMap<String, i64>,
    emails: HashMap<String, i64>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `nth` (1-based) email write of the next create fail.
    #[cfg(test)]
    pub(crate) fn fail_on_email_write(&self, nth: usize) {
        if let Ok(mut slot) = self.fail_on_email_write.lock() {
            *slot = Some(nth);
        }
    }

    #[cfg(test)]
    fn injected_failure(&self, write: usize) -> Result<(), DirectoryError> {
        let mut slot = self
            .fail_on_email_write
            .lock()
            .map_err(|_| anyhow::anyhow!("fault injection lock poisoned"))?;
        if *slot == Some(write) {
            *slot = None;
            return Err(anyhow::anyhow!("injected failure on email write {write}").into());
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn injected_failure(&self, _write: usize) -> Result<(), DirectoryError> {
        Ok(())
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn find_by_name(&self, name: &str) -> Result<User, DirectoryError> {
        let state = self.state.read().await;
        state
            .names
            .get(name)
            .and_then(|id| state.users.get(id))
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    async fn find_by_email(&self, address: &str) -> Result<User, DirectoryError> {
        let state = self.state.read().await;
        state
            .emails
            .get(address)
            .and_then(|id| state.users.get(id))
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    async fn create(&self, user: NewUser) -> Result<User, DirectoryError> {
        let mut state = self.state.write().await;

        if state.names.contains_key(&user.name) {
            return Err(DirectoryError::AlreadyExists { what: "name" });
        }

        let user_id = state.last_user_id + 1;
        let mut last_email_id = state.last_email_id;
        let mut emails: Vec<Email> = Vec::with_capacity(user.emails.len());

        for (index, new_email) in user.emails.into_iter().enumerate() {
            self.injected_failure(index + 1)?;

            // Every committed address belongs to some other user.
            if state.emails.contains_key(&new_email.address) {
                return Err(DirectoryError::AlreadyExists { what: "email" });
            }

            match emails
                .iter_mut()
                .find(|staged| staged.address == new_email.address)
            {
                Some(staged) => {
                    staged.is_primary = new_email.is_primary;
                    staged.is_verified = new_email.is_verified;
                    staged.verification_code = new_email.verification_code;
                }
                None => {
                    last_email_id += 1;
                    emails.push(Email {
                        id: last_email_id,
                        address: new_email.address,
                        is_primary: new_email.is_primary,
                        is_verified: new_email.is_verified,
                        verification_code: new_email.verification_code,
                    });
                }
            }
        }

        let stored = User {
            id: user_id,
            name: user.name,
            password_hash: user.password_hash,
            public: user.public,
            created_at: Utc::now(),
            emails,
        };

        state.last_user_id = user_id;
        state.last_email_id = last_email_id;
        for email in &stored.emails {
            state.emails.insert(email.address.clone(), user_id);
        }
        state.names.insert(stored.name.clone(), user_id);
        state.users.insert(user_id, stored.clone());

        debug!(user_id, name = %stored.name, "stored user in memory directory");
        Ok(stored)
    }

    async fn list_public_users(&self) -> Result<Vec<User>, DirectoryError> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|user| user.public)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }
}

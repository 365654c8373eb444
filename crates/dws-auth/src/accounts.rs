//! Local service account provisioning.
//!
//! Peers authenticate to each other with the shared [`Credential`], so every
//! device must hold a local account for it with the required roles. The
//! directory holding accounts is an external collaborator behind
//! [`AccountDirectory`]; [`AccountRegistry`] is the in-process directory the
//! daemon authenticates inbound requests against.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::credential::Credential;
use crate::error::{AuthError, Result};

/// Roles granted to the service account when none are specified.
pub const DEFAULT_SERVICE_ROLES: &[&str] = &["Integrator", "User"];

/// A local account as reported by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Account username.
    pub username: String,
    /// Roles currently granted.
    pub roles: Vec<String>,
    /// Whether the account may log in.
    pub active: bool,
    /// Whether the directory will force a passphrase change on next login.
    pub passphrase_change_required: bool,
}

/// A modification applied to an existing account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountChange {
    /// Roles to grant in addition to the current ones.
    pub add_roles: Vec<String>,
    /// New active flag, if changing.
    pub active: Option<bool>,
    /// New passphrase-change flag, if changing.
    pub passphrase_change_required: Option<bool>,
}

/// The directory of local accounts on this device.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Look up an account. Returns `None` if it does not exist.
    async fn get_user(&self, username: &str) -> Result<Option<Account>>;

    /// Create an active account with the given roles and password.
    async fn add_user(&self, username: &str, password: &str, roles: &[String]) -> Result<()>;

    /// Modify an existing account.
    async fn modify_user(&self, username: &str, change: AccountChange) -> Result<()>;

    /// Replace an account's password.
    async fn set_passphrase(&self, username: &str, password: &str) -> Result<()>;
}

/// Return the required roles the account does not hold yet.
///
/// Returns `Ok(None)` when nothing is missing.
///
/// # Errors
///
/// Returns `AuthError::AccountSetup` if the account has no roles at all or if
/// `required` is empty.
pub fn identify_missing_roles(account: &Account, required: &[String]) -> Result<Option<Vec<String>>> {
    if account.roles.is_empty() {
        return Err(AuthError::AccountSetup(format!(
            "user account [{}] has no roles to check",
            account.username
        )));
    }
    if required.is_empty() {
        return Err(AuthError::AccountSetup("no required roles provided".into()));
    }

    let missing: Vec<String> = required
        .iter()
        .filter(|role| !account.roles.contains(role))
        .cloned()
        .collect();

    Ok(if missing.is_empty() { None } else { Some(missing) })
}

/// Make sure an active account for `credential` exists with `required_roles`.
///
/// Existing accounts gain any missing roles and are re-activated if needed;
/// the password is always reset to the credential's. Missing accounts are
/// created.
///
/// # Errors
///
/// Returns `AuthError::AccountSetup` if the directory rejects any step.
pub async fn ensure_service_account<D: AccountDirectory + ?Sized>(
    directory: &D,
    credential: &Credential,
    required_roles: &[String],
) -> Result<()> {
    let username = credential.username();
    let roles: Vec<String> = if required_roles.is_empty() {
        DEFAULT_SERVICE_ROLES.iter().map(ToString::to_string).collect()
    } else {
        required_roles.to_vec()
    };

    let Some(account) = directory.get_user(username).await.map_err(setup_error)? else {
        tracing::debug!(username, "Service account does not exist, creating it");
        return directory
            .add_user(username, credential.password(), &roles)
            .await
            .map_err(setup_error);
    };

    tracing::debug!(username, "Service account exists, checking roles and status");
    if let Some(missing) = identify_missing_roles(&account, &roles)? {
        tracing::debug!(username, missing = ?missing, "Adding missing roles to service account");
        directory
            .modify_user(
                username,
                AccountChange {
                    add_roles: missing,
                    active: Some(true),
                    passphrase_change_required: Some(false),
                },
            )
            .await
            .map_err(setup_error)?;
    } else if account.passphrase_change_required || !account.active {
        tracing::debug!(username, "Re-activating service account");
        directory
            .modify_user(
                username,
                AccountChange {
                    add_roles: Vec::new(),
                    active: Some(true),
                    passphrase_change_required: Some(false),
                },
            )
            .await
            .map_err(setup_error)?;
    }

    directory
        .set_passphrase(username, credential.password())
        .await
        .map_err(setup_error)
}

fn setup_error(err: AuthError) -> AuthError {
    match err {
        AuthError::AccountSetup(_) => err,
        other => AuthError::AccountSetup(other.to_string()),
    }
}

struct StoredAccount {
    account: Account,
    digest: blake3::Hash,
}

/// An in-process account directory.
///
/// Passwords are kept only as `blake3` digests; comparing `blake3::Hash`
/// values is constant-time.
#[derive(Default)]
pub struct AccountRegistry {
    accounts: RwLock<HashMap<String, StoredAccount>>,
}

impl AccountRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a username/password pair against the registry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Rejected` unless the account exists, is active and
    /// the password matches.
    pub fn verify(&self, username: &str, password: &str) -> Result<()> {
        let accounts = self.accounts.read();
        let stored = accounts.get(username).ok_or(AuthError::Rejected)?;
        if stored.account.active && stored.digest == blake3::hash(password.as_bytes()) {
            Ok(())
        } else {
            Err(AuthError::Rejected)
        }
    }

    /// Verify a raw `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MalformedAuthorization` for unparseable headers and
    /// `AuthError::Rejected` for unknown or wrong credentials.
    pub fn verify_header(&self, header: &str) -> Result<String> {
        let (username, password) = Credential::parse_authorization(header)?;
        self.verify(&username, &password)?;
        Ok(username)
    }
}

#[async_trait]
impl AccountDirectory for AccountRegistry {
    async fn get_user(&self, username: &str) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .get(username)
            .map(|stored| stored.account.clone()))
    }

    async fn add_user(&self, username: &str, password: &str, roles: &[String]) -> Result<()> {
        let mut accounts = self.accounts.write();
        if accounts.contains_key(username) {
            return Err(AuthError::Directory(format!("user {username} already exists")));
        }
        accounts.insert(
            username.to_string(),
            StoredAccount {
                account: Account {
                    username: username.to_string(),
                    roles: roles.to_vec(),
                    active: true,
                    passphrase_change_required: false,
                },
                digest: blake3::hash(password.as_bytes()),
            },
        );
        Ok(())
    }

    async fn modify_user(&self, username: &str, change: AccountChange) -> Result<()> {
        let mut accounts = self.accounts.write();
        let stored = accounts
            .get_mut(username)
            .ok_or_else(|| AuthError::Directory(format!("user {username} does not exist")))?;

        for role in change.add_roles {
            if !stored.account.roles.contains(&role) {
                stored.account.roles.push(role);
            }
        }
        if let Some(active) = change.active {
            stored.account.active = active;
        }
        if let Some(required) = change.passphrase_change_required {
            stored.account.passphrase_change_required = required;
        }
        Ok(())
    }

    async fn set_passphrase(&self, username: &str, password: &str) -> Result<()> {
        let mut accounts = self.accounts.write();
        let stored = accounts
            .get_mut(username)
            .ok_or_else(|| AuthError::Directory(format!("user {username} does not exist")))?;
        stored.digest = blake3::hash(password.as_bytes());
        Ok(())
    }
}

#![cfg(feature = "web")]

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::app::{ApiJson, AppState, failure, success};
use crate::column::quote_sheet_name;
use crate::error::AccountError;
use crate::permission::Role;
use crate::sheets::SpreadsheetService;

lazy_static! {
    static ref CLIENT_ID_REGEX: Regex = Regex::new(r"^C(\d+)$").unwrap();
}

/// Highest client number assumed when the sheet has none yet
pub const CLIENT_ID_BASE: u64 = 2000;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

// Columns of the users sheet
pub const COL_IS_VERIFIED: &str = "IS_VERIFIED";
pub const COL_CLIENT_ID: &str = "CLIENT_ID";
pub const COL_USERNAME: &str = "USERNAME";
pub const COL_PASSWORD: &str = "PASSWORD";
pub const COL_USER_TYPE: &str = "USER_TYPE";
pub const COL_NAME: &str = "NAME";
pub const COL_BIRTHYEAR: &str = "BIRTHYEAR";
pub const COL_COMMENT: &str = "COMMENT";

/// A row of the users sheet
///
/// The `password` field holds whatever the sheet stores: an Argon2 PHC
/// string for accounts created here, plain text for older rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub is_verified: String,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub user_type: Role,
    pub name: String,
    pub birthyear: String,
    pub comment: String,
}

impl UserRecord {
    fn from_row(headers: &[String], row: &[String]) -> Self {
        let field = |column: &str| {
            headers
                .iter()
                .position(|h| h == column)
                .and_then(|i| row.get(i))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        UserRecord {
            is_verified: field(COL_IS_VERIFIED),
            client_id: field(COL_CLIENT_ID),
            username: field(COL_USERNAME),
            password: field(COL_PASSWORD),
            user_type: Role::parse(&field(COL_USER_TYPE)),
            name: field(COL_NAME),
            birthyear: field(COL_BIRTHYEAR),
            comment: field(COL_COMMENT),
        }
    }

    /// Cell value for a users-sheet column, used when writing new rows
    fn column_value(&self, column: &str) -> String {
        match column {
            COL_IS_VERIFIED => self.is_verified.clone(),
            COL_CLIENT_ID => self.client_id.clone(),
            COL_USERNAME => self.username.clone(),
            COL_PASSWORD => self.password.clone(),
            COL_USER_TYPE => self.user_type.to_string(),
            COL_NAME => self.name.clone(),
            COL_BIRTHYEAR => self.birthyear.clone(),
            COL_COMMENT => self.comment.clone(),
            _ => String::new(),
        }
    }
}

/// The users sheet: its trimmed header row and one record per data row
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    pub headers: Vec<String>,
    pub users: Vec<UserRecord>,
}

impl UserDirectory {
    pub fn find(&self, username: &str) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.username == username)
    }

    pub fn next_client_id(&self) -> Result<String, AccountError> {
        next_client_id(self.users.iter().map(|u| u.client_id.as_str()))
    }
}

/// Read the users sheet
///
/// # Errors
/// * `AccountError::NoUserData` if the sheet has no header row
/// * `AccountError::Sheet` if the spreadsheet service fails
pub async fn load_users(
    service: &dyn SpreadsheetService,
    sheet_id: &str,
    tab: &str,
) -> Result<UserDirectory, AccountError> {
    let range = format!("{}!A:Z", quote_sheet_name(tab));
    let rows = service.get_rows(sheet_id, &range).await?;
    let Some((header, data)) = rows.split_first() else {
        return Err(AccountError::NoUserData);
    };

    let headers: Vec<String> = header.iter().map(|h| h.trim().to_string()).collect();
    if headers.iter().all(String::is_empty) {
        return Err(AccountError::NoUserData);
    }

    let users = data
        .iter()
        .map(|row| UserRecord::from_row(&headers, row))
        .collect();
    Ok(UserDirectory { headers, users })
}

/// Next sequential client id, e.g. `C2006` after `C2005`
///
/// Only ids of the exact form `C<digits>` count. With none present the
/// sequence starts after [`CLIENT_ID_BASE`].
///
/// # Examples
/// ```
/// use fpm::login::next_client_id;
///
/// assert_eq!(next_client_id(["C2005", "C1999", "X9999"]).unwrap(), "C2006");
/// assert_eq!(next_client_id(Vec::<&str>::new()).unwrap(), "C2001");
/// ```
///
/// # Errors
/// * `AccountError::ClientIdExhausted` if the highest id has no successor
pub fn next_client_id<'a, I>(ids: I) -> Result<String, AccountError>
where
    I: IntoIterator<Item = &'a str>,
{
    let last = ids
        .into_iter()
        .filter_map(|id| CLIENT_ID_REGEX.captures(id.trim()))
        .filter_map(|caps| caps[1].parse::<u64>().ok())
        .max()
        .unwrap_or(CLIENT_ID_BASE);
    last.checked_add(1)
        .map(|next| format!("C{}", next))
        .ok_or(AccountError::ClientIdExhausted(last))
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Sign-up form sent by the browser
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAccount {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub birthyear: String,
}

/// Create a user account on the users sheet
///
/// New accounts are unverified `client` users. The password is stored as
/// an Argon2 hash.
///
/// # Returns
/// * `Result<String, AccountError>` - the new client id
///
/// # Errors
/// * `AccountError::MissingFields` if username, password or birth year is empty
/// * `AccountError::UsernameTaken` if the username is already registered
pub async fn create_account(
    service: &dyn SpreadsheetService,
    sheet_id: &str,
    tab: &str,
    account: &NewAccount,
) -> Result<String, AccountError> {
    let username = account.username.trim();
    if username.is_empty() || account.password.is_empty() || account.birthyear.trim().is_empty() {
        return Err(AccountError::MissingFields);
    }

    let directory = load_users(service, sheet_id, tab).await?;
    if directory.find(username).is_some() {
        return Err(AccountError::UsernameTaken);
    }

    let record = UserRecord {
        is_verified: "NEW_USER".to_string(),
        client_id: directory.next_client_id()?,
        username: username.to_string(),
        password: hash_password(&account.password)?,
        user_type: Role::Client,
        name: account.name.trim().to_string(),
        birthyear: account.birthyear.trim().to_string(),
        comment: String::new(),
    };

    let row = directory
        .headers
        .iter()
        .map(|column| record.column_value(column))
        .collect();
    service.append_row(sheet_id, tab, row).await?;

    log::info!("Created account '{}' as {}", record.username, record.client_id);
    Ok(record.client_id)
}

/// Check a username and password against the users sheet
pub fn authenticate<'a>(
    directory: &'a UserDirectory,
    username: &str,
    password: &str,
) -> Result<&'a UserRecord, AccountError> {
    let user = directory
        .find(username.trim())
        .ok_or(AccountError::InvalidCredentials)?;
    if verify_password(password, &user.password) {
        Ok(user)
    } else {
        Err(AccountError::InvalidCredentials)
    }
}

/// Hash a password using Argon2
///
/// # Errors
/// * Returns `AccountError::Hash` if the password hashing fails
pub fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccountError::Hash(e.to_string()))
}

/// Verify a password against a stored value
///
/// Stored values that parse as a PHC hash are checked with Argon2; any
/// other value is a legacy plain-text password and must match exactly.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => !stored.is_empty() && stored == password,
    }
}

/// An authenticated user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub role: Role,
    pub client_id: String,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
}

impl Session {
    /// Whole seconds since login, shown by the header timer
    pub fn active_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.created_at)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Live sessions keyed by token
///
/// Owned by the application state and handed to each request, so the
/// role of a caller always comes from the server side.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    duration: Duration,
}

impl SessionStore {
    pub fn new(duration: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            duration,
        }
    }

    /// Start a session for `user` and return its token
    pub fn create(&self, user: &UserRecord) -> String {
        let token = Uuid::new_v4().to_string();
        let now = SystemTime::now();
        let session = Session {
            username: user.username.clone(),
            role: user.user_type.clone(),
            client_id: user.client_id.clone(),
            created_at: now,
            expires_at: now + self.duration,
        };

        let mut sessions = self.sessions.write().unwrap();
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(token.clone(), session);
        token
    }

    /// The session for `token`, if it exists and has not expired
    pub fn validate(&self, token: &str) -> Option<Session> {
        let sessions = self.sessions.read().unwrap();
        sessions
            .get(token)
            .filter(|s| s.expires_at > SystemTime::now())
            .cloned()
    }

    pub fn remove(&self, token: &str) -> Option<Session> {
        self.sessions.write().unwrap().remove(token)
    }

    /// Session named by the request's session cookie
    pub fn from_jar(&self, jar: &CookieJar) -> Option<Session> {
        jar.get(SESSION_COOKIE).and_then(|c| self.validate(c.value()))
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
struct SessionUser<'a> {
    username: &'a str,
    user_type: &'a str,
    client_id: &'a str,
}

/// Handle user login requests
///
/// Verifies the credentials against the users sheet and starts a session.
/// The token is set as the `session` cookie and echoed in the body.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ApiJson(credentials): ApiJson<LoginRequest>,
) -> Response {
    let directory = match load_users(
        state.service.as_ref(),
        &state.config.user_sheet_id,
        &state.config.user_tab,
    )
    .await
    {
        Ok(directory) => directory,
        Err(e) => {
            log::error!("User loading error: {}", e);
            return failure(e).into_response();
        }
    };

    match authenticate(&directory, &credentials.username, &credentials.password) {
        Ok(user) => {
            let token = state.sessions.create(user);
            log::info!("'{}' logged in as {}", user.username, user.user_type);
            let body = success(json!({
                "token": token,
                "user": SessionUser {
                    username: &user.username,
                    user_type: user.user_type.as_str(),
                    client_id: &user.client_id,
                },
            }));
            let cookie = Cookie::build((SESSION_COOKIE, token)).path("/").http_only(true);
            (jar.add(cookie), body).into_response()
        }
        Err(e) => failure(e).into_response(),
    }
}

/// Handle user logout
///
/// Ends the session and clears the cookie. Logging out without a session
/// is not an error.
pub async fn handle_logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Some(session) = state.sessions.remove(cookie.value()) {
            log::info!("'{}' logged out", session.username);
        }
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, success(json!(null))).into_response()
}

/// Report who is logged in, for the header widget
///
/// Guests get `{"username": "Guest", "user_type": "-"}`.
pub async fn handle_session(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let data = match state.sessions.from_jar(&jar) {
        Some(session) => json!({
            "loggedIn": true,
            "username": session.username,
            "user_type": session.role.as_str(),
            "client_id": session.client_id,
            "activeSeconds": session.active_seconds(),
        }),
        None => json!({
            "loggedIn": false,
            "username": "Guest",
            "user_type": "-",
        }),
    };
    success(data).into_response()
}

/// Handle account creation
///
/// Account creation is serialized inside this process so two sign-ups
/// cannot be handed the same client id.
pub async fn handle_create_account(
    State(state): State<Arc<AppState>>,
    ApiJson(account): ApiJson<NewAccount>,
) -> Response {
    let _guard = state.account_lock.lock().await;

    match create_account(
        state.service.as_ref(),
        &state.config.user_sheet_id,
        &state.config.user_tab,
        &account,
    )
    .await
    {
        Ok(client_id) => Json(json!({ "success": true, "clientId": client_id })).into_response(),
        Err(e) => {
            if matches!(e, AccountError::Sheet(_) | AccountError::Hash(_) | AccountError::ClientIdExhausted(_)) {
                log::error!("CREATE ACCOUNT ERROR: {}", e);
            }
            failure(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        [
            COL_IS_VERIFIED, COL_CLIENT_ID, COL_USERNAME, COL_PASSWORD,
            COL_USER_TYPE, COL_NAME, COL_BIRTHYEAR, COL_COMMENT,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn record(username: &str, password: &str, role: &str) -> UserRecord {
        let row: Vec<String> = ["YES", "C2001", username, password, role, "", "1990", ""]
            .iter()
            .map(|s| s.to_string())
            .collect();
        UserRecord::from_row(&headers(), &row)
    }

    #[test]
    fn client_ids_follow_the_highest() {
        assert_eq!(next_client_id(["C2001", "C2010", "C2003"]).unwrap(), "C2011");
        assert_eq!(next_client_id(["C15"]).unwrap(), "C16");
        assert_eq!(next_client_id(["", "ADMIN", "C20x", "c2100"]).unwrap(), "C2001");
        assert_eq!(next_client_id(Vec::<&str>::new()).unwrap(), "C2001");
    }

    #[test]
    fn client_ids_never_wrap() {
        let err = next_client_id(["C2001", "C18446744073709551615"]).unwrap_err();
        assert!(matches!(err, AccountError::ClientIdExhausted(u64::MAX)));

        // Too long for u64: not a candidate at all
        assert_eq!(next_client_id(["C2003", "C99999999999999999999"]).unwrap(), "C2004");
    }

    #[test]
    fn records_are_trimmed() {
        let row: Vec<String> = [" NEW_USER ", "C2002", " ada ", "pw", " co-admin"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let user = UserRecord::from_row(&headers(), &row);
        assert_eq!(user.username, "ada");
        assert_eq!(user.user_type, Role::CoAdmin);
        assert_eq!(user.birthyear, "");
    }

    #[test]
    fn hashed_and_legacy_passwords() {
        let hash = hash_password("secret").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("secret", &hash));
        assert!(!verify_password("Secret", &hash));

        assert!(verify_password("plain", "plain"));
        assert!(!verify_password("", ""));
    }

    #[test]
    fn authenticate_checks_username_and_password() {
        let directory = UserDirectory {
            headers: headers(),
            users: vec![record("ada", "pw", "admin")],
        };
        assert_eq!(authenticate(&directory, "ada", "pw").unwrap().user_type, Role::Admin);
        assert!(matches!(
            authenticate(&directory, "ada", "nope"),
            Err(AccountError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate(&directory, "bob", "pw"),
            Err(AccountError::InvalidCredentials)
        ));
    }

    #[test]
    fn sessions_expire() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create(&record("ada", "pw", "read"));
        let session = store.validate(&token).unwrap();
        assert_eq!(session.username, "ada");
        assert_eq!(session.role, Role::Read);
        assert!(store.validate("other").is_none());
        assert!(store.remove(&token).is_some());
        assert!(store.validate(&token).is_none());

        let expired = SessionStore::new(Duration::ZERO);
        let token = expired.create(&record("ada", "pw", "read"));
        assert!(expired.validate(&token).is_none());
    }

    #[test]
    fn birthyear_accepts_numbers() {
        let account: NewAccount =
            serde_json::from_str(r#"{"username":"a","password":"b","birthyear":1999}"#).unwrap();
        assert_eq!(account.birthyear, "1999");
        assert_eq!(account.name, "");
    }
}

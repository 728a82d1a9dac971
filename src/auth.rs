// 🔐 Auth - password hashing, login sessions and account lifecycle
//
// Passwords are stored as `pbkdf2_sha256$<iterations>$<salt>$<hash>` with
// hex encoded salt and hash. Session tokens are only known to the client;
// the database keeps their SHA-256.

use crate::config::Config;
use crate::db::record_event;
use crate::entities::registration::{self, Registration, RegistrationKind};
use crate::entities::user::{self, NewUser, User};
use crate::error::{Result, TrackerError};
use crate::forms::{CleanUserCreation, PasswordChangeForm, SetPasswordForm};
use crate::mail::{self, Mailer};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const ALGORITHM: &str = "pbkdf2_sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

// ============================================================================
// PASSWORDS
// ============================================================================
//
// Hashing is slow on purpose. Nothing in this section touches the database
// so callers can run it without holding the connection.

fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; HASH_LEN] {
    let mut output = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut output);
    output
}

pub fn hash_password(password: &str, iterations: u32) -> String {
    let salt: [u8; SALT_LEN] = rand::random();
    let hash = pbkdf2_sha256(password.as_bytes(), &salt, iterations);
    format!(
        "{}${}${}${}",
        ALGORITHM,
        iterations,
        hex::encode(salt),
        hex::encode(hash)
    )
}

/// Constant time check of `password` against a stored hash.
///
/// Malformed hashes never match.
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let parts: Vec<&str> = encoded.split('$').collect();
    let [algorithm, iterations, salt, expected] = parts.as_slice() else {
        return false;
    };
    if *algorithm != ALGORITHM {
        return false;
    }

    let (Ok(iterations), Ok(salt), Ok(expected)) = (
        iterations.parse::<u32>(),
        hex::decode(salt),
        hex::decode(expected),
    ) else {
        return false;
    };
    if iterations == 0 || expected.len() != HASH_LEN {
        return false;
    }

    let hash = pbkdf2_sha256(password.as_bytes(), &salt, iterations);
    hash[..].ct_eq(&expected[..]).into()
}

/// Check a password against the account found for a login
pub fn verify_credentials(candidate: Option<User>, password: &str) -> Result<User> {
    let user = candidate
        .filter(|u| verify_password(password, &u.password_hash))
        .ok_or(TrackerError::InvalidCredentials)?;

    if !user.is_active {
        tracing::info!(username = %user.username, "login refused for inactive account");
        return Err(TrackerError::InvalidCredentials);
    }
    Ok(user)
}

/// Active account matching the credentials
pub fn authenticate(conn: &Connection, username: &str, password: &str) -> Result<User> {
    verify_credentials(user::find_by_username(conn, username.trim())?, password)
}

/// Hash of the new password once the old one is confirmed
pub fn password_change_hash(config: &Config, user: &User, form: &PasswordChangeForm) -> Result<String> {
    let password = form.validate(user)?;
    Ok(hash_password(&password, config.password_iterations))
}

/// Hash of a password chosen with a reset key
pub fn password_reset_hash(config: &Config, form: &SetPasswordForm) -> Result<String> {
    let password = form.validate()?;
    Ok(hash_password(&password, config.password_iterations))
}

// ============================================================================
// SESSIONS
// ============================================================================

fn token_hash(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Open a session and return its bearer token
pub fn create_session(conn: &Connection, user_id: i64, days: i64) -> Result<String> {
    let token = hex::encode(rand::random::<[u8; 32]>());
    let now = Utc::now();
    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, created, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![token_hash(&token), user_id, now, now + Duration::days(days)],
    )?;
    Ok(token)
}

/// The active account behind a token; expired sessions are dropped
pub fn resolve_session(conn: &Connection, token: &str, now: DateTime<Utc>) -> Result<User> {
    let hash = token_hash(token);
    let session: Option<(i64, DateTime<Utc>)> = conn
        .query_row(
            "SELECT user_id, expires_at FROM sessions WHERE token_hash = ?1",
            [&hash],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let (user_id, expires_at) = session.ok_or(TrackerError::Unauthenticated)?;
    if expires_at <= now {
        conn.execute("DELETE FROM sessions WHERE token_hash = ?1", [&hash])?;
        return Err(TrackerError::Unauthenticated);
    }

    match user::find(conn, user_id)? {
        Some(user) if user.is_active => Ok(user),
        _ => Err(TrackerError::Unauthenticated),
    }
}

pub fn delete_session(conn: &Connection, token: &str) -> Result<()> {
    conn.execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash(token)])?;
    Ok(())
}

pub fn delete_expired_sessions(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    Ok(conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?)
}

// ============================================================================
// ACCOUNT LIFECYCLE
// ============================================================================

/// Create an inactive account and mail its activation key
pub fn register_user(
    conn: &Connection,
    mailer: &dyn Mailer,
    config: &Config,
    clean: &CleanUserCreation,
) -> Result<(User, Registration)> {
    let password_hash = hash_password(&clean.password, config.password_iterations);
    create_pending_account(conn, mailer, config, clean, &password_hash)
}

/// [`register_user`] with the password already hashed
pub fn create_pending_account(
    conn: &Connection,
    mailer: &dyn Mailer,
    config: &Config,
    clean: &CleanUserCreation,
    password_hash: &str,
) -> Result<(User, Registration)> {
    // Re-checked: the name may have been taken since the form was validated
    if user::username_exists(conn, &clean.username)? {
        return Err(TrackerError::field("username", crate::forms::DUPLICATE_USERNAME));
    }

    let tx = conn.unchecked_transaction()?;
    let user = user::create(
        &tx,
        &NewUser {
            username: &clean.username,
            email: &clean.email,
            first_name: "",
            last_name: "",
            password_hash,
            is_active: false,
        },
    )?;
    let registration = registration::create(&tx, user.id, RegistrationKind::Creation)?;
    tx.commit()?;

    mailer.send(mail::creation_mail(
        &user.email,
        &user.username,
        &config.site_url,
        &registration.key,
        config.registration_days,
    ))?;

    record_event(conn, "user_created", "user", user.id, json!({ "username": user.username }), &user.username);
    tracing::info!(username = %user.username, "account created, awaiting activation");
    Ok((user, registration))
}

/// Activate the account of a creation or deletion key.
///
/// Expired keys are consumed and reported as not found.
pub fn activate_account(conn: &Connection, key: &str, now: DateTime<Utc>, validity_days: i64) -> Result<User> {
    let user_id = registration::activate_user(conn, key, now, validity_days)?
        .ok_or(TrackerError::NotFound("Registration"))?;
    let user = user::get(conn, user_id)?;
    record_event(conn, "user_activated", "user", user.id, json!({}), &user.username);
    Ok(user)
}

/// Deactivate an account; the mailed key restores it while valid
pub fn delete_account(
    conn: &Connection,
    mailer: &dyn Mailer,
    config: &Config,
    user: &User,
) -> Result<Registration> {
    user::set_active(conn, user.id, false)?;
    conn.execute("DELETE FROM sessions WHERE user_id = ?1", [user.id])?;
    let registration = registration::create(conn, user.id, RegistrationKind::Deletion)?;

    mailer.send(mail::deletion_mail(
        &user.email,
        &user.username,
        &config.site_url,
        &registration.key,
        config.registration_days,
    ))?;

    record_event(conn, "user_deleted", "user", user.id, json!({}), &user.username);
    Ok(registration)
}

pub fn change_password(conn: &Connection, config: &Config, user: &User, form: &PasswordChangeForm) -> Result<()> {
    let hash = password_change_hash(config, user, form)?;
    store_password(conn, user, &hash)
}

/// Replace the password hash of `user`
pub fn store_password(conn: &Connection, user: &User, password_hash: &str) -> Result<()> {
    user::set_password_hash(conn, user.id, password_hash)?;
    record_event(conn, "password_changed", "user", user.id, json!({}), &user.username);
    Ok(())
}

/// Mail a reset key to every active account using `email`.
///
/// Unknown addresses are accepted silently. Returns the number of mails sent.
pub fn request_password_reset(conn: &Connection, mailer: &dyn Mailer, config: &Config, email: &str) -> Result<usize> {
    let users = user::find_active_by_email(conn, email)?;
    for user in &users {
        let registration = registration::create(conn, user.id, RegistrationKind::PasswordReset)?;
        mailer.send(mail::password_reset_mail(
            &user.email,
            &user.username,
            &config.site_url,
            &registration.key,
        ))?;
        record_event(conn, "password_reset_requested", "user", user.id, json!({}), &user.username);
    }
    Ok(users.len())
}

/// The pending reset of `key`; an expired one is consumed and not found
pub fn find_password_reset(conn: &Connection, config: &Config, key: &str, now: DateTime<Utc>) -> Result<Registration> {
    let registration = registration::find_by_key(conn, key)?
        .filter(|r| r.kind == RegistrationKind::PasswordReset)
        .ok_or(TrackerError::NotFound("Registration"))?;

    if !registration.is_valid(now, config.registration_days) {
        registration::delete(conn, registration.id)?;
        return Err(TrackerError::NotFound("Registration"));
    }
    Ok(registration)
}

/// Store the new password of a reset and consume its key
pub fn complete_password_reset(conn: &Connection, registration: &Registration, password_hash: &str) -> Result<User> {
    // The key may have been used by a concurrent request
    if registration::find_by_key(conn, &registration.key)?.is_none() {
        return Err(TrackerError::NotFound("Registration"));
    }

    let tx = conn.unchecked_transaction()?;
    user::set_password_hash(&tx, registration.user_id, password_hash)?;
    registration::delete(&tx, registration.id)?;
    tx.commit()?;

    let user = user::get(conn, registration.user_id)?;
    record_event(conn, "password_reset", "user", user.id, json!({}), &user.username);
    Ok(user)
}

/// Set a new password with a reset key; the key is consumed
pub fn confirm_password_reset(
    conn: &Connection,
    config: &Config,
    key: &str,
    form: &SetPasswordForm,
    now: DateTime<Utc>,
) -> Result<User> {
    let registration = find_password_reset(conn, config, key, now)?;
    let hash = password_reset_hash(config, form)?;
    complete_password_reset(conn, &registration, &hash)
}

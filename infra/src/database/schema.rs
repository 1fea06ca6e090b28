//! Table definitions created by [`DatabasePool::ensure_schema`](super::DatabasePool::ensure_schema)

pub const CREATE_USERS: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id            CHAR(36)     NOT NULL PRIMARY KEY,
        name          VARCHAR(100) NOT NULL,
        email         VARCHAR(255) NOT NULL,
        password_hash VARCHAR(255) NOT NULL,
        created_at    DATETIME(6)  NOT NULL,
        updated_at    DATETIME(6)  NOT NULL,
        UNIQUE KEY uq_users_email (email),
        KEY idx_users_created_at (created_at)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"#;

// Tokens are looked up by the SHA-256 of their value; the raw values are too
// long to index.
pub const CREATE_TOKENS: &str = r#"
    CREATE TABLE IF NOT EXISTS tokens (
        id                 CHAR(36)    NOT NULL PRIMARY KEY,
        user_id            CHAR(36)    NOT NULL,
        access_token       TEXT        NOT NULL,
        access_token_hash  CHAR(64)    NOT NULL,
        refresh_token      TEXT        NOT NULL,
        refresh_token_hash CHAR(64)    NOT NULL,
        access_expires_at  DATETIME(6) NOT NULL,
        refresh_expires_at DATETIME(6) NOT NULL,
        is_revoked         BOOLEAN     NOT NULL DEFAULT FALSE,
        created_at         DATETIME(6) NOT NULL,
        UNIQUE KEY uq_tokens_access (access_token_hash),
        UNIQUE KEY uq_tokens_refresh (refresh_token_hash),
        KEY idx_tokens_user_id (user_id),
        KEY idx_tokens_refresh_expires_at (refresh_expires_at)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"#;

pub const ALL: [&str; 2] = [CREATE_USERS, CREATE_TOKENS];

//! SQL DDL for initializing the database schema.

/// SQLite schema includes:
/// - `profiles` table (one row per user, holds the credit balance)
/// - `images` table (one row per generated image, owned by a profile)
/// - `sessions` table (opaque bearer tokens mapped to a profile)
pub const SQLITE_INIT: &str = r#"
-- ---------------------------------------------------------------------------
-- Profiles
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    id TEXT PRIMARY KEY NOT NULL,
    display_name TEXT NOT NULL,
    avatar_url TEXT NULL,
    credits INTEGER NOT NULL DEFAULT 0 CHECK (credits >= 0),
    created_at TEXT NOT NULL -- RFC3339
);

-- ---------------------------------------------------------------------------
-- Generated images
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL REFERENCES profiles(id),
    prompt TEXT NOT NULL,
    image_data TEXT NOT NULL, -- public URL
    storage_key TEXT NOT NULL, -- object key inside the images bucket
    liked INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_images_user_created ON images(user_id, created_at);

-- ---------------------------------------------------------------------------
-- Sessions
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL REFERENCES profiles(id),
    expires_at TEXT NOT NULL, -- RFC3339
    created_at TEXT NOT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
"#;

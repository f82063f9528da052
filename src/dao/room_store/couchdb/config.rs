use std::env;

use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "cyberguard";

/// Where room documents live in CouchDB and how to authenticate.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server URL, without the database segment.
    pub base_url: String,
    /// Database holding room and round documents.
    pub database: String,
    /// Basic-auth user and password, when the server requires them.
    pub credentials: Option<(String, String)>,
}

impl CouchConfig {
    /// Configuration for `database` on the server at `base_url`, without credentials.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            credentials: None,
        }
    }

    /// Read `COUCH_BASE_URL` (required), `COUCH_DB` and the optional
    /// `COUCH_USERNAME`/`COUCH_PASSWORD` pair.
    pub fn from_env() -> CouchResult<Self> {
        let base_url = env::var("COUCH_BASE_URL").map_err(|_| CouchDaoError::MissingEnvVar {
            var: "COUCH_BASE_URL",
        })?;
        let database = env::var("COUCH_DB").unwrap_or_else(|_| DEFAULT_DATABASE.to_owned());

        Ok(Self {
            credentials: env::var("COUCH_USERNAME").ok().zip(env::var("COUCH_PASSWORD").ok()),
            ..Self::new(base_url, database)
        })
    }
}

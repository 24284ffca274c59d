//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! OCI-style INI configuration file parsing, used both for direct
//! user-identity configuration and for session-token configuration.
//!
//! Format: `#`-comment and blank lines are skipped, `[name]` begins a
//! profile, `key = value` lines populate it. Required keys for user
//! identity: `tenancy`, `user`, `fingerprint`, `key_file`. Required keys
//! for session-token identity: `tenancy`, `key_file`, `security_token_file`.
//! Both accept an optional `pass_phrase` and an optional `region`.

use ini::Ini;

use crate::auth::profile_provider::{Profile, ProfileProvider, ValueSource};
use crate::auth::session_token_provider::SessionTokenProfileProvider;
use crate::auth::simple_provider::SimpleProfileProvider;
use crate::error::{cred_err, NoSQLError};
use crate::region::Region;
use async_trait::async_trait;
use tracing::instrument;

const TENANCY: &str = "tenancy";
const USER: &str = "user";
const FINGERPRINT: &str = "fingerprint";
const KEY_FILE: &str = "key_file";
const PASS_PHRASE: &str = "pass_phrase";
const REGION: &str = "region";
const SECURITY_TOKEN_FILE: &str = "security_token_file";

fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().into_owned();
        }
    }
    path.to_string()
}

fn required<'a>(section: &'a ini::Properties, file: &str, key: &str) -> Result<&'a str, NoSQLError> {
    section
        .get(key)
        .ok_or_else(|| cred_err!("OCI config file '{}' is missing required field '{}'", file, key).unwrap_err())
}

#[derive(Debug)]
enum Inner {
    User(SimpleProfileProvider),
    SessionToken(SessionTokenProfileProvider),
}

/// A profile provider built from an OCI `config` file profile, in either
/// direct user-identity mode or session-token mode.
#[derive(Debug)]
pub struct ConfigFileProfileProvider {
    inner: Inner,
}

impl ConfigFileProfileProvider {
    #[instrument(skip(path, profile_name))]
    pub fn new_from_file(path: &str, profile_name: &str) -> Result<ConfigFileProfileProvider, NoSQLError> {
        let expanded = expand_home(path);
        tracing::debug!(file = %expanded, profile = %profile_name, "loading OCI config file profile");
        let ini = Ini::load_from_file(&expanded)
            .map_err(|e| cred_err!("error reading OCI config file '{}': {}", expanded, e).unwrap_err())?;
        let section = ini.section(Some(profile_name)).ok_or_else(|| {
            cred_err!("OCI config file '{}' has no profile '{}'", expanded, profile_name).unwrap_err()
        })?;

        let region = section
            .get(REGION)
            .filter(|s| !s.is_empty())
            .and_then(|r| Region::from_str_lenient(r));

        let passphrase = section
            .get(PASS_PHRASE)
            .map(|p| ValueSource::Inline(p.to_string()));

        if let Some(token_file) = section.get(SECURITY_TOKEN_FILE) {
            let key_file = required(section, &expanded, KEY_FILE)?;
            return Ok(ConfigFileProfileProvider {
                inner: Inner::SessionToken(SessionTokenProfileProvider::new(
                    token_file.to_string(),
                    ValueSource::FromFile(expand_home(key_file)),
                    passphrase,
                    region,
                )),
            });
        }

        let tenancy = required(section, &expanded, TENANCY)?.to_string();
        let user = required(section, &expanded, USER)?.to_string();
        let fingerprint = required(section, &expanded, FINGERPRINT)?.to_string();
        let key_file = required(section, &expanded, KEY_FILE)?;

        Ok(ConfigFileProfileProvider {
            inner: Inner::User(SimpleProfileProvider::new(
                tenancy,
                user,
                fingerprint,
                ValueSource::FromFile(expand_home(key_file)),
                passphrase,
                region,
            )?),
        })
    }

    pub fn new_default(profile_name: &str) -> Result<ConfigFileProfileProvider, NoSQLError> {
        Self::new_from_file("~/.oci/config", profile_name)
    }
}

#[async_trait]
impl ProfileProvider for ConfigFileProfileProvider {
    async fn get_profile(&self, force_refresh: bool) -> Result<Profile, NoSQLError> {
        match &self.inner {
            Inner::User(p) => p.get_profile(force_refresh).await,
            Inner::SessionToken(p) => p.get_profile(force_refresh).await,
        }
    }

    fn region(&self) -> Option<Region> {
        match &self.inner {
            Inner::User(p) => p.region(),
            Inner::SessionToken(p) => p.region(),
        }
    }
}

// Small helper kept on Region rather than in this module since other
// callers (facade config resolution) need the same lenient parse.
impl Region {
    pub fn from_str_lenient(s: &str) -> Option<Region> {
        crate::region::string_to_region(s).ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file() {
        let err = ConfigFileProfileProvider::new_from_file("/no/such/path/config", "DEFAULT").unwrap_err();
        assert_eq!(err.code, crate::error::NoSQLErrorCode::CredentialsError);
    }

    #[test]
    fn test_missing_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[DEFAULT]\ntenancy=x").unwrap();
        drop(f);

        let err = ConfigFileProfileProvider::new_from_file(path.to_str().unwrap(), "OTHER").unwrap_err();
        assert_eq!(err.code, crate::error::NoSQLErrorCode::CredentialsError);
    }

    #[test]
    fn test_missing_required_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[DEFAULT]\ntenancy=t\nuser=u\nregion=us-ashburn-1").unwrap();
        drop(f);

        let err = ConfigFileProfileProvider::new_from_file(path.to_str().unwrap(), "DEFAULT").unwrap_err();
        assert_eq!(err.code, crate::error::NoSQLErrorCode::CredentialsError);
    }

    #[test]
    fn test_session_token_mode_detected() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("key.pem");
        std::fs::write(&key_path, b"dummy").unwrap();
        let token_path = dir.path().join("token");
        std::fs::write(&token_path, b"tok").unwrap();
        let config_path = dir.path().join("config");
        let mut f = std::fs::File::create(&config_path).unwrap();
        writeln!(
            f,
            "[DEFAULT]\ntenancy=t\nkey_file={}\nsecurity_token_file={}\nregion=us-ashburn-1",
            key_path.to_str().unwrap(),
            token_path.to_str().unwrap()
        )
        .unwrap();
        drop(f);

        let provider =
            ConfigFileProfileProvider::new_from_file(config_path.to_str().unwrap(), "DEFAULT").unwrap();
        assert!(matches!(provider.inner, Inner::SessionToken(_)));
        assert_eq!(provider.region().unwrap().id(), "us-ashburn-1");
    }
}

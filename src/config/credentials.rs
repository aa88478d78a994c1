// mailer, a Rust library for composing and sending emails.
// Copyright (C) 2022  soywod <clement.douin@posteo.net>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Credentials config module.
//!
//! This module contains the representation of the SMTP credentials
//! and sender identity, how they are loaded from the JSON config file
//! and how they are merged with the explicit invocation parameters.

use log::{debug, trace, warn};
use serde::Deserialize;
use std::{
    env, fmt, fs, io,
    path::{Path, PathBuf},
    result,
};
use thiserror::Error;

pub const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot find home directory")]
    GetHomeDirError,
    #[error("cannot expand config path {1}")]
    ExpandConfigPathError(#[source] shellexpand::LookupError<env::VarError>, String),
    #[error("cannot find config file at {1}")]
    ReadConfigFileError(#[source] io::Error, PathBuf),
    #[error("cannot parse config file at {1}")]
    ParseConfigFileError(#[source] serde_json::Error, PathBuf),
    #[error("cannot find smtp {0}: set it from the command line or from the config file")]
    MissingSettingError(&'static str),
}

pub type Result<T> = result::Result<T, Error>;

/// Represents the SMTP credentials and the sender identity.
///
/// Empty strings and a zero port mean the value is not set.
#[derive(Default, Clone, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Represents the SMTP server host.
    pub host: String,
    /// Represents the SMTP server port.
    pub port: u16,
    /// Represents the SMTP server login.
    pub username: String,
    /// Represents the SMTP server password.
    pub password: String,
    /// Represents the sender address, `Name <addr>` or bare.
    pub from: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .finish()
    }
}

impl Credentials {
    /// Checks that the settings needed to open an SMTP session are
    /// set.
    pub fn check(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::MissingSettingError("host"));
        }
        if self.username.is_empty() {
            return Err(Error::MissingSettingError("username"));
        }
        if self.password.is_empty() {
            return Err(Error::MissingSettingError("password"));
        }
        Ok(())
    }
}

/// Gets the default config file path: `~/.config/mailer/config.json`.
pub fn default_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().ok_or(Error::GetHomeDirError)?;
    Ok(home_dir.join(".config").join("mailer").join("config.json"))
}

/// Loads the credentials from the default config file.
pub fn load_default() -> Result<Credentials> {
    load_from_path(default_path()?)
}

/// Loads the credentials from the config file at the given path.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Credentials> {
    let path = path.as_ref();
    trace!(">> load config file at {:?}", path);

    let content =
        fs::read_to_string(path).map_err(|err| Error::ReadConfigFileError(err, path.to_owned()))?;
    let credentials: Credentials = serde_json::from_str(&content)
        .map_err(|err| Error::ParseConfigFileError(err, path.to_owned()))?;
    debug!("loaded credentials: {:?}", credentials);

    trace!("<< load config file at {:?}", path);
    Ok(credentials)
}

/// Overlays the explicit credentials onto the loaded ones, field by
/// field. A set explicit value always wins. The port falls back to
/// [`DEFAULT_SMTP_PORT`] when none of the sources sets it.
pub fn merge(explicit: Credentials, loaded: Option<Credentials>) -> Credentials {
    let loaded = loaded.unwrap_or_default();

    let pick = |explicit: String, loaded: String| {
        if explicit.is_empty() {
            loaded
        } else {
            explicit
        }
    };

    let port = match (explicit.port, loaded.port) {
        (0, 0) => DEFAULT_SMTP_PORT,
        (0, port) => port,
        (port, _) => port,
    };

    Credentials {
        host: pick(explicit.host, loaded.host),
        port,
        username: pick(explicit.username, loaded.username),
        password: pick(explicit.password, loaded.password),
        from: pick(explicit.from, loaded.from),
    }
}

/// Resolves the effective credentials.
///
/// The config file at the explicit path is tried first, then the
/// default one. Loading must succeed when the explicit credentials
/// miss the host or the username. Otherwise a failing load is only
/// reported and the explicit credentials are used as they are.
pub fn resolve(explicit: Credentials, path: Option<&str>) -> Result<Credentials> {
    let required = explicit.host.is_empty() || explicit.username.is_empty();

    let loaded = match load(path) {
        Ok(credentials) => Some(credentials),
        Err(err) if required => return Err(err),
        Err(err) => {
            debug!("skipping config file: {}", err);
            None
        }
    };

    Ok(merge(explicit, loaded))
}

fn load(path: Option<&str>) -> Result<Credentials> {
    match path {
        None => load_default(),
        Some(path) => {
            let expanded = shellexpand::full(path)
                .map_err(|err| Error::ExpandConfigPathError(err, path.to_owned()))?;
            load_from_path(expanded.to_string()).or_else(|err| {
                warn!("{}, falling back to the default config file", err);
                load_default().map_err(|_| err)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn loaded() -> Credentials {
        Credentials {
            host: "smtp.example.com".into(),
            port: 465,
            username: "other".into(),
            password: "p".into(),
            from: "f".into(),
        }
    }

    #[test]
    fn test_merge_precedence() {
        let explicit = Credentials {
            username: "u".into(),
            ..Credentials::default()
        };

        let merged = merge(explicit, Some(loaded()));
        assert_eq!(
            Credentials {
                host: "smtp.example.com".into(),
                port: 465,
                username: "u".into(),
                password: "p".into(),
                from: "f".into(),
            },
            merged
        );

        // merging again with the same loaded credentials changes nothing
        assert_eq!(merged, merge(merged.clone(), Some(loaded())));
    }

    #[test]
    fn test_merge_default_port() {
        let merged = merge(Credentials::default(), None);
        assert_eq!(DEFAULT_SMTP_PORT, merged.port);

        let merged = merge(
            Credentials::default(),
            Some(Credentials {
                port: 0,
                ..loaded()
            }),
        );
        assert_eq!(587, merged.port);

        let merged = merge(
            Credentials {
                port: 2525,
                ..Credentials::default()
            },
            Some(loaded()),
        );
        assert_eq!(2525, merged.port);
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"host": "smtp.example.com", "port": 465, "username": "alice", "password": "secret", "from": "Alice <alice@example.com>"}}"#
        )
        .unwrap();

        let credentials = load_from_path(file.path()).unwrap();
        assert_eq!("smtp.example.com", credentials.host);
        assert_eq!(465, credentials.port);
        assert_eq!("Alice <alice@example.com>", credentials.from);
        assert!(!format!("{:?}", credentials).contains("secret"));
    }

    #[test]
    fn test_load_from_path_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"from": "alice@example.com"}}"#).unwrap();

        let credentials = load_from_path(file.path()).unwrap();
        assert_eq!(
            Credentials {
                from: "alice@example.com".into(),
                ..Credentials::default()
            },
            credentials
        );
    }

    #[test]
    fn test_load_from_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_from_path(dir.path().join("config.json")),
            Err(Error::ReadConfigFileError(_, _))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "host = smtp.example.com").unwrap();
        assert!(matches!(
            load_from_path(file.path()),
            Err(Error::ParseConfigFileError(_, _))
        ));
    }

    #[test]
    fn test_check() {
        assert!(matches!(
            Credentials::default().check(),
            Err(Error::MissingSettingError("host"))
        ));
        assert!(matches!(
            Credentials {
                password: String::new(),
                ..loaded()
            }
            .check(),
            Err(Error::MissingSettingError("password"))
        ));
        assert!(loaded().check().is_ok());
    }
}

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

//! SMTP config module.
//!
//! This module contains the representation of the SMTP email sender
//! configuration.

use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use std::fmt;

use crate::config::Credentials;

/// Port on which SMTP servers expect an implicit TLS connection.
pub const SMTPS_PORT: u16 = 465;

/// Represents the SMTP sender config.
#[derive(Default, Clone, Eq, PartialEq)]
pub struct SmtpConfig {
    /// Represents the SMTP server host.
    pub host: String,
    /// Represents the SMTP server port.
    pub port: u16,
    /// Represents the SMTP server login.
    pub login: String,
    /// Represents the SMTP server password.
    pub passwd: String,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

impl SmtpConfig {
    /// Builds the SMTP sender credentials.
    pub fn credentials(&self) -> SmtpCredentials {
        SmtpCredentials::new(self.login.to_owned(), self.passwd.to_owned())
    }

    /// Implicit TLS is used on the SMTPS port, STARTTLS everywhere
    /// else.
    pub fn implicit_tls(&self) -> bool {
        self.port == SMTPS_PORT
    }
}

impl From<&Credentials> for SmtpConfig {
    fn from(credentials: &Credentials) -> Self {
        Self {
            host: credentials.host.to_owned(),
            port: credentials.port,
            login: credentials.username.to_owned(),
            passwd: credentials.password.to_owned(),
        }
    }
}

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

//! SMTP module.
//!
//! This module contains the representation of the SMTP email sender.

use lettre::{
    self,
    address::Envelope,
    transport::smtp::{
        authentication::DEFAULT_MECHANISMS,
        client::{SmtpConnection, TlsParameters},
        extension::ClientId,
    },
};
use log::{debug, info, trace, warn};
use std::{result, time::Duration};
use thiserror::Error;

use crate::{sender, Email, Sender, SmtpConfig};

const SMTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot build smtp tls parameters")]
    BuildTlsParamsError(#[source] lettre::transport::smtp::Error),
    #[error("cannot connect to smtp server {1}:{2}")]
    DialError(#[source] lettre::transport::smtp::Error, String, u16),
    #[error("cannot authenticate to smtp server {0}:{1}: the connection is not encrypted")]
    UnencryptedAuthError(String, u16),
    #[error("cannot send email")]
    SendError(#[source] lettre::transport::smtp::Error),
}

pub type Result<T> = result::Result<T, Error>;

/// Represents the SMTP sender. Every call to [`Sender::send`] opens
/// one SMTP session, used for exactly one email.
pub struct Smtp<'a> {
    config: &'a SmtpConfig,
}

impl<'a> Smtp<'a> {
    pub fn new(config: &'a SmtpConfig) -> Self {
        Self { config }
    }

    /// Opens the SMTP session: connects, upgrades to TLS and
    /// authenticates.
    fn dial(&self) -> Result<SmtpConnection> {
        let host = &self.config.host;
        let port = self.config.port;
        let dial_err = |err| Error::DialError(err, host.to_owned(), port);
        debug!("dialing smtp server {}:{}", host, port);

        let tls = TlsParameters::builder(host.to_owned())
            .build()
            .map_err(Error::BuildTlsParamsError)?;
        let hello_name = ClientId::default();
        let implicit_tls = self.config.implicit_tls();

        let mut conn = SmtpConnection::connect(
            (host.as_str(), port),
            Some(SMTP_TIMEOUT),
            &hello_name,
            if implicit_tls { Some(&tls) } else { None },
            None,
        )
        .map_err(dial_err)?;

        if !implicit_tls {
            if conn.can_starttls() {
                conn.starttls(&tls, &hello_name).map_err(dial_err)?;
            } else if !is_local_host(host) {
                conn.abort();
                return Err(Error::UnencryptedAuthError(host.to_owned(), port));
            } else {
                debug!("authenticating without tls on local host {}", host);
            }
        }

        if let Err(err) = conn.auth(DEFAULT_MECHANISMS, &self.config.credentials()) {
            conn.abort();
            return Err(dial_err(err));
        }

        Ok(conn)
    }
}

/// Plain authentication over an unencrypted connection is only
/// allowed towards the local host.
fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

fn transmit(conn: &mut SmtpConnection, envelope: &Envelope, raw: &[u8]) -> Result<()> {
    conn.send(envelope, raw).map_err(Error::SendError)?;

    if let Err(err) = conn.quit() {
        warn!("cannot close smtp session properly: {}", err);
    }

    Ok(())
}

impl<'a> Sender for Smtp<'a> {
    fn send(&mut self, email: &Email) -> sender::Result<Vec<u8>> {
        trace!(">> send email over smtp");

        let sendable = email.to_sendable()?;
        let mut conn = self.dial()?;
        transmit(&mut conn, &sendable.envelope, &sendable.raw)?;

        info!(
            "email sent to {} recipient(s) through {}:{}",
            sendable.envelope.to().len(),
            self.config.host,
            self.config.port
        );

        trace!("<< send email over smtp");
        Ok(sendable.raw)
    }
}

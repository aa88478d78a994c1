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

//! Mailer module.
//!
//! This module chains the whole pipeline: the resolved credentials
//! are checked, the email is composed from a draft or imported from
//! a raw file, then it is sent over SMTP.

use log::{info, trace};
use std::result;
use thiserror::Error;

use crate::{
    config::{self, Credentials},
    email::{self, addr},
    sender, Email, MessageBuilder, OutgoingMessage, RawImportedMessage, Sender, Smtp,
    SmtpConfig,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot find recipient: the to address is required")]
    MissingRecipientError,
    #[error("cannot find subject or body: both are required")]
    MissingSubjectOrBodyError,
    #[error("cannot parse from address")]
    InvalidFromAddrError(#[source] email::Error),
    #[error("cannot parse to address")]
    InvalidToAddrError(#[source] email::Error),
    #[error("cannot parse cc address {1}")]
    InvalidCcAddrError(#[source] email::Error, String),
    #[error("cannot parse bcc address {1}")]
    InvalidBccAddrError(#[source] email::Error, String),

    #[error(transparent)]
    ConfigError(#[from] config::Error),
    #[error(transparent)]
    EmailError(#[from] email::Error),
    #[error(transparent)]
    SenderError(#[from] sender::Error),
}

pub type Result<T> = result::Result<T, Error>;

/// Represents the fields of an email to compose. The sender comes
/// from the credentials.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Draft {
    pub to: String,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<String>,
}

/// Validates the draft against the credentials, then builds the
/// email.
pub fn compose(credentials: &Credentials, draft: &Draft) -> Result<OutgoingMessage> {
    trace!(">> compose email");

    if draft.to.trim().is_empty() {
        return Err(Error::MissingRecipientError);
    }
    if draft.subject.is_empty() || draft.body.is_empty() {
        return Err(Error::MissingSubjectOrBodyError);
    }

    addr::parse(&credentials.from).map_err(Error::InvalidFromAddrError)?;
    addr::parse(&draft.to).map_err(Error::InvalidToAddrError)?;
    for cc in &draft.cc {
        addr::parse(cc).map_err(|err| Error::InvalidCcAddrError(err, cc.to_owned()))?;
    }
    for bcc in &draft.bcc {
        addr::parse(bcc).map_err(|err| Error::InvalidBccAddrError(err, bcc.to_owned()))?;
    }

    let email = MessageBuilder::default()
        .from(&credentials.from)
        .to(&draft.to)
        .cc(&draft.cc)
        .bcc(&draft.bcc)
        .subject(&draft.subject)
        .body(&draft.body)
        .attachments(&draft.attachments)
        .build()?;

    trace!("<< compose email");
    Ok(email)
}

/// Sends the given email over one SMTP session.
pub fn dispatch(credentials: &Credentials, email: &Email) -> Result<Vec<u8>> {
    credentials.check()?;
    let config = SmtpConfig::from(credentials);
    let raw = Smtp::new(&config).send(email)?;
    Ok(raw)
}

/// Composes the draft then sends it.
pub fn send_draft(credentials: &Credentials, draft: &Draft) -> Result<Vec<u8>> {
    info!("begin: sending email to {}", draft.to);
    credentials.check()?;

    let email = Email::from(compose(credentials, draft)?);
    let raw = dispatch(credentials, &email)?;

    info!("end: sending email to {}", draft.to);
    Ok(raw)
}

/// Imports the raw email at the given path then sends it as is.
pub fn send_eml<P: AsRef<str>>(credentials: &Credentials, path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    info!("begin: sending raw email {}", path);
    credentials.check()?;

    let email = Email::from(RawImportedMessage::from_path(path)?);
    let raw = dispatch(credentials, &email)?;

    info!("end: sending raw email {}", path);
    Ok(raw)
}

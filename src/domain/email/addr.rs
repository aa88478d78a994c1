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

//! Module related to email addresses.
//!
//! This module regroups the address normalizer: a strict RFC 5322
//! mailbox parser with a narrow fallback for bare addresses, the
//! canonical formatter used for headers, and the converters to
//! [`lettre`] sendable addresses.

use log::{debug, trace};
use std::{fmt, result};
use thiserror::Error;

use crate::email::{Error, Result};

/// Represents the reasons why an input is not a single RFC 5322
/// mailbox.
#[derive(Debug, Error)]
pub enum AddrSyntaxError {
    #[error(transparent)]
    MailParseError(#[from] mailparse::MailParseError),
    #[error("expected a single address, found {0}")]
    NotSingleAddrError(usize),
    #[error("expected a mailbox, found group {0:?}")]
    GroupAddrError(String),
    #[error("missing local part or domain in {0:?}")]
    InvalidAddrSpecError(String),
}

/// Represents a validated mailbox.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Address {
    raw: String,
    display_name: Option<String>,
    email: String,
}

impl Address {
    /// Gets the address as it was given, whitespaces trimmed.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Gets the `local-part@domain` part of the address.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Builds the canonical form of the address: `Name <addr>` when
    /// there is a display name, the bare address otherwise.
    pub fn canonical(&self) -> String {
        canonical(self.display_name.as_deref(), &self.email)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// Parses the given input as a single mailbox.
///
/// Strict RFC 5322 parsing is tried first. When it fails, the input
/// is still accepted verbatim if it contains a `@` and no `<`.
pub fn parse(input: &str) -> Result<Address> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::ParseEmptyAddrError);
    }

    match parse_strict(input) {
        Ok((display_name, email)) => Ok(Address {
            raw: input.to_owned(),
            display_name,
            email,
        }),
        Err(err) if input.contains('@') && !input.contains('<') => {
            debug!("accepting address {:?} as is: {}", input, err);
            Ok(Address {
                raw: input.to_owned(),
                display_name: None,
                email: input.to_owned(),
            })
        }
        Err(err) => Err(Error::ParseAddrError(err, input.to_owned())),
    }
}

/// Formats the given input into its canonical form. Inputs that are
/// not strict RFC 5322 mailboxes are returned unchanged.
pub fn format(input: &str) -> String {
    match parse_strict(input.trim()) {
        Ok((display_name, email)) => canonical(display_name.as_deref(), &email),
        Err(err) => {
            trace!("cannot format address {:?}, keeping it as is: {}", input, err);
            input.to_owned()
        }
    }
}

fn parse_strict(input: &str) -> result::Result<(Option<String>, String), AddrSyntaxError> {
    let addrs = mailparse::addrparse(input)?;
    if addrs.len() != 1 {
        return Err(AddrSyntaxError::NotSingleAddrError(addrs.len()));
    }

    match &addrs[0] {
        mailparse::MailAddr::Group(group) => Err(AddrSyntaxError::GroupAddrError(
            group.group_name.to_owned(),
        )),
        mailparse::MailAddr::Single(info) => {
            if !is_addr_spec(&info.addr) {
                return Err(AddrSyntaxError::InvalidAddrSpecError(info.addr.to_owned()));
            }
            let display_name = info
                .display_name
                .as_ref()
                .map(|name| name.trim())
                .filter(|name| !name.is_empty())
                .map(ToOwned::to_owned);
            Ok((display_name, info.addr.to_owned()))
        }
    }
}

fn is_addr_spec(addr: &str) -> bool {
    let invalid_char = |c: char| c.is_whitespace() || c.is_control() || c == '<' || c == '>';

    match addr.rsplit_once('@') {
        Some((local_part, domain)) => {
            !local_part.is_empty()
                && !domain.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !local_part.contains(invalid_char)
                && !domain.contains(invalid_char)
        }
        None => false,
    }
}

fn canonical(display_name: Option<&str>, email: &str) -> String {
    match display_name {
        None => email.to_owned(),
        Some(name) => {
            let has_special_chars = "()<>[]:;@.,\"\\".contains(|c: char| name.contains(c));
            if has_special_chars {
                let name = name.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{}\" <{}>", name, email)
            } else {
                format!("{} <{}>", name, email)
            }
        }
    }
}

/// Converts an address list header value into a list of
/// [`lettre::message::Mailbox`].
pub fn to_sendable_mboxes(addrs: &str) -> Result<Vec<lettre::message::Mailbox>> {
    let list = mailparse::addrparse(addrs)
        .map_err(|err| Error::ParseAddrListError(err, addrs.to_owned()))?;

    let mut mboxes = vec![];
    for addr in list.iter() {
        match addr {
            mailparse::MailAddr::Single(mailparse::SingleInfo { display_name, addr }) => {
                mboxes.push(lettre::message::Mailbox::new(
                    display_name.clone(),
                    to_sendable_addr(addr)?,
                ))
            }
            mailparse::MailAddr::Group(mailparse::GroupInfo { group_name, addrs }) => {
                for addr in addrs {
                    mboxes.push(lettre::message::Mailbox::new(
                        addr.display_name.clone().or_else(|| Some(group_name.clone())),
                        to_sendable_addr(&addr.addr)?,
                    ))
                }
            }
        }
    }

    Ok(mboxes)
}

/// Converts an address list header value into a list of
/// [`lettre::Address`], dropping display names and group names.
pub fn to_sendable_addrs(addrs: &str) -> Result<Vec<lettre::Address>> {
    Ok(to_sendable_mboxes(addrs)?
        .into_iter()
        .map(|mbox| mbox.email)
        .collect())
}

fn to_sendable_addr(addr: &str) -> Result<lettre::Address> {
    addr.parse()
        .map_err(|err| Error::ParseSendableAddrError(err, addr.to_owned()))
}

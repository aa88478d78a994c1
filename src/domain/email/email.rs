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

use lettre::{
    address::Envelope,
    message::{header, Attachment as AttachmentPart, MultiPart, SinglePart},
};
use log::{debug, info, trace};
use std::{env, fmt, io, path::PathBuf, result};
use thiserror::Error;

use crate::email::{addr, AddrSyntaxError, Attachment, Headers, RawImportedMessage};

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot parse empty email address")]
    ParseEmptyAddrError,
    #[error("cannot parse email address {1:?}")]
    ParseAddrError(#[source] AddrSyntaxError, String),
    #[error("cannot parse address list {1:?}")]
    ParseAddrListError(#[source] mailparse::MailParseError, String),
    #[error("cannot parse address {1:?} before sending")]
    ParseSendableAddrError(#[source] lettre::address::AddressError, String),

    #[error("cannot expand attachment path {1}")]
    ExpandAttachmentPathError(#[source] shellexpand::LookupError<env::VarError>, String),
    #[error("cannot find attachment at {0}")]
    FindAttachmentError(PathBuf),
    #[error("cannot read attachment at {1}")]
    ReadAttachmentError(#[source] io::Error, PathBuf),
    #[error("cannot get file name of attachment {0}")]
    GetAttachmentFilenameError(PathBuf),
    #[error("cannot parse content type of attachment {1}")]
    ParseAttachmentContentTypeError(#[source] header::ContentTypeErr, String),

    #[error("cannot build sendable email")]
    BuildSendableEmailError(#[source] lettre::error::Error),
    #[error("cannot build envelope")]
    BuildEnvelopeError(#[source] lettre::error::Error),
    #[error("cannot find sender in headers From or Sender")]
    FindEnvelopeSenderError,

    #[error("cannot expand raw email path {1}")]
    ExpandRawEmailPathError(#[source] shellexpand::LookupError<env::VarError>, String),
    #[error("cannot open raw email at {1}")]
    OpenRawEmailError(#[source] io::Error, PathBuf),
    #[error("cannot read raw email at {1}")]
    ReadRawEmailError(#[source] io::Error, PathBuf),
    #[error("cannot parse raw email")]
    ParseRawEmailError(#[source] mailparse::MailParseError),
    #[error("cannot parse raw email: header block is empty")]
    ParseRawEmailEmptyError,
    #[error("cannot parse raw email: invalid header name {0:?}")]
    ParseRawEmailHeaderNameError(String),
}

pub type Result<T> = result::Result<T, Error>;

/// Represents the content type of an email body.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ContentType {
    TextPlain,
    TextHtml,
}

impl ContentType {
    /// Guesses the content type from the body markup: a body
    /// containing `<html` or `<HTML` is HTML, anything else is plain
    /// text.
    pub fn sniff(body: &str) -> Self {
        if body.contains("<html") || body.contains("<HTML") {
            Self::TextHtml
        } else {
            Self::TextPlain
        }
    }

    /// Gets the content type declared by a `Content-Type` header
    /// value.
    pub fn from_header(value: &str) -> Self {
        if value.contains("text/html") {
            Self::TextHtml
        } else {
            Self::TextPlain
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextPlain => "text/plain",
            Self::TextHtml => "text/html",
        }
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self::TextPlain
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents an email composed field by field.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct OutgoingMessage {
    pub headers: Headers,
    pub content_type: ContentType,
    pub body: String,
    /// Paths of the files to attach, checked at build time and read
    /// at send time.
    pub attachments: Vec<PathBuf>,
}

impl OutgoingMessage {
    /// Builds the [`lettre::Message`] matching the composed email:
    /// a single part when there is no attachment, a
    /// `multipart/mixed` otherwise.
    pub fn to_sendable(&self) -> Result<lettre::Message> {
        trace!(">> build sendable email");

        let mut builder = lettre::Message::builder().message_id(None);

        for (key, values) in self.headers.iter() {
            for val in values {
                match key.to_lowercase().as_str() {
                    "from" => {
                        for mbox in addr::to_sendable_mboxes(val)? {
                            builder = builder.from(mbox)
                        }
                    }
                    "to" => {
                        for mbox in addr::to_sendable_mboxes(val)? {
                            builder = builder.to(mbox)
                        }
                    }
                    "cc" => {
                        for mbox in addr::to_sendable_mboxes(val)? {
                            builder = builder.cc(mbox)
                        }
                    }
                    "bcc" => {
                        for mbox in addr::to_sendable_mboxes(val)? {
                            builder = builder.bcc(mbox)
                        }
                    }
                    "reply-to" => {
                        for mbox in addr::to_sendable_mboxes(val)? {
                            builder = builder.reply_to(mbox)
                        }
                    }
                    "subject" => builder = builder.subject(val.to_owned()),
                    key => debug!("skipping unsupported header {:?}", key),
                }
            }
        }

        let body = match self.content_type {
            ContentType::TextPlain => SinglePart::plain(self.body.clone()),
            ContentType::TextHtml => SinglePart::html(self.body.clone()),
        };

        let email = if self.attachments.is_empty() {
            builder.singlepart(body)
        } else {
            let mut multipart = MultiPart::mixed().singlepart(body);
            for path in &self.attachments {
                let attachment = Attachment::from_path(path)?;
                let content_type = header::ContentType::parse(&attachment.mime).map_err(|err| {
                    Error::ParseAttachmentContentTypeError(err, attachment.filename.clone())
                })?;
                multipart = multipart.singlepart(
                    AttachmentPart::new(attachment.filename).body(attachment.body, content_type),
                );
            }
            builder.multipart(multipart)
        }
        .map_err(Error::BuildSendableEmailError)?;

        trace!("<< build sendable email");
        Ok(email)
    }
}

/// Builds an [`OutgoingMessage`] from discrete fields.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct MessageBuilder {
    from: String,
    to: String,
    cc: Vec<String>,
    bcc: Vec<String>,
    subject: String,
    body: String,
    attachments: Vec<String>,
}

impl MessageBuilder {
    pub fn from<S: ToString>(mut self, addr: S) -> Self {
        self.from = addr.to_string();
        self
    }

    pub fn to<S: ToString>(mut self, addr: S) -> Self {
        self.to = addr.to_string();
        self
    }

    pub fn cc<S: ToString, I: IntoIterator<Item = S>>(mut self, addrs: I) -> Self {
        self.cc = addrs.into_iter().map(|addr| addr.to_string()).collect();
        self
    }

    pub fn bcc<S: ToString, I: IntoIterator<Item = S>>(mut self, addrs: I) -> Self {
        self.bcc = addrs.into_iter().map(|addr| addr.to_string()).collect();
        self
    }

    pub fn subject<S: ToString>(mut self, subject: S) -> Self {
        self.subject = subject.to_string();
        self
    }

    pub fn body<S: ToString>(mut self, body: S) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn attachments<S: ToString, I: IntoIterator<Item = S>>(mut self, paths: I) -> Self {
        self.attachments = paths.into_iter().map(|path| path.to_string()).collect();
        self
    }

    /// Builds the email. Fails on the first invalid address or on the
    /// first attachment that does not exist.
    pub fn build(self) -> Result<OutgoingMessage> {
        info!("begin: building email from fields");

        let mut email = OutgoingMessage::default();

        addr::parse(&self.from)?;
        email.headers.set("From", [addr::format(&self.from)]);

        addr::parse(&self.to)?;
        email.headers.set("To", [addr::format(&self.to)]);

        if !self.cc.is_empty() {
            let mut cc = Vec::with_capacity(self.cc.len());
            for addr in &self.cc {
                addr::parse(addr)?;
                cc.push(addr::format(addr));
            }
            email.headers.set("Cc", cc);
        }

        if !self.bcc.is_empty() {
            let mut bcc = Vec::with_capacity(self.bcc.len());
            for addr in &self.bcc {
                addr::parse(addr)?;
                bcc.push(addr::format(addr));
            }
            email.headers.set("Bcc", bcc);
        }

        email.headers.set("Subject", [&self.subject]);

        email.content_type = ContentType::sniff(&self.body);
        debug!("content type: {}", email.content_type);
        email.body = self.body;

        for path in &self.attachments {
            let expanded = shellexpand::full(path)
                .map_err(|err| Error::ExpandAttachmentPathError(err, path.to_owned()))?;
            let expanded = PathBuf::from(expanded.to_string());
            if !expanded.is_file() {
                return Err(Error::FindAttachmentError(expanded));
            }
            email.attachments.push(expanded);
        }

        info!("end: building email from fields");
        Ok(email)
    }
}

/// Represents an email the sender can transmit.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Email {
    Outgoing(OutgoingMessage),
    RawImported(RawImportedMessage),
}

impl Email {
    pub fn headers(&self) -> &Headers {
        match self {
            Self::Outgoing(email) => &email.headers,
            Self::RawImported(email) => &email.headers,
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Outgoing(email) => email.content_type,
            Self::RawImported(email) => email.content_type,
        }
    }

    /// Builds the SMTP envelope and the formatted bytes of the email.
    pub fn to_sendable(&self) -> Result<SendableEmail> {
        match self {
            Self::Outgoing(email) => {
                let email = email.to_sendable()?;
                Ok(SendableEmail {
                    envelope: email.envelope().clone(),
                    raw: email.formatted(),
                })
            }
            Self::RawImported(email) => Ok(SendableEmail {
                envelope: email.envelope()?,
                raw: email.formatted(),
            }),
        }
    }
}

impl From<OutgoingMessage> for Email {
    fn from(email: OutgoingMessage) -> Self {
        Self::Outgoing(email)
    }
}

impl From<RawImportedMessage> for Email {
    fn from(email: RawImportedMessage) -> Self {
        Self::RawImported(email)
    }
}

/// Represents the SMTP envelope and the wire bytes of an email.
#[derive(Debug, Clone)]
pub struct SendableEmail {
    pub envelope: Envelope,
    pub raw: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use std::{io::Write, path::PathBuf};

    use crate::email::{ContentType, Error, MessageBuilder};

    fn builder() -> MessageBuilder {
        MessageBuilder::default()
            .from("Alice <alice@localhost>")
            .to("bob@localhost")
            .subject("Hello")
    }

    #[test]
    fn test_sniff_content_type() {
        let email = builder().body("<html>hi</html>").build().unwrap();
        assert_eq!(ContentType::TextHtml, email.content_type);

        let email = builder().body("<HTML><body>hi</body></HTML>").build().unwrap();
        assert_eq!(ContentType::TextHtml, email.content_type);

        let email = builder().body("<Html>hi</Html>").build().unwrap();
        assert_eq!(ContentType::TextPlain, email.content_type);

        let email = builder().body("hi").build().unwrap();
        assert_eq!(ContentType::TextPlain, email.content_type);
    }

    #[test]
    fn test_build_headers() {
        let email = builder()
            .from("  Alice   <alice@localhost>")
            .cc(["carol@localhost", "Dave <dave@localhost>"])
            .body("hi")
            .build()
            .unwrap();

        let names: Vec<_> = email.headers.iter().map(|(name, _)| name).collect();
        assert_eq!(vec!["From", "To", "Cc", "Subject"], names);
        assert_eq!(Some("Alice <alice@localhost>"), email.headers.get_first("From"));
        assert_eq!(Some("bob@localhost"), email.headers.get_first("To"));
        assert_eq!(
            ["carol@localhost", "Dave <dave@localhost>"],
            email.headers.get_all("Cc")
        );
        assert!(!email.headers.contains("Bcc"));
        assert_eq!(Some("Hello"), email.headers.get_first("Subject"));
    }

    #[test]
    fn test_build_invalid_addr() {
        let res = builder().cc(["carol@localhost", "not-an-address"]).build();
        assert!(matches!(res, Err(Error::ParseAddrError(_, _))));

        let res = builder().to("").build();
        assert!(matches!(res, Err(Error::ParseEmptyAddrError)));
    }

    #[test]
    fn test_build_attachments() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report.txt");
        let data = dir.path().join("data.csv");
        write!(std::fs::File::create(&report).unwrap(), "report").unwrap();
        write!(std::fs::File::create(&data).unwrap(), "a,b").unwrap();

        let email = builder()
            .body("See attached")
            .attachments([data.to_string_lossy(), report.to_string_lossy(), data.to_string_lossy()])
            .build()
            .unwrap();
        assert_eq!(vec![data.clone(), report.clone(), data.clone()], email.attachments);

        let missing = dir.path().join("missing.pdf");
        let res = builder()
            .body("See attached")
            .attachments([report.to_string_lossy(), missing.to_string_lossy()])
            .build();
        assert!(matches!(res, Err(Error::FindAttachmentError(path)) if path == PathBuf::from(&missing)));
    }

    #[test]
    fn test_to_sendable() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report.txt");
        write!(std::fs::File::create(&report).unwrap(), "quarterly report").unwrap();

        let email = builder()
            .bcc(["archive@localhost"])
            .body("<html>See attached</html>")
            .attachments([report.to_string_lossy()])
            .build()
            .unwrap()
            .to_sendable()
            .unwrap();

        let mut recipients: Vec<_> = email
            .envelope()
            .to()
            .iter()
            .map(ToString::to_string)
            .collect();
        recipients.sort();
        assert_eq!(vec!["archive@localhost", "bob@localhost"], recipients);

        let formatted = String::from_utf8(email.formatted()).unwrap();
        assert!(formatted.contains("Subject: Hello"));
        assert!(formatted.contains("multipart/mixed"));
        assert!(formatted.contains("text/html"));
        assert!(formatted.contains("report.txt"));
    }
}

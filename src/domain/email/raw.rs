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

//! Raw email module.
//!
//! This module contains the importer of on-disk emails (EML files):
//! headers are copied verbatim and the body is kept as is, so the
//! email can be transmitted again.

use lettre::{
    address::Envelope,
    message::header::{self, Date, MIME_VERSION_1_0},
};
use log::{debug, info, trace};
use std::{fs::File, io::Read, path::PathBuf};

use crate::email::{addr, ContentType, Error, Headers, Result};

/// Represents an email imported from a raw message.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct RawImportedMessage {
    /// Unfolded header values, decoded lossily for inspection.
    pub headers: Headers,
    /// Header names and their bytes as found in the source, folding
    /// included. This is what goes on the wire.
    raw_headers: Vec<(String, Vec<u8>)>,
    /// Content type declared by the `Content-Type` header.
    pub content_type: ContentType,
    pub body: Vec<u8>,
}

impl RawImportedMessage {
    /// Imports the email stored at the given path.
    pub fn from_path<P: AsRef<str>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("begin: importing raw email at {}", path);

        let expanded = shellexpand::full(path)
            .map_err(|err| Error::ExpandRawEmailPathError(err, path.to_owned()))?;
        let expanded = PathBuf::from(expanded.to_string());

        let mut file =
            File::open(&expanded).map_err(|err| Error::OpenRawEmailError(err, expanded.clone()))?;
        let mut raw = Vec::new();
        file.read_to_end(&mut raw)
            .map_err(|err| Error::ReadRawEmailError(err, expanded.clone()))?;

        let email = Self::from_bytes(&raw)?;

        info!("end: importing raw email at {}", path);
        Ok(email)
    }

    /// Parses the header block of the given raw email, then keeps
    /// everything after the blank line as the body.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        trace!(">> parse raw email");

        let (parsed_headers, body_offset) =
            mailparse::parse_headers(raw).map_err(Error::ParseRawEmailError)?;
        if parsed_headers.is_empty() {
            return Err(Error::ParseRawEmailEmptyError);
        }

        let mut headers = Headers::default();
        let mut raw_headers = Vec::with_capacity(parsed_headers.len());
        for header in parsed_headers.iter() {
            let key = header.get_key();
            if !is_field_name(&key) {
                return Err(Error::ParseRawEmailHeaderNameError(
                    key.trim_end().to_owned(),
                ));
            }

            let raw_val = header.get_value_raw();
            let val = unfold(&String::from_utf8_lossy(raw_val));
            trace!("header {:?}: {:?}", key, val);
            headers.append(&key, val);
            raw_headers.push((key, raw_val.to_vec()));
        }

        let content_type = headers
            .get_first("Content-Type")
            .map(ContentType::from_header)
            .unwrap_or_default();
        debug!("content type: {}", content_type);

        let body = raw.get(body_offset..).unwrap_or_default().to_vec();

        trace!("<< parse raw email");
        Ok(Self {
            headers,
            raw_headers,
            content_type,
            body,
        })
    }

    /// Builds the SMTP envelope. The sender comes from the `Sender`
    /// header or else the `From` header, recipients come from the
    /// `To`, `Cc` and `Bcc` headers.
    pub fn envelope(&self) -> Result<Envelope> {
        let from = match self
            .headers
            .get_first("Sender")
            .or_else(|| self.headers.get_first("From"))
        {
            Some(val) => addr::to_sendable_addrs(val)?.into_iter().next(),
            None => None,
        }
        .ok_or(Error::FindEnvelopeSenderError)?;

        let mut to = vec![];
        for key in ["To", "Cc", "Bcc"] {
            for val in self.headers.get_all(key) {
                to.extend(addr::to_sendable_addrs(val)?);
            }
        }

        Envelope::new(Some(from), to).map_err(Error::BuildEnvelopeError)
    }

    /// Formats the email for the wire: every source header but `Bcc`
    /// with its original bytes, then `MIME-Version` and `Date` when
    /// the source lacks them, a blank line and the body. Line endings
    /// are normalized to CRLF.
    pub fn formatted(&self) -> Vec<u8> {
        let mut formatted = Vec::with_capacity(self.body.len() + 1024);

        for (key, val) in self.raw_headers.iter() {
            if key.eq_ignore_ascii_case("Bcc") {
                continue;
            }
            formatted.extend_from_slice(key.as_bytes());
            formatted.extend_from_slice(b": ");
            formatted.extend(to_crlf(val));
            formatted.extend_from_slice(b"\r\n");
        }

        let mut missing = header::Headers::new();
        if !self.headers.contains("MIME-Version") {
            missing.set(MIME_VERSION_1_0);
        }
        if !self.headers.contains("Date") {
            missing.set(Date::now());
        }
        formatted.extend_from_slice(missing.to_string().as_bytes());

        formatted.extend_from_slice(b"\r\n");
        formatted.extend(to_crlf(&self.body));
        formatted
    }
}

/// Checks the RFC 5322 field name grammar: printable ASCII except
/// the colon.
fn is_field_name(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| (33..=126).contains(&b) && b != b':')
}

/// Joins folded header lines with a single space.
fn unfold(val: &str) -> String {
    val.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn to_crlf(bytes: &[u8]) -> Vec<u8> {
    let mut normalized = Vec::with_capacity(bytes.len());
    let mut prev = None;

    for &byte in bytes {
        if byte == b'\n' && prev != Some(b'\r') {
            normalized.push(b'\r');
        }
        normalized.push(byte);
        prev = Some(byte);
    }

    normalized
}

#[cfg(test)]
mod tests {
    use concat_with::concat_line;
    use std::io::Write;

    use crate::email::{ContentType, Error, RawImportedMessage};

    #[test]
    fn test_from_bytes() {
        let email = RawImportedMessage::from_bytes(
            concat_line!(
                "Received: from a.localhost",
                "From: Alice <alice@localhost>",
                "To: bob@localhost",
                "Received: from b.localhost",
                "Subject: Hello,",
                "  world",
                "Content-Type: text/html; charset=utf-8",
                "",
                "<p>Hello!</p>"
            )
            .as_bytes(),
        )
        .unwrap();

        assert_eq!(ContentType::TextHtml, email.content_type);

        let headers: Vec<_> = email
            .headers
            .iter()
            .map(|(key, values)| (key, values.to_vec()))
            .collect();
        assert_eq!(
            vec![
                ("Received", vec!["from a.localhost".to_owned(), "from b.localhost".to_owned()]),
                ("From", vec!["Alice <alice@localhost>".to_owned()]),
                ("To", vec!["bob@localhost".to_owned()]),
                ("Subject", vec!["Hello, world".to_owned()]),
                ("Content-Type", vec!["text/html; charset=utf-8".to_owned()]),
            ],
            headers
        );
        assert_eq!(b"<p>Hello!</p>".to_vec(), email.body);
    }

    #[test]
    fn test_content_type_from_header_only() {
        let email = RawImportedMessage::from_bytes(
            concat_line!(
                "From: alice@localhost",
                "To: bob@localhost",
                "",
                "<html>not sniffed</html>"
            )
            .as_bytes(),
        )
        .unwrap();
        assert_eq!(ContentType::TextPlain, email.content_type);
    }

    #[test]
    fn test_from_bytes_empty() {
        assert!(matches!(
            RawImportedMessage::from_bytes(b""),
            Err(Error::ParseRawEmailEmptyError) | Err(Error::ParseRawEmailError(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            concat_line!("From: alice@localhost", "To: bob@localhost", "", "Hello!")
        )
        .unwrap();

        let email = RawImportedMessage::from_path(file.path().to_string_lossy()).unwrap();
        assert_eq!(Some("alice@localhost"), email.headers.get_first("from"));
        assert_eq!(b"Hello!".to_vec(), email.body);

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            RawImportedMessage::from_path(missing.to_string_lossy()),
            Err(Error::OpenRawEmailError(_, _))
        ));
    }

    #[test]
    fn test_envelope_and_formatted() {
        let email = RawImportedMessage::from_bytes(
            concat_line!(
                "From: Alice <alice@localhost>",
                "To: Bob <bob@localhost>, carol@localhost",
                "Bcc: archive@localhost",
                "Subject: Hello,",
                " world",
                "Date: Tue, 15 Nov 1994 08:12:31 +0000",
                "MIME-Version: 1.0",
                "",
                "Hello!"
            )
            .as_bytes(),
        )
        .unwrap();

        let envelope = email.envelope().unwrap();
        assert_eq!(
            Some("alice@localhost".to_owned()),
            envelope.from().map(ToString::to_string)
        );
        let to: Vec<_> = envelope.to().iter().map(ToString::to_string).collect();
        assert_eq!(
            vec!["bob@localhost", "carol@localhost", "archive@localhost"],
            to
        );

        assert_eq!(
            concat!(
                "From: Alice <alice@localhost>\r\n",
                "To: Bob <bob@localhost>, carol@localhost\r\n",
                "Subject: Hello,\r\n world\r\n",
                "Date: Tue, 15 Nov 1994 08:12:31 +0000\r\n",
                "MIME-Version: 1.0\r\n",
                "\r\n",
                "Hello!"
            )
            .as_bytes()
            .to_vec(),
            email.formatted()
        );
    }

    #[test]
    fn test_envelope_without_sender() {
        let email = RawImportedMessage::from_bytes(
            concat_line!("To: bob@localhost", "", "Hello!").as_bytes(),
        )
        .unwrap();
        assert!(matches!(
            email.envelope(),
            Err(Error::FindEnvelopeSenderError)
        ));
    }

    #[test]
    fn test_formatted_keeps_header_bytes() {
        let email = RawImportedMessage::from_bytes(
            b"From: alice@localhost\r\nTo: bob@localhost\r\nSubject: caf\xe9\r\n\r\nHello!",
        )
        .unwrap();
        assert_eq!(Some("caf\u{fffd}"), email.headers.get_first("Subject"));

        let formatted = email.formatted();
        assert!(formatted
            .windows(15)
            .any(|w| w == b"Subject: caf\xe9\r\n"));
        assert!(!formatted.windows(3).any(|w| w == "\u{fffd}".as_bytes()));
    }

    #[test]
    fn test_formatted_adds_missing_headers() {
        let email = RawImportedMessage::from_bytes(
            concat_line!("From: alice@localhost", "To: bob@localhost", "", "Hello!").as_bytes(),
        )
        .unwrap();

        let formatted = String::from_utf8(email.formatted()).unwrap();
        assert!(formatted.starts_with("From: alice@localhost\r\nTo: bob@localhost\r\n"));
        assert!(formatted.contains("\r\nMIME-Version: 1.0\r\n"));
        assert!(formatted.contains("\r\nDate: "));
        assert!(formatted.ends_with("\r\n\r\nHello!"));
    }

    #[test]
    fn test_from_bytes_without_header_block() {
        assert!(matches!(
            RawImportedMessage::from_bytes(b"Hello world, no headers here\r\n"),
            Err(Error::ParseRawEmailHeaderNameError(key)) if key == "Hello world, no headers here"
        ));
        assert!(matches!(
            RawImportedMessage::from_bytes(
                concat_line!("From: alice@localhost", "just a line", "", "Hello!").as_bytes()
            ),
            Err(Error::ParseRawEmailHeaderNameError(_))
        ));
    }
}

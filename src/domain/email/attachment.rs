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

use log::debug;
use std::{fs, path::Path};

use crate::email::{Error, Result};

/// Represents an attachment read from the disk, ready to be encoded.
#[derive(Debug)]
pub struct Attachment {
    pub filename: String,
    pub mime: String,
    pub body: Vec<u8>,
}

impl Attachment {
    /// Reads the attachment at the given path. The MIME type is
    /// sniffed from the content.
    pub fn from_path(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .ok_or_else(|| Error::GetAttachmentFilenameError(path.to_owned()))?
            .to_string_lossy()
            .into();
        let body = fs::read(path).map_err(|err| Error::ReadAttachmentError(err, path.to_owned()))?;
        let mime = tree_magic::from_u8(&body);
        debug!("attachment {:?}: {} ({} bytes)", filename, mime, body.len());

        Ok(Self {
            filename,
            mime,
            body,
        })
    }
}

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

//! Headers module.
//!
//! This module contains the ordered email header map shared by
//! composed and imported emails.

use std::slice;

/// Represents an ordered map of email headers.
///
/// A header name can hold multiple values. Names are matched case
/// insensitively but keep the case of their first insertion, and
/// entries keep their insertion order so the wire output is
/// deterministic.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Headers(Vec<(String, Vec<String>)>);

impl Headers {
    fn position(&self, key: &str) -> Option<usize> {
        self.0
            .iter()
            .position(|(name, _)| name.eq_ignore_ascii_case(key))
    }

    /// Replaces all the values of the given header. A header that
    /// does not exist yet is appended at the end.
    pub fn set<K, V, I>(&mut self, key: K, values: I)
    where
        K: ToString,
        V: ToString,
        I: IntoIterator<Item = V>,
    {
        let key = key.to_string();
        let values = values.into_iter().map(|v| v.to_string()).collect();

        match self.position(&key) {
            Some(pos) => self.0[pos].1 = values,
            None => self.0.push((key, values)),
        }
    }

    /// Adds a value to the given header, after the existing ones.
    pub fn append<K: ToString, V: ToString>(&mut self, key: K, value: V) {
        let key = key.to_string();

        match self.position(&key) {
            Some(pos) => self.0[pos].1.push(value.to_string()),
            None => self.0.push((key, vec![value.to_string()])),
        }
    }

    pub fn get_first(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.position(key)
            .map(|pos| self.0[pos].1.as_slice())
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter(self.0.iter())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Iterates over the headers as `(name, values)` pairs.
pub struct Iter<'a>(slice::Iter<'a, (String, Vec<String>)>);

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a [String]);

    fn next(&mut self) -> Option<Self::Item> {
        self.0
            .next()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a [String]);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

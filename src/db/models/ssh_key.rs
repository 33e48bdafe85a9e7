//! SSH key and keyring models.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::common::{KeyId, KeyringId};

lazy_static! {
    /// Separators replaced by a space when deriving a key name from a file name
    static ref FILENAME_SEPARATOR_REGEX: Regex = Regex::new(r"[-_.]").unwrap();
}

/// A named SSH public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SshKey {
    pub id: KeyId,
    pub name: String,
    /// Public key line, e.g. `ssh-rsa AAAA... user@host`
    #[sqlx(rename = "sshkey")]
    pub material: String,
    pub created_at: String,
    pub updated_at: String,
}

impl SshKey {
    /// The key as an authorized_keys line: the material followed by the key name
    pub fn entry(&self) -> String {
        format!("{} {}", self.material, self.name)
    }

    /// First 30 characters of the material, for listings
    pub fn short(&self) -> &str {
        match self.material.char_indices().nth(30) {
            Some((idx, _)) => &self.material[..idx],
            None => &self.material,
        }
    }

    /// Derive a human readable key name from a public key file name.
    ///
    /// `jonas_genannt.pub` becomes `Jonas Genannt`: the `.pub` suffix is
    /// dropped, `-`, `_` and `.` turn into spaces and every word is title-cased.
    pub fn filename2name(filename: &str) -> String {
        let filename = filename.trim();
        let stem = filename.strip_suffix(".pub").unwrap_or(filename);
        let spaced = FILENAME_SEPARATOR_REGEX.replace_all(stem, " ");
        title_case(&spaced)
    }
}

/// Upper-case the first letter of every word and lower-case the rest
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// A named, ordered collection of keys that can be attached to many accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SshKeyring {
    pub id: KeyringId,
    pub name: String,
    /// Member keys in reference order
    #[sqlx(skip)]
    #[serde(default)]
    pub keys: Vec<KeyId>,
    pub created_at: String,
    pub updated_at: String,
}

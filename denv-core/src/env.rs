// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Environment projection helpers.

use crate::table::Table;
use std::io::{self, Write};

/// Whether `name` is acceptable as an environment variable name:
/// `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_env_name(name: &[u8]) -> bool {
    let Some((&first, rest)) = name.split_first() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == b'_')
        && rest.iter().all(|&b| b.is_ascii_alphanumeric() || b == b'_')
}

impl Table {
    /// Writes `export NAME=VALUE` lines for every environment-marked live
    /// entry, suitable for `source`-ing from a shell.
    pub fn write_exports<W: Write>(&self, mut w: W) -> io::Result<()> {
        for (name, value) in self.env_entries() {
            w.write_all(b"export ")?;
            w.write_all(&name)?;
            w.write_all(b"=")?;
            w.write_all(&value)?;
            w.write_all(b"\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::make_table;

    #[test]
    fn env_name_validation() {
        assert!(is_valid_env_name(b"PATH"));
        assert!(is_valid_env_name(b"_private"));
        assert!(is_valid_env_name(b"HTTP_PROXY2"));
        assert!(is_valid_env_name(b"a"));

        assert!(!is_valid_env_name(b""));
        assert!(!is_valid_env_name(b"2FAST"));
        assert!(!is_valid_env_name(b"WITH-DASH"));
        assert!(!is_valid_env_name(b"WITH SPACE"));
        assert!(!is_valid_env_name(b"caf\xc3\xa9"));
        assert!(!is_valid_env_name(b"NAME="));
    }

    #[test]
    fn exports_cover_only_env_marked_entries() {
        let (_buf, table) = make_table();
        table.set(b"PLAIN", b"zero", false).unwrap();
        table.set(b"ALPHA", b"one", true).unwrap();
        table.set(b"BETA", b"two=2", true).unwrap();
        table.set(b"DEAD", b"three", true).unwrap();
        table.delete(b"DEAD");

        let mut out = Vec::new();
        table.write_exports(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines: Vec<&str> = text.lines().collect();
        lines.sort_unstable();
        assert_eq!(lines, vec!["export ALPHA=one", "export BETA=two=2"]);
    }

    #[test]
    fn exports_of_empty_table_write_nothing() {
        let (_buf, table) = make_table();
        let mut out = Vec::new();
        table.write_exports(&mut out).unwrap();
        assert!(out.is_empty());
    }
}

// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Version reporting.

use denv_core::{fnv1a32, MAX_ELEMENTS};

/// `denv MAJOR.MINOR.FIX.DISC`, where DISC discriminates builds of the same
/// release by hashing the build timestamp.
pub fn version_string() -> String {
    format!(
        "denv {}.{:04}",
        env!("CARGO_PKG_VERSION"),
        discriminator(env!("DENV_BUILD_TIMESTAMP").as_bytes())
    )
}

fn discriminator(stamp: &[u8]) -> usize {
    // Masked to the table index width, xor'd to keep the number wide.
    (fnv1a32(stamp) as usize & (MAX_ELEMENTS - 1)) ^ 9733
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_shape() {
        let v = version_string();
        let rest = v.strip_prefix("denv ").unwrap();
        // MAJOR.MINOR.FIX.DISC — four dot-separated numeric fields.
        let fields: Vec<&str> = rest.split('.').collect();
        assert_eq!(fields.len(), 4);
        for f in fields {
            f.parse::<u64>().unwrap();
        }
    }

    #[test]
    fn discriminator_is_stable_and_bounded() {
        let a = discriminator(b"1700000000");
        let b = discriminator(b"1700000000");
        assert_eq!(a, b);
        assert!(a >= 9733 - (MAX_ELEMENTS - 1));
        assert!(a <= 9733 + (MAX_ELEMENTS - 1));
        // Different stamps land on different discriminators in practice.
        let others: [&[u8]; 3] = [b"1700000001", b"1700000002", b"1700000003"];
        assert!(others.iter().any(|s| discriminator(s) != a));
    }
}

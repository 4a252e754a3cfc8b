// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2026 Jonathan D.A. Jewell
#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use versionyard::artifact::NamingConvention;

#[derive(Debug, Arbitrary)]
struct Input {
    file_name: String,
    repository: String,
}

fuzz_target!(|input: Input| {
    let naming = NamingConvention::default();

    if let Some(name) = naming.artifact_key(&input.file_name) {
        assert!(!name.key.is_empty());
        assert!(!name.version.is_empty());
        assert_eq!(name.key, name.key.to_ascii_lowercase());
    }

    let _ = naming.extract_version(&input.file_name);
    let _ = naming.repository_key(&input.repository);
    if naming.matches(&input.file_name, &input.repository) {
        assert!(naming.has_extension(&input.file_name));
    }
});

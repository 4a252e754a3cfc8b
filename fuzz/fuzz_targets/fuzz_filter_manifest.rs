// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2026 Jonathan D.A. Jewell
#![no_main]

use libfuzzer_sys::fuzz_target;
use versionyard::filter::{self, FilterManifest};
use versionyard::types::Repository;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let manifest = FilterManifest::parse(&text);

    let mut repositories = vec![
        Repository::new("opt-orgchart", "/b/opt-orgchart"),
        Repository::new("opt-soa", "/s/opt-soa"),
        Repository::new("tools", "/b/tools"),
    ];
    let visible = filter::apply(&mut repositories, &manifest);

    assert!(visible.windows(2).all(|w| w[0] < w[1]));
    assert!(visible.iter().all(|&i| i < repositories.len()));
    if manifest.is_empty() {
        assert_eq!(visible.len(), repositories.len());
    }
});

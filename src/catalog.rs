// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Repository discovery and the catalog that owns the repository list

use crate::artifact::NamingConvention;
use crate::error::{CatalogError, SelectionError};
use crate::extractor;
use crate::filter::{self, FilterManifest};
use crate::reconcile::{self, ReconcileOutcome};
use crate::types::{CatalogSummary, HeaderState, Repository};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A secondarily-configured repository appended after the primary scan
#[derive(Debug, Clone)]
pub struct ExtraRepository {
    /// Reserved name (`opt-soa`)
    pub name: String,
    /// Configured location, as typed by the operator
    pub path: PathBuf,
}

impl ExtraRepository {
    /// Trimmed path with separators normalised to the platform's
    #[must_use]
    pub fn normalized_path(&self) -> PathBuf {
        let raw = self.path.to_string_lossy();
        let normalized: String = raw
            .trim()
            .chars()
            .map(|c| if c == '/' || c == '\\' { MAIN_SEPARATOR } else { c })
            .collect();
        PathBuf::from(normalized)
    }
}

/// Scan `base` for repositories.
///
/// Immediate child directories only, hidden entries skipped, each with its
/// declared version. The extra repository is appended when its path is a
/// directory and no entry already uses its name. The result is sorted
/// case-insensitively by name.
///
/// # Errors
///
/// Returns [`CatalogError`] when `base` is missing, not a directory, or
/// cannot be listed. Per-entry failures are logged and skipped.
pub fn scan(base: &Path, extra: Option<&ExtraRepository>) -> Result<Vec<Repository>, CatalogError> {
    info!(path = %base.display(), "Scanning for repositories");

    if !base.exists() {
        return Err(CatalogError::NotFound(base.to_path_buf()));
    }
    if !base.is_dir() {
        return Err(CatalogError::NotADirectory(base.to_path_buf()));
    }
    std::fs::read_dir(base).map_err(|source| CatalogError::Io {
        path: base.to_path_buf(),
        source,
    })?;

    let mut repositories = Vec::new();

    let walker = WalkDir::new(base)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let mut repository = Repository::new(name, entry.path());
        repository.set_repo_version(extractor::extract(entry.path()));

        debug!(
            repository = %repository.name(),
            version = %repository.repo_version(),
            "Found repository"
        );
        repositories.push(repository);
    }

    if let Some(extra) = extra {
        if let Some(repository) = extra_repository(extra, &repositories) {
            repositories.push(repository);
        }
    }

    repositories.sort_by(Repository::cmp_by_name);

    info!(count = repositories.len(), path = %base.display(), "Scan complete");
    Ok(repositories)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn extra_repository(extra: &ExtraRepository, existing: &[Repository]) -> Option<Repository> {
    let path = extra.normalized_path();
    if path.as_os_str().is_empty() {
        debug!("No extra repository path configured");
        return None;
    }
    if !path.is_dir() {
        warn!(path = %path.display(), "Extra repository path does not exist or is not a directory");
        return None;
    }
    if existing.iter().any(|r| r.name().eq_ignore_ascii_case(&extra.name)) {
        info!(repository = %extra.name, "Extra repository already present, skipping");
        return None;
    }

    let mut repository = Repository::new(extra.name.clone(), &path);
    repository.set_repo_version(extractor::extract_nested(&path));
    info!(
        repository = %extra.name,
        path = %path.display(),
        version = %repository.repo_version(),
        "Added extra repository"
    );
    Some(repository)
}

/// The canonical repository list with its filter view and selection state
#[derive(Debug, Clone, Default)]
pub struct RepositoryCatalog {
    repositories: Vec<Repository>,
    visible: Vec<usize>,
    manifest: FilterManifest,
    naming: NamingConvention,
}

impl RepositoryCatalog {
    /// Empty catalog using `naming` for deployment matching
    #[must_use]
    pub fn new(naming: NamingConvention) -> Self {
        Self {
            naming,
            ..Self::default()
        }
    }

    /// Install a fresh scan, discarding the previous list and its selection
    pub fn replace(&mut self, repositories: Vec<Repository>) {
        self.repositories = repositories;
        self.refilter();
    }

    /// Drop every repository
    pub fn clear(&mut self) {
        self.repositories.clear();
        self.visible.clear();
    }

    /// Re-parse the filter text and recompute the visible view
    pub fn apply_filter(&mut self, text: &str) {
        self.manifest = FilterManifest::parse(text);
        self.refilter();
    }

    fn refilter(&mut self) {
        self.visible = filter::apply(&mut self.repositories, &self.manifest);
    }

    /// Refresh deployed versions from `deployment_path`
    pub fn reconcile(&mut self, deployment_path: &Path) -> ReconcileOutcome {
        reconcile::reconcile(&mut self.repositories, deployment_path, &self.naming)
    }

    /// Naming convention in use
    #[must_use]
    pub fn naming(&self) -> &NamingConvention {
        &self.naming
    }

    /// The current manifest
    #[must_use]
    pub fn manifest(&self) -> &FilterManifest {
        &self.manifest
    }

    /// Every repository, sorted by name
    #[must_use]
    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    /// Repositories passing the current filter, in catalog order
    pub fn visible(&self) -> impl Iterator<Item = &Repository> {
        self.visible.iter().map(|&i| &self.repositories[i])
    }

    /// Number of visible repositories
    #[must_use]
    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    /// Visible repository at `row`
    #[must_use]
    pub fn visible_at(&self, row: usize) -> Option<&Repository> {
        self.visible.get(row).map(|&i| &self.repositories[i])
    }

    /// Look up a repository by name, case-insensitively
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Repository> {
        self.repositories
            .iter()
            .find(|r| r.name().eq_ignore_ascii_case(name))
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Repository> {
        self.repositories
            .iter_mut()
            .find(|r| r.name().eq_ignore_ascii_case(name))
    }

    /// Set the selection of one repository; returns false if it is unknown
    pub fn set_selected(&mut self, name: &str, selected: bool) -> bool {
        match self.get_mut(name) {
            Some(repository) => {
                repository.set_selected(selected);
                info!(
                    repository = %repository.name(),
                    selected,
                    "Selection changed"
                );
                true
            }
            None => false,
        }
    }

    /// Flip the selection of one repository; returns the new state
    pub fn toggle(&mut self, name: &str) -> Option<bool> {
        let selected = !self.get(name)?.is_selected();
        self.set_selected(name, selected);
        Some(selected)
    }

    /// Select or clear every visible repository
    pub fn set_all_visible(&mut self, selected: bool) {
        for &i in &self.visible {
            self.repositories[i].set_selected(selected);
        }
        info!(selected, count = self.visible.len(), "Changed selection of visible repositories");
    }

    /// Tri-state of the visible selection
    #[must_use]
    pub fn header_state(&self) -> HeaderState {
        let selected = self.visible().filter(|r| r.is_selected()).count();
        if selected == 0 {
            HeaderState::Unchecked
        } else if selected == self.visible.len() {
            HeaderState::Checked
        } else {
            HeaderState::Indeterminate
        }
    }

    /// Header checkbox click: select all visible unless all already are
    pub fn toggle_all_visible(&mut self) {
        let select = self.header_state() != HeaderState::Checked;
        self.set_all_visible(select);
    }

    /// Every selected repository
    pub fn selected(&self) -> impl Iterator<Item = &Repository> {
        self.repositories.iter().filter(|r| r.is_selected())
    }

    /// The one selected repository.
    ///
    /// # Errors
    ///
    /// [`SelectionError::Empty`] or [`SelectionError::Multiple`].
    pub fn single_selection(&self) -> Result<&Repository, SelectionError> {
        let mut selected = self.selected();
        let first = selected.next().ok_or(SelectionError::Empty)?;
        let rest = selected.count();
        if rest > 0 {
            return Err(SelectionError::Multiple(rest + 1));
        }
        Ok(first)
    }

    /// Visible repositories whose deployed version disagrees
    pub fn mismatches(&self) -> impl Iterator<Item = &Repository> {
        self.visible().filter(|r| r.has_mismatch())
    }

    /// Counts for the status line
    #[must_use]
    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary {
            total: self.repositories.len(),
            visible: self.visible.len(),
            selected: self.selected().count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_dir(base: &Path, name: &str) -> PathBuf {
        let path = base.join(name);
        fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn test_scan_missing_base() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");

        assert!(matches!(scan(&missing, None), Err(CatalogError::NotFound(_))));
    }

    #[test]
    fn test_scan_file_base() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        assert!(matches!(scan(&file, None), Err(CatalogError::NotADirectory(_))));
    }

    #[test]
    fn test_scan_sorted_and_skips_hidden_and_files() {
        let dir = TempDir::new().unwrap();
        make_dir(dir.path(), "zeta");
        make_dir(dir.path(), "Alpha");
        make_dir(dir.path(), "beta");
        make_dir(dir.path(), ".git");
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let repos = scan(dir.path(), None).unwrap();
        let names: Vec<_> = repos.iter().map(Repository::name).collect();

        assert_eq!(names, vec!["Alpha", "beta", "zeta"]);
    }

    #[test]
    fn test_scan_does_not_recurse() {
        let dir = TempDir::new().unwrap();
        make_dir(dir.path(), "outer/inner");

        let repos = scan(dir.path(), None).unwrap();

        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name(), "outer");
    }

    #[test]
    fn test_scan_reads_versions() {
        let dir = TempDir::new().unwrap();
        let repo = make_dir(dir.path(), "opt-orgchart");
        fs::write(repo.join("package.json"), r#"{"version": "3.4.0"}"#).unwrap();

        let repos = scan(dir.path(), None).unwrap();

        assert_eq!(repos[0].repo_version(), "3.4.0");
    }

    #[test]
    fn test_scan_appends_extra_repository() {
        let dir = TempDir::new().unwrap();
        let base = make_dir(dir.path(), "base");
        make_dir(&base, "opt-zeta");
        let soa = make_dir(dir.path(), "soa-home");
        fs::write(soa.join("VERSION"), "version: 5.1.0").unwrap();

        let extra = ExtraRepository {
            name: "opt-soa".into(),
            path: soa.clone(),
        };
        let repos = scan(&base, Some(&extra)).unwrap();
        let names: Vec<_> = repos.iter().map(Repository::name).collect();

        assert_eq!(names, vec!["opt-soa", "opt-zeta"]);
        assert_eq!(repos[0].repo_version(), "5.1.0");
        assert_eq!(repos[0].path(), soa.as_path());
    }

    #[test]
    fn test_scan_extra_not_duplicated() {
        let dir = TempDir::new().unwrap();
        let base = make_dir(dir.path(), "base");
        make_dir(&base, "opt-soa");
        let soa = make_dir(dir.path(), "soa-home");

        let extra = ExtraRepository {
            name: "opt-soa".into(),
            path: soa,
        };
        let repos = scan(&base, Some(&extra)).unwrap();

        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].path(), base.join("opt-soa").as_path());
    }

    #[test]
    fn test_scan_extra_missing_is_ignored() {
        let dir = TempDir::new().unwrap();
        make_dir(dir.path(), "one");

        let extra = ExtraRepository {
            name: "opt-soa".into(),
            path: dir.path().join("missing"),
        };
        let repos = scan(dir.path(), Some(&extra)).unwrap();

        assert_eq!(repos.len(), 1);
    }

    fn catalog(names: &[&str]) -> RepositoryCatalog {
        let mut catalog = RepositoryCatalog::new(NamingConvention::default());
        catalog.replace(
            names
                .iter()
                .map(|n| Repository::new(*n, format!("/base/{n}")))
                .collect(),
        );
        catalog
    }

    #[test]
    fn test_summary_display() {
        let mut catalog = catalog(&["opt-a", "opt-b", "opt-c"]);
        assert_eq!(catalog.summary().to_string(), "Found 3 repositories, 0 selected");

        catalog.apply_filter("opt-a");
        catalog.set_selected("opt-a", true);
        assert_eq!(catalog.summary().to_string(), "Showing 1 of 3 repositories, 1 selected");

        assert_eq!(RepositoryCatalog::default().summary().to_string(), "No repositories found");
    }

    #[test]
    fn test_header_state_tracks_visible_rows() {
        let mut catalog = catalog(&["opt-a", "opt-b", "other"]);
        catalog.apply_filter("opt");
        assert_eq!(catalog.header_state(), HeaderState::Unchecked);

        catalog.toggle("opt-a");
        assert_eq!(catalog.header_state(), HeaderState::Indeterminate);

        catalog.toggle_all_visible();
        assert_eq!(catalog.header_state(), HeaderState::Checked);
        assert!(!catalog.get("other").unwrap().is_selected());

        catalog.toggle_all_visible();
        assert_eq!(catalog.header_state(), HeaderState::Unchecked);
    }

    #[test]
    fn test_single_selection() {
        let mut catalog = catalog(&["a", "b"]);
        assert_eq!(catalog.single_selection().unwrap_err(), SelectionError::Empty);

        catalog.set_selected("a", true);
        assert_eq!(catalog.single_selection().unwrap().name(), "a");

        catalog.set_selected("B", true);
        assert_eq!(catalog.single_selection().unwrap_err(), SelectionError::Multiple(2));
    }

    #[test]
    fn test_replace_drops_selection_and_keeps_filter() {
        let mut catalog = catalog(&["opt-a", "opt-b"]);
        catalog.apply_filter("opt-b 2.0");
        catalog.set_selected("opt-b", true);

        catalog.replace(vec![
            Repository::new("opt-a", "/base/opt-a"),
            Repository::new("opt-b", "/base/opt-b"),
        ]);

        assert_eq!(catalog.selected().count(), 0);
        assert_eq!(catalog.visible_len(), 1);
        assert_eq!(catalog.visible_at(0).unwrap().targeted_version(), "2.0");
    }
}

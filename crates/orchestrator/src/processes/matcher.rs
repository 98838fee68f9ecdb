#![forbid(unsafe_code)]

use crate::processes::ProcessSnapshot;
use tracing::{debug, trace};

const BUNDLE_SUFFIX: &str = ".app";

/// Running executables that match `app_name`.
///
/// Rules, first non-empty result wins:
///
/// 1. an absolute path matches only an identical executable path;
/// 2. a bundle name (`Foo.app`) matches paths containing `/Foo.app/Contents/MacOS/`;
/// 3. any other name matches paths ending in `/<name>`;
/// 4. failing all of the above, `<name>.app` is tried as a bundle name.
///
/// Matches are anchored on `/` so `Safari` never matches `SafariHelper`.
pub fn matching_processes<'a>(app_name: &str, snapshot: &'a ProcessSnapshot) -> Vec<&'a str> {
    let mut matches: Vec<&str> = if app_name.starts_with('/') {
        snapshot
            .executable_paths()
            .filter(|exe| *exe == app_name)
            .collect()
    } else if app_name.ends_with(BUNDLE_SUFFIX) {
        bundle_matches(app_name, snapshot)
    } else {
        let suffix = format!("/{app_name}");
        snapshot
            .executable_paths()
            .filter(|exe| exe.ends_with(&suffix))
            .collect()
    };

    if matches.is_empty() {
        matches = bundle_matches(&format!("{app_name}{BUNDLE_SUFFIX}"), snapshot);
    }
    matches
}

fn bundle_matches<'a>(bundle: &str, snapshot: &'a ProcessSnapshot) -> Vec<&'a str> {
    let needle = format!("/{bundle}/Contents/MacOS/");
    snapshot
        .executable_paths()
        .filter(|exe| exe.contains(&needle))
        .collect()
}

/// Whether `app_name` appears to be running. See [`matching_processes`].
pub fn is_running(app_name: &str, snapshot: &ProcessSnapshot) -> bool {
    trace!(app_name, "checking if application is running");
    let matches = matching_processes(app_name, snapshot);
    if matches.is_empty() {
        return false;
    }
    debug!(app_name, ?matches, "application is running");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processes::ProcessRecord;
    use proptest::prelude::*;

    fn snapshot(paths: &[&str]) -> ProcessSnapshot {
        paths
            .iter()
            .enumerate()
            .map(|(i, path)| ProcessRecord::new(i as u32 + 1, "alice", *path))
            .collect()
    }

    #[test]
    fn absolute_path_requires_exact_match() {
        let table = snapshot(&["/Applications/Safari.app/Contents/MacOS/Safari"]);
        assert!(is_running(
            "/Applications/Safari.app/Contents/MacOS/Safari",
            &table
        ));
        assert!(!is_running("/Applications/Safari.app/Contents/MacOS", &table));
        assert!(!is_running(
            "/Applications/Safari.app/Contents/MacOS/Saf",
            &table
        ));
    }

    #[test]
    fn bundle_name_with_or_without_suffix() {
        let table = snapshot(&["/Applications/Safari.app/Contents/MacOS/Safari"]);
        assert!(is_running("Safari.app", &table));
        assert!(is_running("Safari", &table));
    }

    #[test]
    fn bare_name_falls_back_to_bundle_when_executable_differs() {
        let table = snapshot(&["/Applications/Microsoft Word.app/Contents/MacOS/WordBinary"]);
        assert!(is_running("Microsoft Word", &table));
        assert!(!is_running("Microsoft", &table));
    }

    #[test]
    fn names_are_anchored_on_separators() {
        let table = snapshot(&[
            "/usr/libexec/SafariHelper",
            "/Applications/MySafari.app/Contents/MacOS/MySafari",
        ]);
        assert!(!is_running("Safari", &table));
        assert!(!is_running("Safari.app", &table));
        assert!(is_running("SafariHelper", &table));
    }

    #[test]
    fn relative_executables_never_match() {
        let table = snapshot(&["Safari", "(Safari)"]);
        assert!(!is_running("Safari", &table));
    }

    #[test]
    fn empty_snapshot_matches_nothing() {
        assert!(!is_running("Finder", &ProcessSnapshot::default()));
    }

    fn segment() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 ]{0,7}"
    }

    proptest! {
        #[test]
        fn absolute_paths_match_only_themselves(
            segments in prop::collection::vec(segment(), 1..5),
            extra in segment(),
        ) {
            let path = format!("/{}", segments.join("/"));
            let longer = format!("{path}/{extra}");
            let table = snapshot(&[longer.as_str()]);
            prop_assert!(!is_running(&path, &table));
            prop_assert!(is_running(&longer, &table));

            let parent = snapshot(&[path.as_str()]);
            prop_assert!(!is_running(&longer, &parent));
        }

        #[test]
        fn bundle_suffix_is_optional(
            name in segment(),
            dir in segment(),
            exe in segment(),
        ) {
            let path = format!("/{dir}/{name}.app/Contents/MacOS/{exe}");
            let table = snapshot(&[path.as_str()]);
            let bundle = format!("{name}.app");
            prop_assert!(is_running(&bundle, &table));
            prop_assert!(is_running(&name, &table));
        }
    }
}

// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Layout collection for a matched page.

use std::path::{Path, PathBuf};

/// Collects `layout.<ext>` files from the page's directory up to `root`,
/// ordered outermost first.
pub fn collect(page: &Path, root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    collect_with(page, root, extensions, |path| path.is_file())
}

/// Like [`collect`], with an injectable existence check.
pub fn collect_with<F>(page: &Path, root: &Path, extensions: &[String], exists: F) -> Vec<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    let mut layouts = Vec::new();
    let mut current = page.parent();

    while let Some(dir) = current {
        if !dir.starts_with(root) {
            break;
        }

        let found = extensions
            .iter()
            .map(|ext| dir.join(format!("layout.{}", ext)))
            .find(|candidate| candidate != page && exists(candidate));
        if let Some(layout) = found {
            layouts.push(layout);
        }

        if dir == root {
            break;
        }
        current = dir.parent();
    }

    layouts.reverse();
    layouts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn lua() -> Vec<String> {
        vec!["lua".to_string()]
    }

    #[test]
    fn test_collect_outer_to_inner() {
        let present: HashSet<PathBuf> = [
            "app/layout.lua",
            "app/blog/layout.lua",
            "app/blog/[slug]/layout.lua",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();

        let layouts = collect_with(
            Path::new("app/blog/[slug]/page.lua"),
            Path::new("app"),
            &lua(),
            |p| present.contains(p),
        );
        assert_eq!(
            layouts,
            vec![
                PathBuf::from("app/layout.lua"),
                PathBuf::from("app/blog/layout.lua"),
                PathBuf::from("app/blog/[slug]/layout.lua"),
            ]
        );
    }

    #[test]
    fn test_collect_skips_levels_without_layout() {
        let present: HashSet<PathBuf> = ["app/layout.lua"].iter().map(PathBuf::from).collect();
        let layouts = collect_with(
            Path::new("app/a/b/page.lua"),
            Path::new("app"),
            &lua(),
            |p| present.contains(p),
        );
        assert_eq!(layouts, vec![PathBuf::from("app/layout.lua")]);
    }

    #[test]
    fn test_collect_stops_at_root() {
        let present: HashSet<PathBuf> = ["layout.lua", "app/layout.lua"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let layouts = collect_with(
            Path::new("app/page.lua"),
            Path::new("app"),
            &lua(),
            |p| present.contains(p),
        );
        assert_eq!(layouts, vec![PathBuf::from("app/layout.lua")]);
    }

    #[test]
    fn test_layout_is_not_its_own_layout() {
        let present: HashSet<PathBuf> = ["app/layout.lua"].iter().map(PathBuf::from).collect();
        let layouts = collect_with(
            Path::new("app/layout.lua"),
            Path::new("app"),
            &lua(),
            |p| present.contains(p),
        );
        assert!(layouts.is_empty());
    }

    #[test]
    fn test_collect_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("app");
        std::fs::create_dir_all(root.join("docs")).unwrap();
        std::fs::write(root.join("layout.lua"), "").unwrap();
        std::fs::write(root.join("docs/page.lua"), "").unwrap();

        let layouts = collect(&root.join("docs/page.lua"), &root, &lua());
        assert_eq!(layouts, vec![root.join("layout.lua")]);
    }
}

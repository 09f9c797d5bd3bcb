//! Discovery of built pages on disk.

use std::io;
use std::path::{Path, PathBuf};

/// An HTML file to post-process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFile {
    pub path: PathBuf,
    /// Path relative to the argument it was found under; used to mirror the tree into an
    /// output directory.
    pub relative: PathBuf,
}

impl PageFile {
    pub fn target(&self, out_dir: Option<&Path>) -> PathBuf {
        match out_dir {
            Some(dir) => dir.join(&self.relative),
            None => self.path.clone(),
        }
    }
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
}

/// Expands file and directory arguments into page files. Directories are walked recursively
/// in sorted order; explicitly named files are taken regardless of extension.
pub fn collect(paths: &[PathBuf]) -> io::Result<Vec<PageFile>> {
    let mut pages = Vec::new();
    for root in paths {
        if root.is_dir() {
            walk(root, root, &mut pages)?;
        } else if root.is_file() {
            let relative = root
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| root.clone());
            pages.push(PageFile {
                path: root.clone(),
                relative,
            });
        } else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: no such file or directory", root.display()),
            ));
        }
    }
    Ok(pages)
}

fn walk(root: &Path, dir: &Path, pages: &mut Vec<PageFile>) -> io::Result<()> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            walk(root, &path, pages)?;
        } else if is_html(&path) {
            let relative = path
                .strip_prefix(root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.clone());
            pages.push(PageFile { path, relative });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn walks_directories_for_html_only() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("dist");
        fs::create_dir_all(root.join("guide/intro")).unwrap();
        fs::write(root.join("index.html"), "").unwrap();
        fs::write(root.join("guide/intro/index.HTML"), "").unwrap();
        fs::write(root.join("guide/style.css"), "").unwrap();

        let pages = collect(std::slice::from_ref(&root)).unwrap();
        let relative: Vec<PathBuf> = pages.iter().map(|p| p.relative.clone()).collect();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("guide/intro/index.HTML"),
                PathBuf::from("index.html")
            ]
        );
        assert_eq!(
            pages[1].target(Some(Path::new("/out"))),
            PathBuf::from("/out/index.html")
        );
        assert_eq!(pages[1].target(None), root.join("index.html"));
    }

    #[test]
    fn missing_path_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = collect(&[tmp.path().join("nope")]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}

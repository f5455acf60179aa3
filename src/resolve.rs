//! Path normalization and symlink resolution.
//!
//! Every candidate path gets two canonical forms:
//!
//! - **original**: the input collapsed lexically (`.`/`..`/duplicate
//!   separators) without touching the filesystem;
//! - **resolved**: the absolute path reached by following every symlink in the
//!   chain, including the final component.
//!
//! Resolution is non-strict: components that do not exist yet are appended
//! as-is, so a `Write` to a new file still resolves. Anything else that goes
//! wrong (dangling-chain loops, permission errors, I/O failures, NUL bytes)
//! makes the path unresolvable, which callers must treat as sensitive.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Maximum number of symlinks followed before giving up (matches Linux `MAXSYMLINKS`).
const MAX_SYMLINK_HOPS: usize = 40;

/// The two canonical forms of a candidate path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPathPair {
    /// Lexically normalized input.
    pub original: String,
    /// Symlink-resolved absolute path.
    pub resolved: String,
    /// Whether resolution went through at least one symlink, i.e. `resolved`
    /// differs from the lexical absolute form of the input.
    pub redirected: bool,
}

impl ResolvedPathPair {
    /// Whether classification needs to look at two distinct strings.
    #[must_use]
    pub fn is_split(&self) -> bool {
        self.original != self.resolved
    }
}

/// Why a path could not be resolved.
#[derive(Debug)]
pub struct ResolveFailure {
    /// The path as requested.
    pub path: String,
    /// Underlying cause.
    pub source: io::Error,
}

impl fmt::Display for ResolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot resolve path '{}': {}", self.path, self.source)
    }
}

impl std::error::Error for ResolveFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Compute both canonical forms of `path`.
///
/// # Errors
///
/// Returns [`ResolveFailure`] when the symlink chain cannot be followed. The
/// caller must not treat this as "safe".
pub fn resolve(path: &str) -> Result<ResolvedPathPair, ResolveFailure> {
    let cwd = std::env::current_dir().map_err(|source| ResolveFailure {
        path: path.to_string(),
        source,
    })?;
    resolve_from(path, &cwd)
}

/// Like [`resolve`], with an explicit base directory for relative inputs.
///
/// # Errors
///
/// See [`resolve`].
pub fn resolve_from(path: &str, cwd: &Path) -> Result<ResolvedPathPair, ResolveFailure> {
    let fail = |source: io::Error| ResolveFailure {
        path: path.to_string(),
        source,
    };

    if path.contains('\0') {
        return Err(fail(io::Error::new(
            io::ErrorKind::InvalidInput,
            "path contains a NUL byte",
        )));
    }

    let joined = cwd.join(path);
    let original = normalize_lexical(Path::new(path));
    let absolute = normalize_lexical(&joined);
    // `..` must apply after each symlink is followed, as the kernel does.
    let resolved = real_path(&joined).map_err(fail)?;

    Ok(ResolvedPathPair {
        original: path_string(&original),
        redirected: resolved != absolute,
        resolved: path_string(&resolved),
    })
}

/// Collapse `.`, `..` and redundant separators without filesystem access.
///
/// Leading `..` components of a relative path are kept; `..` at the root is
/// dropped. An empty result becomes `.`.
#[must_use]
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Follow every symlink in the absolute `path`, applying `..` to the
/// resolved prefix.
fn real_path(path: &Path) -> io::Result<PathBuf> {
    let mut hops = 0;
    let mut resolved = PathBuf::new();
    walk(&mut resolved, path, &mut hops)?;
    Ok(resolved)
}

fn walk(resolved: &mut PathBuf, path: &Path, hops: &mut usize) -> io::Result<()> {
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                resolved.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => follow(resolved, name.to_os_string(), hops)?,
        }
    }
    Ok(())
}

fn follow(resolved: &mut PathBuf, name: OsString, hops: &mut usize) -> io::Result<()> {
    let candidate = resolved.join(&name);
    match std::fs::symlink_metadata(&candidate) {
        Ok(meta) if meta.file_type().is_symlink() => {
            *hops += 1;
            if *hops > MAX_SYMLINK_HOPS {
                return Err(io::Error::other("too many levels of symbolic links"));
            }
            let target = std::fs::read_link(&candidate)?;
            if target.is_absolute() {
                resolved.clear();
            }
            walk(resolved, &target, hops)
        }
        Ok(_) => {
            resolved.push(name);
            Ok(())
        }
        // Not created yet (e.g. the target of a Write); keep the name verbatim.
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            resolved.push(name);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn canonical_tempdir() -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().canonicalize().expect("canonicalize tempdir");
        (dir, root)
    }

    #[test]
    fn normalize_collapses_dots_and_separators() {
        assert_eq!(normalize_lexical(Path::new("/a//b/./c/../d")), PathBuf::from("/a/b/d"));
        assert_eq!(normalize_lexical(Path::new("a/b/../../..")), PathBuf::from(".."));
        assert_eq!(normalize_lexical(Path::new("/../etc")), PathBuf::from("/etc"));
        assert_eq!(normalize_lexical(Path::new("./")), PathBuf::from("."));
        assert_eq!(normalize_lexical(Path::new("")), PathBuf::from("."));
    }

    #[test]
    fn plain_file_resolves_to_itself() {
        let (_dir, root) = canonical_tempdir();
        let file = root.join("notes.txt");
        std::fs::write(&file, "hi").unwrap();

        let pair = resolve_from(file.to_str().unwrap(), &root).unwrap();
        assert_eq!(pair.original, pair.resolved);
        assert!(!pair.is_split());
        assert!(!pair.redirected);
    }

    #[test]
    fn nonexistent_path_still_resolves() {
        let (_dir, root) = canonical_tempdir();
        let path = root.join("new/dir/file.rs");
        let pair = resolve_from(path.to_str().unwrap(), &root).unwrap();
        assert_eq!(pair.resolved, path.to_string_lossy());
        assert!(!pair.redirected);
    }

    #[test]
    fn relative_path_is_absolutized_without_redirect() {
        let (_dir, root) = canonical_tempdir();
        let pair = resolve_from("src/../lib.rs", &root).unwrap();
        assert_eq!(pair.original, "lib.rs");
        assert_eq!(pair.resolved, root.join("lib.rs").to_string_lossy());
        assert!(pair.is_split());
        assert!(!pair.redirected);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_chain_is_followed() {
        let (_dir, root) = canonical_tempdir();
        let ssh = root.join(".ssh");
        std::fs::create_dir(&ssh).unwrap();
        std::fs::write(ssh.join("id_rsa"), "key").unwrap();
        std::os::unix::fs::symlink(ssh.join("id_rsa"), root.join("hop")).unwrap();
        std::os::unix::fs::symlink("hop", root.join("notes.txt")).unwrap();

        let pair = resolve_from(root.join("notes.txt").to_str().unwrap(), &root).unwrap();
        assert_eq!(pair.resolved, ssh.join("id_rsa").to_string_lossy());
        assert!(pair.redirected);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_component_is_followed() {
        let (_dir, root) = canonical_tempdir();
        std::fs::create_dir(root.join(".aws")).unwrap();
        std::os::unix::fs::symlink(root.join(".aws"), root.join("cloud")).unwrap();

        let pair = resolve_from("cloud/credentials", &root).unwrap();
        assert_eq!(pair.resolved, root.join(".aws/credentials").to_string_lossy());
        assert!(pair.redirected);
    }

    #[cfg(unix)]
    #[test]
    fn parent_dir_applies_after_symlink() {
        let (_dir, root) = canonical_tempdir();
        std::fs::create_dir_all(root.join("home/.aws/cache")).unwrap();
        std::fs::create_dir(root.join("work")).unwrap();
        std::os::unix::fs::symlink(root.join("home/.aws/cache"), root.join("work/link")).unwrap();

        let pair = resolve_from("work/link/../credentials", &root).unwrap();
        assert_eq!(pair.original, "work/credentials");
        assert_eq!(pair.resolved, root.join("home/.aws/credentials").to_string_lossy());
        assert!(pair.redirected);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_resolves_to_target() {
        let (_dir, root) = canonical_tempdir();
        std::os::unix::fs::symlink(root.join("missing/.env"), root.join("link")).unwrap();

        let pair = resolve_from(root.join("link").to_str().unwrap(), &root).unwrap();
        assert_eq!(pair.resolved, root.join("missing/.env").to_string_lossy());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_fails_closed() {
        let (_dir, root) = canonical_tempdir();
        std::os::unix::fs::symlink(root.join("b"), root.join("a")).unwrap();
        std::os::unix::fs::symlink(root.join("a"), root.join("b")).unwrap();

        let err = resolve_from(root.join("a").to_str().unwrap(), &root).unwrap_err();
        assert!(err.to_string().contains("symbolic links"));
    }

    #[test]
    fn nul_byte_fails_closed() {
        let (_dir, root) = canonical_tempdir();
        assert!(resolve_from("notes\0.txt", &root).is_err());
    }

    #[test]
    fn resolution_is_idempotent() {
        let (_dir, root) = canonical_tempdir();
        let first = resolve_from("a/b/../c", &root).unwrap();
        let second = resolve_from("a/b/../c", &root).unwrap();
        assert_eq!(first, second);
    }
}

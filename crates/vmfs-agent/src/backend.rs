//! Storage backends the agent performs operations against.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;
use vmfs_proto::MAX_CONTENT_LEN;

use crate::error::AgentError;

pub type AgentResult<T> = Result<T, AgentError>;

/// Filesystem actions the agent can perform.
///
/// Paths are the raw text operands from the request frame.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn create_dir(&self, path: &str) -> AgentResult<()>;

    async fn write(&self, path: &str, content: &[u8]) -> AgentResult<()>;

    async fn read(&self, path: &str) -> AgentResult<Vec<u8>>;

    async fn copy(&self, src_path: &str, dst_path: &str) -> AgentResult<()>;

    async fn remove_dir(&self, path: &str) -> AgentResult<()>;

    async fn remove_dir_all(&self, path: &str) -> AgentResult<()>;
}

/// Backend rooted at a directory on the host filesystem.
#[derive(Clone, Debug)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path below the root.
    ///
    /// Absolute paths, `..` and paths naming the root itself are refused.
    /// Symlinks inside the root are followed as-is.
    pub fn resolve(&self, path: &str) -> AgentResult<PathBuf> {
        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(AgentError::PathEscape {
                        path: path.to_string(),
                    })
                }
            }
        }
        if depth == 0 {
            return Err(AgentError::PathEscape {
                path: path.to_string(),
            });
        }
        Ok(resolved)
    }
}

#[async_trait]
impl Backend for LocalFs {
    async fn create_dir(&self, path: &str) -> AgentResult<()> {
        let target = self.resolve(path)?;
        debug!("create_dir {}", target.display());
        tokio::fs::create_dir(&target)
            .await
            .map_err(|e| AgentError::from_io(path, e))
    }

    async fn write(&self, path: &str, content: &[u8]) -> AgentResult<()> {
        let target = self.resolve(path)?;
        debug!("write {} ({} bytes)", target.display(), content.len());
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| AgentError::from_io(path, e))
    }

    async fn read(&self, path: &str) -> AgentResult<Vec<u8>> {
        let target = self.resolve(path)?;
        debug!("read {}", target.display());
        let file = tokio::fs::File::open(&target)
            .await
            .map_err(|e| AgentError::from_io(path, e))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| AgentError::from_io(path, e))?
            .len();
        let too_large = |len: u64| AgentError::TooLarge {
            path: path.to_string(),
            len,
            max: MAX_CONTENT_LEN,
        };
        if len > MAX_CONTENT_LEN as u64 {
            return Err(too_large(len));
        }

        // The file may grow after the size check.
        let mut content = Vec::with_capacity(len as usize);
        file.take(MAX_CONTENT_LEN as u64 + 1)
            .read_to_end(&mut content)
            .await
            .map_err(|e| AgentError::from_io(path, e))?;
        if content.len() > MAX_CONTENT_LEN {
            return Err(too_large(content.len() as u64));
        }
        Ok(content)
    }

    async fn copy(&self, src_path: &str, dst_path: &str) -> AgentResult<()> {
        let src = self.resolve(src_path)?;
        let dst = self.resolve(dst_path)?;
        debug!("copy {} -> {}", src.display(), dst.display());
        tokio::fs::copy(&src, &dst)
            .await
            .map(|_| ())
            .map_err(|e| AgentError::from_io(src_path, e))
    }

    async fn remove_dir(&self, path: &str) -> AgentResult<()> {
        let target = self.resolve(path)?;
        debug!("remove_dir {}", target.display());
        tokio::fs::remove_dir(&target)
            .await
            .map_err(|e| AgentError::from_io(path, e))
    }

    async fn remove_dir_all(&self, path: &str) -> AgentResult<()> {
        let target = self.resolve(path)?;
        debug!("remove_dir_all {}", target.display());
        tokio::fs::remove_dir_all(&target)
            .await
            .map_err(|e| AgentError::from_io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn local() -> (TempDir, LocalFs) {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new(dir.path());
        (dir, fs)
    }

    #[test]
    fn test_resolve_stays_below_root() {
        let (dir, fs) = local();
        assert_eq!(fs.resolve("pidir/todo.txt").unwrap(), dir.path().join("pidir/todo.txt"));
        assert_eq!(fs.resolve("./pidir").unwrap(), dir.path().join("pidir"));

        for bad in ["../etc", "/etc/passwd", "pidir/../../x", ".", ""] {
            assert!(
                matches!(fs.resolve(bad), Err(AgentError::PathEscape { .. })),
                "{bad} should be refused"
            );
        }
    }

    #[tokio::test]
    async fn test_write_read_copy() {
        let (dir, fs) = local();
        fs.create_dir("pidir").await.unwrap();
        fs.write("pidir/todo.txt", b"laundry").await.unwrap();
        fs.copy("pidir/todo.txt", "pidir/todo-copy.txt").await.unwrap();

        assert_eq!(fs.read("pidir/todo-copy.txt").await.unwrap(), b"laundry");
        assert!(dir.path().join("pidir/todo.txt").is_file());
    }

    #[tokio::test]
    async fn test_read_refuses_files_over_the_content_limit() {
        let (dir, fs) = local();
        let big = std::fs::File::create(dir.path().join("big")).unwrap();
        big.set_len(MAX_CONTENT_LEN as u64 + 1).unwrap();

        match fs.read("big").await {
            Err(AgentError::TooLarge { len, max, .. }) => {
                assert_eq!(len, MAX_CONTENT_LEN as u64 + 1);
                assert_eq!(max, MAX_CONTENT_LEN);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_dir_twice() {
        let (_dir, fs) = local();
        fs.create_dir("pidir").await.unwrap();
        assert!(matches!(
            fs.create_dir("pidir").await,
            Err(AgentError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_remove_dir_refuses_non_empty() {
        let (dir, fs) = local();
        fs.create_dir("pidir").await.unwrap();
        fs.write("pidir/f", b"x").await.unwrap();

        assert!(fs.remove_dir("pidir").await.is_err());
        fs.remove_dir_all("pidir").await.unwrap();
        assert!(!dir.path().join("pidir").exists());
        assert!(matches!(
            fs.remove_dir_all("pidir").await,
            Err(AgentError::NotFound { .. })
        ));
    }
}

//! Repository acquisition

use anyhow::{Context, Result};
use git2::build::RepoBuilder;
use git2::FetchOptions;
use std::path::Path;
use tracing::info;

/// Materializes a repository into an empty destination directory.
pub trait RepositoryFetcher {
    fn fetch(&self, source: &str, dest: &Path) -> Result<()>;
}

/// Shallow clone with libgit2.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    /// History depth; 0 clones the full history
    pub depth: u32,
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self { depth: 1 }
    }
}

impl RepositoryFetcher for GitFetcher {
    fn fetch(&self, source: &str, dest: &Path) -> Result<()> {
        info!("Cloning {} (depth {})", source, self.depth);

        let mut fetch_options = FetchOptions::new();
        if self.depth > 0 {
            fetch_options.depth(self.depth as i32);
        }

        RepoBuilder::new()
            .fetch_options(fetch_options)
            .clone(source, dest)
            .with_context(|| format!("Failed to clone {}", source))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_clone_local_repository() {
        let origin = tempdir().expect("tempdir");
        let repo = git2::Repository::init(origin.path()).expect("init");
        std::fs::write(origin.path().join("main.py"), "print('hi')\n").expect("write");

        let mut index = repo.index().expect("index");
        index.add_path(Path::new("main.py")).expect("add");
        index.write().expect("write index");
        let tree_id = index.write_tree().expect("tree");
        let tree = repo.find_tree(tree_id).expect("find tree");
        let sig = git2::Signature::now("Test", "test@example.com").expect("sig");
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .expect("commit");

        let dest = tempdir().expect("tempdir");
        let target = dest.path().join("clone");
        // Local transports do not support shallow fetches
        GitFetcher { depth: 0 }
            .fetch(origin.path().to_str().expect("utf8 path"), &target)
            .expect("clone");
        assert!(target.join("main.py").exists());
    }

    #[test]
    fn test_clone_failure_is_error() {
        let dest = tempdir().expect("tempdir");
        let err = GitFetcher::default()
            .fetch("/definitely/not/a/repo", &dest.path().join("x"))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to clone"));
    }
}

//! the chain of files connected by `include` blocks
//!
//! ```hcl
//! # live/prod/app/terragrunt.hcl
//! include {
//!   path = "../../root.hcl"
//! }
//! ```
//!
//! Only the `path` attribute of the `include` block is decoded here, everything else in the file is left alone.
//! Each file includes at most one parent, so the files form a chain: index `0` is the file the resolution started
//! from (the child), the last file is the root.
//!
//! Expressions can read information about the chain through the `include` variable:
//!
//! | field      | value                                              |
//! |------------|----------------------------------------------------|
//! | `file`     | path of the file itself                            |
//! | `root`     | path of the last file of the chain                 |
//! | `parent`   | path of the included file, `""` for the root       |
//! | `parents`  | paths of all ancestors, root first                 |
//! | `child`    | path of the including file, `""` for the entry     |
//! | `children` | paths of all descendants, nearest first            |
//! | `level`    | `0` for the root, parent level + 1 otherwise       |
use crate::error::{Error, PathList, Result};
use crate::source::{SourceFile, SourceLoader};
use crate::util;
use hcl::eval::{Context, Evaluate};
use std::path::{Path, PathBuf};

pub const INCLUDE_BLOCK: &str = "include";
pub const INCLUDE_ROOT: &str = "include";

/// Index of a file within its [IncludeChain]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub usize);

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub struct IncludeChain {
    files: Vec<SourceFile>,
}

impl IncludeChain {
    /// Loads `entry` and every file it (transitively) includes
    #[tracing::instrument(level = "debug", skip(loader))]
    pub fn resolve(entry: &Path, loader: &dyn SourceLoader) -> Result<Self> {
        let mut files = vec![];
        let mut next = Some(util::normalize_path(entry));

        while let Some(path) = next.take() {
            if let Some(position) = files.iter().position(|file: &SourceFile| file.path() == path.as_path()) {
                let mut chain: Vec<PathBuf> = files[position..]
                    .iter()
                    .map(|file| file.path().to_owned())
                    .collect();
                chain.push(path);
                return Err(Error::IncludeCycle {
                    chain: PathList(chain),
                });
            }

            let file = SourceFile::load(&path, loader)?;
            next = include_path(&file)?;
            if let Some(parent) = &next {
                tracing::debug!(child=%path.display(), parent=%parent.display(), "include");
            }
            files.push(file);
        }

        Ok(Self { files })
    }

    /// A chain of a single file that includes nothing
    pub fn standalone(file: SourceFile) -> Result<Self> {
        if file.single_block(INCLUDE_BLOCK)?.is_some() {
            tracing::warn!(path=%file.path().display(), "include block of standalone file is ignored");
        }
        Ok(Self { files: vec![file] })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.0)
    }

    /// Files from child to root
    pub fn files(&self) -> impl Iterator<Item = (FileId, &SourceFile)> {
        self.files
            .iter()
            .enumerate()
            .map(|(index, file)| (FileId(index), file))
    }

    pub fn root(&self) -> Option<FileId> {
        self.files.len().checked_sub(1).map(FileId)
    }

    pub fn parent(&self, id: FileId) -> Option<FileId> {
        let parent = id.0 + 1;
        (parent < self.files.len()).then_some(FileId(parent))
    }

    pub fn child(&self, id: FileId) -> Option<FileId> {
        id.0.checked_sub(1).map(FileId)
    }

    /// Distance from the root file
    pub fn level(&self, id: FileId) -> usize {
        self.files.len() - 1 - id.0
    }

    /// The `include` variable for expressions of file `id`
    pub fn include_value(&self, id: FileId) -> hcl::Value {
        let path_of = |id: Option<FileId>| -> hcl::Value {
            id.map(|id| self.path_string(id)).unwrap_or_default().into()
        };

        let parents: Vec<hcl::Value> = (id.0 + 1..self.files.len())
            .rev()
            .map(|index| self.path_string(FileId(index)).into())
            .collect();

        let children: Vec<hcl::Value> = (0..id.0)
            .rev()
            .map(|index| self.path_string(FileId(index)).into())
            .collect();

        let mut include = hcl::value::Map::new();
        include.insert("file".to_owned(), self.path_string(id).into());
        include.insert("root".to_owned(), path_of(self.root()));
        include.insert("parent".to_owned(), path_of(self.parent(id)));
        include.insert("parents".to_owned(), hcl::Value::Array(parents));
        include.insert("child".to_owned(), path_of(self.child(id)));
        include.insert("children".to_owned(), hcl::Value::Array(children));
        include.insert("level".to_owned(), (self.level(id) as u64).into());

        hcl::Value::Object(include)
    }

    fn path_string(&self, id: FileId) -> String {
        self.files[id.0].path().display().to_string()
    }
}

/// Resolved path of the file included by `file`, if any
fn include_path(file: &SourceFile) -> Result<Option<PathBuf>> {
    let Some(block) = file.single_block(INCLUDE_BLOCK)? else {
        return Ok(None);
    };

    let missing_path = || Error::IncludedConfigMissingPath {
        path: file.path().to_owned(),
    };

    let attribute = block
        .body
        .attributes()
        .find(|attribute| attribute.key.value().as_str() == "path")
        .ok_or_else(missing_path)?;

    let expression: hcl::Expression = attribute.value.clone().into();
    let value = expression
        .evaluate(&Context::new())
        .map_err(|errors| Error::InvalidIncludePath {
            path: file.path().to_owned(),
            reason: errors.to_string(),
        })?;

    let include_path = match value {
        hcl::Value::String(include_path) => include_path,
        other => {
            return Err(Error::InvalidIncludePath {
                path: file.path().to_owned(),
                reason: format!("expected a string, got {other:?}"),
            })
        }
    };

    if include_path.is_empty() {
        return Err(missing_path());
    }

    Ok(Some(util::resolve_include_path(
        file.path(),
        Path::new(&include_path),
    )))
}

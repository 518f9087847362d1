//! hcl source files and the loaders that read them
//!
//! A [SourceFile] is a parsed [Body] together with the path it was read from. The path is used to resolve relative
//! `include` paths and to point at the right file in error messages.
//!
//! Reading is done through a [SourceLoader] so a chain can be resolved from disk ([FsLoader]) or from memory
//! ([MemoryLoader]).
use crate::error::{Error, Result};
use hcl_edit::structure::{Block, Body, Structure};
use std::path::{Path, PathBuf};

/// Reads the raw text of a configuration file
pub trait SourceLoader {
    fn read(&self, path: &Path) -> std::io::Result<String>;
}

/// Reads files from the filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn read(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Serves files from a map of `path => contents`
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    files: indexmap::IndexMap<PathBuf, String>,
}

impl MemoryLoader {
    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into());
    }
}

impl SourceLoader for MemoryLoader {
    fn read(&self, path: &Path) -> std::io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a known source", path.display()),
            )
        })
    }
}

#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    body: Body,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, body: Body) -> Self {
        Self {
            path: path.into(),
            body,
        }
    }

    /// Reads and parses `path` through `loader`
    pub fn load(path: &Path, loader: &dyn SourceLoader) -> Result<Self> {
        tracing::info!(path=%path.display(), "loading file");

        let contents = loader.read(path).map_err(|source| Error::Load {
            path: path.to_owned(),
            source,
        })?;

        Self::parse(path, &contents)
    }

    pub fn parse(path: impl Into<PathBuf>, contents: &str) -> Result<Self> {
        let path = path.into();
        match hcl_edit::parser::parse_body(contents) {
            Ok(body) => Ok(Self::new(path, body)),
            Err(source) => Err(Error::Parse { path, source }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Root blocks with the given identifier, in document order
    pub fn blocks<'a>(&'a self, ident: &'a str) -> impl Iterator<Item = &'a Block> + 'a {
        self.body.iter().filter_map(move |structure| match structure {
            Structure::Block(block) if block.ident.value().as_str() == ident => Some(block),
            _ => None,
        })
    }

    /// The one block with the given identifier
    ///
    /// Fails with [Error::DuplicateBlock] when the file declares it more than once.
    pub fn single_block(&self, ident: &'static str) -> Result<Option<&Block>> {
        let mut blocks = self.blocks(ident);
        let first = blocks.next();

        if blocks.next().is_some() {
            return Err(Error::DuplicateBlock {
                path: self.path.clone(),
                block: ident,
            });
        }

        Ok(first)
    }
}

/// Utility macro to create a [MemoryLoader]
///
/// ```
/// # use strata::sources;
/// let loader = sources! {
///   "/live/child.hcl" => r#"include { path = "../root.hcl" }"#,
///   "/root.hcl" => "globals { region = \"eu-west-1\" }"
/// };
/// ```
#[macro_export]
macro_rules! sources {
    { $($path:expr => $contents:expr),+ $(,)? } => {{
        let mut loader = $crate::source::MemoryLoader::default();
        $(
            loader.insert($path, $contents);
        )+
        loader
    }};
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// Parses a single in-memory file, panics on invalid hcl
    pub(crate) fn source_file(contents: &str) -> SourceFile {
        SourceFile::parse("test.hcl", contents).expect("body must parse")
    }

    #[test]
    fn blocks_by_identifier() {
        let file = source_file(
            r#"
            locals { a = 1 }
            globals { b = 2 }
            attr = 3
            globals { c = 3 }
            "#,
        );

        assert_eq!(file.blocks("globals").count(), 2);
        assert_eq!(file.blocks("locals").count(), 1);
        assert_eq!(file.blocks("include").count(), 0);
    }

    #[test]
    fn single_block_rejects_duplicates() {
        let file = source_file("include {}\ninclude {}");
        let err = file.single_block("include").expect_err("must error");
        assert!(matches!(err, Error::DuplicateBlock { block: "include", .. }));
    }

    #[test]
    fn memory_loader_reports_missing_files() {
        let loader = sources! { "/a.hcl" => "" };
        let err = SourceFile::load(Path::new("/b.hcl"), &loader).expect_err("must error");
        assert!(matches!(err, Error::Load { .. }));
    }

    #[test]
    fn parse_errors_keep_the_path() {
        let err = SourceFile::parse("broken.hcl", "not = valid = hcl").expect_err("must error");
        let Error::Parse { path, .. } = err else {
            panic!("expected a parse error");
        };
        assert_eq!(path, PathBuf::from("broken.hcl"));
    }
}

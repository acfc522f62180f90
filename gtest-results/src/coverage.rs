// Copyright (c) The gtest-engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line coverage extracted from genhtml's per-file `*.gcov.html` documents.
//!
//! genhtml writes one document per source file, mirroring the source tree under its output
//! directory. Within a document, every source line starts with a `<span class="lineNum">` marker.
//! The node right after the marker tells us whether the line was hit:
//!
//! ```html
//! <span class="lineNum">      12 </span><span class="lineCov">          3 :   return x;</span>
//! <span class="lineNum">      13 </span><span class="lineNoCov">          0 :   abort();</span>
//! <span class="lineNum">      14 </span>            : }
//! ```

use crate::errors::CoverageError;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use rayon::prelude::*;
use scraper::{ElementRef, Html, Selector};
use serde::{Serialize, Serializer};
use std::{
    collections::{BTreeMap, HashSet, btree_map},
    fmt, fs, io,
    sync::LazyLock,
};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// The directory genhtml writes coverage documents to, relative to the project root.
pub const DEFAULT_COVERAGE_DIR: &str = "coverage/html";

/// The decoration genhtml appends to a source file's name: `foo.cc` becomes `foo.cc.gcov.html`.
///
/// Stripping `COVERAGE_SUFFIX.len()` (10) bytes from a document name yields the source file name.
pub const COVERAGE_SUFFIX: &str = ".gcov.html";

/// Class of the element marking a source line's position.
pub const LINE_NUMBER_CLASS: &str = "lineNum";

/// Class carried by the element following a covered line's marker.
pub const COVERED_CLASS: &str = "lineCov";

/// Class carried by the element following an uncovered line's marker.
pub const UNCOVERED_CLASS: &str = "lineNoCov";

// Matches any `span` whose class list contains `lineNum` as a token, not only `class="lineNum"`.
static LINE_NUMBER_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(&format!("span.{LINE_NUMBER_CLASS}")).expect("line number selector is valid")
});

/// The coverage classification of a single source line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LineCoverage {
    /// The line was executed at least once.
    Covered,

    /// The line is instrumented but was never executed.
    Uncovered,

    /// The line carries no coverage information (comments, blank lines, declarations).
    NotClassifiable,
}

impl LineCoverage {
    /// Returns the single-character code for this classification: `C`, `U` or `N`.
    pub fn as_char(self) -> char {
        match self {
            Self::Covered => 'C',
            Self::Uncovered => 'U',
            Self::NotClassifiable => 'N',
        }
    }
}

/// Per-line coverage for one source file, in the order lines appear in the document.
///
/// Displayed and serialized as a string of `C`, `U` and `N` characters, one per line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoverageLineString {
    lines: Vec<LineCoverage>,
}

impl CoverageLineString {
    /// Returns the number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns true if the document had no line markers.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Iterates over the classifications, first line first.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = LineCoverage> + '_ {
        self.lines.iter().copied()
    }

    /// Returns the number of lines with the given classification.
    pub fn count(&self, kind: LineCoverage) -> usize {
        self.lines.iter().filter(|line| **line == kind).count()
    }
}

impl FromIterator<LineCoverage> for CoverageLineString {
    fn from_iter<T: IntoIterator<Item = LineCoverage>>(iter: T) -> Self {
        Self {
            lines: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for CoverageLineString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            write!(f, "{}", line.as_char())?;
        }
        Ok(())
    }
}

impl Serialize for CoverageLineString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Coverage for every source file in a project, keyed by source path relative to the project
/// root (forward slashes, no leading `./`).
///
/// An index is built once by [`extract_coverage`] and then shared read-only by every outcome in a
/// [`ResultSet`](crate::ResultSet).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CoverageIndex {
    files: BTreeMap<String, CoverageLineString>,
}

impl CoverageIndex {
    /// Returns coverage for the given source path, if any.
    pub fn get(&self, source_path: &str) -> Option<&CoverageLineString> {
        self.files.get(source_path)
    }

    /// Iterates over `(source path, coverage)` pairs, sorted by source path.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &CoverageLineString)> + '_ {
        self.files.iter().map(|(path, lines)| (path.as_str(), lines))
    }

    /// Returns the number of source files in the index.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if no coverage documents were found.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Builds an index from `(source path, coverage)` pairs. Later pairs replace earlier ones with the
/// same path; use [`extract_coverage`] to have collisions reported.
impl FromIterator<(String, CoverageLineString)> for CoverageIndex {
    fn from_iter<T: IntoIterator<Item = (String, CoverageLineString)>>(iter: T) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// A coverage document found on disk, along with the source path it describes.
#[derive(Clone, Debug)]
struct CoverageDocument {
    path: Utf8PathBuf,
    source_path: String,
}

/// Discovers and parses every coverage document under `root`.
///
/// `root` is genhtml's output directory; source paths in the returned index are relative to it.
/// Documents are parsed in parallel and merged in path order afterwards.
pub fn extract_coverage(root: &Utf8Path) -> Result<CoverageIndex, CoverageError> {
    let documents = discover_documents(root)?;
    debug!(
        "found {} coverage document(s) under `{root}`",
        documents.len()
    );

    let parsed: Vec<_> = documents
        .into_par_iter()
        .map(|document| {
            let bytes = fs::read(&document.path).map_err(|error| CoverageError::ReadDocument {
                path: document.path.clone(),
                error,
            })?;
            let lines = parse_coverage_document(&String::from_utf8_lossy(&bytes));
            trace!(
                "`{}` -> `{}`: {} line(s)",
                document.path,
                document.source_path,
                lines.len()
            );
            Ok::<_, CoverageError>((document, lines))
        })
        .collect();

    let mut builder = IndexBuilder::default();
    for result in parsed {
        let (document, lines) = result?;
        builder.insert(document, lines)?;
    }
    Ok(builder.finish())
}

/// Parses a single coverage document into its per-line classification.
///
/// The input does not need to be well-formed; it is parsed the way a browser would. A document
/// without any line markers produces an empty string.
pub fn parse_coverage_document(html: &str) -> CoverageLineString {
    let document = Html::parse_document(html);
    document
        .select(&LINE_NUMBER_SELECTOR)
        .map(classify_marker)
        .collect()
}

/// Classifies a line marker by its immediately following sibling node.
///
/// Class names are compared as whitespace-separated tokens, so `class="lineCov hit"` counts as
/// covered. This is deliberately looser than an exact comparison of the `class` attribute, which
/// would classify such a line as not classifiable.
fn classify_marker(marker: ElementRef<'_>) -> LineCoverage {
    let Some(sibling) = marker.next_sibling() else {
        return LineCoverage::NotClassifiable;
    };
    let Some(element) = sibling.value().as_element() else {
        return LineCoverage::NotClassifiable;
    };

    if element.classes().any(|class| class == COVERED_CLASS) {
        LineCoverage::Covered
    } else if element.classes().any(|class| class == UNCOVERED_CLASS) {
        LineCoverage::Uncovered
    } else {
        LineCoverage::NotClassifiable
    }
}

/// Accumulates parsed documents, rejecting source paths claimed twice.
#[derive(Debug, Default)]
struct IndexBuilder {
    files: BTreeMap<String, CoverageLineString>,
    origins: BTreeMap<String, Utf8PathBuf>,
}

impl IndexBuilder {
    fn insert(
        &mut self,
        document: CoverageDocument,
        lines: CoverageLineString,
    ) -> Result<(), CoverageError> {
        match self.origins.entry(document.source_path) {
            btree_map::Entry::Occupied(entry) => Err(CoverageError::DuplicateMapping {
                source_path: entry.key().clone(),
                first: entry.get().clone(),
                second: document.path,
            }),
            btree_map::Entry::Vacant(entry) => {
                self.files.insert(entry.key().clone(), lines);
                entry.insert(document.path);
                Ok(())
            }
        }
    }

    fn finish(self) -> CoverageIndex {
        CoverageIndex { files: self.files }
    }
}

fn discover_documents(root: &Utf8Path) -> Result<Vec<CoverageDocument>, CoverageError> {
    match fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => {
            return Err(CoverageError::RootNotADirectory {
                root: root.to_owned(),
            });
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            warn!("coverage directory `{root}` does not exist, reporting no coverage");
            return Ok(Vec::new());
        }
        Err(error) => {
            return Err(CoverageError::RootInaccessible {
                root: root.to_owned(),
                error,
            });
        }
    }

    // Symlinks are followed, so the same directory may be reachable through several paths, or
    // through itself. Each directory is entered at most once.
    let mut visited = HashSet::new();
    let mut documents = Vec::new();
    let mut walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                if let Some(ancestor) = error.loop_ancestor() {
                    debug!(
                        "skipping symlink loop at `{}` (points back to `{}`)",
                        error.path().unwrap_or(ancestor).display(),
                        ancestor.display(),
                    );
                    continue;
                }
                if error.depth() > 0
                    && error.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound)
                {
                    warn!(
                        "skipping dangling link `{}` in coverage directory",
                        error.path().map(|path| path.display().to_string()).unwrap_or_default(),
                    );
                    continue;
                }
                return Err(CoverageError::Walk {
                    root: root.to_owned(),
                    error,
                });
            }
        };

        if entry.file_type().is_dir() {
            let identity = fs::canonicalize(entry.path()).unwrap_or_else(|_| entry.path().into());
            if !visited.insert(identity) {
                debug!(
                    "skipping already-visited directory `{}`",
                    entry.path().display()
                );
                walker.skip_current_dir();
            }
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let path = Utf8Path::from_path(entry.path()).ok_or_else(|| CoverageError::NonUtf8Path {
            path: entry.path().to_owned(),
        })?;
        if let Some(source_path) = source_path_for(root, path) {
            documents.push(CoverageDocument {
                path: path.to_owned(),
                source_path,
            });
        }
    }

    Ok(documents)
}

/// Maps a coverage document's path to the source path it describes.
///
/// Returns `None` if the document is not a coverage document.
fn source_path_for(root: &Utf8Path, document: &Utf8Path) -> Option<String> {
    let relative = document.strip_prefix(root).ok()?;
    let mut components: Vec<&str> = relative
        .components()
        .filter_map(|component| match component {
            Utf8Component::Normal(name) => Some(name),
            _ => None,
        })
        .collect();

    let file_name = components.pop()?;
    let source_name = file_name.strip_suffix(COVERAGE_SUFFIX)?;
    if source_name.is_empty() {
        return None;
    }
    components.push(source_name);
    Some(components.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use camino_tempfile_ext::prelude::*;
    use indoc::indoc;
    use std::fmt::Write as _;
    use test_case::test_case;

    #[test_case("" => ""; "empty document")]
    #[test_case("<html><body><p>no coverage here</p></body></html>" => ""; "no markers")]
    #[test_case(
        r#"<span class="lineNum">1</span><span class="lineCov">a</span><span class="lineNum">2</span><span class="lineNoCov">b</span><span class="lineNum">3</span>"#
        => "CUN";
        "covered uncovered absent"
    )]
    #[test_case(
        r#"<span class="lineNum">1</span> text<span class="lineCov">a</span>"#
        => "N";
        "text sibling"
    )]
    #[test_case(
        r#"<span class="lineNum">1</span><span class="lineDiffCov">a</span>"#
        => "N";
        "other class"
    )]
    #[test_case(
        r#"<span class="lineNum">1</span><span>a</span>"#
        => "N";
        "no class"
    )]
    #[test_case(
        r#"<span class="lineNum">1</span><span class="source lineCov">a</span>"#
        => "C";
        "class among several"
    )]
    #[test_case(
        r#"<span class="lineNum hl">1</span><span class="lineNoCov">a</span>"#
        => "U";
        "marker class among several"
    )]
    #[test_case(
        r#"<a name="1"><span class="lineNum">1</span></a><span class="lineCov">a</span>"#
        => "N";
        "marker wrapped in anchor"
    )]
    #[test_case(
        r#"<div class="lineNum">1</div><span class="lineCov">a</span>"#
        => "";
        "marker must be a span"
    )]
    fn classify(html: &str) -> String {
        parse_coverage_document(html).to_string()
    }

    #[test]
    fn alternating_classes_follow_document_order() {
        let mut html = String::from("<pre class=\"source\">");
        for line in 0..12 {
            write!(html, "<span class=\"lineNum\">{line}</span>").unwrap();
            match line % 3 {
                0 => html.push_str("<span class=\"lineCov\">x</span>\n"),
                1 => html.push_str("<span class=\"lineNoCov\">x</span>\n"),
                _ => html.push('\n'),
            }
        }
        html.push_str("</pre>");

        let lines = parse_coverage_document(&html);
        assert_eq!(lines.len(), 12);
        assert_eq!(lines.to_string(), "CUNCUNCUNCUN");
        assert_eq!(lines.count(LineCoverage::Covered), 4);
    }

    #[test]
    fn tolerates_malformed_markup() {
        let html = indoc! {r#"
            <html><body><table><tr><td>
            <pre class="source">
            <span class="lineNum">   1 </span><span class="lineCov">   1 : int main() {
            <span class="lineNum">   2 </span><span class="lineNoCov">   0 :   <b>abort();
            <span class="lineNum">   3 </span><span class="lineCov">
        "#};
        let lines = parse_coverage_document(html);
        assert_eq!(lines.len(), 3, "every marker is counted: {lines}");
        assert_eq!(lines.iter().next(), Some(LineCoverage::Covered));
    }

    #[test_case("coverage/html", "coverage/html/src/foo.cc.gcov.html" => Some("src/foo.cc".to_owned()); "nested")]
    #[test_case("coverage/html", "coverage/html/main.cc.gcov.html" => Some("main.cc".to_owned()); "top level")]
    #[test_case("./coverage/html", "./coverage/html/a/b/c.h.gcov.html" => Some("a/b/c.h".to_owned()); "leading dot")]
    #[test_case("coverage/html", "coverage/html/index.html" => None; "not a coverage document")]
    #[test_case("coverage/html", "coverage/html/.gcov.html" => None; "empty source name")]
    #[test_case("coverage/html", "elsewhere/foo.cc.gcov.html" => None; "outside root")]
    fn source_paths(root: &str, document: &str) -> Option<String> {
        source_path_for(Utf8Path::new(root), Utf8Path::new(document))
    }

    #[test]
    fn suffix_length() {
        assert_eq!(COVERAGE_SUFFIX.len(), 10);
    }

    fn marker_doc(siblings: &[Option<&str>]) -> String {
        let mut html = String::new();
        for (line, class) in siblings.iter().enumerate() {
            write!(html, "<span class=\"lineNum\">{line}</span>").unwrap();
            if let Some(class) = class {
                write!(html, "<span class=\"{class}\">x</span>").unwrap();
            }
            html.push('\n');
        }
        html
    }

    #[test]
    fn extract_indexes_by_source_path() {
        let temp = Utf8TempDir::new().expect("created temp dir");
        temp.child("src/foo.cc.gcov.html")
            .write_str(&marker_doc(&[Some("lineCov"), Some("lineNoCov"), None]))
            .expect("wrote document");
        temp.child("src/nested/bar.h.gcov.html")
            .write_str(&marker_doc(&[Some("lineCov")]))
            .expect("wrote document");
        temp.child(".hidden/baz.cc.gcov.html")
            .write_str(&marker_doc(&[None]))
            .expect("wrote document");
        temp.child("empty.cc.gcov.html")
            .write_str("")
            .expect("wrote document");
        temp.child("index.html")
            .write_str(&marker_doc(&[Some("lineCov")]))
            .expect("wrote document");

        let index = extract_coverage(temp.path()).expect("extraction succeeds");
        let actual: Vec<_> = index
            .iter()
            .map(|(path, lines)| (path.to_owned(), lines.to_string()))
            .collect();
        pretty_assertions::assert_eq!(
            actual,
            vec![
                (".hidden/baz.cc".to_owned(), "N".to_owned()),
                ("empty.cc".to_owned(), String::new()),
                ("src/foo.cc".to_owned(), "CUN".to_owned()),
                ("src/nested/bar.h".to_owned(), "C".to_owned()),
            ]
        );
    }

    #[test]
    fn missing_root() {
        let temp = Utf8TempDir::new().expect("created temp dir");
        let index = extract_coverage(&temp.path().join("does-not-exist"))
            .expect("missing root is not an error");
        assert!(index.is_empty(), "unexpected coverage: {index:?}");
    }

    #[test]
    fn root_is_a_file() {
        let temp = Utf8TempDir::new().expect("created temp dir");
        temp.child("index.html")
            .write_str("<html></html>")
            .expect("wrote file");
        let error = extract_coverage(&temp.path().join("index.html"))
            .expect_err("file root is an error");
        assert!(
            matches!(error, CoverageError::RootNotADirectory { .. }),
            "unexpected error: {error:?}"
        );
    }

    #[test]
    fn duplicate_mapping() {
        let mut builder = IndexBuilder::default();
        builder
            .insert(
                CoverageDocument {
                    path: "a/foo.cc.gcov.html".into(),
                    source_path: "foo.cc".to_owned(),
                },
                CoverageLineString::default(),
            )
            .expect("first insert succeeds");
        let error = builder
            .insert(
                CoverageDocument {
                    path: "b/foo.cc.gcov.html".into(),
                    source_path: "foo.cc".to_owned(),
                },
                CoverageLineString::default(),
            )
            .expect_err("second insert collides");
        match error {
            CoverageError::DuplicateMapping {
                source_path,
                first,
                second,
            } => {
                assert_eq!(source_path, "foo.cc");
                assert_eq!(first, "a/foo.cc.gcov.html");
                assert_eq!(second, "b/foo.cc.gcov.html");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycles_terminate() {
        let temp = Utf8TempDir::new().expect("created temp dir");
        temp.child("src/foo.cc.gcov.html")
            .write_str(&marker_doc(&[Some("lineCov")]))
            .expect("wrote document");
        // src/loop -> src, and alias -> src.
        std::os::unix::fs::symlink(temp.path().join("src"), temp.path().join("src/loop"))
            .expect("created loop symlink");
        std::os::unix::fs::symlink(temp.path().join("src"), temp.path().join("alias"))
            .expect("created alias symlink");

        let index = extract_coverage(temp.path()).expect("extraction succeeds");
        let paths: Vec<_> = index.iter().map(|(path, _)| path).collect();
        // "alias" sorts before "src", so the directory is first reached through the alias.
        assert_eq!(paths, vec!["alias/foo.cc"]);
    }
}

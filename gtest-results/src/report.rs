// Copyright (c) The gtest-engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading GoogleTest XML reports.
//!
//! GoogleTest writes its report (`--gtest_output=xml:test_detail.xml`) in a JUnit-like shape:
//!
//! ```xml
//! <testsuites tests="2" failures="1" name="AllTests">
//!   <testsuite name="Math" tests="2" failures="1">
//!     <testcase name="Adds" status="run" result="completed" time="0.01" classname="Math" />
//!     <testcase name="Divides" status="run" result="completed" time="0.02" classname="Math">
//!       <failure message="Expected: 2" type=""><![CDATA[math_test.cc:12]]></failure>
//!     </testcase>
//!   </testsuite>
//! </testsuites>
//! ```
//!
//! A passing test is written as an empty element, so any child node at all means the test
//! reported a failure.

use crate::errors::{MalformedReason, ReportParseError};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

static TESTCASE_TAG: &[u8] = b"testcase";
static FAILURE_TAG: &[u8] = b"failure";
static ERROR_TAG: &[u8] = b"error";

static NAME_ATTR: &str = "name";
static CLASSNAME_ATTR: &str = "classname";
static TIME_ATTR: &str = "time";
static STATUS_ATTR: &str = "status";
static MESSAGE_ATTR: &str = "message";

/// The outcome of a single test, as decided from the report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    /// The test ran and reported nothing.
    Pass,

    /// The test ran and reported a failure.
    Fail,

    /// The test was not run (disabled or filtered out).
    Skip,

    /// The report's status could not be interpreted.
    ///
    /// This is never treated as a pass.
    Unsound,
}

impl TestStatus {
    /// Decides a test's status from the `status` attribute of its `testcase` element and whether
    /// the element has any child nodes.
    ///
    /// * `status="run"` is a pass if the element is empty, and a failure otherwise.
    /// * `status="notrun"` is a skip.
    /// * Anything else, including a missing attribute, is unsound.
    pub fn from_report(status: Option<&str>, has_children: bool) -> Self {
        match status {
            Some("run") if has_children => Self::Fail,
            Some("run") => Self::Pass,
            Some("notrun") => Self::Skip,
            _ => Self::Unsound,
        }
    }

    /// Returns true if this status should cause the run to be reported as failing.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Fail | Self::Unsound)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skip => "SKIP",
            Self::Unsound => "UNSOUND",
        };
        f.pad(s)
    }
}

/// A single `testcase` entry read from a report.
#[derive(Clone, Debug, PartialEq)]
pub struct RawTestEntry {
    /// The test's name.
    pub name: String,

    /// The test's class name: for GoogleTest, the name of the test suite.
    pub classname: Option<String>,

    /// Time taken, in seconds. Always finite and non-negative.
    pub duration: f64,

    /// The decided status.
    pub status: TestStatus,

    /// Messages from `failure` and `error` children, one per line.
    pub details: Option<String>,
}

/// Parses a GoogleTest XML report into its testcase entries, in document order.
///
/// The document must be well-formed XML. Every `testcase` element must have a `name`; a missing or
/// invalid `time` is treated as zero.
pub fn parse_test_report(document: &[u8]) -> Result<Vec<RawTestEntry>, ReportParseError> {
    let mut reader = Reader::from_reader(document);
    reader.check_end_names(true);

    let mut buf = Vec::new();
    let mut open: Vec<String> = Vec::new();
    let mut seen_root = false;
    // Entries are stored by start-tag order; a slot is filled once its element closes. Slots for
    // testcases without a name stay empty.
    let mut entries: Vec<Option<RawTestEntry>> = Vec::new();
    let mut pending: Vec<PendingTestcase> = Vec::new();
    // Reported only once the document is known to be well-formed.
    let mut missing_name: Option<usize> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|error| malformed(&reader, MalformedReason::Syntax(error)))?;

        match event {
            Event::Start(start) => {
                check_start(&reader, &open, &mut seen_root, &start)?;
                note_child_element(&reader, &mut pending, open.len(), &start)?;
                if start.name().as_ref() == TESTCASE_TAG {
                    let testcase =
                        PendingTestcase::new(&reader, &start, entries.len() + 1, open.len())?;
                    testcase.note_missing_name(&mut missing_name);
                    pending.push(testcase);
                    entries.push(None);
                }
                open.push(tag_name(&start));
            }
            Event::Empty(start) => {
                check_start(&reader, &open, &mut seen_root, &start)?;
                note_child_element(&reader, &mut pending, open.len(), &start)?;
                if start.name().as_ref() == TESTCASE_TAG {
                    let testcase =
                        PendingTestcase::new(&reader, &start, entries.len() + 1, open.len())?;
                    testcase.note_missing_name(&mut missing_name);
                    entries.push(testcase.finish());
                }
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                if open.pop().as_ref() != Some(&name) {
                    return Err(malformed(&reader, MalformedReason::UnmatchedEndTag { name }));
                }
                let depth = open.len();
                if let Some(testcase) = pending.pop_if(|testcase| testcase.depth == depth) {
                    let slot = testcase.index - 1;
                    entries[slot] = testcase.finish();
                }
            }
            Event::Text(text) => {
                if open.is_empty() {
                    if !text.iter().all(u8::is_ascii_whitespace) {
                        return Err(malformed(&reader, MalformedReason::TextOutsideRoot));
                    }
                } else {
                    note_child_node(&mut pending);
                }
            }
            Event::CData(_) => {
                if open.is_empty() {
                    return Err(malformed(&reader, MalformedReason::TextOutsideRoot));
                }
                note_child_node(&mut pending);
            }
            Event::Comment(_) | Event::PI(_) => {
                if !open.is_empty() {
                    note_child_node(&mut pending);
                }
            }
            Event::Decl(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
        buf.clear();
    }

    if !open.is_empty() {
        return Err(malformed(&reader, MalformedReason::UnclosedElements { open }));
    }
    if !seen_root {
        return Err(malformed(&reader, MalformedReason::NoRootElement));
    }
    if let Some(index) = missing_name {
        return Err(ReportParseError::MissingField {
            field: NAME_ATTR,
            index,
        });
    }

    let entries: Vec<RawTestEntry> = entries.into_iter().flatten().collect();
    debug!("read {} testcase(s) from test report", entries.len());
    Ok(entries)
}

/// A `testcase` element whose end tag hasn't been seen yet.
#[derive(Debug)]
struct PendingTestcase {
    /// 1-based position among all testcases.
    index: usize,
    /// Number of open ancestor elements.
    depth: usize,
    name: Option<String>,
    classname: Option<String>,
    time: Option<String>,
    status: Option<String>,
    has_children: bool,
    messages: Vec<String>,
}

impl PendingTestcase {
    fn new(
        reader: &Reader<&[u8]>,
        start: &BytesStart<'_>,
        index: usize,
        depth: usize,
    ) -> Result<Self, ReportParseError> {
        Ok(Self {
            index,
            depth,
            name: attribute(reader, start, NAME_ATTR)?,
            classname: attribute(reader, start, CLASSNAME_ATTR)?,
            time: attribute(reader, start, TIME_ATTR)?,
            status: attribute(reader, start, STATUS_ATTR)?,
            has_children: false,
            messages: Vec::new(),
        })
    }

    /// Keeps the index of the first testcase that has no name.
    fn note_missing_name(&self, missing_name: &mut Option<usize>) {
        if self.name.is_none() && missing_name.is_none() {
            *missing_name = Some(self.index);
        }
    }

    /// Returns `None` if the testcase has no name.
    fn finish(self) -> Option<RawTestEntry> {
        let name = self.name?;
        let duration = parse_duration(&name, self.time.as_deref());
        let status = TestStatus::from_report(self.status.as_deref(), self.has_children);
        if status == TestStatus::Unsound {
            debug!("testcase `{name}` has unrecognized status {:?}", self.status);
        }

        Some(RawTestEntry {
            name,
            classname: self.classname,
            duration,
            status,
            details: (!self.messages.is_empty()).then(|| self.messages.join("\n")),
        })
    }
}

/// Parses a `time` attribute. Missing or unusable values are treated as zero.
fn parse_duration(name: &str, time: Option<&str>) -> f64 {
    let Some(time) = time else {
        return 0.0;
    };
    match time.trim().parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => seconds,
        _ => {
            warn!("testcase `{name}` has invalid time `{time}`, treating it as 0");
            0.0
        }
    }
}

/// Checks a start tag's attributes, and that it doesn't begin a second root element.
fn check_start(
    reader: &Reader<&[u8]>,
    open: &[String],
    seen_root: &mut bool,
    start: &BytesStart<'_>,
) -> Result<(), ReportParseError> {
    // Attributes are otherwise only parsed on demand.
    for attr in start.attributes() {
        attr.map_err(|error| malformed(reader, MalformedReason::Syntax(error.into())))?;
    }

    if !open.is_empty() {
        return Ok(());
    }
    if *seen_root {
        return Err(malformed(
            reader,
            MalformedReason::MultipleRootElements {
                name: tag_name(start),
            },
        ));
    }
    *seen_root = true;
    Ok(())
}

/// Records an element appearing while `depth` elements are open.
fn note_child_element(
    reader: &Reader<&[u8]>,
    pending: &mut [PendingTestcase],
    depth: usize,
    start: &BytesStart<'_>,
) -> Result<(), ReportParseError> {
    note_child_node(pending);

    let Some(parent) = pending.last_mut() else {
        return Ok(());
    };
    let tag = start.name();
    let is_failure = tag.as_ref() == FAILURE_TAG || tag.as_ref() == ERROR_TAG;
    if is_failure
        && parent.depth + 1 == depth
        && let Some(message) = attribute(reader, start, MESSAGE_ATTR)?
    {
        parent.messages.push(message);
    }
    Ok(())
}

/// Every open testcase contains the node just read.
fn note_child_node(pending: &mut [PendingTestcase]) {
    for testcase in pending {
        testcase.has_children = true;
    }
}

/// Reads and unescapes an attribute of the tag the reader has just returned.
fn attribute(
    reader: &Reader<&[u8]>,
    start: &BytesStart<'_>,
    key: &str,
) -> Result<Option<String>, ReportParseError> {
    let syntax = |error: quick_xml::Error| malformed(reader, MalformedReason::Syntax(error));

    match start.try_get_attribute(key) {
        Ok(Some(attr)) => {
            let value = attr.unescape_value().map_err(syntax)?;
            Ok(Some(value.into_owned()))
        }
        Ok(None) => Ok(None),
        Err(error) => Err(syntax(error.into())),
    }
}

fn tag_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

fn malformed(reader: &Reader<&[u8]>, reason: MalformedReason) -> ReportParseError {
    ReportParseError::Malformed {
        position: reader.buffer_position(),
        reason,
    }
}

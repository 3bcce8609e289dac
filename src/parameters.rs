//! Parameter detection for generated commands.
//!
//! A command string is decomposed into an ordered, contiguous sequence of
//! [`Span`]s: fixed text the user should not touch ([`SpanKind::Literal`])
//! and the "holes" meant for customization ([`SpanKind::Parameter`]).
//! Detection is a purely lexical pass over the text. It does not understand
//! command grammar; ambiguous tokens are resolved by a fixed recognizer
//! priority, and the result is best-effort by design.
//!
//! The invariant every caller can rely on: spans are ordered, contiguous,
//! and their concatenation reconstructs the input exactly.

use once_cell::sync::Lazy;
use regex::Regex;

/// What kind of value a parameter span holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    FilePath,
    Placeholder,
    FlagValue,
    TimeCode,
    Numeric,
    Generic,
}

/// Whether a span is fixed text or a customizable parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Literal,
    Parameter(ParameterKind),
}

/// A contiguous substring of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub kind: SpanKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn is_parameter(&self) -> bool {
        matches!(self.kind, SpanKind::Parameter(_))
    }

    pub fn parameter_kind(&self) -> Option<ParameterKind> {
        match self.kind {
            SpanKind::Parameter(kind) => Some(kind),
            SpanKind::Literal => None,
        }
    }
}

/// The individual pattern recognizers, in their default priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recognizer {
    /// Bracketed or braced tokens: `{INPUT}`, `<file>`, `[name]`.
    Placeholder,
    /// The value of a flag-value pair: `-o value`, `--input=value`.
    FlagValue,
    /// Digit groups separated by colons: `00:01:23`, `01:30`.
    TimeCode,
    /// Tokens containing a path separator or a recognized extension.
    FilePath,
    /// Bare numbers adjacent to size/rate keywords. May misfire; best-effort.
    Numeric,
}

/// Default recognizer priority. Earlier entries win overlapping claims.
pub const DEFAULT_ORDER: [Recognizer; 5] = [
    Recognizer::Placeholder,
    Recognizer::FlagValue,
    Recognizer::TimeCode,
    Recognizer::FilePath,
    Recognizer::Numeric,
];

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{[^{}\s]+\}|<[A-Za-z][^<>\s]*>|\[[A-Za-z][^\[\]\s]*\]").unwrap()
});

static FLAG_EQ_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|\s)--?[A-Za-z][A-Za-z0-9:_-]*=("[^"]*"|'[^']*'|[^\s]+)"#).unwrap()
});

static FLAG_SPACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|\s)--?[A-Za-z][A-Za-z0-9:_-]*\s+("[^"]*"|'[^']*'|[^\s"'-][^\s]*)"#).unwrap()
});

static TIMECODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}:\d{2}(?::\d{2})?(?:\.\d+)?\b").unwrap());

static TIMECODE_FULL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}:\d{2}(?::\d{2})?(?:\.\d+)?$").unwrap());

static FILE_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?xi)(?:^|[\s='"])(
              (?:\.{1,2}/|~/|/)[^\s'"]+
            | [^\s'"/=]+\.(?:mp4|avi|mkv|mov|webm|m4v|mp3|wav|flac|aac|ogg
                |jpg|jpeg|png|gif|bmp|svg|webp|txt|md|pdf|rtf|csv|json|xml
                |yaml|yml|toml|log|py|js|ts|rs|go|c|cpp|h|java|sh|tar|zip
                |gz|bz2|xz|7z)\b
        )"#,
    )
    .unwrap()
});

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\b(?:fps|rate|bitrate|size|width|height|scale|quality|count|limit|depth|frame)\b\s*[=: ]\s*|\bn\s*=\s*)(\d+)\b",
    )
    .unwrap()
});

impl Recognizer {
    /// Returns the byte ranges this recognizer claims in `command`, with the
    /// parameter kind assigned to each claim.
    fn claims(&self, command: &str) -> Vec<(usize, usize, ParameterKind)> {
        match self {
            Recognizer::Placeholder => PLACEHOLDER_RE
                .find_iter(command)
                .map(|m| (m.start(), m.end(), ParameterKind::Placeholder))
                .collect(),
            Recognizer::FlagValue => {
                let mut claims = Vec::new();
                for re in [&*FLAG_EQ_RE, &*FLAG_SPACE_RE] {
                    for caps in re.captures_iter(command) {
                        if let Some(value) = caps.get(1) {
                            let (start, end) = strip_quotes(command, value.start(), value.end());
                            let kind = refine_flag_value(&command[start..end]);
                            claims.push((start, end, kind));
                        }
                    }
                }
                claims
            }
            Recognizer::TimeCode => TIMECODE_RE
                .find_iter(command)
                .map(|m| (m.start(), m.end(), ParameterKind::TimeCode))
                .collect(),
            Recognizer::FilePath => FILE_PATH_RE
                .captures_iter(command)
                .filter_map(|caps| caps.get(1))
                .map(|m| (m.start(), m.end(), ParameterKind::FilePath))
                .collect(),
            Recognizer::Numeric => NUMERIC_RE
                .captures_iter(command)
                .filter_map(|caps| caps.get(1))
                .map(|m| (m.start(), m.end(), ParameterKind::Numeric))
                .collect(),
        }
    }
}

/// Narrows a claimed flag value to the inner content when quoted.
fn strip_quotes(command: &str, start: usize, end: usize) -> (usize, usize) {
    let value = &command[start..end];
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        (start + 1, end - 1)
    } else {
        (start, end)
    }
}

/// A flag value that is itself a time code or file path keeps the more
/// specific kind; everything else stays `FlagValue`.
fn refine_flag_value(value: &str) -> ParameterKind {
    if TIMECODE_FULL_RE.is_match(value) {
        ParameterKind::TimeCode
    } else if value.contains('/') || FILE_PATH_RE.is_match(&format!(" {value}")) {
        ParameterKind::FilePath
    } else {
        ParameterKind::FlagValue
    }
}

/// Parameter detector with a configurable recognizer priority.
///
/// The default order is a heuristic, not a contract; callers with better
/// knowledge of their command domain can reorder or drop recognizers.
pub struct Detector {
    order: Vec<Recognizer>,
}

impl Default for Detector {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER.to_vec(),
        }
    }
}

impl Detector {
    /// Creates a detector with a custom recognizer priority.
    pub fn with_order(order: &[Recognizer]) -> Self {
        Self {
            order: order.to_vec(),
        }
    }

    /// Decomposes `command` into ordered, contiguous, exhaustive spans.
    ///
    /// Total: every input yields at least one span, and the concatenation
    /// of span texts always reconstructs the input exactly. Recognizers are
    /// applied in priority order; an earlier recognizer's claim blocks any
    /// later overlapping claim. Unclaimed stretches become literal spans.
    pub fn detect(&self, command: &str) -> Vec<Span> {
        let mut claims: Vec<(usize, usize, ParameterKind)> = Vec::new();

        for recognizer in &self.order {
            for (start, end, kind) in recognizer.claims(command) {
                if start == end {
                    continue;
                }
                let overlaps = claims.iter().any(|&(s, e, _)| start < e && end > s);
                if !overlaps {
                    claims.push((start, end, kind));
                }
            }
        }

        claims.sort_by_key(|&(start, _, _)| start);

        let mut spans = Vec::new();
        let mut cursor = 0;
        for (start, end, kind) in claims {
            if start > cursor {
                spans.push(Span {
                    kind: SpanKind::Literal,
                    text: command[cursor..start].to_string(),
                    start: cursor,
                    end: start,
                });
            }
            spans.push(Span {
                kind: SpanKind::Parameter(kind),
                text: command[start..end].to_string(),
                start,
                end,
            });
            cursor = end;
        }

        if cursor < command.len() || spans.is_empty() {
            spans.push(Span {
                kind: SpanKind::Literal,
                text: command[cursor..].to_string(),
                start: cursor,
                end: command.len(),
            });
        }

        spans
    }
}

/// Detects spans with the default recognizer priority.
pub fn detect(command: &str) -> Vec<Span> {
    Detector::default().detect(command)
}

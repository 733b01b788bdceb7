//! Reply parsing - from raw completion text to a runnable script
//!
//! Models are unreliable about fencing conventions: missing closes, stray
//! language tags, code double-encoded as a JSON string. The parser is liberal
//! about all of that, but nothing reaches the executor without passing a
//! parse-only Python syntax check first.

use rustpython_parser::{parse, Mode};

/// The 3-character fence delimiter
const FENCE: &str = "```";

/// Language tag models commonly leave after the opening fence
const LANGUAGE_TAG: &str = "python";

/// The outcome of parsing one completion.
///
/// A reply with no runnable script is still `Ok` - absence of a fence is not
/// a failure. `Invalid` means a fenced block was present but did not survive
/// validation, so there is nothing to run and the message says why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReply {
    /// Display message plus a syntax-checked script; `script` is empty when
    /// the reply contained no code block
    Ok { message: String, script: String },
    /// The fenced block failed validation; only the explanation remains
    Invalid { message: String },
}

impl ParsedReply {
    /// The text to show the user
    pub fn message(&self) -> &str {
        match self {
            ParsedReply::Ok { message, .. } => message,
            ParsedReply::Invalid { message } => message,
        }
    }

    /// The validated script, if there is anything to run
    pub fn script(&self) -> Option<&str> {
        match self {
            ParsedReply::Ok { script, .. } if !script.is_empty() => Some(script),
            _ => None,
        }
    }

    pub fn has_script(&self) -> bool {
        self.script().is_some()
    }

    /// Decompose into `(message, script)`; an invalid reply has an empty script
    pub fn into_parts(self) -> (String, String) {
        match self {
            ParsedReply::Ok { message, script } => (message, script),
            ParsedReply::Invalid { message } => (message, String::new()),
        }
    }
}

/// Split a completion into a message and a validated script.
///
/// Deterministic and side-effect free; every failure mode is expressed in the
/// returned value. The steps:
///
/// 1. Fewer than two fence delimiters means no script: the reply is the
///    message, unchanged.
/// 2. The first and last fence are the true pair. Everything outside them
///    joins (with a line break) into the message; interior segments are
///    rejoined with the delimiter so fences nested in the script body survive.
/// 3. A leading `python`/`python3` tag (any case, glued to the code or not)
///    is stripped.
/// 4. A script that decodes as a single JSON string is replaced by the
///    decoded value - some models wrap code in an extra JSON layer.
/// 5. The result must parse as a Python module. A syntax error demotes the
///    whole reply to `Invalid` with the parser's explanation.
pub fn parse_reply(response: &str) -> ParsedReply {
    if response.matches(FENCE).count() < 2 {
        return ParsedReply::Ok {
            message: response.to_string(),
            script: String::new(),
        };
    }

    let segments: Vec<&str> = response.split(FENCE).collect();
    let message = format!("{}\n{}", segments[0], segments[segments.len() - 1]);
    let script = segments[1..segments.len() - 1].join(FENCE);
    let script = strip_language_tag(script.trim());

    let script = match serde_json::from_str::<String>(script) {
        Ok(decoded) => decoded,
        Err(_) => script.to_string(),
    };

    match parse(&script, Mode::Module, "<reply>") {
        Ok(_) => ParsedReply::Ok { message, script },
        Err(err) => ParsedReply::Invalid {
            message: format!("Script contains invalid Python:\n{}", err),
        },
    }
}

/// Strip a leading `python` tag, optional trailing digits, and the whitespace
/// after it. Case-insensitive, and tolerant of the tag being glued straight
/// onto the first statement.
fn strip_language_tag(script: &str) -> &str {
    let Some(prefix) = script.get(..LANGUAGE_TAG.len()) else {
        return script;
    };
    if !prefix.eq_ignore_ascii_case(LANGUAGE_TAG) {
        return script;
    }

    let rest = &script[LANGUAGE_TAG.len()..];
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    rest.trim_start()
}

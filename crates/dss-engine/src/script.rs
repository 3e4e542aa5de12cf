//! Minimal reader for engine scripting commands.
//!
//! Covers the command shapes dsstap itself issues (`New`, `Edit`, `Set`,
//! `Redirect`, `Compile`, `Export`, `Clear`) so that in-process backends can
//! interpret them. Anything else is returned as [`Command::Other`].

use crate::error::{EngineError, EngineResult};
use dss_core::ElementRef;

/// One parsed command line.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    New {
        target: ElementRef,
        props: Vec<(String, String)>,
    },
    Edit {
        target: ElementRef,
        props: Vec<(String, String)>,
    },
    Set {
        props: Vec<(String, String)>,
    },
    Redirect {
        path: String,
    },
    Compile {
        path: String,
    },
    Export {
        what: String,
    },
    Clear,
    Other {
        verb: String,
        args: Vec<String>,
    },
}

/// Split a command line into tokens.
///
/// Whitespace separates tokens except inside quotes (`"..."`, `'...'`) and
/// brackets (`(...)`, `[...]`, `{...}`). Quotes are dropped; brackets are
/// kept so that array values survive untouched.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for ch in line.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '(' | '[' | '{' => {
                    depth += 1;
                    current.push(ch);
                }
                ')' | ']' | '}' => {
                    depth = depth.saturating_sub(1);
                    current.push(ch);
                }
                c if c.is_whitespace() && depth == 0 => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                c => current.push(c),
            },
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Split `key=value` tokens. A token without `=` is kept with an empty value.
fn key_values(tokens: &[String]) -> Vec<(String, String)> {
    tokens
        .iter()
        .map(|t| match t.split_once('=') {
            Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
            None => (t.clone(), String::new()),
        })
        .collect()
}

fn target(line: &str, token: Option<&String>) -> EngineResult<ElementRef> {
    let raw = token.ok_or_else(|| EngineError::Command {
        command: line.to_string(),
        message: "missing element name".to_string(),
    })?;
    let raw = raw.strip_prefix("object=").unwrap_or(raw);
    ElementRef::parse_full_name(raw).map_err(|e| EngineError::Command {
        command: line.to_string(),
        message: e.to_string(),
    })
}

fn path_arg(line: &str, tokens: &[String]) -> EngineResult<String> {
    tokens.get(1).cloned().ok_or_else(|| EngineError::Command {
        command: line.to_string(),
        message: "missing file name".to_string(),
    })
}

/// Parse one command line.
pub fn parse_command(line: &str) -> EngineResult<Command> {
    let tokens = tokenize(line);
    let Some(verb) = tokens.first() else {
        return Err(EngineError::Command {
            command: line.to_string(),
            message: "empty command".to_string(),
        });
    };

    let cmd = match verb.to_ascii_lowercase().as_str() {
        "new" => Command::New {
            target: target(line, tokens.get(1))?,
            props: key_values(&tokens[2..]),
        },
        "edit" => Command::Edit {
            target: target(line, tokens.get(1))?,
            props: key_values(&tokens[2..]),
        },
        "set" => Command::Set {
            props: key_values(&tokens[1..]),
        },
        "redirect" => Command::Redirect {
            path: path_arg(line, &tokens)?,
        },
        "compile" => Command::Compile {
            path: path_arg(line, &tokens)?,
        },
        "export" => Command::Export {
            what: tokens.get(1).cloned().unwrap_or_default(),
        },
        "clear" => Command::Clear,
        _ => Command::Other {
            verb: verb.clone(),
            args: tokens[1..].to_vec(),
        },
    };
    Ok(cmd)
}

//! Outbound command encoding.
//!
//! Three forms go down the same newline-terminated stdin transport: raw
//! user input, internal commands (annotated so the interactive surface
//! can tell them apart), and remote function invocations. A remote call
//! serializes its arguments as JSON and base64-encodes them so the whole
//! invocation survives as a single line with no unescaped control
//! characters; the literal syntax is what the debugger-side script
//! expects and must not change unilaterally.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::Serialize;

use crate::error::CoreError;

/// One encoded outbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The line to write to the subprocess (newline appended by transport).
    pub line: String,
    /// Annotation for the interactive surface, if this is not user input.
    pub annotation: Option<String>,
}

/// Encode a user-typed command: verbatim passthrough.
pub fn user_command(text: impl Into<String>) -> Command {
    Command {
        line: text.into(),
        annotation: None,
    }
}

/// Encode a system-issued debugger command.
pub fn internal_command(command: impl Into<String>) -> Command {
    let line = command.into();
    let annotation = format!("Internal Command: {line}");
    Command {
        line,
        annotation: Some(annotation),
    }
}

/// Encode an invocation of a function in the debugger-side script.
///
/// # Errors
///
/// [`CoreError::EncodeFailed`] when `args` cannot be serialized.
pub fn remote_call<T: Serialize>(name: &str, args: &T) -> Result<Command, CoreError> {
    let json = serde_json::to_string(args).map_err(|e| CoreError::EncodeFailed {
        function: name.to_string(),
        message: e.to_string(),
    })?;
    let encoded = BASE64_STANDARD.encode(json.as_bytes());
    Ok(Command {
        line: format!("python invoke_function_from_vscode(\"{name}\", \"{encoded}\")"),
        annotation: Some(format!("Internal Python Call: {name}")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn user_command_is_verbatim() {
        let cmd = user_command("break main");
        assert_eq!(cmd.line, "break main");
        assert!(cmd.annotation.is_none());
    }

    #[test]
    fn internal_command_carries_annotation() {
        let cmd = internal_command("file /tmp/a.out");
        assert_eq!(cmd.line, "file /tmp/a.out");
        assert_eq!(
            cmd.annotation.as_deref(),
            Some("Internal Command: file /tmp/a.out")
        );
    }

    #[test]
    fn remote_call_literal_syntax() {
        #[derive(Serialize)]
        struct Empty {}
        let cmd = remote_call("request_current_position", &Empty {}).unwrap();
        let encoded = BASE64_STANDARD.encode(b"{}");
        assert_eq!(
            cmd.line,
            format!("python invoke_function_from_vscode(\"request_current_position\", \"{encoded}\")")
        );
        assert_eq!(
            cmd.annotation.as_deref(),
            Some("Internal Python Call: request_current_position")
        );
    }

    #[test]
    fn remote_call_round_trips_arguments() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Args {
            expression: String,
        }
        let args = Args {
            expression: "buffer->len".into(),
        };
        let cmd = remote_call("request_hover_value", &args).unwrap();

        // Extract the base64 blob back out of the command line.
        let start = cmd.line.rfind(", \"").unwrap() + 3;
        let end = cmd.line.rfind("\")").unwrap();
        let decoded = BASE64_STANDARD.decode(&cmd.line[start..end]).unwrap();
        let round_tripped: Args = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(round_tripped, args);
    }

    #[test]
    fn remote_call_is_single_line_for_any_arguments() {
        #[derive(Serialize)]
        struct Tricky {
            text: String,
        }
        let args = Tricky {
            text: "line one\nline \"two\"\ttabbed".into(),
        };
        let cmd = remote_call("request_hover_value", &args).unwrap();
        assert!(!cmd.line.contains('\n'));
        assert!(!cmd.line.contains('\t'));
    }
}

//! Human-readable error descriptions and structured JSON error formatting.

use liftctl_core::{BuildError, EngineError};

/// Map an eyre::Report to a human-readable explanation with likely causes
/// and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingLink => {
                "What happened: No machine link was provided to the session engine.\nLikely causes: The link failed to initialize or was not wired into the builder.\nHow to fix: Ensure the link is created successfully and passed via with_link(...).".to_string()
            }
            BuildError::MissingStore => {
                "What happened: No session store was provided to the session engine.\nLikely causes: The store failed to open or was not wired into the builder.\nHow to fix: Ensure the store opens successfully and is passed via with_store(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See README for a sample."
            ),
        };
    }

    if let Some(ee) = err.downcast_ref::<EngineError>() {
        return match ee {
            EngineError::Timeout => {
                "What happened: The telemetry feed went silent.\nLikely causes: The machine powered off mid-session or the link dropped.\nHow to fix: Check the machine and raise feed.read_timeout_ms in the config if the link is just slow.".to_string()
            }
            EngineError::Link(msg) | EngineError::LinkFault(msg) => format!(
                "What happened: The machine rejected or lost a command ({msg}).\nLikely causes: Link interference, or commands sent faster than the device can take them.\nHow to fix: Retry; if it recurs, raise session.command_gap_ms in the config."
            ),
            EngineError::State(msg) => format!(
                "What happened: The requested action is not valid right now ({msg}).\nLikely causes: A stop or start raced with the machine's own state change.\nHow to fix: Wait for the current transition to finish and try again."
            ),
            EngineError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nHow to fix: Edit the config file, then rerun."
            ),
            EngineError::Io(msg) => format!(
                "What happened: A file operation failed ({msg}).\nHow to fix: Check paths and permissions, then rerun."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config. The
    // whole chain is scanned so wrap_err context never hides a root cause,
    // and the parse-error branch keys on the toml crate's own message rather
    // than a substring any *.toml file path would satisfy.
    let chain = err
        .chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ");
    let lower = chain.to_ascii_lowercase();

    if lower.contains("routine") && (lower.contains("no exercises") || lower.contains("no sets")) {
        return "What happened: The routine file is structurally empty.\nLikely causes: Missing [[exercise]] tables or an empty reps list.\nHow to fix: Every routine needs at least one exercise with at least one set.".to_string();
    }

    if lower.contains("toml parse error")
        || lower.contains("missing field")
        || lower.contains("invalid type")
    {
        return format!(
            "What happened: A TOML file failed to parse.\nHow to fix: Fix the syntax and rerun. Original: {chain}"
        );
    }

    // Generic fallback carries every cause in the chain.
    format!(
        "Something went wrong: {chain}\nHow to fix: Re-run with --log-level=debug for details."
    )
}

/// Map typed errors to stable exit codes; generic errors return 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    if let Some(ee) = err.downcast_ref::<EngineError>() {
        return match ee {
            EngineError::Config(_) => 2,
            EngineError::Link(_) | EngineError::LinkFault(_) => 3,
            EngineError::Timeout => 4,
            EngineError::State(_) => 5,
            EngineError::Io(_) => 6,
        };
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = if let Some(ee) = err.downcast_ref::<EngineError>() {
        match ee {
            EngineError::Config(_) => "Config",
            EngineError::Link(_) => "Link",
            EngineError::LinkFault(_) => "LinkFault",
            EngineError::Timeout => "Timeout",
            EngineError::State(_) => "State",
            EngineError::Io(_) => "Io",
        }
    } else if err.downcast_ref::<BuildError>().is_some() {
        "Build"
    } else {
        "Error"
    };
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_stable_codes() {
        let timeout: eyre::Report = EngineError::Timeout.into();
        assert_eq!(exit_code_for_error(&timeout), 4);
        let state: eyre::Report = EngineError::State("paused".into()).into();
        assert_eq!(exit_code_for_error(&state), 5);
        let generic = eyre::eyre!("something else");
        assert_eq!(exit_code_for_error(&generic), 1);
    }

    #[test]
    fn wrapped_validation_errors_surface_the_root_cause() {
        use eyre::WrapErr;
        let err = Err::<(), _>(eyre::eyre!("auto_stop.stall_high must be > stall_low"))
            .wrap_err("validating config /tmp/etc/liftctl.toml")
            .unwrap_err();
        let msg = humanize(&err);
        // The path ends in .toml but this is not a parse failure, and the
        // offending field must survive the context wrapping.
        assert!(msg.contains("stall_high must be > stall_low"));
        assert!(!msg.contains("failed to parse"));
    }

    #[test]
    fn json_errors_carry_a_reason() {
        let err: eyre::Report = EngineError::Timeout.into();
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Timeout");
        assert!(v["message"].as_str().unwrap().contains("telemetry feed"));
    }
}

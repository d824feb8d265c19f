//! `${VAR}` interpolation for configuration files (spec §6: "provider
//! credentials (environment-variable interpolation permitted with
//! `${VAR}`)"). Applied to every string value in `providers/*.yaml` and
//! `servers/*.yaml` after parsing, so the YAML documents themselves never
//! carry secrets.

use std::sync::OnceLock;

use regex::Regex;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap())
}

/// Replaces every `${VAR}` occurrence in `input` with the value of the
/// named environment variable. A reference to an unset variable is left
/// as an empty string rather than failing the whole document — an empty
/// API key surfaces as an authentication error at call time, which is
/// easier to diagnose than a config-load failure naming an env var the
/// operator may not control.
pub fn interpolate(input: &str) -> String {
    pattern()
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_a_set_variable() {
        std::env::set_var("CONDUIT_TEST_VAR_A", "secret-value");
        assert_eq!(interpolate("Bearer ${CONDUIT_TEST_VAR_A}"), "Bearer secret-value");
        std::env::remove_var("CONDUIT_TEST_VAR_A");
    }

    #[test]
    fn leaves_unset_variables_empty() {
        std::env::remove_var("CONDUIT_TEST_VAR_UNSET");
        assert_eq!(interpolate("${CONDUIT_TEST_VAR_UNSET}"), "");
    }

    #[test]
    fn passes_through_plain_strings() {
        assert_eq!(interpolate("plain-model-name"), "plain-model-name");
    }
}

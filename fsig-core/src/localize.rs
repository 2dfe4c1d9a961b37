use fluent_bundle::{FluentArgs, FluentBundle, FluentResource, FluentValue};
use unic_langid::LanguageIdentifier;

use crate::verify::Mismatch;

/// Fluent-based localizer for report lines, with built-in resources.
pub struct FluentLoc {
    bundle: FluentBundle<FluentResource>,
}

impl FluentLoc {
    /// Create a localizer using built-in `.ftl` strings (see ../i18n).
    pub fn builtin(lang: &str) -> Self {
        let langid: LanguageIdentifier =
            lang.parse().or_else(|_| "en-GB".parse()).unwrap_or_default();

        // en-GB is the only bundled locale; every language reads it.
        let ftl_src = include_str!("../i18n/en-GB.ftl");

        // A parse error still yields every message that did parse.
        let res = FluentResource::try_new(ftl_src.to_owned()).unwrap_or_else(|(res, errs)| {
            tracing::warn!(errors = errs.len(), "built-in FTL resource has parse errors");
            res
        });

        let mut bundle = FluentBundle::new(vec![langid]);
        // Report lines are plain terminal text; no bidi isolation marks.
        bundle.set_use_isolating(false);
        if let Err(errs) = bundle.add_resource(res) {
            tracing::warn!(errors = errs.len(), "duplicate messages in FTL resource");
        }
        Self { bundle }
    }

    /// Format a message by code with named args (("name","value"), ...).
    /// Returns the code itself if not found.
    pub fn msg(&self, code: &str, args: &[(&str, &str)]) -> String {
        let Some(msg) = self.bundle.get_message(code) else {
            return code.to_string();
        };
        let Some(pattern) = msg.value() else {
            return code.to_string();
        };

        let mut fa = FluentArgs::new();
        for (k, v) in args {
            fa.set(*k, FluentValue::from(*v));
        }

        let mut errs = vec![];
        let s = self.bundle.format_pattern(pattern, Some(&fa), &mut errs).to_string();

        if errs.is_empty() {
            s
        } else {
            code.to_string()
        }
    }

    /// Human wording for a failed comparison.
    pub fn mismatch(&self, m: &Mismatch) -> String {
        match m {
            Mismatch::Digest => self.msg("reason-digest", &[]),
            Mismatch::Size { expected, found } => {
                let (expected, found) = (expected.to_string(), found.to_string());
                self.msg("reason-size", &[("expected", expected.as_str()), ("found", found.as_str())])
            }
        }
    }
}

impl Default for FluentLoc {
    fn default() -> Self {
        Self::builtin("en-GB")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_without_isolation_marks() {
        let loc = FluentLoc::default();
        assert_eq!(
            loc.msg("summary-passing", &[("passed", "2"), ("total", "3")]),
            "Files passing integrity test: 2 / 3"
        );
    }

    #[test]
    fn unknown_code_falls_back_to_code() {
        let loc = FluentLoc::builtin("xx-unknown");
        assert_eq!(loc.msg("no-such-message", &[]), "no-such-message");
    }

    #[test]
    fn every_report_message_is_bundled() {
        let loc = FluentLoc::default();
        for code in [
            "integrity-passed",
            "integrity-failed-reason",
            "summary-header",
            "summary-passing",
            "signed-count",
            "sign-failed",
            "compare-equal",
            "compare-differ",
            "match-found",
            "search-skipped",
            "search-done",
            "reason-digest",
            "reason-size",
        ] {
            assert!(loc.bundle.get_message(code).is_some(), "{code} missing");
        }
        assert!(loc.bundle.get_message("integrity-failed").is_none());
    }

    #[test]
    fn size_mismatch_wording() {
        let loc = FluentLoc::default();
        let s = loc.mismatch(&Mismatch::Size { expected: 5, found: 6 });
        assert_eq!(s, "size mismatch: expected 5 bytes, found 6");
    }
}

//! Where a field's raw input comes from. Most fields slice the line; some
//! are constants stamped with job context tokens; some carry the shared job
//! timestamp. Only sliced input goes on to a field parser, so the variants
//! are kept apart instead of flattened into one string.

use crate::layout::FieldSpec;
use crate::parser::ImportContext;
use crate::slice::slice;
use chrono::{DateTime, FixedOffset, Local};
use regex::{NoExpand, Regex};

lazy_static! {
    static ref BATCH_TOKEN: Regex = Regex::new(r"(?i)\$\{batchid\}").unwrap();
    static ref SOURCE_TOKEN: Regex = Regex::new(r"(?i)\$\{sourcesystem\}").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Fixed-width slice; runs through the type-dispatched field parser.
    Sliced(String),
    /// Constant text, tokens already substituted; taken verbatim.
    Constant(String),
    /// The shared job timestamp; taken verbatim.
    Timestamp(DateTime<FixedOffset>),
}

/// Resolve the raw input for one field. Unrecognized `source` tags behave as
/// fixed-width.
pub fn resolve(line: &str, spec: &FieldSpec, ctx: &ImportContext) -> RawValue {
    match spec.option("source") {
        Some(tag) if tag.eq_ignore_ascii_case("constant") => {
            let template = spec.option("constantValue").unwrap_or("");
            RawValue::Constant(substitute_tokens(template, ctx))
        }
        Some(tag) if tag.eq_ignore_ascii_case("now") => {
            let local = spec
                .option("nowKind")
                .map_or(false, |k| k.eq_ignore_ascii_case("local"));
            let stamp = if local {
                ctx.imported_at_utc.with_timezone(&Local).fixed_offset()
            } else {
                ctx.imported_at_utc.fixed_offset()
            };
            RawValue::Timestamp(stamp)
        }
        _ => RawValue::Sliced(slice(line, spec.start_index(), spec.length)),
    }
}

fn substitute_tokens(template: &str, ctx: &ImportContext) -> String {
    let text = BATCH_TOKEN.replace_all(template, NoExpand(ctx.batch_id.as_str()));
    SOURCE_TOKEN
        .replace_all(&text, NoExpand(ctx.source_system.as_str()))
        .into_owned()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layout::{FieldKind, FieldSpec};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn ctx() -> ImportContext {
        ImportContext {
            imported_at_utc: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            source_system: "MAINFRAME-A".to_string(),
            batch_id: "B42".to_string(),
        }
    }

    fn field(options: &[(&str, &str)]) -> FieldSpec {
        FieldSpec {
            name: "probe".to_string(),
            target: "probe".to_string(),
            start: 2,
            length: 3,
            kind: FieldKind::String,
            options: options
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_default_is_fixed_width() {
        let raw = resolve("ABCDEF", &field(&[]), &ctx());
        assert_eq!(raw, RawValue::Sliced("BCD".to_string()));
    }

    #[test]
    fn test_unknown_source_tag_is_fixed_width() {
        let raw = resolve("ABCDEF", &field(&[("source", "mystery")]), &ctx());
        assert_eq!(raw, RawValue::Sliced("BCD".to_string()));
    }

    #[test]
    fn test_constant_with_tokens() {
        let spec = field(&[
            ("source", "constant"),
            ("constantValue", "${BatchId}-X"),
        ]);
        assert_eq!(
            resolve("", &spec, &ctx()),
            RawValue::Constant("B42-X".to_string())
        );
    }

    #[test]
    fn test_token_match_is_case_insensitive() {
        let spec = field(&[
            ("source", "constant"),
            ("constantValue", "${BATCHID}/${sourcesystem}"),
        ]);
        assert_eq!(
            resolve("", &spec, &ctx()),
            RawValue::Constant("B42/MAINFRAME-A".to_string())
        );
    }

    #[test]
    fn test_now_source_carries_job_timestamp() {
        let spec = field(&[("source", "now")]);
        match resolve("", &spec, &ctx()) {
            RawValue::Timestamp(ts) => {
                assert_eq!(ts.to_rfc3339(), "2024-06-01T12:00:00+00:00");
            }
            raw => panic!("unexpected raw value {:?}", raw),
        }
    }
}

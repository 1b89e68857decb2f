//! The five typed field parsers. Each takes the already-sliced fixed-width
//! text plus the field spec and the layout rules, and produces a [`Value`]
//! (`Null` when the field is semantically absent) or a record error when the
//! field is present but malformed. Per-field options override the rule-level
//! defaults.

use crate::error::{ErrorKind, Result};
use crate::layout::{
    AllZerosBehavior, BooleanRules, BooleanSpacesBehavior, DateRules, FieldKind, FieldSpec,
    IntegerRules, NumericRules, ParsingRules, StringRules, StringSpacesBehavior,
};
use crate::overpunch;
use crate::slice::{
    apply_case, apply_trim, collapse_spaces, is_all_spaces, is_all_zeros, CaseMode, TrimMode,
};
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Formats tried after the configured ones have all failed. The original
/// implementation fell back to a permissive locale parse here; a fixed
/// invariant list keeps the accepted shapes enumerable.
const FALLBACK_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y"];

/// Type-dispatched entry point for one sliced field.
pub fn parse_field(raw: &str, spec: &FieldSpec, rules: &ParsingRules) -> Result<Value> {
    match spec.kind {
        FieldKind::Date => parse_date(raw, spec, &rules.date),
        FieldKind::Numeric => parse_numeric(raw, spec, &rules.numeric),
        FieldKind::Integer => parse_integer(raw, spec, &rules.integer),
        FieldKind::String => parse_string(raw, spec, &rules.string),
        FieldKind::Boolean => parse_boolean(raw, spec, &rules.boolean),
    }
}

/// Try each format in order; first match wins.
pub fn try_parse_exact_date<S: AsRef<str>>(s: &str, formats: &[S]) -> Option<NaiveDate> {
    formats
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f.as_ref()).ok())
}

fn parse_date(raw: &str, spec: &FieldSpec, rules: &DateRules) -> Result<Value> {
    let field_formats: Option<Vec<String>> = spec
        .option("formats")
        .map(|v| v.split('|').map(String::from).collect());

    if rules.treat_all_spaces_as_null && is_all_spaces(raw) {
        return Ok(Value::Null);
    }
    let collapsed = collapse_spaces(raw);
    if collapsed.is_empty() {
        return Ok(Value::Null);
    }
    if rules.treat_all_zeros_as_null && is_all_zeros(&collapsed) {
        return Ok(Value::Null);
    }

    let parsed = match &field_formats {
        Some(formats) => try_parse_exact_date(&collapsed, formats),
        None => try_parse_exact_date(&collapsed, &rules.formats),
    };
    if let Some(date) = parsed {
        return Ok(Value::Date(date));
    }
    if let Some(date) = try_parse_exact_date(&collapsed, FALLBACK_DATE_FORMATS) {
        return Ok(Value::Date(date));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(&collapsed, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Value::Date(dt.date()));
    }
    Err(ErrorKind::BadDate {
        field: spec.name.clone(),
        raw: raw.to_string(),
    }
    .into())
}

fn parse_numeric(raw: &str, spec: &FieldSpec, rules: &NumericRules) -> Result<Value> {
    let allow_overpunch = bool_option(spec, "allowOverpunch", rules.allow_overpunch)?;
    let spaces_as_null =
        bool_option(spec, "treatAllSpacesAsNull", rules.treat_all_spaces_as_null)?;
    let zeros_behavior = zeros_option(spec, rules.all_zeros_behavior)?;
    let implied_places = i32_option(
        spec,
        "impliedDecimalPlaces",
        rules.default_implied_decimal_places,
    )?;

    if spaces_as_null && is_all_spaces(raw) {
        return Ok(Value::Null);
    }
    if is_all_zeros(raw) {
        return Ok(match zeros_behavior {
            AllZerosBehavior::Null => Value::Null,
            AllZerosBehavior::Zero => Value::Decimal(Decimal::new(0, 0)),
        });
    }

    let mut text = collapse_spaces(raw);
    if text.is_empty() {
        return Ok(Value::Null);
    }

    let mut sign: i64 = 1;
    if text.starts_with('+') || text.starts_with('-') {
        if text.starts_with('-') {
            sign = -1;
        }
        text.remove(0);
    }

    if allow_overpunch {
        if let Some(last) = text.chars().last() {
            if let Some((digit, punch_sign)) = overpunch::decode(last) {
                text.pop();
                text.push((b'0' + digit) as char);
                sign *= i64::from(punch_sign);
            }
        }
    }

    let bad = || -> crate::error::Error {
        ErrorKind::BadNumber {
            field: spec.name.clone(),
            raw: raw.to_string(),
        }
        .into()
    };

    if text.contains('.') {
        let mut value = Decimal::from_str(&text).map_err(|_| bad())?;
        if sign < 0 {
            value = -value;
        }
        return Ok(Value::Decimal(value));
    }

    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Ok(Value::Null);
    }
    // Decimal carries 96 bits of magnitude; anything longer cannot round-trip.
    if digits.len() > 28 {
        return Err(bad());
    }
    let magnitude: i128 = digits.parse().map_err(|_| bad())?;
    // Zero or negative implied places means no division.
    let scale = implied_places.max(0) as u32;
    let mut value = Decimal::from_i128_with_scale(magnitude, scale);
    if sign < 0 {
        value = -value;
    }
    Ok(Value::Decimal(value))
}

fn parse_integer(raw: &str, spec: &FieldSpec, rules: &IntegerRules) -> Result<Value> {
    let spaces_as_null =
        bool_option(spec, "treatAllSpacesAsNull", rules.treat_all_spaces_as_null)?;
    let zeros_behavior = zeros_option(spec, rules.all_zeros_behavior)?;

    if spaces_as_null && is_all_spaces(raw) {
        return Ok(Value::Null);
    }
    if is_all_zeros(raw) {
        return Ok(match zeros_behavior {
            AllZerosBehavior::Null => Value::Null,
            AllZerosBehavior::Zero => Value::Integer(0),
        });
    }

    let mut text = collapse_spaces(raw);
    if text.is_empty() {
        return Ok(Value::Null);
    }

    let mut sign: i64 = 1;
    if text.starts_with('+') || text.starts_with('-') {
        if text.starts_with('-') {
            sign = -1;
        }
        text.remove(0);
    }

    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Ok(Value::Null);
    }
    if digits.len() > 11 {
        return Err(ErrorKind::IntegerWidth {
            field: spec.name.clone(),
            raw: raw.to_string(),
        }
        .into());
    }
    let magnitude: i64 = digits.parse().map_err(|_| ErrorKind::BadInteger {
        field: spec.name.clone(),
        raw: raw.to_string(),
    })?;
    Ok(Value::Integer(sign * magnitude))
}

fn parse_string(raw: &str, spec: &FieldSpec, rules: &StringRules) -> Result<Value> {
    let trim = spec
        .option("trim")
        .map(TrimMode::from_tag)
        .unwrap_or(rules.default_trim);
    let case = spec
        .option("case")
        .map(CaseMode::from_tag)
        .unwrap_or(rules.case_normalization);
    let spaces_behavior = match spec.option("allSpacesBehavior") {
        Some(tag) => tag
            .parse::<StringSpacesBehavior>()
            .map_err(|_| bad_option(spec, "allSpacesBehavior"))?,
        None => rules.all_spaces_behavior,
    };

    if is_all_spaces(raw) {
        return Ok(match spaces_behavior {
            StringSpacesBehavior::Null => Value::Null,
            StringSpacesBehavior::Empty => Value::Text(String::new()),
            StringSpacesBehavior::Keep => Value::Text(raw.to_string()),
        });
    }

    let mut text = apply_case(&apply_trim(raw, trim), case);

    // Field-level replacements override rule-level ones key by key; the
    // declaration order of both lists is preserved, since chained rules
    // are order-dependent.
    let mut replacements: IndexMap<String, String> = rules.replacements.clone();
    if let Some(pairs) = spec.option("replacements") {
        for pair in pairs.split('|') {
            let mut halves = pair.splitn(2, '=');
            match (halves.next(), halves.next()) {
                (Some(k), Some(v)) if !k.is_empty() => {
                    replacements.insert(k.to_string(), v.to_string());
                }
                _ => return Err(bad_option(spec, "replacements")),
            }
        }
    }
    for (from, to) in &replacements {
        text = text.replace(from.as_str(), to.as_str());
    }
    Ok(Value::Text(text))
}

fn parse_boolean(raw: &str, spec: &FieldSpec, rules: &BooleanRules) -> Result<Value> {
    let any_non_blank =
        bool_option(spec, "anyNonBlankIsTrue", rules.any_non_blank_is_true)?;
    let spaces_behavior = match spec.option("allSpacesBehavior") {
        Some(tag) => tag
            .parse::<BooleanSpacesBehavior>()
            .map_err(|_| bad_option(spec, "allSpacesBehavior"))?,
        None => rules.all_spaces_behavior,
    };
    let field_true: Option<Vec<String>> = spec
        .option("trueValues")
        .map(|v| v.split('|').map(String::from).collect());
    let field_false: Option<Vec<String>> = spec
        .option("falseValues")
        .map(|v| v.split('|').map(String::from).collect());

    if is_all_spaces(raw) {
        return Ok(match spaces_behavior {
            BooleanSpacesBehavior::Null => Value::Null,
            BooleanSpacesBehavior::False => Value::Flag(false),
            BooleanSpacesBehavior::True => Value::Flag(true),
        });
    }

    let text = raw.trim();
    if any_non_blank {
        return Ok(Value::Flag(true));
    }

    let true_values = field_true.as_ref().unwrap_or(&rules.true_values);
    let false_values = field_false.as_ref().unwrap_or(&rules.false_values);
    if true_values.iter().any(|v| v.eq_ignore_ascii_case(text)) {
        return Ok(Value::Flag(true));
    }
    if false_values.iter().any(|v| v.eq_ignore_ascii_case(text)) {
        return Ok(Value::Flag(false));
    }
    Err(ErrorKind::BadBoolean {
        field: spec.name.clone(),
        raw: raw.to_string(),
    }
    .into())
}

fn bad_option(spec: &FieldSpec, option: &str) -> crate::error::Error {
    ErrorKind::BadFieldOption {
        field: spec.name.clone(),
        option: option.to_string(),
    }
    .into()
}

fn bool_option(spec: &FieldSpec, key: &str, default: bool) -> Result<bool> {
    match spec.option(key) {
        None => Ok(default),
        Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
        Some(_) => Err(bad_option(spec, key)),
    }
}

fn i32_option(spec: &FieldSpec, key: &str, default: i32) -> Result<i32> {
    match spec.option(key) {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| bad_option(spec, key)),
    }
}

fn zeros_option(spec: &FieldSpec, default: AllZerosBehavior) -> Result<AllZerosBehavior> {
    match spec.option("allZerosBehavior") {
        None => Ok(default),
        Some(tag) => tag
            .parse()
            .map_err(|_| bad_option(spec, "allZerosBehavior")),
    }
}

//! The layout file: one YAML document per flat-file format, describing the
//! header fields, the repeating `OCCURS` groups and the parsing rules that
//! apply when a field does not override them. Loaded once per job, validated,
//! then shared read-only across every line.
//!
//! Keys are camelCase; unknown keys are ignored so a newer layout can still
//! feed an older importer. Column positions are 1-based in the file and
//! converted to 0-based at the point of use.

use crate::error::{ErrorKind, Result};
use crate::slice::{CaseMode, TrimMode};
use failure::ResultExt;
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    #[serde(default)]
    pub header_fields: Vec<FieldSpec>,
    #[serde(default)]
    pub occurs_groups: Vec<OccursGroupSpec>,
    #[serde(default)]
    pub rules: ParsingRules,
}

impl Layout {
    pub fn from_yaml(text: &str) -> Result<Layout> {
        let layout: Layout =
            serde_yaml::from_str(text).map_err(|err| ErrorKind::Yaml(err.to_string()))?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn from_reader<R: Read>(rdr: R) -> Result<Layout> {
        let layout: Layout =
            serde_yaml::from_reader(rdr).map_err(|err| ErrorKind::Yaml(err.to_string()))?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Layout> {
        let file = File::open(path).with_context(|err| ErrorKind::Io(err.kind()))?;
        Layout::from_reader(file)
    }

    /// Structural validation. Anything caught here is a configuration error
    /// and the job must not start.
    pub fn validate(&self) -> Result<()> {
        for field in &self.header_fields {
            field.validate()?;
        }
        for group in &self.occurs_groups {
            group.validate(&self.header_fields)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    /// Diagnostic name, carried into error messages.
    pub name: String,
    /// Property path on the destination entity.
    pub target: String,
    /// 1-based column.
    #[serde(default = "default_start")]
    pub start: usize,
    #[serde(default)]
    pub length: usize,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl FieldSpec {
    pub fn start_index(&self) -> usize {
        self.start - 1
    }

    /// Option lookup, case-insensitive on the key.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ErrorKind::BadLayout("field with an empty name".to_string()).into());
        }
        if self.target.is_empty() {
            return Err(
                ErrorKind::BadLayout(format!("field `{}` has no target", self.name)).into(),
            );
        }
        if self.start < 1 {
            return Err(ErrorKind::BadLayout(format!(
                "field `{}` starts at column {}, columns are 1-based",
                self.name, self.start
            ))
            .into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum FieldKind {
    Date,
    Numeric,
    Integer,
    String,
    Boolean,
}

impl FromStr for FieldKind {
    type Err = crate::error::Error;
    fn from_str(value: &str) -> Result<FieldKind> {
        match value.to_ascii_lowercase().as_str() {
            "date" => Ok(FieldKind::Date),
            "numeric" => Ok(FieldKind::Numeric),
            "integer" => Ok(FieldKind::Integer),
            "string" => Ok(FieldKind::String),
            "boolean" => Ok(FieldKind::Boolean),
            _ => Err(ErrorKind::BadLayout(format!("unknown field type `{}`", value)).into()),
        }
    }
}

impl TryFrom<String> for FieldKind {
    type Error = crate::error::Error;
    fn try_from(value: String) -> Result<FieldKind> {
        value.parse()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccursGroupSpec {
    pub name: String,
    /// Path to the collection on the parent entity.
    pub parent_collection_target: String,
    /// Registry name of the child entity.
    pub child_entity: String,
    /// 1-based column of the group block within the line.
    pub start: usize,
    /// Total width of the group block.
    pub length: usize,
    /// Fixed width of one repetition.
    pub item_length: usize,
    /// Upper bound on repetitions.
    pub max_items: usize,
    #[serde(rename = "terminationMode", default)]
    pub termination: TerminationMode,
    #[serde(default)]
    pub count_field_target: Option<String>,
    #[serde(default)]
    pub sequence: Option<SequenceSpec>,
    /// Per-item fields; `start` here is relative to the item block.
    #[serde(default)]
    pub item_fields: Vec<FieldSpec>,
}

impl OccursGroupSpec {
    fn validate(&self, header_fields: &[FieldSpec]) -> Result<()> {
        let bad = |reason: String| -> crate::error::Error {
            ErrorKind::BadLayout(format!("occurs group `{}`: {}", self.name, reason)).into()
        };
        if self.parent_collection_target.is_empty() {
            return Err(bad("no parent collection target".to_string()));
        }
        if self.child_entity.is_empty() {
            return Err(bad("no child entity".to_string()));
        }
        if self.start < 1 {
            return Err(bad(format!(
                "starts at column {}, columns are 1-based",
                self.start
            )));
        }
        if self.length == 0 || self.item_length == 0 || self.max_items == 0 {
            return Err(bad("length, itemLength and maxItems must be positive".to_string()));
        }
        if self.item_fields.is_empty() {
            return Err(bad("no item fields".to_string()));
        }
        for field in &self.item_fields {
            field.validate()?;
        }
        if self.termination == TerminationMode::Count {
            let target = match &self.count_field_target {
                Some(t) if !t.is_empty() => t,
                _ => return Err(ErrorKind::MissingCountField(self.name.clone()).into()),
            };
            // The count is read back off the parent after header fields are
            // applied, so it must be the target of one of them.
            if !header_fields.iter().any(|f| f.target == *target) {
                return Err(bad(format!(
                    "count field `{}` is not populated by any header field",
                    target
                )));
            }
        }
        if let Some(sequence) = &self.sequence {
            if sequence.enabled && sequence.target.is_empty() {
                return Err(bad("sequence enabled without a target".to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum TerminationMode {
    /// The group ends at the first all-spaces item block.
    Padding,
    /// A header field on the parent holds the exact item count.
    Count,
}

impl Default for TerminationMode {
    fn default() -> TerminationMode {
        TerminationMode::Padding
    }
}

impl FromStr for TerminationMode {
    type Err = crate::error::Error;
    fn from_str(value: &str) -> Result<TerminationMode> {
        match value.to_ascii_lowercase().as_str() {
            "padding" => Ok(TerminationMode::Padding),
            "count" => Ok(TerminationMode::Count),
            _ => {
                Err(ErrorKind::BadLayout(format!("unknown termination mode `{}`", value)).into())
            }
        }
    }
}

impl TryFrom<String> for TerminationMode {
    type Error = crate::error::Error;
    fn try_from(value: String) -> Result<TerminationMode> {
        value.parse()
    }
}

/// Generated per-item ordinal written onto each child.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceSpec {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub target: String,
    #[serde(default = "default_seq_start")]
    pub start: i64,
    #[serde(default = "default_seq_step")]
    pub step: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsingRules {
    #[serde(default)]
    pub date: DateRules,
    #[serde(default)]
    pub numeric: NumericRules,
    #[serde(default)]
    pub integer: IntegerRules,
    #[serde(default)]
    pub string: StringRules,
    #[serde(default)]
    pub boolean: BooleanRules,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRules {
    /// chrono strftime formats, tried in order.
    #[serde(default = "DateRules::default_formats")]
    pub formats: Vec<String>,
    #[serde(default = "default_true")]
    pub treat_all_zeros_as_null: bool,
    #[serde(default = "default_true")]
    pub treat_all_spaces_as_null: bool,
}

impl DateRules {
    fn default_formats() -> Vec<String> {
        vec!["%Y%m%d".to_string()]
    }
}

impl Default for DateRules {
    fn default() -> DateRules {
        DateRules {
            formats: DateRules::default_formats(),
            treat_all_zeros_as_null: true,
            treat_all_spaces_as_null: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericRules {
    #[serde(default = "default_true")]
    pub allow_overpunch: bool,
    #[serde(default = "default_true")]
    pub treat_all_spaces_as_null: bool,
    #[serde(default)]
    pub all_zeros_behavior: AllZerosBehavior,
    /// Zero or negative means the digits are taken as-is.
    #[serde(default)]
    pub default_implied_decimal_places: i32,
}

impl Default for NumericRules {
    fn default() -> NumericRules {
        NumericRules {
            allow_overpunch: true,
            treat_all_spaces_as_null: true,
            all_zeros_behavior: AllZerosBehavior::Zero,
            default_implied_decimal_places: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegerRules {
    #[serde(default = "default_true")]
    pub treat_all_spaces_as_null: bool,
    #[serde(default)]
    pub all_zeros_behavior: AllZerosBehavior,
}

impl Default for IntegerRules {
    fn default() -> IntegerRules {
        IntegerRules {
            treat_all_spaces_as_null: true,
            all_zeros_behavior: AllZerosBehavior::Zero,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum AllZerosBehavior {
    Null,
    Zero,
}

impl Default for AllZerosBehavior {
    fn default() -> AllZerosBehavior {
        AllZerosBehavior::Zero
    }
}

impl FromStr for AllZerosBehavior {
    type Err = crate::error::Error;
    fn from_str(value: &str) -> Result<AllZerosBehavior> {
        match value.to_ascii_lowercase().as_str() {
            "null" => Ok(AllZerosBehavior::Null),
            "zero" => Ok(AllZerosBehavior::Zero),
            _ => Err(
                ErrorKind::BadLayout(format!("unknown all-zeros behavior `{}`", value)).into(),
            ),
        }
    }
}

impl TryFrom<String> for AllZerosBehavior {
    type Error = crate::error::Error;
    fn try_from(value: String) -> Result<AllZerosBehavior> {
        value.parse()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringRules {
    #[serde(default = "default_trim_both")]
    pub default_trim: TrimMode,
    #[serde(default)]
    pub all_spaces_behavior: StringSpacesBehavior,
    #[serde(default = "default_case_none")]
    pub case_normalization: CaseMode,
    /// Literal substring replacements, applied in declaration order.
    /// Chained rules like `z=a` then `a=z` depend on that order.
    #[serde(default)]
    pub replacements: IndexMap<String, String>,
}

impl Default for StringRules {
    fn default() -> StringRules {
        StringRules {
            default_trim: TrimMode::Both,
            all_spaces_behavior: StringSpacesBehavior::Null,
            case_normalization: CaseMode::None,
            replacements: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum StringSpacesBehavior {
    Null,
    Empty,
    Keep,
}

impl Default for StringSpacesBehavior {
    fn default() -> StringSpacesBehavior {
        StringSpacesBehavior::Null
    }
}

impl FromStr for StringSpacesBehavior {
    type Err = crate::error::Error;
    fn from_str(value: &str) -> Result<StringSpacesBehavior> {
        match value.to_ascii_lowercase().as_str() {
            "null" => Ok(StringSpacesBehavior::Null),
            "empty" => Ok(StringSpacesBehavior::Empty),
            "keep" => Ok(StringSpacesBehavior::Keep),
            _ => Err(
                ErrorKind::BadLayout(format!("unknown all-spaces behavior `{}`", value)).into(),
            ),
        }
    }
}

impl TryFrom<String> for StringSpacesBehavior {
    type Error = crate::error::Error;
    fn try_from(value: String) -> Result<StringSpacesBehavior> {
        value.parse()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanRules {
    #[serde(default = "BooleanRules::default_true_values")]
    pub true_values: Vec<String>,
    #[serde(default = "BooleanRules::default_false_values")]
    pub false_values: Vec<String>,
    #[serde(default)]
    pub any_non_blank_is_true: bool,
    #[serde(default)]
    pub all_spaces_behavior: BooleanSpacesBehavior,
}

impl BooleanRules {
    fn default_true_values() -> Vec<String> {
        vec![
            "Y".to_string(),
            "T".to_string(),
            "1".to_string(),
            "TRUE".to_string(),
        ]
    }

    fn default_false_values() -> Vec<String> {
        vec![
            "N".to_string(),
            "F".to_string(),
            "0".to_string(),
            "FALSE".to_string(),
        ]
    }
}

impl Default for BooleanRules {
    fn default() -> BooleanRules {
        BooleanRules {
            true_values: BooleanRules::default_true_values(),
            false_values: BooleanRules::default_false_values(),
            any_non_blank_is_true: false,
            all_spaces_behavior: BooleanSpacesBehavior::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum BooleanSpacesBehavior {
    Null,
    False,
    True,
}

impl Default for BooleanSpacesBehavior {
    fn default() -> BooleanSpacesBehavior {
        BooleanSpacesBehavior::Null
    }
}

impl FromStr for BooleanSpacesBehavior {
    type Err = crate::error::Error;
    fn from_str(value: &str) -> Result<BooleanSpacesBehavior> {
        match value.to_ascii_lowercase().as_str() {
            "null" => Ok(BooleanSpacesBehavior::Null),
            "false" => Ok(BooleanSpacesBehavior::False),
            "true" => Ok(BooleanSpacesBehavior::True),
            _ => Err(
                ErrorKind::BadLayout(format!("unknown all-spaces behavior `{}`", value)).into(),
            ),
        }
    }
}

impl TryFrom<String> for BooleanSpacesBehavior {
    type Error = crate::error::Error;
    fn try_from(value: String) -> Result<BooleanSpacesBehavior> {
        value.parse()
    }
}

fn default_start() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_seq_start() -> i64 {
    1
}

fn default_seq_step() -> i64 {
    1
}

fn default_trim_both() -> TrimMode {
    TrimMode::Both
}

fn default_case_none() -> CaseMode {
    CaseMode::None
}

#[cfg(test)]
mod test {
    use super::*;

    fn occurs_yaml(termination: &str, count_target: &str) -> String {
        format!(
            r#"
headerFields:
  - name: recordType
    target: recordType
    start: 1
    length: 2
    type: string
  - name: lineCount
    target: lineCount
    start: 3
    length: 2
    type: integer
occursGroups:
  - name: riders
    parentCollectionTarget: riders
    childEntity: Rider
    start: 5
    length: 20
    itemLength: 5
    maxItems: 4
    terminationMode: {}
    countFieldTarget: {}
    itemFields:
      - name: riderCode
        target: riderCode
        start: 1
        length: 5
        type: string
"#,
            termination, count_target
        )
    }

    #[test]
    fn test_minimal_layout_defaults() {
        let layout = Layout::from_yaml(
            r#"
headerFields:
  - name: code
    target: code
    start: 1
    length: 3
    type: string
"#,
        )
        .unwrap();
        assert_eq!(layout.header_fields.len(), 1);
        assert!(layout.occurs_groups.is_empty());
        assert_eq!(layout.rules.date.formats, vec!["%Y%m%d"]);
        assert_eq!(layout.rules.numeric.all_zeros_behavior, AllZerosBehavior::Zero);
        assert_eq!(layout.rules.string.default_trim, TrimMode::Both);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let layout = Layout::from_yaml(
            r#"
formatVersion: 7
headerFields:
  - name: code
    target: code
    start: 1
    length: 3
    type: string
    futureKnob: true
"#,
        );
        assert!(layout.is_ok());
    }

    #[test]
    fn test_unknown_field_type_rejected() {
        let err = Layout::from_yaml(
            r#"
headerFields:
  - name: code
    target: code
    start: 1
    length: 3
    type: varchar
"#,
        )
        .unwrap_err();
        match err.kind() {
            ErrorKind::Yaml(msg) => assert!(msg.contains("unknown field type")),
            k => panic!("unexpected kind {:?}", k),
        }
    }

    #[test]
    fn test_count_group_parses() {
        let layout = Layout::from_yaml(&occurs_yaml("count", "lineCount")).unwrap();
        let group = &layout.occurs_groups[0];
        assert_eq!(group.termination, TerminationMode::Count);
        assert_eq!(group.count_field_target.as_deref(), Some("lineCount"));
    }

    #[test]
    fn test_count_target_must_be_a_header_field() {
        let err = Layout::from_yaml(&occurs_yaml("count", "notThere")).unwrap_err();
        match err.kind() {
            ErrorKind::BadLayout(msg) => assert!(msg.contains("notThere")),
            k => panic!("unexpected kind {:?}", k),
        }
    }

    #[test]
    fn test_zero_item_length_rejected() {
        let yaml = occurs_yaml("padding", "lineCount").replace("itemLength: 5", "itemLength: 0");
        assert!(Layout::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_option_lookup_is_case_insensitive() {
        let mut options = BTreeMap::new();
        options.insert("impliedDecimalPlaces".to_string(), "2".to_string());
        let field = FieldSpec {
            name: "amount".to_string(),
            target: "amount".to_string(),
            start: 1,
            length: 9,
            kind: FieldKind::Numeric,
            options,
        };
        assert_eq!(field.option("implieddecimalplaces"), Some("2"));
        assert_eq!(field.option("missing"), None);
    }
}

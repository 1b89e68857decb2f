//! The record parser: one raw line in, one typed entity out. `parse_single`
//! applies the header fields and stops; `parse_graph` goes on to expand every
//! occurs group into children appended to the parent's collections.
//!
//! The parser holds no mutable state. One `LineParser` can be shared across
//! any number of worker threads feeding it disjoint lines.

use crate::error::{ErrorKind, Result};
use crate::field_parser::parse_field;
use crate::layout::{Layout, OccursGroupSpec, TerminationMode};
use crate::record::{EntityRegistry, Record};
use crate::slice::{is_all_spaces, slice};
use crate::source::{resolve, RawValue};
use crate::value::Value;
use chrono::{DateTime, Utc};
use log::{debug, trace};

/// Job-scoped context, constant across every line of the job. All rows of a
/// batch share one timestamp.
#[derive(Debug, Clone)]
pub struct ImportContext {
    pub imported_at_utc: DateTime<Utc>,
    pub source_system: String,
    pub batch_id: String,
}

impl ImportContext {
    pub fn new(source_system: &str, batch_id: &str) -> ImportContext {
        ImportContext {
            imported_at_utc: Utc::now(),
            source_system: source_system.to_string(),
            batch_id: batch_id.to_string(),
        }
    }
}

pub struct LineParser<'a> {
    layout: &'a Layout,
    registry: &'a EntityRegistry,
    ctx: &'a ImportContext,
}

impl<'a> LineParser<'a> {
    pub fn new(
        layout: &'a Layout,
        registry: &'a EntityRegistry,
        ctx: &'a ImportContext,
    ) -> LineParser<'a> {
        LineParser {
            layout,
            registry,
            ctx,
        }
    }

    /// Parse one line into a flat record. Occurs groups in the layout are
    /// ignored.
    pub fn parse_single<T: Record + Default>(&self, line: &str) -> Result<T> {
        let mut entity = T::default();
        self.apply_header_fields(&mut entity, line)?;
        Ok(entity)
    }

    /// Parse one line into a parent record plus its repeating children.
    pub fn parse_graph<T: Record + Default>(&self, line: &str) -> Result<T> {
        let mut parent = T::default();
        self.apply_header_fields(&mut parent, line)?;
        for group in &self.layout.occurs_groups {
            self.expand_group(&mut parent, line, group)?;
        }
        Ok(parent)
    }

    /// `parse_single` for callers that only know the entity by its registry
    /// name, e.g. an orchestrator walking a manifest.
    pub fn parse_single_dyn(&self, line: &str, entity: &str) -> Result<Box<dyn Record>> {
        let mut record = self.registry.construct(entity)?;
        self.apply_header_fields(record.as_mut(), line)?;
        Ok(record)
    }

    /// `parse_graph` by registry name.
    pub fn parse_graph_dyn(&self, line: &str, entity: &str) -> Result<Box<dyn Record>> {
        let mut parent = self.registry.construct(entity)?;
        self.apply_header_fields(parent.as_mut(), line)?;
        for group in &self.layout.occurs_groups {
            self.expand_group(parent.as_mut(), line, group)?;
        }
        Ok(parent)
    }

    fn apply_header_fields(&self, entity: &mut dyn Record, line: &str) -> Result<()> {
        for spec in &self.layout.header_fields {
            self.apply_field(entity, line, spec)?;
        }
        Ok(())
    }

    fn apply_field(
        &self,
        entity: &mut dyn Record,
        line: &str,
        spec: &crate::layout::FieldSpec,
    ) -> Result<()> {
        let value = match resolve(line, spec, self.ctx) {
            RawValue::Sliced(raw) => parse_field(&raw, spec, &self.layout.rules)?,
            RawValue::Constant(text) => Value::Text(text),
            RawValue::Timestamp(stamp) => Value::Timestamp(stamp),
        };
        trace!("field `{}` -> {} = {}", spec.name, spec.target, value);
        entity.set(&spec.target, value)
    }

    fn expand_group(
        &self,
        parent: &mut dyn Record,
        line: &str,
        group: &OccursGroupSpec,
    ) -> Result<()> {
        let make_child = self.registry.constructor(&group.child_entity)?;
        let block = slice(line, group.start - 1, group.length);
        let items_to_parse = match group.termination {
            TerminationMode::Padding => group.max_items,
            TerminationMode::Count => self.read_count(parent, group)?,
        };
        let bound = group.length.min(group.item_length * group.max_items);

        let mut emitted = 0usize;
        for i in 0..items_to_parse {
            let offset = i * group.item_length;
            if offset >= bound {
                break;
            }
            let item_raw = slice(&block, offset, group.item_length);
            if group.termination == TerminationMode::Padding && is_all_spaces(&item_raw) {
                break;
            }
            let mut child = make_child();
            for spec in &group.item_fields {
                // Item fields slice against the item block; constant and
                // timestamp sources ignore the line entirely.
                self.apply_field(child.as_mut(), &item_raw, spec)?;
            }
            if let Some(sequence) = &group.sequence {
                if sequence.enabled {
                    let ordinal = sequence.start + (i as i64) * sequence.step;
                    child.set(&sequence.target, Value::Integer(ordinal))?;
                }
            }
            parent.append(&group.parent_collection_target, child)?;
            emitted += 1;
        }
        debug!(
            "occurs group `{}`: emitted {} of at most {}",
            group.name, emitted, items_to_parse
        );
        Ok(())
    }

    /// Count termination reads the already-populated count field off the
    /// parent and clamps it to `[0, maxItems]`.
    fn read_count(&self, parent: &dyn Record, group: &OccursGroupSpec) -> Result<usize> {
        let target = match &group.count_field_target {
            Some(t) if !t.is_empty() => t.as_str(),
            _ => return Err(ErrorKind::MissingCountField(group.name.clone()).into()),
        };
        let value = parent
            .get(target)
            .ok_or_else(|| ErrorKind::UnknownTarget(target.to_string()))?;
        let count = match &value {
            Value::Integer(n) => *n,
            Value::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                ErrorKind::BadCountFieldType {
                    group: group.name.clone(),
                    target: target.to_string(),
                }
            })?,
            _ => {
                return Err(ErrorKind::BadCountFieldType {
                    group: group.name.clone(),
                    target: target.to_string(),
                }
                .into())
            }
        };
        Ok(count.max(0).min(group.max_items as i64) as usize)
    }
}

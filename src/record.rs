//! The path-addressable record abstraction the parser writes through.
//!
//! Layouts address destination properties by name (`policyNumber`); entities
//! are plain structs. The [`Record`] trait is the seam between the two: a
//! generated `match` per struct stands in for the reflection the layout
//! format was designed against, so dispatch is static code shared freely
//! across worker threads. The [`flat_record!`] macro writes the impl.

use crate::error::{ErrorKind, Result};
use crate::value::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;

pub trait Record: Any + Debug {
    /// Write a parsed value into the property addressed by `path`.
    fn set(&mut self, path: &str, value: Value) -> Result<()>;

    /// Read a property back out, `None` when no property matches `path`.
    fn get(&self, path: &str) -> Option<Value>;

    /// Append a child record to the collection addressed by `path`.
    fn append(&mut self, path: &str, child: Box<dyn Record>) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// Property names match case-insensitively and ignore underscores, so a
/// layout's `policyNumber` finds a struct's `policy_number`.
pub fn path_matches(path: &str, field: &str) -> bool {
    let mut lhs = path.chars().filter(|c| *c != '_').map(|c| c.to_ascii_lowercase());
    let mut rhs = field.chars().filter(|c| *c != '_').map(|c| c.to_ascii_lowercase());
    loop {
        match (lhs.next(), rhs.next()) {
            (None, None) => return true,
            (Some(a), Some(b)) if a == b => continue,
            _ => return false,
        }
    }
}

type Constructor = fn() -> Box<dyn Record>;

fn construct<T: Record + Default>() -> Box<dyn Record> {
    Box::new(T::default())
}

/// Allow-list of entity names a layout may instantiate. Every `childEntity`
/// (and the job's own entity in dynamic mode) must be registered up front;
/// anything else is a configuration error, never a silent fallthrough.
#[derive(Default)]
pub struct EntityRegistry {
    entries: HashMap<String, Constructor>,
}

impl EntityRegistry {
    pub fn new() -> EntityRegistry {
        EntityRegistry {
            entries: HashMap::new(),
        }
    }

    pub fn register<T: Record + Default>(&mut self, name: &str) {
        self.entries.insert(name.to_string(), construct::<T>);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub(crate) fn constructor(&self, name: &str) -> Result<Constructor> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| ErrorKind::UnknownEntity(name.to_string()).into())
    }

    pub fn construct(&self, name: &str) -> Result<Box<dyn Record>> {
        Ok(self.constructor(name)?())
    }
}

/// Generate a plain struct plus its [`Record`] impl.
///
/// ```
/// use copybook_import::flat_record;
///
/// flat_record! {
///     pub struct Rider {
///         fields {
///             rider_code: String,
///             line_number: Option<i64>,
///         }
///         collections {}
///     }
/// }
/// ```
#[macro_export]
macro_rules! flat_record {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            fields { $( $field:ident : $fty:ty ),* $(,)? }
        }
    ) => {
        $crate::flat_record! {
            $(#[$meta])*
            pub struct $name {
                fields { $( $field : $fty ),* }
                collections {}
            }
        }
    };
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            fields { $( $field:ident : $fty:ty ),* $(,)? }
            collections { $( $coll:ident : $cty:ty ),* $(,)? }
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone, PartialEq)]
        pub struct $name {
            $( pub $field : $fty, )*
            $( pub $coll : Vec<$cty>, )*
        }

        impl $crate::record::Record for $name {
            fn set(
                &mut self,
                path: &str,
                value: $crate::value::Value,
            ) -> $crate::error::Result<()> {
                $(
                    if $crate::record::path_matches(path, stringify!($field)) {
                        self.$field =
                            <$fty as $crate::value::FromValue>::from_value(value)?;
                        return Ok(());
                    }
                )*
                let _ = value;
                Err($crate::error::ErrorKind::UnknownTarget(path.to_string()).into())
            }

            fn get(&self, path: &str) -> Option<$crate::value::Value> {
                $(
                    if $crate::record::path_matches(path, stringify!($field)) {
                        return Some($crate::value::ToValue::to_value(&self.$field));
                    }
                )*
                let _ = path;
                None
            }

            fn append(
                &mut self,
                path: &str,
                child: Box<dyn $crate::record::Record>,
            ) -> $crate::error::Result<()> {
                $(
                    if $crate::record::path_matches(path, stringify!($coll)) {
                        let child = child
                            .into_any()
                            .downcast::<$cty>()
                            .map_err(|_| {
                                $crate::error::ErrorKind::BadChildType(path.to_string())
                            })?;
                        self.$coll.push(*child);
                        return Ok(());
                    }
                )*
                let _ = child;
                Err($crate::error::ErrorKind::NotACollection(path.to_string()).into())
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn into_any(self: Box<Self>) -> Box<dyn ::std::any::Any> {
                self
            }
        }
    };
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::Value;

    flat_record! {
        pub struct Child {
            fields {
                code: String,
            }
        }
    }

    flat_record! {
        pub struct Parent {
            fields {
                policy_number: String,
                line_count: Option<i64>,
            }
            collections {
                children: Child,
            }
        }
    }

    flat_record! {
        pub struct Stranger {
            fields {
                code: String,
            }
        }
    }

    #[test]
    fn test_path_matching_ignores_case_and_underscores() {
        assert!(path_matches("PolicyNumber", "policy_number"));
        assert!(path_matches("policynumber", "policy_number"));
        assert!(!path_matches("policyNo", "policy_number"));
    }

    #[test]
    fn test_set_and_get() {
        let mut p = Parent::default();
        p.set("policyNumber", Value::Text("P-1".to_string())).unwrap();
        assert_eq!(p.policy_number, "P-1");
        assert_eq!(
            p.get("PolicyNumber"),
            Some(Value::Text("P-1".to_string()))
        );
    }

    #[test]
    fn test_unknown_target_is_config_error() {
        let mut p = Parent::default();
        let err = p.set("noSuchField", Value::Null).unwrap_err();
        assert_eq!(
            *err.kind(),
            ErrorKind::UnknownTarget("noSuchField".to_string())
        );
        assert!(!err.kind().is_record_error());
    }

    #[test]
    fn test_dotted_paths_rejected() {
        let mut p = Parent::default();
        assert!(p.set("policyNumber.inner", Value::Null).is_err());
    }

    #[test]
    fn test_append_and_type_guard() {
        let mut p = Parent::default();
        let mut c = Child::default();
        c.code = "C1".to_string();
        p.append("children", Box::new(c)).unwrap();
        assert_eq!(p.children.len(), 1);
        assert_eq!(p.children[0].code, "C1");

        let err = p
            .append("children", Box::new(Stranger::default()))
            .unwrap_err();
        assert_eq!(
            *err.kind(),
            ErrorKind::BadChildType("children".to_string())
        );

        let err = p
            .append("policyNumber", Box::new(Child::default()))
            .unwrap_err();
        assert_eq!(
            *err.kind(),
            ErrorKind::NotACollection("policyNumber".to_string())
        );
    }

    #[test]
    fn test_registry_allow_list() {
        let mut registry = EntityRegistry::new();
        registry.register::<Child>("Child");
        assert!(registry.contains("Child"));

        let child = registry.construct("Child").unwrap();
        assert!(child.as_any().downcast_ref::<Child>().is_some());

        let err = registry.construct("Mystery").unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::UnknownEntity("Mystery".to_string()));
    }
}

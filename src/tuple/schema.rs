use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::common::STRING_LEN;
use crate::error::{Result, StorageError};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    String,
}

impl Type {
    /// Number of bytes a value of this type occupies on a page.
    pub const fn len(&self) -> usize {
        match self {
            Type::Int => std::mem::size_of::<i32>(),
            // length prefix followed by the padded payload
            Type::String => std::mem::size_of::<u32>() + STRING_LEN,
        }
    }
}

impl FromStr for Type {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("int") {
            Ok(Type::Int)
        } else if s.eq_ignore_ascii_case("string") {
            Ok(Type::String)
        } else {
            Err(format!("unknown type {s}"))
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::String => write!(f, "string"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDesc {
    field_type: Type,
    name: Option<String>,
}

impl FieldDesc {
    pub fn new(field_type: Type, name: Option<String>) -> Self {
        Self { field_type, name }
    }

    pub fn field_type(&self) -> Type {
        self.field_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Display for FieldDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}({})", self.field_type, name),
            None => write!(f, "{}", self.field_type),
        }
    }
}

/// Describes the layout of the tuples of one table: an ordered, non-empty list of typed
/// and optionally named fields. Immutable once built.
///
/// Equality only looks at the types, two descriptors with different field names but the
/// same type sequence are equal.
#[derive(Clone, Debug)]
pub struct TupleDesc {
    fields: Vec<FieldDesc>,
    size: usize,
}

impl TupleDesc {
    /// Creates a descriptor from parallel lists of types and names.
    pub fn new(types: Vec<Type>, names: Vec<Option<String>>) -> Result<Self> {
        if types.len() != names.len() {
            return Err(StorageError::SchemaLengthMismatch {
                types: types.len(),
                names: names.len(),
            });
        }
        let fields = types
            .into_iter()
            .zip(names)
            .map(|(field_type, name)| FieldDesc::new(field_type, name))
            .collect();
        Self::from_fields(fields)
    }

    /// Creates a descriptor whose fields are all anonymous.
    pub fn with_types(types: Vec<Type>) -> Result<Self> {
        let fields = types
            .into_iter()
            .map(|field_type| FieldDesc::new(field_type, None))
            .collect();
        Self::from_fields(fields)
    }

    pub fn from_fields(fields: Vec<FieldDesc>) -> Result<Self> {
        if fields.is_empty() {
            return Err(StorageError::EmptySchema);
        }
        let size = fields.iter().map(|field| field.field_type.len()).sum();
        Ok(Self { fields, size })
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDesc> {
        self.fields.iter()
    }

    fn field(&self, index: usize) -> Result<&FieldDesc> {
        self.fields
            .get(index)
            .ok_or(StorageError::FieldIndexOutOfRange {
                index,
                num_fields: self.fields.len(),
            })
    }

    /// Returns the (possibly absent) name of the field at `index`.
    pub fn field_name(&self, index: usize) -> Result<Option<&str>> {
        Ok(self.field(index)?.name())
    }

    pub fn field_type(&self, index: usize) -> Result<Type> {
        Ok(self.field(index)?.field_type())
    }

    /// Returns the index of the first field called `name`.
    ///
    /// A missing query name, a schema without any named field and a name that simply does
    /// not occur are reported as different errors.
    pub fn field_name_to_index(&self, name: Option<&str>) -> Result<usize> {
        let name = name.ok_or(StorageError::NullFieldName)?;
        let mut anonymous = 0;
        for (index, field) in self.fields.iter().enumerate() {
            match field.name() {
                None => anonymous += 1,
                Some(field_name) if field_name == name => return Ok(index),
                Some(_) => (),
            }
        }
        if anonymous == self.fields.len() {
            Err(StorageError::NoNamedFields(name.to_owned()))
        } else {
            Err(StorageError::FieldNotFound(name.to_owned()))
        }
    }

    /// Size in bytes of one tuple of this schema.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Concatenates two descriptors, the fields of `first` followed by those of `second`.
    pub fn merge(first: &TupleDesc, second: &TupleDesc) -> TupleDesc {
        let fields: Vec<FieldDesc> = first
            .fields
            .iter()
            .chain(second.fields.iter())
            .cloned()
            .collect();
        Self {
            fields,
            size: first.size + second.size,
        }
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for TupleDesc {}

impl Hash for TupleDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for field in &self.fields {
            field.field_type.hash(state);
        }
    }
}

impl Display for TupleDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use lazy_static::lazy_static;

    use super::{Type, TupleDesc};
    use crate::common::STRING_LEN;
    use crate::error::{ErrorKind, StorageError};

    lazy_static! {
        static ref STUDENTS: TupleDesc = TupleDesc::new(
            vec![Type::Int, Type::String, Type::Int],
            vec![
                Some("id".to_owned()),
                Some("name".to_owned()),
                Some("id".to_owned())
            ],
        )
        .unwrap();
    }

    #[test]
    fn size_is_sum_of_field_lengths() {
        assert_eq!(Type::Int.len(), 4);
        assert_eq!(Type::String.len(), STRING_LEN + 4);
        assert_eq!(STUDENTS.size(), 4 + STRING_LEN + 4 + 4);

        let single = TupleDesc::with_types(vec![Type::Int]).unwrap();
        assert_eq!(single.size(), 4);
    }

    #[test]
    fn rejects_bad_construction() {
        assert!(matches!(
            TupleDesc::with_types(vec![]),
            Err(StorageError::EmptySchema)
        ));
        assert!(matches!(
            TupleDesc::new(vec![Type::Int, Type::Int], vec![None]),
            Err(StorageError::SchemaLengthMismatch { types: 2, names: 1 })
        ));
    }

    #[test]
    fn field_access_checks_bounds() {
        assert_eq!(STUDENTS.num_fields(), 3);
        assert_eq!(STUDENTS.field_name(1).unwrap(), Some("name"));
        assert_eq!(STUDENTS.field_type(1).unwrap(), Type::String);

        let err = STUDENTS.field_type(3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(STUDENTS.field_name(3).is_err());
    }

    #[test]
    fn field_lookup_returns_first_match() {
        assert_eq!(STUDENTS.field_name_to_index(Some("id")).unwrap(), 0);
        assert_eq!(STUDENTS.field_name_to_index(Some("name")).unwrap(), 1);
    }

    #[test]
    fn field_lookup_distinguishes_failures() {
        assert!(matches!(
            STUDENTS.field_name_to_index(None),
            Err(StorageError::NullFieldName)
        ));
        assert!(matches!(
            STUDENTS.field_name_to_index(Some("age")),
            Err(StorageError::FieldNotFound(_))
        ));

        let anonymous = TupleDesc::with_types(vec![Type::Int, Type::String]).unwrap();
        assert!(matches!(
            anonymous.field_name_to_index(Some("id")),
            Err(StorageError::NoNamedFields(_))
        ));

        let partly_named =
            TupleDesc::new(vec![Type::Int, Type::Int], vec![None, Some("b".to_owned())]).unwrap();
        assert_eq!(partly_named.field_name_to_index(Some("b")).unwrap(), 1);
        assert!(matches!(
            partly_named.field_name_to_index(Some("a")),
            Err(StorageError::FieldNotFound(_))
        ));
    }

    #[test]
    fn merge_keeps_order_and_names() {
        let left = TupleDesc::new(vec![Type::Int], vec![Some("a".to_owned())]).unwrap();
        let merged = TupleDesc::merge(&left, &STUDENTS);

        assert_eq!(merged.num_fields(), 1 + STUDENTS.num_fields());
        assert_eq!(merged.size(), left.size() + STUDENTS.size());
        assert_eq!(merged.field_name(0).unwrap(), Some("a"));
        assert_eq!(merged.field_name(2).unwrap(), Some("name"));
        assert_eq!(merged.field_type(2).unwrap(), Type::String);
        assert_eq!(merged.field_name_to_index(Some("id")).unwrap(), 1);
    }

    #[test]
    fn equality_ignores_names() {
        let named = TupleDesc::new(
            vec![Type::Int, Type::String],
            vec![Some("x".to_owned()), Some("y".to_owned())],
        )
        .unwrap();
        let anonymous = TupleDesc::with_types(vec![Type::Int, Type::String]).unwrap();
        let swapped = TupleDesc::with_types(vec![Type::String, Type::Int]).unwrap();
        let shorter = TupleDesc::with_types(vec![Type::Int]).unwrap();

        assert_eq!(named, anonymous);
        assert_ne!(named, swapped);
        assert_ne!(named, shorter);

        let mut set = HashSet::new();
        set.insert(named);
        assert!(set.contains(&anonymous));
    }

    #[test]
    fn display_lists_fields() {
        let desc = TupleDesc::new(
            vec![Type::Int, Type::String],
            vec![Some("id".to_owned()), None],
        )
        .unwrap();
        assert_eq!(desc.to_string(), "int(id), string");
    }
}

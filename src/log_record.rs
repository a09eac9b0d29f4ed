use crate::value_variant::TypedValue;

use std::fmt;

/// Name of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldName {
    Known(&'static str),
    /// A tag absent from the dictionary.
    Unknown(u8),
}

impl FieldName {
    pub fn is_unknown(&self) -> bool {
        matches!(self, FieldName::Unknown(_))
    }

    /// Whether this is the dictionary name `name`. Unknown tags never match.
    pub fn matches(&self, name: &str) -> bool {
        matches!(self, FieldName::Known(n) if *n == name)
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldName::Known(name) => f.write_str(name),
            FieldName::Unknown(tag) => write!(f, "unknown_{:02x}", tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub tag: u8,
    pub name: FieldName,
    pub value: TypedValue,
}

/// One firewall log entry.
///
/// Fields keep their order of appearance in the stream; a repeated tag is kept as another field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogRecord {
    /// Offset of the first chunk of this record.
    pub offset: u64,
    fields: Vec<Field>,
}

impl LogRecord {
    pub fn new(offset: u64) -> Self {
        LogRecord {
            offset,
            fields: Vec::new(),
        }
    }

    pub fn push(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First value named `name`.
    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.fields
            .iter()
            .find(|f| f.name.matches(name))
            .map(|f| &f.value)
    }

    /// Every value named `name`, in stream order.
    pub fn get_all<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s TypedValue> + 's {
        self.fields
            .iter()
            .filter(move |f| f.name.matches(name))
            .map(|f| &f.value)
    }
}

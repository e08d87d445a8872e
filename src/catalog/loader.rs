use crate::error::{Result, StorageError};
use crate::tuple::schema::{FieldDesc, TupleDesc, Type};

const PRIMARY_KEY_ANNOTATION: &str = "pk";

/// One table as described by a line of a schema file.
#[derive(Clone, Debug, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub tuple_desc: TupleDesc,
    /// Empty if no field carries the `pk` annotation.
    pub primary_key: String,
}

/// Parses a schema description, one table per line:
///
/// ```text
/// students (id int pk, name string)
/// ```
///
/// Types are `int` or `string` in any case, the only annotation is `pk`. Blank lines are
/// ignored. The first malformed line aborts parsing and is reported with its line number.
pub fn parse_schema(text: &str) -> Result<Vec<TableDefinition>> {
    let mut tables = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let table = parse_line(line).map_err(|reason| StorageError::SchemaParse {
            line_no: i + 1,
            line: line.to_owned(),
            reason,
        })?;
        tables.push(table);
    }
    Ok(tables)
}

fn parse_line(line: &str) -> std::result::Result<TableDefinition, String> {
    let open = line.find('(').ok_or("missing '('")?;
    let close = line.rfind(')').ok_or("missing ')'")?;
    if close < open {
        return Err("')' comes before '('".to_owned());
    }
    if !line[close + 1..].trim().is_empty() {
        return Err("unexpected text after ')'".to_owned());
    }
    let name = line[..open].trim();
    if name.is_empty() {
        return Err("missing table name".to_owned());
    }

    let mut fields = Vec::new();
    let mut primary_key = String::new();
    for field in line[open + 1..close].split(',') {
        let tokens = field.split_whitespace().collect::<Vec<_>>();
        let (field_name, field_type, annotation) = match tokens.as_slice() {
            [field_name, field_type] => (*field_name, *field_type, None),
            [field_name, field_type, annotation] => (*field_name, *field_type, Some(*annotation)),
            _ => {
                return Err(format!(
                    "expected `name type [pk]`, got `{}`",
                    field.trim()
                ))
            }
        };
        let field_type: Type = field_type.parse()?;
        match annotation {
            None => (),
            Some(PRIMARY_KEY_ANNOTATION) => primary_key = field_name.to_owned(),
            Some(other) => return Err(format!("unknown annotation {other}")),
        }
        fields.push(FieldDesc::new(field_type, Some(field_name.to_owned())));
    }

    let tuple_desc = TupleDesc::from_fields(fields).map_err(|e| e.to_string())?;
    Ok(TableDefinition {
        name: name.to_owned(),
        tuple_desc,
        primary_key,
    })
}

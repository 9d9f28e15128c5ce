// src/store/query.rs

use serde_json::Value;

/// A single stored row, keyed by column name (or alias).
pub type Record = serde_json::Map<String, Value>;

/// SQL type of a catalogued column.
/// Drives how filter values are bound and how patches are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    Text,
    Integer,
    Float,
    Bool,
    Timestamp,
}

/// A belongs-to relation from one entity to another.
#[derive(Debug, Clone, Copy)]
pub struct Relation {
    /// Name used as the key prefix of joined columns (e.g. `role` in `role.type`).
    pub name: &'static str,
    pub target: Entity,
    /// Foreign key column on the owning entity.
    pub foreign_key: &'static str,
}

/// Every table the gateway knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Users,
    Roles,
    UserRoles,
    Exercises,
    Questions,
    Results,
}

const TIMESTAMPS: [(&str, ColumnType); 2] = [
    ("created_at", ColumnType::Timestamp),
    ("updated_at", ColumnType::Timestamp),
];

impl Entity {
    pub fn table(self) -> &'static str {
        match self {
            Entity::Users => "users",
            Entity::Roles => "roles",
            Entity::UserRoles => "user_roles",
            Entity::Exercises => "exercises",
            Entity::Questions => "questions",
            Entity::Results => "results",
        }
    }

    /// Column catalog, excluding the shared timestamp columns.
    fn own_columns(self) -> &'static [(&'static str, ColumnType)] {
        use ColumnType::*;
        match self {
            Entity::Users => &[
                ("id", Uuid),
                ("name", Text),
                ("email", Text),
                ("activated", Bool),
                ("deleted", Bool),
            ],
            Entity::Roles => &[("id", Uuid), ("type", Text)],
            Entity::UserRoles => &[("id", Uuid), ("user_id", Uuid), ("role_id", Uuid)],
            Entity::Exercises => &[
                ("id", Uuid),
                ("name", Text),
                ("language_id", Uuid),
                ("total_marks", Integer),
                ("exercise_weightage", Float),
                ("activated", Bool),
                ("deleted", Bool),
            ],
            Entity::Questions => &[
                ("id", Uuid),
                ("exercise_id", Uuid),
                ("question", Text),
                ("marks", Text),
                ("activated", Bool),
                ("deleted", Bool),
            ],
            Entity::Results => &[
                ("id", Uuid),
                ("user_id", Uuid),
                ("exercise_id", Uuid),
                ("obtained_marks", Float),
            ],
        }
    }

    pub fn column_type(self, column: &str) -> Option<ColumnType> {
        self.own_columns()
            .iter()
            .chain(TIMESTAMPS.iter())
            .find(|(name, _)| *name == column)
            .map(|(_, ty)| *ty)
    }

    pub fn columns(self) -> impl Iterator<Item = &'static str> {
        self.own_columns()
            .iter()
            .chain(TIMESTAMPS.iter())
            .map(|(name, _)| *name)
    }

    /// Columns that must be present (non-null) when a row is created.
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            Entity::Users => &["name"],
            Entity::Roles => &["type"],
            Entity::UserRoles => &["user_id", "role_id"],
            Entity::Exercises => &["name", "language_id"],
            Entity::Questions => &["exercise_id", "marks"],
            Entity::Results => &["user_id", "exercise_id", "obtained_marks"],
        }
    }

    /// Value a column takes when an insert leaves it out.
    pub fn column_default(self, column: &str) -> Option<Value> {
        let value = match (self, column) {
            (Entity::Users, "activated") => Value::Bool(true),
            (Entity::Exercises, "total_marks") => Value::from(0),
            (Entity::Exercises, "exercise_weightage") => Value::from(0.0),
            (Entity::Exercises, "activated") => Value::Bool(false),
            (Entity::Questions, "activated") => Value::Bool(true),
            (_, "deleted") => Value::Bool(false),
            _ => return None,
        };
        self.column_type(column).map(|_| value)
    }

    pub fn relations(self) -> &'static [Relation] {
        match self {
            Entity::UserRoles => &[
                Relation {
                    name: "role",
                    target: Entity::Roles,
                    foreign_key: "role_id",
                },
                Relation {
                    name: "user",
                    target: Entity::Users,
                    foreign_key: "user_id",
                },
            ],
            Entity::Questions => &[Relation {
                name: "exercise",
                target: Entity::Exercises,
                foreign_key: "exercise_id",
            }],
            Entity::Results => &[
                Relation {
                    name: "exercise",
                    target: Entity::Exercises,
                    foreign_key: "exercise_id",
                },
                Relation {
                    name: "user",
                    target: Entity::Users,
                    foreign_key: "user_id",
                },
            ],
            Entity::Users | Entity::Roles | Entity::Exercises => &[],
        }
    }

    pub fn relation_to(self, target: Entity) -> Option<&'static Relation> {
        self.relations().iter().find(|r| r.target == target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Value must be a JSON array.
    In,
}

impl Op {
    pub fn sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "<>",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
            Op::In => "IN",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub column: String,
    pub op: Op,
    pub value: Value,
}

impl Condition {
    pub fn new(column: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }
}

/// A projected column, optionally renamed in the output row.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub column: String,
    pub alias: Option<String>,
}

impl Attribute {
    pub fn aliased(column: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            alias: Some(alias.into()),
        }
    }

    /// Key under which the column appears in the output row.
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.column)
    }
}

impl From<&str> for Attribute {
    fn from(column: &str) -> Self {
        Self {
            column: column.to_string(),
            alias: None,
        }
    }
}

/// Eager join over a belongs-to relation.
/// Joined columns come back flattened as `"<relation>.<column>"`.
#[derive(Debug, Clone)]
pub struct Include {
    pub entity: Entity,
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// Parameters shared by every read operation.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub conditions: Vec<Condition>,
    /// Empty means every catalogued column.
    pub attributes: Vec<Attribute>,
    pub include: Vec<Include>,
    pub order: Vec<Order>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, column: &str, op: Op, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::new(column, op, value));
        self
    }

    /// Equality shorthand.
    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Op::Eq, value)
    }

    pub fn select<A: Into<Attribute>>(mut self, attributes: impl IntoIterator<Item = A>) -> Self {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn include(mut self, entity: Entity, attributes: &[&str]) -> Self {
        self.include.push(Include {
            entity,
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
        });
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            direction,
        });
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Same filters and joins without projection or paging; used for counting.
    pub fn unpaged(&self) -> Self {
        Self {
            conditions: self.conditions.clone(),
            include: self.include.clone(),
            ..Self::default()
        }
    }
}

/// Field-scoped constraint violation reported by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Checks every column a query or write touches against the entity catalog.
pub fn check_columns<'a>(
    entity: Entity,
    columns: impl IntoIterator<Item = &'a str>,
) -> Result<(), Vec<FieldViolation>> {
    let unknown: Vec<FieldViolation> = columns
        .into_iter()
        .filter(|c| entity.column_type(c).is_none())
        .map(|c| FieldViolation::new(c, format!("{} is not a column of {}", c, entity.table())))
        .collect();

    if unknown.is_empty() { Ok(()) } else { Err(unknown) }
}

/// Validates a query's columns, includes and ordering for `entity`.
pub fn check_query(entity: Entity, query: &Query) -> Result<(), Vec<FieldViolation>> {
    let mut violations = Vec::new();

    let base_columns = query
        .conditions
        .iter()
        .map(|c| c.column.as_str())
        .chain(query.attributes.iter().map(|a| a.column.as_str()))
        .chain(query.order.iter().map(|o| o.column.as_str()));
    if let Err(v) = check_columns(entity, base_columns) {
        violations.extend(v);
    }

    for include in &query.include {
        match entity.relation_to(include.entity) {
            Some(_) => {
                if let Err(v) =
                    check_columns(include.entity, include.attributes.iter().map(String::as_str))
                {
                    violations.extend(v);
                }
            }
            None => violations.push(FieldViolation::new(
                include.entity.table(),
                format!(
                    "{} is not associated to {}",
                    include.entity.table(),
                    entity.table()
                ),
            )),
        }
    }

    for condition in &query.conditions {
        if condition.op == Op::In && !condition.value.is_array() {
            violations.push(FieldViolation::new(
                &condition.column,
                format!("{} IN filter expects a list", condition.column),
            ));
        }
    }

    if violations.is_empty() { Ok(()) } else { Err(violations) }
}

/// A filter or write value converted to its column's type.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Null,
    Uuid(uuid::Uuid),
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Timestamp(chrono::DateTime<chrono::Utc>),
}

impl Bound {
    /// Converts a JSON value for storage in a column of type `ty`.
    ///
    /// Numbers are accepted for text columns and numeric strings for numeric
    /// columns, the same way the database casts them on insert.
    pub fn convert(ty: ColumnType, value: &Value) -> Result<Self, String> {
        if value.is_null() {
            return Ok(Bound::Null);
        }
        let bound = match (ty, value) {
            (ColumnType::Uuid, Value::String(s)) => {
                Bound::Uuid(s.parse().map_err(|_| format!("'{}' is not a valid uuid", s))?)
            }
            (ColumnType::Text, Value::String(s)) => Bound::Text(s.clone()),
            (ColumnType::Text, Value::Number(n)) => Bound::Text(n.to_string()),
            (ColumnType::Integer, Value::Number(n)) => match n.as_i64() {
                Some(i) => Bound::Integer(i),
                None => return Err(format!("{} is not an integer", n)),
            },
            (ColumnType::Integer, Value::String(s)) => Bound::Integer(
                s.trim()
                    .parse()
                    .map_err(|_| format!("'{}' is not an integer", s))?,
            ),
            (ColumnType::Float, Value::Number(n)) => match n.as_f64() {
                Some(f) => Bound::Float(f),
                None => return Err(format!("{} is not a number", n)),
            },
            (ColumnType::Float, Value::String(s)) => Bound::Float(
                s.trim()
                    .parse()
                    .map_err(|_| format!("'{}' is not a number", s))?,
            ),
            (ColumnType::Bool, Value::Bool(b)) => Bound::Bool(*b),
            (ColumnType::Timestamp, Value::String(s)) => Bound::Timestamp(
                chrono::DateTime::parse_from_rfc3339(s)
                    .map_err(|_| format!("'{}' is not a timestamp", s))?
                    .with_timezone(&chrono::Utc),
            ),
            (ty, other) => return Err(format!("{} is not a valid {:?} value", other, ty)),
        };
        Ok(bound)
    }

    pub fn into_json(self) -> Value {
        match self {
            Bound::Null => Value::Null,
            Bound::Uuid(u) => Value::String(u.to_string()),
            Bound::Text(s) => Value::String(s),
            Bound::Integer(i) => Value::from(i),
            Bound::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Bound::Bool(b) => Value::Bool(b),
            Bound::Timestamp(t) => Value::String(super::timestamp(t)),
        }
    }
}

/// Converts every field of `row` to its column type, collecting all failures.
pub fn convert_row(entity: Entity, row: &Record) -> Result<Vec<(String, Bound)>, Vec<FieldViolation>> {
    let mut converted = Vec::with_capacity(row.len());
    let mut violations = Vec::new();

    for (column, value) in row {
        match entity.column_type(column) {
            None => violations.push(FieldViolation::new(
                column,
                format!("{} is not a column of {}", column, entity.table()),
            )),
            Some(ty) => match Bound::convert(ty, value) {
                Ok(b) => converted.push((column.clone(), b)),
                Err(message) => violations.push(FieldViolation::new(column, message)),
            },
        }
    }

    if violations.is_empty() { Ok(converted) } else { Err(violations) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_includes_timestamps() {
        assert_eq!(
            Entity::Results.column_type("updated_at"),
            Some(ColumnType::Timestamp)
        );
        assert_eq!(Entity::Questions.column_type("marks"), Some(ColumnType::Text));
        assert!(Entity::Roles.column_type("obtained_marks").is_none());
    }

    #[test]
    fn rejects_unknown_columns_and_relations() {
        let query = Query::new()
            .eq("password", "x")
            .include(Entity::Results, &["id"]);

        let violations = check_query(Entity::Users, &query).unwrap_err();
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].field, "password");
    }

    #[test]
    fn accepts_role_join() {
        let query = Query::new()
            .select(Vec::<Attribute>::new())
            .eq("user_id", "2f1c0c1e-0000-4000-8000-000000000000")
            .include(Entity::Roles, &["type"]);

        assert!(check_query(Entity::UserRoles, &query).is_ok());
    }

    #[test]
    fn numeric_marks_are_stored_as_text() {
        assert_eq!(
            Bound::convert(ColumnType::Text, &serde_json::json!(5)),
            Ok(Bound::Text("5".to_string()))
        );
        assert_eq!(
            Bound::convert(ColumnType::Float, &serde_json::json!("12.5")),
            Ok(Bound::Float(12.5))
        );
        assert!(Bound::convert(ColumnType::Uuid, &serde_json::json!("nope")).is_err());
    }

    #[test]
    fn convert_row_reports_every_bad_field() {
        let mut row = Record::new();
        row.insert("total_marks".into(), serde_json::json!("ten"));
        row.insert("colour".into(), serde_json::json!("red"));

        let violations = convert_row(Entity::Exercises, &row).unwrap_err();
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn in_filter_needs_a_list() {
        let query = Query::new().filter("id", Op::In, "not-a-list");
        assert!(check_query(Entity::Users, &query).is_err());
    }
}

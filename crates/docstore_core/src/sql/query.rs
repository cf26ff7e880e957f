//! Single-table query description and SQL rendering.

use rusqlite::types::Value;

/// Binary comparison between a column and a bound text value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Comparison {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
        }
    }
}

/// Predicate on the rows of a query's table.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        column: &'static str,
        comparison: Comparison,
        value: String,
    },
    /// `column IN (values)`; an empty list matches nothing.
    In {
        column: &'static str,
        values: Vec<String>,
    },
    /// At least one correlated row exists in another table.
    Exists(RelatedRows),
    /// Disjunction of conjunctions; an empty inner group matches every row.
    AnyOf(Vec<Vec<Condition>>),
}

/// Rows of `table` correlated to the outer row by column equality.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedRows {
    table: &'static str,
    correlations: Vec<(&'static str, &'static str)>,
    conditions: Vec<Condition>,
}

impl RelatedRows {
    pub fn in_table(table: &'static str) -> Self {
        Self {
            table,
            correlations: Vec::new(),
            conditions: Vec::new(),
        }
    }

    /// Requires `table.inner_column = outer.outer_column`.
    pub fn correlate(mut self, inner_column: &'static str, outer_column: &'static str) -> Self {
        self.correlations.push((inner_column, outer_column));
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// Description of one statement against a single table.
///
/// Conditions are joined with `AND`. Parameters are the written columns for
/// inserts and updates. Row numbers are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    table: &'static str,
    parameters: Vec<(&'static str, String)>,
    conditions: Vec<Condition>,
    order_by_desc: Vec<&'static str>,
    from_row_number: Option<u64>,
    to_row_number: Option<u64>,
}

impl TableQuery {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            parameters: Vec::new(),
            conditions: Vec::new(),
            order_by_desc: Vec::new(),
            from_row_number: None,
            to_row_number: None,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn add_parameter(&mut self, column: &'static str, value: impl Into<String>) -> &mut Self {
        self.parameters.push((column, value.into()));
        self
    }

    /// Adds an equality condition.
    pub fn add_condition(&mut self, column: &'static str, value: impl Into<String>) -> &mut Self {
        self.add(Condition::Compare {
            column,
            comparison: Comparison::Equal,
            value: value.into(),
        })
    }

    pub fn add_membership_condition<I, S>(&mut self, column: &'static str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add(Condition::In {
            column,
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    pub fn add(&mut self, condition: Condition) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    pub fn add_exists(&mut self, related: RelatedRows) -> &mut Self {
        self.add(Condition::Exists(related))
    }

    /// Adds an OR of AND-groups.
    pub fn add_any_of(&mut self, groups: Vec<Vec<Condition>>) -> &mut Self {
        self.add(Condition::AnyOf(groups))
    }

    pub fn add_order_by_desc(&mut self, column: &'static str) -> &mut Self {
        self.order_by_desc.push(column);
        self
    }

    pub fn set_from_row_number(&mut self, from: u64) -> &mut Self {
        self.from_row_number = Some(from);
        self
    }

    pub fn set_to_row_number(&mut self, to: u64) -> &mut Self {
        self.to_row_number = Some(to);
        self
    }

    pub(crate) fn has_parameters(&self) -> bool {
        !self.parameters.is_empty()
    }

    pub(crate) fn select_sql(&self) -> (String, Vec<Value>) {
        let mut binds = Vec::new();
        let mut sql = format!("SELECT * FROM {}", quote(self.table));
        self.push_where(&mut sql, &mut binds);

        if !self.order_by_desc.is_empty() {
            let columns = self
                .order_by_desc
                .iter()
                .map(|column| format!("{} DESC", quote(column)))
                .collect::<Vec<_>>();
            sql.push_str(" ORDER BY ");
            sql.push_str(&columns.join(", "));
        }

        if let Some((limit, offset)) = self.limit_and_offset() {
            sql.push_str(" LIMIT ? OFFSET ?");
            binds.push(Value::Integer(limit));
            binds.push(Value::Integer(offset));
        }

        (sql, binds)
    }

    pub(crate) fn count_sql(&self) -> (String, Vec<Value>) {
        let mut binds = Vec::new();
        let mut sql = format!("SELECT COUNT(*) FROM {}", quote(self.table));
        self.push_where(&mut sql, &mut binds);
        (sql, binds)
    }

    pub(crate) fn insert_sql(&self) -> (String, Vec<Value>) {
        let columns = self
            .parameters
            .iter()
            .map(|(column, _)| quote(column))
            .collect::<Vec<_>>();
        let placeholders = vec!["?"; self.parameters.len()];
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(self.table),
            columns.join(", "),
            placeholders.join(", ")
        );
        let binds = self
            .parameters
            .iter()
            .map(|(_, value)| Value::Text(value.clone()))
            .collect();
        (sql, binds)
    }

    pub(crate) fn update_sql(&self) -> (String, Vec<Value>) {
        let assignments = self
            .parameters
            .iter()
            .map(|(column, _)| format!("{} = ?", quote(column)))
            .collect::<Vec<_>>();
        let mut binds: Vec<Value> = self
            .parameters
            .iter()
            .map(|(_, value)| Value::Text(value.clone()))
            .collect();
        let mut sql = format!(
            "UPDATE {} SET {}",
            quote(self.table),
            assignments.join(", ")
        );
        self.push_where(&mut sql, &mut binds);
        (sql, binds)
    }

    pub(crate) fn delete_sql(&self) -> (String, Vec<Value>) {
        let mut binds = Vec::new();
        let mut sql = format!("DELETE FROM {}", quote(self.table));
        self.push_where(&mut sql, &mut binds);
        (sql, binds)
    }

    fn push_where(&self, sql: &mut String, binds: &mut Vec<Value>) {
        if self.conditions.is_empty() {
            return;
        }
        sql.push_str(" WHERE ");
        render_conjunction(self.table, &self.conditions, sql, binds);
    }

    fn limit_and_offset(&self) -> Option<(i64, i64)> {
        if self.from_row_number.is_none() && self.to_row_number.is_none() {
            return None;
        }
        let offset = self.from_row_number.map_or(0, |from| from.saturating_sub(1));
        let limit = match self.to_row_number {
            Some(to) => to_sql_integer(to.saturating_sub(offset)),
            None => -1,
        };
        Some((limit, to_sql_integer(offset)))
    }
}

fn to_sql_integer(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

fn render_conjunction(
    table: &str,
    conditions: &[Condition],
    sql: &mut String,
    binds: &mut Vec<Value>,
) {
    if conditions.is_empty() {
        sql.push_str("1 = 1");
        return;
    }
    for (index, condition) in conditions.iter().enumerate() {
        if index > 0 {
            sql.push_str(" AND ");
        }
        render_condition(table, condition, sql, binds);
    }
}

fn render_condition(table: &str, condition: &Condition, sql: &mut String, binds: &mut Vec<Value>) {
    match condition {
        Condition::Compare {
            column,
            comparison,
            value,
        } => {
            sql.push_str(&format!(
                "{}.{} {} ?",
                quote(table),
                quote(column),
                comparison.as_sql()
            ));
            binds.push(Value::Text(value.clone()));
        }
        Condition::In { column, values } => {
            if values.is_empty() {
                sql.push_str("1 = 0");
                return;
            }
            let placeholders = vec!["?"; values.len()];
            sql.push_str(&format!(
                "{}.{} IN ({})",
                quote(table),
                quote(column),
                placeholders.join(", ")
            ));
            binds.extend(values.iter().cloned().map(Value::Text));
        }
        Condition::Exists(related) => {
            sql.push_str(&format!("EXISTS (SELECT 1 FROM {}", quote(related.table)));
            let mut clauses = related
                .correlations
                .iter()
                .map(|(inner, outer)| {
                    format!(
                        "{}.{} = {}.{}",
                        quote(related.table),
                        quote(inner),
                        quote(table),
                        quote(outer)
                    )
                })
                .collect::<Vec<_>>();
            if !related.conditions.is_empty() {
                let mut nested = String::new();
                render_conjunction(related.table, &related.conditions, &mut nested, binds);
                clauses.push(nested);
            }
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push(')');
        }
        Condition::AnyOf(groups) => {
            if groups.is_empty() {
                sql.push_str("1 = 0");
                return;
            }
            sql.push('(');
            for (index, group) in groups.iter().enumerate() {
                if index > 0 {
                    sql.push_str(" OR ");
                }
                sql.push('(');
                render_conjunction(table, group, sql, binds);
                sql.push(')');
            }
            sql.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Comparison, Condition, RelatedRows, TableQuery};
    use rusqlite::types::Value;

    fn text(value: &str) -> Value {
        Value::Text(value.to_string())
    }

    #[test]
    fn select_without_conditions_reads_whole_table() {
        let query = TableQuery::new("record");
        let (sql, binds) = query.select_sql();
        assert_eq!(sql, "SELECT * FROM \"record\"");
        assert!(binds.is_empty());
    }

    #[test]
    fn select_renders_conditions_order_and_row_range() {
        let mut query = TableQuery::new("record");
        query
            .add_membership_condition("type", ["person", "place"])
            .add_condition("id", "42")
            .add_order_by_desc("id")
            .set_from_row_number(10)
            .set_to_row_number(100);

        let (sql, binds) = query.select_sql();
        assert_eq!(
            sql,
            "SELECT * FROM \"record\" WHERE \"record\".\"type\" IN (?, ?) \
             AND \"record\".\"id\" = ? ORDER BY \"id\" DESC LIMIT ? OFFSET ?"
        );
        assert_eq!(
            binds,
            vec![
                text("person"),
                text("place"),
                text("42"),
                Value::Integer(91),
                Value::Integer(9),
            ]
        );
    }

    #[test]
    fn open_ended_row_ranges_use_unbounded_limit() {
        let mut from_only = TableQuery::new("record");
        from_only.set_from_row_number(3);
        let (sql, binds) = from_only.select_sql();
        assert!(sql.ends_with("LIMIT ? OFFSET ?"));
        assert_eq!(binds, vec![Value::Integer(-1), Value::Integer(2)]);

        let mut to_only = TableQuery::new("record");
        to_only.set_to_row_number(3);
        let (_, binds) = to_only.select_sql();
        assert_eq!(binds, vec![Value::Integer(3), Value::Integer(0)]);
    }

    #[test]
    fn inverted_row_range_yields_empty_limit() {
        let mut query = TableQuery::new("record");
        query.set_from_row_number(5).set_to_row_number(2);
        let (_, binds) = query.select_sql();
        assert_eq!(binds, vec![Value::Integer(0), Value::Integer(4)]);
    }

    #[test]
    fn count_ignores_order_and_row_range() {
        let mut query = TableQuery::new("link");
        query
            .add_condition("totype", "person")
            .add_order_by_desc("toid")
            .set_to_row_number(1);
        let (sql, binds) = query.count_sql();
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM \"link\" WHERE \"link\".\"totype\" = ?"
        );
        assert_eq!(binds, vec![text("person")]);
    }

    #[test]
    fn insert_and_update_bind_parameters_before_conditions() {
        let mut insert = TableQuery::new("link");
        insert
            .add_parameter("fromtype", "person")
            .add_parameter("fromid", "1");
        let (sql, binds) = insert.insert_sql();
        assert_eq!(
            sql,
            "INSERT INTO \"link\" (\"fromtype\", \"fromid\") VALUES (?, ?)"
        );
        assert_eq!(binds, vec![text("person"), text("1")]);

        let mut update = TableQuery::new("record");
        update
            .add_parameter("data", "{}")
            .add_condition("type", "person")
            .add_condition("id", "1");
        let (sql, binds) = update.update_sql();
        assert_eq!(
            sql,
            "UPDATE \"record\" SET \"data\" = ? WHERE \"record\".\"type\" = ? AND \"record\".\"id\" = ?"
        );
        assert_eq!(binds, vec![text("{}"), text("person"), text("1")]);
    }

    #[test]
    fn any_of_renders_correlated_exists_groups() {
        let term = |key: &str, value: &str| {
            Condition::Exists(
                RelatedRows::in_table("storageterm")
                    .correlate("recordtype", "type")
                    .correlate("recordid", "id")
                    .with_condition(Condition::Compare {
                        column: "storagekey",
                        comparison: Comparison::Equal,
                        value: key.to_string(),
                    })
                    .with_condition(Condition::Compare {
                        column: "value",
                        comparison: Comparison::Greater,
                        value: value.to_string(),
                    }),
            )
        };
        let mut query = TableQuery::new("record");
        query.add_any_of(vec![vec![term("a", "1")], vec![]]);

        let (sql, binds) = query.delete_sql();
        assert_eq!(
            sql,
            "DELETE FROM \"record\" WHERE ((EXISTS (SELECT 1 FROM \"storageterm\" WHERE \
             \"storageterm\".\"recordtype\" = \"record\".\"type\" AND \
             \"storageterm\".\"recordid\" = \"record\".\"id\" AND \
             \"storageterm\".\"storagekey\" = ? AND \"storageterm\".\"value\" > ?)) OR (1 = 1))"
        );
        assert_eq!(binds, vec![text("a"), text("1")]);
    }

    #[test]
    fn empty_membership_matches_nothing() {
        let mut query = TableQuery::new("record");
        query.add_membership_condition("type", Vec::<String>::new());
        let (sql, binds) = query.count_sql();
        assert_eq!(sql, "SELECT COUNT(*) FROM \"record\" WHERE 1 = 0");
        assert!(binds.is_empty());
    }
}

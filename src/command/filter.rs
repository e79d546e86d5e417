/// Boolean predicates for WHERE and HAVING clauses.
///
/// A [`Filter`] accumulates SQL text as it is built. Operands are rendered
/// with one policy: strings are single-quoted unless they are the `?`
/// placeholder, nested filters and subqueries are parenthesized, lists become
/// a parenthesized comma-joined set, and every other value uses its text form.

use super::{Command, Select};
use crate::core::{Result, Value};
use tracing::warn;

/// Right-hand side of a comparison.
#[derive(Debug, Clone)]
pub enum Operand {
    Literal(Value),
    List(Vec<Value>),
    Filter(Filter),
    /// Rendered in place when the outer command renders; its own params are ignored
    Subquery(Box<Select>),
}

macro_rules! operand_from_literal {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(value: $ty) -> Self {
                    Operand::Literal(value.into())
                }
            }
        )*
    };
}

operand_from_literal!(
    Value,
    i8,
    i16,
    i32,
    i64,
    f32,
    f64,
    bool,
    &str,
    String,
    &String,
    chrono::NaiveDateTime,
    chrono::NaiveDate,
    chrono::NaiveTime,
);

impl From<Filter> for Operand {
    fn from(filter: Filter) -> Self {
        Operand::Filter(filter)
    }
}

impl From<Select> for Operand {
    fn from(select: Select) -> Self {
        Operand::Subquery(Box::new(select))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Operand {
    fn from(values: Vec<T>) -> Self {
        Operand::List(values.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone)]
enum Part {
    Sql(String),
    Subquery(Box<Select>),
}

/// A predicate fragment built incrementally.
///
/// Groups opened with [`Filter::starts`] and never closed are closed when the
/// filter is rendered, so the output always has balanced parentheses.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    parts: Vec<Part>,
    depth: usize,
}

impl Filter {
    /// An empty filter.
    pub fn new() -> Self {
        Filter::default()
    }

    /// A filter starting with a raw expression.
    pub fn expr(expression: impl Into<String>) -> Self {
        let mut filter = Filter::new();
        filter.push(&expression.into());
        filter
    }

    /// `<field> <operator> <value>`, e.g. `Filter::by("age", ">", 18)` renders `age > 18`.
    pub fn by(field: &str, operator: &str, value: impl Into<Operand>) -> Self {
        Filter::new().condition(field, operator, value)
    }

    /// Appends `<field> <operator> <value>` to this filter.
    pub fn condition(mut self, field: &str, operator: &str, value: impl Into<Operand>) -> Self {
        self.push(&format!("{} {} ", field, operator));
        self.operand(value.into());
        self
    }

    pub fn field(mut self, name: &str) -> Self {
        self.push(&format!("{} ", name));
        self
    }

    pub fn eq(self, value: impl Into<Operand>) -> Self {
        self.compare("=", value.into())
    }

    pub fn ne(self, value: impl Into<Operand>) -> Self {
        self.compare("<>", value.into())
    }

    pub fn gt(self, value: impl Into<Operand>) -> Self {
        self.compare(">", value.into())
    }

    pub fn lt(self, value: impl Into<Operand>) -> Self {
        self.compare("<", value.into())
    }

    pub fn gte(self, value: impl Into<Operand>) -> Self {
        self.compare(">=", value.into())
    }

    pub fn lte(self, value: impl Into<Operand>) -> Self {
        self.compare("<=", value.into())
    }

    pub fn like(self, value: impl Into<Operand>) -> Self {
        self.compare("LIKE ", value.into())
    }

    /// Set membership: `IN (a,b,c)`.
    pub fn is_in<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let list = values.into_iter().map(Into::into).collect();
        self.compare("IN ", Operand::List(list))
    }

    /// Membership in a subquery: `IN (SELECT ...)`.
    ///
    /// The subquery contributes its SQL text only. Parameters set on `select`
    /// are not carried over, so bind any `?` it contains on the outer command,
    /// in textual order.
    pub fn is_in_select(self, select: Select) -> Self {
        self.compare("IN ", Operand::Subquery(Box::new(select)))
    }

    /// Appends another filter as a parenthesized group.
    pub fn group(mut self, other: Filter) -> Self {
        self.operand(Operand::Filter(other));
        self
    }

    pub fn is_null(mut self) -> Self {
        self.push("IS NULL");
        self
    }

    pub fn is_not_null(mut self) -> Self {
        self.push("IS NOT NULL");
        self
    }

    /// Continues this filter with ` AND `.
    pub fn and(mut self) -> Self {
        self.push(" AND ");
        self
    }

    /// Continues this filter with ` OR `.
    pub fn or(mut self) -> Self {
        self.push(" OR ");
        self
    }

    /// Joins another filter with ` AND `.
    pub fn and_with(self, other: Filter) -> Self {
        self.and().merge(other)
    }

    /// Joins another filter with ` OR `.
    pub fn or_with(self, other: Filter) -> Self {
        self.or().merge(other)
    }

    pub fn not(mut self) -> Self {
        self.push("NOT ");
        self
    }

    /// Opens a parenthesized group.
    pub fn starts(mut self) -> Self {
        self.push("(");
        self.depth += 1;
        self
    }

    /// Closes the innermost open group; ignored when none is open.
    pub fn ends(mut self) -> Self {
        if self.depth == 0 {
            warn!("ignoring unbalanced filter group close");
            return self;
        }
        self.push(")");
        self.depth -= 1;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Renders the predicate text.
    pub fn to_sql(&self) -> Result<String> {
        let mut sql = String::new();
        for part in &self.parts {
            match part {
                Part::Sql(text) => sql.push_str(text),
                Part::Subquery(select) => {
                    sql.push('(');
                    sql.push_str(&select.to_sql()?);
                    sql.push(')');
                }
            }
        }
        for _ in 0..self.depth {
            sql.push(')');
        }
        Ok(sql)
    }

    fn compare(mut self, operator: &str, value: Operand) -> Self {
        self.push(operator);
        self.operand(value);
        self
    }

    fn operand(&mut self, value: Operand) {
        match value {
            Operand::Literal(value) => self.push(&value.to_sql_literal()),
            Operand::List(values) => {
                let items: Vec<String> = values.iter().map(Value::to_sql_literal).collect();
                self.push(&format!("({})", items.join(",")));
            }
            Operand::Filter(filter) => {
                self.push("(");
                self.append(filter);
                self.push(")");
            }
            Operand::Subquery(select) => self.parts.push(Part::Subquery(select)),
        }
    }

    fn merge(mut self, other: Filter) -> Self {
        self.append(other);
        self
    }

    /// Appends another filter's parts, closing its open groups.
    fn append(&mut self, other: Filter) {
        let depth = other.depth;
        for part in other.parts {
            match part {
                Part::Sql(text) => self.push(&text),
                subquery => self.parts.push(subquery),
            }
        }
        for _ in 0..depth {
            self.push(")");
        }
    }

    fn push(&mut self, text: &str) {
        if let Some(Part::Sql(last)) = self.parts.last_mut() {
            last.push_str(text);
        } else {
            self.parts.push(Part::Sql(text.to_string()));
        }
    }
}

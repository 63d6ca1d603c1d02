use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed query. Clauses always execute in the order of the fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Query {
    pub match_clause: Option<MatchClause>,
    pub where_clause: Option<Expression>,
    pub create_clause: Option<CreateClause>,
    pub set_clause: Option<SetClause>,
    pub delete_clause: Option<DeleteClause>,
    pub return_clause: Option<ReturnClause>,
    pub order_by: Option<OrderByClause>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl Query {
    /// True when executing the query can change the graph.
    pub fn is_write(&self) -> bool {
        self.create_clause.is_some() || self.set_clause.is_some() || self.delete_clause.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchClause {
    pub patterns: Vec<Pattern>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateClause {
    pub patterns: Vec<Pattern>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetClause {
    pub items: Vec<SetItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SetItem {
    /// `n.key = expr`
    Property {
        variable: String,
        property: String,
        value: Expression,
    },
    /// `n:Label:Other`
    Labels {
        variable: String,
        labels: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteClause {
    pub detach: bool,
    pub variables: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReturnClause {
    pub distinct: bool,
    pub items: Vec<ReturnItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReturnItem {
    pub expression: Expression,
    pub alias: Option<String>,
}

impl ReturnItem {
    /// Column name: the alias, or the expression as written.
    pub fn column_name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => self.expression.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderByClause {
    pub items: Vec<OrderByItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderByItem {
    pub expression: Expression,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A path pattern: nodes and relationships alternating, starting and ending
/// with a node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pattern {
    pub elements: Vec<PathElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PathElement {
    Node(NodePattern),
    Relationship(RelationshipPattern),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub labels: Vec<String>,
    pub properties: Option<PropertyMap>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipPattern {
    pub variable: Option<String>,
    /// Alternative types (`:A|B`); empty matches any type.
    pub types: Vec<String>,
    pub direction: RelationshipDirection,
    pub properties: Option<PropertyMap>,
    pub variable_length: Option<VariableLength>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RelationshipDirection {
    LeftToRight,
    RightToLeft,
    Undirected,
}

/// Hop bounds of a variable-length relationship. Missing bounds are filled in
/// at execution time (`min` defaults to 1, `max` to the configured ceiling).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariableLength {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PropertyMap {
    pub properties: Vec<PropertyPair>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyPair {
    pub key: String,
    pub value: Expression,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Variable(String),
    Parameter(String), // $param
    PropertyAccess(PropertyAccess),
    List(Vec<Expression>),
    Binary(Box<BinaryExpression>),
    Unary(Box<UnaryExpression>),
    FunctionCall(FunctionCall),
}

impl Expression {
    /// True when the expression contains an aggregate function call.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expression::FunctionCall(call) => {
                call.is_aggregate() || call.args.iter().any(Expression::contains_aggregate)
            }
            Expression::Binary(b) => b.left.contains_aggregate() || b.right.contains_aggregate(),
            Expression::Unary(u) => u.operand.contains_aggregate(),
            Expression::List(items) => items.iter().any(Expression::contains_aggregate),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyAccess {
    pub variable: String,
    pub property: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BinaryExpression {
    pub left: Expression,
    pub operator: BinaryOperator,
    pub right: Expression,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BinaryOperator {
    Or,
    Xor,
    And,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    StartsWith,
    EndsWith,
    Contains,
    RegexMatch,
    In,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Or => "OR",
            BinaryOperator::Xor => "XOR",
            BinaryOperator::And => "AND",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::StartsWith => "STARTS WITH",
            BinaryOperator::EndsWith => "ENDS WITH",
            BinaryOperator::Contains => "CONTAINS",
            BinaryOperator::RegexMatch => "=~",
            BinaryOperator::In => "IN",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnaryExpression {
    pub operator: UnaryOperator,
    pub operand: Expression,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    /// Name as written in the query; lookup is case-insensitive.
    pub name: String,
    pub args: Vec<Expression>,
    pub distinct: bool,
    /// `COUNT(*)`
    pub star: bool,
}

pub const AGGREGATE_FUNCTIONS: [&str; 6] = ["COUNT", "SUM", "AVG", "MIN", "MAX", "COLLECT"];

impl FunctionCall {
    pub fn is_aggregate(&self) -> bool {
        AGGREGATE_FUNCTIONS
            .iter()
            .any(|f| f.eq_ignore_ascii_case(&self.name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{s}'"),
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Literal::Float(x) => write!(f, "{x}"),
            Literal::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Literal::Null => write!(f, "null"),
        }
    }
}

// Renders expressions the way they are written; RETURN uses this text as the
// default column name and ORDER BY matches against it.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(lit) => write!(f, "{lit}"),
            Expression::Variable(name) => write!(f, "{name}"),
            Expression::Parameter(name) => write!(f, "${name}"),
            Expression::PropertyAccess(access) => {
                write!(f, "{}.{}", access.variable, access.property)
            }
            Expression::List(items) => {
                write!(f, "[")?;
                write_args(f, items)?;
                write!(f, "]")
            }
            Expression::Binary(b) => {
                write_operand(f, &b.left)?;
                write!(f, " {} ", b.operator.symbol())?;
                write_operand(f, &b.right)
            }
            Expression::Unary(u) => match u.operator {
                UnaryOperator::Not => {
                    write!(f, "NOT ")?;
                    write_operand(f, &u.operand)
                }
                UnaryOperator::Negate => {
                    write!(f, "-")?;
                    write_operand(f, &u.operand)
                }
                UnaryOperator::IsNull => {
                    write_operand(f, &u.operand)?;
                    write!(f, " IS NULL")
                }
                UnaryOperator::IsNotNull => {
                    write_operand(f, &u.operand)?;
                    write!(f, " IS NOT NULL")
                }
            },
            Expression::FunctionCall(call) => {
                write!(f, "{}(", call.name)?;
                if call.star {
                    write!(f, "*")?;
                } else {
                    if call.distinct {
                        write!(f, "DISTINCT ")?;
                    }
                    write_args(f, &call.args)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expression) -> fmt::Result {
    match expr {
        Expression::Binary(_) => write!(f, "({expr})"),
        _ => write!(f, "{expr}"),
    }
}

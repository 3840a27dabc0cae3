//! The expression model.
//!
//! Expressions are immutable value trees. Building one never touches a
//! backend; a [`Compiler`](crate::compiler::Compiler) later renders it into
//! SQL text plus an ordered parameter list.
//!
//! Every node reports a [`Kind`], and every kind declares a supertype through
//! [`Kind::parent`]. The compiler walks that chain when a registry has no
//! renderer for the exact kind, so one renderer for [`Kind::BinaryOper`] serves
//! `=`, `<`, `LIKE` and the rest.

pub mod identifiers;
pub mod statements;

pub use identifiers::{is_safe_token, quote_identifier, unquote_identifier, SQL_RESERVED_WORDS};
pub use statements::{Alias, Delete, Insert, Join, JoinKind, Select, Update};

use crate::value::Value;
use crate::variables::Variable;

/// The kind of an expression node, used as the compiler registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Expr,
    Comparable,
    Literal,
    Param,
    Column,
    Raw,
    Token,
    Table,
    Func,
    Not,
    In,
    BinaryOper,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    Add,
    Sub,
    Mul,
    Div,
    CompoundOper,
    And,
    Or,
    SuffixExpr,
    Asc,
    Desc,
    Alias,
    JoinExpr,
    Join,
    LeftJoin,
    RightJoin,
    NaturalJoin,
    Select,
    Insert,
    Update,
    Delete,
}

impl Kind {
    /// The declared supertype, `None` only for [`Kind::Expr`].
    pub fn parent(self) -> Option<Kind> {
        use Kind::*;
        Some(match self {
            Expr => return None,
            Comparable | Raw | Token | Alias | JoinExpr | Select | Insert | Update | Delete => {
                Expr
            }
            Literal | Param | Column | Func | Not | In | BinaryOper | CompoundOper
            | SuffixExpr => Comparable,
            Table => Token,
            Eq | Ne | Gt | Ge | Lt | Le | Like | Add | Sub | Mul | Div => BinaryOper,
            And | Or => CompoundOper,
            Asc | Desc => SuffixExpr,
            Join | LeftJoin | RightJoin | NaturalJoin => JoinExpr,
        })
    }

    /// This kind followed by every supertype up to [`Kind::Expr`].
    pub fn lineage(self) -> impl Iterator<Item = Kind> {
        std::iter::successors(Some(self), |k| k.parent())
    }
}

/// Binding strength used to decide where parentheses are needed.
pub mod precedence {
    pub const STATEMENT: u16 = 0;
    pub const CLAUSE: u16 = 1;
    pub const JOIN: u16 = 2;
    pub const ALIAS: u16 = 3;
    pub const SUFFIX: u16 = 5;
    pub const OR: u16 = 10;
    pub const AND: u16 = 20;
    pub const NOT: u16 = 30;
    pub const COMPARISON: u16 = 40;
    pub const ADDITIVE: u16 = 50;
    pub const MULTIPLICATIVE: u16 = 60;
    pub const ATOM: u16 = 1000;
}

/// A two-operand operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Like => "LIKE",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    fn kind(self) -> Kind {
        match self {
            BinaryOp::Eq => Kind::Eq,
            BinaryOp::Ne => Kind::Ne,
            BinaryOp::Gt => Kind::Gt,
            BinaryOp::Ge => Kind::Ge,
            BinaryOp::Lt => Kind::Lt,
            BinaryOp::Le => Kind::Le,
            BinaryOp::Like => Kind::Like,
            BinaryOp::Add => Kind::Add,
            BinaryOp::Sub => Kind::Sub,
            BinaryOp::Mul => Kind::Mul,
            BinaryOp::Div => Kind::Div,
        }
    }

    fn precedence(self) -> u16 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => precedence::ADDITIVE,
            BinaryOp::Mul | BinaryOp::Div => precedence::MULTIPLICATIVE,
            _ => precedence::COMPARISON,
        }
    }
}

/// An n-ary boolean connective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundOp {
    And,
    Or,
}

impl CompoundOp {
    pub fn keyword(self) -> &'static str {
        match self {
            CompoundOp::And => "AND",
            CompoundOp::Or => "OR",
        }
    }
}

/// Ordering suffix for ORDER BY items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixOp {
    Asc,
    Desc,
}

impl SuffixOp {
    pub fn keyword(self) -> &'static str {
        match self {
            SuffixOp::Asc => "ASC",
            SuffixOp::Desc => "DESC",
        }
    }
}

/// A column reference, optionally qualified by its table.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub table: Option<String>,
    /// The server fills this column in when no value is supplied.
    pub server_default: bool,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            server_default: false,
        }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: Some(table.into()),
            server_default: false,
        }
    }

    /// Mark the column as filled in by the server when omitted.
    pub fn with_server_default(mut self) -> Self {
        self.server_default = true;
        self
    }
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value, bound as a parameter (NULL is rendered inline).
    Literal(Value),
    /// A variable, bound as a parameter.
    Param(Variable),
    Column(Column),
    /// SQL text emitted verbatim.
    Raw(String),
    /// An identifier, quoted when unsafe or reserved.
    Token(String),
    /// A table name, rendered as a token.
    Table(String),
    Func {
        name: String,
        args: Vec<Expr>,
    },
    Not(Box<Expr>),
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compound {
        op: CompoundOp,
        items: Vec<Expr>,
    },
    Suffix {
        op: SuffixOp,
        expr: Box<Expr>,
    },
    Alias(Box<Alias>),
    Join(Box<Join>),
    Select(Box<Select>),
    Insert(Box<Insert>),
    Update(Box<Update>),
    Delete(Box<Delete>),
}

impl Expr {
    pub fn kind(&self) -> Kind {
        match self {
            Expr::Literal(_) => Kind::Literal,
            Expr::Param(_) => Kind::Param,
            Expr::Column(_) => Kind::Column,
            Expr::Raw(_) => Kind::Raw,
            Expr::Token(_) => Kind::Token,
            Expr::Table(_) => Kind::Table,
            Expr::Func { .. } => Kind::Func,
            Expr::Not(_) => Kind::Not,
            Expr::In { .. } => Kind::In,
            Expr::Binary { op, .. } => op.kind(),
            Expr::Compound { op: CompoundOp::And, .. } => Kind::And,
            Expr::Compound { op: CompoundOp::Or, .. } => Kind::Or,
            Expr::Suffix { op: SuffixOp::Asc, .. } => Kind::Asc,
            Expr::Suffix { op: SuffixOp::Desc, .. } => Kind::Desc,
            Expr::Alias(_) => Kind::Alias,
            Expr::Join(join) => join.kind.kind(),
            Expr::Select(_) => Kind::Select,
            Expr::Insert(_) => Kind::Insert,
            Expr::Update(_) => Kind::Update,
            Expr::Delete(_) => Kind::Delete,
        }
    }

    pub fn precedence(&self) -> u16 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Compound { op: CompoundOp::And, .. } => precedence::AND,
            Expr::Compound { op: CompoundOp::Or, .. } => precedence::OR,
            Expr::Not(_) => precedence::NOT,
            Expr::In { .. } => precedence::COMPARISON,
            Expr::Suffix { .. } => precedence::SUFFIX,
            Expr::Alias(_) => precedence::ALIAS,
            Expr::Join(_) => precedence::JOIN,
            Expr::Select(_) | Expr::Insert(_) | Expr::Update(_) | Expr::Delete(_) => {
                precedence::STATEMENT
            }
            _ => precedence::ATOM,
        }
    }

    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn null() -> Self {
        Expr::Literal(Value::Null)
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    pub fn token(name: impl Into<String>) -> Self {
        Expr::Token(name.into())
    }

    pub fn table(name: impl Into<String>) -> Self {
        Expr::Table(name.into())
    }

    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Func {
            name: name.into(),
            args,
        }
    }

    /// `COUNT(*)`
    pub fn count_all() -> Self {
        Self::func("COUNT", vec![Expr::raw("*")])
    }

    pub fn count(expr: impl Into<Expr>) -> Self {
        Self::func("COUNT", vec![expr.into()])
    }

    pub fn max(expr: impl Into<Expr>) -> Self {
        Self::func("MAX", vec![expr.into()])
    }

    pub fn min(expr: impl Into<Expr>) -> Self {
        Self::func("MIN", vec![expr.into()])
    }

    pub fn sum(expr: impl Into<Expr>) -> Self {
        Self::func("SUM", vec![expr.into()])
    }

    pub fn avg(expr: impl Into<Expr>) -> Self {
        Self::func("AVG", vec![expr.into()])
    }

    pub fn lower(expr: impl Into<Expr>) -> Self {
        Self::func("LOWER", vec![expr.into()])
    }

    pub fn upper(expr: impl Into<Expr>) -> Self {
        Self::func("UPPER", vec![expr.into()])
    }

    pub fn binary(op: BinaryOp, left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left.into()),
            right: Box::new(right.into()),
        }
    }

    pub fn eq(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Eq, self, other)
    }

    pub fn ne(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Ne, self, other)
    }

    pub fn gt(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Gt, self, other)
    }

    pub fn ge(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Ge, self, other)
    }

    pub fn lt(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Lt, self, other)
    }

    pub fn le(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Le, self, other)
    }

    pub fn like(self, pattern: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Like, self, pattern)
    }

    pub fn and(self, other: impl Into<Expr>) -> Self {
        Self::all(vec![self, other.into()])
    }

    pub fn or(self, other: impl Into<Expr>) -> Self {
        Self::any(vec![self, other.into()])
    }

    /// Conjunction of every item.
    pub fn all(items: Vec<Expr>) -> Self {
        Expr::Compound {
            op: CompoundOp::And,
            items,
        }
    }

    /// Disjunction of every item.
    pub fn any(items: Vec<Expr>) -> Self {
        Expr::Compound {
            op: CompoundOp::Or,
            items,
        }
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    pub fn is_in(self, values: Vec<Expr>) -> Self {
        Expr::In {
            expr: Box::new(self),
            values,
        }
    }

    pub fn asc(self) -> Self {
        Expr::Suffix {
            op: SuffixOp::Asc,
            expr: Box::new(self),
        }
    }

    pub fn desc(self) -> Self {
        Expr::Suffix {
            op: SuffixOp::Desc,
            expr: Box::new(self),
        }
    }

    /// `self AS name`. Without a name one is generated at compile time.
    pub fn alias(self, name: Option<&str>) -> Self {
        Expr::Alias(Box::new(Alias {
            expr: self,
            name: name.map(str::to_string),
        }))
    }
}

impl From<Column> for Expr {
    fn from(c: Column) -> Self {
        Expr::Column(c)
    }
}

impl From<Variable> for Expr {
    fn from(v: Variable) -> Self {
        Expr::Param(v)
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

macro_rules! literal_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Expr {
                fn from(v: $ty) -> Self {
                    Expr::Literal(v.into())
                }
            }
        )*
    };
}

literal_from!(bool, i32, i64, f64, &str, String, Vec<u8>);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_lineage() {
        let chain: Vec<Kind> = Kind::Table.lineage().collect();
        assert_eq!(chain, vec![Kind::Table, Kind::Token, Kind::Expr]);

        let chain: Vec<Kind> = Kind::Like.lineage().collect();
        assert_eq!(
            chain,
            vec![Kind::Like, Kind::BinaryOper, Kind::Comparable, Kind::Expr]
        );
    }

    #[test]
    fn test_builders_are_pure() {
        let col = Column::qualified("test", "id");
        let expr = Expr::from(col.clone()).eq(10).and(Expr::from(col).lt(20));
        assert_eq!(expr.kind(), Kind::And);
        let Expr::Compound { items, .. } = &expr else {
            panic!("expected a compound");
        };
        assert_eq!(items[0].kind(), Kind::Eq);
        assert_eq!(items[1].kind(), Kind::Lt);
        assert_eq!(expr.clone(), expr);
    }
}

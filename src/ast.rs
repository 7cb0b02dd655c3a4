//! 查询对象模型：与方言无关的过滤树、关联、排序、分页、集合运算与递归描述

use sea_query::Value;
use serde::{Deserialize, Serialize};

/// 查询对象, 描述一次数据检索的完整意图
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    /// 目标实体名
    pub entity: String,
    /// 条件节点列表, 按顺序以各自的连接符组合
    pub conditions: Vec<Condition>,
    pub sorts: Vec<Sort>,
    pub joins: Vec<Join>,
    pub combines: Vec<Combine>,
    /// 自关联递归（祖先/后代）
    pub recursion: Option<Recursion>,
    /// 分页窗口
    pub paging: Option<Paging>,
    /// 输出字段（属性名）
    pub fields: Vec<String>,
    pub distinct: bool,
    pub group_by: Vec<FieldRef>,
    pub having: Vec<Condition>,
    /// 执行模式：结构化或原始文本
    pub mode: ExecutionMode,
}

impl Query {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Default::default()
        }
    }

    /// 原始文本查询, 忽略所有结构化字段
    pub fn text(entity: impl Into<String>, text: impl Into<String>, parameters: Vec<(String, Literal)>) -> Self {
        Self {
            entity: entity.into(),
            mode: ExecutionMode::Text(RawScript {
                text: text.into(),
                parameters,
            }),
            ..Default::default()
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.mode, ExecutionMode::Text(_))
    }

    /// 以 AND 追加一个条件
    pub fn and(mut self, field: impl Into<FieldRef>, operator: Operator, value: impl Into<CriterionValue>) -> Self {
        self.conditions
            .push(Condition::Criterion(Criterion::new(field, operator, value)));
        self
    }

    /// 以 OR 追加一个条件
    pub fn or(mut self, field: impl Into<FieldRef>, operator: Operator, value: impl Into<CriterionValue>) -> Self {
        self.conditions.push(Condition::Criterion(
            Criterion::new(field, operator, value).connector(Connector::Or),
        ));
        self
    }

    /// 追加一个条件节点（单条件或分组）
    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn sort(mut self, field: impl Into<FieldRef>, desc: bool) -> Self {
        self.sorts.push(Sort {
            field: field.into(),
            desc,
        });
        self
    }

    pub fn page(mut self, offset: u64, size: u64) -> Self {
        self.paging = Some(Paging { offset, size });
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn combine(mut self, operator: CombineOperator, query: Query) -> Self {
        self.combines.push(Combine { operator, query });
        self
    }

    pub fn recurse(mut self, direction: RecursionDirection, data_field: impl Into<String>, relation_field: impl Into<String>) -> Self {
        self.recursion = Some(Recursion {
            direction,
            data_field: data_field.into(),
            relation_field: relation_field.into(),
        });
        self
    }
}

/// 执行模式
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Structured,
    /// 原样透传的脚本及其参数
    Text(RawScript),
}

/// 原始 SQL 文本及其参数
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawScript {
    pub text: String,
    pub parameters: Vec<(String, Literal)>,
}

/// 条件节点：单个条件, 或作为整体括起来的一组条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Criterion(Criterion),
    Group {
        #[serde(default)]
        connector: Connector,
        conditions: Vec<Condition>,
    },
}

impl Condition {
    pub fn group(connector: Connector, conditions: Vec<Condition>) -> Self {
        Condition::Group {
            connector,
            conditions,
        }
    }

    pub fn connector(&self) -> Connector {
        match self {
            Condition::Criterion(criterion) => criterion.connector,
            Condition::Group { connector, .. } => *connector,
        }
    }
}

impl From<Criterion> for Condition {
    fn from(criterion: Criterion) -> Self {
        Condition::Criterion(criterion)
    }
}

/// 与前一个兄弟节点的逻辑连接符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connector {
    #[default]
    And,
    Or,
}

impl Connector {
    pub fn keyword(&self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

/// 单个 字段/运算符/值 条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub field: FieldRef,
    pub operator: Operator,
    #[serde(default)]
    pub value: CriterionValue,
    #[serde(default)]
    pub connector: Connector,
}

impl Criterion {
    pub fn new(field: impl Into<FieldRef>, operator: Operator, value: impl Into<CriterionValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            connector: Connector::And,
        }
    }

    pub fn connector(mut self, connector: Connector) -> Self {
        self.connector = connector;
        self
    }
}

/// 条件运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    In,
    NotIn,
    Like,
    BeginLike,
    EndLike,
    NotLike,
    NotBeginLike,
    NotEndLike,
    IsNull,
    NotNull,
}

impl Operator {
    pub const ALL: [Operator; 16] = [
        Operator::Equal,
        Operator::NotEqual,
        Operator::GreaterThan,
        Operator::GreaterThanOrEqual,
        Operator::LessThan,
        Operator::LessThanOrEqual,
        Operator::In,
        Operator::NotIn,
        Operator::Like,
        Operator::BeginLike,
        Operator::EndLike,
        Operator::NotLike,
        Operator::NotBeginLike,
        Operator::NotEndLike,
        Operator::IsNull,
        Operator::NotNull,
    ];

    /// IS NULL / IS NOT NULL 不绑定参数
    pub fn needs_parameter(&self) -> bool {
        !matches!(self, Operator::IsNull | Operator::NotNull)
    }

    /// IN / NOT IN 的值展开为参数列表
    pub fn is_collection(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

/// 条件值：字面量、集合或子查询
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CriterionValue {
    Literal(Literal),
    Collection(Vec<Literal>),
    Subquery(Box<Query>),
}

impl Default for CriterionValue {
    fn default() -> Self {
        CriterionValue::Literal(Literal::Null)
    }
}

impl From<Literal> for CriterionValue {
    fn from(literal: Literal) -> Self {
        CriterionValue::Literal(literal)
    }
}

impl From<Vec<Literal>> for CriterionValue {
    fn from(values: Vec<Literal>) -> Self {
        CriterionValue::Collection(values)
    }
}

impl From<Query> for CriterionValue {
    fn from(query: Query) -> Self {
        CriterionValue::Subquery(Box::new(query))
    }
}

impl From<i64> for CriterionValue {
    fn from(v: i64) -> Self {
        CriterionValue::Literal(Literal::Number(v))
    }
}

impl From<i32> for CriterionValue {
    fn from(v: i32) -> Self {
        CriterionValue::Literal(Literal::Number(v.into()))
    }
}

impl From<f64> for CriterionValue {
    fn from(v: f64) -> Self {
        CriterionValue::Literal(Literal::Float(v))
    }
}

impl From<&str> for CriterionValue {
    fn from(v: &str) -> Self {
        CriterionValue::Literal(Literal::String(v.to_string()))
    }
}

/// 字面量值
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    #[default]
    Null,
    Bool(bool),
    Number(i64),
    Float(f64),
    String(String),
}

impl Literal {
    /// 转换为 sea-query 绑定值
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Null => Value::String(None),
            Literal::Bool(b) => Value::Bool(Some(*b)),
            Literal::Number(n) => Value::BigInt(Some(*n)),
            Literal::Float(f) => Value::Double(Some(*f)),
            Literal::String(s) => Value::String(Some(Box::new(s.clone()))),
        }
    }

    /// 作为文本拼接时的形式（LIKE 通配、分表后缀）
    pub fn as_text(&self) -> String {
        match self {
            Literal::Null => String::new(),
            Literal::Bool(b) => b.to_string(),
            Literal::Number(n) => n.to_string(),
            Literal::Float(f) => f.to_string(),
            Literal::String(s) => s.clone(),
        }
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Number(v)
    }
}

impl From<i32> for Literal {
    fn from(v: i32) -> Self {
        Literal::Number(v.into())
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Float(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::String(v.to_string())
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Literal::Bool(v)
    }
}

/// 字段引用, 可带一个命名转换（例如字符串长度）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub name: String,
    #[serde(default)]
    pub conversion: Option<FieldConversion>,
}

impl FieldRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conversion: None,
        }
    }

    pub fn converted(name: impl Into<String>, conversion: FieldConversion) -> Self {
        Self {
            name: name.into(),
            conversion: Some(conversion),
        }
    }
}

impl From<&str> for FieldRef {
    fn from(name: &str) -> Self {
        FieldRef::new(name)
    }
}

impl From<String> for FieldRef {
    fn from(name: String) -> Self {
        FieldRef::new(name)
    }
}

/// 字段转换
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldConversion {
    CharLength,
    Trim,
    JsonValue { path: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    pub field: FieldRef,
    #[serde(default)]
    pub desc: bool,
}

/// 分页窗口, 对应 `LIMIT offset,size`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub offset: u64,
    pub size: u64,
}

/// 关联类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

/// 关联条件中字段所属的一侧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinSide {
    #[default]
    Source,
    Target,
}

/// 关联实体, 例如 `User INNER JOIN Order`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    #[serde(default)]
    pub kind: JoinKind,
    /// 被关联的查询对象（本身可以带关联与集合运算）
    pub target: Query,
    /// 显式关联条件；为空时按主键或声明的关系推导
    #[serde(default)]
    pub criteria: Vec<JoinCriterion>,
    /// 关联后的额外过滤条件, 只进入 WHERE
    #[serde(default)]
    pub extra_filter: Option<Query>,
}

impl Join {
    pub fn new(kind: JoinKind, target: Query) -> Self {
        Self {
            kind,
            target,
            criteria: Vec::new(),
            extra_filter: None,
        }
    }

    /// 源字段与目标字段相等
    pub fn on(mut self, source: impl Into<FieldRef>, target: impl Into<FieldRef>) -> Self {
        self.criteria.push(JoinCriterion::Fields {
            source: source.into(),
            operator: Operator::Equal,
            target: target.into(),
            connector: Connector::And,
        });
        self
    }

    pub fn criterion(mut self, criterion: JoinCriterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    pub fn extra_filter(mut self, filter: Query) -> Self {
        self.extra_filter = Some(filter);
        self
    }
}

/// 关联条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinCriterion {
    /// 源字段 运算符 目标字段
    Fields {
        source: FieldRef,
        #[serde(default = "default_join_operator")]
        operator: Operator,
        target: FieldRef,
        #[serde(default)]
        connector: Connector,
    },
    /// 某一侧字段与值比较（值可以是子查询）
    Value {
        #[serde(default)]
        side: JoinSide,
        field: FieldRef,
        operator: Operator,
        #[serde(default)]
        value: CriterionValue,
        #[serde(default)]
        connector: Connector,
    },
    /// 某一侧的一组条件, 整体括起来
    Group {
        #[serde(default)]
        side: JoinSide,
        conditions: Vec<Condition>,
        #[serde(default)]
        connector: Connector,
    },
}

fn default_join_operator() -> Operator {
    Operator::Equal
}

impl JoinCriterion {
    pub fn connector(&self) -> Connector {
        match self {
            JoinCriterion::Fields { connector, .. }
            | JoinCriterion::Value { connector, .. }
            | JoinCriterion::Group { connector, .. } => *connector,
        }
    }
}

/// 集合运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineOperator {
    Union,
    #[default]
    UnionAll,
    Intersect,
    Except,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combine {
    #[serde(default)]
    pub operator: CombineOperator,
    pub query: Query,
}

/// 递归方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecursionDirection {
    Ancestors,
    Descendants,
}

/// 自关联递归：数据字段与关系字段（例如 `Id` / `ParentId`）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recursion {
    pub direction: RecursionDirection,
    pub data_field: String,
    pub relation_field: String,
}

use ahash::AHashMap;
use std::fmt;

use super::error::{ExecError, ExecResult};
use super::operator::{Buffered, Fetch, Operator, expect_children};
use super::values::Values;
use crate::record::{ColumnDef, DataType, Record, RecordError, RowSchema, Value};

/// Reduction applied to each group's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
            AggregateOp::Sum => "SUM",
            AggregateOp::Avg => "AVG",
            AggregateOp::Count => "COUNT",
        };
        write!(f, "{}", name)
    }
}

/// Value a group is keyed on. One aggregator only ever sees one variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Int(i32),
    Text(String),
}

impl GroupKey {
    fn from_value(value: &Value, group_type: DataType) -> ExecResult<Self> {
        match (value, group_type) {
            (Value::Int(i), DataType::Int) => Ok(GroupKey::Int(*i)),
            (Value::String(s), DataType::Char(_)) => Ok(GroupKey::Text(s.clone())),
            _ => Err(ExecError::TypeMismatch {
                expected: group_type.to_string(),
                actual: format!("{:?}", value),
            }),
        }
    }

    fn into_value(self) -> Value {
        match self {
            GroupKey::Int(i) => Value::Int(i),
            GroupKey::Text(s) => Value::String(s),
        }
    }
}

/// Incrementally folds rows into per-group results
pub trait Aggregator {
    /// Add one row's contribution to its group
    fn merge_row(&mut self, record: &Record) -> ExecResult<()>;

    /// Snapshot of the current results: `(group, value)` rows, or a single
    /// `(value)` row without grouping. Groups come out in the order they
    /// were first seen.
    fn iterator(&self) -> Buffered<Values>;

    fn result_schema(&self) -> RowSchema;
}

/// Where the group key comes from
#[derive(Debug, Clone, Copy)]
struct Grouping {
    field: usize,
    data_type: DataType,
}

fn parse_grouping(
    group_by: Option<usize>,
    group_type: Option<DataType>,
) -> ExecResult<Option<Grouping>> {
    let Some(field) = group_by else {
        return Ok(None);
    };
    match group_type {
        Some(data_type @ (DataType::Int | DataType::Char(_))) => {
            Ok(Some(Grouping { field, data_type }))
        }
        Some(other) => Err(ExecError::InvalidGroupType(other.to_string())),
        None => Err(ExecError::InvalidGroupType(
            "grouping requires a group type".to_string(),
        )),
    }
}

/// Running lists of contributed values, either one list or one per group
enum Accumulator<T> {
    Ungrouped(Vec<T>),
    Grouped {
        index: AHashMap<GroupKey, usize>,
        groups: Vec<(GroupKey, Vec<T>)>,
    },
}

impl<T> Accumulator<T> {
    fn new(grouped: bool) -> Self {
        if grouped {
            Accumulator::Grouped {
                index: AHashMap::new(),
                groups: Vec::new(),
            }
        } else {
            Accumulator::Ungrouped(Vec::new())
        }
    }

    fn push(&mut self, key: Option<GroupKey>, value: T) {
        match (self, key) {
            (Accumulator::Ungrouped(values), _) => values.push(value),
            (Accumulator::Grouped { index, groups }, Some(key)) => match index.get(&key) {
                Some(&slot) => groups[slot].1.push(value),
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push((key, vec![value]));
                }
            },
            // Construction guarantees grouped accumulators always get a key
            (Accumulator::Grouped { .. }, None) => {}
        }
    }

    /// One output row per group, reduced with `reduce`
    fn rows(&self, reduce: impl Fn(&[T]) -> Option<Value>) -> Vec<Record> {
        match self {
            Accumulator::Ungrouped(values) => reduce(values.as_slice())
                .map(|v| vec![Record::new(vec![v])])
                .unwrap_or_default(),
            Accumulator::Grouped { groups, .. } => groups
                .iter()
                .filter_map(|(key, values)| {
                    reduce(values.as_slice())
                        .map(|v| Record::new(vec![key.clone().into_value(), v]))
                })
                .collect(),
        }
    }
}

fn field<'r>(record: &'r Record, index: usize) -> ExecResult<&'r Value> {
    record.get(index).ok_or_else(|| {
        RecordError::FieldIndexOutOfRange {
            index,
            num_fields: record.len(),
        }
        .into()
    })
}

fn result_schema(grouping: Option<Grouping>, op: AggregateOp) -> RowSchema {
    let value = RowSchema::single(op.to_string(), DataType::Int);
    match grouping {
        Some(g) => RowSchema::merge(&RowSchema::single("group", g.data_type), &value),
        None => value,
    }
}

/// Aggregator over a text field. Only COUNT is defined for text.
pub struct StringAggregator {
    grouping: Option<Grouping>,
    agg_field: usize,
    state: Accumulator<String>,
}

impl StringAggregator {
    pub fn new(
        group_by: Option<usize>,
        group_type: Option<DataType>,
        agg_field: usize,
        op: AggregateOp,
    ) -> ExecResult<Self> {
        if op != AggregateOp::Count {
            return Err(ExecError::UnsupportedAggregate(format!(
                "{} over text values",
                op
            )));
        }
        let grouping = parse_grouping(group_by, group_type)?;
        Ok(Self {
            grouping,
            agg_field,
            state: Accumulator::new(grouping.is_some()),
        })
    }
}

impl Aggregator for StringAggregator {
    fn merge_row(&mut self, record: &Record) -> ExecResult<()> {
        let key = match self.grouping {
            Some(g) => Some(GroupKey::from_value(field(record, g.field)?, g.data_type)?),
            None => None,
        };
        let value = field(record, self.agg_field)?;
        let value = value.as_str().ok_or_else(|| ExecError::TypeMismatch {
            expected: "CHAR".to_string(),
            actual: format!("{:?}", value),
        })?;
        self.state.push(key, value.to_string());
        Ok(())
    }

    fn iterator(&self) -> Buffered<Values> {
        let rows = self.state.rows(|values| Some(Value::Int(values.len() as i32)));
        Values::new(self.result_schema(), rows).into_operator()
    }

    fn result_schema(&self) -> RowSchema {
        result_schema(self.grouping, AggregateOp::Count)
    }
}

/// Aggregator over an INT field
pub struct IntegerAggregator {
    grouping: Option<Grouping>,
    agg_field: usize,
    op: AggregateOp,
    state: Accumulator<i32>,
}

impl IntegerAggregator {
    pub fn new(
        group_by: Option<usize>,
        group_type: Option<DataType>,
        agg_field: usize,
        op: AggregateOp,
    ) -> ExecResult<Self> {
        let grouping = parse_grouping(group_by, group_type)?;
        Ok(Self {
            grouping,
            agg_field,
            op,
            state: Accumulator::new(grouping.is_some()),
        })
    }

    fn reduce(op: AggregateOp, values: &[i32]) -> Option<Value> {
        if op == AggregateOp::Count {
            return Some(Value::Int(values.len() as i32));
        }
        if values.is_empty() {
            return None;
        }
        let sum: i64 = values.iter().map(|&v| i64::from(v)).sum();
        let reduced = match op {
            AggregateOp::Min => values.iter().copied().min()?,
            AggregateOp::Max => values.iter().copied().max()?,
            // Wraps on overflow, like INT arithmetic
            AggregateOp::Sum => sum as i32,
            AggregateOp::Avg => (sum / values.len() as i64) as i32,
            AggregateOp::Count => values.len() as i32,
        };
        Some(Value::Int(reduced))
    }
}

impl Aggregator for IntegerAggregator {
    fn merge_row(&mut self, record: &Record) -> ExecResult<()> {
        let key = match self.grouping {
            Some(g) => Some(GroupKey::from_value(field(record, g.field)?, g.data_type)?),
            None => None,
        };
        let value = field(record, self.agg_field)?;
        let value = value.as_int().ok_or_else(|| ExecError::TypeMismatch {
            expected: DataType::Int.to_string(),
            actual: format!("{:?}", value),
        })?;
        self.state.push(key, value);
        Ok(())
    }

    fn iterator(&self) -> Buffered<Values> {
        let op = self.op;
        // An empty ungrouped input still yields COUNT = 0
        let rows = self.state.rows(|values| Self::reduce(op, values));
        Values::new(self.result_schema(), rows).into_operator()
    }

    fn result_schema(&self) -> RowSchema {
        result_schema(self.grouping, self.op)
    }
}

/// Operator computing one aggregate over its child, optionally grouped.
///
/// Opening drains the child into a fresh aggregator; rows are then served
/// from that aggregator's results.
pub struct Aggregate {
    child: Box<dyn Operator>,
    agg_field: usize,
    group_by: Option<usize>,
    op: AggregateOp,
    schema: RowSchema,
    results: Option<Buffered<Values>>,
}

impl Aggregate {
    pub fn new(
        child: Box<dyn Operator>,
        agg_field: usize,
        group_by: Option<usize>,
        op: AggregateOp,
    ) -> ExecResult<Self> {
        let mut aggregate = Self {
            schema: RowSchema::single("", DataType::Int),
            child,
            agg_field,
            group_by,
            op,
            results: None,
        };
        aggregate.schema = aggregate.output_schema()?;
        Ok(aggregate)
    }

    fn aggregator(&self) -> ExecResult<Box<dyn Aggregator>> {
        let input = self.child.schema();
        let group_type = match self.group_by {
            Some(index) => Some(input.field_type(index)?),
            None => None,
        };

        match input.field_type(self.agg_field)? {
            DataType::Int => Ok(Box::new(IntegerAggregator::new(
                self.group_by,
                group_type,
                self.agg_field,
                self.op,
            )?)),
            DataType::Char(_) => Ok(Box::new(StringAggregator::new(
                self.group_by,
                group_type,
                self.agg_field,
                self.op,
            )?)),
            other => Err(ExecError::UnsupportedAggregate(format!(
                "{} over {} values",
                self.op, other
            ))),
        }
    }

    /// Aggregator result schema, with column names taken from the child
    fn output_schema(&self) -> ExecResult<RowSchema> {
        let input = self.child.schema();
        let types = self.aggregator()?.result_schema();
        let agg_name = format!("{}({})", self.op, input.field_name(self.agg_field)?);

        let mut columns = Vec::with_capacity(2);
        if let Some(index) = self.group_by {
            columns.push(ColumnDef::new(input.field_name(index)?, types.field_type(0)?));
        }
        columns.push(ColumnDef::new(agg_name, types.field_type(types.num_fields() - 1)?));
        Ok(RowSchema::new(columns)?)
    }
}

impl Fetch for Aggregate {
    fn open(&mut self) -> ExecResult<()> {
        let mut aggregator = self.aggregator()?;
        self.child.open()?;
        while self.child.has_next()? {
            aggregator.merge_row(&self.child.next()?)?;
        }

        let mut results = aggregator.iterator();
        results.open()?;
        self.results = Some(results);
        Ok(())
    }

    fn fetch_next(&mut self) -> ExecResult<Option<Record>> {
        let results = self.results.as_mut().ok_or(ExecError::NotOpen)?;
        if results.has_next()? {
            Ok(Some(results.next()?))
        } else {
            Ok(None)
        }
    }

    fn close(&mut self) {
        self.child.close();
        self.results = None;
    }

    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn children(&self) -> Vec<&dyn Operator> {
        vec![self.child.as_ref()]
    }

    fn set_children(&mut self, children: Vec<Box<dyn Operator>>) -> ExecResult<()> {
        let [child] = expect_children::<1>(children)?;
        self.child = child;
        self.schema = self.output_schema()?;
        Ok(())
    }
}

//! In-memory data sources: a column table resolver, a concurrent macro
//! table and a loader for comma-separated table files.

use crate::expression::{
    ExpressionError, ExpressionResult, ExpressionType, MacroResolver, Resolver, StringList,
    StringSet, VariableInfo,
};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::Path;

/// Separator between the items of a STRING_SET or STRING_LIST cell.
pub const ITEM_SEPARATOR: char = ';';

#[derive(Debug, Clone)]
enum Column {
    Numeric(Vec<f64>),
    Text(Vec<Option<String>>),
    Boolean(Vec<Option<bool>>),
    Instant(Vec<Option<DateTime<Utc>>>),
    LocalTime(Vec<Option<NaiveTime>>),
    StringSet(Vec<Option<StringSet>>),
    StringList(Vec<Option<StringList>>),
}

impl Column {
    fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Text(v) => v.len(),
            Column::Boolean(v) => v.len(),
            Column::Instant(v) => v.len(),
            Column::LocalTime(v) => v.len(),
            Column::StringSet(v) => v.len(),
            Column::StringList(v) => v.len(),
        }
    }

    fn empty(ty: ExpressionType) -> Self {
        match ty {
            ExpressionType::Integer | ExpressionType::Double => Column::Numeric(Vec::new()),
            ExpressionType::String => Column::Text(Vec::new()),
            ExpressionType::Boolean => Column::Boolean(Vec::new()),
            ExpressionType::Instant => Column::Instant(Vec::new()),
            ExpressionType::LocalTime => Column::LocalTime(Vec::new()),
            ExpressionType::StringSet => Column::StringSet(Vec::new()),
            ExpressionType::StringList => Column::StringList(Vec::new()),
        }
    }

    /// Append one cell given as text; an empty cell is missing.
    fn push_cell(&mut self, cell: &str) -> Result<()> {
        let cell = cell.trim();
        let present = (!cell.is_empty()).then_some(cell);
        match self {
            Column::Numeric(v) => v.push(match present {
                None => f64::NAN,
                Some(text) => parse_number_cell(text)?,
            }),
            Column::Text(v) => v.push(present.map(str::to_string)),
            Column::Boolean(v) => v.push(present.map(parse_boolean_cell).transpose()?),
            Column::Instant(v) => v.push(present.map(parse_instant_cell).transpose()?),
            Column::LocalTime(v) => v.push(
                present
                    .map(|t| {
                        t.parse::<NaiveTime>()
                            .with_context(|| format!("Invalid time '{}'", t))
                    })
                    .transpose()?,
            ),
            Column::StringSet(v) => v.push(present.map(|t| split_items(t).collect())),
            Column::StringList(v) => v.push(present.map(|t| split_items(t).collect())),
        }
        Ok(())
    }
}

fn parse_number_cell(text: &str) -> Result<f64> {
    match text {
        crate::expression::INFINITY_STRING => Ok(f64::INFINITY),
        crate::expression::NEGATIVE_INFINITY_STRING => Ok(f64::NEG_INFINITY),
        _ => text
            .parse::<f64>()
            .with_context(|| format!("Invalid number '{}'", text)),
    }
}

fn parse_boolean_cell(text: &str) -> Result<bool> {
    if text.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if text.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        bail!("Invalid boolean '{}'", text)
    }
}

fn parse_instant_cell(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Ok(instant.with_timezone(&Utc));
    }
    if let Ok(naive) = text.parse::<NaiveDateTime>() {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    let date = text
        .parse::<NaiveDate>()
        .with_context(|| format!("Invalid instant '{}'", text))?;
    Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::default())))
}

fn split_items(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(ITEM_SEPARATOR).map(|item| item.trim().to_string())
}

/// Read `name:TYPE`; the type defaults to STRING.
pub fn parse_column_spec(spec: &str) -> Result<(String, ExpressionType)> {
    let (name, ty) = match spec.rsplit_once(':') {
        Some((name, ty)) => {
            let ty = ExpressionType::from_constant_name(ty)
                .with_context(|| format!("Unknown column type '{}'", ty.trim()))?;
            (name, ty)
        }
        None => (spec, ExpressionType::String),
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Empty column name in '{}'", spec);
    }
    Ok((name.to_string(), ty))
}

/// Typed columns of equal or unequal length, addressed by name.
///
/// Reading past the end of a column (or before its start) gives the
/// column type's missing value.
#[derive(Debug, Clone, Default)]
pub struct ColumnTable {
    columns: Vec<(VariableInfo, Column)>,
    by_name: HashMap<String, usize>,
}

/// Builder for a [`ColumnTable`]. A later column replaces an earlier one of
/// the same name.
#[derive(Debug, Default)]
pub struct ColumnTableBuilder {
    table: ColumnTable,
}

impl ColumnTableBuilder {
    fn column(mut self, name: &str, ty: ExpressionType, column: Column) -> Self {
        self.table.insert(VariableInfo::new(name, ty), column);
        self
    }

    pub fn integer_column(self, name: &str, values: Vec<f64>) -> Self {
        self.column(name, ExpressionType::Integer, Column::Numeric(values))
    }

    pub fn double_column(self, name: &str, values: Vec<f64>) -> Self {
        self.column(name, ExpressionType::Double, Column::Numeric(values))
    }

    pub fn string_column(self, name: &str, values: Vec<Option<String>>) -> Self {
        self.column(name, ExpressionType::String, Column::Text(values))
    }

    pub fn boolean_column(self, name: &str, values: Vec<Option<bool>>) -> Self {
        self.column(name, ExpressionType::Boolean, Column::Boolean(values))
    }

    pub fn instant_column(self, name: &str, values: Vec<Option<DateTime<Utc>>>) -> Self {
        self.column(name, ExpressionType::Instant, Column::Instant(values))
    }

    pub fn local_time_column(self, name: &str, values: Vec<Option<NaiveTime>>) -> Self {
        self.column(name, ExpressionType::LocalTime, Column::LocalTime(values))
    }

    pub fn string_set_column(self, name: &str, values: Vec<Option<StringSet>>) -> Self {
        self.column(name, ExpressionType::StringSet, Column::StringSet(values))
    }

    pub fn string_list_column(self, name: &str, values: Vec<Option<StringList>>) -> Self {
        self.column(name, ExpressionType::StringList, Column::StringList(values))
    }

    /// Column from text cells, parsed according to `ty`.
    pub fn text_column<'a>(
        self,
        name: &str,
        ty: ExpressionType,
        cells: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let mut column = Column::empty(ty);
        for (row, cell) in cells.into_iter().enumerate() {
            column
                .push_cell(cell)
                .with_context(|| format!("Column '{}', row {}", name, row + 1))?;
        }
        Ok(self.column(name, ty, column))
    }

    pub fn build(self) -> ColumnTable {
        self.table
    }
}

impl ColumnTable {
    pub fn builder() -> ColumnTableBuilder {
        ColumnTableBuilder::default()
    }

    fn insert(&mut self, info: VariableInfo, column: Column) {
        match self.by_name.get(&info.name) {
            Some(&slot) => self.columns[slot] = (info, column),
            None => {
                self.by_name.insert(info.name.clone(), self.columns.len());
                self.columns.push((info, column));
            }
        }
    }

    /// Length of the longest column.
    pub fn row_count(&self) -> usize {
        self.columns
            .iter()
            .map(|(_, column)| column.len())
            .max()
            .unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column(&self, name: &str) -> ExpressionResult<&Column> {
        self.by_name
            .get(name)
            .map(|&slot| &self.columns[slot].1)
            .ok_or_else(|| ExpressionError::Fatal(format!("no column named '{}'", name)))
    }
}

fn cell<T: Clone>(values: &[T], index: i64) -> Option<T> {
    usize::try_from(index)
        .ok()
        .and_then(|i| values.get(i))
        .cloned()
}

fn mismatch(name: &str, requested: &str) -> ExpressionError {
    ExpressionError::Fatal(format!(
        "column '{}' cannot be read as {}",
        name, requested
    ))
}

impl Resolver for ColumnTable {
    fn all_variables(&self) -> Box<dyn Iterator<Item = VariableInfo> + '_> {
        Box::new(self.columns.iter().map(|(info, _)| info.clone()))
    }

    fn variable_type(&self, name: &str) -> Option<ExpressionType> {
        self.by_name
            .get(name)
            .map(|&slot| self.columns[slot].0.expression_type)
    }

    fn double_value(&self, name: &str, index: i64) -> ExpressionResult<f64> {
        match self.column(name)? {
            Column::Numeric(values) => Ok(cell(values, index).unwrap_or(f64::NAN)),
            _ => Err(mismatch(name, "numerical")),
        }
    }

    fn string_value(&self, name: &str, index: i64) -> ExpressionResult<Option<String>> {
        match self.column(name)? {
            Column::Text(values) => Ok(cell(values, index).flatten()),
            _ => Err(mismatch(name, "nominal")),
        }
    }

    fn boolean_value(&self, name: &str, index: i64) -> ExpressionResult<Option<bool>> {
        match self.column(name)? {
            Column::Boolean(values) => Ok(cell(values, index).flatten()),
            _ => Err(mismatch(name, "boolean")),
        }
    }

    fn instant_value(&self, name: &str, index: i64) -> ExpressionResult<Option<DateTime<Utc>>> {
        match self.column(name)? {
            Column::Instant(values) => Ok(cell(values, index).flatten()),
            _ => Err(mismatch(name, "instant")),
        }
    }

    fn local_time_value(&self, name: &str, index: i64) -> ExpressionResult<Option<NaiveTime>> {
        match self.column(name)? {
            Column::LocalTime(values) => Ok(cell(values, index).flatten()),
            _ => Err(mismatch(name, "local time")),
        }
    }

    fn string_set_value(&self, name: &str, index: i64) -> ExpressionResult<Option<StringSet>> {
        match self.column(name)? {
            Column::StringSet(values) => Ok(cell(values, index).flatten()),
            _ => Err(mismatch(name, "string set")),
        }
    }

    fn string_list_value(&self, name: &str, index: i64) -> ExpressionResult<Option<StringList>> {
        match self.column(name)? {
            Column::StringList(values) => Ok(cell(values, index).flatten()),
            _ => Err(mismatch(name, "string list")),
        }
    }
}

/// Named macro values that can be changed between expression builds.
#[derive(Debug, Default)]
pub struct MacroTable {
    values: DashMap<String, String>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a macro, returning its previous value.
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(name.into(), value.into())
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.values.remove(name).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl MacroResolver for MacroTable {
    fn macro_value(&self, name: &str) -> Option<String> {
        self.values.get(name).map(|value| value.value().clone())
    }

    fn all_macros(&self) -> Box<dyn Iterator<Item = String> + '_> {
        let mut names: Vec<String> = self.values.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Box::new(names.into_iter())
    }
}

/// Parse table text: a `name:TYPE,...` header line followed by one
/// comma-separated row per line. Blank lines are skipped.
pub fn parse_table(text: &str) -> Result<ColumnTable> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        bail!("Table has no header line");
    };
    let specs = header
        .split(',')
        .map(parse_column_spec)
        .collect::<Result<Vec<_>>>()?;

    let mut columns: Vec<Column> = specs.iter().map(|(_, ty)| Column::empty(*ty)).collect();
    for (line_number, line) in lines {
        let cells: Vec<&str> = line.split(',').collect();
        if cells.len() != specs.len() {
            bail!(
                "Line {}: expected {} cells, found {}",
                line_number + 1,
                specs.len(),
                cells.len()
            );
        }
        for ((column, cell), (name, _)) in columns.iter_mut().zip(cells).zip(&specs) {
            column
                .push_cell(cell)
                .with_context(|| format!("Line {}, column '{}'", line_number + 1, name))?;
        }
    }

    let mut table = ColumnTable::default();
    for ((name, ty), column) in specs.into_iter().zip(columns) {
        table.insert(VariableInfo::new(name, ty), column);
    }
    Ok(table)
}

/// Load a table file, see [`parse_table`].
pub fn load_table(path: &Path) -> Result<ColumnTable> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read table file {}", path.display()))?;
    parse_table(&text).with_context(|| format!("Invalid table file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_table_resolver() {
        let table = ColumnTable::builder()
            .integer_column("n", vec![1.0, 2.0])
            .string_column("s", vec![Some("a".to_string()), None])
            .build();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.variable_type("n"), Some(ExpressionType::Integer));
        assert_eq!(table.variable_type("missing"), None);
        assert_eq!(table.all_variables().count(), 2);

        assert_eq!(table.double_value("n", 1).unwrap(), 2.0);
        assert!(table.double_value("n", 2).unwrap().is_nan());
        assert!(table.double_value("n", -1).unwrap().is_nan());
        assert_eq!(table.string_value("s", 0).unwrap().as_deref(), Some("a"));
        assert_eq!(table.string_value("s", 1).unwrap(), None);
        assert!(table.string_value("n", 0).unwrap_err().is_fatal());
    }

    #[test]
    fn test_replacing_a_column() {
        let table = ColumnTable::builder()
            .integer_column("n", vec![1.0])
            .boolean_column("n", vec![Some(true)])
            .build();
        assert_eq!(table.column_count(), 1);
        assert_eq!(table.boolean_value("n", 0).unwrap(), Some(true));
    }

    #[test]
    fn test_parse_column_spec() {
        assert_eq!(
            parse_column_spec("price:double").unwrap(),
            ("price".to_string(), ExpressionType::Double)
        );
        assert_eq!(
            parse_column_spec("name").unwrap(),
            ("name".to_string(), ExpressionType::String)
        );
        assert!(parse_column_spec("x:REAL").is_err());
        assert!(parse_column_spec(":INTEGER").is_err());
    }

    #[test]
    fn test_parse_table() {
        let table = parse_table(
            "x:INTEGER,when:INSTANT,ok:BOOLEAN,tags:STRING_SET\n\
             1,2020-01-01T00:00:00Z,true,b;a\n\
             \n\
             ,2020-01-02,FALSE,\n",
        )
        .unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.double_value("x", 0).unwrap(), 1.0);
        assert!(table.double_value("x", 1).unwrap().is_nan());
        assert_eq!(
            table
                .instant_value("when", 1)
                .unwrap()
                .map(|i| i.timestamp_millis()),
            Some(1_577_923_200_000)
        );
        assert_eq!(table.boolean_value("ok", 1).unwrap(), Some(false));
        assert_eq!(
            table.string_set_value("tags", 0).unwrap(),
            Some(["a".to_string(), "b".to_string()].into_iter().collect())
        );
        assert_eq!(table.string_set_value("tags", 1).unwrap(), None);
    }

    #[test]
    fn test_parse_table_errors() {
        assert!(parse_table("").is_err());
        assert!(parse_table("x:INTEGER\nabc\n").is_err());
        assert!(parse_table("x:INTEGER,y\n1\n").is_err());
        assert!(parse_table("ok:BOOLEAN\nyes\n").is_err());
    }

    #[test]
    fn test_text_column() {
        let table = ColumnTable::builder()
            .text_column("t", ExpressionType::LocalTime, ["10:30:00", ""])
            .unwrap()
            .build();
        assert_eq!(
            table.local_time_value("t", 0).unwrap(),
            NaiveTime::from_hms_opt(10, 30, 0)
        );
        assert_eq!(table.local_time_value("t", 1).unwrap(), None);
    }

    #[test]
    fn test_macro_table() {
        let macros = MacroTable::new();
        assert!(macros.is_empty());
        assert_eq!(macros.set("b", "2"), None);
        macros.set("a", "1");
        assert_eq!(macros.set("b", "3").as_deref(), Some("2"));
        assert_eq!(macros.macro_value("b").as_deref(), Some("3"));
        assert_eq!(macros.all_macros().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(macros.remove("a").as_deref(), Some("1"));
        assert_eq!(macros.len(), 1);
    }
}

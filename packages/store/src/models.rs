//! # Domain models for holiday-tracking rows
//!
//! Every table in the spreadsheet is positional: a row is a list of scalar cells
//! and the first cell of every data row is the owning user's id. This module keeps
//! that storage shape ([`Cell`], [`Row`]) apart from the typed records the rest of
//! the system works with, and owns the conversion in both directions.
//!
//! ## Tables
//!
//! | [`TableKind`] | Payload key | Row layout |
//! |---------------|-------------|------------|
//! | `AnnualOccurrences` | `annualOccurrences` | `userId, id, date, remaining` |
//! | `WeekendSubHolidays` | `weekendSubHolidays` | `userId, date, weekday` |
//! | `UsedHolidays` | `usedHolidays` | `userId, date, weekday, amount` |
//! | `UsedSubHolidays` | `usedSubHolidays` | `userId, date, weekday` |
//!
//! ## Conversion
//!
//! Each record type implements [`Record`]:
//!
//! - [`Record::from_json`] — lenient decoding of a client-submitted item. Text
//!   fields default to `""` (numbers are stringified), numeric fields accept
//!   numbers or numeric strings and default to `0`.
//! - [`Record::to_row`] — record → row, with the owning id prepended.
//! - [`Record::from_row`] — row → record, ignoring the owning id. Short rows are
//!   padded with the same defaults.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// A single scalar field of a row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(Number),
    Text(String),
}

/// Positional field sequence. Field 0 is the owning user id for data rows.
pub type Row = Vec<Cell>;

impl Cell {
    /// Text view of the cell, used for owner comparisons.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Cell::Text(s) => Cow::Borrowed(s),
            Cell::Number(n) => Cow::Owned(n.to_string()),
        }
    }

    /// Numeric view of the cell. Text that does not parse as a number yields `0`.
    pub fn as_number(&self) -> Number {
        match self {
            Cell::Number(n) => n.clone(),
            Cell::Text(s) => parse_number(s).unwrap_or_else(zero),
        }
    }

    /// Convert a raw JSON value as returned by the store.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) => Cell::Text(s),
            Value::Number(n) => Cell::Number(n),
            Value::Null => Cell::Text(String::new()),
            Value::Bool(b) => Cell::Text(if b { "TRUE" } else { "FALSE" }.to_string()),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Number(n.into())
    }
}

impl From<Number> for Cell {
    fn from(n: Number) -> Self {
        Cell::Number(n)
    }
}

/// Owning user id of a data row, if the row has a first field.
pub fn row_owner(row: &[Cell]) -> Option<Cow<'_, str>> {
    row.first().map(Cell::as_text)
}

fn zero() -> Number {
    Number::from(0)
}

fn parse_number(s: &str) -> Option<Number> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

fn text_field(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn number_field(item: &Value, key: &str) -> Number {
    match item.get(key) {
        Some(Value::Number(n)) => n.clone(),
        Some(Value::String(s)) => parse_number(s).unwrap_or_else(zero),
        _ => zero(),
    }
}

fn text_at(row: &[Cell], index: usize) -> String {
    row.get(index)
        .map(|c| c.as_text().into_owned())
        .unwrap_or_default()
}

fn number_at(row: &[Cell], index: usize) -> Number {
    row.get(index).map(Cell::as_number).unwrap_or_else(zero)
}

/// The fixed set of tables the service manages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TableKind {
    AnnualOccurrences,
    WeekendSubHolidays,
    UsedHolidays,
    UsedSubHolidays,
}

impl TableKind {
    pub const ALL: [TableKind; 4] = [
        TableKind::AnnualOccurrences,
        TableKind::WeekendSubHolidays,
        TableKind::UsedHolidays,
        TableKind::UsedSubHolidays,
    ];

    /// Key of this table's array in the save payload.
    pub fn payload_key(self) -> &'static str {
        match self {
            TableKind::AnnualOccurrences => "annualOccurrences",
            TableKind::WeekendSubHolidays => "weekendSubHolidays",
            TableKind::UsedHolidays => "usedHolidays",
            TableKind::UsedSubHolidays => "usedSubHolidays",
        }
    }

    /// Header row written when a sheet has no content at all.
    pub fn header(self) -> Row {
        let labels: &[&str] = match self {
            TableKind::AnnualOccurrences => &["userId", "id", "date", "remaining"],
            TableKind::WeekendSubHolidays => &["userId", "date", "weekday"],
            TableKind::UsedHolidays => &["userId", "date", "weekday", "amount"],
            TableKind::UsedSubHolidays => &["userId", "date", "weekday"],
        };
        labels.iter().map(|&l| Cell::from(l)).collect()
    }
}

/// Typed view of one table's rows.
pub trait Record: Sized {
    const KIND: TableKind;

    fn from_json(item: &Value) -> Self;
    fn to_row(&self, user_id: &str) -> Row;
    fn from_row(row: &[Cell]) -> Self;
}


/// Decode every client-submitted item of one table.
pub fn decode_items<R: Record>(items: &[Value]) -> Vec<R> {
    items.iter().map(R::from_json).collect()
}

/// An annual-leave grant: an id, the date it was granted and the days remaining.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnualOccurrence {
    pub id: String,
    pub date: String,
    pub remaining: Number,
}

impl Record for AnnualOccurrence {
    const KIND: TableKind = TableKind::AnnualOccurrences;

    fn from_json(item: &Value) -> Self {
        Self {
            id: text_field(item, "id"),
            date: text_field(item, "date"),
            remaining: number_field(item, "remaining"),
        }
    }

    fn to_row(&self, user_id: &str) -> Row {
        vec![
            user_id.into(),
            self.id.clone().into(),
            self.date.clone().into(),
            self.remaining.clone().into(),
        ]
    }

    fn from_row(row: &[Cell]) -> Self {
        Self {
            id: text_at(row, 1),
            date: text_at(row, 2),
            remaining: number_at(row, 3),
        }
    }
}

/// A public holiday falling on a weekend, which grants a substitute day.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeekendSubHoliday {
    pub date: String,
    pub weekday: String,
}

impl Record for WeekendSubHoliday {
    const KIND: TableKind = TableKind::WeekendSubHolidays;

    fn from_json(item: &Value) -> Self {
        Self {
            date: text_field(item, "date"),
            weekday: text_field(item, "weekday"),
        }
    }

    fn to_row(&self, user_id: &str) -> Row {
        vec![
            user_id.into(),
            self.date.clone().into(),
            self.weekday.clone().into(),
        ]
    }

    fn from_row(row: &[Cell]) -> Self {
        Self {
            date: text_at(row, 1),
            weekday: text_at(row, 2),
        }
    }
}

/// A day (or part of one) taken from the annual allowance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UsedHoliday {
    pub date: String,
    pub weekday: String,
    pub amount: Number,
}

impl Record for UsedHoliday {
    const KIND: TableKind = TableKind::UsedHolidays;

    fn from_json(item: &Value) -> Self {
        Self {
            date: text_field(item, "date"),
            weekday: text_field(item, "weekday"),
            amount: number_field(item, "amount"),
        }
    }

    fn to_row(&self, user_id: &str) -> Row {
        vec![
            user_id.into(),
            self.date.clone().into(),
            self.weekday.clone().into(),
            self.amount.clone().into(),
        ]
    }

    fn from_row(row: &[Cell]) -> Self {
        Self {
            date: text_at(row, 1),
            weekday: text_at(row, 2),
            amount: number_at(row, 3),
        }
    }
}

/// A substitute holiday that has been taken.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UsedSubHoliday {
    pub date: String,
    pub weekday: String,
}

impl Record for UsedSubHoliday {
    const KIND: TableKind = TableKind::UsedSubHolidays;

    fn from_json(item: &Value) -> Self {
        Self {
            date: text_field(item, "date"),
            weekday: text_field(item, "weekday"),
        }
    }

    fn to_row(&self, user_id: &str) -> Row {
        vec![
            user_id.into(),
            self.date.clone().into(),
            self.weekday.clone().into(),
        ]
    }

    fn from_row(row: &[Cell]) -> Self {
        Self {
            date: text_at(row, 1),
            weekday: text_at(row, 2),
        }
    }
}

/// One user's full holiday state, one sequence of records per table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataset {
    #[serde(default)]
    pub annual_occurrences: Vec<AnnualOccurrence>,
    #[serde(default)]
    pub weekend_sub_holidays: Vec<WeekendSubHoliday>,
    #[serde(default)]
    pub used_holidays: Vec<UsedHoliday>,
    #[serde(default)]
    pub used_sub_holidays: Vec<UsedSubHoliday>,
}

impl UserDataset {
    /// Rows to append for `kind`, in submission order.
    pub fn rows_for(&self, kind: TableKind, user_id: &str) -> Vec<Row> {
        match kind {
            TableKind::AnnualOccurrences => to_rows(&self.annual_occurrences, user_id),
            TableKind::WeekendSubHolidays => to_rows(&self.weekend_sub_holidays, user_id),
            TableKind::UsedHolidays => to_rows(&self.used_holidays, user_id),
            TableKind::UsedSubHolidays => to_rows(&self.used_sub_holidays, user_id),
        }
    }

    /// Decode a stored data row of `kind` and add it to the dataset.
    pub fn push_row(&mut self, kind: TableKind, row: &[Cell]) {
        match kind {
            TableKind::AnnualOccurrences => {
                self.annual_occurrences.push(AnnualOccurrence::from_row(row))
            }
            TableKind::WeekendSubHolidays => {
                self.weekend_sub_holidays.push(WeekendSubHoliday::from_row(row))
            }
            TableKind::UsedHolidays => self.used_holidays.push(UsedHoliday::from_row(row)),
            TableKind::UsedSubHolidays => {
                self.used_sub_holidays.push(UsedSubHoliday::from_row(row))
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.annual_occurrences.is_empty()
            && self.weekend_sub_holidays.is_empty()
            && self.used_holidays.is_empty()
            && self.used_sub_holidays.is_empty()
    }
}

fn to_rows<R: Record>(records: &[R], user_id: &str) -> Vec<Row> {
    records.iter().map(|r| r.to_row(user_id)).collect()
}

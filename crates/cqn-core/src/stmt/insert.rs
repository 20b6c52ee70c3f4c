use super::{Record, Select, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    /// Target entity
    pub into: String,

    /// Deep records, possibly containing nested association data
    pub entries: Vec<Record>,

    /// Column names of the bulk-row form
    pub columns: Vec<String>,

    /// Value matrix of the bulk-row form, one inner vector per row
    pub rows: Vec<Vec<Value>>,

    /// `INSERT ... SELECT` source
    pub source: Option<Box<Select>>,
}

impl Insert {
    pub fn into(entity: impl Into<String>) -> Self {
        Insert {
            into: entity.into(),
            entries: vec![],
            columns: vec![],
            rows: vec![],
            source: None,
        }
    }

    pub fn entry(mut self, record: Record) -> Self {
        self.entries.push(record);
        self
    }

    pub fn entries(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        self.entries.extend(records);
        self
    }

    pub fn rows<S: Into<String>>(
        mut self,
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self.rows = rows;
        self
    }

    pub fn as_select(mut self, select: Select) -> Self {
        self.source = Some(Box::new(select));
        self
    }

    /// True for the explicit row/value matrix form.
    pub fn is_bulk(&self) -> bool {
        !self.rows.is_empty()
    }
}

use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::domain::TVError;

/// A single cell. Serialized as a plain JSON scalar.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
}

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Stringified form used for matching and sorting. Null is the empty string.
    pub fn as_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Number(n) => n.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

// JSON has no NaN or infinity; those go out as their text.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            Value::Number(n) => serializer.serialize_str(&n.to_string()),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// Non-finite numbers become text so they survive a JSON round trip unchanged.
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        if n.is_finite() {
            Value::Number(n)
        } else {
            Value::Text(n.to_string())
        }
    }
}

/// One row of the dataset, addressed by column id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Record(BTreeMap::new())
    }

    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.0.insert(column.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.0.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Present (non null) value of a column. Missing keys and nulls are both `None`.
    pub fn field(&self, column: &str) -> Option<&Value> {
        self.0.get(column).filter(|v| !v.is_absent())
    }

    /// Present values in column id order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.values().filter(|v| !v.is_absent())
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Record(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed(String),
}

/// The raw dataset of a session. Filled once, never mutated afterwards.
#[derive(Debug)]
pub struct RecordStore {
    records: Vec<Record>,
    state: LoadState,
}

impl RecordStore {
    pub fn loading() -> Self {
        RecordStore {
            records: Vec::new(),
            state: LoadState::Loading,
        }
    }

    pub fn ready(records: Vec<Record>) -> Self {
        RecordStore {
            records,
            state: LoadState::Ready,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        RecordStore {
            records: Vec::new(),
            state: LoadState::Failed(reason.into()),
        }
    }

    /// Records visible to the pipeline. Empty while loading.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }
}

/// Source of the full, ordered dataset.
pub trait RecordProvider: Send {
    fn load(&self) -> Result<Vec<Record>, TVError>;
}

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// Reads a csv, parquet or arrow file with polars.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    path: PathBuf,
}

impl CsvProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvProvider { path: path.into() }
    }

    fn detect_file_type(path: &Path) -> Result<FileType, TVError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            _ => Err(TVError::UnknownFileType),
        }
    }

    fn get_file_info(path: &Path) -> Result<FileInfo, TVError> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TVError::FileNotFound,
            ErrorKind::PermissionDenied => TVError::PermissionDenied,
            _ => TVError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(TVError::LoadingFailed("Not a file!".into()));
        }

        Ok(FileInfo {
            path: path.to_path_buf(),
            file_size: metadata.len(),
            file_type: Self::detect_file_type(path)?,
        })
    }

    fn is_numeric_type(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
                | DataType::Float32
                | DataType::Float64
        )
    }

    fn load_column(df: &DataFrame, col_name: &str) -> Result<(String, Vec<Value>), PolarsError> {
        let column = df.column(col_name)?;

        let values = if Self::is_numeric_type(column.dtype()) {
            let col = column.cast(&DataType::Float64)?;
            col.f64()?
                .into_iter()
                .map(|v| v.map(Value::from).unwrap_or(Value::Null))
                .collect()
        } else {
            let col = column.cast(&DataType::String)?;
            col.str()?
                .into_iter()
                .map(|v| match v {
                    Some(s) => Value::Text(s.replace("\r\n", " ").replace('\n', " ")),
                    None => Value::Null,
                })
                .collect()
        };
        Ok((col_name.to_string(), values))
    }

    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .finish()
    }

    fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
    }

    fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }
}

impl RecordProvider for CsvProvider {
    fn load(&self) -> Result<Vec<Record>, TVError> {
        let file_info = Self::get_file_info(&self.path)?;
        debug!("Loading {:?}", file_info);
        let frame = match file_info.file_type {
            FileType::CSV => Self::load_csv(&file_info.path)?,
            FileType::PARQUET => Self::load_parquet(&file_info.path)?,
            FileType::ARROW => Self::load_arrow(&file_info.path)?,
        };

        let start_time = Instant::now();
        let df = frame.collect()?;

        // Every column is converted in its own rayon task, rows are assembled afterwards.
        let columns: Vec<(String, Vec<Value>)> = df
            .get_column_names()
            .par_iter()
            .map(|name| Self::load_column(&df, name))
            .collect::<Result<_, _>>()?;

        let records = (0..df.height())
            .map(|ridx| {
                columns
                    .iter()
                    .map(|(name, values)| (name.clone(), values[ridx].clone()))
                    .collect::<Record>()
            })
            .collect::<Vec<_>>();

        info!(
            "Loaded {} records with {} columns ({} bytes) in {}ms",
            records.len(),
            columns.len(),
            file_info.file_size,
            start_time.elapsed().as_millis()
        );
        Ok(records)
    }
}

//! Loading samples from delimited text.
//!
//! Every row is `class,f1,f2,...`: the class index followed by a fixed amount
//! of features. The label is the one-hot encoding of the class.

use std::{
    error::Error,
    fmt::{self, Display},
    io::{self, BufRead},
    num::{ParseFloatError, ParseIntError},
};

use log::info;

use crate::{Sample, TrainingEngine};

const DELIMITER: char = ',';

/// Why a single row couldn't be parsed.
#[derive(Debug, PartialEq)]
pub enum RowErr {
    FeatureCount { got: usize, expected: usize },
    Class(ParseIntError),
    ClassOutOfRange { class: usize, classes: usize },
    Feature { column: usize, source: ParseFloatError },
}

impl Display for RowErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowErr::FeatureCount { got, expected } => {
                write!(f, "expected {expected} features, got {got}")
            }
            RowErr::Class(e) => write!(f, "invalid class index: {e}"),
            RowErr::ClassOutOfRange { class, classes } => {
                write!(f, "class {class} is out of range for {classes} classes")
            }
            RowErr::Feature { column, source } => {
                write!(f, "invalid feature at column {column}: {source}")
            }
        }
    }
}

impl Error for RowErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RowErr::Class(e) => Some(e),
            RowErr::Feature { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// The sample feed's error type.
#[derive(Debug)]
pub enum FeedErr {
    Io(io::Error),
    /// `line` is one based.
    Row { line: usize, source: RowErr },
}

impl Display for FeedErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedErr::Io(e) => write!(f, "io error: {e}"),
            FeedErr::Row { line, source } => write!(f, "line {line}: {source}"),
        }
    }
}

impl Error for FeedErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FeedErr::Io(e) => Some(e),
            FeedErr::Row { source, .. } => Some(source),
        }
    }
}

impl From<io::Error> for FeedErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Parses a single row into a sample.
///
/// # Arguments
/// * `row` - The delimited text, surrounding whitespace is ignored.
/// * `features` - The amount of features every row must carry.
/// * `classes` - The width of the one-hot label.
pub fn parse_row(row: &str, features: usize, classes: usize) -> Result<Sample, RowErr> {
    let mut fields = row.trim().split(DELIMITER).map(str::trim);

    // `split` always yields at least one field.
    let class = fields
        .next()
        .unwrap_or_default()
        .parse::<usize>()
        .map_err(RowErr::Class)?;

    if class >= classes {
        return Err(RowErr::ClassOutOfRange { class, classes });
    }

    let values = fields
        .enumerate()
        .map(|(i, field)| {
            field.parse::<f32>().map_err(|source| RowErr::Feature {
                column: i + 1,
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if values.len() != features {
        return Err(RowErr::FeatureCount {
            got: values.len(),
            expected: features,
        });
    }

    let label = (0..classes)
        .map(|c| if c == class { 1.0 } else { 0.0 })
        .collect();

    Ok(Sample::new(values, label))
}

/// Reads every row of `reader` into `engine`.
///
/// Blank lines are skipped. The samples are only added once the whole input
/// parsed, so a malformed row leaves the engine untouched.
///
/// # Arguments
/// * `reader` - The delimited text.
/// * `features` - The amount of features every row must carry.
/// * `classes` - The width of the one-hot label.
/// * `is_training` - Whether the rows belong to the training collection.
/// * `engine` - Where the samples go.
///
/// # Returns
/// The amount of samples added.
pub fn load_rows<R: BufRead>(
    reader: R,
    features: usize,
    classes: usize,
    is_training: bool,
    engine: &TrainingEngine,
) -> Result<usize, FeedErr> {
    let mut samples = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let sample = parse_row(&line, features, classes).map_err(|source| FeedErr::Row {
            line: i + 1,
            source,
        })?;

        samples.push(sample);
    }

    let added = engine.add_samples(samples, is_training);
    info!(added = added, is_training = is_training; "samples loaded");
    Ok(added)
}

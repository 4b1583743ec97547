//! Post-processing of the raw result tables.
//!
//! Rows are grouped by (library, tier) and every timing column reduced to
//! its mean and sample standard deviation. Empty cells (a context stage
//! folded into key generation) are left out of their column.

use std::path::Path;

use csv::{ReaderBuilder, Writer};
use itertools::Itertools;

use crate::error::Result;
use crate::sink::{PolyRow, SchemeRow};

const POLY_COLUMNS: [&str; 5] = [
    "time_create_us",
    "time_forward_us",
    "time_add_us",
    "time_multiply_us",
    "time_inverse_us",
];

const SCHEME_COLUMNS: [&str; 6] = [
    "time_keygen_us",
    "time_encrypt_us",
    "time_add_us",
    "time_multiply_us",
    "time_decrypt_us",
    "time_context_us",
];

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnStat {
    pub name: &'static str,
    pub count: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
}

impl ColumnStat {
    fn from_samples(name: &'static str, xs: &[f64]) -> Self {
        let count = xs.len();
        if count == 0 {
            return Self {
                name,
                count,
                mean: None,
                std_dev: None,
            };
        }
        let mean = xs.iter().sum::<f64>() / count as f64;
        let std_dev = if count > 1 {
            let ss: f64 = xs.iter().map(|x| (x - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        } else {
            0.0
        };
        Self {
            name,
            count,
            mean: Some(mean),
            std_dev: Some(std_dev),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroupSummary {
    pub library: String,
    pub tier: u32,
    pub samples: usize,
    pub columns: Vec<ColumnStat>,
}

impl GroupSummary {
    pub fn column(&self, name: &str) -> Option<&ColumnStat> {
        self.columns.iter().find(|c| c.name == name)
    }
}

fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = ReaderBuilder::new().has_headers(false).from_path(path)?;
    let rows = rdr.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(rows)
}

fn summarize<R>(
    rows: Vec<R>,
    key: impl Fn(&R) -> (String, u32),
    names: &[&'static str],
    values: impl Fn(&R) -> Vec<Option<f64>>,
) -> Vec<GroupSummary> {
    rows.into_iter()
        .into_group_map_by(|r| key(r))
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .map(|((library, tier), group)| {
            let table: Vec<Vec<Option<f64>>> = group.iter().map(&values).collect();
            let columns = names
                .iter()
                .enumerate()
                .map(|(i, &name)| {
                    let xs: Vec<f64> = table.iter().filter_map(|row| row[i]).collect();
                    ColumnStat::from_samples(name, &xs)
                })
                .collect();
            GroupSummary {
                library,
                tier,
                samples: group.len(),
                columns,
            }
        })
        .collect()
}

pub fn summarize_poly_rows(rows: Vec<PolyRow>) -> Vec<GroupSummary> {
    summarize(
        rows,
        |r| (r.library.clone(), r.bit_tier),
        &POLY_COLUMNS,
        |r| {
            vec![
                Some(r.time_create_us),
                Some(r.time_forward_us),
                Some(r.time_add_us),
                Some(r.time_multiply_us),
                Some(r.time_inverse_us),
            ]
        },
    )
}

pub fn summarize_scheme_rows(rows: Vec<SchemeRow>) -> Vec<GroupSummary> {
    summarize(
        rows,
        |r| (r.library.clone(), r.security_tier),
        &SCHEME_COLUMNS,
        |r| {
            vec![
                Some(r.time_keygen_us),
                Some(r.time_encrypt_us),
                Some(r.time_add_us),
                Some(r.time_multiply_us),
                Some(r.time_decrypt_us),
                r.time_context_us,
            ]
        },
    )
}

pub fn summarize_poly(path: &Path) -> Result<Vec<GroupSummary>> {
    Ok(summarize_poly_rows(read_rows(path)?))
}

pub fn summarize_scheme(path: &Path) -> Result<Vec<GroupSummary>> {
    Ok(summarize_scheme_rows(read_rows(path)?))
}

fn fmt_cell(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.3}")).unwrap_or_default()
}

fn write_summary(path: &Path, tier_column: &str, groups: &[GroupSummary]) -> Result<()> {
    let mut wtr = Writer::from_path(path)?;
    let Some(first) = groups.first() else {
        wtr.flush()?;
        return Ok(());
    };
    let mut header = vec!["library".to_string(), tier_column.to_string(), "samples".to_string()];
    for c in &first.columns {
        header.push(format!("{}_mean", c.name));
        header.push(format!("{}_std", c.name));
    }
    wtr.write_record(&header)?;
    for g in groups {
        let mut record = vec![g.library.clone(), g.tier.to_string(), g.samples.to_string()];
        for c in &g.columns {
            record.push(fmt_cell(c.mean));
            record.push(fmt_cell(c.std_dev));
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_poly_summary(path: &Path, groups: &[GroupSummary]) -> Result<()> {
    write_summary(path, "bit_tier", groups)
}

pub fn write_scheme_summary(path: &Path, groups: &[GroupSummary]) -> Result<()> {
    write_summary(path, "security_tier", groups)
}

//! Dataset exploration: missing values, duplicates and a disease-by-gender
//! cross tabulation.

use crate::data::source::Table;
use crate::error::RadbiasError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Missing-value count for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingValues {
    pub column: String,
    pub count: usize,
}

/// Age statistics for one disease label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// One row of the cross tabulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrosstabRow {
    pub disease: String,
    /// Counts aligned with [`Crosstab::genders`].
    pub counts: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<AgeStats>,
}

/// Disease-by-gender counts over raw (uncanonicalized) values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Crosstab {
    /// Gender columns: `F` and `M` always first, then any other raw value.
    pub genders: Vec<String>,
    pub rows: Vec<CrosstabRow>,
}

impl Crosstab {
    /// Count for a disease/gender pair, zero when either is absent.
    pub fn count(&self, disease: &str, gender: &str) -> usize {
        let Some(col) = self.genders.iter().position(|g| g == gender) else {
            return 0;
        };
        self.rows
            .iter()
            .find(|r| r.disease == disease)
            .map_or(0, |r| r.counts[col])
    }
}

/// Summary of an uploaded ground-truth table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub total_rows: usize,
    pub total_columns: usize,
    pub missing_values: Vec<MissingValues>,
    pub duplicate_rows: usize,
    pub crosstab: Crosstab,
}

/// Count missing cells per column, in column order.
pub fn missing_values(table: &Table) -> Vec<MissingValues> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(i, column)| MissingValues {
            column: column.clone(),
            count: (0..table.row_count())
                .filter(|&r| table.cell(r, i).is_none())
                .count(),
        })
        .collect()
}

/// Count rows that exactly repeat an earlier row. They are reported, not removed.
pub fn duplicate_rows(table: &Table) -> usize {
    let mut seen = HashSet::new();
    table.rows.iter().filter(|row| !seen.insert(*row)).count()
}

/// Build the disease-by-gender cross tabulation. Rows missing either value
/// are left out of the counts; ages are taken from every row with a disease.
/// Unparsable ages are ignored.
pub fn crosstab(
    table: &Table,
    disease_col: &str,
    gender_col: &str,
    age_col: Option<&str>,
) -> Result<Crosstab, RadbiasError> {
    let disease_idx = table.column_index(disease_col)?;
    let gender_idx = table.column_index(gender_col)?;
    let age_idx = age_col.map(|c| table.column_index(c)).transpose()?;

    let mut counts: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
    let mut ages: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    let mut other_genders: BTreeSet<&str> = BTreeSet::new();

    for r in 0..table.row_count() {
        let Some(disease) = table.cell(r, disease_idx) else {
            continue;
        };
        // Age statistics cover every row with a disease, gender or not.
        if let Some(age) = age_idx
            .and_then(|i| table.cell(r, i))
            .and_then(|a| a.trim().parse::<f64>().ok())
            .filter(|a| a.is_finite())
        {
            ages.entry(disease).or_default().push(age);
        }
        let Some(gender) = table.cell(r, gender_idx) else {
            continue;
        };
        *counts.entry(disease).or_default().entry(gender).or_insert(0) += 1;
        if gender != "F" && gender != "M" {
            other_genders.insert(gender);
        }
    }

    let genders: Vec<String> = ["F", "M"]
        .into_iter()
        .chain(other_genders)
        .map(String::from)
        .collect();

    let rows = counts
        .into_iter()
        .map(|(disease, by_gender)| CrosstabRow {
            disease: disease.to_string(),
            counts: genders
                .iter()
                .map(|g| by_gender.get(g.as_str()).copied().unwrap_or(0))
                .collect(),
            age: ages.get(disease).map(|values| age_stats(values)),
        })
        .collect();

    Ok(Crosstab { genders, rows })
}

fn age_stats(values: &[f64]) -> AgeStats {
    let sum: f64 = values.iter().sum();
    AgeStats {
        mean: sum / values.len() as f64,
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

/// Profile a table for the exploration view.
pub fn profile(
    table: &Table,
    disease_col: &str,
    gender_col: &str,
    age_col: Option<&str>,
) -> Result<DatasetProfile, RadbiasError> {
    let crosstab = crosstab(table, disease_col, gender_col, age_col)?;
    Ok(DatasetProfile {
        total_rows: table.row_count(),
        total_columns: table.column_count(),
        missing_values: missing_values(table),
        duplicate_rows: duplicate_rows(table),
        crosstab,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> Table {
        let s = |v: &str| Some(v.to_string());
        Table::new(
            vec!["id".into(), "label".into(), "sex".into(), "age".into()],
            vec![
                vec![s("a"), s("Mass"), s("F"), s("60")],
                vec![s("b"), s("Mass"), s("F"), s("40")],
                vec![s("c"), s("No Finding"), s("M"), None],
                vec![s("d"), s("Mass"), s("O"), s("n/a")],
                vec![s("e"), None, s("M"), s("33")],
                vec![s("e"), None, s("M"), s("33")],
            ],
        )
    }

    #[test]
    fn test_missing_values() {
        let missing = missing_values(&table());
        assert_eq!(
            missing,
            vec![
                MissingValues { column: "id".into(), count: 0 },
                MissingValues { column: "label".into(), count: 2 },
                MissingValues { column: "sex".into(), count: 0 },
                MissingValues { column: "age".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_duplicate_rows_counted() {
        assert_eq!(duplicate_rows(&table()), 1);
    }

    #[test]
    fn test_crosstab_forces_f_and_m() {
        let t = crosstab(&table(), "label", "sex", Some("age")).unwrap();
        assert_eq!(t.genders, vec!["F", "M", "O"]);
        assert_eq!(t.count("Mass", "F"), 2);
        assert_eq!(t.count("Mass", "M"), 0);
        assert_eq!(t.count("Mass", "O"), 1);
        assert_eq!(t.count("No Finding", "M"), 1);
        assert_eq!(t.count("Edema", "F"), 0);

        let mass = t.rows.iter().find(|r| r.disease == "Mass").unwrap();
        assert_eq!(
            mass.age,
            Some(AgeStats { mean: 50.0, min: 40.0, max: 60.0 })
        );
        let normal = t.rows.iter().find(|r| r.disease == "No Finding").unwrap();
        assert_eq!(normal.age, None);
    }

    #[test]
    fn test_crosstab_ages_ignore_missing_gender() {
        let s = |v: &str| Some(v.to_string());
        let table = Table::new(
            vec!["label".into(), "sex".into(), "age".into()],
            vec![
                vec![s("Mass"), s("F"), s("60")],
                vec![s("Mass"), None, s("30")],
            ],
        );
        let t = crosstab(&table, "label", "sex", Some("age")).unwrap();
        assert_eq!(t.count("Mass", "F"), 1);
        assert_eq!(
            t.rows[0].age,
            Some(AgeStats { mean: 45.0, min: 30.0, max: 60.0 })
        );
    }

    #[test]
    fn test_profile_invalid_column() {
        let err = profile(&table(), "Finding Labels", "sex", None).unwrap_err();
        assert!(matches!(err, RadbiasError::InvalidColumn { .. }));
    }

    #[test]
    fn test_profile_empty_table() {
        let empty = Table::new(vec!["label".into(), "sex".into()], Vec::new());
        let p = profile(&empty, "label", "sex", None).unwrap();
        assert_eq!(p.total_rows, 0);
        assert_eq!(p.duplicate_rows, 0);
        assert!(p.crosstab.rows.is_empty());
        assert_eq!(p.crosstab.genders, vec!["F", "M"]);
    }
}

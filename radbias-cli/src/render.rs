//! Plain-text rendering of pipeline results.

use radbias_core::data::profile::DatasetProfile;
use radbias_core::inference::{BatchReport, ImageFailure};
use radbias_core::metrics::{BiasAssessment, CONFUSION_LABELS, LiveSummary};
use radbias_core::session::Analysis;
use radbias_core::simulate::SimulationOutcome;
use std::fmt::Write;
use unicode_width::UnicodeWidthStr;

pub fn pct(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

/// Left-aligned text table with a header rule.
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.width());
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "{}", line(headers.iter().copied(), &widths));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("  "));
    for row in rows {
        let _ = writeln!(out, "{}", line(row.iter().map(String::as_str), &widths));
    }
    out
}

fn line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(c, w)| format!("{c}{}", " ".repeat(w.saturating_sub(c.width()))))
        .collect();
    padded.join("  ").trim_end().to_string()
}

pub fn bias(assessment: &BiasAssessment) -> String {
    format!(
        "Bias ({} vs {}): {} vs {}, difference {} ({})",
        assessment.group_a,
        assessment.group_b,
        pct(assessment.rate_a),
        pct(assessment.rate_b),
        pct(assessment.difference),
        assessment.verdict
    )
}

pub fn batch_report(report: &BatchReport) -> String {
    format!(
        "Model {} ({}): {}/{} images scored\n\n",
        report.model, report.kind, report.succeeded, report.processed
    )
}

/// Images the model could not score; empty when there are none.
pub fn failures(failures: &[ImageFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }
    let mut out = format!("\nFailed images ({})\n", failures.len());
    for failure in failures {
        let _ = writeln!(out, "  {}: {}", failure.image_id, failure.message);
    }
    out
}

pub fn analysis(analysis: &Analysis) -> String {
    let fairness = &analysis.fairness;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Evaluated {} predictions ({} without ground truth or score)\n",
        fairness.evaluated, fairness.skipped
    );

    let c = &fairness.classification;
    let _ = writeln!(
        out,
        "Accuracy {}  Precision {}  Recall {}  F1 {}\n",
        pct(c.accuracy),
        pct(c.precision),
        pct(c.recall),
        pct(c.f1_score)
    );

    let [negative, positive] = CONFUSION_LABELS;
    let m = &fairness.confusion_matrix;
    out.push_str("Confusion matrix (rows: truth, columns: predicted)\n");
    out.push_str(&table(
        &["", negative, positive],
        &[
            vec![negative.into(), m.true_negatives().to_string(), m.false_positives().to_string()],
            vec![positive.into(), m.false_negatives().to_string(), m.true_positives().to_string()],
        ],
    ));

    let rows: Vec<Vec<String>> = fairness
        .by_group
        .iter()
        .map(|(g, r)| {
            vec![
                g.to_string(),
                r.count.to_string(),
                pct(r.selection_rate),
                pct(r.true_positive_rate),
                pct(r.false_positive_rate),
            ]
        })
        .collect();
    out.push('\n');
    out.push_str(&table(&["Gender", "Count", "Selection", "TPR", "FPR"], &rows));
    let _ = writeln!(
        out,
        "\nDemographic parity difference: {:.3}\nEqualized odds difference:     {:.3}",
        fairness.demographic_parity_difference, fairness.equalized_odds_difference
    );

    if !analysis.accuracy_by_label.is_empty() {
        let rows: Vec<Vec<String>> = analysis
            .accuracy_by_label
            .iter()
            .map(|(label, a)| {
                vec![
                    label.clone(),
                    a.total.to_string(),
                    a.correct.to_string(),
                    pct(a.accuracy),
                ]
            })
            .collect();
        out.push('\n');
        out.push_str(&table(&["True label", "Total", "Correct", "Accuracy"], &rows));
    }
    out
}

pub fn summary(summary: &LiveSummary) -> String {
    let mut out = format!("Total predictions: {}\n\n", summary.total_predictions);
    let rows: Vec<Vec<String>> = summary
        .distribution
        .iter()
        .map(|(label, n)| vec![label.clone(), n.to_string()])
        .collect();
    out.push_str(&table(&["Prediction", "Count"], &rows));

    let group_row = |name: &str, g: &radbias_core::GroupMetrics| {
        vec![
            name.to_string(),
            g.total.to_string(),
            g.positive_count.to_string(),
            pct(g.detection_rate),
        ]
    };
    out.push('\n');
    out.push_str(&table(
        &["Gender", "Total", "Positive", "Detection rate"],
        &[group_row("F", &summary.female), group_row("M", &summary.male)],
    ));
    let _ = writeln!(out, "\n{}", bias(&summary.bias));
    out
}

pub fn simulation(outcome: &SimulationOutcome) -> String {
    let thresholds: Vec<String> = outcome
        .thresholds
        .iter()
        .map(|(g, t)| format!("{g}={t:.2}"))
        .collect();
    let mut out = format!(
        "Thresholds: {}\nPredictions changed: {}\n\n",
        thresholds.join(", "),
        outcome.flipped
    );
    let rows: Vec<Vec<String>> = outcome
        .by_gender
        .iter()
        .map(|(g, m)| {
            vec![
                g.to_string(),
                m.total.to_string(),
                m.positive_count.to_string(),
                pct(m.detection_rate),
            ]
        })
        .collect();
    out.push_str(&table(&["Gender", "Total", "Positive", "Detection rate"], &rows));
    let _ = writeln!(out, "\n{}", bias(&outcome.bias));
    out
}

pub fn profile(profile: &DatasetProfile) -> String {
    let mut out = format!(
        "Rows: {}  Columns: {}  Duplicate rows: {}\n\n",
        profile.total_rows, profile.total_columns, profile.duplicate_rows
    );

    let missing: Vec<Vec<String>> = profile
        .missing_values
        .iter()
        .filter(|m| m.count > 0)
        .map(|m| vec![m.column.clone(), m.count.to_string()])
        .collect();
    if missing.is_empty() {
        out.push_str("No missing values\n");
    } else {
        out.push_str(&table(&["Column", "Missing"], &missing));
    }

    let crosstab = &profile.crosstab;
    let with_age = crosstab.rows.iter().any(|r| r.age.is_some());
    let mut headers: Vec<&str> = vec!["Disease"];
    headers.extend(crosstab.genders.iter().map(String::as_str));
    if with_age {
        headers.extend(["Mean age", "Min", "Max"]);
    }
    let rows: Vec<Vec<String>> = crosstab
        .rows
        .iter()
        .map(|r| {
            let mut row = vec![r.disease.clone()];
            row.extend(r.counts.iter().map(usize::to_string));
            if with_age {
                match &r.age {
                    Some(a) => row.extend([
                        format!("{:.1}", a.mean),
                        format!("{:.0}", a.min),
                        format!("{:.0}", a.max),
                    ]),
                    None => row.extend(["-".to_string(), "-".to_string(), "-".to_string()]),
                }
            }
            row
        })
        .collect();
    out.push('\n');
    out.push_str(&table(&headers, &rows));
    out
}

//! Post-run score summaries printed to stderr: per-metric distribution
//! figures plus cross-metric rank correlations when more than one score key
//! was produced.

use vqmeter_compare::FinalScores;

struct CorrelationMethod {
    name: &'static str,
    compute: fn(&[f64], &[f64]) -> f64,
}

pub fn print_summary(scores: &FinalScores) {
    if scores.is_empty() {
        eprintln!("No scores to report");
        return;
    }

    let mut names: Vec<&String> = scores.keys().collect();
    names.sort();

    eprintln!();
    eprintln!("Metric summary");
    eprintln!("==============");
    for name in &names {
        let values = &scores[*name];
        if values.is_empty() {
            continue;
        }
        print_metric_summary(name, values);
    }

    if names.len() > 1 {
        print_correlations(scores, &names);
    }
}

fn print_metric_summary(name: &str, values: &[f64]) {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len();
    let min = sorted[0];
    let max = sorted[count - 1];
    let mean = values.iter().sum::<f64>() / count as f64;
    let median = if count % 2 == 1 {
        sorted[count / 2]
    } else {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    };
    let variance = values
        .iter()
        .map(|value| {
            let diff = value - mean;
            diff * diff
        })
        .sum::<f64>()
        / count as f64;

    eprintln!();
    eprintln!("{name}");
    eprintln!("{}", "-".repeat(name.len()));
    eprintln!("  min     : {min:.6}");
    eprintln!("  max     : {max:.6}");
    eprintln!("  average : {mean:.6}");
    eprintln!("  median  : {median:.6}");
    eprintln!("  stddev  : {:.6}", variance.sqrt());
}

fn print_correlations(scores: &FinalScores, names: &[&String]) {
    let methods = [
        CorrelationMethod {
            name: "Pearson",
            compute: pearson,
        },
        CorrelationMethod {
            name: "Spearman",
            compute: spearman,
        },
        CorrelationMethod {
            name: "Kendall",
            compute: kendall_tau,
        },
    ];

    let width = names.iter().map(|name| name.len()).max().unwrap_or(0);

    for method in &methods {
        eprintln!();
        eprintln!("{} correlations", method.name);
        eprintln!("{}", "=".repeat(method.name.len() + 13));
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                let x = &scores[*a];
                let y = &scores[*b];
                if x.is_empty() || x.len() != y.len() {
                    continue;
                }
                let r = (method.compute)(x, y);
                eprintln!("  {a:<width$} <-> {b:<width$} : {:.6}", r.abs());
            }
        }
    }
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let count = x.len();
    if count == 0 || count != y.len() {
        return 0.0;
    }

    let mean_x = x.iter().sum::<f64>() / count as f64;
    let mean_y = y.iter().sum::<f64>() / count as f64;

    let mut numerator = 0.0;
    let mut denom_x = 0.0;
    let mut denom_y = 0.0;
    for i in 0..count {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        numerator += dx * dy;
        denom_x += dx * dx;
        denom_y += dy * dy;
    }

    let denominator = (denom_x * denom_y).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

fn spearman(x: &[f64], y: &[f64]) -> f64 {
    pearson(&ranks(x), &ranks(y))
}

fn kendall_tau(x: &[f64], y: &[f64]) -> f64 {
    let count = x.len();
    if count == 0 || count != y.len() {
        return 0.0;
    }

    let mut concordant = 0.0;
    let mut discordant = 0.0;
    for i in 0..count {
        for j in i + 1..count {
            let product = (x[i] - x[j]) * (y[i] - y[j]);
            if product > 0.0 {
                concordant += 1.0;
            } else if product < 0.0 {
                discordant += 1.0;
            }
        }
    }

    let denominator = (count * (count - 1)) as f64 / 2.0;
    if denominator == 0.0 {
        return 0.0;
    }
    (concordant - discordant) / denominator
}

fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    for (rank, index) in order.into_iter().enumerate() {
        ranks[index] = rank as f64;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pearson_detects_perfect_linear_relation() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-12);

        let inverted = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&x, &inverted) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_is_zero_for_constant_series() {
        let x = [1.0, 2.0, 3.0];
        let y = [5.0, 5.0, 5.0];
        assert_eq!(pearson(&x, &y), 0.0);
    }

    #[test]
    fn spearman_ignores_nonlinearity() {
        // Monotone but wildly nonlinear: rank correlation stays perfect.
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 10.0, 100.0, 1000.0];
        assert!((spearman(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn kendall_counts_discordant_pairs() {
        let x = [1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 2.0];
        // Two concordant pairs, one discordant: tau = 1/3.
        assert!((kendall_tau(&x, &y) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn ranks_are_positional() {
        assert_eq!(ranks(&[0.5, -1.0, 2.0]), vec![1.0, 0.0, 2.0]);
    }
}

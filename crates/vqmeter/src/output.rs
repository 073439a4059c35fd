use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use vqmeter_compare::FinalScores;

/// Writes the score table as pretty-printed JSON with stable key order.
pub async fn write_json(path: &Path, scores: &FinalScores) -> io::Result<()> {
    let ordered: BTreeMap<&String, &Vec<f64>> = scores.iter().collect();
    let mut encoded = serde_json::to_vec_pretty(&ordered)?;
    encoded.push(b'\n');
    tokio::fs::write(path, encoded).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test(flavor = "multi_thread")]
    async fn json_dump_is_sorted_and_dense() {
        let mut scores: FinalScores = HashMap::new();
        scores.insert("zeta".to_string(), vec![1.0, 2.0]);
        scores.insert("alpha".to_string(), vec![0.5, 0.25]);

        let path = std::env::temp_dir().join(format!(
            "vqmeter-scores-{}.json",
            std::process::id()
        ));
        write_json(&path, &scores).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let alpha = contents.find("alpha").unwrap();
        let zeta = contents.find("zeta").unwrap();
        assert!(alpha < zeta);

        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["zeta"][1], 2.0);
        std::fs::remove_file(path).unwrap();
    }
}

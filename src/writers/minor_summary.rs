
use itertools::Itertools;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::data_types::major_solution::MajorSolution;
use crate::data_types::minor_solution::MinorSolution;
use crate::util::json_io::{create_writer, is_gzipped};

/// Writes one row per refined allele, plus a placeholder row for every model without a solution
#[derive(Default)]
pub struct MinorSummaryWriter {
    rows: Vec<MinorSummaryRow>,
}

/// Contains all the data written to each row of the summary file
#[derive(Debug, Serialize)]
struct MinorSummaryRow {
    /// Index of the major solution in the reported order
    model_index: usize,
    /// Major alleles with their copy counts
    major_solution: String,
    /// Copy-number configurations
    cn_solution: String,
    /// Penalized model error, empty if the model had no solution
    score: Option<f64>,
    /// Star-allele label of this copy, e.g. `*1.001 +100:C>T`
    allele: String,
    major: String,
    minor: String,
    /// Additions relative to the minor allele definition, `;` separated
    added: String,
    /// Mutations of the minor allele definition not observed, `;` separated
    missing: String,
}

impl MinorSummaryRow {
    fn unsolved(model_index: usize, major_solution: &MajorSolution) -> Self {
        Self {
            model_index,
            major_solution: major_label(major_solution),
            cn_solution: major_solution.cn_solution().configs().join("+"),
            score: None,
            allele: String::new(),
            major: String::new(),
            minor: String::new(),
            added: String::new(),
            missing: String::new()
        }
    }
}

/// `1x*1 + 1x*4` style label of the major alleles in a solution
fn major_label(major_solution: &MajorSolution) -> String {
    major_solution.sort_key().into_iter()
        .map(|(allele, count)| format!("{count}x{allele}"))
        .join(" + ")
}

impl MinorSummaryWriter {
    /// Adds the outcome of one model to the summary
    /// # Arguments
    /// * `model_index` - position of this model in the reported order
    /// * `major_solution` - the major solution that was refined
    /// * `minor_solution` - the refinement, if the model had a solution
    pub fn add_model(&mut self, model_index: usize, major_solution: &MajorSolution, minor_solution: Option<&MinorSolution>) {
        let Some(minor_solution) = minor_solution else {
            self.rows.push(MinorSummaryRow::unsolved(model_index, major_solution));
            return;
        };

        for allele in minor_solution.sorted_alleles() {
            let mut row = MinorSummaryRow::unsolved(model_index, major_solution);
            row.score = Some(minor_solution.score());
            row.allele = allele.to_string();
            row.major = allele.major().to_string();
            row.minor = allele.minor().unwrap_or_default().to_string();
            row.added = allele.added().iter().join(";");
            row.missing = allele.missing().iter().join(";");
            self.rows.push(row);
        }
    }

    /// Number of rows written so far
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Will write the summary out to the given file path
    /// # Arguments
    /// * `filename` - the filename for the output; `.csv` is comma-separated, anything else is tab-separated, `.gz` is compressed
    /// # Errors
    /// * if the file cannot be created or written
    pub fn write_summary(&self, filename: &Path) -> anyhow::Result<()> {
        // strip a trailing .gz before checking the delimiter
        let base_name = if is_gzipped(filename) { filename.with_extension("") } else { filename.to_path_buf() };
        let is_csv: bool = base_name.extension().unwrap_or_default() == "csv";
        let delimiter: u8 = if is_csv { b',' } else { b'\t' };

        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(create_writer(filename)?);
        for row in self.rows.iter() {
            csv_writer.serialize(row)?;
        }

        // the inner writer needs an explicit flush when compressed
        let mut inner = csv_writer.into_inner()
            .map_err(|e| anyhow::anyhow!("Error while flushing summary: {e}"))?;
        inner.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::data_types::cn_solution::CnSolution;
    use crate::data_types::gene::Gene;
    use crate::data_types::gene::tests::mock_gene_record;
    use crate::data_types::solved_allele::SolvedAllele;

    #[test]
    fn test_write_summary() {
        let gene = Gene::try_from(mock_gene_record()).unwrap();
        let cn = CnSolution::new(&gene, 0.0, vec!["1".to_string(), "1".to_string()]).unwrap();
        let major = MajorSolution::new(
            0.0, [(SolvedAllele::major_only("1"), 2)].into_iter().collect::<BTreeMap<_, _>>(), cn
        ).unwrap();
        let minor = MinorSolution::new(1.0, vec![
            SolvedAllele::new("1".to_string(), Some("1.002".to_string()), vec![], vec!["250:A>G".parse().unwrap()]),
            SolvedAllele::new("1".to_string(), Some("1.001".to_string()), vec!["180:T>C".parse().unwrap()], vec![]),
        ], major.clone());

        let mut writer = MinorSummaryWriter::default();
        writer.add_model(0, &major, Some(&minor));
        writer.add_model(1, &major, None);
        assert_eq!(writer.num_rows(), 3);

        let out_fn = std::env::temp_dir().join(format!("minorstar_summary_{}.tsv", std::process::id()));
        writer.write_summary(&out_fn).unwrap();
        let contents = std::fs::read_to_string(&out_fn).unwrap();
        std::fs::remove_file(&out_fn).unwrap();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "model_index\tmajor_solution\tcn_solution\tscore\tallele\tmajor\tminor\tadded\tmissing");
        // sorted by allele name
        assert_eq!(lines[1], "0\t2x*1\t1+1\t1.0\t*1.001 +180:T>C\t1\t1.001\t180:T>C\t");
        assert_eq!(lines[2], "0\t2x*1\t1+1\t1.0\t*1.002 -250:A>G\t1\t1.002\t\t250:A>G");
        assert_eq!(lines[3], "1\t2x*1\t1+1\t\t\t\t\t\t");
    }
}

pub mod instance_reader;
pub mod line_reader;
pub mod solution_reader;
pub mod writer;

#[cfg(test)]
pub(crate) mod tests {
    use std::path::{Path, PathBuf};

    pub(crate) fn test_instances_directory(name: impl AsRef<Path>) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("testcases")
            .join(name)
    }

    /// Instance files (`*.csv`) of a test directory, each paired with its solution (`*.sol`) if present.
    pub(crate) fn test_instances(name: &str) -> Vec<(PathBuf, Option<PathBuf>)> {
        let pattern = test_instances_directory(name).join("*.csv");

        let mut result = Vec::new();

        for input_path in glob::glob(pattern.to_str().unwrap()).unwrap().flatten() {
            let output_path = {
                let mut output_path = input_path.clone();
                output_path.set_extension("sol");

                output_path.exists().then_some(output_path)
            };

            result.push((input_path, output_path));
        }

        assert!(!result.is_empty());

        result
    }
}

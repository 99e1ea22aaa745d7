use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Locates variant-call files among user-supplied paths
pub struct FileDiscovery {
    recursive: bool,
}

impl FileDiscovery {
    pub fn new(recursive: bool) -> Self {
        Self { recursive }
    }

    /// Expand files and directories into the list of variant files to analyze.
    /// Explicit files are always kept; directory entries are filtered.
    pub fn discover(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for path in inputs {
            if path.is_dir() {
                files.extend(self.discover_in_directory(path)?);
            } else {
                files.push(path.clone());
            }
        }

        // Remove duplicates while preserving order
        let mut seen = HashSet::new();
        files.retain(|path| seen.insert(path.clone()));

        Ok(files)
    }

    fn discover_in_directory(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        if self.recursive {
            for entry in WalkDir::new(dir)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if path.is_file() && self.is_variant_file(path) {
                    files.push(path.to_path_buf());
                }
            }
        } else {
            let entries = fs::read_dir(dir)
                .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

            for entry in entries {
                let entry = entry.with_context(|| {
                    format!("Failed to read directory entry in: {}", dir.display())
                })?;
                let path = entry.path();

                if path.is_file() && self.is_variant_file(&path) {
                    files.push(path);
                }
            }
            files.sort();
        }

        Ok(files)
    }

    fn is_variant_file(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if [".vcf", ".vcf.gz", ".vcf.bgz", ".vcf.bz2", ".vcf.xz"]
            .iter()
            .any(|ext| name.ends_with(ext))
        {
            return true;
        }

        name.ends_with(".txt") && self.has_vcf_header(path)
    }

    fn has_vcf_header(&self, path: &Path) -> bool {
        let Ok(file) = fs::File::open(path) else {
            return false;
        };

        BufReader::new(file)
            .lines()
            .take(5)
            .map_while(|line| line.ok())
            .any(|line| line.starts_with("##fileformat=VCF") || line.starts_with("#CHROM"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_file_discovery() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let dir_path = temp_dir.path();

        let vcf_path = dir_path.join("test.vcf");
        let mut vcf_file = File::create(&vcf_path)?;
        writeln!(vcf_file, "##fileformat=VCFv4.2")?;
        writeln!(vcf_file, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO")?;
        writeln!(vcf_file, "1\t100\t.\tA\tT\t30\tPASS\tGENE=TPMT;STAR=*2")?;

        let txt_path = dir_path.join("export.txt");
        let mut txt_file = File::create(&txt_path)?;
        writeln!(txt_file, "##fileformat=VCFv4.1")?;

        let gz_path = dir_path.join("sample.vcf.gz");
        File::create(&gz_path)?;

        let invalid_path = dir_path.join("notes.txt");
        let mut invalid_file = File::create(&invalid_path)?;
        writeln!(invalid_file, "This is not genetic data")?;

        let nested = dir_path.join("nested");
        fs::create_dir(&nested)?;
        let nested_path = nested.join("inner.vcf");
        File::create(&nested_path)?;

        let flat = FileDiscovery::new(false).discover(&[dir_path.to_path_buf()])?;
        assert_eq!(flat, vec![txt_path.clone(), gz_path.clone(), vcf_path.clone()]);

        let deep = FileDiscovery::new(true).discover(&[dir_path.to_path_buf()])?;
        assert_eq!(deep.len(), 4);
        assert!(deep.contains(&nested_path));
        assert!(!deep.contains(&invalid_path));

        Ok(())
    }

    #[test]
    fn test_explicit_files_are_kept_once() -> Result<()> {
        let explicit = PathBuf::from("/data/missing.vcf");
        let files = FileDiscovery::new(false).discover(&[explicit.clone(), explicit.clone()])?;
        assert_eq!(files, vec![explicit]);
        Ok(())
    }
}

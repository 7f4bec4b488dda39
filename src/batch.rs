use crate::constants::{DECODED_SIZE_MULTIPLIER, MIN_AVAILABLE_MEMORY_MIB, WEBP_EXTENSION};
use crate::error::{RecompressionError, Result};
use crate::processing::{recompress, RecompressOptions, RecompressionRequest, SizeReport};
use crate::utils::{calculate_compression_ratio, create_progress_bar, is_webp_file};
use glob::glob;
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// A file, a directory or a glob pattern.
    pub input: String,
    pub output_dir: PathBuf,
    pub options: RecompressOptions,
    pub recursive: bool,
    /// Worker threads; 0 picks one per CPU.
    pub jobs: usize,
    pub show_progress: bool,
}

impl BatchConfig {
    pub fn new(
        input: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        options: RecompressOptions,
    ) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            options,
            recursive: false,
            jobs: 1,
            show_progress: false,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

/// Result of one input file.
#[derive(Debug)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub outcome: Result<SizeReport>,
}

impl FileReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn is_skip(&self) -> bool {
        matches!(&self.outcome, Err(e) if e.is_skip())
    }

    pub fn is_failure(&self) -> bool {
        matches!(&self.outcome, Err(e) if !e.is_skip())
    }
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    /// In discovery order.
    pub reports: Vec<FileReport>,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_original_size: u64,
    pub total_output_size: u64,
    pub elapsed: Duration,
}

impl BatchSummary {
    fn from_reports(reports: Vec<FileReport>, elapsed: Duration) -> Self {
        let mut summary = Self {
            elapsed,
            ..Self::default()
        };
        for report in &reports {
            match &report.outcome {
                Ok(size) => {
                    summary.succeeded += 1;
                    summary.total_original_size += size.original_size;
                    summary.total_output_size += size.output_size;
                }
                Err(e) if e.is_skip() => summary.skipped += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary.reports = reports;
        summary
    }

    pub fn total_files(&self) -> usize {
        self.reports.len()
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Overall saving across the successfully recompressed files.
    pub fn compression_ratio(&self) -> f64 {
        calculate_compression_ratio(self.total_original_size, self.total_output_size)
    }
}

/// Recompresses every `.webp` file matched by a `BatchConfig`.
///
/// Individual failures end up in the file reports; `run` itself only fails
/// when the input cannot be enumerated or the output directory cannot be created.
pub struct BatchRunner {
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn run(&self) -> Result<BatchSummary> {
        self.config.options.validate()?;

        let files = collect_webp_files(&self.config.input, self.config.recursive)?;
        fs::create_dir_all(&self.config.output_dir)
            .map_err(|_| RecompressionError::DirectoryCreationFailed(self.config.output_dir.clone()))?;

        let start_time = Instant::now();
        if files.is_empty() {
            return Ok(BatchSummary::from_reports(Vec::new(), start_time.elapsed()));
        }

        let progress = if self.config.show_progress {
            create_progress_bar(files.len() as u64)
        } else {
            ProgressBar::hidden()
        };

        let jobs = self.effective_jobs(&files);
        let reports: Vec<FileReport> = if jobs <= 1 {
            files
                .iter()
                .map(|input| self.process_file(input, &progress))
                .collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build()
                .map_err(|e| {
                    RecompressionError::Processing(format!("Failed to build thread pool: {}", e))
                })?;
            pool.install(|| {
                files
                    .par_iter()
                    .map(|input| self.process_file(input, &progress))
                    .collect()
            })
        };

        progress.finish_with_message("done");
        Ok(BatchSummary::from_reports(reports, start_time.elapsed()))
    }

    fn process_file(&self, input: &Path, progress: &ProgressBar) -> FileReport {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        progress.set_message(name);

        let report = match generate_output_path(input, &self.config.output_dir) {
            Ok(output) => {
                let request = RecompressionRequest::new(input, &output, self.config.options);
                let outcome = recompress(&request);
                FileReport {
                    input: input.to_path_buf(),
                    output,
                    outcome,
                }
            }
            Err(e) => FileReport {
                input: input.to_path_buf(),
                output: self.config.output_dir.clone(),
                outcome: Err(e),
            },
        };

        progress.inc(1);
        report
    }

    /// Requested parallelism, capped by how many decoded animations fit in
    /// the memory that is currently available.
    fn effective_jobs(&self, files: &[PathBuf]) -> usize {
        let requested = match self.config.jobs {
            0 => num_cpus::get(),
            n => n,
        }
        .min(files.len())
        .max(1);
        if requested == 1 {
            return 1;
        }

        let largest_file = files
            .iter()
            .filter_map(|f| fs::metadata(f).ok())
            .map(|m| m.len())
            .max()
            .unwrap_or(0);
        let per_file_mib = estimate_decoded_mib(largest_file);

        let mut sys =
            System::new_with_specifics(RefreshKind::new().with_memory(MemoryRefreshKind::new()));
        sys.refresh_memory();
        let available_mib = sys.available_memory() / (1024 * 1024);

        let jobs = memory_capped_jobs(requested, available_mib, per_file_mib);
        crate::verbose!(
            "Using {} worker(s): {} MiB available, ~{} MiB per file",
            jobs,
            available_mib,
            per_file_mib
        );
        jobs
    }
}

/// Rough in-memory footprint of a decoded animation, from its file size.
fn estimate_decoded_mib(file_size: u64) -> u64 {
    let file_mib = file_size as f64 / (1024.0 * 1024.0);
    ((file_mib * DECODED_SIZE_MULTIPLIER).ceil() as u64).max(1)
}

fn memory_capped_jobs(requested: usize, available_mib: u64, per_file_mib: u64) -> usize {
    let budget = available_mib.saturating_sub(MIN_AVAILABLE_MEMORY_MIB);
    let fit = (budget / per_file_mib.max(1)).clamp(1, requested as u64);
    fit as usize
}

/// Finds `.webp` files (any case) under a file, directory or glob pattern,
/// sorted by path. Hidden entries below a directory are ignored.
///
/// # Arguments
/// * `input` - A single file, a directory or a glob pattern
/// * `recursive` - Descend into subdirectories when `input` is a directory
///
/// # Returns
/// * The matching paths; `NoInputFilesFound` when a glob matches nothing
pub fn collect_webp_files(input: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let input_path = Path::new(input);
    let mut files = Vec::new();

    if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else if input_path.is_dir() {
        let walker = if recursive {
            WalkDir::new(input_path)
        } else {
            WalkDir::new(input_path).max_depth(1)
        };

        let entries = walker
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
        for entry in entries {
            let entry = entry?;
            if entry.file_type().is_file() && is_webp_file(entry.path()) {
                files.push(entry.into_path());
            }
        }
    } else {
        let pattern =
            glob(input).map_err(|_| RecompressionError::NoInputFilesFound(input.to_string()))?;
        for entry in pattern.flatten() {
            if entry.is_file() && is_webp_file(&entry) {
                files.push(entry);
            }
        }
        if files.is_empty() {
            return Err(RecompressionError::NoInputFilesFound(input.to_string()));
        }
    }

    files.sort();
    Ok(files)
}

/// `<output_dir>/<input stem>.webp`
pub fn generate_output_path(input_path: &Path, output_dir: &Path) -> Result<PathBuf> {
    let file_stem = input_path.file_stem().ok_or_else(|| {
        RecompressionError::Processing(format!("Invalid file name: {:?}", input_path))
    })?;

    let output_filename = format!("{}.{}", file_stem.to_string_lossy(), WEBP_EXTENSION);
    Ok(output_dir.join(output_filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{encode_animation, AnimationSettings};
    use crate::error::ErrorKind;
    use image::{Rgba, RgbaImage};
    use std::fs::File;
    use tempfile::TempDir;

    fn write_animation(path: &Path) {
        let frames: Vec<RgbaImage> = [[200, 30, 30, 255], [30, 200, 30, 255]]
            .iter()
            .map(|&c| RgbaImage::from_pixel(16, 16, Rgba(c)))
            .collect();
        let data = encode_animation(&frames, &AnimationSettings::new(80, 60)).unwrap();
        fs::write(path, data).unwrap();
    }

    #[test]
    fn test_generate_output_path() {
        let result =
            generate_output_path(Path::new("in/cat.webp"), Path::new("/tmp/output")).unwrap();
        assert_eq!(result, PathBuf::from("/tmp/output/cat.webp"));

        let result =
            generate_output_path(Path::new("in/CAT.WEBP"), Path::new("/tmp/output")).unwrap();
        assert_eq!(result, PathBuf::from("/tmp/output/CAT.webp"));
    }

    #[test]
    fn test_generate_output_path_without_name() {
        let result = generate_output_path(Path::new("/"), Path::new("/tmp/output"));
        assert!(matches!(result, Err(RecompressionError::Processing(_))));
    }

    #[test]
    fn test_collect_webp_files_single_file() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("anim.webp");
        File::create(&test_file).unwrap();

        let files = collect_webp_files(&test_file.to_string_lossy(), false).unwrap();
        assert_eq!(files, vec![test_file]);
    }

    #[test]
    fn test_collect_webp_files_directory_sorted() {
        let temp_dir = TempDir::new().unwrap();
        File::create(temp_dir.path().join("b.webp")).unwrap();
        File::create(temp_dir.path().join("a.WEBP")).unwrap();
        File::create(temp_dir.path().join("c.gif")).unwrap();
        File::create(temp_dir.path().join(".hidden.webp")).unwrap();

        let files = collect_webp_files(&temp_dir.path().to_string_lossy(), false).unwrap();
        assert_eq!(
            files,
            vec![temp_dir.path().join("a.WEBP"), temp_dir.path().join("b.webp")]
        );
    }

    #[test]
    fn test_collect_webp_files_recursive() {
        let temp_dir = TempDir::new().unwrap();
        let subdir = temp_dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();
        File::create(temp_dir.path().join("top.webp")).unwrap();
        File::create(subdir.join("nested.webp")).unwrap();

        let flat = collect_webp_files(&temp_dir.path().to_string_lossy(), false).unwrap();
        assert_eq!(flat.len(), 1);

        let deep = collect_webp_files(&temp_dir.path().to_string_lossy(), true).unwrap();
        assert_eq!(deep.len(), 2);
        assert!(deep.contains(&subdir.join("nested.webp")));
    }

    #[test]
    fn test_collect_webp_files_glob_pattern() {
        let temp_dir = TempDir::new().unwrap();
        File::create(temp_dir.path().join("one.webp")).unwrap();
        File::create(temp_dir.path().join("two.webp")).unwrap();
        File::create(temp_dir.path().join("other.png")).unwrap();

        let pattern = format!("{}/o*", temp_dir.path().to_string_lossy());
        let files = collect_webp_files(&pattern, false).unwrap();
        assert_eq!(files, vec![temp_dir.path().join("one.webp")]);
    }

    #[test]
    fn test_collect_webp_files_missing_input() {
        let result = collect_webp_files("/nonexistent/dir/*.webp", false);
        assert!(matches!(
            result,
            Err(RecompressionError::NoInputFilesFound(_))
        ));
    }

    #[test]
    fn test_memory_capped_jobs() {
        assert_eq!(memory_capped_jobs(4, 8192, 100), 4);
        assert_eq!(memory_capped_jobs(8, 256 + 300, 100), 3);
        assert_eq!(memory_capped_jobs(4, 100, 100), 1);
        assert_eq!(memory_capped_jobs(4, 8192, 0), 4);
    }

    #[test]
    fn test_estimate_decoded_mib() {
        assert_eq!(estimate_decoded_mib(0), 1);
        assert_eq!(estimate_decoded_mib(1024 * 1024), 40);
    }

    #[test]
    fn test_batch_continues_after_failure() {
        let temp_dir = TempDir::new().unwrap();
        let input_dir = temp_dir.path().join("in");
        let output_dir = temp_dir.path().join("out");
        fs::create_dir(&input_dir).unwrap();
        write_animation(&input_dir.join("a.webp"));
        fs::write(input_dir.join("b.webp"), b"not a webp").unwrap();
        write_animation(&input_dir.join("c.webp"));

        let config = BatchConfig::new(
            input_dir.to_string_lossy(),
            &output_dir,
            RecompressOptions::default(),
        );
        let summary = BatchRunner::new(config).run().unwrap();

        assert_eq!(summary.total_files(), 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 0);
        assert!(summary.has_failures());

        let names: Vec<_> = summary
            .reports
            .iter()
            .map(|r| r.input.file_name().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["a.webp", "b.webp", "c.webp"]);
        assert_eq!(
            summary.reports[1].outcome.as_ref().unwrap_err().kind(),
            ErrorKind::Decode
        );

        assert!(output_dir.join("a.webp").exists());
        assert!(!output_dir.join("b.webp").exists());
        assert!(output_dir.join("c.webp").exists());
    }

    #[test]
    fn test_batch_parallel_keeps_order() {
        let temp_dir = TempDir::new().unwrap();
        let input_dir = temp_dir.path().join("in");
        fs::create_dir(&input_dir).unwrap();
        for name in ["d.webp", "a.webp", "c.webp", "b.webp"] {
            write_animation(&input_dir.join(name));
        }

        let config = BatchConfig::new(
            input_dir.to_string_lossy(),
            temp_dir.path().join("out"),
            RecompressOptions::default(),
        )
        .jobs(3);
        let summary = BatchRunner::new(config).run().unwrap();

        assert_eq!(summary.succeeded, 4);
        let inputs: Vec<_> = summary.reports.iter().map(|r| r.input.clone()).collect();
        let mut sorted = inputs.clone();
        sorted.sort();
        assert_eq!(inputs, sorted);
    }

    #[test]
    fn test_batch_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let config = BatchConfig::new(
            temp_dir.path().to_string_lossy(),
            temp_dir.path().join("out"),
            RecompressOptions::default(),
        );
        let summary = BatchRunner::new(config).run().unwrap();
        assert_eq!(summary.total_files(), 0);
        assert!(!summary.has_failures());
        assert!(temp_dir.path().join("out").is_dir());
    }
}

use clap::Parser;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use webp_squeeze::cli::{Args, Commands};
use webp_squeeze::constants::{EXIT_CODEC_UNAVAILABLE, EXIT_FAILURE, SKIP_PREFIX, SUCCESS_PREFIX};
use webp_squeeze::utils::{create_progress_spinner, format_file_size, print_size_report};
use webp_squeeze::{
    error, get_animation_info, info, logger, print_animation_info, probe_codec_support,
    recompress, verbose, warn, BatchConfig, BatchRunner, BatchSummary, CodecSupport,
    RecompressOptions, RecompressionRequest, Result,
};

fn main() -> ExitCode {
    let args = Args::parse();
    logger::configure(args.quiet, args.verbose);

    let support = match probe_codec_support() {
        Ok(support) => support,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CODEC_UNAVAILABLE);
        }
    };
    verbose!(
        "libwebp encoder {}, mux {}",
        support.encoder_version,
        support.mux_version
    );

    match run(args.command, &support) {
        Ok(code) => code,
        Err(e) => {
            error!("[{}] {}", e.kind(), e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run(command: Commands, support: &CodecSupport) -> Result<ExitCode> {
    match command {
        Commands::Compress {
            input,
            output,
            quality,
            resize_ratio,
            duration,
        } => {
            let options = RecompressOptions::new(quality, resize_ratio, duration)?;
            compress_file(input, output, options)
        }
        Commands::Batch {
            input,
            output,
            quality,
            resize_ratio,
            duration,
            recursive,
            jobs,
        } => {
            let options = RecompressOptions::new(quality, resize_ratio, duration)?;
            let config = BatchConfig::new(input, output, options)
                .recursive(recursive)
                .jobs(jobs)
                .show_progress(logger::show_progress());
            batch_compress(config)
        }
        Commands::Info { input } => {
            let animation = get_animation_info(&input)?;
            print_animation_info(&animation);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check => {
            info!("🔍 WebP codec support:");
            info!("  📦 libwebp encoder: {}", support.encoder_version);
            info!("  📦 libwebp mux: {}", support.mux_version);
            info!(
                "  🎞️  Animated WebP decoding: {}",
                if support.webp_decoding { "yes" } else { "no" }
            );
            info!("{} Animated WebP recompression available", SUCCESS_PREFIX);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn compress_file(input: PathBuf, output: PathBuf, options: RecompressOptions) -> Result<ExitCode> {
    info!("🗜️  Recompressing animation: {:?}", input);
    info!("📁 Output: {:?}", output);

    let pb = if logger::show_progress() {
        let pb = create_progress_spinner("Decoding and re-encoding frames...");
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    } else {
        ProgressBar::hidden()
    };

    let request = RecompressionRequest::new(&input, &output, options);
    match recompress(&request) {
        Ok(report) => {
            pb.finish_with_message("✅ Recompression complete");
            info!(
                "🎞️  {} frames, {}x{}, {} ms per frame",
                report.frame_count, report.width, report.height, report.frame_duration_ms
            );
            print_size_report(&report);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_skip() => {
            pb.finish_and_clear();
            info!("{} Skipped {:?}: not an animated image", SKIP_PREFIX, input);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            pb.finish_and_clear();
            Err(e)
        }
    }
}

fn batch_compress(config: BatchConfig) -> Result<ExitCode> {
    info!("🚀 Starting batch recompression...");
    info!("📁 Input: {}", config.input);
    info!("📁 Output: {:?}", config.output_dir);

    let summary = BatchRunner::new(config).run()?;
    if summary.total_files() == 0 {
        warn!("No WebP files found in the input path");
        return Ok(ExitCode::SUCCESS);
    }

    print_file_reports(&summary);
    print_batch_summary(&summary);

    if summary.has_failures() {
        Ok(ExitCode::from(EXIT_FAILURE))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_file_reports(summary: &BatchSummary) {
    for report in &summary.reports {
        let name = display_name(&report.input);
        match &report.outcome {
            Ok(size) => info!(
                "{} {}: {:.2} KB -> {:.2} KB ({:.1}%)",
                SUCCESS_PREFIX,
                name,
                size.original_size_kb(),
                size.output_size_kb(),
                size.compression_ratio()
            ),
            Err(e) if e.is_skip() => info!("{} {}: not animated, skipped", SKIP_PREFIX, name),
            Err(e) => error!("{}: [{}] {}", name, e.kind(), e),
        }
    }
}

fn print_batch_summary(summary: &BatchSummary) {
    let elapsed = summary.elapsed.as_secs_f64();

    info!("\n📊 Batch Recompression Summary:");
    info!("  📁 Total files: {}", summary.total_files());
    info!("  {} Recompressed: {}", SUCCESS_PREFIX, summary.succeeded);
    info!("  {} Skipped (not animated): {}", SKIP_PREFIX, summary.skipped);
    if summary.has_failures() {
        info!("  ⚠️  Failed: {}", summary.failed);
    }
    info!(
        "  📊 Total original size: {}",
        format_file_size(summary.total_original_size)
    );
    info!(
        "  📊 Total output size: {}",
        format_file_size(summary.total_output_size)
    );
    info!(
        "  🎯 Overall compression ratio: {:.1}%",
        summary.compression_ratio()
    );
    info!("  ⏱️  Total time: {:.2?}", summary.elapsed);
    if elapsed > 0.0 {
        info!(
            "  ⚡ Average speed: {:.2} files/second",
            summary.total_files() as f64 / elapsed
        );
    }
}

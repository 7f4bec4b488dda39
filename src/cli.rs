use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "webp-squeeze",
    about = "Recompress animated WebP files: downscale, retime and re-encode every frame",
    long_about = "webp-squeeze decodes an animated WebP, optionally resizes every frame by a uniform ratio, \
                  applies one frame duration to the whole animation and re-encodes it with libwebp \
                  at the requested quality (lossy, slowest method, infinite loop).",
    version,
    after_help = "EXAMPLES:\n  \
    webp-squeeze compress in.webp out.webp -q 60 -r 0.5\n  \
    webp-squeeze batch ./stickers ./compressed -q 70 -d 40 -R -j 4\n  \
    webp-squeeze info in.webp\n  \
    webp-squeeze check"
)]
pub struct Args {
    #[arg(long, global = true, help = "Only print errors")]
    pub quiet: bool,

    #[arg(short = 'v', long, global = true, help = "Print extra diagnostics")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(
        about = "Recompress a single animated WebP file",
        long_about = "Recompress one animated WebP. A still (single-frame) image is skipped \
                      and no output is written."
    )]
    Compress {
        #[arg(help = "Input animated WebP file")]
        input: PathBuf,

        #[arg(help = "Output WebP file path")]
        output: PathBuf,

        #[arg(
            short = 'q',
            long,
            help = "Encoding quality (0-100, default: 80)",
            long_help = "Lossy encoding quality from 0 (smallest) to 100 (best looking)."
        )]
        quality: Option<i32>,

        #[arg(
            short = 'r',
            long = "resize-ratio",
            help = "Scale factor for every frame (default: 1.0)",
            long_help = "Each frame is resized to round(width*ratio) x round(height*ratio) \
                         with a Lanczos3 filter. 1.0 keeps the original size."
        )]
        resize_ratio: Option<f64>,

        #[arg(
            short = 'd',
            long,
            help = "Frame duration in milliseconds for every frame",
            long_help = "Uniform duration applied to every output frame. Defaults to the \
                         duration of the source's first frame, or 100 ms."
        )]
        duration: Option<u32>,
    },

    #[command(
        about = "Recompress every animated WebP in a directory",
        long_about = "Process every .webp file found in a directory, glob pattern or single file. \
                      Outputs are written as <output_dir>/<name>.webp; a failing file does not \
                      stop the batch."
    )]
    Batch {
        #[arg(
            help = "Input directory, file or glob",
            long_help = "Input can be a directory path, a single file or a glob expression. \
                         Examples: './stickers', './stickers/*.webp'"
        )]
        input: String,

        #[arg(help = "Output directory path")]
        output: PathBuf,

        #[arg(short = 'q', long, help = "Encoding quality (0-100, default: 80)")]
        quality: Option<i32>,

        #[arg(
            short = 'r',
            long = "resize-ratio",
            help = "Scale factor for every frame (default: 1.0)"
        )]
        resize_ratio: Option<f64>,

        #[arg(short = 'd', long, help = "Frame duration in milliseconds for every frame")]
        duration: Option<u32>,

        #[arg(
            short = 'R',
            long,
            help = "Process subdirectories recursively",
            long_help = "Recursively process all subdirectories when input is a directory."
        )]
        recursive: bool,

        #[arg(
            short = 'j',
            long,
            default_value_t = 1,
            help = "Files processed in parallel (0 = one per CPU)",
            long_help = "Number of files recompressed at the same time. The effective value \
                         is lowered when available memory is short."
        )]
        jobs: usize,
    },

    #[command(
        about = "Display animation information",
        long_about = "Show canvas size, alpha, frame count, loop count and frame timing of a WebP file."
    )]
    Info {
        #[arg(help = "WebP file to analyze")]
        input: PathBuf,
    },

    #[command(about = "Report the WebP codec capabilities of this build")]
    Check,
}

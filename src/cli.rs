use std::path::PathBuf;

use clap::Parser;

use glsketch::SketchKind;

/// Small animated OpenGL sketches.
#[derive(Parser, Debug)]
#[command(name = "glsketch", about = "Small animated OpenGL sketches", version)]
pub struct Cli {
    /// Sketch to run; defaults to the one named in the config file
    #[arg(long, value_enum)]
    pub sketch: Option<SketchKind>,

    /// Config file; created with defaults when missing
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the available sketches and exit
    #[arg(long)]
    pub list: bool,

    /// Render into the in-memory validating context instead of a window
    #[arg(long)]
    pub headless: bool,

    /// Stop after this many frames
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// Log level override (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<log::LevelFilter>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from([
            "glsketch",
            "--sketch",
            "particles",
            "--headless",
            "--max-frames",
            "30",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.sketch, Some(SketchKind::Particles));
        assert!(cli.headless);
        assert_eq!(cli.max_frames, Some(30));
        assert_eq!(cli.log_level, Some(log::LevelFilter::Debug));
        assert!(!cli.list);
    }

    #[test]
    fn test_unknown_sketch_is_rejected() {
        assert!(Cli::try_parse_from(["glsketch", "--sketch", "teapot"]).is_err());
    }
}

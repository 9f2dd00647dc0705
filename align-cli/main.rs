use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Instant;

use align_cli::io::{list_images, load_image, save_image};
use align_cli::{default_threads, init_thread_pool, AlignConfig, Aligner};
use argh::FromArgs;

/// Align every image of a directory onto the next one.
#[derive(Debug, FromArgs)]
struct Args {
    /// directory with the input image sequence
    #[argh(option, default = "String::from(\"./data/07/\")")]
    img_path: String,

    /// directory for the aligned images
    #[argh(option, default = "String::from(\"./data/save/07/aligned/\")")]
    save_path: String,

    /// directory for the match visualizations
    #[argh(option, default = "String::from(\"./data/save/07/matched/\")")]
    match_save_path: String,

    /// configuration file (.toml or .json)
    #[argh(option)]
    config: Option<String>,

    /// named preset: fast, balanced or precise
    #[argh(option)]
    preset: Option<String>,

    /// lowe ratio for the match filter
    #[argh(option)]
    ratio: Option<f32>,

    /// randomized KD-trees in the matcher forest
    #[argh(option)]
    trees: Option<usize>,

    /// descriptors examined per query
    #[argh(option)]
    checks: Option<usize>,

    /// ransac reprojection threshold in pixels
    #[argh(option)]
    threshold: Option<f64>,

    /// maximum RANSAC iterations
    #[argh(option)]
    iterations: Option<usize>,

    /// seed for the matcher and RANSAC
    #[argh(option)]
    seed: Option<u64>,

    /// worker threads (default: all cores)
    #[argh(option)]
    threads: Option<usize>,

    /// keep only the strongest keypoints per image
    #[argh(option)]
    max_features: Option<usize>,

    /// draw only RANSAC inliers in the match visualizations
    #[argh(switch)]
    inliers_only: bool,
}

fn build_config(args: &Args) -> Result<AlignConfig, Box<dyn Error>> {
    let mut cfg = match (&args.config, &args.preset) {
        (Some(path), _) => AlignConfig::load(path)?,
        (None, Some(name)) => AlignConfig::from_preset(name)?,
        (None, None) => AlignConfig::default(),
    };

    if let Some(ratio) = args.ratio {
        cfg.ratio = ratio;
    }
    if let Some(trees) = args.trees {
        cfg.matcher.trees = trees;
    }
    if let Some(checks) = args.checks {
        cfg.matcher.checks = checks;
    }
    if let Some(threshold) = args.threshold {
        cfg.ransac.reproj_threshold = threshold;
    }
    if let Some(iterations) = args.iterations {
        cfg.ransac.max_iterations = iterations;
    }
    if let Some(seed) = args.seed {
        cfg = cfg.with_seed(seed);
    }
    if let Some(threads) = args.threads {
        cfg.threads = Some(threads);
    }
    if let Some(max_features) = args.max_features {
        cfg.detector.max_features = Some(max_features);
    }
    if args.inliers_only {
        cfg.visualization.draw_outliers = false;
    }

    cfg.validate()?;
    Ok(cfg)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Args = argh::from_env();
    let cfg = build_config(&args)?;
    init_thread_pool(cfg.threads.unwrap_or_else(default_threads))?;
    log::debug!("{}", cfg.summary());

    let files = list_images(&args.img_path)?;
    if files.len() < 2 {
        log::warn!(
            "Found {} image(s) in {}; need at least two to align",
            files.len(),
            args.img_path
        );
        return Ok(());
    }
    log::info!("Aligning {} images from {}", files.len(), args.img_path);

    let aligner = Aligner::new(cfg)?;
    let save_dir = PathBuf::from(&args.save_path);
    let match_dir = PathBuf::from(&args.match_save_path);

    let t0 = Instant::now();
    let mut aligned = 0usize;
    let mut previous = load_image(&files[0])?;
    for (i, path) in files.iter().enumerate().skip(1) {
        let pair = i - 1;
        let current = load_image(path)?;
        log::info!("Pair {}: {} -> {}", pair, name(&files[pair]), name(path));

        match aligner.align_pair(&previous, &current) {
            Ok(result) => {
                save_image(match_dir.join(format!("matched_{}.jpg", pair)), &result.visualization)?;
                save_image(save_dir.join(format!("aligned_{}.jpg", pair)), &result.warped)?;
                aligned += 1;
            }
            Err(e) if e.is_recoverable() => log::warn!("Skipping pair {}: {}", pair, e),
            Err(e) => return Err(e.into()),
        }
        previous = current;
    }

    log::info!(
        "Aligned {} of {} pairs in {:.2?}",
        aligned,
        files.len() - 1,
        t0.elapsed()
    );
    Ok(())
}

fn name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::from_args(&["imalign"], args).unwrap()
    }

    #[test]
    fn test_defaults_match_original_layout() {
        let args = parse(&[]);
        assert_eq!(args.img_path, "./data/07/");
        assert_eq!(args.save_path, "./data/save/07/aligned/");
        assert_eq!(args.match_save_path, "./data/save/07/matched/");
        assert_eq!(build_config(&args).unwrap(), AlignConfig::default());
    }

    #[test]
    fn test_overrides_apply_to_stages() {
        let args = parse(&[
            "--ratio", "0.8", "--threshold", "2.5", "--trees", "7", "--seed", "9", "--inliers-only",
        ]);
        let cfg = build_config(&args).unwrap();
        assert_eq!(cfg.ratio, 0.8);
        assert_eq!(cfg.ransac.reproj_threshold, 2.5);
        assert_eq!(cfg.matcher.trees, 7);
        assert_eq!(cfg.ransac.random_seed, Some(9));
        assert!(!cfg.visualization.draw_outliers);
    }

    #[test]
    fn test_invalid_override_rejected() {
        assert!(build_config(&parse(&["--ratio", "1.5"])).is_err());
        assert!(build_config(&parse(&["--preset", "turbo"])).is_err());
    }
}

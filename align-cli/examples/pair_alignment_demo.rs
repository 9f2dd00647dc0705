use std::time::Instant;

use align_cli::io::{load_image, save_image};
use align_cli::{AlignConfig, Aligner};

/// Usage: pair_alignment_demo <first> <second> [output_dir]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (first, second) = match (args.first(), args.get(1)) {
        (Some(a), Some(b)) => (a.clone(), b.clone()),
        _ => {
            eprintln!("usage: pair_alignment_demo <first> <second> [output_dir]");
            return Ok(());
        }
    };
    let out_dir = args.get(2).cloned().unwrap_or_else(|| "alignment_demo".to_string());

    let a = load_image(&first)?;
    let b = load_image(&second)?;
    println!("📷 {} ({}x{}) -> {} ({}x{})", first, a.width(), a.height(), second, b.width(), b.height());

    for (name, cfg) in [
        ("fast", AlignConfig::fast_preset()),
        ("balanced", AlignConfig::balanced_preset()),
        ("precise", AlignConfig::precise_preset()),
    ] {
        let aligner = Aligner::new(cfg.with_seed(1))?;
        let t0 = Instant::now();
        match aligner.align_pair(&a, &b) {
            Ok(result) => {
                println!("⚡ {:<8} {:>8.2?}  {}", name, t0.elapsed(), result.summary());
                save_image(format!("{}/{}_matched.jpg", out_dir, name), &result.visualization)?;
                save_image(format!("{}/{}_aligned.jpg", out_dir, name), &result.warped)?;
            }
            Err(e) => println!("❌ {:<8} {}", name, e),
        }
    }

    println!("\n💾 Results written to {}/", out_dir);
    Ok(())
}

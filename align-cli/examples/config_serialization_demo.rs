#[cfg(feature = "serde")]
use align_cli::AlignConfig;

#[cfg(feature = "serde")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔧 Alignment Configuration Serialization Demo");
    println!("==============================================\n");

    let presets = [
        ("fast", AlignConfig::fast_preset()),
        ("balanced", AlignConfig::balanced_preset()),
        ("precise", AlignConfig::precise_preset().with_seed(42)),
    ];

    println!("📋 Presets:");
    for (name, cfg) in &presets {
        println!("   • {}:\n{}\n", name, cfg.summary());
    }

    let out_dir = std::env::temp_dir().join("align_config_demo");
    std::fs::create_dir_all(&out_dir)?;

    println!("📄 Saving JSON and TOML files to {}", out_dir.display());
    for (name, cfg) in &presets {
        cfg.save(out_dir.join(format!("{}.json", name)))?;
        cfg.save(out_dir.join(format!("{}.toml", name)))?;
    }

    println!("\n🔍 Reloading and comparing:");
    for (name, cfg) in &presets {
        let from_json = AlignConfig::load(out_dir.join(format!("{}.json", name)))?;
        let from_toml = AlignConfig::load(out_dir.join(format!("{}.toml", name)))?;
        let ok = from_json == *cfg && from_toml == *cfg;
        println!("   {} {}", if ok { "✅" } else { "❌" }, name);
    }

    println!("\n📝 Precise preset as TOML:\n{}", presets[2].1.to_toml()?);

    println!("🚫 Invalid configuration is rejected on load:");
    match AlignConfig::from_toml("ratio = 1.5") {
        Ok(_) => println!("   unexpectedly accepted"),
        Err(e) => println!("   {}", e),
    }

    Ok(())
}

#[cfg(not(feature = "serde"))]
fn main() {
    println!("This demo requires the 'serde' feature.");
}

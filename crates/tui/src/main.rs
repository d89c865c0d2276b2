mod renderer;

use std::path::PathBuf;

use anyhow::Result;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: barrage <feed.json>");
        std::process::exit(1);
    }

    let path = PathBuf::from(&args[1]);
    let data = std::fs::read(&path)?;
    let comments = barrage_core::feed::parse_json(&data)?;

    renderer::run(comments)?;
    Ok(())
}

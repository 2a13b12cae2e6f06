use anyhow::*;
use fs_extra::copy_items;
use fs_extra::dir::CopyOptions;
use std::env;
use std::path::PathBuf;

fn main() -> Result<()> {
    // Rerun if the model or its textures change.
    println!("cargo:rerun-if-changed=assets/*");
    println!("cargo:rerun-if-changed=config/*");

    let out_dir = env::var("OUT_DIR")?;
    let mut copy_options = CopyOptions::new();
    copy_options.overwrite = true;
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let paths_to_copy: Vec<PathBuf> = ["assets", "config"]
        .iter()
        .map(|dir| manifest_dir.join(dir))
        .filter(|dir| dir.exists())
        .collect();
    if !paths_to_copy.is_empty() {
        copy_items(&paths_to_copy, out_dir, &copy_options)?;
    }

    Ok(())
}

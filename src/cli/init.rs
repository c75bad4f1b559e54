//! Init command - write an example config file

use crate::config::{init_config, CONFIG_FILE_NAME};
use anyhow::Result;
use console::style;
use std::path::Path;

pub(super) fn run() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);
    if init_config(path)? {
        println!(
            "{} Created {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
    } else {
        println!(
            "{} {} already exists, leaving it unchanged",
            style("✓").green(),
            style(path.display()).cyan()
        );
    }
    Ok(())
}

use anyhow::Result;

use crate::commands::load_pool_config;

pub fn run(file: Option<String>) -> Result<()> {
    let config = load_pool_config(file.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

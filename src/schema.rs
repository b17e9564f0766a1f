use schemars::schema_for;

use delta_vault::model::{VaultConfig, VaultState};

/// Generate and print the JSON Schema for `VaultConfig`.
pub fn run() -> anyhow::Result<()> {
    let schema = schema_for!(VaultConfig);
    let json = serde_json::to_string_pretty(&schema)?;
    println!("{json}");
    Ok(())
}

/// Generate and print the JSON Schema for the persisted `VaultState`.
pub fn run_state() -> anyhow::Result<()> {
    let schema = schema_for!(VaultState);
    let json = serde_json::to_string_pretty(&schema)?;
    println!("{json}");
    Ok(())
}

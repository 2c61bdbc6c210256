use anyhow::Result;
use rcl_config::{load_control_document, load_layered_yaml};

pub fn config_hash(paths: &[String]) -> Result<()> {
    let loaded = load_layered_yaml(paths)?;
    println!("config_hash={}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(())
}

pub fn config_check(paths: &[String]) -> Result<()> {
    let (loaded, doc) = load_control_document(paths)?;
    let mandates = doc.accounts.iter().filter(|a| a.mandate.is_some()).count();
    let locked = doc.policies.values().filter(|p| p.locked).count();
    println!("config_ok=true");
    println!("config_hash={}", loaded.config_hash);
    println!("accounts={} mandate_accounts={}", doc.accounts.len(), mandates);
    println!("policies={} locked_policies={}", doc.policies.len(), locked);
    Ok(())
}

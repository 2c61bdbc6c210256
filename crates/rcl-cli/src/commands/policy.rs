use anyhow::{bail, Result};
use rcl_policy::load_state;
use std::path::Path;

pub fn policy_show(state_path: &str) -> Result<()> {
    let Some(state) = load_state(Path::new(state_path))? else {
        bail!("no policy state at {state_path}");
    };
    for (name, p) in &state.policies {
        let policy = &p.policy;
        println!(
            "policy={} enabled={} locked={} max_risk_per_trade={} min_risk_reward={} max_concurrent_positions={} max_trades_per_day={} seed_hash={}",
            name,
            policy.enabled,
            policy.locked,
            policy.risk.max_risk_per_trade,
            policy.risk.min_risk_reward,
            policy.limits.max_concurrent_positions,
            policy.limits.max_trades_per_day,
            p.seed_hash
        );
    }
    Ok(())
}

use anyhow::{bail, Context, Result};
use rcl_config::RiskPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

pub(crate) const STATE_VERSION: u32 = 1;

/// On-disk policy state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyState {
    pub version: u32,
    pub policies: BTreeMap<String, PersistedPolicy>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersistedPolicy {
    pub policy: RiskPolicy,
    /// Hash of the control-document entry this policy was last seeded from.
    pub seed_hash: String,
}

/// Load a state file. A missing file is `None`; anything unreadable is an
/// error (never silently reset to defaults).
pub fn load_state(path: &Path) -> Result<Option<PolicyState>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("read policy state {:?}", path)),
    };
    let state: PolicyState = serde_json::from_str(&raw)
        .with_context(|| format!("parse policy state {:?}", path))?;
    if state.version != STATE_VERSION {
        bail!(
            "policy state {:?} has version {} (expected {})",
            path,
            state.version,
            STATE_VERSION
        );
    }
    Ok(Some(state))
}

/// Write-temp-then-rename so a crash never leaves a torn file.
pub(crate) fn write_state_atomic(path: &Path, state: &PolicyState) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }
    }
    let body = serde_json::to_vec_pretty(state).context("serialize policy state")?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    {
        let mut f = fs::File::create(&tmp).with_context(|| format!("create {:?}", tmp))?;
        f.write_all(&body).with_context(|| format!("write {:?}", tmp))?;
        f.sync_all().with_context(|| format!("fsync {:?}", tmp))?;
    }
    fs::rename(&tmp, path).with_context(|| format!("rename {:?} -> {:?}", tmp, path))?;
    Ok(())
}

use anyhow::{bail, Result};
use rcl_audit::{verify_hash_chain, VerifyResult};

pub fn audit_verify(path: &str) -> Result<()> {
    match verify_hash_chain(path)? {
        VerifyResult::Valid { lines } => {
            println!("audit_chain=valid lines={lines}");
            Ok(())
        }
        VerifyResult::Broken { line, reason } => {
            println!("audit_chain=broken line={line}");
            bail!("audit chain broken at line {line}: {reason}")
        }
    }
}

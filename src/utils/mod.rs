use std::sync::{atomic::AtomicBool, Arc};

pub mod arp;
pub mod capture;
pub mod charts;
pub mod fragments;
pub mod int_header;
pub mod raw_socket;
pub mod topology;

/// Flag that turns `true` once SIGINT arrives.
pub fn sigint_flag() -> anyhow::Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop))?;
    Ok(stop)
}

/// Fresh, empty directory for a test.
#[cfg(test)]
pub fn test_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("inttest-{}-{}", name, std::process::id()));
    _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

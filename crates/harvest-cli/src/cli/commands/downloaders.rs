//! `harvest downloaders` – list registered downloaders in lookup order.

use harvest_core::scheduler::DownloadManager;

pub fn run_downloaders(manager: &DownloadManager) {
    let registry = manager.registry();
    if registry.is_empty() {
        println!("No downloaders registered; enable [http] or add [[commands]] in config.toml.");
        return;
    }
    println!("{:<12} {:<8} {}", "NAME", "PRIORITY", "TIMEOUT");
    for d in registry.iter() {
        let timeout = d
            .timeout()
            .map(|t| format!("{}s", t.as_secs()))
            .unwrap_or_else(|| "-".to_string());
        println!("{:<12} {:<8} {}", d.name(), d.priority(), timeout);
    }
}

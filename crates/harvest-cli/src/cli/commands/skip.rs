//! `harvest skip add|remove|list` – manage URLs that are never downloaded.

use anyhow::Result;
use harvest_core::scheduler::DownloadManager;

use crate::cli::SkipAction;

pub async fn run_skip(manager: &DownloadManager, action: SkipAction) -> Result<()> {
    let db = manager.db();
    match action {
        SkipAction::Add { url } => {
            if db.skip_list_add(&url).await? {
                println!("Added {url} to the skip list");
            } else {
                println!("{url} is already on the skip list");
            }
        }
        SkipAction::Remove { url } => {
            if db.skip_list_remove(&url).await? {
                println!("Removed {url} from the skip list");
            } else {
                println!("{url} is not on the skip list");
            }
        }
        SkipAction::List => {
            let urls = db.skip_list().await?;
            if urls.is_empty() {
                println!("Skip list is empty.");
            }
            for url in urls {
                println!("{url}");
            }
        }
    }
    Ok(())
}

use crate::config::SiteConfig;
use std::fs;
use tracing::warn;

/// Page names available in the content root, in directory enumeration order.
///
/// Only regular files carrying the script extension count as pages, which
/// leaves the template out by construction. The index script is skipped.
/// Enumeration failures are logged and yield an empty or partial listing.
pub fn list_pages(config: &SiteConfig) -> Vec<String> {
    let root = &config.root_path;
    let read_dir = match fs::read_dir(root) {
        Ok(v) => v,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "failed to enumerate pages");
            return Vec::new();
        }
    };

    let index_script = config.index_script();
    let mut pages = Vec::new();
    for entry in read_dir {
        let entry = match entry {
            Ok(v) => v,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if file_name == config.template_file || file_name == index_script {
            continue;
        }
        let is_script = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| ext == config.script_extension)
            .unwrap_or(false);
        if !is_script {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        pages.push(stem.to_string());
    }
    pages
}

use serde::Serialize;

use super::classifier;
use crate::common::config::Config;

/// Label used for files no category claims
pub const UNCLASSIFIED: &str = "unclassified";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

/// How many files waiting directly in the watch root fall in each
/// category, in config order, followed by the unclassified count.
pub fn category_counts(config: &Config) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = config
        .categories
        .iter()
        .map(|c| CategoryCount {
            category: c.name.clone(),
            count: 0,
        })
        .collect();
    let mut unclassified = 0usize;

    match std::fs::read_dir(&config.watch_root) {
        Ok(entries) => {
            for entry in entries.filter_map(|e| e.ok()) {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                match classifier::classify(&config.categories, &path) {
                    Some(category) => {
                        if let Some(slot) = counts.iter_mut().find(|c| c.category == category.name) {
                            slot.count += 1;
                        }
                    }
                    None => unclassified += 1,
                }
            }
        }
        Err(e) => {
            tracing::error!(root = %config.watch_root.display(), error = %e, "failed to read watch folder");
        }
    }

    counts.push(CategoryCount {
        category: UNCLASSIFIED.to_string(),
        count: unclassified,
    });
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_counts_only_top_level_files() {
        let dir = TempDir::new().unwrap();
        for name in ["a.pdf", "b.docx", "c.mp3", "d.unknown", "e"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        std::fs::create_dir(dir.path().join("[DOC] 文档")).unwrap();
        std::fs::write(dir.path().join("[DOC] 文档").join("old.pdf"), "x").unwrap();

        let counts = category_counts(&Config::with_root(dir.path()));
        let get = |name: &str| counts.iter().find(|c| c.category == name).unwrap().count;
        assert_eq!(get("[DOC] 文档"), 2);
        assert_eq!(get("[MEDIA] 媒体"), 1);
        assert_eq!(get("[ZIP] 压缩包"), 0);
        assert_eq!(get(UNCLASSIFIED), 2);
        assert_eq!(counts.last().unwrap().category, UNCLASSIFIED);
    }
}

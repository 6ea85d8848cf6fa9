use std::path::Path;

use crate::common::config::{CategoryRule, SubfolderRule};

/// Browser partial-download suffixes; never classified whatever the config says
pub const PARTIAL_DOWNLOAD_EXTENSIONS: &[&str] = &["tmp", "crdownload", "part"];

/// Lowercased extension of `path` without the leading dot
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty())
}

/// Config extensions may be written ".pdf" or "pdf", in any case
fn rule_matches(rule_ext: &str, ext: &str) -> bool {
    rule_ext.trim_start_matches('.').eq_ignore_ascii_case(ext)
}

pub(crate) fn list_contains(list: &[String], ext: &str) -> bool {
    list.iter().any(|r| rule_matches(r, ext))
}

/// Category owning `path`: the first enabled category listing its extension
pub fn classify<'a>(categories: &'a [CategoryRule], path: &Path) -> Option<&'a CategoryRule> {
    let ext = extension_of(path)?;
    if PARTIAL_DOWNLOAD_EXTENSIONS.contains(&ext.as_str()) {
        tracing::debug!(path = %path.display(), "skipping partial download");
        return None;
    }

    categories
        .iter()
        .filter(|c| c.enabled)
        .find(|c| list_contains(&c.extensions, &ext))
}

/// Subfolder of `category` for `path`: first one listing the extension,
/// or the first one with an empty list (catch-all), in declared order.
pub fn subfolder<'a>(category: &'a CategoryRule, path: &Path) -> Option<&'a SubfolderRule> {
    let ext = extension_of(path).unwrap_or_default();
    category
        .subfolders
        .iter()
        .find(|s| s.extensions.is_empty() || list_contains(&s.extensions, &ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::default_categories;

    fn name_of(path: &str) -> Option<String> {
        let categories = default_categories();
        classify(&categories, Path::new(path)).map(|c| c.name.clone())
    }

    #[test]
    fn test_known_extensions() {
        assert_eq!(name_of("/dl/report.pdf").as_deref(), Some("[DOC] 文档"));
        assert_eq!(name_of("/dl/movie.MKV").as_deref(), Some("[MEDIA] 媒体"));
        assert_eq!(name_of("/dl/setup.exe").as_deref(), Some("[APP] 应用"));
        assert_eq!(name_of("/dl/a.7z").as_deref(), Some("[ZIP] 压缩包"));
        assert_eq!(name_of("/dl/main.rb").as_deref(), Some("[DEV] 开发"));
    }

    #[test]
    fn test_first_declared_category_wins() {
        // .json is listed by both documents and development
        assert_eq!(name_of("/dl/data.json").as_deref(), Some("[DOC] 文档"));
    }

    #[test]
    fn test_disabled_category_is_skipped() {
        let mut categories = default_categories();
        categories[0].enabled = false;
        let hit = classify(&categories, Path::new("data.json")).unwrap();
        assert_eq!(hit.name, "[DEV] 开发");
        assert!(classify(&categories, Path::new("report.pdf")).is_none());
    }

    #[test]
    fn test_partial_downloads_always_rejected() {
        let mut categories = default_categories();
        categories[0].extensions.push(".part".into());
        categories[0].extensions.push("crdownload".into());
        assert!(classify(&categories, Path::new("a.part")).is_none());
        assert!(classify(&categories, Path::new("a.crdownload")).is_none());
        assert!(classify(&categories, Path::new("a.TMP")).is_none());
    }

    #[test]
    fn test_unclassified() {
        assert!(name_of("/dl/mystery.xyz").is_none());
        assert!(name_of("/dl/Makefile").is_none());
    }

    #[test]
    fn test_classification_is_stable() {
        let categories = default_categories();
        for category in &categories {
            for ext in &category.extensions {
                let path = format!("file{}", ext);
                let first = classify(&categories, Path::new(&path)).map(|c| c.name.clone());
                let second = classify(&categories, Path::new(&path)).map(|c| c.name.clone());
                assert!(first.is_some(), "{} unclassified", path);
                assert_eq!(first, second);
            }
        }
    }

    #[test]
    fn test_subfolder_lookup() {
        let categories = default_categories();
        let doc = &categories[0];
        assert_eq!(subfolder(doc, Path::new("a.pdf")).unwrap().name, "PDF");
        assert_eq!(subfolder(doc, Path::new("a.DOCX")).unwrap().name, "Office");
        assert!(subfolder(doc, Path::new("a.zip")).is_none());
    }

    #[test]
    fn test_subfolder_catch_all_in_order() {
        let category = CategoryRule {
            name: "Misc".into(),
            enabled: true,
            extensions: vec![".a".into(), ".b".into()],
            subfolders: vec![
                SubfolderRule {
                    name: "A".into(),
                    extensions: vec!["a".into()],
                },
                SubfolderRule {
                    name: "Rest".into(),
                    extensions: vec![],
                },
                SubfolderRule {
                    name: "B".into(),
                    extensions: vec![".b".into()],
                },
            ],
        };
        assert_eq!(subfolder(&category, Path::new("x.a")).unwrap().name, "A");
        assert_eq!(subfolder(&category, Path::new("x.b")).unwrap().name, "Rest");
    }

    #[test]
    fn test_no_subfolders_means_root() {
        let category = CategoryRule {
            name: "Flat".into(),
            enabled: true,
            extensions: vec![".a".into()],
            subfolders: vec![],
        };
        assert!(subfolder(&category, Path::new("x.a")).is_none());
    }
}

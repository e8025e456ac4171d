use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::GalleryError;

/// Dataset compiled into the binary, used when no `--catalog` file is given.
pub const EMBEDDED_CATALOG: &str = include_str!("../assets/postcodes.csv");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostcodeRecord {
    pub postcode: String,
    pub suburb: String,
    pub state: String,
}

/// Ordered postcode records. The order is the scroll index space.
#[derive(Debug, Default)]
pub struct PostcodeCatalog {
    records: Vec<PostcodeRecord>,
    first_index: HashMap<String, usize>,
    unique: Vec<String>,
}

fn clean_field(field: &str) -> &str {
    let f = field.trim();
    let f = f.strip_prefix('"').unwrap_or(f);
    let f = f.strip_suffix('"').unwrap_or(f);
    f.trim()
}

impl PostcodeCatalog {
    /// Parse a comma-separated blob. Malformed rows are dropped, never reported.
    pub fn parse(text: &str) -> Self {
        let mut catalog = Self::default();
        let mut seen_row = false;

        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(clean_field).collect();

            // Header is only recognised in first position.
            if !seen_row {
                seen_row = true;
                if fields[0].to_ascii_lowercase().starts_with("postcode") {
                    continue;
                }
            }

            if fields.len() < 3 {
                continue;
            }

            catalog.push(PostcodeRecord {
                postcode: format!("{:0>4}", fields[0]),
                suburb: fields[1].to_string(),
                state: fields[2].to_string(),
            });
        }

        catalog
    }

    fn push(&mut self, record: PostcodeRecord) {
        let idx = self.records.len();
        if !self.first_index.contains_key(&record.postcode) {
            self.first_index.insert(record.postcode.clone(), idx);
            self.unique.push(record.postcode.clone());
        }
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&PostcodeRecord> {
        self.records.get(idx)
    }

    pub fn records(&self) -> &[PostcodeRecord] {
        &self.records
    }

    /// Index of the first record carrying `postcode`.
    pub fn index_of(&self, postcode: &str) -> Option<usize> {
        self.first_index.get(postcode).copied()
    }

    /// Postcodes in first-appearance order, each listed once.
    pub fn unique_postcodes(&self) -> &[String] {
        &self.unique
    }

    /// Wrap any signed index into `[0, len)`. Returns 0 for an empty catalog.
    pub fn wrap(&self, idx: i64) -> usize {
        if self.records.is_empty() {
            return 0;
        }
        idx.rem_euclid(self.records.len() as i64) as usize
    }
}

/// Read a catalog file, or fall back to the embedded dataset.
pub fn load_catalog(path: Option<&Path>) -> Result<PostcodeCatalog, GalleryError> {
    let catalog = match path {
        Some(p) => {
            let text = fs::read_to_string(p).map_err(|source| GalleryError::Io {
                path: p.to_path_buf(),
                source,
            })?;
            PostcodeCatalog::parse(&text)
        }
        None => PostcodeCatalog::parse(EMBEDDED_CATALOG),
    };
    log::info!(
        "Catalog loaded: {} records, {} unique postcodes",
        catalog.len(),
        catalog.unique_postcodes().len()
    );
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_row() {
        let c = PostcodeCatalog::parse("2000, Sydney, NSW");
        assert_eq!(
            c.get(0),
            Some(&PostcodeRecord {
                postcode: "2000".into(),
                suburb: "Sydney".into(),
                state: "NSW".into(),
            })
        );
    }

    #[test]
    fn skips_header_blank_and_short_rows() {
        let text = "Postcode,Suburb,State\n\n800,Darwin,NT\n2600,Canberra\n  \n\"3000\",\"Melbourne\",\"VIC\",extra\n";
        let c = PostcodeCatalog::parse(text);
        assert_eq!(c.len(), 2);
        assert_eq!(c.get(0).unwrap().postcode, "0800");
        assert_eq!(c.get(1).unwrap().suburb, "Melbourne");
        assert_eq!(c.get(1).unwrap().state, "VIC");
    }

    #[test]
    fn header_only_recognised_first() {
        let c = PostcodeCatalog::parse("2000,Sydney,NSW\npostcode,x,y\n");
        assert_eq!(c.len(), 2);
        assert_eq!(c.get(1).unwrap().postcode, "postcode");
    }

    #[test]
    fn first_occurrence_wins_for_index() {
        let c = PostcodeCatalog::parse("2000,Sydney,NSW\n2010,Surry Hills,NSW\n2000,The Rocks,NSW\n");
        assert_eq!(c.len(), 3);
        assert_eq!(c.index_of("2000"), Some(0));
        assert_eq!(c.index_of("2010"), Some(1));
        assert_eq!(c.unique_postcodes(), &["2000".to_string(), "2010".to_string()]);
        assert_eq!(c.index_of("9999"), None);
    }

    #[test]
    fn wrap_handles_negative_and_empty() {
        let c = PostcodeCatalog::parse("1,a,b\n2,c,d\n3,e,f\n");
        assert_eq!(c.wrap(-1), 2);
        assert_eq!(c.wrap(7), 1);
        assert_eq!(PostcodeCatalog::parse("").wrap(-5), 0);
    }

    #[test]
    fn embedded_dataset_is_usable() {
        let c = PostcodeCatalog::parse(EMBEDDED_CATALOG);
        assert!(!c.is_empty());
        assert!(c.records().iter().all(|r| r.postcode.len() == 4));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_catalog(Some(&dir.path().join("nope.csv"))).unwrap_err();
        assert!(matches!(err, GalleryError::Io { .. }));
    }
}

use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::model::Entity;

/// Label shown for entities that live directly in the scan root
pub const ROOT_LABEL: &str = "(root)";

/// All entities of one directory, sorted
#[derive(Debug)]
pub struct DirectoryBucket<'a> {
    /// Directory relative to the scan root, `""` for the root itself
    pub directory: &'a str,
    pub entities: Vec<&'a Entity>,
}

impl DirectoryBucket<'_> {
    pub fn label(&self) -> &str {
        if self.directory.is_empty() {
            ROOT_LABEL
        } else {
            self.directory
        }
    }

    pub fn function_count(&self) -> usize {
        self.entities.iter().filter(|e| !e.is_record_type()).count()
    }

    pub fn record_type_count(&self) -> usize {
        self.entities.iter().filter(|e| e.is_record_type()).count()
    }
}

/// Every entity found in one scan.
///
/// Insertion order carries no meaning; all views are sorted, so parallel
/// extraction cannot change the output.
#[derive(Debug, Clone, Default)]
pub struct EntityRepository {
    entities: Vec<Entity>,
}

impl EntityRepository {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self { entities }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn function_count(&self) -> usize {
        self.entities.iter().filter(|e| !e.is_record_type()).count()
    }

    pub fn record_type_count(&self) -> usize {
        self.entities.iter().filter(|e| e.is_record_type()).count()
    }

    /// Directory buckets in lexicographic order, each sorted by name
    pub fn grouped(&self) -> Vec<DirectoryBucket<'_>> {
        let mut buckets: BTreeMap<&str, Vec<&Entity>> = BTreeMap::new();
        for entity in &self.entities {
            buckets.entry(entity.directory()).or_default().push(entity);
        }

        buckets
            .into_iter()
            .map(|(directory, mut entities)| {
                entities.sort_by(|a, b| compare_entities(a, b));
                DirectoryBucket {
                    directory,
                    entities,
                }
            })
            .collect()
    }

    /// All entities in report order: directory first, then name
    pub fn sorted(&self) -> Vec<&Entity> {
        self.grouped()
            .into_iter()
            .flat_map(|bucket| bucket.entities)
            .collect()
    }
}

impl FromIterator<Entity> for EntityRepository {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Name (case-sensitive), then file path, then line number
fn compare_entities(a: &Entity, b: &Entity) -> Ordering {
    a.name()
        .cmp(b.name())
        .then_with(|| a.file_path().cmp(b.file_path()))
        .then_with(|| a.line_number().cmp(&b.line_number()))
}

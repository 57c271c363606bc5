//! Tag taxonomy: job titles, skills and languages, each a localized
//! document with relatedness lists maintained from co-occurrence on
//! published jobs.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::{decode, encode, CollectionPath, ConvertError, DocumentStore, StoreError, WriteBatch};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub String);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TagKind {
    JobTitles,
    Skills,
    Languages,
}

impl TagKind {
    pub const ALL: [TagKind; 3] = [TagKind::JobTitles, TagKind::Skills, TagKind::Languages];

    pub const fn collection_name(self) -> &'static str {
        match self {
            TagKind::JobTitles => "jobTitles",
            TagKind::Skills => "skills",
            TagKind::Languages => "languages",
        }
    }

    pub fn collection(self) -> CollectionPath {
        CollectionPath::new(self.collection_name())
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_name())
    }
}

/// Weighted edge to another tag; higher scores mean the pair shows up
/// together more often.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedTag {
    pub id: TagId,
    pub score: u32,
}

/// Localized taxonomy entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub is: String,
    pub en: String,
    #[serde(default)]
    pub related_job_titles: Vec<RelatedTag>,
    #[serde(default)]
    pub related_skills: Vec<RelatedTag>,
    #[serde(default)]
    pub related_languages: Vec<RelatedTag>,
}

impl Tag {
    pub fn new(id: TagId, is: impl Into<String>, en: impl Into<String>) -> Self {
        Self {
            id,
            is: is.into(),
            en: en.into(),
            related_job_titles: Vec::new(),
            related_skills: Vec::new(),
            related_languages: Vec::new(),
        }
    }

    fn related_mut(&mut self, kind: TagKind) -> &mut Vec<RelatedTag> {
        match kind {
            TagKind::JobTitles => &mut self.related_job_titles,
            TagKind::Skills => &mut self.related_skills,
            TagKind::Languages => &mut self.related_languages,
        }
    }
}

/// Free-text tag suggestions awaiting taxonomy approval. Persisted as
/// null when every list is empty, so `Some` always means something is
/// actually pending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnapprovedTags {
    #[serde(default)]
    pub job_titles: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
}

impl UnapprovedTags {
    pub fn is_empty(&self) -> bool {
        self.job_titles.is_empty() && self.skills.is_empty() && self.languages.is_empty()
    }

    /// Collapses an all-empty suggestion set to `None`.
    pub fn normalize(tags: Option<UnapprovedTags>) -> Option<UnapprovedTags> {
        tags.filter(|tags| !tags.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagDoc {
    is: String,
    en: String,
    #[serde(default)]
    related_job_titles: Vec<RelatedTag>,
    #[serde(default)]
    related_skills: Vec<RelatedTag>,
    #[serde(default)]
    related_languages: Vec<RelatedTag>,
}

impl TagDoc {
    fn from_tag(tag: &Tag) -> Self {
        Self {
            is: tag.is.clone(),
            en: tag.en.clone(),
            related_job_titles: tag.related_job_titles.clone(),
            related_skills: tag.related_skills.clone(),
            related_languages: tag.related_languages.clone(),
        }
    }

    fn into_tag(self, id: TagId) -> Tag {
        Tag {
            id,
            is: self.is,
            en: self.en,
            related_job_titles: self.related_job_titles,
            related_skills: self.related_skills,
            related_languages: self.related_languages,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("tag {id} not found in {kind}")]
    NotFound { kind: TagKind, id: TagId },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

pub struct TagService<S> {
    store: Arc<S>,
}

impl<S: DocumentStore> TagService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, kind: TagKind, tag: &Tag) -> Result<(), TagError> {
        let path = kind.collection().doc(tag.id.0.clone());
        self.store.set(&path, encode(&TagDoc::from_tag(tag))?).await?;
        Ok(())
    }

    pub async fn get(&self, kind: TagKind, id: &TagId) -> Result<Tag, TagError> {
        let path = kind.collection().doc(id.0.clone());
        let doc = self
            .store
            .get(&path)
            .await?
            .ok_or_else(|| TagError::NotFound { kind, id: id.clone() })?;
        Ok(decode::<TagDoc>(&doc)?.into_tag(id.clone()))
    }

    /// All tags of one kind; documents that fail to decode are logged and
    /// skipped so one bad entry cannot hide the taxonomy.
    pub async fn all(&self, kind: TagKind) -> Result<Vec<Tag>, TagError> {
        let docs = self.store.list(&kind.collection()).await?;
        let mut tags = Vec::with_capacity(docs.len());
        for doc in docs {
            match decode::<TagDoc>(&doc) {
                Ok(tag) => tags.push(tag.into_tag(TagId(doc.path.id().to_string()))),
                Err(err) => warn!(error = %err, "skipping undecodable tag"),
            }
        }
        Ok(tags)
    }

    /// Bumps pairwise relatedness for every tag observed together on one
    /// job: each tag's related list gains one point per co-occurring tag,
    /// and lists stay sorted by descending score. Tags missing from the
    /// taxonomy are skipped with a warning.
    pub async fn reinforce_relations(
        &self,
        job_titles: &[TagId],
        skills: &[TagId],
        languages: &[TagId],
    ) -> Result<(), TagError> {
        let groups: [(TagKind, &[TagId]); 3] = [
            (TagKind::JobTitles, job_titles),
            (TagKind::Skills, skills),
            (TagKind::Languages, languages),
        ];

        let mut loaded: BTreeMap<(TagKind, TagId), Tag> = BTreeMap::new();
        for (kind, ids) in &groups {
            for id in *ids {
                match self.get(*kind, id).await {
                    Ok(tag) => {
                        loaded.insert((*kind, id.clone()), tag);
                    }
                    Err(TagError::NotFound { .. }) => {
                        warn!(kind = %kind, tag = %id, "co-occurring tag missing from taxonomy");
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        for ((kind, id), tag) in loaded.iter_mut() {
            for (other_kind, ids) in &groups {
                let related = tag.related_mut(*other_kind);
                for other in *ids {
                    if *other_kind == *kind && other == id {
                        continue;
                    }
                    match related.iter_mut().find(|entry| entry.id == *other) {
                        Some(entry) => entry.score += 1,
                        None => related.push(RelatedTag {
                            id: other.clone(),
                            score: 1,
                        }),
                    }
                }
                related.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
            }
        }

        let mut batch = WriteBatch::new();
        for ((kind, id), tag) in &loaded {
            let path = kind.collection().doc(id.0.clone());
            batch.set(path, encode(&TagDoc::from_tag(tag))?);
        }
        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> TagService<MemoryStore> {
        TagService::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn normalize_collapses_all_empty_sets() {
        assert_eq!(UnapprovedTags::normalize(None), None);
        assert_eq!(UnapprovedTags::normalize(Some(UnapprovedTags::default())), None);

        let pending = UnapprovedTags {
            skills: vec!["welding".to_string()],
            ..UnapprovedTags::default()
        };
        assert_eq!(UnapprovedTags::normalize(Some(pending.clone())), Some(pending));
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let tags = service();
        let carpenter = Tag::new(TagId("carpenter".into()), "Smiður", "Carpenter");
        tags.upsert(TagKind::JobTitles, &carpenter).await.expect("upsert");
        let loaded = tags.get(TagKind::JobTitles, &carpenter.id).await.expect("get");
        assert_eq!(loaded, carpenter);
    }

    #[tokio::test]
    async fn missing_tag_is_reported_with_kind() {
        let tags = service();
        let err = tags
            .get(TagKind::Skills, &TagId("welding".into()))
            .await
            .expect_err("absent");
        assert!(matches!(err, TagError::NotFound { kind: TagKind::Skills, .. }));
    }

    #[tokio::test]
    async fn reinforcement_scores_accumulate_and_sort() {
        let tags = service();
        for (id, is, en) in [
            ("carpenter", "Smiður", "Carpenter"),
            ("painter", "Málari", "Painter"),
        ] {
            tags.upsert(TagKind::JobTitles, &Tag::new(TagId(id.into()), is, en))
                .await
                .expect("seed");
        }
        tags.upsert(TagKind::Skills, &Tag::new(TagId("welding".into()), "Suða", "Welding"))
            .await
            .expect("seed");

        let titles = [TagId("carpenter".into()), TagId("painter".into())];
        let skills = [TagId("welding".into())];
        tags.reinforce_relations(&titles, &skills, &[]).await.expect("first pass");
        tags.reinforce_relations(&titles, &[], &[]).await.expect("second pass");

        let carpenter = tags
            .get(TagKind::JobTitles, &TagId("carpenter".into()))
            .await
            .expect("get");
        assert_eq!(carpenter.related_job_titles.len(), 1);
        assert_eq!(carpenter.related_job_titles[0].id, TagId("painter".into()));
        assert_eq!(carpenter.related_job_titles[0].score, 2);
        assert_eq!(carpenter.related_skills.len(), 1);
        assert_eq!(carpenter.related_skills[0].score, 1);

        let welding = tags.get(TagKind::Skills, &TagId("welding".into())).await.expect("get");
        assert_eq!(welding.related_job_titles.len(), 2);
        assert!(welding.related_skills.is_empty());
    }

    #[tokio::test]
    async fn unknown_co_occurring_tags_are_skipped() {
        let tags = service();
        tags.upsert(TagKind::JobTitles, &Tag::new(TagId("carpenter".into()), "Smiður", "Carpenter"))
            .await
            .expect("seed");
        tags.reinforce_relations(&[TagId("carpenter".into()), TagId("ghost".into())], &[], &[])
            .await
            .expect("missing tags tolerated");

        let carpenter = tags
            .get(TagKind::JobTitles, &TagId("carpenter".into()))
            .await
            .expect("get");
        // the unknown tag still earns an edge; only its own document is absent
        assert_eq!(carpenter.related_job_titles.len(), 1);
        assert_eq!(carpenter.related_job_titles[0].id, TagId("ghost".into()));
    }
}

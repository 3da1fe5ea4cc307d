//! Multi-paper comparison.
//!
//! Preparation and retrieval fan out independently per paper; only the
//! final synthesis joins them. A paper that fails to prepare contributes
//! its metadata instead of sinking the whole comparison.

use std::collections::HashSet;

use futures::future::join_all;
use paperchat_common::{
    citation, ComparedPaper, ComparisonResult, PaperId, PaperReference, SourceType,
};
use paperchat_ingest::resolver::metadata_text;
use tracing::{info, instrument, warn};

use crate::answer::ChatEngine;
use crate::error::ChatError;
use crate::prompt;

/// One paper's contribution to a comparison prompt.
#[derive(Debug, Clone)]
pub struct PaperContext {
    pub paper_id: PaperId,
    pub title: String,
    pub citation: String,
    pub source_type: SourceType,
    pub context: String,
}

impl ChatEngine {
    /// Compare two or more papers along one aspect.
    ///
    /// References deduplicate by paper id; fewer than two distinct papers is
    /// rejected before any preparation work starts.
    #[instrument(skip(self, references, aspect_query), fields(n = references.len()))]
    pub async fn compare(
        &self,
        references: &[PaperReference],
        aspect_query: &str,
    ) -> Result<ComparisonResult, ChatError> {
        let mut seen = HashSet::new();
        let distinct: Vec<&PaperReference> = references
            .iter()
            .filter(|r| seen.insert(PaperId::from_reference(r)))
            .collect();
        if distinct.len() < 2 {
            return Err(ChatError::InsufficientPapers(distinct.len()));
        }

        // Independent per paper: no ordering across papers, join only at
        // synthesis.
        let contexts: Vec<PaperContext> = join_all(
            distinct
                .iter()
                .map(|reference| self.paper_context(reference, aspect_query)),
        )
        .await;

        let messages = prompt::comparison_messages(&contexts, aspect_query);
        let response = self.generate(messages).await?;

        info!(
            papers = contexts.len(),
            model = self.llm.model_id(),
            "comparison synthesized"
        );

        Ok(ComparisonResult {
            synthesis_text: response.content,
            papers: contexts
                .into_iter()
                .map(|c| ComparedPaper {
                    paper_id: c.paper_id,
                    title: c.title,
                    citation: c.citation,
                    source_type: c.source_type,
                })
                .collect(),
        })
    }

    /// Prepare one paper and pull the excerpts most relevant to the aspect.
    /// Never fails: a broken preparation degrades to metadata.
    async fn paper_context(
        &self,
        reference: &PaperReference,
        aspect_query: &str,
    ) -> PaperContext {
        let paper_id = PaperId::from_reference(reference);
        let label = citation::citation_label(reference);

        let retrieved: Result<(SourceType, String), ChatError> = async {
            self.prepare(reference).await?;
            let session = self
                .session(paper_id)
                .ok_or(ChatError::NotReady(paper_id))?;
            let index = self.store.ensure_index(&session.record).await?;
            let hits = self.store.query(&index, aspect_query, self.top_k).await?;
            let context = hits
                .iter()
                .map(|h| h.chunk.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            Ok((session.record.source_type, context))
        }
        .await;

        match retrieved {
            Ok((source_type, context)) if !context.trim().is_empty() => PaperContext {
                paper_id,
                title: reference.title.clone(),
                citation: label,
                source_type,
                context,
            },
            Ok((source_type, _)) => PaperContext {
                paper_id,
                title: reference.title.clone(),
                citation: label,
                source_type,
                context: fallback_context(reference),
            },
            Err(e) => {
                warn!(paper_id = %paper_id, error = %e, "preparation failed; using metadata");
                let source_type = if has_abstract(reference) {
                    SourceType::MetadataOnly
                } else {
                    SourceType::Unavailable
                };
                PaperContext {
                    paper_id,
                    title: reference.title.clone(),
                    citation: label,
                    source_type,
                    context: fallback_context(reference),
                }
            }
        }
    }
}

fn has_abstract(reference: &PaperReference) -> bool {
    reference
        .abstract_text
        .as_deref()
        .is_some_and(|a| !a.trim().is_empty())
}

fn fallback_context(reference: &PaperReference) -> String {
    if has_abstract(reference) {
        metadata_text(reference)
    } else {
        format!("(no text was available for \"{}\")", reference.title)
    }
}

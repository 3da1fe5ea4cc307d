//! Prompt construction for answering and comparison.
//!
//! Three answer registers: grounded (full text), metadata-only (cautious),
//! and general-knowledge (no source at all), plus the multi-paper synthesis
//! prompt. Instructions go in the system message, retrieved text in the
//! user message.

use crate::compare::PaperContext;
use crate::generate::Message;

const PERSONA: &str = "You are a research assistant that answers questions about \
scholarly papers clearly and accurately.";

/// Prompt for a paper with full extracted text.
pub fn grounded_messages(citation: &str, context: &str, question: &str) -> Vec<Message> {
    let system = format!(
        "{PERSONA}\n\
         Answer from the provided excerpts of the paper.\n\
         - Start with a brief direct answer, then the key details.\n\
         - Use plain language without losing scientific accuracy.\n\
         - When referencing the paper, cite it as {citation}.\n\
         - If the excerpts do not fully answer the question, say so."
    );
    let user = format!(
        "CONTEXT FROM PAPER:\n{context}\n\nQUESTION:\n{question}"
    );
    vec![Message::system(system), Message::user(user)]
}

/// Prompt for a paper grounded only on its title and abstract.
pub fn metadata_messages(citation: &str, context: &str, question: &str) -> Vec<Message> {
    let system = format!(
        "{PERSONA}\n\
         Only the paper's title and abstract are available.\n\
         - Answer from that information alone and be explicit about what it \
           cannot tell you.\n\
         - When referencing the paper, cite it as {citation}.\n\
         - Keep the answer short."
    );
    let user = format!(
        "PAPER INFORMATION:\n{context}\n\nQUESTION:\n{question}"
    );
    vec![Message::system(system), Message::user(user)]
}

/// Prompt when no source material exists at all.
pub fn general_knowledge_messages(title: &str, question: &str) -> Vec<Message> {
    let system = format!(
        "{PERSONA}\n\
         No text or abstract is available for the paper titled \"{title}\".\n\
         Answer from general knowledge of the field and state clearly that \
         the answer is not grounded in the paper itself."
    );
    vec![Message::system(system), Message::user(question.to_string())]
}

/// Synthesis prompt comparing several papers along one aspect.
pub fn comparison_messages(papers: &[PaperContext], aspect_query: &str) -> Vec<Message> {
    let system = format!(
        "{PERSONA}\n\
         Compare the papers below along the requested aspect.\n\
         - Open with a two-sentence summary.\n\
         - Then list the key similarities and differences.\n\
         - Cite each claim with the matching paper's citation.\n\
         - Be objective; note where the papers disagree."
    );

    let mut user = String::new();
    for (i, paper) in papers.iter().enumerate() {
        user.push_str(&format!(
            "{}\nPAPER {}: {}\nCitation: {}\n\nRelevant excerpts:\n{}\n",
            "=".repeat(60),
            i + 1,
            paper.title,
            paper.citation,
            paper.context,
        ));
    }
    user.push_str(&format!("{}\n\nComparison aspect: {aspect_query}\n", "=".repeat(60)));

    vec![Message::system(system), Message::user(user)]
}

//! Prepare one paper and ask it a question end to end.
//!
//! Needs a running generation backend (or GEMINI_API_KEY) and, for full-text
//! grounding, network access to the paper's PDF. Run with:
//! ```bash
//! cargo run --package paperchat-engine --example chat_demo
//! ```

use paperchat_common::{PaperId, PaperReference};
use paperchat_engine::{ChatEngine, EngineConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = EngineConfig::load()?;
    let engine = ChatEngine::from_config(cfg)?;

    let reference = PaperReference {
        title: "Attention Is All You Need".to_string(),
        authors: vec!["Ashish Vaswani".to_string(), "Noam Shazeer".to_string()],
        year: Some(2017),
        abstract_text: Some(
            "The dominant sequence transduction models are based on complex \
             recurrent or convolutional neural networks. We propose the \
             Transformer, based solely on attention mechanisms."
                .to_string(),
        ),
        source_url: Some("https://arxiv.org/abs/1706.03762".to_string()),
        pdf_url: None,
    };

    let outcome = engine.prepare(&reference).await?;
    println!(
        "prepared {} (source: {})",
        outcome.paper_id,
        outcome.source_type.as_str()
    );

    let paper_id = PaperId::from_reference(&reference);
    let turn = engine
        .ask(paper_id, "What architecture does the paper propose, and why?")
        .await?;

    println!("\nanswer:\n{}", turn.answer);
    if let Some(citation) = &turn.citation {
        println!("\ncitation: {} (chunks {:?})", citation.label, citation.chunk_indices);
    }
    if let Some(disclaimer) = &turn.disclaimer {
        println!("note: {disclaimer}");
    }
    if let Some(confidence) = turn.confidence {
        println!("confidence: {confidence}/100");
    }

    Ok(())
}

//! Confidence scoring for answers.
//!
//! Combines source quality, retrieval similarity, answer completeness and
//! chunk usage into a 0–100 score. The score is advisory: it never gates an
//! answer, it only feeds the disclaimer decision and the UI label.

use crate::models::SourceType;

/// Inputs gathered over one conversation turn.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceInputs {
    pub retrieval_scores: Vec<f32>,
    pub answer_chars: usize,
    pub question_chars: usize,
    pub chunks_used: usize,
}

fn source_weight(source_type: SourceType) -> f64 {
    match source_type {
        SourceType::FullTextPdfPrimary | SourceType::FullTextPdfSecondary => 1.0,
        SourceType::MetadataOnly => 0.5,
        SourceType::Unavailable  => 0.3,
    }
}

/// Score one answer. Returns a value in 0..=100.
pub fn score_answer(source_type: SourceType, inputs: &ConfidenceInputs) -> u8 {
    let source_score = source_weight(source_type) * 100.0;

    // Mean retrieval similarity, mapped onto 0..100. Degraded sources get a
    // neutral midpoint when there was nothing to retrieve against.
    let retrieval_score = if inputs.retrieval_scores.is_empty() {
        if source_type.is_full_text() { 0.0 } else { 50.0 }
    } else {
        let sum: f64 = inputs.retrieval_scores.iter().map(|s| *s as f64).sum();
        let mean = sum / inputs.retrieval_scores.len() as f64;
        (mean * 100.0).clamp(0.0, 100.0)
    };

    // Answer/question length ratio: very short answers are penalized, very
    // long ones decay gently.
    let completeness_score = if inputs.answer_chars > 0 && inputs.question_chars > 0 {
        let ratio = inputs.answer_chars as f64 / inputs.question_chars.max(1) as f64;
        if (5.0..=30.0).contains(&ratio) {
            100.0
        } else if ratio < 5.0 {
            ratio * 20.0
        } else {
            (100.0 - (ratio - 30.0) * 2.0).max(50.0)
        }
    } else {
        0.0
    };

    let chunk_score = ((inputs.chunks_used * 20) as f64).min(100.0);

    let final_score = match source_type {
        SourceType::FullTextPdfPrimary | SourceType::FullTextPdfSecondary => {
            source_score * 0.3 + retrieval_score * 0.4 + completeness_score * 0.2 + chunk_score * 0.1
        }
        SourceType::MetadataOnly => {
            source_score * 0.4 + completeness_score * 0.4 + retrieval_score * 0.2
        }
        SourceType::Unavailable => source_score * 0.5 + completeness_score * 0.5,
    };

    final_score.clamp(0.0, 100.0) as u8
}

/// Human-readable label for a score.
pub fn confidence_label(score: u8) -> &'static str {
    match score {
        80..=u8::MAX => "High Confidence",
        60..=79 => "Medium-High Confidence",
        40..=59 => "Medium Confidence",
        20..=39 => "Low-Medium Confidence",
        _ => "Low Confidence",
    }
}

/// Whether the UI should show a disclaimer alongside the answer.
pub fn needs_disclaimer(score: u8, source_type: SourceType) -> bool {
    !source_type.is_full_text() || score < 40
}

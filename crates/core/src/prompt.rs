use crate::settings::CompanyProfile;
use crate::{ChatTurn, QueryKind, SearchCandidate};
use std::fmt::Write;

const PRODUCT_KEYWORDS: &[&str] = &[
    "door", "doors", "porte", "porta", "catalog", "catalogo", "product", "prodotti", "products",
    "models", "modelli", "list", "lista", "show", "mostra", "hai", "have", "available",
    "disponibili", "cosa", "what", "quali", "which", "mobili", "furniture", "arredamenti",
    "vendete", "sell", "offrite", "offer",
];

/// Substring match against the product vocabulary, mirroring how visitors
/// phrase catalogue questions in Italian and English.
pub fn classify_query(message: &str) -> QueryKind {
    let lowered = message.to_lowercase();
    if PRODUCT_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
        QueryKind::Product
    } else {
        QueryKind::General
    }
}

pub fn join_context(hits: &[SearchCandidate]) -> String {
    hits.iter()
        .map(|hit| hit.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn preamble(kind: QueryKind, company: &CompanyProfile) -> String {
    let persona = format!(
        "You are {}, virtual assistant for {} in {}.",
        company.assistant_name, company.name, company.location
    );
    let task = match kind {
        QueryKind::Product => {
            "List every product from the context that matches the question. Include names, codes and finishes."
        }
        QueryKind::General => {
            "Answer using the provided context about the company, its location and contact details."
        }
    };

    format!(
        "{persona}\n{task}\nCompany: {}, Location: {}, Email: {}, Phone: {}\n\
         If the context does not contain the answer, say so and suggest contacting the company.\n\
         Respond in the same language as the question.",
        company.name, company.location, company.email, company.phone
    )
}

pub fn build_prompt(
    company: &CompanyProfile,
    kind: QueryKind,
    context: &str,
    history: &[ChatTurn],
    question: &str,
) -> String {
    let mut prompt = preamble(kind, company);

    prompt.push_str("\n\nContext:\n");
    if context.trim().is_empty() {
        prompt.push_str("(no relevant documents found)");
    } else {
        prompt.push_str(context.trim());
    }

    if !history.is_empty() {
        prompt.push_str("\n\nConversation so far:\n");
        for turn in history {
            let _ = writeln!(prompt, "User: {}\nAssistant: {}", turn.question, turn.answer);
        }
    }

    let _ = write!(prompt, "\n\nQuestion: {question}\n\nAnswer:");
    prompt
}

pub fn build_bare_prompt(question: &str) -> String {
    format!("Question: {question}\nAnswer:")
}

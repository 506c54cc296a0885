//! `embed` subcommand

use super::CliResult;
use crate::embedding::{cosine_similarity, generate_embedding, Embedding, PREVIEW_LEN};
use crate::llm::ModelService;

fn describe(embedding: &Embedding, full: bool) -> String {
    let mut out = format!("\"{}\" -> {} dimensions\n", embedding.text, embedding.dimension());
    if let Some(stats) = embedding.stats() {
        out.push_str(&format!(
            "min {:.4}  max {:.4}  mean {:.4}  norm {:.4}\n",
            stats.min, stats.max, stats.mean, stats.norm
        ));
    }
    let shown = if full {
        &embedding.values[..]
    } else {
        embedding.preview(PREVIEW_LEN)
    };
    let values: Vec<String> = shown.iter().map(|v| format!("{v:.4}")).collect();
    out.push_str(&format!("[{}", values.join(", ")));
    if shown.len() < embedding.dimension() {
        out.push_str(&format!(", ... {} more", embedding.dimension() - shown.len()));
    }
    out.push(']');
    out
}

pub(super) async fn run(
    service: &dyn ModelService,
    text: &str,
    compare: Option<&str>,
    full: bool,
) -> CliResult {
    let first = generate_embedding(service, text).await?;
    println!("{}", describe(&first, full));

    if let Some(other) = compare {
        let second = generate_embedding(service, other).await?;
        println!("{}", describe(&second, full));
        match cosine_similarity(&first.values, &second.values) {
            Some(similarity) => println!("cosine similarity: {similarity:.4}"),
            None => println!("cosine similarity: undefined for these vectors"),
        }
    }
    Ok(())
}

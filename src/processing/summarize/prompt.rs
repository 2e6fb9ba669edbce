use crate::model::ChatMessage;

const MAP_SYSTEM: &str = "You are a precise analyst. Summarize clearly.";
const REDUCE_SYSTEM: &str = "Combine summaries into one executive summary.";

/// Separator placed between chunk summaries in the reduce input.
pub(crate) const SUMMARY_SEPARATOR: &str = "\n\n";

/// Messages for the map-phase request of chunk `index` out of `total`.
pub(crate) fn map_messages(index: usize, total: usize, chunk: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(MAP_SYSTEM),
        ChatMessage::user(format!(
            "Chunk {index}/{total}:\n\n{chunk}\n\n- Provide: (1) 5 bullets (2) risks (3) action items"
        )),
    ]
}

/// Messages for the single reduce-phase request.
pub(crate) fn reduce_messages(chunk_summaries: &[String]) -> Vec<ChatMessage> {
    let joined = chunk_summaries.join(SUMMARY_SEPARATOR);
    vec![
        ChatMessage::system(REDUCE_SYSTEM),
        ChatMessage::user(format!(
            "Combine the following chunk summaries into:\n\
             A) 10-line executive summary\n\
             B) key points JSON (title, bullets[], risks[], actions[])\n\n{joined}"
        )),
    ]
}

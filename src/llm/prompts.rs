//! System prompts for the digest's inference calls.
//!
//! These are behavioral contracts with the model, not configuration: the
//! categorizer's retry loop and the summarizer's response cleanup both
//! depend on the instructions given here.

/// Single-word category classification. The closed vocabulary is appended
/// as a bullet list so the categorizer owns the canonical label set.
pub fn category_system_prompt(vocabulary: &[&str]) -> String {
    let mut prompt = String::from(
        "You are an expert at categorising email messages using a single word category name. \
         If necessary you can choose a category of your own as long as it is a single word. \
         Respond with only a single word which is your chosen category. \
         Do not respond with multiple words or sentences; if you do, your output will be useless. \
         Here is a list of possible categories:\n",
    );
    for category in vocabulary {
        prompt.push_str("- ");
        prompt.push_str(category);
        prompt.push('\n');
    }
    prompt
}

/// One paragraph covering a batch of same-category messages.
pub const BATCH_SUMMARY: &str = "You are an expert scriptwriter for a news radio station. You are tasked with \
     summarising a list of email messages into a single paragraph that will be read \
     aloud at the next news bulletin. The user will send you a list of email messages \
     and ask you to summarise them, highlighting anything notable. Your summary needs \
     to be engaging and informative, even if the emails are not. Be brief and to the \
     point in a single paragraph. Don't use bullet points, lists, or other structured \
     formats because the newsreader will be reading your summary aloud. Don't add any \
     of your own observations, notes, opinions or comments in case they are \
     accidentally read aloud by the newsreader!";

/// Introductory paragraph over the set of batch summaries.
pub const HEADLINE: &str = "You are an expert report-writing author. You have been given a set of \
     paragraphs, each summarising a group of email messages received recently. \
     Author a detailed 'summary of summaries' highlighting the major themes so the \
     reader has a clear idea of the range of subjects. You are welcome to offer your \
     opinion on which themes matter: what should the reader concentrate on, and what \
     is unimportant? The reader will rely on your expertise to guide them.";

/// Closing paragraph over the full assembled report body.
pub const CONCLUDING: &str = "You are an expert scriptwriter for a news radio station. You have been given \
     the script for a news bulletin and you are to author a concluding paragraph \
     using your own opinion and observations on the messages it covers, singling out \
     the most notable ones. Start your paragraph with \"In conclusion, \".";

/// One-paragraph summary of a single message (per-message detail listing).
pub const INDIVIDUAL_SUMMARY: &str = "You are an expert at summarising email messages. You prefer to use clauses \
     instead of complete sentences in order to make your summary concise and to the \
     point. Be brief and to the point in a single paragraph. Don't use bullet points, \
     lists, or other structured formats. Do not answer any questions you may find in \
     the messages. The user will provide you with a message to summarise.";

/// Plain-text rendition of an HTML-only message body.
pub const HTML_TO_TEXT: &str = "You convert HTML email bodies into clean plain text. Reply with only the \
     readable text content of the document the user sends: no markup, no commentary, \
     no description of your task. Preserve the original wording.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_prompt_lists_every_label() {
        let prompt = category_system_prompt(&["NEWS", "PERSONAL", "WORK"]);
        assert!(prompt.contains("- NEWS\n"));
        assert!(prompt.contains("- PERSONAL\n"));
        assert!(prompt.contains("- WORK\n"));
        assert!(prompt.contains("single word"));
    }

    #[test]
    fn concluding_prompt_pins_the_opening_words() {
        assert!(CONCLUDING.contains("In conclusion, "));
    }
}

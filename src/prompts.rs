//! Prompt templates for each model-backed stage.
//!
//! Wording is not load-bearing. What matters is the JSON shape the query
//! writer and reflection prompts ask for, since the stages parse it.

use chrono::Local;

use crate::llm::Message;

/// Prompt templates for the research loop
pub struct ResearchPrompts;

impl ResearchPrompts {
    /// Get the current date formatted for prompts
    pub fn current_date() -> String {
        Local::now().format("%B %d, %Y").to_string()
    }

    /// System instruction for turning a topic into a web search query.
    pub fn query_writer(topic: &str, current_date: &str) -> String {
        format!(
            r#"Your goal is to generate a targeted web search query.

<CONTEXT>
Current date: {current_date}
Please ensure your queries account for the most current information available as of this date.
</CONTEXT>

<TOPIC>
{topic}
</TOPIC>

<FORMAT>
Format your response as a JSON object with ALL two of these exact keys:
   - "query": The actual search query string
   - "rationale": Brief explanation of why this query is relevant
</FORMAT>

<EXAMPLE>
Example output:
{{
    "query": "machine learning transformer architecture explained",
    "rationale": "Understanding the fundamental structure of transformer models"
}}
</EXAMPLE>

Provide your response in JSON format:"#
        )
    }

    /// System instruction for creating or extending the running summary.
    pub fn summarizer() -> String {
        r#"<GOAL>
Generate a high-quality summary of the provided context.
</GOAL>

<REQUIREMENTS>
When creating a NEW summary:
1. Highlight the most relevant information related to the user topic from the search results
2. Ensure a coherent flow of information

When EXTENDING an existing summary:
1. Read the existing summary and new search results carefully.
2. Compare the new information with the existing summary.
3. For each piece of new information:
    a. If it's related to existing points, integrate it into the relevant paragraph.
    b. If it's entirely new but relevant, add a new paragraph with a smooth transition.
    c. If it's not relevant to the user topic, skip it.
4. Ensure all additions are relevant to the user's topic.
5. Verify that your final output differs from the input summary.
</REQUIREMENTS>

<FORMATTING>
- Start directly with the updated summary, without preamble or titles. Do not use XML tags in the output.
</FORMATTING>

<Task>
Think carefully about the provided Context first. Then generate a summary of the context to address the User Input.
</Task>"#
            .to_string()
    }

    /// System instruction for finding a knowledge gap and a follow-up query.
    pub fn reflection(topic: &str) -> String {
        format!(
            r#"You are an expert research assistant analyzing a summary about {topic}.

<GOAL>
1. Identify knowledge gaps or areas that need deeper exploration
2. Generate a follow-up question that would help expand your understanding
3. Focus on technical details, implementation specifics, or emerging trends that weren't fully covered
</GOAL>

<REQUIREMENTS>
Ensure the follow-up question is self-contained and includes necessary context for web search.
</REQUIREMENTS>

<FORMAT>
Format your response as a JSON object with these exact keys:
- knowledge_gap: Describe what information is missing or needs clarification
- follow_up_query: Write a specific question to address this gap
</FORMAT>

<Task>
Reflect carefully on the Summary to identify knowledge gaps and produce a follow-up query. Then, produce your output following this JSON format:
{{
    "knowledge_gap": "The summary lacks information about performance metrics and benchmarks",
    "follow_up_query": "What are typical performance benchmarks and metrics used to evaluate [specific technology]?"
}}
</Task>

Provide your analysis in JSON format:"#
        )
    }

    pub fn query_messages(topic: &str) -> Vec<Message> {
        vec![
            Message::system(Self::query_writer(topic, &Self::current_date())),
            Message::user(format!(
                "Generate a query for web search. The research topic is: {topic}"
            )),
        ]
    }

    /// Summarizer messages; `existing` selects update over create.
    pub fn summary_messages(topic: &str, existing: &str, latest_research: &str) -> Vec<Message> {
        let content = if existing.trim().is_empty() {
            format!(
                "<Context>\n{latest_research}\n</Context>\n\n\
                 Create a Summary using the Context on this topic:\n<User Input>\n{topic}\n</User Input>\n"
            )
        } else {
            format!(
                "<Existing Summary>\n{existing}\n</Existing Summary>\n\n\
                 <New Context>\n{latest_research}\n</New Context>\n\n\
                 Update the Existing Summary with the New Context on this topic:\n<User Input>\n{topic}\n</User Input>\n"
            )
        };
        vec![Message::system(Self::summarizer()), Message::user(content)]
    }

    pub fn reflection_messages(topic: &str, summary: &str) -> Vec<Message> {
        vec![
            Message::system(Self::reflection(topic)),
            Message::user(format!(
                "Reflect on our existing knowledge:\n===\n{summary}\n===\n\
                 And now identify a knowledge gap and generate a follow-up web search query:"
            )),
        ]
    }
}

use crate::traits::ChatMessage;

const QUESTION_PROMPT: &str = "You are an expert at creating questions based on study materials and documentation.
Your goal is to prepare a student or professional for their exam and tests.
You do this by asking questions about the text below:

------------
{text}
------------

Create questions that will prepare the reader for their tests.
Make sure not to lose any important information.
Write one question per line.

QUESTIONS:
";

const REFINE_PROMPT: &str = "You are an expert at creating practice questions based on study material and documentation.
Your goal is to help a student or professional prepare for a test.
We have received some practice questions to a certain extent: {existing_answer}.
We have the option to refine the existing questions or add new ones
(only if necessary) with some more context below.

------------
{text}
------------

Given the new context, refine the original questions in English.
If the context is not helpful, please provide the original questions.
Write one question per line.

QUESTIONS:
";

const ANSWER_SYSTEM_PROMPT: &str = "Use the following pieces of context to answer the user's question.
If you don't know the answer, just say that you don't know, don't try to make up an answer.
----------------
{context}";

pub fn question_messages(text: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(QUESTION_PROMPT.replace("{text}", text))]
}

pub fn refine_messages(existing_answer: &str, text: &str) -> Vec<ChatMessage> {
    // Substitute the draft last so chunk text containing "{existing_answer}" stays literal.
    let prompt = REFINE_PROMPT
        .replace("{text}", text)
        .replacen("{existing_answer}", existing_answer, 1);
    vec![ChatMessage::user(prompt)]
}

pub fn answer_messages<'a>(question: &str, context: impl IntoIterator<Item = &'a str>) -> Vec<ChatMessage> {
    let context = context.into_iter().collect::<Vec<_>>().join("\n\n");
    vec![
        ChatMessage::system(ANSWER_SYSTEM_PROMPT.replace("{context}", &context)),
        ChatMessage::user(question),
    ]
}
